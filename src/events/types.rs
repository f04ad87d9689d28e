//! Event types and the event wire form.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Closed set of domain facts propagated between services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "user.created")]
    UserCreated,
    #[serde(rename = "user.updated")]
    UserUpdated,
    #[serde(rename = "user.deleted")]
    UserDeleted,
    #[serde(rename = "course.created")]
    CourseCreated,
    #[serde(rename = "course.updated")]
    CourseUpdated,
    #[serde(rename = "course.deleted")]
    CourseDeleted,
    #[serde(rename = "enrollment.created")]
    EnrollmentCreated,
    #[serde(rename = "enrollment.updated")]
    EnrollmentUpdated,
    #[serde(rename = "enrollment.completed")]
    EnrollmentCompleted,
    #[serde(rename = "assessment.created")]
    AssessmentCreated,
    #[serde(rename = "assessment.submitted")]
    AssessmentSubmitted,
    #[serde(rename = "assessment.graded")]
    AssessmentGraded,
    #[serde(rename = "progress.updated")]
    ProgressUpdated,
    #[serde(rename = "progress.completed")]
    ProgressCompleted,
    #[serde(rename = "notification.created")]
    NotificationCreated,
    #[serde(rename = "message.sent")]
    MessageSent,
}

impl EventType {
    pub const ALL: [EventType; 16] = [
        Self::UserCreated,
        Self::UserUpdated,
        Self::UserDeleted,
        Self::CourseCreated,
        Self::CourseUpdated,
        Self::CourseDeleted,
        Self::EnrollmentCreated,
        Self::EnrollmentUpdated,
        Self::EnrollmentCompleted,
        Self::AssessmentCreated,
        Self::AssessmentSubmitted,
        Self::AssessmentGraded,
        Self::ProgressUpdated,
        Self::ProgressCompleted,
        Self::NotificationCreated,
        Self::MessageSent,
    ];

    /// Dotted wire name, e.g. `enrollment.created`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::UserCreated => "user.created",
            Self::UserUpdated => "user.updated",
            Self::UserDeleted => "user.deleted",
            Self::CourseCreated => "course.created",
            Self::CourseUpdated => "course.updated",
            Self::CourseDeleted => "course.deleted",
            Self::EnrollmentCreated => "enrollment.created",
            Self::EnrollmentUpdated => "enrollment.updated",
            Self::EnrollmentCompleted => "enrollment.completed",
            Self::AssessmentCreated => "assessment.created",
            Self::AssessmentSubmitted => "assessment.submitted",
            Self::AssessmentGraded => "assessment.graded",
            Self::ProgressUpdated => "progress.updated",
            Self::ProgressCompleted => "progress.completed",
            Self::NotificationCreated => "notification.created",
            Self::MessageSent => "message.sent",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no known event type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event type '{0}'")]
pub struct UnknownEventType(pub String);

impl FromStr for EventType {
    type Err = UnknownEventType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| UnknownEventType(s.to_string()))
    }
}

/// A published domain event.
///
/// Serializes to the JSON object peers accept on their event ingestion
/// endpoint: `event_id`, `event_type`, `data`, `source_service`, `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    event_id: String,
    event_type: EventType,
    data: Value,
    source_service: String,
    #[serde(serialize_with = "serialize_timestamp", deserialize_with = "deserialize_timestamp")]
    timestamp: DateTime<Utc>,
}

impl Event {
    /// New event stamped with the current time and a derived id.
    pub fn new(event_type: EventType, data: Value, source_service: impl Into<String>) -> Self {
        let source_service = source_service.into();
        let timestamp = Utc::now();
        Self {
            event_id: default_event_id(&source_service, event_type, timestamp),
            event_type,
            data,
            source_service,
            timestamp,
        }
    }

    pub fn with_id(mut self, event_id: impl Into<String>) -> Self {
        self.event_id = event_id.into();
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn source_service(&self) -> &str {
        &self.source_service
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// `{source}_{event_type}_{unix seconds with microseconds}`.
fn default_event_id(source: &str, event_type: EventType, at: DateTime<Utc>) -> String {
    format!(
        "{source}_{event_type}_{}.{:06}",
        at.timestamp(),
        at.timestamp_subsec_micros()
    )
}

fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Micros, true))
}

fn deserialize_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).map_err(serde::de::Error::custom)
}

/// Parse an ISO-8601 timestamp; one without an offset is taken as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Ok(ts.with_timezone(&Utc)),
        Err(rfc_err) => NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|_| rfc_err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_event_type_names() {
        assert_eq!(EventType::EnrollmentCreated.to_string(), "enrollment.created");
        assert_eq!("message.sent".parse::<EventType>().unwrap(), EventType::MessageSent);
        assert!("grade.changed".parse::<EventType>().is_err());

        for event_type in EventType::ALL {
            let wire = serde_json::to_value(event_type).unwrap();
            assert_eq!(wire, json!(event_type.as_str()));
        }
    }

    #[test]
    fn test_default_event_id() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let event = Event::new(EventType::UserCreated, json!({"id": 1}), "user").with_timestamp(at);
        assert!(event.event_id().starts_with("user_user.created_"));
        assert_eq!(
            default_event_id("user", EventType::UserCreated, at),
            "user_user.created_1709294400.000000"
        );
    }

    #[test]
    fn test_wire_form() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let event = Event::new(EventType::ProgressCompleted, json!({"progress_id": 9}), "progress")
            .with_id("evt-1")
            .with_timestamp(at);

        let wire = serde_json::to_value(&event).unwrap();
        assert_eq!(
            wire,
            json!({
                "event_id": "evt-1",
                "event_type": "progress.completed",
                "data": {"progress_id": 9},
                "source_service": "progress",
                "timestamp": "2024-03-01T12:00:00.000000Z"
            })
        );

        let back: Event = serde_json::from_value(wire).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_naive_timestamp_is_utc() {
        let payload = json!({
            "event_id": "evt-2",
            "event_type": "course.updated",
            "data": {},
            "source_service": "course",
            "timestamp": "2024-03-01T12:00:00.250000"
        });
        let event: Event = serde_json::from_value(payload).unwrap();
        assert_eq!(event.timestamp().timestamp_subsec_micros(), 250_000);
        assert_eq!(event.timestamp().timestamp(), 1_709_294_400);
    }

    #[test]
    fn test_unknown_event_type_rejected() {
        let payload = json!({
            "event_id": "evt-3",
            "event_type": "grade.changed",
            "data": {},
            "source_service": "course",
            "timestamp": "2024-03-01T12:00:00Z"
        });
        assert!(serde_json::from_value::<Event>(payload).is_err());
    }
}
