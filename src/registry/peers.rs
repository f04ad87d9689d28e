//! Typed calls to the other LMS services.

use serde_json::Value;

use crate::client::ResponseBody;
use crate::error::{InterconnectError, Result};
use crate::registry::ServiceRegistry;

/// High-level client used by one service to reach its peers.
///
/// Every call goes through the registry, so retries and circuit breaking
/// come from the destination's `ServiceClient`.
#[derive(Debug, Clone)]
pub struct PeerClient {
    local_service: String,
    registry: ServiceRegistry,
}

impl PeerClient {
    pub fn new(local_service: impl Into<String>, registry: ServiceRegistry) -> Self {
        Self {
            local_service: local_service.into(),
            registry,
        }
    }

    pub fn local_service(&self) -> &str {
        &self.local_service
    }

    pub async fn get_user(&self, user_id: i64) -> Result<Value> {
        self.get("user", &format!("/api/v1/users/{user_id}")).await
    }

    pub async fn get_course(&self, course_id: i64) -> Result<Value> {
        self.get("course", &format!("/api/v1/courses/{course_id}")).await
    }

    pub async fn get_enrollment(&self, enrollment_id: i64) -> Result<Value> {
        self.get("enrollment", &format!("/api/v1/enrollments/{enrollment_id}"))
            .await
    }

    pub async fn get_assessment(&self, assessment_id: i64) -> Result<Value> {
        self.get("assessment", &format!("/api/v1/assessments/{assessment_id}"))
            .await
    }

    pub async fn get_progress(&self, progress_id: i64) -> Result<Value> {
        self.get("progress", &format!("/api/v1/progress/{progress_id}")).await
    }

    pub async fn create_notification(&self, notification: Value) -> Result<Value> {
        self.post("communication", "/api/v1/notifications", notification)
            .await
    }

    pub async fn send_message(&self, message: Value) -> Result<Value> {
        self.post("communication", "/api/v1/messages", message).await
    }

    /// Health endpoint of any registered service, including the local one.
    pub async fn health(&self, service: &str) -> Result<ResponseBody> {
        self.registry.get_client(service)?.get("/api/v1/health").await
    }

    fn ensure_remote(&self, target: &str) -> Result<()> {
        if target == self.local_service {
            return Err(InterconnectError::SelfCall {
                service: target.to_string(),
            });
        }
        Ok(())
    }

    async fn get(&self, target: &str, path: &str) -> Result<Value> {
        self.ensure_remote(target)?;
        let client = self.registry.get_client(target)?;
        Ok(client.get(path).await?.into_value())
    }

    async fn post(&self, target: &str, path: &str, body: Value) -> Result<Value> {
        self.ensure_remote(target)?;
        let client = self.registry.get_client(target)?;
        Ok(client.post(path, body).await?.into_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_self_call_rejected() {
        let registry = ServiceRegistry::default();
        registry.register("user", "http://127.0.0.1:9").unwrap();
        let peers = registry.peers("user");

        let err = peers.get_user(1).await.unwrap_err();
        assert!(matches!(err, InterconnectError::SelfCall { ref service } if service == "user"));
    }

    #[tokio::test]
    async fn test_unregistered_peer() {
        let peers = ServiceRegistry::default().peers("course");
        let err = peers
            .send_message(json!({"content": "hi"}))
            .await
            .unwrap_err();
        assert!(matches!(err, InterconnectError::NotRegistered { ref service } if service == "communication"));
    }
}
