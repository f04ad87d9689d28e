//! Operator CLI for the LMS inter-service communication layer.
//!
//! # Commands
//!
//! ```text
//! services                      registered destinations and circuit state
//! probe <target> [--path]       GET through the resilient client
//! send-event <target>           POST one event to a peer inbox
//! broadcast [--targets a,b]     fan an event out to several peers
//! listen [--bind]               run the event inbox until Ctrl+C
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::Value;
use tokio::net::TcpListener;

use lms_interconnect::config::{load_config, with_service_name, InterconnectConfig};
use lms_interconnect::events::{handler_fn, Event, EventType, HandlerError};
use lms_interconnect::inbox::InboxServer;
use lms_interconnect::observability::logging::init_logging;
use lms_interconnect::{ServiceContext, Shutdown};

#[derive(Parser)]
#[command(name = "lms-interconnect")]
#[command(about = "Inter-service communication toolkit for the LMS services", long_about = None)]
struct Cli {
    /// TOML config file; built-in development defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the local service name
    #[arg(short, long)]
    service: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered services
    Services,
    /// GET a path on a service and print the response
    Probe {
        target: String,
        #[arg(long, default_value = "/api/v1/health")]
        path: String,
    },
    /// Send one event to a service's inbox
    SendEvent {
        target: String,
        #[arg(long)]
        event_type: EventType,
        /// JSON payload
        #[arg(long, default_value = "{}")]
        data: String,
    },
    /// Send one event to several services
    Broadcast {
        #[arg(long)]
        event_type: EventType,
        #[arg(long, default_value = "{}")]
        data: String,
        /// Comma-separated targets; every registered service when omitted
        #[arg(long, value_delimiter = ',')]
        targets: Vec<String>,
    },
    /// Run the event inbox and log every received event
    Listen {
        #[arg(long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => InterconnectConfig::default(),
    };
    if let Some(service) = cli.service {
        config = with_service_name(config, service)?;
    }

    init_logging(&config.observability)?;
    tracing::info!(service = %config.service.name, "lms-interconnect v{} starting", env!("CARGO_PKG_VERSION"));

    let context = ServiceContext::from_config(&config)?;

    match cli.command {
        Commands::Services => {
            for client in context.registry().clients() {
                println!(
                    "{:<16} {:<40} {}",
                    client.name(),
                    client.base_url(),
                    client.circuit_breaker().state()
                );
            }
        }
        Commands::Probe { target, path } => {
            let body = context.registry().get_client(&target)?.get(&path).await?;
            println!("{}", serde_json::to_string_pretty(&body.into_value())?);
        }
        Commands::SendEvent { target, event_type, data } => {
            let data: Value = serde_json::from_str(&data)?;
            let event = Event::new(event_type, data, context.service());
            context.events().send_event_to_service(&target, &event).await?;
            println!("sent {} to {}", event.event_id(), target);
        }
        Commands::Broadcast { event_type, data, targets } => {
            let data: Value = serde_json::from_str(&data)?;
            let event = Event::new(event_type, data, context.service());
            let deliveries = if targets.is_empty() {
                context.events().broadcast_to_all(&event).await
            } else {
                context.events().broadcast_event(&event, &targets).await
            };

            let mut failed = 0;
            for delivery in &deliveries {
                match &delivery.result {
                    Ok(()) => println!("{:<16} ok", delivery.target),
                    Err(e) => {
                        failed += 1;
                        println!("{:<16} failed: {e}", delivery.target);
                    }
                }
            }
            if failed > 0 {
                return Err(format!("{failed} of {} deliveries failed", deliveries.len()).into());
            }
        }
        Commands::Listen { bind } => {
            let bind = bind.unwrap_or_else(|| config.inbox.bind_address.clone());

            let log_event = handler_fn(|event: Event| async move {
                tracing::info!(
                    event_id = %event.event_id(),
                    event_type = %event.event_type(),
                    source_service = %event.source_service(),
                    data = %event.data(),
                    "Inbox event"
                );
                Ok::<(), HandlerError>(())
            });
            for event_type in EventType::ALL {
                context.dispatcher().subscribe(event_type, log_event.clone());
            }

            let listener = TcpListener::bind(&bind).await?;
            let shutdown = Shutdown::new();
            let server = InboxServer::new(context.dispatcher().clone(), &config.events.ingest_path);

            let trigger = shutdown.clone();
            tokio::spawn(async move { trigger.trigger_on_ctrl_c().await });

            server.run(listener, shutdown).await?;
        }
    }

    context.teardown();
    Ok(())
}
