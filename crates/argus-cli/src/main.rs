//! # argus
//!
//! Command-line monitor for a subject's push channel: connects, subscribes
//! to alarm and device-status messages, and prints everything that arrives
//! until Ctrl-C.

#![deny(unsafe_code)]

use anyhow::Result;
use argus_channel::{ChannelManager, ConnectOptions};
use argus_core::SubjectId;
use argus_settings::load_settings;
use clap::Parser;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Campus push channel monitor.
#[derive(Parser, Debug)]
#[command(name = "argus", about = "Campus push channel monitor")]
struct Cli {
    /// Subject id to open the channel for.
    subject: String,

    /// Channel host, e.g. "monitor.example.edu:443" (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Dial wss:// instead of ws:// (overrides settings).
    #[arg(long)]
    secure: bool,

    /// Extra message types to subscribe to, besides `alarm` and
    /// `device.status`.
    #[arg(long = "subscribe", value_name = "TYPE")]
    extra_types: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut settings = match load_settings() {
        Ok(settings) => settings,
        Err(error) => {
            warn!(%error, "failed to load settings, using defaults");
            argus_settings::ChannelSettings::default()
        }
    };
    if let Some(host) = args.host {
        settings.endpoint.host = host;
    }
    if args.secure {
        settings.endpoint.secure = true;
    }

    let manager = ChannelManager::new(settings);

    let mut kinds = vec!["alarm".to_string(), "device.status".to_string()];
    kinds.extend(args.extra_types);
    for kind in kinds {
        let label = kind.clone();
        let _ = manager.on_message(kind, move |data| {
            info!(message_type = %label, %data, "message");
        });
    }

    // Log every status transition for the life of the session.
    let mut status = manager.subscribe_status();
    let status_task = tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = *status.borrow_and_update();
            info!(status = current.as_text(), "channel status");
        }
    });

    let subject = SubjectId::from_string(args.subject);
    info!(%subject, "connecting");
    manager.connect(
        subject,
        ConnectOptions {
            on_error: Some(Arc::new(|error: &argus_channel::ChannelError| {
                warn!(%error, "channel error");
            })),
            ..ConnectOptions::default()
        },
    );

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    manager.disconnect();
    status_task.abort();
    Ok(())
}
