//! Terminal implementations of the engine's outbound ports

use anyhow::Result;
use async_trait::async_trait;
use microfocus_core::{
    Alert, AlertPriority, AlertSink, Broadcaster, EngineEvent, Enforcement, EnforcementSink,
};

/// Human-readable form of a verdict
pub fn describe(enforcement: &Enforcement) -> String {
    match enforcement {
        Enforcement::Allowed => "allowed".to_string(),
        Enforcement::AllowedUntil { expires_at } => {
            format!("allowed until {}", expires_at.with_timezone(&chrono::Local).format("%H:%M:%S"))
        }
        Enforcement::Denied { task_title, reason } => match task_title {
            Some(title) => format!("denied ({}; focusing on \"{title}\")", reason.message()),
            None => format!("denied ({})", reason.message()),
        },
    }
}

/// Verdicts go to the log, alerts to stdout, events to the debug log
#[derive(Debug, Default, Clone, Copy)]
pub struct Console;

#[async_trait]
impl EnforcementSink for Console {
    async fn deliver(&self, context_id: &str, enforcement: &Enforcement) -> Result<()> {
        log::info!("Context {context_id}: {}", describe(enforcement));
        Ok(())
    }
}

#[async_trait]
impl AlertSink for Console {
    async fn notify(&self, alert: &Alert) -> Result<()> {
        let marker = match alert.priority {
            AlertPriority::High => "!!",
            AlertPriority::Normal => "!",
            AlertPriority::Low => "-",
        };
        println!("{marker} {}: {}", alert.title, alert.message);
        Ok(())
    }
}

#[async_trait]
impl Broadcaster for Console {
    async fn publish(&self, event: &EngineEvent) -> Result<()> {
        log::debug!("Event: {}", serde_json::to_string(event)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use microfocus_core::DenyReason;

    #[test]
    fn test_describe_denied_with_task() {
        let text = describe(&Enforcement::Denied {
            task_title: Some("Write blog post".to_string()),
            reason: DenyReason::Unrelated,
        });
        assert_eq!(
            text,
            "denied (Looks unrelated to the active Zone; focusing on \"Write blog post\")"
        );
    }

    #[test]
    fn test_describe_allowed() {
        assert_eq!(describe(&Enforcement::Allowed), "allowed");
    }
}
