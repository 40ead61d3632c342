// ==============================================================================
// audit.rs - Audit Trail for Identity Checks
// ==============================================================================
// Description: Structured audit events for every analysis run
// Author: Matt Barham
// Created: 2026-10-18
// Modified: 2026-10-18
// Version: 1.0.0
// ==============================================================================
// Events are emitted as tracing events on the `snpxcheck::audit` target so a
// subscriber can route them to a dedicated sink (file, journald, collector).
// ==============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const AUDIT_TARGET: &str = "snpxcheck::audit";

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Input events
    InputAccepted,
    InputRejected,
    ParseFailed,

    // Analysis events
    RunStarted,
    SampleRejected,
    RunCompleted,

    // Output events
    ReportWritten,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEventType::InputAccepted => "input_accepted",
            AuditEventType::InputRejected => "input_rejected",
            AuditEventType::ParseFailed => "parse_failed",
            AuditEventType::RunStarted => "run_started",
            AuditEventType::SampleRejected => "sample_rejected",
            AuditEventType::RunCompleted => "run_completed",
            AuditEventType::ReportWritten => "report_written",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogSeverity {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    /// Run the event belongs to
    pub run_id: Uuid,
    /// Input file name or sample identifier
    pub resource: Option<String>,
    pub details: serde_json::Value,
    pub severity: LogSeverity,
}

impl AuditEvent {
    pub fn new(
        event_type: AuditEventType,
        run_id: Uuid,
        resource: Option<String>,
        details: serde_json::Value,
    ) -> Self {
        let severity = match event_type {
            AuditEventType::SampleRejected => LogSeverity::Warning,

            AuditEventType::InputRejected | AuditEventType::ParseFailed => LogSeverity::Error,

            _ => LogSeverity::Info,
        };

        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event_type,
            run_id,
            resource,
            details,
            severity,
        }
    }

    /// Emit the event on the audit target
    pub fn log(&self) {
        let resource = self.resource.as_deref().unwrap_or("-");
        match self.severity {
            LogSeverity::Info => tracing::info!(
                target: AUDIT_TARGET,
                id = %self.id,
                run_id = %self.run_id,
                timestamp = %self.timestamp.to_rfc3339(),
                event = self.event_type.as_str(),
                resource,
                details = %self.details,
            ),
            LogSeverity::Warning => tracing::warn!(
                target: AUDIT_TARGET,
                id = %self.id,
                run_id = %self.run_id,
                timestamp = %self.timestamp.to_rfc3339(),
                event = self.event_type.as_str(),
                resource,
                details = %self.details,
            ),
            LogSeverity::Error => tracing::error!(
                target: AUDIT_TARGET,
                id = %self.id,
                run_id = %self.run_id,
                timestamp = %self.timestamp.to_rfc3339(),
                event = self.event_type.as_str(),
                resource,
                details = %self.details,
            ),
        }
    }
}

/// Convenience function to log an audit event
pub fn log_event(
    event_type: AuditEventType,
    run_id: Uuid,
    resource: Option<String>,
    details: serde_json::Value,
) -> AuditEvent {
    let event = AuditEvent::new(event_type, run_id, resource, details);
    event.log();
    event
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_event_creation() {
        let run_id = Uuid::new_v4();
        let event = AuditEvent::new(
            AuditEventType::InputAccepted,
            run_id,
            Some("run_12.txt".to_string()),
            serde_json::json!({
                "size": 5242880,
                "sha256": "abc123"
            }),
        );

        assert_eq!(event.run_id, run_id);
        assert_eq!(event.resource, Some("run_12.txt".to_string()));
        assert_eq!(event.severity, LogSeverity::Info);
        assert_ne!(event.id, run_id);
    }

    #[test]
    fn test_event_severity() {
        let rejected = AuditEvent::new(
            AuditEventType::SampleRejected,
            Uuid::new_v4(),
            Some("P12".to_string()),
            serde_json::json!({}),
        );
        assert_eq!(rejected.severity, LogSeverity::Warning);

        let failed = log_event(
            AuditEventType::ParseFailed,
            Uuid::new_v4(),
            None,
            serde_json::json!({ "error": "Export is empty or has no data rows" }),
        );
        assert_eq!(failed.severity, LogSeverity::Error);
    }

    #[test]
    fn test_event_serialization() {
        let event = AuditEvent::new(
            AuditEventType::RunCompleted,
            Uuid::new_v4(),
            None,
            serde_json::json!({ "patients": 3 }),
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "run_completed");
        assert_eq!(json["severity"], "info");
        assert_eq!(json["details"]["patients"], 3);
    }
}
