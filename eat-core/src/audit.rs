//! Audit Logging infrastructure.
//!
//! Key rotations and token consumption are security-critical. Each one is
//! emitted as an [`AuditEvent`] through a pluggable [`AuditLogger`].

use crate::identity::Address;
use crate::keys::KeyEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    IntermediateRotated,
    IssuerActivated,
    IssuerDeactivated,
    TokenConsumed,
    TokenRejected,
    /// A consumption undone after its guarded call failed.
    TokenReleased,
}

/// An audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: String,

    pub event_type: AuditEventType,

    pub timestamp: DateTime<Utc>,

    /// Verifier the event happened at.
    pub verifier: Address,

    /// Identity that triggered the event.
    pub actor: Address,

    /// Key or fingerprint the event is about.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// Short reason code for rejections.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType, verifier: Address, actor: Address) -> Self {
        Self {
            id: format!("evt_{}", uuid::Uuid::now_v7().simple()),
            event_type,
            timestamp: Utc::now(),
            verifier,
            actor,
            subject: None,
            reason: None,
        }
    }

    /// Event for a hierarchy change.
    pub fn from_key_event(event: &KeyEvent, verifier: Address, actor: Address) -> Self {
        let (event_type, key) = match event {
            KeyEvent::IntermediateRotated(k) => (AuditEventType::IntermediateRotated, k),
            KeyEvent::IssuerActivated(k) => (AuditEventType::IssuerActivated, k),
            KeyEvent::IssuerDeactivated(k) => (AuditEventType::IssuerDeactivated, k),
        };
        Self::new(event_type, verifier, actor).with_subject(key.to_string())
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Trait for audit loggers.
pub trait AuditLogger: Send + Sync + std::fmt::Debug {
    /// Log an audit event.
    fn log(&self, event: AuditEvent);
}

/// Writes events to stdout as JSON lines, for log scrapers.
#[derive(Debug, Default)]
pub struct StdoutLogger;

impl StdoutLogger {
    pub fn new() -> Self {
        Self
    }
}

impl AuditLogger for StdoutLogger {
    fn log(&self, event: AuditEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => println!("{}", json),
            Err(e) => tracing::warn!(error = %e, event_id = %event.id, "failed to serialize audit event"),
        }
    }
}

/// A logger that does nothing (for testing or when auditing is disabled).
#[derive(Debug, Default)]
pub struct NoOpLogger;

impl AuditLogger for NoOpLogger {
    fn log(&self, _event: AuditEvent) {}
}

/// Collects events in memory.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    events: RwLock<Vec<AuditEvent>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.read().map(|e| e.clone()).unwrap_or_default()
    }
}

impl AuditLogger for MemoryLogger {
    fn log(&self, event: AuditEvent) {
        if let Ok(mut events) = self.events.write() {
            events.push(event);
        }
    }
}

/// Global audit logger. Unset means events are dropped.
static GLOBAL_LOGGER: RwLock<Option<Arc<dyn AuditLogger>>> = RwLock::new(None);

/// Set the global audit logger.
pub fn set_global_logger(logger: Arc<dyn AuditLogger>) {
    if let Ok(mut lock) = GLOBAL_LOGGER.write() {
        *lock = Some(logger);
    }
}

/// Log an event using the global logger.
pub fn log_event(event: AuditEvent) {
    if let Ok(lock) = GLOBAL_LOGGER.read() {
        if let Some(logger) = lock.as_ref() {
            logger.log(event);
        }
    }
}
