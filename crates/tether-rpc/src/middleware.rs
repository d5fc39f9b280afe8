//! Pre-dispatch observers.
//!
//! Middleware sees every raw frame before it is classified, in registration
//! order. It can observe but cannot alter or stop dispatch.

use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::session::Session;
use crate::types::{FrameHeader, FrameKind};

/// An observer run before each frame is dispatched.
pub trait Middleware: Send + Sync {
    /// Inspect one inbound frame.
    fn observe(&self, session: &Session, frame: &[u8]);
}

impl<F> Middleware for F
where
    F: Fn(&Session, &[u8]) + Send + Sync,
{
    fn observe(&self, session: &Session, frame: &[u8]) {
        self(session, frame);
    }
}

/// Structured audit record of every inbound text frame.
///
/// Emits one `info` event per frame under target `tether::audit` with the
/// service, session, method, direction, and the peer's own `epoch` timestamp
/// (taken from `params`, `result`, or `error`, whichever the frame carries).
#[derive(Clone, Copy, Debug, Default)]
pub struct AuditLog;

#[derive(Deserialize)]
struct AuditFields {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

/// Fields the audit log extracts from a frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditRecord {
    /// Correlation id.
    pub id: Option<i64>,
    /// Method name, empty when absent.
    pub method: String,
    /// Whether the frame classifies as a response.
    pub response: bool,
    /// Timestamp the peer put in the payload, or 0.
    pub peer_epoch: i64,
}

impl AuditRecord {
    /// Extract an audit record. `None` when the frame is not a JSON object.
    pub fn from_frame(frame: &[u8]) -> Option<Self> {
        let fields: AuditFields = serde_json::from_slice(frame).ok()?;
        let epoch_of = |v: &Option<Value>| {
            v.as_ref()
                .and_then(|v| v.get("epoch"))
                .and_then(Value::as_i64)
        };
        let response = FrameHeader::read(frame)
            .and_then(|header| header.kind())
            .is_ok_and(|kind| kind == FrameKind::Response);
        let peer_epoch = if response {
            epoch_of(&fields.error).or_else(|| epoch_of(&fields.result))
        } else {
            epoch_of(&fields.params)
        };
        Some(Self {
            id: fields.id,
            method: fields.method.unwrap_or_default(),
            response,
            peer_epoch: peer_epoch.unwrap_or(0),
        })
    }
}

impl Middleware for AuditLog {
    fn observe(&self, session: &Session, frame: &[u8]) {
        let Some(record) = AuditRecord::from_frame(frame) else {
            info!(
                target: "tether::audit",
                service = session.service(),
                sid = %session.sid(),
                bytes = frame.len(),
                "unparseable frame"
            );
            return;
        };
        info!(
            target: "tether::audit",
            service = session.service(),
            sid = %session.sid(),
            uid = session.uid(),
            id = ?record.id,
            method = %record.method,
            response = record.response,
            peer_epoch = record.peer_epoch,
            "frame"
        );
    }
}
