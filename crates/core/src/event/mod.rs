// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! The event log's unit of truth: an immutable, sequenced record.
//!
//! [`Event`] wraps per-type payloads in [`EventPayload`], a discriminated
//! union tagged by `type`. Dispatch (in the storage crate's projection) is a
//! match over this enum rather than subtype inheritance.

mod payload;

pub use payload::EventPayload;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A globally unique event identifier, assigned by the writer at creation
/// time (not by the daemon), so that peer-forwarded events retain the same
/// id through every hop.
pub type EventId = String;

/// Identifies the daemon an event was first written by. Local events use
/// this daemon's own id; events ingested via sync carry the origin peer's.
pub type OriginDaemonId = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: EventId,
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub origin_daemon: OriginDaemonId,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl Event {
    /// The stable `type` tag this event serializes under, e.g.
    /// `"message.create"`.
    pub fn type_tag(&self) -> &'static str {
        self.payload.type_tag()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{Body, Scope};

    #[test]
    fn round_trips_through_json_with_flattened_tag() {
        let event = Event {
            event_id: "evt-1".into(),
            sequence: 1,
            timestamp: Utc::now(),
            origin_daemon: "dmn-local".into(),
            payload: EventPayload::MessageCreate {
                message_id: "msg-1".into(),
                thread_id: None,
                agent_id: "agt-1".into(),
                authored_by: None,
                disclosed: None,
                session_id: "ses-1".into(),
                body: Body { format: "text".into(), content: "hi".into() },
                scopes: vec![Scope::Agent("agt-2".into())],
                refs: vec![],
                reply_to: None,
            },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "message.create");
        assert_eq!(json["event_id"], "evt-1");
        let back: Event = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
        assert_eq!(back.type_tag(), "message.create");
    }
}
