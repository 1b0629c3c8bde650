// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Thrum Contributors

//! Three-stage inbound event validation (§4.8.1).

use crate::canonical::canonical_bytes;
use crate::error::ValidationError;
use base64::Engine;
use chrono::{Duration, Utc};
use ed25519_dalek::{Signature, VerifyingKey};
use thrum_core::{Event, Message};

/// Hard cap on a single event's serialized size (§4.8.1 stage 1).
pub const MAX_EVENT_BYTES: usize = 1024 * 1024;

/// Upper bound on how far in the future an event's `timestamp` may claim
/// to be (§4.8.1 stage 3): guards against clock-skewed or malicious peers
/// backdating/forward-dating history.
const MAX_CLOCK_SKEW_HOURS: i64 = 24;

/// Whether unsigned events are accepted from peers with no registered key
/// (migration mode, §4.8.1 stage 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignaturePolicy {
    Require,
    AllowUnsigned,
}

/// Stage 1: size and required-field shape. Runs before the event is even
/// fully deserialized in the real pull path; here it runs against the
/// already-decoded [`Event`] plus the raw byte length the caller measured.
pub fn validate_schema(event: &Event, raw_len: usize) -> Result<(), ValidationError> {
    if raw_len > MAX_EVENT_BYTES {
        return Err(ValidationError::TooLarge);
    }
    if event.event_id.is_empty() {
        return Err(ValidationError::MissingField("event_id"));
    }
    if event.origin_daemon.is_empty() {
        return Err(ValidationError::MissingField("origin_daemon"));
    }
    Ok(())
}

/// Stage 2: Ed25519 signature verification over the canonical form of the
/// event. `signature` is the base64-encoded detached signature the peer
/// attached out-of-band (sync transport envelope, not a field on the event
/// itself, since the event's own JSON is the signed payload).
pub fn validate_signature(
    event: &Event,
    peer_public_key_b64: Option<&str>,
    signature_b64: Option<&str>,
    policy: SignaturePolicy,
) -> Result<(), ValidationError> {
    let (key_b64, sig_b64) = match (peer_public_key_b64, signature_b64) {
        (Some(k), Some(s)) => (k, s),
        _ => {
            return match policy {
                SignaturePolicy::AllowUnsigned => Ok(()),
                SignaturePolicy::Require => Err(ValidationError::BadSignature),
            };
        }
    };

    let key_bytes = base64::engine::general_purpose::STANDARD
        .decode(key_b64)
        .map_err(|_| ValidationError::BadSignature)?;
    let key_array: [u8; 32] = key_bytes.as_slice().try_into().map_err(|_| ValidationError::BadSignature)?;
    let verifying_key = VerifyingKey::from_bytes(&key_array).map_err(|_| ValidationError::BadSignature)?;

    let sig_bytes = base64::engine::general_purpose::STANDARD
        .decode(sig_b64)
        .map_err(|_| ValidationError::BadSignature)?;
    let sig_array: [u8; 64] = sig_bytes.as_slice().try_into().map_err(|_| ValidationError::BadSignature)?;
    let signature = Signature::from_bytes(&sig_array);

    let message = canonical_bytes(event).map_err(|_| ValidationError::BadSignature)?;
    verifying_key.verify_strict(&message, &signature).map_err(|_| ValidationError::BadSignature)
}

/// Stage 3: business-logic checks that need domain knowledge but not a
/// storage round-trip. Existence of referenced entities is checked by the
/// caller against the projection (or the rest of the same batch) and
/// reported via `known_message_ids`/`known_agent_ids`.
pub fn validate_business_logic(
    event: &Event,
    known_message_ids: &dyn Fn(&str) -> bool,
) -> Result<(), ValidationError> {
    let skew = event.timestamp - Utc::now();
    if skew > Duration::hours(MAX_CLOCK_SKEW_HOURS) {
        return Err(ValidationError::TimestampOutOfRange);
    }

    if let thrum_core::EventPayload::MessageCreate { body, reply_to, .. } = &event.payload {
        if body.exceeds_max() {
            return Err(ValidationError::ContentTooLarge);
        }
        if let Some(reply_to) = reply_to {
            if !known_message_ids(reply_to.as_str()) {
                return Err(ValidationError::UnknownReference(reply_to.as_str().to_string()));
            }
        }
    }
    Ok(())
}

/// Runs all three stages in order, short-circuiting on the first failure.
pub fn validate(
    event: &Event,
    raw_len: usize,
    peer_public_key_b64: Option<&str>,
    signature_b64: Option<&str>,
    policy: SignaturePolicy,
    known_message_ids: &dyn Fn(&str) -> bool,
) -> Result<(), ValidationError> {
    validate_schema(event, raw_len)?;
    validate_signature(event, peer_public_key_b64, signature_b64, policy)?;
    validate_business_logic(event, known_message_ids)
}

/// Size guard reused by the local write path too (§4.3 `InvalidArgument`).
pub fn validate_message_body(message: &Message) -> Result<(), ValidationError> {
    if message.body.exceeds_max() {
        return Err(ValidationError::ContentTooLarge);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;
    use thrum_core::{AgentId, EventPayload};

    fn sample_event() -> Event {
        Event {
            event_id: "evt-1".into(),
            sequence: 1,
            timestamp: Utc::now(),
            origin_daemon: "dmn-peer".into(),
            payload: EventPayload::AgentRegister {
                agent_id: AgentId::new(),
                name: "impl1".into(),
                role: "implementer".into(),
                module: "auth".into(),
                display: None,
                hostname: "host1".into(),
                public_key: None,
            },
        }
    }

    #[test]
    fn missing_event_id_fails_schema() {
        let mut event = sample_event();
        event.event_id = String::new();
        assert_eq!(validate_schema(&event, 100), Err(ValidationError::MissingField("event_id")));
    }

    #[test]
    fn oversized_event_fails_schema() {
        let event = sample_event();
        assert_eq!(validate_schema(&event, MAX_EVENT_BYTES + 1), Err(ValidationError::TooLarge));
    }

    #[test]
    fn unsigned_event_allowed_in_migration_mode() {
        let event = sample_event();
        assert!(validate_signature(&event, None, None, SignaturePolicy::AllowUnsigned).is_ok());
    }

    #[test]
    fn unsigned_event_rejected_when_required() {
        let event = sample_event();
        assert!(validate_signature(&event, None, None, SignaturePolicy::Require).is_err());
    }

    #[test]
    fn valid_signature_round_trips() {
        let event = sample_event();
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();
        let message = canonical_bytes(&event).unwrap();
        let signature: Signature = ed25519_dalek::Signer::sign(&signing_key, &message);

        let key_b64 = base64::engine::general_purpose::STANDARD.encode(verifying_key.to_bytes());
        let sig_b64 = base64::engine::general_purpose::STANDARD.encode(signature.to_bytes());

        assert!(validate_signature(&event, Some(&key_b64), Some(&sig_b64), SignaturePolicy::Require).is_ok());
    }

    #[test]
    fn future_timestamp_beyond_skew_fails() {
        let mut event = sample_event();
        event.timestamp = Utc::now() + Duration::hours(MAX_CLOCK_SKEW_HOURS + 1);
        assert_eq!(validate_business_logic(&event, &|_| true), Err(ValidationError::TimestampOutOfRange));
    }
}
