//! Transition events consumed from the message source.
//!
//! A transition event reports the settlement outcome of an upstream
//! transaction for one `(product_id, biller_id)` subject pair. Non-success
//! outcomes deactivate the corresponding product-biller link; the processor
//! in [`crate::processor`] applies that transition at most once per pair.
//!
//! The wire format is the upstream JSON payload:
//!
//! ```json
//! { "id": 42, "partner_id": 7, "product_id": 1, "biller_id": 2, "status": "failure" }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Namespace for lock keys derived from transition events.
const LOCK_KEY_NAMESPACE: &str = "worker:link:deactivate";

/// Settlement status carried by a transition event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionStatus {
    /// The upstream transaction has not settled yet.
    Pending,
    /// The upstream transaction settled successfully; nothing to apply.
    Success,
    /// The upstream transaction failed.
    Failure,
}

impl TransitionStatus {
    /// Wire representation of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }

    /// Whether the event is settled successfully and carries nothing to apply.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for TransitionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transition event for one `(product_id, biller_id)` subject pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionEvent {
    /// Upstream transaction id.
    pub id: i64,
    /// Partner that originated the transaction.
    pub partner_id: i64,
    /// Product side of the subject pair.
    pub product_id: i64,
    /// Biller side of the subject pair.
    pub biller_id: i64,
    /// Settlement status.
    pub status: TransitionStatus,
}

impl TransitionEvent {
    /// Derive the mutual-exclusion lock key for this event's subject pair.
    ///
    /// The key is deterministic: concurrent events for the same pair map to
    /// the same key and therefore serialize, while distinct pairs never
    /// collide. Format: `worker:link:deactivate:{product_id}:{biller_id}`.
    #[must_use]
    pub fn lock_key(&self) -> String {
        format!(
            "{LOCK_KEY_NAMESPACE}:{}:{}",
            self.product_id, self.biller_id
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn decodes_upstream_payload() {
        let payload = r#"{"id":42,"partner_id":7,"product_id":1,"biller_id":2,"status":"failure"}"#;

        let event: TransitionEvent =
            serde_json::from_str(payload).expect("payload should decode");

        assert_eq!(event.id, 42);
        assert_eq!(event.partner_id, 7);
        assert_eq!(event.product_id, 1);
        assert_eq!(event.biller_id, 2);
        assert_eq!(event.status, TransitionStatus::Failure);
    }

    #[test]
    fn rejects_unknown_status() {
        let payload = r#"{"id":1,"partner_id":1,"product_id":1,"biller_id":2,"status":"exploded"}"#;
        assert!(serde_json::from_str::<TransitionEvent>(payload).is_err());
    }

    #[test]
    fn rejects_missing_subject_keys() {
        let payload = r#"{"id":1,"partner_id":1,"status":"failure"}"#;
        assert!(serde_json::from_str::<TransitionEvent>(payload).is_err());
    }

    #[test]
    fn status_round_trips_through_wire_names() {
        for status in [
            TransitionStatus::Pending,
            TransitionStatus::Success,
            TransitionStatus::Failure,
        ] {
            let json = serde_json::to_string(&status).expect("status should encode");
            assert_eq!(json, format!("\"{}\"", status.as_str()));

            let back: TransitionStatus =
                serde_json::from_str(&json).expect("status should decode");
            assert_eq!(back, status);
        }
    }

    #[test]
    fn lock_key_uses_subject_pair() {
        let event = TransitionEvent {
            id: 42,
            partner_id: 7,
            product_id: 1,
            biller_id: 2,
            status: TransitionStatus::Failure,
        };

        assert_eq!(event.lock_key(), "worker:link:deactivate:1:2");
    }

    proptest! {
        #[test]
        fn lock_key_is_deterministic(product_id in any::<i64>(), biller_id in any::<i64>()) {
            let event = TransitionEvent {
                id: 0,
                partner_id: 0,
                product_id,
                biller_id,
                status: TransitionStatus::Failure,
            };

            prop_assert_eq!(event.lock_key(), event.lock_key());
        }

        #[test]
        fn distinct_pairs_never_share_a_key(
            left in any::<(i64, i64)>(),
            right in any::<(i64, i64)>(),
        ) {
            prop_assume!(left != right);

            let make = |(product_id, biller_id): (i64, i64)| TransitionEvent {
                id: 0,
                partner_id: 0,
                product_id,
                biller_id,
                status: TransitionStatus::Pending,
            };

            prop_assert_ne!(make(left).lock_key(), make(right).lock_key());
        }
    }
}
