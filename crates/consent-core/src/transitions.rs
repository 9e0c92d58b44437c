//! Pure Consent Lifecycle Transitions
//!
//! Effect-free transition functions over [`ConsentToken`]. The permitted
//! edges are:
//!
//! ```text
//! Pending ──activate──▶ Active
//! Pending ──abandon───▶ Abandoned
//! Pending ──revoke────▶ Revoked
//! Active  ──revoke────▶ Revoked
//! ```
//!
//! Every other edge, including self-loops, is rejected. Callers decide
//! whether a rejection is an error or a stale no-op.

use crate::types::{ConsentStatus, ConsentToken};
use serde::{Deserialize, Serialize};

/// A requested lifecycle change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Transition {
    Activate,
    Abandon,
    Revoke,
}

impl Transition {
    /// Status the token ends in when the transition applies.
    pub fn target(self) -> ConsentStatus {
        match self {
            Self::Activate => ConsentStatus::Active,
            Self::Abandon => ConsentStatus::Abandoned,
            Self::Revoke => ConsentStatus::Revoked,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("transition {from} -> {to} is not permitted")]
    NotPermitted {
        from: ConsentStatus,
        to: ConsentStatus,
    },
}

/// Whether `from → to` is an edge of the lifecycle graph.
pub fn is_permitted(from: ConsentStatus, to: ConsentStatus) -> bool {
    use ConsentStatus::{Abandoned, Active, Pending, Revoked};
    matches!(
        (from, to),
        (Pending, Active) | (Pending, Abandoned) | (Pending, Revoked) | (Active, Revoked)
    )
}

/// Apply `transition` to `token` at `now_ms`, producing the updated record.
///
/// Revocation stamps `revoked_at` and raises `is_revoked`; the other edges
/// only move the status.
pub fn apply_transition(
    token: &ConsentToken,
    transition: Transition,
    now_ms: u64,
) -> Result<ConsentToken, TransitionError> {
    let to = transition.target();
    if !is_permitted(token.status, to) {
        return Err(TransitionError::NotPermitted {
            from: token.status,
            to,
        });
    }

    let mut next = token.clone();
    next.status = to;
    if transition == Transition::Revoke {
        next.revoked_at = Some(now_ms);
        next.is_revoked = true;
    }
    Ok(next)
}
