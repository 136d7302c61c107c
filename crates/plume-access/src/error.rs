//! Error types for plume-access

use thiserror::Error;

/// One failed credential-type attempt, recorded for the denial report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attempt {
    /// Credential type label ("owner", "subscription", ...).
    pub kind: &'static str,
    /// Why the attempt failed.
    pub reason: String,
}

fn attempted_kinds(attempted: &[Attempt]) -> String {
    if attempted.is_empty() {
        return "none".to_string();
    }
    attempted
        .iter()
        .map(|a| a.kind)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors from authorization resolution
#[derive(Debug, Error)]
pub enum AccessError {
    #[error("Chain RPC unavailable: {0}")]
    ChainUnavailable(String),

    #[error("Authorization proof rejected for {kind} credential: {reason}")]
    ProofRejected { kind: &'static str, reason: String },

    #[error("Access denied; attempted credential types: {}", attempted_kinds(.attempted))]
    Denied { attempted: Vec<Attempt> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denied_lists_attempted_kinds() {
        let err = AccessError::Denied {
            attempted: vec![
                Attempt {
                    kind: "subscription",
                    reason: "expired".to_string(),
                },
                Attempt {
                    kind: "free-access",
                    reason: "not open".to_string(),
                },
            ],
        };
        let msg = format!("{}", err);
        assert!(msg.contains("subscription, free-access"));
    }

    #[test]
    fn test_denied_with_no_attempts() {
        let err = AccessError::Denied { attempted: vec![] };
        assert!(format!("{}", err).contains("none"));
    }

    #[test]
    fn test_proof_rejected_display() {
        let err = AccessError::ProofRejected {
            kind: "owner",
            reason: "capability not held".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("owner"));
        assert!(msg.contains("capability not held"));
    }
}
