//! State types for the moderation state machine.
//!
//! A post is either waiting for a reviewer or carries the decision that was
//! made about it. The decision data only exists on the decided variants, so a
//! pending post can never claim a reviewer and an approved post can never be
//! unverified.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::AccountId;
use crate::role::ParseError;

/// A reviewer's finding about a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "verified")]
    Verified,
    #[serde(rename = "misleading")]
    Misleading,
    #[serde(rename = "false")]
    False,
    #[serde(rename = "needs-context")]
    NeedsContext,
}

impl Verdict {
    pub const ALL: [Verdict; 4] = [
        Verdict::Verified,
        Verdict::Misleading,
        Verdict::False,
        Verdict::NeedsContext,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Verified => "verified",
            Verdict::Misleading => "misleading",
            Verdict::False => "false",
            Verdict::NeedsContext => "needs-context",
        }
    }

    /// Only `verified` approves a post.
    pub fn approves(&self) -> bool {
        matches!(self, Verdict::Verified)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verdict {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Verdict::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| ParseError::new("verdict", s))
    }
}

/// The three lifecycle states, as exposed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Pending,
    Approved,
    Rejected,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Approved => "approved",
            VerificationStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(VerificationStatus::Pending),
            "approved" => Ok(VerificationStatus::Approved),
            "rejected" => Ok(VerificationStatus::Rejected),
            other => Err(ParseError::new("verification status", other)),
        }
    }
}

/// Moderation state of a single post.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ModerationState {
    /// Waiting for a reviewer. Every new post starts here.
    #[default]
    Pending,

    /// A reviewer found the post verified.
    Approved {
        reviewed_by: AccountId,
        reviewed_at: DateTime<Utc>,
        notes: Option<String>,
    },

    /// A reviewer found the post misleading, false or lacking context.
    Rejected {
        reviewed_by: AccountId,
        reviewed_at: DateTime<Utc>,
        notes: Option<String>,
        verdict: Verdict,
    },
}

impl ModerationState {
    pub fn status(&self) -> VerificationStatus {
        match self {
            ModerationState::Pending => VerificationStatus::Pending,
            ModerationState::Approved { .. } => VerificationStatus::Approved,
            ModerationState::Rejected { .. } => VerificationStatus::Rejected,
        }
    }

    pub fn is_verified(&self) -> bool {
        matches!(self, ModerationState::Approved { .. })
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, ModerationState::Pending)
    }

    pub fn reviewed_by(&self) -> Option<AccountId> {
        match self {
            ModerationState::Pending => None,
            ModerationState::Approved { reviewed_by, .. }
            | ModerationState::Rejected { reviewed_by, .. } => Some(*reviewed_by),
        }
    }

    pub fn reviewed_at(&self) -> Option<DateTime<Utc>> {
        match self {
            ModerationState::Pending => None,
            ModerationState::Approved { reviewed_at, .. }
            | ModerationState::Rejected { reviewed_at, .. } => Some(*reviewed_at),
        }
    }

    pub fn notes(&self) -> Option<&str> {
        match self {
            ModerationState::Pending => None,
            ModerationState::Approved { notes, .. } | ModerationState::Rejected { notes, .. } => {
                notes.as_deref()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_wire_names() {
        for verdict in Verdict::ALL {
            let json = serde_json::to_string(&verdict).unwrap();
            assert_eq!(json, format!("\"{}\"", verdict.as_str()));
            assert_eq!(verdict.as_str().parse::<Verdict>().unwrap(), verdict);
        }
    }

    #[test]
    fn test_only_verified_approves() {
        assert!(Verdict::Verified.approves());
        assert!(!Verdict::Misleading.approves());
        assert!(!Verdict::False.approves());
        assert!(!Verdict::NeedsContext.approves());
    }

    #[test]
    fn test_pending_has_no_decision() {
        let state = ModerationState::default();
        assert_eq!(state.status(), VerificationStatus::Pending);
        assert!(!state.is_verified());
        assert_eq!(state.reviewed_by(), None);
        assert_eq!(state.notes(), None);
    }

    #[test]
    fn test_state_serialises_with_status_tag() {
        let reviewer = AccountId::new();
        let state = ModerationState::Rejected {
            reviewed_by: reviewer,
            reviewed_at: Utc::now(),
            notes: Some("no source".into()),
            verdict: Verdict::NeedsContext,
        };
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["status"], "rejected");
        assert_eq!(value["verdict"], "needs-context");
        let back: ModerationState = serde_json::from_value(value).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(
            "approved".parse::<VerificationStatus>().unwrap(),
            VerificationStatus::Approved
        );
        assert!("done".parse::<VerificationStatus>().is_err());
    }
}
