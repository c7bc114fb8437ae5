use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error returned when a wire value does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind}: {value:?}")]
pub struct ParseError {
    pub kind: &'static str,
    pub value: String,
}

impl ParseError {
    pub fn new(kind: &'static str, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// The three account experiences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    User,
    Reviewer,
    Business,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::User, Role::Reviewer, Role::Business];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Reviewer => "Reviewer",
            Role::Business => "Business",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| ParseError::new("role", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_roles() {
        assert_eq!("User".parse::<Role>().unwrap(), Role::User);
        assert_eq!("Reviewer".parse::<Role>().unwrap(), Role::Reviewer);
        assert_eq!("Business".parse::<Role>().unwrap(), Role::Business);
    }

    #[test]
    fn test_parse_is_case_sensitive() {
        let err = "reviewer".parse::<Role>().unwrap_err();
        assert_eq!(err.kind, "role");
        assert_eq!(err.to_string(), "invalid role: \"reviewer\"");
    }

    #[test]
    fn test_admin_is_not_a_role() {
        assert!("Admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_serde_uses_variant_names() {
        assert_eq!(serde_json::to_string(&Role::Business).unwrap(), "\"Business\"");
    }
}
