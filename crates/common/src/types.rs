//! Common data types for Pitchroom components.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a participant.
///
/// UUIDv7, so ids sort by issue time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticipantId(pub Uuid);

impl ParticipantId {
    /// Create a new time-ordered participant ID
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ParticipantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ParticipantId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Error returned when a role string is neither `investor` nor `idea`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown role: {0}")]
pub struct ParseRoleError(pub String);

/// Which side of the room a participant is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Listens to pitches.
    Investor,
    /// Pitches an idea.
    Idea,
}

impl Role {
    /// Role for the participant issued at `index` (0-based).
    ///
    /// Even indices are investors, odd indices are ideas.
    #[must_use]
    pub fn for_issue_index(index: usize) -> Self {
        if index % 2 == 0 {
            Role::Investor
        } else {
            Role::Idea
        }
    }

    /// The role this one is matched against.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Role::Investor => Role::Idea,
            Role::Idea => Role::Investor,
        }
    }

    /// Wire representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Investor => "investor",
            Role::Idea => "idea",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "investor" => Ok(Role::Investor),
            "idea" => Ok(Role::Idea),
            other => Err(ParseRoleError(other.to_string())),
        }
    }
}

/// Provider-issued identifier of a video session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Borrow the raw provider id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Provider-issued identifier of a session recording.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArchiveId(pub String);

impl fmt::Display for ArchiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Provider-issued identifier of a live broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BroadcastId(pub String);

impl fmt::Display for BroadcastId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_participant_ids_are_unique_and_time_ordered() {
        let a = ParticipantId::new();
        let b = ParticipantId::new();
        assert_ne!(a, b);
        assert!(a < b);
        assert_eq!(a.0.get_version_num(), 7);
    }

    #[test]
    fn test_participant_id_parse_roundtrip() {
        let id = ParticipantId::new();
        let parsed: ParticipantId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<ParticipantId>().is_err());
    }

    #[test]
    fn test_participant_id_serializes_as_plain_string() {
        let id = ParticipantId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
    }

    #[test]
    fn test_role_alternates_by_issue_index() {
        assert_eq!(Role::for_issue_index(0), Role::Investor);
        assert_eq!(Role::for_issue_index(1), Role::Idea);
        assert_eq!(Role::for_issue_index(2), Role::Investor);
        assert_eq!(Role::for_issue_index(7), Role::Idea);
    }

    #[test]
    fn test_role_opposite() {
        assert_eq!(Role::Investor.opposite(), Role::Idea);
        assert_eq!(Role::Idea.opposite(), Role::Investor);
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("investor".parse::<Role>(), Ok(Role::Investor));
        assert_eq!("idea".parse::<Role>(), Ok(Role::Idea));
        assert_eq!(
            "Investor".parse::<Role>(),
            Err(ParseRoleError("Investor".to_string()))
        );
        assert!("".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::Investor).unwrap(), "\"investor\"");
        assert_eq!(serde_json::to_string(&Role::Idea).unwrap(), "\"idea\"");
        let back: Role = serde_json::from_str("\"idea\"").unwrap();
        assert_eq!(back, Role::Idea);
    }

    #[test]
    fn test_session_id_display() {
        let id = SessionId("1_MX40NjAwMDAwMH5-abc".to_string());
        assert_eq!(id.to_string(), "1_MX40NjAwMDAwMH5-abc");
        assert_eq!(id.as_str(), "1_MX40NjAwMDAwMH5-abc");
    }
}
