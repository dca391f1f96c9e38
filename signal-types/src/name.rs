//! Participant names - the routing key of the relay.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

use crate::SignalError;

/// The logical endpoint identity a connection registers under.
///
/// Opaque to the relay: any non-empty string is accepted (e.g. `agent1`,
/// `customer1`). Length limits are a relay policy, see [`Self::check_len`].
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ParticipantName(String);

impl ParticipantName {
    /// Create a name, rejecting the empty string.
    pub fn new(name: impl Into<String>) -> Result<Self, SignalError> {
        let name = name.into();
        if name.is_empty() {
            return Err(SignalError::InvalidName {
                reason: "name is empty".to_string(),
            });
        }
        Ok(Self(name))
    }

    /// Get the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reject names longer than `max` characters.
    pub fn check_len(&self, max: usize) -> Result<(), SignalError> {
        let len = self.0.chars().count();
        if len > max {
            return Err(SignalError::NameTooLong { len, max });
        }
        Ok(())
    }
}

impl TryFrom<String> for ParticipantName {
    type Error = SignalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for ParticipantName {
    type Error = SignalError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ParticipantName> for String {
    fn from(name: ParticipantName) -> Self {
        name.0
    }
}

impl Borrow<str> for ParticipantName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ParticipantName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ParticipantName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ParticipantName({})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_name_rejected() {
        assert!(ParticipantName::new("").is_err());
        assert!(ParticipantName::try_from(String::new()).is_err());
    }

    #[test]
    fn names_are_opaque() {
        // Whitespace and punctuation pass through untouched
        let name = ParticipantName::new(" agent 1/α ").unwrap();
        assert_eq!(name.as_str(), " agent 1/α ");
        assert_eq!(name.to_string(), " agent 1/α ");
    }

    #[test]
    fn check_len_counts_chars_not_bytes() {
        let name = ParticipantName::new("日本語").unwrap();
        assert!(name.check_len(3).is_ok());
        assert!(matches!(
            name.check_len(2),
            Err(SignalError::NameTooLong { len: 3, max: 2 })
        ));
    }

    #[test]
    fn deserialize_rejects_empty() {
        let ok: ParticipantName = serde_json::from_str("\"customer1\"").unwrap();
        assert_eq!(ok.as_str(), "customer1");

        let err = serde_json::from_str::<ParticipantName>("\"\"");
        assert!(err.is_err());
    }

    #[test]
    fn borrow_allows_str_lookup() {
        let mut map = std::collections::HashMap::new();
        map.insert(ParticipantName::new("agent1").unwrap(), 1);
        assert_eq!(map.get("agent1"), Some(&1));
    }
}
