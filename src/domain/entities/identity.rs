use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

const MAX_IDENTIFIER_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidIdentifier {
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("{0} exceeds 128 bytes")]
    TooLong(&'static str),
    #[error("{0} contains whitespace or control characters")]
    IllegalCharacter(&'static str),
}

fn validate(kind: &'static str, raw: &str) -> Result<(), InvalidIdentifier> {
    if raw.is_empty() {
        return Err(InvalidIdentifier::Empty(kind));
    }
    if raw.len() > MAX_IDENTIFIER_LEN {
        return Err(InvalidIdentifier::TooLong(kind));
    }
    if raw.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(InvalidIdentifier::IllegalCharacter(kind));
    }
    Ok(())
}

/// Identifier of an entity protected by a lock (a post id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceId(String);

impl ResourceId {
    pub fn parse(raw: &str) -> Result<Self, InvalidIdentifier> {
        validate("resource id", raw)?;
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identifier of the authenticated principal acting on a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PrincipalId(String);

impl PrincipalId {
    pub fn parse(raw: &str) -> Result<Self, InvalidIdentifier> {
        validate("principal id", raw)?;
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! string_newtype_conversions {
    ($ty:ident) => {
        impl TryFrom<String> for $ty {
            type Error = InvalidIdentifier;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                $ty::parse(&value)
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_newtype_conversions!(ResourceId);
string_newtype_conversions!(PrincipalId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_uuid_and_numeric_ids() {
        assert!(ResourceId::parse("42").is_ok());
        assert!(ResourceId::parse("6f1c1f8e-0d5b-4c7e-9a51-2f0b8b6f3c11").is_ok());
        assert!(PrincipalId::parse("user-7").is_ok());
    }

    #[test]
    fn test_rejects_empty() {
        assert_eq!(
            ResourceId::parse(""),
            Err(InvalidIdentifier::Empty("resource id"))
        );
        assert_eq!(
            PrincipalId::parse(""),
            Err(InvalidIdentifier::Empty("principal id"))
        );
    }

    #[test]
    fn test_rejects_whitespace_and_control_chars() {
        assert!(ResourceId::parse("a b").is_err());
        assert!(ResourceId::parse(" 1").is_err());
        assert!(PrincipalId::parse("x\n").is_err());
        assert!(PrincipalId::parse("x\u{0}").is_err());
    }

    #[test]
    fn test_rejects_overlong() {
        let long = "a".repeat(MAX_IDENTIFIER_LEN + 1);
        assert_eq!(
            ResourceId::parse(&long),
            Err(InvalidIdentifier::TooLong("resource id"))
        );
        assert!(ResourceId::parse(&"a".repeat(MAX_IDENTIFIER_LEN)).is_ok());
    }

    #[test]
    fn test_serde_validates() {
        let ok: ResourceId = serde_json::from_str("\"7\"").unwrap();
        assert_eq!(ok.as_str(), "7");
        assert!(serde_json::from_str::<PrincipalId>("\"\"").is_err());
        assert_eq!(serde_json::to_string(&ok).unwrap(), "\"7\"");
    }
}
