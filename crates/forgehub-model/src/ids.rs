use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError(pub String);

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ValidationError {}

pub const USER_ID_MAX_LEN: usize = 64;
pub const PROJECT_ID_MAX_LEN: usize = 64;

pub fn parse_user_id(input: &str) -> Result<UserId, ValidationError> {
    UserId::parse(input)
}

pub fn parse_project_id(input: &str) -> Result<ProjectId, ValidationError> {
    ProjectId::parse(input)
}

/// A user handle: lowercase, `[a-z0-9_-]`, never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
#[non_exhaustive]
pub struct UserId(String);

impl UserId {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(ValidationError("user id must not be empty".to_string()));
        }
        if s.len() > USER_ID_MAX_LEN {
            return Err(ValidationError(format!(
                "user id exceeds max length {USER_ID_MAX_LEN}"
            )));
        }
        if !s
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
        {
            return Err(ValidationError(
                "user id must match [a-z0-9_-]+".to_string(),
            ));
        }
        Ok(Self(s.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque project identifier. Freshly created projects get a uuid v4;
/// any non-empty `[A-Za-z0-9-]` string parses so externally minted ids
/// survive round-trips.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
#[non_exhaustive]
pub struct ProjectId(String);

impl ProjectId {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(ValidationError("project id must not be empty".to_string()));
        }
        if s.len() > PROJECT_ID_MAX_LEN {
            return Err(ValidationError(format!(
                "project id exceeds max length {PROJECT_ID_MAX_LEN}"
            )));
        }
        if !s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(ValidationError(
                "project id must match [A-Za-z0-9-]+".to_string(),
            ));
        }
        Ok(Self(s.to_string()))
    }

    #[must_use]
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Display for ProjectId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_accepts_handles() {
        let u = UserId::parse(" alice-01 ").expect("valid handle");
        assert_eq!(u.as_str(), "alice-01");
    }

    #[test]
    fn user_id_rejects_uppercase_and_empty() {
        assert!(UserId::parse("Alice").is_err());
        assert!(UserId::parse("   ").is_err());
        assert!(UserId::parse(&"a".repeat(USER_ID_MAX_LEN + 1)).is_err());
    }

    #[test]
    fn project_id_random_parses_back() {
        let id = ProjectId::random();
        let reparsed = ProjectId::parse(id.as_str()).expect("uuid form is valid");
        assert_eq!(id, reparsed);
    }

    #[test]
    fn project_id_rejects_path_characters() {
        assert!(ProjectId::parse("../etc").is_err());
        assert!(ProjectId::parse("a/b").is_err());
    }
}
