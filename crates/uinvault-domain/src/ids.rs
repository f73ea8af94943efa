use serde::{Deserialize, Serialize};

/// A UIN value as persisted: up to 32 characters, non-empty.
///
/// This wraps the raw string so the rest of the system can rely on the
/// length invariant having already been checked at construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Uin(String);

/// Maximum length of a persisted UIN string (`uin_pool.uin` column width).
pub const UIN_MAX_LEN: usize = 32;

impl Uin {
    pub fn new(s: impl Into<String>) -> Result<Self, crate::error::DomainError> {
        let s = s.into();
        if s.is_empty() {
            return Err(crate::error::DomainError::InvalidUin("empty".into()));
        }
        if s.chars().count() > UIN_MAX_LEN {
            return Err(crate::error::DomainError::InvalidUin(format!(
                "'{s}' exceeds {UIN_MAX_LEN} characters"
            )));
        }
        Ok(Uin(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for Uin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A scope is typically a sector name or the literal `"foundational"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope(pub String);

impl Scope {
    pub fn new(s: impl Into<String>) -> Self {
        Scope(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Normalized form used for secret lookups: trimmed and lower-cased.
    pub fn normalized(&self) -> String {
        self.0.trim().to_lowercase()
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uin_rejects_empty() {
        assert!(Uin::new("").is_err());
    }

    #[test]
    fn uin_rejects_too_long() {
        let s = "A".repeat(UIN_MAX_LEN + 1);
        assert!(Uin::new(s).is_err());
    }

    #[test]
    fn uin_accepts_boundary_length() {
        let s = "A".repeat(UIN_MAX_LEN);
        assert!(Uin::new(s).is_ok());
    }

    #[test]
    fn scope_normalizes() {
        let s = Scope::new("  Health  ");
        assert_eq!(s.normalized(), "health");
    }
}
