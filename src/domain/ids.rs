//! Domain identifier types with validation
//!
//! This module provides newtype wrappers for the identifiers that cross
//! component boundaries: the subject primary-key value and the project
//! namespace name. Each type ensures type safety and validates its format.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Subject identifier newtype wrapper
///
/// Represents the value of a project's primary-key field for one subject,
/// e.g. a study id such as `"S1"` or `"1001-A"`. REDCap treats these as
/// opaque strings and so does capmirror.
///
/// # Examples
///
/// ```
/// use capmirror::domain::ids::SubjectId;
/// use std::str::FromStr;
///
/// let subject = SubjectId::from_str("1001-A").unwrap();
/// assert_eq!(subject.as_str(), "1001-A");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubjectId(String);

impl SubjectId {
    /// Creates a new SubjectId from a string
    ///
    /// # Arguments
    ///
    /// * `id` - The subject's primary-key value
    ///
    /// # Returns
    ///
    /// Returns `Ok(SubjectId)` if the ID is non-empty, `Err` otherwise
    pub fn new(id: impl Into<String>) -> Result<Self, String> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err("Subject ID cannot be empty".to_string());
        }
        Ok(Self(id))
    }

    /// Returns the subject ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SubjectId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for SubjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Project namespace name newtype wrapper
///
/// Names the PostgreSQL schema that holds one project's tables, so the
/// format is restricted to what can be used as an unquoted identifier:
/// a lowercase letter followed by lowercase letters, digits, or
/// underscores, at most 63 bytes.
///
/// # Examples
///
/// ```
/// use capmirror::domain::ids::ProjectName;
/// use std::str::FromStr;
///
/// let name = ProjectName::from_str("cardiology_registry").unwrap();
/// assert_eq!(name.as_str(), "cardiology_registry");
/// assert!(ProjectName::from_str("1bad name").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectName(String);

impl ProjectName {
    /// Creates a new ProjectName from a string
    ///
    /// # Arguments
    ///
    /// * `name` - The project namespace name
    ///
    /// # Returns
    ///
    /// Returns `Ok(ProjectName)` if the name is a valid namespace slug,
    /// `Err` otherwise
    pub fn new(name: impl Into<String>) -> Result<Self, String> {
        let name = name.into();
        if name.is_empty() {
            return Err("Project name cannot be empty".to_string());
        }
        if name.len() > 63 {
            return Err(format!(
                "Project name exceeds 63 bytes: '{}' ({} bytes)",
                name,
                name.len()
            ));
        }
        let mut chars = name.chars();
        let first_ok = chars
            .next()
            .map(|c| c.is_ascii_lowercase())
            .unwrap_or(false);
        let rest_ok = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if !first_ok || !rest_ok {
            return Err(format!(
                "Project name must match [a-z][a-z0-9_]*, got: '{name}'"
            ));
        }
        Ok(Self(name))
    }

    /// Returns the project name as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes self and returns the inner String
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ProjectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProjectName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for ProjectName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_id_creation() {
        let id = SubjectId::new("1001-A").unwrap();
        assert_eq!(id.as_str(), "1001-A");
    }

    #[test]
    fn test_subject_id_empty_fails() {
        assert!(SubjectId::new("").is_err());
        assert!(SubjectId::new("   ").is_err());
    }

    #[test]
    fn test_subject_id_display() {
        let id = SubjectId::new("S1").unwrap();
        assert_eq!(format!("{}", id), "S1");
    }

    #[test]
    fn test_subject_id_from_str() {
        let id: SubjectId = "S1".parse().unwrap();
        assert_eq!(id.as_str(), "S1");
    }

    #[test]
    fn test_project_name_creation() {
        let name = ProjectName::new("cardiology_registry").unwrap();
        assert_eq!(name.as_str(), "cardiology_registry");
    }

    #[test]
    fn test_project_name_accepts_digits_and_underscores() {
        assert!(ProjectName::new("trial_2024_v2").is_ok());
    }

    #[test]
    fn test_project_name_rejects_bad_formats() {
        assert!(ProjectName::new("").is_err());
        assert!(ProjectName::new("1leading_digit").is_err());
        assert!(ProjectName::new("Has-Caps").is_err());
        assert!(ProjectName::new("white space").is_err());
        assert!(ProjectName::new("_leading_underscore").is_err());
    }

    #[test]
    fn test_project_name_rejects_overlong() {
        let long = "a".repeat(64);
        assert!(ProjectName::new(long).is_err());
        let exactly = "a".repeat(63);
        assert!(ProjectName::new(exactly).is_ok());
    }

    #[test]
    fn test_project_name_serialization() {
        let name = ProjectName::new("demo_project").unwrap();
        let json = serde_json::to_string(&name).unwrap();
        let deserialized: ProjectName = serde_json::from_str(&json).unwrap();
        assert_eq!(name, deserialized);
    }
}
