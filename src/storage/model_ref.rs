//! Model references: a name plus an optional version or stage selector

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Reference to one version of a model.
///
/// Examples:
///   `ModelRef::new("churn")`                         -> latest version of "churn"
///   `ModelRef::new("churn").with_stage("production")` -> version staged as production
///   `ModelRef::new("churn").with_version("20240101120000")`
///
/// When both are set the version wins.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelRef {
    pub name: String,
    pub version: Option<String>,
    pub stage: Option<String>,
}

impl ModelRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            stage: None,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_stage(mut self, stage: impl Into<String>) -> Self {
        self.stage = Some(stage.into());
        self
    }

    /// Build from wire fields where an empty string means "absent".
    pub fn from_parts(name: &str, version: &str, stage: &str) -> Self {
        Self {
            name: name.to_string(),
            version: non_empty(version),
            stage: non_empty(stage),
        }
    }
}

pub(crate) fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

impl std::fmt::Display for ModelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.version, &self.stage) {
            (Some(v), _) => write!(f, "{}@{}", self.name, v),
            (None, Some(s)) => write!(f, "{}#{}", self.name, s),
            (None, None) => write!(f, "{}", self.name),
        }
    }
}

/// Validate a model name before it is used as part of an artifact file name.
pub fn validate_model_name(name: &str) -> Result<()> {
    const MAX_LEN: usize = 64;

    if name.is_empty() || name.chars().count() > MAX_LEN {
        return Err(Error::invalid_argument(format!(
            "Model name must be 1-{} characters",
            MAX_LEN
        )));
    }

    if name.chars().any(|c| {
        c.is_control()
            || matches!(
                c,
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '~' | '^' | '[' | ']' | ' '
            )
    }) {
        return Err(Error::invalid_argument(
            "Model name contains invalid characters (path separators, spaces, control or shell characters)",
        ));
    }

    if name.contains("..") {
        return Err(Error::invalid_argument("Model name cannot contain consecutive dots (..)"));
    }

    if name.starts_with('.') || name.starts_with('-') {
        return Err(Error::invalid_argument("Model name cannot start with '.' or '-'"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts_treats_empty_as_absent() {
        let r = ModelRef::from_parts("m1", "", "production");
        assert_eq!(r.version, None);
        assert_eq!(r.stage.as_deref(), Some("production"));
        assert_eq!(r.to_string(), "m1#production");

        let r = ModelRef::from_parts("m1", "20240101120000", "staging");
        assert_eq!(r.to_string(), "m1@20240101120000");
    }

    #[test]
    fn test_validate_model_name() {
        assert!(validate_model_name("m1").is_ok());
        assert!(validate_model_name("churn-model_v1.2").is_ok());
        assert!(validate_model_name("Qwen3-0.6B").is_ok());

        assert!(validate_model_name("").is_err());
        assert!(validate_model_name(&"a".repeat(65)).is_err());
        assert!(validate_model_name("../etc/passwd").is_err());
        assert!(validate_model_name("a/b").is_err());
        assert!(validate_model_name("a\\b").is_err());
        assert!(validate_model_name("model..name").is_err());
        assert!(validate_model_name(".hidden").is_err());
        assert!(validate_model_name("with space").is_err());
        assert!(validate_model_name("tab\tname").is_err());
    }
}
