use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum PlanError {
    /// Out-of-range numeric precondition or inconsistent answer.
    InvalidInput { field: String, reason: String },
    /// Raw answers could not be deserialized.
    Parse(String),
}

impl PlanError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// The field a precondition failed on, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::InvalidInput { field, .. } => Some(field),
            Self::Parse(_) => None,
        }
    }
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput { field, reason } => write!(f, "invalid input '{field}': {reason}"),
            Self::Parse(msg) => write!(f, "answers parse error: {msg}"),
        }
    }
}

impl std::error::Error for PlanError {}
