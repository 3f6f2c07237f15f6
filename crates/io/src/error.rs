use std::fmt;

use serde::Serialize;

use formulia_config::ConfigError;
use formulia_engine::PlanError;

#[derive(Debug)]
pub enum ExportError {
    /// Answers failed a precondition before derivation.
    Plan(PlanError),
    /// Settings or layout are unusable.
    Config(ConfigError),
    /// The template does not have the structure the layout expects.
    TemplateMismatch(String),
    /// A derived value the export needs is absent.
    MissingAggregate { step: &'static str, reason: String },
    /// Writing the output package failed.
    Io(String),
}

impl ExportError {
    pub fn mismatch(msg: impl Into<String>) -> Self {
        Self::TemplateMismatch(msg.into())
    }
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plan(e) => write!(f, "{e}"),
            Self::Config(e) => write!(f, "{e}"),
            Self::TemplateMismatch(msg) => write!(f, "template mismatch: {msg}"),
            Self::MissingAggregate { step, reason } => {
                write!(f, "missing aggregate from step '{step}': {reason}")
            }
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Plan(e) => Some(e),
            Self::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<PlanError> for ExportError {
    fn from(e: PlanError) -> Self {
        Self::Plan(e)
    }
}

impl From<ConfigError> for ExportError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// Non-fatal conditions surfaced to the operator alongside a finished export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExportWarning {
    /// A literal anchor was not present in the template; nothing substituted.
    AnchorNotFound { anchor: String },
    /// A selected topic has no catalog price; left out of the investment table.
    UnpricedTopic { topic: String },
    /// No teachers were recorded, so no investment table was produced.
    NoGroups,
}

impl fmt::Display for ExportWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AnchorNotFound { anchor } => write!(f, "anchor not found in template: '{anchor}'"),
            Self::UnpricedTopic { topic } => write!(f, "topic '{topic}' has no catalog price"),
            Self::NoGroups => write!(f, "no training groups needed; investment table omitted"),
        }
    }
}

pub(crate) fn xml_err(context: &str, e: impl fmt::Display) -> ExportError {
    ExportError::mismatch(format!("{context}: {e}"))
}

pub(crate) fn write_err(e: impl fmt::Display) -> ExportError {
    ExportError::Io(e.to_string())
}
