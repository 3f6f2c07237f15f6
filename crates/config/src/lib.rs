// Configuration loading

pub mod catalog;
pub mod cell;
pub mod cost_layout;
pub mod document_layout;
pub mod error;
pub mod settings;

pub use catalog::TopicPrice;
pub use cell::CellRef;
pub use cost_layout::{CellBinding, CostField, CostLayout, ThemeBlock, Transform};
pub use document_layout::{AnchorSet, DocumentLayout, SectionCondition, SectionMarker};
pub use error::ConfigError;
pub use settings::{ExportSettings, TemplatePaths};
