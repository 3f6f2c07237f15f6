// Template binding: xlsx cost structure, docx narrative proposal

pub mod anchors;
pub mod cost_sheet;
pub mod docx;
pub mod error;
pub mod export;
pub mod package;
pub mod proposal;
pub mod sheet_patch;

pub use anchors::{LiteralAnchors, Substitution, SubstitutionStrategy};
pub use cost_sheet::{bind_cost_template, CostExport, ThemeOutcome};
pub use error::{ExportError, ExportWarning};
pub use export::{export_cost_structure, export_cost_structure_bytes, export_proposal, export_proposal_bytes};
pub use proposal::{compose_proposal, ComposeReport, ProposalExport};
