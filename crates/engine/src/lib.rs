//! Derivation engine for education-intervention proposals.
//!
//! Pure crate: receives raw questionnaire answers, validates them into an
//! immutable [`QuestionnaireSnapshot`], and derives planning quantities.
//! No template knowledge, no file IO.

pub mod assessments;
pub mod derive;
pub mod engine;
pub mod error;
pub mod model;
pub mod snapshot;

pub use derive::GroupCount;
pub use engine::{derive, DerivedAggregates, ProposalSummary, ResolvedPopulation, ResolvedSite};
pub use error::PlanError;
pub use model::{same_label, Component, GradeBand, Modality, Strategy};
pub use snapshot::{GradePopulation, Logistics, QuestionnaireSnapshot, RawAnswers, Site};
