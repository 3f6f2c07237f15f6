use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Component + Modality
// ---------------------------------------------------------------------------

/// Proposal component. Serialized with the Spanish labels the questionnaire
/// collects; snake_case English names are accepted as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Component {
    #[serde(rename = "Formación", alias = "training")]
    Training,
    #[serde(rename = "Monitoreo y Evaluación", alias = "monitoring_evaluation")]
    MonitoringEvaluation,
    #[serde(rename = "Materiales", alias = "materials")]
    Materials,
    #[serde(rename = "Operación", alias = "operations")]
    Operations,
}

impl Component {
    pub const ALL: [Component; 4] = [
        Self::Training,
        Self::MonitoringEvaluation,
        Self::Materials,
        Self::Operations,
    ];

    /// Training and Operations are delivered, so they carry a modality.
    pub fn requires_modality(self) -> bool {
        matches!(self, Self::Training | Self::Operations)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Training => "Formación",
            Self::MonitoringEvaluation => "Monitoreo y Evaluación",
            Self::Materials => "Materiales",
            Self::Operations => "Operación",
        }
    }
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Modality {
    #[serde(rename = "Presencial", alias = "in_person")]
    InPerson,
    #[serde(rename = "Virtual", alias = "virtual")]
    Virtual,
    #[serde(rename = "Híbrida", alias = "hybrid")]
    Hybrid,
}

impl Modality {
    pub fn label(self) -> &'static str {
        match self {
            Self::InPerson => "Presencial",
            Self::Virtual => "Virtual",
            Self::Hybrid => "Híbrida",
        }
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Grade bands + Strategy
// ---------------------------------------------------------------------------

/// One of the six school grade levels tracked per site (0° = transition).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GradeBand {
    #[serde(rename = "0°")]
    G0,
    #[serde(rename = "1°")]
    G1,
    #[serde(rename = "2°")]
    G2,
    #[serde(rename = "3°")]
    G3,
    #[serde(rename = "4°")]
    G4,
    #[serde(rename = "5°")]
    G5,
}

impl GradeBand {
    pub const ALL: [GradeBand; 6] = [Self::G0, Self::G1, Self::G2, Self::G3, Self::G4, Self::G5];

    pub fn label(self) -> &'static str {
        match self {
            Self::G0 => "0°",
            Self::G1 => "1°",
            Self::G2 => "2°",
            Self::G3 => "3°",
            Self::G4 => "4°",
            Self::G5 => "5°",
        }
    }
}

impl std::fmt::Display for GradeBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Pedagogical program. Each strategy owns a fixed, non-overlapping set of
/// grade bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Strategy {
    #[serde(rename = "Transición", alias = "transition")]
    Transition,
    #[serde(rename = "Primero", alias = "first_grade")]
    FirstGrade,
    #[serde(rename = "Remediación", alias = "remediation")]
    Remediation,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Self::Transition, Self::FirstGrade, Self::Remediation];

    pub fn grade_bands(self) -> &'static [GradeBand] {
        match self {
            Self::Transition => &[GradeBand::G0],
            Self::FirstGrade => &[GradeBand::G1],
            Self::Remediation => &[GradeBand::G2, GradeBand::G3, GradeBand::G4, GradeBand::G5],
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Transition => "Transición",
            Self::FirstGrade => "Primero",
            Self::Remediation => "Remediación",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Compare two free-text labels trimmed and case-insensitively. Labels are
/// Spanish, so case folding is Unicode-aware ("GESTIÓN" == "gestión").
pub fn same_label(a: &str, b: &str) -> bool {
    let fold = |s: &str| s.trim().chars().flat_map(char::to_lowercase).collect::<Vec<_>>();
    fold(a) == fold(b)
}
