//! Anchors and section markers of the narrative proposal template.

use serde::{Deserialize, Serialize};

use formulia_engine::{same_label, Component, QuestionnaireSnapshot, Strategy};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DocumentLayout {
    pub anchors: AnchorSet,
    /// Paragraphs containing any of these are template leftovers and dropped.
    pub stale_lines: Vec<String>,
    /// Paragraph style ids starting with one of these are headings.
    pub heading_styles: Vec<String>,
    /// Keep state before the first marker heading.
    pub initial_keep: bool,
    pub sections: Vec<SectionMarker>,
    /// Style id for appended headings.
    pub appendix_heading_style: String,
    pub bullet_style: String,
    pub table_style: Option<String>,
}

/// Literal phrases authored into the template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnchorSet {
    pub organization: String,
    pub municipality: String,
    pub site_count: String,
    pub site_names: String,
}

/// A heading that toggles the keep state when found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SectionMarker {
    pub heading: String,
    pub when: SectionCondition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionCondition {
    Always,
    Never,
    Strategy(Strategy),
    Component(Component),
}

impl SectionCondition {
    pub fn holds(self, snapshot: &QuestionnaireSnapshot) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Strategy(s) => snapshot.has_strategy(s),
            Self::Component(c) => snapshot.has_component(c),
        }
    }
}

impl Default for DocumentLayout {
    fn default() -> Self {
        let marker = |heading: &str, when| SectionMarker {
            heading: heading.to_string(),
            when,
        };
        Self {
            anchors: AnchorSet {
                organization: "[NOMBRE DE LA ORGANIZACIÓN]".to_string(),
                municipality: "[MUNICIPIO]".to_string(),
                site_count: "[N] sedes educativas".to_string(),
                site_names: "Sede 1, Sede 2 y Sede 3".to_string(),
            },
            stale_lines: vec![
                "Total de estudiantes: [N]".to_string(),
                "Total de docentes: [N]".to_string(),
            ],
            heading_styles: vec!["Heading".to_string(), "Ttulo".to_string(), "Titulo".to_string()],
            initial_keep: true,
            sections: vec![
                marker("Componente de Formación", SectionCondition::Component(Component::Training)),
                marker(
                    "Componente de Monitoreo y Evaluación",
                    SectionCondition::Component(Component::MonitoringEvaluation),
                ),
                marker("Componente de Materiales", SectionCondition::Component(Component::Materials)),
                marker("Componente de Operación", SectionCondition::Component(Component::Operations)),
                marker("Estrategia de Transición", SectionCondition::Strategy(Strategy::Transition)),
                marker("Estrategia Primero", SectionCondition::Strategy(Strategy::FirstGrade)),
                marker("Estrategia de Remediación", SectionCondition::Strategy(Strategy::Remediation)),
                marker("Cronograma", SectionCondition::Always),
            ],
            appendix_heading_style: "Heading2".to_string(),
            bullet_style: "ListBullet".to_string(),
            table_style: Some("TableGrid".to_string()),
        }
    }
}

impl DocumentLayout {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let a = &self.anchors;
        for (name, value) in [
            ("organization", &a.organization),
            ("municipality", &a.municipality),
            ("site_count", &a.site_count),
            ("site_names", &a.site_names),
        ] {
            if value.is_empty() {
                return Err(ConfigError::Validation(format!("anchors.{name} must not be empty")));
            }
        }
        if self.stale_lines.iter().any(|s| s.is_empty()) {
            return Err(ConfigError::Validation("stale_lines entries must not be empty".into()));
        }
        if self.heading_styles.is_empty() {
            return Err(ConfigError::Validation("heading_styles must not be empty".into()));
        }
        for marker in &self.sections {
            if marker.heading.trim().is_empty() {
                return Err(ConfigError::Validation("section heading must not be empty".into()));
            }
        }
        if self.bullet_style.is_empty() || self.appendix_heading_style.is_empty() {
            return Err(ConfigError::Validation("paragraph style ids must not be empty".into()));
        }
        Ok(())
    }

    /// Whether a paragraph style id marks a heading.
    pub fn is_heading_style(&self, style_id: &str) -> bool {
        self.heading_styles.iter().any(|p| style_id.starts_with(p.as_str()))
    }

    /// The marker for a heading's text, compared trimmed and case-insensitively.
    pub fn marker_for(&self, heading_text: &str) -> Option<&SectionMarker> {
        self.sections.iter().find(|m| same_label(&m.heading, heading_text))
    }
}
