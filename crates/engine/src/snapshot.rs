//! Questionnaire answers: the raw shape the collection layer stores, and the
//! validated immutable snapshot the engine consumes.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::derive::{eligible_grade_bands, grade_in_scope};
use crate::error::PlanError;
use crate::model::{same_label, Component, GradeBand, Modality, Strategy};

// ---------------------------------------------------------------------------
// Raw answers
// ---------------------------------------------------------------------------

/// Answers as collected, before any validation. Counts are signed so a
/// negative entry is reported instead of failing deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawAnswers {
    pub components: Vec<Component>,
    pub modalities: BTreeMap<Component, Modality>,
    pub organization: String,
    pub municipality: String,
    pub strategies: Vec<Strategy>,
    /// Record every grade band at every site, whatever the strategies.
    pub include_all_grades: bool,
    pub sites: Vec<RawSite>,
    /// Cost-template themes the proposal includes.
    pub topics: Vec<String>,
    pub materials: Vec<String>,
    /// `None` until the logistics section is answered.
    pub logistics: Option<RawLogistics>,
    pub aiu_percent: Option<i64>,
    pub remediation_percent: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSite {
    pub name: String,
    #[serde(default)]
    pub population: BTreeMap<GradeBand, RawPopulation>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawPopulation {
    pub students: i64,
    /// 0 when the operator does not know the number.
    pub teachers: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RawLogistics {
    pub transport_cost: f64,
    pub hotel_rate: f64,
    pub trips: i64,
    pub travel_hours: f64,
    pub snack_unit_price: f64,
    pub sessions: i64,
}

impl Default for RawLogistics {
    fn default() -> Self {
        Self {
            transport_cost: 0.0,
            hotel_rate: 0.0,
            trips: 0,
            travel_hours: 0.0,
            snack_unit_price: 0.0,
            sessions: 1,
        }
    }
}

impl RawAnswers {
    pub fn from_json(input: &str) -> Result<Self, PlanError> {
        serde_json::from_str(input).map_err(|e| PlanError::Parse(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradePopulation {
    pub students: u32,
    pub teachers: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub name: String,
    pub population: BTreeMap<GradeBand, GradePopulation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Logistics {
    pub transport_cost: f64,
    pub hotel_rate: f64,
    pub trips: u32,
    pub travel_hours: f64,
    pub snack_unit_price: f64,
    pub sessions: u32,
}

/// Immutable, validated view of one export's answers. Components and
/// strategies are deduplicated and kept in canonical order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionnaireSnapshot {
    pub components: Vec<Component>,
    pub modalities: BTreeMap<Component, Modality>,
    pub organization: String,
    pub municipality: String,
    pub strategies: Vec<Strategy>,
    pub include_all_grades: bool,
    pub sites: Vec<Site>,
    pub topics: Vec<String>,
    pub materials: Vec<String>,
    pub logistics: Option<Logistics>,
    pub aiu_percent: Option<u8>,
    pub remediation_percent: Option<u8>,
}

impl QuestionnaireSnapshot {
    pub fn from_json(input: &str) -> Result<Self, PlanError> {
        Self::from_answers(RawAnswers::from_json(input)?)
    }

    /// Validate raw answers. Rejects rather than clamps.
    pub fn from_answers(raw: RawAnswers) -> Result<Self, PlanError> {
        let mut components = raw.components;
        components.sort();
        components.dedup();

        for component in &components {
            if component.requires_modality() && !raw.modalities.contains_key(component) {
                return Err(PlanError::invalid(
                    "modalities",
                    format!("component '{component}' requires a modality"),
                ));
            }
        }
        for component in raw.modalities.keys() {
            if !component.requires_modality() || !components.contains(component) {
                return Err(PlanError::invalid(
                    "modalities",
                    format!("modality given for '{component}', which does not take one"),
                ));
            }
        }

        let mut strategies = raw.strategies;
        strategies.sort();
        strategies.dedup();
        let eligible = eligible_grade_bands(&strategies);

        if raw.sites.is_empty() {
            return Err(PlanError::invalid("sites", "at least one site is required"));
        }
        let mut names = HashSet::new();
        let mut sites = Vec::with_capacity(raw.sites.len());
        for raw_site in raw.sites {
            let name = raw_site.name.trim().to_string();
            if name.is_empty() {
                return Err(PlanError::invalid("sites", "site name must not be empty"));
            }
            if !names.insert(name.clone()) {
                return Err(PlanError::invalid("sites", format!("duplicate site '{name}'")));
            }
            let mut population = BTreeMap::new();
            for (band, pop) in raw_site.population {
                if !grade_in_scope(band, &eligible, raw.include_all_grades) {
                    return Err(PlanError::invalid(
                        "population",
                        format!("site '{name}': grade {band} is not covered by the selected strategies"),
                    ));
                }
                let field = format!("population.{name}.{band}");
                population.insert(
                    band,
                    GradePopulation {
                        students: count(&format!("{field}.students"), pop.students)?,
                        teachers: count(&format!("{field}.teachers"), pop.teachers)?,
                    },
                );
            }
            sites.push(Site { name, population });
        }

        let mut topics: Vec<String> = Vec::with_capacity(raw.topics.len());
        for topic in raw.topics {
            let topic = topic.trim().to_string();
            if topic.is_empty() {
                return Err(PlanError::invalid("topics", "topic must not be empty"));
            }
            if topics.iter().any(|t| same_label(t, &topic)) {
                return Err(PlanError::invalid("topics", format!("duplicate topic '{topic}'")));
            }
            topics.push(topic);
        }

        let logistics = raw.logistics.map(validate_logistics).transpose()?;
        let aiu_percent = raw.aiu_percent.map(|p| percent("aiu_percent", p)).transpose()?;
        let remediation_percent = raw
            .remediation_percent
            .map(|p| percent("remediation_percent", p))
            .transpose()?;

        Ok(Self {
            components,
            modalities: raw.modalities,
            organization: raw.organization.trim().to_string(),
            municipality: raw.municipality.trim().to_string(),
            strategies,
            include_all_grades: raw.include_all_grades,
            sites,
            topics,
            materials: raw
                .materials
                .into_iter()
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect(),
            logistics,
            aiu_percent,
            remediation_percent,
        })
    }

    pub fn has_component(&self, component: Component) -> bool {
        self.components.contains(&component)
    }

    pub fn has_strategy(&self, strategy: Strategy) -> bool {
        self.strategies.contains(&strategy)
    }

    pub fn is_topic_selected(&self, label: &str) -> bool {
        self.topics.iter().any(|t| same_label(t, label))
    }

    pub fn site_names(&self) -> Vec<&str> {
        self.sites.iter().map(|s| s.name.as_str()).collect()
    }
}

fn validate_logistics(l: RawLogistics) -> Result<Logistics, PlanError> {
    if l.sessions < 1 {
        return Err(PlanError::invalid(
            "logistics.sessions",
            format!("must be at least 1, got {}", l.sessions),
        ));
    }
    Ok(Logistics {
        transport_cost: money("logistics.transport_cost", l.transport_cost)?,
        hotel_rate: money("logistics.hotel_rate", l.hotel_rate)?,
        trips: count("logistics.trips", l.trips)?,
        travel_hours: money("logistics.travel_hours", l.travel_hours)?,
        snack_unit_price: money("logistics.snack_unit_price", l.snack_unit_price)?,
        sessions: count("logistics.sessions", l.sessions)?,
    })
}

fn count(field: &str, value: i64) -> Result<u32, PlanError> {
    if value < 0 {
        return Err(PlanError::invalid(field, format!("must not be negative, got {value}")));
    }
    u32::try_from(value).map_err(|_| PlanError::invalid(field, format!("{value} is too large")))
}

fn money(field: &str, value: f64) -> Result<f64, PlanError> {
    if !value.is_finite() || value < 0.0 {
        return Err(PlanError::invalid(field, format!("must be a non-negative number, got {value}")));
    }
    Ok(value)
}

fn percent(field: &str, value: i64) -> Result<u8, PlanError> {
    if !(0..=100).contains(&value) {
        return Err(PlanError::invalid(field, format!("must be within 0..=100, got {value}")));
    }
    Ok(value as u8)
}
