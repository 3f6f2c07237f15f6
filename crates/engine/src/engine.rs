use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::assessments::available_assessments;
use crate::derive::{
    aggregate_population, aiu_fraction, eligible_grade_bands, estimate_teachers, group_count,
    remediation_estimate, snack_units, GroupCount,
};
use crate::error::PlanError;
use crate::model::{Component, GradeBand, Modality, Strategy};
use crate::snapshot::{QuestionnaireSnapshot, Site};

/// A grade record after teacher resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResolvedPopulation {
    pub students: u32,
    pub teachers: u32,
    /// Teachers were derived from the student count, not reported.
    pub teachers_estimated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedSite {
    pub name: String,
    pub population: BTreeMap<GradeBand, ResolvedPopulation>,
}

/// Everything the binders consume. Rebuilt from the snapshot on every export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedAggregates {
    pub sites: Vec<ResolvedSite>,
    pub total_students: u64,
    pub total_teachers: u64,
    pub eligible_grades: BTreeSet<GradeBand>,
    pub groups: GroupCount,
    /// Present only when a remediation percentage was answered.
    pub remediation_estimate: Option<u64>,
    /// Present only when logistics were answered.
    pub snack_units: Option<u64>,
    /// Present only when the AIU percentage was answered.
    pub aiu_fraction: Option<f64>,
    pub assessments: Vec<&'static str>,
}

/// Proposal overview echoed next to the aggregates.
#[derive(Debug, Clone, Serialize)]
pub struct ProposalSummary<'a> {
    pub organization: &'a str,
    pub municipality: &'a str,
    pub components: &'a [Component],
    pub modalities: &'a BTreeMap<Component, Modality>,
    pub strategies: &'a [Strategy],
    pub sites: Vec<&'a str>,
}

impl QuestionnaireSnapshot {
    pub fn summary(&self) -> ProposalSummary<'_> {
        ProposalSummary {
            organization: &self.organization,
            municipality: &self.municipality,
            components: &self.components,
            modalities: &self.modalities,
            strategies: &self.strategies,
            sites: self.site_names(),
        }
    }
}

/// Derive all planning quantities. Either every aggregate is produced or
/// an error is returned; the snapshot is only borrowed.
pub fn derive(snapshot: &QuestionnaireSnapshot) -> Result<DerivedAggregates, PlanError> {
    let totals = aggregate_population(&snapshot.sites);
    let groups = group_count(totals.teachers);
    let remediation = match snapshot.remediation_percent {
        Some(p) => Some(remediation_estimate(&snapshot.sites, p as i64)?),
        None => None,
    };
    let snacks = match &snapshot.logistics {
        Some(l) => Some(snack_units(totals.teachers, l.sessions as i64)?),
        None => None,
    };
    let aiu = match snapshot.aiu_percent {
        Some(p) => Some(aiu_fraction(p as i64)?),
        None => None,
    };

    log::debug!(
        "derived: students={} teachers={} groups={} snacks={:?}",
        totals.students,
        totals.teachers,
        groups,
        snacks
    );

    Ok(DerivedAggregates {
        sites: snapshot.sites.iter().map(resolve_site).collect(),
        total_students: totals.students,
        total_teachers: totals.teachers,
        eligible_grades: eligible_grade_bands(&snapshot.strategies),
        groups,
        remediation_estimate: remediation,
        snack_units: snacks,
        aiu_fraction: aiu,
        assessments: available_assessments(&snapshot.strategies),
    })
}

fn resolve_site(site: &Site) -> ResolvedSite {
    let population = site
        .population
        .iter()
        .map(|(band, pop)| {
            let teachers = estimate_teachers(pop.students, pop.teachers);
            let resolved = ResolvedPopulation {
                students: pop.students,
                teachers,
                teachers_estimated: pop.teachers == 0 && teachers > 0,
            };
            (*band, resolved)
        })
        .collect();
    ResolvedSite {
        name: site.name.clone(),
        population,
    }
}
