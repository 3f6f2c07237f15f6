//! Pure planning rules. Every function here is total over validated input
//! and fails fast with [`PlanError::InvalidInput`] on a precondition
//! violation instead of clamping.

use std::collections::BTreeSet;
use std::num::NonZeroU64;

use serde::Serialize;

use crate::error::PlanError;
use crate::model::{GradeBand, Strategy};
use crate::snapshot::Site;

/// Students one teacher is assumed to cover when the count is unknown.
pub const STUDENTS_PER_TEACHER: u64 = 25;

/// Teachers per training group.
pub const GROUP_CAPACITY: u64 = 40;

/// Snack overhead for facilitators and spares: 1.2, kept as the exact
/// ratio 6/5 so outputs never depend on float representation.
pub const SNACK_OVERHEAD: (u64, u64) = (6, 5);

// ---------------------------------------------------------------------------
// Rounding
// ---------------------------------------------------------------------------

/// `num / den` rounded to nearest, ties to even. Used for teacher estimation.
pub fn round_half_even(num: u128, den: u128) -> u128 {
    debug_assert!(den > 0);
    let q = num / den;
    let r = num % den;
    match (2 * r).cmp(&den) {
        std::cmp::Ordering::Less => q,
        std::cmp::Ordering::Greater => q + 1,
        std::cmp::Ordering::Equal => q + (q & 1),
    }
}

/// `num / den` rounded to nearest, ties away from zero.
pub fn round_half_up(num: u128, den: u128) -> u128 {
    debug_assert!(den > 0);
    (2 * num + den) / (2 * den)
}

// ---------------------------------------------------------------------------
// Teachers + population
// ---------------------------------------------------------------------------

/// Reported teachers win whenever nonzero; otherwise estimate one teacher per
/// 25 students (round half to even).
pub fn estimate_teachers(students: u32, reported_teachers: u32) -> u32 {
    if reported_teachers > 0 {
        return reported_teachers;
    }
    if students == 0 {
        return 0;
    }
    // students / 25 never exceeds u32
    round_half_even(students as u128, STUDENTS_PER_TEACHER as u128) as u32
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PopulationTotals {
    pub students: u64,
    pub teachers: u64,
}

/// Sum students and (resolved) teachers over every site and every recorded
/// grade band. No grade filtering.
pub fn aggregate_population(sites: &[Site]) -> PopulationTotals {
    let mut totals = PopulationTotals::default();
    for site in sites {
        for pop in site.population.values() {
            totals.students += pop.students as u64;
            totals.teachers += estimate_teachers(pop.students, pop.teachers) as u64;
        }
    }
    totals
}

/// Union of the selected strategies' grade bands.
pub fn eligible_grade_bands(strategies: &[Strategy]) -> BTreeSet<GradeBand> {
    strategies
        .iter()
        .flat_map(|s| s.grade_bands().iter().copied())
        .collect()
}

/// Whether population should be recorded for `band`.
pub fn grade_in_scope(band: GradeBand, eligible: &BTreeSet<GradeBand>, include_all: bool) -> bool {
    include_all || eligible.contains(&band)
}

// ---------------------------------------------------------------------------
// Groups
// ---------------------------------------------------------------------------

/// Number of training groups. `NoneNeeded` is kept apart from a real count
/// so a cost template that assumes at least one group never receives 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "groups", rename_all = "snake_case")]
pub enum GroupCount {
    NoneNeeded,
    Groups(NonZeroU64),
}

impl GroupCount {
    pub fn groups(self) -> Option<NonZeroU64> {
        match self {
            Self::NoneNeeded => None,
            Self::Groups(n) => Some(n),
        }
    }

    pub fn is_none_needed(self) -> bool {
        matches!(self, Self::NoneNeeded)
    }
}

impl std::fmt::Display for GroupCount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoneNeeded => write!(f, "no groups needed"),
            Self::Groups(n) => write!(f, "{n} group(s)"),
        }
    }
}

/// `ceil(total_teachers / 40)`.
pub fn group_count(total_teachers: u64) -> GroupCount {
    // capacity constant is nonzero
    group_count_with_capacity(total_teachers, GROUP_CAPACITY).unwrap_or(GroupCount::NoneNeeded)
}

pub fn group_count_with_capacity(total_teachers: u64, capacity: u64) -> Result<GroupCount, PlanError> {
    if capacity == 0 {
        return Err(PlanError::invalid("group_capacity", "must be at least 1"));
    }
    Ok(match NonZeroU64::new(total_teachers.div_ceil(capacity)) {
        Some(n) => GroupCount::Groups(n),
        None => GroupCount::NoneNeeded,
    })
}

// ---------------------------------------------------------------------------
// Remediation + snacks
// ---------------------------------------------------------------------------

/// Students in grades 2°–5° across all sites, scaled by `percentage / 100`
/// and rounded half up.
pub fn remediation_estimate(sites: &[Site], percentage: i64) -> Result<u64, PlanError> {
    if !(0..=100).contains(&percentage) {
        return Err(PlanError::invalid(
            "remediation_percent",
            format!("must be within 0..=100, got {percentage}"),
        ));
    }
    let remediation_bands = Strategy::Remediation.grade_bands();
    let eligible: u64 = sites
        .iter()
        .flat_map(|site| site.population.iter())
        .filter(|(band, _)| remediation_bands.contains(band))
        .map(|(_, pop)| pop.students as u64)
        .sum();
    Ok(round_half_up(eligible as u128 * percentage as u128, 100) as u64)
}

/// `round(total_teachers * 1.2 * sessions)`, half up.
pub fn snack_units(total_teachers: u64, sessions: i64) -> Result<u64, PlanError> {
    if sessions < 1 {
        return Err(PlanError::invalid(
            "sessions",
            format!("must be at least 1, got {sessions}"),
        ));
    }
    let (num, den) = SNACK_OVERHEAD;
    let scaled = total_teachers as u128 * sessions as u128 * num as u128;
    u64::try_from(round_half_up(scaled, den as u128))
        .map_err(|_| PlanError::invalid("sessions", "snack quantity overflows"))
}

/// AIU percentage as the fraction stored in the cost template.
pub fn aiu_fraction(percentage: i64) -> Result<f64, PlanError> {
    if !(0..=100).contains(&percentage) {
        return Err(PlanError::invalid(
            "aiu_percent",
            format!("must be within 0..=100, got {percentage}"),
        ));
    }
    Ok(percentage as f64 / 100.0)
}
