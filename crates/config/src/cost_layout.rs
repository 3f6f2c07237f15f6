//! Cell layout of the cost-structure template.
//!
//! The layout is a flat, versioned table: a block of theme rows plus a list
//! of single-cell bindings. Nothing is inferred from the template itself.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::cell::{column_index, CellRef};
use crate::error::ConfigError;

pub const COST_LAYOUT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CostLayout {
    pub version: u32,
    /// Worksheet holding every binding.
    pub sheet: String,
    pub themes: ThemeBlock,
    pub bindings: Vec<CellBinding>,
}

/// Contiguous rows, one pre-labeled theme each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThemeBlock {
    pub first_row: u32,
    pub last_row: u32,
    pub label_column: String,
    /// Pre-authored base hours; scaled by the group count.
    pub hours_column: String,
    pub travel_column: String,
    pub aiu_column: String,
}

impl ThemeBlock {
    pub fn rows(&self) -> std::ops::RangeInclusive<u32> {
        self.first_row..=self.last_row
    }

    /// Column indices (label, hours, travel, aiu), 1-based.
    pub fn columns(&self) -> Result<ThemeColumns, ConfigError> {
        let col = |name: &str, value: &str| {
            column_index(value).ok_or_else(|| {
                ConfigError::Validation(format!("themes.{name}: '{value}' is not a column"))
            })
        };
        Ok(ThemeColumns {
            label: col("label_column", &self.label_column)?,
            hours: col("hours_column", &self.hours_column)?,
            travel: col("travel_column", &self.travel_column)?,
            aiu: col("aiu_column", &self.aiu_column)?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThemeColumns {
    pub label: u32,
    pub hours: u32,
    pub travel: u32,
    pub aiu: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CellBinding {
    pub address: String,
    pub source: CostField,
    #[serde(default)]
    pub transform: Transform,
}

impl CellBinding {
    pub fn new(address: &str, source: CostField) -> Self {
        let transform = if source == CostField::AiuPercent {
            Transform::Fraction
        } else {
            Transform::Identity
        };
        Self {
            address: address.to_string(),
            source,
            transform,
        }
    }
}

/// Values a single cell can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostField {
    HotelRate,
    TransportCost,
    Trips,
    /// One overnight per trip.
    HotelNights,
    /// trips × travel hours
    TripTravelHours,
    SnackUnitPrice,
    SnackUnits,
    TotalStudents,
    TotalTeachers,
    AiuPercent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    #[default]
    Identity,
    /// Percentage stored as a fraction (÷ 100).
    Fraction,
}

impl Default for CostLayout {
    fn default() -> Self {
        use CostField::*;
        Self {
            version: COST_LAYOUT_VERSION,
            sheet: "Estructura de costos".to_string(),
            themes: ThemeBlock {
                first_row: 8,
                last_row: 15,
                label_column: "B".to_string(),
                hours_column: "D".to_string(),
                travel_column: "E".to_string(),
                aiu_column: "F".to_string(),
            },
            bindings: vec![
                CellBinding::new("C20", HotelRate),
                CellBinding::new("C21", TransportCost),
                CellBinding::new("C22", Trips),
                CellBinding::new("C23", HotelNights),
                CellBinding::new("C24", TripTravelHours),
                CellBinding::new("C26", SnackUnitPrice),
                CellBinding::new("C27", SnackUnits),
                CellBinding::new("C29", TotalStudents),
                CellBinding::new("C30", TotalTeachers),
                CellBinding::new("C32", AiuPercent),
                CellBinding::new("H40", AiuPercent),
            ],
        }
    }
}

impl CostLayout {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != COST_LAYOUT_VERSION {
            return Err(ConfigError::Validation(format!(
                "cost layout version {} is not supported (expected {COST_LAYOUT_VERSION})",
                self.version
            )));
        }
        if self.sheet.trim().is_empty() {
            return Err(ConfigError::Validation("cost.sheet must not be empty".into()));
        }

        let t = &self.themes;
        if t.first_row == 0 || t.first_row > t.last_row {
            return Err(ConfigError::Validation(format!(
                "themes: invalid row range {}..={}",
                t.first_row, t.last_row
            )));
        }
        let cols = t.columns()?;
        let distinct: HashSet<u32> = [cols.label, cols.hours, cols.travel, cols.aiu].into();
        if distinct.len() != 4 {
            return Err(ConfigError::Validation("themes: columns must be distinct".into()));
        }

        let mut seen = HashSet::new();
        for binding in &self.bindings {
            let cell = CellRef::parse(&binding.address).ok_or_else(|| {
                ConfigError::Validation(format!("binding '{}' is not a cell address", binding.address))
            })?;
            if !seen.insert(cell) {
                return Err(ConfigError::Validation(format!("cell {cell} is bound twice")));
            }
            if t.rows().contains(&cell.row) && distinct.contains(&cell.col) {
                return Err(ConfigError::Validation(format!(
                    "cell {cell} overlaps the theme block"
                )));
            }
            // every AIU address holds the same fraction
            let expected = if binding.source == CostField::AiuPercent {
                Transform::Fraction
            } else {
                Transform::Identity
            };
            if binding.transform != expected {
                return Err(ConfigError::Validation(format!(
                    "cell {cell}: {:?} must use the {:?} transform",
                    binding.source, expected
                )));
            }
        }
        Ok(())
    }
}
