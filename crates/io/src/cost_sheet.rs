//! Cost-structure binder: derived aggregates -> fixed cells of the cost
//! template.
//!
//! Base hours are read from the template with calamine; the new values are
//! patched into the worksheet part and the package is rebuilt in memory.
//! The output is a pure function of (template bytes, snapshot, layout).

use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;

use calamine::{Data, Range, Reader, Xlsx};
use serde::Serialize;
use formulia_config::cost_layout::ThemeColumns;
use formulia_config::{CellRef, CostField, CostLayout, Transform};
use formulia_engine::{same_label, DerivedAggregates, Logistics, QuestionnaireSnapshot};

use crate::error::ExportError;
use crate::package::{resolve_sheet_path, Package};
use crate::sheet_patch::patch_cells;

/// A theme row as authored in the template.
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeRow {
    pub row: u32,
    pub label: String,
    pub base_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThemeOutcome {
    pub label: String,
    pub selected: bool,
    pub hours: f64,
}

#[derive(Debug)]
pub struct CostExport {
    pub bytes: Vec<u8>,
    /// Every cell written, in address order.
    pub cells: Vec<(CellRef, f64)>,
    pub themes: Vec<ThemeOutcome>,
}

pub fn bind_cost_template(
    template: &[u8],
    layout: &CostLayout,
    snapshot: &QuestionnaireSnapshot,
    derived: &DerivedAggregates,
) -> Result<CostExport, ExportError> {
    layout.validate()?;
    let columns = layout.themes.columns()?;

    let range = read_sheet(template, &layout.sheet)?;
    let themes = read_theme_rows(&range, layout, columns)?;

    for topic in &snapshot.topics {
        if !themes.iter().any(|t| same_label(&t.label, topic)) {
            return Err(ExportError::mismatch(format!(
                "topic '{topic}' has no row in sheet '{}' (rows {}..={})",
                layout.sheet, layout.themes.first_row, layout.themes.last_row
            )));
        }
    }

    let any_selected = themes.iter().any(|t| snapshot.is_topic_selected(&t.label));
    let groups = match derived.groups.groups() {
        Some(n) => n.get() as f64,
        None if any_selected => {
            return Err(ExportError::MissingAggregate {
                step: "group_count",
                reason: "themes are selected but no teachers were recorded".into(),
            })
        }
        None => 0.0,
    };

    let mut writes: BTreeMap<CellRef, f64> = BTreeMap::new();
    let mut outcomes = Vec::with_capacity(themes.len());

    for theme in &themes {
        let selected = snapshot.is_topic_selected(&theme.label);
        let (hours, travel, aiu) = if selected {
            (theme.base_hours * groups, logistics(snapshot)?.travel_hours, aiu_fraction(derived)?)
        } else {
            // retract whatever a previous configuration left here
            (0.0, 0.0, 0.0)
        };
        writes.insert(CellRef::new(theme.row, columns.hours), hours);
        writes.insert(CellRef::new(theme.row, columns.travel), travel);
        writes.insert(CellRef::new(theme.row, columns.aiu), aiu);
        log::debug!("theme row {} '{}': selected={selected} hours={hours}", theme.row, theme.label);
        outcomes.push(ThemeOutcome {
            label: theme.label.clone(),
            selected,
            hours,
        });
    }

    for binding in &layout.bindings {
        // validated above
        let Some(cell) = CellRef::parse(&binding.address) else {
            continue;
        };
        let raw = field_value(binding.source, snapshot, derived)?;
        let value = match binding.transform {
            Transform::Identity => raw,
            Transform::Fraction => raw / 100.0,
        };
        writes.insert(cell, value);
    }

    let bytes = write_sheet(template, &layout.sheet, &writes)?;
    log::info!(
        "cost template bound: {} cells, {} of {} themes selected",
        writes.len(),
        outcomes.iter().filter(|t| t.selected).count(),
        outcomes.len()
    );

    Ok(CostExport {
        bytes,
        cells: writes.into_iter().collect(),
        themes: outcomes,
    })
}

/// Value of a bound field. Unanswered sections fail instead of writing 0.
fn field_value(
    field: CostField,
    snapshot: &QuestionnaireSnapshot,
    derived: &DerivedAggregates,
) -> Result<f64, ExportError> {
    Ok(match field {
        CostField::HotelRate => logistics(snapshot)?.hotel_rate,
        CostField::TransportCost => logistics(snapshot)?.transport_cost,
        CostField::Trips | CostField::HotelNights => logistics(snapshot)?.trips as f64,
        CostField::TripTravelHours => {
            let l = logistics(snapshot)?;
            l.trips as f64 * l.travel_hours
        }
        CostField::SnackUnitPrice => logistics(snapshot)?.snack_unit_price,
        CostField::SnackUnits => derived.snack_units.ok_or_else(missing_logistics)? as f64,
        CostField::TotalStudents => derived.total_students as f64,
        CostField::TotalTeachers => derived.total_teachers as f64,
        // stored percentage; the binding's Fraction transform divides
        CostField::AiuPercent => snapshot.aiu_percent.ok_or_else(missing_aiu)? as f64,
    })
}

fn logistics(snapshot: &QuestionnaireSnapshot) -> Result<&Logistics, ExportError> {
    snapshot.logistics.as_ref().ok_or_else(missing_logistics)
}

fn aiu_fraction(derived: &DerivedAggregates) -> Result<f64, ExportError> {
    derived.aiu_fraction.ok_or_else(missing_aiu)
}

fn missing_logistics() -> ExportError {
    ExportError::MissingAggregate {
        step: "logistics",
        reason: "the logistics section was not answered".into(),
    }
}

fn missing_aiu() -> ExportError {
    ExportError::MissingAggregate {
        step: "aiu_percent",
        reason: "the AIU percentage was not answered".into(),
    }
}

fn read_sheet(template: &[u8], sheet: &str) -> Result<Range<Data>, ExportError> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(template))
        .map_err(|e| ExportError::mismatch(format!("cannot open cost template: {e}")))?;
    if !workbook.sheet_names().iter().any(|n| n == sheet) {
        return Err(ExportError::mismatch(format!("cost template has no sheet '{sheet}'")));
    }
    workbook
        .worksheet_range(sheet)
        .map_err(|e| ExportError::mismatch(format!("sheet '{sheet}': {e}")))
}

/// Read the labeled theme rows. Rows with an empty label are unused slots.
pub fn read_theme_rows(
    range: &Range<Data>,
    layout: &CostLayout,
    columns: ThemeColumns,
) -> Result<Vec<ThemeRow>, ExportError> {
    let mut rows = Vec::new();
    for row in layout.themes.rows() {
        let at = |col: u32| range.get_value((row - 1, col - 1));
        let label = match at(columns.label) {
            Some(Data::String(s)) => s.trim().to_string(),
            Some(Data::Empty) | None => String::new(),
            Some(other) => {
                return Err(ExportError::mismatch(format!(
                    "theme label at {} is not text: {other}",
                    CellRef::new(row, columns.label)
                )))
            }
        };
        if label.is_empty() {
            continue;
        }
        let base_hours = match at(columns.hours) {
            Some(Data::Float(f)) => *f,
            Some(Data::Int(i)) => *i as f64,
            Some(Data::Empty) | None => 0.0,
            Some(other) => {
                return Err(ExportError::mismatch(format!(
                    "base hours at {} for '{label}' is not a number: {other}",
                    CellRef::new(row, columns.hours)
                )))
            }
        };
        rows.push(ThemeRow { row, label, base_hours });
    }
    Ok(rows)
}

fn write_sheet(template: &[u8], sheet: &str, writes: &BTreeMap<CellRef, f64>) -> Result<Vec<u8>, ExportError> {
    let mut package = Package::open(template)?;
    let workbook_xml = package.require_part("xl/workbook.xml")?;
    let rels_xml = package.require_part("xl/_rels/workbook.xml.rels")?;
    let path = resolve_sheet_path(&workbook_xml, &rels_xml, sheet)
        .ok_or_else(|| ExportError::mismatch(format!("cannot locate the part for sheet '{sheet}'")))?;
    let sheet_xml = package.require_part(&path)?;

    let patched = patch_cells(&sheet_xml, writes)?;
    let replacements = HashMap::from([(path, patched.into_bytes())]);
    package.rewrite(&replacements)
}
