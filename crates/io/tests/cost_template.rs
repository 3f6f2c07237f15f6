// Cost-structure binding against a workbook built in memory.

use std::io::Cursor;

use calamine::{Data, Reader, Xlsx};
use rust_xlsxwriter::Workbook;

use formulia_config::{CellRef, ExportSettings};
use formulia_engine::QuestionnaireSnapshot;
use formulia_io::{export_cost_structure, export_cost_structure_bytes, ExportError};

const SHEET: &str = "Estructura de costos";

fn cost_template() -> Vec<u8> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET).unwrap();
    sheet.write_string(6, 1, "Tema").unwrap();
    sheet.write_string(6, 3, "Horas").unwrap();
    let themes = [
        ("Conciencia fonológica", 10.0),
        ("Lectura en voz alta", 8.0),
        ("Gestión de aula", 6.0),
    ];
    for (i, (label, hours)) in themes.iter().enumerate() {
        let row = 7 + i as u32;
        sheet.write_string(row, 1, *label).unwrap();
        sheet.write_number(row, 3, *hours).unwrap();
        // leftovers from an earlier proposal
        sheet.write_number(row, 4, 99.0).unwrap();
        sheet.write_number(row, 5, 0.5).unwrap();
    }
    sheet.write_string(19, 1, "Tarifa hotel").unwrap();
    sheet.write_string(31, 1, "AIU").unwrap();
    workbook.add_worksheet().set_name("Resumen").unwrap();
    workbook.save_to_buffer().unwrap()
}

fn answers(topics: &str) -> QuestionnaireSnapshot {
    QuestionnaireSnapshot::from_json(&format!(
        r#"{{
            "components": ["Formación"],
            "modalities": {{"Formación": "Presencial"}},
            "strategies": ["Primero"],
            "sites": [
                {{"name": "A", "population": {{"1°": {{"students": 30, "teachers": 0}}}}}},
                {{"name": "B", "population": {{"1°": {{"students": 20, "teachers": 1}}}}}}
            ],
            "topics": {topics},
            "aiu_percent": 10,
            "logistics": {{"transport_cost": 250000, "hotel_rate": 120000, "trips": 3,
                           "travel_hours": 2.5, "snack_unit_price": 4500, "sessions": 3}}
        }}"#
    ))
    .unwrap()
}

fn read_cell(bytes: &[u8], address: &str) -> Option<f64> {
    let cell = CellRef::parse(address).unwrap();
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes)).unwrap();
    let range = workbook.worksheet_range(SHEET).unwrap();
    match range.get_value((cell.row - 1, cell.col - 1)) {
        Some(Data::Float(f)) => Some(*f),
        Some(Data::Int(i)) => Some(*i as f64),
        _ => None,
    }
}

#[test]
fn selected_themes_scale_with_groups() {
    let template = cost_template();
    let snap = answers(r#"["Conciencia fonológica", "Gestión de aula"]"#);
    let export = export_cost_structure_bytes(&template, &snap, &ExportSettings::default()).unwrap();
    let out = &export.bytes;

    // 2 teachers -> 1 group
    assert_eq!(read_cell(out, "D8"), Some(10.0));
    assert_eq!(read_cell(out, "E8"), Some(2.5));
    assert_eq!(read_cell(out, "F8"), Some(0.1));
    assert_eq!(read_cell(out, "D10"), Some(6.0));

    // deselected theme retracted
    assert_eq!(read_cell(out, "D9"), Some(0.0));
    assert_eq!(read_cell(out, "E9"), Some(0.0));
    assert_eq!(read_cell(out, "F9"), Some(0.0));

    assert_eq!(read_cell(out, "C20"), Some(120000.0));
    assert_eq!(read_cell(out, "C21"), Some(250000.0));
    assert_eq!(read_cell(out, "C22"), Some(3.0));
    assert_eq!(read_cell(out, "C23"), Some(3.0));
    assert_eq!(read_cell(out, "C24"), Some(7.5));
    assert_eq!(read_cell(out, "C26"), Some(4500.0));
    // 2 teachers x 1.2 x 3 sessions = 7.2
    assert_eq!(read_cell(out, "C27"), Some(7.0));
    assert_eq!(read_cell(out, "C29"), Some(50.0));
    assert_eq!(read_cell(out, "C30"), Some(2.0));
    assert_eq!(read_cell(out, "C32"), Some(0.1));
    assert_eq!(read_cell(out, "H40"), Some(0.1));

    let selected: Vec<_> = export.themes.iter().filter(|t| t.selected).map(|t| t.label.as_str()).collect();
    assert_eq!(selected, vec!["Conciencia fonológica", "Gestión de aula"]);
}

#[test]
fn labels_and_other_sheets_survive() {
    let template = cost_template();
    let export = export_cost_structure_bytes(&template, &answers("[]"), &ExportSettings::default()).unwrap();
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(export.bytes)).unwrap();
    assert_eq!(workbook.sheet_names(), vec![SHEET.to_string(), "Resumen".to_string()]);
    let range = workbook.worksheet_range(SHEET).unwrap();
    assert_eq!(range.get_value((7, 1)), Some(&Data::String("Conciencia fonológica".into())));
    assert_eq!(range.get_value((19, 1)), Some(&Data::String("Tarifa hotel".into())));
}

#[test]
fn rerun_is_byte_identical() {
    let template = cost_template();
    let snap = answers(r#"["Lectura en voz alta"]"#);
    let settings = ExportSettings::default();
    let first = export_cost_structure_bytes(&template, &snap, &settings).unwrap();
    let second = export_cost_structure_bytes(&template, &snap, &settings).unwrap();
    assert_eq!(first.bytes, second.bytes);
    assert_eq!(first.cells, second.cells);
}

#[test]
fn template_on_disk_is_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("costos.xlsx");
    let template = cost_template();
    std::fs::write(&path, &template).unwrap();

    let snap = answers(r#"["Gestión de aula"]"#);
    let export = export_cost_structure(&path, &snap, &ExportSettings::default()).unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), template);
    assert_ne!(export.bytes, template);
}

#[test]
fn topic_without_row_is_mismatch() {
    let template = cost_template();
    let snap = answers(r#"["Fluidez lectora"]"#);
    let err = export_cost_structure_bytes(&template, &snap, &ExportSettings::default()).unwrap_err();
    assert!(matches!(err, ExportError::TemplateMismatch(ref m) if m.contains("Fluidez lectora")), "{err}");
}

#[test]
fn missing_sheet_is_mismatch() {
    let template = cost_template();
    let mut settings = ExportSettings::default();
    settings.cost.sheet = "Costos 2024".into();
    let err = export_cost_structure_bytes(&template, &answers("[]"), &settings).unwrap_err();
    assert!(matches!(err, ExportError::TemplateMismatch(_)), "{err}");
}

#[test]
fn not_a_workbook_is_mismatch() {
    let err = export_cost_structure_bytes(b"plain text", &answers("[]"), &ExportSettings::default()).unwrap_err();
    assert!(matches!(err, ExportError::TemplateMismatch(_)), "{err}");
}

#[test]
fn selected_themes_without_teachers_need_groups() {
    let template = cost_template();
    let snap = QuestionnaireSnapshot::from_json(
        r#"{"sites": [{"name": "A"}], "topics": ["Gestión de aula"], "aiu_percent": 5}"#,
    )
    .unwrap();
    let err = export_cost_structure_bytes(&template, &snap, &ExportSettings::default()).unwrap_err();
    match err {
        ExportError::MissingAggregate { step, .. } => assert_eq!(step, "group_count"),
        other => panic!("expected MissingAggregate, got {other}"),
    }
}

#[test]
fn unanswered_costs_are_missing_not_zero() {
    let template = cost_template();
    let without = |drop: &str| {
        let mut raw: serde_json::Value = serde_json::from_str(
            r#"{"strategies": ["Primero"],
                "sites": [{"name": "A", "population": {"1°": {"students": 30, "teachers": 2}}}],
                "topics": [],
                "aiu_percent": 10,
                "logistics": {"trips": 1, "sessions": 2}}"#,
        )
        .unwrap();
        raw.as_object_mut().unwrap().remove(drop);
        QuestionnaireSnapshot::from_json(&raw.to_string()).unwrap()
    };

    for (drop, step) in [("logistics", "logistics"), ("aiu_percent", "aiu_percent")] {
        let err = export_cost_structure_bytes(&template, &without(drop), &ExportSettings::default())
            .unwrap_err();
        match err {
            ExportError::MissingAggregate { step: got, .. } => assert_eq!(got, step),
            other => panic!("without {drop}: expected MissingAggregate, got {other}"),
        }
    }
}

#[test]
fn topic_matching_ignores_accented_case() {
    let template = cost_template();
    let snap = answers(r#"["GESTIÓN DE AULA", "conciencia FONOLÓGICA"]"#);
    let export = export_cost_structure_bytes(&template, &snap, &ExportSettings::default()).unwrap();
    assert_eq!(read_cell(&export.bytes, "D8"), Some(10.0));
    assert_eq!(read_cell(&export.bytes, "D10"), Some(6.0));
    assert_eq!(read_cell(&export.bytes, "D9"), Some(0.0));
}

#[test]
fn formula_in_bound_cell_is_rejected() {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET).unwrap();
    sheet.write_string(7, 1, "Gestión de aula").unwrap();
    sheet.write_number(7, 3, 6.0).unwrap();
    sheet.write_formula(19, 2, "=1+1").unwrap();
    let template = workbook.save_to_buffer().unwrap();

    let err = export_cost_structure_bytes(&template, &answers("[]"), &ExportSettings::default()).unwrap_err();
    assert!(matches!(err, ExportError::TemplateMismatch(ref m) if m.contains("C20")), "{err}");
}

#[test]
fn invalid_answers_fail_before_binding() {
    let err = QuestionnaireSnapshot::from_json(r#"{"sites": [], "aiu_percent": 10}"#).unwrap_err();
    assert!(err.to_string().contains("site"));
}
