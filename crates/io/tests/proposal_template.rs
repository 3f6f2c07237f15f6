// Narrative proposal composition against a document built in memory.

use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use formulia_config::ExportSettings;
use formulia_engine::QuestionnaireSnapshot;
use formulia_io::docx::{BlockKind, DocumentXml};
use formulia_io::{export_proposal_bytes, ExportError, ExportWarning};

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

fn p(style: Option<&str>, runs: &[&str]) -> String {
    let ppr = style
        .map(|s| format!(r#"<w:pPr><w:pStyle w:val="{s}"/></w:pPr>"#))
        .unwrap_or_default();
    let runs: String = runs
        .iter()
        .map(|r| format!(r#"<w:r><w:t xml:space="preserve">{r}</w:t></w:r>"#))
        .collect();
    format!("<w:p>{ppr}{runs}</w:p>")
}

fn body() -> String {
    [
        p(Some("Heading1"), &["Propuesta"]),
        p(None, &["Presentada por [NOMBRE DE LA ORGANIZACIÓN] para [MUNI", "CIPIO]."]),
        p(None, &["La intervención cubre [N] sedes educativas: Sede 1, Sede 2 y Sede 3."]),
        p(None, &["Total de estudiantes: [N]"]),
        p(None, &["Total de docentes: [N]"]),
        p(Some("Heading1"), &["Estrategia de Transición"]),
        p(None, &["Texto de transición."]),
        p(Some("Heading1"), &["Estrategia Primero"]),
        p(None, &["Texto de primero."]),
        p(Some("Heading1"), &["Componente de Materiales"]),
        p(None, &["Texto de materiales."]),
        p(Some("Heading1"), &["Cronograma"]),
        p(None, &["Mes 1 a mes 10."]),
    ]
    .concat()
}

fn docx(body: &str) -> Vec<u8> {
    let document = format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#,
            r#"{}<w:sectPr><w:pgSz w:w="12240" w:h="15840"/></w:sectPr></w:body></w:document>"#
        ),
        body
    );
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in [("[Content_Types].xml", CONTENT_TYPES), ("word/document.xml", document.as_str())] {
        writer.start_file(name, SimpleFileOptions::default()).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn document_xml(bytes: &[u8]) -> String {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut file = archive.by_name("word/document.xml").unwrap();
    let mut xml = String::new();
    file.read_to_string(&mut xml).unwrap();
    xml
}

fn texts(bytes: &[u8]) -> Vec<String> {
    DocumentXml::parse(&document_xml(bytes))
        .unwrap()
        .blocks
        .iter()
        .map(|b| b.text())
        .collect()
}

fn answers(sites: &str, extra: &str) -> QuestionnaireSnapshot {
    QuestionnaireSnapshot::from_json(&format!(
        r#"{{
            "components": ["Formación", "Monitoreo y Evaluación"],
            "modalities": {{"Formación": "Híbrida"}},
            "organization": "Fundación Letras",
            "municipality": "Sibaté",
            "strategies": ["Primero"],
            "sites": {sites}
            {extra}
        }}"#
    ))
    .unwrap()
}

const TWO_SITES: &str = r#"[
    {"name": "Norte", "population": {"1°": {"students": 30, "teachers": 0}}},
    {"name": "Sur", "population": {"1°": {"students": 20, "teachers": 1}}}
]"#;

#[test]
fn anchors_are_substituted_across_runs() {
    let out = export_proposal_bytes(&docx(&body()), &answers(TWO_SITES, ""), &ExportSettings::default()).unwrap();
    let texts = texts(&out.bytes);
    assert_eq!(texts[1], "Presentada por Fundación Letras para Sibaté.");
    assert_eq!(texts[2], "La intervención cubre 2 sedes educativas: Norte y Sur.");
    assert!(out.report.warnings.iter().all(|w| !matches!(w, ExportWarning::AnchorNotFound { .. })));
    assert!(out.report.substitutions.iter().all(|(_, hits)| *hits == 1));
}

#[test]
fn site_count_pluralization() {
    let template = docx(&body());
    let settings = ExportSettings::default();

    let one = answers(r#"[{"name": "Única"}]"#, "");
    let out = export_proposal_bytes(&template, &one, &settings).unwrap();
    assert_eq!(texts(&out.bytes)[2], "La intervención cubre una sede educativa: Única.");

    let three = answers(r#"[{"name": "Norte"}, {"name": "Sur"}, {"name": "Centro"}]"#, "");
    let out = export_proposal_bytes(&template, &three, &settings).unwrap();
    assert_eq!(
        texts(&out.bytes)[2],
        "La intervención cubre 3 sedes educativas: Norte, Sur y Centro."
    );
}

#[test]
fn stale_lines_and_unselected_sections_are_dropped() {
    let out = export_proposal_bytes(&docx(&body()), &answers(TWO_SITES, ""), &ExportSettings::default()).unwrap();
    let texts = texts(&out.bytes);
    assert!(!texts.iter().any(|t| t.contains("[N]")));
    assert!(!texts.iter().any(|t| t.contains("transición")));
    assert!(!texts.iter().any(|t| t.contains("materiales")));
    assert!(texts.iter().any(|t| t == "Texto de primero."));
    assert!(texts.iter().any(|t| t == "Mes 1 a mes 10."));
    assert_eq!(out.report.removed_stale, 2);
    assert_eq!(out.report.dropped_blocks, 4);
}

#[test]
fn appendix_lists_aggregates_and_assessments() {
    let snap = answers(TWO_SITES, r#", "logistics": {"sessions": 1}"#);
    let out = export_proposal_bytes(&docx(&body()), &snap, &ExportSettings::default()).unwrap();
    let texts = texts(&out.bytes);
    for expected in [
        "Población y cobertura",
        "Total de estudiantes: 50",
        "Total de docentes: 2",
        "Grupos de formación: 1",
        "Refrigerios: 2",
        "Evaluaciones",
    ] {
        assert!(texts.iter().any(|t| t == expected), "missing '{expected}' in {texts:?}");
    }
    // base two plus four first-grade checkpoints
    let start = texts.iter().position(|t| t == "Evaluaciones").unwrap();
    assert_eq!(texts[start + 1], "Prueba de entrada (línea de base)");
    assert_eq!(texts[start + 7], "", "section properties follow the six assessments");
    assert!(!texts.iter().any(|t| t == "Materiales"));
}

#[test]
fn appendix_stays_ahead_of_section_properties() {
    let out = export_proposal_bytes(&docx(&body()), &answers(TWO_SITES, ""), &ExportSettings::default()).unwrap();
    let doc = DocumentXml::parse(&document_xml(&out.bytes)).unwrap();
    assert_eq!(doc.blocks.last().map(|b| b.kind), Some(BlockKind::SectionProperties));
}

#[test]
fn investment_table_covers_priced_topics() {
    let snap = answers(
        TWO_SITES,
        r#", "topics": ["Gestión de aula", "Taller de títeres"]"#,
    );
    let out = export_proposal_bytes(&docx(&body()), &snap, &ExportSettings::default()).unwrap();
    let texts = texts(&out.bytes);
    let table = texts.iter().find(|t| t.starts_with("Tema\n")).expect("investment table");
    assert_eq!(
        table,
        "Tema\nCosto unitario\nCantidad\nSubtotal\n\
         Gestión de aula\n$ 1.300.000\n1\n$ 1.300.000\n\
         Total\n\n\n$ 1.300.000"
    );
    assert!(out.report.warnings.contains(&ExportWarning::UnpricedTopic {
        topic: "Taller de títeres".into()
    }));
}

#[test]
fn no_teachers_omits_table_with_warning() {
    let snap = answers(r#"[{"name": "Norte"}]"#, r#", "topics": ["Gestión de aula"]"#);
    let out = export_proposal_bytes(&docx(&body()), &snap, &ExportSettings::default()).unwrap();
    let texts = texts(&out.bytes);
    assert!(texts.iter().any(|t| t == "Grupos de formación: no se requieren"));
    assert!(!texts.iter().any(|t| t == "Inversión"));
    // logistics unanswered
    assert!(!texts.iter().any(|t| t.starts_with("Refrigerios")));
    assert!(out.report.warnings.contains(&ExportWarning::NoGroups));
}

#[test]
fn anchors_inside_content_controls_are_substituted() {
    let cover = format!(
        "<w:sdt><w:sdtPr><w:alias w:val=\"Portada\"/></w:sdtPr><w:sdtContent>{}{}</w:sdtContent></w:sdt>",
        p(Some("Title"), &["Propuesta para [MUNI", "CIPIO]"]),
        p(None, &["[NOMBRE DE LA ORGANIZACIÓN]"]),
    );
    let template = docx(&format!("{cover}{}", body()));
    let out = export_proposal_bytes(&template, &answers(TWO_SITES, ""), &ExportSettings::default()).unwrap();

    let doc = DocumentXml::parse(&document_xml(&out.bytes)).unwrap();
    assert_eq!(doc.blocks[0].kind, BlockKind::Other);
    assert_eq!(doc.blocks[0].text(), "Propuesta para Sibaté\nFundación Letras");
    assert!(!document_xml(&out.bytes).contains("[MUNICIPIO]"));
    assert!(out.report.warnings.iter().all(|w| !matches!(w, ExportWarning::AnchorNotFound { .. })));
    let municipio = out.report.substitutions.iter().find(|(a, _)| a == "[MUNICIPIO]").unwrap();
    assert_eq!(municipio.1, 2);
}

#[test]
fn missing_anchor_is_a_warning() {
    let template = docx(&p(None, &["Solo para [MUNICIPIO]."]));
    let out = export_proposal_bytes(&template, &answers(TWO_SITES, ""), &ExportSettings::default()).unwrap();
    let missing: Vec<_> = out
        .report
        .warnings
        .iter()
        .filter_map(|w| match w {
            ExportWarning::AnchorNotFound { anchor } => Some(anchor.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(missing.len(), 3);
    assert!(missing.contains(&"[NOMBRE DE LA ORGANIZACIÓN]"));
    assert_eq!(texts(&out.bytes)[0], "Solo para Sibaté.");
}

#[test]
fn rerun_is_byte_identical() {
    let template = docx(&body());
    let snap = answers(TWO_SITES, r#", "topics": ["Gestión de aula"]"#);
    let settings = ExportSettings::default();
    let first = export_proposal_bytes(&template, &snap, &settings).unwrap();
    let second = export_proposal_bytes(&template, &snap, &settings).unwrap();
    assert_eq!(first.bytes, second.bytes);
    assert_eq!(first.report, second.report);
}

#[test]
fn document_without_body_is_mismatch() {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    writer.start_file("word/styles.xml", SimpleFileOptions::default()).unwrap();
    writer.write_all(b"<w:styles/>").unwrap();
    let template = writer.finish().unwrap().into_inner();
    let err = export_proposal_bytes(&template, &answers(TWO_SITES, ""), &ExportSettings::default()).unwrap_err();
    assert!(matches!(err, ExportError::TemplateMismatch(_)), "{err}");
}
