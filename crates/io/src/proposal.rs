//! Narrative proposal composer.
//!
//! Order of work on the body of word/document.xml:
//! 1. anchor substitution in every paragraph (table cells included)
//! 2. removal of stale template lines
//! 3. section retention driven by marker headings
//! 4. appended aggregates, assessments, materials and investment table

use std::collections::HashMap;

use formulia_config::catalog::price_of;
use formulia_config::{DocumentLayout, TopicPrice};
use formulia_engine::{Component, DerivedAggregates, QuestionnaireSnapshot};
use serde::Serialize;

use crate::anchors::{LiteralAnchors, SubstitutionStrategy};
use crate::docx::{
    paragraph_segments, rewrite_segments, styled_paragraph, table, Block, BlockKind, DocumentXml,
    DOCUMENT_PART,
};
use crate::error::{ExportError, ExportWarning};
use crate::package::Package;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComposeReport {
    /// Hits per anchor, longest anchor first.
    pub substitutions: Vec<(String, usize)>,
    pub removed_stale: usize,
    pub dropped_blocks: usize,
    pub appended_blocks: usize,
    pub warnings: Vec<ExportWarning>,
}

#[derive(Debug)]
pub struct ProposalExport {
    pub bytes: Vec<u8>,
    pub report: ComposeReport,
}

pub fn compose_proposal(
    template: &[u8],
    layout: &DocumentLayout,
    catalog: &[TopicPrice],
    snapshot: &QuestionnaireSnapshot,
    derived: &DerivedAggregates,
) -> Result<ProposalExport, ExportError> {
    let strategy = LiteralAnchors::plan(layout, snapshot);
    compose_with(template, layout, catalog, snapshot, derived, &strategy)
}

/// Same as [`compose_proposal`] with a caller-chosen placeholder strategy.
pub fn compose_with(
    template: &[u8],
    layout: &DocumentLayout,
    catalog: &[TopicPrice],
    snapshot: &QuestionnaireSnapshot,
    derived: &DerivedAggregates,
    strategy: &dyn SubstitutionStrategy,
) -> Result<ProposalExport, ExportError> {
    layout.validate()?;
    let mut package = Package::open(template)?;
    let xml = package.require_part(DOCUMENT_PART)?;
    let mut doc = DocumentXml::parse(&xml)?;
    let mut report = ComposeReport::default();

    let hits = substitute(&mut doc, strategy)?;
    for (subst, count) in strategy.substitutions().iter().zip(hits) {
        if count == 0 {
            report.warnings.push(ExportWarning::AnchorNotFound {
                anchor: subst.anchor.clone(),
            });
        }
        report.substitutions.push((subst.anchor.clone(), count));
    }

    let before = doc.blocks.len();
    doc.blocks.retain(|b| !is_stale(b, layout));
    report.removed_stale = before - doc.blocks.len();

    let before = doc.blocks.len();
    doc.blocks = retain_sections(std::mem::take(&mut doc.blocks), layout, snapshot);
    report.dropped_blocks = before - doc.blocks.len();

    let appendix = appendix(layout, catalog, snapshot, derived, &mut report.warnings);
    report.appended_blocks = appendix.len();
    doc.append(appendix);

    for warning in &report.warnings {
        log::warn!("{warning}");
    }

    let replacements = HashMap::from([(DOCUMENT_PART.to_string(), doc.to_xml().into_bytes())]);
    let bytes = package.rewrite(&replacements)?;
    log::info!(
        "proposal composed: {} stale lines removed, {} blocks dropped, {} appended, {} warnings",
        report.removed_stale,
        report.dropped_blocks,
        report.appended_blocks,
        report.warnings.len()
    );
    Ok(ProposalExport { bytes, report })
}

fn substitute(doc: &mut DocumentXml, strategy: &dyn SubstitutionStrategy) -> Result<Vec<usize>, ExportError> {
    let mut totals = vec![0usize; strategy.substitutions().len()];
    for block in &mut doc.blocks {
        // content controls and other wrappers carry paragraphs too
        if block.kind == BlockKind::SectionProperties {
            continue;
        }
        let mut paragraphs = paragraph_segments(&block.xml)?;
        let mut changed = false;
        for runs in &mut paragraphs {
            for (total, hits) in totals.iter_mut().zip(strategy.apply(runs)) {
                *total += hits;
                changed |= hits > 0;
            }
        }
        if changed {
            block.xml = rewrite_segments(&block.xml, &paragraphs)?;
        }
    }
    Ok(totals)
}

fn is_stale(block: &Block, layout: &DocumentLayout) -> bool {
    if block.kind != BlockKind::Paragraph {
        return false;
    }
    let text = block.text();
    layout.stale_lines.iter().any(|line| text.contains(line.as_str()))
}

/// Apply the keep state. A marker heading sets the state (and is itself
/// subject to it); other blocks follow it. Section properties always stay.
pub fn retain_sections(blocks: Vec<Block>, layout: &DocumentLayout, snapshot: &QuestionnaireSnapshot) -> Vec<Block> {
    let mut keep = layout.initial_keep;
    blocks
        .into_iter()
        .filter(|block| {
            if block.kind == BlockKind::SectionProperties {
                return true;
            }
            if let Some(style) = block.style() {
                if layout.is_heading_style(&style) {
                    if let Some(marker) = layout.marker_for(&block.text()) {
                        keep = marker.when.holds(snapshot);
                        log::debug!("section '{}': keep={keep}", marker.heading);
                    }
                }
            }
            keep
        })
        .collect()
}

fn appendix(
    layout: &DocumentLayout,
    catalog: &[TopicPrice],
    snapshot: &QuestionnaireSnapshot,
    derived: &DerivedAggregates,
    warnings: &mut Vec<ExportWarning>,
) -> Vec<Block> {
    let heading = |text: &str| styled_paragraph(&layout.appendix_heading_style, text);
    let bullet = |text: String| styled_paragraph(&layout.bullet_style, &text);

    let mut blocks = vec![heading("Población y cobertura")];
    blocks.push(bullet(format!("Total de estudiantes: {}", thousands(derived.total_students))));
    blocks.push(bullet(format!("Total de docentes: {}", thousands(derived.total_teachers))));
    blocks.push(bullet(match derived.groups.groups() {
        Some(n) => format!("Grupos de formación: {}", thousands(n.get())),
        None => "Grupos de formación: no se requieren".to_string(),
    }));
    if let Some(n) = derived.remediation_estimate {
        blocks.push(bullet(format!("Estudiantes en remediación (estimado): {}", thousands(n))));
    }
    if let Some(n) = derived.snack_units {
        blocks.push(bullet(format!("Refrigerios: {}", thousands(n))));
    }

    if snapshot.has_component(Component::MonitoringEvaluation) {
        blocks.push(heading("Evaluaciones"));
        blocks.extend(derived.assessments.iter().map(|a| bullet(a.to_string())));
    }

    if snapshot.has_component(Component::Materials) && !snapshot.materials.is_empty() {
        blocks.push(heading("Materiales"));
        blocks.extend(snapshot.materials.iter().map(|m| bullet(m.clone())));
    }

    if let Some(investment) = investment_table(layout, catalog, snapshot, derived, warnings) {
        blocks.push(heading("Inversión"));
        blocks.push(investment);
    }
    blocks
}

fn investment_table(
    layout: &DocumentLayout,
    catalog: &[TopicPrice],
    snapshot: &QuestionnaireSnapshot,
    derived: &DerivedAggregates,
    warnings: &mut Vec<ExportWarning>,
) -> Option<Block> {
    let Some(groups) = derived.groups.groups() else {
        warnings.push(ExportWarning::NoGroups);
        return None;
    };
    let groups = groups.get();

    let mut rows = Vec::new();
    let mut total = 0.0;
    for topic in &snapshot.topics {
        let Some(price) = price_of(catalog, topic) else {
            warnings.push(ExportWarning::UnpricedTopic { topic: topic.clone() });
            continue;
        };
        let subtotal = price.unit_cost * groups as f64;
        total += subtotal;
        rows.push(vec![
            topic.clone(),
            money(price.unit_cost),
            thousands(groups),
            money(subtotal),
        ]);
    }
    if rows.is_empty() {
        return None;
    }
    rows.push(vec!["Total".to_string(), String::new(), String::new(), money(total)]);
    Some(table(
        layout.table_style.as_deref(),
        &["Tema", "Costo unitario", "Cantidad", "Subtotal"],
        &rows,
    ))
}

/// 1234567 -> "1.234.567"
pub fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(ch);
    }
    out
}

/// Whole pesos: 1850000.4 -> "$ 1.850.000"
pub fn money(amount: f64) -> String {
    format!("$ {}", thousands(amount.max(0.0).round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thousands_grouping() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1000), "1.000");
        assert_eq!(thousands(1_850_000), "1.850.000");
        assert_eq!(money(3_700_000.4), "$ 3.700.000");
    }

    fn heading(text: &str) -> Block {
        styled_paragraph("Heading1", text)
    }

    fn body(text: &str) -> Block {
        styled_paragraph("Normal", text)
    }

    #[test]
    fn sections_follow_markers() {
        let snap = QuestionnaireSnapshot::from_json(
            r#"{"strategies": ["Primero"], "sites": [{"name": "A"}]}"#,
        )
        .unwrap();
        let layout = DocumentLayout::default();
        let blocks = vec![
            heading("Introducción"),
            body("intro"),
            heading("Estrategia de Transición"),
            body("transicion"),
            heading("Estrategia Primero"),
            body("primero"),
            heading("Estrategia de Remediación"),
            body("remediacion"),
            heading("Cronograma"),
            body("cronograma"),
            Block {
                kind: BlockKind::SectionProperties,
                xml: "<w:sectPr/>".into(),
            },
        ];
        let kept: Vec<String> = retain_sections(blocks, &layout, &snap)
            .iter()
            .map(|b| b.text())
            .collect();
        assert_eq!(
            kept,
            vec!["Introducción", "intro", "Estrategia Primero", "primero", "Cronograma", "cronograma", ""]
        );
    }

    #[test]
    fn non_heading_marker_text_does_not_toggle() {
        let snap = QuestionnaireSnapshot::from_json(r#"{"sites": [{"name": "A"}]}"#).unwrap();
        let layout = DocumentLayout::default();
        let blocks = vec![body("Estrategia Primero"), body("sigue")];
        assert_eq!(retain_sections(blocks, &layout, &snap).len(), 2);
    }
}
