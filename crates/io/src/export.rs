// Export entry points
//
// Templates are read from disk read-only; aggregates are derived fresh for
// every call and the finished artifact is returned as bytes.

use std::fs;
use std::path::Path;

use formulia_config::ExportSettings;
use formulia_engine::{derive, QuestionnaireSnapshot};

use crate::cost_sheet::{bind_cost_template, CostExport};
use crate::error::ExportError;
use crate::proposal::{compose_proposal, ProposalExport};

fn read_template(path: &Path) -> Result<Vec<u8>, ExportError> {
    fs::read(path).map_err(|e| ExportError::mismatch(format!("cannot read template {}: {e}", path.display())))
}

pub fn export_cost_structure(
    template: &Path,
    snapshot: &QuestionnaireSnapshot,
    settings: &ExportSettings,
) -> Result<CostExport, ExportError> {
    log::info!("exporting cost structure from {}", template.display());
    let bytes = read_template(template)?;
    export_cost_structure_bytes(&bytes, snapshot, settings)
}

pub fn export_cost_structure_bytes(
    template: &[u8],
    snapshot: &QuestionnaireSnapshot,
    settings: &ExportSettings,
) -> Result<CostExport, ExportError> {
    let derived = derive(snapshot)?;
    bind_cost_template(template, &settings.cost, snapshot, &derived)
}

pub fn export_proposal(
    template: &Path,
    snapshot: &QuestionnaireSnapshot,
    settings: &ExportSettings,
) -> Result<ProposalExport, ExportError> {
    log::info!("exporting proposal from {}", template.display());
    let bytes = read_template(template)?;
    export_proposal_bytes(&bytes, snapshot, settings)
}

pub fn export_proposal_bytes(
    template: &[u8],
    snapshot: &QuestionnaireSnapshot,
    settings: &ExportSettings,
) -> Result<ProposalExport, ExportError> {
    let derived = derive(snapshot)?;
    compose_proposal(template, &settings.document, &settings.catalog, snapshot, &derived)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_template_is_mismatch() {
        let snap = QuestionnaireSnapshot::from_json(r#"{"sites": [{"name": "A"}]}"#).unwrap();
        let err = export_cost_structure(Path::new("/nonexistent/costos.xlsx"), &snap, &ExportSettings::default())
            .unwrap_err();
        assert!(matches!(err, ExportError::TemplateMismatch(_)), "{err}");
    }
}
