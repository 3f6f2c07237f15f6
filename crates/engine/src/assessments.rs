use crate::model::Strategy;

/// Literacy assessments applied regardless of strategy.
pub const BASE_ASSESSMENTS: [&str; 2] = [
    "Prueba de entrada (línea de base)",
    "Prueba de salida (línea final)",
];

/// Mid-year checkpoints contributed by the First-Grade strategy.
pub const FIRST_GRADE_CHECKPOINTS: [&str; 4] = [
    "Primero: punto de control de marzo",
    "Primero: punto de control de mayo",
    "Primero: punto de control de julio",
    "Primero: punto de control de septiembre",
];

/// Early checkpoints contributed by the Remediation strategy.
pub const REMEDIATION_CHECKPOINTS: [&str; 3] = [
    "Remediación: punto de control semana 2",
    "Remediación: punto de control semana 4",
    "Remediación: punto de control semana 6",
];

/// Base assessments, then First-Grade checkpoints, then Remediation
/// checkpoints. The order the strategies were selected in never matters.
pub fn available_assessments(strategies: &[Strategy]) -> Vec<&'static str> {
    let mut out: Vec<&'static str> = BASE_ASSESSMENTS.to_vec();
    if strategies.contains(&Strategy::FirstGrade) {
        out.extend(FIRST_GRADE_CHECKPOINTS);
    }
    if strategies.contains(&Strategy::Remediation) {
        out.extend(REMEDIATION_CHECKPOINTS);
    }
    out
}
