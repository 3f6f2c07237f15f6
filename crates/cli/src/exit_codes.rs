//! CLI Exit Code Registry
//!
//! Single source of truth for the exit codes of `formulia`. Scripts that
//! drive proposal generation rely on them.
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | Success                                              |
//! | 1    | General error (unspecified)                          |
//! | 2    | Usage error (bad args, missing file)                 |
//! | 3    | Answers rejected (invalid or unparseable input)      |
//! | 4    | Settings rejected                                    |
//! | 5    | Template does not match the configured layout        |
//! | 6    | A derived value the export needs is absent           |
//! | 7    | Output could not be written                          |
//! | 8    | Export finished with warnings and `--strict` was set |

use formulia_io::ExportError;

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unreadable answers file, no template path.
pub const EXIT_USAGE: u8 = 2;

/// Questionnaire answers failed validation or could not be parsed.
pub const EXIT_INVALID_INPUT: u8 = 3;

/// Settings file could not be parsed or failed validation.
pub const EXIT_CONFIG: u8 = 4;

/// Template missing, unreadable, or not shaped like the layout says.
pub const EXIT_TEMPLATE_MISMATCH: u8 = 5;

/// Themes selected while no training groups are needed, and similar.
pub const EXIT_MISSING_AGGREGATE: u8 = 6;

/// Writing the finished artifact failed.
pub const EXIT_OUTPUT: u8 = 7;

/// Warnings were reported and `--strict` turns them into a failure.
pub const EXIT_WARNINGS: u8 = 8;

/// Map an export failure to its exit code.
pub fn export_exit_code(err: &ExportError) -> u8 {
    match err {
        ExportError::Plan(_) => EXIT_INVALID_INPUT,
        ExportError::Config(_) => EXIT_CONFIG,
        ExportError::TemplateMismatch(_) => EXIT_TEMPLATE_MISMATCH,
        ExportError::MissingAggregate { .. } => EXIT_MISSING_AGGREGATE,
        ExportError::Io(_) => EXIT_OUTPUT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_ERROR,
            EXIT_USAGE,
            EXIT_INVALID_INPUT,
            EXIT_CONFIG,
            EXIT_TEMPLATE_MISMATCH,
            EXIT_MISSING_AGGREGATE,
            EXIT_OUTPUT,
            EXIT_WARNINGS,
        ];
        for (i, a) in codes.iter().enumerate() {
            assert!(!codes[i + 1..].contains(a), "duplicate exit code {a}");
        }
    }

    #[test]
    fn export_errors_map_to_codes() {
        assert_eq!(export_exit_code(&ExportError::mismatch("x")), EXIT_TEMPLATE_MISMATCH);
        assert_eq!(
            export_exit_code(&ExportError::MissingAggregate {
                step: "group_count",
                reason: String::new()
            }),
            EXIT_MISSING_AGGREGATE
        );
        assert_eq!(export_exit_code(&ExportError::Io("disk full".into())), EXIT_OUTPUT);
    }
}
