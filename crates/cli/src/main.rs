// FormulIA CLI - planning quantities and filled proposal templates

mod exit_codes;

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use formulia_config::{ConfigError, ExportSettings};
use formulia_engine::assessments::available_assessments;
use formulia_engine::{derive, DerivedAggregates, PlanError, ProposalSummary, QuestionnaireSnapshot, Strategy};
use formulia_io::{export_cost_structure, export_proposal, ExportError, ThemeOutcome};

use exit_codes::{
    export_exit_code, EXIT_CONFIG, EXIT_ERROR, EXIT_INVALID_INPUT, EXIT_OUTPUT, EXIT_SUCCESS, EXIT_USAGE,
    EXIT_WARNINGS,
};

#[derive(Parser)]
#[command(name = "formulia")]
#[command(about = "Derive planning quantities and fill proposal templates from questionnaire answers")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Settings file (default: <config dir>/formulia/settings.toml)
    #[arg(long, global = true, env = "FORMULIA_CONFIG")]
    config: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug). FORMULIA_LOG overrides.
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the derived aggregates of an answers file as JSON
    #[command(after_help = "\
Examples:
  formulia derive answers.json
  cat answers.json | formulia derive -")]
    Derive {
        /// Answers file (JSON), or - for stdin
        answers: PathBuf,

        /// Single-line JSON
        #[arg(long)]
        compact: bool,
    },

    /// List the assessments available for a set of strategies
    #[command(after_help = "\
Examples:
  formulia assessments --strategy Primero
  formulia assessments --strategy Primero --strategy Remediación --json")]
    Assessments {
        /// Strategy (Transición, Primero, Remediación). Repeatable.
        #[arg(long = "strategy", value_parser = parse_strategy)]
        strategies: Vec<Strategy>,

        #[arg(long)]
        json: bool,
    },

    /// Fill the cost-structure workbook
    #[command(after_help = "\
Examples:
  formulia cost answers.json --template costos.xlsx -o costos-soacha.xlsx
  formulia cost answers.json -o costos.xlsx --json")]
    Cost {
        /// Answers file (JSON), or - for stdin
        answers: PathBuf,

        /// Cost template (.xlsx); defaults to templates.cost from settings
        #[arg(long, short = 't')]
        template: Option<PathBuf>,

        /// Output workbook
        #[arg(long, short = 'o')]
        output: PathBuf,

        /// Print the written cells as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compose the narrative proposal document
    #[command(after_help = "\
Examples:
  formulia proposal answers.json --template propuesta.docx -o propuesta-soacha.docx
  formulia proposal answers.json -o propuesta.docx --strict")]
    Proposal {
        /// Answers file (JSON), or - for stdin
        answers: PathBuf,

        /// Narrative template (.docx); defaults to templates.proposal from settings
        #[arg(long, short = 't')]
        template: Option<PathBuf>,

        /// Output document
        #[arg(long, short = 'o')]
        output: PathBuf,

        /// Exit non-zero when the export reports warnings
        #[arg(long)]
        strict: bool,

        /// Print the composition report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the effective settings
    Config {
        /// Print the settings file location instead
        #[arg(long)]
        path: bool,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  formulia-engine ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
        "\ncost layout version: 1",
    )
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("FORMULIA_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    // log records from the library crates are bridged by the subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = cli.config.as_deref();
    let result = match cli.command {
        Commands::Derive { answers, compact } => cmd_derive(&answers, compact),
        Commands::Assessments { strategies, json } => cmd_assessments(&strategies, json),
        Commands::Cost {
            answers,
            template,
            output,
            json,
        } => cmd_cost(config, &answers, template, &output, json),
        Commands::Proposal {
            answers,
            template,
            output,
            strict,
            json,
        } => cmd_proposal(config, &answers, template, &output, strict, json),
        Commands::Config { path } => cmd_config(config, path),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn output(msg: impl Into<String>) -> Self {
        Self::new(EXIT_OUTPUT, msg)
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<PlanError> for CliError {
    fn from(e: PlanError) -> Self {
        Self::new(EXIT_INVALID_INPUT, e.to_string())
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::new(EXIT_CONFIG, e.to_string()).with_hint(format!(
            "check {} or pass --config",
            ExportSettings::config_path().display()
        ))
    }
}

impl From<ExportError> for CliError {
    fn from(e: ExportError) -> Self {
        let code = export_exit_code(&e);
        let hint = match &e {
            ExportError::TemplateMismatch(_) => Some("compare the template with the layout in `formulia config`"),
            ExportError::MissingAggregate { .. } => Some("record teachers or student counts for at least one grade"),
            _ => None,
        };
        let err = Self::new(code, e.to_string());
        match hint {
            Some(h) => err.with_hint(h),
            None => err,
        }
    }
}

fn parse_strategy(s: &str) -> Result<Strategy, String> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|_| format!("unknown strategy '{s}' (expected Transición, Primero or Remediación)"))
}

fn read_answers(path: &Path) -> Result<QuestionnaireSnapshot, CliError> {
    let content = if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| CliError::args(format!("cannot read answers from stdin: {e}")))?;
        buf
    } else {
        fs::read_to_string(path).map_err(|e| CliError::args(format!("cannot read {}: {e}", path.display())))?
    };
    Ok(QuestionnaireSnapshot::from_json(&content)?)
}

fn print_json<T: Serialize>(value: &T, compact: bool) -> Result<(), CliError> {
    let text = if compact {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    }
    .map_err(|e| CliError::new(EXIT_ERROR, e.to_string()))?;
    println!("{text}");
    Ok(())
}

#[derive(Serialize)]
struct DeriveOutput<'a> {
    summary: ProposalSummary<'a>,
    aggregates: DerivedAggregates,
}

fn cmd_derive(answers: &Path, compact: bool) -> Result<(), CliError> {
    let snapshot = read_answers(answers)?;
    let aggregates = derive(&snapshot)?;
    print_json(
        &DeriveOutput {
            summary: snapshot.summary(),
            aggregates,
        },
        compact,
    )
}

fn cmd_assessments(strategies: &[Strategy], json: bool) -> Result<(), CliError> {
    let list = available_assessments(strategies);
    if json {
        return print_json(&list, false);
    }
    for name in list {
        println!("{name}");
    }
    Ok(())
}

fn resolve_template(explicit: Option<PathBuf>, configured: Option<&PathBuf>, key: &str) -> Result<PathBuf, CliError> {
    explicit
        .or_else(|| configured.cloned())
        .ok_or_else(|| {
            CliError::args("no template given")
                .with_hint(format!("pass --template or set templates.{key} in the settings file"))
        })
}

/// Write the finished artifact. The template itself is never a valid target.
fn write_output(output: &Path, template: &Path, bytes: &[u8]) -> Result<(), CliError> {
    let same = match (fs::canonicalize(output), fs::canonicalize(template)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    };
    if same {
        return Err(CliError::args("output path is the template itself")
            .with_hint("choose a different --output; templates are never modified"));
    }
    // staged next to the target so the final rename stays on one filesystem
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staged = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| CliError::output(format!("cannot create a file in {}: {e}", dir.display())))?;
    staged
        .write_all(bytes)
        .and_then(|()| staged.as_file().sync_all())
        .map_err(|e| CliError::output(format!("cannot write {}: {e}", output.display())))?;
    staged
        .persist(output)
        .map_err(|e| CliError::output(format!("cannot write {}: {}", output.display(), e.error)))?;
    tracing::info!("wrote {} ({} bytes)", output.display(), bytes.len());
    Ok(())
}

#[derive(Serialize)]
struct CostReport<'a> {
    output: String,
    cells: Vec<CellOutput>,
    themes: &'a [ThemeOutcome],
}

#[derive(Serialize)]
struct CellOutput {
    cell: String,
    value: f64,
}

fn cmd_cost(
    config: Option<&Path>,
    answers: &Path,
    template: Option<PathBuf>,
    output: &Path,
    json: bool,
) -> Result<(), CliError> {
    let settings = ExportSettings::load(config)?;
    let snapshot = read_answers(answers)?;
    let template = resolve_template(template, settings.templates.cost.as_ref(), "cost")?;

    let export = export_cost_structure(&template, &snapshot, &settings)?;
    write_output(output, &template, &export.bytes)?;

    if json {
        return print_json(
            &CostReport {
                output: output.display().to_string(),
                cells: export
                    .cells
                    .iter()
                    .map(|(cell, value)| CellOutput {
                        cell: cell.to_string(),
                        value: *value,
                    })
                    .collect(),
                themes: &export.themes,
            },
            false,
        );
    }
    let selected = export.themes.iter().filter(|t| t.selected).count();
    eprintln!(
        "wrote {}: {} cells, {} of {} themes selected",
        output.display(),
        export.cells.len(),
        selected,
        export.themes.len()
    );
    Ok(())
}

fn cmd_proposal(
    config: Option<&Path>,
    answers: &Path,
    template: Option<PathBuf>,
    output: &Path,
    strict: bool,
    json: bool,
) -> Result<(), CliError> {
    let settings = ExportSettings::load(config)?;
    let snapshot = read_answers(answers)?;
    let template = resolve_template(template, settings.templates.proposal.as_ref(), "proposal")?;

    let export = export_proposal(&template, &snapshot, &settings)?;
    write_output(output, &template, &export.bytes)?;

    if json {
        print_json(&export.report, false)?;
    } else {
        for warning in &export.report.warnings {
            eprintln!("warning: {warning}");
        }
        eprintln!(
            "wrote {}: {} blocks dropped, {} blocks appended",
            output.display(),
            export.report.dropped_blocks,
            export.report.appended_blocks
        );
    }

    if strict && !export.report.warnings.is_empty() {
        return Err(CliError::new(
            EXIT_WARNINGS,
            format!("{} warning(s) with --strict", export.report.warnings.len()),
        ));
    }
    Ok(())
}

fn cmd_config(config: Option<&Path>, path_only: bool) -> Result<(), CliError> {
    if path_only {
        let path = config.map(Path::to_path_buf).unwrap_or_else(ExportSettings::config_path);
        println!("{}", path.display());
        return Ok(());
    }
    let settings = ExportSettings::load(config)?;
    print!("{}", settings.to_toml()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategies_parse_by_label_or_alias() {
        assert_eq!(parse_strategy("Primero"), Ok(Strategy::FirstGrade));
        assert_eq!(parse_strategy("remediation"), Ok(Strategy::Remediation));
        assert!(parse_strategy("Segundo").unwrap_err().contains("Segundo"));
    }

    #[test]
    fn template_falls_back_to_settings() {
        let configured = PathBuf::from("/plantillas/costos.xlsx");
        assert_eq!(
            resolve_template(None, Some(&configured), "cost").unwrap(),
            configured
        );
        let explicit = PathBuf::from("otra.xlsx");
        assert_eq!(
            resolve_template(Some(explicit.clone()), Some(&configured), "cost").unwrap(),
            explicit
        );
        let err = resolve_template(None, None, "proposal").unwrap_err();
        assert_eq!(err.code, EXIT_USAGE);
        assert!(err.hint.unwrap().contains("templates.proposal"));
    }

    #[test]
    fn output_replaces_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("plantilla.xlsx");
        let output = dir.path().join("salida.xlsx");
        fs::write(&template, b"template").unwrap();
        fs::write(&output, b"a much longer previous export").unwrap();

        write_output(&output, &template, b"new").unwrap();
        assert_eq!(fs::read(&output).unwrap(), b"new");
        // nothing staged is left behind
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn failed_output_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("plantilla.xlsx");
        fs::write(&template, b"template").unwrap();
        let output = dir.path().join("no-such-dir").join("salida.xlsx");

        let err = write_output(&output, &template, b"new").unwrap_err();
        assert_eq!(err.code, EXIT_OUTPUT);
        assert!(!output.exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn failed_rename_keeps_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("plantilla.xlsx");
        fs::write(&template, b"template").unwrap();
        // a directory in the way makes the final rename fail
        let output = dir.path().join("salida.xlsx");
        fs::create_dir(&output).unwrap();
        fs::write(output.join("keep"), b"x").unwrap();

        let err = write_output(&output, &template, b"new").unwrap_err();
        assert_eq!(err.code, EXIT_OUTPUT);
        assert!(output.join("keep").exists());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }
}
