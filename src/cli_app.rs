//! Top-level CLI definition and dispatch.

#![allow(clippy::cast_precision_loss)]

use std::io::{self, IsTerminal, Write};
use std::path::PathBuf;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell as CompletionShell, generate};
use colored::{Colorize, control};
use serde_json::{Value, json};
use thiserror::Error;

use shuffle_uniformity::core::config::Config;
use shuffle_uniformity::core::errors::{ErrorCategory, SuvError};
use shuffle_uniformity::logger::jsonl::JsonlWriter;
use shuffle_uniformity::pipeline::report::{ValidationReport, Verdict};
use shuffle_uniformity::pipeline::{AnalysisPlan, analyze_transcript, run_validation};
use shuffle_uniformity::session::runner::{ProcessSession, TranscriptSource};
use shuffle_uniformity::stats::chi_squared::ExpectationMode;
use shuffle_uniformity::stats::permutation::ElementSet;

/// Chi-squared uniformity check of a queue program's `shuffle` command.
#[derive(Debug, Parser)]
#[command(
    name = "shufv",
    author,
    version,
    about = "Shuffle uniformity validator",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Force JSON output mode.
    #[arg(long, global = true)]
    json: bool,
    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
    /// Increase verbosity.
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,
    /// Quiet mode (errors only).
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Run the program under test and evaluate its shuffle.
    Run(RunArgs),
    /// Evaluate a previously captured transcript.
    Analyze(AnalyzeArgs),
    /// Print the command script a run would send.
    Script(ScriptArgs),
    /// Inspect configuration.
    Config(ConfigArgs),
    /// Generate shell completions.
    Completions(CompletionsArgs),
}

#[derive(Debug, Clone, Args, Default)]
struct TrialOverrides {
    /// Number of shuffle trials.
    #[arg(long, value_name = "N")]
    trials: Option<u64>,
    /// Comma-separated baseline elements, e.g. `1,2,3,4`.
    #[arg(long, value_name = "LIST")]
    elements: Option<String>,
}

#[derive(Debug, Clone, Args, Default)]
struct EvaluationOverrides {
    /// Expected-count derivation: `exact` or `floor`.
    #[arg(long, value_name = "MODE")]
    expectation: Option<ExpectationMode>,
    /// Fail when the statistic exceeds this value.
    #[arg(long, value_name = "X")]
    max_statistic: Option<f64>,
}

#[derive(Debug, Clone, Args, Default)]
struct RunArgs {
    /// Program under test.
    #[arg(long, value_name = "PATH")]
    program: Option<PathBuf>,
    /// Kill the program if it runs longer than this.
    #[arg(long, value_name = "SECONDS")]
    timeout_secs: Option<u64>,
    /// Accept a non-zero exit status from the program.
    #[arg(long)]
    allow_nonzero_exit: bool,
    /// Keep a copy of the raw transcript.
    #[arg(long, value_name = "PATH")]
    save_transcript: Option<PathBuf>,
    /// Skip the JSONL run log.
    #[arg(long)]
    no_log: bool,
    #[command(flatten)]
    trial: TrialOverrides,
    #[command(flatten)]
    evaluation: EvaluationOverrides,
}

#[derive(Debug, Clone, Args)]
struct AnalyzeArgs {
    /// Transcript file captured from `<program> -v 3`.
    #[arg(value_name = "TRANSCRIPT")]
    transcript: PathBuf,
    #[command(flatten)]
    trial: TrialOverrides,
    #[command(flatten)]
    evaluation: EvaluationOverrides,
}

#[derive(Debug, Clone, Args, Default)]
struct ScriptArgs {
    /// Write the script here instead of stdout.
    #[arg(long, short, value_name = "PATH")]
    output: Option<PathBuf>,
    #[command(flatten)]
    trial: TrialOverrides,
}

#[derive(Debug, Clone, Args, Default)]
struct ConfigArgs {
    /// Config operation to run.
    #[command(subcommand)]
    command: Option<ConfigCommand>,
}

#[derive(Debug, Clone, Subcommand)]
enum ConfigCommand {
    /// Print resolved config file path.
    Path,
    /// Print effective merged configuration.
    Show,
    /// Validate configuration and exit.
    Validate,
}

#[derive(Debug, Clone, Args)]
struct CompletionsArgs {
    /// Shell to generate completion script for.
    #[arg(value_enum)]
    shell: CompletionShell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Human,
    Json,
}

/// CLI error type with explicit exit-code mapping.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid user input or configuration.
    #[error("{0}")]
    User(String),
    /// Launch, session, parse, or integrity failure.
    #[error("{0}")]
    Runtime(String),
    /// The statistic exceeded the configured threshold.
    #[error("{0}")]
    VerdictFail(String),
    /// JSON serialization failed.
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    /// Output write failed.
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

impl CliError {
    /// Process exit code contract for the CLI.
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User(_) => 1,
            Self::Runtime(_) | Self::Io(_) => 2,
            Self::Json(_) => 3,
            Self::VerdictFail(_) => 4,
        }
    }
}

impl From<SuvError> for CliError {
    fn from(value: SuvError) -> Self {
        match value.category() {
            ErrorCategory::Config => Self::User(value.to_string()),
            _ => Self::Runtime(value.to_string()),
        }
    }
}

/// Dispatch CLI commands.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    if cli.no_color {
        control::set_override(false);
    }

    match &cli.command {
        Command::Run(args) => run_run(cli, args),
        Command::Analyze(args) => run_analyze(cli, args),
        Command::Script(args) => run_script(cli, args),
        Command::Config(args) => run_config(cli, args),
        Command::Completions(args) => {
            let mut command = Cli::command();
            let binary_name = command.get_name().to_string();
            generate(args.shell, &mut command, binary_name, &mut io::stdout());
            Ok(())
        }
    }
}

fn run_run(cli: &Cli, args: &RunArgs) -> Result<(), CliError> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(program) = &args.program {
        config.program.path.clone_from(program);
    }
    if let Some(timeout) = args.timeout_secs {
        config.session.timeout_secs = timeout;
    }
    if args.allow_nonzero_exit {
        config.session.allow_nonzero_exit = true;
    }
    if let Some(path) = &args.save_transcript {
        config.session.save_transcript = Some(path.clone());
    }
    apply_trial_overrides(&mut config, &args.trial)?;
    apply_evaluation_overrides(&mut config, &args.evaluation);
    config.validate()?;

    // Launch preflight happens before any script is built.
    let session = ProcessSession::from_config(&config)?;

    let mut log = if args.no_log || !config.logging.jsonl_enabled {
        JsonlWriter::disabled()
    } else {
        JsonlWriter::open(&config.paths.jsonl_log)
    };

    note(
        cli,
        &format!(
            "running {} with {} shuffles of [{}]",
            session.describe(),
            config.trial.count,
            config.trial.elements.tokens().join(" ")
        ),
    );
    let report = run_validation(&config, &session, &mut log)?;
    if cli.verbose && log.lines_written() > 0 {
        note(cli, &format!("run log: {}", log.path().display()));
    }
    emit_report(cli, "run", &report)
}

fn run_analyze(cli: &Cli, args: &AnalyzeArgs) -> Result<(), CliError> {
    let mut config = Config::load(cli.config.as_deref())?;
    apply_trial_overrides(&mut config, &args.trial)?;
    apply_evaluation_overrides(&mut config, &args.evaluation);
    config.validate()?;

    let raw = std::fs::read(&args.transcript)
        .map_err(|source| SuvError::io(&args.transcript, source))?;
    let text = String::from_utf8_lossy(&raw);
    let plan = AnalysisPlan::from_config(&config)?;
    let report = analyze_transcript(&plan, &text)?;
    emit_report(cli, "analyze", &report)
}

fn run_script(cli: &Cli, args: &ScriptArgs) -> Result<(), CliError> {
    let mut config = Config::load(cli.config.as_deref())?;
    apply_trial_overrides(&mut config, &args.trial)?;
    let plan = AnalysisPlan::from_config(&config)?;
    let script = plan.trial.script();

    match &args.output {
        Some(path) => {
            std::fs::write(path, script.as_bytes()).map_err(|source| SuvError::io(path, source))?;
            match output_mode(cli) {
                OutputMode::Human => {
                    if !cli.quiet {
                        println!(
                            "Wrote {} commands ({} bytes) to {}",
                            script.commands(),
                            script.byte_len(),
                            path.display()
                        );
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "script",
                        "path": path.to_string_lossy(),
                        "commands": script.commands(),
                        "bytes": script.byte_len(),
                    });
                    write_json_line(&payload)?;
                }
            }
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(script.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn run_config(cli: &Cli, args: &ConfigArgs) -> Result<(), CliError> {
    match &args.command {
        None | Some(ConfigCommand::Path) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            let exists = path.exists();

            match output_mode(cli) {
                OutputMode::Human => {
                    println!("{}", path.display());
                    if !exists {
                        println!("  (file does not exist; defaults will be used)");
                    }
                }
                OutputMode::Json => {
                    let payload = json!({
                        "command": "config path",
                        "path": path.to_string_lossy(),
                        "exists": exists,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Show) => {
            let config = Config::load(cli.config.as_deref())?;

            match output_mode(cli) {
                OutputMode::Human => {
                    let toml_str = toml::to_string_pretty(&config)
                        .map_err(|e| CliError::Runtime(format!("serialize config: {e}")))?;
                    println!("{toml_str}");
                }
                OutputMode::Json => {
                    let value = serde_json::to_value(&config)?;
                    let payload = json!({
                        "command": "config show",
                        "config": value,
                    });
                    write_json_line(&payload)?;
                }
            }
            Ok(())
        }
        Some(ConfigCommand::Validate) => match Config::load(cli.config.as_deref()) {
            Ok(config) => {
                let hash = config.stable_hash()?;

                match output_mode(cli) {
                    OutputMode::Human => {
                        println!("Configuration is valid.");
                        println!("  Source: {}", config.paths.config_file.display());
                        println!("  Hash: {hash}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": true,
                            "path": config.paths.config_file.to_string_lossy(),
                            "hash": hash,
                        });
                        write_json_line(&payload)?;
                    }
                }
                Ok(())
            }
            Err(e) => {
                match output_mode(cli) {
                    OutputMode::Human => {
                        eprintln!("Configuration is INVALID: {e}");
                    }
                    OutputMode::Json => {
                        let payload = json!({
                            "command": "config validate",
                            "valid": false,
                            "error_code": e.code(),
                            "error": e.to_string(),
                        });
                        write_json_line(&payload)?;
                    }
                }
                Err(CliError::User(format!("invalid config: {e}")))
            }
        },
    }
}

fn apply_trial_overrides(config: &mut Config, overrides: &TrialOverrides) -> Result<(), CliError> {
    if let Some(trials) = overrides.trials {
        config.trial.count = trials;
    }
    if let Some(raw) = &overrides.elements {
        config.trial.elements = ElementSet::parse_list(raw)?;
    }
    Ok(())
}

fn apply_evaluation_overrides(config: &mut Config, overrides: &EvaluationOverrides) {
    if let Some(mode) = overrides.expectation {
        config.evaluation.expectation = mode;
    }
    if let Some(max) = overrides.max_statistic {
        config.evaluation.max_statistic = Some(max);
    }
}

fn emit_report(cli: &Cli, command: &str, report: &ValidationReport) -> Result<(), CliError> {
    match output_mode(cli) {
        OutputMode::Human => print_report_human(cli, report),
        OutputMode::Json => {
            let payload = json!({
                "command": command,
                "report": serde_json::to_value(report)?,
            });
            write_json_line(&payload)?;
        }
    }

    if report.failed() {
        return Err(CliError::VerdictFail(format!(
            "chi-squared {:.3} exceeds max {:.3}",
            report.evaluation.statistic,
            report.max_statistic.unwrap_or_default()
        )));
    }
    Ok(())
}

fn print_report_human(cli: &Cli, report: &ValidationReport) {
    let eval = &report.evaluation;
    println!(
        "{} [{}] ({} permutations)",
        "Shuffle uniformity".bold(),
        report.elements.join(" "),
        eval.classes
    );
    if let Some(session) = &report.session {
        let exit = session
            .exit_code
            .map_or_else(|| "?".to_string(), |c| c.to_string());
        println!(
            "  Program:      {} (exit {exit}, {:.1}s)",
            session.program,
            session.elapsed_ms as f64 / 1000.0
        );
    }

    let parsed = format!(
        "{} requested, {} parsed",
        report.trials_requested, report.observations
    );
    if report.complete {
        println!("  Trials:       {parsed}");
    } else {
        println!(
            "  Trials:       {parsed} {}",
            format!("(INCOMPLETE: shortfall {})", report.shortfall).yellow()
        );
    }
    if report.malformed_dumps > 0 {
        println!(
            "  Malformed:    {}",
            format!("{} dump lines skipped", report.malformed_dumps).yellow()
        );
    }
    println!(
        "  Expectation:  {:.3} per class ({})",
        eval.expected,
        eval.mode.as_str()
    );
    println!(
        "  Chi-squared:  {:.3} (df {})",
        eval.statistic, eval.degrees_of_freedom
    );
    match (report.verdict, report.max_statistic) {
        (Some(Verdict::Pass), Some(max)) => {
            println!("  Verdict:      {} (max {max})", "PASS".green().bold());
        }
        (Some(Verdict::Fail), Some(max)) => {
            println!("  Verdict:      {} (max {max})", "FAIL".red().bold());
        }
        _ => println!("  Verdict:      none (no max_statistic configured)"),
    }

    if cli.quiet {
        return;
    }
    println!();
    println!("  {:<12} {:>10} {:>10}", "Permutation", "Count", "Deviation");
    for class in &report.classes {
        let deviation = (class.count as f64 - eval.expected) / eval.expected * 100.0;
        println!(
            "  {:<12} {:>10} {:>9.2}%",
            class.permutation, class.count, deviation
        );
    }
}

/// Progress note on stderr; suppressed by `--quiet` and in JSON mode.
fn note(cli: &Cli, message: &str) {
    if cli.quiet || output_mode(cli) == OutputMode::Json {
        return;
    }
    eprintln!("{} {message}", "[SUV]".dimmed());
}

fn write_json_line(payload: &Value) -> Result<(), CliError> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, payload)?;
    writeln!(stdout)?;
    Ok(())
}

fn output_mode(cli: &Cli) -> OutputMode {
    let env_mode = std::env::var("SUV_OUTPUT_FORMAT").ok();
    resolve_output_mode(cli.json, env_mode.as_deref(), io::stdout().is_terminal())
}

fn resolve_output_mode(json_flag: bool, env_mode: Option<&str>, stdout_is_tty: bool) -> OutputMode {
    if json_flag {
        return OutputMode::Json;
    }

    let fallback = if stdout_is_tty {
        OutputMode::Human
    } else {
        OutputMode::Json
    };

    match env_mode
        .map(str::trim)
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("json") => OutputMode::Json,
        Some("human") => OutputMode::Human,
        _ => fallback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_before_and_after_subcommand() {
        let before = Cli::try_parse_from([
            "shufv",
            "--config",
            "/tmp/shufv.toml",
            "--json",
            "--no-color",
            "-v",
            "run",
        ]);
        assert!(before.is_ok());

        let after = Cli::try_parse_from(["shufv", "run", "--json", "--no-color", "-q"]);
        assert!(after.is_ok());
    }

    #[test]
    fn parses_all_subcommands() {
        let cases = [
            vec!["shufv", "run", "--program", "./qtest", "--trials", "24000"],
            vec![
                "shufv",
                "run",
                "--elements",
                "a,b,c",
                "--expectation",
                "floor",
                "--max-statistic",
                "11.07",
                "--timeout-secs",
                "30",
                "--save-transcript",
                "/tmp/t.txt",
                "--allow-nonzero-exit",
                "--no-log",
            ],
            vec!["shufv", "analyze", "/tmp/transcript.txt", "--trials", "100"],
            vec!["shufv", "script", "--trials", "5", "-o", "/tmp/cmds"],
            vec!["shufv", "config", "path"],
            vec!["shufv", "config", "show"],
            vec!["shufv", "config", "validate"],
            vec!["shufv", "completions", "bash"],
        ];

        for case in cases {
            let parsed = Cli::try_parse_from(case.clone());
            assert!(parsed.is_ok(), "failed to parse {case:?}: {parsed:?}");
        }
    }

    #[test]
    fn rejects_unknown_expectation_mode() {
        let parsed = Cli::try_parse_from(["shufv", "run", "--expectation", "median"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["shufv", "-v", "-q", "run"]).is_err());
    }

    #[test]
    fn output_mode_resolution_honors_precedence() {
        assert_eq!(
            resolve_output_mode(true, Some("human"), true),
            OutputMode::Json
        );
        assert_eq!(
            resolve_output_mode(false, Some("json"), true),
            OutputMode::Json
        );
        assert_eq!(
            resolve_output_mode(false, Some("human"), false),
            OutputMode::Human
        );
        assert_eq!(
            resolve_output_mode(false, Some("auto"), true),
            OutputMode::Human
        );
        assert_eq!(resolve_output_mode(false, None, false), OutputMode::Json);
    }

    #[test]
    fn suv_errors_map_to_exit_codes() {
        let config: CliError = SuvError::InvalidTrialPlan {
            details: "x".to_string(),
        }
        .into();
        assert_eq!(config.exit_code(), 1);

        let session: CliError = SuvError::SessionTimeout { timeout_secs: 1 }.into();
        assert_eq!(session.exit_code(), 2);

        let integrity: CliError = SuvError::Integrity {
            index: 0,
            observation: String::new(),
        }
        .into();
        assert_eq!(integrity.exit_code(), 2);

        assert_eq!(CliError::VerdictFail(String::new()).exit_code(), 4);
    }
}
