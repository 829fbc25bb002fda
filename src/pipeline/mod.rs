//! Script → session → parse → tally → evaluate, in that order.

pub mod report;

use std::fs;
use std::time::Instant;

use crate::core::config::Config;
use crate::core::errors::{Result, SuvError};
use crate::logger::jsonl::{EventType, JsonlWriter, LogEntry, Severity};
use crate::pipeline::report::{SessionSummary, ValidationReport, Verdict, sha256_hex};
use crate::script::builder::TrialPlan;
use crate::session::runner::TranscriptSource;
use crate::stats::chi_squared::{ExpectationMode, evaluate};
use crate::stats::frequency::FrequencyTable;
use crate::stats::permutation::PermutationSpace;
use crate::transcript::extract_observations;
use crate::transcript::window::Markers;

/// Trial plan plus evaluation settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisPlan {
    pub trial: TrialPlan,
    pub expectation: ExpectationMode,
    pub max_statistic: Option<f64>,
}

impl AnalysisPlan {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            trial: TrialPlan::new(config.trial.elements.clone(), config.trial.count)?,
            expectation: config.evaluation.expectation,
            max_statistic: config.evaluation.max_statistic,
        })
    }
}

/// Evaluate an already-captured transcript.
///
/// A missing seed or teardown dump means the session never produced a usable
/// window, which is an error rather than an empty sample.
pub fn analyze_transcript(plan: &AnalysisPlan, transcript: &str) -> Result<ValidationReport> {
    let elements = plan.trial.elements();
    let markers = Markers::for_elements(elements);
    let extraction = extract_observations(transcript, &markers, elements.len());

    if !extraction.seed_found {
        return Err(SuvError::SeedMarkerMissing {
            marker: markers.seed,
        });
    }
    if !extraction.teardown_found {
        return Err(SuvError::TeardownMarkerMissing {
            marker: markers.teardown,
        });
    }
    if extraction.observations.is_empty() {
        return Err(SuvError::NoObservations);
    }

    let space = PermutationSpace::enumerate(elements);
    let table = FrequencyTable::tally(&space, &extraction.observations)?;
    let evaluation = evaluate(&table, plan.expectation)?;

    let observations = table.total();
    let requested = plan.trial.trials();
    Ok(ValidationReport {
        elements: elements.tokens().to_vec(),
        trials_requested: requested,
        observations,
        shortfall: signed_shortfall(requested, observations),
        complete: observations == requested,
        malformed_dumps: extraction.malformed_dumps,
        verdict: plan
            .max_statistic
            .map(|max| Verdict::judge(evaluation.statistic, max)),
        max_statistic: plan.max_statistic,
        evaluation,
        classes: ValidationReport::class_counts(&table),
        transcript_bytes: transcript.len() as u64,
        transcript_sha256: sha256_hex(transcript.as_bytes()),
        session: None,
    })
}

/// Run one full validation against `source` and log each stage.
pub fn run_validation(
    config: &Config,
    source: &dyn TranscriptSource,
    log: &mut JsonlWriter,
) -> Result<ValidationReport> {
    let started = Instant::now();
    let result = run_stages(config, source, log);
    match &result {
        Ok(report) => {
            let mut entry = LogEntry::new(
                EventType::Evaluation,
                if report.failed() {
                    Severity::Warning
                } else {
                    Severity::Info
                },
            );
            entry.observations = Some(report.observations);
            entry.expected = Some(report.evaluation.expected);
            entry.statistic = Some(report.evaluation.statistic);
            entry.degrees_of_freedom = Some(report.evaluation.degrees_of_freedom);
            entry.duration_ms = Some(elapsed_ms(started));
            entry.ok = Some(!report.failed());
            entry.details = report.verdict.map(|v| v.as_str().to_string());
            log.write_entry(&entry);
        }
        Err(error) => {
            let mut entry = LogEntry::failure(error);
            entry.duration_ms = Some(elapsed_ms(started));
            log.write_entry(&entry);
        }
    }
    log.flush();
    result
}

fn run_stages(
    config: &Config,
    source: &dyn TranscriptSource,
    log: &mut JsonlWriter,
) -> Result<ValidationReport> {
    let plan = AnalysisPlan::from_config(config)?;
    let program = source.describe();

    let mut entry = LogEntry::new(EventType::RunStart, Severity::Info);
    entry.program = Some(program.clone());
    entry.trials = Some(plan.trial.trials());
    entry.config_hash = config.stable_hash().ok();
    log.write_entry(&entry);

    let script = plan.trial.script();
    let transcript = source.capture(&script)?;

    let mut entry = LogEntry::new(EventType::SessionComplete, Severity::Info);
    entry.transcript_bytes = Some(transcript.stdout.len() as u64);
    entry.duration_ms = Some(u64::try_from(transcript.elapsed.as_millis()).unwrap_or(u64::MAX));
    entry.ok = Some(!transcript.stdin_truncated);
    if transcript.stdin_truncated {
        entry.details = Some("program closed stdin before the script ended".to_string());
    }
    log.write_entry(&entry);

    if let Some(path) = &config.session.save_transcript {
        fs::write(path, &transcript.stdout).map_err(|source| SuvError::io(path, source))?;
    }

    let mut report = analyze_transcript(&plan, &transcript.stdout)?;
    report.session = Some(SessionSummary {
        program,
        exit_code: transcript.exit_code,
        elapsed_ms: u64::try_from(transcript.elapsed.as_millis()).unwrap_or(u64::MAX),
        stdin_truncated: transcript.stdin_truncated,
    });

    let mut entry = LogEntry::new(EventType::TranscriptParsed, Severity::Info);
    entry.trials = Some(report.trials_requested);
    entry.observations = Some(report.observations);
    if report.malformed_dumps > 0 {
        entry.details = Some(format!("{} malformed dumps skipped", report.malformed_dumps));
    }
    log.write_entry(&entry);

    if !report.complete {
        let mut entry = LogEntry::new(EventType::ParseShortfall, Severity::Warning);
        entry.trials = Some(report.trials_requested);
        entry.observations = Some(report.observations);
        entry.details = Some(format!("shortfall {}", report.shortfall));
        log.write_entry(&entry);
    }

    Ok(report)
}

/// `requested − observed`, saturating at the `i64` range.
fn signed_shortfall(requested: u64, observed: u64) -> i64 {
    if requested >= observed {
        i64::try_from(requested - observed).unwrap_or(i64::MAX)
    } else {
        i64::try_from(observed - requested).map_or(-i64::MAX, |n| -n)
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
