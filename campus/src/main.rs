use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use indexmap::IndexMap;
use roster_sync::attendance::AttendanceSubmission;
use roster_sync::client::SchoolClient;
use roster_sync::finalize::FinalizeStatus;
use roster_sync::marks::MarksSubmission;
use roster_sync::projector::{load_attendance_roster, load_marks_roster};
use roster_sync::types::{AttendanceRecord, MarkRecord, SectionId, StudentId, SubjectId};
use roster_sync::{ApiError, BatchReport, SubmitError, Submitter, UpsertOutcome};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

mod config;
mod edits;
mod telemetry;

use config::{Config, ConfigError};
use edits::EditsError;

#[derive(Parser)]
#[command(name = "campus", about = "Bulk attendance and marks submission")]
struct Cli {
    /// Path to the YAML config file
    #[arg(long, default_value = "campus.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Record attendance for every student in a section and finalize the day
    SubmitAttendance {
        #[arg(long)]
        section: SectionId,
        #[arg(long)]
        date: NaiveDate,
        /// JSON object of student id to PRESENT or ABSENT
        #[arg(long)]
        edits: Option<PathBuf>,
    },
    /// Record entered marks and finalize the exam if anything was written
    SubmitMarks {
        #[arg(long)]
        section: SectionId,
        #[arg(long)]
        subject: SubjectId,
        #[arg(long)]
        exam: String,
        /// JSON object of student id to the entered mark
        #[arg(long)]
        edits: PathBuf,
    },
    /// Re-issue only the attendance finalize call
    FinalizeAttendance {
        #[arg(long)]
        section: SectionId,
        #[arg(long)]
        date: NaiveDate,
    },
    /// Re-issue only the marks finalize call
    FinalizeMarks {
        #[arg(long)]
        section: SectionId,
        #[arg(long)]
        subject: SubjectId,
        #[arg(long)]
        exam: String,
    },
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Edits(#[from] EditsError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Attendance(#[from] SubmitError<AttendanceRecord>),
    #[error(transparent)]
    Marks(#[from] SubmitError<MarkRecord>),
    #[error("could not start runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            report_config_error(&cli.config, e);
            return ExitCode::FAILURE;
        }
    };

    let _sentry = telemetry::init_logging(&config.common.logging);
    if let Some(metrics) = &config.common.metrics
        && let Err(e) = telemetry::init_metrics(metrics)
    {
        tracing::warn!(error = %e, "Metrics disabled");
    }

    match run(cli.command, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn report_config_error(path: &std::path::Path, error: ConfigError) {
    eprintln!("error: {}: {error}", path.display());
}

fn run(command: CliCommand, config: Config) -> Result<(), CliError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(execute(command, config))
}

async fn execute(command: CliCommand, config: Config) -> Result<(), CliError> {
    let client = Arc::new(SchoolClient::new(&config.sync.api)?);
    let submitter = Submitter::new(config.sync.submission.concurrency);

    match command {
        CliCommand::SubmitAttendance {
            section,
            date,
            edits,
        } => {
            let toggles = match edits {
                Some(path) => edits::read_attendance(&path)?,
                None => IndexMap::new(),
            };
            let roster = load_attendance_roster(client.as_ref(), section, date, &toggles).await?;
            let students: Vec<StudentId> = roster.iter().map(|entry| entry.student_id).collect();

            let submission = Arc::new(AttendanceSubmission::new(client, section, date));
            let result = submitter.submit(submission, roster).await;
            print_summary(&students, report_of(&result));
            result?;
        }
        CliCommand::SubmitMarks {
            section,
            subject,
            exam,
            edits,
        } => {
            let entered = edits::read_marks(&edits)?;
            let roster = load_marks_roster(client.as_ref(), section, subject, &exam, &entered).await?;
            let students: Vec<StudentId> = roster.iter().map(|entry| entry.student_id).collect();

            let submission = Arc::new(MarksSubmission::new(client, section, subject, exam));
            let result = submitter.submit(submission, roster).await;
            print_summary(&students, report_of(&result));
            result?;
        }
        CliCommand::FinalizeAttendance { section, date } => {
            let submission = AttendanceSubmission::new(client, section, date);
            submitter.retry_finalize(&submission).await?;
            println!("Attendance for section {section} on {date} finalized");
        }
        CliCommand::FinalizeMarks {
            section,
            subject,
            exam,
        } => {
            let submission = MarksSubmission::new(client, section, subject, exam.as_str());
            submitter.retry_finalize(&submission).await?;
            println!("Marks for section {section}, subject {subject}, {exam} finalized");
        }
    }

    Ok(())
}

fn report_of<R: std::fmt::Debug>(
    result: &Result<BatchReport<R>, SubmitError<R>>,
) -> &BatchReport<R> {
    match result {
        Ok(report) => report,
        Err(e) => e.report(),
    }
}

fn print_summary<R>(students: &[StudentId], report: &BatchReport<R>) {
    for (student_id, outcome) in students.iter().zip(&report.outcomes) {
        match outcome {
            UpsertOutcome::Success(_) => println!("{student_id:>8}  saved"),
            UpsertOutcome::SkippedConflict { kind, .. } => {
                println!("{student_id:>8}  skipped: {}", kind.user_message())
            }
            UpsertOutcome::Failure(e) => println!("{student_id:>8}  failed: {e}"),
        }
    }

    let finalize = match &report.finalize {
        FinalizeStatus::Submitted => "submitted".to_string(),
        FinalizeStatus::Skipped => "skipped, nothing to submit".to_string(),
        FinalizeStatus::Failed(e) => format!("failed: {e}"),
    };
    println!(
        "{} {}: {} saved, {} skipped, {} failed; finalize {finalize}",
        report.outcomes.len(),
        report.kind,
        report.effective_write_count,
        report.conflict_count(),
        report.failed_indices().len(),
    );
}
