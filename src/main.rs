use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use grade_aggregator::assignments::AssignmentDraft;
use grade_aggregator::config::{self, GradePolicy};
use grade_aggregator::models::AssignmentType;
use grade_aggregator::{compute_gpa, db, report, GradeScale};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{metadata::LevelFilter, Level};
use tracing_subscriber::{fmt, prelude::*, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "grade-aggregator")]
#[command(about = "Grade and GPA aggregation for the Group Scholar gradebook", long_about = None)]
struct Cli {
    /// Grade policy YAML (defaults to $GRADE_POLICY, then the built-in policy)
    #[arg(long, global = true)]
    policy: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import graded assignments from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Record one graded assignment
    Record {
        #[arg(long)]
        email: String,
        #[arg(long)]
        course: String,
        #[arg(long)]
        semester: String,
        #[arg(long = "type")]
        kind: AssignmentType,
        #[arg(long)]
        name: String,
        #[arg(long)]
        score: f64,
        #[arg(long)]
        comments: Option<String>,
        /// Defaults to today
        #[arg(long)]
        graded_date: Option<NaiveDate>,
        #[arg(long, default_value_t = 0)]
        days_late: u32,
    },
    /// Compute a student's GPA
    Gpa {
        #[arg(long)]
        email: String,
        #[arg(long)]
        semester: Option<String>,
        /// Print the dashboard JSON shape instead of text
        #[arg(long)]
        json: bool,
    },
    /// Write a markdown transcript
    Transcript {
        #[arg(long)]
        email: String,
        #[arg(long)]
        semester: Option<String>,
        #[arg(long, default_value = "transcript.md")]
        out: PathBuf,
    },
    /// Export a student's grades as CSV
    Export {
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "grades.csv")]
        out: PathBuf,
    },
    /// Validate the grade policy without touching the database
    CheckPolicy,
}

async fn connect() -> anyhow::Result<PgPool> {
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")
}

fn load_policy(path: Option<PathBuf>) -> anyhow::Result<(GradePolicy, GradeScale)> {
    let policy = config::load_policy(path)?;
    if let Err(errors) = config::validate_policy(&policy) {
        anyhow::bail!("Grade policy errors:\n  - {}", errors.join("\n  - "));
    }
    let scale = policy.grade_scale()?;
    Ok((policy, scale))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::registry()
        .with(fmt::layer().without_time().with_target(false))
        .with(LevelFilter::from_level(level))
        .init();

    let (policy, scale) = load_policy(cli.policy)?;

    match cli.command {
        Commands::InitDb => {
            let pool = connect().await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            let pool = connect().await?;
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let pool = connect().await?;
            let summary =
                db::import_csv(&pool, &csv, policy.late_penalty_percent_per_day).await?;
            tracing::info!(
                inserted = summary.inserted,
                duplicates = summary.duplicates,
                rejected = summary.rejected,
                "import finished"
            );
            println!(
                "Inserted {} grades from {} ({} duplicates, {} rejected).",
                summary.inserted,
                csv.display(),
                summary.duplicates,
                summary.rejected
            );
        }
        Commands::Record {
            email,
            course,
            semester,
            kind,
            name,
            score,
            comments,
            graded_date,
            days_late,
        } => {
            let pool = connect().await?;
            let graded_date = graded_date.unwrap_or_else(|| Utc::now().date_naive());
            let assignment = db::record_grade(
                &pool,
                &email,
                &course,
                &semester,
                |enrollment_id| AssignmentDraft {
                    enrollment_id,
                    kind,
                    name,
                    score,
                    comments,
                    graded_date,
                    days_late,
                },
                policy.late_penalty_percent_per_day,
            )
            .await?;
            let letter = scale.letter_and_point(assignment.score)?;
            println!(
                "Recorded {} '{}' for {} in {}: {:.2} ({}).",
                assignment.kind, assignment.name, email, course, assignment.score, letter.label
            );
        }
        Commands::Gpa {
            email,
            semester,
            json,
        } => {
            let pool = connect().await?;
            let snapshot = db::load_snapshot(&pool, &email).await?;
            let result = compute_gpa(
                snapshot.student.id,
                &snapshot.enrollments,
                &snapshot.assignments,
                scale.entries(),
                &policy.gpa_options(semester),
            )?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result.view())?);
                return Ok(());
            }

            if result.breakdown.is_empty() {
                println!("No enrollments found for {}.", snapshot.student.full_name);
            }
            let view = result.view();
            for course in view.breakdown {
                println!(
                    "- {} ({} credits) average {} grade {}",
                    course.course,
                    course.credits,
                    course
                        .average
                        .map(|a| format!("{a:.2}"))
                        .unwrap_or_else(|| "n/a".to_string()),
                    course.letter_grade.as_deref().unwrap_or("-")
                );
            }
            println!("GPA for {}: {:.2}", snapshot.student.full_name, view.gpa);
        }
        Commands::Transcript {
            email,
            semester,
            out,
        } => {
            let pool = connect().await?;
            let snapshot = db::load_snapshot(&pool, &email).await?;
            let result = compute_gpa(
                snapshot.student.id,
                &snapshot.enrollments,
                &snapshot.assignments,
                scale.entries(),
                &policy.gpa_options(semester.clone()),
            )?;
            let transcript = report::build_transcript(
                &snapshot.student,
                &result,
                &snapshot.assignments,
                &scale,
                policy.passing_grade(),
                semester.as_deref(),
            );
            std::fs::write(&out, transcript)?;
            println!("Transcript written to {}.", out.display());
        }
        Commands::Export { email, out } => {
            let pool = connect().await?;
            let snapshot = db::load_snapshot(&pool, &email).await?;
            let file = std::fs::File::create(&out)
                .with_context(|| format!("failed to create {}", out.display()))?;
            let written = report::export_grades_csv(
                file,
                &snapshot.enrollments,
                &snapshot.assignments,
                &scale,
                policy.include_plus_minus,
            )?;
            println!("Exported {} grades to {}.", written, out.display());
        }
        Commands::CheckPolicy => {
            println!(
                "Grade policy OK: {} scale entries, passing grade {}, {} GPA.",
                scale.entries().len(),
                policy.passing_grade(),
                if policy.weight_by_credits { "credit-weighted" } else { "unweighted" }
            );
        }
    }

    Ok(())
}
