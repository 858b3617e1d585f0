use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

mod alert;
mod checkin;
mod db;
mod geo;
mod ledger;
mod models;
mod report;
mod risk;

use checkin::Outcome;
use ledger::AppendOutcome;
use models::CheckInAttempt;

#[derive(Parser)]
#[command(name = "class-attendance")]
#[command(about = "Geofenced class attendance check-in and risk tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// List currently open sessions
    Sessions,
    /// Open a geofenced class session
    OpenSession {
        #[arg(long)]
        lecturer: Uuid,
        #[arg(long)]
        course_code: String,
        #[arg(long)]
        course_title: String,
        #[arg(long)]
        latitude: f64,
        #[arg(long)]
        longitude: f64,
        #[arg(long)]
        radius_meters: f64,
    },
    /// Close a session (one-way; it never reopens)
    CloseSession {
        #[arg(long)]
        session: Uuid,
        #[arg(long)]
        lecturer: Uuid,
    },
    /// Submit a student check-in against an open session
    CheckIn {
        #[arg(long)]
        student: Uuid,
        #[arg(long)]
        session: Uuid,
        #[arg(long)]
        latitude: f64,
        #[arg(long)]
        longitude: f64,
        #[arg(long)]
        ip: String,
        #[arg(long)]
        device: String,
    },
    /// Lecturer manual attendance entry (skips geofence and device checks)
    ManualAdd {
        #[arg(long)]
        student: Uuid,
        #[arg(long)]
        session: Uuid,
    },
    /// Generate a markdown roster report for a session
    Report {
        #[arg(long)]
        session: Uuid,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Export a session roster as CSV
    Export {
        #[arg(long)]
        session: Uuid,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Score attendance risk for a course
    Risk {
        #[arg(long)]
        course: String,
        #[arg(long)]
        lecturer: Uuid,
        /// Emit the results as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// List students below the alert threshold for a course
    Alerts {
        #[arg(long)]
        course: String,
        #[arg(long)]
        lecturer: Uuid,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Sessions => {
            let sessions = db::active_sessions(&pool).await?;
            if sessions.is_empty() {
                println!("No open sessions.");
            }
            for s in sessions {
                println!(
                    "- {} {} ({}) by {}, radius {:.0}m, id {}",
                    s.course_code, s.course_title, s.created_at.format("%Y-%m-%d %H:%M"),
                    s.lecturer_name, s.radius_meters, s.id
                );
            }
        }
        Commands::OpenSession {
            lecturer,
            course_code,
            course_title,
            latitude,
            longitude,
            radius_meters,
        } => {
            let session = db::open_session(
                &pool,
                lecturer,
                &course_code,
                &course_title,
                latitude,
                longitude,
                radius_meters,
            )
            .await?;
            println!(
                "Session {} opened for {}: {} ({}).",
                session.id,
                session.course_code,
                session.course_title,
                session.created_at.format("%Y-%m-%d %H:%M")
            );
        }
        Commands::CloseSession { session, lecturer } => {
            if db::close_session(&pool, session, lecturer).await? {
                println!("Session {session} closed.");
            } else {
                println!("Nothing to close: session not found, not yours, or already closed.");
            }
        }
        Commands::CheckIn {
            student,
            session,
            latitude,
            longitude,
            ip,
            device,
        } => {
            let session = db::fetch_session(&pool, session)
                .await?
                .context("unknown session id")?;
            let existing = ledger::records_for_session(&pool, session.id).await?;
            let attempt = CheckInAttempt {
                student_id: student,
                session_id: session.id,
                latitude,
                longitude,
                client_ip: ip,
                device_signature: device,
            };

            match checkin::evaluate(&attempt, &session, &existing, Utc::now())? {
                Outcome::Accepted(record) => {
                    // A lost race on the unique key reads as a duplicate,
                    // not a storage failure.
                    match ledger::try_append(&pool, &record).await? {
                        AppendOutcome::Inserted => {
                            let attended = ledger::count_by_student_and_course(
                                &pool,
                                student,
                                &session.course_code,
                            )
                            .await?;
                            println!(
                                "Attendance recorded ({attended} sessions of {} so far).",
                                session.course_code
                            );
                        }
                        AppendOutcome::AlreadyExists => println!(
                            "{}",
                            checkin::RejectReason::AlreadyCheckedIn.message()
                        ),
                    }
                }
                Outcome::Rejected(reason) => println!("Check-in rejected: {}", reason.message()),
            }
        }
        Commands::ManualAdd { student, session } => {
            let session = db::fetch_session(&pool, session)
                .await?
                .context("unknown session id")?;
            let existing = ledger::records_for_session(&pool, session.id).await?;

            match checkin::manual_entry(student, &session, &existing, Utc::now()) {
                Outcome::Accepted(record) => match ledger::try_append(&pool, &record).await? {
                    AppendOutcome::Inserted => println!("Manual attendance recorded."),
                    AppendOutcome::AlreadyExists => println!(
                        "{}",
                        checkin::RejectReason::AlreadyCheckedIn.message()
                    ),
                },
                Outcome::Rejected(reason) => {
                    println!("Manual add rejected: {}", reason.message())
                }
            }
        }
        Commands::Report { session, out } => {
            let session = db::fetch_session_with_lecturer(&pool, session)
                .await?
                .context("unknown session id")?;
            let entries = ledger::list_by_session(&pool, session.id).await?;
            let report = report::build_session_report(&session, &entries);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export { session, out } => {
            let session_row = db::fetch_session(&pool, session)
                .await?
                .context("unknown session id")?;
            let entries = ledger::list_by_session(&pool, session_row.id).await?;
            let csv = report::export_csv(&entries)?;
            let out = out.unwrap_or_else(|| {
                PathBuf::from(format!(
                    "Attendance_{}_{}.csv",
                    session_row.course_code, session_row.id
                ))
            });
            std::fs::write(&out, csv)?;
            println!("Exported {} rows to {}.", entries.len(), out.display());
        }
        Commands::Risk {
            course,
            lecturer,
            json,
        } => {
            let held = db::count_sessions_held(&pool, &course, lecturer).await?;
            let rows = db::course_attendance(&pool, &course).await?;
            let results = risk::compute_risk(&course, held, &rows);

            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
                return Ok(());
            }

            if results.is_empty() {
                println!("No attendance recorded for {course}.");
                return Ok(());
            }
            println!("Attendance risk for {course} ({held} sessions held):");
            for r in &results {
                println!(
                    "- {} ({}): {}/{} sessions, {:.1}% [{}]",
                    r.student_name,
                    r.student_email,
                    r.sessions_attended,
                    r.sessions_held,
                    r.percentage,
                    r.tier.label()
                );
            }
        }
        Commands::Alerts { course, lecturer } => {
            let held = db::count_sessions_held(&pool, &course, lecturer).await?;
            let rows = db::course_attendance(&pool, &course).await?;
            let results = risk::compute_risk(&course, held, &rows);
            let at_risk = alert::select_at_risk(&results);

            if at_risk.is_empty() {
                println!("No students below the alert threshold for {course}.");
                return Ok(());
            }

            let lecturer_contact = db::lecturer_email(&pool, lecturer)
                .await?
                .unwrap_or_else(|| "unknown".to_string());
            println!("Students to notify for {course} (lecturer contact {lecturer_contact}):");
            for r in &at_risk {
                println!(
                    "- {} <{}> at {:.1}% attendance",
                    r.student_name, r.student_email, r.percentage
                );
            }
        }
    }

    Ok(())
}
