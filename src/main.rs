use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod client;
mod config;
mod form;
mod grades;
mod lookup;
mod models;
mod render;
mod report;
mod session;

use crate::client::ApiClient;
use crate::config::Config;
use crate::form::{EditMode, EvaluationForm};
use crate::session::SessionStore;

#[derive(Parser)]
#[command(name = "boletim")]
#[command(about = "Grade evaluations and report cards for the school records system", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and remember the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "BOLETIM_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Forget the stored session
    Logout,
    /// Show who is logged in
    Whoami,
    /// Replace the password of the logged-in user
    ChangePassword {
        #[arg(long = "new")]
        new_password: String,
    },
    /// List evaluations with joined names, averages and status
    List {
        #[arg(long)]
        student: Option<i64>,
    },
    /// Write a student's report card
    Report {
        #[arg(long)]
        student: Option<i64>,
        #[arg(long)]
        out: Option<PathBuf>,
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Create an evaluation, or update one with --id
    Save {
        #[arg(long)]
        id: Option<i64>,
        #[command(flatten)]
        form: EvaluationForm,
    },
    /// Delete an evaluation
    Delete {
        #[arg(long)]
        id: i64,
    },
    /// Create evaluations from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Compute the weighted average and status of two scores
    Average {
        #[arg(long)]
        exam: Option<f64>,
        #[arg(long)]
        assignment: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("invalid configuration")?;
    let store = SessionStore::new(&config.session_path);

    match cli.command {
        Commands::Average { exam, assignment } => {
            let (average, status) = grades::grade(exam, assignment);
            println!("Average {average:.1} ({status})");
        }
        Commands::Login { email, password } => {
            let client = ApiClient::new(&config)?;
            let session = client.login(&email, &password).await?;
            store.save(&session)?;
            info!(user_id = session.user_id, role = ?session.role, "logged in");
            println!("Logged in as {} ({:?}).", session.name, session.role);
            if session.must_change_password {
                println!("First access: run `boletim change-password --new <password>`.");
            }
        }
        Commands::Logout => {
            store.clear()?;
            println!("Logged out.");
        }
        Commands::Whoami => match store.load()? {
            Some(session) => println!(
                "{} ({:?}, id {})",
                session.name, session.role, session.user_id
            ),
            None => println!("Not logged in."),
        },
        Commands::ChangePassword { new_password } => {
            let mut session = store.require()?;
            let client = ApiClient::new(&config)?;
            client
                .change_password(session.user_id, &new_password)
                .await?;
            session.must_change_password = false;
            store.save(&session)?;
            println!("Password changed.");
        }
        Commands::List { student } => {
            let session = store.require()?;
            let client = ApiClient::new(&config)?;
            let (evaluations, lookups) =
                tokio::try_join!(client.fetch_evaluations(), client.fetch_lookups())?;

            let visible = report::visible_evaluations(&session, &evaluations)
                .into_iter()
                .filter(|evaluation| student.map_or(true, |id| evaluation.student_id == Some(id)));
            let rows = report::build_listing(visible, &lookups);
            print!("{}", render::format_listing(&rows));
        }
        Commands::Report { student, out, csv } => {
            let session = store.require()?;
            let student_id = session.report_student(student)?;
            let client = ApiClient::new(&config)?;
            let (fetched, detail) = tokio::join!(
                async { tokio::try_join!(client.fetch_evaluations(), client.fetch_lookups()) },
                client.fetch_student_detail(student_id)
            );
            let (evaluations, lookups) = fetched?;
            let meta = report::student_meta_or_none(student_id, detail);

            let card = report::build_report(&evaluations, student_id, &lookups, meta);
            let out = out.unwrap_or_else(|| {
                PathBuf::from(render::report_file_name(card.student_meta.as_ref()))
            });
            let markdown = render::render_markdown(&card, chrono::Local::now().date_naive());
            std::fs::write(&out, markdown)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());

            if let Some(path) = csv {
                let file = std::fs::File::create(&path)
                    .with_context(|| format!("failed to create {}", path.display()))?;
                render::write_csv(&card.rows, file)?;
                println!("CSV written to {}.", path.display());
            }
        }
        Commands::Save { id, form } => {
            let session = store.require()?;
            let mode = EditMode::for_session(&session, id);
            let payload = form.validate()?;
            let client = ApiClient::new(&config)?;
            let saved = client.save_evaluation(mode, &payload).await?;
            println!(
                "Evaluation {} {}.",
                saved.id.or(id).map_or_else(|| "?".to_string(), |id| id.to_string()),
                mode.past_tense()
            );
        }
        Commands::Delete { id } => {
            store.require()?.require_manager()?;
            let client = ApiClient::new(&config)?;
            client.delete_evaluation(id).await?;
            println!("Evaluation {id} deleted.");
        }
        Commands::Import { csv } => {
            store.require()?.require_manager()?;
            let client = ApiClient::new(&config)?;
            let inserted = import_csv(&client, &csv).await?;
            println!("Created {inserted} evaluations from {}.", csv.display());
        }
    }

    Ok(())
}

async fn import_csv(client: &ApiClient, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut inserted = 0usize;

    for (line, result) in reader.deserialize::<EvaluationForm>().enumerate() {
        let row = result.with_context(|| format!("malformed CSV row {}", line + 1))?;
        let payload = row
            .validate()
            .with_context(|| format!("invalid CSV row {}", line + 1))?;
        client.save_evaluation(EditMode::Creating, &payload).await?;
        inserted += 1;
    }

    Ok(inserted)
}
