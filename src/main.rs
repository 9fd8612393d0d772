use anyhow::{Context, Result};
use serde::Serialize;

use elation_client::config::{self, Command, Config};
use elation_client::resources::{FindPatients, NoteSearch};
use elation_client::Elation;

#[tokio::main]
async fn main() -> Result<()> {
    // Check if interactive setup is needed (no .env and missing credentials)
    if config::needs_interactive_setup() {
        let interactive_config = config::run_interactive_setup()?;

        // Set environment variables from interactive config so Config::load() can use them
        std::env::set_var("ELATION_CLIENT_ID", &interactive_config.client_id);
        std::env::set_var("ELATION_CLIENT_SECRET", &interactive_config.client_secret);
        std::env::set_var("ELATION_USERNAME", &interactive_config.username);
        std::env::set_var("ELATION_PASSWORD", &interactive_config.password);
        std::env::set_var("ELATION_SANDBOX", interactive_config.sandbox.to_string());
    }

    // Load configuration first (for log level)
    let config = Config::load()?;
    config.validate()?;

    // Initialize logging with a configured level
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!(
        environment = ?config.environment,
        base_url = config.environment.base_url(),
        "Elation client starting..."
    );

    let elation = Elation::from_config(&config)?;

    // Fail fast: nothing works without the first token pair
    if let Err(e) = elation.initialize().await {
        tracing::error!("Authentication failed: {}", e);
        tracing::error!("Check ELATION_CLIENT_ID, ELATION_CLIENT_SECRET, ELATION_USERNAME and ELATION_PASSWORD");
        return Err(e).context("Failed to initialize Elation client");
    }
    tracing::info!("Authentication successful");

    run_command(&elation, config.command.clone()).await
}

async fn run_command(elation: &Elation, command: Command) -> Result<()> {
    match command {
        Command::GetPatient { id } => {
            let patient = elation.patients().get(id).await?;
            print_json(&patient)
        }
        Command::FindPatients {
            first_name,
            last_name,
            dob,
            sex,
        } => {
            let search = FindPatients {
                first_name,
                last_name,
                dob,
                sex,
            };
            let patients = elation.patients().find(&search).await?;
            tracing::info!("Found {} patients", patients.len());
            print_json(&patients)
        }
        Command::GetNote { id } => {
            let note = elation.notes().get(id).await?;
            print_json(&note)
        }
        Command::FindNotes {
            patient,
            physician,
            practice,
        } => {
            let search = NoteSearch {
                patient,
                physician,
                practice,
            };
            let notes = elation.notes().find(&search).await?;
            tracing::info!("Found {} notes", notes.len());
            print_json(&notes)
        }
        Command::DeleteNote { id } => {
            let deleted = elation.notes().delete(id).await?;
            print_json(&deleted)
        }
        Command::Get { path } => {
            let response = elation.client().get(&path, None).await?;
            let body: serde_json::Value = response
                .json()
                .await
                .context("Response body is not JSON")?;
            print_json(&body)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to render JSON")?;
    println!("{}", rendered);
    Ok(())
}
