use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use dialoguer::{Confirm, Input, Password};
use std::io::Write;

use crate::auth::Credentials;

/// Sandbox API root
pub const SANDBOX_BASE_URL: &str = "https://sandbox.elationemr.com/api/2.0/";

/// Production API root
pub const PRODUCTION_BASE_URL: &str = "https://app.elationemr.com/api/2.0";

/// Elation Client - authenticated access to the Elation EMR API
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// OAuth2 client id
    #[arg(long, env = "ELATION_CLIENT_ID")]
    pub client_id: Option<String>,

    /// OAuth2 client secret
    #[arg(long, env = "ELATION_CLIENT_SECRET", hide_env_values = true)]
    pub client_secret: Option<String>,

    /// Elation account username
    #[arg(short, long, env = "ELATION_USERNAME")]
    pub username: Option<String>,

    /// Elation account password
    #[arg(long, env = "ELATION_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Use the sandbox environment instead of production
    #[arg(long, env = "ELATION_SANDBOX", default_value = "true", action = ArgAction::Set)]
    pub sandbox: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// HTTP request timeout in seconds
    #[arg(long, env = "HTTP_REQUEST_TIMEOUT", default_value = "300")]
    pub http_timeout: u64,

    #[command(subcommand)]
    pub command: Command,
}

/// Operation to run once the client is initialized
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Fetch one patient
    GetPatient { id: i64 },

    /// Search patients by demographics
    FindPatients {
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        dob: Option<String>,
        #[arg(long)]
        sex: Option<String>,
    },

    /// Fetch one visit note
    GetNote { id: i64 },

    /// Search visit notes by patient, physician or practice
    FindNotes {
        #[arg(long)]
        patient: Vec<i64>,
        #[arg(long)]
        physician: Vec<i64>,
        #[arg(long)]
        practice: Vec<i64>,
    },

    /// Delete one visit note
    DeleteNote { id: i64 },

    /// Authenticated GET against an arbitrary API path
    Get { path: String },
}

/// Which Elation deployment the client talks to
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Environment {
    Sandbox,
    Production,
}

impl Environment {
    pub fn from_sandbox_flag(sandbox: bool) -> Self {
        if sandbox {
            Environment::Sandbox
        } else {
            Environment::Production
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            Environment::Sandbox => SANDBOX_BASE_URL,
            Environment::Production => PRODUCTION_BASE_URL,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    // Elation credentials
    pub credentials: Credentials,
    pub environment: Environment,

    // HTTP client
    pub http_max_connections: usize,
    pub http_connect_timeout: u64,
    pub http_request_timeout: u64,

    // Logging
    pub log_level: String,

    pub command: Command,
}

impl Config {
    /// Load configuration from all sources with priority: CLI > ENV > .env > defaults
    pub fn load() -> Result<Self> {
        // Load .env file if it exists
        dotenvy::dotenv().ok();

        let args = CliArgs::parse();
        Self::from_args(args)
    }

    /// Build configuration from parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let credentials = Credentials::new(
            args.client_id
                .context("ELATION_CLIENT_ID is required (use --client-id or set ELATION_CLIENT_ID env var)")?,
            args.client_secret.context(
                "ELATION_CLIENT_SECRET is required (use --client-secret or set ELATION_CLIENT_SECRET env var)",
            )?,
            args.username
                .context("ELATION_USERNAME is required (use -u or set ELATION_USERNAME env var)")?,
            args.password
                .context("ELATION_PASSWORD is required (use --password or set ELATION_PASSWORD env var)")?,
        );

        Ok(Config {
            credentials,
            environment: Environment::from_sandbox_flag(args.sandbox),

            http_max_connections: std::env::var("HTTP_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(20),

            http_connect_timeout: std::env::var("HTTP_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),

            http_request_timeout: args.http_timeout,

            log_level: args.log_level,

            command: args.command,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let creds = &self.credentials;
        for (name, value) in [
            ("ELATION_CLIENT_ID", &creds.client_id),
            ("ELATION_CLIENT_SECRET", &creds.client_secret),
            ("ELATION_USERNAME", &creds.username),
            ("ELATION_PASSWORD", &creds.password),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!("{} cannot be empty", name);
            }
        }

        if self.http_request_timeout == 0 {
            anyhow::bail!("HTTP_REQUEST_TIMEOUT must be greater than zero");
        }

        Ok(())
    }
}

// === Interactive Setup ===

/// Check if interactive setup is needed (no .env file and missing credentials)
pub fn needs_interactive_setup() -> bool {
    let env_file_exists = std::path::Path::new(".env").exists();

    let missing_credentials = [
        "ELATION_CLIENT_ID",
        "ELATION_CLIENT_SECRET",
        "ELATION_USERNAME",
        "ELATION_PASSWORD",
    ]
    .iter()
    .any(|key| std::env::var(key).is_err());

    !env_file_exists && missing_credentials
}

/// Configuration collected from interactive setup
#[derive(Debug, Clone)]
pub struct InteractiveConfig {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
    pub sandbox: bool,
}

/// Prompt for the Elation credentials
pub fn run_interactive_setup() -> Result<InteractiveConfig> {
    println!();
    println!("No Elation credentials found. Let's set up the client.");
    println!();

    let client_id: String = Input::new()
        .with_prompt("OAuth2 client id (ELATION_CLIENT_ID)")
        .interact_text()
        .context("Failed to read ELATION_CLIENT_ID")?;

    let client_secret: String = Password::new()
        .with_prompt("OAuth2 client secret (ELATION_CLIENT_SECRET)")
        .interact()
        .context("Failed to read ELATION_CLIENT_SECRET")?;

    let username: String = Input::new()
        .with_prompt("Elation username (ELATION_USERNAME)")
        .interact_text()
        .context("Failed to read ELATION_USERNAME")?;

    let password: String = Password::new()
        .with_prompt("Elation password (ELATION_PASSWORD)")
        .interact()
        .context("Failed to read ELATION_PASSWORD")?;

    let sandbox = Confirm::new()
        .with_prompt("Use the sandbox environment?")
        .default(true)
        .interact()
        .context("Failed to read environment selection")?;

    let config = InteractiveConfig {
        client_id,
        client_secret,
        username,
        password,
        sandbox,
    };

    println!();
    let save_to_env = Confirm::new()
        .with_prompt("Save configuration to .env file?")
        .default(false)
        .interact()
        .context("Failed to read save confirmation")?;

    if save_to_env {
        save_env_file(&config)?;
        println!("Configuration saved to .env file");
    }

    Ok(config)
}

fn render_env_file(config: &InteractiveConfig) -> String {
    format!(
        r#"# Elation Client Configuration
# Generated by interactive setup

ELATION_CLIENT_ID={}
ELATION_CLIENT_SECRET={}
ELATION_USERNAME={}
ELATION_PASSWORD={}

# true = sandbox.elationemr.com, false = app.elationemr.com
ELATION_SANDBOX={}

# Logging (trace, debug, info, warn, error)
LOG_LEVEL=info
"#,
        config.client_id, config.client_secret, config.username, config.password, config.sandbox,
    )
}

/// Save configuration to .env file
fn save_env_file(config: &InteractiveConfig) -> Result<()> {
    let mut file = std::fs::File::create(".env").context("Failed to create .env file")?;
    file.write_all(render_env_file(config).as_bytes())
        .context("Failed to write .env file")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_environment_base_urls() {
        assert_eq!(
            Environment::from_sandbox_flag(true).base_url(),
            "https://sandbox.elationemr.com/api/2.0/"
        );
        assert_eq!(
            Environment::from_sandbox_flag(false).base_url(),
            "https://app.elationemr.com/api/2.0"
        );
    }

    #[test]
    fn test_from_args_builds_credentials() {
        let args = parse(&[
            "elation-client",
            "--client-id",
            "c",
            "--client-secret",
            "s",
            "--username",
            "u",
            "--password",
            "p",
            "get-patient",
            "7",
        ]);
        let config = Config::from_args(args).unwrap();

        assert_eq!(config.credentials, Credentials::new("c", "s", "u", "p"));
        assert_eq!(config.environment, Environment::Sandbox);
        assert_eq!(config.command, Command::GetPatient { id: 7 });
        config.validate().unwrap();
    }

    #[test]
    fn test_sandbox_flag_can_be_disabled() {
        let args = parse(&[
            "elation-client",
            "--client-id",
            "c",
            "--client-secret",
            "s",
            "--username",
            "u",
            "--password",
            "p",
            "--sandbox",
            "false",
            "get",
            "patients/",
        ]);
        let config = Config::from_args(args).unwrap();
        assert_eq!(config.environment, Environment::Production);
    }

    #[test]
    fn test_find_notes_collects_repeated_ids() {
        let args = parse(&[
            "elation-client",
            "find-notes",
            "--patient",
            "1",
            "--patient",
            "2",
            "--practice",
            "9",
        ]);
        assert_eq!(
            args.command,
            Command::FindNotes {
                patient: vec![1, 2],
                physician: vec![],
                practice: vec![9],
            }
        );
    }

    #[test]
    fn test_validate_rejects_blank_credentials() {
        let config = Config {
            credentials: Credentials::new("c", " ", "u", "p"),
            environment: Environment::Sandbox,
            http_max_connections: 20,
            http_connect_timeout: 30,
            http_request_timeout: 300,
            log_level: "info".to_string(),
            command: Command::Get {
                path: "patients/".to_string(),
            },
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("ELATION_CLIENT_SECRET"));
    }

    #[test]
    fn test_render_env_file() {
        let rendered = render_env_file(&InteractiveConfig {
            client_id: "c".to_string(),
            client_secret: "s".to_string(),
            username: "u".to_string(),
            password: "p".to_string(),
            sandbox: false,
        });
        assert!(rendered.contains("ELATION_CLIENT_ID=c\n"));
        assert!(rendered.contains("ELATION_SANDBOX=false\n"));
    }
}
