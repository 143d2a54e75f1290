//! GNSS archive CLI - query station file listings and download archive
//! bundles from the command line.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use gnss_archive_client::models::{RegistrationForm, StationEntry};
use gnss_archive_client::{ApiClient, ArchiveFlow, Config, DownloadOutcome, FileCredentialStore};

const USAGE: &str = "\
Usage: gnss-archive <command>

Commands:
  register                          create a new account
  login <email>                     log in and store the session
  me                                show the current user profile
  query <start> <end> <station>...  list available files per station
  download <start> <end> <station>...  create and download an archive bundle
  logout                            drop the stored session

Dates use YYYY-MM-DD. Set GNSS_ARCHIVE_URL to override the API base URL.";

/// Initialize the tracing subscriber for logging.
/// Use RUST_LOG to control the level (e.g. RUST_LOG=debug).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{s}', expected YYYY-MM-DD"))
}

fn parse_range(args: &[String]) -> Result<(NaiveDate, NaiveDate, Vec<String>)> {
    if args.len() < 3 {
        bail!("Expected <start> <end> <station>...\n\n{USAGE}");
    }
    let start = parse_date(&args[0])?;
    let end = parse_date(&args[1])?;
    let stations = args[2..].iter().map(|s| s.to_lowercase()).collect();
    Ok((start, end, stations))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("{USAGE}");
        return Ok(());
    };

    let mut config = Config::load().context("Failed to load config")?;
    let store = Arc::new(FileCredentialStore::open(Config::token_path()?));
    let client = ApiClient::new(&config.base_url(), store)?;
    let flow = ArchiveFlow::new(client.clone(), config.download_dir());

    match command.as_str() {
        "register" => {
            let form = RegistrationForm {
                email: prompt("Email")?,
                user_name: prompt("User name")?,
                organization: Some(prompt("Organization (optional)")?).filter(|s| !s.is_empty()),
                password: rpassword::prompt_password("Password: ")?,
                password2: rpassword::prompt_password("Confirm password: ")?,
            };
            client.register(&form).await?;
            println!("Registered. Check your email for the activation link, then log in.");
        }
        "login" => {
            let email = match args.get(1) {
                Some(email) => email.clone(),
                None => config
                    .last_email
                    .clone()
                    .ok_or_else(|| anyhow::anyhow!("Usage: gnss-archive login <email>"))?,
            };
            let password = rpassword::prompt_password("Password: ")?;
            client.login(&email, &password).await?;
            config.last_email = Some(email);
            config.save().context("Failed to save config")?;
            println!("Logged in.");
        }
        "me" => {
            let profile = client.me().await?;
            println!("Email:        {}", profile.email);
            println!("User name:    {}", profile.user_name);
            if let Some(ref org) = profile.organization {
                println!("Organization: {org}");
            }
            println!(
                "Status:       {}",
                if profile.is_active { "active" } else { "awaiting activation" }
            );
        }
        "query" => {
            let (start, end, stations) = parse_range(&args[1..])?;
            let results = flow.query(&stations, start, end).await?;
            for (station, entry) in &results {
                println!("{}:", station.to_uppercase());
                match entry {
                    StationEntry::Files(files) if files.is_empty() => {
                        println!("  no data in the selected period");
                    }
                    StationEntry::Files(files) => {
                        for file in files {
                            let fullness = file
                                .fullness
                                .map(|f| format!("{:.0}%", f * 100.0))
                                .unwrap_or_else(|| "-".to_string());
                            println!("  {}  {}  {}", file.date, file.filename, fullness);
                        }
                    }
                    StationEntry::Error { error } => println!("  error: {error}"),
                }
            }
        }
        "download" => {
            let (start, end, stations) = parse_range(&args[1..])?;
            match flow.download(&stations, start, end).await? {
                DownloadOutcome::Saved { descriptor, path } => {
                    println!("Archive: {}", descriptor.archive_name);
                    println!("Files:   {}", descriptor.file_count);
                    println!("Saved:   {}", path.display());
                }
                DownloadOutcome::CreatedOnly { descriptor, error } => {
                    println!("Archive created: {}", descriptor.archive_name);
                    println!("Files:           {}", descriptor.file_count);
                    println!("Download failed: {error}");
                    println!("The archive still exists; retry the download step.");
                }
            }
        }
        "logout" => {
            client.logout();
            println!("Logged out.");
        }
        other => {
            bail!("Unknown command '{other}'\n\n{USAGE}");
        }
    }

    info!("Done");
    Ok(())
}
