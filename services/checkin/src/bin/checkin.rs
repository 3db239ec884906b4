//! services/checkin/src/bin/checkin.rs
//!
//! Terminal front end for attendance check-in.

use attendance_core::ports::{Geolocator, KeyValueStore, QrDecoder};
use attendance_core::{AuthSession, NotificationCategory, Role, SessionUser};
use checkin_lib::{
    adapters::{FixedLocator, MemoryStore, NoLocator, ReqwestTransport, RqrrDecoder, SqliteStore, TerminalUi},
    config::Config,
    error::AppError,
    pipeline::CheckInOutcome,
    scanner::{parse_payload, router::resolve_role},
    AppState,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "checkin", about = "Record class attendance from the terminal")]
struct Cli {
    /// Role to act as in this session (defaults to CHECKIN_ROLE).
    #[arg(long, global = true, value_parser = parse_role)]
    role: Option<Role>,

    /// Keep everything in memory instead of the local database.
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store credentials issued by the web dashboard.
    Session {
        #[command(subcommand)]
        action: SessionAction,
    },
    /// Reload and print the signed-in profile.
    Whoami,
    /// Check in with a session code typed by hand.
    Code { code: String },
    /// Check in from a photo or screenshot of the session QR code.
    ScanImage { path: PathBuf },
    /// Show or update stored notifications.
    Notifications {
        #[command(subcommand)]
        action: Option<NotificationAction>,
    },
    /// Forget this role's credentials.
    Logout,
}

#[derive(Subcommand)]
enum SessionAction {
    Import {
        #[arg(long)]
        token: String,
        #[arg(long)]
        refresh_token: Option<String>,
        /// The user object as JSON.
        #[arg(long)]
        user: Option<String>,
    },
}

#[derive(Subcommand)]
enum NotificationAction {
    List {
        #[arg(long, value_parser = parse_category)]
        category: Option<NotificationCategory>,
    },
    Read { id: Uuid },
    ReadAll,
}

fn parse_role(raw: &str) -> Result<Role, String> {
    raw.parse::<Role>().map_err(|e| e.to_string())
}

fn parse_category(raw: &str) -> Result<NotificationCategory, String> {
    match raw.to_ascii_lowercase().as_str() {
        "deadline" => Ok(NotificationCategory::Deadline),
        "general" => Ok(NotificationCategory::General),
        "completed" => Ok(NotificationCategory::Completed),
        other => Err(format!("'{}' is not a notification category", other)),
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();

    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!("Configuration loaded.");

    // --- 2. Open Device Storage ---
    let storage: Arc<dyn KeyValueStore> = if cli.ephemeral {
        Arc::new(MemoryStore::new())
    } else {
        info!("Opening local database...");
        Arc::new(SqliteStore::connect(&config.database_url).await?)
    };

    // --- 3. Initialize Adapters ---
    let transport = Arc::new(ReqwestTransport::new(config.api_base_url.clone())?);
    let geolocator: Arc<dyn Geolocator> = match config.fixed_position {
        Some(position) => Arc::new(FixedLocator::new(position)),
        None => Arc::new(NoLocator),
    };
    let ui = Arc::new(TerminalUi::new());

    // --- 4. Build the Shared AppState ---
    let app = AppState::new(config.clone(), storage, transport, ui, geolocator);
    app.sessions
        .set_active_role(cli.role.unwrap_or(config.default_role));
    let role = resolve_role(app.sessions.as_ref(), cli.role)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    // --- 5. Run the Command ---
    match cli.command {
        Command::Session {
            action:
                SessionAction::Import {
                    token,
                    refresh_token,
                    user,
                },
        } => {
            let user = match user {
                Some(raw) => serde_json::from_str::<SessionUser>(&raw)
                    .map_err(|e| AppError::Internal(format!("Invalid --user JSON: {}", e)))?,
                None => SessionUser::default(),
            };
            app.sessions
                .save_session(
                    role,
                    &AuthSession {
                        token,
                        refresh_token,
                        user,
                    },
                )
                .await?;
            println!("Stored {} session.", role);
        }
        Command::Whoami => {
            let user = app.api.refresh_profile(role).await?;
            println!(
                "{} ({})",
                user.name.as_deref().unwrap_or("unknown"),
                user.checkin_id().unwrap_or("no id")
            );
        }
        Command::Code { code } => {
            report(app.router.submit_code(role, &code).await);
        }
        Command::ScanImage { path } => {
            let image = tokio::fs::read(&path).await?;
            let decoder = RqrrDecoder::new();
            let decoded = tokio::task::spawn_blocking(move || decoder.decode_image(&image))
                .await
                .map_err(|e| AppError::Internal(e.to_string()))??;
            match decoded {
                Some(text) => {
                    info!(session_code = %parse_payload(&text).session_code, "QR code read from image");
                    report(app.router.route(role, &text).await);
                }
                None => eprintln!("No QR code found in {}", path.display()),
            }
        }
        Command::Notifications { action } => match action.unwrap_or(NotificationAction::List { category: None }) {
            NotificationAction::List { category } => {
                let records = match category {
                    Some(category) => app.notifications.list_category(role, category).await?,
                    None => app.notifications.list(role).await?,
                };
                for record in records {
                    let marker = if record.read { " " } else { "*" };
                    println!(
                        "{} {} [{}] {}",
                        marker,
                        record.id,
                        record.created_at.format("%Y-%m-%d %H:%M"),
                        record.message
                    );
                }
                println!("{} unread", app.notifications.unread_count().await?);
            }
            NotificationAction::Read { id } => {
                if !app.notifications.mark_read(role, id).await? {
                    eprintln!("No unread notification {}", id);
                }
            }
            NotificationAction::ReadAll => {
                let changed = app.notifications.mark_all_read(role).await?;
                println!("Marked {} read.", changed);
            }
        },
        Command::Logout => {
            app.api.logout(role).await?;
        }
    }

    Ok(())
}

fn report(outcome: CheckInOutcome) {
    match outcome {
        Ok(confirmation) => info!(unread = confirmation.unread, "Check-in recorded."),
        // Both outcomes were already shown through the UI.
        Err(e) => info!("Check-in not recorded: {}", e),
    }
}
