use std::net::SocketAddr;

use axum::http::{header, HeaderValue, Method};
use clap::{Parser, Subcommand};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gift_ledger_server::{build_router, maintenance, open_database, AppState, Config};

#[derive(Debug, Parser)]
#[command(name = "gift-ledger-server", version, about = "Family gift ledger backend")]
struct Cli {
    /// SQLite file used by the maintenance commands
    #[arg(long, global = true, env = "DATABASE_PATH", default_value = "./data/gift_ledger.db")]
    database_path: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Apply pending schema migrations and exit
    Migrate,
    /// Delete orphaned memberships, records, notifications and delete requests
    Cleanup,
    /// Rewrite legacy amount formats in notification text
    NormalizeNotifications {
        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
    },
    /// Print a JSON debug dump of one user
    Dump {
        #[arg(long)]
        username: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before clap reads env-backed arguments
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gift_ledger_server=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::Migrate => {
            // Opening the database applies pending migrations
            open_database(&cli.database_path).await?;
            tracing::info!("Database at {} is up to date", cli.database_path);
            Ok(())
        }
        Command::Cleanup => {
            let pool = open_database(&cli.database_path).await?;
            let report = maintenance::cleanup_orphans(&pool).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::NormalizeNotifications { dry_run } => {
            let pool = open_database(&cli.database_path).await?;
            let report = maintenance::normalize_notifications(&pool, dry_run).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Command::Dump { username } => {
            let pool = open_database(&cli.database_path).await?;
            match maintenance::dump_user(&pool, &username).await? {
                Some(dump) => {
                    println!("{}", serde_json::to_string_pretty(&dump)?);
                    Ok(())
                }
                None => anyhow::bail!("user not found: {}", username),
            }
        }
    }
}

async fn serve() -> anyhow::Result<()> {
    tracing::info!("Starting Gift Ledger Server...");

    // Load configuration
    let config = Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    tracing::info!(
        "Environment: {}, Server: {}",
        config.environment,
        config.server_address()
    );

    let db = open_database(&config.database_path).await?;

    // Cookies need credentialed CORS, which rules out wildcard origins
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid allowed origin: {}", origin);
                None
            }
        })
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    let log_requests = config.log_requests;
    let addr: SocketAddr = config.server_address().parse()?;
    let state = AppState::new(db, config);

    let mut app = build_router(state).layer(cors);
    if log_requests {
        app = app.layer(TraceLayer::new_for_http());
    }

    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
