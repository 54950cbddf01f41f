use anyhow::Context;
use clap::{Parser, Subcommand};
use teamhub_config::load as load_config;
use teamhub_database::{initialize_database, SessionRepository, UserRepository};
use teamhub_runtime::{telemetry, BackendServices};
use tokio::net::TcpListener;
use tracing::info;

const DEV_SESSION_DAYS: i64 = 30;

#[derive(Parser)]
#[command(name = "teamhub-server")]
#[command(about = "TeamHub messaging backend (serves by default)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP and WebSocket server
    Serve,
    /// Apply database migrations and exit
    Migrate,
    /// Create (or reuse) a user and print a development session token
    SeedUser {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing().context("failed to initialise tracing")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server().await,
        Commands::Migrate => migrate().await,
        Commands::SeedUser { name, email } => seed_user(&name, &email).await,
    }
}

async fn run_server() -> anyhow::Result<()> {
    info!("starting TeamHub backend");

    let config = load_config().context("failed to load configuration")?;

    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    teamhub_runtime::serve(listener, services, teamhub_runtime::shutdown_signal()).await
}

async fn migrate() -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;

    initialize_database(&config.database)
        .await
        .context("failed to migrate database")?;

    println!("Database at {} is up to date", config.database.url);
    Ok(())
}

async fn seed_user(name: &str, email: &str) -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;

    let pool = initialize_database(&config.database)
        .await
        .context("failed to open database")?;

    let users = UserRepository::new(pool.clone());
    let user = match users
        .find_by_email(email)
        .await
        .context("failed to look up user")?
    {
        Some(user) => {
            info!(user_id = %user.id, "reusing existing user");
            user
        }
        None => users
            .create(name, email, None)
            .await
            .context("failed to create user")?,
    };

    let session = SessionRepository::new(pool)
        .create(&user.id, chrono::Duration::days(DEV_SESSION_DAYS))
        .await
        .context("failed to create session")?;

    println!("User:    {} <{}>", user.name, user.email);
    println!("User ID: {}", user.id);
    println!("Token:   {}", session.token);
    println!("Expires: {}", session.expires_at);
    Ok(())
}
