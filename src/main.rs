use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use accountd::api::validators::{EmailValidator, NameValidator, PasswordValidator, Validator};
use accountd::{api, config, db};

#[derive(Parser, Debug)]
#[command(name = "accountd")]
#[command(about = "User registration, token authentication and admin user management")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Block until the database accepts connections
    WaitForDb,
    /// Create a superuser account
    CreateSuperuser {
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "")]
        name: String,
        /// Read from the environment when omitted on the command line
        #[arg(long, env = "ACCOUNTD_SUPERUSER_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("accountd=info".parse()?)
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load()?;
    info!("Configuration loaded");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            info!("Starting accountd v{}", env!("CARGO_PKG_VERSION"));
            let db_pool = db::init(&cfg).await?;
            db::bootstrap_superuser(&db_pool, &cfg).await?;
            api::serve(cfg, db_pool).await?;
        }
        Command::WaitForDb => {
            info!("Waiting for database...");
            db::wait_for_db(&cfg).await?;
            info!("Database available!");
        }
        Command::CreateSuperuser { email, name, password } => {
            EmailValidator::new().validate(&email).map_err(|e| anyhow::anyhow!(e.message))?;
            NameValidator::optional().validate(&name).map_err(|e| anyhow::anyhow!(e.message))?;
            PasswordValidator::new(cfg.auth.password_min_length)
                .validate(&password)
                .map_err(|e| anyhow::anyhow!(e.message))?;

            let db_pool = db::init(&cfg).await?;
            let user = db::users::create_superuser(&db_pool, &email, &password, &name).await?;
            info!("Superuser created successfully: {} ({})", user.email, user.id);
        }
    }

    Ok(())
}
