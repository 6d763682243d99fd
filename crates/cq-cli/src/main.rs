use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use cq_queue::postgres::PgStore;
use cq_queue::{NewUser, StoreError, UserRole, UserStore};

const CLI_NAME: &str = "cq-cli";

#[derive(Parser)]
#[command(name = "cq", version, about = "Clinic queue CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP queue service
    QueueApi,
    /// Apply database migrations
    Migrate,
    User {
        #[command(subcommand)]
        command: UserCommand,
    },
}

#[derive(Subcommand)]
enum UserCommand {
    Create {
        #[arg(long)]
        login: String,
        #[arg(long)]
        password: String,
        /// admin, doctor or patient
        #[arg(long)]
        role: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::QueueApi => {
            let config = cq_api::load_config()?;
            cq_api::run(config).await?;
        }
        Commands::Migrate => {
            cq_core::logging::init(CLI_NAME);
            let database_url = cq_core::config::required_env("DATABASE_URL")?;
            let pool = cq_core::db::connect(&database_url, &Default::default()).await?;
            cq_core::migrations::run(&pool).await?;
            tracing::info!("migrations applied");
        }
        Commands::User { command } => {
            cq_core::logging::init(CLI_NAME);
            let database_url = cq_core::config::required_env("DATABASE_URL")?;
            let pool = cq_core::db::connect(&database_url, &Default::default()).await?;
            let store = PgStore::new(pool);
            match command {
                UserCommand::Create {
                    login,
                    password,
                    role,
                } => {
                    let role: UserRole = role.parse().map_err(|err: String| anyhow!(err))?;
                    let password_hash = cq_core::password::hash_password(&password)?;
                    let user = NewUser {
                        login,
                        password_hash,
                        role,
                    };
                    match store.create_user(&user).await {
                        Ok(created) => {
                            tracing::info!(user_id = created.id, role = role.as_str(), "user created")
                        }
                        Err(StoreError::Duplicate(_)) => {
                            tracing::info!(login = %user.login, "user already exists")
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
            }
        }
    }

    Ok(())
}
