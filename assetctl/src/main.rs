use assetctl::auth::Identity;
use assetctl::config::{Args, Command, Config};
use assetctl::errors::log_error;
use assetctl::services::provisioning;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = Config::load(&args)?;

    tracing::debug!("{:?}", args);

    let pool = assetctl::db::connect(&config.database.url).await?;
    assetctl::db::MIGRATOR.run(&pool).await?;

    let mut conn = pool.acquire().await?;
    // Operator commands run under the full-privilege system identity
    let system = Identity::system();

    let result = match &args.command {
        Command::Migrate => {
            // Migrations already ran above; this command just makes it explicit
            tracing::info!("database is up to date");
            Ok(())
        }
        Command::Provision { username, email, staff } => {
            provisioning::provision_user(&mut conn, &system, username, email, *staff)
                .await
                .map(|provisioned| {
                    println!("created user {}", provisioned.user.username);
                    if let Some(customer) = provisioned.customer {
                        println!("created customer {}", customer.display_name);
                    }
                })
        }
        Command::PromoteAdmin { username } => {
            provisioning::promote_admin(&mut conn, &system, username)
                .await
                .map(|()| println!("{username} is now an admin"))
        }
        Command::SeedCustomers => {
            provisioning::ensure_customers(&mut conn, &system)
                .await
                .map(|repaired| println!("backfilled {repaired} user(s)"))
        }
    };

    if let Err(err) = result {
        log_error(&err);
        eprintln!("error: {}", err.user_message());
        std::process::exit(1);
    }

    Ok(())
}
