//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable
//! overrides. The file path defaults to `config.yaml` but can be specified
//! via the `-f` flag or `ASSETCTL_CONFIG`.
//!
//! Sources are merged in order (later overrides earlier):
//!
//! 1. **YAML config file** - base configuration
//! 2. **Environment variables** - `ASSETCTL_` prefixed, `__` for nesting
//!    (e.g. `ASSETCTL_DATABASE__URL`)
//! 3. **DATABASE_URL** - special case: overrides `database.url` if set

use clap::{Parser, Subcommand};
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

/// CLI arguments: config file location plus the command to run.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "ASSETCTL_CONFIG", default_value = "config.yaml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply pending database migrations
    Migrate,
    /// Create a user with a default role and, for non-staff users, a customer
    Provision {
        username: String,
        email: String,
        /// Staff users work across customers and get no customer of their own
        #[arg(long)]
        staff: bool,
    },
    /// Grant the admin role to an existing user
    PromoteAdmin { username: String },
    /// Backfill customers and default roles for non-staff users missing them
    SeedCustomers,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Database configuration
    pub database: DatabaseConfig,
    /// Overrides `database.url` when set (common DATABASE_URL convention)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    /// SQLite connection URL; the file is created if missing
    pub url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            database_url: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://assetctl.db".to_string(),
        }
    }
}

impl Config {
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        if let Some(url) = config.database_url.take() {
            config.database.url = url;
        }

        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("ASSETCTL_").split("__"))
            // Common DATABASE_URL pattern
            .merge(Env::raw().only(&["DATABASE_URL"]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults_without_file() {
        Jail::expect_with(|_| {
            let args = Args {
                config: "missing.yaml".to_string(),
                command: Command::Migrate,
            };
            let config = Config::load(&args)?;
            assert_eq!(config.database.url, "sqlite://assetctl.db");
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_yaml() {
        Jail::expect_with(|jail| {
            jail.create_file("config.yaml", "database:\n  url: sqlite://from-yaml.db\n")?;
            jail.set_env("ASSETCTL_DATABASE__URL", "sqlite://from-env.db");

            let args = Args {
                config: "config.yaml".to_string(),
                command: Command::Migrate,
            };
            let config = Config::load(&args)?;
            assert_eq!(config.database.url, "sqlite://from-env.db");
            Ok(())
        });
    }

    #[test]
    fn test_database_url_wins() {
        Jail::expect_with(|jail| {
            jail.create_file("config.yaml", "database:\n  url: sqlite://from-yaml.db\n")?;
            jail.set_env("DATABASE_URL", "sqlite://direct.db");

            let args = Args {
                config: "config.yaml".to_string(),
                command: Command::Migrate,
            };
            let config = Config::load(&args)?;
            assert_eq!(config.database.url, "sqlite://direct.db");
            Ok(())
        });
    }
}
