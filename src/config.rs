use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Pick 'em pool analytics dashboard and workbook importer
#[derive(Parser, Debug, Clone)]
#[command(name = "pickem-dashboard", version, about)]
pub struct Config {
    /// Storage backend
    #[arg(long, env = "BACKEND", value_enum, default_value = "sqlite")]
    pub backend: Backend,

    /// SQLite database path
    #[arg(long, env = "DATABASE_PATH", default_value = "pickem.db")]
    pub database_path: String,

    /// Supabase project URL (required for the supabase backend)
    #[arg(long, env = "SUPABASE_URL")]
    pub supabase_url: Option<String>,

    /// Supabase API key
    #[arg(long, env = "SUPABASE_KEY", hide_env_values = true)]
    pub supabase_key: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    Sqlite,
    Supabase,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Serve the dashboard over HTTP
    Serve {
        /// Dashboard listen address
        #[arg(long, env = "DASHBOARD_ADDR", default_value = "0.0.0.0:8080")]
        addr: String,
    },
    /// Import a season workbook
    Ingest {
        /// Path to the .xlsx/.xls/.ods workbook
        workbook: PathBuf,

        /// Season the workbook belongs to
        #[arg(long)]
        season: i32,
    },
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.backend == Backend::Supabase {
            if self.supabase_url.as_deref().map_or(true, |u| u.trim().is_empty()) {
                anyhow::bail!("SUPABASE_URL is required with the supabase backend.");
            }
            if self.supabase_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
                anyhow::bail!("SUPABASE_KEY is required with the supabase backend.");
            }
        }
        match &self.command {
            Command::Serve { addr } => {
                if addr.parse::<std::net::SocketAddr>().is_err() {
                    anyhow::bail!("DASHBOARD_ADDR '{}' is not a socket address", addr);
                }
            }
            Command::Ingest { season, .. } => {
                if !(1900..=2200).contains(season) {
                    anyhow::bail!("season {} is out of range", season);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("pickem-dashboard").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn ingest_arguments() {
        let cfg = parse(&["--backend", "sqlite", "ingest", "pool.xlsx", "--season", "2024"]);
        match &cfg.command {
            Command::Ingest { workbook, season } => {
                assert_eq!(workbook, &PathBuf::from("pool.xlsx"));
                assert_eq!(*season, 2024);
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn supabase_needs_credentials() {
        let mut cfg = parse(&["--backend", "supabase", "serve", "--addr", "127.0.0.1:9000"]);
        cfg.supabase_url = None;
        cfg.supabase_key = None;
        assert!(cfg.validate().is_err());
        cfg.supabase_url = Some("https://pool.supabase.co".into());
        assert!(cfg.validate().is_err());
        cfg.supabase_key = Some("anon".into());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn bad_listen_address_is_rejected() {
        let mut cfg = parse(&["serve", "--addr", "127.0.0.1:9000"]);
        cfg.command = Command::Serve { addr: "localhost".into() };
        assert!(cfg.validate().is_err());
    }
}
