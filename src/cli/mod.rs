//! CLI interface for pyth-feed
//!
//! Provides subcommands for:
//! - `latest`: One-shot snapshot fetch
//! - `watch`: Stream live updates to stdout
//! - `assets`: List configured symbols
//! - `config`: Show effective configuration

mod latest;
mod watch;

pub use latest::LatestArgs;
pub use watch::WatchArgs;

use crate::asset::{AssetRegistry, AssetSymbol};
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "pyth-feed")]
#[command(about = "Live and cached Pyth oracle prices")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch the latest price for one or more symbols
    Latest(LatestArgs),
    /// Print live updates until interrupted
    Watch(WatchArgs),
    /// List configured asset symbols
    Assets,
    /// Show effective configuration
    Config,
}

/// Validate raw symbol arguments against the registry
pub(crate) fn parse_symbols(registry: &AssetRegistry, raw: &[String]) -> anyhow::Result<Vec<AssetSymbol>> {
    raw.iter()
        .map(|s| registry.symbol(s).map_err(anyhow::Error::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_latest_command() {
        let cli = Cli::try_parse_from(["pyth-feed", "latest", "BTC/USD", "ETH/USD"]).unwrap();
        match cli.command {
            Commands::Latest(args) => assert_eq!(args.symbols, vec!["BTC/USD", "ETH/USD"]),
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(cli.config, "config.toml");
    }

    #[test]
    fn test_parse_watch_command() {
        let cli =
            Cli::try_parse_from(["pyth-feed", "-c", "feed.toml", "watch", "BTC/USD", "--seconds", "30", "--poll"])
                .unwrap();
        match cli.command {
            Commands::Watch(args) => {
                assert_eq!(args.seconds, Some(30));
                assert!(args.poll);
            }
            other => panic!("unexpected command: {:?}", other),
        }
        assert_eq!(cli.config, "feed.toml");
    }

    #[test]
    fn test_latest_requires_symbol() {
        assert!(Cli::try_parse_from(["pyth-feed", "latest"]).is_err());
    }

    #[test]
    fn test_parse_symbols_rejects_unknown() {
        let registry = AssetRegistry::default();
        assert!(parse_symbols(&registry, &["BTC/USD".to_string()]).is_ok());
        let err = parse_symbols(&registry, &["XRP/USD".to_string()]).unwrap_err();
        assert!(err.to_string().contains("XRP/USD"));
    }
}
