use clap::Parser;
use pyth_feed::cli::{Cli, Commands};
use pyth_feed::config::Config;
use pyth_feed::AssetRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
            eprintln!("Using default configuration");
            Config::default()
        }
    };

    // Initialize telemetry
    let _telemetry = pyth_feed::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Latest(args) => {
            args.execute(&config).await?;
        }
        Commands::Watch(args) => {
            tracing::info!("Starting live price watch");
            args.execute(&config).await?;
        }
        Commands::Assets => {
            let registry = AssetRegistry::with_overrides(&config.assets)?;
            for (symbol, id) in registry.entries() {
                println!("{:<10} 0x{}", symbol, id);
            }
        }
        Commands::Config => {
            println!("Current configuration:");
            println!("  Endpoint: {}", config.feed.endpoint);
            println!("  Transport: {:?}", config.feed.transport);
            println!(
                "  Poll interval: {}ms, Cache TTL: {}ms, Timeout: {}s",
                config.feed.poll_interval_ms, config.feed.cache_ttl_ms, config.feed.request_timeout_secs
            );
            println!("  Extra assets: {}", config.assets.len());
            println!(
                "  Telemetry: level={}, format={:?}, metrics_port={:?}",
                config.telemetry.log_level, config.telemetry.log_format, config.telemetry.metrics_port
            );
        }
    }

    Ok(())
}
