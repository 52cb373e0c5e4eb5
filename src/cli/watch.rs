//! Watch command implementation

use super::latest::render_row;
use super::parse_symbols;
use crate::asset::AssetSymbol;
use crate::config::Config;
use crate::display::{percentage_change, ChangeDirection};
use crate::service::DataFeed;
use crate::subscription::TransportMode;
use clap::Args;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Symbols to watch, e.g. BTC/USD
    #[arg(required = true)]
    pub symbols: Vec<String>,

    /// Stop after this many seconds (default: run until Ctrl-C)
    #[arg(long)]
    pub seconds: Option<u64>,

    /// Poll only, never open a stream
    #[arg(long)]
    pub poll: bool,
}

impl WatchArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let mut config = config.clone();
        if self.poll {
            config.feed.transport = TransportMode::Poll;
        }

        let feed = DataFeed::from_config(&config)?;
        let symbols = parse_symbols(feed.registry(), &self.symbols)?;

        let _status = feed.on_connection_status_change(|status| {
            tracing::info!(%status, "Feed connection status");
        });

        let previous: Arc<Mutex<HashMap<AssetSymbol, f64>>> = Arc::default();
        let mut subscriptions = Vec::with_capacity(symbols.len());
        for symbol in &symbols {
            let previous = previous.clone();
            let subscription = feed.subscribe(symbol, move |snapshot| {
                let last = previous
                    .lock()
                    .map(|mut seen| seen.insert(snapshot.symbol.clone(), snapshot.price.price))
                    .unwrap_or(None);
                let change = last
                    .and_then(|old| percentage_change(old, snapshot.price.price))
                    .map(|pct| {
                        let arrow = match ChangeDirection::of(pct) {
                            ChangeDirection::Up => "▲",
                            ChangeDirection::Down => "▼",
                        };
                        format!(" {} {:.3}%", arrow, pct.abs())
                    })
                    .unwrap_or_default();
                println!("{}{}", render_row(snapshot), change);
            })?;
            subscriptions.push(subscription);
        }

        tracing::info!(symbols = symbols.len(), "Watching prices");

        match self.seconds {
            Some(secs) => {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            }
            None => {
                tokio::signal::ctrl_c().await?;
            }
        }

        tracing::info!("Stopping watch");
        for subscription in &subscriptions {
            subscription.unsubscribe();
        }

        Ok(())
    }
}
