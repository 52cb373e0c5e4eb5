//! Latest command implementation

use super::parse_symbols;
use crate::config::Config;
use crate::display::format_price;
use crate::feed::PriceSnapshot;
use crate::service::DataFeed;
use clap::Args;

#[derive(Args, Debug)]
pub struct LatestArgs {
    /// Symbols to fetch, e.g. BTC/USD
    #[arg(required = true)]
    pub symbols: Vec<String>,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

impl LatestArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let feed = DataFeed::from_config(config)?;
        let symbols = parse_symbols(feed.registry(), &self.symbols)?;

        let snapshots = feed.get_latest(&symbols).await?;
        tracing::debug!(count = snapshots.len(), "Fetched latest prices");

        if self.json {
            println!("{}", serde_json::to_string_pretty(&snapshots)?);
        } else {
            for snapshot in &snapshots {
                println!("{}", render_row(snapshot));
            }
        }

        Ok(())
    }
}

pub(crate) fn render_row(snapshot: &PriceSnapshot) -> String {
    let published = snapshot
        .price
        .published_at()
        .map(|ts| ts.to_rfc3339())
        .unwrap_or_else(|| "-".to_string());

    format!(
        "{:<10} {:>14} ± {:<10} ema {:>14}  {}",
        snapshot.symbol,
        format_price(snapshot.price.price, 2),
        format_price(snapshot.price.confidence, 2),
        format_price(snapshot.ema_price.price, 2),
        published
    )
}
