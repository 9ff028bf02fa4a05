mod cache;
mod feed;
mod refresh;
mod sink;

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use axum::{Router, http::StatusCode, response::IntoResponse, routing::get};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{
    cache::RecordCache,
    refresh::{HttpFeedSource, Refresher},
    sink::PriceGauge,
};

// Published daily by the Italian ministry of enterprise; see
// https://www.mimit.gov.it/index.php/it/open-data/elenco-dataset/carburanti-prezzi-praticati-e-anagrafica-degli-impianti
const PRICES_CSV_URL: &str = "https://www.mimit.gov.it/images/exportCSV/prezzo_alle_8.csv";
const STATIONS_CSV_URL: &str =
    "https://www.mimit.gov.it/images/exportCSV/anagrafica_impianti_attivi.csv";

const CACHE_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Parser)]
#[command(about = "Prometheus exporter for the Italian fuel price open-data feeds")]
struct Args {
    /// HTTP path where metrics are exposed
    #[arg(short = 'p', long, default_value = "/metrics")]
    path: String,

    /// Address to listen on
    #[arg(short = 'l', long, default_value = "0.0.0.0:9112")]
    listen: String,

    /// Interval between feed refreshes, e.g. "30m" or "6h"
    #[arg(short = 'i', long, default_value = "6h", value_parser = parse_interval)]
    interval: Duration,
}

/// Parse an interval string like "30s", "5m", "6h" or "1d".
fn parse_interval(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.len() < 2 {
        return Err(format!("invalid interval: {s:?}"));
    }

    let (num, unit) = s.split_at(s.len() - 1);
    let num: u64 = num
        .parse()
        .map_err(|_| format!("invalid interval: {s:?}"))?;
    let secs = match unit {
        "s" => num,
        "m" => num * 60,
        "h" => num * 3_600,
        "d" => num * 86_400,
        _ => return Err(format!("invalid interval unit: {unit:?}")),
    };

    Ok(Duration::from_secs(secs))
}

async fn metrics() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        sink::render_metrics(),
    )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("fuel_price_exporter=info")),
        )
        .init();

    let args = Args::parse();

    let gauge = PriceGauge::register().context("failed to register fuel price gauge")?;
    let cache = Arc::new(RecordCache::new(CACHE_TTL));

    let source = HttpFeedSource::new(PRICES_CSV_URL.to_owned(), STATIONS_CSV_URL.to_owned());
    let refresher = Refresher::new(source, cache, gauge);
    tokio::spawn(refresher.run(args.interval));

    let app = Router::new().route(&args.path, get(metrics));

    let listener = tokio::net::TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("failed to bind {}", args.listen))?;
    info!("serving metrics on {}{}", args.listen, args.path);
    axum::serve(listener, app).await?;

    Ok(())
}
