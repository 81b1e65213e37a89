use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

use super::provider::StatsSource;
use crate::engine::PlayerRates;
use crate::models::StatsRow;

/// Public player/surface/tour statistics table.
pub const DEFAULT_STATS_URL: &str =
    "https://raw.githubusercontent.com/antonysamios-source/Monte7/main/player_surface_stats_master.csv";

/// Pick a source for `location`: `http(s)://` URLs are fetched over HTTP,
/// anything else is read as a local path.
pub fn source_for(location: &str) -> Result<Arc<dyn StatsSource>> {
    match Url::parse(location) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            Ok(Arc::new(CsvHttpSource::new(url)?))
        }
        _ => Ok(Arc::new(CsvFileSource::new(location))),
    }
}

/// Statistics CSV on the local filesystem.
pub struct CsvFileSource {
    path: PathBuf,
    label: String,
}

impl CsvFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let label = format!("file:{}", path.display());
        CsvFileSource { path, label }
    }
}

#[async_trait]
impl StatsSource for CsvFileSource {
    fn name(&self) -> &str {
        &self.label
    }

    async fn fetch_rows(&self) -> Result<Vec<StatsRow>> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("Failed to read statistics file {}", self.path.display()))?;
        parse_stats_csv(bytes.as_slice())
    }
}

/// Statistics CSV served over HTTP(S).
pub struct CsvHttpSource {
    http: Client,
    url: Url,
}

impl CsvHttpSource {
    pub fn new(url: Url) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(20))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(CsvHttpSource { http, url })
    }
}

#[async_trait]
impl StatsSource for CsvHttpSource {
    fn name(&self) -> &str {
        self.url.as_str()
    }

    async fn fetch_rows(&self) -> Result<Vec<StatsRow>> {
        debug!("Fetching player statistics from {}", self.url);

        let resp = self
            .http
            .get(self.url.clone())
            .send()
            .await
            .context("Statistics request failed")?;

        if !resp.status().is_success() {
            anyhow::bail!("Statistics source error: {}", resp.status());
        }

        let body = resp
            .bytes()
            .await
            .context("Failed to read statistics response body")?;

        parse_stats_csv(body.as_ref())
    }
}

#[derive(Debug, Deserialize)]
struct RawRow {
    player: String,
    surface: String,
    tour: String,
    serve_win_pct: f64,
    return_win_pct: f64,
}

/// Parse a statistics CSV with the header
/// `player,surface,tour,serve_win_pct,return_win_pct`.
///
/// Malformed rows are skipped with a warning; a missing header is an error.
pub fn parse_stats_csv<R: std::io::Read>(reader: R) -> Result<Vec<StatsRow>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let headers = reader
        .headers()
        .context("Statistics CSV has no header row")?
        .clone();
    for column in ["player", "surface", "tour", "serve_win_pct", "return_win_pct"] {
        if !headers.iter().any(|h| h == column) {
            anyhow::bail!("Statistics CSV is missing the '{}' column", column);
        }
    }

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for (i, record) in reader.deserialize::<RawRow>().enumerate() {
        // +2: one for the header, one for 1-based line numbers
        let line = i + 2;
        let raw = match record {
            Ok(r) => r,
            Err(e) => {
                warn!("Skipping statistics line {}: {}", line, e);
                skipped += 1;
                continue;
            }
        };
        match row_from_raw(raw) {
            Ok(row) => rows.push(row),
            Err(e) => {
                warn!("Skipping statistics line {}: {}", line, e);
                skipped += 1;
            }
        }
    }

    info!(
        "Parsed {} statistics row(s), skipped {}",
        rows.len(),
        skipped
    );
    Ok(rows)
}

fn row_from_raw(raw: RawRow) -> Result<StatsRow> {
    if raw.player.is_empty() {
        anyhow::bail!("empty player name");
    }
    let surface = raw.surface.parse().map_err(anyhow::Error::msg)?;
    let tour = raw.tour.parse().map_err(anyhow::Error::msg)?;
    let rates = PlayerRates::new(raw.serve_win_pct, raw.return_win_pct)?;
    Ok(StatsRow {
        player: raw.player,
        surface,
        tour,
        rates,
    })
}
