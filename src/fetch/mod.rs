//! Getting realtime feed bytes from a URL, a local file or a replay directory.

mod basic;
mod client;
mod replay;

pub use basic::BasicClient;
pub use client::HttpClient;
pub use replay::{ReplayDir, replay_pause};

use anyhow::{Context, Result};
use bytes::Bytes;
use flate2::read::GzDecoder;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

pub async fn fetch_bytes<C: HttpClient>(client: &C, url: &str) -> Result<Bytes> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);

    let resp = client.execute(req).await?;
    Ok(resp.bytes().await?)
}

/// Where the realtime feed comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedSource {
    Url(String),
    /// A protobuf file, gzip-compressed when its name ends in `.gz`.
    File(PathBuf),
}

impl FeedSource {
    pub fn parse(source: &str) -> Self {
        if source.starts_with("http://") || source.starts_with("https://") {
            FeedSource::Url(source.to_string())
        } else {
            FeedSource::File(PathBuf::from(source))
        }
    }

    #[tracing::instrument(skip(self, client), fields(source = %self))]
    pub async fn fetch<C: HttpClient>(&self, client: &C) -> Result<Bytes> {
        let bytes = match self {
            FeedSource::Url(url) => fetch_bytes(client, url).await?,
            FeedSource::File(path) => read_file(path)?,
        };
        debug!(bytes = bytes.len(), "Feed bytes received");
        Ok(bytes)
    }
}

impl std::fmt::Display for FeedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedSource::Url(url) => f.write_str(url),
            FeedSource::File(path) => write!(f, "{}", path.display()),
        }
    }
}

fn read_file(path: &Path) -> Result<Bytes> {
    let raw = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        let mut decoded = Vec::new();
        GzDecoder::new(raw.as_slice())
            .read_to_end(&mut decoded)
            .with_context(|| format!("decompressing {}", path.display()))?;
        return Ok(Bytes::from(decoded));
    }
    Ok(Bytes::from(raw))
}
