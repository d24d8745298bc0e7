//! Price-feed client.
//!
//! The puzzle names the feed through a descriptor string. Three forms are
//! understood:
//!
//! - `json(https://host/ticker).price`: JSON body, value at `price`
//! - `https://host/quote.json#data.prices[0]`: same, fragment syntax
//! - `https://host/price.txt`: the body itself is the number
//!
//! A failed fetch never propagates: it becomes [`Quote::Unavailable`], whose
//! numeric value is zero.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::PriceFeedUnavailable;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

static JSON_DESCRIPTOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^json\((?P<url>[^)]+)\)(?:\.(?P<path>.*))?$").expect("descriptor pattern is valid")
});

static PATH_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<key>[^.\[\]]+)|\[(?P<index>\d+)\]").expect("path pattern is valid")
});

/// Outcome of a quote request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quote {
    Live(u64),
    /// The feed could not be read; bids fall back to a zero quote
    Unavailable,
}

impl Quote {
    pub fn value(self) -> u64 {
        match self {
            Quote::Live(value) => value,
            Quote::Unavailable => 0,
        }
    }

    pub fn is_degraded(self) -> bool {
        matches!(self, Quote::Unavailable)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// How to turn a response body into a number
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedFormat {
    RawNumber,
    /// Walk the path into the JSON body; an empty path means the body itself
    Json(Vec<PathSegment>),
}

/// Parsed price-feed descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceFeed {
    pub url: String,
    pub format: FeedFormat,
}

impl PriceFeed {
    pub fn parse(descriptor: &str) -> Result<Self, PriceFeedUnavailable> {
        let trimmed = descriptor.trim().trim_matches(|c: char| c == '\'' || c == '"');

        let (url, format) = if let Some(caps) = JSON_DESCRIPTOR.captures(trimmed) {
            let path = caps.name("path").map_or("", |m| m.as_str());
            let url = caps.name("url").map_or("", |m| m.as_str());
            (url.trim(), FeedFormat::Json(parse_path(path)))
        } else if let Some((url, path)) = trimmed.split_once('#') {
            (url.trim(), FeedFormat::Json(parse_path(path)))
        } else {
            (trimmed, FeedFormat::RawNumber)
        };

        if url.is_empty() {
            return Err(PriceFeedUnavailable::InvalidDescriptor(
                descriptor.to_string(),
            ));
        }

        Ok(Self {
            url: url.to_string(),
            format,
        })
    }

    /// Extract the quote from a response body
    pub fn extract(&self, body: &str) -> Result<u64, PriceFeedUnavailable> {
        match &self.format {
            FeedFormat::RawNumber => parse_number(body),
            FeedFormat::Json(path) => {
                let json: Value = serde_json::from_str(body)?;
                let value = resolve(&json, path)
                    .ok_or_else(|| PriceFeedUnavailable::MissingField(render_path(path)))?;
                number_from_json(value)
            }
        }
    }
}

fn parse_path(path: &str) -> Vec<PathSegment> {
    PATH_SEGMENT
        .captures_iter(path)
        .filter_map(|caps| {
            if let Some(key) = caps.name("key") {
                Some(PathSegment::Key(key.as_str().to_string()))
            } else {
                caps.name("index")
                    .and_then(|index| index.as_str().parse().ok())
                    .map(PathSegment::Index)
            }
        })
        .collect()
}

fn render_path(path: &[PathSegment]) -> String {
    let mut out = String::new();
    for segment in path {
        match segment {
            PathSegment::Key(key) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(key);
            }
            PathSegment::Index(index) => out.push_str(&format!("[{index}]")),
        }
    }
    out
}

fn resolve<'a>(root: &'a Value, path: &[PathSegment]) -> Option<&'a Value> {
    path.iter().try_fold(root, |value, segment| match segment {
        PathSegment::Key(key) => value.get(key.as_str()),
        PathSegment::Index(index) => value.get(*index),
    })
}

fn number_from_json(value: &Value) -> Result<u64, PriceFeedUnavailable> {
    match value {
        Value::Number(number) => match number.as_u64() {
            Some(exact) => Ok(exact),
            None => parse_number(&number.to_string()),
        },
        Value::String(text) => parse_number(text),
        other => Err(PriceFeedUnavailable::NotANumber(other.to_string())),
    }
}

/// Parse a decimal quote, truncating any fractional part
fn parse_number(text: &str) -> Result<u64, PriceFeedUnavailable> {
    let cleaned = text.trim().trim_matches('"');
    if let Ok(exact) = cleaned.parse::<u64>() {
        return Ok(exact);
    }
    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(value.trunc() as u64),
        _ => Err(PriceFeedUnavailable::NotANumber(cleaned.to_string())),
    }
}

/// Source of bid quotes
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn fetch_quote(&self, descriptor: &str) -> Quote;
}

/// HTTP price-feed client
pub struct PriceOracle {
    client: reqwest::Client,
}

impl PriceOracle {
    pub fn new() -> Result<Self, PriceFeedUnavailable> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }

    pub async fn try_fetch(&self, descriptor: &str) -> Result<u64, PriceFeedUnavailable> {
        let feed = PriceFeed::parse(descriptor)?;

        let response = self.client.get(&feed.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PriceFeedUnavailable::Status(status));
        }

        let body = response.text().await?;
        feed.extract(&body)
    }
}

#[async_trait]
impl QuoteSource for PriceOracle {
    async fn fetch_quote(&self, descriptor: &str) -> Quote {
        match self.try_fetch(descriptor).await {
            Ok(value) => {
                debug!(target: "miner::oracle", descriptor, value, "Quote");
                Quote::Live(value)
            }
            Err(err) => {
                warn!(
                    target: "miner::oracle",
                    descriptor,
                    error = %err,
                    "Price feed unavailable, quoting zero"
                );
                Quote::Unavailable
            }
        }
    }
}
