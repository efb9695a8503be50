//! Bulk resolution of addresses against the threat intelligence API.
//!
//! The [`Resolver`] sends one request per batch through a [`Transport`] and retries failed
//! batches with exponential backoff. A batch that still fails after all attempts is logged and
//! skipped, it never aborts the run.

mod http;

pub use self::http::HttpTransport;

use std::time::Duration;

use ::http::StatusCode;
use log::{debug, error, info, trace, warn};
#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::{
    address::{self, Address},
    aggregate::{Aggregator, ResultRecord},
    config::ResolverConfig,
};

/// Projection requesting every field the API knows about
pub const PROJECTION_ALL: &str = "all";

/// Body of a bulk-resolve request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkRequest {
    pub addresses: Vec<String>,
    pub projection: Vec<String>,
}

impl BulkRequest {
    pub fn new(batch: &[Address]) -> Self {
        BulkRequest {
            addresses: batch.iter().map(|a| a.as_str().to_owned()).collect(),
            projection: vec![PROJECTION_ALL.to_owned()],
        }
    }
}

/// Raw answer of the API, before any parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub body: String,
}

/// A request that did not produce a usable answer.
/// If the failure happened after a response arrived, that response is attached.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{msg}")]
pub struct TransportError {
    msg: String,
    response: Option<TransportResponse>,
}

impl TransportError {
    pub fn with_response(msg: String, response: TransportResponse) -> Self {
        TransportError {
            msg,
            response: Some(response),
        }
    }

    pub fn response(&self) -> Option<&TransportResponse> {
        self.response.as_ref()
    }
}

impl From<String> for TransportError {
    fn from(msg: String) -> Self {
        TransportError {
            msg,
            response: None,
        }
    }
}

/// A `Transport` delivers a [`BulkRequest`] to the API and returns its raw response
#[cfg_attr(test, automock)]
pub trait Transport {
    fn post(&self, request: &BulkRequest) -> Result<TransportResponse, TransportError>;
}

/// Blocking wait, used for backoff and throttling
#[cfg_attr(test, automock)]
pub trait Pause {
    fn pause(&self, duration: Duration);
}

/// A [`Pause`] that puts the current thread to sleep
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Deserialize)]
struct BulkResponse {
    #[serde(default)]
    results: Option<Map<String, Value>>,
}

/// Records extracted from one successful request
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchResult {
    /// One record per address in the batch, in batch order
    pub records: Vec<(Address, ResultRecord)>,
    /// Addresses the API did not return data for. Their records are empty
    pub missing: Vec<Address>,
}

/// Counters for a complete run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub batches: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Position of a batch within the run, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPosition {
    pub number: usize,
    pub total: usize,
}

/// Resolves batches of addresses, retrying failures with exponential backoff.
///
/// To create a resolver, use [`Resolver::new()`] with a [`Transport`], such as [`HttpTransport`].
pub struct Resolver<'a> {
    transport: &'a dyn Transport,
    pause: &'a dyn Pause,
    config: ResolverConfig,
}

impl<'a> Resolver<'a> {
    pub fn new(transport: &'a dyn Transport, pause: &'a dyn Pause, config: ResolverConfig) -> Self {
        Resolver {
            transport,
            pause,
            config,
        }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Resolve all `addresses` batch by batch and fold the results into `aggregator`.
    /// Failed batches are skipped. There is a fixed pause after every batch.
    pub fn resolve_all(&self, addresses: &[Address], aggregator: &mut Aggregator) -> RunSummary {
        let batches = address::batches(addresses, self.config.batch_size);
        let mut summary = RunSummary {
            batches: batches.len(),
            ..Default::default()
        };

        for (i, batch) in batches.iter().enumerate() {
            let position = BatchPosition {
                number: i + 1,
                total: batches.len(),
            };
            info!(
                "Processing batch {}/{} with {} IPs...",
                position.number,
                position.total,
                batch.len()
            );

            match self.resolve_batch(batch, position) {
                Some(result) => {
                    for (addr, record) in result.records {
                        aggregator.insert(addr, record);
                    }
                    summary.succeeded += 1;
                }
                None => summary.failed += 1,
            }

            self.pause.pause(self.config.per_batch_delay);
        }

        if summary.failed > 0 {
            warn!(
                "{} of {} batches failed and are missing from the results",
                summary.failed, summary.batches
            );
        }
        summary
    }

    /// Resolve a single batch. Returns [`None`] once every attempt has failed.
    pub fn resolve_batch(&self, batch: &[Address], position: BatchPosition) -> Option<BatchResult> {
        let request = BulkRequest::new(batch);

        for attempt in 1..=self.config.max_retries {
            trace!("Batch {} attempt {}", position.number, attempt);
            match self.transport.post(&request) {
                Ok(response) if response.status == StatusCode::OK => {
                    match extract_records(batch, &response.body) {
                        Ok(result) => {
                            debug!(
                                "Batch {} resolved on attempt {} ({} missing)",
                                position.number,
                                attempt,
                                result.missing.len()
                            );
                            return Some(result);
                        }
                        Err(e) => {
                            error!(
                                "Could not parse response for batch {}: {}",
                                position.number, e
                            );
                        }
                    }
                }
                Ok(response) => {
                    error!(
                        "Failed to get data for batch {}. Status code: {}",
                        position.number,
                        response.status.as_u16()
                    );
                    if response.status == StatusCode::BAD_REQUEST {
                        error!("Response Content: {}", response.body);
                    }
                }
                Err(e) => {
                    error!(
                        "Error while requesting data for batch {}: {}",
                        position.number, e
                    );
                    if let Some(response) = e.response() {
                        error!("Response Status Code: {}", response.status.as_u16());
                        error!("Response Content: {}", response.body);
                    }
                }
            }

            let backoff = self.config.backoff(attempt);
            debug!(
                "Waiting {:?} before the next attempt for batch {}",
                backoff, position.number
            );
            self.pause.pause(backoff);
        }

        error!(
            "Giving up on batch {} after {} attempts",
            position.number, self.config.max_retries
        );
        None
    }
}

// Pick the record for every address in the batch out of a successful response body.
// Addresses without data get an empty record.
fn extract_records(batch: &[Address], body: &str) -> Result<BatchResult, serde_json::Error> {
    let response: BulkResponse = serde_json::from_str(body)?;
    let results = response.results.unwrap_or_default();

    let mut out = BatchResult::default();
    for addr in batch {
        let record = match results.get(addr.as_str()) {
            Some(Value::Object(record)) => Some(record.to_owned()),
            Some(Value::Null) | None => None,
            Some(other) => {
                warn!("Unexpected data for IP {}: {}", addr, other);
                None
            }
        };
        match record {
            Some(record) => out.records.push((addr.to_owned(), record)),
            None => {
                warn!("Data for IP {} not found in the response.", addr);
                out.missing.push(addr.to_owned());
                out.records.push((addr.to_owned(), ResultRecord::new()));
            }
        }
    }
    Ok(out)
}
