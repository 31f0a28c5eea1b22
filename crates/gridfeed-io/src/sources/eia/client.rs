use gridfeed_core::{FeedError, FeedResult};
use gridfeed_ts::{format_api_hour, Timestamp};
use polars::prelude::DataFrame;
use serde_json::Value;
use tracing::debug;

use super::dataset::Dataset;
use super::descriptor::{join_route, RequestDescriptor};
use super::pager::PagedFetcher;
use super::transport::{Transport, UreqTransport};
use super::PAGE_SIZE;
use crate::config::{EiaConfig, FeedConfig};

pub const API_KEY_ENV: &str = "EIA_API_KEY";

/// EIA v2 client - fetches paged datasets and returns canonical tables.
pub struct EiaClient<T: Transport = UreqTransport> {
    api_key: String,
    base_url: String,
    concurrency: usize,
    verbose: bool,
    transport: T,
}

impl EiaClient<UreqTransport> {
    /// Client with an explicit key, or `EIA_API_KEY` when `None`.
    pub fn new(api_key: Option<String>) -> FeedResult<Self> {
        let config = EiaConfig {
            api_key,
            ..EiaConfig::default()
        };
        Self::with_transport(&config, UreqTransport::new())
    }

    pub fn from_config(config: &FeedConfig) -> FeedResult<Self> {
        Self::with_transport(&config.eia, UreqTransport::new())
    }
}

impl<T: Transport> EiaClient<T> {
    pub fn with_transport(config: &EiaConfig, transport: T) -> FeedResult<Self> {
        let api_key = resolve_api_key(
            config.api_key.as_deref(),
            std::env::var(API_KEY_ENV).ok(),
        )?;
        Ok(Self {
            api_key,
            base_url: config.base_url.clone(),
            concurrency: config.concurrency,
            verbose: config.verbose,
            transport,
        })
    }

    /// Fetch every page of `dataset` between `start` and `end` and reshape
    /// it with the dataset's registered transform.
    ///
    /// # Arguments
    ///
    /// * `dataset` - Route under the API base, e.g. `"electricity/rto/region-data"`
    /// * `start` - Inclusive start; naive values are read as UTC
    /// * `end` - Optional end; when `None` the API picks the upper bound.
    ///   Taken as a concrete `Option<Timestamp>` so a bare `None` needs no
    ///   type annotation; pass `Some(value.into())` otherwise
    /// * `concurrency` - Page fetch workers after the first page (0 = one per CPU)
    /// * `verbose` - Log request details and per-page progress at info level
    ///
    /// # Errors
    ///
    /// Fails as a whole if any page fails; partial tables are never returned.
    pub fn get_dataset(
        &self,
        dataset: &str,
        start: impl Into<Timestamp>,
        end: Option<Timestamp>,
        concurrency: usize,
        verbose: bool,
    ) -> FeedResult<DataFrame> {
        let dataset = Dataset::from_path(dataset);
        let start: Timestamp = start.into();
        let start = start.resolve()?;
        let end = end.map(|end| end.resolve()).transpose()?;

        let mut descriptor = RequestDescriptor::new(&self.base_url, dataset.path(), &self.api_key)
            .with_start(format_api_hour(&start))
            .with_frequency(dataset.frequency().api_label())
            .with_page_size(PAGE_SIZE);
        if let Some(end) = end {
            descriptor = descriptor.with_end(format_api_hour(&end));
        }

        let raw = PagedFetcher::new(&self.transport, concurrency)
            .verbose(verbose)
            .fetch(&descriptor)?;
        debug!(dataset = %dataset, rows = raw.len(), "raw table assembled");

        dataset.transform(raw.into_frame()?)
    }

    /// [`EiaClient::get_dataset`] with the configured concurrency and verbosity.
    pub fn get_dataset_with_defaults(
        &self,
        dataset: &str,
        start: impl Into<Timestamp>,
        end: Option<Timestamp>,
    ) -> FeedResult<DataFrame> {
        self.get_dataset(dataset, start, end, self.concurrency, self.verbose)
    }

    /// Describe a route: its child routes, or a dataset's facets and columns.
    pub fn list_routes(&self, route: &str) -> FeedResult<Value> {
        let url = join_route(&self.base_url, route);
        let headers = [("X-Api-Key", self.api_key.clone())];
        let body = self.transport.get_json(&url, &headers)?;
        if let Some(error) = body.get("error") {
            return Err(FeedError::Fetch(format!("API error: {error}")));
        }
        match body {
            Value::Object(mut root) => root
                .remove("response")
                .ok_or_else(|| FeedError::Schema("missing 'response' object".to_string())),
            _ => Err(FeedError::Schema("response body is not a JSON object".to_string())),
        }
    }
}

/// Pick the explicit key, else the environment value; blank keys count as missing.
pub fn resolve_api_key(explicit: Option<&str>, env_value: Option<String>) -> FeedResult<String> {
    explicit
        .map(str::to_string)
        .or(env_value)
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .ok_or_else(|| {
            FeedError::Auth(format!(
                "API key not provided and {API_KEY_ENV} not found in environment"
            ))
        })
}
