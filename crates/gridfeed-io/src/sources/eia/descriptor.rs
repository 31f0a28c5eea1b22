use serde_json::{json, Value};

/// Immutable description of one paged dataset query.
///
/// Page copies are derived with [`RequestDescriptor::for_page`]; the offset
/// is the only field that differs between them, and it can only be set that
/// way, so it is always a multiple of the page size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestDescriptor {
    base_url: String,
    dataset: String,
    api_key: String,
    start: Option<String>,
    end: Option<String>,
    frequency: String,
    page_size: usize,
    offset: usize,
}

impl RequestDescriptor {
    pub fn new(base_url: &str, dataset: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            dataset: dataset.to_string(),
            api_key: api_key.to_string(),
            start: None,
            end: None,
            frequency: "hourly".to_string(),
            page_size: super::PAGE_SIZE,
            offset: 0,
        }
    }

    pub fn with_start(mut self, start: impl Into<String>) -> Self {
        self.start = Some(start.into());
        self
    }

    pub fn with_end(mut self, end: impl Into<String>) -> Self {
        self.end = Some(end.into());
        self
    }

    pub fn with_frequency(mut self, frequency: impl Into<String>) -> Self {
        self.frequency = frequency.into();
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Copy of this descriptor positioned at `page`.
    pub fn for_page(&self, page: usize) -> Self {
        Self {
            offset: page * self.page_size,
            ..self.clone()
        }
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn start(&self) -> Option<&str> {
        self.start.as_deref()
    }

    pub fn end(&self) -> Option<&str> {
        self.end.as_deref()
    }

    pub fn frequency(&self) -> &str {
        &self.frequency
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Data endpoint, e.g. `https://api.eia.gov/v2/electricity/rto/region-data/data/`.
    pub fn url(&self) -> String {
        format!("{}/data/", join_route(&self.base_url, &self.dataset))
    }

    /// Query parameters sent in the `X-Params` header.
    ///
    /// `end` is omitted entirely when unset so the API picks the upper bound.
    pub fn params(&self) -> Value {
        let mut params = json!({
            "frequency": self.frequency,
            "data": ["value"],
            "facets": {},
            "offset": self.offset,
            "length": self.page_size,
        });
        if let Some(start) = &self.start {
            params["start"] = json!(start);
        }
        if let Some(end) = &self.end {
            params["end"] = json!(end);
        }
        params
    }

    pub fn headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("X-Api-Key", self.api_key.clone()),
            ("X-Params", self.params().to_string()),
        ]
    }
}

/// Join an API base URL and a route without doubling or dropping slashes.
pub fn join_route(base_url: &str, route: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let route = route.trim_matches('/');
    if route.is_empty() {
        format!("{base}/")
    } else {
        format!("{base}/{route}")
    }
}
