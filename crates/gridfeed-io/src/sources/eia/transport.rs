use gridfeed_core::{FeedError, FeedResult};
use serde_json::{Map, Value};

/// One row of an API response, as delivered.
pub type Record = Map<String, Value>;

/// HTTP seam for the EIA client.
///
/// Implementations are shared across page workers, so they must not keep
/// per-request state.
pub trait Transport: Send + Sync {
    fn get_json(&self, url: &str, headers: &[(&'static str, String)]) -> FeedResult<Value>;
}

/// Blocking transport over a shared `ureq` agent.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new().build(),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn get_json(&self, url: &str, headers: &[(&'static str, String)]) -> FeedResult<Value> {
        let mut request = self.agent.get(url);
        for (name, value) in headers {
            request = request.set(name, value);
        }

        let response = request.call().map_err(|err| match err {
            ureq::Error::Status(code, response) => FeedError::Fetch(format!(
                "{url} returned status {code}: {}",
                response.into_string().unwrap_or_default()
            )),
            ureq::Error::Transport(transport) => {
                FeedError::Fetch(format!("calling {url}: {transport}"))
            }
        })?;

        response
            .into_json::<Value>()
            .map_err(|err| FeedError::Fetch(format!("decoding JSON from {url}: {err}")))
    }
}

/// Records and reported total of one page.
#[derive(Debug, Clone, PartialEq)]
pub struct RawPage {
    pub records: Vec<Record>,
    pub total: usize,
}

/// Decode a `{ "response": { "data": [...], "total": n } }` body.
///
/// EIA reports `total` as a number on some routes and as a numeric string
/// on others; both are accepted.
pub fn parse_page(body: Value) -> FeedResult<RawPage> {
    let Value::Object(mut root) = body else {
        return Err(FeedError::Schema("response body is not a JSON object".to_string()));
    };
    if let Some(error) = root.get("error") {
        return Err(FeedError::Fetch(format!("API error: {error}")));
    }
    let Some(Value::Object(mut response)) = root.remove("response") else {
        return Err(FeedError::Schema("missing 'response' object".to_string()));
    };

    let total = match response.get("total") {
        Some(Value::Number(number)) => number.as_u64().map(|n| n as usize),
        Some(Value::String(text)) => text.trim().parse::<usize>().ok(),
        Some(_) => None,
        None => return Err(FeedError::Schema("missing 'response.total'".to_string())),
    }
    .ok_or_else(|| FeedError::Parse("'response.total' is not a record count".to_string()))?;

    let Some(Value::Array(rows)) = response.remove("data") else {
        return Err(FeedError::Schema("missing 'response.data' array".to_string()));
    };
    let records = rows
        .into_iter()
        .enumerate()
        .map(|(idx, row)| match row {
            Value::Object(record) => Ok(record),
            _ => Err(FeedError::Schema(format!("data row {idx} is not an object"))),
        })
        .collect::<FeedResult<Vec<_>>>()?;

    Ok(RawPage { records, total })
}
