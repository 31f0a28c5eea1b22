use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use chrono::{NaiveDate, TimeZone, Utc};
use gridfeed_core::{FeedError, FeedResult};
use gridfeed_io::sources::eia::{EiaClient, Transport, PAGE_SIZE};
use gridfeed_io::EiaConfig;
use polars::prelude::*;
use serde_json::{json, Value};

const INTERCHANGE: &str = "electricity/rto/interchange-data";
const REGION: &str = "electricity/rto/region-data";
const UNREGISTERED: &str = "electricity/unregistered";

/// In-memory EIA endpoint. Rows are produced by `row(n)` for `n` in
/// `0..total`, sliced according to the offset/length in `X-Params`.
struct MockEia {
    total: usize,
    row: fn(usize) -> Value,
    fail_offset: Option<usize>,
    slow_offset: Option<usize>,
    seen: Mutex<Vec<Value>>,
}

impl MockEia {
    fn new(total: usize, row: fn(usize) -> Value) -> Self {
        Self {
            total,
            row,
            fail_offset: None,
            slow_offset: None,
            seen: Mutex::new(Vec::new()),
        }
    }

    fn seen_offsets(&self) -> Vec<u64> {
        let mut offsets: Vec<u64> = self
            .seen
            .lock()
            .unwrap()
            .iter()
            .map(|params| params["offset"].as_u64().unwrap())
            .collect();
        offsets.sort_unstable();
        offsets
    }

    fn first_params(&self) -> Value {
        self.seen.lock().unwrap()[0].clone()
    }
}

impl Transport for MockEia {
    fn get_json(&self, url: &str, headers: &[(&'static str, String)]) -> FeedResult<Value> {
        assert!(url.ends_with("/data/"), "unexpected url {url}");
        let key = headers.iter().find(|(name, _)| *name == "X-Api-Key").unwrap();
        assert_eq!(key.1, "test-key");

        let raw = &headers.iter().find(|(name, _)| *name == "X-Params").unwrap().1;
        let params: Value = serde_json::from_str(raw).unwrap();
        let offset = params["offset"].as_u64().unwrap() as usize;
        let length = params["length"].as_u64().unwrap() as usize;
        self.seen.lock().unwrap().push(params);

        if self.slow_offset == Some(offset) {
            thread::sleep(Duration::from_millis(50));
        }
        if self.fail_offset == Some(offset) {
            return Err(FeedError::Fetch("connection reset".to_string()));
        }

        let end = (offset + length).min(self.total);
        let data: Vec<Value> = (offset..end).map(self.row).collect();
        // EIA sends the total as a string on the data routes.
        Ok(json!({"response": {"total": self.total.to_string(), "data": data}}))
    }
}

fn numbered_row(n: usize) -> Value {
    json!({"period": "2023-01-01T00", "n": n, "label": format!("row-{n}")})
}

fn interchange_row(n: usize) -> Value {
    let bas = ["PJM", "MISO", "CISO", "ERCO"];
    json!({
        "period": format!("2023-01-{:02}T{:02}", 1 + (n / 24) % 28, n % 24),
        "fromba": bas[n % 4],
        "fromba-name": format!("{} name", bas[n % 4]),
        "toba": bas[(n + 1) % 4],
        "toba-name": format!("{} name", bas[(n + 1) % 4]),
        "value": n as i64 - 100,
        "value-units": "megawatthours"
    })
}

fn region_row(n: usize) -> Value {
    let codes = ["D", "TI", "NG", "DF"];
    json!({
        "period": format!("2023-01-01T{:02}", n / 4),
        "respondent": "PJM",
        "respondent-name": "PJM Interconnection",
        "type": codes[n % 4],
        "value": (1000 + n).to_string()
    })
}

fn client(mock: MockEia) -> EiaClient<MockEia> {
    let config = EiaConfig {
        api_key: Some("test-key".to_string()),
        ..EiaConfig::default()
    };
    EiaClient::with_transport(&config, mock).unwrap()
}

fn client_ref(mock: &MockEia) -> EiaClient<&MockEia> {
    let config = EiaConfig {
        api_key: Some("test-key".to_string()),
        ..EiaConfig::default()
    };
    EiaClient::with_transport(&config, mock).unwrap()
}

impl Transport for &MockEia {
    fn get_json(&self, url: &str, headers: &[(&'static str, String)]) -> FeedResult<Value> {
        (**self).get_json(url, headers)
    }
}

fn ints(df: &DataFrame, column: &str) -> Vec<Option<i64>> {
    df.column(column).unwrap().i64().unwrap().into_iter().collect()
}

#[test]
fn twelve_thousand_records_fetch_three_pages_in_order() {
    let mock = MockEia::new(12_000, numbered_row);
    let df = client_ref(&mock)
        .get_dataset(UNREGISTERED, "2023-01-01", None, 1, false)
        .unwrap();

    assert_eq!(mock.seen_offsets(), vec![0, 5000, 10_000]);
    assert_eq!(df.height(), 12_000);
    let expected: Vec<Option<i64>> = (0..12_000).map(Some).collect();
    assert_eq!(ints(&df, "n"), expected);
}

#[test]
fn small_result_is_a_single_request() {
    let mock = MockEia::new(PAGE_SIZE, numbered_row);
    let df = client_ref(&mock)
        .get_dataset(UNREGISTERED, "2023-01-01", None, 8, false)
        .unwrap();
    assert_eq!(mock.seen_offsets(), vec![0]);
    assert_eq!(df.height(), PAGE_SIZE);
}

#[test]
fn unregistered_dataset_is_returned_column_for_column() {
    let mock = MockEia::new(3, numbered_row);
    let df = client_ref(&mock)
        .get_dataset(UNREGISTERED, "2023-01-01", None, 1, false)
        .unwrap();

    assert_eq!(df.get_column_names(), vec!["period", "n", "label"]);
    assert_eq!(df.column("period").unwrap().dtype(), &DataType::Utf8);
    assert_eq!(df.column("n").unwrap().dtype(), &DataType::Int64);
    let labels: Vec<Option<&str>> = df.column("label").unwrap().utf8().unwrap().into_iter().collect();
    assert_eq!(labels, vec![Some("row-0"), Some("row-1"), Some("row-2")]);
}

#[test]
fn row_order_does_not_depend_on_worker_count_or_latency() {
    let sequential = client(MockEia::new(11_000, numbered_row))
        .get_dataset(UNREGISTERED, "2023-01-01", None, 1, false)
        .unwrap();

    let mut slow = MockEia::new(11_000, numbered_row);
    slow.slow_offset = Some(5000);
    let parallel = client(slow)
        .get_dataset(UNREGISTERED, "2023-01-01", None, 4, true)
        .unwrap();

    assert_eq!(ints(&sequential, "n"), ints(&parallel, "n"));
}

#[test]
fn failed_page_fails_the_whole_call() {
    let mut mock = MockEia::new(12_000, interchange_row);
    mock.fail_offset = Some(10_000);
    let result = client(mock).get_dataset(INTERCHANGE, "2023-01-01", None, 3, false);

    match result {
        Err(FeedError::Fetch(msg)) => assert!(msg.contains("offset 10000"), "{msg}"),
        Err(other) => panic!("expected fetch error, got {other}"),
        Ok(df) => panic!("expected no table, got {} rows", df.height()),
    }
}

#[test]
fn interchange_is_sorted_by_start_then_from_ba() {
    let mock = MockEia::new(6000, interchange_row);
    let df = client_ref(&mock)
        .get_dataset(INTERCHANGE, "2023-01-01", Some("2023-02-01".into()), 2, false)
        .unwrap();

    assert_eq!(df.height(), 6000);
    assert_eq!(
        df.get_column_names(),
        vec![
            "Interval Start",
            "Interval End",
            "From BA",
            "From BA Name",
            "To BA",
            "To BA Name",
            "MW"
        ]
    );

    let starts: Vec<i64> = df
        .column("Interval Start")
        .unwrap()
        .cast(&DataType::Int64)
        .unwrap()
        .i64()
        .unwrap()
        .into_no_null_iter()
        .collect();
    let from_ba: Vec<String> = df
        .column("From BA")
        .unwrap()
        .utf8()
        .unwrap()
        .into_no_null_iter()
        .map(str::to_string)
        .collect();
    for i in 1..starts.len() {
        let prev = (starts[i - 1], &from_ba[i - 1]);
        let next = (starts[i], &from_ba[i]);
        assert!(prev <= next, "row {i} out of order: {prev:?} > {next:?}");
    }
}

#[test]
fn region_data_pivots_through_the_client() {
    let mock = MockEia::new(8, region_row);
    let df = client_ref(&mock)
        .get_dataset(REGION, "2023-01-01", None, 1, false)
        .unwrap();

    assert_eq!(df.height(), 2);
    assert_eq!(ints(&df, "Load"), vec![Some(1000), Some(1004)]);
    assert_eq!(ints(&df, "Total Interchange"), vec![Some(1001), Some(1005)]);
    assert_eq!(ints(&df, "Net Generation"), vec![Some(1002), Some(1006)]);
    assert_eq!(ints(&df, "Load Forecast"), vec![Some(1003), Some(1007)]);

    let start_ms = df
        .column("Interval Start")
        .unwrap()
        .cast(&DataType::Int64)
        .unwrap();
    let expected = Utc.with_ymd_and_hms(2022, 12, 31, 23, 0, 0).unwrap();
    assert_eq!(start_ms.i64().unwrap().get(0), Some(expected.timestamp_millis()));
}

#[test]
fn request_parameters_follow_the_inputs() {
    let mock = MockEia::new(1, numbered_row);
    client_ref(&mock)
        .get_dataset(UNREGISTERED, "2023-01-01T05:30:00+02:00", None, 1, false)
        .unwrap();
    let params = mock.first_params();
    assert_eq!(params["start"], "2023-01-01T03");
    assert_eq!(params["frequency"], "hourly");
    assert_eq!(params["length"], PAGE_SIZE);
    assert!(params.get("end").is_none());

    let bounded = MockEia::new(1, numbered_row);
    let end = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
    client_ref(&bounded)
        .get_dataset(UNREGISTERED, "2023-01-01", Some(end.into()), 1, false)
        .unwrap();
    assert_eq!(bounded.first_params()["end"], "2023-01-02T00");
}

#[test]
fn registered_dataset_sends_its_frequency_and_bounds() {
    let mock = MockEia::new(4, region_row);
    let df = client_ref(&mock)
        .get_dataset(REGION, "2023-01-01", Some("2023-01-01T06".into()), 1, false)
        .unwrap();
    assert_eq!(df.height(), 1);
    let params = mock.first_params();
    assert_eq!(params["frequency"], "hourly");
    assert_eq!(params["start"], "2023-01-01T00");
    assert_eq!(params["end"], "2023-01-01T06");
}

#[test]
fn unparseable_start_is_rejected_before_any_request() {
    let mock = MockEia::new(10, numbered_row);
    let err = client_ref(&mock)
        .get_dataset(REGION, "next tuesday", None, 1, false)
        .unwrap_err();
    assert!(matches!(err, FeedError::Parse(_)));
    assert!(mock.seen_offsets().is_empty());
}

#[test]
fn blank_configured_key_is_rejected_at_construction() {
    let config = EiaConfig {
        api_key: Some("   ".to_string()),
        ..EiaConfig::default()
    };
    let result = EiaClient::with_transport(&config, MockEia::new(0, numbered_row));
    assert!(matches!(result, Err(FeedError::Auth(_))));
}
