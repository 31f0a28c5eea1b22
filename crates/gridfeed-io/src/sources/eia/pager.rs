use std::sync::atomic::{AtomicUsize, Ordering};

use gridfeed_core::{FeedError, FeedResult};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::{debug, info};

use super::descriptor::RequestDescriptor;
use super::table::RawTable;
use super::transport::{parse_page, RawPage, Transport};

/// Number of pages needed to cover `total` records.
pub fn page_count(total: usize, page_size: usize) -> usize {
    total.div_ceil(page_size)
}

/// Fetches every page of a query and stitches them back together.
///
/// Page 0 is fetched first, on the calling thread, to learn the total. The
/// remaining pages go to a rayon pool of `concurrency` workers (0 means one
/// per CPU). Results are reassembled by page index, so the output does not
/// depend on worker count or on the order fetches complete. Any failed page
/// fails the whole call.
pub struct PagedFetcher<'a, T: Transport + ?Sized> {
    transport: &'a T,
    concurrency: usize,
    verbose: bool,
}

impl<'a, T: Transport + ?Sized> PagedFetcher<'a, T> {
    pub fn new(transport: &'a T, concurrency: usize) -> Self {
        Self {
            transport,
            concurrency,
            verbose: false,
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn workers(&self) -> usize {
        if self.concurrency == 0 {
            num_cpus::get()
        } else {
            self.concurrency
        }
    }

    pub fn fetch(&self, descriptor: &RequestDescriptor) -> FeedResult<RawTable> {
        let page_size = descriptor.page_size();
        if page_size == 0 {
            return Err(FeedError::Config("page size must be positive".to_string()));
        }

        let url = descriptor.url();
        let workers = self.workers();
        if self.verbose {
            info!(%url, params = %descriptor.params(), workers, "fetching dataset");
        } else {
            debug!(%url, workers, "fetching dataset");
        }

        let first = self.fetch_page(descriptor, 0)?;
        let total_pages = page_count(first.total, page_size);
        if self.verbose {
            info!(total_records = first.total, total_pages, "page 0 received");
        }

        let mut table = RawTable::from(first.records);
        if total_pages <= 1 {
            return Ok(table);
        }

        let progress = PageProgress::new(total_pages, self.verbose);
        progress.record();

        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|err| FeedError::Config(format!("building page fetch pool: {err}")))?;

        // Indexed collect keeps page order; the first error short-circuits it.
        let pages: Vec<RawPage> = pool.install(|| {
            (1..total_pages)
                .into_par_iter()
                .map(|page| {
                    let result = self.fetch_page(descriptor, page);
                    if result.is_ok() {
                        progress.record();
                    }
                    result
                })
                .collect::<FeedResult<Vec<_>>>()
        })?;

        for page in pages {
            table.append(page.records);
        }
        Ok(table)
    }

    fn fetch_page(&self, base: &RequestDescriptor, page: usize) -> FeedResult<RawPage> {
        let request = base.for_page(page);
        let body = self
            .transport
            .get_json(&request.url(), &request.headers())
            .map_err(|err| match err {
                FeedError::Fetch(msg) => FeedError::Fetch(format!(
                    "page {page} (offset {}): {msg}",
                    request.offset()
                )),
                other => other,
            })?;
        parse_page(body)
    }
}

/// Completed-page counter, kept apart from result assembly.
struct PageProgress {
    completed: AtomicUsize,
    total: usize,
    verbose: bool,
}

impl PageProgress {
    fn new(total: usize, verbose: bool) -> Self {
        Self {
            completed: AtomicUsize::new(0),
            total,
            verbose,
        }
    }

    fn record(&self) {
        let completed = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
        if self.verbose {
            info!(completed, total = self.total, "fetched page");
        } else {
            debug!(completed, total = self.total, "fetched page");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    /// Serves `total` sequential records, optionally failing or stalling
    /// on chosen offsets.
    struct PagedSource {
        total: usize,
        fail_offset: Option<usize>,
        slow_offsets: Vec<usize>,
        offsets: Mutex<Vec<usize>>,
    }

    impl PagedSource {
        fn new(total: usize) -> Self {
            Self {
                total,
                fail_offset: None,
                slow_offsets: Vec::new(),
                offsets: Mutex::new(Vec::new()),
            }
        }

        fn requested(&self) -> Vec<usize> {
            let mut offsets = self.offsets.lock().unwrap().clone();
            offsets.sort_unstable();
            offsets
        }
    }

    impl Transport for PagedSource {
        fn get_json(&self, _url: &str, headers: &[(&'static str, String)]) -> FeedResult<Value> {
            let params: Value = headers
                .iter()
                .find(|(name, _)| *name == "X-Params")
                .map(|(_, raw)| serde_json::from_str(raw).unwrap())
                .unwrap();
            let offset = params["offset"].as_u64().unwrap() as usize;
            let length = params["length"].as_u64().unwrap() as usize;
            self.offsets.lock().unwrap().push(offset);

            if self.slow_offsets.contains(&offset) {
                thread::sleep(Duration::from_millis(40));
            }
            if self.fail_offset == Some(offset) {
                return Err(FeedError::Fetch("503 Service Unavailable".to_string()));
            }

            let end = (offset + length).min(self.total);
            let data: Vec<Value> = (offset..end).map(|n| json!({ "n": n })).collect();
            Ok(json!({"response": {"total": self.total, "data": data}}))
        }
    }

    fn descriptor(page_size: usize) -> RequestDescriptor {
        RequestDescriptor::new("https://example.test/v2/", "electricity/test", "key")
            .with_start("2023-01-01T00")
            .with_page_size(page_size)
    }

    fn row_numbers(table: &RawTable) -> Vec<u64> {
        table
            .records()
            .iter()
            .map(|record| record["n"].as_u64().unwrap())
            .collect()
    }

    #[test]
    fn page_count_is_ceiling() {
        assert_eq!(page_count(0, 5000), 0);
        assert_eq!(page_count(1, 5000), 1);
        assert_eq!(page_count(5000, 5000), 1);
        assert_eq!(page_count(5001, 5000), 2);
        assert_eq!(page_count(12_000, 5000), 3);
    }

    #[test]
    fn single_page_makes_one_request() {
        let source = PagedSource::new(40);
        let table = PagedFetcher::new(&source, 4).fetch(&descriptor(50)).unwrap();
        assert_eq!(table.len(), 40);
        assert_eq!(source.requested(), vec![0]);
    }

    #[test]
    fn empty_result_makes_one_request() {
        let source = PagedSource::new(0);
        let table = PagedFetcher::new(&source, 1).fetch(&descriptor(50)).unwrap();
        assert!(table.is_empty());
        assert_eq!(source.requested(), vec![0]);
    }

    #[test]
    fn twelve_thousand_rows_take_three_pages() {
        let source = PagedSource::new(12_000);
        let table = PagedFetcher::new(&source, 1).fetch(&descriptor(5000)).unwrap();
        assert_eq!(source.requested(), vec![0, 5000, 10_000]);
        assert_eq!(table.len(), 12_000);
        assert_eq!(row_numbers(&table), (0..12_000).collect::<Vec<u64>>());
    }

    #[test]
    fn order_is_independent_of_worker_count() {
        let sequential = PagedFetcher::new(&PagedSource::new(95), 1)
            .fetch(&descriptor(10))
            .unwrap();
        let parallel = PagedFetcher::new(&PagedSource::new(95), 8)
            .fetch(&descriptor(10))
            .unwrap();
        assert_eq!(sequential, parallel);
        assert_eq!(row_numbers(&parallel), (0..95).collect::<Vec<u64>>());
    }

    #[test]
    fn order_is_independent_of_completion_order() {
        let mut source = PagedSource::new(60);
        source.slow_offsets = vec![10, 20];
        let table = PagedFetcher::new(&source, 5).fetch(&descriptor(10)).unwrap();
        assert_eq!(row_numbers(&table), (0..60).collect::<Vec<u64>>());
    }

    #[test]
    fn failed_page_fails_whole_fetch() {
        let mut source = PagedSource::new(50);
        source.fail_offset = Some(30);
        let err = PagedFetcher::new(&source, 3)
            .verbose(true)
            .fetch(&descriptor(10))
            .unwrap_err();
        assert!(err.is_fetch());
        assert!(err.to_string().contains("page 3"));
    }

    #[test]
    fn failed_first_page_stops_before_dispatch() {
        let mut source = PagedSource::new(50);
        source.fail_offset = Some(0);
        assert!(PagedFetcher::new(&source, 3).fetch(&descriptor(10)).is_err());
        assert_eq!(source.requested(), vec![0]);
    }

    #[test]
    fn zero_page_size_is_config_error() {
        let source = PagedSource::new(10);
        let err = PagedFetcher::new(&source, 1).fetch(&descriptor(0)).unwrap_err();
        assert!(matches!(err, FeedError::Config(_)));
        assert!(source.requested().is_empty());
    }

    #[test]
    fn zero_concurrency_uses_every_cpu() {
        let source = PagedSource::new(30);
        let fetcher = PagedFetcher::new(&source, 0);
        assert_eq!(fetcher.workers(), num_cpus::get());
        assert_eq!(fetcher.fetch(&descriptor(10)).unwrap().len(), 30);
    }
}
