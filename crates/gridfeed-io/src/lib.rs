//! # gridfeed-io: Grid-Operator Data Fetching
//!
//! Pulls electricity-grid operational data (load, generation mix,
//! interchange, forecasts) from grid-operator web APIs and normalizes it
//! into polars [`DataFrame`](polars::prelude::DataFrame)s with a stable,
//! interval-indexed schema.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use gridfeed_io::sources::EiaClient;
//!
//! fn main() -> gridfeed_core::FeedResult<()> {
//!     let client = EiaClient::new(None)?; // reads EIA_API_KEY
//!     let df = client.get_dataset(
//!         "electricity/rto/region-data",
//!         "2024-01-01",
//!         Some("2024-01-02".into()),
//!         4,
//!         true,
//!     )?;
//!     println!("{} rows", df.height());
//!     Ok(())
//! }
//! ```
//!
//! ## Pipeline
//!
//! 1. **Descriptor** - one immutable request description per call; each
//!    page gets its own copy with only the offset changed
//! 2. **Paging** - page 0 reports the total, the rest fan out over a
//!    bounded rayon pool and are reassembled in page order
//! 3. **Raw table** - JSON records become a frame with inferred column types
//! 4. **Transform** - the [`sources::eia::Dataset`] registry reshapes known
//!    datasets; unknown ones pass through unchanged
//!
//! ## Registered Datasets
//!
//! | Route | Output |
//! |-------|--------|
//! | `electricity/rto/interchange-data` | BA-to-BA flows, sorted by interval then origin BA |
//! | `electricity/rto/region-data` | Load, forecast, net generation, interchange per respondent |
//! | `electricity/rto/fuel-type-data` | Generation per fuel type per respondent |
//!
//! ## Error Handling
//!
//! Everything returns [`gridfeed_core::FeedResult`]. A failed page fails the
//! whole call; there is no retry and no partial result.

pub mod config;
pub mod sources;

pub use config::{EiaConfig, FeedConfig};
