//! EIA Open Data (API v2) source.
//!
//! [`EiaClient::get_dataset`] is the entry point: it builds a
//! [`RequestDescriptor`], drives the [`PagedFetcher`] over a [`Transport`],
//! and hands the concatenated [`RawTable`] to the [`Dataset`] transform.

pub mod client;
pub mod dataset;
pub mod descriptor;
pub mod pager;
pub mod table;
pub mod transforms;
pub mod transport;

/// Rows requested per page; the API maximum for data routes.
pub const PAGE_SIZE: usize = 5000;

pub use client::{resolve_api_key, EiaClient, API_KEY_ENV};
pub use dataset::Dataset;
pub use descriptor::RequestDescriptor;
pub use pager::{page_count, PagedFetcher};
pub use table::{records_to_frame, RawTable};
pub use transport::{parse_page, RawPage, Record, Transport, UreqTransport};
