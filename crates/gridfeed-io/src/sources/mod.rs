pub mod eia;

pub use eia::{Dataset, EiaClient, PagedFetcher, RequestDescriptor, Transport, UreqTransport};
