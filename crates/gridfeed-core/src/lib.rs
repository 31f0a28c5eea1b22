//! # gridfeed-core
//!
//! Shared pieces for the gridfeed crates. Right now that is the error
//! taxonomy every fetch, parse and transform step reports through.
//!
//! ```rust
//! use gridfeed_core::{FeedError, FeedResult};
//!
//! fn require_key(key: Option<&str>) -> FeedResult<&str> {
//!     key.ok_or_else(|| FeedError::Auth("no API key".into()))
//! }
//!
//! assert!(require_key(None).is_err());
//! ```

pub mod error;

pub use error::{FeedError, FeedResult};
