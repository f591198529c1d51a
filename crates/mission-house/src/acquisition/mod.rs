//! Plain HTTP acquisition.
//!
//! Used where a rendered page is not required. The browser engine in
//! [`crate::live`] covers the sites that need script execution or UI
//! interaction.

pub mod http_client;
pub mod resolver;

pub use http_client::{ContentFetcher, FetchRequest, FetchResult};
