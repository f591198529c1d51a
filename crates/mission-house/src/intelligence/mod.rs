//! Lookup memoization shared across pipeline calls.

pub mod cache;

pub use cache::LookupCache;
