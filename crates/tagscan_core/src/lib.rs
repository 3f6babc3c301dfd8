//! tagscan core - audio metadata extraction and normalization
//!
//! This crate contains all scanning logic with zero UI dependencies:
//! interchangeable extraction backends, a read-only tag normalization
//! facade, sidecar tag overrides and embedded lyrics parsing. It can
//! be embedded by a media server or driven from a CLI tool.

pub mod config;
pub mod extraction;
pub mod logging;
pub mod lyrics;
pub mod overrides;
pub mod tags;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
