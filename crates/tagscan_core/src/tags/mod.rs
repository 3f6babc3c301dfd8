//! Normalized, read-only view over raw extraction output.

mod facade;

pub use facade::Tags;
