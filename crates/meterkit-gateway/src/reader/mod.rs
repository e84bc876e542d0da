//! Readers that need a runtime.

pub mod periodic;

pub use periodic::PeriodicReader;
