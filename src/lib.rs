//! Turns bank SMS and payment-app notification text into categorized
//! transactions: classify, extract, dedup, categorize, store.

pub mod categorizer;
pub mod classifier;
pub mod cli;
pub mod db;
pub mod dedup;
pub mod error;
pub mod extractor;
pub mod fmt;
pub mod ingest;
pub mod models;
pub mod pipeline;
pub mod settings;
pub mod store;
pub mod sync;

pub use error::{KharchaError, Result};
pub use pipeline::{Outcome, Pipeline};
