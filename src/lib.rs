//! Alert correlation across metrics, logs, traces and profiles.
//!
//! Given the name of a firing alert, the [`correlation::CorrelationEngine`]
//! finds the alert and its rule in the metrics backend, extracts the label
//! matchers of the rule's query, optionally resolves an exemplar into a trace
//! ID, and renders deep links into every configured backend.

pub mod api;
pub mod config;
pub mod correlation;
pub mod error;
pub mod links;
pub mod metrics;
pub mod promql;
pub mod sources;
pub mod upstream;

pub use config::Config;
pub use correlation::{CorrelationEngine, CorrelationInput, CorrelationResult};
pub use error::{CorrelatorError, Result};
pub use sources::{BackendKind, Source, SourceSet};
