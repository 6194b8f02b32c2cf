/// Alert correlation
///
/// This module provides:
/// - Alert and rule resolution against the metrics backend
/// - Exemplar selection for pivoting into traces, logs and profiles
/// - Assembly of per-backend deep links with per-entry errors

pub mod engine;
pub mod exemplar;
pub mod models;

pub use engine::CorrelationEngine;
pub use exemplar::{AbsentReason, ExemplarResolver, Resolution};
pub use models::{
    AlertQuery, CorrelationEntry, CorrelationInput, CorrelationResult, ExemplarPivot,
    RecognizedView, TimeWindow,
};
