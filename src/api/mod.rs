pub mod handlers;
pub mod routes;

pub use routes::*;

use crate::correlation::CorrelationEngine;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<CorrelationEngine>,
}

impl AppState {
    pub fn new(engine: Arc<CorrelationEngine>) -> Self {
        Self { engine }
    }
}
