//! Invocation handlers.

pub mod analyze;

pub use analyze::{AnalysisError, RequestHandler};
