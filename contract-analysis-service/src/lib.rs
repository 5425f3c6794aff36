//! Contract risk analysis handler for Function Compute.
//!
//! Takes a contract text and a language code, asks the DashScope
//! text-generation API for a trade-lawyer style risk review, and answers with
//! an HTTP-shaped JSON result.

pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
