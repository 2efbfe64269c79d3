//! Remote backend: traits, HTTP client and wire models.

pub mod backend;
pub mod client;
pub mod models;
