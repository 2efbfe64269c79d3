//! Execution and example-capture engine.

pub mod actions;
pub mod custom_function;
pub mod env;
pub mod error;
pub mod executor;
pub mod interpreter;
pub mod program;
pub mod replay;
pub mod resolver;
pub mod schema;
pub mod scrape;
