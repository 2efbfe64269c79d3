pub mod api;
pub mod browser;
pub mod cli;
pub mod dom;
pub mod engine;
pub mod flows;
pub mod interaction;
pub mod secrets;
pub mod trace;

pub use engine::error::{ParsagonError, Result};
pub use engine::executor::{Executor, ExecutorConfig};
pub use engine::program::{Program, Step};
