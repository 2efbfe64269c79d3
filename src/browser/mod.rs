//! Browser automation: the driver capability and its subprocess implementation.

pub mod cleanup;
pub mod driver;
pub mod resolution;
pub mod session;
