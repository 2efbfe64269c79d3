//! Node identifiers, snapshots and the selection highlighter.

pub mod highlights;
pub mod identifier;
pub mod sanitize;
