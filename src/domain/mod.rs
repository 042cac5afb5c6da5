//! Tool surface and argument helpers
//!
//! Shapes registry descriptors and dispatcher outcomes into MCP tool results.

pub mod tools;
pub mod utils;
