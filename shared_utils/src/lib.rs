//! Small helpers shared by the workspace binaries.

pub mod config;
pub mod env;
