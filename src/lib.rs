//! Kiln library
//!
//! Core functionality for the kiln build orchestrator: project introspection,
//! config resolution for the wrapped tools, and the build pipeline.

pub mod cli;
pub mod config;
pub mod env;
pub mod error;
pub mod pipeline;
pub mod project;
pub mod tools;
pub mod utils;

pub use cli::Cli;
pub use error::KilnError;
pub use pipeline::Pipeline;
pub use project::Project;
