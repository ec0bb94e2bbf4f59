//! Flowstate Config
//!
//! This crate contains the serializable workflow definition for flowstate and
//! the loader turning it into a [`ResourceGraph`](flowstate_graph::ResourceGraph).
//!
//! A workflow is a JSON document listing tasks. Each task is a shell command
//! that may create a file and may depend on other tasks or files:
//!
//! ```json
//! {
//!   "root_directory": "data",
//!   "tasks": [
//!     { "name": "fetch", "command": "curl -o raw.csv $URL", "creates": "raw.csv" },
//!     { "command": "sort raw.csv > sorted.csv", "creates": "sorted.csv", "depends": ["raw.csv"] }
//!   ]
//! }
//! ```

mod error;
mod loader;
mod workflow;

pub use error::ConfigError;
pub use loader::load_graph;
pub use workflow::{TaskDef, WorkflowDef};
