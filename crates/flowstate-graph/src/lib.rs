//! Flowstate Graph
//!
//! This crate provides [`ResourceGraph`], which owns every resource of a
//! workflow by name together with the declared `depends_on` edges.
//!
//! Edges point from producer to consumer. The graph:
//! - rejects duplicate names, unknown endpoints and self-edges on insertion
//! - reports cycles (with the offending path) when an order is requested
//! - yields a deterministic topological order, ties broken by registration
//! - decomposes into layers of mutually independent resources

mod error;
mod graph;
mod handle;

pub use error::{GraphError, SyncError};
pub use graph::{ResourceGraph, ResourceId};
pub use handle::ResourceHandle;
