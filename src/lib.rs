//! An automated schema advisor for wide-column NoSQL stores: given an
//! entity-relationship model and a weighted statement workload, enumerates
//! candidate indexes, plans every statement against them, and selects a
//! storage-bounded schema by solving a mixed-integer program.

pub mod config;
pub mod cost;
pub mod enumerator;
pub mod error;
pub mod index;
pub mod milp;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod planner;
pub mod statement;
pub mod update_planner;
pub mod workload;

pub use error::{AdvisorError, NoSolutionKind, Result};

/// Initializes structured logging the way the CLI binary does, exposed here
/// so library consumers embedding the advisor can opt into the same format.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();
}
