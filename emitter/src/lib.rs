//! The emitter library support code
//!
//! The emitter fabricates structured log packets and pushes them at a log
//! distributor over HTTP, at a configurable rate with occasional bursts. This
//! library holds the pieces the `emitter` and `emitter-swarm` binaries are
//! assembled from.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::print_stdout)]
#![deny(clippy::print_stderr)]
#![deny(clippy::dbg_macro)]
#![deny(clippy::unwrap_used)]
#![deny(unused_extern_crates)]
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod controller;
pub mod health;
pub mod state;
pub mod swarm;
pub mod transport;

/// Build the standard metric labels for an emitter component.
#[must_use]
pub fn metric_labels(component: &str, agent_id: &str) -> Vec<(String, String)> {
    vec![
        ("component".to_string(), component.to_string()),
        ("agent_id".to_string(), agent_id.to_string()),
    ]
}
