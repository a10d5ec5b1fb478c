//! The emitter payloads
//!
//! This library fabricates the structured log traffic pushed by the emitter:
//! individual [`LogMessage`] values drawn from a fixed catalog of applications
//! and services, batched into [`LogPacket`] values that serialize to the wire
//! shape the log distributor accepts.
//!
//! Every function here takes its source of randomness as an argument. Seeding
//! that source makes a run reproducible.

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

use rand::distr::weighted;

pub mod catalog;
mod ident;
pub mod message;
pub mod packet;
pub mod weighted_choice;

pub use catalog::ApplicationContext;
pub use message::{Currency, Detail, Level, LogMessage, MessageSynthesizer, Metadata, Source};
pub use packet::{LogPacket, PacketSynthesizer};
pub use weighted_choice::Weighted;

/// Errors produced while building synthesizers
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// See [`weighted::Error`]
    #[error("invalid weights: {0}")]
    Weights(#[from] weighted::Error),
}
