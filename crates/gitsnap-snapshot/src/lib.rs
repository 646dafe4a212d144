//! # gitsnap-snapshot
//!
//! The snapshot engine. Walks one commit's recursive tree through a layered
//! filter pipeline and either materializes the surviving files, counts lines
//! of code per language, or only emits the manifest. A dry-run/real-run
//! comparison with bounded retries guards against the clone being mutated
//! underneath the run.
//!
//! The engine is single-threaded and keeps all mutable state in the engine
//! instance, so any number of runs may execute concurrently in independent
//! processes (or threads) against the same clone.

#![forbid(unsafe_code)]

mod engine;
mod index;
mod writer;

pub use engine::{snapshot, Engine, Summary};
pub use writer::{WriteOutcome, Writer};
