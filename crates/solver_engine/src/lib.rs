//! The solve orchestration engine: the phase-driven state machine that
//! turns user intent, prefix state, and a prepared candidate index into a
//! final package set and an unlink/link plan.
//!
//! This crate owns the policy layer around a [`solver_pool::Resolver`]
//! (what specs get pinned, frozen, neutered, targeted, or freed), the
//! dependency-graph operations ([`PrefixGraph`]), and the transaction diff
//! ([`TransactionDiff`]) — not the SAT algorithm itself, which lives behind
//! the `solver_pool` trait boundary.

mod config;
mod engine;
mod error;
mod graph;
mod modifiers;
mod policy;
mod state;
mod transaction;

#[cfg(test)]
mod test_support;

pub use config::SolverConfig;
pub use engine::{PrefixSetup, SolveEngine, SolveOptions, SolveReport};
pub use error::SolveError;
pub use graph::PrefixGraph;
pub use modifiers::{Command, DepsModifier, UpdateModifier};
pub use policy::STICKY_PACKAGES;
pub use state::SolverState;
pub use transaction::{TransactionDiff, TransactionOperation};
