// SPDX-License-Identifier: AGPL-3.0

//! Solver adapters: the contract between the exploration engine and the
//! SMT back-ends, plus everything dialect-specific: SMT-LIB rendering,
//! model parsing, binary discovery and the query store.
//!
//! Back-ends run as external processes so the engine can kill them. An
//! adapter renders a self-contained script, builds the command line, and
//! parses the solver's stdout back into an outcome.

mod adapter;
mod adapters;
mod model;
mod smtlib;
mod store;

pub use adapter::{Model, RenderError, SmtOutcome, SmtScript, SolverAdapter, SolverKind};
pub use adapters::{adapter_for, solver_available};
pub use store::QueryStore;
