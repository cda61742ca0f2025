// SPDX-License-Identifier: AGPL-3.0

//! Command-line configuration for the explorer.
//!
//! Parsing stays permissive (plain strings for solver and policy); the
//! typed accessors perform the fatal startup validation.

use clap::Parser;
use cpex_exceptions::SetupResult;
use cpex_scheduling::SchedulingPolicy;
use cpex_smt::SolverKind;
use std::path::PathBuf;

/// Main CPEX configuration.
#[derive(Debug, Clone, Parser)]
#[clap(
    name = "cpex",
    version,
    about = "Concolic path exploration for instrumented programs"
)]
pub struct Config {
    /// Name of the bundled program to explore
    pub program: String,

    // === Exploration setup ===
    /// SMT solver to use: z3, cvc, z3str2 or multi
    #[clap(long, default_value = "z3")]
    pub solver: String,

    /// Run the specified number of solvers in parallel
    #[clap(long, short = 'n', default_value = "1")]
    pub workers: usize,

    /// Policy used to assign solving jobs to workers
    #[clap(long, short = 'p', default_value = "central_queue")]
    pub scheduling_policy: String,

    /// Exact solver command to use instead of the adapter's binary
    #[clap(long)]
    pub solver_command: Option<String>,

    // === Exploration limits ===
    /// Per-query timeout rung in seconds; repeat the flag to build a ladder
    #[clap(long = "solve-timeout")]
    pub solve_timeouts: Vec<f64>,

    /// Maximum cumulative solving time spent down a single path, seconds
    #[clap(long)]
    pub path_timeout: Option<f64>,

    /// Prune paths after no coverage increase for this many generated inputs
    #[clap(long, short = 'b')]
    pub coverage_pruning: Option<usize>,

    /// Run the specified number of iterations (0 = unlimited)
    #[clap(long, short = 'm', default_value = "0")]
    pub max_iters: usize,

    /// Time in seconds to terminate the concolic execution
    #[clap(long, short = 't')]
    pub exploration_timeout: Option<f64>,

    // === Serialisation and logging ===
    /// Folder receiving one serialised .smt2 script per query
    #[clap(long, short = 'q')]
    pub query_store: Option<PathBuf>,

    /// File receiving the serialised execution graph
    #[clap(long, short = 'g')]
    pub graph: Option<PathBuf>,

    /// File receiving a DOT rendering of the execution graph
    #[clap(long, short = 'd')]
    pub dot: Option<PathBuf>,

    /// Append log output to a file
    #[clap(long, short = 'l')]
    pub log: Option<PathBuf>,

    /// Write the run summary as JSON
    #[clap(long)]
    pub json_output: Option<PathBuf>,

    /// Enable debugging output
    #[clap(long)]
    pub debug: bool,
}

impl Config {
    pub fn solver_kind(&self) -> SetupResult<SolverKind> {
        self.solver.parse()
    }

    pub fn policy(&self) -> SetupResult<SchedulingPolicy> {
        self.scheduling_policy.parse()
    }
}
