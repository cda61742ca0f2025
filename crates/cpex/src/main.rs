// SPDX-License-Identifier: AGPL-3.0

//! CPEX - Concolic Path Explorer
//!
//! Runs a bundled instrumented program under the exploration engine,
//! prints the coverage summary and consults the program's result oracle
//! for the exit code.

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use cpex_config::Config;
use cpex_engine::{EngineOptions, ExplorationEngine, ExplorationStats, DEFAULT_SOLVE_TIMEOUTS};
use cpex_invocation::{find_program, oracle_passed};
use std::fs;
use std::time::Instant;

mod report;

use report::RunReport;

fn main() -> Result<()> {
    let exitcode = _main()?;
    std::process::exit(exitcode)
}

fn _main() -> Result<i32> {
    let start_time = Instant::now();
    let config = Config::parse();

    if let Some(path) = &config.log {
        cpex_logs::set_log_file(path)
            .with_context(|| format!("cannot open log file {}", path.display()))?;
    }
    cpex_logs::set_debug(config.debug);

    println!("{}", "CPEX (Concolic Path Explorer)".cyan());

    // Configuration errors are fatal before the first execution.
    let solver = config.solver_kind()?;
    let scheduling_policy = config.policy()?;
    let spec = find_program(&config.program)?;

    let invocation = (spec.build)();
    println!("Exploring {}", invocation.name().cyan());

    let solve_timeouts = if config.solve_timeouts.is_empty() {
        DEFAULT_SOLVE_TIMEOUTS.to_vec()
    } else {
        config.solve_timeouts.clone()
    };

    let options = EngineOptions {
        solver,
        workers: config.workers,
        scheduling_policy,
        solve_timeouts,
        path_timeout: config.path_timeout,
        coverage_pruning: config.coverage_pruning,
        max_iterations: config.max_iters,
        exploration_timeout: config.exploration_timeout,
        query_store: config.query_store.clone(),
        solver_command: config.solver_command.clone(),
    };

    let mut engine = ExplorationEngine::new(invocation, options)?;
    let stats = engine.explore();

    let oracle = spec
        .oracle
        .as_ref()
        .map(|oracle| oracle_passed(oracle, engine.execution_results()));

    print_summary(&stats, oracle, start_time.elapsed().as_secs_f64());

    if let Some(path) = &config.dot {
        fs::write(path, engine.tree_dot())
            .with_context(|| format!("cannot write DOT graph to {}", path.display()))?;
    }

    if let Some(path) = &config.graph {
        let serialised = engine.tree_json().context("cannot serialise execution graph")?;
        fs::write(path, serialised)
            .with_context(|| format!("cannot write execution graph to {}", path.display()))?;
    }

    let run_report = RunReport::new(&config.program, &stats, oracle);
    if let Some(path) = &config.json_output {
        let serialised =
            serde_json::to_string_pretty(&run_report).context("cannot serialise report")?;
        fs::write(path, serialised)
            .with_context(|| format!("cannot write JSON report to {}", path.display()))?;
    }

    Ok(run_report.exitcode())
}

fn print_summary(stats: &ExplorationStats, oracle: Option<bool>, wall_time: f64) {
    println!("Execution time: {:.2} seconds", wall_time);
    println!("Solver CPU: {:.2} seconds", stats.total_solve_time);
    println!("Path coverage: {} paths", stats.paths);
    println!(
        "Line coverage: {} branch sites across {} files",
        stats.lines_covered, stats.files_covered
    );
    println!("Branch coverage: {} branches", stats.arcs_covered);
    println!("Exceptions: {} exceptions raised", stats.exceptions);
    println!(
        "Triaged exceptions: {} triaged exceptions raised",
        stats.triaged_exceptions
    );
    match oracle {
        Some(true) => println!("{}", "Oracle: passed".green()),
        Some(false) => println!("{}", "Oracle: failed".red()),
        None => {}
    }
}
