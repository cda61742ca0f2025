// SPDX-License-Identifier: AGPL-3.0

//! The exploration engine: the outer concolic loop.
//!
//! One driver thread owns the constraint tree, the priority queue and the
//! worker pool. Each iteration either consumes a completion message,
//! dispatches an unsolved constraint to a worker, or waits. A SAT answer
//! becomes fresh concrete inputs and a re-execution; everything else
//! escalates the query up the timeout ladder or seals the branch.

mod pruner;

pub use pruner::Pruner;

use cpex_coverage::CoverageData;
use cpex_exceptions::{SetupError, SetupResult};
use cpex_invocation::{ExecutionResult, FunctionInvocation, InputValues};
use cpex_logs::WarningCode;
use cpex_recorder::PathRecorder;
use cpex_scheduling::SchedulingPolicy;
use cpex_smt::{adapter_for, QueryStore, SmtOutcome, SolverKind};
use cpex_symbolic::{with_sink, BranchSink};
use cpex_tree::{ConstraintId, InputMap, PendingConstraint};
use cpex_workers::{CompletionMessage, SolverJob, WorkerPool};
use std::cell::RefCell;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::path::PathBuf;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// The escalating per-query timeout ladder, in seconds.
pub const DEFAULT_SOLVE_TIMEOUTS: [f64; 9] =
    [0.13, 0.26, 0.52, 1.04, 2.08, 4.16, 8.32, 16.64, 33.28];

const SLEEP_WAIT: Duration = Duration::from_millis(20);

/// Knobs for one exploration run.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub solver: SolverKind,
    pub workers: usize,
    pub scheduling_policy: SchedulingPolicy,
    pub solve_timeouts: Vec<f64>,
    pub path_timeout: Option<f64>,
    pub coverage_pruning: Option<usize>,
    /// Iteration cap; 0 means unlimited.
    pub max_iterations: usize,
    /// Wall-clock cap on the whole exploration, in seconds.
    pub exploration_timeout: Option<f64>,
    pub query_store: Option<PathBuf>,
    /// Exact solver command overriding the adapter's binary.
    pub solver_command: Option<String>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            solver: SolverKind::Z3,
            workers: 1,
            scheduling_policy: SchedulingPolicy::CentralQueue,
            solve_timeouts: DEFAULT_SOLVE_TIMEOUTS.to_vec(),
            path_timeout: None,
            coverage_pruning: None,
            max_iterations: 0,
            exploration_timeout: None,
            query_store: None,
            solver_command: None,
        }
    }
}

/// Figures reported after exploration.
#[derive(Debug, Clone)]
pub struct ExplorationStats {
    pub paths: usize,
    pub iterations: usize,
    pub processed_constraints: usize,
    pub total_solve_time: f64,
    pub wall_time: f64,
    pub lines_covered: usize,
    pub arcs_covered: usize,
    pub files_covered: usize,
    pub exceptions: usize,
    pub triaged_exceptions: usize,
}

pub struct ExplorationEngine {
    invocation: FunctionInvocation,
    symbolic_inputs: InputValues,
    has_string_inputs: bool,
    recorder: Rc<RefCell<PathRecorder>>,
    queue: BinaryHeap<PendingConstraint>,
    pool: WorkerPool,
    solver: SolverKind,
    policy: SchedulingPolicy,
    ladder: Vec<f64>,
    pruner: Pruner,
    max_iterations: usize,
    exploration_timeout: Option<f64>,
    query_store: Option<QueryStore>,
    command_override: Option<Vec<String>>,
    solved: HashSet<ConstraintId>,
    attempts: HashMap<(ConstraintId, usize), usize>,
    generated_inputs: Vec<InputMap>,
    execution_results: Vec<ExecutionResult>,
    global_coverage: CoverageData,
    total_solve_time: f64,
    last_solve_time: f64,
    num_processed: usize,
    iterations: usize,
}

impl ExplorationEngine {
    pub fn new(invocation: FunctionInvocation, options: EngineOptions) -> SetupResult<Self> {
        let mut ladder = options.solve_timeouts;
        ladder.sort_by(f64::total_cmp);
        ladder.dedup_by(|a, b| a.total_cmp(b) == std::cmp::Ordering::Equal);
        if ladder.is_empty() {
            return Err(SetupError::EmptyTimeoutLadder);
        }

        let command_override = match options.solver_command {
            None => None,
            Some(raw) => {
                let parts: Vec<String> = raw.split_whitespace().map(String::from).collect();
                if parts.is_empty() {
                    return Err(SetupError::InvalidArgument {
                        name: "solver-command".to_string(),
                        reason: "empty command line".to_string(),
                    });
                }
                Some(parts)
            }
        };

        let has_string_inputs = invocation.has_string_inputs();

        // A bad back-end selection must fail before the first execution.
        if command_override.is_none() {
            match options.solver {
                SolverKind::Multi => {
                    let (primary, secondary) = SolverKind::multi_pair(has_string_inputs);
                    adapter_for(primary).validate()?;
                    adapter_for(secondary).validate()?;
                }
                kind => adapter_for(kind).validate()?,
            }
        }

        let query_store = match options.query_store {
            None => None,
            Some(dir) => Some(QueryStore::open(&dir)?),
        };

        let pool = WorkerPool::new(options.workers)?;
        cpex_logs::info(&format!("Using {} solver workers", options.workers));

        let symbolic_inputs = invocation.initial_inputs()?;
        let recorder = Rc::new(RefCell::new(PathRecorder::new(invocation.name())));

        Ok(ExplorationEngine {
            invocation,
            symbolic_inputs,
            has_string_inputs,
            recorder,
            queue: BinaryHeap::new(),
            pool,
            solver: options.solver,
            policy: options.scheduling_policy,
            ladder,
            pruner: Pruner {
                path_timeout: options.path_timeout,
                coverage_window: options.coverage_pruning,
            },
            max_iterations: options.max_iterations,
            exploration_timeout: options.exploration_timeout,
            query_store,
            command_override,
            solved: HashSet::new(),
            attempts: HashMap::new(),
            generated_inputs: Vec::new(),
            execution_results: Vec::new(),
            global_coverage: CoverageData::new(),
            total_solve_time: 0.0,
            last_solve_time: 0.0,
            num_processed: 0,
            iterations: 0,
        })
    }

    /// Run the exploration to completion or to a cap. Returns the summary
    /// figures; results and the tree stay accessible on the engine.
    pub fn explore(&mut self) -> ExplorationStats {
        self.one_execution(None);
        let started = Instant::now();
        self.iterations = 1;

        loop {
            if self.max_iterations != 0 && self.iterations >= self.max_iterations {
                cpex_logs::info("Maximum number of iterations reached, terminating");
                break;
            }
            if let Some(cap) = self.exploration_timeout {
                if started.elapsed().as_secs_f64() > cap {
                    cpex_logs::info("Timeout reached, terminating");
                    break;
                }
            }

            if let Some(message) = self.pool.try_recv() {
                self.handle_result(message);
                continue;
            }

            let running = self.pool.reap();
            if self.queue.is_empty() && running == 0 {
                // One last blocking poll: a watcher may have posted between
                // the try_recv above and its own exit.
                match self.pool.recv_timeout(SLEEP_WAIT) {
                    Some(message) => {
                        self.handle_result(message);
                        continue;
                    }
                    None => {
                        cpex_logs::info("Exploration complete");
                        break;
                    }
                }
            }
            if self.queue.is_empty() || running == self.pool.size() {
                cpex_logs::debug(&format!(
                    "{} constraints yet to solve ({} already solved), waiting for solvers",
                    self.queue.len() + running,
                    self.num_processed
                ));
                if let Some(message) = self.pool.recv_timeout(SLEEP_WAIT) {
                    self.handle_result(message);
                }
                continue;
            }

            // Pop candidates until the policy places one; the rest go back.
            let busy = self.pool.busy();
            let mut passed_over = Vec::new();
            let mut selected = None;
            while let Some(candidate) = self.queue.pop() {
                if cpex_scheduling::assign(self.policy, &busy, &self.ladder, candidate.timeout)
                    .is_some()
                {
                    selected = Some(candidate);
                    break;
                }
                passed_over.push(candidate);
            }
            for candidate in passed_over {
                self.queue.push(candidate);
            }

            let Some(selected) = selected else {
                if let Some(message) = self.pool.recv_timeout(SLEEP_WAIT) {
                    self.handle_result(message);
                }
                continue;
            };

            if self.recorder.borrow().tree().node(selected.id).processed {
                continue;
            }
            if self.pruner.pruned(self.recorder.borrow().tree(), selected.id) {
                continue;
            }

            self.dispatch(selected);
        }

        self.pool.shutdown();
        self.stats(started.elapsed().as_secs_f64())
    }

    fn dispatch(&mut self, selected: PendingConstraint) {
        match self.solver {
            SolverKind::Multi => {
                let (primary, secondary) = SolverKind::multi_pair(self.has_string_inputs);
                self.launch_worker(selected, primary);
                while self.pool.reap() == self.pool.size() {
                    cpex_logs::debug("Waiting for a slot for the second solver");
                    if let Some(message) = self.pool.recv_timeout(SLEEP_WAIT) {
                        self.handle_result(message);
                    }
                    if self.solved.contains(&selected.id) {
                        return;
                    }
                }
                if !self.solved.contains(&selected.id) {
                    self.launch_worker(selected, secondary);
                }
            }
            kind => self.launch_worker(selected, kind),
        }
    }

    fn launch_worker(&mut self, selected: PendingConstraint, kind: SolverKind) {
        let rung = self.rung_of(selected.timeout);
        *self.attempts.entry((selected.id, rung)).or_insert(0) += 1;

        let busy = self.pool.busy();
        let slot = cpex_scheduling::assign(self.policy, &busy, &self.ladder, selected.timeout);
        let Some(slot) = slot else {
            // The policy refused after all (it may be randomized); requeue.
            if let Some(count) = self.attempts.get_mut(&(selected.id, rung)) {
                *count = count.saturating_sub(1);
            }
            self.recorder
                .borrow_mut()
                .tree_mut()
                .node_mut(selected.id)
                .processed = false;
            self.queue.push(selected);
            return;
        };

        // Preemption: evict whatever holds the slot and requeue it.
        if busy[slot - 1] {
            if let Some((victim_id, victim_timeout)) = self.pool.kill(slot) {
                let victim_rung = self.rung_of(victim_timeout);
                if let Some(count) = self.attempts.get_mut(&(victim_id, victim_rung)) {
                    *count = count.saturating_sub(1);
                }
                let depth = self.recorder.borrow().tree().depth(victim_id);
                self.recorder
                    .borrow_mut()
                    .tree_mut()
                    .node_mut(victim_id)
                    .processed = false;
                self.queue
                    .push(PendingConstraint::new(victim_timeout, depth, victim_id));
            }
        }

        let (asserts, query) = self
            .recorder
            .borrow_mut()
            .tree_mut()
            .asserts_and_query(selected.id);

        self.pool.launch(
            slot,
            SolverJob {
                constraint_id: selected.id,
                timeout: selected.timeout,
                adapter: adapter_for(kind),
                asserts,
                query,
                query_store: self.query_store.clone(),
                command_override: self.command_override.clone(),
            },
        );
    }

    fn handle_result(&mut self, message: CompletionMessage) {
        let CompletionMessage {
            constraint_id: id,
            timeout,
            outcome,
            solving_time,
        } = message;

        self.last_solve_time = solving_time;
        self.total_solve_time += solving_time;

        let rung = self.rung_of(timeout);
        if let Some(count) = self.attempts.get_mut(&(id, rung)) {
            *count = count.saturating_sub(1);
        }

        // Late answer from a terminated or outpaced attempt.
        if self.solved.contains(&id) {
            return;
        }

        if let Some(branch_id) = self.recorder.borrow().tree().node(id).branch_id.clone() {
            cpex_logs::info(&format!("Solver Result\t{}\t{}", branch_id, outcome.label()));
        }

        match outcome {
            SmtOutcome::Sat(model) => {
                // Any rival attempt on this constraint is moot now.
                while let Some(slot) = self.pool.find_running(id) {
                    if let Some((victim_id, victim_timeout)) = self.pool.kill(slot) {
                        let victim_rung = self.rung_of(victim_timeout);
                        if let Some(count) = self.attempts.get_mut(&(victim_id, victim_rung)) {
                            *count = count.saturating_sub(1);
                        }
                    }
                }

                for (name, value) in model {
                    match self.invocation.create_argument_value(&name, Some(value)) {
                        Ok(argument) => {
                            self.symbolic_inputs.insert(name, argument);
                        }
                        Err(error) => cpex_logs::warn_code(
                            WarningCode::ModelMismatch,
                            &format!("Ignoring model value: {}", error),
                            false,
                        ),
                    }
                }

                self.one_execution(Some(id));
                self.iterations += 1;
                self.num_processed += 1;
                self.solved.insert(id);
            }
            SmtOutcome::Unsat | SmtOutcome::Unknown => {
                // Wait for the remaining attempts on this (id, rung) first.
                if self.pool.find_running(id).is_some()
                    || self.attempts.get(&(id, rung)).copied().unwrap_or(0) > 0
                {
                    return;
                }

                let exhausted = rung + 1 >= self.ladder.len();
                if !exhausted && outcome != SmtOutcome::Unsat {
                    let depth = self.recorder.borrow().tree().depth(id);
                    self.recorder.borrow_mut().tree_mut().node_mut(id).processed = false;
                    self.queue
                        .push(PendingConstraint::new(self.ladder[rung + 1], depth, id));
                } else {
                    self.seal(id, solving_time);
                }
            }
        }
    }

    /// Close a branch no model was found for: its flipped sibling joins the
    /// tree with no inputs, recording the cost.
    fn seal(&mut self, id: ConstraintId, cost: f64) {
        let mut recorder = self.recorder.borrow_mut();
        let tree = recorder.tree_mut();
        let node = tree.node(id);
        let (Some(parent), Some(predicate)) = (node.parent, node.predicate.clone()) else {
            return;
        };
        let negated = predicate.negated();
        if tree.find_child(parent, &negated).is_none() {
            let sealed = tree.add_child(parent, negated, None);
            let sealed_node = tree.node_mut(sealed);
            sealed_node.processed = true;
            sealed_node.solving_time = cost;
        }
    }

    fn one_execution(&mut self, expected: Option<ConstraintId>) {
        let snapshot: InputMap = self
            .symbolic_inputs
            .iter()
            .map(|(name, value)| (name.clone(), value.concrete()))
            .collect();
        cpex_logs::info(&cpex_tree::format_inputs(&snapshot));
        self.generated_inputs.push(snapshot.clone());

        self.recorder.borrow_mut().reset(expected);
        let sink: Rc<RefCell<dyn BranchSink>> = self.recorder.clone();
        let result = with_sink(sink, || self.invocation.call(&self.symbolic_inputs));

        let run_coverage = self.recorder.borrow().run_coverage();
        self.global_coverage.update(&run_coverage);
        cpex_logs::info(&format!(
            "Coverage: {} lines, {} arcs across {} files",
            self.global_coverage.line_count(),
            self.global_coverage.arc_count(),
            self.global_coverage.file_count()
        ));

        let fresh = self.recorder.borrow_mut().drain_new();
        for id in fresh {
            let depth = {
                let mut recorder = self.recorder.borrow_mut();
                let tree = recorder.tree_mut();
                let node = tree.node_mut(id);
                node.inputs = Some(snapshot.clone());
                node.coverage = run_coverage.clone();
                node.solving_time = self.last_solve_time;
                tree.depth(id)
            };
            self.queue
                .push(PendingConstraint::new(self.ladder[0], depth, id));
        }

        cpex_logs::info(&result.to_string());
        self.execution_results.push(result);
    }

    fn rung_of(&self, timeout: f64) -> usize {
        self.ladder
            .iter()
            .position(|t| t.total_cmp(&timeout) == std::cmp::Ordering::Equal)
            .unwrap_or(0)
    }

    fn stats(&self, wall_time: f64) -> ExplorationStats {
        let exceptions = self
            .execution_results
            .iter()
            .filter(|result| result.value().is_none())
            .count();
        let triaged: HashSet<&str> = self
            .execution_results
            .iter()
            .filter_map(ExecutionResult::exception_site)
            .collect();

        ExplorationStats {
            paths: self.generated_inputs.len(),
            iterations: self.iterations,
            processed_constraints: self.num_processed,
            total_solve_time: self.total_solve_time,
            wall_time,
            lines_covered: self.global_coverage.line_count(),
            arcs_covered: self.global_coverage.arc_count(),
            files_covered: self.global_coverage.file_count(),
            exceptions,
            triaged_exceptions: triaged.len(),
        }
    }

    pub fn execution_results(&self) -> &[ExecutionResult] {
        &self.execution_results
    }

    pub fn generated_inputs(&self) -> &[InputMap] {
        &self.generated_inputs
    }

    pub fn total_solve_time(&self) -> f64 {
        self.total_solve_time
    }

    /// DOT rendering of the constraint tree.
    pub fn tree_dot(&self) -> String {
        self.recorder.borrow().to_dot()
    }

    /// Deterministic serialisation of the constraint tree.
    pub fn tree_json(&self) -> serde_json::Result<String> {
        self.recorder.borrow().tree().to_json()
    }

    /// Number of constraints discovered, the root included.
    pub fn tree_size(&self) -> usize {
        self.recorder.borrow().tree().len()
    }

    /// Runs a closure against the tree; test and tooling hook.
    pub fn with_tree<R>(&self, f: impl FnOnce(&cpex_tree::ConstraintTree) -> R) -> R {
        f(self.recorder.borrow().tree())
    }
}
