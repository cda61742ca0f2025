// SPDX-License-Identifier: AGPL-3.0

//! The solver worker pool.
//!
//! Each running job is an external solver process plus a watcher thread.
//! The watcher writes the query file, spawns the solver, enforces the rung
//! timeout, parses stdout and posts exactly one [`CompletionMessage`] on
//! the pool's channel. The driver owns the pool; workers only ever see a
//! snapshot of the query. Killing a slot is immediate and suppresses the
//! victim's message at the source, but the driver still discards late
//! messages for already-solved constraints.

use cpex_exceptions::{SetupError, SetupResult};
use cpex_logs::WarningCode;
use cpex_smt::{QueryStore, SmtOutcome, SolverAdapter};
use cpex_tree::{ConstraintId, Predicate};
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Slack past the rung timeout before the watcher hard-kills the solver.
const KILL_GRACE: f64 = 0.5;

/// Result of one solver attempt, posted on the completion channel.
#[derive(Debug, Clone)]
pub struct CompletionMessage {
    pub constraint_id: ConstraintId,
    pub timeout: f64,
    pub outcome: SmtOutcome,
    pub solving_time: f64,
}

/// Everything a worker needs, passed by value at launch.
pub struct SolverJob {
    pub constraint_id: ConstraintId,
    pub timeout: f64,
    pub adapter: &'static dyn SolverAdapter,
    pub asserts: Vec<Predicate>,
    pub query: Predicate,
    pub query_store: Option<QueryStore>,
    /// Exact solver command to run instead of the adapter's own binary;
    /// the script path is appended.
    pub command_override: Option<Vec<String>>,
}

struct RunningJob {
    constraint_id: ConstraintId,
    timeout: f64,
    child: Arc<Mutex<Option<Child>>>,
    cancelled: Arc<AtomicBool>,
    watcher: JoinHandle<()>,
}

/// Fixed-size pool of worker slots `1..=N` multiplexed onto one channel.
pub struct WorkerPool {
    slots: Vec<Option<RunningJob>>,
    tx: Sender<CompletionMessage>,
    rx: Receiver<CompletionMessage>,
}

impl WorkerPool {
    pub fn new(workers: usize) -> SetupResult<Self> {
        if workers == 0 {
            return Err(SetupError::NoWorkers);
        }
        let (tx, rx) = mpsc::channel();
        Ok(WorkerPool {
            slots: (0..workers).map(|_| None).collect(),
            tx,
            rx,
        })
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// Occupancy per slot, `busy[i]` describing slot `i + 1`.
    pub fn busy(&self) -> Vec<bool> {
        self.slots.iter().map(Option::is_some).collect()
    }

    /// Free slots whose watcher has finished; returns the number of jobs
    /// still running.
    pub fn reap(&mut self) -> usize {
        for slot in self.slots.iter_mut() {
            if slot.as_ref().is_some_and(|job| job.watcher.is_finished()) {
                *slot = None;
            }
        }
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// The slot currently attempting `id`, if any.
    pub fn find_running(&self, id: ConstraintId) -> Option<usize> {
        self.slots.iter().enumerate().find_map(|(idx, slot)| {
            slot.as_ref()
                .filter(|job| job.constraint_id == id && !job.watcher.is_finished())
                .map(|_| idx + 1)
        })
    }

    /// Start a job on a free slot. The caller must have freed the slot
    /// (via [`WorkerPool::kill`]) beforehand.
    pub fn launch(&mut self, slot: usize, job: SolverJob) {
        debug_assert!(
            self.slots[slot - 1].is_none(),
            "launch on occupied slot {}",
            slot
        );

        let child = Arc::new(Mutex::new(None));
        let cancelled = Arc::new(AtomicBool::new(false));
        let constraint_id = job.constraint_id;
        let timeout = job.timeout;

        let spawned = thread::Builder::new()
            .name(format!("cpex-worker-{}", slot))
            .spawn({
                let child = Arc::clone(&child);
                let cancelled = Arc::clone(&cancelled);
                let tx = self.tx.clone();
                move || run_job(job, child, cancelled, tx)
            });

        match spawned {
            Ok(watcher) => {
                self.slots[slot - 1] = Some(RunningJob {
                    constraint_id,
                    timeout,
                    child,
                    cancelled,
                    watcher,
                });
            }
            Err(error) => {
                cpex_logs::warn_code(
                    WarningCode::SolverCrash,
                    &format!("Failed to start worker thread: {}", error),
                    true,
                );
                let _ = self.tx.send(CompletionMessage {
                    constraint_id,
                    timeout,
                    outcome: SmtOutcome::Unknown,
                    solving_time: 0.0,
                });
            }
        }
    }

    /// Kill whatever runs on `slot`. The victim posts no message; its
    /// identity is returned so the driver can fix its bookkeeping.
    pub fn kill(&mut self, slot: usize) -> Option<(ConstraintId, f64)> {
        let job = self.slots[slot - 1].take()?;
        job.cancelled.store(true, Ordering::SeqCst);
        if let Ok(mut guard) = job.child.lock() {
            if let Some(child) = guard.as_mut() {
                let _ = child.kill();
            }
        }
        Some((job.constraint_id, job.timeout))
    }

    pub fn try_recv(&self) -> Option<CompletionMessage> {
        self.rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<CompletionMessage> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Kill every running job.
    pub fn shutdown(&mut self) {
        for slot in 1..=self.slots.len() {
            self.kill(slot);
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_job(
    job: SolverJob,
    child: Arc<Mutex<Option<Child>>>,
    cancelled: Arc<AtomicBool>,
    tx: Sender<CompletionMessage>,
) {
    let started = Instant::now();
    let outcome = solve(&job, &child, &cancelled, started);
    if cancelled.load(Ordering::SeqCst) {
        return;
    }
    let _ = tx.send(CompletionMessage {
        constraint_id: job.constraint_id,
        timeout: job.timeout,
        outcome,
        solving_time: started.elapsed().as_secs_f64(),
    });
}

fn solve(
    job: &SolverJob,
    child_cell: &Arc<Mutex<Option<Child>>>,
    cancelled: &AtomicBool,
    started: Instant,
) -> SmtOutcome {
    let script = match job.adapter.render(&job.asserts, &job.query) {
        Ok(script) => script,
        Err(error) => {
            cpex_logs::warn_code(
                WarningCode::UnknownQuery,
                &format!("{}: {}", job.adapter.name(), error),
                false,
            );
            return SmtOutcome::Unknown;
        }
    };

    if let Some(store) = &job.query_store {
        store.save(&script);
    }

    let file = match tempfile::Builder::new()
        .prefix("cpex-query-")
        .suffix(".smt2")
        .tempfile()
    {
        Ok(file) => file,
        Err(error) => {
            cpex_logs::warn(&format!("Failed to create query file: {}", error), true);
            return SmtOutcome::Unknown;
        }
    };
    if let Err(error) = std::fs::write(file.path(), &script.text) {
        cpex_logs::warn(&format!("Failed to write query file: {}", error), true);
        return SmtOutcome::Unknown;
    }

    let mut command = match build_command(job, file.path()) {
        Ok(command) => command,
        Err(error) => {
            cpex_logs::warn_code(WarningCode::SolverCrash, &error.to_string(), false);
            return SmtOutcome::Unknown;
        }
    };

    match command.spawn() {
        Ok(spawned) => {
            *child_cell.lock().unwrap() = Some(spawned);
        }
        Err(error) => {
            cpex_logs::warn_code(
                WarningCode::SolverCrash,
                &format!("Failed to spawn {}: {}", job.adapter.name(), error),
                false,
            );
            return SmtOutcome::Unknown;
        }
    }

    let deadline = job.timeout + KILL_GRACE;
    loop {
        let mut guard = child_cell.lock().unwrap();
        let Some(running) = guard.as_mut() else {
            return SmtOutcome::Unknown;
        };

        match running.wait_timeout(POLL_INTERVAL) {
            Ok(Some(status)) => {
                let mut stdout = String::new();
                if let Some(mut pipe) = running.stdout.take() {
                    let _ = pipe.read_to_string(&mut stdout);
                }
                drop(guard);

                let outcome = job.adapter.parse(&script, &stdout);
                if outcome == SmtOutcome::Unknown && !status.success() {
                    cpex_logs::warn_code(
                        WarningCode::SolverCrash,
                        &format!("{} exited with status {:?}", job.adapter.name(), status.code()),
                        false,
                    );
                }
                return outcome;
            }
            Ok(None) => {
                if cancelled.load(Ordering::SeqCst) {
                    let _ = running.kill();
                    let _ = running.wait();
                    return SmtOutcome::Unknown;
                }
                if started.elapsed().as_secs_f64() > deadline {
                    let _ = running.kill();
                    let _ = running.wait();
                    drop(guard);
                    cpex_logs::debug(&format!(
                        "{} exceeded rung timeout {:.2}s, killed",
                        job.adapter.name(),
                        job.timeout
                    ));
                    return SmtOutcome::Unknown;
                }
            }
            Err(_) => return SmtOutcome::Unknown,
        }
    }
}

fn build_command(job: &SolverJob, script: &Path) -> SetupResult<Command> {
    match &job.command_override {
        Some(parts) => {
            let program = parts.first().ok_or_else(|| SetupError::InvalidArgument {
                name: "solver-command".to_string(),
                reason: "empty command line".to_string(),
            })?;
            let mut command = Command::new(program);
            command
                .args(&parts[1..])
                .arg(script)
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
            Ok(command)
        }
        None => job.adapter.command(script, job.timeout),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpex_smt::{adapter_for, SolverKind};
    use cpex_symbolic::{SymInt, SymValue};
    use std::io::Write;
    use std::time::Duration;

    fn job_with_command(id: usize, timeout: f64, command: Vec<String>) -> SolverJob {
        let x = SymInt::variable("x", 0);
        let query = Predicate::new(x.eq(&SymInt::lit(7)).node().clone(), false);
        SolverJob {
            constraint_id: ConstraintId(id),
            timeout,
            adapter: adapter_for(SolverKind::Z3),
            asserts: Vec::new(),
            query,
            query_store: None,
            command_override: Some(command),
        }
    }

    fn fake_solver(dir: &Path, name: &str, body: &str) -> Vec<String> {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "#!/bin/sh").unwrap();
        writeln!(file, "{}", body).unwrap();
        drop(file);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&path).unwrap().permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&path, perms).unwrap();
        }

        vec![path.to_string_lossy().to_string()]
    }

    #[test]
    fn test_sat_message_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let command = fake_solver(dir.path(), "sat.sh", "echo sat; echo '((x 7))'");

        let mut pool = WorkerPool::new(2).unwrap();
        pool.launch(1, job_with_command(5, 1.0, command));

        let message = pool.recv_timeout(Duration::from_secs(5)).expect("message");
        assert_eq!(message.constraint_id, ConstraintId(5));
        assert_eq!(message.timeout, 1.0);
        match message.outcome {
            SmtOutcome::Sat(model) => assert_eq!(model.get("x"), Some(&SymValue::Int(7))),
            other => panic!("expected sat, got {:?}", other),
        }
        assert!(message.solving_time >= 0.0);
        assert_eq!(pool.reap(), 0);
    }

    #[test]
    fn test_unsat_and_unknown_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let unsat = fake_solver(dir.path(), "unsat.sh", "echo unsat");
        let unknown = fake_solver(dir.path(), "unknown.sh", "echo unknown");

        let mut pool = WorkerPool::new(2).unwrap();
        pool.launch(1, job_with_command(1, 0.13, unsat));
        pool.launch(2, job_with_command(2, 0.13, unknown));

        let mut outcomes = Vec::new();
        for _ in 0..2 {
            let message = pool.recv_timeout(Duration::from_secs(5)).expect("message");
            outcomes.push((message.constraint_id, message.outcome));
        }
        outcomes.sort_by_key(|(id, _)| *id);
        assert_eq!(outcomes[0].1, SmtOutcome::Unsat);
        assert_eq!(outcomes[1].1, SmtOutcome::Unknown);
    }

    #[test]
    fn test_timeout_kills_and_reports_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let slow = fake_solver(dir.path(), "slow.sh", "sleep 30; echo sat");

        let mut pool = WorkerPool::new(1).unwrap();
        pool.launch(1, job_with_command(3, 0.05, slow));

        let message = pool.recv_timeout(Duration::from_secs(10)).expect("message");
        assert_eq!(message.outcome, SmtOutcome::Unknown);
    }

    #[test]
    fn test_crash_reports_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let crash = fake_solver(dir.path(), "crash.sh", "echo bad output; exit 3");

        let mut pool = WorkerPool::new(1).unwrap();
        pool.launch(1, job_with_command(4, 0.5, crash));

        let message = pool.recv_timeout(Duration::from_secs(5)).expect("message");
        assert_eq!(message.outcome, SmtOutcome::Unknown);
    }

    #[test]
    fn test_kill_suppresses_message_and_frees_slot() {
        let dir = tempfile::tempdir().unwrap();
        let slow = fake_solver(dir.path(), "slow.sh", "sleep 30; echo sat");

        let mut pool = WorkerPool::new(1).unwrap();
        pool.launch(1, job_with_command(6, 30.0, slow));
        assert_eq!(pool.find_running(ConstraintId(6)), Some(1));

        let victim = pool.kill(1).expect("victim identity");
        assert_eq!(victim, (ConstraintId(6), 30.0));
        assert_eq!(pool.find_running(ConstraintId(6)), None);
        assert!(!pool.busy()[0]);

        assert!(pool.recv_timeout(Duration::from_millis(300)).is_none());
    }

    #[test]
    fn test_empty_pool_is_rejected() {
        assert!(matches!(WorkerPool::new(0), Err(SetupError::NoWorkers)));
    }

    #[test]
    fn test_busy_tracks_slots() {
        let dir = tempfile::tempdir().unwrap();
        let slow = fake_solver(dir.path(), "slow.sh", "sleep 30");

        let mut pool = WorkerPool::new(3).unwrap();
        pool.launch(2, job_with_command(7, 30.0, slow));

        assert_eq!(pool.busy(), vec![false, true, false]);
        assert_eq!(pool.reap(), 1);
        pool.shutdown();
        assert_eq!(pool.reap(), 0);
    }
}
