// SPDX-License-Identifier: AGPL-3.0

//! Scheduling policies: pure functions assigning a pending query to a
//! worker slot.
//!
//! Slots are numbered `1..=N`. A policy sees only slot occupancy, the
//! timeout ladder and the candidate's timeout; it returns the slot to use
//! or `None` to keep the candidate queued. The preemptive policy may name
//! a busy slot, which tells the engine to evict that slot's job.

use cpex_exceptions::SetupError;
use rand::Rng;
use std::fmt;

/// Timeouts under this many seconds count as short jobs.
pub const SHORT_TIMEOUT_THRESHOLD: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchedulingPolicy {
    CentralQueue,
    Tags,
    ExpressCheckout,
    Preemptive,
}

impl std::str::FromStr for SchedulingPolicy {
    type Err = SetupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "central_queue" => Ok(SchedulingPolicy::CentralQueue),
            "tags" => Ok(SchedulingPolicy::Tags),
            "express_checkout" => Ok(SchedulingPolicy::ExpressCheckout),
            "preemptive" => Ok(SchedulingPolicy::Preemptive),
            other => Err(SetupError::UnknownPolicy(other.to_string())),
        }
    }
}

impl fmt::Display for SchedulingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SchedulingPolicy::CentralQueue => "central_queue",
            SchedulingPolicy::Tags => "tags",
            SchedulingPolicy::ExpressCheckout => "express_checkout",
            SchedulingPolicy::Preemptive => "preemptive",
        };
        write!(f, "{}", name)
    }
}

/// Pick a slot for a candidate. `busy[i]` describes slot `i + 1`.
pub fn assign(
    policy: SchedulingPolicy,
    busy: &[bool],
    ladder: &[f64],
    candidate_timeout: f64,
) -> Option<usize> {
    match policy {
        SchedulingPolicy::CentralQueue => central_queue(busy, 1),
        SchedulingPolicy::Tags => tags(busy, ladder, candidate_timeout),
        SchedulingPolicy::ExpressCheckout => express_checkout(busy, candidate_timeout),
        SchedulingPolicy::Preemptive => preemptive(busy, candidate_timeout),
    }
}

/// First free slot, scanning from `first`.
fn central_queue(busy: &[bool], first: usize) -> Option<usize> {
    (first..=busy.len()).find(|&slot| !busy[slot - 1])
}

/// Slot keyed by the candidate's rung (1-based, capped at the pool size).
fn tags(busy: &[bool], ladder: &[f64], candidate_timeout: f64) -> Option<usize> {
    let rung = ladder
        .iter()
        .position(|t| t.total_cmp(&candidate_timeout) == std::cmp::Ordering::Equal)
        .map(|idx| idx + 1)
        .unwrap_or(busy.len());
    let slot = rung.min(busy.len());
    if slot >= 1 && !busy[slot - 1] {
        Some(slot)
    } else {
        None
    }
}

/// Slot 1 is reserved for short jobs; everything else queues centrally on
/// the remaining slots.
fn express_checkout(busy: &[bool], candidate_timeout: f64) -> Option<usize> {
    if candidate_timeout < SHORT_TIMEOUT_THRESHOLD {
        if !busy[0] {
            Some(1)
        } else {
            None
        }
    } else {
        central_queue(busy, 2)
    }
}

/// Central queue, but a short job with no free slot picks a random victim
/// for the engine to preempt.
fn preemptive(busy: &[bool], candidate_timeout: f64) -> Option<usize> {
    if let Some(slot) = central_queue(busy, 1) {
        return Some(slot);
    }
    if candidate_timeout < SHORT_TIMEOUT_THRESHOLD {
        Some(rand::thread_rng().gen_range(1..=busy.len()))
    } else {
        None
    }
}
