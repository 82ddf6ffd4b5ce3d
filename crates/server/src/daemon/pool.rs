// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker pool state machine.
//!
//! Pure bookkeeping: the pool tracks worker slots, states and times and
//! answers policy questions (who to dispatch to, who to reap, how many to
//! spawn). It performs no I/O; the daemon runtime executes the actions the
//! pool decides on. All mutation happens from the daemon event loop, so the
//! pool needs no interior locking.

use std::time::{Duration, Instant};

/// Worker state as seen by the daemon.
///
/// `Starting` exists only inside the spawn handshake and `Dead` workers are
/// removed immediately, so neither is represented here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WorkerState {
    /// Handshake complete, never dispatched to.
    Ready,
    /// Between dispatches.
    Idle,
    /// Owns a connection.
    Busy,
    /// Told to shut down; finishing up.
    Stopping,
}

/// Dispatch bookkeeping while a worker owns a connection.
///
/// The request clock is anchored at the first request byte, not at
/// dispatch: between dispatch and the first byte (and between requests on
/// a kept-alive connection) the worker is merely waiting, bounded by its
/// own idle timeouts.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BusyMeta {
    pub conn_id: u64,
    /// Set while a request is in flight (first byte seen, response not
    /// yet complete).
    pub request_since: Option<Instant>,
}

/// One pool slot.
#[derive(Debug)]
pub(crate) struct WorkerEntry<H> {
    /// Unique across respawns; events from stale status readers are
    /// matched on this, never on the slot index.
    pub id: u64,
    /// Stable slot index; permanent ≡ `index < min_workers`.
    pub index: usize,
    pub pid: u32,
    pub link: H,
    pub state: WorkerState,
    pub birth: Instant,
    pub last_activity: Instant,
    pub permanent: bool,
    pub busy: Option<BusyMeta>,
}

impl<H> WorkerEntry<H> {
    pub fn is_available(&self) -> bool {
        matches!(self.state, WorkerState::Ready | WorkerState::Idle)
    }
}

/// Why the reaper retires a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RetireReason {
    Lifetime,
    PermanentIdle,
    DynamicIdle,
}

/// Graceful retirement decided by [`WorkerPool::reap_plan`]. The runtime
/// sends `Shutdown`; replacement (for permanent slots) happens through
/// [`WorkerPool::deficit`] once the worker is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Retirement {
    pub id: u64,
    pub reason: RetireReason,
}

/// The set of workers, bounded by `min_workers..=max_workers`.
pub(crate) struct WorkerPool<H> {
    entries: Vec<WorkerEntry<H>>,
    min: usize,
    max: usize,
    next_id: u64,
}

impl<H> WorkerPool<H> {
    pub fn new(min: usize, max: usize) -> Self {
        Self { entries: Vec::new(), min, max, next_id: 0 }
    }

    /// Register a freshly handshaken worker. The smallest free slot index
    /// is assigned, so a respawned permanent worker reclaims its slot.
    pub fn insert(&mut self, pid: u32, link: H, now: Instant) -> u64 {
        let index = self.free_index();
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(WorkerEntry {
            id,
            index,
            pid,
            link,
            state: WorkerState::Ready,
            birth: now,
            last_activity: now,
            permanent: index < self.min,
            busy: None,
        });
        id
    }

    fn free_index(&self) -> usize {
        let mut index = 0;
        while self.entries.iter().any(|e| e.index == index) {
            index += 1;
        }
        index
    }

    /// Slot index the next inserted worker will receive.
    pub fn next_index(&self) -> usize {
        self.free_index()
    }

    pub fn get(&self, id: u64) -> Option<&WorkerEntry<H>> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn get_mut(&mut self, id: u64) -> Option<&mut WorkerEntry<H>> {
        self.entries.iter_mut().find(|e| e.id == id)
    }

    /// Pick the idle worker with the oldest `last_activity` (LRU), so load
    /// exercises the whole pool and dynamic idlers retire predictably.
    pub fn checkout_idle(&self) -> Option<u64> {
        self.entries
            .iter()
            .filter(|e| e.is_available())
            .min_by_key(|e| e.last_activity)
            .map(|e| e.id)
    }

    pub fn mark_busy(&mut self, id: u64, conn_id: u64, now: Instant) {
        if let Some(entry) = self.get_mut(id) {
            entry.state = WorkerState::Busy;
            entry.last_activity = now;
            entry.busy = Some(BusyMeta { conn_id, request_since: None });
        }
    }

    /// The worker saw the first byte of a request; start its clock.
    pub fn request_started(&mut self, id: u64, now: Instant) {
        if let Some(entry) = self.get_mut(id) {
            entry.last_activity = now;
            if let Some(busy) = entry.busy.as_mut() {
                busy.request_since = Some(now);
            }
        }
    }

    /// The worker answered a request and is back to waiting on the same
    /// connection; stop its clock.
    pub fn request_finished(&mut self, id: u64, now: Instant) {
        if let Some(entry) = self.get_mut(id) {
            entry.last_activity = now;
            if let Some(busy) = entry.busy.as_mut() {
                busy.request_since = None;
            }
        }
    }

    /// Request finished; the worker is idle again.
    pub fn release(&mut self, id: u64, now: Instant) {
        if let Some(entry) = self.get_mut(id) {
            entry.state = WorkerState::Idle;
            entry.last_activity = now;
            entry.busy = None;
        }
    }

    pub fn mark_stopping(&mut self, id: u64) {
        if let Some(entry) = self.get_mut(id) {
            entry.state = WorkerState::Stopping;
        }
    }

    pub fn remove(&mut self, id: u64) -> Option<WorkerEntry<H>> {
        let pos = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(pos))
    }

    /// Every tracked worker, including stopping ones.
    pub fn total(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Room for a dynamic worker without breaching `max_workers`.
    pub fn can_grow(&self) -> bool {
        self.total() < self.max
    }

    /// How many spawns are needed to fill the vacant permanent slots. A
    /// stopping worker still occupies its slot until it exits, and the
    /// result never pushes `total` past `max_workers`.
    pub fn deficit(&self) -> usize {
        let occupied = self.entries.iter().filter(|e| e.index < self.min).count();
        self.min
            .saturating_sub(occupied)
            .min(self.max.saturating_sub(self.total()))
    }

    pub fn ids(&self) -> Vec<u64> {
        self.entries.iter().map(|e| e.id).collect()
    }

    /// Graceful retirements due now. Only available (Ready/Idle) workers
    /// are considered: busy workers are bounded by request-time
    /// enforcement instead, and lifetime expiry is re-checked on release.
    pub fn reap_plan(
        &self,
        now: Instant,
        max_lifetime: Duration,
        max_idle: Duration,
        max_dynamic_idle: Duration,
    ) -> Vec<Retirement> {
        self.entries
            .iter()
            .filter(|e| e.is_available())
            .filter_map(|e| {
                let reason = if now.duration_since(e.birth) >= max_lifetime {
                    RetireReason::Lifetime
                } else if e.permanent && now.duration_since(e.last_activity) >= max_idle {
                    RetireReason::PermanentIdle
                } else if !e.permanent
                    && now.duration_since(e.last_activity) >= max_dynamic_idle
                {
                    RetireReason::DynamicIdle
                } else {
                    return None;
                };
                Some(Retirement { id: e.id, reason })
            })
            .collect()
    }

    /// Busy workers with an in-flight request past its wall budget. The
    /// daemon kills these outright. Workers waiting for a first byte have
    /// no running clock and are never overdue.
    pub fn overdue(&self, now: Instant, max_request_time: Duration) -> Vec<u64> {
        self.entries
            .iter()
            .filter(|e| e.state == WorkerState::Busy)
            .filter(|e| {
                e.busy
                    .and_then(|b| b.request_since)
                    .map(|since| now.duration_since(since) >= max_request_time)
                    .unwrap_or(false)
            })
            .map(|e| e.id)
            .collect()
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
