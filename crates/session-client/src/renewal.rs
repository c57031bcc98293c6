//! Single-flight credential renewal
//!
//! At most one refresh-token exchange runs per client. The first request to
//! observe a rejected access token takes the [`RenewalLease`]; every request
//! that is rejected while the lease is held parks a [`PendingRequest`] in a
//! FIFO queue and receives the lease holder's outcome when it settles.
//!
//! A generation counter increments on every successful renewal. The lease
//! holder persists the new pair and bumps the generation under the write side
//! of a commit gate; requests read the generation and their access token
//! together under the read side. A request therefore always knows which
//! generation its token belongs to: a 401 for a replaced token retries with
//! the stored credentials, and a 401 for the current token starts a renewal.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use reqwest::Method;
use tokio::sync::{RwLock, oneshot};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Outcome delivered to waiters: the renewed access token or the failure.
pub(crate) type RenewalOutcome = Result<String>;

/// Point-in-time view of the coordinator, for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenewalStatus {
    /// A refresh-token exchange is currently running.
    pub in_flight: bool,
    /// Requests waiting for the running exchange.
    pub queued: usize,
    /// Number of successful renewals so far.
    pub generation: u64,
}

struct PendingRequest {
    method: Method,
    path: String,
    waiter: oneshot::Sender<RenewalOutcome>,
}

#[derive(Default)]
struct RenewalState {
    in_flight: bool,
    generation: u64,
    queue: VecDeque<PendingRequest>,
}

/// What a rejected request should do next.
pub(crate) enum Ticket<'a> {
    /// Run the exchange, then settle the lease.
    Lead(RenewalLease<'a>),
    /// Wait for the running exchange.
    Wait(oneshot::Receiver<RenewalOutcome>),
    /// Credentials changed since the request read them; retry with the store.
    Superseded,
}

#[derive(Default)]
pub(crate) struct RenewalCoordinator {
    state: Mutex<RenewalState>,
    commit_gate: RwLock<()>,
}

impl RenewalCoordinator {
    fn lock(&self) -> MutexGuard<'_, RenewalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub(crate) fn status(&self) -> RenewalStatus {
        let state = self.lock();
        RenewalStatus {
            in_flight: state.in_flight,
            queued: state.queue.len(),
            generation: state.generation,
        }
    }

    /// Run `read` (normally the access-token lookup) with no commit in
    /// progress and return it with the generation it belongs to.
    pub(crate) async fn snapshot<T>(&self, read: impl Future<Output = T>) -> (u64, T) {
        let _gate = self.commit_gate.read().await;
        let generation = self.generation();
        (generation, read.await)
    }

    /// Register a rejected request. `seen_generation` comes from the
    /// [`snapshot`](Self::snapshot) that produced the request's access token.
    pub(crate) fn enter(&self, seen_generation: u64, method: &Method, path: &str) -> Ticket<'_> {
        let mut state = self.lock();
        if state.in_flight {
            let (waiter, receiver) = oneshot::channel();
            state.queue.push_back(PendingRequest {
                method: method.clone(),
                path: path.to_string(),
                waiter,
            });
            debug!(queued = state.queue.len(), "queued behind in-flight renewal");
            return Ticket::Wait(receiver);
        }
        if state.generation != seen_generation {
            return Ticket::Superseded;
        }
        state.in_flight = true;
        Ticket::Lead(RenewalLease {
            coordinator: self,
            settled: false,
        })
    }

    /// Clear the in-flight flag, then release the queue in arrival order.
    /// Returns the number of waiters released.
    fn settle(&self, outcome: &RenewalOutcome) -> usize {
        let queue = {
            let mut state = self.lock();
            if outcome.is_ok() {
                state.generation += 1;
            }
            state.in_flight = false;
            std::mem::take(&mut state.queue)
        };

        let released = queue.len();
        for pending in queue {
            if pending.waiter.send(outcome.clone()).is_err() {
                debug!(
                    method = %pending.method,
                    path = %pending.path,
                    "waiter dropped before renewal settled"
                );
            }
        }
        released
    }
}

/// Exclusive right to run the current renewal.
///
/// Dropping an unsettled lease releases waiters with
/// [`Error::RenewalAbandoned`], so a cancelled initiator never strands the
/// queue or leaves the flag set.
pub(crate) struct RenewalLease<'a> {
    coordinator: &'a RenewalCoordinator,
    settled: bool,
}

impl RenewalLease<'_> {
    /// Persist a successful renewal and release the queue with
    /// `access_token`. No snapshot can interleave with `persist`.
    pub(crate) async fn commit(
        self,
        persist: impl Future<Output = ()>,
        access_token: String,
    ) -> usize {
        let coordinator = self.coordinator;
        let _gate = coordinator.commit_gate.write().await;
        persist.await;
        self.settle(&Ok(access_token))
    }

    pub(crate) fn settle(mut self, outcome: &RenewalOutcome) -> usize {
        self.settled = true;
        self.coordinator.settle(outcome)
    }
}

impl Drop for RenewalLease<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!("renewal dropped before completing, releasing waiters");
            self.coordinator.settle(&Err(Error::RenewalAbandoned));
        }
    }
}
