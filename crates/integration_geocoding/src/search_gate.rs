//! Single-flight control for search-as-you-type
//!
//! [`SearchGate`] hands out one [`SearchTicket`] per search. Issuing a new
//! ticket cancels the previous one and bumps a generation counter; a response
//! is only applied if its ticket is still current. [`Debouncer`] implements
//! the cancel-and-reschedule quiet period in front of it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Handle for one search request
#[derive(Debug, Clone)]
pub struct SearchTicket {
    generation: u64,
    token: CancellationToken,
}

impl SearchTicket {
    /// Generation this ticket was issued for
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Token cancelled when the ticket is superseded
    #[must_use]
    pub const fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Issues search tickets, at most one current at a time
#[derive(Debug, Default)]
pub struct SearchGate {
    current: Mutex<Option<CancellationToken>>,
    generation: AtomicU64,
    in_flight: AtomicBool,
}

impl SearchGate {
    /// Create a gate with no outstanding search
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the outstanding search and issue a ticket for a new one
    pub fn begin(&self) -> SearchTicket {
        let token = CancellationToken::new();
        let generation = {
            let mut current = self.current.lock();
            if let Some(previous) = current.replace(token.clone()) {
                previous.cancel();
            }
            self.generation.fetch_add(1, Ordering::SeqCst) + 1
        };
        self.in_flight.store(true, Ordering::SeqCst);
        SearchTicket { generation, token }
    }

    /// Whether `ticket` is still the latest and not cancelled
    pub fn is_current(&self, ticket: &SearchTicket) -> bool {
        !ticket.token.is_cancelled() && self.generation.load(Ordering::SeqCst) == ticket.generation
    }

    /// Mark the ticket's request as finished
    ///
    /// Only the current ticket clears the in-flight flag.
    pub fn finish(&self, ticket: &SearchTicket) {
        if self.generation.load(Ordering::SeqCst) == ticket.generation {
            self.in_flight.store(false, Ordering::SeqCst);
        }
    }

    /// Cancel the outstanding search, if any
    ///
    /// Returns true if a search was cancelled.
    pub fn cancel(&self) -> bool {
        let previous = self.current.lock().take();
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.in_flight.store(false, Ordering::SeqCst);
        previous.is_some_and(|token| {
            let was_live = !token.is_cancelled();
            token.cancel();
            was_live
        })
    }

    /// Whether a search request is currently outstanding
    pub fn in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }
}

/// Named cancel-and-reschedule timers
#[derive(Debug, Default)]
pub struct Debouncer {
    timers: Mutex<HashMap<String, (u64, CancellationToken)>>,
    sequence: AtomicU64,
}

impl Debouncer {
    /// Create a debouncer with no pending timers
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait out `quiet` on the timer `name`
    ///
    /// A later call with the same name cancels this one. Returns true if the
    /// full quiet period elapsed, false if the call was superseded.
    pub async fn settle(&self, name: &str, quiet: Duration) -> bool {
        let id = self.sequence.fetch_add(1, Ordering::SeqCst);
        let token = CancellationToken::new();
        if let Some((_, previous)) = self
            .timers
            .lock()
            .insert(name.to_string(), (id, token.clone()))
        {
            previous.cancel();
        }
        let _timer = TimerGuard {
            timers: &self.timers,
            name,
            id,
        };

        let elapsed = tokio::select! {
            () = token.cancelled() => false,
            () = tokio::time::sleep(quiet) => true,
        };

        if !elapsed {
            debug!(timer = name, "Debounced call superseded");
        }
        elapsed
    }

    /// Number of timers currently waiting
    pub fn pending(&self) -> usize {
        self.timers.lock().len()
    }
}

/// Removes a timer entry when its `settle` call ends or is dropped
struct TimerGuard<'a> {
    timers: &'a Mutex<HashMap<String, (u64, CancellationToken)>>,
    name: &'a str,
    id: u64,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        let mut timers = self.timers.lock();
        if timers.get(self.name).is_some_and(|(current, _)| *current == self.id) {
            timers.remove(self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn begin_cancels_previous_ticket() {
        let gate = SearchGate::new();
        let first = gate.begin();
        assert!(gate.is_current(&first));

        let second = gate.begin();
        assert!(first.token().is_cancelled());
        assert!(!gate.is_current(&first));
        assert!(gate.is_current(&second));
        assert!(second.generation() > first.generation());
    }

    #[test]
    fn finish_only_clears_for_current_ticket() {
        let gate = SearchGate::new();
        let first = gate.begin();
        let second = gate.begin();

        gate.finish(&first);
        assert!(gate.in_flight());

        gate.finish(&second);
        assert!(!gate.in_flight());
    }

    #[test]
    fn cancel_invalidates_outstanding_ticket() {
        let gate = SearchGate::new();
        assert!(!gate.cancel());

        let ticket = gate.begin();
        assert!(gate.cancel());
        assert!(ticket.token().is_cancelled());
        assert!(!gate.is_current(&ticket));
        assert!(!gate.in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn debouncer_lets_quiet_call_through() {
        let debouncer = Debouncer::new();
        assert!(debouncer.settle("search", Duration::from_millis(500)).await);
        assert_eq!(debouncer.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn debouncer_waits_for_full_quiet_period() {
        let debouncer = Debouncer::new();
        let mut settle =
            tokio_test::task::spawn(debouncer.settle("search", Duration::from_millis(500)));

        tokio_test::assert_pending!(settle.poll());
        assert_eq!(debouncer.pending(), 1);

        tokio::time::advance(Duration::from_millis(499)).await;
        tokio_test::assert_pending!(settle.poll());

        tokio::time::advance(Duration::from_millis(1)).await;
        tokio_test::assert_ready_eq!(settle.poll(), true);
    }

    #[tokio::test(start_paused = true)]
    async fn debouncer_forgets_dropped_call() {
        let debouncer = Debouncer::new();
        let mut settle =
            tokio_test::task::spawn(debouncer.settle("search", Duration::from_millis(500)));
        tokio_test::assert_pending!(settle.poll());
        assert_eq!(debouncer.pending(), 1);

        drop(settle);
        assert_eq!(debouncer.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn debouncer_supersedes_earlier_call() {
        let debouncer = Arc::new(Debouncer::new());

        let early = {
            let debouncer = Arc::clone(&debouncer);
            tokio::spawn(async move { debouncer.settle("search", Duration::from_millis(500)).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;

        let late = debouncer.settle("search", Duration::from_millis(500)).await;

        assert!(!early.await.unwrap());
        assert!(late);
        assert_eq!(debouncer.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn debouncer_timers_are_independent_by_name() {
        let debouncer = Arc::new(Debouncer::new());

        let a = {
            let debouncer = Arc::clone(&debouncer);
            tokio::spawn(async move { debouncer.settle("a", Duration::from_millis(300)).await })
        };
        let b = debouncer.settle("b", Duration::from_millis(300)).await;

        assert!(a.await.unwrap());
        assert!(b);
    }
}
