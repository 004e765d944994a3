//! Cancellable deferred events and the keystroke debounce built on them.
//!
//! A [`DelayedTask`] owns at most one pending timer. Firing posts an event
//! back to the control's channel; each arm is stamped with a sequence number
//! so an event that was already queued when the timer got cancelled or
//! re-armed is recognized and dropped.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::meets_min_length;
use crate::ui::event::ControlEvent;

/// At most one outstanding timer that posts an event when it elapses.
#[derive(Debug, Default)]
pub struct DelayedTask {
    handle: Option<JoinHandle<()>>,
    armed: Option<u64>,
    next_seq: u64,
}

impl DelayedTask {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer, cancelling any previous one. `make_event` receives the
    /// sequence number the fired event must carry.
    pub fn arm<E, F>(&mut self, delay: Duration, tx: &UnboundedSender<E>, make_event: F) -> u64
    where
        E: Send + 'static,
        F: FnOnce(u64) -> E,
    {
        self.cancel();
        self.next_seq += 1;
        let seq = self.next_seq;
        let event = make_event(seq);
        let deadline = Instant::now() + delay;
        let tx = tx.clone();
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            // Receiver gone means the control was torn down.
            let _ = tx.send(event);
        }));
        self.armed = Some(seq);
        seq
    }

    /// Idempotent; safe during teardown.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.armed = None;
    }

    /// Accept a fired event if it belongs to the currently armed timer.
    pub fn take_fired(&mut self, seq: u64) -> bool {
        if self.armed == Some(seq) {
            self.armed = None;
            self.handle = None;
            true
        } else {
            false
        }
    }
}

impl Drop for DelayedTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// What a fired debounce asks the control to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DebounceOutcome {
    /// Search now with this (trimmed) text.
    Search(String),
    /// Text too short: close results without touching the network.
    CloseResults,
    /// The timer was cancelled or re-armed after this event was queued.
    Superseded,
}

/// Coalesces bursts of keystrokes into one delayed search trigger.
#[derive(Debug)]
pub struct DebounceScheduler {
    delay: Duration,
    min_search_chars: usize,
    task: DelayedTask,
    tx: UnboundedSender<ControlEvent>,
}

impl DebounceScheduler {
    pub fn new(delay: Duration, min_search_chars: usize, tx: UnboundedSender<ControlEvent>) -> Self {
        Self {
            delay,
            min_search_chars,
            task: DelayedTask::new(),
            tx,
        }
    }

    /// Last call wins: any pending trigger is cancelled.
    pub fn schedule(&mut self, text: &str) {
        let text = text.to_string();
        let seq = self
            .task
            .arm(self.delay, &self.tx, |seq| ControlEvent::DebounceElapsed {
                seq,
                text,
            });
        tracing::trace!(seq, "debounce_armed");
    }

    pub fn cancel(&mut self) {
        self.task.cancel();
    }

    /// Resolve a fired trigger against the minimum-length gate.
    pub fn fire(&mut self, seq: u64, text: &str) -> DebounceOutcome {
        if !self.task.take_fired(seq) {
            return DebounceOutcome::Superseded;
        }
        let trimmed = text.trim();
        if meets_min_length(trimmed, self.min_search_chars) {
            DebounceOutcome::Search(trimmed.to_string())
        } else {
            DebounceOutcome::CloseResults
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    async fn next_debounce(rx: &mut mpsc::UnboundedReceiver<ControlEvent>) -> (u64, String) {
        match rx.recv().await {
            Some(ControlEvent::DebounceElapsed { seq, text }) => (seq, text),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn last_call_wins() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = DebounceScheduler::new(Duration::from_millis(300), 2, tx);

        let start = Instant::now();
        scheduler.schedule("J");
        tokio::time::advance(Duration::from_millis(100)).await;
        scheduler.schedule("Jo");
        tokio::time::advance(Duration::from_millis(100)).await;
        scheduler.schedule("Joh");

        let (seq, text) = next_debounce(&mut rx).await;
        assert_eq!(text, "Joh");
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(500), "fired early: {waited:?}");
        assert!(waited < Duration::from_millis(600), "fired late: {waited:?}");
        assert_eq!(scheduler.fire(seq, &text), DebounceOutcome::Search("Joh".into()));
        // A fired trigger is consumed exactly once.
        assert_eq!(scheduler.fire(seq, &text), DebounceOutcome::Superseded);

        // Nothing else was queued.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn short_text_closes_results() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = DebounceScheduler::new(Duration::from_millis(300), 2, tx);
        scheduler.schedule(" J ");
        let (seq, text) = next_debounce(&mut rx).await;
        assert_eq!(scheduler.fire(seq, &text), DebounceOutcome::CloseResults);
    }

    #[tokio::test(start_paused = true)]
    async fn queued_event_after_cancel_is_superseded() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut scheduler = DebounceScheduler::new(Duration::from_millis(300), 2, tx);
        scheduler.schedule("Jo");
        tokio::time::sleep(Duration::from_millis(400)).await;
        // The event is already queued; cancelling must still neutralize it.
        scheduler.cancel();
        scheduler.cancel();
        let (seq, text) = next_debounce(&mut rx).await;
        assert_eq!(scheduler.fire(seq, &text), DebounceOutcome::Superseded);
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_after_fire_rejects_old_sequence() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut task = DelayedTask::new();
        let first = task.arm(Duration::from_millis(10), &tx, |seq| seq);
        tokio::time::sleep(Duration::from_millis(20)).await;
        let second = task.arm(Duration::from_millis(10), &tx, |seq| seq);
        assert_ne!(first, second);
        assert_eq!(rx.recv().await, Some(first));
        assert!(!task.take_fired(first));
        assert_eq!(rx.recv().await, Some(second));
        assert!(task.take_fired(second));
        assert!(!task.take_fired(second));
    }
}
