use std::collections::HashMap;
use std::time::Duration;

use log::debug;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// Scheduled callbacks a participant owns.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TimerKey {
    /// Grace window for the named player to call UNO.
    UnoReminder(String),
    HostSync,
    SyncTimeout,
    SendRetry(u64),
}

struct Scheduled {
    generation: u64,
    handle: AbortHandle,
}

/// Cancelable delayed callbacks delivered through a channel. A timer that
/// was cancelled or replaced never reaches `next`, even if its task had
/// already fired.
pub struct Timers {
    tx: mpsc::UnboundedSender<(TimerKey, u64)>,
    rx: mpsc::UnboundedReceiver<(TimerKey, u64)>,
    scheduled: HashMap<TimerKey, Scheduled>,
    generation: u64,
}

impl Default for Timers {
    fn default() -> Self {
        Self::new()
    }
}

impl Timers {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx,
            scheduled: HashMap::new(),
            generation: 0,
        }
    }

    /// Schedules `key` to fire after `delay`, replacing any pending timer
    /// with the same key.
    pub fn schedule(&mut self, key: TimerKey, delay: Duration) {
        self.cancel(&key);
        self.generation += 1;
        let generation = self.generation;
        let tx = self.tx.clone();
        let fired = key.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send((fired, generation));
        });
        self.scheduled.insert(
            key,
            Scheduled {
                generation,
                handle: task.abort_handle(),
            },
        );
    }

    pub fn is_scheduled(&self, key: &TimerKey) -> bool {
        self.scheduled.contains_key(key)
    }

    pub fn cancel(&mut self, key: &TimerKey) {
        if let Some(scheduled) = self.scheduled.remove(key) {
            scheduled.handle.abort();
        }
    }

    /// Cancels every timer whose key matches `predicate`.
    pub fn cancel_where(&mut self, predicate: impl Fn(&TimerKey) -> bool) {
        let keys: Vec<TimerKey> = self
            .scheduled
            .keys()
            .filter(|key| predicate(key))
            .cloned()
            .collect();
        for key in keys {
            self.cancel(&key);
        }
    }

    pub fn cancel_all(&mut self) {
        for (key, scheduled) in self.scheduled.drain() {
            debug!("Cancelling timer {:?}", key);
            scheduled.handle.abort();
        }
    }

    pub fn pending(&self) -> usize {
        self.scheduled.len()
    }

    fn accept(&mut self, key: TimerKey, generation: u64) -> Option<TimerKey> {
        match self.scheduled.get(&key) {
            Some(scheduled) if scheduled.generation == generation => {
                self.scheduled.remove(&key);
                Some(key)
            }
            _ => None,
        }
    }

    /// Waits for the next live timer. Pending forever when none is scheduled.
    pub async fn next(&mut self) -> TimerKey {
        loop {
            // `tx` lives in `self`, so the channel never closes.
            if let Some((key, generation)) = self.rx.recv().await {
                if let Some(key) = self.accept(key, generation) {
                    return key;
                }
            }
        }
    }

    /// Returns a timer that has already fired, without waiting.
    pub fn try_next(&mut self) -> Option<TimerKey> {
        while let Ok((key, generation)) = self.rx.try_recv() {
            if let Some(key) = self.accept(key, generation) {
                return Some(key);
            }
        }
        None
    }
}

impl Drop for Timers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_delay() {
        let mut timers = Timers::new();
        timers.schedule(TimerKey::HostSync, Duration::from_secs(10));
        assert!(timers.is_scheduled(&TimerKey::HostSync));

        tokio::time::advance(Duration::from_secs(9)).await;
        tokio::task::yield_now().await;
        assert_eq!(timers.try_next(), None);

        let key = timers.next().await;
        assert_eq!(key, TimerKey::HostSync);
        assert!(!timers.is_scheduled(&TimerKey::HostSync));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_fires() {
        let mut timers = Timers::new();
        timers.schedule(TimerKey::UnoReminder("Bob".into()), Duration::from_secs(5));
        timers.schedule(TimerKey::SyncTimeout, Duration::from_secs(6));
        timers.cancel_where(|key| matches!(key, TimerKey::UnoReminder(_)));

        let key = timers.next().await;
        assert_eq!(key, TimerKey::SyncTimeout);
        assert_eq!(timers.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rescheduling_replaces_previous() {
        let mut timers = Timers::new();
        timers.schedule(TimerKey::SyncTimeout, Duration::from_secs(1));
        tokio::time::advance(Duration::from_secs(2)).await;
        tokio::task::yield_now().await;
        // The first timer already fired into the channel; rescheduling must hide it
        timers.schedule(TimerKey::SyncTimeout, Duration::from_secs(5));
        assert_eq!(timers.try_next(), None);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(timers.next().await, TimerKey::SyncTimeout);
    }
}
