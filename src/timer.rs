use std::time::Duration;

/// What a fired timer wants to happen next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimerOutcome {
    /// Drop the timer.
    Done,
    /// Fire again after the given delay, measured from the time the timer ran.
    Reschedule(Duration),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimerEvent<T> {
    /// Absolute due time, in milliseconds since the Unix epoch.
    pub due_at: u64,
    pub timer: T,
}

/// An unordered set of scheduled timers.
///
/// Timers are plain data: `T` identifies which action to run, and the caller maps it to that
/// action when the timer fires. The queue is small, so lookups are linear scans.
#[derive(Debug)]
pub struct TimerQueue<T> {
    events: Vec<TimerEvent<T>>,
}

impl<T> TimerQueue<T> {
    pub fn new() -> TimerQueue<T> {
        TimerQueue { events: Vec::new() }
    }

    pub fn schedule(&mut self, due_at: u64, timer: T) {
        self.events.push(TimerEvent { due_at, timer });
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The earliest due time among all scheduled timers.
    pub fn nearest(&self) -> Option<u64> {
        self.events.iter().map(|event| event.due_at).min()
    }

    /// How long the event loop may wait before the next timer is due. Overdue timers and an
    /// empty queue both yield a zero timeout.
    pub fn timeout(&self, now: u64) -> Duration {
        self.nearest()
            .map(|due_at| Duration::from_millis(due_at.saturating_sub(now)))
            .unwrap_or(Duration::ZERO)
    }

    /// Fires every timer due at `now`, in no particular order, and returns how many fired.
    ///
    /// Each scheduled timer is visited once per call, so a timer rescheduled with a zero delay
    /// fires again on the next call rather than looping here.
    pub fn run_due<F>(&mut self, now: u64, mut fire: F) -> usize
    where
        F: FnMut(&T) -> TimerOutcome,
    {
        let mut fired = 0;

        self.events.retain_mut(|event| {
            if event.due_at > now {
                return true;
            }

            fired += 1;
            match fire(&event.timer) {
                TimerOutcome::Done => false,
                TimerOutcome::Reschedule(delay) => {
                    event.due_at = now.saturating_add(delay.as_millis() as u64);
                    true
                }
            }
        });

        fired
    }
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Timer {
        Once,
        Repeat,
    }

    #[test]
    fn empty_queue() {
        let queue = TimerQueue::<Timer>::new();

        assert!(queue.is_empty());
        assert_eq!(queue.nearest(), None);
        assert_eq!(queue.timeout(1_000), Duration::ZERO);
    }

    #[test]
    fn timeout_until_nearest() {
        let mut queue = TimerQueue::new();
        queue.schedule(1_500, Timer::Repeat);
        queue.schedule(1_200, Timer::Once);

        assert_eq!(queue.nearest(), Some(1_200));
        assert_eq!(queue.timeout(1_000), Duration::from_millis(200));
    }

    #[test]
    fn timeout_is_zero_when_overdue() {
        let mut queue = TimerQueue::new();
        queue.schedule(900, Timer::Once);

        assert_eq!(queue.timeout(1_000), Duration::ZERO);
    }

    #[test]
    fn run_due_only_fires_elapsed_timers() {
        let mut queue = TimerQueue::new();
        queue.schedule(1_000, Timer::Once);
        queue.schedule(2_000, Timer::Repeat);

        let mut fired = Vec::new();
        let count = queue.run_due(1_000, |timer| {
            fired.push(*timer);
            TimerOutcome::Done
        });

        assert_eq!(count, 1);
        assert_eq!(fired, vec![Timer::Once]);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.nearest(), Some(2_000));
    }

    #[test]
    fn run_due_reschedules_relative_to_now() {
        let mut queue = TimerQueue::new();
        queue.schedule(1_000, Timer::Repeat);

        let count = queue.run_due(1_050, |_| TimerOutcome::Reschedule(Duration::from_millis(100)));

        assert_eq!(count, 1);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.nearest(), Some(1_150));

        // Not due yet.
        let count = queue.run_due(1_100, |_| TimerOutcome::Reschedule(Duration::from_millis(100)));
        assert_eq!(count, 0);
        assert_eq!(queue.nearest(), Some(1_150));
    }

    #[test]
    fn run_due_fires_each_timer_once_per_call() {
        let mut queue = TimerQueue::new();
        queue.schedule(1_000, Timer::Repeat);

        let count = queue.run_due(1_000, |_| TimerOutcome::Reschedule(Duration::ZERO));

        assert_eq!(count, 1);
        assert_eq!(queue.timeout(1_000), Duration::ZERO);
    }
}
