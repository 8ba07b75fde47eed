use std::time::{Duration, Instant};

use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    pub fn get(self) -> u64 {
        self.0
    }
}

pub trait Scheduler {
    fn start_interval(&mut self, period: Duration) -> TimerId;

    fn cancel(&mut self, timer: TimerId);

    fn is_active(&self, timer: TimerId) -> bool;

    fn active_count(&self) -> usize;
}

#[derive(Debug, Default)]
pub struct ManualScheduler {
    next_id: u64,
    active: IndexMap<TimerId, Duration>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active_timers(&self) -> Vec<TimerId> {
        self.active.keys().copied().collect()
    }

    pub fn period(&self, timer: TimerId) -> Option<Duration> {
        self.active.get(&timer).copied()
    }
}

impl Scheduler for ManualScheduler {
    fn start_interval(&mut self, period: Duration) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.active.insert(id, period);
        id
    }

    fn cancel(&mut self, timer: TimerId) {
        self.active.shift_remove(&timer);
    }

    fn is_active(&self, timer: TimerId) -> bool {
        self.active.contains_key(&timer)
    }

    fn active_count(&self) -> usize {
        self.active.len()
    }
}

#[derive(Debug, Clone, Copy)]
struct Interval {
    period: Duration,
    next_due: Instant,
}

#[derive(Debug, Default)]
pub struct IntervalScheduler {
    next_id: u64,
    timers: IndexMap<TimerId, Interval>,
}

impl IntervalScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn due(&mut self, now: Instant) -> Vec<TimerId> {
        let mut fired = Vec::new();
        for (id, interval) in self.timers.iter_mut() {
            if interval.next_due <= now {
                fired.push(*id);
                interval.next_due = now + interval.period;
            }
        }
        fired
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.values().map(|interval| interval.next_due).min()
    }
}

impl Scheduler for IntervalScheduler {
    fn start_interval(&mut self, period: Duration) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        self.timers.insert(
            id,
            Interval {
                period,
                next_due: Instant::now() + period,
            },
        );
        id
    }

    fn cancel(&mut self, timer: TimerId) {
        self.timers.shift_remove(&timer);
    }

    fn is_active(&self, timer: TimerId) -> bool {
        self.timers.contains_key(&timer)
    }

    fn active_count(&self) -> usize {
        self.timers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_cancel_is_idempotent() {
        let mut scheduler = ManualScheduler::new();
        let timer = scheduler.start_interval(Duration::from_millis(15));
        assert!(scheduler.is_active(timer));
        assert_eq!(scheduler.period(timer), Some(Duration::from_millis(15)));
        scheduler.cancel(timer);
        scheduler.cancel(timer);
        assert!(!scheduler.is_active(timer));
        assert_eq!(scheduler.active_count(), 0);
    }

    #[test]
    fn interval_fires_once_per_poll_and_reschedules() {
        let mut scheduler = IntervalScheduler::new();
        let start = Instant::now();
        let timer = scheduler.start_interval(Duration::from_millis(10));
        assert!(scheduler.due(start).is_empty());

        let later = start + Duration::from_secs(5);
        assert_eq!(scheduler.due(later), vec![timer]);
        assert!(scheduler.due(later).is_empty());
        assert_eq!(
            scheduler.next_deadline(),
            Some(later + Duration::from_millis(10))
        );

        scheduler.cancel(timer);
        assert!(scheduler.next_deadline().is_none());
    }
}
