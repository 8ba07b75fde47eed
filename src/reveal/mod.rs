mod scheduler;

use std::time::Duration;

use unicode_segmentation::UnicodeSegmentation;

use crate::model::RecordId;

pub use scheduler::{IntervalScheduler, ManualScheduler, Scheduler, TimerId};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RevealState {
    #[default]
    Idle,
    Revealing {
        letter: RecordId,
        timer: TimerId,
    },
    Complete {
        letter: RecordId,
    },
    Suspended {
        letter: RecordId,
    },
}

#[derive(Debug)]
pub struct RevealAnimator {
    period: Duration,
    state: RevealState,
    body: String,
    // Byte offsets of every grapheme end, so `shown` always lands on a
    // character boundary.
    boundaries: Vec<usize>,
    shown: usize,
}

impl RevealAnimator {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            state: RevealState::Idle,
            body: String::new(),
            boundaries: Vec::new(),
            shown: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn state(&self) -> &RevealState {
        &self.state
    }

    pub fn letter(&self) -> Option<&RecordId> {
        match &self.state {
            RevealState::Idle => None,
            RevealState::Revealing { letter, .. }
            | RevealState::Complete { letter }
            | RevealState::Suspended { letter } => Some(letter),
        }
    }

    pub fn timer(&self) -> Option<TimerId> {
        match self.state {
            RevealState::Revealing { timer, .. } => Some(timer),
            _ => None,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.state, RevealState::Complete { .. })
    }

    pub fn revealed(&self) -> &str {
        if self.shown == 0 {
            return "";
        }
        &self.body[..self.boundaries[self.shown - 1]]
    }

    pub fn start<C>(&mut self, letter: &RecordId, body: &str, scheduler: &mut C)
    where
        C: Scheduler + ?Sized,
    {
        self.stop_timer(scheduler);
        self.body = body.to_owned();
        self.boundaries = body
            .grapheme_indices(true)
            .map(|(offset, grapheme)| offset + grapheme.len())
            .collect();
        self.shown = 0;

        if self.boundaries.is_empty() {
            self.state = RevealState::Complete {
                letter: letter.clone(),
            };
            return;
        }
        let timer = scheduler.start_interval(self.period);
        tracing::trace!(letter = %letter, timer = timer.get(), "reveal started");
        self.state = RevealState::Revealing {
            letter: letter.clone(),
            timer,
        };
    }

    pub fn tick<C>(&mut self, timer: TimerId, scheduler: &mut C) -> Option<&str>
    where
        C: Scheduler + ?Sized,
    {
        let RevealState::Revealing {
            letter,
            timer: live,
        } = &self.state
        else {
            return None;
        };
        if *live != timer {
            return None;
        }
        let letter = letter.clone();

        self.shown = (self.shown + 1).min(self.boundaries.len());
        if self.shown == self.boundaries.len() {
            scheduler.cancel(timer);
            tracing::trace!(letter = %letter, "reveal complete");
            self.state = RevealState::Complete { letter };
        }
        Some(self.revealed())
    }

    pub fn suspend<C>(&mut self, scheduler: &mut C)
    where
        C: Scheduler + ?Sized,
    {
        let Some(letter) = self.letter().cloned() else {
            return;
        };
        self.stop_timer(scheduler);
        self.shown = 0;
        self.state = RevealState::Suspended { letter };
    }

    pub fn cancel<C>(&mut self, scheduler: &mut C)
    where
        C: Scheduler + ?Sized,
    {
        self.stop_timer(scheduler);
        self.body.clear();
        self.boundaries.clear();
        self.shown = 0;
        self.state = RevealState::Idle;
    }

    fn stop_timer<C>(&mut self, scheduler: &mut C)
    where
        C: Scheduler + ?Sized,
    {
        if let Some(timer) = self.timer() {
            scheduler.cancel(timer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn animator() -> (RevealAnimator, ManualScheduler) {
        (
            RevealAnimator::new(Duration::from_millis(15)),
            ManualScheduler::new(),
        )
    }

    fn run_to_end(animator: &mut RevealAnimator, scheduler: &mut ManualScheduler) -> usize {
        let mut ticks = 0;
        while let Some(timer) = animator.timer() {
            animator.tick(timer, scheduler);
            ticks += 1;
        }
        ticks
    }

    #[test]
    fn reveals_one_grapheme_per_tick_then_stops() {
        let (mut animator, mut scheduler) = animator();
        let id = RecordId::from("a");
        animator.start(&id, "héllo", &mut scheduler);
        let timer = animator.timer().unwrap();
        assert_eq!(scheduler.period(timer), Some(Duration::from_millis(15)));

        assert_eq!(animator.tick(timer, &mut scheduler), Some("h"));
        assert_eq!(animator.tick(timer, &mut scheduler), Some("hé"));
        assert_eq!(run_to_end(&mut animator, &mut scheduler), 3);
        assert_eq!(animator.revealed(), "héllo");
        assert!(animator.is_complete());
        assert_eq!(scheduler.active_count(), 0);

        assert_eq!(animator.tick(timer, &mut scheduler), None);
        assert_eq!(animator.revealed(), "héllo");
    }

    #[test]
    fn restart_cancels_the_previous_timer() {
        let (mut animator, mut scheduler) = animator();
        animator.start(&RecordId::from("a"), "aaaa", &mut scheduler);
        let old = animator.timer().unwrap();
        animator.tick(old, &mut scheduler);

        animator.start(&RecordId::from("b"), "bb", &mut scheduler);
        assert_eq!(scheduler.active_count(), 1);
        assert!(!scheduler.is_active(old));
        assert_eq!(animator.revealed(), "");
        assert_eq!(animator.tick(old, &mut scheduler), None);

        run_to_end(&mut animator, &mut scheduler);
        assert_eq!(animator.revealed(), "bb");
    }

    #[test]
    fn empty_body_completes_without_a_timer() {
        let (mut animator, mut scheduler) = animator();
        animator.start(&RecordId::from("a"), "", &mut scheduler);
        assert!(animator.is_complete());
        assert_eq!(scheduler.active_count(), 0);
        assert_eq!(animator.revealed(), "");
    }

    #[test]
    fn combined_characters_reveal_as_one_step() {
        let (mut animator, mut scheduler) = animator();
        animator.start(&RecordId::from("a"), "e\u{301}!", &mut scheduler);
        let timer = animator.timer().unwrap();
        assert_eq!(animator.tick(timer, &mut scheduler), Some("e\u{301}"));
        assert_eq!(animator.tick(timer, &mut scheduler), Some("e\u{301}!"));
        assert!(animator.is_complete());
    }

    #[test]
    fn suspend_hides_text_and_cancel_goes_idle() {
        let (mut animator, mut scheduler) = animator();
        let id = RecordId::from("a");
        animator.start(&id, "abc", &mut scheduler);
        let timer = animator.timer().unwrap();
        animator.tick(timer, &mut scheduler);

        animator.suspend(&mut scheduler);
        assert_matches!(animator.state(), RevealState::Suspended { letter } if *letter == id);
        assert_eq!(animator.revealed(), "");
        assert_eq!(scheduler.active_count(), 0);
        assert_eq!(animator.tick(timer, &mut scheduler), None);

        animator.cancel(&mut scheduler);
        assert_eq!(animator.state(), &RevealState::Idle);
        assert!(animator.letter().is_none());
        animator.suspend(&mut scheduler);
        assert_eq!(animator.state(), &RevealState::Idle);
    }
}
