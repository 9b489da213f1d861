//! Single-timer expiration scheduling.
//!
//! The scheduler holds no reminder data, only which reminder the one armed
//! timer is for and when it is due. The service loop turns that into a
//! sleep; every re-arm replaces the previous timer.

use crate::reminder::{Reminder, ReminderId};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    /// No timer armed
    #[default]
    Idle,
    /// One timer armed for `armed_for`, due at `due_at`
    Watching {
        armed_for: ReminderId,
        due_at: DateTime<Utc>,
    },
}

#[derive(Debug, Default)]
pub struct ExpirationScheduler {
    state: SchedulerState,
}

impl ExpirationScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_watching(&self) -> bool {
        matches!(self.state, SchedulerState::Watching { .. })
    }

    /// Anything left that could still expire
    pub fn should_watch(reminders: &[Reminder]) -> bool {
        reminders.iter().any(|r| !r.is_expired)
    }

    /// Earliest unexpired reminder; ties go to the older one
    pub fn next_due(reminders: &[Reminder]) -> Option<&Reminder> {
        reminders
            .iter()
            .filter(|r| !r.is_expired)
            .min_by_key(|r| (r.time_stamp, r.id))
    }

    /// Every unexpired reminder whose time has come
    pub fn collect_due(reminders: &[Reminder], now: DateTime<Utc>) -> Vec<ReminderId> {
        reminders
            .iter()
            .filter(|r| r.is_due(now))
            .map(|r| r.id)
            .collect()
    }

    /// Arm for the earliest unexpired reminder, replacing any armed timer.
    ///
    /// With nothing left to watch this settles in `Idle`.
    pub fn start_watching(&mut self, reminders: &[Reminder], now: DateTime<Utc>) -> SchedulerState {
        self.state = match Self::next_due(reminders) {
            Some(next) => {
                debug!(
                    id = next.id,
                    due_at = %next.time_stamp,
                    delay_ms = delay_until(next.time_stamp, now).as_millis() as u64,
                    "Armed expiration timer"
                );
                SchedulerState::Watching {
                    armed_for: next.id,
                    due_at: next.time_stamp,
                }
            }
            None => {
                debug!("Nothing to watch, scheduler idle");
                SchedulerState::Idle
            }
        };
        self.state
    }

    /// Arm for an explicit moment, e.g. to retry after a failed write
    pub fn arm_at(&mut self, armed_for: ReminderId, due_at: DateTime<Utc>) {
        debug!(id = armed_for, %due_at, "Armed expiration timer for retry");
        self.state = SchedulerState::Watching { armed_for, due_at };
    }

    /// Cancel the armed timer, if any
    pub fn stop_watching(&mut self) {
        if self.is_watching() {
            debug!("Disarmed expiration timer");
        }
        self.state = SchedulerState::Idle;
    }

    /// How long until the armed timer fires, never negative
    pub fn time_until_fire(&self, now: DateTime<Utc>) -> Option<Duration> {
        match self.state {
            SchedulerState::Idle => None,
            SchedulerState::Watching { due_at, .. } => Some(delay_until(due_at, now)),
        }
    }
}

fn delay_until(due_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (due_at - now).to_std().unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 12, hour, minute, 0).unwrap()
    }

    fn reminder(id: ReminderId, due: DateTime<Utc>, is_expired: bool) -> Reminder {
        Reminder {
            id,
            message: format!("Task {}", id),
            time_stamp: due,
            is_expired,
        }
    }

    #[test]
    fn test_arms_for_earliest_unexpired() {
        let list = vec![
            reminder(1, at(18, 0), false),
            reminder(2, at(15, 0), true),
            reminder(3, at(17, 0), false),
        ];
        let mut scheduler = ExpirationScheduler::new();
        let state = scheduler.start_watching(&list, at(16, 0));
        assert_eq!(
            state,
            SchedulerState::Watching {
                armed_for: 3,
                due_at: at(17, 0)
            }
        );
        assert_eq!(
            scheduler.time_until_fire(at(16, 0)),
            Some(Duration::from_secs(3600))
        );
    }

    #[test]
    fn test_ties_go_to_older_reminder() {
        let list = vec![reminder(4, at(17, 0), false), reminder(2, at(17, 0), false)];
        let mut scheduler = ExpirationScheduler::new();
        scheduler.start_watching(&list, at(16, 0));
        assert!(matches!(scheduler.state(), SchedulerState::Watching { armed_for: 2, .. }));
    }

    #[test]
    fn test_overdue_fires_immediately() {
        let list = vec![reminder(1, at(15, 0), false)];
        let mut scheduler = ExpirationScheduler::new();
        scheduler.start_watching(&list, at(16, 0));
        assert_eq!(scheduler.time_until_fire(at(16, 0)), Some(Duration::ZERO));
    }

    #[test]
    fn test_nothing_to_watch_stays_idle() {
        let mut scheduler = ExpirationScheduler::new();
        assert_eq!(scheduler.start_watching(&[], at(16, 0)), SchedulerState::Idle);

        let all_expired = vec![reminder(1, at(15, 0), true)];
        assert!(!ExpirationScheduler::should_watch(&all_expired));
        assert_eq!(
            scheduler.start_watching(&all_expired, at(16, 0)),
            SchedulerState::Idle
        );
        assert_eq!(scheduler.time_until_fire(at(16, 0)), None);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let list = vec![reminder(1, at(17, 0), false)];
        let mut scheduler = ExpirationScheduler::new();
        scheduler.start_watching(&list, at(16, 0));
        scheduler.stop_watching();
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        scheduler.stop_watching();
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[test]
    fn test_collect_due_includes_every_missed_reminder() {
        let list = vec![
            reminder(1, at(16, 30), false),
            reminder(2, at(17, 0), false),
            reminder(3, at(16, 0), true),
            reminder(4, at(19, 0), false),
        ];
        assert_eq!(ExpirationScheduler::collect_due(&list, at(17, 0)), vec![1, 2]);
        assert!(ExpirationScheduler::collect_due(&list, at(16, 29)).is_empty());
    }

    #[test]
    fn test_rearm_replaces_previous_timer() {
        let mut list = vec![reminder(1, at(18, 0), false)];
        let mut scheduler = ExpirationScheduler::new();
        scheduler.start_watching(&list, at(16, 0));

        list.push(reminder(2, at(17, 0), false));
        scheduler.start_watching(&list, at(16, 0));
        assert_eq!(
            scheduler.state(),
            SchedulerState::Watching {
                armed_for: 2,
                due_at: at(17, 0)
            }
        );
    }
}
