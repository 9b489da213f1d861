use crate::clock::Clock;
use crate::config::{PERSIST_RETRY_SECS, WELCOME_DELAY_SECS, WELCOME_MESSAGE_TEXT};
use crate::error::{AppError, AppResult};
use crate::protocol::{ChangeCause, UiEvent};
use crate::reminder::{Reminder, ReminderId, Selector};
use crate::repository::ReminderRepository;
use crate::scheduler::{ExpirationScheduler, SchedulerState};
use crate::settings::{Settings, SettingsStore};
use crate::storage::PersistentStore;
use crate::timeparse::parse_time_expression;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Command surface the UI talks to.
///
/// Owns the repository, the scheduler state and the settings. Every
/// mutation is persisted before the matching event goes out, and every
/// mutation re-arms the single expiration timer from the wall clock.
pub struct NotificationFacade {
    repository: ReminderRepository,
    scheduler: ExpirationScheduler,
    settings: SettingsStore,
    clock: Arc<dyn Clock>,
    events: mpsc::UnboundedSender<UiEvent>,
}

impl NotificationFacade {
    pub fn new(
        store: Arc<dyn PersistentStore>,
        clock: Arc<dyn Clock>,
        events: mpsc::UnboundedSender<UiEvent>,
    ) -> Self {
        Self {
            repository: ReminderRepository::new(store.clone()),
            scheduler: ExpirationScheduler::new(),
            settings: SettingsStore::new(store),
            clock,
            events,
        }
    }

    /// Load reminders and settings, then publish the initial list
    pub fn initialize(&mut self) -> AppResult<()> {
        self.repository.initialize()?;
        self.settings.initialize()?;
        self.emit_changed(ChangeCause::Loaded);
        Ok(())
    }

    pub fn add(&mut self, message: &str, time: &str) -> AppResult<Reminder> {
        let now = self.clock.now();
        let result = parse_time_expression(time, &now)
            .and_then(|due| self.repository.add(message, due, now.with_timezone(&Utc)));

        match result {
            Ok(reminder) => {
                self.after_mutation(ChangeCause::Added);
                Ok(reminder)
            }
            Err(e) => {
                warn!(error = %e, time, "Add failed");
                self.emit(UiEvent::AddFailed { reason: e.clone() });
                Err(e)
            }
        }
    }

    pub fn repeat(&mut self, selector: Selector, time: &str) -> AppResult<Vec<ReminderId>> {
        let now = self.clock.now();
        let result = parse_time_expression(time, &now)
            .and_then(|due| self.repository.repeat(selector, due, now.with_timezone(&Utc)));

        match result {
            Ok(ids) => {
                self.after_mutation(ChangeCause::Repeated);
                Ok(ids)
            }
            Err(e) => {
                warn!(error = %e, %selector, time, "Repeat failed");
                self.emit(UiEvent::RepeatFailed { reason: e.clone() });
                Err(e)
            }
        }
    }

    /// Delete what `selector` points at. A stale selector still republishes
    /// the list so the UI can catch up.
    pub fn delete(&mut self, selector: Selector) -> AppResult<Vec<ReminderId>> {
        match self.repository.delete(selector) {
            Ok(ids) => {
                self.after_mutation(ChangeCause::Deleted);
                Ok(ids)
            }
            Err(e) => {
                error!(error = %e, %selector, "Delete failed");
                Err(e)
            }
        }
    }

    /// Inject the welcome reminder once, on first launch.
    ///
    /// The reminder and the consumed flag land together: if the flag cannot
    /// be written the reminder is taken back out, so the next launch retries
    /// instead of showing it twice.
    pub fn welcome_message(&mut self) -> AppResult<Option<Reminder>> {
        if !self.settings.welcome_message_pending() {
            return Ok(None);
        }

        let now = self.clock.now().with_timezone(&Utc);
        let due = now + Duration::seconds(WELCOME_DELAY_SECS);
        let reminder = self.repository.add(WELCOME_MESSAGE_TEXT, due, now)?;

        if let Err(e) = self.settings.consume_welcome_message() {
            // Most recent position is the reminder just added
            if let Err(undo) = self.repository.delete(Selector::Position(0)) {
                error!(error = %undo, id = reminder.id, "Failed to take back welcome reminder");
                self.after_mutation(ChangeCause::Added);
            }
            return Err(e);
        }

        self.after_mutation(ChangeCause::Added);
        info!(id = reminder.id, "Added welcome reminder");
        Ok(Some(reminder))
    }

    /// Deliver the failure event for an add or repeat that never decoded
    pub fn reject(&self, event: UiEvent) {
        warn!(?event, "Rejected undecodable command");
        self.emit(event);
    }

    pub fn should_watch(&self) -> bool {
        ExpirationScheduler::should_watch(self.repository.snapshot())
    }

    /// Expire whatever the wall clock says is due, then arm for the next
    /// pending reminder or go idle.
    pub fn start_watching(&mut self) -> AppResult<()> {
        if self.checkpoint()? {
            self.emit_changed(ChangeCause::Expired);
        }
        Ok(())
    }

    pub fn stop_watching(&mut self) {
        self.scheduler.stop_watching();
    }

    /// The armed timer went off
    pub fn on_timer_fired(&mut self) -> AppResult<()> {
        let now = self.now_utc();
        if ExpirationScheduler::collect_due(self.repository.snapshot(), now).is_empty() {
            let err = AppError::inconsistency(format!(
                "timer fired at {} with nothing due (state {:?})",
                now,
                self.scheduler.state()
            ));
            warn!(error = %err, "Recomputing from the wall clock");
        }
        self.start_watching()
    }

    /// Host woke up; never trust a timer that may have been suspended
    pub fn resume(&mut self) -> AppResult<()> {
        info!("Resume checkpoint");
        self.start_watching()
    }

    pub fn set_dark_mode(&mut self, on: bool) -> AppResult<()> {
        self.settings.set_dark_mode(on)?;
        info!(on, "Dark mode changed");
        Ok(())
    }

    pub fn set_launch_at_start(&mut self, on: bool) -> AppResult<()> {
        self.settings.set_launch_at_start(on)?;
        info!(on, "Launch at start changed");
        Ok(())
    }

    pub fn snapshot(&self) -> &[Reminder] {
        self.repository.snapshot()
    }

    pub fn settings(&self) -> Settings {
        self.settings.settings()
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn is_watching(&self) -> bool {
        self.scheduler.is_watching()
    }

    /// Delay until the armed timer should fire, by the wall clock
    pub fn time_until_fire(&self) -> Option<std::time::Duration> {
        self.scheduler.time_until_fire(self.now_utc())
    }

    /// Mark everything due as expired and re-arm. Returns whether anything expired.
    ///
    /// When the write fails the timer is re-armed for a retry instead.
    fn checkpoint(&mut self) -> AppResult<bool> {
        let now = self.now_utc();
        let due = ExpirationScheduler::collect_due(self.repository.snapshot(), now);

        let mut expired = 0;
        if let Some(&first) = due.first() {
            match self.repository.mark_expired(&due) {
                Ok(count) => expired = count,
                Err(e) => {
                    error!(error = %e, count = due.len(), "Failed to persist expiration");
                    self.scheduler
                        .arm_at(first, now + Duration::seconds(PERSIST_RETRY_SECS));
                    return Err(e);
                }
            }
            info!(count = expired, "Reminders expired");
        }

        if self.should_watch() {
            self.scheduler.start_watching(self.repository.snapshot(), now);
        } else {
            self.scheduler.stop_watching();
        }
        Ok(expired > 0)
    }

    fn after_mutation(&mut self, cause: ChangeCause) {
        if let Err(e) = self.checkpoint() {
            error!(error = %e, "Checkpoint after mutation failed");
        }
        self.emit_changed(cause);
    }

    fn emit_changed(&self, cause: ChangeCause) {
        self.emit(UiEvent::RemindersChanged {
            cause,
            reminders: self.repository.display_order(),
        });
    }

    fn emit(&self, event: UiEvent) {
        if self.events.send(event).is_err() {
            debug!("No UI listening, event dropped");
        }
    }

    fn now_utc(&self) -> DateTime<Utc> {
        self.clock.now().with_timezone(&Utc)
    }
}
