use crate::config::{MAX_MESSAGE_LEN, NOTIFICATIONS_KEY};
use crate::error::{AppError, AppResult};
use crate::reminder::{Reminder, ReminderId, Selector};
use crate::storage::{get_typed, set_typed, PersistentStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

/// Authoritative in-memory reminder list, mirrored to the store.
///
/// Every mutation is applied to a copy, persisted, and only then swapped
/// in, so a failed write leaves memory exactly as it was.
pub struct ReminderRepository {
    store: Arc<dyn PersistentStore>,
    reminders: Vec<Reminder>,
    next_id: ReminderId,
}

impl ReminderRepository {
    pub fn new(store: Arc<dyn PersistentStore>) -> Self {
        Self {
            store,
            reminders: Vec::new(),
            next_id: 1,
        }
    }

    /// Load the list, creating and persisting an empty one if absent
    pub fn initialize(&mut self) -> AppResult<()> {
        match get_typed::<Vec<Reminder>>(self.store.as_ref(), NOTIFICATIONS_KEY)? {
            Some(reminders) => self.reminders = reminders,
            None => {
                self.commit(Vec::new())?;
                info!("Initialized empty reminder list");
            }
        }
        self.next_id = self.reminders.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        info!(count = self.reminders.len(), "Loaded reminders");
        Ok(())
    }

    /// Insertion order; reverse it for most-recent-first display
    pub fn snapshot(&self) -> &[Reminder] {
        &self.reminders
    }

    pub fn display_order(&self) -> Vec<Reminder> {
        self.reminders.iter().rev().cloned().collect()
    }

    pub fn add(&mut self, message: &str, time_stamp: DateTime<Utc>, now: DateTime<Utc>) -> AppResult<Reminder> {
        let message = validate_message(message)?;
        if time_stamp <= now {
            return Err(AppError::validation("time is not in the future"));
        }

        let reminder = Reminder::new(self.next_id, message, time_stamp);
        let mut next = self.reminders.clone();
        next.push(reminder.clone());
        self.commit(next)?;
        self.next_id += 1;

        info!(id = reminder.id, due_at = %reminder.time_stamp, "Added reminder");
        Ok(reminder)
    }

    /// Remove what `selector` points at. Resolving to nothing is a no-op.
    pub fn delete(&mut self, selector: Selector) -> AppResult<Vec<ReminderId>> {
        let ids = selector.resolve(&self.reminders);
        if ids.is_empty() {
            debug!(%selector, "Delete matched nothing");
            return Ok(ids);
        }

        let next = self
            .reminders
            .iter()
            .filter(|r| !ids.contains(&r.id))
            .cloned()
            .collect();
        self.commit(next)?;

        info!(%selector, count = ids.len(), "Deleted reminders");
        Ok(ids)
    }

    /// Clear the expired flag and move the due time of what `selector` points at
    pub fn repeat(
        &mut self,
        selector: Selector,
        time_stamp: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<ReminderId>> {
        if time_stamp <= now {
            return Err(AppError::validation("time is not in the future"));
        }
        let ids = selector.resolve(&self.reminders);
        if ids.is_empty() {
            return Err(AppError::validation(format!(
                "selector '{}' matches no reminder",
                selector
            )));
        }

        let mut next = self.reminders.clone();
        for reminder in next.iter_mut().filter(|r| ids.contains(&r.id)) {
            reminder.is_expired = false;
            reminder.time_stamp = time_stamp;
        }
        self.commit(next)?;

        info!(%selector, count = ids.len(), due_at = %time_stamp, "Repeated reminders");
        Ok(ids)
    }

    /// Flag the given reminders as expired. Returns how many changed.
    pub fn mark_expired(&mut self, ids: &[ReminderId]) -> AppResult<usize> {
        let mut next = self.reminders.clone();
        let mut changed = 0;
        for reminder in next.iter_mut() {
            if !reminder.is_expired && ids.contains(&reminder.id) {
                reminder.is_expired = true;
                changed += 1;
            }
        }
        if changed == 0 {
            return Ok(0);
        }
        self.commit(next)?;
        Ok(changed)
    }

    fn commit(&mut self, next: Vec<Reminder>) -> AppResult<()> {
        set_typed(self.store.as_ref(), NOTIFICATIONS_KEY, &next)?;
        self.reminders = next;
        Ok(())
    }
}

fn validate_message(message: &str) -> AppResult<String> {
    let message = message.trim();
    if message.is_empty() {
        return Err(AppError::validation("message is empty"));
    }
    let len = message.chars().count();
    if len > MAX_MESSAGE_LEN {
        return Err(AppError::validation(format!(
            "message is {} characters, the limit is {}",
            len, MAX_MESSAGE_LEN
        )));
    }
    Ok(message.to_string())
}
