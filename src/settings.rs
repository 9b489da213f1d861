use crate::config::SETTINGS_KEY;
use crate::error::AppResult;
use crate::storage::{get_typed, set_typed, PersistentStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Process-wide user settings, persisted as one record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub launch_at_start: bool,
    pub dark_mode_on: bool,
    /// One-shot: true until the welcome reminder has been shown
    pub welcome_message: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            launch_at_start: true,
            dark_mode_on: false,
            welcome_message: true,
        }
    }
}

/// Typed access to the persisted settings record
pub struct SettingsStore {
    store: Arc<dyn PersistentStore>,
    current: Settings,
}

impl SettingsStore {
    pub fn new(store: Arc<dyn PersistentStore>) -> Self {
        Self {
            store,
            current: Settings::default(),
        }
    }

    /// Load the record, writing defaults on first launch
    pub fn initialize(&mut self) -> AppResult<()> {
        match get_typed::<Settings>(self.store.as_ref(), SETTINGS_KEY)? {
            Some(settings) => {
                debug!(?settings, "Loaded settings");
                self.current = settings;
            }
            None => {
                let defaults = Settings::default();
                set_typed(self.store.as_ref(), SETTINGS_KEY, &defaults)?;
                info!("Initialized default settings");
                self.current = defaults;
            }
        }
        Ok(())
    }

    pub fn settings(&self) -> Settings {
        self.current
    }

    pub fn launch_at_start(&self) -> bool {
        self.current.launch_at_start
    }

    pub fn dark_mode_on(&self) -> bool {
        self.current.dark_mode_on
    }

    pub fn welcome_message_pending(&self) -> bool {
        self.current.welcome_message
    }

    pub fn set_launch_at_start(&mut self, on: bool) -> AppResult<()> {
        self.update(|s| s.launch_at_start = on)
    }

    pub fn set_dark_mode(&mut self, on: bool) -> AppResult<()> {
        self.update(|s| s.dark_mode_on = on)
    }

    /// Flip the welcome flag off for good
    pub fn consume_welcome_message(&mut self) -> AppResult<()> {
        self.update(|s| s.welcome_message = false)
    }

    fn update(&mut self, change: impl FnOnce(&mut Settings)) -> AppResult<()> {
        let mut next = self.current;
        change(&mut next);
        set_typed(self.store.as_ref(), SETTINGS_KEY, &next)?;
        self.current = next;
        Ok(())
    }
}
