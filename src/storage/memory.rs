use super::PersistentStore;
use crate::error::{AppError, AppResult};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// In-memory store with switchable write failures
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<String, Value>>,
    fail_writes: AtomicBool,
    failing_key: Mutex<Option<String>>,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `set` fail until switched back
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make writes to one key fail, leaving other keys writable
    pub fn set_failing_key(&self, key: Option<&str>) {
        *self.failing_key.lock().unwrap_or_else(|e| e.into_inner()) = key.map(str::to_owned);
    }

    /// Number of successful writes so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl PersistentStore for MemoryStore {
    fn get(&self, key: &str) -> AppResult<Option<Value>> {
        let data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        Ok(data.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> AppResult<()> {
        let key_fails = self
            .failing_key
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_deref()
            == Some(key);
        if key_fails || self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::persistence(format!("write to '{}' rejected", key)));
        }
        let mut data = self.data.lock().unwrap_or_else(|e| e.into_inner());
        data.insert(key.to_string(), value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
