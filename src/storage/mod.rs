mod legacy;
mod local;
mod memory;

use crate::error::AppResult;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub use local::LocalStore;
pub use memory::MemoryStore;

/// Durable key/value map that survives process restarts.
///
/// A `set` either lands completely or fails; callers never observe a
/// partially written value. Writes to different keys are independent.
pub trait PersistentStore: Send + Sync {
    fn get(&self, key: &str) -> AppResult<Option<Value>>;

    fn set(&self, key: &str, value: Value) -> AppResult<()>;
}

/// Read `key` and decode it into `T`
pub fn get_typed<T: DeserializeOwned>(store: &dyn PersistentStore, key: &str) -> AppResult<Option<T>> {
    match store.get(key)? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Encode `value` and write it under `key`
pub fn set_typed<T: Serialize + ?Sized>(store: &dyn PersistentStore, key: &str, value: &T) -> AppResult<()> {
    store.set(key, serde_json::to_value(value)?)
}
