use crate::config::{NOTIFICATIONS_KEY, SETTINGS_KEY};
use crate::settings::Settings;
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Top-level keys the first-generation layout used for settings
const LEGACY_SETTING_KEYS: [&str; 3] = ["launchAtStart", "darkModeOn", "welcomeMessage"];

/// Flat settings keys present and no settings record
fn is_legacy_layout(map: &Map<String, Value>) -> bool {
    !map.contains_key(SETTINGS_KEY) && LEGACY_SETTING_KEYS.iter().any(|k| map.contains_key(*k))
}

/// Try to parse content as the legacy layout and migrate it if so.
///
/// Flat settings keys are folded into one settings record and reminders,
/// which were addressed by position, get unique ids in insertion order.
pub fn try_migrate_legacy_data(content: &str, backup_path: Option<&Path>) -> Option<Map<String, Value>> {
    let Ok(Value::Object(mut map)) = serde_json::from_str::<Value>(content) else {
        return None;
    };
    if !is_legacy_layout(&map) {
        return None;
    }

    info!("Detected legacy store layout, migrating");

    if let Some(backup) = backup_path {
        if let Err(e) = fs::write(backup, content) {
            warn!(error = %e, "Failed to create backup of legacy store");
        } else {
            info!(path = %backup.display(), "Created backup of legacy store");
        }
    }

    let mut flat = Map::new();
    for key in LEGACY_SETTING_KEYS {
        if let Some(value) = map.remove(key) {
            flat.insert(key.to_string(), value);
        }
    }
    let settings: Settings = serde_json::from_value(Value::Object(flat)).unwrap_or_else(|e| {
        warn!(error = %e, "Unreadable legacy settings, using defaults");
        Settings::default()
    });
    map.insert(SETTINGS_KEY.to_string(), serde_json::to_value(settings).ok()?);

    let mut renumbered = 0;
    if let Some(Value::Array(items)) = map.get_mut(NOTIFICATIONS_KEY) {
        for (idx, item) in items.iter_mut().enumerate() {
            if let Value::Object(reminder) = item {
                reminder.insert("id".to_string(), Value::from(idx as u64 + 1));
                renumbered += 1;
            }
        }
    }

    info!(reminders = renumbered, "Migrated legacy store");
    Some(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_layout_is_not_migrated() {
        let content = json!({
            "notifications": [],
            "settings": {"launchAtStart": true, "darkModeOn": false, "welcomeMessage": true}
        })
        .to_string();
        assert!(try_migrate_legacy_data(&content, None).is_none());
        assert!(try_migrate_legacy_data("not json", None).is_none());
        assert!(try_migrate_legacy_data("[]", None).is_none());
    }

    #[test]
    fn test_settings_are_folded() {
        let content = json!({"launchAtStart": false, "darkModeOn": true}).to_string();
        let migrated = try_migrate_legacy_data(&content, None).unwrap();
        assert_eq!(
            migrated[SETTINGS_KEY],
            json!({"launchAtStart": false, "darkModeOn": true, "welcomeMessage": true})
        );
        assert!(!migrated.contains_key("launchAtStart"));
        assert!(!migrated.contains_key("darkModeOn"));
    }

    #[test]
    fn test_positional_ids_are_renumbered() {
        let content = json!({
            "notifications": [
                {"id": 0, "message": "a", "timeStamp": "2024-06-12T17:00:00Z", "isExpired": false},
                {"id": 0, "message": "b", "timeStamp": "2024-06-12T18:00:00Z", "isExpired": true}
            ],
            "welcomeMessage": false
        })
        .to_string();
        let migrated = try_migrate_legacy_data(&content, None).unwrap();
        let items = migrated[NOTIFICATIONS_KEY].as_array().unwrap();
        assert_eq!(items[0]["id"], 1);
        assert_eq!(items[0]["message"], "a");
        assert_eq!(items[1]["id"], 2);
        assert_eq!(items[1]["isExpired"], true);
    }

    #[test]
    fn test_backup_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let backup = dir.path().join("backup.json");
        let content = json!({"welcomeMessage": true}).to_string();
        try_migrate_legacy_data(&content, Some(backup.as_path())).unwrap();
        assert_eq!(fs::read_to_string(&backup).unwrap(), content);
    }
}
