use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable identifier assigned at creation; positions are translated to it per command
pub type ReminderId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub id: ReminderId,
    pub message: String,
    pub time_stamp: DateTime<Utc>,
    #[serde(default)]
    pub is_expired: bool,
}

impl Reminder {
    pub fn new(id: ReminderId, message: String, time_stamp: DateTime<Utc>) -> Self {
        Self {
            id,
            message,
            time_stamp,
            is_expired: false,
        }
    }

    /// Pending and past its time stamp
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired && self.time_stamp <= now
    }
}

/// Addresses reminders the way the UI does.
///
/// Positions count from the most recently added reminder (0) backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawSelector")]
pub enum Selector {
    Position(usize),
    All,
    Expired,
}

impl Selector {
    /// Stable ids the selector points at in `reminders` (insertion order).
    ///
    /// Out-of-range positions resolve to nothing.
    pub fn resolve(&self, reminders: &[Reminder]) -> Vec<ReminderId> {
        match self {
            Selector::Position(pos) => pos
                .checked_add(1)
                .and_then(|n| reminders.len().checked_sub(n))
                .map(|idx| vec![reminders[idx].id])
                .unwrap_or_default(),
            Selector::All => reminders.iter().map(|r| r.id).collect(),
            Selector::Expired => reminders
                .iter()
                .filter(|r| r.is_expired)
                .map(|r| r.id)
                .collect(),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Position(pos) => write!(f, "{}", pos),
            Selector::All => write!(f, "all"),
            Selector::Expired => write!(f, "expired"),
        }
    }
}

impl FromStr for Selector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "all" => Ok(Selector::All),
            "expired" => Ok(Selector::Expired),
            other => other
                .parse::<usize>()
                .map(Selector::Position)
                .map_err(|_| format!("unknown selector '{}'", other)),
        }
    }
}

/// Wire form of a selector: a number or one of the literals
#[derive(Deserialize)]
#[serde(untagged)]
enum RawSelector {
    Index(i64),
    Name(String),
}

impl TryFrom<RawSelector> for Selector {
    type Error = String;

    fn try_from(raw: RawSelector) -> Result<Self, Self::Error> {
        match raw {
            // A stale UI may send -1; it must resolve to nothing rather than fail
            RawSelector::Index(idx) => Ok(Selector::Position(
                usize::try_from(idx).unwrap_or(usize::MAX),
            )),
            RawSelector::Name(name) => name.parse(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_reminder(id: ReminderId, is_expired: bool) -> Reminder {
        Reminder {
            id,
            message: format!("Task {}", id),
            time_stamp: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
            is_expired,
        }
    }

    #[test]
    fn test_is_due() {
        let r = make_reminder(1, false);
        assert!(r.is_due(r.time_stamp));
        assert!(!r.is_due(r.time_stamp - chrono::Duration::seconds(1)));

        let expired = make_reminder(2, true);
        assert!(!expired.is_due(expired.time_stamp));
    }

    #[test]
    fn test_position_counts_from_most_recent() {
        let list = vec![make_reminder(10, false), make_reminder(11, false), make_reminder(12, false)];
        assert_eq!(Selector::Position(0).resolve(&list), vec![12]);
        assert_eq!(Selector::Position(2).resolve(&list), vec![10]);
        assert!(Selector::Position(3).resolve(&list).is_empty());
        assert!(Selector::Position(usize::MAX).resolve(&list).is_empty());
    }

    #[test]
    fn test_all_and_expired() {
        let list = vec![make_reminder(1, true), make_reminder(2, false), make_reminder(3, true)];
        assert_eq!(Selector::All.resolve(&list), vec![1, 2, 3]);
        assert_eq!(Selector::Expired.resolve(&list), vec![1, 3]);
    }

    #[test]
    fn test_selector_from_json() {
        let s: Selector = serde_json::from_str("2").unwrap();
        assert_eq!(s, Selector::Position(2));
        let s: Selector = serde_json::from_str("\"all\"").unwrap();
        assert_eq!(s, Selector::All);
        let s: Selector = serde_json::from_str("\"expired\"").unwrap();
        assert_eq!(s, Selector::Expired);
        let s: Selector = serde_json::from_str("-1").unwrap();
        assert!(s.resolve(&[make_reminder(1, false)]).is_empty());
        assert!(serde_json::from_str::<Selector>("\"newest\"").is_err());
    }

    #[test]
    fn test_persisted_field_names() {
        let json = serde_json::to_value(make_reminder(7, true)).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["isExpired"], true);
        assert!(json["timeStamp"].is_string());
    }

    #[test]
    fn test_accepts_millisecond_timestamps() {
        let r: Reminder = serde_json::from_str(
            r#"{"id":1,"message":"buy milk","timeStamp":"2024-05-01T17:00:00.000Z"}"#,
        )
        .unwrap();
        assert!(!r.is_expired);
        assert_eq!(r.time_stamp, Utc.with_ymd_and_hms(2024, 5, 1, 17, 0, 0).unwrap());
    }
}
