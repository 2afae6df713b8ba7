use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::models::NotificationSettings;

/// Characters of a message shown in a push preview
pub const PREVIEW_CHARS: usize = 100;

/// Daily window during which pushes are suppressed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuietHours {
    pub enabled: bool,
    /// `HH:MM`
    pub start: String,
    /// `HH:MM`
    pub end: String,
    /// Offset of the user's local time from UTC
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

fn parse_hhmm(value: &str) -> Option<u32> {
    let (h, m) = value.trim().split_once(':')?;
    let h: u32 = h.parse().ok()?;
    let m: u32 = m.parse().ok()?;
    (h < 24 && m < 60).then_some(h * 60 + m)
}

impl QuietHours {
    /// Whether `now` falls inside the window in the user's local time
    ///
    /// Windows may wrap midnight. Unparseable bounds never silence anything.
    pub fn is_quiet(&self, now: DateTime<Utc>) -> bool {
        if !self.enabled {
            return false;
        }
        let (Some(start), Some(end)) = (parse_hhmm(&self.start), parse_hhmm(&self.end)) else {
            return false;
        };

        let local = now + Duration::minutes(self.utc_offset_minutes as i64);
        let current = local.hour() * 60 + local.minute();

        if start == end {
            false
        } else if start > end {
            current >= start || current < end
        } else {
            current >= start && current < end
        }
    }
}

/// Whether an offline recipient should get a push for a new message
pub fn should_push_message(settings: &NotificationSettings, now: DateTime<Utc>) -> bool {
    settings.messages
        && !settings
            .quiet_hours
            .as_ref()
            .map(|q| q.is_quiet(now))
            .unwrap_or(false)
}

/// First `PREVIEW_CHARS` characters of a message
pub fn preview(content: &str) -> String {
    content.chars().take(PREVIEW_CHARS).collect()
}
