//! Maps remote wire records into store rows.
//!
//! Records without an id or a name are rejected (`None`); the caller counts
//! them as skipped.

use crate::jellyfin::{ActivityLogEntry, RemoteItem, RemoteLibrary, RemoteUser};
use crate::store::{NewItem, NewLibrary, NewUser, PlaybackEvent};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;

/// Collection types mirrored by the sync. Everything else (playlists, music,
/// boxsets...) is ignored.
pub const MEDIA_COLLECTION_TYPES: [&str; 2] = ["movies", "tvshows"];

/// Activity log entry types that represent a finished playback. Audio
/// playback is outside the mirrored collections.
pub const PLAYBACK_STOP_TYPES: [&str; 1] = ["VideoPlaybackStopped"];

const TICKS_PER_SECOND: i64 = 10_000_000;
/// Epoch values above this are milliseconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 1e12;

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn map_user(remote: &RemoteUser) -> Option<NewUser> {
    Some(NewUser {
        jellyfin_id: non_empty(remote.id.as_deref())?,
        name: non_empty(remote.name.as_deref())?,
        is_admin: remote
            .policy
            .as_ref()
            .map(|p| p.is_administrator)
            .unwrap_or(false),
    })
}

pub fn library_collection_type(remote: &RemoteLibrary) -> Option<String> {
    non_empty(remote.collection_type.as_deref()).or_else(|| non_empty(remote.kind.as_deref()))
}

pub fn is_media_collection(collection_type: Option<&str>) -> bool {
    collection_type.is_some_and(|kind| {
        MEDIA_COLLECTION_TYPES
            .iter()
            .any(|media| media.eq_ignore_ascii_case(kind))
    })
}

pub fn map_library(remote: &RemoteLibrary) -> Option<NewLibrary> {
    let jellyfin_id = non_empty(remote.id.as_deref())?;
    let name = non_empty(remote.name.as_deref()).or_else(|| non_empty(remote.path.as_deref()))?;
    let image_url = remote
        .image_tags
        .as_ref()
        .and_then(|tags| non_empty(tags.primary.as_deref()))
        .map(|tag| {
            format!(
                "/Items/{}/Images/Primary?tag={}",
                jellyfin_id,
                urlencoding::encode(&tag)
            )
        });
    Some(NewLibrary {
        collection_type: library_collection_type(remote),
        jellyfin_id,
        name,
        image_url,
    })
}

pub fn map_item(remote: &RemoteItem) -> Option<NewItem> {
    let size_bytes = remote
        .media_sources
        .as_ref()
        .filter(|sources| !sources.is_empty())
        .map(|sources| sources.iter().filter_map(|s| s.size).sum());
    Some(NewItem {
        jellyfin_id: non_empty(remote.id.as_deref())?,
        name: non_empty(remote.name.as_deref())?,
        parent_id: non_empty(remote.parent_id.as_deref()),
        item_type: non_empty(remote.kind.as_deref())
            .or_else(|| non_empty(remote.media_type.as_deref())),
        runtime_seconds: remote.run_time_ticks.map(|ticks| ticks / TICKS_PER_SECOND),
        size_bytes,
        date_created: remote.date_created.as_deref().and_then(parse_datetime),
    })
}

pub fn is_playback_stop(entry: &ActivityLogEntry) -> bool {
    entry
        .kind
        .as_deref()
        .is_some_and(|kind| PLAYBACK_STOP_TYPES.contains(&kind))
}

fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    // Zone-less timestamps are UTC.
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn epoch_seconds(value: f64) -> Option<i64> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    let seconds = if value > EPOCH_MILLIS_THRESHOLD {
        value / 1000.0
    } else {
        value
    };
    Some(seconds as i64)
}

/// Accepts RFC 3339 (with or without zone), epoch seconds, or epoch
/// milliseconds, as a JSON string or number.
pub fn parse_event_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_f64().and_then(epoch_seconds),
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(number) => epoch_seconds(number),
            Err(_) => parse_datetime(s).map(|dt| dt.timestamp()),
        },
        _ => None,
    }
}

/// Builds a playback row from a playback-stop entry. `usernames` maps user
/// external ids to display names.
pub fn map_event(
    entry: &ActivityLogEntry,
    usernames: &HashMap<String, String>,
) -> Option<PlaybackEvent> {
    let user_id = non_empty(entry.user_id.as_deref())?;
    Some(PlaybackEvent {
        activity_log_id: entry.id?,
        item_id: non_empty(entry.item_id.as_deref())?,
        event_name: non_empty(entry.name.as_deref()),
        event_overview: non_empty(entry.short_overview.as_deref())
            .or_else(|| non_empty(entry.overview.as_deref())),
        activity_at: entry.date.as_ref().and_then(parse_event_timestamp)?,
        username: usernames.get(&user_id).cloned(),
        user_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jellyfin::{ImageTags, MediaSource, UserPolicy};
    use serde_json::json;

    fn entry(kind: &str, date: Value) -> ActivityLogEntry {
        ActivityLogEntry {
            id: Some(10),
            name: Some("Alice stopped Alpha".to_string()),
            short_overview: Some("on TV".to_string()),
            kind: Some(kind.to_string()),
            item_id: Some("item-1".to_string()),
            user_id: Some("u1".to_string()),
            date: Some(date),
            ..Default::default()
        }
    }

    #[test]
    fn users_require_id_and_name() {
        let admin = RemoteUser {
            id: Some("u1".into()),
            name: Some("Root".into()),
            policy: Some(UserPolicy {
                is_administrator: true,
                ..Default::default()
            }),
        };
        assert!(map_user(&admin).unwrap().is_admin);

        let nameless = RemoteUser {
            id: Some("u2".into()),
            name: Some("  ".into()),
            policy: None,
        };
        assert!(map_user(&nameless).is_none());
        assert!(map_user(&RemoteUser::default()).is_none());
    }

    #[test]
    fn library_falls_back_to_path_and_type() {
        let remote = RemoteLibrary {
            id: Some("lib1".into()),
            path: Some("/media/movies".into()),
            kind: Some("movies".into()),
            image_tags: Some(ImageTags {
                primary: Some("abc".into()),
            }),
            ..Default::default()
        };
        let library = map_library(&remote).unwrap();
        assert_eq!(library.name, "/media/movies");
        assert_eq!(library.collection_type.as_deref(), Some("movies"));
        assert_eq!(
            library.image_url.as_deref(),
            Some("/Items/lib1/Images/Primary?tag=abc")
        );
    }

    #[test]
    fn media_collection_filter() {
        assert!(is_media_collection(Some("movies")));
        assert!(is_media_collection(Some("TvShows")));
        assert!(!is_media_collection(Some("playlists")));
        assert!(!is_media_collection(Some("mini series")));
        assert!(!is_media_collection(None));
    }

    #[test]
    fn item_converts_ticks_and_sizes() {
        let remote = RemoteItem {
            id: Some("i1".into()),
            name: Some("Alpha".into()),
            media_type: Some("Video".into()),
            run_time_ticks: Some(72_000_000_000),
            media_sources: Some(vec![
                MediaSource { size: Some(100) },
                MediaSource { size: None },
                MediaSource { size: Some(50) },
            ]),
            date_created: Some("2023-04-01T12:00:00.0000000Z".into()),
            ..Default::default()
        };
        let item = map_item(&remote).unwrap();
        assert_eq!(item.runtime_seconds, Some(7200));
        assert_eq!(item.size_bytes, Some(150));
        assert_eq!(item.item_type.as_deref(), Some("Video"));
        assert_eq!(item.date_created.unwrap().timestamp(), 1_680_350_400);

        let bare = RemoteItem {
            id: Some("i2".into()),
            name: Some("Beta".into()),
            ..Default::default()
        };
        let item = map_item(&bare).unwrap();
        assert_eq!(item.runtime_seconds, None);
        assert_eq!(item.size_bytes, None);
    }

    #[test]
    fn event_timestamps_in_every_shape() {
        assert_eq!(parse_event_timestamp(&json!("2024-01-01T00:00:00Z")), Some(1_704_067_200));
        assert_eq!(
            parse_event_timestamp(&json!("2024-01-01T00:00:00.1234567Z")),
            Some(1_704_067_200)
        );
        assert_eq!(parse_event_timestamp(&json!("2024-01-01T00:00:00")), Some(1_704_067_200));
        assert_eq!(parse_event_timestamp(&json!(1_704_067_200)), Some(1_704_067_200));
        assert_eq!(parse_event_timestamp(&json!(1_704_067_200_000i64)), Some(1_704_067_200));
        assert_eq!(parse_event_timestamp(&json!("1704067200")), Some(1_704_067_200));
        assert_eq!(parse_event_timestamp(&json!("yesterday")), None);
        assert_eq!(parse_event_timestamp(&json!(null)), None);
    }

    #[test]
    fn events_map_with_username_lookup() {
        let usernames = HashMap::from([("u1".to_string(), "Alice".to_string())]);
        let e = entry("VideoPlaybackStopped", json!("2024-01-01T00:00:00Z"));
        assert!(is_playback_stop(&e));

        let event = map_event(&e, &usernames).unwrap();
        assert_eq!(event.activity_log_id, 10);
        assert_eq!(event.username.as_deref(), Some("Alice"));
        assert_eq!(event.event_overview.as_deref(), Some("on TV"));
        assert_eq!(event.activity_at, 1_704_067_200);
    }

    #[test]
    fn events_without_usable_fields_are_skipped() {
        let usernames = HashMap::new();
        let bad_date = entry("VideoPlaybackStopped", json!("not a date"));
        assert!(map_event(&bad_date, &usernames).is_none());

        let mut no_item = entry("VideoPlaybackStopped", json!(1_704_067_200));
        no_item.item_id = None;
        assert!(map_event(&no_item, &usernames).is_none());

        let started = entry("VideoPlayback", json!(1_704_067_200));
        assert!(!is_playback_stop(&started));
    }

    #[test]
    fn only_video_playback_stops_count() {
        assert!(is_playback_stop(&entry("VideoPlaybackStopped", json!(1_704_067_200))));
        assert!(!is_playback_stop(&entry("AudioPlaybackStopped", json!(1_704_067_200))));
    }
}
