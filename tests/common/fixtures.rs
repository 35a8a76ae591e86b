//! Records served by the fake media server, in the server's wire format.

use super::constants::*;
use serde_json::{json, Value};
use std::collections::HashMap;

pub fn movie_id(index: usize) -> String {
    format!("movie-{:04}", index)
}

pub fn user_fixtures() -> Vec<Value> {
    vec![
        json!({"Id": ALICE_ID, "Name": "Alice", "Policy": {"IsAdministrator": true}}),
        json!({"Id": BOB_ID, "Name": "Bob", "Policy": {"IsAdministrator": false}}),
        // Nameless records are skipped but still count as present remotely.
        json!({"Id": "user-ghost"}),
    ]
}

pub fn library_fixtures() -> Vec<Value> {
    vec![
        json!({
            "Id": MOVIES_LIBRARY_ID,
            "Name": "Movies",
            "CollectionType": "movies",
            "ImageTags": {"Primary": "tag-movies"}
        }),
        json!({"Id": SHOWS_LIBRARY_ID, "Name": "Shows", "CollectionType": "tvshows"}),
        json!({"Id": PLAYLISTS_LIBRARY_ID, "Name": "Playlists", "CollectionType": "playlists"}),
        json!({"Id": MINI_SERIES_LIBRARY_ID, "Name": "Minis", "CollectionType": "mini series"}),
    ]
}

pub fn item_fixtures() -> HashMap<String, Vec<Value>> {
    let movies = (0..MOVIE_COUNT)
        .map(|i| {
            json!({
                "Id": movie_id(i),
                "Name": format!("Movie {}", i),
                "Type": "Movie",
                "RunTimeTicks": 54_000_000_000i64,
                "MediaSources": [{"Size": 1_000_000}],
                "DateCreated": "2023-06-01T00:00:00.0000000Z"
            })
        })
        .collect();
    let shows = vec![
        json!({"Id": SERIES_ID, "Name": "The Show", "Type": "Series"}),
        json!({
            "Id": EPISODE_1_ID,
            "Name": "Pilot",
            "Type": "Episode",
            "ParentId": SERIES_ID,
            "RunTimeTicks": 18_000_000_000i64
        }),
        json!({
            "Id": EPISODE_2_ID,
            "Name": "Second",
            "Type": "Episode",
            "ParentId": SERIES_ID,
            "RunTimeTicks": 18_000_000_000i64
        }),
    ];

    HashMap::from([
        (MOVIES_LIBRARY_ID.to_string(), movies),
        (SHOWS_LIBRARY_ID.to_string(), shows),
        (PLAYLISTS_LIBRARY_ID.to_string(), vec![]),
    ])
}

pub fn activity_entry(id: i64, kind: &str, user_id: &str, item_id: &str, date: &str) -> Value {
    json!({
        "Id": id,
        "Name": format!("{} {} {}", user_id, kind, item_id),
        "Type": kind,
        "UserId": user_id,
        "ItemId": item_id,
        "Date": date,
        "Severity": "Information"
    })
}

/// Newest first, like the real activity log.
pub fn activity_fixtures() -> Vec<Value> {
    vec![
        activity_entry(5, "VideoPlaybackStopped", BOB_ID, &movie_id(1), "2024-01-03T12:30:00.1234567Z"),
        activity_entry(4, "VideoPlaybackStopped", ALICE_ID, EPISODE_1_ID, "2024-01-03T12:00:00Z"),
        activity_entry(3, "VideoPlaybackStopped", BOB_ID, &movie_id(0), "2024-01-02T10:00:00Z"),
        activity_entry(2, "SessionStarted", ALICE_ID, "", "2024-01-01T09:59:00Z"),
        activity_entry(1, "VideoPlaybackStopped", ALICE_ID, &movie_id(0), "2024-01-01T10:00:00Z"),
    ]
}
