//! Recomputes the denormalized play counters from raw playback rows.
//!
//! Every statement only writes rows whose value actually changes, so running
//! a refresh twice in a row reports zero updates the second time.

use super::models::{Library, LibraryStats, StatsRefresh, TopItem, TopUser};
use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension};

pub fn refresh_item_play_counts(conn: &Connection) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE items SET play_count = counts.plays
         FROM (SELECT item_id, COUNT(*) AS plays FROM playback_activity GROUP BY item_id) AS counts
         WHERE items.jellyfin_id = counts.item_id AND items.play_count != counts.plays",
        [],
    )?;
    Ok(changed)
}

pub fn refresh_user_play_counts(conn: &Connection) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE users SET total_plays = counts.plays
         FROM (SELECT user_id, COUNT(*) AS plays FROM playback_activity GROUP BY user_id) AS counts
         WHERE users.jellyfin_id = counts.user_id AND users.total_plays != counts.plays",
        [],
    )?;
    Ok(changed)
}

/// Rolls item counters up into their library. Archived items do not count.
pub fn refresh_library_rollups(conn: &Connection) -> Result<usize> {
    let mut changed = conn.execute(
        "UPDATE libraries SET
            total_files = agg.files,
            total_time_seconds = agg.runtime,
            size_bytes = agg.size,
            total_playback_seconds = agg.playback,
            total_plays = agg.plays
         FROM (
            SELECT l.id AS library_id,
                   COUNT(i.id) AS files,
                   COALESCE(SUM(i.runtime_seconds), 0) AS runtime,
                   COALESCE(SUM(i.size_bytes), 0) AS size,
                   COALESCE(SUM(COALESCE(i.runtime_seconds, 0) * i.play_count), 0) AS playback,
                   COALESCE(SUM(i.play_count), 0) AS plays
            FROM libraries l
            LEFT JOIN items i ON i.library_id = l.id AND i.archived = 0
            GROUP BY l.id
         ) AS agg
         WHERE libraries.id = agg.library_id
           AND (libraries.total_files != agg.files
                OR libraries.total_time_seconds != agg.runtime
                OR libraries.size_bytes != agg.size
                OR libraries.total_playback_seconds != agg.playback
                OR libraries.total_plays != agg.plays)",
        [],
    )?;

    // SQLite takes bare columns from the row that produced MAX().
    changed += conn.execute(
        "UPDATE libraries SET last_played_item_name = latest.name
         FROM (
            SELECT i.library_id AS library_id, i.name AS name, MAX(p.activity_at) AS played_at
            FROM playback_activity p
            JOIN items i ON i.jellyfin_id = p.item_id
            GROUP BY i.library_id
         ) AS latest
         WHERE libraries.id = latest.library_id
           AND libraries.last_played_item_name IS NOT latest.name",
        [],
    )?;
    Ok(changed)
}

pub fn refresh_all(conn: &Connection) -> Result<StatsRefresh> {
    // Items first: library rollups read item play counts.
    let items_updated = refresh_item_play_counts(conn)?;
    let users_updated = refresh_user_play_counts(conn)?;
    let libraries_updated = refresh_library_rollups(conn)?;
    Ok(StatsRefresh {
        items_updated,
        users_updated,
        libraries_updated,
    })
}

pub fn top_items_by_plays(conn: &Connection, limit: usize) -> Result<Vec<TopItem>> {
    let mut stmt = conn.prepare_cached(
        "SELECT i.jellyfin_id, i.name, i.item_type, l.name, i.play_count
         FROM items i JOIN libraries l ON l.id = i.library_id
         WHERE i.archived = 0 AND i.play_count > 0
         ORDER BY i.play_count DESC, i.name ASC
         LIMIT ?1",
    )?;
    let rows = stmt
        .query_map(params![limit as i64], |row| {
            Ok(TopItem {
                jellyfin_id: row.get(0)?,
                name: row.get(1)?,
                item_type: row.get(2)?,
                library_name: row.get(3)?,
                play_count: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn top_users_by_plays(conn: &Connection, limit: usize) -> Result<Vec<TopUser>> {
    let mut stmt = conn.prepare_cached(
        "SELECT jellyfin_id, name, total_plays FROM users
         WHERE archived = 0 AND total_plays > 0
         ORDER BY total_plays DESC, name ASC
         LIMIT ?1",
    )?;
    let rows = stmt
        .query_map(params![limit as i64], |row| {
            Ok(TopUser {
                jellyfin_id: row.get(0)?,
                name: row.get(1)?,
                total_plays: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn library_stats(conn: &Connection, library: Library) -> Result<LibraryStats> {
    let (item_count, movie_count, series_count, episode_count) = conn
        .query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(item_type = 'Movie'), 0),
                    COALESCE(SUM(item_type = 'Series'), 0),
                    COALESCE(SUM(item_type = 'Episode'), 0)
             FROM items WHERE library_id = ?1 AND archived = 0",
            params![library.id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .optional()?
        .unwrap_or((0, 0, 0, 0));
    Ok(LibraryStats {
        library,
        item_count,
        movie_count,
        series_count,
        episode_count,
    })
}
