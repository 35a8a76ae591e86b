use super::models::*;
use super::schema::MEDIA_VERSIONED_SCHEMAS;
use super::stats_aggregator;
use super::Repository;
use crate::sqlite_persistence::{read_schema_version, BASE_DB_VERSION};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

const USER_COLUMNS: &str =
    "id, jellyfin_id, name, is_admin, total_plays, archived, created_at, updated_at";
const LIBRARY_COLUMNS: &str = "id, jellyfin_id, name, collection_type, image_url, tracked, \
     archived, total_plays, total_files, total_time_seconds, size_bytes, \
     total_playback_seconds, last_played_item_name, created_at, updated_at";
const ITEM_COLUMNS: &str = "id, jellyfin_id, library_id, parent_id, name, item_type, play_count, \
     runtime_seconds, size_bytes, date_created, archived, created_at, updated_at";
const EVENT_COLUMNS: &str =
    "activity_log_id, user_id, item_id, event_name, event_overview, activity_at, username";
const TASK_COLUMNS: &str = "id, name, task_type, execution_type, started_at, finished_at, \
     duration_ms, result, log_json";

pub struct SqliteRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRepository {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref();
        let is_new_db = !path.exists();

        let mut conn = Connection::open(path).context("Failed to open media database")?;
        conn.execute("PRAGMA foreign_keys = ON;", [])?;

        if is_new_db {
            info!("Creating new media database at {:?}", path);
            MEDIA_VERSIONED_SCHEMAS
                .last()
                .context("No media schemas defined")?
                .create(&conn)?;
        } else {
            let db_version = read_schema_version(&conn)?;
            if db_version < 1 {
                bail!(
                    "Media database version {} is invalid (expected >= 1)",
                    db_version
                );
            }

            let schema = MEDIA_VERSIONED_SCHEMAS
                .iter()
                .find(|s| s.version as i64 == db_version)
                .with_context(|| format!("Unknown media database version {}", db_version))?;
            schema.validate(&conn).with_context(|| {
                format!(
                    "Media database schema validation failed for version {}",
                    db_version
                )
            })?;

            Self::migrate_if_needed(&mut conn, db_version as usize)?;
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn migrate_if_needed(conn: &mut Connection, from_version: usize) -> Result<()> {
        let pending: Vec<_> = MEDIA_VERSIONED_SCHEMAS
            .iter()
            .filter(|s| s.version > from_version)
            .collect();
        let Some(target) = pending.last().map(|s| s.version) else {
            return Ok(());
        };

        info!(
            "Migrating media database from version {} to {}",
            from_version, target
        );
        let tx = conn.transaction()?;
        for schema in pending {
            if let Some(migration) = schema.migration {
                migration(&tx).with_context(|| {
                    format!("Failed to run migration to version {}", schema.version)
                })?;
            }
        }
        tx.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + target),
            [],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Runs `f` in one transaction. Dropping the transaction on error rolls
    /// it back.
    fn with_transaction<T>(&self, f: impl FnOnce(&Transaction) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let out = f(&tx)?;
        tx.commit()?;
        Ok(out)
    }

    fn format_datetime(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339()
    }

    fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    }

    fn required_datetime(row: &rusqlite::Row, column: &str) -> rusqlite::Result<DateTime<Utc>> {
        let raw: String = row.get(column)?;
        Ok(Self::parse_datetime(&raw).unwrap_or_else(Utc::now))
    }

    fn optional_datetime(
        row: &rusqlite::Row,
        column: &str,
    ) -> rusqlite::Result<Option<DateTime<Utc>>> {
        let raw: Option<String> = row.get(column)?;
        Ok(raw.as_deref().and_then(Self::parse_datetime))
    }

    fn ids_json(ids: &[String]) -> Result<String> {
        serde_json::to_string(ids).context("Failed to encode id list")
    }

    /// Maps the external ids in `ids` that already exist in `table` to their
    /// internal row id.
    fn load_id_map(tx: &Transaction, table: &str, ids: &[String]) -> Result<HashMap<String, i64>> {
        let mut stmt = tx.prepare_cached(&format!(
            "SELECT jellyfin_id, id FROM {} WHERE jellyfin_id IN (SELECT value FROM json_each(?1))",
            table
        ))?;
        let map = stmt
            .query_map(params![Self::ids_json(ids)?], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<rusqlite::Result<HashMap<_, _>>>()?;
        Ok(map)
    }

    fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
        Ok(User {
            id: row.get("id")?,
            jellyfin_id: row.get("jellyfin_id")?,
            name: row.get("name")?,
            is_admin: row.get("is_admin")?,
            total_plays: row.get("total_plays")?,
            archived: row.get("archived")?,
            created_at: Self::required_datetime(row, "created_at")?,
            updated_at: Self::required_datetime(row, "updated_at")?,
        })
    }

    fn row_to_library(row: &rusqlite::Row) -> rusqlite::Result<Library> {
        Ok(Library {
            id: row.get("id")?,
            jellyfin_id: row.get("jellyfin_id")?,
            name: row.get("name")?,
            collection_type: row.get("collection_type")?,
            image_url: row.get("image_url")?,
            tracked: row.get("tracked")?,
            archived: row.get("archived")?,
            total_plays: row.get("total_plays")?,
            total_files: row.get("total_files")?,
            total_time_seconds: row.get("total_time_seconds")?,
            size_bytes: row.get("size_bytes")?,
            total_playback_seconds: row.get("total_playback_seconds")?,
            last_played_item_name: row.get("last_played_item_name")?,
            created_at: Self::required_datetime(row, "created_at")?,
            updated_at: Self::required_datetime(row, "updated_at")?,
        })
    }

    fn row_to_item(row: &rusqlite::Row) -> rusqlite::Result<Item> {
        Ok(Item {
            id: row.get("id")?,
            jellyfin_id: row.get("jellyfin_id")?,
            library_id: row.get("library_id")?,
            parent_id: row.get("parent_id")?,
            name: row.get("name")?,
            item_type: row.get("item_type")?,
            play_count: row.get("play_count")?,
            runtime_seconds: row.get("runtime_seconds")?,
            size_bytes: row.get("size_bytes")?,
            date_created: Self::optional_datetime(row, "date_created")?,
            archived: row.get("archived")?,
            created_at: Self::required_datetime(row, "created_at")?,
            updated_at: Self::required_datetime(row, "updated_at")?,
        })
    }

    fn row_to_event(row: &rusqlite::Row) -> rusqlite::Result<PlaybackEvent> {
        Ok(PlaybackEvent {
            activity_log_id: row.get("activity_log_id")?,
            user_id: row.get("user_id")?,
            item_id: row.get("item_id")?,
            event_name: row.get("event_name")?,
            event_overview: row.get("event_overview")?,
            activity_at: row.get("activity_at")?,
            username: row.get("username")?,
        })
    }

    fn row_to_task_log(row: &rusqlite::Row) -> rusqlite::Result<TaskLog> {
        let execution_type: String = row.get("execution_type")?;
        let result: String = row.get("result")?;
        let log_json: Option<String> = row.get("log_json")?;
        Ok(TaskLog {
            id: row.get("id")?,
            name: row.get("name")?,
            task_type: row.get("task_type")?,
            execution_type: ExecutionType::parse(&execution_type).unwrap_or(ExecutionType::Full),
            started_at: Self::required_datetime(row, "started_at")?,
            finished_at: Self::optional_datetime(row, "finished_at")?,
            duration_ms: row.get("duration_ms")?,
            result: TaskResult::parse(&result).unwrap_or(TaskResult::Failed),
            log: log_json.and_then(|s| serde_json::from_str(&s).ok()),
        })
    }

    fn query_library(conn: &Connection, jellyfin_id: &str) -> Result<Option<Library>> {
        let library = conn
            .query_row(
                &format!("SELECT {} FROM libraries WHERE jellyfin_id = ?1", LIBRARY_COLUMNS),
                params![jellyfin_id],
                Self::row_to_library,
            )
            .optional()?;
        Ok(library)
    }
}

impl Repository for SqliteRepository {
    fn upsert_users(&self, users: &[NewUser]) -> Result<UpsertOutcome> {
        self.with_transaction(|tx| {
            let ids: Vec<String> = users.iter().map(|u| u.jellyfin_id.clone()).collect();
            let mut existing = Self::load_id_map(tx, "users", &ids)?;
            let now = Self::format_datetime(&Utc::now());
            let mut outcome = UpsertOutcome::default();

            let mut insert = tx.prepare_cached(
                "INSERT INTO users (jellyfin_id, name, is_admin, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
            )?;
            let mut update = tx.prepare_cached(
                "UPDATE users SET name = ?2, is_admin = ?3, archived = 0, updated_at = ?4
                 WHERE id = ?1 AND (name != ?2 OR is_admin != ?3 OR archived != 0)",
            )?;

            for user in users {
                match existing.get(&user.jellyfin_id) {
                    Some(&id) => {
                        if update.execute(params![id, user.name, user.is_admin, now])? > 0 {
                            outcome.updated += 1;
                        } else {
                            outcome.unchanged += 1;
                        }
                    }
                    None => {
                        insert.execute(params![user.jellyfin_id, user.name, user.is_admin, now])?;
                        existing.insert(user.jellyfin_id.clone(), tx.last_insert_rowid());
                        outcome.inserted += 1;
                    }
                }
            }
            Ok(outcome)
        })
    }

    fn archive_missing_users(&self, active_ids: &[String]) -> Result<usize> {
        self.with_transaction(|tx| {
            let archived = tx.execute(
                "UPDATE users SET archived = 1, updated_at = ?2
                 WHERE archived = 0 AND jellyfin_id NOT IN (SELECT value FROM json_each(?1))",
                params![
                    Self::ids_json(active_ids)?,
                    Self::format_datetime(&Utc::now())
                ],
            )?;
            Ok(archived)
        })
    }

    fn list_users(&self, include_archived: bool) -> Result<Vec<User>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM users WHERE (?1 OR archived = 0) ORDER BY name, id",
            USER_COLUMNS
        ))?;
        let users = stmt
            .query_map(params![include_archived], Self::row_to_user)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    fn upsert_libraries(
        &self,
        libraries: &[NewLibrary],
        track_new: bool,
    ) -> Result<UpsertOutcome> {
        self.with_transaction(|tx| {
            let ids: Vec<String> = libraries.iter().map(|l| l.jellyfin_id.clone()).collect();
            let mut existing = Self::load_id_map(tx, "libraries", &ids)?;
            let now = Self::format_datetime(&Utc::now());
            let mut outcome = UpsertOutcome::default();

            let mut insert = tx.prepare_cached(
                "INSERT INTO libraries
                    (jellyfin_id, name, collection_type, image_url, tracked, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
            )?;
            let mut update = tx.prepare_cached(
                "UPDATE libraries
                 SET name = ?2, collection_type = ?3, image_url = ?4, archived = 0, updated_at = ?5
                 WHERE id = ?1
                   AND (name != ?2 OR collection_type IS NOT ?3 OR image_url IS NOT ?4
                        OR archived != 0)",
            )?;

            for library in libraries {
                match existing.get(&library.jellyfin_id) {
                    Some(&id) => {
                        let changed = update.execute(params![
                            id,
                            library.name,
                            library.collection_type,
                            library.image_url,
                            now
                        ])?;
                        if changed > 0 {
                            outcome.updated += 1;
                        } else {
                            outcome.unchanged += 1;
                        }
                    }
                    None => {
                        insert.execute(params![
                            library.jellyfin_id,
                            library.name,
                            library.collection_type,
                            library.image_url,
                            track_new,
                            now
                        ])?;
                        existing.insert(library.jellyfin_id.clone(), tx.last_insert_rowid());
                        outcome.inserted += 1;
                    }
                }
            }
            Ok(outcome)
        })
    }

    fn archive_missing_libraries(&self, active_ids: &[String]) -> Result<usize> {
        self.with_transaction(|tx| {
            let archived = tx.execute(
                "UPDATE libraries SET archived = 1, updated_at = ?2
                 WHERE archived = 0 AND jellyfin_id NOT IN (SELECT value FROM json_each(?1))",
                params![
                    Self::ids_json(active_ids)?,
                    Self::format_datetime(&Utc::now())
                ],
            )?;
            Ok(archived)
        })
    }

    fn list_libraries(&self, include_archived: bool) -> Result<Vec<Library>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM libraries WHERE (?1 OR archived = 0) ORDER BY name, id",
            LIBRARY_COLUMNS
        ))?;
        let libraries = stmt
            .query_map(params![include_archived], Self::row_to_library)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(libraries)
    }

    fn get_library(&self, jellyfin_id: &str) -> Result<Option<Library>> {
        let conn = self.conn.lock().unwrap();
        Self::query_library(&conn, jellyfin_id)
    }

    fn set_library_tracked(&self, jellyfin_id: &str, tracked: bool) -> Result<bool> {
        self.with_transaction(|tx| {
            let changed = tx.execute(
                "UPDATE libraries SET tracked = ?2, updated_at = ?3 WHERE jellyfin_id = ?1",
                params![jellyfin_id, tracked, Self::format_datetime(&Utc::now())],
            )?;
            Ok(changed > 0)
        })
    }

    fn upsert_items(&self, library_id: i64, items: &[NewItem]) -> Result<UpsertOutcome> {
        self.with_transaction(|tx| {
            let ids: Vec<String> = items.iter().map(|i| i.jellyfin_id.clone()).collect();
            let mut existing = Self::load_id_map(tx, "items", &ids)?;
            let now = Self::format_datetime(&Utc::now());
            let mut outcome = UpsertOutcome::default();

            let mut insert = tx.prepare_cached(
                "INSERT INTO items
                    (jellyfin_id, library_id, parent_id, name, item_type, runtime_seconds,
                     size_bytes, date_created, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
            )?;
            let mut update = tx.prepare_cached(
                "UPDATE items
                 SET library_id = ?2, parent_id = ?3, name = ?4, item_type = ?5,
                     runtime_seconds = ?6, size_bytes = ?7, date_created = ?8,
                     archived = 0, updated_at = ?9
                 WHERE id = ?1
                   AND (library_id != ?2 OR parent_id IS NOT ?3 OR name != ?4
                        OR item_type IS NOT ?5 OR runtime_seconds IS NOT ?6
                        OR size_bytes IS NOT ?7 OR date_created IS NOT ?8 OR archived != 0)",
            )?;

            for item in items {
                let date_created = item.date_created.as_ref().map(Self::format_datetime);
                match existing.get(&item.jellyfin_id) {
                    Some(&id) => {
                        let changed = update.execute(params![
                            id,
                            library_id,
                            item.parent_id,
                            item.name,
                            item.item_type,
                            item.runtime_seconds,
                            item.size_bytes,
                            date_created,
                            now
                        ])?;
                        if changed > 0 {
                            outcome.updated += 1;
                        } else {
                            outcome.unchanged += 1;
                        }
                    }
                    None => {
                        insert.execute(params![
                            item.jellyfin_id,
                            library_id,
                            item.parent_id,
                            item.name,
                            item.item_type,
                            item.runtime_seconds,
                            item.size_bytes,
                            date_created,
                            now
                        ])?;
                        existing.insert(item.jellyfin_id.clone(), tx.last_insert_rowid());
                        outcome.inserted += 1;
                    }
                }
            }
            debug!(
                "Upserted {} items into library {} ({:?})",
                items.len(),
                library_id,
                outcome
            );
            Ok(outcome)
        })
    }

    fn archive_missing_items(&self, library_id: i64, active_ids: &[String]) -> Result<usize> {
        self.with_transaction(|tx| {
            let archived = tx.execute(
                "UPDATE items SET archived = 1, updated_at = ?3
                 WHERE library_id = ?2 AND archived = 0
                   AND jellyfin_id NOT IN (SELECT value FROM json_each(?1))",
                params![
                    Self::ids_json(active_ids)?,
                    library_id,
                    Self::format_datetime(&Utc::now())
                ],
            )?;
            Ok(archived)
        })
    }

    fn list_items(&self, library_id: i64, include_archived: bool) -> Result<Vec<Item>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM items WHERE library_id = ?1 AND (?2 OR archived = 0) ORDER BY name, id",
            ITEM_COLUMNS
        ))?;
        let items = stmt
            .query_map(params![library_id, include_archived], Self::row_to_item)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    fn get_item(&self, jellyfin_id: &str) -> Result<Option<Item>> {
        let conn = self.conn.lock().unwrap();
        let item = conn
            .query_row(
                &format!("SELECT {} FROM items WHERE jellyfin_id = ?1", ITEM_COLUMNS),
                params![jellyfin_id],
                Self::row_to_item,
            )
            .optional()?;
        Ok(item)
    }

    fn upsert_playback_events(&self, events: &[PlaybackEvent]) -> Result<EventInsertOutcome> {
        self.with_transaction(|tx| {
            let ids: Vec<i64> = events.iter().map(|e| e.activity_log_id).collect();
            let mut known: HashSet<i64> = {
                let mut stmt = tx.prepare_cached(
                    "SELECT activity_log_id FROM playback_activity
                     WHERE activity_log_id IN (SELECT value FROM json_each(?1))",
                )?;
                let known = stmt
                    .query_map(params![serde_json::to_string(&ids)?], |row| row.get(0))?
                    .collect::<rusqlite::Result<HashSet<i64>>>()?;
                known
            };

            let now = Self::format_datetime(&Utc::now());
            let mut upsert = tx.prepare_cached(
                "INSERT INTO playback_activity
                    (activity_log_id, user_id, item_id, event_name, event_overview,
                     activity_at, username, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(activity_log_id) DO UPDATE SET
                    user_id = excluded.user_id,
                    item_id = excluded.item_id,
                    event_name = excluded.event_name,
                    event_overview = excluded.event_overview,
                    activity_at = excluded.activity_at,
                    username = COALESCE(excluded.username, playback_activity.username)",
            )?;

            let mut outcome = EventInsertOutcome::default();
            for event in events {
                upsert.execute(params![
                    event.activity_log_id,
                    event.user_id,
                    event.item_id,
                    event.event_name,
                    event.event_overview,
                    event.activity_at,
                    event.username,
                    now
                ])?;
                if known.insert(event.activity_log_id) {
                    outcome.inserted += 1;
                } else {
                    outcome.updated += 1;
                }
            }
            Ok(outcome)
        })
    }

    fn get_playback_event(&self, activity_log_id: i64) -> Result<Option<PlaybackEvent>> {
        let conn = self.conn.lock().unwrap();
        let event = conn
            .query_row(
                &format!(
                    "SELECT {} FROM playback_activity WHERE activity_log_id = ?1",
                    EVENT_COLUMNS
                ),
                params![activity_log_id],
                Self::row_to_event,
            )
            .optional()?;
        Ok(event)
    }

    fn count_playback_events(&self) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count = conn.query_row("SELECT COUNT(*) FROM playback_activity", [], |row| {
            row.get(0)
        })?;
        Ok(count)
    }

    fn refresh_play_stats(&self) -> Result<StatsRefresh> {
        self.with_transaction(|tx| stats_aggregator::refresh_all(tx))
    }

    fn get_top_items_by_plays(&self, limit: usize) -> Result<Vec<TopItem>> {
        let conn = self.conn.lock().unwrap();
        stats_aggregator::top_items_by_plays(&conn, limit)
    }

    fn get_top_users_by_plays(&self, limit: usize) -> Result<Vec<TopUser>> {
        let conn = self.conn.lock().unwrap();
        stats_aggregator::top_users_by_plays(&conn, limit)
    }

    fn get_library_stats(&self, jellyfin_id: &str) -> Result<Option<LibraryStats>> {
        let conn = self.conn.lock().unwrap();
        match Self::query_library(&conn, jellyfin_id)? {
            Some(library) => Ok(Some(stats_aggregator::library_stats(&conn, library)?)),
            None => Ok(None),
        }
    }

    fn get_last_sync_cursor(&self) -> Result<Option<i64>> {
        let conn = self.conn.lock().unwrap();
        let cursor = conn
            .query_row(
                "SELECT last_activity_log_sync FROM sync_state WHERE id = 1",
                [],
                |row| row.get::<_, Option<i64>>(0),
            )
            .optional()?
            .flatten();
        Ok(cursor)
    }

    fn set_last_sync_cursor(&self, cursor: i64) -> Result<i64> {
        self.with_transaction(|tx| {
            tx.execute(
                "INSERT INTO sync_state (id, last_activity_log_sync, updated_at)
                 VALUES (1, ?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET
                    last_activity_log_sync = MAX(
                        COALESCE(sync_state.last_activity_log_sync, excluded.last_activity_log_sync),
                        excluded.last_activity_log_sync
                    ),
                    updated_at = excluded.updated_at",
                params![cursor, Self::format_datetime(&Utc::now())],
            )?;
            let stored = tx.query_row(
                "SELECT last_activity_log_sync FROM sync_state WHERE id = 1",
                [],
                |row| row.get(0),
            )?;
            Ok(stored)
        })
    }

    fn create_task_log(
        &self,
        name: &str,
        task_type: &str,
        execution_type: ExecutionType,
    ) -> Result<i64> {
        self.with_transaction(|tx| {
            tx.execute(
                "INSERT INTO task_log (name, task_type, execution_type, started_at, result)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    name,
                    task_type,
                    execution_type.as_str(),
                    Self::format_datetime(&Utc::now()),
                    TaskResult::Running.as_str()
                ],
            )?;
            Ok(tx.last_insert_rowid())
        })
    }

    fn complete_task_log(
        &self,
        task_id: i64,
        result: TaskResult,
        log: Option<&serde_json::Value>,
    ) -> Result<bool> {
        if !result.is_terminal() {
            bail!("Task log {} can only be completed with a terminal result", task_id);
        }
        self.with_transaction(|tx| {
            let started_at: Option<String> = tx
                .query_row(
                    "SELECT started_at FROM task_log WHERE id = ?1 AND result = ?2",
                    params![task_id, TaskResult::Running.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(started_at) = started_at else {
                return Ok(false);
            };

            let now = Utc::now();
            let duration_ms = Self::parse_datetime(&started_at)
                .map(|started| (now - started).num_milliseconds().max(0))
                .unwrap_or(0);
            let log_json = log.map(serde_json::to_string).transpose()?;

            let changed = tx.execute(
                "UPDATE task_log
                 SET result = ?2, finished_at = ?3, duration_ms = ?4, log_json = ?5
                 WHERE id = ?1 AND result = ?6",
                params![
                    task_id,
                    result.as_str(),
                    Self::format_datetime(&now),
                    duration_ms,
                    log_json,
                    TaskResult::Running.as_str()
                ],
            )?;
            Ok(changed > 0)
        })
    }

    fn get_task_log(&self, task_id: i64) -> Result<Option<TaskLog>> {
        let conn = self.conn.lock().unwrap();
        let task = conn
            .query_row(
                &format!("SELECT {} FROM task_log WHERE id = ?1", TASK_COLUMNS),
                params![task_id],
                Self::row_to_task_log,
            )
            .optional()?;
        Ok(task)
    }

    fn get_latest_task_log(&self, task_type: &str) -> Result<Option<TaskLog>> {
        let conn = self.conn.lock().unwrap();
        let task = conn
            .query_row(
                &format!(
                    "SELECT {} FROM task_log WHERE task_type = ?1
                     ORDER BY started_at DESC, id DESC LIMIT 1",
                    TASK_COLUMNS
                ),
                params![task_type],
                Self::row_to_task_log,
            )
            .optional()?;
        Ok(task)
    }

    fn list_task_logs(&self, limit: usize) -> Result<Vec<TaskLog>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM task_log ORDER BY started_at DESC, id DESC LIMIT ?1",
            TASK_COLUMNS
        ))?;
        let tasks = stmt
            .query_map(params![limit as i64], Self::row_to_task_log)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }

    fn mark_stale_tasks_failed(&self) -> Result<usize> {
        self.with_transaction(|tx| {
            let log = serde_json::json!({ "error": "Task was interrupted (process restart)" });
            let count = tx.execute(
                "UPDATE task_log SET result = ?1, finished_at = ?2, log_json = ?3
                 WHERE result = ?4",
                params![
                    TaskResult::Failed.as_str(),
                    Self::format_datetime(&Utc::now()),
                    log.to_string(),
                    TaskResult::Running.as_str()
                ],
            )?;
            Ok(count)
        })
    }
}
