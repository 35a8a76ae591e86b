//! SQLite schema for the mirrored media-server data.
//!
//! Version 1 holds the mirrored entities, the task log and the single-row
//! sync cursor. Version 2 records the remote creation time of items.

use crate::sqlite_column;
use crate::sqlite_persistence::{ForeignKey, OnDelete, SqlType, Table, VersionedSchema};

// =============================================================================
// Version 1
// =============================================================================

const USERS_TABLE_V1: Table = Table {
    name: "users",
    columns: &[
        sqlite_column!("id", SqlType::Integer, is_primary_key = true),
        sqlite_column!("jellyfin_id", SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("name", SqlType::Text, non_null = true),
        sqlite_column!("is_admin", SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("total_plays", SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("archived", SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("created_at", SqlType::Text, non_null = true),
        sqlite_column!("updated_at", SqlType::Text, non_null = true),
    ],
    indices: &[("idx_users_archived", "archived")],
};

const LIBRARIES_TABLE_V1: Table = Table {
    name: "libraries",
    columns: &[
        sqlite_column!("id", SqlType::Integer, is_primary_key = true),
        sqlite_column!("jellyfin_id", SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("name", SqlType::Text, non_null = true),
        sqlite_column!("collection_type", SqlType::Text),
        sqlite_column!("image_url", SqlType::Text),
        sqlite_column!("tracked", SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("archived", SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("total_plays", SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("total_files", SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!(
            "total_time_seconds",
            SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!("size_bytes", SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!(
            "total_playback_seconds",
            SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!("last_played_item_name", SqlType::Text),
        sqlite_column!("created_at", SqlType::Text, non_null = true),
        sqlite_column!("updated_at", SqlType::Text, non_null = true),
    ],
    indices: &[("idx_libraries_tracked", "tracked, archived")],
};

const ITEM_LIBRARY_FK: ForeignKey = ForeignKey {
    foreign_table: "libraries",
    foreign_column: "id",
    on_delete: OnDelete::Cascade,
};

const ITEMS_TABLE_V1: Table = Table {
    name: "items",
    columns: &[
        sqlite_column!("id", SqlType::Integer, is_primary_key = true),
        sqlite_column!("jellyfin_id", SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!(
            "library_id",
            SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ITEM_LIBRARY_FK)
        ),
        sqlite_column!("parent_id", SqlType::Text),
        sqlite_column!("name", SqlType::Text, non_null = true),
        sqlite_column!("item_type", SqlType::Text),
        sqlite_column!("play_count", SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("runtime_seconds", SqlType::Integer),
        sqlite_column!("size_bytes", SqlType::Integer),
        sqlite_column!("archived", SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("created_at", SqlType::Text, non_null = true),
        sqlite_column!("updated_at", SqlType::Text, non_null = true),
    ],
    indices: &[
        ("idx_items_library", "library_id, archived"),
        ("idx_items_parent", "parent_id"),
    ],
};

const PLAYBACK_ACTIVITY_TABLE_V1: Table = Table {
    name: "playback_activity",
    columns: &[
        sqlite_column!("id", SqlType::Integer, is_primary_key = true),
        sqlite_column!("activity_log_id", SqlType::Integer, non_null = true, is_unique = true),
        sqlite_column!("user_id", SqlType::Text, non_null = true),
        sqlite_column!("item_id", SqlType::Text, non_null = true),
        sqlite_column!("event_name", SqlType::Text),
        sqlite_column!("event_overview", SqlType::Text),
        sqlite_column!("activity_at", SqlType::Integer, non_null = true),
        sqlite_column!("username", SqlType::Text),
        sqlite_column!("created_at", SqlType::Text, non_null = true),
    ],
    indices: &[
        ("idx_playback_item", "item_id"),
        ("idx_playback_user", "user_id"),
        ("idx_playback_activity_at", "activity_at"),
    ],
};

const TASK_LOG_TABLE_V1: Table = Table {
    name: "task_log",
    columns: &[
        sqlite_column!("id", SqlType::Integer, is_primary_key = true),
        sqlite_column!("name", SqlType::Text, non_null = true),
        sqlite_column!("task_type", SqlType::Text, non_null = true),
        sqlite_column!("execution_type", SqlType::Text, non_null = true),
        sqlite_column!("started_at", SqlType::Text, non_null = true),
        sqlite_column!("finished_at", SqlType::Text),
        sqlite_column!("duration_ms", SqlType::Integer),
        sqlite_column!("result", SqlType::Text, non_null = true),
        sqlite_column!("log_json", SqlType::Text),
    ],
    indices: &[
        ("idx_task_log_type_started", "task_type, started_at DESC"),
        ("idx_task_log_result", "result"),
    ],
};

/// Single row (id = 1) holding the incremental activity cursor.
const SYNC_STATE_TABLE_V1: Table = Table {
    name: "sync_state",
    columns: &[
        sqlite_column!("id", SqlType::Integer, is_primary_key = true),
        sqlite_column!("last_activity_log_sync", SqlType::Integer),
        sqlite_column!("updated_at", SqlType::Text, non_null = true),
    ],
    indices: &[],
};

// =============================================================================
// Version 2 - remote creation date on items
// =============================================================================

const ITEMS_TABLE_V2: Table = Table {
    name: "items",
    columns: &[
        sqlite_column!("id", SqlType::Integer, is_primary_key = true),
        sqlite_column!("jellyfin_id", SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!(
            "library_id",
            SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ITEM_LIBRARY_FK)
        ),
        sqlite_column!("parent_id", SqlType::Text),
        sqlite_column!("name", SqlType::Text, non_null = true),
        sqlite_column!("item_type", SqlType::Text),
        sqlite_column!("play_count", SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("runtime_seconds", SqlType::Integer),
        sqlite_column!("size_bytes", SqlType::Integer),
        sqlite_column!("archived", SqlType::Integer, non_null = true, default_value = Some("0")),
        sqlite_column!("created_at", SqlType::Text, non_null = true),
        sqlite_column!("updated_at", SqlType::Text, non_null = true),
        sqlite_column!("date_created", SqlType::Text),
    ],
    indices: &[
        ("idx_items_library", "library_id, archived"),
        ("idx_items_parent", "parent_id"),
    ],
};

fn migrate_v1_to_v2(conn: &rusqlite::Connection) -> anyhow::Result<()> {
    conn.execute("ALTER TABLE items ADD COLUMN date_created TEXT", [])?;
    Ok(())
}

pub const MEDIA_VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 1,
        tables: &[
            USERS_TABLE_V1,
            LIBRARIES_TABLE_V1,
            ITEMS_TABLE_V1,
            PLAYBACK_ACTIVITY_TABLE_V1,
            TASK_LOG_TABLE_V1,
            SYNC_STATE_TABLE_V1,
        ],
        migration: None,
    },
    VersionedSchema {
        version: 2,
        tables: &[
            USERS_TABLE_V1,
            LIBRARIES_TABLE_V1,
            ITEMS_TABLE_V2,
            PLAYBACK_ACTIVITY_TABLE_V1,
            TASK_LOG_TABLE_V1,
            SYNC_STATE_TABLE_V1,
        ],
        migration: Some(migrate_v1_to_v2),
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite_persistence::read_schema_version;
    use rusqlite::Connection;

    #[test]
    fn latest_schema_creates_and_validates() {
        let conn = Connection::open_in_memory().unwrap();
        let latest = MEDIA_VERSIONED_SCHEMAS.last().unwrap();
        latest.create(&conn).unwrap();
        latest.validate(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), 2);
    }

    #[test]
    fn v1_database_validates_as_v2_after_migration() {
        let conn = Connection::open_in_memory().unwrap();
        MEDIA_VERSIONED_SCHEMAS[0].create(&conn).unwrap();
        MEDIA_VERSIONED_SCHEMAS[0].validate(&conn).unwrap();
        assert!(MEDIA_VERSIONED_SCHEMAS[1].validate(&conn).is_err());

        migrate_v1_to_v2(&conn).unwrap();
        MEDIA_VERSIONED_SCHEMAS[1].validate(&conn).unwrap();
    }
}
