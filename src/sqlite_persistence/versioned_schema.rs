use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection};

/// Offset added to every schema version before it is written to
/// `PRAGMA user_version`, so a database created by some other tool is never
/// mistaken for one of ours.
pub const BASE_DB_VERSION: usize = 52000;

#[macro_export]
macro_rules! sqlite_column {
    ($name:expr, $sql_type:expr $(, $field:ident = $value:expr)*) => {
        {
            #[allow(unused_mut)]
            let mut column = $crate::sqlite_persistence::Column {
                name: $name,
                sql_type: $sql_type,
                is_primary_key: false,
                non_null: false,
                is_unique: false,
                default_value: None,
                foreign_key: None,
            };
            $(
                column.$field = $value;
            )*
            column
        }
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Integer,
    Real,
}

impl SqlType {
    fn keyword(&self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
            SqlType::Real => "REAL",
        }
    }

    fn from_keyword(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "TEXT" => Some(SqlType::Text),
            "INTEGER" => Some(SqlType::Integer),
            "REAL" => Some(SqlType::Real),
            _ => None,
        }
    }
}

#[allow(unused)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDelete {
    NoAction,
    SetNull,
    Cascade,
}

impl OnDelete {
    fn as_sql(&self) -> &'static str {
        match self {
            OnDelete::NoAction => "NO ACTION",
            OnDelete::SetNull => "SET NULL",
            OnDelete::Cascade => "CASCADE",
        }
    }
}

pub struct ForeignKey {
    pub foreign_table: &'static str,
    pub foreign_column: &'static str,
    pub on_delete: OnDelete,
}

pub struct Column {
    pub name: &'static str,
    pub sql_type: SqlType,
    pub is_primary_key: bool,
    pub non_null: bool,
    pub is_unique: bool,
    pub default_value: Option<&'static str>,
    pub foreign_key: Option<&'static ForeignKey>,
}

impl Column {
    fn definition(&self) -> String {
        let mut def = format!("{} {}", self.name, self.sql_type.keyword());
        if self.is_primary_key {
            def.push_str(" PRIMARY KEY");
        }
        if self.non_null {
            def.push_str(" NOT NULL");
        }
        if self.is_unique {
            def.push_str(" UNIQUE");
        }
        if let Some(default_value) = self.default_value {
            def.push_str(&format!(" DEFAULT {}", default_value));
        }
        if let Some(fk) = self.foreign_key {
            def.push_str(&format!(
                " REFERENCES {}({}) ON DELETE {}",
                fk.foreign_table,
                fk.foreign_column,
                fk.on_delete.as_sql()
            ));
        }
        def
    }
}

pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column],
    /// `(index_name, column_list)` pairs.
    pub indices: &'static [(&'static str, &'static str)],
}

/// A column as reported by `PRAGMA table_info`.
struct StoredColumn {
    name: String,
    sql_type: Option<SqlType>,
    non_null: bool,
    default_value: Option<String>,
    is_primary_key: bool,
}

fn unwrap_parens(s: &str) -> &str {
    s.strip_prefix('(')
        .and_then(|inner| inner.strip_suffix(')'))
        .unwrap_or(s)
}

impl Table {
    pub fn create_sql(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(Column::definition)
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE {} ({});", self.name, columns)
    }

    pub fn create(&self, conn: &Connection) -> Result<()> {
        conn.execute(&self.create_sql(), params![])
            .with_context(|| format!("Failed to create table {}", self.name))?;
        for (index_name, columns) in self.indices {
            conn.execute(
                &format!("CREATE INDEX {} ON {}({});", index_name, self.name, columns),
                params![],
            )
            .with_context(|| format!("Failed to create index {}", index_name))?;
        }
        Ok(())
    }

    fn stored_columns(&self, conn: &Connection) -> Result<Vec<StoredColumn>> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", self.name))?;
        let columns = stmt
            .query_map([], |row| {
                Ok(StoredColumn {
                    name: row.get(1)?,
                    sql_type: SqlType::from_keyword(&row.get::<_, String>(2)?),
                    non_null: row.get::<_, i32>(3)? == 1,
                    default_value: row.get(4)?,
                    is_primary_key: row.get::<_, i32>(5)? >= 1,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(columns)
    }

    pub fn validate(&self, conn: &Connection) -> Result<()> {
        let stored = self.stored_columns(conn)?;
        if stored.is_empty() {
            bail!("Table {} does not exist", self.name);
        }
        if stored.len() != self.columns.len() {
            bail!(
                "Table {} has {} columns, expected {} (found: {})",
                self.name,
                stored.len(),
                self.columns.len(),
                stored
                    .iter()
                    .map(|c| c.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        for (actual, expected) in stored.iter().zip(self.columns.iter()) {
            if actual.name != expected.name {
                bail!(
                    "Table {} column name mismatch: expected {}, got {}",
                    self.name,
                    expected.name,
                    actual.name
                );
            }
            if actual.sql_type != Some(expected.sql_type) {
                bail!(
                    "Table {} column {} type mismatch: expected {:?}, got {:?}",
                    self.name,
                    expected.name,
                    expected.sql_type,
                    actual.sql_type
                );
            }
            if actual.non_null != expected.non_null {
                bail!(
                    "Table {} column {} non-null mismatch: expected {}, got {}",
                    self.name,
                    expected.name,
                    expected.non_null,
                    actual.non_null
                );
            }
            if actual.is_primary_key != expected.is_primary_key {
                bail!(
                    "Table {} column {} primary key mismatch: expected {}, got {}",
                    self.name,
                    expected.name,
                    expected.is_primary_key,
                    actual.is_primary_key
                );
            }
            let actual_default = actual.default_value.as_deref().map(unwrap_parens);
            let expected_default = expected.default_value.map(unwrap_parens);
            if actual_default != expected_default {
                bail!(
                    "Table {} column {} default mismatch: expected {:?}, got {:?}",
                    self.name,
                    expected.name,
                    expected.default_value,
                    actual.default_value
                );
            }
        }

        for (index_name, _) in self.indices {
            let exists = conn
                .query_row(
                    "SELECT 1 FROM sqlite_master WHERE type = 'index' AND name = ?1 AND tbl_name = ?2",
                    params![index_name, self.name],
                    |_| Ok(()),
                )
                .is_ok();
            if !exists {
                bail!("Table {} is missing index '{}'", self.name, index_name);
            }
        }

        self.validate_foreign_keys(conn)
    }

    fn validate_foreign_keys(&self, conn: &Connection) -> Result<()> {
        let mut stmt = conn.prepare(&format!("PRAGMA foreign_key_list({});", self.name))?;
        // (from, table, to, on_delete)
        let actual: Vec<(String, String, String, String)> = stmt
            .query_map([], |row| Ok((row.get(3)?, row.get(2)?, row.get(4)?, row.get(6)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        for column in self.columns {
            let Some(fk) = column.foreign_key else {
                continue;
            };
            let matches = actual.iter().any(|(from, table, to, on_delete)| {
                from == column.name
                    && table == fk.foreign_table
                    && to == fk.foreign_column
                    && on_delete == fk.on_delete.as_sql()
            });
            if !matches {
                bail!(
                    "Table {} column {} is missing foreign key REFERENCES {}({}) ON DELETE {}",
                    self.name,
                    column.name,
                    fk.foreign_table,
                    fk.foreign_column,
                    fk.on_delete.as_sql()
                );
            }
        }
        Ok(())
    }
}

pub struct VersionedSchema {
    pub version: usize,
    pub tables: &'static [Table],
    /// Upgrades a database from the previous version to this one.
    pub migration: Option<fn(&Connection) -> Result<()>>,
}

impl VersionedSchema {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        conn.execute("PRAGMA foreign_keys = ON;", params![])?;
        for table in self.tables {
            table.create(conn)?;
        }
        conn.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + self.version),
            [],
        )?;
        Ok(())
    }

    pub fn validate(&self, conn: &Connection) -> Result<()> {
        for table in self.tables {
            table.validate(conn)?;
        }
        Ok(())
    }
}

/// Reads `PRAGMA user_version` with the base offset removed.
pub fn read_schema_version(conn: &Connection) -> Result<i64> {
    let raw: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    Ok(raw - BASE_DB_VERSION as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARENT: Table = Table {
        name: "parent",
        columns: &[
            sqlite_column!("id", SqlType::Integer, is_primary_key = true),
            sqlite_column!("label", SqlType::Text, non_null = true),
        ],
        indices: &[("idx_parent_label", "label")],
    };

    const CHILD: Table = Table {
        name: "child",
        columns: &[
            sqlite_column!("id", SqlType::Integer, is_primary_key = true),
            sqlite_column!(
                "parent_id",
                SqlType::Integer,
                non_null = true,
                foreign_key = Some(&ForeignKey {
                    foreign_table: "parent",
                    foreign_column: "id",
                    on_delete: OnDelete::Cascade,
                })
            ),
            sqlite_column!("weight", SqlType::Integer, default_value = Some("0")),
        ],
        indices: &[],
    };

    const SCHEMA: VersionedSchema = VersionedSchema {
        version: 1,
        tables: &[PARENT, CHILD],
        migration: None,
    };

    #[test]
    fn create_then_validate_round_trips() {
        let conn = Connection::open_in_memory().unwrap();
        SCHEMA.create(&conn).unwrap();
        SCHEMA.validate(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), 1);
    }

    #[test]
    fn validate_detects_missing_index() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE parent (id INTEGER PRIMARY KEY, label TEXT NOT NULL)",
            [],
        )
        .unwrap();

        let err = PARENT.validate(&conn).unwrap_err().to_string();
        assert!(err.contains("missing index"));
        assert!(err.contains("idx_parent_label"));
    }

    #[test]
    fn validate_detects_extra_column() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE parent (id INTEGER PRIMARY KEY, label TEXT NOT NULL, extra TEXT)",
            [],
        )
        .unwrap();
        conn.execute("CREATE INDEX idx_parent_label ON parent(label)", [])
            .unwrap();

        let err = PARENT.validate(&conn).unwrap_err().to_string();
        assert!(err.contains("has 3 columns, expected 2"));
    }

    #[test]
    fn validate_detects_foreign_key_with_wrong_action() {
        let conn = Connection::open_in_memory().unwrap();
        PARENT.create(&conn).unwrap();
        conn.execute(
            "CREATE TABLE child (id INTEGER PRIMARY KEY, \
             parent_id INTEGER NOT NULL REFERENCES parent(id) ON DELETE SET NULL, \
             weight INTEGER DEFAULT 0)",
            [],
        )
        .unwrap();

        let err = CHILD.validate(&conn).unwrap_err().to_string();
        assert!(err.contains("missing foreign key"));
    }

    #[test]
    fn validate_reports_missing_table() {
        let conn = Connection::open_in_memory().unwrap();
        let err = CHILD.validate(&conn).unwrap_err().to_string();
        assert!(err.contains("does not exist"));
    }

    #[test]
    fn default_values_compare_without_parentheses() {
        assert_eq!(unwrap_parens("(0)"), "0");
        assert_eq!(unwrap_parens("0"), "0");
        assert_eq!(unwrap_parens("(datetime('now'))"), "datetime('now')");
    }
}
