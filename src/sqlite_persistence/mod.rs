//! Declarative, versioned SQLite schemas.
//!
//! Stores describe every schema version as a [`VersionedSchema`]; a fresh
//! database is created at the newest version, an existing one is validated
//! against its recorded version and migrated forward.

mod versioned_schema;

pub use versioned_schema::{
    read_schema_version, Column, ForeignKey, OnDelete, SqlType, Table, VersionedSchema,
    BASE_DB_VERSION,
};
