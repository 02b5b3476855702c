//! Live catalog snapshots.
//!
//! A [`LiveCatalog`] is read once, at the start of a run, and never refreshed.
//! If another session changes a table after the snapshot was taken, the run
//! finds out when its own DDL fails.

use crate::Result;
use crate::conn::BoxFuture;
use indexmap::IndexMap;
use tokio_postgres::GenericClient;
use tracing::debug;

/// A column as it exists in the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveColumn {
    /// Column name
    pub name: String,
    /// SQL type as reported by `information_schema` (e.g. `integer`)
    pub data_type: String,
    /// Underlying type name (e.g. `int4`), usable as a cast target
    pub udt_name: String,
    /// Whether the column allows NULL
    pub nullable: bool,
}

impl LiveColumn {
    pub fn new(
        name: impl Into<String>,
        data_type: impl Into<String>,
        udt_name: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            udt_name: udt_name.into(),
            nullable: true,
        }
    }
}

/// A table as it exists in the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveTable {
    pub name: String,
    /// Columns in ordinal order, keyed by name
    pub columns: IndexMap<String, LiveColumn>,
    /// Primary key column names, in key order
    pub primary_key: Vec<String>,
}

impl LiveTable {
    pub fn new(name: impl Into<String>, columns: impl IntoIterator<Item = LiveColumn>) -> Self {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(|c| (c.name.clone(), c)).collect(),
            primary_key: Vec::new(),
        }
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }
}

/// Snapshot of the tables in the current schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveCatalog {
    tables: IndexMap<String, LiveTable>,
}

impl LiveCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tables(tables: impl IntoIterator<Item = LiveTable>) -> Self {
        Self {
            tables: tables.into_iter().map(|t| (t.name.clone(), t)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&LiveTable> {
        self.tables.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn tables(&self) -> impl Iterator<Item = &LiveTable> {
        self.tables.values()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Introspects the live database.
pub trait CatalogReader {
    /// Read the tables, columns, and primary keys of the current schema.
    fn reflect(&self) -> BoxFuture<'_, Result<LiveCatalog>>;
}

impl CatalogReader for tokio_postgres::Client {
    fn reflect(&self) -> BoxFuture<'_, Result<LiveCatalog>> {
        Box::pin(reflect_postgres(self))
    }
}

impl CatalogReader for tokio_postgres::Transaction<'_> {
    fn reflect(&self) -> BoxFuture<'_, Result<LiveCatalog>> {
        Box::pin(reflect_postgres(self))
    }
}

const TABLES_SQL: &str = r#"
    SELECT table_name::text
    FROM information_schema.tables
    WHERE table_schema = current_schema()
      AND table_type = 'BASE TABLE'
    ORDER BY table_name
"#;

const COLUMNS_SQL: &str = r#"
    SELECT table_name::text, column_name::text, data_type::text, udt_name::text,
           is_nullable = 'YES'
    FROM information_schema.columns
    WHERE table_schema = current_schema()
    ORDER BY table_name, ordinal_position
"#;

const PRIMARY_KEYS_SQL: &str = r#"
    SELECT kcu.table_name::text, kcu.column_name::text
    FROM information_schema.table_constraints tc
    JOIN information_schema.key_column_usage kcu
      ON tc.constraint_name = kcu.constraint_name
     AND tc.table_schema = kcu.table_schema
     AND tc.table_name = kcu.table_name
    WHERE tc.constraint_type = 'PRIMARY KEY'
      AND tc.table_schema = current_schema()
    ORDER BY kcu.table_name, kcu.ordinal_position
"#;

async fn reflect_postgres<C: GenericClient + Sync>(client: &C) -> Result<LiveCatalog> {
    let mut tables: IndexMap<String, LiveTable> = IndexMap::new();

    for row in client.query(TABLES_SQL, &[]).await? {
        let name: String = row.get(0);
        let table = LiveTable {
            name: name.clone(),
            columns: IndexMap::new(),
            primary_key: Vec::new(),
        };
        tables.insert(name, table);
    }

    // Views also show up in information_schema.columns; the lookup skips them.
    for row in client.query(COLUMNS_SQL, &[]).await? {
        let table: String = row.get(0);
        if let Some(live) = tables.get_mut(&table) {
            let column = LiveColumn {
                name: row.get(1),
                data_type: row.get(2),
                udt_name: row.get(3),
                nullable: row.get(4),
            };
            live.columns.insert(column.name.clone(), column);
        }
    }

    for row in client.query(PRIMARY_KEYS_SQL, &[]).await? {
        let table: String = row.get(0);
        if let Some(live) = tables.get_mut(&table) {
            live.primary_key.push(row.get(1));
        }
    }

    debug!(tables = tables.len(), "read live catalog");

    Ok(LiveCatalog { tables })
}
