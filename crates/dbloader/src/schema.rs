//! Desired schema declarations.
//!
//! The registry is an ordered mapping from table name to [`TableDef`]. The
//! declared order of tables decides the order in which DDL is issued, and the
//! declared order of columns decides the column order of `CREATE TABLE`.
//!
//! ## Example
//!
//! ```
//! use dbloader::{ColumnDef, DesiredSchema, LogicalType, TableDef};
//!
//! let schema = DesiredSchema::from_tables([TableDef::new(
//!     "user",
//!     vec![
//!         ColumnDef::new("id", LogicalType::BigInt).primary_key(),
//!         ColumnDef::new("email", LogicalType::Text).not_null(),
//!     ],
//! )])
//! .unwrap();
//!
//! assert_eq!(schema.len(), 1);
//! ```

use crate::{Error, Result, quote_ident};
use indexmap::IndexMap;
use std::collections::HashSet;
use std::fmt;

/// Logical column types the registry can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalType {
    /// INTEGER (4 bytes)
    Integer,
    /// BIGINT (8 bytes)
    BigInt,
    /// TEXT
    Text,
    /// BOOLEAN
    Boolean,
}

impl LogicalType {
    /// Parse a type name as written in a declaration.
    ///
    /// Accepts the usual Postgres spellings, case-insensitively.
    pub fn parse(column: &str, type_name: &str) -> Result<Self> {
        match type_name.trim().to_ascii_lowercase().as_str() {
            "integer" | "int" | "int4" => Ok(LogicalType::Integer),
            "bigint" | "int8" => Ok(LogicalType::BigInt),
            "text" => Ok(LogicalType::Text),
            "boolean" | "bool" => Ok(LogicalType::Boolean),
            _ => Err(Error::UnsupportedType {
                column: column.to_string(),
                type_name: type_name.to_string(),
            }),
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalType::Integer => write!(f, "INTEGER"),
            LogicalType::BigInt => write!(f, "BIGINT"),
            LogicalType::Text => write!(f, "TEXT"),
            LogicalType::Boolean => write!(f, "BOOLEAN"),
        }
    }
}

/// A declared column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    /// Column name, unique within its table
    pub name: String,
    /// Declared type
    pub ty: LogicalType,
    /// Whether the column allows NULL
    pub nullable: bool,
    /// Whether the column is part of the primary key
    pub primary_key: bool,
}

impl ColumnDef {
    /// A nullable, non-key column.
    pub fn new(name: impl Into<String>, ty: LogicalType) -> Self {
        Self {
            name: name.into(),
            ty,
            nullable: true,
            primary_key: false,
        }
    }

    /// Declare a column from a textual type name.
    pub fn parse(name: impl Into<String>, type_name: &str) -> Result<Self> {
        let name = name.into();
        let ty = LogicalType::parse(&name, type_name)?;
        Ok(Self::new(name, ty))
    }

    /// Mark this column as (part of) the primary key. Implies NOT NULL.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Mark this column as NOT NULL.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// The `ALTER TABLE ... ADD COLUMN` statement for this column.
    ///
    /// Only the name and type are rendered: constraints are never added to an
    /// existing table.
    pub fn add_column_sql(&self, table: &str) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {} {};",
            quote_ident(table),
            quote_ident(&self.name),
            self.ty
        )
    }
}

/// A declared table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    /// Table name, unique within the registry
    pub name: String,
    /// Columns in declared order
    pub columns: Vec<ColumnDef>,
}

impl TableDef {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnDef>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Names of the primary key columns, in declared order.
    pub fn primary_key(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Generate the CREATE TABLE statement, columns in declared order.
    pub fn create_table_sql(&self) -> String {
        let pk_columns = self.primary_key();

        // Composite keys need a table constraint
        let use_table_pk_constraint = pk_columns.len() > 1;

        let mut parts: Vec<String> = self
            .columns
            .iter()
            .map(|col| {
                let mut def = format!("    {} {}", quote_ident(&col.name), col.ty);

                if col.primary_key && !use_table_pk_constraint {
                    def.push_str(" PRIMARY KEY");
                }

                // Inline PRIMARY KEY already implies NOT NULL
                if !col.nullable && (!col.primary_key || use_table_pk_constraint) {
                    def.push_str(" NOT NULL");
                }

                def
            })
            .collect();

        if use_table_pk_constraint {
            let quoted: Vec<_> = pk_columns.iter().map(|c| quote_ident(c)).collect();
            parts.push(format!("    PRIMARY KEY ({})", quoted.join(", ")));
        }

        format!(
            "CREATE TABLE {} (\n{}\n);",
            quote_ident(&self.name),
            parts.join(",\n")
        )
    }

    fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(Error::InvalidSchema(format!(
                "table `{}` declares no columns",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for col in &self.columns {
            if !seen.insert(col.name.as_str()) {
                return Err(Error::InvalidSchema(format!(
                    "table `{}` declares column `{}` more than once",
                    self.name, col.name
                )));
            }
        }

        Ok(())
    }
}

/// The tables the application wants to exist, in declared order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredSchema {
    tables: IndexMap<String, TableDef>,
}

impl DesiredSchema {
    /// Build a registry, validating every declaration before anything touches
    /// the database.
    pub fn from_tables(tables: impl IntoIterator<Item = TableDef>) -> Result<Self> {
        let mut map = IndexMap::new();
        for table in tables {
            table.validate()?;
            if map.contains_key(&table.name) {
                return Err(Error::InvalidSchema(format!(
                    "table `{}` is declared more than once",
                    table.name
                )));
            }
            map.insert(table.name.clone(), table);
        }
        Ok(Self { tables: map })
    }

    /// The tables this tool manages out of the box.
    pub fn builtin() -> Self {
        let sample = |name: &str| {
            TableDef::new(
                name,
                vec![
                    ColumnDef::new("id", LogicalType::Integer).primary_key(),
                    ColumnDef::new("name", LogicalType::Text),
                    ColumnDef::new("number", LogicalType::Integer),
                    ColumnDef::new("other", LogicalType::Text),
                ],
            )
        };

        let tables = [sample("sample_table1"), sample("sample_table2")];
        Self {
            tables: tables.into_iter().map(|t| (t.name.clone(), t)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&TableDef> {
        self.tables.get(name)
    }

    /// Tables in declared order.
    pub fn tables(&self) -> impl Iterator<Item = &TableDef> {
        self.tables.values()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
