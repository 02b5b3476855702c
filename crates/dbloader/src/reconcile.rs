//! Schema reconciliation - bring the database up to the desired schema.
//!
//! Reconciliation compares a [`DesiredSchema`] against a [`LiveCatalog`]
//! snapshot and decides, per declared table, whether to create it, add the
//! columns it is missing, or leave it alone.
//!
//! The rules are deliberately narrow:
//!
//! - Columns are matched by name only. A live column whose type differs from
//!   the declaration counts as present; types are never altered.
//! - Nothing that exists only in the database is dropped, altered, or reported.
//! - Tables are visited in declared order, and missing columns are added in
//!   declared order, so the same inputs always produce the same DDL.
//! - The first failing statement aborts the run. There are no retries.
//!
//! ```text
//! sample_table1:
//!   + table (4 columns)
//! sample_table2:
//!   + number: INTEGER
//!   + other: TEXT
//! ```

use crate::{ColumnDef, Connection, DesiredSchema, Error, LiveCatalog, Result, TableDef};
use std::fmt;
use tracing::{debug, info, warn};

/// What to do with a single declared table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TablePlan {
    /// The table does not exist: create it with every declared column.
    Create(TableDef),
    /// The table exists but lacks some declared columns.
    AddColumns {
        table: String,
        columns: Vec<ColumnDef>,
    },
    /// The table already has every declared column.
    Unchanged(String),
}

impl TablePlan {
    pub fn table(&self) -> &str {
        match self {
            TablePlan::Create(def) => &def.name,
            TablePlan::AddColumns { table, .. } => table,
            TablePlan::Unchanged(table) => table,
        }
    }

    /// The DDL statements for this table, in execution order.
    pub fn statements(&self) -> Vec<String> {
        match self {
            TablePlan::Create(def) => vec![def.create_table_sql()],
            TablePlan::AddColumns { table, columns } => {
                columns.iter().map(|c| c.add_column_sql(table)).collect()
            }
            TablePlan::Unchanged(_) => Vec::new(),
        }
    }
}

/// The ordered set of changes one run will make.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub tables: Vec<TablePlan>,
}

impl ReconcilePlan {
    /// Compare the desired schema against a catalog snapshot.
    ///
    /// This is pure: nothing is executed until [`ReconcilePlan::apply`].
    pub fn new(desired: &DesiredSchema, live: &LiveCatalog) -> Self {
        let tables = desired
            .tables()
            .map(|def| match live.get(&def.name) {
                None => TablePlan::Create(def.clone()),
                Some(existing) => {
                    let missing: Vec<ColumnDef> = def
                        .columns
                        .iter()
                        .filter(|c| !existing.has_column(&c.name))
                        .cloned()
                        .collect();
                    if missing.is_empty() {
                        TablePlan::Unchanged(def.name.clone())
                    } else {
                        TablePlan::AddColumns {
                            table: def.name.clone(),
                            columns: missing,
                        }
                    }
                }
            })
            .collect();

        Self { tables }
    }

    /// Returns true if applying this plan would issue no DDL.
    pub fn is_empty(&self) -> bool {
        self.tables
            .iter()
            .all(|t| matches!(t, TablePlan::Unchanged(_)))
    }

    /// Every DDL statement of the plan, in execution order.
    pub fn statements(&self) -> Vec<String> {
        self.tables.iter().flat_map(TablePlan::statements).collect()
    }

    /// Execute the plan on `conn`.
    ///
    /// The connection is expected to be inside a transaction owned by the
    /// caller; on error the caller must roll it back.
    pub async fn apply<C: Connection>(&self, conn: &C) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();

        for plan in &self.tables {
            match plan {
                TablePlan::Create(def) => {
                    let sql = def.create_table_sql();
                    conn.execute(&sql, &[])
                        .await
                        .map_err(|source| Error::SchemaApply {
                            table: def.name.clone(),
                            column: None,
                            source,
                        })?;
                    report.statements += 1;
                    info!(table = %def.name, columns = def.columns.len(), "created table");
                    report.tables.push(TableOutcome::Created(def.name.clone()));
                }
                TablePlan::AddColumns { table, columns } => {
                    let mut added = Vec::with_capacity(columns.len());
                    for col in columns {
                        if col.primary_key || !col.nullable {
                            warn!(
                                table = %table,
                                column = %col.name,
                                "constraints are not applied to existing tables; adding column without them"
                            );
                        }
                        let sql = col.add_column_sql(table);
                        conn.execute(&sql, &[])
                            .await
                            .map_err(|source| Error::SchemaApply {
                                table: table.clone(),
                                column: Some(col.name.clone()),
                                source,
                            })?;
                        report.statements += 1;
                        info!(table = %table, column = %col.name, ty = %col.ty, "added column");
                        added.push(col.name.clone());
                    }
                    report.tables.push(TableOutcome::Updated {
                        table: table.clone(),
                        added,
                    });
                }
                TablePlan::Unchanged(table) => {
                    debug!(table = %table, "table is up to date");
                    report.tables.push(TableOutcome::Unchanged(table.clone()));
                }
            }
        }

        Ok(report)
    }
}

impl fmt::Display for ReconcilePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for plan in &self.tables {
            writeln!(f, "{}:", plan.table())?;
            match plan {
                TablePlan::Create(def) => {
                    writeln!(f, "  + table ({} columns)", def.columns.len())?;
                }
                TablePlan::AddColumns { columns, .. } => {
                    for col in columns {
                        writeln!(f, "  + {}: {}", col.name, col.ty)?;
                    }
                }
                TablePlan::Unchanged(_) => writeln!(f, "  = unchanged")?,
            }
        }
        Ok(())
    }
}

/// Result of reconciling a single table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableOutcome {
    Created(String),
    Updated { table: String, added: Vec<String> },
    Unchanged(String),
}

impl fmt::Display for TableOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableOutcome::Created(table) => write!(f, "created {}", table),
            TableOutcome::Updated { table, added } => {
                write!(f, "updated {} (+{})", table, added.join(", +"))
            }
            TableOutcome::Unchanged(table) => write!(f, "unchanged {}", table),
        }
    }
}

/// What a reconciliation run did, table by table in declared order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub tables: Vec<TableOutcome>,
    /// Number of DDL statements executed
    pub statements: usize,
}

impl ReconcileReport {
    pub fn is_unchanged(&self) -> bool {
        self.statements == 0
    }
}

/// Plan and apply in one step.
pub async fn reconcile<C: Connection>(
    desired: &DesiredSchema,
    live: &LiveCatalog,
    conn: &C,
) -> Result<ReconcileReport> {
    let plan = ReconcilePlan::new(desired, live);
    debug!(
        tables = plan.tables.len(),
        statements = plan.statements().len(),
        "reconciliation planned"
    );
    plan.apply(conn).await
}
