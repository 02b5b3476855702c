use crate::CliError;
use crate::config::DbConfig;
use dbloader::{
    CatalogReader, ConnectionExt, DesiredSchema, Loader, ReconcilePlan, RowBatch, TableOutcome,
};
use owo_colors::OwoColorize;
use std::path::Path;
use tokio_postgres::{Client, NoTls, Transaction};
use tracing::{info, warn};

async fn connect(db: &DbConfig) -> Result<Client, CliError> {
    let target = db.display_target();
    info!(db = %target, "connecting");

    let (client, connection) = db
        .to_pg_config()
        .connect(NoTls)
        .await
        .map_err(|source| CliError::Connect { target, source })?;

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            warn!(error = %e, "connection closed with error");
        }
    });

    Ok(client)
}

/// Commit `tx` if `outcome` succeeded and `commit` is set, roll it back otherwise.
async fn finish<T>(
    tx: Transaction<'_>,
    outcome: Result<T, CliError>,
    commit: bool,
) -> Result<T, CliError> {
    match outcome {
        Ok(value) if commit => {
            tx.commit().await.map_err(CliError::Transaction)?;
            Ok(value)
        }
        Ok(value) => {
            tx.rollback().await.map_err(CliError::Transaction)?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                warn!(error = %rollback, "rollback failed");
            }
            Err(e)
        }
    }
}

/// Bring the database up to the built-in schema.
///
/// With `dry_run` the plan is printed and the transaction rolled back.
pub async fn create_schema(db: &DbConfig, dry_run: bool) -> Result<(), CliError> {
    let desired = DesiredSchema::builtin();
    let mut client = connect(db).await?;
    let tx = client.transaction().await.map_err(CliError::Transaction)?;

    let outcome: Result<_, CliError> = async {
        let live = tx.reflect().await?;
        let plan = ReconcilePlan::new(&desired, &live);
        if dry_run {
            return Ok((plan, None));
        }
        let report = plan.apply(&tx.traced()).await?;
        Ok((plan, Some(report)))
    }
    .await;

    let (plan, report) = finish(tx, outcome, !dry_run).await?;
    let Some(report) = report else {
        print_plan(&plan);
        return Ok(());
    };

    for table in &report.tables {
        match table {
            TableOutcome::Created(_) => println!("{}", table.green()),
            TableOutcome::Updated { .. } => println!("{}", table.yellow()),
            TableOutcome::Unchanged(_) => println!("{}", table.dimmed()),
        }
    }
    if report.is_unchanged() {
        println!("{}", "schema is up to date".dimmed());
    } else {
        println!("applied {} statements", report.statements.bold());
    }

    Ok(())
}

fn print_plan(plan: &ReconcilePlan) {
    print!("{}", plan);
    if plan.is_empty() {
        println!("{}", "schema is up to date".dimmed());
        return;
    }
    println!();
    for sql in plan.statements() {
        println!("{}", sql.cyan());
    }
    println!("{}", "dry run: nothing was applied".yellow());
}

/// Append the rows of `path` to `table`.
pub async fn load_csv(
    db: &DbConfig,
    table: &str,
    path: &Path,
    delimiter: u8,
) -> Result<(), CliError> {
    let batch = RowBatch::from_path(path, delimiter)?;
    info!(
        source = %path.display(),
        columns = batch.columns().len(),
        rows = batch.len(),
        "parsed input"
    );

    let mut client = connect(db).await?;
    let tx = client.transaction().await.map_err(CliError::Transaction)?;

    let outcome: Result<_, CliError> = async {
        let live = tx.reflect().await?;
        let report = Loader::new(&live).load(&tx.traced(), table, &batch).await?;
        Ok(report)
    }
    .await;

    let report = finish(tx, outcome, true).await?;
    println!(
        "loaded {} rows into {}",
        report.inserted.green().bold(),
        report.table.bold()
    );

    Ok(())
}
