//! Statement execution seam.
//!
//! The reconciler and the loader only ever execute statements; they never
//! begin, commit, or roll back. The caller enrolls the connection in a
//! transaction and decides how it ends.

use crate::BoxError;
use std::future::Future;
use std::pin::Pin;
use tokio_postgres::types::ToSql;
use tracing::Instrument;

/// Boxed future returned by [`Connection`] methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Something that can execute a single DDL or DML statement.
///
/// Implemented for `tokio_postgres::Client` and `tokio_postgres::Transaction`.
pub trait Connection: Send + Sync {
    /// Execute a statement, returning the number of rows affected.
    fn execute<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> BoxFuture<'a, Result<u64, BoxError>>;
}

impl Connection for tokio_postgres::Client {
    fn execute<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> BoxFuture<'a, Result<u64, BoxError>> {
        Box::pin(async move {
            tokio_postgres::Client::execute(self, sql, params)
                .await
                .map_err(BoxError::from)
        })
    }
}

impl Connection for tokio_postgres::Transaction<'_> {
    fn execute<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> BoxFuture<'a, Result<u64, BoxError>> {
        Box::pin(async move {
            tokio_postgres::Transaction::execute(self, sql, params)
                .await
                .map_err(BoxError::from)
        })
    }
}

/// A wrapper around a connection that logs all statements via tracing.
///
/// Each statement runs inside a `db.execute` debug span carrying the SQL, the
/// parameter count, and the number of affected rows.
pub struct Traced<'a, C: Connection> {
    conn: &'a C,
}

impl<'a, C: Connection> Traced<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }
}

impl<C: Connection> Connection for Traced<'_, C> {
    fn execute<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> BoxFuture<'a, Result<u64, BoxError>> {
        let span = tracing::debug_span!(
            "db.execute",
            sql = %sql,
            params = params.len(),
            affected = tracing::field::Empty,
        );
        Box::pin(async move {
            let affected = self
                .conn
                .execute(sql, params)
                .instrument(span.clone())
                .await?;
            span.record("affected", affected);
            Ok(affected)
        })
    }
}

/// Extension trait to get a traced wrapper from a connection.
pub trait ConnectionExt: Connection + Sized {
    fn traced(&self) -> Traced<'_, Self> {
        Traced::new(self)
    }
}

impl<C: Connection> ConnectionExt for C {}
