//! Bulk loading of delimited files into existing tables.
//!
//! Loading is append-only and schema-exact: the header of the file must name
//! exactly the columns of the target table (in any order), and every record is
//! inserted as a new row. Nothing is updated or deleted.
//!
//! Values are sent to the database as text and converted by the column type's
//! own input function, so `42` loads into an `INTEGER` column and `abc` fails
//! there with the driver's error. Empty fields load as `NULL`.

use crate::{Connection, Error, LiveCatalog, LiveTable, Result, quote_ident};
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use tokio_postgres::types::ToSql;
use tracing::{debug, info};

/// Records parsed from a delimited file, sharing one header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowBatch {
    source: PathBuf,
    columns: Vec<String>,
    records: Vec<Vec<Option<String>>>,
}

impl RowBatch {
    /// Read a delimited file whose first row is the header.
    pub fn from_path(path: impl AsRef<Path>, delimiter: u8) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| Error::LoadParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_reader(file, path, delimiter)
    }

    /// Parse delimited data from any reader. `source` is only used in errors.
    pub fn from_reader<R: io::Read>(
        reader: R,
        source: impl Into<PathBuf>,
        delimiter: u8,
    ) -> Result<Self> {
        let source = source.into();
        let parse_error = |message: String| Error::LoadParse {
            path: source.clone(),
            message,
        };

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(false)
            .from_reader(reader);

        let headers = reader
            .headers()
            .map_err(|e| parse_error(e.to_string()))?
            .clone();

        if headers.is_empty() {
            return Err(parse_error("missing header row".to_string()));
        }

        let mut columns = Vec::with_capacity(headers.len());
        let mut seen = HashSet::new();
        for name in headers.iter() {
            if name.is_empty() {
                return Err(parse_error("header contains an empty column name".to_string()));
            }
            if !seen.insert(name) {
                return Err(parse_error(format!("header names column `{}` twice", name)));
            }
            columns.push(name.to_string());
        }

        let mut records = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|e| parse_error(e.to_string()))?;
            records.push(
                record
                    .iter()
                    .map(|field| (!field.is_empty()).then(|| field.to_string()))
                    .collect(),
            );
        }

        debug!(
            source = %source.display(),
            columns = columns.len(),
            records = records.len(),
            "parsed row batch"
        );

        Ok(Self {
            source,
            columns,
            records,
        })
    }

    /// Header column names, in file order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Records in file order; `None` is an empty field.
    pub fn records(&self) -> &[Vec<Option<String>>] {
        &self.records
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Result of loading one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub table: String,
    pub inserted: u64,
}

/// Appends row batches to tables of a catalog snapshot.
pub struct Loader<'a> {
    catalog: &'a LiveCatalog,
}

impl<'a> Loader<'a> {
    pub fn new(catalog: &'a LiveCatalog) -> Self {
        Self { catalog }
    }

    /// Look up a target table by name.
    pub fn resolve(&self, table: &str) -> Result<&'a LiveTable> {
        self.catalog
            .get(table)
            .ok_or_else(|| Error::UnknownTable(table.to_string()))
    }

    /// Check that the batch header names exactly the table's columns.
    pub fn validate(table: &LiveTable, batch: &RowBatch) -> Result<()> {
        let batch_columns: HashSet<&str> = batch.columns().iter().map(String::as_str).collect();
        let table_columns: HashSet<&str> = table.column_names().collect();

        let mut missing: Vec<String> = table_columns
            .difference(&batch_columns)
            .map(|c| c.to_string())
            .collect();
        let mut unexpected: Vec<String> = batch_columns
            .difference(&table_columns)
            .map(|c| c.to_string())
            .collect();

        if missing.is_empty() && unexpected.is_empty() {
            return Ok(());
        }

        missing.sort();
        unexpected.sort();
        Err(Error::SchemaMismatch {
            table: table.name.clone(),
            missing,
            unexpected,
        })
    }

    /// The INSERT statement for one record with the given column order.
    ///
    /// Every value is bound as text and cast to the live column type.
    pub fn insert_sql(table: &LiveTable, columns: &[String]) -> String {
        let names: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
        let values: Vec<String> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let udt = table
                    .columns
                    .get(c)
                    .map(|col| col.udt_name.as_str())
                    .unwrap_or("text");
                format!("CAST(${}::TEXT AS {})", i + 1, quote_ident(udt))
            })
            .collect();

        format!(
            "INSERT INTO {} ({}) VALUES ({});",
            quote_ident(&table.name),
            names.join(", "),
            values.join(", ")
        )
    }

    /// Validate `batch` against `table` and insert every record.
    ///
    /// The first failing insert aborts the load. Rows inserted before it are
    /// only undone if the caller rolls back its transaction.
    pub async fn load<C: Connection>(
        &self,
        conn: &C,
        table: &str,
        batch: &RowBatch,
    ) -> Result<LoadReport> {
        let live = self.resolve(table)?;
        Self::validate(live, batch)?;

        let sql = Self::insert_sql(live, batch.columns());
        let mut inserted = 0;

        for (index, record) in batch.records().iter().enumerate() {
            let values: Vec<Option<&str>> = record.iter().map(|v| v.as_deref()).collect();
            let params: Vec<&(dyn ToSql + Sync)> = values
                .iter()
                .map(|v| v as &(dyn ToSql + Sync))
                .collect();

            inserted += conn
                .execute(&sql, &params)
                .await
                .map_err(|source| Error::LoadInsert {
                    table: live.name.clone(),
                    row: index + 1,
                    source,
                })?;
        }

        info!(
            table = %live.name,
            source = %batch.source().display(),
            inserted,
            "loaded rows"
        );

        Ok(LoadReport {
            table: live.name.clone(),
            inserted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LiveColumn;
    use crate::conn::testing::RecordingConn;

    const SAMPLE: &str = "id,name,number,other\n1,alpha,10,x\n2,beta,,y\n3,gamma,30,\n";

    fn sample_catalog() -> LiveCatalog {
        LiveCatalog::from_tables([LiveTable::new(
            "sample_table1",
            [
                LiveColumn::new("id", "integer", "int4"),
                LiveColumn::new("name", "text", "text"),
                LiveColumn::new("number", "integer", "int4"),
                LiveColumn::new("other", "text", "text"),
            ],
        )])
    }

    fn batch(data: &str) -> RowBatch {
        RowBatch::from_reader(data.as_bytes(), "sample.csv", b',').unwrap()
    }

    #[test]
    fn test_parse_batch() {
        let batch = batch(SAMPLE);
        assert_eq!(batch.columns(), ["id", "name", "number", "other"]);
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.records()[1][2], None);
        assert_eq!(batch.records()[2][3], None);
        assert_eq!(batch.records()[0][1].as_deref(), Some("alpha"));
    }

    #[test]
    fn test_parse_custom_delimiter() {
        let batch = RowBatch::from_reader("id;name\n1;a;b\n".as_bytes(), "x.csv", b';');
        assert!(matches!(batch, Err(Error::LoadParse { .. })));

        let batch = RowBatch::from_reader("id;name\n1;a\n".as_bytes(), "x.csv", b';').unwrap();
        assert_eq!(batch.columns(), ["id", "name"]);
    }

    #[test]
    fn test_parse_ragged_record_fails() {
        let err = RowBatch::from_reader("id,name\n1\n".as_bytes(), "bad.csv", b',').unwrap_err();
        assert!(matches!(err, Error::LoadParse { ref path, .. } if path == Path::new("bad.csv")));
    }

    #[test]
    fn test_parse_empty_input_fails() {
        let err = RowBatch::from_reader("".as_bytes(), "empty.csv", b',').unwrap_err();
        assert!(err.to_string().contains("missing header row"));
    }

    #[test]
    fn test_parse_duplicate_header_fails() {
        let err = RowBatch::from_reader("id,id\n1,2\n".as_bytes(), "dup.csv", b',').unwrap_err();
        assert!(err.to_string().contains("header names column `id` twice"));
    }

    #[test]
    fn test_from_path_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = RowBatch::from_path(dir.path().join("nope.csv"), b',').unwrap_err();
        assert!(matches!(err, Error::LoadParse { .. }));
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.csv");
        std::fs::write(&path, SAMPLE).unwrap();
        let batch = RowBatch::from_path(&path, b',').unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.source(), path.as_path());
    }

    #[test]
    fn test_validate_missing_column() {
        let catalog = sample_catalog();
        let table = catalog.get("sample_table1").unwrap();
        let err = Loader::validate(table, &batch("id,name,number\n")).unwrap_err();
        match err {
            Error::SchemaMismatch { missing, unexpected, .. } => {
                assert_eq!(missing, vec!["other"]);
                assert!(unexpected.is_empty());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validate_extra_column() {
        let catalog = sample_catalog();
        let table = catalog.get("sample_table1").unwrap();
        let err = Loader::validate(table, &batch("id,name,number,other,extra\n")).unwrap_err();
        match err {
            Error::SchemaMismatch { missing, unexpected, .. } => {
                assert!(missing.is_empty());
                assert_eq!(unexpected, vec!["extra"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validate_any_order() {
        let catalog = sample_catalog();
        let table = catalog.get("sample_table1").unwrap();
        Loader::validate(table, &batch("other,number,name,id\n")).unwrap();
    }

    #[test]
    fn test_insert_sql() {
        let catalog = sample_catalog();
        let table = catalog.get("sample_table1").unwrap();
        let sql = Loader::insert_sql(table, &["name".to_string(), "id".to_string()]);
        assert_eq!(
            sql,
            "INSERT INTO \"sample_table1\" (\"name\", \"id\") VALUES (CAST($1::TEXT AS \"text\"), CAST($2::TEXT AS \"int4\"));"
        );
    }

    #[tokio::test]
    async fn test_load_inserts_every_record() {
        let catalog = sample_catalog();
        let conn = RecordingConn::default();

        let report = Loader::new(&catalog)
            .load(&conn, "sample_table1", &batch(SAMPLE))
            .await
            .unwrap();

        assert_eq!(
            report,
            LoadReport {
                table: "sample_table1".to_string(),
                inserted: 3
            }
        );
        let sql = conn.sql();
        assert_eq!(sql.len(), 3);
        assert!(sql.iter().all(|s| s.starts_with("INSERT INTO \"sample_table1\"")));
        assert_eq!(
            conn.params()[1],
            vec!["Some(\"2\")", "Some(\"beta\")", "None", "Some(\"y\")"]
        );
    }

    #[tokio::test]
    async fn test_load_unknown_table() {
        let catalog = sample_catalog();
        let conn = RecordingConn::default();
        let err = Loader::new(&catalog)
            .load(&conn, "missing", &batch(SAMPLE))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnknownTable(ref t) if t == "missing"));
        assert!(conn.sql().is_empty());
    }

    #[tokio::test]
    async fn test_load_mismatch_inserts_nothing() {
        let catalog = sample_catalog();
        let conn = RecordingConn::default();
        let err = Loader::new(&catalog)
            .load(&conn, "sample_table1", &batch("id,name\n1,a\n"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch { .. }));
        assert!(conn.sql().is_empty());
    }

    #[tokio::test]
    async fn test_load_stops_at_failing_row() {
        let catalog = sample_catalog();
        let conn = RecordingConn::failing_at(1);
        let err = Loader::new(&catalog)
            .load(&conn, "sample_table1", &batch(SAMPLE))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::LoadInsert { ref table, row: 2, .. } if table == "sample_table1"
        ));
        assert_eq!(conn.sql().len(), 2);
    }
}
