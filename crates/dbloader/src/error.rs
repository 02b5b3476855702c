use std::path::PathBuf;
use thiserror::Error;

/// A driver error, boxed so the executor seam is not tied to one driver.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported column type `{type_name}` for column {column}")]
    UnsupportedType { column: String, type_name: String },

    #[error("invalid schema declaration: {0}")]
    InvalidSchema(String),

    #[error("table `{0}` does not exist in the database")]
    UnknownTable(String),

    #[error("failed to apply schema change to {}: {source}", describe_target(table, column.as_deref()))]
    SchemaApply {
        table: String,
        column: Option<String>,
        #[source]
        source: BoxError,
    },

    #[error(
        "columns of input do not match table `{table}` (missing: [{}], unexpected: [{}])",
        missing.join(", "),
        unexpected.join(", ")
    )]
    SchemaMismatch {
        table: String,
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("failed to parse {}: {message}", path.display())]
    LoadParse { path: PathBuf, message: String },

    #[error("failed to insert row {row} into `{table}`: {source}")]
    LoadInsert {
        table: String,
        row: usize,
        #[source]
        source: BoxError,
    },

    #[error("failed to read database catalog: {0}")]
    Catalog(#[from] tokio_postgres::Error),
}

fn describe_target(table: &str, column: Option<&str>) -> String {
    match column {
        Some(column) => format!("column `{table}.{column}`"),
        None => format!("table `{table}`"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_apply_message_names_column() {
        let err = Error::SchemaApply {
            table: "sample_table1".to_string(),
            column: Some("other".to_string()),
            source: "permission denied for table sample_table1".into(),
        };
        assert_eq!(
            err.to_string(),
            "failed to apply schema change to column `sample_table1.other`: permission denied for table sample_table1"
        );
    }

    #[test]
    fn test_schema_mismatch_message() {
        let err = Error::SchemaMismatch {
            table: "sample_table1".to_string(),
            missing: vec!["other".to_string()],
            unexpected: vec!["extra".to_string(), "more".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "columns of input do not match table `sample_table1` (missing: [other], unexpected: [extra, more])"
        );
    }
}
