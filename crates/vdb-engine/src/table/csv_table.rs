//! CSV-backed table source.

use std::path::PathBuf;

use vdb_sql_core::ast::{DataType, Expr};

use super::{Scan, Table};
use crate::error::{EngineError, Result};
use crate::row::{ColumnDef, Row, SourceRow};
use crate::value::Value;

/// A read-only table streaming rows from a delimited file.
///
/// The schema comes from the header row; column types are supplied by the
/// caller (missing entries default to TEXT). The file cannot present
/// stable row ids, so mutation is refused rather than re-derived.
pub struct CsvTable {
    path: PathBuf,
    delimiter: u8,
    schema: Vec<ColumnDef>,
}

impl CsvTable {
    /// Opens a comma-delimited file, reading the header to build the
    /// schema. `types` assigns a type per header name; unnamed columns
    /// default to TEXT.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be opened or has no header.
    pub fn open(path: impl Into<PathBuf>, types: &[(&str, DataType)]) -> Result<Self> {
        Self::open_delimited(path, b',', types)
    }

    /// Opens a file with an explicit delimiter.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be opened or has no header.
    pub fn open_delimited(
        path: impl Into<PathBuf>,
        delimiter: u8,
        types: &[(&str, DataType)],
    ) -> Result<Self> {
        let path = path.into();
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .from_path(&path)?;
        let headers = reader.headers()?.clone();
        if headers.is_empty() {
            return Err(EngineError::runtime(format!(
                "csv file has no header: {}",
                path.display()
            )));
        }

        let schema = headers
            .iter()
            .map(|name| {
                let ty = types
                    .iter()
                    .find(|(n, _)| n.eq_ignore_ascii_case(name))
                    .map_or(DataType::Text, |(_, ty)| *ty);
                ColumnDef::new(name, ty)
            })
            .collect();

        Ok(Self {
            path,
            delimiter,
            schema,
        })
    }

    fn coerce(ty: DataType, field: &str) -> Value {
        if field.is_empty() {
            return Value::Null;
        }
        match ty {
            DataType::Integer => field
                .parse::<i64>()
                .map_or_else(|_| Value::Text(String::from(field)), Value::Integer),
            DataType::Real => field
                .parse::<f64>()
                .map_or_else(|_| Value::Text(String::from(field)), Value::Float),
            DataType::Boolean => match field {
                "0" => Value::Boolean(false),
                "1" => Value::Boolean(true),
                other => match other.to_ascii_lowercase().as_str() {
                    "true" => Value::Boolean(true),
                    "false" => Value::Boolean(false),
                    _ => Value::Text(String::from(field)),
                },
            },
            DataType::Blob => Value::Blob(field.as_bytes().to_vec()),
            DataType::Text | DataType::Date | DataType::Datetime => {
                Value::Text(String::from(field))
            }
        }
    }
}

impl Table for CsvTable {
    fn schema(&self) -> &[ColumnDef] {
        &self.schema
    }

    fn scan(&self, _filter_hint: Option<&Expr>) -> Result<Scan> {
        let reader = csv::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .from_path(&self.path)?;
        let schema = self.schema.clone();

        let rows = reader.into_records().map(move |record| {
            let record = record?;
            let pairs = schema
                .iter()
                .enumerate()
                .map(|(i, col)| {
                    let field = record.get(i).unwrap_or("");
                    (col.name.clone(), Self::coerce(col.ty, field))
                })
                .collect();
            Ok(SourceRow::anonymous(Row::from_pairs(pairs)))
        });

        Ok(Scan::unordered(Box::new(rows)))
    }
}
