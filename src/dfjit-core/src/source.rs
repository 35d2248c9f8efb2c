//! Dataset and data-source access
//!
//! The event loop reads dataset-native columns through [`Dataset`] and
//! pluggable columns through [`DataSource`]. [`DataFrameDataset`] wraps a
//! polars `DataFrame`, [`MemoryDataSource`] keeps typed columns in memory.

use dfjit_shared::{ColumnType, Value};
use indexmap::IndexMap;
use polars::prelude::*;

use crate::error::{Error, Result};

/// A dataset with a fixed schema
pub trait Dataset: Send + Sync {
    /// Column names in schema order
    fn column_names(&self) -> Vec<String>;

    /// Declared type of a column, `None` when it has no generatable name
    fn column_type(&self, name: &str) -> Option<ColumnType>;

    /// Number of entries
    fn entries(&self) -> usize;

    /// Value of a column at one entry
    fn value(&self, name: &str, entry: usize) -> Result<Value>;

    /// Whether the schema has a column called `name`
    fn has_column(&self, name: &str) -> bool {
        self.column_names().iter().any(|column| column == name)
    }
}

/// A pluggable, typed column provider
///
/// Data-source columns are not read directly: the graph materializes each
/// one as a custom column the first time an operation uses it.
pub trait DataSource: Send + Sync {
    /// Column names the source provides
    fn column_names(&self) -> Vec<String>;

    /// Declared type of a column
    fn column_type(&self, name: &str) -> Option<ColumnType>;

    /// Number of entries
    fn entries(&self) -> usize;

    /// Value of a column at one entry
    fn value(&self, name: &str, entry: usize) -> Result<Value>;
}

/// Map a polars data type to a column type
pub fn column_type_of(dtype: &DataType) -> Option<ColumnType> {
    match dtype {
        DataType::Boolean => Some(ColumnType::Bool),
        DataType::Int32 => Some(ColumnType::Int32),
        DataType::Int64 => Some(ColumnType::Int64),
        DataType::UInt32 => Some(ColumnType::UInt32),
        DataType::UInt64 => Some(ColumnType::UInt64),
        DataType::Float32 => Some(ColumnType::Float32),
        DataType::Float64 => Some(ColumnType::Float64),
        DataType::String => Some(ColumnType::String),
        _ => None,
    }
}

/// Convert a polars value to a [`Value`]
pub fn any_value_to_value(value: AnyValue<'_>) -> Result<Value> {
    let converted = match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(b),
        AnyValue::Int32(i) => Value::Int(i64::from(i)),
        AnyValue::Int64(i) => Value::Int(i),
        AnyValue::UInt32(u) => Value::UInt(u64::from(u)),
        AnyValue::UInt64(u) => Value::UInt(u),
        AnyValue::Float32(f) => Value::Float(f64::from(f)),
        AnyValue::Float64(f) => Value::Float(f),
        AnyValue::String(s) => Value::String(s.to_string()),
        AnyValue::StringOwned(s) => Value::String(s.to_string()),
        other => {
            return Err(Error::unsupported(format!(
                "values of type {} cannot be read",
                other.dtype()
            )))
        }
    };
    Ok(converted)
}

/// A dataset backed by a polars `DataFrame`
#[derive(Debug, Clone)]
pub struct DataFrameDataset {
    df: DataFrame,
}

impl DataFrameDataset {
    /// Wrap a `DataFrame`
    pub fn new(df: DataFrame) -> Self {
        Self { df }
    }

    /// The wrapped `DataFrame`
    pub fn dataframe(&self) -> &DataFrame {
        &self.df
    }
}

impl From<DataFrame> for DataFrameDataset {
    fn from(df: DataFrame) -> Self {
        Self::new(df)
    }
}

impl Dataset for DataFrameDataset {
    fn column_names(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    }

    fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.df
            .column(name)
            .ok()
            .and_then(|column| column_type_of(column.dtype()))
    }

    fn entries(&self) -> usize {
        self.df.height()
    }

    fn has_column(&self, name: &str) -> bool {
        self.df.column(name).is_ok()
    }

    fn value(&self, name: &str, entry: usize) -> Result<Value> {
        let column = self.df.column(name)?;
        any_value_to_value(column.get(entry)?)
    }
}

/// An in-memory data source with typed columns
#[derive(Debug, Clone, Default)]
pub struct MemoryDataSource {
    columns: IndexMap<String, (ColumnType, Vec<Value>)>,
}

impl MemoryDataSource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column; values are converted to the declared type
    pub fn with_column(
        mut self,
        name: impl Into<String>,
        ty: ColumnType,
        values: Vec<Value>,
    ) -> Result<Self> {
        let values = values
            .into_iter()
            .map(|v| ty.coerce(v))
            .collect::<anyhow::Result<Vec<_>>>()?;
        self.columns.insert(name.into(), (ty, values));
        Ok(self)
    }
}

impl DataSource for MemoryDataSource {
    fn column_names(&self) -> Vec<String> {
        self.columns.keys().cloned().collect()
    }

    fn column_type(&self, name: &str) -> Option<ColumnType> {
        self.columns.get(name).map(|(ty, _)| *ty)
    }

    fn entries(&self) -> usize {
        self.columns
            .values()
            .map(|(_, values)| values.len())
            .max()
            .unwrap_or(0)
    }

    fn value(&self, name: &str, entry: usize) -> Result<Value> {
        let (_, values) = self
            .columns
            .get(name)
            .ok_or_else(|| Error::UnknownColumn(vec![name.to_string()]))?;
        Ok(values.get(entry).cloned().unwrap_or(Value::Null))
    }
}
