//! Column resolution and validation
//!
//! A column name resolves in one of three namespaces, searched in this
//! order: custom (derived) columns, dataset-native columns and data-source
//! columns. The functions here are pure and run while the graph is built.

use std::collections::HashSet;

use dfjit_parser::identifier_tokens;
use dfjit_shared::ColumnType;
use indexmap::IndexMap;

use crate::error::{Error, Result};

/// The column names and declared types visible from one graph node
#[derive(Debug, Clone, Default)]
pub struct ColumnCatalog {
    custom: IndexMap<String, ColumnType>,
    dataset: IndexMap<String, Option<ColumnType>>,
    data_source: IndexMap<String, Option<ColumnType>>,
}

impl ColumnCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a custom column
    #[must_use]
    pub fn with_custom(mut self, name: impl Into<String>, ty: ColumnType) -> Self {
        self.custom.insert(name.into(), ty);
        self
    }

    /// Add a dataset-native column; `None` marks a type with no generatable name
    #[must_use]
    pub fn with_dataset(mut self, name: impl Into<String>, ty: Option<ColumnType>) -> Self {
        self.dataset.insert(name.into(), ty);
        self
    }

    /// Add a data-source column
    #[must_use]
    pub fn with_data_source(mut self, name: impl Into<String>, ty: Option<ColumnType>) -> Self {
        self.data_source.insert(name.into(), ty);
        self
    }

    /// Custom column names in definition order
    pub fn custom_names(&self) -> Vec<&str> {
        self.custom.keys().map(String::as_str).collect()
    }

    /// Dataset-native column names in schema order
    pub fn dataset_names(&self) -> Vec<&str> {
        self.dataset.keys().map(String::as_str).collect()
    }

    /// Data-source column names
    pub fn data_source_names(&self) -> Vec<&str> {
        self.data_source.keys().map(String::as_str).collect()
    }

    /// Whether the name exists in any namespace
    pub fn contains(&self, name: &str) -> bool {
        self.custom.contains_key(name)
            || self.dataset.contains_key(name)
            || self.data_source.contains_key(name)
    }

    /// Whether the name resolves to a data-source column
    pub fn is_data_source_column(&self, name: &str) -> bool {
        !self.custom.contains_key(name)
            && !self.dataset.contains_key(name)
            && self.data_source.contains_key(name)
    }

    /// Declared type of a column, custom first, then dataset, then data source
    pub fn type_of(&self, name: &str) -> Option<ColumnType> {
        if let Some(ty) = self.custom.get(name) {
            return Some(*ty);
        }
        if let Some(ty) = self.dataset.get(name) {
            return *ty;
        }
        self.data_source.get(name).copied().flatten()
    }

    /// Every visible column name, deduplicated, in resolution order
    pub fn all_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.custom
            .keys()
            .chain(self.dataset.keys())
            .chain(self.data_source.keys())
            .filter(|name| seen.insert(name.as_str()))
            .cloned()
            .collect()
    }
}

/// Find the known column names an expression mentions
///
/// A name matches when it appears as a whole identifier token. Results are
/// ordered custom, then dataset, then data source (each in its own list
/// order) and a name is reported once even when it lives in several
/// namespaces.
pub fn find_used_column_names<S: AsRef<str>>(
    expression: &str,
    custom: &[S],
    dataset: &[S],
    data_source: &[S],
) -> Vec<String> {
    let tokens: HashSet<&str> = identifier_tokens(expression).collect();
    let mut used: Vec<String> = Vec::new();
    for name in custom.iter().chain(dataset).chain(data_source) {
        let name = name.as_ref();
        if tokens.contains(name) && !used.iter().any(|u| u == name) {
            used.push(name.to_string());
        }
    }
    used
}

fn plural(n: usize, singular: &'static str, plural: &'static str) -> &'static str {
    if n == 1 {
        singular
    } else {
        plural
    }
}

/// Choose the columns an operation of arity `n_required` works on
///
/// Explicitly supplied names must match the arity exactly. With none
/// supplied, the first `n_required` default columns are taken.
pub fn select_columns(
    n_required: usize,
    supplied: &[String],
    default_columns: &[String],
) -> Result<Vec<String>> {
    if supplied.is_empty() {
        if default_columns.len() < n_required {
            let provided = default_columns.len();
            return Err(Error::ColumnCountMismatch {
                required: n_required,
                provided,
                message: format!(
                    "{} column {} {} required but {} {} provided.",
                    n_required,
                    plural(n_required, "name", "names"),
                    plural(n_required, "is", "are"),
                    provided,
                    plural(provided, "was", "were"),
                ),
            });
        }
        return Ok(default_columns[..n_required].to_vec());
    }

    if supplied.len() != n_required {
        let provided = supplied.len();
        return Err(Error::ColumnCountMismatch {
            required: n_required,
            provided,
            message: format!(
                "{} column {} {} provided but {} {} required.",
                provided,
                plural(provided, "name", "names"),
                plural(provided, "was", "were"),
                n_required,
                plural(n_required, "was", "were"),
            ),
        });
    }
    Ok(supplied.to_vec())
}

/// Names from `selected` that resolve in no namespace, each reported once
pub fn find_unknown_columns(selected: &[String], catalog: &ColumnCatalog) -> Vec<String> {
    let mut unknown: Vec<String> = Vec::new();
    for name in selected {
        if !catalog.contains(name) && !unknown.contains(name) {
            unknown.push(name.clone());
        }
    }
    unknown
}

/// Select and validate the columns of an operation
pub fn get_validated_column_names(
    default_columns: &[String],
    n_required: usize,
    supplied: &[String],
    catalog: &ColumnCatalog,
) -> Result<Vec<String>> {
    let selected = select_columns(n_required, supplied, default_columns)?;
    let unknown = find_unknown_columns(&selected, catalog);
    if !unknown.is_empty() {
        return Err(Error::UnknownColumn(unknown));
    }
    Ok(selected)
}

/// For each requested data-source column, whether it still has to be defined
pub fn find_undefined_ds_columns<S: AsRef<str>>(requested: &[S], defined: &[S]) -> Vec<bool> {
    requested
        .iter()
        .map(|name| !defined.iter().any(|d| d.as_ref() == name.as_ref()))
        .collect()
}

/// Generatable type name of a column
pub fn column_type_name(name: &str, catalog: &ColumnCatalog) -> Result<String> {
    catalog
        .type_of(name)
        .map(|ty| ty.name().to_string())
        .ok_or_else(|| {
            Error::TypeResolution(format!(
                "The type of column {} could not be guessed. Please specify one.",
                name
            ))
        })
}

/// Whether `name` can be used as a column placeholder in generated code
pub fn is_valid_column_name(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_well = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    starts_well
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !["true", "false", "and", "or", "not"].contains(&name)
}

/// Check that a new derived column can be added under `name`
pub fn check_custom_column(name: &str, catalog: &ColumnCatalog) -> Result<()> {
    if !is_valid_column_name(name) {
        return Err(Error::InvalidColumnName(name.to_string()));
    }
    if catalog.contains(name) {
        return Err(Error::Redefinition(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn catalog() -> ColumnCatalog {
        ColumnCatalog::new()
            .with_custom("x", ColumnType::Float64)
            .with_dataset("y", Some(ColumnType::Float64))
            .with_dataset("max_val", Some(ColumnType::Int32))
            .with_dataset("when", None)
            .with_data_source("ds_pt", Some(ColumnType::Float32))
    }

    #[test]
    fn test_find_used_column_names_orders_by_namespace() {
        let used = find_used_column_names("x + y > max_val", &["x"], &["y", "max_val"], &[]);
        assert_eq!(used, names(&["x", "y", "max_val"]));
    }

    #[test]
    fn test_find_used_column_names_whole_tokens() {
        let used = find_used_column_names("xx + x_1", &["x"], &["xx"], &[]);
        assert_eq!(used, names(&["xx"]));
    }

    #[test]
    fn test_find_used_column_names_dedups_across_namespaces() {
        let used = find_used_column_names("pt * 2", &["pt"], &["pt", "eta"], &["pt"]);
        assert_eq!(used, names(&["pt"]));
        let none = find_used_column_names("1 + 2", &["pt"], &["eta"], &["phi"]);
        assert!(none.is_empty());
    }

    #[test]
    fn test_select_columns_defaults() {
        let defaults = names(&["a", "b", "c"]);
        assert_eq!(select_columns(2, &[], &defaults).unwrap(), names(&["a", "b"]));
        assert_eq!(select_columns(0, &[], &[]).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn test_select_columns_count_messages() {
        let err = select_columns(2, &names(&["q"]), &[]).unwrap_err();
        assert_eq!(err.to_string(), "1 column name was provided but 2 were required.");

        let err = select_columns(2, &[], &names(&["a"])).unwrap_err();
        assert_eq!(err.to_string(), "2 column names are required but 1 was provided.");

        let err = select_columns(1, &names(&["a", "b"]), &[]).unwrap_err();
        assert_eq!(err.to_string(), "2 column names were provided but 1 was required.");
    }

    #[test]
    fn test_get_validated_column_names() {
        let cat = catalog();
        let cols = get_validated_column_names(&[], 2, &names(&["x", "ds_pt"]), &cat).unwrap();
        assert_eq!(cols, names(&["x", "ds_pt"]));

        let err = get_validated_column_names(&[], 1, &names(&["a"]), &cat).unwrap_err();
        assert_eq!(err.to_string(), "Unknown column: a");

        let err = get_validated_column_names(&[], 3, &names(&["a", "b", "a"]), &cat).unwrap_err();
        match err {
            Error::UnknownColumn(unknown) => assert_eq!(unknown, names(&["a", "b"])),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_find_undefined_ds_columns() {
        assert_eq!(
            find_undefined_ds_columns(&["a", "b", "c"], &["b"]),
            vec![true, false, true]
        );
        assert!(find_undefined_ds_columns::<&str>(&[], &["a"]).is_empty());
    }

    #[test]
    fn test_column_type_name() {
        let cat = catalog();
        assert_eq!(column_type_name("x", &cat).unwrap(), "double");
        assert_eq!(column_type_name("max_val", &cat).unwrap(), "int");
        assert_eq!(column_type_name("ds_pt", &cat).unwrap(), "float");
        let err = column_type_name("when", &cat).unwrap_err();
        assert_eq!(
            err.to_string(),
            "The type of column when could not be guessed. Please specify one."
        );
    }

    #[test]
    fn test_custom_column_precedence() {
        let cat = ColumnCatalog::new()
            .with_custom("pt", ColumnType::Int64)
            .with_dataset("pt", Some(ColumnType::Float64));
        assert_eq!(cat.type_of("pt"), Some(ColumnType::Int64));
        assert_eq!(cat.all_names(), names(&["pt"]));
        assert!(!cat.is_data_source_column("pt"));
    }

    #[test]
    fn test_check_custom_column() {
        let cat = catalog();
        assert!(check_custom_column("z", &cat).is_ok());
        assert!(matches!(
            check_custom_column("y", &cat),
            Err(Error::Redefinition(_))
        ));
        assert!(matches!(
            check_custom_column("ds_pt", &cat),
            Err(Error::Redefinition(_))
        ));
        assert!(matches!(
            check_custom_column("1st", &cat),
            Err(Error::InvalidColumnName(_))
        ));
        assert!(matches!(
            check_custom_column("and", &cat),
            Err(Error::InvalidColumnName(_))
        ));
    }
}
