use std::any::TypeId;

use dfjit_core::{
    find_undefined_ds_columns, find_used_column_names, get_validated_column_names,
    jit_build_and_book, ColumnCatalog, ColumnType, Error, TypeRegistry,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

struct HistoAction;
struct Th1d;

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_columns_used_by_an_expression() {
    let used = find_used_column_names(
        "x + y > max_val",
        &["max_val"],
        &["x", "y", "z"],
        &[] as &[&str],
    );
    assert_eq!(used, names(&["max_val", "x", "y"]));

    let used = find_used_column_names("x + y > max_val", &[] as &[&str], &["x", "y", "max_val"], &[]);
    assert_eq!(used, names(&["x", "y", "max_val"]));
}

#[test]
fn test_partial_tokens_do_not_match() {
    let used = find_used_column_names("x + y > max_val", &["x", "y"], &["max_val", "z"], &["max"]);
    assert_eq!(used, names(&["x", "y", "max_val"]));

    let used = find_used_column_names("max(w, max_val)", &["w"], &["z"], &["max_val", "w", "max"]);
    assert_eq!(used, names(&["w", "max_val", "max"]));
}

#[test]
fn test_default_columns_fill_arity() {
    let catalog = ColumnCatalog::new()
        .with_dataset("a", Some(ColumnType::Float64))
        .with_dataset("b", Some(ColumnType::Float64))
        .with_dataset("c", Some(ColumnType::Float64));
    let selected = get_validated_column_names(&names(&["a", "b", "c"]), 2, &[], &catalog).unwrap();
    assert_eq!(selected, names(&["a", "b"]));
}

#[test]
fn test_too_few_supplied_columns() {
    let catalog = ColumnCatalog::new().with_dataset("q", Some(ColumnType::Int32));
    let err = get_validated_column_names(&[], 2, &names(&["q"]), &catalog).unwrap_err();
    assert!(matches!(err, Error::ColumnCountMismatch { required: 2, provided: 1, .. }));
    assert_eq!(err.to_string(), "1 column name was provided but 2 were required.");
}

#[test]
fn test_histogram_builder_call() {
    let types = TypeRegistry::empty();
    types.register_type::<HistoAction>("HistoAction");
    types.register_type::<Th1d>("TH1D");
    let catalog = ColumnCatalog::new()
        .with_dataset("pt", Some(ColumnType::Float64))
        .with_dataset("eta", Some(ColumnType::Float64));

    let code = jit_build_and_book(
        &names(&["pt", "eta"]),
        "FilterNode_7",
        0,
        TypeId::of::<Th1d>(),
        TypeId::of::<HistoAction>(),
        0,
        4,
        &catalog,
        &types,
    )
    .unwrap();

    assert!(code.starts_with("build_and_book::<HistoAction, double, double>("));
    assert!(code.contains(", 4, "));
    assert!(code.contains("\"pt\"") && code.contains("\"eta\""));
}

fn identifier() -> impl Strategy<Value = String> {
    "[a-z_][a-z0-9_]{0,6}"
}

proptest! {
    #[test]
    fn prop_used_columns_are_known_and_unique(
        custom in prop::collection::vec(identifier(), 0..4),
        dataset in prop::collection::vec(identifier(), 0..4),
        data_source in prop::collection::vec(identifier(), 0..4),
        mentioned in prop::collection::vec(identifier(), 0..6),
    ) {
        let expression = mentioned.join(" + ");
        let used = find_used_column_names(&expression, &custom, &dataset, &data_source);

        for (i, name) in used.iter().enumerate() {
            prop_assert!(custom.contains(name) || dataset.contains(name) || data_source.contains(name));
            prop_assert!(mentioned.contains(name));
            prop_assert!(!used[..i].contains(name));
        }
        for name in custom.iter().chain(&dataset).chain(&data_source) {
            if mentioned.contains(name) {
                prop_assert!(used.contains(name));
            }
        }
    }

    #[test]
    fn prop_namespace_precedence(
        custom in prop::collection::vec(identifier(), 1..4),
        dataset in prop::collection::vec(identifier(), 1..4),
        data_source in prop::collection::vec(identifier(), 1..4),
    ) {
        let expression = data_source
            .iter()
            .chain(&dataset)
            .chain(&custom)
            .cloned()
            .collect::<Vec<_>>()
            .join(" * ");
        let used = find_used_column_names(&expression, &custom, &dataset, &data_source);

        let mut expected: Vec<String> = Vec::new();
        for name in custom.iter().chain(&dataset).chain(&data_source) {
            if !expected.contains(name) {
                expected.push(name.clone());
            }
        }
        prop_assert_eq!(used, expected);
    }

    #[test]
    fn prop_substrings_never_match(name in identifier(), suffix in "[a-z0-9]{1,4}") {
        let expression = format!("{}{} > 1", name, suffix);
        let used = find_used_column_names(&expression, &[name.as_str()], &[], &[]);
        prop_assert!(used.is_empty());
    }

    #[test]
    fn prop_selection_respects_arity(
        defaults in prop::collection::vec(identifier(), 0..5),
        n in 0usize..5,
    ) {
        let mut catalog = ColumnCatalog::new();
        for name in &defaults {
            catalog = catalog.with_dataset(name.clone(), Some(ColumnType::Float64));
        }
        match get_validated_column_names(&defaults, n, &[], &catalog) {
            Ok(selected) => {
                prop_assert_eq!(selected.len(), n);
                prop_assert_eq!(&selected[..], &defaults[..n]);
            }
            Err(Error::ColumnCountMismatch { required, provided, .. }) => {
                prop_assert!(defaults.len() < n);
                prop_assert_eq!(required, n);
                prop_assert_eq!(provided, defaults.len());
            }
            Err(other) => prop_assert!(false, "unexpected error {}", other),
        }
    }

    #[test]
    fn prop_undefined_flags(
        requested in prop::collection::vec(identifier(), 0..6),
        defined in prop::collection::vec(identifier(), 0..6),
    ) {
        let flags = find_undefined_ds_columns(&requested, &defined);
        prop_assert_eq!(flags.len(), requested.len());
        for (name, flag) in requested.iter().zip(flags) {
            prop_assert_eq!(flag, !defined.contains(name));
        }
    }
}
