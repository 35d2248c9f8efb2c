use std::sync::Arc;

use dfjit_core::jit::{Bindings, ExprInterpreter, Interpreter};
use dfjit_core::prelude::*;
use dfjit_core::{ColumnType, Jit, JitConfig, Sum, TypeRegistry};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

fn create_test_dataframe() -> DataFrame {
    df! {
        "x" => [1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0],
        "y" => [6.0f64, 5.0, 4.0, 3.0, 2.0, 1.0],
        "n" => [1i32, 2, 3, 4, 5, 6],
        "tag" => ["a", "b", "a", "b", "a", "b"]
    }
    .unwrap()
}

fn build(slots: usize) -> Interface {
    DataFrameBuilder::from_dataframe(create_test_dataframe())
        .jit(Arc::new(Jit::default()))
        .slots(slots)
        .build()
        .unwrap()
}

struct RecordingInterpreter {
    inner: ExprInterpreter,
    log: Arc<Mutex<Vec<String>>>,
}

impl Interpreter for RecordingInterpreter {
    fn declare(&mut self, code: &str) -> anyhow::Result<()> {
        self.log.lock().push(code.to_string());
        self.inner.declare(code)
    }

    fn calc(&mut self, code: &str, bindings: &Bindings) -> anyhow::Result<Option<Interface>> {
        self.log.lock().push(code.to_string());
        self.inner.calc(code, bindings)
    }

    fn process_line(&mut self, code: &str, bindings: &Bindings) -> anyhow::Result<()> {
        self.log.lock().push(code.to_string());
        self.inner.process_line(code, bindings)
    }
}

#[test]
fn test_filter_define_and_actions() {
    let root = build(3);
    let cut = root.filter("x > 4 || n == 1", "cut").unwrap();
    assert_eq!(cut.type_name(), "Interface<FilterNode_1>");

    let with_z = cut.define("z", "x * y").unwrap();
    assert_eq!(with_z.defined_columns(), &["z".to_string()]);
    assert!(root.defined_columns().is_empty());

    let count = cut.count().unwrap();
    let sum = with_z.sum("z").unwrap();
    let max = with_z.max("x").unwrap();
    let min = root.min("y").unwrap();

    assert_eq!(count.value().unwrap(), 3);
    assert_eq!(sum.value().unwrap(), 22.0);
    assert_eq!(max.value().unwrap(), 6.0);
    assert_eq!(min.value().unwrap(), 1.0);
    assert_eq!(root.manager().run_count(), 1);
}

#[test]
fn test_string_and_integer_columns() {
    let root = build(2);
    let tagged = root.filter("tag == \"a\" && n % 2 == 1", "odd_a").unwrap();
    assert_eq!(tagged.count().unwrap().value().unwrap(), 3);

    let ratio = root.define("half", "n / 2").unwrap();
    // integer division
    assert_eq!(ratio.sum("half").unwrap().value().unwrap(), 9.0);
}

#[test]
fn test_mean_of_empty_selection_is_nan() {
    let root = build(2);
    let none = root.filter("x > 100", "none").unwrap();
    let mean = none.mean("x").unwrap();
    assert!(mean.value().unwrap().is_nan());
    assert_eq!(none.count().unwrap().value().unwrap(), 0);
}

#[test]
fn test_default_columns() {
    let root = DataFrameBuilder::from_dataframe(create_test_dataframe())
        .jit(Arc::new(Jit::default()))
        .default_columns(["y", "x"])
        .slots(1)
        .build()
        .unwrap();

    assert_eq!(root.sum("").unwrap().value().unwrap(), 21.0);

    let err = DataFrameBuilder::from_dataframe(create_test_dataframe())
        .jit(Arc::new(Jit::default()))
        .build()
        .unwrap()
        .sum("")
        .unwrap_err();
    assert_eq!(err.to_string(), "1 column name is required but 0 were provided.");
}

#[test]
fn test_rust_callables() {
    let root = build(2);
    let big = root
        .filter_fn(&["x", "n"], "big", |args| {
            Ok(args[0].as_f64().unwrap_or(0.0) * args[1].as_f64().unwrap_or(0.0) > 10.0)
        })
        .unwrap();
    let labelled = big
        .define_fn("label", ColumnType::String, &["tag"], |args| {
            Ok(Value::string(format!("{}!", args[0].as_str().unwrap_or_default())))
        })
        .unwrap();
    let long_label = labelled.filter("label == \"b!\"", "b").unwrap();

    assert_eq!(big.count().unwrap().value().unwrap(), 3);
    assert_eq!(long_label.count().unwrap().value().unwrap(), 2);
}

#[test]
fn test_report_lists_named_filters() {
    let root = build(2);
    let first = root.filter("x > 2", "first").unwrap();
    let anonymous = first.filter("y > 1", "").unwrap();
    let last = anonymous.filter("n != 4", "last").unwrap();
    let _other = root.filter("x < 3", "other").unwrap();
    let _count = last.count().unwrap();

    let report = last.report().unwrap();
    let names: Vec<&str> = report.entries().iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["first", "last"]);
    let first_stats = report.get("first").unwrap();
    assert_eq!((first_stats.pass, first_stats.all), (4, 6));
    let last_stats = report.get("last").unwrap();
    assert_eq!((last_stats.pass, last_stats.all), (2, 3));
    assert_eq!(last_stats.efficiency(), 2.0 / 3.0 * 100.0);

    let text = report.to_string();
    assert!(text.starts_with("first     : pass=4"));
    assert!(text.contains("cumulative eff=33.33 %"));

    let full = root.report().unwrap();
    assert_eq!(full.entries().len(), 3);
    let other_stats = full.get("other").unwrap();
    assert_eq!((other_stats.pass, other_stats.all), (2, 6));
    assert_eq!(root.manager().run_count(), 1);
}

#[test]
fn test_generated_code() {
    let types = Arc::new(TypeRegistry::new());
    let log = Arc::new(Mutex::new(Vec::new()));
    let interpreter = RecordingInterpreter {
        inner: ExprInterpreter::new(Arc::clone(&types)),
        log: Arc::clone(&log),
    };
    let jit = Jit::with_interpreter(&JitConfig::default(), types, Box::new(interpreter));
    let root = DataFrameBuilder::from_dataframe(create_test_dataframe())
        .jit(Arc::new(jit))
        .slots(2)
        .build()
        .unwrap();

    let cut = root.filter("x > 1", "cut").unwrap();
    let _count = cut.count().unwrap();

    assert_eq!(
        *log.lock(),
        vec![
            "scope __dfjit_0 { x: double; }".to_string(),
            "scope __dfjit_0 { res = x > 1; }".to_string(),
            "Interface<FilterBase>(this::<Interface<RootNode_0>>(0).Filter(|x: &double| x > 1, [\"x\"], \"cut\"))".to_string(),
            "build_and_book::<CountAction>(node::<FilterNode_1>(0), [], 2, result::<unsigned long>(1))".to_string(),
        ]
    );
}

#[test]
fn test_failed_construction_leaves_graph_untouched() {
    let root = build(2);

    let err = root.define("bad", "x +").unwrap_err();
    assert!(matches!(
        &err,
        Error::Compilation { step, .. } if step == "Cannot interpret this expression"
    ));

    let err = root.filter("x + z > 1", "").unwrap_err();
    match err {
        Error::Compilation {
            step, diagnostic, ..
        } => {
            assert_eq!(step, "Cannot interpret this expression");
            assert_eq!(diagnostic, "use of undeclared identifier 'z'");
        }
        other => panic!("unexpected error {:?}", other),
    }

    let err = root.filter("tag", "").unwrap_err();
    assert!(matches!(
        &err,
        Error::Compilation { step, .. } if step == "Cannot interpret the invocation to Filter"
    ));

    assert!(matches!(root.define("x", "y"), Err(Error::Redefinition(_))));
    assert!(matches!(root.define("2x", "x"), Err(Error::InvalidColumnName(_))));

    assert!(root.manager().custom_column_names().is_empty());
    assert!(root.manager().filters().is_empty());
    assert!(!root.manager().has_pending_actions());
}

#[test]
fn test_unknown_columns_in_actions() {
    let root = build(2);
    let err = root.sum("missing").unwrap_err();
    assert_eq!(err.to_string(), "Unknown column: missing");

    let err = root
        .book::<Sum>(&["a".to_string(), "b".to_string()])
        .unwrap_err();
    assert_eq!(err.to_string(), "2 column names were provided but 1 was required.");
    assert!(!root.manager().has_pending_actions());
}

#[test]
fn test_data_source_columns_are_materialized() {
    let source = MemoryDataSource::new()
        .with_column(
            "w",
            ColumnType::Float64,
            [0.5, 1.5, 2.5, 0.0, 1.0, 2.0].into_iter().map(Value::Float).collect(),
        )
        .unwrap();
    let root = DataFrameBuilder::from_dataframe(create_test_dataframe())
        .data_source(source)
        .jit(Arc::new(Jit::default()))
        .slots(2)
        .build()
        .unwrap();

    assert!(root.column_names().contains(&"w".to_string()));
    let heavy = root.filter("w > 0.75", "heavy").unwrap();
    assert_eq!(heavy.defined_columns(), &["w".to_string()]);
    assert_eq!(root.manager().custom_column_names(), vec!["w"]);

    let weighted = heavy.define("xw", "x * w").unwrap();
    assert_eq!(weighted.sum("xw").unwrap().value().unwrap(), 2.0 * 1.5 + 3.0 * 2.5 + 5.0 + 12.0);

    // a second use does not define the column again
    let light = root.filter("w < 0.75", "light").unwrap();
    assert_eq!(light.count().unwrap().value().unwrap(), 2);
    assert_eq!(root.manager().custom_column_names(), vec!["w", "xw"]);
}

#[test]
fn test_mismatched_entry_counts() {
    let source = MemoryDataSource::new()
        .with_column("w", ColumnType::Float64, vec![Value::Float(1.0)])
        .unwrap();
    let err = DataFrameBuilder::from_dataframe(create_test_dataframe())
        .data_source(source)
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedOperation(_)));
}

#[test]
fn test_range() {
    let root = build(1);
    let some = root.range(1, 5, 2).unwrap();
    assert_eq!(some.sum("n").unwrap().value().unwrap(), 2.0 + 4.0);

    assert!(root.range(0, 0, 0).is_err());
    assert!(root.range(4, 2, 1).is_err());
    assert!(matches!(
        build(2).range(0, 10, 1),
        Err(Error::UnsupportedOperation(_))
    ));
}

#[test]
fn test_entries_without_dataset() {
    let root = DataFrameBuilder::new()
        .entries(42)
        .jit(Arc::new(Jit::default()))
        .slots(4)
        .build()
        .unwrap();
    let constant = root.define("one", "1").unwrap();
    assert_eq!(constant.sum("one").unwrap().value().unwrap(), 42.0);
    assert_eq!(root.count().unwrap().value().unwrap(), 42);
}

#[test]
fn test_rerun_after_new_booking() {
    let root = build(2);
    let cut = root.filter("x > 3", "cut").unwrap();
    assert_eq!(cut.count().unwrap().value().unwrap(), 3);

    let later = cut.sum("x").unwrap();
    assert!(!later.is_ready());
    assert_eq!(later.value().unwrap(), 15.0);
    assert_eq!(root.manager().run_count(), 2);
    let stats = root.report().unwrap();
    assert_eq!(stats.get("cut").map(|s| (s.pass, s.all)), Some((3, 6)));
}

#[test]
fn test_expressions_without_columns() {
    let root = build(2);
    let all = root.filter("true", "all").unwrap();
    let scaled = all.define("two", "1 + 1").unwrap();
    assert_eq!(scaled.sum("two").unwrap().value().unwrap(), 12.0);
    let report = root.report().unwrap();
    assert_eq!(report.get("all").map(|s| (s.pass, s.all)), Some((6, 6)));
}

#[test]
fn test_report_counts_filters_without_actions() {
    let root = build(2);
    let _a = root.filter("x > 1", "a").unwrap();
    let report = root.report().unwrap();
    assert_eq!(report.get("a").map(|s| (s.pass, s.all)), Some((5, 6)));

    // a filter added after the last run is counted by the next report
    let _b = root.filter("x > 2", "b").unwrap();
    let report = root.report().unwrap();
    assert_eq!(report.get("a").map(|s| (s.pass, s.all)), Some((5, 6)));
    assert_eq!(report.get("b").map(|s| (s.pass, s.all)), Some((4, 6)));
    assert_eq!(root.manager().run_count(), 2);
}

#[test]
fn test_rerun_on_other_branch_keeps_counts() {
    let root = build(3);
    let a = root.filter("x > 1", "a").unwrap();
    assert_eq!(a.count().unwrap().value().unwrap(), 5);

    let b = root.filter("x > 2", "b").unwrap();
    assert_eq!(b.count().unwrap().value().unwrap(), 4);

    let report = root.report().unwrap();
    assert_eq!(report.get("a").map(|s| (s.pass, s.all)), Some((5, 6)));
    assert_eq!(report.get("b").map(|s| (s.pass, s.all)), Some((4, 6)));
    assert_eq!(root.manager().run_count(), 2);
}

#[test]
fn test_column_named_like_check_binding() {
    let df = df! {
        "res" => [0.5f64, 1.5, 2.5],
        "x" => [1.0f64, 2.0, 3.0]
    }
    .unwrap();
    let root = DataFrameBuilder::from_dataframe(df)
        .jit(Arc::new(Jit::default()))
        .slots(1)
        .build()
        .unwrap();

    let cut = root.filter("res > 1", "cut").unwrap();
    assert_eq!(cut.count().unwrap().value().unwrap(), 2);
    let shifted = root.define("res2", "res + x").unwrap();
    assert_eq!(shifted.sum("res2").unwrap().value().unwrap(), 10.5);
}

#[test]
fn test_failed_booking_keeps_data_source_columns_undefined() {
    let source = MemoryDataSource::new()
        .with_column(
            "label",
            ColumnType::String,
            ["a", "b", "c", "d", "e", "f"].into_iter().map(Value::string).collect(),
        )
        .unwrap();
    let root = DataFrameBuilder::from_dataframe(create_test_dataframe())
        .data_source(source)
        .jit(Arc::new(Jit::default()))
        .slots(2)
        .build()
        .unwrap();

    assert!(root.sum("label").is_err());
    assert!(root.manager().custom_column_names().is_empty());
    assert!(!root.manager().has_pending_actions());
}
