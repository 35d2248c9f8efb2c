mod cli;

use crate::cli::{parse_args, Cli};
use dfjit_core::prelude::*;
use polars::prelude::{CsvReadOptions, SerReader};
use std::path::Path;
use std::process;

type Aggregate = fn(&Interface, &str) -> Result<ResultHandle<f64>>;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = parse_args();
    setup_logging(args.verbose);

    let mut config = Config::load()?;
    if let Some(config_path) = &args.config {
        config.merge_file(config_path)?;
    }
    if let Some(slots) = args.slots {
        config.execution.slots = slots;
    }
    dfjit_core::validate_config(&config)?;

    let df = read_csv(&args.input)?;
    log::info!(
        "loaded {} rows and {} columns from {}",
        df.height(),
        df.width(),
        args.input.display()
    );

    let root = DataFrameBuilder::from_dataframe(df).config(config).build()?;
    let selected = build_selection(&root, &args)?;

    if args.has_no_output() {
        log::warn!("no action requested; the graph is built but never run");
        return Ok(());
    }

    // book everything before the first value is read so the loop runs once
    let count = args.count.then(|| selected.count()).transpose()?;
    let aggregates: [(&str, &Option<String>, Aggregate); 4] = [
        ("sum", &args.sum, Interface::sum),
        ("mean", &args.mean, Interface::mean),
        ("min", &args.min, Interface::min),
        ("max", &args.max, Interface::max),
    ];
    let mut stats = Vec::new();
    for (label, column, book) in aggregates {
        if let Some(column) = column {
            stats.push((label, column, book(&selected, column)?));
        }
    }

    if let Some(count) = count {
        println!("count: {}", count.value()?);
    }
    for (label, column, handle) in stats {
        println!("{}({}): {}", label, column, handle.value()?);
    }
    if args.report {
        print!("{}", selected.report()?);
    }
    Ok(())
}

fn setup_logging(verbosity: u8) {
    let log_level = match verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new().filter_level(log_level).init();
}

fn read_csv(path: &Path) -> Result<DataFrame> {
    if !path.exists() {
        return Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} does not exist", path.display()),
        )));
    }
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(df)
}

/// Defines every column, then chains the filters in order
fn build_selection(root: &Interface, args: &Cli) -> Result<Interface> {
    let mut current = root.clone();
    for (name, expression) in &args.defines {
        log::debug!("define {} = {}", name, expression);
        current = current.define(name, expression)?;
    }
    for (index, expression) in args.filters.iter().enumerate() {
        log::debug!("filter {}", expression);
        current = current.filter(expression, &Cli::filter_name(index))?;
    }
    Ok(current)
}
