//! Command-line interface for dfjit
//!
//! Argument parsing for the `dfjit` binary. Expressions given on the command
//! line are compiled into a processing graph over a CSV file.

use clap::Parser;
use std::path::PathBuf;

/// dfjit - Text-expression filters and derived columns over CSV files
#[derive(Parser, Debug)]
#[command(name = "dfjit")]
#[command(author, version, about)]
#[command(
    long_about = "dfjit - Text-expression filters and derived columns over CSV files\n\n\
    Columns are defined first, then filters are chained in the order given.\n\
    Every requested action is booked before the single event loop runs."
)]
#[command(after_help = "EXAMPLES:\n  \
    # Count the rows passing a cut\n  \
    dfjit events.csv --filter 'pt > 20' --count\n\n  \
    # Derive a column and average it after two cuts\n  \
    dfjit events.csv --define 'pt2=pt * pt' --filter 'abs(eta) < 2.4' --filter 'pt > 20' --mean pt2\n\n  \
    # Print the cut-flow report\n  \
    dfjit events.csv --filter 'pt > 20' --report")]
#[command(propagate_version = true)]
pub struct Cli {
    /// CSV file to process
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// Filter expression, applied in order (repeatable)
    #[arg(long = "filter", value_name = "EXPR", action = clap::ArgAction::Append)]
    pub filters: Vec<String>,

    /// Derived column as NAME=EXPR (repeatable)
    #[arg(long = "define", value_name = "NAME=EXPR", value_parser = parse_define, action = clap::ArgAction::Append)]
    pub defines: Vec<(String, String)>,

    /// Count the selected rows
    #[arg(long)]
    pub count: bool,

    /// Sum a column over the selected rows
    #[arg(long, value_name = "COL")]
    pub sum: Option<String>,

    /// Mean of a column over the selected rows
    #[arg(long, value_name = "COL")]
    pub mean: Option<String>,

    /// Minimum of a column over the selected rows
    #[arg(long, value_name = "COL")]
    pub min: Option<String>,

    /// Maximum of a column over the selected rows
    #[arg(long, value_name = "COL")]
    pub max: Option<String>,

    /// Number of parallel slots (0 = one per thread)
    #[arg(long, value_name = "N")]
    pub slots: Option<usize>,

    /// Configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the filter report
    #[arg(long)]
    pub report: bool,

    /// Verbose output (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    /// Name given to the filter at `index` in the report
    pub fn filter_name(index: usize) -> String {
        format!("filter_{}", index + 1)
    }

    /// True when nothing would be printed
    pub fn has_no_output(&self) -> bool {
        !self.count
            && !self.report
            && self.sum.is_none()
            && self.mean.is_none()
            && self.min.is_none()
            && self.max.is_none()
    }
}

fn parse_define(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, expression)) if !name.trim().is_empty() && !expression.trim().is_empty() => {
            Ok((name.trim().to_string(), expression.trim().to_string()))
        }
        _ => Err(format!("expected NAME=EXPR, got '{}'", s)),
    }
}

/// Parse command-line arguments
pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Parse arguments from an iterator (useful for testing)
pub fn parse_args_from<I, T>(args: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(args)
}
