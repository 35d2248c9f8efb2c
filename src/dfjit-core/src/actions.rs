//! Builtin actions
//!
//! `Count` needs no column; `Sum`, `Mean`, `Min` and `Max` read one numeric
//! column. Null values are skipped.

use dfjit_shared::{ColumnType, Value};

use crate::error::{Error, Result};
use crate::graph::ActionImpl;

fn numeric_column(action: &str, types: &[ColumnType]) -> Result<()> {
    match types.first() {
        Some(ty) if ty.is_numeric() => Ok(()),
        Some(ty) => Err(Error::unsupported(format!(
            "{} cannot be applied to a column of type {}",
            action, ty
        ))),
        None => Err(Error::ColumnCountMismatch {
            required: 1,
            provided: 0,
            message: format!("{} needs one column", action),
        }),
    }
}

/// Number of accepted entries
#[derive(Debug, Clone, Copy)]
pub struct Count;

impl ActionImpl for Count {
    type State = u64;
    type Result = u64;

    const N_COLUMNS: usize = 0;
    const NAME: &'static str = "CountAction";
    const RESULT_TYPE: &'static str = "unsigned long";

    fn new(_types: &[ColumnType]) -> Result<Self> {
        Ok(Count)
    }

    fn initial_state(&self) -> u64 {
        0
    }

    fn exec(&self, state: &mut u64, _values: &[Value]) -> anyhow::Result<()> {
        *state += 1;
        Ok(())
    }

    fn finalize(&self, states: Vec<u64>) -> u64 {
        states.into_iter().sum()
    }
}

/// Sum of a column
#[derive(Debug, Clone, Copy)]
pub struct Sum;

impl ActionImpl for Sum {
    type State = f64;
    type Result = f64;

    const N_COLUMNS: usize = 1;
    const NAME: &'static str = "SumAction";
    const RESULT_TYPE: &'static str = "double";

    fn new(types: &[ColumnType]) -> Result<Self> {
        numeric_column(Self::NAME, types)?;
        Ok(Sum)
    }

    fn initial_state(&self) -> f64 {
        0.0
    }

    fn exec(&self, state: &mut f64, values: &[Value]) -> anyhow::Result<()> {
        if let Some(v) = values[0].as_f64() {
            *state += v;
        }
        Ok(())
    }

    fn finalize(&self, states: Vec<f64>) -> f64 {
        states.into_iter().sum()
    }
}

/// Arithmetic mean of a column; NaN when no entry was accepted
#[derive(Debug, Clone, Copy)]
pub struct Mean;

impl ActionImpl for Mean {
    type State = (f64, u64);
    type Result = f64;

    const N_COLUMNS: usize = 1;
    const NAME: &'static str = "MeanAction";
    const RESULT_TYPE: &'static str = "double";

    fn new(types: &[ColumnType]) -> Result<Self> {
        numeric_column(Self::NAME, types)?;
        Ok(Mean)
    }

    fn initial_state(&self) -> (f64, u64) {
        (0.0, 0)
    }

    fn exec(&self, state: &mut (f64, u64), values: &[Value]) -> anyhow::Result<()> {
        if let Some(v) = values[0].as_f64() {
            state.0 += v;
            state.1 += 1;
        }
        Ok(())
    }

    #[allow(clippy::cast_precision_loss)]
    fn finalize(&self, states: Vec<(f64, u64)>) -> f64 {
        let (sum, count) = states
            .into_iter()
            .fold((0.0, 0), |(s, c), (ps, pc)| (s + ps, c + pc));
        sum / count as f64
    }
}

/// Minimum of a column; `f64::MAX` when no entry was accepted
#[derive(Debug, Clone, Copy)]
pub struct Min;

impl ActionImpl for Min {
    type State = f64;
    type Result = f64;

    const N_COLUMNS: usize = 1;
    const NAME: &'static str = "MinAction";
    const RESULT_TYPE: &'static str = "double";

    fn new(types: &[ColumnType]) -> Result<Self> {
        numeric_column(Self::NAME, types)?;
        Ok(Min)
    }

    fn initial_state(&self) -> f64 {
        f64::MAX
    }

    fn exec(&self, state: &mut f64, values: &[Value]) -> anyhow::Result<()> {
        if let Some(v) = values[0].as_f64() {
            *state = state.min(v);
        }
        Ok(())
    }

    fn finalize(&self, states: Vec<f64>) -> f64 {
        states.into_iter().fold(f64::MAX, f64::min)
    }
}

/// Maximum of a column; `f64::MIN` when no entry was accepted
#[derive(Debug, Clone, Copy)]
pub struct Max;

impl ActionImpl for Max {
    type State = f64;
    type Result = f64;

    const N_COLUMNS: usize = 1;
    const NAME: &'static str = "MaxAction";
    const RESULT_TYPE: &'static str = "double";

    fn new(types: &[ColumnType]) -> Result<Self> {
        numeric_column(Self::NAME, types)?;
        Ok(Max)
    }

    fn initial_state(&self) -> f64 {
        f64::MIN
    }

    fn exec(&self, state: &mut f64, values: &[Value]) -> anyhow::Result<()> {
        if let Some(v) = values[0].as_f64() {
            *state = state.max(v);
        }
        Ok(())
    }

    fn finalize(&self, states: Vec<f64>) -> f64 {
        states.into_iter().fold(f64::MIN, f64::max)
    }
}
