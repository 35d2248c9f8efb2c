//! Declared column types
//!
//! Every column exposes a declared type *name*. Names are what the code
//! generators write into generated fragments, so each [`ColumnType`] has one
//! canonical, generatable name plus a set of accepted aliases.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::value::Value;
use crate::Result;

/// The closed set of column value types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ColumnType {
    /// `bool`
    Bool,
    /// `int` (32 bit signed)
    Int32,
    /// `long` (64 bit signed)
    Int64,
    /// `unsigned int` (32 bit unsigned)
    UInt32,
    /// `unsigned long` (64 bit unsigned)
    UInt64,
    /// `float` (32 bit)
    Float32,
    /// `double` (64 bit)
    Float64,
    /// `string`
    String,
}

impl ColumnType {
    /// All column types, in declaration order
    pub const ALL: [ColumnType; 8] = [
        ColumnType::Bool,
        ColumnType::Int32,
        ColumnType::Int64,
        ColumnType::UInt32,
        ColumnType::UInt64,
        ColumnType::Float32,
        ColumnType::Float64,
        ColumnType::String,
    ];

    /// Canonical name used in generated code
    pub fn name(self) -> &'static str {
        match self {
            ColumnType::Bool => "bool",
            ColumnType::Int32 => "int",
            ColumnType::Int64 => "long",
            ColumnType::UInt32 => "unsigned int",
            ColumnType::UInt64 => "unsigned long",
            ColumnType::Float32 => "float",
            ColumnType::Float64 => "double",
            ColumnType::String => "string",
        }
    }

    /// Numeric types take part in arithmetic; `bool` counts as numeric
    pub fn is_numeric(self) -> bool {
        !matches!(self, ColumnType::String)
    }

    /// Integral types (including `bool`)
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            ColumnType::Bool
                | ColumnType::Int32
                | ColumnType::Int64
                | ColumnType::UInt32
                | ColumnType::UInt64
        )
    }

    /// Floating point types
    pub fn is_float(self) -> bool {
        matches!(self, ColumnType::Float32 | ColumnType::Float64)
    }

    /// Result type of an arithmetic operation between `self` and `other`
    ///
    /// Follows the usual arithmetic conversions: any floating operand makes
    /// the result floating, otherwise the wider integer wins and unsigned wins
    /// at equal width. Returns `None` when either side is not numeric.
    pub fn promote(self, other: ColumnType) -> Option<ColumnType> {
        if !self.is_numeric() || !other.is_numeric() {
            return None;
        }
        if self == ColumnType::Float64 || other == ColumnType::Float64 {
            return Some(ColumnType::Float64);
        }
        if self.is_float() || other.is_float() {
            return Some(ColumnType::Float32);
        }
        let (lrank, lunsigned) = self.integer_rank();
        let (rrank, runsigned) = other.integer_rank();
        let rank = lrank.max(rrank);
        let unsigned = (lrank == rank && lunsigned) || (rrank == rank && runsigned);
        Some(match (rank, unsigned) {
            (1, false) => ColumnType::Int32,
            (1, true) => ColumnType::UInt32,
            (_, false) => ColumnType::Int64,
            (_, true) => ColumnType::UInt64,
        })
    }

    fn integer_rank(self) -> (u8, bool) {
        match self {
            ColumnType::UInt32 => (1, true),
            ColumnType::Int64 => (2, false),
            ColumnType::UInt64 => (2, true),
            _ => (1, false),
        }
    }

    /// Convert a value to this type's representation
    ///
    /// Numeric conversions truncate like a C cast. Strings only convert to
    /// `string`. `Null` is kept as is.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_lossless
    )]
    pub fn coerce(self, value: Value) -> Result<Value> {
        if value.is_null() {
            return Ok(value);
        }
        let source = value.type_name();
        let converted = match self {
            ColumnType::String => match value {
                Value::String(_) => Some(value),
                _ => None,
            },
            ColumnType::Bool => value.is_numeric().then(|| Value::Bool(crate::is_truthy(&value))),
            ColumnType::Int32 => value.as_i64().map(|i| Value::Int(i64::from(i as i32))),
            ColumnType::Int64 => value.as_i64().map(Value::Int),
            ColumnType::UInt32 => value.as_u64().map(|u| Value::UInt(u64::from(u as u32))),
            ColumnType::UInt64 => value.as_u64().map(Value::UInt),
            ColumnType::Float32 => value.as_f64().map(|f| Value::Float(f64::from(f as f32))),
            ColumnType::Float64 => value.as_f64().map(Value::Float),
        };
        converted.ok_or_else(|| {
            crate::error::operation_error(format!(
                "cannot convert {} value to {}",
                source,
                self
            ))
        })
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ColumnType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ");
        let ty = match normalized.as_str() {
            "bool" | "Bool_t" => ColumnType::Bool,
            "int" | "Int_t" | "i32" | "int32_t" | "Int32" => ColumnType::Int32,
            "long" | "long long" | "Long64_t" | "Long_t" | "i64" | "int64_t" | "Int64" => {
                ColumnType::Int64
            }
            "unsigned int" | "unsigned" | "UInt_t" | "u32" | "uint32_t" | "UInt32" => {
                ColumnType::UInt32
            }
            "unsigned long" | "unsigned long long" | "ULong64_t" | "ULong_t" | "u64"
            | "uint64_t" | "UInt64" => ColumnType::UInt64,
            "float" | "Float_t" | "f32" | "Float32" => ColumnType::Float32,
            "double" | "Double_t" | "f64" | "Float64" => ColumnType::Float64,
            "string" | "String" | "std::string" | "str" => ColumnType::String,
            _ => anyhow::bail!("unknown type name '{}'", s.trim()),
        };
        Ok(ty)
    }
}

impl TryFrom<String> for ColumnType {
    type Error = anyhow::Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<ColumnType> for String {
    fn from(ty: ColumnType) -> Self {
        ty.name().to_string()
    }
}
