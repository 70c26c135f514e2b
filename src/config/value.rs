//! Typed values held by configuration variables.
//!
//! A [`Variable`] carries either no value at all ([`VarType::Undefined`]) or a
//! non-empty, homogeneous [`Values`] sequence. A sequence of length one is a
//! scalar; longer sequences are arrays. Copies are deep: cloning a `Variable`
//! clones every element, so two live variables never share backing storage.

use serde::Serialize;
use serde::ser::SerializeStruct;
use std::fmt;

/// Type tag of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VarType {
    Undefined,
    Integer,
    Real,
    String,
}

impl VarType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Integer => "integer",
            Self::Real => "real",
            Self::String => "string",
        }
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single scalar.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Integer(i64),
    Real(f64),
    String(String),
}

impl Value {
    pub fn var_type(&self) -> VarType {
        match self {
            Self::Integer(_) => VarType::Integer,
            Self::Real(_) => VarType::Real,
            Self::String(_) => VarType::String,
        }
    }
}

impl fmt::Display for Value {
    /// Renders the scalar as configuration-language text.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(i) => write!(f, "{}", i),
            Self::Real(r) => {
                let text = r.to_string();
                if text.contains('.') {
                    write!(f, "{}", text)
                } else {
                    write!(f, "{}.0", text)
                }
            }
            Self::String(s) => {
                f.write_str("\"")?;
                for c in s.chars() {
                    if c == '"' || c == '\\' {
                        f.write_str("\\")?;
                    }
                    write!(f, "{}", c)?;
                }
                f.write_str("\"")
            }
        }
    }
}

/// A homogeneous sequence of scalars.
///
/// The variant is the type tag, so the tag and payload can never disagree.
#[derive(Debug, Clone, PartialEq)]
pub enum Values {
    Integer(Vec<i64>),
    Real(Vec<f64>),
    String(Vec<String>),
}

impl Values {
    /// Start a sequence from its first scalar; the scalar fixes the type.
    pub fn from_first(value: Value) -> Self {
        match value {
            Value::Integer(i) => Self::Integer(vec![i]),
            Value::Real(r) => Self::Real(vec![r]),
            Value::String(s) => Self::String(vec![s]),
        }
    }

    pub fn var_type(&self) -> VarType {
        match self {
            Self::Integer(_) => VarType::Integer,
            Self::Real(_) => VarType::Real,
            Self::String(_) => VarType::String,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Integer(v) => v.len(),
            Self::Real(v) => v.len(),
            Self::String(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a scalar of the same type.
    ///
    /// A scalar of a different type is handed back unchanged.
    pub fn push(&mut self, value: Value) -> Result<(), Value> {
        match (self, value) {
            (Self::Integer(v), Value::Integer(i)) => v.push(i),
            (Self::Real(v), Value::Real(r)) => v.push(r),
            (Self::String(v), Value::String(s)) => v.push(s),
            (_, other) => return Err(other),
        }
        Ok(())
    }

    /// Copy out the scalar at `index`.
    pub fn get(&self, index: usize) -> Option<Value> {
        match self {
            Self::Integer(v) => v.get(index).copied().map(Value::Integer),
            Self::Real(v) => v.get(index).copied().map(Value::Real),
            Self::String(v) => v.get(index).cloned().map(Value::String),
        }
    }

    /// Iterate over owned copies of every scalar.
    pub fn iter(&self) -> impl Iterator<Item = Value> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }
}

impl fmt::Display for Values {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.len() == 1 {
            if let Some(value) = self.get(0) {
                return write!(f, "{}", value);
            }
        }
        f.write_str("[")?;
        for (i, value) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", value)?;
        }
        f.write_str("]")
    }
}

/// A named, typed configuration entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    /// Variable name (possibly group-qualified, e.g. `sys.level`)
    pub name: String,
    /// Optional human-readable description
    pub description: Option<String>,
    data: Option<Values>,
}

impl Variable {
    /// Create a variable holding `values`.
    ///
    /// An empty sequence yields an undefined variable.
    pub fn new(name: impl Into<String>, values: Values) -> Self {
        let data = if values.is_empty() { None } else { Some(values) };
        Self {
            name: name.into(),
            description: None,
            data,
        }
    }

    /// Create a variable that exists but carries no value.
    pub fn undefined(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            data: None,
        }
    }

    pub fn integer(name: impl Into<String>, value: i64) -> Self {
        Self::new(name, Values::Integer(vec![value]))
    }

    pub fn real(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, Values::Real(vec![value]))
    }

    pub fn string(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, Values::String(vec![value.into()]))
    }

    pub fn strings<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            name,
            Values::String(values.into_iter().map(Into::into).collect()),
        )
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn var_type(&self) -> VarType {
        self.data
            .as_ref()
            .map(Values::var_type)
            .unwrap_or(VarType::Undefined)
    }

    /// Number of scalars held (zero when undefined).
    pub fn count(&self) -> usize {
        self.data.as_ref().map(Values::len).unwrap_or(0)
    }

    pub fn values(&self) -> Option<&Values> {
        self.data.as_ref()
    }

    pub fn into_values(self) -> Option<Values> {
        self.data
    }

    /// Drop the held value, leaving the variable undefined.
    pub fn clear(&mut self) {
        self.data = None;
    }

    pub fn as_integer(&self) -> Option<i64> {
        match &self.data {
            Some(Values::Integer(v)) => v.first().copied(),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match &self.data {
            Some(Values::Real(v)) => v.first().copied(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.data {
            Some(Values::String(v)) => v.first().map(String::as_str),
            _ => None,
        }
    }

    pub fn as_strings(&self) -> Option<&[String]> {
        match &self.data {
            Some(Values::String(v)) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.data {
            Some(values) => write!(f, "{} = {}", self.name, values),
            None => write!(f, "{} (undefined)", self.name),
        }
    }
}

impl Serialize for Variable {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let fields = if self.description.is_some() { 4 } else { 3 };
        let mut state = serializer.serialize_struct("Variable", fields)?;
        state.serialize_field("name", &self.name)?;
        if let Some(description) = &self.description {
            state.serialize_field("description", description)?;
        }
        state.serialize_field("type", &self.var_type())?;
        let values: Vec<Value> = self
            .data
            .as_ref()
            .map(|v| v.iter().collect())
            .unwrap_or_default();
        state.serialize_field("values", &values)?;
        state.end()
    }
}

/// Parse a run of ASCII digits as an integer.
///
/// Leading zeros are stripped first, keeping at least one digit, so `007`
/// yields 7 and `000` yields 0. Overflow yields `None`.
pub fn parse_integer(digits: &str) -> Option<i64> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let trimmed = digits.trim_start_matches('0');
    let trimmed = if trimmed.is_empty() { "0" } else { trimmed };
    trimmed.parse().ok()
}

/// Parse `digits '.' digits` as a real number.
pub fn parse_real(text: &str) -> Option<f64> {
    let (whole, frac) = text.split_once('.')?;
    let is_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !is_digits(whole) || !is_digits(frac) {
        return None;
    }
    let whole = whole.trim_start_matches('0');
    let whole = if whole.is_empty() { "0" } else { whole };
    format!("{}.{}", whole, frac)
        .parse::<f64>()
        .ok()
        .filter(|r| r.is_finite())
}
