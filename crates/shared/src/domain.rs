use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

use crate::error::RaggedRowError;

/// A primitive value as carried by init parameters and dataset cells.
///
/// Hosts are free to send any JSON scalar; `null` is kept so empty cells
/// survive a round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Primitive {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

impl Primitive {
    pub fn is_null(&self) -> bool {
        matches!(self, Primitive::Null)
    }

    /// String view. Non-string scalars are rendered, `null` is not.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Primitive::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Primitive::Bool(value) => Some(*value),
            Primitive::String(raw) => match raw.trim() {
                s if s.eq_ignore_ascii_case("true") => Some(true),
                s if s.eq_ignore_ascii_case("false") => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Primitive::Number(value) => Some(*value),
            Primitive::String(raw) => raw.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Primitive::Null => Ok(()),
            Primitive::Bool(value) => write!(f, "{value}"),
            // Integral numbers print without a trailing ".0", the way hosts write them.
            Primitive::Number(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
                write!(f, "{}", *value as i64)
            }
            Primitive::Number(value) => write!(f, "{value}"),
            Primitive::String(value) => f.write_str(value),
        }
    }
}

impl From<&str> for Primitive {
    fn from(value: &str) -> Self {
        Primitive::String(value.to_string())
    }
}

impl From<String> for Primitive {
    fn from(value: String) -> Self {
        Primitive::String(value)
    }
}

impl From<bool> for Primitive {
    fn from(value: bool) -> Self {
        Primitive::Bool(value)
    }
}

impl From<f64> for Primitive {
    fn from(value: f64) -> Self {
        Primitive::Number(value)
    }
}

impl From<i64> for Primitive {
    fn from(value: i64) -> Self {
        Primitive::Number(value as f64)
    }
}

impl From<i32> for Primitive {
    fn from(value: i32) -> Self {
        Primitive::Number(value.into())
    }
}

/// Property name to value mapping pushed by the host on attach.
///
/// Keys are opaque here; each component decides which ones it reads and
/// which defaults apply.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InitParams(BTreeMap<String, Primitive>);

impl InitParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Primitive>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Primitive>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Primitive> {
        self.0.get(key).filter(|value| !value.is_null())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn get_string(&self, key: &str, default: &str) -> String {
        self.get(key)
            .and_then(Primitive::as_text)
            .unwrap_or_else(|| default.to_string())
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(key).and_then(Primitive::as_bool).unwrap_or(default)
    }

    pub fn get_number(&self, key: &str, default: f64) -> f64 {
        self.get(key)
            .and_then(Primitive::as_number)
            .unwrap_or(default)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Primitive)> {
        self.0.iter().map(|(key, value)| (key.as_str(), value))
    }
}

impl<K, V> FromIterator<(K, V)> for InitParams
where
    K: Into<String>,
    V: Into<Primitive>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
}

impl Column {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Deserialize)]
struct DataSetRepr {
    columns: Vec<Column>,
    #[serde(default)]
    data: Vec<Vec<Primitive>>,
}

/// Tabular snapshot pushed by the host. Every row is exactly as wide as
/// the column list; column order is cell order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSet {
    columns: Vec<Column>,
    data: Vec<Vec<Primitive>>,
}

impl DataSet {
    pub fn new(columns: Vec<Column>, data: Vec<Vec<Primitive>>) -> Result<Self, RaggedRowError> {
        let expected = columns.len();
        if let Some((row, cells)) = data
            .iter()
            .enumerate()
            .find(|(_, cells)| cells.len() != expected)
        {
            return Err(RaggedRowError {
                row,
                expected,
                actual: cells.len(),
            });
        }
        Ok(Self { columns, data })
    }

    pub fn empty(columns: Vec<Column>) -> Self {
        Self {
            columns,
            data: Vec::new(),
        }
    }

    pub fn push_row(&mut self, cells: Vec<Primitive>) -> Result<(), RaggedRowError> {
        if cells.len() != self.columns.len() {
            return Err(RaggedRowError {
                row: self.data.len(),
                expected: self.columns.len(),
                actual: cells.len(),
            });
        }
        self.data.push(cells);
        Ok(())
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Primitive>] {
        &self.data
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }

    pub fn row_count(&self) -> usize {
        self.data.len()
    }
}

impl<'de> Deserialize<'de> for DataSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let repr = DataSetRepr::deserialize(deserializer)?;
        DataSet::new(repr.columns, repr.data).map_err(serde::de::Error::custom)
    }
}

/// Outcome a component reports after processing its init parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationStatus {
    Ok,
    Invalid { reason: String },
}

impl ConfigurationStatus {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, ConfigurationStatus::Ok)
    }
}
