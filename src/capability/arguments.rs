//! Arguments passed to a capability handler.

use serde::de::DeserializeOwned;

use super::value::Value;
use crate::error::ToolcodeError;

/// Positional and keyword arguments of one capability call, in call order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArguments {
    positional: Vec<Value>,
    named: Vec<(String, Value)>,
}

impl CallArguments {
    pub fn new(positional: Vec<Value>, named: Vec<(String, Value)>) -> Self {
        Self { positional, named }
    }

    /// Keyword-only arguments.
    pub fn named<K: Into<String>>(named: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self {
            positional: Vec::new(),
            named: named.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn positional_values(&self) -> &[Value] {
        &self.positional
    }

    pub fn named_values(&self) -> &[(String, Value)] {
        &self.named
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    /// Positional argument at `index`.
    pub fn positional(&self, index: usize) -> Option<&Value> {
        self.positional.get(index)
    }

    /// Keyword argument by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.named.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Get a required string argument.
    pub fn get_str(&self, name: &str) -> Result<&str, ToolcodeError> {
        self.require(name)?
            .as_str()
            .ok_or_else(|| wrong_type(name, "str"))
    }

    /// Get an optional string argument.
    pub fn get_str_opt(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Get a required integer argument.
    pub fn get_i64(&self, name: &str) -> Result<i64, ToolcodeError> {
        self.require(name)?
            .as_i64()
            .ok_or_else(|| wrong_type(name, "int"))
    }

    /// Get a required numeric argument; ints are widened.
    pub fn get_f64(&self, name: &str) -> Result<f64, ToolcodeError> {
        self.require(name)?
            .as_f64()
            .ok_or_else(|| wrong_type(name, "float"))
    }

    /// Get a required boolean argument.
    pub fn get_bool(&self, name: &str) -> Result<bool, ToolcodeError> {
        self.require(name)?
            .as_bool()
            .ok_or_else(|| wrong_type(name, "bool"))
    }

    /// Keyword arguments as a JSON object.
    pub fn to_json(&self) -> serde_json::Value {
        let map = self
            .named
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect::<serde_json::Map<_, _>>();
        serde_json::Value::Object(map)
    }

    /// Deserialize the keyword arguments into a typed struct.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T, ToolcodeError> {
        serde_json::from_value(self.to_json())
            .map_err(|e| ToolcodeError::InvalidArgument(e.to_string()))
    }

    /// Python-style rendering of the positional values, e.g. `(1, 'a')`.
    pub fn positional_repr(&self) -> String {
        Value::Tuple(self.positional.clone()).to_string()
    }

    /// Python-style rendering of the keyword values, e.g. `{'a': 1}`.
    pub fn named_repr(&self) -> String {
        Value::dict(self.named.iter().map(|(k, v)| (k.clone(), v.clone()))).to_string()
    }

    fn require(&self, name: &str) -> Result<&Value, ToolcodeError> {
        self.get(name)
            .ok_or_else(|| ToolcodeError::InvalidArgument(format!("missing argument '{name}'")))
    }
}

fn wrong_type(name: &str, expected: &str) -> ToolcodeError {
    ToolcodeError::InvalidArgument(format!("argument '{name}' must be {expected}"))
}
