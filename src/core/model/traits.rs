use super::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key-value form of a configuration. Ordered so rendered JSON is stable.
pub type ConfigMap = BTreeMap<String, ConfigValue>;

/// Field-level access shared by the record and mapping forms of a sub-configuration.
pub trait AttributeMap {
    fn get_field(&self, key: &str) -> Option<ConfigValue>;

    /// Sets `key`, adding it when the target has no such field.
    fn set_field(&mut self, key: &str, value: ConfigValue) -> Result<(), ConfigError>;

    /// Deep conversion; nested records come out as nested maps.
    fn to_map(&self) -> ConfigMap;
}

impl AttributeMap for ConfigMap {
    fn get_field(&self, key: &str) -> Option<ConfigValue> {
        self.get(key).cloned()
    }

    fn set_field(&mut self, key: &str, value: ConfigValue) -> Result<(), ConfigError> {
        self.insert(key.to_string(), value);
        Ok(())
    }

    fn to_map(&self) -> ConfigMap {
        self.clone()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Null,
    Bool(bool),
    Uint(u64),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<ConfigValue>),
    Map(ConfigMap),
}

impl ConfigValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            ConfigValue::Null => "null",
            ConfigValue::Bool(_) => "bool",
            ConfigValue::Uint(_) | ConfigValue::Int(_) => "integer",
            ConfigValue::Float(_) => "float",
            ConfigValue::String(_) => "string",
            ConfigValue::Array(_) => "array",
            ConfigValue::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ConfigValue::Null)
    }

    pub fn get<T: FromConfigValue>(&self) -> Option<T> {
        T::from_config_value(self.clone())
    }
}

impl From<serde_json::Value> for ConfigValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => ConfigValue::Null,
            serde_json::Value::Bool(b) => ConfigValue::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(v) = n.as_u64() {
                    ConfigValue::Uint(v)
                } else if let Some(v) = n.as_i64() {
                    ConfigValue::Int(v)
                } else {
                    ConfigValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => ConfigValue::String(s),
            serde_json::Value::Array(items) => {
                ConfigValue::Array(items.into_iter().map(ConfigValue::from).collect())
            }
            serde_json::Value::Object(fields) => ConfigValue::Map(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, ConfigValue::from(v)))
                    .collect(),
            ),
        }
    }
}

pub trait FromConfigValue: Sized {
    fn from_config_value(value: ConfigValue) -> Option<Self>;
}

impl FromConfigValue for i64 {
    fn from_config_value(value: ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Int(v) => Some(v),
            ConfigValue::Uint(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }
}

impl FromConfigValue for u64 {
    fn from_config_value(value: ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Uint(v) => Some(v),
            ConfigValue::Int(v) => u64::try_from(v).ok(),
            _ => None,
        }
    }
}

impl FromConfigValue for usize {
    fn from_config_value(value: ConfigValue) -> Option<Self> {
        u64::from_config_value(value).and_then(|v| usize::try_from(v).ok())
    }
}

impl FromConfigValue for f64 {
    fn from_config_value(value: ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Float(v) => Some(v),
            ConfigValue::Int(v) => Some(v as f64),
            ConfigValue::Uint(v) => Some(v as f64),
            _ => None,
        }
    }
}

impl FromConfigValue for String {
    fn from_config_value(value: ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::String(v) => Some(v),
            _ => None,
        }
    }
}

impl FromConfigValue for bool {
    fn from_config_value(value: ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Bool(v) => Some(v),
            ConfigValue::Int(v) => Some(v != 0),
            ConfigValue::Uint(v) => Some(v != 0),
            _ => None,
        }
    }
}

impl FromConfigValue for ConfigMap {
    fn from_config_value(value: ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Map(v) => Some(v),
            _ => None,
        }
    }
}

impl<T: FromConfigValue> FromConfigValue for Vec<T> {
    fn from_config_value(value: ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Array(items) => items.into_iter().map(T::from_config_value).collect(),
            _ => None,
        }
    }
}

/// `null` reads as `None`; anything else must convert to `T`.
impl<T: FromConfigValue> FromConfigValue for Option<T> {
    fn from_config_value(value: ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Null => Some(None),
            other => T::from_config_value(other).map(Some),
        }
    }
}

/// Reads `value` as `T` or reports which field had the wrong shape.
pub(crate) fn expect_field<T: FromConfigValue>(
    field: &str,
    value: ConfigValue,
    expected: &'static str,
) -> Result<T, ConfigError> {
    let found = value.type_name();
    T::from_config_value(value).ok_or_else(|| ConfigError::InvalidField {
        field: field.to_string(),
        expected,
        found,
    })
}

/// Dotted path of the first NaN or infinite float in `map`, if any.
pub(crate) fn find_non_finite(map: &ConfigMap) -> Option<String> {
    map.iter()
        .find_map(|(key, value)| non_finite_path(value).map(|rest| join_path(key, rest)))
}

fn non_finite_path(value: &ConfigValue) -> Option<Option<String>> {
    match value {
        ConfigValue::Float(f) if !f.is_finite() => Some(None),
        ConfigValue::Map(map) => find_non_finite(map).map(Some),
        ConfigValue::Array(items) => items.iter().enumerate().find_map(|(i, item)| {
            non_finite_path(item).map(|rest| Some(join_path(&i.to_string(), rest)))
        }),
        _ => None,
    }
}

fn join_path(head: &str, rest: Option<String>) -> String {
    match rest {
        Some(rest) => format!("{head}.{rest}"),
        None => head.to_string(),
    }
}
