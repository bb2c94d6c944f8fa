use super::error::ConfigError;
use super::traits::{expect_field, ConfigMap, ConfigValue, FromConfigValue};
use super::TokenId;

/// Fields every model configuration carries regardless of architecture.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseConfig {
    pub model_type: &'static str,
    pub pad_token_id: TokenId,
    pub bos_token_id: TokenId,
    pub eos_token_id: TokenId,
    /// Extension arguments, kept so they survive a render/parse cycle.
    pub extra: ConfigMap,
}

impl BaseConfig {
    pub fn new(model_type: &'static str) -> Self {
        Self {
            model_type,
            pad_token_id: TokenId::PAD,
            bos_token_id: TokenId::BOS,
            eos_token_id: TokenId::EOS,
            extra: ConfigMap::new(),
        }
    }

    pub fn get<T: FromConfigValue>(&self, key: &str) -> Option<T> {
        self.extra.get(key).and_then(|v| T::from_config_value(v.clone()))
    }

    /// Writes the common fields into `map`. Extension arguments go first so a declared
    /// field of the same name is never shadowed.
    pub fn write_into(&self, map: &mut ConfigMap) {
        for (key, value) in &self.extra {
            map.insert(key.clone(), value.clone());
        }
        map.insert(
            "model_type".to_string(),
            ConfigValue::String(self.model_type.to_string()),
        );
        map.insert("pad_token_id".to_string(), self.pad_token_id.into());
        map.insert("bos_token_id".to_string(), self.bos_token_id.into());
        map.insert("eos_token_id".to_string(), self.eos_token_id.into());
    }
}

impl From<TokenId> for ConfigValue {
    fn from(id: TokenId) -> Self {
        ConfigValue::Int(id.0 as i64)
    }
}

impl TokenId {
    pub(crate) fn from_field(field: &str, value: ConfigValue) -> Result<Self, ConfigError> {
        let id: i64 = expect_field(field, value, "an integer token id")?;
        i32::try_from(id)
            .map(TokenId)
            .map_err(|_| ConfigError::InvalidField {
                field: field.to_string(),
                expected: "an integer token id",
                found: "out-of-range integer",
            })
    }
}
