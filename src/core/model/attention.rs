//! Performer (FAVOR+) attention hyperparameters.
//!
//! The record form is what callers usually build; the parent configuration stores the
//! result of [`AttributeMap::to_map`] instead.

use super::error::ConfigError;
use super::traits::{expect_field, AttributeMap, ConfigMap, ConfigValue};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PerformerKernel {
    Cosh,
    #[default]
    Exp,
    Relu,
}

impl PerformerKernel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PerformerKernel::Cosh => "cosh",
            PerformerKernel::Exp => "exp",
            PerformerKernel::Relu => "relu",
        }
    }
}

impl FromStr for PerformerKernel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cosh" => Ok(PerformerKernel::Cosh),
            "exp" => Ok(PerformerKernel::Exp),
            "relu" => Ok(PerformerKernel::Relu),
            other => Err(ConfigError::UnknownVariant {
                field: "kernel_type".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for PerformerKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the random projection matrix is orthogonalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrthogonalFeatureAlgorithm {
    #[default]
    Auto,
    Kacs,
    Qr,
}

impl OrthogonalFeatureAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrthogonalFeatureAlgorithm::Auto => "auto",
            OrthogonalFeatureAlgorithm::Kacs => "kacs",
            OrthogonalFeatureAlgorithm::Qr => "qr",
        }
    }
}

impl FromStr for OrthogonalFeatureAlgorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(OrthogonalFeatureAlgorithm::Auto),
            "kacs" => Ok(OrthogonalFeatureAlgorithm::Kacs),
            "qr" => Ok(OrthogonalFeatureAlgorithm::Qr),
            other => Err(ConfigError::UnknownVariant {
                field: "orthogonal_feature_algorithm".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for OrthogonalFeatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerformerAttentionConfig {
    pub attention_dropout: f64,
    pub kernel_type: PerformerKernel,
    pub causal: bool,
    pub use_recurrent_decoding: bool,
    pub kernel_epsilon: f64,
    pub normalize_output: bool,
    pub normalization_stabilizer: f64,
    pub use_linear_layers: bool,
    pub linear_layer_names: Vec<String>,
    /// `None` derives the count from the head dimension, see
    /// [`PerformerAttentionConfig::resolved_num_random_features`].
    pub num_random_features: Option<usize>,
    pub use_thick_features: bool,
    pub regularize_feature_norms: bool,
    pub use_orthogonal_features: bool,
    pub orthogonal_feature_algorithm: OrthogonalFeatureAlgorithm,
    /// `None` disables feature redrawing.
    pub feature_redraw_interval: Option<usize>,
    pub redraw_stochastically: bool,
    pub redraw_verbose: bool,
    pub d_model: Option<usize>,
    pub num_heads: Option<usize>,
    /// Fields added through `set_field` that the record does not declare.
    pub extra: ConfigMap,
}

impl Default for PerformerAttentionConfig {
    fn default() -> Self {
        Self {
            attention_dropout: 0.1,
            kernel_type: PerformerKernel::Exp,
            causal: false,
            use_recurrent_decoding: false,
            kernel_epsilon: 1e-4,
            normalize_output: true,
            normalization_stabilizer: 1e-6,
            use_linear_layers: true,
            linear_layer_names: ["q_linear", "k_linear", "v_linear", "out_linear"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            num_random_features: None,
            use_thick_features: false,
            regularize_feature_norms: true,
            use_orthogonal_features: true,
            orthogonal_feature_algorithm: OrthogonalFeatureAlgorithm::Auto,
            feature_redraw_interval: Some(100),
            redraw_stochastically: false,
            redraw_verbose: false,
            d_model: None,
            num_heads: None,
            extra: ConfigMap::new(),
        }
    }
}

impl PerformerAttentionConfig {
    /// Builds a record from its mapping form. Unknown keys land in `extra`.
    pub fn from_map(map: ConfigMap) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        for (key, value) in map {
            config.set_field(&key, value)?;
        }
        Ok(config)
    }

    pub fn head_dim(&self) -> Option<usize> {
        match (self.d_model, self.num_heads) {
            (Some(d_model), Some(num_heads)) if num_heads > 0 => Some(d_model / num_heads),
            _ => None,
        }
    }

    /// Explicit feature count, or `round(h * ln h)` for head dimension `h`.
    pub fn resolved_num_random_features(&self) -> Option<usize> {
        if let Some(n) = self.num_random_features {
            return Some(n);
        }
        let dim_per_head = self.head_dim()? as f64;
        Some((dim_per_head * dim_per_head.ln()).round().max(0.0) as usize)
    }
}

fn optional_usize(value: Option<usize>) -> ConfigValue {
    match value {
        Some(v) => ConfigValue::Uint(v as u64),
        None => ConfigValue::Null,
    }
}

const FIELDS: [&str; 19] = [
    "attention_dropout",
    "kernel_type",
    "causal",
    "use_recurrent_decoding",
    "kernel_epsilon",
    "normalize_output",
    "normalization_stabilizer",
    "use_linear_layers",
    "linear_layer_names",
    "num_random_features",
    "use_thick_features",
    "regularize_feature_norms",
    "use_orthogonal_features",
    "orthogonal_feature_algorithm",
    "feature_redraw_interval",
    "redraw_stochastically",
    "redraw_verbose",
    "d_model",
    "num_heads",
];

impl AttributeMap for PerformerAttentionConfig {
    fn get_field(&self, key: &str) -> Option<ConfigValue> {
        let value = match key {
            "attention_dropout" => ConfigValue::Float(self.attention_dropout),
            "kernel_type" => ConfigValue::String(self.kernel_type.to_string()),
            "causal" => ConfigValue::Bool(self.causal),
            "use_recurrent_decoding" => ConfigValue::Bool(self.use_recurrent_decoding),
            "kernel_epsilon" => ConfigValue::Float(self.kernel_epsilon),
            "normalize_output" => ConfigValue::Bool(self.normalize_output),
            "normalization_stabilizer" => ConfigValue::Float(self.normalization_stabilizer),
            "use_linear_layers" => ConfigValue::Bool(self.use_linear_layers),
            "linear_layer_names" => ConfigValue::Array(
                self.linear_layer_names
                    .iter()
                    .cloned()
                    .map(ConfigValue::String)
                    .collect(),
            ),
            "num_random_features" => optional_usize(self.num_random_features),
            "use_thick_features" => ConfigValue::Bool(self.use_thick_features),
            "regularize_feature_norms" => ConfigValue::Bool(self.regularize_feature_norms),
            "use_orthogonal_features" => ConfigValue::Bool(self.use_orthogonal_features),
            "orthogonal_feature_algorithm" => {
                ConfigValue::String(self.orthogonal_feature_algorithm.to_string())
            }
            "feature_redraw_interval" => optional_usize(self.feature_redraw_interval),
            "redraw_stochastically" => ConfigValue::Bool(self.redraw_stochastically),
            "redraw_verbose" => ConfigValue::Bool(self.redraw_verbose),
            "d_model" => optional_usize(self.d_model),
            "num_heads" => optional_usize(self.num_heads),
            _ => return self.extra.get(key).cloned(),
        };
        Some(value)
    }

    fn set_field(&mut self, key: &str, value: ConfigValue) -> Result<(), ConfigError> {
        match key {
            "attention_dropout" => self.attention_dropout = expect_field(key, value, "a number")?,
            "kernel_type" => {
                let name: String = expect_field(key, value, "a string")?;
                self.kernel_type = name.parse()?;
            }
            "causal" => self.causal = expect_field(key, value, "a bool")?,
            "use_recurrent_decoding" => {
                self.use_recurrent_decoding = expect_field(key, value, "a bool")?
            }
            "kernel_epsilon" => self.kernel_epsilon = expect_field(key, value, "a number")?,
            "normalize_output" => self.normalize_output = expect_field(key, value, "a bool")?,
            "normalization_stabilizer" => {
                self.normalization_stabilizer = expect_field(key, value, "a number")?
            }
            "use_linear_layers" => self.use_linear_layers = expect_field(key, value, "a bool")?,
            "linear_layer_names" => {
                self.linear_layer_names = expect_field(key, value, "a list of strings")?
            }
            "num_random_features" => {
                self.num_random_features = expect_field(key, value, "an integer or null")?
            }
            "use_thick_features" => self.use_thick_features = expect_field(key, value, "a bool")?,
            "regularize_feature_norms" => {
                self.regularize_feature_norms = expect_field(key, value, "a bool")?
            }
            "use_orthogonal_features" => {
                self.use_orthogonal_features = expect_field(key, value, "a bool")?
            }
            "orthogonal_feature_algorithm" => {
                let name: String = expect_field(key, value, "a string")?;
                self.orthogonal_feature_algorithm = name.parse()?;
            }
            "feature_redraw_interval" => {
                self.feature_redraw_interval = expect_field(key, value, "an integer or null")?
            }
            "redraw_stochastically" => {
                self.redraw_stochastically = expect_field(key, value, "a bool")?
            }
            "redraw_verbose" => self.redraw_verbose = expect_field(key, value, "a bool")?,
            "d_model" => self.d_model = expect_field(key, value, "an integer or null")?,
            "num_heads" => self.num_heads = expect_field(key, value, "an integer or null")?,
            _ => {
                self.extra.insert(key.to_string(), value);
            }
        }
        Ok(())
    }

    fn to_map(&self) -> ConfigMap {
        let mut map = self.extra.clone();
        for key in FIELDS {
            if let Some(value) = self.get_field(key) {
                map.insert(key.to_string(), value);
            }
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_field_typed_and_extra() {
        let mut config = PerformerAttentionConfig::default();
        config.set_field("causal", ConfigValue::Bool(true)).unwrap();
        config
            .set_field("kernel_type", ConfigValue::String("relu".to_string()))
            .unwrap();
        config.set_field("num_random_features", ConfigValue::Int(128)).unwrap();
        config.set_field("feature_redraw_interval", ConfigValue::Null).unwrap();
        config.set_field("custom_flag", ConfigValue::Bool(true)).unwrap();

        assert!(config.causal);
        assert_eq!(config.kernel_type, PerformerKernel::Relu);
        assert_eq!(config.num_random_features, Some(128));
        assert_eq!(config.feature_redraw_interval, None);
        assert_eq!(config.extra.get("custom_flag"), Some(&ConfigValue::Bool(true)));
    }

    #[test]
    fn test_set_field_rejects_wrong_type() {
        let mut config = PerformerAttentionConfig::default();
        let err = config
            .set_field("causal", ConfigValue::String("yes".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidField { ref field, .. } if field == "causal"));

        let err = config
            .set_field("kernel_type", ConfigValue::String("softmax".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownVariant { .. }));
        assert_eq!(config.kernel_type, PerformerKernel::Exp);
    }

    #[test]
    fn test_to_map_flattens_nested_extra() {
        let mut nested = ConfigMap::new();
        nested.insert("scale".to_string(), ConfigValue::Float(0.5));

        let mut config = PerformerAttentionConfig::default();
        config
            .set_field("feature_schedule", ConfigValue::Map(nested.clone()))
            .unwrap();

        let map = config.to_map();
        assert_eq!(map.get("feature_schedule"), Some(&ConfigValue::Map(nested)));
        assert_eq!(map.get("kernel_type"), Some(&ConfigValue::String("exp".to_string())));
        assert_eq!(map.get("d_model"), Some(&ConfigValue::Null));
        assert_eq!(
            map.get("orthogonal_feature_algorithm"),
            Some(&ConfigValue::String("auto".to_string()))
        );
    }

    #[test]
    fn test_get_field_reads_declared_and_extra() {
        let mut config = PerformerAttentionConfig::default();
        config.num_heads = Some(8);
        config.extra.insert("tag".to_string(), ConfigValue::String("x".to_string()));

        assert_eq!(config.get_field("num_heads"), Some(ConfigValue::Uint(8)));
        assert_eq!(config.get_field("d_model"), Some(ConfigValue::Null));
        assert_eq!(config.get_field("kernel_type"), Some(ConfigValue::String("exp".to_string())));
        assert_eq!(config.get_field("tag"), Some(ConfigValue::String("x".to_string())));
        assert_eq!(config.get_field("missing"), None);
        assert_eq!(config.to_map().len(), FIELDS.len() + 1);
    }

    #[test]
    fn test_from_map_roundtrip() {
        let mut config = PerformerAttentionConfig::default();
        config.d_model = Some(256);
        config.num_heads = Some(4);
        config.orthogonal_feature_algorithm = OrthogonalFeatureAlgorithm::Qr;
        config.extra.insert("tag".to_string(), ConfigValue::String("x".to_string()));

        let rebuilt = PerformerAttentionConfig::from_map(config.to_map()).unwrap();
        assert_eq!(rebuilt, config);
    }

    #[test]
    fn test_resolved_num_random_features() {
        let mut config = PerformerAttentionConfig::default();
        assert_eq!(config.resolved_num_random_features(), None);

        config.d_model = Some(768);
        config.num_heads = Some(12);
        // 64 * ln(64) = 266.17
        assert_eq!(config.resolved_num_random_features(), Some(266));

        config.num_random_features = Some(32);
        assert_eq!(config.resolved_num_random_features(), Some(32));
    }
}
