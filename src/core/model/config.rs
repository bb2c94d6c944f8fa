use super::attention::PerformerAttentionConfig;
use super::base::BaseConfig;
use super::error::ConfigError;
use super::traits::{
    expect_field, find_non_finite, AttributeMap, ConfigMap, ConfigValue, FromConfigValue,
};
use super::{TokenId, MODEL_TYPE};
use std::fmt;
use std::str::FromStr;

/// Normalization applied to the convolutional feature extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeatExtractNorm {
    /// Group norm on the first convolution only.
    #[default]
    Group,
    /// Layer norm on every convolution.
    Layer,
}

impl FeatExtractNorm {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatExtractNorm::Group => "group",
            FeatExtractNorm::Layer => "layer",
        }
    }
}

impl FromStr for FeatExtractNorm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "group" => Ok(FeatExtractNorm::Group),
            "layer" => Ok(FeatExtractNorm::Layer),
            other => Err(ConfigError::UnknownVariant {
                field: "feat_extract_norm".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for FeatExtractNorm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The attention sub-configuration as handed to the builder.
#[derive(Debug, Clone, PartialEq)]
pub enum AttentionConfigInput {
    Map(ConfigMap),
    Record(PerformerAttentionConfig),
}

impl Default for AttentionConfigInput {
    fn default() -> Self {
        AttentionConfigInput::Record(PerformerAttentionConfig::default())
    }
}

impl From<ConfigMap> for AttentionConfigInput {
    fn from(map: ConfigMap) -> Self {
        AttentionConfigInput::Map(map)
    }
}

impl From<PerformerAttentionConfig> for AttentionConfigInput {
    fn from(record: PerformerAttentionConfig) -> Self {
        AttentionConfigInput::Record(record)
    }
}

/// Hyperparameters of a wav2vec2 encoder with Performer attention.
///
/// Built through [`Wav2Vec2PerformerConfig::builder`], which validates the feature
/// extractor geometry and merges the attention sub-configuration. The geometry and the
/// merged attention map are only readable so they cannot drift from what was validated.
#[derive(Debug, Clone, PartialEq)]
pub struct Wav2Vec2PerformerConfig {
    pub base: BaseConfig,
    pub vocab_size: usize,
    pub hidden_size: usize,
    pub num_hidden_layers: usize,
    pub num_attention_heads: usize,
    pub intermediate_size: usize,
    pub hidden_act: String,
    pub hidden_dropout_prob: f64,
    pub attention_probs_dropout_prob: f64,
    pub initializer_range: f64,
    pub layer_norm_eps: f64,
    pub feat_extract_norm: FeatExtractNorm,
    pub feat_extract_dropout: f64,
    pub feat_extract_activation: String,
    pub conv_bias: bool,
    pub num_conv_pos_embeddings: usize,
    pub num_conv_pos_embedding_groups: usize,
    /// Pre-norm transformer layout when set, post-norm otherwise.
    pub do_stable_layer_norm: bool,
    conv_dim: Vec<usize>,
    conv_stride: Vec<usize>,
    conv_kernel: Vec<usize>,
    num_feat_extract_layers: usize,
    performer_attention_config: ConfigMap,
}

impl Wav2Vec2PerformerConfig {
    pub fn builder() -> Wav2Vec2PerformerConfigBuilder {
        Wav2Vec2PerformerConfigBuilder::new()
    }

    pub fn conv_dim(&self) -> &[usize] {
        &self.conv_dim
    }

    pub fn conv_stride(&self) -> &[usize] {
        &self.conv_stride
    }

    pub fn conv_kernel(&self) -> &[usize] {
        &self.conv_kernel
    }

    pub fn num_feat_extract_layers(&self) -> usize {
        self.num_feat_extract_layers
    }

    pub fn performer_attention_config(&self) -> &ConfigMap {
        &self.performer_attention_config
    }

    /// Typed view of the merged attention map.
    pub fn attention_config(&self) -> Result<PerformerAttentionConfig, ConfigError> {
        PerformerAttentionConfig::from_map(self.performer_attention_config.clone())
    }

    /// Zero when there are no attention heads.
    pub fn head_dim(&self) -> usize {
        self.hidden_size
            .checked_div(self.num_attention_heads)
            .unwrap_or(0)
    }

    /// Raw audio samples consumed per encoder frame, `None` if it overflows.
    pub fn inputs_to_logits_ratio(&self) -> Option<usize> {
        self.conv_stride
            .iter()
            .try_fold(1usize, |acc, &stride| acc.checked_mul(stride))
    }

    pub fn get<T: FromConfigValue>(&self, key: &str) -> Option<T> {
        self.base.get(key)
    }

    pub fn to_map(&self) -> ConfigMap {
        let mut map = ConfigMap::new();
        self.base.write_into(&mut map);

        let mut put = |key: &str, value: ConfigValue| {
            map.insert(key.to_string(), value);
        };
        put("vocab_size", self.vocab_size.into_config_value());
        put("hidden_size", self.hidden_size.into_config_value());
        put("num_hidden_layers", self.num_hidden_layers.into_config_value());
        put("num_attention_heads", self.num_attention_heads.into_config_value());
        put("intermediate_size", self.intermediate_size.into_config_value());
        put("hidden_act", self.hidden_act.clone().into_config_value());
        put("hidden_dropout_prob", self.hidden_dropout_prob.into_config_value());
        put(
            "attention_probs_dropout_prob",
            self.attention_probs_dropout_prob.into_config_value(),
        );
        put("initializer_range", self.initializer_range.into_config_value());
        put("layer_norm_eps", self.layer_norm_eps.into_config_value());
        put("feat_extract_norm", self.feat_extract_norm.as_str().into_config_value());
        put("feat_extract_dropout", self.feat_extract_dropout.into_config_value());
        put(
            "feat_extract_activation",
            self.feat_extract_activation.clone().into_config_value(),
        );
        put("conv_dim", self.conv_dim.clone().into_config_value());
        put("conv_stride", self.conv_stride.clone().into_config_value());
        put("conv_kernel", self.conv_kernel.clone().into_config_value());
        put("conv_bias", self.conv_bias.into_config_value());
        put("num_conv_pos_embeddings", self.num_conv_pos_embeddings.into_config_value());
        put(
            "num_conv_pos_embedding_groups",
            self.num_conv_pos_embedding_groups.into_config_value(),
        );
        put("do_stable_layer_norm", self.do_stable_layer_norm.into_config_value());
        put("num_feat_extract_layers", self.num_feat_extract_layers.into_config_value());
        put(
            "performer_attention_config",
            ConfigValue::Map(self.performer_attention_config.clone()),
        );

        map
    }

    /// Rebuilds a configuration from its mapping form. Undeclared keys become extension
    /// arguments.
    pub fn from_map(map: ConfigMap) -> Result<Self, ConfigError> {
        let mut builder = Self::builder();
        for (key, value) in map {
            builder.apply(&key, value)?;
        }
        builder.build()
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        match ConfigValue::from(value) {
            ConfigValue::Map(map) => Self::from_map(map),
            _ => Err(ConfigError::NotAnObject),
        }
    }

    /// Fails on NaN or infinite values, which JSON cannot carry.
    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        let map = self.to_map();
        if let Some(field) = find_non_finite(&map) {
            return Err(ConfigError::NonFiniteFloat { field });
        }
        Ok(serde_json::to_string_pretty(&map)?)
    }
}

pub struct Wav2Vec2PerformerConfigBuilder {
    vocab_size: usize,
    hidden_size: usize,
    num_hidden_layers: usize,
    num_attention_heads: usize,
    intermediate_size: usize,
    hidden_act: String,
    hidden_dropout_prob: f64,
    attention_probs_dropout_prob: f64,
    initializer_range: f64,
    layer_norm_eps: f64,
    feat_extract_norm: FeatExtractNorm,
    feat_extract_dropout: f64,
    feat_extract_activation: String,
    conv_dim: Vec<usize>,
    conv_stride: Vec<usize>,
    conv_kernel: Vec<usize>,
    conv_bias: bool,
    num_conv_pos_embeddings: usize,
    num_conv_pos_embedding_groups: usize,
    do_stable_layer_norm: bool,
    pad_token_id: TokenId,
    bos_token_id: TokenId,
    eos_token_id: TokenId,
    performer_attention_config: AttentionConfigInput,
    extensions: ConfigMap,
}

impl Wav2Vec2PerformerConfigBuilder {
    pub fn new() -> Self {
        Self {
            vocab_size: 32,
            hidden_size: 768,
            num_hidden_layers: 12,
            num_attention_heads: 12,
            intermediate_size: 3072,
            hidden_act: "gelu".to_string(),
            hidden_dropout_prob: 0.1,
            attention_probs_dropout_prob: 0.1,
            initializer_range: 0.02,
            layer_norm_eps: 1e-5,
            feat_extract_norm: FeatExtractNorm::Group,
            feat_extract_dropout: 0.0,
            feat_extract_activation: "gelu".to_string(),
            conv_dim: vec![512; 7],
            conv_stride: vec![5, 2, 2, 2, 2, 2, 2],
            conv_kernel: vec![10, 3, 3, 3, 3, 2, 2],
            conv_bias: false,
            num_conv_pos_embeddings: 128,
            num_conv_pos_embedding_groups: 16,
            do_stable_layer_norm: false,
            pad_token_id: TokenId::PAD,
            bos_token_id: TokenId::BOS,
            eos_token_id: TokenId::EOS,
            performer_attention_config: AttentionConfigInput::default(),
            extensions: ConfigMap::new(),
        }
    }

    pub fn vocab_size(mut self, size: usize) -> Self {
        self.vocab_size = size;
        self
    }

    pub fn hidden_size(mut self, size: usize) -> Self {
        self.hidden_size = size;
        self
    }

    pub fn num_hidden_layers(mut self, n: usize) -> Self {
        self.num_hidden_layers = n;
        self
    }

    pub fn num_attention_heads(mut self, n: usize) -> Self {
        self.num_attention_heads = n;
        self
    }

    pub fn intermediate_size(mut self, size: usize) -> Self {
        self.intermediate_size = size;
        self
    }

    pub fn hidden_act(mut self, act: impl Into<String>) -> Self {
        self.hidden_act = act.into();
        self
    }

    pub fn hidden_dropout_prob(mut self, p: f64) -> Self {
        self.hidden_dropout_prob = p;
        self
    }

    pub fn attention_probs_dropout_prob(mut self, p: f64) -> Self {
        self.attention_probs_dropout_prob = p;
        self
    }

    pub fn initializer_range(mut self, range: f64) -> Self {
        self.initializer_range = range;
        self
    }

    pub fn layer_norm_eps(mut self, eps: f64) -> Self {
        self.layer_norm_eps = eps;
        self
    }

    pub fn feat_extract_norm(mut self, norm: FeatExtractNorm) -> Self {
        self.feat_extract_norm = norm;
        self
    }

    pub fn feat_extract_dropout(mut self, p: f64) -> Self {
        self.feat_extract_dropout = p;
        self
    }

    pub fn feat_extract_activation(mut self, act: impl Into<String>) -> Self {
        self.feat_extract_activation = act.into();
        self
    }

    pub fn conv_dim(mut self, dims: Vec<usize>) -> Self {
        self.conv_dim = dims;
        self
    }

    pub fn conv_stride(mut self, strides: Vec<usize>) -> Self {
        self.conv_stride = strides;
        self
    }

    pub fn conv_kernel(mut self, kernels: Vec<usize>) -> Self {
        self.conv_kernel = kernels;
        self
    }

    pub fn conv_bias(mut self, bias: bool) -> Self {
        self.conv_bias = bias;
        self
    }

    pub fn num_conv_pos_embeddings(mut self, n: usize) -> Self {
        self.num_conv_pos_embeddings = n;
        self
    }

    pub fn num_conv_pos_embedding_groups(mut self, n: usize) -> Self {
        self.num_conv_pos_embedding_groups = n;
        self
    }

    pub fn do_stable_layer_norm(mut self, stable: bool) -> Self {
        self.do_stable_layer_norm = stable;
        self
    }

    pub fn pad_token_id(mut self, id: TokenId) -> Self {
        self.pad_token_id = id;
        self
    }

    pub fn bos_token_id(mut self, id: TokenId) -> Self {
        self.bos_token_id = id;
        self
    }

    pub fn eos_token_id(mut self, id: TokenId) -> Self {
        self.eos_token_id = id;
        self
    }

    /// Takes ownership of the attention config; the caller's value is never touched.
    pub fn performer_attention_config(mut self, config: impl Into<AttentionConfigInput>) -> Self {
        self.performer_attention_config = config.into();
        self
    }

    /// Adds an extension argument. It is kept on the base config and applied on top of
    /// the attention config. A declared field name sets that field instead when the
    /// builder runs.
    pub fn extension<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: IntoConfigValue,
    {
        self.extensions.insert(key.into(), value.into_config_value());
        self
    }

    /// Sets a field by name; names the builder does not declare become extensions.
    pub fn apply(&mut self, key: &str, value: ConfigValue) -> Result<(), ConfigError> {
        if let Some(value) = self.set_declared(key, value)? {
            self.extensions.insert(key.to_string(), value);
        }
        Ok(())
    }

    /// Hands the value back when `key` is not a declared field.
    fn set_declared(
        &mut self,
        key: &str,
        value: ConfigValue,
    ) -> Result<Option<ConfigValue>, ConfigError> {
        match key {
            "vocab_size" => self.vocab_size = expect_field(key, value, "an integer")?,
            "hidden_size" => self.hidden_size = expect_field(key, value, "an integer")?,
            "num_hidden_layers" => self.num_hidden_layers = expect_field(key, value, "an integer")?,
            "num_attention_heads" => {
                self.num_attention_heads = expect_field(key, value, "an integer")?
            }
            "intermediate_size" => self.intermediate_size = expect_field(key, value, "an integer")?,
            "hidden_act" => self.hidden_act = expect_field(key, value, "a string")?,
            "hidden_dropout_prob" => {
                self.hidden_dropout_prob = expect_field(key, value, "a number")?
            }
            "attention_probs_dropout_prob" => {
                self.attention_probs_dropout_prob = expect_field(key, value, "a number")?
            }
            "initializer_range" => self.initializer_range = expect_field(key, value, "a number")?,
            "layer_norm_eps" => self.layer_norm_eps = expect_field(key, value, "a number")?,
            "feat_extract_norm" => {
                let name: String = expect_field(key, value, "a string")?;
                self.feat_extract_norm = name.parse()?;
            }
            "feat_extract_dropout" => {
                self.feat_extract_dropout = expect_field(key, value, "a number")?
            }
            "feat_extract_activation" => {
                self.feat_extract_activation = expect_field(key, value, "a string")?
            }
            "conv_dim" => self.conv_dim = expect_field(key, value, "a list of integers")?,
            "conv_stride" => self.conv_stride = expect_field(key, value, "a list of integers")?,
            "conv_kernel" => self.conv_kernel = expect_field(key, value, "a list of integers")?,
            "conv_bias" => self.conv_bias = expect_field(key, value, "a bool")?,
            "num_conv_pos_embeddings" => {
                self.num_conv_pos_embeddings = expect_field(key, value, "an integer")?
            }
            "num_conv_pos_embedding_groups" => {
                self.num_conv_pos_embedding_groups = expect_field(key, value, "an integer")?
            }
            "do_stable_layer_norm" => {
                self.do_stable_layer_norm = expect_field(key, value, "a bool")?
            }
            "pad_token_id" => self.pad_token_id = TokenId::from_field(key, value)?,
            "bos_token_id" => self.bos_token_id = TokenId::from_field(key, value)?,
            "eos_token_id" => self.eos_token_id = TokenId::from_field(key, value)?,
            "performer_attention_config" => {
                let map: ConfigMap = expect_field(key, value, "a map")?;
                self.performer_attention_config = AttentionConfigInput::Map(map);
            }
            // Derived on build.
            "model_type" | "num_feat_extract_layers" => {}
            _ => return Ok(Some(value)),
        }
        Ok(None)
    }

    pub fn build(mut self) -> Result<Wav2Vec2PerformerConfig, ConfigError> {
        for (key, value) in std::mem::take(&mut self.extensions) {
            if let Some(value) = self.set_declared(&key, value)? {
                self.extensions.insert(key, value);
            }
        }

        let num_feat_extract_layers = self.conv_dim.len();
        if self.conv_stride.len() != num_feat_extract_layers
            || self.conv_kernel.len() != num_feat_extract_layers
        {
            return Err(ConfigError::ConvGeometryMismatch {
                conv_dim: self.conv_dim.len(),
                conv_stride: self.conv_stride.len(),
                conv_kernel: self.conv_kernel.len(),
            });
        }
        tracing::debug!(
            "Feature extractor: {} conv layers, dims {:?}, strides {:?}, kernels {:?}",
            num_feat_extract_layers,
            self.conv_dim,
            self.conv_stride,
            self.conv_kernel
        );

        let shared = [
            (
                "attention_dropout",
                self.attention_probs_dropout_prob.into_config_value(),
            ),
            ("d_model", self.hidden_size.into_config_value()),
            ("num_heads", self.num_attention_heads.into_config_value()),
        ];
        let performer_attention_config = match self.performer_attention_config {
            AttentionConfigInput::Map(map) => merge_attention(map, &self.extensions, shared)?,
            AttentionConfigInput::Record(record) => {
                merge_attention(record.to_map(), &self.extensions, shared)?
            }
        };

        let mut base = BaseConfig::new(MODEL_TYPE);
        base.pad_token_id = self.pad_token_id;
        base.bos_token_id = self.bos_token_id;
        base.eos_token_id = self.eos_token_id;
        base.extra = self.extensions;

        Ok(Wav2Vec2PerformerConfig {
            base,
            vocab_size: self.vocab_size,
            hidden_size: self.hidden_size,
            num_hidden_layers: self.num_hidden_layers,
            num_attention_heads: self.num_attention_heads,
            intermediate_size: self.intermediate_size,
            hidden_act: self.hidden_act,
            hidden_dropout_prob: self.hidden_dropout_prob,
            attention_probs_dropout_prob: self.attention_probs_dropout_prob,
            initializer_range: self.initializer_range,
            layer_norm_eps: self.layer_norm_eps,
            feat_extract_norm: self.feat_extract_norm,
            feat_extract_dropout: self.feat_extract_dropout,
            feat_extract_activation: self.feat_extract_activation,
            conv_bias: self.conv_bias,
            num_conv_pos_embeddings: self.num_conv_pos_embeddings,
            num_conv_pos_embedding_groups: self.num_conv_pos_embedding_groups,
            do_stable_layer_norm: self.do_stable_layer_norm,
            conv_dim: self.conv_dim,
            conv_stride: self.conv_stride,
            conv_kernel: self.conv_kernel,
            num_feat_extract_layers,
            performer_attention_config,
        })
    }
}

impl Default for Wav2Vec2PerformerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Extensions are applied first, then the shared dimensions are forced, so the result
/// always agrees with the parent whatever either input said. Records are flattened
/// before they get here, so extension values are never type-checked against them.
fn merge_attention<C: AttributeMap>(
    mut target: C,
    extensions: &ConfigMap,
    shared: [(&str, ConfigValue); 3],
) -> Result<ConfigMap, ConfigError> {
    for (key, value) in extensions {
        target.set_field(key, value.clone())?;
    }
    for (key, value) in shared {
        if let Some(previous) = target.get_field(key).filter(|v| !v.is_null()) {
            if previous.get::<f64>() != value.get::<f64>() {
                tracing::debug!(
                    "Overriding attention `{}` = {:?} with parent value {:?}",
                    key,
                    previous,
                    value
                );
            }
        }
        target.set_field(key, value)?;
    }
    Ok(target.to_map())
}

pub trait IntoConfigValue {
    fn into_config_value(self) -> ConfigValue;
}

impl IntoConfigValue for i64 {
    fn into_config_value(self) -> ConfigValue {
        ConfigValue::Int(self)
    }
}

impl IntoConfigValue for i32 {
    fn into_config_value(self) -> ConfigValue {
        ConfigValue::Int(self as i64)
    }
}

impl IntoConfigValue for u64 {
    fn into_config_value(self) -> ConfigValue {
        ConfigValue::Uint(self)
    }
}

impl IntoConfigValue for usize {
    fn into_config_value(self) -> ConfigValue {
        ConfigValue::Uint(self as u64)
    }
}

impl IntoConfigValue for f64 {
    fn into_config_value(self) -> ConfigValue {
        ConfigValue::Float(self)
    }
}

impl IntoConfigValue for String {
    fn into_config_value(self) -> ConfigValue {
        ConfigValue::String(self)
    }
}

impl IntoConfigValue for &str {
    fn into_config_value(self) -> ConfigValue {
        ConfigValue::String(self.to_string())
    }
}

impl IntoConfigValue for bool {
    fn into_config_value(self) -> ConfigValue {
        ConfigValue::Bool(self)
    }
}

impl<T: IntoConfigValue> IntoConfigValue for Vec<T> {
    fn into_config_value(self) -> ConfigValue {
        ConfigValue::Array(self.into_iter().map(IntoConfigValue::into_config_value).collect())
    }
}

impl IntoConfigValue for ConfigMap {
    fn into_config_value(self) -> ConfigValue {
        ConfigValue::Map(self)
    }
}

impl IntoConfigValue for ConfigValue {
    fn into_config_value(self) -> ConfigValue {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::attention::PerformerKernel;

    fn attention_entry(config: &Wav2Vec2PerformerConfig, key: &str) -> ConfigValue {
        config.performer_attention_config()[key].clone()
    }

    #[test]
    fn test_default_geometry() {
        let config = Wav2Vec2PerformerConfig::builder().build().unwrap();

        assert_eq!(config.num_feat_extract_layers(), 7);
        assert_eq!(config.conv_kernel(), &[10, 3, 3, 3, 3, 2, 2]);
        assert_eq!(config.inputs_to_logits_ratio(), Some(320));
        assert_eq!(config.head_dim(), 64);
        assert_eq!(config.base.model_type, "wav2vec2");
        assert_eq!(config.base.pad_token_id, TokenId::PAD);
        assert_eq!(config.feat_extract_norm, FeatExtractNorm::Group);
    }

    #[test]
    fn test_equal_length_geometry() {
        let config = Wav2Vec2PerformerConfig::builder()
            .conv_dim(vec![512, 512, 512])
            .conv_stride(vec![5, 2, 2])
            .conv_kernel(vec![10, 3, 3])
            .build()
            .unwrap();

        assert_eq!(config.num_feat_extract_layers(), 3);
        assert_eq!(config.inputs_to_logits_ratio(), Some(20));
    }

    #[test]
    fn test_mismatched_geometry() {
        let err = Wav2Vec2PerformerConfig::builder()
            .conv_dim(vec![512, 512])
            .conv_stride(vec![5, 2, 2])
            .conv_kernel(vec![10, 3, 3])
            .build()
            .unwrap_err();

        assert!(matches!(
            err,
            ConfigError::ConvGeometryMismatch {
                conv_dim: 2,
                conv_stride: 3,
                conv_kernel: 3
            }
        ));
        let message = err.to_string();
        assert!(message.contains("`len(conv_dim) = 2`"));
        assert!(message.contains("`len(conv_stride) = 3`"));
        assert!(message.contains("`len(conv_kernel) = 3`"));
    }

    #[test]
    fn test_mismatch_in_kernel_only() {
        let result = Wav2Vec2PerformerConfig::builder()
            .conv_dim(vec![512, 512, 512])
            .conv_stride(vec![5, 2, 2])
            .conv_kernel(vec![10, 3])
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_map_gets_shared_fields() {
        let config = Wav2Vec2PerformerConfig::builder()
            .hidden_size(256)
            .num_attention_heads(8)
            .performer_attention_config(ConfigMap::new())
            .build()
            .unwrap();

        let attention = config.performer_attention_config();
        assert_eq!(attention.len(), 3);
        assert_eq!(attention["d_model"], ConfigValue::Uint(256));
        assert_eq!(attention["num_heads"], ConfigValue::Uint(8));
        assert_eq!(attention["attention_dropout"], ConfigValue::Float(0.1));
    }

    #[test]
    fn test_shared_fields_overwrite_record_values() {
        let mut record = PerformerAttentionConfig::default();
        record.d_model = Some(1024);
        record.num_heads = Some(16);
        record.attention_dropout = 0.5;

        let config = Wav2Vec2PerformerConfig::builder()
            .hidden_size(512)
            .num_attention_heads(4)
            .attention_probs_dropout_prob(0.0)
            .performer_attention_config(record.clone())
            .build()
            .unwrap();

        assert_eq!(attention_entry(&config, "d_model"), ConfigValue::Uint(512));
        assert_eq!(attention_entry(&config, "num_heads"), ConfigValue::Uint(4));
        assert_eq!(attention_entry(&config, "attention_dropout"), ConfigValue::Float(0.0));
        // The caller's record is untouched.
        assert_eq!(record.d_model, Some(1024));
    }

    #[test]
    fn test_extensions_override_input_but_not_shared_fields() {
        let mut map = ConfigMap::new();
        map.insert("causal".to_string(), ConfigValue::Bool(false));

        let config = Wav2Vec2PerformerConfig::builder()
            .hidden_size(256)
            .performer_attention_config(map)
            .extension("causal", true)
            .extension("d_model", 9999usize)
            .extension("gradient_checkpointing", true)
            .build()
            .unwrap();

        assert_eq!(attention_entry(&config, "causal"), ConfigValue::Bool(true));
        assert_eq!(attention_entry(&config, "d_model"), ConfigValue::Uint(256));
        assert_eq!(
            attention_entry(&config, "gradient_checkpointing"),
            ConfigValue::Bool(true)
        );
        assert_eq!(config.get::<bool>("gradient_checkpointing"), Some(true));
    }

    #[test]
    fn test_wrong_typed_extension_same_for_map_and_record() {
        let record = PerformerAttentionConfig::default();
        let inputs: [AttentionConfigInput; 2] = [
            AttentionConfigInput::Map(record.to_map()),
            AttentionConfigInput::Record(record),
        ];
        let maps: Vec<ConfigMap> = inputs
            .into_iter()
            .map(|input| {
                Wav2Vec2PerformerConfig::builder()
                    .performer_attention_config(input)
                    .extension("causal", "yes")
                    .build()
                    .unwrap()
                    .performer_attention_config()
                    .clone()
            })
            .collect();

        assert_eq!(maps[0], maps[1]);
        assert_eq!(maps[0]["causal"], ConfigValue::String("yes".to_string()));
    }

    #[test]
    fn test_extension_with_declared_name_sets_field() {
        let config = Wav2Vec2PerformerConfig::builder()
            .extension("hidden_size", 64usize)
            .extension("problem_type", "ctc")
            .build()
            .unwrap();

        assert_eq!(config.hidden_size, 64);
        assert!(!config.base.extra.contains_key("hidden_size"));
        assert!(config.base.extra.contains_key("problem_type"));
        assert_eq!(config.performer_attention_config()["d_model"], ConfigValue::Uint(64));

        let rebuilt = Wav2Vec2PerformerConfig::from_map(config.to_map()).unwrap();
        assert_eq!(rebuilt, config);
    }

    #[test]
    fn test_extension_with_declared_name_checks_type() {
        let err = Wav2Vec2PerformerConfig::builder()
            .extension("hidden_size", "big")
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidField { ref field, .. } if field == "hidden_size"));
    }

    #[test]
    fn test_inputs_to_logits_ratio_overflow() {
        let config = Wav2Vec2PerformerConfig::builder()
            .conv_dim(vec![512, 512])
            .conv_stride(vec![usize::MAX, 2])
            .conv_kernel(vec![3, 3])
            .build()
            .unwrap();
        assert_eq!(config.inputs_to_logits_ratio(), None);
    }

    #[test]
    fn test_json_rejects_non_finite() {
        let mut config = Wav2Vec2PerformerConfig::builder().build().unwrap();
        config.hidden_dropout_prob = f64::NAN;

        let err = config.to_json_string().unwrap_err();
        assert!(matches!(err, ConfigError::NonFiniteFloat { ref field } if field == "hidden_dropout_prob"));
    }

    #[test]
    fn test_map_and_record_inputs_agree() {
        let mut record = PerformerAttentionConfig::default();
        record.kernel_type = PerformerKernel::Relu;
        record.num_random_features = Some(64);
        let map = record.to_map();

        let from_record = Wav2Vec2PerformerConfig::builder()
            .performer_attention_config(record)
            .extension("redraw_verbose", true)
            .extension("note", "x")
            .build()
            .unwrap();
        let from_map = Wav2Vec2PerformerConfig::builder()
            .performer_attention_config(map)
            .extension("redraw_verbose", true)
            .extension("note", "x")
            .build()
            .unwrap();

        assert_eq!(
            from_record.performer_attention_config(),
            from_map.performer_attention_config()
        );
    }

    #[test]
    fn test_typed_attention_view() {
        let config = Wav2Vec2PerformerConfig::builder()
            .hidden_size(768)
            .num_attention_heads(12)
            .build()
            .unwrap();

        let attention = config.attention_config().unwrap();
        assert_eq!(attention.d_model, Some(768));
        assert_eq!(attention.num_heads, Some(12));
        assert_eq!(attention.resolved_num_random_features(), Some(266));
    }

    #[test]
    fn test_map_roundtrip() {
        let config = Wav2Vec2PerformerConfig::builder()
            .feat_extract_norm(FeatExtractNorm::Layer)
            .do_stable_layer_norm(true)
            .eos_token_id(TokenId(7))
            .extension("problem_type", "ctc")
            .build()
            .unwrap();

        let rebuilt = Wav2Vec2PerformerConfig::from_map(config.to_map()).unwrap();
        assert_eq!(rebuilt, config);
    }

    #[test]
    fn test_apply_rejects_bad_values() {
        let mut builder = Wav2Vec2PerformerConfig::builder();
        let err = builder
            .apply("feat_extract_norm", ConfigValue::String("batch".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownVariant { .. }));

        let err = builder
            .apply("conv_dim", ConfigValue::String("512".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidField { .. }));

        let err = builder
            .apply("performer_attention_config", ConfigValue::Bool(true))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidField { .. }));
    }
}
