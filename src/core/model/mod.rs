pub mod attention;
pub mod base;
pub mod config;
pub mod error;
pub mod traits;

pub use attention::{OrthogonalFeatureAlgorithm, PerformerAttentionConfig, PerformerKernel};
pub use base::BaseConfig;
pub use config::{
    AttentionConfigInput, FeatExtractNorm, IntoConfigValue, Wav2Vec2PerformerConfig,
    Wav2Vec2PerformerConfigBuilder,
};
pub use error::ConfigError;
pub use traits::{AttributeMap, ConfigMap, ConfigValue, FromConfigValue};

/// Tag written under `model_type` in rendered configurations.
pub const MODEL_TYPE: &str = "wav2vec2";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenId(pub i32);

impl TokenId {
    pub const BOS: Self = Self(1);
    pub const EOS: Self = Self(2);
    pub const PAD: Self = Self(0);
}
