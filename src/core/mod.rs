pub mod model;

pub use model::{
    AttentionConfigInput, ConfigError, ConfigMap, ConfigValue, FeatExtractNorm,
    PerformerAttentionConfig, TokenId, Wav2Vec2PerformerConfig,
};
