pub mod core;

pub mod model {
    pub use crate::core::model::*;
}

pub use core::{
    AttentionConfigInput, ConfigError, ConfigMap, ConfigValue, FeatExtractNorm,
    PerformerAttentionConfig, TokenId, Wav2Vec2PerformerConfig,
};
