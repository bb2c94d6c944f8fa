use anyhow::{bail, Context, Result};
use clap::Args;
use std::fs;
use std::path::{Path, PathBuf};
use wav2vec2_performer::{ConfigMap, ConfigValue, Wav2Vec2PerformerConfig};

const ATTENTION_KEY: &str = "performer_attention_config";

#[derive(Args, Debug, Default)]
pub struct ResolveArgs {
    /// JSON object of constructor arguments
    #[arg(short, long)]
    pub file: Option<PathBuf>,
    /// Override a single argument; `performer_attention_config.<key>` targets the
    /// attention block. VALUE is parsed as JSON, falling back to a plain string.
    #[arg(short, long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,
}

pub fn show(args: &ResolveArgs) -> Result<()> {
    let config = resolve(args)?;
    println!("{}", config.to_json_string()?);
    Ok(())
}

pub fn check(args: &ResolveArgs) -> Result<()> {
    let config = resolve(args)?;
    println!(
        "ok: {} feature extractor layers, {} encoder layers, {} heads of dim {}",
        config.num_feat_extract_layers(),
        config.num_hidden_layers,
        config.num_attention_heads,
        config.head_dim()
    );
    Ok(())
}

pub fn resolve(args: &ResolveArgs) -> Result<Wav2Vec2PerformerConfig> {
    let mut map = match &args.file {
        Some(path) => load_arguments(path)?,
        None => ConfigMap::new(),
    };

    for item in &args.set {
        let (key, value) = parse_override(item)?;
        tracing::debug!("Override {} = {:?}", key, value);
        insert_override(&mut map, &key, value)?;
    }

    Wav2Vec2PerformerConfig::from_map(map).context("Invalid configuration")
}

fn load_arguments(path: &Path) -> Result<ConfigMap> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    match ConfigValue::from(value) {
        ConfigValue::Map(map) => Ok(map),
        other => bail!(
            "{} must contain a JSON object, found {}",
            path.display(),
            other.type_name()
        ),
    }
}

pub fn parse_override(item: &str) -> Result<(String, ConfigValue)> {
    let (key, raw) = item
        .split_once('=')
        .with_context(|| format!("Expected KEY=VALUE, got `{}`", item))?;
    let key = key.trim();
    if key.is_empty() {
        bail!("Empty key in `{}`", item);
    }

    let value = serde_json::from_str::<serde_json::Value>(raw)
        .map(ConfigValue::from)
        .unwrap_or_else(|_| ConfigValue::String(raw.to_string()));

    Ok((key.to_string(), value))
}

fn insert_override(map: &mut ConfigMap, key: &str, value: ConfigValue) -> Result<()> {
    let Some(field) = key
        .strip_prefix(ATTENTION_KEY)
        .and_then(|rest| rest.strip_prefix('.'))
    else {
        map.insert(key.to_string(), value);
        return Ok(());
    };

    let entry = map
        .entry(ATTENTION_KEY.to_string())
        .or_insert_with(|| ConfigValue::Map(ConfigMap::new()));
    match entry {
        ConfigValue::Map(attention) => {
            attention.insert(field.to_string(), value);
            Ok(())
        }
        other => bail!(
            "Cannot set `{}`: `{}` is a {}, not a map",
            key,
            ATTENTION_KEY,
            other.type_name()
        ),
    }
}
