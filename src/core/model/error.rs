use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "Configuration for convolutional layers is incorrect. \
         It is required that `len(conv_dim)` == `len(conv_stride)` == `len(conv_kernel)`, \
         but is `len(conv_dim) = {conv_dim}`, `len(conv_stride) = {conv_stride}`, \
         `len(conv_kernel) = {conv_kernel}`."
    )]
    ConvGeometryMismatch {
        conv_dim: usize,
        conv_stride: usize,
        conv_kernel: usize,
    },
    #[error("Invalid value for `{field}`: expected {expected}, found {found}")]
    InvalidField {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("Unknown value `{value}` for `{field}`")]
    UnknownVariant { field: String, value: String },
    #[error("Cannot render non-finite value for `{field}` as JSON")]
    NonFiniteFloat { field: String },
    #[error("Configuration must be a JSON object")]
    NotAnObject,
    #[error("Error parsing JSON: {0}")]
    Json(#[from] serde_json::Error),
}
