
use std::path::PathBuf;
use thiserror::Error;


#[derive(Error, Debug)]
pub enum CorpusError {

    #[error("file not exists: {0}")]
    NotFound(PathBuf),

    // line numbers are 1-based, as an editor shows them
    #[error("line {line_number} has no tab between label and text")]
    MalformedLine { line_number: usize },

    #[error("io error while reading corpus: {0}")]
    Io(#[from] std::io::Error),
}


#[derive(Error, Debug)]
pub enum ChiError {

    #[error("corpus_size {corpus_size} is smaller than the {documents} parsed documents")]
    CorpusTooSmall { corpus_size: usize, documents: usize },
}


#[derive(Error, Debug)]
pub enum BoostError {

    #[error("feature matrix has {rows} rows but {labels} labels were given")]
    ShapeMismatch { rows: usize, labels: usize },

    #[error("cannot train on an empty feature matrix")]
    Empty,

    #[error("label {label} is out of range for num_class {num_class}")]
    LabelOutOfRange { label: usize, num_class: usize },

    #[error("model expects {expected} features, got {found}")]
    FeatureCount { expected: usize, found: usize },

    #[error("unknown objective '{0}', expected multi:softmax or multi:softprob")]
    UnknownObjective(String),

    #[error("unknown eval_metric '{0}', expected merror or mlogloss")]
    UnknownMetric(String),
}


#[derive(Error, Debug)]
pub enum ConfigError {

    #[error("input should be a path to json file only")]
    Usage,

    #[error("cannot open json file: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot read json file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("given {key} is not {expected}")]
    InvalidValue { key: String, expected: &'static str },
}
