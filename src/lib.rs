pub mod error;
pub mod config;
pub mod corpus;
pub mod chi;
pub mod vectorize;
pub mod boost;
mod pipeline;

pub use pipeline::{Pipeline, Outcome, holdout_split};
pub use config::files_handling;
pub use corpus::Corpus;
pub use chi::ChiSelector;
pub use boost::Booster;
