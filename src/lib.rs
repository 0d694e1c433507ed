pub mod cache;
pub mod config;
pub mod embedding;
pub mod model;
pub mod prune;
pub mod reconcile;
pub mod report;
pub mod sampler;
pub mod scorer;
pub mod similarity;
pub mod text;
pub mod util;
