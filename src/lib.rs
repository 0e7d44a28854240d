pub mod analysis;
pub mod config;
pub mod error;
pub mod ingest;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod resolve;
pub mod series;
pub mod summary;
