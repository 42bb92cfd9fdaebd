pub mod error;
pub mod export;
pub mod models;
pub mod observer;
pub mod pipeline;
pub mod scrapers;
pub mod stop;

pub use error::CrawlError;
pub use pipeline::{CrawlReport, Phase, Pipeline, RunStatus};
pub use stop::StopSignal;
