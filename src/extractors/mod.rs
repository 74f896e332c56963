pub mod metrics_extractor;

pub use metrics_extractor::MetricsExtractor;
