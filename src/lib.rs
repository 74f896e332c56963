pub mod analysis;
pub mod api;
pub mod concurrent_fetcher;
pub mod extractors;
pub mod models;
pub mod storage;
pub mod utils;
