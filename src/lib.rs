// Library interface for ro_asset_scraper
// The binary and the integration tests both drive the crawl through these modules

pub mod artifact_cache;
pub mod config;
pub mod crawler;
pub mod error;
pub mod export;
pub mod helpers;
pub mod http_client;
pub mod models;
pub mod silhouette;
pub mod sources;
