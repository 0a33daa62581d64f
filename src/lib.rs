//! Headless-browser media scraping.
//!
//! A target (site search, profile or keyword search) is loaded in a browser
//! page, scrolled until its content stops growing, handed to a site-specific
//! extractor, and the resulting media are downloaded with retries into a
//! per-target directory.

pub mod batch;
pub mod browser;
pub mod config;
pub mod cookies;
pub mod downloader;
pub mod error;
pub mod extractors;
pub mod models;
pub mod navigation;
pub mod orchestrator;
pub mod pacing;
pub mod registry;
pub mod retry;
pub mod selection;
pub mod session;
pub mod storage;
pub mod traits;

pub use config::Config;
pub use error::{Result, ScrapeError};
pub use models::{MediaItem, RunReport, Target, TargetKind};
pub use orchestrator::Orchestrator;
