use crate::config::{Config, ExtractorKind, SiteConfig};
use crate::extractors::gallery::GalleryExtractor;
use crate::extractors::generic::GenericImageExtractor;
use crate::extractors::keyword::KeywordFilteredExtractor;
use crate::traits::MediaExtractor;
use std::collections::HashMap;

/// Registry for extraction strategies, keyed by site key
pub struct ExtractorRegistry {
    extractors: HashMap<String, Box<dyn MediaExtractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    /// One extractor per known site, built from that site's selectors.
    pub fn from_config(config: &Config) -> Self {
        let mut registry = Self::new();
        for (key, site) in config.all_sites() {
            registry.register_extractor(&key, build_extractor(&site));
        }
        registry
    }

    /// Registers (or replaces) the extractor for `key`. Keys are case-insensitive.
    pub fn register_extractor(&mut self, key: &str, extractor: Box<dyn MediaExtractor>) {
        self.extractors.insert(key.to_lowercase(), extractor);
    }

    pub fn get_extractor(&self, key: &str) -> Option<&dyn MediaExtractor> {
        self.extractors.get(&key.to_lowercase()).map(|e| e.as_ref())
    }

    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.extractors.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub fn build_extractor(site: &SiteConfig) -> Box<dyn MediaExtractor> {
    match site.extractor {
        ExtractorKind::Generic => Box::new(GenericImageExtractor::new(&site.selectors)),
        ExtractorKind::Keyword => Box::new(KeywordFilteredExtractor::new(&site.selectors)),
        ExtractorKind::Gallery => Box::new(GalleryExtractor::new(&site.selectors)),
    }
}
