use crate::extractor::{ExtractionError, Extractor, HtmlExtractor, PageFetcher, ProductSnapshot};
use crate::identity::{detect_site, Site};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Routes each URL to the extractor registered for its retailer.
///
/// Sites without a dedicated extractor use the fallback.
#[derive(Clone)]
pub struct ExtractorRegistry {
    extractors: HashMap<Site, Arc<dyn Extractor>>,
    fallback: Arc<dyn Extractor>,
}

impl ExtractorRegistry {
    /// Create a new ExtractorRegistry with only a fallback extractor
    pub fn new(fallback: Arc<dyn Extractor>) -> Self {
        Self {
            extractors: HashMap::new(),
            fallback,
        }
    }

    /// Register a dedicated extractor for a site
    pub fn with_extractor(mut self, site: Site, extractor: Arc<dyn Extractor>) -> Self {
        self.extractors.insert(site, extractor);
        self
    }

    /// HTML extractors for every known retailer sharing one HTTP client
    pub fn html(fetcher: PageFetcher) -> Self {
        let generic: Arc<dyn Extractor> = Arc::new(HtmlExtractor::new(fetcher.clone(), Site::Generic));

        [Site::Amazon, Site::Flipkart, Site::Myntra]
            .into_iter()
            .fold(Self::new(generic), |registry, site| {
                registry.with_extractor(site, Arc::new(HtmlExtractor::new(fetcher.clone(), site)))
            })
    }

    /// Extractor responsible for a site
    pub fn for_site(&self, site: Site) -> Arc<dyn Extractor> {
        self.extractors
            .get(&site)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone())
    }

    /// Extractor responsible for a URL
    pub fn for_url(&self, url: &str) -> Arc<dyn Extractor> {
        self.for_site(detect_site(url))
    }
}

#[async_trait]
impl Extractor for ExtractorRegistry {
    async fn fetch(&self, url: &str) -> Result<ProductSnapshot, ExtractionError> {
        debug!("Fetching {} with the {} extractor", url, detect_site(url));
        self.for_url(url).fetch(url).await
    }
}
