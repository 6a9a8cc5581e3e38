use crate::extractor::{ExtractionError, Extractor, PageFetcher, ProductSnapshot, PRICE_NOT_FOUND};
use crate::identity::Site;
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, warn};

const MAX_NAME_CHARS: usize = 100;

/// Free-text price patterns tried against the whole page when no site rule matched
const PAGE_PRICE_PATTERNS: [&str; 3] = [r"₹[\d,]+\.?\d*", r"\$[\d,]+\.?\d*", r"[\d,]+\.?\d*\s*₹"];

/// Image attributes in lookup order (lazy-loading variants last)
const IMAGE_ATTRIBUTES: [&str; 5] = ["src", "data-old-hires", "data-src", "data-original", "data-lazy-src"];

/// How a rule's first capture group is turned into a value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capture {
    /// Inner HTML of an element, reduced to its text
    Text,
    /// A whole `<img>` tag; the URL comes from its source attributes
    ImgTag,
    /// An attribute value used as text
    Attribute,
    /// An attribute value holding an image URL
    ImageUrl,
}

#[derive(Debug, Clone)]
struct Rule {
    regex: Regex,
    capture: Capture,
}

/// Which image URLs a site accepts
#[derive(Debug, Clone, Default)]
struct ImagePolicy {
    /// Prefix for root-relative sources
    relative_base: Option<&'static str>,
    /// If non-empty, the URL must mention one of these hosts
    required_hosts: &'static [&'static str],
    rejected: &'static [&'static str],
}

impl ImagePolicy {
    fn accept(&self, src: &str) -> Option<String> {
        let src = decode_entities(src.trim());
        let url = if let Some(rest) = src.strip_prefix("//") {
            format!("https://{}", rest)
        } else if src.starts_with('/') {
            format!("{}{}", self.relative_base?, src)
        } else {
            src
        };

        if !url.contains("http") {
            return None;
        }
        if !self.required_hosts.is_empty() && !self.required_hosts.iter().any(|host| url.contains(host)) {
            return None;
        }
        let lower = url.to_lowercase();
        if self.rejected.iter().any(|word| lower.contains(word)) {
            return None;
        }
        Some(url)
    }
}

/// Extraction rules for one retailer layout
#[derive(Debug, Clone)]
pub struct SiteRules {
    site: Site,
    price: Vec<Rule>,
    name: Vec<Rule>,
    image: Vec<Rule>,
    min_name_chars: usize,
    images: ImagePolicy,
}

impl SiteRules {
    /// Rules for the given site
    pub fn for_site(site: Site) -> Self {
        match site {
            Site::Amazon => Self {
                site,
                price: compile(vec![
                    text_by_class("a-price-whole"),
                    within_class("a-price", "a-offscreen"),
                    text_by_id("priceblock_dealprice"),
                    text_by_id("priceblock_ourprice"),
                    text_by_class("a-price-range"),
                ]),
                name: compile(vec![
                    text_by_id("productTitle"),
                    text_by_class("product-title"),
                    text_by_class("product-title-word-break"),
                    meta_content("og:title", Capture::Attribute),
                    meta_content_reversed("og:title", Capture::Attribute),
                ]),
                image: compile(vec![
                    img_by_id("landingImage"),
                    img_by_class("a-dynamic-image"),
                    img_by_id("imgBlkFront"),
                    img_within("a-button-thumbnail"),
                    img_with_attr("data-old-hires", ""),
                    meta_content("og:image", Capture::ImageUrl),
                    meta_content_reversed("og:image", Capture::ImageUrl),
                ]),
                min_name_chars: 1,
                images: ImagePolicy::default(),
            },
            Site::Flipkart => Self {
                site,
                price: compile(vec![
                    text_by_class("_30jeq3"),
                    text_by_class("_1_WHN1"),
                    text_by_class("_3I9_wc"),
                    text_by_class("_25b18c"),
                ]),
                name: compile(vec![
                    text_by_class("B_NuCI"),
                    text_by_class("_35KyD6"),
                    text_by_class("x2Jym8"),
                    text_by_class("_6EBuvT"),
                    meta_content("og:title", Capture::Attribute),
                    meta_content_reversed("og:title", Capture::Attribute),
                ]),
                image: compile(vec![
                    img_within("_396cs4"),
                    img_within("_2r_T1I"),
                    img_within("CXW8mj"),
                    meta_content("og:image", Capture::ImageUrl),
                    meta_content_reversed("og:image", Capture::ImageUrl),
                ]),
                min_name_chars: 1,
                images: ImagePolicy::default(),
            },
            Site::Myntra => Self {
                site,
                price: compile(vec![
                    within_class("pdp-price", "strong"),
                    text_by_class("pdp-price"),
                    text_by_class("product-discountedPrice"),
                ]),
                name: compile(vec![
                    text_by_class("pdp-product-name"),
                    text_by_class("pdp-name"),
                    text_by_class("pdp-title"),
                    meta_content("og:title", Capture::Attribute),
                    meta_content_reversed("og:title", Capture::Attribute),
                ]),
                image: compile(vec![
                    img_within("image-grid-image"),
                    img_within("product-sliderContainer"),
                    img_within("product-imageSlider"),
                    img_within("image-grid-imageContainer"),
                    img_within("thumbnails-container"),
                    img_within("product-images"),
                    img_within("pdp-image"),
                    img_with_attr("alt", "product"),
                    img_with_attr("src", "assets.myntassets.com"),
                    img_within("carousel-inner"),
                    img_with_attr("data-src", "assets.myntassets.com"),
                    img_with_attr("data-original", "assets.myntassets.com"),
                    meta_content("og:image", Capture::ImageUrl),
                    meta_content_reversed("og:image", Capture::ImageUrl),
                ]),
                min_name_chars: 1,
                images: ImagePolicy {
                    relative_base: Some("https://assets.myntassets.com"),
                    required_hosts: &["myntassets.com", "myntra.com"],
                    rejected: &["placeholder", "loading", "spinner"],
                },
            },
            Site::Generic => Self {
                site,
                price: Vec::new(),
                name: compile(vec![
                    text_by_tag("h1"),
                    text_by_class("product-title"),
                    text_by_class("product-name"),
                    text_by_class_fragment("title"),
                    text_by_class_fragment("name"),
                    meta_content("og:title", Capture::Attribute),
                    meta_content_reversed("og:title", Capture::Attribute),
                ]),
                image: compile(vec![
                    img_within("product-image"),
                    img_within("main-image"),
                    img_within_class_fragment("product"),
                    img_with_attr("alt", "product"),
                    meta_content("og:image", Capture::ImageUrl),
                    meta_content_reversed("og:image", Capture::ImageUrl),
                ]),
                min_name_chars: 6,
                images: ImagePolicy {
                    relative_base: None,
                    required_hosts: &[],
                    rejected: &["placeholder"],
                },
            },
        }
    }

    /// Site these rules were built for
    pub fn site(&self) -> Site {
        self.site
    }

    /// Read price, name and image from a page body
    pub fn extract(&self, html: &str) -> ProductSnapshot {
        let price = self
            .price
            .iter()
            .find_map(|rule| values(rule, html, &self.images).next())
            .or_else(|| price_from_text(&page_text(html)))
            .unwrap_or_else(|| PRICE_NOT_FOUND.to_string());

        let name = self
            .name
            .iter()
            .find_map(|rule| {
                values(rule, html, &self.images).find(|name| name.chars().count() >= self.min_name_chars)
            })
            .map(|name| name.chars().take(MAX_NAME_CHARS).collect::<String>());

        let image_url = self
            .image
            .iter()
            .find_map(|rule| values(rule, html, &self.images).next());

        ProductSnapshot {
            price,
            name,
            image_url,
        }
    }
}

/// Extractor that downloads a page and applies one site's rules
#[derive(Debug, Clone)]
pub struct HtmlExtractor {
    fetcher: PageFetcher,
    rules: SiteRules,
}

impl HtmlExtractor {
    /// Create a new HtmlExtractor
    pub fn new(fetcher: PageFetcher, site: Site) -> Self {
        Self {
            fetcher,
            rules: SiteRules::for_site(site),
        }
    }
}

#[async_trait]
impl Extractor for HtmlExtractor {
    async fn fetch(&self, url: &str) -> Result<ProductSnapshot, ExtractionError> {
        let html = self.fetcher.get_html(url).await?;
        let snapshot = self.rules.extract(&html);

        if snapshot.has_price() {
            debug!("{} extractor found price {} for {}", self.rules.site(), snapshot.price, url);
        } else {
            debug!("{} extractor found no price for {}", self.rules.site(), url);
        }
        Ok(snapshot)
    }
}

// ---------------------------------------------------------------------------
// Rule construction
// ---------------------------------------------------------------------------

fn compile(rules: Vec<(String, Capture)>) -> Vec<Rule> {
    rules
        .into_iter()
        .filter_map(|(pattern, capture)| match Regex::new(&pattern) {
            Ok(regex) => Some(Rule { regex, capture }),
            Err(e) => {
                warn!("Skipping extraction rule {}: {}", pattern, e);
                None
            }
        })
        .collect()
}

/// `class="..."` containing the exact class token
fn class_attr(class: &str) -> String {
    format!(
        r#"\sclass\s*=\s*["'](?:[^"']*\s)?{}(?:\s[^"']*)?["']"#,
        regex::escape(class)
    )
}

fn text_by_class(class: &str) -> (String, Capture) {
    (
        format!(r"(?is)<[a-z][a-z0-9]*[^>]*{}[^>]*>(.*?)</[a-z][a-z0-9]*\s*>", class_attr(class)),
        Capture::Text,
    )
}

/// Any element whose class attribute contains `fragment` as a substring
fn text_by_class_fragment(fragment: &str) -> (String, Capture) {
    (
        format!(
            r#"(?is)<[a-z][a-z0-9]*[^>]*\sclass\s*=\s*["'][^"']*{}[^"']*["'][^>]*>(.*?)</[a-z][a-z0-9]*\s*>"#,
            regex::escape(fragment)
        ),
        Capture::Text,
    )
}

fn text_by_id(id: &str) -> (String, Capture) {
    (
        format!(
            r#"(?is)<[a-z][a-z0-9]*[^>]*\sid\s*=\s*["']{}["'][^>]*>(.*?)</[a-z][a-z0-9]*\s*>"#,
            regex::escape(id)
        ),
        Capture::Text,
    )
}

fn text_by_tag(tag: &str) -> (String, Capture) {
    let tag = regex::escape(tag);
    (format!(r"(?is)<{}\b[^>]*>(.*?)</{}\s*>", tag, tag), Capture::Text)
}

/// Text of the first `inner` element or class nested inside `outer`
fn within_class(outer: &str, inner: &str) -> (String, Capture) {
    let inner_open = if inner.chars().all(|c| c.is_ascii_alphanumeric()) && inner == inner.to_lowercase() {
        format!(r"<{}\b[^>]*>", regex::escape(inner))
    } else {
        format!(r"<[a-z][a-z0-9]*[^>]*{}[^>]*>", class_attr(inner))
    };
    (
        format!(
            r"(?is)<[a-z][a-z0-9]*[^>]*{}[^>]*>.*?{}(.*?)</[a-z][a-z0-9]*\s*>",
            class_attr(outer),
            inner_open
        ),
        Capture::Text,
    )
}

fn img_by_id(id: &str) -> (String, Capture) {
    (
        format!(r#"(?is)(<img\b[^>]*\sid\s*=\s*["']{}["'][^>]*>)"#, regex::escape(id)),
        Capture::ImgTag,
    )
}

fn img_by_class(class: &str) -> (String, Capture) {
    (
        format!(r"(?is)(<img\b[^>]*{}[^>]*>)", class_attr(class)),
        Capture::ImgTag,
    )
}

/// First `<img>` after an element carrying `class`
fn img_within(class: &str) -> (String, Capture) {
    (
        format!(r"(?is){}[^>]*>.*?(<img\b[^>]*>)", class_attr(class)),
        Capture::ImgTag,
    )
}

fn img_within_class_fragment(fragment: &str) -> (String, Capture) {
    (
        format!(
            r#"(?is)\sclass\s*=\s*["'][^"']*{}[^"']*["'][^>]*>.*?(<img\b[^>]*>)"#,
            regex::escape(fragment)
        ),
        Capture::ImgTag,
    )
}

/// `<img>` whose `attr` contains `needle` (any value when `needle` is empty)
fn img_with_attr(attr: &str, needle: &str) -> (String, Capture) {
    (
        format!(
            r#"(?is)(<img\b[^>]*\s{}\s*=\s*["'][^"']*{}[^"']*["'][^>]*>)"#,
            regex::escape(attr),
            regex::escape(needle)
        ),
        Capture::ImgTag,
    )
}

fn meta_content(property: &str, capture: Capture) -> (String, Capture) {
    (
        format!(
            r#"(?is)<meta\b[^>]*\sproperty\s*=\s*["']{}["'][^>]*\scontent\s*=\s*["']([^"']*)["']"#,
            regex::escape(property)
        ),
        capture,
    )
}

fn meta_content_reversed(property: &str, capture: Capture) -> (String, Capture) {
    (
        format!(
            r#"(?is)<meta\b[^>]*\scontent\s*=\s*["']([^"']*)["'][^>]*\sproperty\s*=\s*["']{}["']"#,
            regex::escape(property)
        ),
        capture,
    )
}

// ---------------------------------------------------------------------------
// Value extraction
// ---------------------------------------------------------------------------

/// Every value a rule yields, in document order
fn values<'a>(rule: &'a Rule, html: &'a str, images: &'a ImagePolicy) -> impl Iterator<Item = String> + 'a {
    rule.regex.captures_iter(html).filter_map(move |caps| {
        let captured = caps.get(1)?.as_str();
        match rule.capture {
            Capture::Text => Some(element_text(captured)).filter(|text| !text.is_empty()),
            Capture::ImgTag => image_source(captured, images),
            Capture::Attribute => Some(decode_entities(captured.trim())).filter(|text| !text.is_empty()),
            Capture::ImageUrl => images.accept(captured),
        }
    })
}

fn image_attribute_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)\s(src|data-old-hires|data-src|data-original|data-lazy-src)\s*=\s*["']([^"']*)["']"#).ok()
    })
    .as_ref()
}

fn image_source(tag: &str, images: &ImagePolicy) -> Option<String> {
    let regex = image_attribute_regex()?;
    let attributes: Vec<(String, String)> = regex
        .captures_iter(tag)
        .filter_map(|caps| Some((caps.get(1)?.as_str().to_lowercase(), caps.get(2)?.as_str().to_string())))
        .collect();

    IMAGE_ATTRIBUTES.iter().find_map(|name| {
        attributes
            .iter()
            .filter(|(attr, value)| attr.as_str() == *name && !value.trim().is_empty())
            .find_map(|(_, value)| images.accept(value))
    })
}

fn tag_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").ok()).as_ref()
}

fn script_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<(script|style|noscript)\b[^>]*>.*?</(script|style|noscript)\s*>").ok())
        .as_ref()
}

fn page_price_regexes() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        PAGE_PRICE_PATTERNS
            .iter()
            .filter_map(|pattern| Regex::new(pattern).ok())
            .collect()
    })
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&#8377;", "₹")
        .replace("&#x20b9;", "₹")
        .replace("&#x20B9;", "₹")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn strip_tags(fragment: &str, separator: &str) -> String {
    let without_tags = match tag_regex() {
        Some(regex) => regex.replace_all(fragment, separator).into_owned(),
        None => fragment.to_string(),
    };
    decode_entities(&without_tags)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of one element: nested tags are dropped without a gap, so
/// `1,299<span>.</span>` reads as `1,299.`
fn element_text(fragment: &str) -> String {
    strip_tags(fragment, "")
}

/// Visible text of a whole page
fn page_text(html: &str) -> String {
    let visible = match script_regex() {
        Some(regex) => regex.replace_all(html, " ").into_owned(),
        None => html.to_string(),
    };
    strip_tags(&visible, " ")
}

fn price_from_text(text: &str) -> Option<String> {
    page_price_regexes()
        .iter()
        .find_map(|regex| regex.find(text))
        .map(|m| m.as_str().trim().to_string())
}
