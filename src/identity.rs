//! Product identity and canonical URLs.
//!
//! Everything here is a pure function of the input URL: the same URL always
//! produces the same identifier, across calls and process restarts. Nothing
//! in this module fails; malformed input falls back to hashing.

use regex::Regex;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::OnceLock;

/// Marketplaces with dedicated identifier and extraction rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Site {
    Amazon,
    Flipkart,
    Myntra,
    Generic,
}

impl Site {
    pub fn as_str(&self) -> &'static str {
        match self {
            Site::Amazon => "amazon",
            Site::Flipkart => "flipkart",
            Site::Myntra => "myntra",
            Site::Generic => "generic",
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn asin_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(?:/dp/|/gp/product/)([A-Z0-9]{10})").ok())
        .as_ref()
}

fn flipkart_item_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)/p/(itm[A-Z0-9]+)").ok())
        .as_ref()
}

fn myntra_id_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/(\d+)/buy").ok()).as_ref()
}

fn capture(re: Option<&Regex>, haystack: &str) -> Option<String> {
    re?.captures(haystack)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Amazon ASIN embedded in a product URL, upper-cased
fn amazon_asin(url: &str) -> Option<String> {
    capture(asin_regex(), url).map(|asin| asin.to_ascii_uppercase())
}

/// Short, stable hash used when no marketplace pattern matches.
///
/// This is a WEAK identity: two different pages can collide.
fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(&digest[..4])
}

/// Host with an explicit port kept, as it appears in a canonical URL
fn authority(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Detect which marketplace a URL belongs to
pub fn detect_site(url: &str) -> Site {
    let haystack = match Url::parse(url.trim()) {
        Ok(parsed) => parsed.host_str().unwrap_or_default().to_ascii_lowercase(),
        Err(_) => url.to_ascii_lowercase(),
    };

    if haystack.contains("amazon") {
        Site::Amazon
    } else if haystack.contains("flipkart") {
        Site::Flipkart
    } else if haystack.contains("myntra") {
        Site::Myntra
    } else {
        Site::Generic
    }
}

/// Derive the stable product identifier for a URL
pub fn resolve_id(url: &str) -> String {
    let url = url.trim();

    let marketplace_id = match detect_site(url) {
        Site::Amazon => amazon_asin(url).map(|asin| format!("amazon_{}", asin)),
        Site::Flipkart => capture(flipkart_item_regex(), url).map(|id| format!("flipkart_{}", id)),
        Site::Myntra => capture(myntra_id_regex(), url).map(|id| format!("myntra_{}", id)),
        Site::Generic => None,
    };
    if let Some(id) = marketplace_id {
        return id;
    }

    match Url::parse(url).ok().and_then(|parsed| {
        let domain = authority(&parsed)?;
        let domain = domain.strip_prefix("www.").unwrap_or(&domain).to_string();
        Some((domain, parsed.path().trim_matches('/').to_string()))
    }) {
        Some((domain, path)) => format!("{}_{}", domain, short_hash(&path)),
        None => format!("generic_{}", short_hash(url)),
    }
}

/// Strip tracking noise from a URL.
///
/// Amazon links with an ASIN collapse to `https://<host>/dp/<ASIN>`; every
/// other URL loses its query string, fragment and trailing slash. Input that
/// does not parse as an absolute URL is returned unchanged.
pub fn canonicalize(url: &str) -> String {
    let trimmed = url.trim();
    let Ok(parsed) = Url::parse(trimmed) else {
        return url.to_string();
    };
    let Some(authority) = authority(&parsed) else {
        return url.to_string();
    };

    if authority.to_ascii_lowercase().contains("amazon") {
        if let Some(asin) = amazon_asin(trimmed) {
            return format!("https://{}/dp/{}", authority, asin);
        }
    }

    format!("{}://{}{}", parsed.scheme(), authority, parsed.path())
        .trim_end_matches('/')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amazon_asin_from_dp_and_gp_paths() {
        assert_eq!(
            resolve_id("https://www.amazon.in/Some-Title/dp/B08N5WRWNW/ref=sr_1_1?keywords=x"),
            "amazon_B08N5WRWNW"
        );
        assert_eq!(
            resolve_id("https://www.amazon.com/gp/product/b08n5wrwnw?psc=1"),
            "amazon_B08N5WRWNW"
        );
    }

    #[test]
    fn test_flipkart_and_myntra_ids() {
        assert_eq!(
            resolve_id("https://www.flipkart.com/apple-iphone/p/itm6ac6485515ae4?pid=MOB123"),
            "flipkart_itm6ac6485515ae4"
        );
        assert_eq!(
            resolve_id("https://www.myntra.com/tshirts/roadster/12345678/buy"),
            "myntra_12345678"
        );
    }

    #[test]
    fn test_fallback_ignores_query_and_www() {
        let a = resolve_id("https://www.shop.example.com/items/42?utm_source=mail");
        let b = resolve_id("https://shop.example.com/items/42/");
        assert_eq!(a, b);
        assert!(a.starts_with("shop.example.com_"));
        assert_eq!(a.len(), "shop.example.com_".len() + 8);
    }

    #[test]
    fn test_marketplace_without_pattern_falls_back_to_hash() {
        let id = resolve_id("https://www.amazon.in/deals");
        assert!(id.starts_with("amazon.in_"));
    }

    #[test]
    fn test_unparsable_url_gets_generic_id() {
        let id = resolve_id("not a url at all");
        assert!(id.starts_with("generic_"));
        assert_eq!(id, resolve_id("not a url at all"));
    }

    #[test]
    fn test_canonicalize_amazon_to_dp_form() {
        assert_eq!(
            canonicalize("https://www.amazon.in/Some-Title/dp/B08N5WRWNW/ref=sr_1_1?keywords=x"),
            "https://www.amazon.in/dp/B08N5WRWNW"
        );
    }

    #[test]
    fn test_canonicalize_strips_query_fragment_and_slash() {
        assert_eq!(
            canonicalize("https://shop.example.com:8443/items/42/?session=abc#reviews"),
            "https://shop.example.com:8443/items/42"
        );
    }

    #[test]
    fn test_canonicalize_is_idempotent() {
        let urls = [
            "https://www.amazon.in/Some-Title/dp/b08n5wrwnw/ref=sr_1_1?keywords=x",
            "https://www.flipkart.com/apple-iphone/p/itm6ac6485515ae4?pid=MOB123",
            "https://shop.example.com/",
            "https://shop.example.com/a%20b/c/?q=1",
            "garbage input",
        ];
        for url in urls {
            let once = canonicalize(url);
            assert_eq!(canonicalize(&once), once, "not idempotent for {}", url);
        }
    }

    #[test]
    fn test_canonical_url_keeps_the_same_identity() {
        let urls = [
            "https://www.amazon.in/Some-Title/dp/B08N5WRWNW/ref=sr_1_1?keywords=x",
            "https://www.myntra.com/tshirts/roadster/12345678/buy?src=feed",
            "https://shop.example.com/items/42/?utm_source=mail",
        ];
        for url in urls {
            assert_eq!(resolve_id(&canonicalize(url)), resolve_id(url));
        }
    }

    #[test]
    fn test_detect_site_uses_host() {
        assert_eq!(detect_site("https://www.amazon.co.uk/dp/B08N5WRWNW"), Site::Amazon);
        assert_eq!(detect_site("https://dl.flipkart.com/p/itm1"), Site::Flipkart);
        assert_eq!(detect_site("https://www.myntra.com/1/buy"), Site::Myntra);
        assert_eq!(detect_site("https://example.com/?ref=amazon"), Site::Generic);
    }
}
