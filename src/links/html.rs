// src/links/html.rs
// =============================================================================
// This module splits the anchors of an HTML page into internal and external
// links.
//
// We use the `scraper` crate to find every <a href> and the `url` crate to
// resolve relative hrefs against the page they came from. Each href is then
// classified into a LinkKind:
//
// - Internal: same domain as the page (the walker follows these)
// - External: another domain (these become rank votes)
// - Social:   another domain that is a well-known social network
//             (still a rank vote, counted separately in the stats)
// - Email:    mailto: links
// - File:     static assets and downloads (stylesheets, scripts, images,
//             archives, media, documents)
//
// javascript:, tel:, data: and fragment-only hrefs are dropped entirely.
// =============================================================================

use scraper::{Html, Selector};
use std::collections::BTreeSet;
use url::Url;

use super::domain::domain_of;

// Path suffixes that never point at an HTML page
const ASSET_EXTENSIONS: &[&str] = &[
    ".css", ".js", ".png", ".jpg", ".jpeg", ".gif", ".svg", ".ico", ".webp", ".pdf", ".doc",
    ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".zip", ".rar", ".gz", ".tar", ".exe", ".dmg",
    ".mp4", ".mp3", ".avi", ".mov", ".wav",
];

const SOCIAL_DOMAINS: &[&str] = &[
    "facebook.com",
    "twitter.com",
    "x.com",
    "instagram.com",
    "linkedin.com",
    "youtube.com",
    "tiktok.com",
    "pinterest.com",
    "snapchat.com",
    "whatsapp.com",
    "telegram.org",
];

/// What an anchor points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Internal,
    External,
    Social,
    Email,
    File,
}

/// Per-page counts of classified anchors (occurrences, not unique URLs).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub internal: usize,
    pub external: usize,
    pub social: usize,
    pub email: usize,
    pub file: usize,
}

impl LinkStats {
    fn record(&mut self, kind: LinkKind) {
        match kind {
            LinkKind::Internal => self.internal += 1,
            LinkKind::External => self.external += 1,
            LinkKind::Social => self.social += 1,
            LinkKind::Email => self.email += 1,
            LinkKind::File => self.file += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.internal + self.external + self.social + self.email + self.file
    }
}

/// The links of one page, split by where they point.
///
/// `internal` and `external` are disjoint sets of absolute http(s) URLs
/// with fragments removed. Social links are part of `external`.
#[derive(Debug, Clone, Default)]
pub struct PageLinks {
    pub internal: BTreeSet<String>,
    pub external: BTreeSet<String>,
    pub stats: LinkStats,
}

/// Classifies every anchor of `html`, fetched from `page_url`.
///
/// An unparseable `page_url` yields empty results.
pub fn classify_links(html: &str, page_url: &str) -> PageLinks {
    let mut links = PageLinks::default();

    let base = match Url::parse(page_url) {
        Ok(url) => url,
        Err(_) => {
            tracing::debug!(page_url, "cannot classify links: invalid page URL");
            return links;
        }
    };
    let source_domain = domain_of(&base);
    if source_domain.is_empty() {
        return links;
    }

    let document = Html::parse_document(html);
    // Constant selector, always valid
    let selector = Selector::parse("a[href]").unwrap();

    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some((kind, url)) = classify_href(&base, &source_domain, href) else {
            continue;
        };

        links.stats.record(kind);
        match kind {
            LinkKind::Internal => {
                links.internal.insert(url);
            }
            LinkKind::External | LinkKind::Social => {
                links.external.insert(url);
            }
            LinkKind::Email | LinkKind::File => {}
        }
    }

    links
}

/// Resolves one href against `base` and decides what it points at.
///
/// Returns the kind plus the absolute URL (for Email, the raw href).
/// None means the href is not a link we care about at all.
pub fn classify_href(base: &Url, source_domain: &str, href: &str) -> Option<(LinkKind, String)> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("mailto:") {
        return Some((LinkKind::Email, href.to_string()));
    }
    if lower.starts_with("javascript:") || lower.starts_with("tel:") || lower.starts_with("data:")
    {
        return None;
    }

    let mut url = base.join(href).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.set_fragment(None);

    let domain = domain_of(&url);
    if domain.is_empty() {
        return None;
    }

    let kind = if is_asset_path(url.path()) {
        LinkKind::File
    } else if domain == source_domain {
        LinkKind::Internal
    } else if is_social_domain(&domain) {
        LinkKind::Social
    } else {
        LinkKind::External
    };

    Some((kind, url.to_string()))
}

fn is_asset_path(path: &str) -> bool {
    let path = path.to_ascii_lowercase();
    ASSET_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

fn is_social_domain(domain: &str) -> bool {
    SOCIAL_DOMAINS
        .iter()
        .any(|social| domain == *social || domain.ends_with(&format!(".{}", social)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_splits_internal_and_external() {
        let html = r#"
            <a href="/about">About</a>
            <a href="https://www.example.com/contact">Contact</a>
            <a href="https://other.org/page">Other</a>
        "#;
        let links = classify_links(html, "https://example.com/");
        assert_eq!(
            links.internal.iter().cloned().collect::<Vec<_>>(),
            vec!["https://example.com/about", "https://www.example.com/contact"]
        );
        assert_eq!(
            links.external.iter().cloned().collect::<Vec<_>>(),
            vec!["https://other.org/page"]
        );
    }

    #[test]
    fn test_resolves_relative_links() {
        let html = r#"<a href="../other">Other</a>"#;
        let links = classify_links(html, "https://example.com/docs/page/");
        assert!(links.internal.contains("https://example.com/docs/other"));
    }

    #[test]
    fn test_skips_non_content_schemes() {
        let html = r##"
            <a href="mailto:test@example.com">Email</a>
            <a href="javascript:void(0)">JS</a>
            <a href="tel:+15555555555">Call</a>
            <a href="data:text/plain,hi">Data</a>
            <a href="#section">Jump</a>
            <a href="">Empty</a>
        "##;
        let links = classify_links(html, "https://example.com/");
        assert!(links.internal.is_empty());
        assert!(links.external.is_empty());
        assert_eq!(links.stats.email, 1);
        assert_eq!(links.stats.total(), 1);
    }

    #[test]
    fn test_skips_static_assets_in_both_sets() {
        let html = r#"
            <a href="/style.css">css</a>
            <a href="/logo.PNG">logo</a>
            <a href="https://cdn.other.org/app.js?v=2">js</a>
            <a href="https://files.other.org/archive.zip">zip</a>
        "#;
        let links = classify_links(html, "https://example.com/");
        assert!(links.internal.is_empty());
        assert!(links.external.is_empty());
        assert_eq!(links.stats.file, 4);
    }

    #[test]
    fn test_social_links_are_external() {
        let html = r#"<a href="https://www.facebook.com/example">fb</a>"#;
        let links = classify_links(html, "https://example.com/");
        assert_eq!(links.stats.social, 1);
        assert!(links.external.contains("https://www.facebook.com/example"));
    }

    #[test]
    fn test_fragments_are_removed() {
        let html = r##"<a href="/page#top">a</a><a href="/page">b</a>"##;
        let links = classify_links(html, "https://example.com/");
        assert_eq!(links.internal.len(), 1);
        assert_eq!(links.stats.internal, 2);
    }

    #[test]
    fn test_invalid_page_url_yields_nothing() {
        let html = r#"<a href="https://other.org/">x</a>"#;
        let links = classify_links(html, "not a url");
        assert!(links.external.is_empty());
    }

    #[test]
    fn test_classify_href_kinds() {
        let base = Url::parse("https://example.com/").unwrap();
        let kind = |href: &str| classify_href(&base, "example.com", href).map(|(k, _)| k);
        assert_eq!(kind("/x"), Some(LinkKind::Internal));
        assert_eq!(kind("https://other.org"), Some(LinkKind::External));
        assert_eq!(kind("https://linkedin.com/in/x"), Some(LinkKind::Social));
        assert_eq!(kind("MAILTO:a@b.c"), Some(LinkKind::Email));
        assert_eq!(kind("/report.pdf"), Some(LinkKind::File));
        assert_eq!(kind("ftp://other.org/"), None);
    }
}
