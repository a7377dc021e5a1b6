// src/links/mod.rs
// =============================================================================
// Domain extraction and link classification.
//
// Submodules:
// - domain: URL -> normalized domain key
// - html:   HTML page -> internal / external link sets
// =============================================================================

mod domain;
mod html;

pub use domain::{domain_of, normalize_domain, root_url};
pub use html::{classify_href, classify_links, LinkKind, LinkStats, PageLinks};
