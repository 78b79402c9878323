//! URL utilities: page eligibility and hostname extraction
//!
//! These functions avoid full URL parsing and work directly on string slices.

use crate::gate::normalize_domain;

/// Schemes whose pages cannot (or should not) receive injected scripts:
/// browser internals, extension pages and the internal search page.
pub const RESTRICTED_SCHEMES: &[&str] = &[
    "chrome",
    "chrome-extension",
    "chrome-search",
    "chrome-untrusted",
    "devtools",
    "edge",
    "brave",
    "opera",
    "vivaldi",
    "about",
    "moz-extension",
    "view-source",
];

// =============================================================================
// Scheme Extraction
// =============================================================================

/// Extract the scheme (without ':'), if the URL starts with a well-formed one.
#[inline]
pub fn extract_scheme(url: &str) -> Option<&str> {
    let colon_pos = url.find(':')?;
    let scheme = &url[..colon_pos];
    let bytes = scheme.as_bytes();

    if bytes.is_empty() || !bytes[0].is_ascii_alphabetic() {
        return None;
    }
    if !bytes
        .iter()
        .all(|&b| b.is_ascii_alphanumeric() || b == b'+' || b == b'-' || b == b'.')
    {
        return None;
    }
    Some(scheme)
}

/// Get the position after "://".
#[inline]
pub fn get_scheme_end(url: &str) -> Option<usize> {
    let scheme = extract_scheme(url)?;
    let rest = &url[scheme.len()..];
    if rest.starts_with("://") {
        Some(scheme.len() + 3)
    } else {
        None
    }
}

// =============================================================================
// Host Extraction
// =============================================================================

/// Get the start and end positions of the hostname in a URL.
/// Userinfo and port are excluded; IPv6 literals keep their brackets.
#[inline]
pub fn get_host_position(url: &str) -> Option<(usize, usize)> {
    let scheme_end = get_scheme_end(url)?;
    let bytes = url.as_bytes();

    // Authority ends at the first '/', '?' or '#'
    let mut authority_end = bytes.len();
    for (i, &b) in bytes[scheme_end..].iter().enumerate() {
        if b == b'/' || b == b'?' || b == b'#' {
            authority_end = scheme_end + i;
            break;
        }
    }

    // Skip userinfo
    let host_start = match url[scheme_end..authority_end].rfind('@') {
        Some(at_pos) => scheme_end + at_pos + 1,
        None => scheme_end,
    };

    let host_end = if bytes.get(host_start) == Some(&b'[') {
        match url[host_start..authority_end].find(']') {
            Some(close) => host_start + close + 1,
            None => return None,
        }
    } else {
        match url[host_start..authority_end].find(':') {
            Some(colon) => host_start + colon,
            None => authority_end,
        }
    };

    Some((host_start, host_end))
}

/// Fast host extraction without allocations.
/// Returns a slice into the original URL.
#[inline]
pub fn extract_host(url: &str) -> Option<&str> {
    let (host_start, host_end) = get_host_position(url)?;
    Some(&url[host_start..host_end])
}

/// The normalized hostname of a page, or `None` when the URL has no host.
pub fn page_domain(url: &str) -> Option<String> {
    let domain = normalize_domain(extract_host(url.trim())?);
    if domain.is_empty() {
        None
    } else {
        Some(domain)
    }
}

// =============================================================================
// Eligibility
// =============================================================================

/// Whether the suppression engine may be started on a page at `url`.
///
/// Restricted schemes are rejected, as are empty or malformed URLs and URLs
/// without a host (`about:blank`, `data:` and `file:///` pages included).
pub fn is_eligible(url: &str) -> bool {
    let url = url.trim();
    let scheme = match extract_scheme(url) {
        Some(scheme) => scheme,
        None => return false,
    };

    if RESTRICTED_SCHEMES
        .iter()
        .any(|restricted| scheme.eq_ignore_ascii_case(restricted))
    {
        return false;
    }

    page_domain(url).is_some()
}
