//! Profile URL canonicalization.
//!
//! Discovered hrefs arrive relative, protocol-relative, absolute, or with
//! a `www.`-prefixed host. Canonical form: secure scheme, bare target
//! host, fragment stripped. Two URLs that differ only by scheme, `www.`
//! prefix, or fragment canonicalize to the same string, which doubles as
//! the dedup key.

/// Canonicalizes `href` against `target_host`, returning `None` for
/// non-navigational links and URLs on foreign hosts.
#[must_use]
pub fn canonicalize(href: &str, target_host: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:") || lower.starts_with("mailto:") || lower.starts_with("tel:")
    {
        return None;
    }
    if href.starts_with('#') {
        return None;
    }

    let rest = if let Some(rest) = strip_scheme(href) {
        rest
    } else if let Some(rest) = href.strip_prefix("//") {
        rest
    } else {
        // Host-relative path.
        let path = href.strip_prefix('/').unwrap_or(href);
        return Some(strip_fragment(&format!("https://{target_host}/{path}")));
    };

    let (host, path) = match rest.find(['/', '?', '#']) {
        Some(idx) => (&rest[..idx], &rest[idx..]),
        None => (rest, ""),
    };
    if !host_matches(host, target_host) {
        return None;
    }
    let path = if path.is_empty() || path.starts_with(['?', '#']) {
        format!("/{path}")
    } else {
        path.to_owned()
    };
    Some(strip_fragment(&format!("https://{target_host}{path}")))
}

/// Whether `url` points at `target_host` (any scheme, optional `www.`).
#[must_use]
pub fn is_on_target_host(url: &str, target_host: &str) -> bool {
    let rest = match strip_scheme(url) {
        Some(rest) => rest,
        None => match url.strip_prefix("//") {
            Some(rest) => rest,
            None => return false,
        },
    };
    let host = rest.find(['/', '?', '#']).map_or(rest, |idx| &rest[..idx]);
    host_matches(host, target_host)
}

fn strip_scheme(url: &str) -> Option<&str> {
    url.strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
}

fn host_matches(host: &str, target_host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    let target = target_host.to_ascii_lowercase();
    host == target
        || host.strip_prefix("www.") == Some(target.as_str())
        || target.strip_prefix("www.") == Some(host.as_str())
}

fn strip_fragment(url: &str) -> String {
    url.split('#').next().unwrap_or(url).to_owned()
}
