//! URL normalization and pagination helpers

use url::Url;

/// Normalizes a URL to its comparison form
///
/// Lowercases scheme and host, strips a trailing slash from the path, and
/// drops the fragment. The query is kept: paginated listing URLs frequently
/// differ only by their query string (`?page=2`, `?offset=24`).
pub fn normalize_url(url: &Url) -> String {
    let mut normalized = url.clone();
    normalized.set_fragment(None);

    // Url already lowercases scheme and host on parse; the path is what we
    // have to touch ourselves.
    let path = normalized.path().trim_end_matches('/').to_string();
    normalized.set_path(&path);

    normalized.to_string()
}

/// Resolves an href against a base URL, keeping only http(s) results
pub fn resolve_href(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    match base.join(href) {
        Ok(resolved) if resolved.scheme() == "http" || resolved.scheme() == "https" => {
            Some(resolved)
        }
        _ => None,
    }
}

/// Builds the next listing URL by incrementing a numeric query parameter
///
/// A missing or non-numeric parameter counts as page 1, so the first call on
/// a bare listing URL yields `?page=2`. Other query parameters are preserved.
pub fn next_page_by_query(current: &Url, param: &str) -> Url {
    let current_page: u32 = current
        .query_pairs()
        .find(|(name, _)| name == param)
        .and_then(|(_, value)| value.parse().ok())
        .unwrap_or(1);

    let others: Vec<(String, String)> = current
        .query_pairs()
        .filter(|(name, _)| name != param)
        .map(|(name, value)| (name.into_owned(), value.into_owned()))
        .collect();

    let mut next = current.clone();
    {
        let mut pairs = next.query_pairs_mut();
        pairs.clear();
        for (name, value) in &others {
            pairs.append_pair(name, value);
        }
        pairs.append_pair(param, &(current_page + 1).to_string());
    }
    next
}
