/// Canonicalizes a URL string for deduplication
///
/// # Normalization Steps
///
/// 1. Lowercase and trim the whole input
/// 2. Drop the fragment (everything from the first `#`)
/// 3. Keep `scheme://host` and the path
/// 4. Split the query on `&`, sort the tokens and reattach them; an empty
///    query is dropped
/// 5. If the result ends with `/` and holds more than three `/`, strip the
///    trailing slashes, so `https://example.com/` keeps its root slash but
///    `https://example.com/docs/` loses it
///
/// This is a string-level canonicalization, not an RFC 3986 one: it never
/// fails, and differently-ordered queries deliberately collide.
///
/// # Examples
///
/// ```
/// use site_harvest::url::normalize;
///
/// assert_eq!(normalize("HTTPS://Example.com/Docs/?b=2&a=1#top"), "https://example.com/docs/?a=1&b=2");
/// assert_eq!(normalize("https://example.com/docs/"), "https://example.com/docs");
/// assert_eq!(normalize("https://example.com/"), "https://example.com/");
/// ```
pub fn normalize(url: &str) -> String {
    // Stripping trailing slashes can shorten the last query token and change
    // the sort order, so repeat until the form is stable.
    let mut current = normalize_once(url);
    loop {
        let next = normalize_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn normalize_once(url: &str) -> String {
    let lowered = url.trim().to_lowercase();
    let without_fragment = match lowered.find('#') {
        Some(idx) => &lowered[..idx],
        None => lowered.as_str(),
    };
    let input = without_fragment.trim();

    let (origin, rest) = split_origin(input);
    let (path, query) = match rest.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (rest, None),
    };

    let mut normalized = format!("{}{}", origin, path);

    if let Some(query) = query.filter(|q| !q.is_empty()) {
        let mut tokens: Vec<&str> = query.split('&').collect();
        tokens.sort_unstable();
        normalized.push('?');
        normalized.push_str(&tokens.join("&"));
    }

    if normalized.ends_with('/') && normalized.matches('/').count() > 3 {
        let trimmed_len = normalized
            .trim_end_matches(|c: char| c == '/' || c.is_whitespace())
            .len();
        normalized.truncate(trimmed_len);
    }

    normalized
}

/// Splits `scheme://host` from the remainder of the URL
///
/// Inputs without `://` have no origin and are treated as a bare path.
fn split_origin(input: &str) -> (&str, &str) {
    match input.find("://") {
        Some(scheme_end) => {
            let authority_start = scheme_end + 3;
            let authority_len = input[authority_start..]
                .find(['/', '?'])
                .unwrap_or(input.len() - authority_start);
            input.split_at(authority_start + authority_len)
        }
        None => ("", input),
    }
}
