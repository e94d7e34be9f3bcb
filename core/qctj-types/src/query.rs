//! Query-string helpers for admin URLs.
//!
//! Only the query part is touched; the path and fragment pass through as
//! given. Pairs that are not being edited keep their original encoding.

fn split(url: &str) -> (&str, &str, Option<&str>) {
    let (rest, fragment) = match url.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (url, None),
    };
    let (base, query) = rest.split_once('?').unwrap_or((rest, ""));
    (base, query, fragment)
}

fn decode(raw: &str) -> String {
    let raw = raw.replace('+', " ");
    urlencoding::decode(&raw)
        .map(|v| v.into_owned())
        .unwrap_or(raw)
}

fn raw_pairs(query: &str) -> impl Iterator<Item = &str> {
    query.split('&').filter(|pair| !pair.is_empty())
}

fn pair_key(pair: &str) -> String {
    decode(pair.split_once('=').map_or(pair, |(key, _)| key))
}

fn rebuild(base: &str, pairs: &[String], fragment: Option<&str>) -> String {
    let mut url = base.to_string();
    if !pairs.is_empty() {
        url.push('?');
        url.push_str(&pairs.join("&"));
    }
    if let Some(fragment) = fragment {
        url.push('#');
        url.push_str(fragment);
    }
    url
}

/// Decoded `(key, value)` pairs of the URL's query string, in order.
pub fn query_pairs(url: &str) -> Vec<(String, String)> {
    let (_, query, _) = split(url);
    raw_pairs(query)
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode(key), decode(value))
        })
        .collect()
}

/// The first decoded value for `key`, if present.
pub fn query_arg(url: &str, key: &str) -> Option<String> {
    query_pairs(url)
        .into_iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v)
}

/// Returns `url` with every `key` argument removed.
pub fn remove_query_arg(url: &str, key: &str) -> String {
    let (base, query, fragment) = split(url);
    let kept: Vec<String> = raw_pairs(query)
        .filter(|pair| pair_key(pair) != key)
        .map(str::to_string)
        .collect();
    rebuild(base, &kept, fragment)
}

/// Returns `url` with `key` set to `value`, replacing any existing value.
pub fn add_query_arg(url: &str, key: &str, value: &str) -> String {
    let (base, query, fragment) = split(url);
    let mut pairs: Vec<String> = raw_pairs(query)
        .filter(|pair| pair_key(pair) != key)
        .map(str::to_string)
        .collect();
    pairs.push(format!(
        "{}={}",
        urlencoding::encode(key),
        urlencoding::encode(value)
    ));
    rebuild(base, &pairs, fragment)
}
