//! URL canonicalization: strips known tracking query parameters

use url::Url;

const TRACKING_PARAMS: [&str; 8] = [
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "ref",
];

/// Remove tracking parameters and re-serialize. Unparseable input is
/// returned unchanged; parse-then-serialize may normalize the remainder.
pub fn canonicalize(raw: &str) -> String {
    let mut url = match Url::parse(raw) {
        Ok(url) => url,
        Err(_) => return raw.to_string(),
    };

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !TRACKING_PARAMS.contains(&key.as_ref()))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    if kept.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut()
            .clear()
            .extend_pairs(kept.iter().map(|(key, value)| (key.as_str(), value.as_str())));
    }

    url.to_string()
}
