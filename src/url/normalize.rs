use crate::url::CanonicalUrl;
use crate::UrlError;
use serde::Deserialize;
use url::form_urlencoded;
use url::Url;

/// List of tracking query parameters to remove during normalization
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
];

/// How query parameters are treated during normalization
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueryPolicy {
    /// Sort parameters by key then value, so `?b=2&a=1` and `?a=1&b=2` dedupe
    #[default]
    Sort,
    /// Keep parameters in the order the page wrote them
    Preserve,
}

/// Options controlling URL normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    pub query_policy: QueryPolicy,
    pub strip_tracking_params: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            query_policy: QueryPolicy::Sort,
            strip_tracking_params: true,
        }
    }
}

/// Normalizes a raw URL, resolving it against `base` when it is relative
///
/// # Normalization Steps
///
/// 1. Resolve against the base URL (or parse as absolute); reject if malformed
/// 2. Reject any scheme other than http/https
/// 3. Lowercase scheme and host, drop the default port
/// 4. Remove the fragment
/// 5. Normalize the path: remove dot segments and repeated slashes, drop a
///    trailing slash (the root `/` is kept)
/// 6. Drop tracking parameters when enabled
/// 7. Sort or preserve the remaining query parameters
/// 8. Remove an empty query string
///
/// The function is pure and idempotent: normalizing a canonical URL returns
/// the same canonical URL.
///
/// # Arguments
///
/// * `raw` - The URL as found in a seed list or an `href`
/// * `base` - The page URL relative links are resolved against
/// * `options` - Query and tracking-parameter policy
///
/// # Returns
///
/// The canonical URL, or a `UrlError` if the input cannot be parsed, has no
/// host, or is not http/https.
///
/// # Examples
///
/// ```
/// use ripple_crawl::url::{normalize, NormalizeOptions};
/// use url::Url;
///
/// let base = Url::parse("http://a.test/dir/page").unwrap();
/// let url = normalize("../b/?z=1&a=2#frag", Some(&base), &NormalizeOptions::default()).unwrap();
/// assert_eq!(url.as_str(), "http://a.test/b?a=2&z=1");
/// ```
pub fn normalize(
    raw: &str,
    base: Option<&Url>,
    options: &NormalizeOptions,
) -> Result<CanonicalUrl, UrlError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(UrlError::Parse("empty URL".to_string()));
    }

    let parsed = match base {
        Some(base) => base.join(raw),
        None => Url::parse(raw),
    };
    let mut url = parsed.map_err(|e| UrlError::Parse(format!("{}: {}", raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    let host = match url.host_str() {
        Some(host) if !host.is_empty() => host.to_lowercase(),
        _ => return Err(UrlError::MissingHost),
    };

    url.set_fragment(None);

    let path = normalize_path(url.path());
    url.set_path(&path);

    let query = rebuild_query(&url, options);
    url.set_query(query.as_deref());

    // The url crate already omits default ports, so a port here is explicit
    let host_key = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    };

    Ok(CanonicalUrl::from_normalized(url, host_key))
}

/// Normalizes an absolute URL with the default options
pub fn normalize_url(raw: &str) -> Result<CanonicalUrl, UrlError> {
    normalize(raw, None, &NormalizeOptions::default())
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Rebuilds the query string according to the options
///
/// Returns `None` when no query should remain on the URL.
fn rebuild_query(url: &Url, options: &NormalizeOptions) -> Option<String> {
    let raw = url.query()?;
    if raw.is_empty() {
        return None;
    }

    if options.query_policy == QueryPolicy::Preserve && !options.strip_tracking_params {
        return Some(raw.to_string());
    }

    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !(options.strip_tracking_params && is_tracking_param(key)))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if params.is_empty() {
        return None;
    }

    if options.query_policy == QueryPolicy::Sort {
        params.sort();
    }

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in &params {
        serializer.append_pair(key, value);
    }
    Some(serializer.finish())
}

/// Checks if a query parameter is a tracking parameter
fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
