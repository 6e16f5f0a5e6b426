use crate::url::normalize::{normalize, NormalizeOptions};
use crate::UrlResult;
use std::fmt;
use std::hash::{Hash, Hasher};
use url::Url;

/// A normalized URL, used as the deduplication key of the crawl
///
/// Instances can only be produced by the normalizer, so holding one means the
/// scheme is http/https, the host is lower-cased, default ports and fragments
/// are gone and the query follows the configured policy. Equality and hashing
/// use the canonical string only.
#[derive(Debug, Clone)]
pub struct CanonicalUrl {
    url: Url,
    host: String,
}

impl CanonicalUrl {
    pub(crate) fn from_normalized(url: Url, host: String) -> Self {
        Self { url, host }
    }

    /// Normalizes an absolute URL with the default options
    ///
    /// # Examples
    ///
    /// ```
    /// use ripple_crawl::url::CanonicalUrl;
    ///
    /// let url = CanonicalUrl::parse("HTTP://Example.COM:80/a/#top").unwrap();
    /// assert_eq!(url.as_str(), "http://example.com/a");
    /// assert_eq!(url.host(), "example.com");
    /// ```
    pub fn parse(raw: &str) -> UrlResult<Self> {
        normalize(raw, None, &NormalizeOptions::default())
    }

    /// The canonical string form
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// The underlying parsed URL
    pub fn as_url(&self) -> &Url {
        &self.url
    }

    /// The scheme, always `http` or `https`
    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    /// The scheduling key for politeness: lower-cased host, plus the port
    /// when it is not the scheme default
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The bare host name without any port
    pub fn domain(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// Path plus query string, e.g. `/search?q=rust`
    pub fn path_and_query(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{}", self.url.path(), query),
            None => self.url.path().to_string(),
        }
    }

    /// The origin (`scheme://host[:port]`) of this URL
    pub fn origin(&self) -> String {
        format!("{}://{}", self.scheme(), self.host)
    }
}

impl PartialEq for CanonicalUrl {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for CanonicalUrl {}

impl Hash for CanonicalUrl {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for CanonicalUrl {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
