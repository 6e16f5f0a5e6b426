use crate::url::CanonicalUrl;
use serde::Deserialize;
use std::collections::HashSet;

/// Which hosts discovered links may point at, relative to the seed URLs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostScope {
    /// Only the exact hosts (and ports) of the seeds
    #[default]
    SameHostOnly,
    /// A seed's domain and any of its subdomains
    SameDomainOnly,
    /// Any http/https host
    Unrestricted,
}

/// Applies a [`HostScope`] against a fixed set of seed URLs
#[derive(Debug, Clone)]
pub struct ScopeFilter {
    scope: HostScope,
    seed_hosts: HashSet<String>,
    seed_domains: Vec<String>,
}

impl ScopeFilter {
    /// Creates a filter for the given seeds
    pub fn new<'a>(scope: HostScope, seeds: impl IntoIterator<Item = &'a CanonicalUrl>) -> Self {
        let mut seed_hosts = HashSet::new();
        let mut seed_domains = Vec::new();

        for seed in seeds {
            seed_hosts.insert(seed.host().to_string());
            let domain = base_domain(seed.domain()).to_string();
            if !seed_domains.contains(&domain) {
                seed_domains.push(domain);
            }
        }

        Self {
            scope,
            seed_hosts,
            seed_domains,
        }
    }

    /// Returns the configured scope
    pub fn scope(&self) -> HostScope {
        self.scope
    }

    /// Returns true if the URL may be enqueued under this scope
    pub fn allows(&self, url: &CanonicalUrl) -> bool {
        match self.scope {
            HostScope::Unrestricted => true,
            HostScope::SameHostOnly => self.seed_hosts.contains(url.host()),
            HostScope::SameDomainOnly => self
                .seed_domains
                .iter()
                .any(|domain| matches_domain(domain, url.domain())),
        }
    }
}

/// The domain a seed host stands for: the host minus a leading `www.`
fn base_domain(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// Checks if `candidate` is `domain` itself or one of its subdomains
fn matches_domain(domain: &str, candidate: &str) -> bool {
    candidate == domain
        || candidate
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(raw: &str) -> CanonicalUrl {
        CanonicalUrl::parse(raw).unwrap()
    }

    #[test]
    fn test_same_host_only() {
        let seeds = [url("http://a.test/")];
        let filter = ScopeFilter::new(HostScope::SameHostOnly, &seeds);

        assert!(filter.allows(&url("http://a.test/b")));
        assert!(filter.allows(&url("https://a.test/secure")));
        assert!(!filter.allows(&url("http://other.test/c")));
        assert!(!filter.allows(&url("http://sub.a.test/")));
    }

    #[test]
    fn test_same_host_respects_port() {
        let seeds = [url("http://127.0.0.1:4000/")];
        let filter = ScopeFilter::new(HostScope::SameHostOnly, &seeds);

        assert!(filter.allows(&url("http://127.0.0.1:4000/page")));
        assert!(!filter.allows(&url("http://127.0.0.1:5000/page")));
    }

    #[test]
    fn test_same_domain_only() {
        let seeds = [url("https://www.example.com/")];
        let filter = ScopeFilter::new(HostScope::SameDomainOnly, &seeds);

        assert!(filter.allows(&url("https://example.com/")));
        assert!(filter.allows(&url("https://www.example.com/a")));
        assert!(filter.allows(&url("https://blog.example.com/post")));
        assert!(filter.allows(&url("https://api.v2.example.com/")));
        assert!(!filter.allows(&url("https://notexample.com/")));
        assert!(!filter.allows(&url("https://example.org/")));
    }

    #[test]
    fn test_unrestricted() {
        let seeds = [url("http://a.test/")];
        let filter = ScopeFilter::new(HostScope::Unrestricted, &seeds);
        assert!(filter.allows(&url("http://anything.test/")));
    }

    #[test]
    fn test_matches_domain() {
        assert!(matches_domain("example.com", "example.com"));
        assert!(matches_domain("example.com", "a.example.com"));
        assert!(!matches_domain("example.com", "badexample.com"));
        assert!(!matches_domain("a.example.com", "example.com"));
    }
}
