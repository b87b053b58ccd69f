//! Public-suffix aware host splitting
//!
//! Splits a host into subdomain, registrable name and public suffix the way
//! `sub.example.co.uk` reads to a human: `sub` / `example` / `co.uk`. Hosts
//! whose suffix is not on the list keep an empty suffix and use their last
//! label as the registrable name.
//!
//! Only ICANN rules count as suffixes. Rules from the PRIVATE section of a
//! full list (`github.io`, `blogspot.com`) are ignored, so `evil.github.io`
//! splits as `evil` / `github` / `io`.

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use publicsuffix::{IcannList, Psl, Type};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

const EMBEDDED_LIST: &str = include_str!("../data/public_suffix_list.dat");
const SCHEME_CHARS: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789+-.";
const LABEL_DOTS: [char; 3] = ['\u{3002}', '\u{FF0E}', '\u{FF61}'];

static SHARED: Lazy<Arc<SuffixList>> = Lazy::new(|| {
    Arc::new(SuffixList::parse(EMBEDDED_LIST).expect("embedded public suffix list is valid"))
});

/// Host decomposition produced by [`SuffixList::split_host`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostParts {
    pub subdomain: String, // Labels left of the registrable name
    pub domain: String,    // Registrable name without its suffix (the SLD)
    pub suffix: String,    // Public suffix, empty when unknown
}

impl HostParts {
    /// `domain.suffix`, or None when either side is missing
    pub fn registrable_domain(&self) -> Option<String> {
        if self.domain.is_empty() || self.suffix.is_empty() {
            return None;
        }
        Some(format!("{}.{}", self.domain, self.suffix))
    }

    fn ip(host: &str) -> Self {
        Self {
            subdomain: String::new(),
            domain: host.to_string(),
            suffix: String::new(),
        }
    }
}

/// Parsed public suffix list, restricted to its ICANN section
pub struct SuffixList {
    list: IcannList,
}

impl std::fmt::Debug for SuffixList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuffixList").finish_non_exhaustive()
    }
}

impl SuffixList {
    /// Parses a list in the publicsuffix.org `.dat` format
    ///
    /// Rules are only read inside the `BEGIN ICANN DOMAINS` and
    /// `BEGIN PRIVATE DOMAINS` markers; lookups then skip the private ones.
    pub fn parse(data: &str) -> Result<Self> {
        let list = data
            .parse::<IcannList>()
            .map_err(|e| anyhow!("Failed to parse public suffix list: {:?}", e))?;
        Ok(Self { list })
    }

    /// Loads a full list from disk
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read public suffix list {}", path.display()))?;
        info!("Loaded public suffix list from {}", path.display());
        Self::parse(&data)
    }

    /// Process-wide list built from the embedded ICANN section
    pub fn shared() -> Arc<SuffixList> {
        SHARED.clone()
    }

    /// Uses the list at `path` when given, the embedded list otherwise
    pub fn load(path: Option<&Path>) -> Result<Arc<SuffixList>> {
        match path {
            Some(path) => Ok(Arc::new(Self::from_file(path)?)),
            None => Ok(Self::shared()),
        }
    }

    /// Splits a bare host (no scheme, port or userinfo)
    pub fn split_host(&self, host: &str) -> HostParts {
        let host = host.replace(&LABEL_DOTS[..], ".");
        if host.is_empty() {
            return HostParts::default();
        }

        if looks_like_ipv6(&host) || host.parse::<Ipv4Addr>().is_ok() {
            debug!("Host {} is an IP literal", host);
            return HostParts::ip(&host);
        }

        let labels: Vec<&str> = host.split('.').collect();
        let suffix_labels = self.known_suffix_labels(&host).min(labels.len());
        let suffix_start = labels.len() - suffix_labels;

        let suffix = labels[suffix_start..].join(".");
        let (subdomain, domain) = if suffix_start == 0 {
            (String::new(), String::new())
        } else {
            (
                labels[..suffix_start - 1].join("."),
                labels[suffix_start - 1].to_string(),
            )
        };

        HostParts { subdomain, domain, suffix }
    }

    /// Splits the host of a full or scheme-less URL
    pub fn extract(&self, url: &str) -> HostParts {
        self.split_host(&lenient_host(url))
    }

    fn known_suffix_labels(&self, host: &str) -> usize {
        let lower = host.to_lowercase();
        match self.list.suffix(lower.as_bytes()) {
            Some(suffix) if suffix.typ() == Some(Type::Icann) => {
                suffix.as_bytes().split(|b| *b == b'.').count()
            }
            _ => 0,
        }
    }
}

fn looks_like_ipv6(host: &str) -> bool {
    host.len() >= 2
        && host.starts_with('[')
        && host.ends_with(']')
        && host[1..host.len() - 1].parse::<Ipv6Addr>().is_ok()
}

/// Drops `scheme://` if the URL starts with one, or a leading `//`
fn schemeless(url: &str) -> &str {
    match url.find("//") {
        Some(0) => &url[2..],
        Some(start)
            if start >= 2
                && url[..start].ends_with(':')
                && url[..start - 1].chars().all(|c| SCHEME_CHARS.contains(c)) =>
        {
            &url[start + 2..]
        }
        _ => url,
    }
}

/// Best-effort host of a URL: no userinfo, no port, no trailing root label
///
/// Never fails; unusual input simply yields whatever sits where the host
/// would be, which may be empty.
pub fn lenient_host(url: &str) -> String {
    let rest = schemeless(url);
    let authority = rest
        .split(|c| c == '/' || c == '?' || c == '#')
        .next()
        .unwrap_or("");
    let after_userinfo = authority.rsplit('@').next().unwrap_or("");

    if after_userinfo.starts_with('[') {
        if let Some(end) = after_userinfo.find(']') {
            return after_userinfo[..=end].to_string();
        }
    }

    let hostname = after_userinfo.split(':').next().unwrap_or("").trim();
    hostname
        .trim_end_matches(|c: char| c == '.' || LABEL_DOTS.contains(&c))
        .to_string()
}
