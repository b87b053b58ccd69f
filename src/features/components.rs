use std::net::Ipv6Addr;
use tracing::trace;

use crate::suffix::SuffixList;

const SCHEME_CHARS: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789+-.";

/// Pieces of a URL the extractor works from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedComponents {
    pub protocol: String,
    pub domain: String, // netloc, may carry userinfo and port
    pub path: String,
    pub query: String,
    pub subdomain: String,
    pub sld: String,
    pub tld: String,
}

/// Result of splitting a URL into components
///
/// `Empty` is the outcome for input whose delimiter structure cannot be split
/// (unbalanced or invalid bracketed hosts); every component then reads as "".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlComponents {
    Parsed(ParsedComponents),
    Empty,
}

impl UrlComponents {
    pub fn parse(url: &str, suffixes: &SuffixList) -> Self {
        match split_url(url) {
            Some(split) => {
                let host = suffixes.extract(url);
                Self::Parsed(ParsedComponents {
                    protocol: split.scheme,
                    domain: split.netloc,
                    path: split.path,
                    query: split.query,
                    subdomain: host.subdomain,
                    sld: host.domain,
                    tld: host.suffix,
                })
            }
            None => {
                trace!("URL could not be split, using empty components: {:?}", url);
                Self::Empty
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn protocol(&self) -> &str {
        self.field(|c| &c.protocol)
    }

    pub fn domain(&self) -> &str {
        self.field(|c| &c.domain)
    }

    pub fn path(&self) -> &str {
        self.field(|c| &c.path)
    }

    pub fn query(&self) -> &str {
        self.field(|c| &c.query)
    }

    pub fn subdomain(&self) -> &str {
        self.field(|c| &c.subdomain)
    }

    pub fn sld(&self) -> &str {
        self.field(|c| &c.sld)
    }

    pub fn tld(&self) -> &str {
        self.field(|c| &c.tld)
    }

    fn field<'a>(&'a self, get: impl Fn(&'a ParsedComponents) -> &'a String) -> &'a str {
        match self {
            Self::Parsed(components) => get(components).as_str(),
            Self::Empty => "",
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct SplitUrl {
    scheme: String,
    netloc: String,
    path: String,
    query: String,
}

/// Generic `scheme://netloc/path?query#fragment` split
///
/// Accepts nearly anything; returns None only when the netloc has unbalanced
/// brackets or a bracketed host that is neither IPv6 nor an IPvFuture literal.
fn split_url(url: &str) -> Option<SplitUrl> {
    let url: String = url
        .trim_start_matches(|c: char| c <= ' ')
        .chars()
        .filter(|c| !matches!(c, '\t' | '\r' | '\n'))
        .collect();

    let mut split = SplitUrl::default();
    let mut rest = url.as_str();

    if let Some(colon) = rest.find(':') {
        let candidate = &rest[..colon];
        let starts_alpha = candidate.chars().next().is_some_and(|c| c.is_ascii_alphabetic());
        if starts_alpha && candidate.chars().all(|c| SCHEME_CHARS.contains(c)) {
            split.scheme = candidate.to_ascii_lowercase();
            rest = &rest[colon + 1..];
        }
    }

    if let Some(after) = rest.strip_prefix("//") {
        let end = after.find(['/', '?', '#']).unwrap_or(after.len());
        let netloc = &after[..end];
        if netloc.contains('[') != netloc.contains(']') {
            return None;
        }
        if netloc.contains('[') && !bracketed_netloc_is_valid(netloc) {
            return None;
        }
        split.netloc = netloc.to_string();
        rest = &after[end..];
    }

    if let Some((before, _fragment)) = rest.split_once('#') {
        rest = before;
    }
    if let Some((before, query)) = rest.split_once('?') {
        split.query = query.to_string();
        rest = before;
    }
    split.path = rest.to_string();

    Some(split)
}

fn bracketed_netloc_is_valid(netloc: &str) -> bool {
    let host_and_port = netloc.rsplit('@').next().unwrap_or("");
    let Some((before, bracketed)) = host_and_port.split_once('[') else {
        return true;
    };
    if !before.is_empty() {
        return false;
    }
    let (host, port) = bracketed.split_once(']').unwrap_or((bracketed, ""));
    if !port.is_empty() && !port.starts_with(':') {
        return false;
    }

    if host.starts_with('v') {
        return is_ip_future(host);
    }
    host.parse::<Ipv6Addr>().is_ok()
}

/// `v<hex>.<address>`; the address part is not inspected beyond being non-empty
fn is_ip_future(host: &str) -> bool {
    let Some((version, address)) = host.strip_prefix('v').and_then(|rest| rest.split_once('.'))
    else {
        return false;
    };
    !version.is_empty()
        && version.chars().all(|c| c.is_ascii_hexdigit())
        && !address.is_empty()
        && !address.contains('\n')
}
