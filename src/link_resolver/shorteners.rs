use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Registrable domains of well-known link shortening services
const SHORTENER_DOMAINS: &[&str] = &[
    "bit.ly", "bitly.com", "bitly.is", "j.mp", "goo.gl", "g.co", "t.co", "tinyurl.com",
    "ow.ly", "buff.ly", "is.gd", "v.gd", "tiny.cc", "rb.gy", "cutt.ly", "shorturl.at",
    "rebrand.ly", "t.ly", "bl.ink", "s.id", "lnkd.in", "db.tt", "qr.ae", "adf.ly",
    "cli.gs", "u.to", "tr.im", "x.co", "youtu.be", "amzn.to", "amzn.eu", "fb.me",
    "wp.me", "tiny.one", "shorte.st", "sh.st", "ouo.io", "bc.vc", "soo.gd", "clck.ru",
    "qps.ru", "po.st", "mcaf.ee", "su.pr", "snip.ly", "lnk.to", "linktr.ee", "t2m.io",
    "short.io", "shorturl.com", "tinyurl.is", "urlz.fr", "1url.com", "tny.sh", "zpr.io",
    "yourls.org", "v.ht", "chilp.it", "cur.lv", "buzurl.com", "vzturl.com", "qrco.de",
];

static BUILTIN: Lazy<ShortenerDomainSet> = Lazy::new(|| ShortenerDomainSet::new(SHORTENER_DOMAINS.iter().copied()));

/// Read-only set of shortener registrable domains (`domain.suffix`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortenerDomainSet {
    domains: HashSet<String>,
}

impl ShortenerDomainSet {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            domains: domains
                .into_iter()
                .map(|d| d.as_ref().trim().to_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
        }
    }

    /// The built-in list of shortener services
    pub fn builtin() -> &'static ShortenerDomainSet {
        &BUILTIN
    }

    pub fn contains(&self, registrable_domain: &str) -> bool {
        self.domains.contains(&registrable_domain.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

impl Default for ShortenerDomainSet {
    fn default() -> Self {
        Self::builtin().clone()
    }
}
