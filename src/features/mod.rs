//! URL feature extraction
//!
//! Turns a canonical URL into a [`FeatureVector`]: 25 lexical, structural,
//! entropy and token features in a fixed order. The same extractor runs for
//! inference and for training data, so the column set, the order and the
//! numeric semantics are one versioned contract. Changing any of them means
//! bumping [`FEATURE_SCHEMA_VERSION`] and retraining.
//!
//! Extraction never fails. Input that cannot be split into components
//! degrades to empty components and the features computed from them.

mod components;
mod lexical;
mod schema;

pub use components::{ParsedComponents, UrlComponents};
pub use schema::{ColumnSpec, FeatureSchema, LABEL_COLUMN};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;

use crate::suffix::SuffixList;
use lexical::*;

/// Bumped whenever a feature is added, removed, reordered or redefined
pub const FEATURE_SCHEMA_VERSION: &str = "1.0.0";

pub const FEATURE_COUNT: usize = 25;

/// Column order of every feature table and model input
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "has_https",
    "url_len",
    "domain_len",
    "path_len",
    "query_len",
    "url_depth",
    "subdomain_count",
    "tld_len",
    "sld_len",
    "sld_has_digit",
    "sld_has_hyphen",
    "dot_count_domain",
    "hyphen_count_domain_path",
    "underscore_count_path_query",
    "slash_count",
    "digit_count",
    "alphabet_count",
    "spl_char_count",
    "url_entropy",
    "domain_entropy",
    "sld_entropy",
    "path_entropy",
    "domain_token_count",
    "path_token_count",
    "avg_token_length",
];

/// One feature value, integer-valued or real-valued
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureValue {
    Count(i64),
    Ratio(f64),
}

impl FeatureValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Count(v) => *v as f64,
            Self::Ratio(v) => *v,
        }
    }
}

impl std::fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Count(v) => write!(f, "{}", v),
            Self::Ratio(v) => write!(f, "{}", v),
        }
    }
}

/// Fixed-schema feature record; field order is [`FEATURE_NAMES`] order
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub has_https: i64,
    pub url_len: i64,
    pub domain_len: i64,
    pub path_len: i64,
    pub query_len: i64,
    pub url_depth: i64,
    pub subdomain_count: i64,
    pub tld_len: i64,
    pub sld_len: i64,
    pub sld_has_digit: i64,
    pub sld_has_hyphen: i64,
    pub dot_count_domain: i64,
    pub hyphen_count_domain_path: i64,
    pub underscore_count_path_query: i64,
    pub slash_count: i64,
    pub digit_count: i64,
    pub alphabet_count: i64,
    pub spl_char_count: i64,
    pub url_entropy: f64,
    pub domain_entropy: f64,
    pub sld_entropy: f64,
    pub path_entropy: f64,
    pub domain_token_count: i64,
    pub path_token_count: i64,
    pub avg_token_length: f64,
}

impl FeatureVector {
    /// Name/value pairs in column order
    pub fn named_values(&self) -> [(&'static str, FeatureValue); FEATURE_COUNT] {
        use FeatureValue::{Count, Ratio};
        [
            ("has_https", Count(self.has_https)),
            ("url_len", Count(self.url_len)),
            ("domain_len", Count(self.domain_len)),
            ("path_len", Count(self.path_len)),
            ("query_len", Count(self.query_len)),
            ("url_depth", Count(self.url_depth)),
            ("subdomain_count", Count(self.subdomain_count)),
            ("tld_len", Count(self.tld_len)),
            ("sld_len", Count(self.sld_len)),
            ("sld_has_digit", Count(self.sld_has_digit)),
            ("sld_has_hyphen", Count(self.sld_has_hyphen)),
            ("dot_count_domain", Count(self.dot_count_domain)),
            ("hyphen_count_domain_path", Count(self.hyphen_count_domain_path)),
            ("underscore_count_path_query", Count(self.underscore_count_path_query)),
            ("slash_count", Count(self.slash_count)),
            ("digit_count", Count(self.digit_count)),
            ("alphabet_count", Count(self.alphabet_count)),
            ("spl_char_count", Count(self.spl_char_count)),
            ("url_entropy", Ratio(self.url_entropy)),
            ("domain_entropy", Ratio(self.domain_entropy)),
            ("sld_entropy", Ratio(self.sld_entropy)),
            ("path_entropy", Ratio(self.path_entropy)),
            ("domain_token_count", Count(self.domain_token_count)),
            ("path_token_count", Count(self.path_token_count)),
            ("avg_token_length", Ratio(self.avg_token_length)),
        ]
    }

    /// Model input in column order
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        self.named_values().map(|(_, value)| value.as_f64())
    }

    /// Values formatted for a CSV row, in column order
    pub fn to_record(&self) -> Vec<String> {
        self.named_values()
            .iter()
            .map(|(_, value)| value.to_string())
            .collect()
    }
}

/// Computes feature vectors against a public suffix list
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    suffixes: Arc<SuffixList>,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(SuffixList::shared())
    }
}

impl FeatureExtractor {
    pub fn new(suffixes: Arc<SuffixList>) -> Self {
        Self { suffixes }
    }

    pub fn components(&self, url: &str) -> UrlComponents {
        UrlComponents::parse(url, &self.suffixes)
    }

    #[instrument(level = "trace", skip(self))]
    pub fn extract_features(&self, url: &str) -> FeatureVector {
        let parts = self.components(url);
        let domain = parts.domain();
        let path = parts.path();
        let query = parts.query();
        let subdomain = parts.subdomain();
        let sld = parts.sld();

        let domain_path = format!("{}{}", domain, path);
        let path_query = format!("{}{}", path, query);

        FeatureVector {
            has_https: (parts.protocol() == "https") as i64,

            url_len: char_len(url),
            domain_len: char_len(domain),
            path_len: char_len(path),
            query_len: char_len(query),
            url_depth: url_depth(url),

            subdomain_count: if subdomain.is_empty() {
                0
            } else {
                subdomain.split('.').count() as i64
            },
            tld_len: char_len(parts.tld()),
            sld_len: char_len(sld),
            sld_has_digit: has_digit(sld) as i64,
            sld_has_hyphen: sld.contains('-') as i64,

            dot_count_domain: count_char(domain, '.'),
            hyphen_count_domain_path: count_char(&domain_path, '-'),
            underscore_count_path_query: count_char(&path_query, '_'),
            slash_count: count_char(url, '/'),
            digit_count: digit_count(url),
            alphabet_count: alphabet_count(url),
            spl_char_count: special_char_count(url),

            url_entropy: shannon_entropy(url),
            domain_entropy: shannon_entropy(domain),
            sld_entropy: shannon_entropy(sld),
            path_entropy: shannon_entropy(path),

            domain_token_count: token_count(domain),
            path_token_count: token_count(path),
            avg_token_length: avg_token_length(url),
        }
    }
}
