use once_cell::sync::Lazy;
use regex::Regex;

pub static ZERO_WIDTH_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\x{200B}\x{200C}\x{200D}\x{2060}\x{FEFF}]").unwrap()
});

pub static ASCII_CONTROL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\x00-\x1F\x7F]").unwrap()
});

/// Bidirectional embedding/override (U+202A..U+202E) and isolate (U+2066..U+2069) controls
pub static BIDI_CONTROL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\x{202A}-\x{202E}\x{2066}-\x{2069}]").unwrap()
});

pub static TRIPLE_SLASH_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r":///+").unwrap()
});

/// `http//host` or `https///host`: the colon was lost, usually to an invisible character
pub static MISSING_COLON_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(https?)//+").unwrap()
});

/// `https : //`, `https:// host`, `https :/ /host`
pub static SPACED_SCHEME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(https?)\s*:\s*/(?:\s*/)+\s*").unwrap()
});

pub static SCHEME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").unwrap()
});

/// Generic URI grammar: `(scheme:)?(//authority)?path(?query)?(#fragment)?`
pub static URI_STRUCTURE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(([^:/?#]+):)?(//([^/?#]*))?([^?#]*)(\?([^#]*))?(#(.*))?$").unwrap()
});
