use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

static SCHEME_PREFIX_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.\-]*:(//)?").unwrap());

static SCHEME_AUTHORITY_PREFIX_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[a-zA-Z][a-zA-Z0-9+.\-]*://").unwrap());

static TOKEN_SEPARATOR_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[./?=\-_&:%]+").unwrap());

static DIGIT_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d").unwrap());

pub(crate) fn char_len(text: &str) -> i64 {
    text.chars().count() as i64
}

pub(crate) fn count_char(text: &str, needle: char) -> i64 {
    text.chars().filter(|c| *c == needle).count() as i64
}

pub(crate) fn has_digit(text: &str) -> bool {
    DIGIT_REGEX.is_match(text)
}

pub(crate) fn digit_count(text: &str) -> i64 {
    DIGIT_REGEX.find_iter(text).count() as i64
}

pub(crate) fn alphabet_count(text: &str) -> i64 {
    text.chars().filter(|c| c.is_ascii_alphabetic()).count() as i64
}

/// Characters outside `[a-zA-Z0-9]`, non-ASCII letters and digits included
pub(crate) fn special_char_count(text: &str) -> i64 {
    text.chars().filter(|c| !c.is_ascii_alphanumeric()).count() as i64
}

/// Number of non-empty path segments after the scheme and authority
pub(crate) fn url_depth(url: &str) -> i64 {
    let rest = SCHEME_PREFIX_REGEX.replace(url, "");
    match rest.split_once('/') {
        Some((_, path)) => path.split('/').filter(|s| !s.is_empty()).count() as i64,
        None => 0,
    }
}

/// Shannon entropy in bits per character; 0 for the empty string
pub(crate) fn shannon_entropy(text: &str) -> f64 {
    let mut order: Vec<char> = Vec::new();
    let mut counts: HashMap<char, usize> = HashMap::new();
    for c in text.chars() {
        let count = counts.entry(c).or_insert(0);
        if *count == 0 {
            order.push(c);
        }
        *count += 1;
    }

    if order.is_empty() {
        return 0.0;
    }

    let length = text.chars().count() as f64;
    let sum: f64 = order
        .iter()
        .map(|c| {
            let p = counts[c] as f64 / length;
            p * p.log2()
        })
        .sum();

    let entropy = -sum;
    if entropy == 0.0 { 0.0 } else { entropy }
}

/// Tokens separated by `.`, `-`, `_` or whitespace
pub(crate) fn token_count(text: &str) -> i64 {
    text.split(|c: char| c == '.' || c == '-' || c == '_' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .count() as i64
}

/// Mean token length of the URL with its `scheme://` removed
pub(crate) fn avg_token_length(url: &str) -> f64 {
    let rest = SCHEME_AUTHORITY_PREFIX_REGEX.replace(url, "");
    let lengths: Vec<usize> = TOKEN_SEPARATOR_REGEX
        .split(&rest)
        .filter(|t| !t.is_empty())
        .map(|t| t.chars().count())
        .collect();

    if lengths.is_empty() {
        return 0.0;
    }
    lengths.iter().sum::<usize>() as f64 / lengths.len() as f64
}
