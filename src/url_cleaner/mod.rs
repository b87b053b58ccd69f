//! URL canonicalization
//!
//! Turns an untrusted, possibly obfuscated URL string into the canonical form
//! shared by the training and inference paths. Nothing in this module fails:
//! every function returns a string or a boolean.

mod patterns;


use tracing::trace;

use patterns::*;

const DEFAULT_SCHEME_PREFIX: &str = "http://";
const SOFT_HYPHEN: char = '\u{00AD}';
const BYTE_ORDER_MARK: char = '\u{FEFF}';

/// Returns true if the URL carries a scheme component (`scheme:`)
///
/// Leading C0 controls and spaces are ignored, and tab/CR/LF characters are
/// removed before looking for the scheme, so ` http://host` has a scheme.
pub fn has_scheme(url: &str) -> bool {
    let stripped: String = url
        .trim_start_matches(|c: char| c <= ' ')
        .chars()
        .filter(|c| !matches!(c, '\t' | '\r' | '\n'))
        .collect();
    SCHEME_REGEX.is_match(&stripped)
}

/// Prepends `http://` when the URL has no scheme
pub fn ensure_scheme(url: &str) -> String {
    if has_scheme(url) {
        url.to_string()
    } else {
        trace!("No scheme found, prepending {}", DEFAULT_SCHEME_PREFIX);
        format!("{}{}", DEFAULT_SCHEME_PREFIX, url)
    }
}

/// Removes invisible characters and repairs slash/scheme syntax
///
/// The steps always run in this order:
/// 1. zero-width characters
/// 2. ASCII control characters
/// 3. bidirectional override/isolate controls
/// 4. soft hyphens and stray byte order marks
/// 5. `:///...` collapsed to `://`
/// 6. missing colon after `http`/`https` restored
/// 7. whitespace around the scheme separator removed
/// 8. trailing slashes (and trailing whitespace) removed
/// 9. surrounding whitespace trimmed
pub fn clean_url(url: &str) -> String {
    let url = ZERO_WIDTH_REGEX.replace_all(url, "");
    let url = ASCII_CONTROL_REGEX.replace_all(&url, "");
    let url = BIDI_CONTROL_REGEX.replace_all(&url, "");
    let url = url.replace(&[SOFT_HYPHEN, BYTE_ORDER_MARK][..], "");
    let url = TRIPLE_SLASH_REGEX.replace_all(&url, "://");
    let url = MISSING_COLON_REGEX.replace(&url, "${1}://");
    let url = SPACED_SCHEME_REGEX.replace(&url, "${1}://");
    let url = url.trim_end_matches(|c: char| c == '/' || c.is_whitespace());

    url.trim().to_string()
}

/// Checks the delimiter structure against the generic URI grammar
///
/// Only empty strings and strings whose fragment spans a line break are
/// rejected. Semantically wrong addresses still pass.
pub fn is_structurally_valid(url: &str) -> bool {
    !url.is_empty() && URI_STRUCTURE_REGEX.is_match(url)
}

/// Scheme repair followed by character cleaning
pub fn canonicalize(raw: &str) -> String {
    clean_url(&ensure_scheme(raw))
}
