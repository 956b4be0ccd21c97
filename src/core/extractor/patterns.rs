// src/core/extractor/patterns.rs

use once_cell::sync::Lazy;
use regex::Regex;

/// Dotted quad, loose on purpose: leading zeros such as `010.001.1.1` are
/// accepted and no numeric normalization happens. Scanner output is noisy and
/// the match is a text heuristic, not an address validator.
pub static RE_IPV4: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:(?:1\d\d|2[0-5][0-5]|2[0-4]\d|0?[1-9]\d|0?0?\d)\.){3}(?:1\d\d|2[0-5][0-5]|2[0-4]\d|0?[1-9]\d|0?0?\d)",
    )
    .unwrap()
});

const LABEL: &str = r"(?:[a-z0-9]|[a-z0-9][a-z0-9\-]{0,61}[a-z0-9])";

/// Builds the hostname pattern for one domain: RFC 1123 labels joined by
/// dots, ending with `.<domain>`. The pattern is anchored and is matched
/// against whole tokens, see [`find_hostname`].
pub fn hostname_regex(domain: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!(
        r"(?i)^{label}(?:\.{label})*\.{domain}$",
        label = LABEL,
        domain = regex::escape(domain)
    ))
}

/// Characters that can belong to a name token. Anything else separates
/// tokens, on both sides of a candidate.
fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

/// First token of `line` that is a hostname under the domain.
///
/// Tokens are maximal runs of name characters, so `_dmarc.example.com` and
/// `host.example.com.evil.net` are rejected as a whole instead of yielding a
/// shorter suffix. Trailing dots are dropped (`see host.example.com.`).
pub fn find_hostname(re: &Regex, line: &str) -> Option<String> {
    line.split(|c: char| !is_name_char(c))
        .map(|token| token.trim_end_matches('.'))
        .find(|token| re.is_match(token))
        .map(str::to_ascii_lowercase)
}

pub fn find_ipv4(line: &str) -> Option<String> {
    RE_IPV4.find(line).map(|m| m.as_str().to_string())
}
