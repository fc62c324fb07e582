use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::OnceLock;

const MAX_SLUG_CHARS: usize = 100;
const EMPTY_SLUG: &str = "post";

/// Hangul syllables, jamo and compatibility jamo.
fn hangul() -> Option<&'static Regex> {
    static HANGUL: OnceLock<Option<Regex>> = OnceLock::new();
    HANGUL
        .get_or_init(|| Regex::new(r"[\u{AC00}-\u{D7A3}\u{1100}-\u{11FF}\u{3130}-\u{318F}]").ok())
        .as_ref()
}

fn non_slug_run() -> Option<&'static Regex> {
    static NON_SLUG: OnceLock<Option<Regex>> = OnceLock::new();
    NON_SLUG
        .get_or_init(|| Regex::new(r"[^a-z0-9]+").ok())
        .as_ref()
}

/// Derives a URL-safe slug from a title.
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    let without_hangul = match hangul() {
        Some(re) => re.replace_all(&lowered, "").into_owned(),
        None => lowered,
    };
    let dashed = match non_slug_run() {
        Some(re) => re.replace_all(&without_hangul, "-").into_owned(),
        None => without_hangul
            .chars()
            .map(|c| if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { '-' })
            .collect(),
    };

    let mut slug: String = dashed.trim_matches('-').chars().take(MAX_SLUG_CHARS).collect();
    while slug.ends_with('-') {
        slug.pop();
    }

    if slug.is_empty() {
        EMPTY_SLUG.to_string()
    } else {
        slug
    }
}

/// Appends a time-derived suffix so a taken slug becomes unique.
pub fn disambiguate(slug: &str, now: DateTime<Utc>) -> String {
    let millis = now.timestamp_millis().max(0) as u64;
    format!("{}-{}", slug, to_base36(millis))
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_slugify_mixed_title() {
        assert_eq!(
            slugify("⚡ [MCP] GitHub MCP - 실전 활용법"),
            "mcp-github-mcp"
        );
        assert_eq!(slugify("Claude Code 2.0 출시!"), "claude-code-2-0");
    }

    #[test]
    fn test_slugify_empty_results() {
        assert_eq!(slugify("바이브코딩 성공사례"), "post");
        assert_eq!(slugify(""), "post");
        assert_eq!(slugify("!!!"), "post");
    }

    #[test]
    fn test_slugify_caps_length() {
        let title = "a-".repeat(80);
        let slug = slugify(&title);
        assert!(slug.len() <= 100);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn test_disambiguate_appends_base36_millis() {
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let slug = disambiguate("x", now);
        assert_eq!(slug, format!("x-{}", to_base36(1_700_000_000_000)));
        assert_ne!(slug, "x");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }
}
