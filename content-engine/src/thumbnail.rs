//! Local SVG artwork rendered as data URIs.
//!
//! Nothing here touches the network. The same inputs always produce the same
//! output, including the decorative dot pattern which is seeded from the title.

use chrono::{Datelike, NaiveDate};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::fmt::Write;
use trendpost_core::{CategoryTheme, ContentCatalog};

/// Characters `encodeURIComponent` leaves alone.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub const DATA_URI_PREFIX: &str = "data:image/svg+xml,";

const TITLE_CHAR_CAP: usize = 60;
const TITLE_CUT_AT: usize = 57;
const LINE_CHAR_BUDGET: usize = 25;
const MAX_TITLE_LINES: usize = 3;
const DOT_COUNT: usize = 20;
const FONT_STACK: &str = "'Pretendard', 'Noto Sans KR', sans-serif";

/// Escapes `& < > " '` for embedding in markup.
pub fn escape_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn to_data_uri(svg: &str) -> String {
    format!(
        "{}{}",
        DATA_URI_PREFIX,
        utf8_percent_encode(svg.trim(), URI_COMPONENT)
    )
}

/// Cuts titles over the cap and greedily wraps them on spaces.
pub fn wrap_title(title: &str) -> Vec<String> {
    let display: String = if title.chars().count() > TITLE_CHAR_CAP {
        let mut cut: String = title.chars().take(TITLE_CUT_AT).collect();
        cut.push_str("...");
        cut
    } else {
        title.to_string()
    };

    let mut lines = Vec::new();
    let mut current = String::new();
    for word in display.split(' ') {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if candidate.chars().count() > LINE_CHAR_BUDGET {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            current = word.to_string();
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines.truncate(MAX_TITLE_LINES);
    lines
}

/// FNV-1a, used only to seed the dot pattern.
fn seed_from(text: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in text.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

fn gradient_defs(theme: &CategoryTheme) -> String {
    format!(
        r#"<defs>
    <linearGradient id="bgGradient" x1="0%" y1="0%" x2="100%" y2="100%">
      <stop offset="0%" style="stop-color:{bg0};stop-opacity:1" />
      <stop offset="100%" style="stop-color:{bg1};stop-opacity:1" />
    </linearGradient>
    <linearGradient id="accentGradient" x1="0%" y1="0%" x2="100%" y2="0%">
      <stop offset="0%" style="stop-color:{primary};stop-opacity:0.8" />
      <stop offset="100%" style="stop-color:{secondary};stop-opacity:0.8" />
    </linearGradient>
    <filter id="glow">
      <feGaussianBlur stdDeviation="4" result="coloredBlur"/>
      <feMerge>
        <feMergeNode in="coloredBlur"/>
        <feMergeNode in="SourceGraphic"/>
      </feMerge>
    </filter>
  </defs>"#,
        bg0 = theme.bg_gradient.0,
        bg1 = theme.bg_gradient.1,
        primary = theme.primary_color,
        secondary = theme.secondary_color,
    )
}

fn dot_pattern(theme: &CategoryTheme, seed: u64, width: u32, height: u32) -> String {
    let mut rng = fastrand::Rng::with_seed(seed);
    let mut dots = String::new();
    for _ in 0..DOT_COUNT {
        let cx = rng.f64() * f64::from(width);
        let cy = rng.f64() * f64::from(height);
        let r = rng.f64() * 3.0 + 1.0;
        let _ = write!(
            dots,
            r#"<circle cx="{:.1}" cy="{:.1}" r="{:.1}" fill="{}"/>"#,
            cx, cy, r, theme.primary_color
        );
    }
    format!(r#"<g opacity="0.1">{}</g>"#, dots)
}

/// Renders the 1200x630-style cover image for a post.
pub fn render_thumbnail(
    catalog: &ContentCatalog,
    category: &str,
    title: &str,
    width: u32,
    height: u32,
    date: NaiveDate,
) -> String {
    let theme = catalog.theme(category);
    let lines = wrap_title(title);
    let title_top = i64::from(height / 2) - (lines.len() as i64) * 25;

    let mut title_markup = String::new();
    for (index, line) in lines.iter().enumerate() {
        let _ = write!(
            title_markup,
            r#"<text x="0" y="{}" font-family="{}" font-size="48" font-weight="700" fill="white" text-anchor="middle" filter="url(#glow)">{}</text>"#,
            index * 60,
            FONT_STACK,
            escape_markup(line)
        );
    }

    let svg = format!(
        r#"<svg width="{w}" height="{h}" viewBox="0 0 {w} {h}" xmlns="http://www.w3.org/2000/svg">
  {defs}
  <rect width="{w}" height="{h}" fill="url(#bgGradient)"/>
  {dots}
  <rect x="50" y="50" width="300" height="4" fill="url(#accentGradient)" opacity="0.6"/>
  <rect x="50" y="{bottom_bar}" width="200" height="4" fill="url(#accentGradient)" opacity="0.6"/>
  <rect x="{right_bar}" y="50" width="200" height="4" fill="url(#accentGradient)" opacity="0.6"/>
  <g transform="translate(60, 100)">
    <rect x="0" y="0" width="200" height="40" rx="20" fill="{primary}" opacity="0.2"/>
    <rect x="0" y="0" width="200" height="40" rx="20" fill="none" stroke="{primary}" stroke-width="2" opacity="0.8"/>
    <text x="100" y="26" font-family="{font}" font-size="18" font-weight="600" fill="{primary}" text-anchor="middle">{category}</text>
  </g>
  <g transform="translate({icon_x}, {icon_y})">
    <circle cx="80" cy="80" r="70" fill="{primary}" opacity="0.1"/>
    <path d="{icon}" fill="{primary}" opacity="0.5" transform="translate(40, 40) scale(3.3)"/>
  </g>
  <g transform="translate({center_x}, {title_top})">{title_markup}</g>
  <g transform="translate({center_x}, {brand_y})">
    <text x="0" y="0" font-family="'Montserrat', sans-serif" font-size="20" font-weight="500" fill="{primary}" text-anchor="middle" opacity="0.8">dduksang.com</text>
  </g>
  <g transform="translate({date_x}, 100)">
    <rect x="0" y="0" width="120" height="32" rx="16" fill="{secondary}" opacity="0.2"/>
    <text x="60" y="22" font-family="'Montserrat', sans-serif" font-size="14" font-weight="500" fill="{secondary}" text-anchor="middle">{month}월 {day}일</text>
  </g>
</svg>"#,
        w = width,
        h = height,
        defs = gradient_defs(theme),
        dots = dot_pattern(theme, seed_from(title), width, height),
        bottom_bar = i64::from(height) - 54,
        right_bar = i64::from(width) - 250,
        primary = theme.primary_color,
        secondary = theme.secondary_color,
        font = FONT_STACK,
        category = escape_markup(category),
        icon_x = i64::from(width) - 200,
        icon_y = i64::from(height) - 200,
        icon = theme.icon_path,
        center_x = width / 2,
        title_top = title_top,
        title_markup = title_markup,
        brand_y = i64::from(height) - 80,
        date_x = i64::from(width) - 180,
        month = date.month(),
        day = date.day(),
    );

    to_data_uri(&svg)
}

/// Renders an in-body illustration for a section.
pub fn render_section_image(
    catalog: &ContentCatalog,
    category: &str,
    caption: &str,
    width: u32,
    height: u32,
) -> String {
    let theme = catalog.theme(category);
    let caption: String = caption.chars().take(40).collect();

    let svg = format!(
        r#"<svg width="{w}" height="{h}" viewBox="0 0 {w} {h}" xmlns="http://www.w3.org/2000/svg">
  {defs}
  <rect width="{w}" height="{h}" fill="url(#bgGradient)"/>
  {dots}
  <g transform="translate({icon_x}, {icon_y})">
    <circle cx="80" cy="80" r="90" fill="{primary}" opacity="0.12"/>
    <path d="{icon}" fill="{primary}" opacity="0.6" transform="translate(40, 40) scale(3.3)"/>
  </g>
  <rect x="{bar_x}" y="{bar_y}" width="{bar_w}" height="4" fill="url(#accentGradient)" opacity="0.7"/>
  <text x="{center_x}" y="{caption_y}" font-family="{font}" font-size="36" font-weight="600" fill="white" text-anchor="middle">{caption}</text>
</svg>"#,
        w = width,
        h = height,
        defs = gradient_defs(theme),
        dots = dot_pattern(theme, seed_from(&caption), width, height),
        icon_x = i64::from(width / 2) - 80,
        icon_y = i64::from(height / 2) - 160,
        primary = theme.primary_color,
        icon = theme.icon_path,
        bar_x = i64::from(width / 2) - 100,
        bar_y = i64::from(height / 2) + 40,
        bar_w = 200,
        center_x = width / 2,
        caption_y = i64::from(height / 2) + 100,
        font = FONT_STACK,
        caption = escape_markup(&caption),
    );

    to_data_uri(&svg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use percent_encoding::percent_decode_str;
    use trendpost_core::catalog::{AI_SIDE_INCOME, MCP_RECOMMENDATION};

    fn decode(uri: &str) -> String {
        let encoded = uri.strip_prefix(DATA_URI_PREFIX).unwrap();
        percent_decode_str(encoded).decode_utf8().unwrap().into_owned()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 7).unwrap()
    }

    #[test]
    fn test_title_markup_is_escaped() {
        let catalog = ContentCatalog::builtin();
        let title = r#"<script>alert("x")</script> & 'quotes'"#;
        let uri = render_thumbnail(&catalog, MCP_RECOMMENDATION, title, 1200, 630, date());

        assert!(uri.starts_with(DATA_URI_PREFIX));
        // Encoded form carries no raw markup at all
        assert!(!uri[DATA_URI_PREFIX.len()..].contains('<'));

        let svg = decode(&uri);
        assert!(!svg.contains("<script>"));
        assert!(svg.contains("&lt;script&gt;"));
        assert!(svg.contains("&amp;"));
        assert!(svg.contains("&#039;quotes&#039;"));
    }

    #[test]
    fn test_empty_title_and_unknown_category() {
        let catalog = ContentCatalog::builtin();
        let uri = render_thumbnail(&catalog, "없는 카테고리", "", 1200, 630, date());
        let svg = decode(&uri);
        // Default theme colours
        assert!(svg.contains(&catalog.default_theme().primary_color));
        assert!(svg.contains("3월 7일"));
    }

    #[test]
    fn test_category_theme_applied() {
        let catalog = ContentCatalog::builtin();
        let svg = decode(&render_thumbnail(&catalog, AI_SIDE_INCOME, "부업", 1200, 630, date()));
        assert!(svg.contains("#00D9FF"));
        assert!(svg.contains("AI 부업정보"));
        assert!(svg.contains("dduksang.com"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let catalog = ContentCatalog::builtin();
        let a = render_thumbnail(&catalog, AI_SIDE_INCOME, "같은 제목", 1200, 630, date());
        let b = render_thumbnail(&catalog, AI_SIDE_INCOME, "같은 제목", 1200, 630, date());
        assert_eq!(a, b);
    }

    #[test]
    fn test_wrap_title_budget_and_cap() {
        let lines = wrap_title("one two three four five six seven eight nine ten eleven twelve");
        assert!(lines.len() <= 3);
        assert!(lines.iter().all(|l| l.chars().count() <= 25));

        let long = "가".repeat(80);
        let lines = wrap_title(&long);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].chars().count(), 60);
        assert!(lines[0].ends_with("..."));

        assert!(wrap_title("").is_empty());
    }

    #[test]
    fn test_encoding_matches_uri_component() {
        assert_eq!(to_data_uri("a b"), "data:image/svg+xml,a%20b");
        assert_eq!(to_data_uri("(x)!*'~"), "data:image/svg+xml,(x)!*'~");
        assert_eq!(to_data_uri("#"), "data:image/svg+xml,%23");
    }

    #[test]
    fn test_section_image_escapes_caption() {
        let catalog = ContentCatalog::builtin();
        let svg = decode(&render_section_image(&catalog, "x", "A <b>", 1200, 800));
        assert!(svg.contains("A &lt;b&gt;"));
    }
}
