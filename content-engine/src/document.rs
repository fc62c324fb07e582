//! Turns parsed model output, or the placeholder document, into a
//! [`GeneratedContent`] ready for persistence.

use crate::parser::{parse_response, MetadataBlock, ParsedBody, ParsedContent};
use crate::thumbnail::{escape_markup, render_section_image, render_thumbnail};
use chrono::NaiveDate;
use std::fmt::Write;
use tracing::warn;
use trendpost_core::{ContentCatalog, ContentOrigin, GeneratedContent};

const MAX_IMAGES: usize = 8;
const MIN_IMAGES: usize = 2;
const FILLER_CAPTIONS: [&str; 2] = ["artificial intelligence tech", "machine learning future"];

#[derive(Debug, Clone, Copy)]
pub struct DocumentOptions {
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
    pub image_width: u32,
    pub image_height: u32,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            thumbnail_width: 1200,
            thumbnail_height: 630,
            image_width: 1200,
            image_height: 800,
        }
    }
}

/// Rendered page body plus the illustrations it references.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedBody {
    pub html: String,
    pub images: Vec<String>,
}

fn summary_banner(text: &str) -> String {
    format!(
        "<div class=\"bg-gradient-to-r from-blue-50 to-purple-50 p-4 rounded-lg mb-6\">\n  <p class=\"text-lg font-semibold text-gray-800\">{}</p>\n</div>\n",
        text
    )
}

fn reading_time_line(minutes: u32) -> String {
    format!(
        "<div class=\"flex items-center gap-2 text-sm text-gray-600 mb-4\">\n  <span>⏱️ 읽는 시간: 약 {}분</span>\n</div>\n",
        minutes
    )
}

fn figure(src: &str, caption: &str, options: &DocumentOptions) -> String {
    let caption = escape_markup(caption);
    format!(
        "<figure class=\"my-8\">\n  <img src=\"{src}\" alt=\"{caption}\" class=\"w-full rounded-lg shadow-lg\" loading=\"lazy\" width=\"{w}\" height=\"{h}\">\n  <figcaption class=\"text-center text-sm text-gray-600 mt-2\">{caption}</figcaption>\n</figure>\n",
        src = src,
        caption = caption,
        w = options.image_width,
        h = options.image_height,
    )
}

fn metadata_label(key: &str) -> &'static str {
    match key {
        "practical_info" => "💰 실전 정보",
        "metrics" => "📈 핵심 지표",
        "github_info" => "🔗 GitHub 정보",
        "resources" => "📚 참고 자료",
        _ => "📋 추가 정보",
    }
}

fn metadata_list(blocks: &[MetadataBlock]) -> String {
    let mut html = String::new();
    for block in blocks {
        let _ = writeln!(html, "<h2>{}</h2>", metadata_label(&block.key));
        html.push_str("<ul>\n");
        for (key, value) in &block.entries {
            let _ = writeln!(
                html,
                "  <li><strong>{}</strong>: {}</li>",
                escape_markup(key),
                escape_markup(value)
            );
        }
        html.push_str("</ul>\n");
    }
    html
}

/// Builds the page HTML for a parsed document.
///
/// Section headings are escaped; section content is model-authored HTML and is
/// kept as is. Sections flagged `needs_image` get a local illustration, up to
/// eight, and the image list is padded to at least two.
pub fn render_body(
    parsed: &ParsedContent,
    category: &str,
    catalog: &ContentCatalog,
    options: &DocumentOptions,
) -> RenderedBody {
    let mut html = String::new();
    let mut images = Vec::new();

    match &parsed.body {
        ParsedBody::Sections(sections) => {
            if let Some(line) = &parsed.one_line_summary {
                html.push_str(&summary_banner(&escape_markup(line)));
            }
            if let Some(minutes) = parsed.reading_time {
                html.push_str(&reading_time_line(minutes));
            }
            for section in sections {
                let _ = writeln!(html, "<h2>{}</h2>", escape_markup(&section.heading));
                html.push_str(&section.content);
                html.push('\n');

                if section.needs_image && images.len() < MAX_IMAGES {
                    let caption = section.image_keyword.as_deref().unwrap_or(&section.heading);
                    let src = render_section_image(
                        catalog,
                        category,
                        caption,
                        options.image_width,
                        options.image_height,
                    );
                    html.push_str(&figure(&src, &section.heading, options));
                    images.push(src);
                }
            }
        }
        ParsedBody::Legacy(content) => html.push_str(content),
    }

    html.push_str(&metadata_list(&parsed.metadata));

    for caption in FILLER_CAPTIONS {
        if images.len() >= MIN_IMAGES {
            break;
        }
        images.push(render_section_image(
            catalog,
            category,
            caption,
            options.image_width,
            options.image_height,
        ));
    }

    RenderedBody { html, images }
}

/// Assembles a model-authored document.
pub fn assemble_content(
    parsed: ParsedContent,
    category: &str,
    catalog: &ContentCatalog,
    options: &DocumentOptions,
    today: NaiveDate,
) -> GeneratedContent {
    let body = render_body(&parsed, category, catalog, options);
    let thumbnail = render_thumbnail(
        catalog,
        category,
        &parsed.title,
        options.thumbnail_width,
        options.thumbnail_height,
        today,
    );

    let seo_keywords = if parsed.seo.keywords.is_empty() {
        parsed.tags.iter().take(5).cloned().collect()
    } else {
        parsed.seo.keywords.clone()
    };
    let seo_description = parsed
        .seo
        .meta_description
        .clone()
        .unwrap_or_else(|| parsed.summary.clone());

    GeneratedContent {
        seo_title: parsed.title.clone(),
        title: parsed.title,
        body_html: body.html,
        summary: parsed.summary,
        category: category.to_string(),
        tags: parsed.tags,
        thumbnail_data_uri: thumbnail,
        images: body.images,
        seo_description,
        seo_keywords,
        origin: ContentOrigin::Model,
    }
}

/// Placeholder document used when model output cannot be used.
pub fn fallback_content(
    category: &str,
    keywords: &[String],
    catalog: &ContentCatalog,
    options: &DocumentOptions,
    today: NaiveDate,
) -> GeneratedContent {
    let primary = keywords
        .first()
        .map(String::as_str)
        .filter(|k| !k.trim().is_empty())
        .unwrap_or(category);
    let escaped = escape_markup(primary);

    let title = format!("📚 {}: 2025년 완벽 가이드", primary);
    let summary = format!(
        "🎯 {}의 핵심 개념과 2025년 최신 활용 방법을 상세히 알아봅니다.",
        primary
    );

    let intro_caption = format!("{} 소개", primary);
    let feature_caption = format!("{} 특징", primary);
    let intro_image = render_section_image(
        catalog,
        category,
        &intro_caption,
        options.image_width,
        options.image_height,
    );
    let feature_image = render_section_image(
        catalog,
        category,
        &feature_caption,
        options.image_width,
        options.image_height,
    );

    let mut html = summary_banner(&format!("⚡ {}의 모든 것을 한 번에 정리했습니다.", escaped));
    html.push_str(&reading_time_line(5));
    let _ = writeln!(html, "<h2>🎯 {} 소개</h2>", escaped);
    let _ = writeln!(
        html,
        "<p>{}는 현재 AI 업계에서 가장 주목받는 기술 중 하나입니다. 2025년 현재 많은 기업들이 이 기술을 활용하여 혁신적인 서비스를 제공하고 있습니다.</p>",
        escaped
    );
    html.push_str(&figure(&intro_image, &intro_caption, options));
    html.push_str("<h2>✨ 주요 특징</h2>\n<ul>\n  <li>🚀 혁신적인 기술 구현</li>\n  <li>💡 실용적인 활용 사례</li>\n  <li>🔮 미래 발전 가능성</li>\n</ul>\n");
    html.push_str(&figure(&feature_image, &feature_caption, options));
    let _ = writeln!(html, "<h2>📖 활용 방법</h2>");
    let _ = writeln!(
        html,
        "<p>다양한 분야에서 {}를 활용할 수 있습니다. 특히 비즈니스, 교육, 연구 분야에서 큰 효과를 보이고 있습니다.</p>",
        escaped
    );

    let mut tags: Vec<String> = keywords.to_vec();
    tags.push("2025".to_string());
    tags.push("AI트렌드".to_string());

    let thumbnail = render_thumbnail(
        catalog,
        category,
        &title,
        options.thumbnail_width,
        options.thumbnail_height,
        today,
    );

    GeneratedContent {
        seo_title: title.clone(),
        seo_description: summary.clone(),
        seo_keywords: tags.iter().take(5).cloned().collect(),
        title,
        body_html: html,
        summary,
        category: category.to_string(),
        tags,
        thumbnail_data_uri: thumbnail,
        images: vec![intro_image, feature_image],
        origin: ContentOrigin::Fallback,
    }
}

/// Parses `raw` or substitutes the placeholder document. Never fails.
pub fn parse_or_fallback(
    raw: &str,
    category: &str,
    keywords: &[String],
    catalog: &ContentCatalog,
    options: &DocumentOptions,
    today: NaiveDate,
) -> GeneratedContent {
    match parse_response(raw) {
        Ok(parsed) => assemble_content(parsed, category, catalog, options, today),
        Err(e) => {
            warn!(
                "Model output for {} unusable ({}), using fallback document",
                category, e
            );
            fallback_content(category, keywords, catalog, options, today)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trendpost_core::catalog::MCP_RECOMMENDATION;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    fn mcp_keywords() -> Vec<String> {
        vec!["GitHub MCP".into(), "Slack MCP".into(), "Postgres MCP".into()]
    }

    #[test]
    fn test_malformed_output_falls_back() {
        let catalog = ContentCatalog::builtin();
        let raw = "Sorry, I can't produce JSON right now {{{";
        let content = parse_or_fallback(
            raw,
            MCP_RECOMMENDATION,
            &mcp_keywords(),
            &catalog,
            &DocumentOptions::default(),
            today(),
        );

        assert_eq!(content.origin, ContentOrigin::Fallback);
        assert!(content.title.starts_with("📚 GitHub MCP"));
        for kw in mcp_keywords() {
            assert!(content.tags.contains(&kw));
        }
        assert!(content.tags.contains(&"2025".to_string()));
        assert!(content.tags.contains(&"AI트렌드".to_string()));
        assert!(!content.body_html.contains("Sorry"));
        assert_eq!(content.images.len(), 2);
        assert!(content.thumbnail_data_uri.starts_with("data:image/svg+xml,"));
    }

    #[test]
    fn test_any_input_yields_complete_content() {
        let catalog = ContentCatalog::builtin();
        for raw in ["", "{}", "null", "{\"title\": 1}", "```json\n{\"title\":\"t\"}\n```"] {
            let content = parse_or_fallback(
                raw,
                "AI 기술",
                &["Sora".to_string()],
                &catalog,
                &DocumentOptions::default(),
                today(),
            );
            assert!(!content.title.is_empty());
            assert!(!content.body_html.is_empty());
            assert!(!content.summary.is_empty());
            assert!(content.images.len() >= 2);
        }
    }

    #[test]
    fn test_model_document_is_rendered() {
        let catalog = ContentCatalog::builtin();
        let raw = r#"{
            "title": "⚡ [MCP] GitHub MCP - 실전 활용법",
            "summary": "리뷰 자동화",
            "one_line_summary": "⚡ PR 리뷰를 자동으로",
            "reading_time": 6,
            "sections": [
                {"heading": "1. <소개>", "content": "<p>본문</p>", "needs_image": true},
                {"heading": "2. 설치", "content": "<p>npm</p>"}
            ],
            "tags": ["MCP", "Claude", "GitHub MCP", "자동화", "생산성", "추가"],
            "github_info": {"stars": "1k"}
        }"#;
        let content = parse_or_fallback(
            raw,
            MCP_RECOMMENDATION,
            &mcp_keywords(),
            &catalog,
            &DocumentOptions::default(),
            today(),
        );

        assert_eq!(content.origin, ContentOrigin::Model);
        assert!(content.body_html.contains("<h2>1. &lt;소개&gt;</h2>"));
        assert!(content.body_html.contains("읽는 시간: 약 6분"));
        assert!(content.body_html.contains("⚡ PR 리뷰를 자동으로"));
        assert!(content.body_html.contains("GitHub 정보"));
        assert!(content.body_html.contains("<figure"));
        assert_eq!(content.images.len(), 2);
        assert_eq!(content.seo_keywords.len(), 5);
        assert_eq!(content.seo_description, "리뷰 자동화");
    }

    #[test]
    fn test_image_count_capped() {
        let catalog = ContentCatalog::builtin();
        let sections: Vec<String> = (0..12)
            .map(|i| format!(r#"{{"heading": "h{i}", "content": "<p>c</p>", "needs_image": true}}"#))
            .collect();
        let raw = format!(
            r#"{{"title": "t", "summary": "s", "sections": [{}], "tags": ["a"]}}"#,
            sections.join(",")
        );
        let parsed = parse_response(&raw).unwrap();
        let body = render_body(&parsed, "x", &catalog, &DocumentOptions::default());
        assert_eq!(body.images.len(), 8);
    }
}
