//! Model output parsing.
//!
//! The raw text is expected to contain one JSON object, possibly wrapped in
//! prose or code fences. Everything is decoded into an all-optional document
//! and then validated into a [`ParsedContent`].

use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use trendpost_core::ParseError;

/// First `{` through last `}`.
fn json_span() -> Option<&'static Regex> {
    static JSON_SPAN: OnceLock<Option<Regex>> = OnceLock::new();
    JSON_SPAN
        .get_or_init(|| Regex::new(r"(?s)\{.*\}").ok())
        .as_ref()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSection {
    pub heading: String,
    pub content: String,
    pub needs_image: bool,
    pub image_keyword: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedBody {
    Sections(Vec<ParsedSection>),
    /// Older single-blob `content` field.
    Legacy(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SeoFields {
    pub meta_description: Option<String>,
    pub keywords: Vec<String>,
}

/// A labelled key/value block such as `practical_info` or `github_info`.
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataBlock {
    pub key: String,
    pub entries: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedContent {
    pub title: String,
    pub summary: String,
    pub body: ParsedBody,
    pub tags: Vec<String>,
    pub one_line_summary: Option<String>,
    pub reading_time: Option<u32>,
    pub thumbnail_keyword: Option<String>,
    pub seo: SeoFields,
    pub metadata: Vec<MetadataBlock>,
}

#[derive(Debug, Default, Deserialize)]
struct RawDocument {
    title: Option<String>,
    summary: Option<String>,
    sections: Option<Vec<RawSection>>,
    content: Option<String>,
    tags: Option<Vec<Value>>,
    one_line_summary: Option<String>,
    reading_time: Option<Value>,
    thumbnail_keyword: Option<String>,
    seo: Option<RawSeo>,
    practical_info: Option<Map<String, Value>>,
    metrics: Option<Map<String, Value>>,
    github_info: Option<Map<String, Value>>,
    resources: Option<Map<String, Value>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSection {
    heading: Option<String>,
    content: Option<String>,
    #[serde(default)]
    needs_image: Option<Value>,
    image_keyword: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSeo {
    meta_description: Option<String>,
    #[serde(default)]
    keywords: Vec<Value>,
}

/// Extracts and validates the JSON document in `raw`.
pub fn parse_response(raw: &str) -> Result<ParsedContent, ParseError> {
    let span = json_span()
        .and_then(|re| re.find(raw))
        .ok_or(ParseError::NoJsonObject)?
        .as_str();

    let doc: RawDocument = serde_json::from_str(span).map_err(|e| ParseError::InvalidJson {
        details: e.to_string(),
    })?;

    let title = required_text(doc.title, "title")?;
    let summary = required_text(doc.summary, "summary")?;

    let body = match (doc.sections, doc.content) {
        (Some(sections), legacy) => {
            let sections: Vec<ParsedSection> =
                sections.into_iter().filter_map(validate_section).collect();
            match (sections.is_empty(), legacy.and_then(non_blank)) {
                (false, _) => ParsedBody::Sections(sections),
                (true, Some(content)) => ParsedBody::Legacy(content),
                (true, None) => return Err(ParseError::EmptySections),
            }
        }
        (None, Some(content)) => match non_blank(content) {
            Some(content) => ParsedBody::Legacy(content),
            None => return Err(ParseError::EmptySections),
        },
        (None, None) => {
            return Err(ParseError::MissingField {
                field: "sections".to_string(),
            })
        }
    };

    let tags = string_list(doc.tags.unwrap_or_default());
    if tags.is_empty() {
        return Err(ParseError::MissingField {
            field: "tags".to_string(),
        });
    }

    let seo = doc
        .seo
        .map(|seo| SeoFields {
            meta_description: seo.meta_description.and_then(non_blank),
            keywords: string_list(seo.keywords),
        })
        .unwrap_or_default();

    let mut metadata = Vec::new();
    for (key, block) in [
        ("practical_info", doc.practical_info),
        ("metrics", doc.metrics),
        ("github_info", doc.github_info),
        ("resources", doc.resources),
    ] {
        if let Some(map) = block {
            let entries: Vec<(String, String)> = map
                .into_iter()
                .filter_map(|(k, v)| scalar_text(&v).map(|text| (k, text)))
                .collect();
            if !entries.is_empty() {
                metadata.push(MetadataBlock {
                    key: key.to_string(),
                    entries,
                });
            }
        }
    }

    Ok(ParsedContent {
        title,
        summary,
        body,
        tags,
        one_line_summary: doc.one_line_summary.and_then(non_blank),
        reading_time: doc.reading_time.as_ref().and_then(reading_minutes),
        thumbnail_keyword: doc.thumbnail_keyword.and_then(non_blank),
        seo,
        metadata,
    })
}

fn required_text(value: Option<String>, field: &str) -> Result<String, ParseError> {
    value.and_then(non_blank).ok_or_else(|| ParseError::MissingField {
        field: field.to_string(),
    })
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn validate_section(raw: RawSection) -> Option<ParsedSection> {
    let heading = raw.heading.and_then(non_blank)?;
    let content = raw.content.and_then(non_blank)?;
    let needs_image = match raw.needs_image {
        Some(Value::Bool(flag)) => flag,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    };
    Some(ParsedSection {
        heading,
        content,
        needs_image,
        image_keyword: raw.image_keyword.and_then(non_blank),
    })
}

fn string_list(values: Vec<Value>) -> Vec<String> {
    values
        .iter()
        .filter_map(scalar_text)
        .filter(|s| !s.is_empty())
        .collect()
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn reading_minutes(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().map(|m| m.min(u32::MAX as u64) as u32),
        Value::String(s) => s
            .trim()
            .trim_end_matches('분')
            .trim()
            .parse()
            .ok(),
        _ => None,
    }
    .filter(|m| *m > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = r#"Sure! Here is the post:
```json
{
  "title": "⚡ [MCP] github MCP - 실전 활용법",
  "summary": "코드 리뷰 자동화",
  "sections": [
    {"heading": "1. MCP 소개", "content": "<p>소개</p>", "needs_image": true, "image_keyword": "github"},
    {"heading": "", "content": "<p>dropped</p>"},
    {"heading": "2. 설치 방법", "content": "<pre><code>npm install</code></pre>"}
  ],
  "tags": ["MCP", "Claude", 2025],
  "github_info": {"repo_url": "https://github.com/x/y", "stars": 1200},
  "reading_time": "7분"
}
```"#;

    #[test]
    fn test_parses_wrapped_document() {
        let parsed = parse_response(WELL_FORMED).unwrap();
        assert_eq!(parsed.title, "⚡ [MCP] github MCP - 실전 활용법");
        assert_eq!(parsed.tags, vec!["MCP", "Claude", "2025"]);
        assert_eq!(parsed.reading_time, Some(7));

        let ParsedBody::Sections(sections) = &parsed.body else {
            panic!("expected sections");
        };
        assert_eq!(sections.len(), 2);
        assert!(sections[0].needs_image);
        assert!(!sections[1].needs_image);

        assert_eq!(parsed.metadata.len(), 1);
        assert_eq!(parsed.metadata[0].key, "github_info");
        assert!(parsed
            .metadata[0]
            .entries
            .contains(&("stars".to_string(), "1200".to_string())));
    }

    #[test]
    fn test_empty_and_prose_inputs() {
        assert_eq!(parse_response(""), Err(ParseError::NoJsonObject));
        assert_eq!(
            parse_response("I cannot help with that."),
            Err(ParseError::NoJsonObject)
        );
        assert!(matches!(
            parse_response("{ not json }"),
            Err(ParseError::InvalidJson { .. })
        ));
    }

    #[test]
    fn test_missing_fields() {
        assert_eq!(
            parse_response(r#"{"summary": "s", "sections": [], "tags": ["a"]}"#),
            Err(ParseError::MissingField {
                field: "title".to_string()
            })
        );
        assert_eq!(
            parse_response(r#"{"title": "t", "summary": "s", "tags": ["a"]}"#),
            Err(ParseError::MissingField {
                field: "sections".to_string()
            })
        );
        assert_eq!(
            parse_response(r#"{"title": "t", "summary": "s", "sections": [{"heading": "h"}], "tags": ["a"]}"#),
            Err(ParseError::EmptySections)
        );
        assert_eq!(
            parse_response(r#"{"title": "t", "summary": "s", "content": "<p>x</p>", "tags": []}"#),
            Err(ParseError::MissingField {
                field: "tags".to_string()
            })
        );
    }

    #[test]
    fn test_legacy_content_accepted() {
        let parsed =
            parse_response(r#"{"title": "t", "summary": "s", "content": "<p>x</p>", "tags": ["a"]}"#)
                .unwrap();
        assert_eq!(parsed.body, ParsedBody::Legacy("<p>x</p>".to_string()));
    }
}
