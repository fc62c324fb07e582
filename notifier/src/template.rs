//! Built-in message templates and a small `{{path}}` / `{{#if path}}` renderer.

use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub title: &'static str,
    pub message: &'static str,
}

const TEMPLATES: [NotificationTemplate; 5] = [
    NotificationTemplate {
        id: "system-alert",
        name: "시스템 알림",
        title: "🚨 시스템 알림: {{title}}",
        message: "**문제 상황:** {{message}}\n\
                  **발생 시간:** {{timestamp}}\n\
                  **심각도:** {{severity}}\n\
                  {{#if metadata.service}}**서비스:** {{metadata.service}}{{/if}}\n\
                  {{#if metadata.error}}**오류:** {{metadata.error}}{{/if}}\n\n\
                  즉시 확인이 필요합니다.",
    },
    NotificationTemplate {
        id: "health-check",
        name: "헬스체크 알림",
        title: "💊 헬스체크: {{title}}",
        message: "**시스템 상태:** {{metadata.overall_status}}\n\
                  **확인 시간:** {{timestamp}}\n\
                  {{#if metadata.unhealthy_services}}**문제 서비스:** {{metadata.unhealthy_services}}{{/if}}\n\
                  {{#if metadata.recommendations}}**권장사항:** {{metadata.recommendations}}{{/if}}",
    },
    NotificationTemplate {
        id: "automation-success",
        name: "자동화 성공",
        title: "✅ 자동화 완료: {{title}}",
        message: "**작업:** {{message}}\n\
                  **완료 시간:** {{timestamp}}\n\
                  {{#if metadata.duration}}**소요 시간:** {{metadata.duration}}ms{{/if}}\n\
                  {{#if metadata.result}}**결과:** {{metadata.result}}{{/if}}",
    },
    NotificationTemplate {
        id: "automation-failure",
        name: "자동화 실패",
        title: "❌ 자동화 실패: {{title}}",
        message: "**실패한 작업:** {{message}}\n\
                  **실패 시간:** {{timestamp}}\n\
                  {{#if metadata.error}}**오류 메시지:** {{metadata.error}}{{/if}}\n\
                  {{#if metadata.retry_count}}**재시도 횟수:** {{metadata.retry_count}}{{/if}}\n\n\
                  수동 확인이 필요합니다.",
    },
    NotificationTemplate {
        id: "content-published",
        name: "콘텐츠 게시",
        title: "📝 콘텐츠 게시: {{title}}",
        message: "**게시된 글:** {{message}}\n\
                  **게시 시간:** {{timestamp}}\n\
                  {{#if metadata.url}}**URL:** {{metadata.url}}{{/if}}\n\
                  {{#if metadata.category}}**카테고리:** {{metadata.category}}{{/if}}",
    },
];

pub fn builtin_templates() -> &'static [NotificationTemplate] {
    &TEMPLATES
}

pub fn find_template(id: &str) -> Option<&'static NotificationTemplate> {
    TEMPLATES.iter().find(|t| t.id == id)
}

fn conditional_block() -> Option<&'static Regex> {
    static BLOCK: OnceLock<Option<Regex>> = OnceLock::new();
    BLOCK
        .get_or_init(|| Regex::new(r"(?s)\{\{#if\s+(\w+(?:\.\w+)*)\}\}(.*?)\{\{/if\}\}").ok())
        .as_ref()
}

fn variable() -> Option<&'static Regex> {
    static VARIABLE: OnceLock<Option<Regex>> = OnceLock::new();
    VARIABLE
        .get_or_init(|| Regex::new(r"\{\{(\w+(?:\.\w+)*)\}\}").ok())
        .as_ref()
}

/// Dotted lookup into nested objects.
pub fn lookup<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(data, |current, key| current.get(key))
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map_or(false, |f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(display).collect::<Vec<_>>().join(", "),
        other => other.to_string(),
    }
}

/// Renders `template` against `data`. Unknown variables are left in place;
/// `{{timestamp}}` falls back to the supplied formatted time.
pub fn render(template: &str, data: &Value, timestamp: &str) -> String {
    let with_blocks = match conditional_block() {
        Some(re) => re
            .replace_all(template, |caps: &Captures| {
                if is_truthy(lookup(data, &caps[1])) {
                    caps[2].to_string()
                } else {
                    String::new()
                }
            })
            .into_owned(),
        None => template.to_string(),
    };

    let rendered = match variable() {
        Some(re) => re
            .replace_all(&with_blocks, |caps: &Captures| match lookup(data, &caps[1]) {
                Some(value) => display(value),
                None if &caps[1] == "timestamp" => timestamp.to_string(),
                None => caps[0].to_string(),
            })
            .into_owned(),
        None => with_blocks,
    };

    rendered.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_all_templates_registered() {
        let ids: Vec<&str> = builtin_templates().iter().map(|t| t.id).collect();
        assert_eq!(
            ids,
            vec![
                "system-alert",
                "health-check",
                "automation-success",
                "automation-failure",
                "content-published"
            ]
        );
        assert!(find_template("missing").is_none());
    }

    #[test]
    fn test_conditionals_and_paths() {
        let template = find_template("content-published").unwrap();
        let data = json!({
            "title": "GitHub MCP",
            "message": "새 글",
            "metadata": { "category": "MCP 추천" }
        });

        let title = render(template.title, &data, "now");
        assert_eq!(title, "📝 콘텐츠 게시: GitHub MCP");

        let body = render(template.message, &data, "2025. 6. 1. 09:00:00");
        assert!(body.contains("**게시 시간:** 2025. 6. 1. 09:00:00"));
        assert!(body.contains("**카테고리:** MCP 추천"));
        assert!(!body.contains("URL"));
        assert!(!body.contains("{{"));
    }

    #[test]
    fn test_unknown_variable_kept_and_falsy_values() {
        let data = json!({ "metadata": { "retry_count": 0, "list": ["a", "b"] } });
        assert_eq!(render("{{nope}}", &data, "t"), "{{nope}}");
        assert_eq!(render("{{#if metadata.retry_count}}x{{/if}}", &data, "t"), "");
        assert_eq!(render("{{metadata.list}}", &data, "t"), "a, b");
    }
}
