//! Category prompt templates.

use regex::{Captures, Regex};
use std::sync::OnceLock;
use trendpost_core::catalog::{AI_SIDE_INCOME, CLAUDE_LEVEL_UP, MCP_RECOMMENDATION, VIBECODING_SUCCESS};
use trendpost_core::CoreError;

fn placeholder() -> Option<&'static Regex> {
    static PLACEHOLDER: OnceLock<Option<Regex>> = OnceLock::new();
    PLACEHOLDER
        .get_or_init(|| Regex::new(r"\{\{([A-Z_]+)\}\}").ok())
        .as_ref()
}

const SIDE_INCOME_TEMPLATE: &str = r#"
당신은 실전 부업 전문가입니다. 검증된 AI 부업 정보를 제공해주세요.

주제: {{PRIMARY}}
관련 키워드: {{KEYWORDS}}

다음 JSON 형식으로 응답하세요:
{
  "title": "월 10-50만원 현실적인 부업 제목 (숫자 포함, 60자 이내)",
  "summary": "구체적인 수익 모델과 실행 방법 요약 (200자 이내)",
  "sections": [
    {
      "heading": "1. 시작하기 전 준비사항",
      "content": "<p>필요한 초기 투자, 시간, 기술 수준 등 구체적으로 설명</p>"
    },
    {
      "heading": "2. 단계별 실행 방법",
      "content": "<p>Step 1: 구체적 실행 단계...</p><p>Step 2: ...</p>"
    },
    {
      "heading": "3. 실제 수익 사례",
      "content": "<p>월 10만원: 하루 1시간 투자 시...</p><p>월 30만원: 하루 2-3시간...</p>"
    },
    {
      "heading": "4. 주의사항과 팁",
      "content": "<ul><li>흔한 실수들</li><li>수익 극대화 방법</li></ul>"
    }
  ],
  "tags": ["AI부업", "재택근무", "부수입", "{{PRIMARY}}", "2025"],
  "practical_info": {
    "initial_investment": "0-10만원",
    "monthly_income": "10-50만원",
    "time_required": "일 1-3시간",
    "difficulty": "초급-중급"
  }
}

핵심 원칙:
- 절대 과장 금지 (월 천만원 등 비현실적 수치 언급 금지)
- 구체적인 플랫폼명과 도구명 언급
- 실제 가능한 수익 범위만 제시
- 초보자도 따라할 수 있는 상세한 가이드"#;

const VIBECODING_TEMPLATE: &str = r#"
당신은 글로벌 스타트업 분석가입니다. 바이브코딩 성공 사례를 한국 상황에 맞게 소개하세요.

주제: {{PRIMARY}}
관련 키워드: {{KEYWORDS}}

다음 JSON 형식으로 응답하세요:
{
  "title": "🚀 [글로벌 사례] 제목 - 한국 적용 방법 포함",
  "summary": "핵심 성공 요인과 한국 시장 적용 가능성",
  "sections": [
    {
      "heading": "1. 프로젝트 소개",
      "content": "<p>창업자, 아이디어, 초기 자본, 기술 스택 등</p>"
    },
    {
      "heading": "2. 성장 과정",
      "content": "<p>MVP → 초기 고객 → 수익화 → 스케일업 과정</p>"
    },
    {
      "heading": "3. 핵심 성공 요인",
      "content": "<ul><li>차별화 포인트</li><li>기술적 우위</li><li>마케팅 전략</li></ul>"
    },
    {
      "heading": "4. 한국 시장 적용 방법",
      "content": "<p>한국의 특수성 고려한 현지화 전략...</p>"
    },
    {
      "heading": "5. 실행 가능한 액션 플랜",
      "content": "<p>당장 시작할 수 있는 구체적 단계들...</p>"
    }
  ],
  "tags": ["바이브코딩", "스타트업", "SaaS", "{{PRIMARY}}", "성공사례"],
  "metrics": {
    "mrr": "실제 MRR 수치 (달러)",
    "users": "사용자 수",
    "timeline": "성장 기간",
    "tech_stack": "사용 기술"
  }
}

핵심 원칙:
- 실제 존재하는 서비스/회사만 언급
- Product Hunt, Hacker News 등에서 검증된 사례
- 한국 시장 특성 반영한 현실적 조언
- 기술 스택과 구현 방법 구체적 제시"#;

const MCP_TEMPLATE: &str = r#"
당신은 MCP(Model Context Protocol) 전문가입니다. 실용적인 MCP 서버를 소개하세요.

주제: {{PRIMARY}}
관련 키워드: {{KEYWORDS}}

다음 JSON 형식으로 응답하세요:
{
  "title": "⚡ [MCP] {{PRIMARY}} - 실전 활용법",
  "summary": "이 MCP로 해결할 수 있는 실제 문제와 사용 시나리오",
  "sections": [
    {
      "heading": "1. MCP 소개",
      "content": "<p>기능, 목적, 제작자, GitHub 스타 수 등</p>"
    },
    {
      "heading": "2. 설치 방법",
      "content": "<pre><code>npm install @modelcontextprotocol/server-{{PRIMARY_SLUG}}</code></pre><p>상세 설치 가이드...</p>"
    },
    {
      "heading": "3. 설정 방법",
      "content": "<pre><code>// claude_desktop_config.json\n{\n  \"mcpServers\": {\n    \"{{PRIMARY_SLUG}}\": {\n      \"command\": \"npx\",\n      \"args\": [...]\n    }\n  }\n}</code></pre>"
    },
    {
      "heading": "4. 실전 활용 예시",
      "content": "<p>실제 워크플로우에서 사용하는 구체적 시나리오 3가지...</p>"
    },
    {
      "heading": "5. 팁과 주의사항",
      "content": "<ul><li>성능 최적화 방법</li><li>보안 고려사항</li><li>트러블슈팅</li></ul>"
    }
  ],
  "tags": ["MCP", "Claude", "{{PRIMARY}}", "자동화", "생산성"],
  "github_info": {
    "repo_url": "https://github.com/...",
    "stars": "스타 수",
    "last_updated": "최근 업데이트",
    "license": "라이선스"
  }
}

핵심 원칙:
- GitHub에 실제 존재하는 MCP만 소개
- 설치부터 활용까지 완전한 가이드
- 코드 예시는 복사해서 바로 사용 가능하게
- 실제 업무에 적용 가능한 시나리오 제시"#;

const CLAUDE_LEVEL_UP_TEMPLATE: &str = r#"
당신은 Claude Code 파워유저입니다. 고급 활용법을 소개하세요.

주제: {{PRIMARY}}
관련 키워드: {{KEYWORDS}}

다음 JSON 형식으로 응답하세요:
{
  "title": "🔥 [클로드코드] {{PRIMARY}} 완벽 가이드",
  "summary": "이 기능/도구로 생산성 10배 높이는 방법",
  "sections": [
    {
      "heading": "1. 기능 소개",
      "content": "<p>Anthropic 공식 기능 또는 커뮤니티 도구 상세 설명</p>"
    },
    {
      "heading": "2. 설정 방법",
      "content": "<pre><code>// 구체적인 설정 코드나 명령어\nclaude install {{PRIMARY_SLUG}}</code></pre>"
    },
    {
      "heading": "3. 기본 사용법",
      "content": "<p>초보자를 위한 단계별 가이드...</p>"
    },
    {
      "heading": "4. 고급 활용법",
      "content": "<p>파워유저를 위한 숨겨진 기능들...</p>"
    },
    {
      "heading": "5. 실전 워크플로우",
      "content": "<p>실제 프로젝트에서 활용하는 구체적 예시...</p>"
    },
    {
      "heading": "6. 트러블슈팅",
      "content": "<ul><li>자주 발생하는 문제</li><li>해결 방법</li></ul>"
    }
  ],
  "tags": ["ClaudeCode", "{{PRIMARY}}", "생산성", "자동화", "AI코딩"],
  "resources": {
    "official_docs": "공식 문서 링크",
    "github_repo": "GitHub 저장소",
    "community": "커뮤니티 링크",
    "version": "최신 버전 정보"
  }
}

핵심 원칙:
- Anthropic 공식 또는 검증된 커뮤니티 도구만 소개
- 코드 예시는 실제 동작하는 것만
- 버전별 차이점 명시
- 실무에서 바로 적용 가능한 팁 위주"#;

const TREND_TEMPLATE: &str = r#"
당신은 SEO 최적화 AI 트렌드 전문 블로거입니다. 다음 주제로 구글 상위노출에 최적화된 고품질 블로그 포스트를 작성해주세요.

주제: {{PRIMARY}}
카테고리: {{CATEGORY}}
관련 키워드: {{KEYWORDS}}

다음 JSON 형식으로 정확히 응답해주세요:
{
  "title": "📚 이모지 포함 매력적인 제목 (60자 이내, 숫자 포함 권장 예: 2025년 필수 AI 도구 TOP 7)",
  "summary": "🎯 핵심 내용 한줄 요약 (200자 이내, 독자가 얻을 수 있는 가치 명시)",
  "thumbnail_keyword": "영문 키워드 (예: artificial intelligence technology)",
  "sections": [
    {
      "heading": "섹션 제목",
      "content": "HTML 형식 섹션 내용 (이모지 활용, 500자 이상)",
      "needs_image": true 또는 false,
      "image_keyword": "영문 이미지 검색 키워드 (예: machine learning visualization)"
    }
  ],
  "tags": ["실용적태그1", "트렌드태그2", "기술태그3", "활용태그4", "2025태그5"],
  "seo": {
    "meta_description": "검색 결과에 표시될 설명 (160자, 행동 유도)",
    "keywords": ["SEO키워드1", "검색키워드2", "관련키워드3"],
    "related_searches": ["사용자가 추가로 검색할 만한 질문 5개"]
  },
  "one_line_summary": "⚡ 이 글의 핵심을 한 문장으로 (강력한 이모지 사용)",
  "reading_time": 예상 읽기 시간(분)
}

콘텐츠 작성 가이드:
1. 섹션 제목은 일반 텍스트로만 (HTML 태그 없이)
2. content 필드에만 HTML 태그 사용:
   - <p>문단</p>
   - <ul><li>목록</li></ul>
   - <strong>강조</strong>
   - <em>이탤릭</em>
3. 첫 문단에서 독자의 문제점/니즈 언급
4. 📌 중요 포인트는 이모지로 강조
5. 실제 사례와 2025년 최신 트렌드 포함
6. 각 섹션은 500-800자 (전체 2000자 이상)
7. 신뢰할 수 있는 통계나 출처 언급
8. 마지막에 실행 가능한 액션 아이템 제시

이미지 전략:
- 콘텐츠 500자당 1개 이미지 (최소 2개, 최대 8개)
- 각 주요 섹션마다 관련 이미지 필요 여부 판단
- 이미지 키워드는 구체적이고 전문적인 영문 용어 사용

JSON 형식으로만 응답하세요."#;

/// Builds the generation prompt for `category`.
///
/// The first keyword is the primary subject. Unknown categories get the
/// general trend template.
pub fn build_prompt(category: &str, keywords: &[String]) -> Result<String, CoreError> {
    let primary = keywords
        .first()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .ok_or_else(|| CoreError::InvalidInput {
            message: format!("at least one keyword is required to build a prompt for {category}"),
        })?;

    let template = match category {
        AI_SIDE_INCOME => SIDE_INCOME_TEMPLATE,
        VIBECODING_SUCCESS => VIBECODING_TEMPLATE,
        MCP_RECOMMENDATION => MCP_TEMPLATE,
        CLAUDE_LEVEL_UP => CLAUDE_LEVEL_UP_TEMPLATE,
        _ => TREND_TEMPLATE,
    };

    let pattern = placeholder().ok_or_else(|| CoreError::Internal {
        message: "prompt placeholder pattern failed to compile".to_string(),
    })?;
    let slug = package_name(primary);
    let joined = keywords.join(", ");

    // Substituted text is never rescanned for placeholders
    let prompt = pattern.replace_all(template, |caps: &Captures| match &caps[1] {
        "PRIMARY_SLUG" => slug.clone(),
        "PRIMARY" => primary.to_string(),
        "KEYWORDS" => joined.clone(),
        "CATEGORY" => category.to_string(),
        _ => caps[0].to_string(),
    });
    Ok(prompt.trim_start().to_string())
}

/// Lowercased, whitespace collapsed to `-`.
fn package_name(keyword: &str) -> String {
    keyword
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}
