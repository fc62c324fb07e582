use crate::config::CategorySettings;
use crate::types::Category;
use crate::ConfigError;
use std::collections::HashMap;

/// Colour scheme and icon used when rendering category artwork.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryTheme {
    pub primary_color: String,
    pub secondary_color: String,
    pub bg_gradient: (String, String),
    pub icon_path: String,
}

impl CategoryTheme {
    fn new(primary: &str, secondary: &str, bg: (&str, &str), icon_path: &str) -> Self {
        Self {
            primary_color: primary.to_string(),
            secondary_color: secondary.to_string(),
            bg_gradient: (bg.0.to_string(), bg.1.to_string()),
            icon_path: icon_path.to_string(),
        }
    }
}

pub const AI_SIDE_INCOME: &str = "AI 부업정보";
pub const VIBECODING_SUCCESS: &str = "바이브코딩 성공사례";
pub const MCP_RECOMMENDATION: &str = "MCP 추천";
pub const CLAUDE_LEVEL_UP: &str = "클로드코드 Level UP";

/// Immutable category registry: priority-ordered categories, topic pools and themes.
///
/// Built once at startup and shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct ContentCatalog {
    categories: Vec<Category>,
    keyword_pools: HashMap<String, Vec<String>>,
    themes: HashMap<String, CategoryTheme>,
    default_theme: CategoryTheme,
    trend_keywords: Vec<String>,
    trend_categories: Vec<String>,
}

const TREND_KEYWORDS: &[&str] = &[
    "GPT-4", "Claude 3", "Gemini", "Llama 3", "Mistral",
    "AI 에이전트", "멀티모달 AI", "RAG 시스템", "로컬 LLM",
    "AI 코딩 어시스턴트", "Cursor", "V0", "Claude Artifacts",
    "AI 이미지 생성", "Midjourney", "DALL-E 3", "Stable Diffusion",
    "AI 비디오 생성", "Sora", "Runway", "Pika Labs",
    "AI 음성 합성", "ElevenLabs", "AI 번역", "AI 요약",
    "AutoGPT", "LangChain", "Vector DB", "AI 파인튜닝",
    "AI 윤리", "AI 규제", "AI 보안", "Prompt Engineering",
    "AI 스타트업", "AI 투자", "AI 교육 플랫폼", "AI 자격증",
];

const TREND_CATEGORIES: &[&str] = &["AI 기술", "AI 도구", "AI 활용", "AI 비즈니스", "AI 교육"];

impl ContentCatalog {
    pub fn builtin() -> Self {
        let entries: [(&str, &str, u32, &[&str]); 4] = [
            (
                AI_SIDE_INCOME,
                "ai-side-income",
                3,
                &[
                    "네이버 블로그 쇼핑커넥트 월 30만원 수익화 전략",
                    "인스타그램 릴스 + 쿠팡파트너스 조합 수익 모델",
                    "AI 자동화 유튜브 쇼츠 일 10분 투자로 월 20만원",
                    "스마트스토어 무재고 판매 AI 상품 소싱 방법",
                    "ChatGPT로 전자책 작성 후 아마존 KDP 출간하기",
                    "AI 이미지 생성으로 라인스티커 판매 수익화",
                    "프롬프트 엔지니어링 강의 제작 월 50만원 달성",
                    "AI 콘텐츠 제작 대행 서비스 시작하기",
                    "미드저니로 POD 티셔츠 디자인 판매 전략",
                    "AI 챗봇 제작 대행으로 프리랜서 수익 창출",
                ],
            ),
            (
                VIBECODING_SUCCESS,
                "vibecoding-success",
                7,
                &[
                    "Photoroom - 사진 1장으로 월 $2M ARR 달성한 비결",
                    "Carrd.co - 원맨 개발자가 만든 연 $1M 노코드 플랫폼",
                    "TinyPNG - 단순 이미지 압축으로 월 $100K 수익",
                    "Remove.bg - AI 배경제거로 연 $10M 달성 스토리",
                    "Notion - 노트앱에서 유니콘까지 성장 전략 분석",
                    "Gumroad - 창작자 경제 플랫폼 부트스트랩 성공기",
                    "ConvertKit - 이메일 마케팅 SaaS $29M ARR 여정",
                    "Plausible Analytics - 구글 애널리틱스 대안으로 성장",
                    "Fathom Analytics - 프라이버시 중심 분석툴 성공 사례",
                    "Ghost - 워드프레스 대안 오픈소스 CMS 수익화",
                ],
            ),
            (
                MCP_RECOMMENDATION,
                "mcp-recommendation",
                3,
                &[
                    "filesystem MCP - 파일 시스템 완벽 제어 가이드",
                    "github MCP - 코드 리뷰 자동화 워크플로우",
                    "slack MCP - 팀 커뮤니케이션 자동화 설정법",
                    "postgres MCP - 데이터베이스 관리 자동화",
                    "google-drive MCP - 클라우드 파일 관리 통합",
                    "notion MCP - 노션 워크스페이스 자동화",
                    "stripe MCP - 결제 시스템 통합 가이드",
                    "spotify MCP - 음악 제어 자동화 설정",
                    "brave-search MCP - 검색 자동화 워크플로우",
                    "sequential-thinking MCP - 복잡한 문제 해결 도구",
                ],
            ),
            (
                CLAUDE_LEVEL_UP,
                "claude-levelup",
                1,
                &[
                    "Claude Squad 설치로 협업 능력 10배 향상시키기",
                    "SuperClaude로 무한 컨텍스트 활용하는 방법",
                    "서브에이전트 활용한 대규모 프로젝트 관리",
                    "git worktree로 멀티 브랜치 동시 작업하기",
                    "Claude Hooks로 자동화 워크플로우 구축",
                    "MCP 서버 직접 만들어 커스텀 기능 추가하기",
                    "Claude Projects로 팀 협업 환경 구축하기",
                    "Artifacts 활용한 인터랙티브 개발 환경",
                    "Claude API 활용한 자동화 스크립트 작성법",
                    "CLAUDE.md로 프로젝트별 AI 어시스턴트 최적화",
                ],
            ),
        ];

        let mut categories = Vec::with_capacity(entries.len());
        let mut keyword_pools = HashMap::new();
        for (name, slug, interval, topics) in entries {
            categories.push(Category {
                name: name.to_string(),
                slug: slug.to_string(),
                posting_interval_days: interval,
            });
            keyword_pools.insert(
                name.to_string(),
                topics.iter().map(|t| t.to_string()).collect(),
            );
        }

        let themes = builtin_themes();
        let default_theme = themes
            .get(MCP_RECOMMENDATION)
            .cloned()
            .unwrap_or_else(mcp_theme);

        Self {
            categories,
            keyword_pools,
            themes,
            default_theme,
            trend_keywords: TREND_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            trend_categories: TREND_CATEGORIES.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Replaces the category list with configured entries, keeping built-in themes.
    ///
    /// An entry without keywords reuses the built-in pool of the same name.
    pub fn with_overrides(overrides: &[CategorySettings]) -> Result<Self, ConfigError> {
        let builtin = Self::builtin();
        if overrides.is_empty() {
            return Ok(builtin);
        }

        let mut categories = Vec::with_capacity(overrides.len());
        let mut keyword_pools = HashMap::new();
        for entry in overrides {
            if entry.posting_interval_days == 0 {
                return Err(ConfigError::InvalidValue {
                    field: format!("categories.{}.posting_interval_days", entry.name),
                    value: "0".to_string(),
                });
            }
            let pool = if entry.keywords.is_empty() {
                builtin.keyword_pool(&entry.name).to_vec()
            } else {
                entry.keywords.clone()
            };
            if pool.is_empty() {
                return Err(ConfigError::MissingField {
                    field: format!("categories.{}.keywords", entry.name),
                });
            }
            categories.push(Category {
                name: entry.name.clone(),
                slug: entry.slug.clone(),
                posting_interval_days: entry.posting_interval_days,
            });
            keyword_pools.insert(entry.name.clone(), pool);
        }

        Ok(Self {
            categories,
            keyword_pools,
            themes: builtin.themes,
            default_theme: builtin.default_theme,
            trend_keywords: builtin.trend_keywords,
            trend_categories: builtin.trend_categories,
        })
    }

    /// Categories in scan priority order.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn category(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == name)
    }

    pub fn keyword_pool(&self, name: &str) -> &[String] {
        self.keyword_pools
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Theme for `name`, or the default theme for unknown categories.
    pub fn theme(&self, name: &str) -> &CategoryTheme {
        self.themes.get(name).unwrap_or(&self.default_theme)
    }

    pub fn default_theme(&self) -> &CategoryTheme {
        &self.default_theme
    }

    /// General trend topics used for previews outside the posting rotation.
    pub fn trend_keywords(&self) -> &[String] {
        &self.trend_keywords
    }

    pub fn trend_categories(&self) -> &[String] {
        &self.trend_categories
    }
}

impl Default for ContentCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

fn mcp_theme() -> CategoryTheme {
    CategoryTheme::new(
        "#4ECDC4",
        "#3ABAB2",
        ("#0F2027", "#203A43"),
        "M20 13H4c-.55 0-1 .45-1 1v6c0 .55.45 1 1 1h16c.55 0 1-.45 1-1v-6c0-.55-.45-1-1-1zM7 19c-1.1 0-2-.9-2-2s.9-2 2-2 2 .9 2 2-.9 2-2 2zM20 3H4c-.55 0-1 .45-1 1v6c0 .55.45 1 1 1h16c.55 0 1-.45 1-1V4c0-.55-.45-1-1-1zM7 9c-1.1 0-2-.9-2-2s.9-2 2-2 2 .9 2 2-.9 2-2 2z",
    )
}

fn builtin_themes() -> HashMap<String, CategoryTheme> {
    let mut themes = HashMap::new();
    themes.insert(
        AI_SIDE_INCOME.to_string(),
        CategoryTheme::new(
            "#00D9FF",
            "#0099CC",
            ("#001529", "#003366"),
            "M12 2C6.48 2 2 6.48 2 12s4.48 10 10 10 10-4.48 10-10S17.52 2 12 2zm1.41 16.09V20h-2.67v-1.93c-1.71-.36-3.16-1.46-3.27-3.4h1.96c.1.81.45 1.61 1.67 1.61 1.16 0 1.6-.64 1.6-1.46 0-.84-.36-1.31-1.71-1.73-1.62-.48-3.36-1.16-3.36-3.31 0-1.66 1.28-2.79 2.86-3.12V4.73h2.67v1.95c1.86.45 2.79 1.86 2.85 3.39H14.3c-.05-1.11-.64-1.87-1.52-1.87-1.15 0-1.58.58-1.58 1.3 0 .72.45 1.09 1.69 1.5 1.65.54 3.38 1.12 3.38 3.4.01 1.87-1.4 3.02-2.86 3.69z",
        ),
    );
    themes.insert(
        VIBECODING_SUCCESS.to_string(),
        CategoryTheme::new(
            "#FF6B6B",
            "#FF4444",
            ("#1A0F1F", "#2D1B33"),
            "M5 3C3.9 3 3 3.9 3 5l0 2c0 2.21 1.79 4 4 4h1.18C8.6 12.16 9.71 13 11 13v6h2v-6c1.29 0 2.4-.84 2.82-2H17c2.21 0 4-1.79 4-4V5c0-1.1-.9-2-2-2H5zm0 2h2v2c0 1.11-.89 2-2 2V5zm14 0v4c-1.11 0-2-.89-2-2V5h2z",
        ),
    );
    themes.insert(MCP_RECOMMENDATION.to_string(), mcp_theme());
    themes.insert(
        CLAUDE_LEVEL_UP.to_string(),
        CategoryTheme::new(
            "#FFD93D",
            "#FFCC00",
            ("#1A1A2E", "#16213E"),
            "M11 21h-1l1-7H7.5c-.58 0-.57-.32-.38-.66.19-.34.05-.08.07-.12C8.48 10.94 10.42 7.54 13 3h1l-1 7h3.5c.49 0 .56.33.47.51l-.07.15C12.96 17.55 11 21 11 21z",
        ),
    );
    themes
}
