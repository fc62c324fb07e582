//! Prompt construction, response parsing, page assembly and thumbnails for
//! generated posts, plus the eligibility rules that decide when to post.

pub mod document;
pub mod eligibility;
pub mod keywords;
pub mod parser;
pub mod prompt;
pub mod slug;
pub mod thumbnail;

pub use document::{
    assemble_content, fallback_content, parse_or_fallback, render_body, DocumentOptions,
    RenderedBody,
};
pub use eligibility::{is_due, DueCategory, EligibilitySelector};
pub use keywords::sample_keywords;
pub use parser::{parse_response, ParsedBody, ParsedContent, ParsedSection};
pub use prompt::build_prompt;
pub use slug::{disambiguate, slugify};
pub use thumbnail::{render_section_image, render_thumbnail, to_data_uri};
