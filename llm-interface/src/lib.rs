//! Text generation clients for the content pipeline.
//!
//! Every provider sends one prompt and returns the raw model text. Retrying
//! is left to the caller.

mod http;
pub mod providers;
pub mod rotation;

pub use providers::{ClaudeProvider, GeminiProvider, OpenAiProvider};
pub use rotation::RotatingGenerator;

use async_trait::async_trait;
use std::sync::Arc;
use trendpost_core::{CoreError, GenerationError, GenerationSettings, ProviderKind};

#[async_trait]
pub trait TextGenerator: Send + Sync {
    fn provider_name(&self) -> &str;

    /// True when a credential is present. No network call is made.
    fn is_configured(&self) -> bool;

    async fn generate(&self, prompt: &str) -> Result<String, CoreError>;
}

/// Builds the generator described by `settings`.
///
/// With a non-empty `rotation` list the result spreads calls across those
/// providers; otherwise it is the single configured provider.
pub fn build_generator(settings: &GenerationSettings) -> Result<Arc<dyn TextGenerator>, CoreError> {
    if settings.rotation.is_empty() {
        return build_provider(settings.provider, settings);
    }

    let mut providers = Vec::with_capacity(settings.rotation.len());
    for kind in &settings.rotation {
        providers.push(build_provider(*kind, settings)?);
    }
    if providers.is_empty() {
        return Err(GenerationError::NoProviderConfigured.into());
    }
    Ok(Arc::new(RotatingGenerator::new(providers)))
}

fn build_provider(
    kind: ProviderKind,
    settings: &GenerationSettings,
) -> Result<Arc<dyn TextGenerator>, CoreError> {
    let generator: Arc<dyn TextGenerator> = match kind {
        ProviderKind::Gemini => Arc::new(GeminiProvider::from_settings(settings)?),
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::from_settings(settings)?),
        ProviderKind::Claude => Arc::new(ClaudeProvider::from_settings(settings)?),
    };
    Ok(generator)
}
