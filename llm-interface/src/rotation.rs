use crate::TextGenerator;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;
use trendpost_core::{CoreError, GenerationError};

/// Round-robin over several providers, skipping those without credentials.
pub struct RotatingGenerator {
    providers: Vec<Arc<dyn TextGenerator>>,
    next: AtomicUsize,
}

impl RotatingGenerator {
    pub fn new(providers: Vec<Arc<dyn TextGenerator>>) -> Self {
        Self {
            providers,
            next: AtomicUsize::new(0),
        }
    }

    fn configured(&self) -> Vec<&Arc<dyn TextGenerator>> {
        self.providers.iter().filter(|p| p.is_configured()).collect()
    }
}

#[async_trait]
impl TextGenerator for RotatingGenerator {
    fn provider_name(&self) -> &str {
        "rotating"
    }

    fn is_configured(&self) -> bool {
        self.providers.iter().any(|p| p.is_configured())
    }

    async fn generate(&self, prompt: &str) -> Result<String, CoreError> {
        let available = self.configured();
        if available.is_empty() {
            return Err(GenerationError::NoProviderConfigured.into());
        }

        let slot = self.next.fetch_add(1, Ordering::Relaxed) % available.len();
        let provider = available[slot];
        debug!("Rotation picked provider {}", provider.provider_name());
        provider.generate(prompt).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named {
        name: &'static str,
        configured: bool,
    }

    #[async_trait]
    impl TextGenerator for Named {
        fn provider_name(&self) -> &str {
            self.name
        }

        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn generate(&self, _prompt: &str) -> Result<String, CoreError> {
            Ok(self.name.to_string())
        }
    }

    fn named(name: &'static str, configured: bool) -> Arc<dyn TextGenerator> {
        Arc::new(Named { name, configured })
    }

    #[tokio::test]
    async fn test_rotation_cycles_configured_providers() {
        let rotating = RotatingGenerator::new(vec![
            named("a", true),
            named("b", false),
            named("c", true),
        ]);

        let mut picked = Vec::new();
        for _ in 0..4 {
            picked.push(rotating.generate("p").await.unwrap());
        }
        assert_eq!(picked, vec!["a", "c", "a", "c"]);
    }

    #[tokio::test]
    async fn test_rotation_without_credentials_fails() {
        let rotating = RotatingGenerator::new(vec![named("a", false)]);
        assert!(!rotating.is_configured());
        let err = rotating.generate("p").await.unwrap_err();
        assert!(matches!(
            err,
            CoreError::Generation(GenerationError::NoProviderConfigured)
        ));
    }
}
