/// Models the local Ollama deployment is expected to have pulled. The first
/// entry is the default for users with no (or a stale) preference.
pub const AVAILABLE_MODELS: &[&str] = &["llama3.2:3b", "gemma3"];

pub fn default_model() -> &'static str {
    AVAILABLE_MODELS[0]
}

pub fn is_available(name: &str) -> bool {
    AVAILABLE_MODELS.contains(&name)
}

/// Resolves a (possibly absent, possibly stale) model preference to a model
/// that is actually available, falling back to the default.
pub fn resolve(preferred: Option<&str>) -> &'static str {
    preferred
        .and_then(|name| AVAILABLE_MODELS.iter().find(|m| **m == name))
        .copied()
        .unwrap_or_else(default_model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_model_is_available() {
        assert!(is_available(default_model()));
    }

    #[test]
    fn test_resolve_known_model() {
        assert_eq!(resolve(Some("gemma3")), "gemma3");
    }

    #[test]
    fn test_resolve_unknown_model_falls_back_to_default() {
        assert_eq!(resolve(Some("gpt-17-ultra")), default_model());
    }

    #[test]
    fn test_resolve_no_preference() {
        assert_eq!(resolve(None), default_model());
    }
}
