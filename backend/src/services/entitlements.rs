use async_trait::async_trait;
use uuid::Uuid;

/// What a user's plan entitles them to. The orchestrator only consumes this
/// struct, so a real billing engine can be substituted behind
/// [`EntitlementService`] without touching chat code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entitlement {
    /// Trailing conversation turns included when building a prompt.
    pub context_window: usize,
    /// Whether premium models may be selected.
    pub premium_models: bool,
    /// None means unlimited.
    pub daily_message_limit: Option<u32>,
}

impl Entitlement {
    pub const fn free() -> Self {
        Self {
            context_window: 20,
            premium_models: true,
            daily_message_limit: None,
        }
    }
}

#[async_trait]
pub trait EntitlementService: Send + Sync {
    async fn entitlement_for(&self, user_id: Uuid) -> Entitlement;
}

/// The current billing story: everyone is on the free plan with unlimited
/// access, regardless of what the subscriptions table says.
#[derive(Debug, Clone, Default)]
pub struct FreeTierEntitlements;

#[async_trait]
impl EntitlementService for FreeTierEntitlements {
    async fn entitlement_for(&self, _user_id: Uuid) -> Entitlement {
        Entitlement::free()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_free_tier_is_unlimited() {
        let service = FreeTierEntitlements;
        let entitlement = service.entitlement_for(Uuid::new_v4()).await;
        assert_eq!(entitlement.context_window, 20);
        assert!(entitlement.premium_models);
        assert!(entitlement.daily_message_limit.is_none());
    }
}
