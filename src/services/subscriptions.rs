use std::collections::HashSet;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{config::LimitsConfig, models::SubscriptionState};

/// Source of subscription standing for quota decisions.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn state(&self, user_id: Uuid) -> SubscriptionState;
}

/// Subscription standing read from configuration. Stands in for a billing
/// service lookup; swap the trait object to integrate one.
pub struct ConfigSubscriptionStore {
    subscribed: HashSet<Uuid>,
    admins: HashSet<Uuid>,
}

impl ConfigSubscriptionStore {
    pub fn new(limits: &LimitsConfig) -> Self {
        Self {
            subscribed: limits.subscribed_users.iter().copied().collect(),
            admins: limits.admin_users.iter().copied().collect(),
        }
    }
}

#[async_trait]
impl SubscriptionStore for ConfigSubscriptionStore {
    async fn state(&self, user_id: Uuid) -> SubscriptionState {
        SubscriptionState {
            subscribed: self.subscribed.contains(&user_id),
            admin: self.admins.contains(&user_id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn config_store_reports_standing() {
        let subscriber = Uuid::new_v4();
        let admin = Uuid::new_v4();
        let free = Uuid::new_v4();

        let store = ConfigSubscriptionStore::new(&LimitsConfig {
            subscribed_users: vec![subscriber],
            admin_users: vec![admin],
            ..LimitsConfig::default()
        });

        assert!(store.state(subscriber).await.bypasses_quota());
        assert!(store.state(admin).await.bypasses_quota());
        assert!(!store.state(free).await.bypasses_quota());
    }
}
