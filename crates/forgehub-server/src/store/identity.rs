// SPDX-License-Identifier: Apache-2.0

use crate::store::{IdentityStore, StoreError};
use async_trait::async_trait;
use forgehub_model::UserId;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Token-to-user registry. Credentials are passed explicitly into every
/// handler from the `Authorization` header; nothing here is ambient.
#[derive(Default)]
pub struct MemoryIdentityStore {
    tokens: Mutex<HashMap<String, UserId>>,
}

impl MemoryIdentityStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn user_for_token(&self, token: &str) -> Result<Option<UserId>, StoreError> {
        Ok(self.tokens.lock().await.get(token).cloned())
    }

    async fn register_token(&self, token: &str, user: UserId) -> Result<(), StoreError> {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(StoreError("token must not be empty".to_string()));
        }
        self.tokens
            .lock()
            .await
            .insert(trimmed.to_string(), user);
        Ok(())
    }
}
