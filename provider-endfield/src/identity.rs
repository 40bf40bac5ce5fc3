//! Token service identity resolver

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest};
use bridge_traits::identity::{IdentityResolver, PlayerIdentity};
use core_runtime::config::EndfieldApiConfig;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::EndfieldError;
use crate::types::TokenServiceResponse;

/// Exchanges an auth token for a player identity via the token service.
///
/// A single POST with the form field `hgToken`; never retried.
pub struct TokenServiceIdentityResolver {
    http_client: Arc<dyn HttpClient>,
    api: EndfieldApiConfig,
}

impl TokenServiceIdentityResolver {
    pub fn new(http_client: Arc<dyn HttpClient>, api: EndfieldApiConfig) -> Self {
        Self { http_client, api }
    }

    async fn request_identity(&self, auth_token: &str) -> crate::Result<PlayerIdentity> {
        let request = HttpRequest::new(HttpMethod::Post, &self.api.token_service_url)
            .header("Accept", "application/json")
            .form(&[("hgToken", auth_token)])
            .timeout(self.api.request_timeout);

        let response = self.http_client.execute(request).await?;

        if !response.is_success() {
            return Err(EndfieldError::IdentityError(format!(
                "token service returned status {}",
                response.status
            )));
        }

        let parsed: TokenServiceResponse = serde_json::from_slice(&response.body)
            .map_err(|e| {
                EndfieldError::ParseError(format!("Failed to parse token service response: {}", e))
            })?;

        let info = parsed.data.ok_or_else(|| {
            EndfieldError::IdentityError(format!(
                "token service returned no user info: {}",
                parsed.msg.as_deref().unwrap_or("no message")
            ))
        })?;

        let role_id = info
            .role_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| EndfieldError::IdentityError("missing roleId".to_string()))?;

        let capability_token = info
            .u8_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| EndfieldError::IdentityError("missing u8Token".to_string()))?;

        Ok(PlayerIdentity {
            role_id,
            uid: info.uid.unwrap_or_default(),
            nick_name: info.nick_name.unwrap_or_default(),
            capability_token,
        })
    }
}

#[async_trait]
impl IdentityResolver for TokenServiceIdentityResolver {
    #[instrument(skip(self, auth_token))]
    async fn resolve(&self, auth_token: &str) -> Result<PlayerIdentity> {
        let identity = self.request_identity(auth_token).await?;
        debug!(role_id = %identity.role_id, "Resolved player identity");
        Ok(identity)
    }
}
