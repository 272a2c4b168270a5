use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use cc_core::Clock;
use cc_core::model::UserId;
use storage::remote::RemoteConfig;

use crate::error::IdentityError;
use crate::session_gate::{Session, SessionSlot};

/// The external identity provider. Consumed, not implemented here.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchange credentials for a session.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Rejected` for bad credentials, or transport errors.
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError>;

    /// Revoke a session.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError` if the provider cannot be reached or refuses.
    async fn sign_out(&self, session: &Session) -> Result<(), IdentityError>;
}

/// Password sign-in against a hosted GoTrue endpoint.
#[derive(Clone)]
pub struct SupabaseAuth {
    client: Client,
    config: RemoteConfig,
    clock: Clock,
}

impl SupabaseAuth {
    /// # Errors
    ///
    /// Returns `IdentityError::Http` if the HTTP client cannot be built.
    pub fn new(config: RemoteConfig, clock: Clock) -> Result<Self, IdentityError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            config,
            clock,
        })
    }
}

#[derive(Debug, Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    user: TokenUser,
}

#[derive(Debug, Deserialize)]
struct TokenUser {
    id: String,
}

#[derive(Debug, Deserialize)]
struct AuthErrorBody {
    #[serde(alias = "error_description", alias = "msg")]
    message: Option<String>,
}

fn session_from_token(body: TokenResponse, clock: Clock) -> Result<Session, IdentityError> {
    let user_id = body
        .user
        .id
        .parse::<UserId>()
        .map_err(|e| IdentityError::MalformedSession(e.to_string()))?;
    if body.access_token.trim().is_empty() {
        return Err(IdentityError::MalformedSession("empty access token".into()));
    }
    Ok(Session {
        user_id,
        access_token: body.access_token,
        expires_at: body
            .expires_in
            .map(|secs| clock.now() + Duration::seconds(secs)),
    })
}

#[async_trait]
impl IdentityProvider for SupabaseAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let response = self
            .client
            .post(self.config.auth_url("token"))
            .query(&[("grant_type", "password")])
            .header("apikey", &self.config.anon_key)
            .json(&PasswordGrant { email, password })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            let body: AuthErrorBody = response
                .json()
                .await
                .unwrap_or(AuthErrorBody { message: None });
            return Err(IdentityError::Rejected(
                body.message.unwrap_or_else(|| "invalid credentials".into()),
            ));
        }
        if !status.is_success() {
            return Err(IdentityError::HttpStatus(status));
        }

        let body: TokenResponse = response.json().await?;
        session_from_token(body, self.clock)
    }

    async fn sign_out(&self, session: &Session) -> Result<(), IdentityError> {
        let response = self
            .client
            .post(self.config.auth_url("logout"))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(&session.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IdentityError::HttpStatus(response.status()));
        }
        Ok(())
    }
}

/// Signs users in and out, keeping the session slot in step.
#[derive(Clone)]
pub struct AuthService {
    provider: Arc<dyn IdentityProvider>,
    slot: SessionSlot,
}

impl AuthService {
    #[must_use]
    pub fn new(provider: Arc<dyn IdentityProvider>, slot: SessionSlot) -> Self {
        Self { provider, slot }
    }

    #[must_use]
    pub fn slot(&self) -> &SessionSlot {
        &self.slot
    }

    /// # Errors
    ///
    /// Propagates `IdentityError` from the provider; the slot is left untouched.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let session = self.provider.sign_in(email.trim(), password).await?;
        info!(user = %session.user_id, "signed in");
        self.slot.set(session.clone());
        Ok(session)
    }

    /// Sign out the held session, if any.
    ///
    /// # Errors
    ///
    /// Propagates `IdentityError` from the provider; the session stays held so
    /// the user can retry.
    pub async fn sign_out(&self) -> Result<(), IdentityError> {
        let Some(session) = self.slot.current() else {
            return Ok(());
        };
        if let Err(err) = self.provider.sign_out(&session).await {
            warn!(error = %err, "sign-out failed");
            return Err(err);
        }
        self.slot.clear();
        info!(user = %session.user_id, "signed out");
        Ok(())
    }
}
