//! Command implementations.
//!
//! Every command gets a [`Context`] holding one API client, its session and
//! the cart manager. Commands that touch the shopper's data call
//! [`Context::sign_in`] first.

pub mod addresses;
pub mod cart;
pub mod checkout;
pub mod orders;
pub mod products;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use ecomm_client::{
    ApiClient, AuthService, CartManager, ClientConfig, ClientError, ConfigError, SessionStore,
};
use ecomm_core::User;

/// Errors a command can end with.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{}", .0.user_message())]
    Client(#[from] ClientError),
}

/// How to authenticate: an existing token wins over email and password.
pub struct Credentials {
    email: Option<String>,
    password: Option<SecretString>,
    token: Option<SecretString>,
}

impl Credentials {
    pub fn new(email: Option<String>, password: Option<String>, token: Option<String>) -> Self {
        Self {
            email,
            password: password.map(SecretString::from),
            token: token.map(SecretString::from),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Shared state for one CLI invocation.
pub struct Context {
    pub api: ApiClient,
    pub session: SessionStore,
    pub auth: AuthService<ApiClient>,
    pub cart: CartManager<ApiClient>,
    credentials: Credentials,
}

impl Context {
    pub fn new(config: &ClientConfig, credentials: Credentials) -> Result<Self, CliError> {
        let session = SessionStore::new();
        let api = ApiClient::new(config, session.clone())?;
        tracing::debug!(api_url = %api.base_url(), "API client ready");

        Ok(Self {
            auth: AuthService::new(api.clone(), session.clone()),
            cart: CartManager::new(api.clone(), session.clone()),
            api,
            session,
            credentials,
        })
    }

    /// Establish a session from the configured credentials.
    pub async fn sign_in(&self) -> Result<User, CliError> {
        if let Some(token) = &self.credentials.token {
            return Ok(self.auth.resume(token.clone()).await?);
        }
        let email = self
            .credentials
            .email
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEnvVar("ECOMM_EMAIL".to_string()))?;
        let password = self
            .credentials
            .password
            .as_ref()
            .ok_or_else(|| ConfigError::MissingEnvVar("ECOMM_PASSWORD".to_string()))?;

        Ok(self.auth.login(email, password).await?)
    }
}

/// Sign in and print the token for `ECOMM_TOKEN`.
pub async fn login(ctx: &Context) -> Result<(), CliError> {
    let user = ctx.sign_in().await?;
    tracing::info!("Signed in as {} <{}>", user.full_name(), user.email);
    if let Some(token) = ctx.session.token() {
        tracing::info!("Token: {}", token.expose_secret());
    }
    Ok(())
}
