//! Login, logout and profile calls wired to the session.

use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;

use ecomm_core::{Email, NewUser, ProfileUpdate, User};

use crate::api::AuthApi;
use crate::error::{ClientError, Result};
use crate::session::{Session, SessionStore};

/// Account operations that change who the client is signed in as.
#[derive(Debug, Clone)]
pub struct AuthService<A> {
    api: A,
    session: SessionStore,
}

impl<A: AuthApi> AuthService<A> {
    pub const fn new(api: A, session: SessionStore) -> Self {
        Self { api, session }
    }

    /// Sign in and store the returned user and token in the session.
    ///
    /// # Errors
    ///
    /// [`ClientError::Validation`] for a malformed email (nothing is sent),
    /// otherwise the login request's error. The session is untouched on
    /// failure.
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &SecretString) -> Result<User> {
        let email = Email::parse(email).map_err(|e| ClientError::Validation(e.to_string()))?;
        let authenticated = self
            .api
            .login(email.as_str(), password.expose_secret())
            .await?;

        let user = authenticated.user.clone();
        self.session.set(Session::new(
            Some(authenticated.user),
            SecretString::from(authenticated.token),
        ));
        tracing::info!(user_id = %user.user_id, "Signed in");
        Ok(user)
    }

    /// Adopt an existing token and load the profile it belongs to.
    ///
    /// # Errors
    ///
    /// Returns the profile request's error; the session then keeps the token
    /// but no user.
    #[instrument(skip_all)]
    pub async fn resume(&self, token: SecretString) -> Result<User> {
        self.session.set(Session::new(None, token));
        self.profile().await
    }

    /// Create an account. Does not sign in.
    ///
    /// # Errors
    ///
    /// Returns the registration request's error.
    pub async fn register(&self, user: &NewUser) -> Result<()> {
        self.api.register(user).await?;
        tracing::info!(email = %user.email, "Registered");
        Ok(())
    }

    /// Sign out.
    ///
    /// The server is told first; if that fails the failure is logged and the
    /// local session is cleared anyway, followed by the logout notification.
    #[instrument(skip(self))]
    pub async fn logout(&self) {
        if self.session.has_token() {
            if let Err(e) = self.api.logout().await {
                tracing::warn!(error = %e, "Server logout failed, clearing session anyway");
            }
        }
        self.session.sign_out();
        tracing::info!("Signed out");
    }

    /// Fetch the signed-in user's profile and store it in the session.
    ///
    /// # Errors
    ///
    /// [`ClientError::Authentication`] without a token, or the request's
    /// error.
    pub async fn profile(&self) -> Result<User> {
        self.require_token()?;
        let user = self.api.get_profile().await?;
        self.session.set_user(user.clone());
        Ok(user)
    }

    /// Update profile fields and store the result in the session.
    ///
    /// # Errors
    ///
    /// [`ClientError::Validation`] when no field is set,
    /// [`ClientError::Authentication`] without a token, or the request's
    /// error.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User> {
        if update.is_empty() {
            return Err(ClientError::Validation("Nothing to update".to_string()));
        }
        self.require_token()?;
        let user = self.api.update_profile(update).await?;
        self.session.set_user(user.clone());
        Ok(user)
    }

    fn require_token(&self) -> Result<()> {
        if self.session.has_token() {
            Ok(())
        } else {
            Err(ClientError::not_authenticated())
        }
    }
}
