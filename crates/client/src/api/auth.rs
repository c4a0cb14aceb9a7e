//! Account calls.

use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;
use tracing::instrument;

use ecomm_core::{AuthenticatedUser, NewUser, ProfileUpdate, User};

use super::{ApiClient, AuthApi};
use crate::error::Result;

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[async_trait]
impl AuthApi for ApiClient {
    #[instrument(skip(self, user), fields(email = %user.email))]
    async fn register(&self, user: &NewUser) -> Result<()> {
        let request = self.request(Method::POST, &["auth", "register"])?.json(user);
        self.execute_ack(request).await
    }

    #[instrument(skip(self, password))]
    async fn login(&self, email: &str, password: &str) -> Result<AuthenticatedUser> {
        let request = self
            .request(Method::POST, &["auth", "login"])?
            .json(&LoginRequest { email, password });
        self.execute(request).await
    }

    #[instrument(skip(self))]
    async fn logout(&self) -> Result<()> {
        self.execute_ack(self.request(Method::POST, &["auth", "logout"])?)
            .await
    }

    #[instrument(skip(self))]
    async fn get_profile(&self) -> Result<User> {
        self.execute(self.authed(Method::GET, &["user", "profile"])?)
            .await
    }

    #[instrument(skip(self))]
    async fn update_profile(&self, update: &ProfileUpdate) -> Result<User> {
        let request = self.authed(Method::PUT, &["user", "profile"])?.json(update);
        self.execute(request).await
    }
}
