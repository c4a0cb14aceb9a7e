//! Address book calls.

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use tracing::instrument;

use ecomm_core::{Address, AddressId};

use super::{AddressApi, ApiClient};
use crate::error::{ClientError, Result};

/// `GET /addresses` body: a bare array or `{ "addresses": [...] }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AddressList {
    Bare(Vec<Address>),
    Wrapped { addresses: Option<Vec<Address>> },
}

fn require_complete(address: &Address) -> Result<()> {
    if address.is_complete() {
        Ok(())
    } else {
        Err(ClientError::Validation(
            "All address fields are required".to_string(),
        ))
    }
}

#[async_trait]
impl AddressApi for ApiClient {
    #[instrument(skip(self))]
    async fn list_addresses(&self) -> Result<Vec<Address>> {
        let list: AddressList = self.execute(self.authed(Method::GET, &["addresses"])?).await?;
        Ok(match list {
            AddressList::Bare(addresses) => addresses,
            AddressList::Wrapped { addresses } => addresses.unwrap_or_default(),
        })
    }

    #[instrument(skip(self, address))]
    async fn add_address(&self, address: &Address) -> Result<()> {
        require_complete(address)?;
        let request = self.authed(Method::POST, &["addresses"])?.json(address);
        self.execute_ack(request).await
    }

    #[instrument(skip(self, address_id, address), fields(address_id = %address_id))]
    async fn update_address(&self, address_id: &AddressId, address: &Address) -> Result<()> {
        require_complete(address)?;
        let request = self
            .authed(Method::PUT, &["addresses", address_id.as_str()])?
            .json(address);
        self.execute_ack(request).await
    }

    #[instrument(skip(self, address_id), fields(address_id = %address_id))]
    async fn delete_address(&self, address_id: &AddressId) -> Result<()> {
        self.execute_ack(self.authed(Method::DELETE, &["addresses", address_id.as_str()])?)
            .await
    }
}
