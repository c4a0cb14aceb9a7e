//! Address book commands.

use ecomm_client::AddressApi;
use ecomm_core::{Address, AddressId};

use super::{CliError, Context};

pub async fn list(ctx: &Context) -> Result<(), CliError> {
    let addresses = ctx.api.list_addresses().await?;
    if addresses.is_empty() {
        tracing::info!("No saved addresses");
    }
    for (position, address) in addresses.iter().enumerate() {
        tracing::info!(
            "{}. [{}] {}",
            position + 1,
            address.id.as_ref().map_or("-", AddressId::as_str),
            address.one_line()
        );
    }
    Ok(())
}

pub async fn add(
    ctx: &Context,
    house: &str,
    street: &str,
    city: &str,
    postal_code: &str,
) -> Result<(), CliError> {
    let address = Address::new(house, street, city, postal_code);
    ctx.api.add_address(&address).await?;
    tracing::info!("Saved {}", address.one_line());
    Ok(())
}

pub async fn remove(ctx: &Context, id: &str) -> Result<(), CliError> {
    ctx.api.delete_address(&AddressId::new(id)).await?;
    tracing::info!("Deleted address {id}");
    Ok(())
}
