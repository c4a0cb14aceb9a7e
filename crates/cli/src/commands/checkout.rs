//! Checkout command: summary, address choice, order placement.

use ecomm_client::{Checkout, CheckoutState, ClientError};

use super::{CliError, Context, cart::log_cart};

pub async fn run(ctx: &Context, address: Option<usize>, dry_run: bool) -> Result<(), CliError> {
    ctx.cart.refresh().await;
    if ctx.cart.is_empty() {
        tracing::info!("Your cart is empty");
        return Ok(());
    }

    let mut checkout = Checkout::enter(ctx.api.clone(), ctx.cart.clone(), ctx.session.clone()).await;

    if let Some(position) = address {
        let index = position
            .checked_sub(1)
            .ok_or_else(|| ClientError::Validation("Address positions start at 1".to_string()))?;
        checkout.select_index(index).map_err(|_| {
            ClientError::Validation(format!("No saved address at position {position}"))
        })?;
    }

    if checkout.is_instant_buy() {
        tracing::info!("Buying now:");
    }
    log_cart(ctx);

    match checkout.selected_address() {
        Some(selected) => tracing::info!("Deliver to: {}", selected.one_line()),
        None => {
            tracing::warn!("No saved address; add one with `ecomm addresses add`");
        }
    }

    if dry_run {
        return Ok(());
    }

    let receipt = checkout.place_order().await?;
    debug_assert!(matches!(checkout.state(), CheckoutState::Completed { .. }));
    tracing::info!(
        "Order placed{}{}",
        receipt
            .order_id
            .as_ref()
            .map_or_else(String::new, |id| format!(": {id}")),
        receipt
            .total
            .map_or_else(String::new, |total| format!(" ({})", total.display()))
    );
    Ok(())
}
