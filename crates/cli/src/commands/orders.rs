//! Order history commands.

use ecomm_client::OrderApi;
use ecomm_core::{Order, OrderId};

use super::{CliError, Context};

fn log_order(order: &Order) {
    tracing::info!(
        "{:<26} {:<20} {:>3} lines {:>10}  {}",
        order.id.as_ref().map_or("-", OrderId::as_str),
        order
            .ordered_on
            .map_or_else(|| "-".to_string(), |at| at.format("%Y-%m-%d %H:%M").to_string()),
        order.items.len(),
        order.total.display(),
        order
            .status
            .as_ref()
            .map_or_else(String::new, ToString::to_string)
    );
}

pub async fn list(ctx: &Context) -> Result<(), CliError> {
    let orders = ctx.api.list_orders().await?;
    if orders.is_empty() {
        tracing::info!("No orders yet");
    }
    orders.iter().for_each(log_order);
    Ok(())
}

pub async fn show(ctx: &Context, id: &str) -> Result<(), CliError> {
    let order = ctx.api.get_order(&OrderId::new(id)).await?;
    log_order(&order);
    for item in &order.items {
        tracing::info!(
            "  {:<32} {:>3} x {:>10}",
            item.product_name,
            item.effective_quantity(),
            item.price.display()
        );
    }
    if let Some(address) = &order.delivery_address {
        tracing::info!("Delivered to: {}", address.one_line());
    }
    Ok(())
}
