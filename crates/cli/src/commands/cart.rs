//! Cart commands. Each mutation prints the refreshed cart.

use ecomm_core::{CartItemId, ProductId};

use super::{CliError, Context};

pub async fn show(ctx: &Context) {
    ctx.cart.refresh().await;
    log_cart(ctx);
}

pub fn log_cart(ctx: &Context) {
    let items = ctx.cart.items();
    if items.is_empty() {
        tracing::info!("Your cart is empty");
        return;
    }
    for item in &items {
        tracing::info!(
            "{:<12} {:<32} {:>3} x {:>10} = {:>10}",
            item.line_id().as_str(),
            item.product_name,
            item.effective_quantity(),
            item.price.display(),
            item.line_total().display()
        );
    }
    tracing::info!("Total: {}", ctx.cart.total().display());
}

pub async fn add(ctx: &Context, product: &str, quantity: u32) -> Result<(), CliError> {
    ctx.cart.add(&ProductId::new(product), quantity).await?;
    tracing::info!("Added {product} to cart");
    log_cart(ctx);
    Ok(())
}

pub async fn update(ctx: &Context, item: &str, quantity: u32) -> Result<(), CliError> {
    ctx.cart.update(&CartItemId::new(item), quantity).await?;
    log_cart(ctx);
    Ok(())
}

pub async fn remove(ctx: &Context, item: &str) -> Result<(), CliError> {
    ctx.cart.remove(&CartItemId::new(item)).await?;
    tracing::info!("Removed {item}");
    log_cart(ctx);
    Ok(())
}

pub async fn clear(ctx: &Context) -> Result<(), CliError> {
    ctx.cart.clear().await?;
    tracing::info!("Cart cleared");
    Ok(())
}

pub async fn buy(ctx: &Context, product: &str, quantity: u32, atomic: bool) -> Result<(), CliError> {
    let product = ProductId::new(product);
    if atomic {
        ctx.cart.instant_buy_atomic(&product, quantity).await?;
    } else {
        ctx.cart.instant_buy(&product, quantity).await?;
    }
    tracing::info!("Cart now holds only {product}; run `ecomm checkout` to order it");
    log_cart(ctx);
    Ok(())
}
