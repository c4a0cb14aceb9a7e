//! Catalogue commands. These work without signing in.

use ecomm_client::ProductApi;
use ecomm_core::{Product, ProductId};

use super::{CliError, Context};

fn log_product(product: &Product) {
    tracing::info!(
        "{:<12} {:<40} {:>10}{}",
        product.cart_id().map_or("-", ProductId::as_str),
        product.product_name,
        product.price.display(),
        if product.in_stock() { "" } else { "  (out of stock)" }
    );
}

pub async fn list(ctx: &Context) -> Result<(), CliError> {
    let products = ctx.api.list_products().await?;
    tracing::info!("{} products", products.len());
    products.iter().for_each(log_product);
    Ok(())
}

pub async fn show(ctx: &Context, id: &str) -> Result<(), CliError> {
    let product = ctx.api.get_product(&ProductId::new(id)).await?;
    log_product(&product);
    if let Some(category) = &product.category {
        tracing::info!("Category: {category}");
    }
    if let Some(rating) = product.rating {
        tracing::info!("Rating: {rating:.1}");
    }
    if let Some(description) = &product.description {
        tracing::info!("{description}");
    }
    Ok(())
}

pub async fn search(ctx: &Context, query: &str) -> Result<(), CliError> {
    let products = ctx.api.search_products(query).await?;
    if products.is_empty() {
        tracing::info!("No products match '{query}'");
    }
    products.iter().for_each(log_product);
    Ok(())
}
