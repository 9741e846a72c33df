//! Catalog listing.

use cartwright_engine::api::CatalogApi;
use cartwright_engine::catalog::CatalogQuery;

use super::{CommandError, Context};

/// Print one catalog page with what can still be added to the cart.
///
/// # Errors
///
/// Returns an error if the API is not configured or the request fails.
#[allow(clippy::print_stdout)]
pub async fn list(ctx: &Context, search: Option<String>, page: u32) -> Result<(), CommandError> {
    let api = ctx.api()?;
    let query = CatalogQuery {
        search,
        page_number: page.max(1),
        page_size: ctx.config.catalog_page_size,
    };
    let products = api.list_products(&query).await?;

    let grid = ctx.tab.product_grid(products);
    if grid.products().is_empty() {
        println!("No products");
        return Ok(());
    }

    for product in grid.products() {
        let controls = grid.controls(product);
        let availability = controls
            .stock_label
            .map_or_else(|| format!("{} available", controls.available), str::to_string);
        println!(
            "{:>8}  {:<32} {:>10}  stock {:>4}  {}",
            product.id().map(|id| id.to_string()).unwrap_or_default(),
            product.name(),
            product.unit_price(),
            product.stock(),
            availability
        );
    }
    Ok(())
}
