//! Cart commands.
//!
//! # Usage
//!
//! ```bash
//! cw cart show
//! cw cart add 12 --quantity 3
//! cw cart inc 12 --by -1
//! cw cart remove 12
//! cw cart clear
//! ```

use cartwright_core::Cart;
use tracing::info;

use super::{CommandError, Context, parse_product_id};

/// Print the cart.
#[allow(clippy::print_stdout)]
pub fn show(ctx: &Context) {
    let cart = ctx.tab.store().load();
    render(&cart);
    println!("Items in cart: {}", ctx.tab.store().item_count());
}

/// Look a product up in the catalog and add `quantity` units.
///
/// The quantity goes through the same staging as the product grid, so it is
/// clamped to what the catalog still allows before committing.
///
/// # Errors
///
/// Returns an error if the product is unknown, nothing can be added, or the
/// cart cannot be saved.
#[allow(clippy::print_stdout)]
pub async fn add(ctx: &Context, product_id: &str, quantity: &str) -> Result<(), CommandError> {
    let api = ctx.api()?;
    let product = ctx.find_product(&api, &parse_product_id(product_id)).await?;

    let mut mutator = ctx.tab.mutator();
    let staged = mutator.set_desired_quantity(&product, quantity);
    if staged.to_string() != quantity.trim() {
        info!(requested = %quantity, staged, "Quantity adjusted to available stock");
    }
    let cart = mutator.add_staged(&product)?;

    println!("Added {staged} x {}", product.name());
    render(&cart);
    Ok(())
}

/// Adjust a committed line by `delta`.
///
/// # Errors
///
/// Returns an error if the cart cannot be saved.
pub fn increment(ctx: &Context, product_id: &str, delta: i64) -> Result<(), CommandError> {
    let cart = ctx
        .tab
        .mutator()
        .increment_line_quantity(&parse_product_id(product_id), delta)?;
    render(&cart);
    Ok(())
}

/// Remove a line.
///
/// # Errors
///
/// Returns an error if the cart cannot be saved.
pub fn remove(ctx: &Context, product_id: &str) -> Result<(), CommandError> {
    let cart = ctx.tab.mutator().remove_line(&parse_product_id(product_id))?;
    render(&cart);
    Ok(())
}

/// Empty the cart.
///
/// # Errors
///
/// Returns an error if the cart cannot be saved.
#[allow(clippy::print_stdout)]
pub fn clear(ctx: &Context) -> Result<(), CommandError> {
    ctx.tab.mutator().clear()?;
    println!("Cart cleared");
    Ok(())
}

#[allow(clippy::print_stdout)]
pub fn render(cart: &Cart) {
    if cart.is_empty() {
        println!("Cart is empty");
        return;
    }
    for line in cart.lines() {
        println!(
            "{:>8}  {:<32} {:>4} x {:>10} = {:>10}",
            line.product_id.to_string(),
            line.name,
            line.quantity,
            line.unit_price,
            line.line_total()
        );
    }
    println!("{:>58} {:>10}", "Subtotal", cart.subtotal());
}
