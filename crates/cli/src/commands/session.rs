//! Login and logout.

use cartwright_engine::api::Credentials;
use cartwright_engine::auth::AuthState;

use super::{CommandError, Context};

/// Exchange credentials for a stored session.
///
/// # Errors
///
/// Returns an error if the login endpoint refuses the credentials or the
/// session cannot be stored.
#[allow(clippy::print_stdout)]
pub async fn login(ctx: &Context, credentials: &Credentials) -> Result<(), CommandError> {
    let session = ctx.tab.session(ctx.api()?);
    session.login(credentials).await?;
    match session.customer_id() {
        Some(id) => println!("Logged in as customer {id}"),
        None => println!("Logged in"),
    }
    Ok(())
}

/// Drop the stored session. The cart is kept.
///
/// # Errors
///
/// Returns an error if the session slots cannot be removed.
#[allow(clippy::print_stdout)]
pub fn logout(ctx: &Context) -> Result<(), CommandError> {
    ctx.tab.logout()?;
    println!(
        "Logged out; {} item(s) remain in the cart",
        ctx.tab.store().item_count()
    );
    Ok(())
}
