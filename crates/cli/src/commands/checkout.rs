//! Checkout.
//!
//! # Usage
//!
//! ```bash
//! # Already logged in
//! cw checkout --shipping "Calle 1" --billing "Calle 1"
//!
//! # Log in as part of checkout; the order goes out once login completes
//! cw checkout --shipping "Calle 1" --billing "Calle 1" -u ana -p secret
//! ```

use std::sync::Arc;

use cartwright_engine::api::Credentials;
use cartwright_engine::checkout::{CheckoutForm, CheckoutOutcome};
use tracing::warn;

use super::{CommandError, Context};

/// Place an order for the current cart.
///
/// When signed out and `credentials` are given, the checkout is held while
/// the login runs and resumes as soon as the session exists.
///
/// # Errors
///
/// Returns an error if the form is incomplete, login fails or the order
/// endpoint fails. The cart is kept in every error case.
#[allow(clippy::print_stdout)]
pub async fn run(
    ctx: &Context,
    form: CheckoutForm,
    credentials: Option<Credentials>,
) -> Result<(), CommandError> {
    let api = ctx.api()?;
    let session = Arc::new(ctx.tab.session(api.clone()));
    let mut checkout = ctx.tab.checkout(api, Arc::clone(&session));

    let outcome = match checkout.request_checkout(form).await? {
        CheckoutOutcome::LoginRequired => match credentials {
            Some(credentials) => {
                let resumed = checkout.await_authentication();
                tokio::pin!(resumed);
                tokio::select! {
                    outcome = &mut resumed => outcome?,
                    login = session.login(&credentials) => {
                        login?;
                        resumed.await?
                    }
                }
            }
            None => {
                warn!("Checkout needs a logged-in session");
                println!("Log in first (cw login) or pass --username and --password");
                return Ok(());
            }
        },
        other => other,
    };

    match outcome {
        CheckoutOutcome::Placed(receipt) => {
            println!("Order placed at {}", receipt.submitted_at.to_rfc3339());
            if !receipt.body.is_null() {
                println!("{}", receipt.body);
            }
        }
        CheckoutOutcome::Ignored => println!("Cart is empty, nothing to order"),
        CheckoutOutcome::LoginRequired => println!("Login required"),
    }
    Ok(())
}
