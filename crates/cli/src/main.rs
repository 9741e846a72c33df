//! Cartwright CLI - drive the cart engine from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Browse the catalog
//! cw catalog list --search mate
//!
//! # Work the cart
//! cw cart add 12 --quantity 2
//! cw cart show
//!
//! # Check out, logging in on the way
//! cw checkout --shipping "Calle 1" --billing "Calle 1" -u ana -p secret
//! ```
//!
//! # Commands
//!
//! - `catalog list` - List a catalog page with remaining availability
//! - `cart` - Show, add, adjust, remove, clear
//! - `login` / `logout` - Manage the stored session
//! - `checkout` - Place an order for the cart

#![cfg_attr(not(test), forbid(unsafe_code))]

use cartwright_engine::EngineConfig;
use cartwright_engine::api::Credentials;
use cartwright_engine::checkout::CheckoutForm;
use cartwright_engine::telemetry;
use clap::{Parser, Subcommand};

mod commands;

use commands::Context;

#[derive(Parser)]
#[command(name = "cw")]
#[command(author, version, about = "Cartwright cart engine CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse the product catalog
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },
    /// Work with the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Log in and store the session
    Login {
        #[arg(short, long)]
        username: String,

        #[arg(short, long, env = "CARTWRIGHT_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Drop the stored session (the cart is kept)
    Logout,
    /// Place an order for the cart
    Checkout {
        #[arg(long)]
        shipping: String,

        /// Defaults to the shipping address
        #[arg(long)]
        billing: Option<String>,

        /// Log in with this username if no session is stored
        #[arg(short, long, requires = "password")]
        username: Option<String>,

        #[arg(short, long, env = "CARTWRIGHT_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
}

#[derive(Subcommand)]
enum CatalogAction {
    /// List one catalog page
    List {
        #[arg(short, long)]
        search: Option<String>,

        #[arg(long, default_value_t = 1)]
        page: u32,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Print the cart
    Show,
    /// Add a catalog product
    Add {
        product_id: String,

        /// Free-form quantity; clamped to available stock
        #[arg(short, long, default_value = "1")]
        quantity: String,
    },
    /// Change a line's quantity by a signed amount
    Inc {
        product_id: String,

        #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
        by: i64,
    },
    /// Decrease a line's quantity by one
    Dec { product_id: String },
    /// Remove a line
    Remove { product_id: String },
    /// Empty the cart
    Clear,
}

#[tokio::main]
async fn main() {
    let config = EngineConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = telemetry::init_sentry(&config);
    telemetry::init_tracing("cartwright_engine=warn,cartwright_cli=info", config.log_json);

    let cli = Cli::parse();
    let ctx = Context::open(config);

    let result: Result<(), Box<dyn std::error::Error>> = run(&ctx, cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(ctx: &Context, cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Catalog { action } => match action {
            CatalogAction::List { search, page } => {
                commands::catalog::list(ctx, search, page).await?;
            }
        },
        Commands::Cart { action } => match action {
            CartAction::Show => commands::cart::show(ctx),
            CartAction::Add {
                product_id,
                quantity,
            } => commands::cart::add(ctx, &product_id, &quantity).await?,
            CartAction::Inc { product_id, by } => {
                commands::cart::increment(ctx, &product_id, by)?;
            }
            CartAction::Dec { product_id } => commands::cart::increment(ctx, &product_id, -1)?,
            CartAction::Remove { product_id } => commands::cart::remove(ctx, &product_id)?,
            CartAction::Clear => commands::cart::clear(ctx)?,
        },
        Commands::Login { username, password } => {
            commands::session::login(ctx, &Credentials::new(username, password)).await?;
        }
        Commands::Logout => commands::session::logout(ctx)?,
        Commands::Checkout {
            shipping,
            billing,
            username,
            password,
        } => {
            let billing = billing.unwrap_or_else(|| shipping.clone());
            let credentials = username
                .zip(password)
                .map(|(username, password)| Credentials::new(username, password));
            commands::checkout::run(ctx, CheckoutForm::new(shipping, billing), credentials)
                .await?;
        }
    }
    Ok(())
}
