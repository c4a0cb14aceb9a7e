//! ecomm CLI - shop against the ecomm REST API from a terminal.
//!
//! # Usage
//!
//! ```bash
//! # Browse the catalogue (no login needed)
//! ecomm products list
//! ecomm products search mug
//!
//! # Cart operations sign in with ECOMM_EMAIL / ECOMM_PASSWORD or ECOMM_TOKEN
//! ecomm cart add P1 -q 2
//! ecomm cart buy P9 --atomic
//! ecomm cart show
//!
//! # Place the order, delivering to the second saved address
//! ecomm checkout --address 2
//! ```
//!
//! # Commands
//!
//! - `products` - List, show and search products
//! - `cart` - Show and edit the cart, or buy a single product now
//! - `checkout` - Review the cart total and place the order
//! - `orders` - Order history
//! - `addresses` - Manage saved delivery addresses
//! - `login` - Check credentials and print a reusable token

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ecomm_client::ClientConfig;

mod commands;

use commands::{CliError, Context, Credentials};

#[derive(Parser)]
#[command(name = "ecomm")]
#[command(author, version, about = "ecomm shopper CLI")]
struct Cli {
    /// Base URL of the REST API (overrides `ECOMM_API_URL`)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(flatten)]
    credentials: CredentialArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CredentialArgs {
    /// Account email
    #[arg(long, global = true, env = "ECOMM_EMAIL")]
    email: Option<String>,

    /// Account password
    #[arg(long, global = true, env = "ECOMM_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Reuse a token from `ecomm login` instead of signing in
    #[arg(long, global = true, env = "ECOMM_TOKEN", hide_env_values = true)]
    token: Option<String>,
}

impl From<CredentialArgs> for Credentials {
    fn from(args: CredentialArgs) -> Self {
        Self::new(args.email, args.password, args.token)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Browse the product catalogue
    Products {
        #[command(subcommand)]
        action: ProductsAction,
    },
    /// Show or change the cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Review the cart and place the order
    Checkout {
        /// Deliver to the Nth saved address (1-based; default: the first)
        #[arg(short, long)]
        address: Option<usize>,

        /// Only show the summary, do not place the order
        #[arg(long)]
        dry_run: bool,
    },
    /// Order history
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
    /// Manage saved addresses
    Addresses {
        #[command(subcommand)]
        action: AddressesAction,
    },
    /// Sign in and print the session token
    Login,
}

#[derive(Subcommand)]
enum ProductsAction {
    /// List every product
    List,
    /// Show one product
    Show { id: String },
    /// Search products by name
    Search { query: String },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart and its total
    Show,
    /// Add a product
    Add {
        product: String,
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,
    },
    /// Set the quantity of a cart line
    Update { item: String, quantity: u32 },
    /// Remove a cart line
    Remove { item: String },
    /// Empty the cart
    Clear,
    /// Replace the cart with a single product
    Buy {
        product: String,
        #[arg(short, long, default_value_t = 1)]
        quantity: u32,

        /// Use the server's single-call instant buy
        #[arg(long)]
        atomic: bool,
    },
}

#[derive(Subcommand)]
enum OrdersAction {
    /// List past orders
    List,
    /// Show one order
    Show { id: String },
}

#[derive(Subcommand)]
enum AddressesAction {
    /// List saved addresses
    List,
    /// Save a new address
    Add {
        #[arg(long)]
        house: String,
        #[arg(long)]
        street: String,
        #[arg(long)]
        city: String,
        #[arg(long)]
        postal_code: String,
    },
    /// Delete a saved address
    Remove { id: String },
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    // Defaults to info level for our crates if RUST_LOG is not set
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ecomm_cli=info,ecomm_client=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env before clap reads its env fallbacks
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            init_tracing();
            tracing::error!("Invalid configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);
    init_tracing();

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Command failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: ClientConfig) -> Result<(), CliError> {
    let config = match cli.api_url.as_deref() {
        Some(url) => config.with_api_url(url)?,
        None => config,
    };
    let ctx = Context::new(&config, cli.credentials.into())?;

    match cli.command {
        Commands::Products { action } => match action {
            ProductsAction::List => commands::products::list(&ctx).await?,
            ProductsAction::Show { id } => commands::products::show(&ctx, &id).await?,
            ProductsAction::Search { query } => commands::products::search(&ctx, &query).await?,
        },
        Commands::Cart { action } => {
            ctx.sign_in().await?;
            match action {
                CartAction::Show => commands::cart::show(&ctx).await,
                CartAction::Add { product, quantity } => {
                    commands::cart::add(&ctx, &product, quantity).await?;
                }
                CartAction::Update { item, quantity } => {
                    commands::cart::update(&ctx, &item, quantity).await?;
                }
                CartAction::Remove { item } => commands::cart::remove(&ctx, &item).await?,
                CartAction::Clear => commands::cart::clear(&ctx).await?,
                CartAction::Buy {
                    product,
                    quantity,
                    atomic,
                } => commands::cart::buy(&ctx, &product, quantity, atomic).await?,
            }
        }
        Commands::Checkout { address, dry_run } => {
            ctx.sign_in().await?;
            commands::checkout::run(&ctx, address, dry_run).await?;
        }
        Commands::Orders { action } => {
            ctx.sign_in().await?;
            match action {
                OrdersAction::List => commands::orders::list(&ctx).await?,
                OrdersAction::Show { id } => commands::orders::show(&ctx, &id).await?,
            }
        }
        Commands::Addresses { action } => {
            ctx.sign_in().await?;
            match action {
                AddressesAction::List => commands::addresses::list(&ctx).await?,
                AddressesAction::Add {
                    house,
                    street,
                    city,
                    postal_code,
                } => commands::addresses::add(&ctx, &house, &street, &city, &postal_code).await?,
                AddressesAction::Remove { id } => commands::addresses::remove(&ctx, &id).await?,
            }
        }
        Commands::Login => commands::login(&ctx).await?,
    }
    Ok(())
}
