//! Harvest Market CLI - drive the marketplace client from a terminal.
//!
//! State (session, cart, wishlist, order history) is kept in the directory
//! named by `HARVEST_STORAGE_DIR`, so consecutive invocations behave like one
//! browsing session.
//!
//! # Usage
//!
//! ```bash
//! # Sign in (password may also come from HARVEST_PASSWORD)
//! hm-cli auth login -e kofi@example.com -p secret
//!
//! # Browse the catalog
//! hm-cli products list --category grains --sort-by price --sort-dir asc
//! hm-cli products show 12
//!
//! # Fill the cart and check out
//! hm-cli cart add 12
//! hm-cli checkout mobile-money --network MTN --phone 0241234567
//!
//! # Look up a placed order
//! hm-cli track --tracking TRK-AB12CD34
//! ```
//!
//! # Commands
//!
//! - `auth` - Sign in, sign out, register, password reset
//! - `products` - Browse the catalog
//! - `cart` / `wishlist` - Manage saved products
//! - `checkout` - Place an order for the cart
//! - `orders` / `track` - Placed orders
//! - `route` - Resolve a page path for the current session

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use harvest_market_client::api::{SortDirection, SortKey};
use harvest_market_client::{ClientConfig, Marketplace};
use rust_decimal::Decimal;
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "hm-cli")]
#[command(author, version, about = "Harvest Market marketplace client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in, sign out and manage credentials
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },
    /// Browse the product catalog
    Products {
        #[command(subcommand)]
        action: ProductAction,
    },
    /// Manage the shopping cart
    Cart {
        #[command(subcommand)]
        action: CartAction,
    },
    /// Manage saved products
    Wishlist {
        #[command(subcommand)]
        action: WishlistAction,
    },
    /// Place an order for the current cart
    Checkout {
        #[command(subcommand)]
        payment: PaymentArgs,

        /// Recipient first name
        #[arg(long)]
        first_name: Option<String>,

        /// Recipient last name
        #[arg(long)]
        last_name: Option<String>,

        /// Street address
        #[arg(long)]
        address: Option<String>,

        /// City
        #[arg(long)]
        city: Option<String>,

        /// Region or state
        #[arg(long)]
        state: Option<String>,

        /// Postal code
        #[arg(long)]
        zip_code: Option<String>,

        /// Country
        #[arg(long)]
        country: Option<String>,
    },
    /// List orders
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
    /// Find a locally placed order
    Track {
        /// Order number (e.g. ORD-123456)
        #[arg(short, long)]
        order: Option<String>,

        /// Tracking number (e.g. TRK-AB12CD34)
        #[arg(short, long)]
        tracking: Option<String>,
    },
    /// Show which page a path resolves to
    Route {
        /// Page path, e.g. /product/12
        path: String,
    },
}

#[derive(Subcommand)]
enum AuthAction {
    /// Sign in with email and password
    Login {
        #[arg(short, long)]
        email: String,

        #[arg(short, long, env = "HARVEST_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Sign out and clear local state
    Logout {
        /// Skip telling the backend
        #[arg(long)]
        local: bool,
    },
    /// Show the signed-in user, confirming the session with the backend
    Whoami,
    /// Create an account
    Register {
        #[arg(long)]
        first_name: String,

        #[arg(long)]
        last_name: String,

        #[arg(short, long)]
        email: String,

        #[arg(short, long, env = "HARVEST_PASSWORD", hide_env_values = true)]
        password: String,

        /// Repeat of the password
        #[arg(long, env = "HARVEST_PASSWORD_CONFIRM", hide_env_values = true)]
        confirm_password: String,

        #[arg(long)]
        phone: String,

        #[arg(long, default_value = "")]
        street: String,

        #[arg(long, default_value = "")]
        city: String,

        #[arg(long, default_value = "")]
        region: String,

        #[arg(long, default_value = "")]
        postal_code: String,

        #[arg(long, default_value = "")]
        country: String,
    },
    /// Confirm a one-time code sent to an email address or phone number
    VerifyOtp {
        /// Email address or phone number the code was sent to
        #[arg(long)]
        contact: String,

        #[arg(long)]
        otp: String,

        /// What the code confirms
        #[arg(long, default_value = "registration")]
        purpose: String,
    },
    /// Ask for a password reset code
    ResetRequest {
        #[arg(short, long)]
        email: String,
    },
    /// Set a new password using a reset code
    Reset {
        #[arg(short, long)]
        email: String,

        #[arg(long)]
        otp: String,

        #[arg(long, env = "HARVEST_NEW_PASSWORD", hide_env_values = true)]
        new_password: String,

        #[arg(long, env = "HARVEST_NEW_PASSWORD_CONFIRM", hide_env_values = true)]
        confirm_password: String,
    },
    /// Change the password of the signed-in account
    ChangePassword {
        #[arg(long, env = "HARVEST_PASSWORD", hide_env_values = true)]
        current_password: String,

        #[arg(long, env = "HARVEST_NEW_PASSWORD", hide_env_values = true)]
        new_password: String,

        #[arg(long, env = "HARVEST_NEW_PASSWORD_CONFIRM", hide_env_values = true)]
        confirm_password: String,
    },
}

#[derive(Subcommand)]
enum ProductAction {
    /// List catalog products
    List {
        #[arg(short, long)]
        category: Option<String>,

        #[arg(short, long)]
        search: Option<String>,

        #[arg(long)]
        min_price: Option<Decimal>,

        #[arg(long)]
        max_price: Option<Decimal>,

        /// Only active (true) or inactive (false) products
        #[arg(long)]
        active: Option<bool>,

        #[arg(long)]
        page: Option<u32>,

        #[arg(long)]
        limit: Option<u32>,

        /// name, price, createdAt or stockQuantity
        #[arg(long)]
        sort_by: Option<SortKey>,

        /// asc or desc
        #[arg(long)]
        sort_dir: Option<SortDirection>,
    },
    /// Show one product
    Show {
        /// Catalog id
        id: i64,
    },
}

#[derive(Subcommand)]
enum CartAction {
    /// Show the cart
    Show,
    /// Add one unit of a catalog product
    Add {
        /// Catalog id
        id: i64,
    },
    /// Remove a line
    Remove {
        /// Cart line id
        id: String,
    },
    /// Set the quantity of a line; 0 removes it
    Set {
        /// Cart line id
        id: String,
        quantity: u32,
    },
    /// Empty the cart
    Clear,
}

#[derive(Subcommand)]
enum WishlistAction {
    /// Show saved products
    Show,
    /// Save a catalog product
    Add {
        /// Catalog id
        id: i64,
    },
    /// Forget a saved product
    Remove {
        /// Saved product id
        id: String,
    },
    /// Move a saved product into the cart
    Move {
        /// Saved product id
        id: String,
    },
    /// Forget every saved product
    Clear,
}

#[derive(Subcommand)]
enum PaymentArgs {
    /// Pay with a mobile money wallet
    MobileMoney {
        /// Wallet network, e.g. MTN
        #[arg(long)]
        network: String,

        #[arg(long)]
        phone: String,
    },
    /// Pay with a credit card
    Card {
        #[arg(long, env = "HARVEST_CARD_NUMBER", hide_env_values = true)]
        number: String,

        /// Name on the card
        #[arg(long)]
        name: String,

        /// MM/YY
        #[arg(long)]
        expiry: String,

        #[arg(long, env = "HARVEST_CARD_CVV", hide_env_values = true)]
        cvv: String,
    },
}

#[derive(Subcommand)]
enum OrdersAction {
    /// Orders placed from this client
    Local,
    /// Orders recorded by the backend for the signed-in account
    Remote,
    /// One backend order
    Show {
        /// Backend order id
        id: i64,
    },
}

/// Initialize Sentry error tracking.
///
/// Returns a guard that must be kept alive for the duration of the program.
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

    if guard.is_enabled() {
        tracing::info!("Sentry initialized");
    }

    Some(guard)
}

/// Forward warnings and errors to Sentry as events, keep the rest as
/// breadcrumbs.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        tracing::Level::TRACE => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing_subscriber::fmt::init();
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    // Sentry must be initialized before the subscriber so the layer has a hub
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "harvest_market_client=info,hm_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli, config).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    let market = Marketplace::open(config)?;

    match cli.command {
        Commands::Auth { action } => run_auth(&market, action).await?,
        Commands::Products { action } => match action {
            ProductAction::List {
                category,
                search,
                min_price,
                max_price,
                active,
                page,
                limit,
                sort_by,
                sort_dir,
            } => {
                let query = harvest_market_client::api::ProductQuery {
                    category,
                    is_active: active,
                    min_price: min_price.map(Into::into),
                    max_price: max_price.map(Into::into),
                    search,
                    page,
                    limit,
                    sort_by,
                    sort_dir,
                };
                commands::catalog::list(&market, &query).await?;
            }
            ProductAction::Show { id } => commands::catalog::show(&market, id).await?,
        },
        Commands::Cart { action } => match action {
            CartAction::Show => commands::catalog::show_cart(&market)?,
            CartAction::Add { id } => commands::catalog::add_to_cart(&market, id).await?,
            CartAction::Remove { id } => commands::catalog::remove_from_cart(&market, &id)?,
            CartAction::Set { id, quantity } => {
                commands::catalog::set_quantity(&market, &id, quantity)?;
            }
            CartAction::Clear => commands::catalog::clear_cart(&market)?,
        },
        Commands::Wishlist { action } => match action {
            WishlistAction::Show => commands::catalog::show_wishlist(&market)?,
            WishlistAction::Add { id } => commands::catalog::save_for_later(&market, id).await?,
            WishlistAction::Remove { id } => commands::catalog::forget(&market, &id)?,
            WishlistAction::Move { id } => commands::catalog::move_to_cart(&market, &id)?,
            WishlistAction::Clear => commands::catalog::clear_wishlist(&market)?,
        },
        Commands::Checkout {
            payment,
            first_name,
            last_name,
            address,
            city,
            state,
            zip_code,
            country,
        } => {
            let payment = match payment {
                PaymentArgs::MobileMoney { network, phone } => {
                    commands::orders::Payment::MobileMoney { network, phone }
                }
                PaymentArgs::Card {
                    number,
                    name,
                    expiry,
                    cvv,
                } => commands::orders::Payment::Card {
                    number,
                    name,
                    expiry,
                    cvv,
                },
            };
            let shipping = commands::orders::Shipping {
                first_name,
                last_name,
                address,
                city,
                state,
                zip_code,
                country,
            };
            commands::orders::checkout(&market, shipping, payment)?;
        }
        Commands::Orders { action } => match action {
            OrdersAction::Local => commands::orders::local(&market)?,
            OrdersAction::Remote => commands::orders::remote(&market).await?,
            OrdersAction::Show { id } => commands::orders::remote_one(&market, id).await?,
        },
        Commands::Track { order, tracking } => {
            commands::orders::track(&market, order, tracking)?;
        }
        Commands::Route { path } => commands::orders::route(&market, &path)?,
    }
    Ok(())
}

async fn run_auth(market: &Marketplace, action: AuthAction) -> Result<(), commands::CliError> {
    match action {
        AuthAction::Login { email, password } => {
            commands::auth::login(market, &email, password).await
        }
        AuthAction::Logout { local } => {
            commands::auth::logout(market, local).await;
            Ok(())
        }
        AuthAction::Whoami => commands::auth::whoami(market).await,
        AuthAction::Register {
            first_name,
            last_name,
            email,
            password,
            confirm_password,
            phone,
            street,
            city,
            region,
            postal_code,
            country,
        } => {
            let form = harvest_market_client::validation::SignUpForm {
                first_name,
                last_name,
                email,
                password: password.into(),
                confirm_password: confirm_password.into(),
                phone_number: phone,
                address: harvest_market_client::api::RegistrationAddress {
                    street,
                    city,
                    region,
                    postal_code,
                    country,
                },
            };
            commands::auth::register(market, form).await
        }
        AuthAction::VerifyOtp {
            contact,
            otp,
            purpose,
        } => commands::auth::verify_otp(market, &contact, &otp, &purpose).await,
        AuthAction::ResetRequest { email } => {
            commands::auth::request_password_reset(market, &email).await
        }
        AuthAction::Reset {
            email,
            otp,
            new_password,
            confirm_password,
        } => {
            commands::auth::reset_password(market, &email, &otp, new_password, confirm_password)
                .await
        }
        AuthAction::ChangePassword {
            current_password,
            new_password,
            confirm_password,
        } => {
            commands::auth::change_password(
                market,
                current_password,
                new_password,
                confirm_password,
            )
            .await
        }
    }
}
