//! Checkout, order history and routing commands.

use std::io::Write;

use harvest_market_client::checkout::{PaymentDetails, ShippingAddress};
use harvest_market_client::orders::{Order, TrackQuery};
use harvest_market_client::routes::RouteDecision;
use harvest_market_client::{ApiError, Marketplace};
use harvest_market_core::RemoteOrderId;
use secrecy::SecretString;

use super::CliError;

/// Payment details as given on the command line.
pub enum Payment {
    MobileMoney {
        network: String,
        phone: String,
    },
    Card {
        number: String,
        name: String,
        expiry: String,
        cvv: String,
    },
}

impl From<Payment> for PaymentDetails {
    fn from(payment: Payment) -> Self {
        match payment {
            Payment::MobileMoney { network, phone } => Self::MobileMoney {
                network,
                phone_number: phone,
            },
            Payment::Card {
                number,
                name,
                expiry,
                cvv,
            } => Self::CreditCard {
                card_number: SecretString::from(number),
                card_name: name,
                expiry_date: expiry,
                cvv: SecretString::from(cvv),
            },
        }
    }
}

/// Optional shipping fields; the address is recorded only if any is set.
pub struct Shipping {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub country: Option<String>,
}

impl Shipping {
    fn into_address(self) -> Option<ShippingAddress> {
        let fields = [
            &self.first_name,
            &self.last_name,
            &self.address,
            &self.city,
            &self.state,
            &self.zip_code,
            &self.country,
        ];
        if fields.iter().all(|field| field.is_none()) {
            return None;
        }
        Some(ShippingAddress {
            first_name: self.first_name.unwrap_or_default(),
            last_name: self.last_name.unwrap_or_default(),
            address: self.address.unwrap_or_default(),
            city: self.city.unwrap_or_default(),
            state: self.state.unwrap_or_default(),
            zip_code: self.zip_code.unwrap_or_default(),
            country: self.country.unwrap_or_default(),
        })
    }
}

/// Place an order for the cart.
///
/// # Errors
///
/// Returns an error when not signed in, the cart is empty, payment details
/// are incomplete, or the order cannot be stored.
pub fn checkout(market: &Marketplace, shipping: Shipping, payment: Payment) -> Result<(), CliError> {
    let payment = PaymentDetails::from(payment);
    let order = market.checkout(shipping.into_address(), &payment)?;

    let mut out = std::io::stdout().lock();
    writeln!(out, "Order placed")?;
    print_order(&mut out, &order)?;
    Ok(())
}

/// List orders placed from this client.
///
/// # Errors
///
/// Returns an error if output cannot be written.
pub fn local(market: &Marketplace) -> Result<(), CliError> {
    let orders = market.orders().all();

    let mut out = std::io::stdout().lock();
    if orders.is_empty() {
        writeln!(out, "No orders yet")?;
        return Ok(());
    }
    for order in orders.iter().rev() {
        writeln!(
            out,
            "{}  {}  {}  {:>10}  {} items  {}",
            order.order_number,
            order.tracking_number,
            order.placed_at.format("%Y-%m-%d"),
            order.total,
            order.item_count(),
            order.status
        )?;
    }
    Ok(())
}

/// List the signed-in account's backend orders.
///
/// # Errors
///
/// Returns an error when not signed in or the request fails.
pub async fn remote(market: &Marketplace) -> Result<(), CliError> {
    require_session(market)?;
    let orders = signed_out_on_expiry(market, market.api().orders().await)?;

    let mut out = std::io::stdout().lock();
    if orders.is_empty() {
        writeln!(out, "No orders yet")?;
        return Ok(());
    }
    for order in &orders {
        writeln!(
            out,
            "{:>6}  {}  {}  {:>10.2}  {}",
            order.id,
            order.order_number,
            order.order_date.format("%Y-%m-%d"),
            order.total_amount,
            order.status.label()
        )?;
    }
    Ok(())
}

/// Show one backend order.
///
/// # Errors
///
/// Returns an error when not signed in or the request fails.
pub async fn remote_one(market: &Marketplace, id: i64) -> Result<(), CliError> {
    require_session(market)?;
    let order = signed_out_on_expiry(market, market.api().order(RemoteOrderId::new(id)).await)?;

    let mut out = std::io::stdout().lock();
    writeln!(
        out,
        "{} ({}) placed {}",
        order.order_number,
        order.status.label(),
        order.order_date.format("%Y-%m-%d %H:%M")
    )?;
    for line in &order.items {
        writeln!(
            out,
            "  {:>3} x {:<32}  {:>10.2}",
            line.quantity, line.product_name, line.unit_price
        )?;
    }
    writeln!(out, "Total: {:.2}", order.total_amount)?;
    Ok(())
}

/// Find a locally placed order by order or tracking number.
///
/// # Errors
///
/// Returns an error if neither reference is given or nothing matches.
pub fn track(
    market: &Marketplace,
    order_number: Option<String>,
    tracking_number: Option<String>,
) -> Result<(), CliError> {
    let order = market.track(&TrackQuery {
        order_number,
        tracking_number,
    })?;

    let mut out = std::io::stdout().lock();
    print_order(&mut out, &order)?;
    Ok(())
}

/// Show what `path` resolves to for the current session.
///
/// # Errors
///
/// Returns an error if output cannot be written.
pub fn route(market: &Marketplace, path: &str) -> Result<(), CliError> {
    let mut out = std::io::stdout().lock();
    match market.resolve_route(path) {
        RouteDecision::Render { page, params } => {
            write!(out, "{page:?}")?;
            for (name, value) in params {
                write!(out, " {name}={value}")?;
            }
            writeln!(out)?;
        }
        RouteDecision::Redirect { to, from } => {
            writeln!(out, "Redirect to {to} (return to {from} after sign-in)")?;
        }
        RouteDecision::NotFound => writeln!(out, "Not found")?,
    }
    Ok(())
}

fn require_session(market: &Marketplace) -> Result<(), CliError> {
    if market.session().is_authenticated() {
        Ok(())
    } else {
        Err(CliError::NotSignedIn)
    }
}

/// Sign out locally when the backend no longer accepts the session.
fn signed_out_on_expiry<T>(market: &Marketplace, result: Result<T, ApiError>) -> Result<T, CliError> {
    if let Err(ApiError::SessionExpired) = &result {
        market.logout();
    }
    Ok(result?)
}

fn print_order(out: &mut impl Write, order: &Order) -> Result<(), CliError> {
    writeln!(out, "Order number:       {}", order.order_number)?;
    writeln!(out, "Tracking number:    {}", order.tracking_number)?;
    writeln!(out, "Status:             {}", order.status)?;
    writeln!(out, "Placed:             {}", order.placed_at.format("%Y-%m-%d %H:%M"))?;
    writeln!(
        out,
        "Estimated delivery: {}",
        order.estimated_delivery.format("%Y-%m-%d")
    )?;
    writeln!(out, "Payment:            {}", order.payment_method)?;
    for line in &order.items {
        writeln!(out, "  {:>3} x {:<32}  {:>10}", line.quantity, line.name, line.price)?;
    }
    writeln!(out, "Total:              {}", order.total)?;
    Ok(())
}
