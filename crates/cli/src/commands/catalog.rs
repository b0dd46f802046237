//! Catalog, cart and wishlist commands.

use std::io::Write;

use harvest_market_client::Marketplace;
use harvest_market_client::api::ProductQuery;
use harvest_market_client::cart::Cart;
use harvest_market_client::wishlist::Wishlist;
use harvest_market_core::{CatalogId, ProductId};

use super::CliError;

/// List catalog products matching `query`.
///
/// # Errors
///
/// Returns an error if the backend request fails.
pub async fn list(market: &Marketplace, query: &ProductQuery) -> Result<(), CliError> {
    let listing = market.api().list_products(query).await?;

    let mut out = std::io::stdout().lock();
    if listing.data.is_empty() {
        writeln!(out, "No products found")?;
        return Ok(());
    }
    for product in &listing.data {
        let stock = if product.is_available() {
            format!("{} in stock", product.stock_quantity)
        } else {
            "unavailable".to_string()
        };
        writeln!(
            out,
            "{:>6}  {:<32}  {:>10}  {:<12}  {stock}",
            product.id, product.name, product.price, product.category
        )?;
    }
    let page = listing.pagination;
    if page.total_pages > 1 {
        writeln!(
            out,
            "Page {} of {} ({} products)",
            page.page, page.total_pages, page.total_items
        )?;
    }
    Ok(())
}

/// Show one product.
///
/// # Errors
///
/// Returns an error if the product cannot be fetched.
pub async fn show(market: &Marketplace, id: i64) -> Result<(), CliError> {
    let product = market.api().product(CatalogId::new(id)).await?;

    let mut out = std::io::stdout().lock();
    writeln!(out, "{product}")?;
    if !product.category.is_empty() {
        writeln!(out, "Category: {}", product.category)?;
    }
    writeln!(
        out,
        "Stock:    {}{}",
        product.stock_quantity,
        if product.is_active { "" } else { " (inactive)" }
    )?;
    if !product.description.is_empty() {
        writeln!(out)?;
        writeln!(out, "{}", product.description)?;
    }
    for url in &product.images_urls {
        writeln!(out, "Image:    {url}")?;
    }
    Ok(())
}

/// Print the cart.
///
/// # Errors
///
/// Returns an error if output cannot be written.
pub fn show_cart(market: &Marketplace) -> Result<(), CliError> {
    print_cart(&market.cart().current())
}

/// Fetch a product and add one unit of it to the cart.
///
/// # Errors
///
/// Returns an error if the product cannot be fetched.
pub async fn add_to_cart(market: &Marketplace, id: i64) -> Result<(), CliError> {
    let product = market.api().product(CatalogId::new(id)).await?;
    if !product.is_available() {
        tracing::warn!(product = %product.id, "Product is currently unavailable");
    }
    let cart = market.add_to_cart(&product);
    tracing::info!(product = %product.name, "Added to cart");
    print_cart(&cart)
}

/// Remove a cart line.
///
/// # Errors
///
/// Returns an error if the line is not in the cart.
pub fn remove_from_cart(market: &Marketplace, id: &str) -> Result<(), CliError> {
    let id = cart_line(market, id)?;
    print_cart(&market.cart().remove_item(id))
}

/// Set the quantity of a cart line.
///
/// # Errors
///
/// Returns an error if the line is not in the cart.
pub fn set_quantity(market: &Marketplace, id: &str, quantity: u32) -> Result<(), CliError> {
    let id = cart_line(market, id)?;
    print_cart(&market.cart().update_quantity(id, quantity))
}

/// Empty the cart.
///
/// # Errors
///
/// Returns an error if output cannot be written.
pub fn clear_cart(market: &Marketplace) -> Result<(), CliError> {
    print_cart(&market.cart().reset())
}

/// Print the wishlist.
///
/// # Errors
///
/// Returns an error if output cannot be written.
pub fn show_wishlist(market: &Marketplace) -> Result<(), CliError> {
    print_wishlist(&market.wishlist().current())
}

/// Fetch a product and save it to the wishlist.
///
/// # Errors
///
/// Returns an error if the product cannot be fetched.
pub async fn save_for_later(market: &Marketplace, id: i64) -> Result<(), CliError> {
    let product = market.api().product(CatalogId::new(id)).await?;
    print_wishlist(&market.save_for_later(&product))
}

/// Forget a saved product.
///
/// # Errors
///
/// Returns an error if the product is not saved.
pub fn forget(market: &Marketplace, id: &str) -> Result<(), CliError> {
    let id = ProductId::new(id);
    if !market.wishlist().current().contains(&id) {
        return Err(CliError::NotSaved(id.into_inner(), "wishlist"));
    }
    print_wishlist(&market.wishlist().remove(id))
}

/// Move a saved product into the cart.
///
/// # Errors
///
/// Returns an error if the product is not saved.
pub fn move_to_cart(market: &Marketplace, id: &str) -> Result<(), CliError> {
    let saved = market
        .wishlist()
        .current()
        .items()
        .iter()
        .find(|item| item.id.as_str() == id)
        .cloned()
        .ok_or_else(|| CliError::NotSaved(id.to_string(), "wishlist"))?;
    let cart = market
        .move_to_cart(&saved)
        .ok_or_else(|| CliError::NotSaved(id.to_string(), "wishlist"))?;
    print_cart(&cart)
}

/// Forget every saved product.
///
/// # Errors
///
/// Returns an error if output cannot be written.
pub fn clear_wishlist(market: &Marketplace) -> Result<(), CliError> {
    print_wishlist(&market.wishlist().clear())
}

fn cart_line(market: &Marketplace, id: &str) -> Result<ProductId, CliError> {
    let id = ProductId::new(id);
    if market.cart().current().get(&id).is_none() {
        return Err(CliError::NotSaved(id.into_inner(), "cart"));
    }
    Ok(id)
}

fn print_cart(cart: &Cart) -> Result<(), CliError> {
    let mut out = std::io::stdout().lock();
    if cart.is_empty() {
        writeln!(out, "Your cart is empty")?;
        return Ok(());
    }
    for item in cart.items() {
        writeln!(
            out,
            "{:>6}  {:<32}  {:>3} x {:>10}  = {:>10}",
            item.id,
            item.title,
            item.quantity,
            item.price,
            item.line_total()
        )?;
    }
    writeln!(
        out,
        "{} items, total {}",
        cart.total_items(),
        cart.total_price()
    )?;
    Ok(())
}

fn print_wishlist(wishlist: &Wishlist) -> Result<(), CliError> {
    let mut out = std::io::stdout().lock();
    if wishlist.is_empty() {
        writeln!(out, "Your wishlist is empty")?;
        return Ok(());
    }
    for item in wishlist.items() {
        writeln!(out, "{:>6}  {:<32}  {:>10}", item.id, item.title, item.price)?;
    }
    Ok(())
}
