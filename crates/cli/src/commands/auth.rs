//! Sign-in and account commands.

use std::io::Write;

use harvest_market_client::Marketplace;
use harvest_market_client::validation::{
    SignUpForm, ValidationError, validate_new_password, validate_otp, validate_password_change,
};
use harvest_market_core::Email;
use secrecy::SecretString;

use super::CliError;

/// Sign in and store the session.
///
/// # Errors
///
/// Returns an error if validation fails or the backend refuses the sign-in.
pub async fn login(market: &Marketplace, email: &str, password: String) -> Result<(), CliError> {
    let password = SecretString::from(password);
    let user = market.login(email, &password).await?;

    let mut out = std::io::stdout().lock();
    writeln!(out, "Signed in as {} <{}>", user.display_name(), user.email)?;
    Ok(())
}

/// Sign out, telling the backend unless `local` is set.
pub async fn logout(market: &Marketplace, local: bool) {
    if local {
        market.logout();
    } else {
        market.revoke_and_logout().await;
    }
    tracing::info!("Signed out; cart and wishlist cleared");
}

/// Show the stored user after confirming the session with the backend.
///
/// # Errors
///
/// Returns an error if the backend cannot be reached.
pub async fn whoami(market: &Marketplace) -> Result<(), CliError> {
    let Some(profile) = market.verify_session().await? else {
        return Err(CliError::NotSignedIn);
    };

    let mut out = std::io::stdout().lock();
    writeln!(
        out,
        "{} {} <{}>",
        profile.first_name, profile.last_name, profile.email
    )?;
    if !profile.phone_number.is_empty() {
        writeln!(out, "Phone:    {}", profile.phone_number)?;
    }
    writeln!(
        out,
        "Verified: email {}, phone {}",
        yes_no(profile.is_email_verified),
        yes_no(profile.is_phone_verified)
    )?;
    if let Some(address) = profile.default_address() {
        writeln!(out, "Address:  {}", address.one_line())?;
    }
    if !profile.recent_orders.is_empty() {
        writeln!(out, "Recent orders:")?;
        for order in &profile.recent_orders {
            writeln!(
                out,
                "  {}  {}  {:.2}  {}",
                order.order_number,
                order.order_date.format("%Y-%m-%d"),
                order.total_amount,
                order.status.label()
            )?;
        }
    }
    Ok(())
}

/// Create an account.
///
/// # Errors
///
/// Returns an error if the form is invalid or the backend rejects it.
pub async fn register(market: &Marketplace, form: SignUpForm) -> Result<(), CliError> {
    let customer = market.register(form).await?;

    let mut out = std::io::stdout().lock();
    writeln!(
        out,
        "Account {} created for {}. Check your email for a verification code.",
        customer.id, customer.email
    )?;
    Ok(())
}

/// Confirm a one-time code.
///
/// # Errors
///
/// Returns an error if the code is malformed or rejected.
pub async fn verify_otp(
    market: &Marketplace,
    contact: &str,
    otp: &str,
    purpose: &str,
) -> Result<(), CliError> {
    let otp = validate_otp(otp)?;
    let response = market.api().verify_otp(contact.trim(), &otp, purpose).await?;

    let mut out = std::io::stdout().lock();
    writeln!(out, "{}", message_or(&response.message, "Code verified"))?;
    Ok(())
}

/// Ask the backend to send a password reset code.
///
/// # Errors
///
/// Returns an error if the email is invalid or the request fails.
pub async fn request_password_reset(market: &Marketplace, email: &str) -> Result<(), CliError> {
    let email = parse_email(email)?;
    let response = market.api().request_password_reset(&email).await?;

    let mut out = std::io::stdout().lock();
    writeln!(
        out,
        "{}",
        message_or(&response.message, "A reset code was sent to your email")
    )?;
    if let Some(expires_at) = response.expires_at {
        writeln!(out, "The code expires at {expires_at}")?;
    }
    Ok(())
}

/// Verify a reset code and set the new password in one go.
///
/// # Errors
///
/// Returns an error if input is invalid or either backend step fails.
pub async fn reset_password(
    market: &Marketplace,
    email: &str,
    otp: &str,
    new_password: String,
    confirm_password: String,
) -> Result<(), CliError> {
    let email = parse_email(email)?;
    let otp = validate_otp(otp)?;
    let new_password = SecretString::from(new_password);
    validate_new_password(&new_password, &SecretString::from(confirm_password))?;

    let issued = market.api().verify_reset_otp(&email, &otp).await?;
    let response = market
        .api()
        .reset_password(&issued.reset_token, &new_password)
        .await?;

    let mut out = std::io::stdout().lock();
    writeln!(
        out,
        "{}",
        message_or(&response.message, "Password reset. You can now sign in")
    )?;
    Ok(())
}

/// Change the signed-in account's password.
///
/// # Errors
///
/// Returns an error if input is invalid, the session is gone, or the backend
/// refuses the change.
pub async fn change_password(
    market: &Marketplace,
    current_password: String,
    new_password: String,
    confirm_password: String,
) -> Result<(), CliError> {
    if !market.session().is_authenticated() {
        return Err(CliError::NotSignedIn);
    }
    let current_password = SecretString::from(current_password);
    let new_password = SecretString::from(new_password);
    validate_password_change(
        &current_password,
        &new_password,
        &SecretString::from(confirm_password),
    )?;

    let response = market
        .api()
        .change_password(&current_password, &new_password)
        .await?;

    let mut out = std::io::stdout().lock();
    writeln!(out, "{}", message_or(&response.message, "Password changed"))?;
    Ok(())
}

fn parse_email(email: &str) -> Result<Email, CliError> {
    Email::parse(email.trim())
        .map_err(|_| ValidationError::InvalidEmail.into())
}

fn message_or<'a>(message: &'a str, fallback: &'a str) -> &'a str {
    if message.is_empty() { fallback } else { message }
}

const fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}
