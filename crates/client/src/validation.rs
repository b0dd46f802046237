//! Local form validation.
//!
//! These checks run before anything is sent, and their errors are meant to be
//! shown next to the form rather than propagated.

use harvest_market_core::Email;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use crate::api::{NewCustomer, RegistrationAddress};

/// Minimum length of a new password.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Number of digits in a one-time code.
pub const OTP_LEN: usize = 6;

/// Input rejected before it reached the backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please fill all required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Please enter a valid email address.")]
    InvalidEmail,

    #[error("Passwords do not match.")]
    PasswordMismatch,

    #[error("Password must be at least {MIN_PASSWORD_LEN} characters")]
    PasswordTooShort,

    #[error("Enter the {OTP_LEN}-digit code")]
    InvalidOtp,
}

/// Sign-up form as entered.
#[derive(Debug, Clone)]
pub struct SignUpForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: SecretString,
    pub confirm_password: SecretString,
    pub phone_number: String,
    pub address: RegistrationAddress,
}

impl SignUpForm {
    /// Check the form and turn it into a registration payload.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::MissingFields` naming every empty required
    /// field, `InvalidEmail`, or `PasswordMismatch`.
    pub fn validate(self) -> Result<NewCustomer, ValidationError> {
        let missing = [
            ("first name", self.first_name.trim().is_empty()),
            ("last name", self.last_name.trim().is_empty()),
            ("email", self.email.trim().is_empty()),
            ("password", self.password.expose_secret().is_empty()),
            (
                "password confirmation",
                self.confirm_password.expose_secret().is_empty(),
            ),
        ]
        .into_iter()
        .filter_map(|(field, empty)| empty.then_some(field))
        .collect::<Vec<_>>();
        if !missing.is_empty() {
            return Err(ValidationError::MissingFields(missing));
        }

        let email = parse_email(&self.email)?;
        if self.password.expose_secret() != self.confirm_password.expose_secret() {
            return Err(ValidationError::PasswordMismatch);
        }

        Ok(NewCustomer {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email,
            password: self.password,
            phone_number: self.phone_number.trim().to_string(),
            address: self.address,
        })
    }
}

/// Check login input.
///
/// # Errors
///
/// Returns `ValidationError` for an empty or malformed email or an empty
/// password.
pub fn validate_login(email: &str, password: &SecretString) -> Result<Email, ValidationError> {
    let mut missing = Vec::new();
    if email.trim().is_empty() {
        missing.push("email");
    }
    if password.expose_secret().is_empty() {
        missing.push("password");
    }
    if !missing.is_empty() {
        return Err(ValidationError::MissingFields(missing));
    }
    parse_email(email)
}

/// Check a new password and its confirmation.
///
/// # Errors
///
/// Returns `PasswordMismatch` or `PasswordTooShort`.
pub fn validate_new_password(
    password: &SecretString,
    confirmation: &SecretString,
) -> Result<(), ValidationError> {
    if password.expose_secret() != confirmation.expose_secret() {
        return Err(ValidationError::PasswordMismatch);
    }
    if password.expose_secret().chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort);
    }
    Ok(())
}

/// Check a password change: the current password must be given and the new
/// one must pass [`validate_new_password`].
///
/// # Errors
///
/// Returns `MissingFields` when the current password is empty, otherwise the
/// errors of [`validate_new_password`].
pub fn validate_password_change(
    current: &SecretString,
    new: &SecretString,
    confirmation: &SecretString,
) -> Result<(), ValidationError> {
    if current.expose_secret().is_empty() {
        return Err(ValidationError::MissingFields(vec!["current password"]));
    }
    validate_new_password(new, confirmation)
}

/// Normalize a one-time code: surrounding whitespace is dropped and exactly
/// [`OTP_LEN`] ASCII digits must remain.
///
/// # Errors
///
/// Returns `ValidationError::InvalidOtp` otherwise.
pub fn validate_otp(code: &str) -> Result<String, ValidationError> {
    let code = code.trim();
    if code.len() == OTP_LEN && code.chars().all(|c| c.is_ascii_digit()) {
        Ok(code.to_string())
    } else {
        Err(ValidationError::InvalidOtp)
    }
}

fn parse_email(email: &str) -> Result<Email, ValidationError> {
    Email::parse(email).map_err(|_| ValidationError::InvalidEmail)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    fn form() -> SignUpForm {
        SignUpForm {
            first_name: "Ama".to_string(),
            last_name: "Mensah".to_string(),
            email: " ama@harvest.market ".to_string(),
            password: secret("maize-2024"),
            confirm_password: secret("maize-2024"),
            phone_number: "0241234567".to_string(),
            address: RegistrationAddress::default(),
        }
    }

    #[test]
    fn test_sign_up_form_valid() {
        let customer = form().validate().unwrap();
        assert_eq!(customer.email.as_str(), "ama@harvest.market");
        assert_eq!(customer.first_name, "Ama");
    }

    #[test]
    fn test_sign_up_form_missing_fields() {
        let mut incomplete = form();
        incomplete.first_name = "  ".to_string();
        incomplete.confirm_password = secret("");
        let err = incomplete.validate().unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingFields(vec!["first name", "password confirmation"])
        );
        assert_eq!(
            err.to_string(),
            "Please fill all required fields: first name, password confirmation"
        );
    }

    #[test]
    fn test_sign_up_form_password_mismatch() {
        let mut mismatched = form();
        mismatched.confirm_password = secret("maize-2025");
        let err = mismatched.validate().unwrap_err();
        assert_eq!(err, ValidationError::PasswordMismatch);
        assert_eq!(err.to_string(), "Passwords do not match.");
    }

    #[test]
    fn test_sign_up_form_bad_email() {
        let mut bad = form();
        bad.email = "ama.harvest.market".to_string();
        assert_eq!(bad.validate().unwrap_err(), ValidationError::InvalidEmail);
    }

    #[test]
    fn test_login_validation() {
        assert_eq!(
            validate_login(" Kofi@Harvest.Market", &secret("pw")).unwrap().as_str(),
            "kofi@harvest.market"
        );
        assert_eq!(
            validate_login("", &secret("")).unwrap_err(),
            ValidationError::MissingFields(vec!["email", "password"])
        );
        assert_eq!(
            validate_login("kofi", &secret("pw")).unwrap_err(),
            ValidationError::InvalidEmail
        );
    }

    #[test]
    fn test_new_password_rules() {
        assert!(validate_new_password(&secret("longenough"), &secret("longenough")).is_ok());
        assert_eq!(
            validate_new_password(&secret("short"), &secret("short")).unwrap_err(),
            ValidationError::PasswordTooShort
        );
        assert_eq!(
            validate_new_password(&secret("longenough"), &secret("longenougH")).unwrap_err(),
            ValidationError::PasswordMismatch
        );
        assert_eq!(
            validate_password_change(&secret(""), &secret("longenough"), &secret("longenough"))
                .unwrap_err(),
            ValidationError::MissingFields(vec!["current password"])
        );
    }

    #[test]
    fn test_otp_validation() {
        assert_eq!(validate_otp(" 123456 ").unwrap(), "123456");
        assert_eq!(validate_otp("12345").unwrap_err(), ValidationError::InvalidOtp);
        assert_eq!(validate_otp("12345a").unwrap_err(), ValidationError::InvalidOtp);
    }
}
