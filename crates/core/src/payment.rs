//! Payment instrument validation.
//!
//! Structural checks only: card numbers are not Luhn- or network-verified, and
//! IBANs are not checksum-verified. The payment processor does that when the
//! instrument is tokenized. Validation is fail-fast and reports the first
//! offending field.

use core::fmt;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::types::email::Email;

/// Minimum number of digits in a card number.
const MIN_CARD_DIGITS: usize = 13;
/// Minimum IBAN length once whitespace is removed.
const MIN_IBAN_LENGTH: usize = 15;
/// Minimum BIC length.
const MIN_BIC_LENGTH: usize = 8;

/// Supported instrument kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethodType {
    Card,
    Paypal,
    Sepa,
}

impl PaymentMethodType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Card => "card",
            Self::Paypal => "paypal",
            Self::Sepa => "sepa",
        }
    }
}

impl fmt::Display for PaymentMethodType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentMethodType {
    type Err = PaymentValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "card" => Ok(Self::Card),
            "paypal" => Ok(Self::Paypal),
            "sepa" => Ok(Self::Sepa),
            other => Err(PaymentValidationError::Unsupported(other.to_owned())),
        }
    }
}

/// Card network, derived from the leading digits for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardNetwork {
    Visa,
    Mastercard,
    Amex,
    Discover,
    Diners,
    Jcb,
    Unknown,
}

impl CardNetwork {
    /// Classify a digits-only card number by its IIN prefix.
    #[must_use]
    pub fn detect(digits: &str) -> Self {
        let d = digits.as_bytes();
        let at = |i: usize| d.get(i).copied().unwrap_or(b'x');
        let in_range = |i: usize, lo: u8, hi: u8| (lo..=hi).contains(&at(i));

        if at(0) == b'4' {
            Self::Visa
        } else if at(0) == b'5' && in_range(1, b'1', b'5') {
            Self::Mastercard
        } else if at(0) == b'3' && matches!(at(1), b'4' | b'7') {
            Self::Amex
        } else if digits.starts_with("6011")
            || (digits.starts_with("65") && at(2).is_ascii_digit() && at(3).is_ascii_digit())
        {
            Self::Discover
        } else if at(0) == b'3'
            && ((at(1) == b'0' && in_range(2, b'0', b'5'))
                || (matches!(at(1), b'6' | b'8') && at(2).is_ascii_digit()))
        {
            Self::Diners
        } else if digits.starts_with("2131")
            || digits.starts_with("1800")
            || (digits.starts_with("35") && (2..5).all(|i| at(i).is_ascii_digit()))
        {
            Self::Jcb
        } else {
            Self::Unknown
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Visa => "visa",
            Self::Mastercard => "mastercard",
            Self::Amex => "amex",
            Self::Discover => "discover",
            Self::Diners => "diners",
            Self::Jcb => "jcb",
            Self::Unknown => "unknown",
        }
    }
}

/// Raw payment method submission, as posted by the settings form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentMethodForm {
    #[serde(rename = "type")]
    pub method_type: String,
    pub card_number: Option<String>,
    pub card_name: Option<String>,
    pub card_expiry: Option<String>,
    pub card_cvv: Option<String>,
    pub paypal_email: Option<String>,
    pub sepa_name: Option<String>,
    pub sepa_iban: Option<String>,
    pub sepa_bic: Option<String>,
    #[serde(default)]
    pub sepa_mandate: bool,
    #[serde(default)]
    pub set_default: bool,
}

/// Validation failure for a payment submission.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PaymentValidationError {
    /// A field failed its structural check.
    #[error("{message}")]
    Field {
        field: &'static str,
        message: &'static str,
    },
    /// The instrument type is not supported.
    #[error("unsupported payment method: {0}")]
    Unsupported(String),
}

impl PaymentValidationError {
    const fn field(field: &'static str, message: &'static str) -> Self {
        Self::Field { field, message }
    }

    /// Name of the offending field, if the failure is field-specific.
    #[must_use]
    pub const fn field_name(&self) -> Option<&'static str> {
        match self {
            Self::Field { field, .. } => Some(field),
            Self::Unsupported(_) => None,
        }
    }
}

/// A structurally valid instrument, still carrying sensitive values.
///
/// Sensitive values are only ever handed to the payment processor; what gets
/// persisted is [`ValidatedInstrument::details`].
#[derive(Debug)]
pub enum ValidatedInstrument {
    Card {
        number: SecretString,
        cvv: SecretString,
        holder_name: String,
        expiry: String,
        network: CardNetwork,
        last4: String,
    },
    Paypal {
        email: Email,
    },
    Sepa {
        holder_name: String,
        iban: SecretString,
        iban_last4: String,
        bic: String,
    },
}

impl ValidatedInstrument {
    #[must_use]
    pub const fn method_type(&self) -> PaymentMethodType {
        match self {
            Self::Card { .. } => PaymentMethodType::Card,
            Self::Paypal { .. } => PaymentMethodType::Paypal,
            Self::Sepa { .. } => PaymentMethodType::Sepa,
        }
    }

    /// Display-safe details for persistence.
    #[must_use]
    pub fn details(&self) -> PaymentDetails {
        match self {
            Self::Card {
                holder_name,
                expiry,
                network,
                last4,
                ..
            } => PaymentDetails::Card {
                network: *network,
                last4: last4.clone(),
                expiry: expiry.clone(),
                holder_name: holder_name.clone(),
            },
            Self::Paypal { email } => PaymentDetails::Paypal {
                email: email.clone(),
            },
            Self::Sepa {
                holder_name,
                iban_last4,
                bic,
                ..
            } => PaymentDetails::Sepa {
                holder_name: holder_name.clone(),
                iban_last4: iban_last4.clone(),
                bic: bic.clone(),
            },
        }
    }
}

/// Persisted, display-only payment details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PaymentDetails {
    Card {
        network: CardNetwork,
        last4: String,
        expiry: String,
        holder_name: String,
    },
    Paypal {
        email: Email,
    },
    Sepa {
        holder_name: String,
        iban_last4: String,
        bic: String,
    },
}

impl PaymentDetails {
    #[must_use]
    pub const fn method_type(&self) -> PaymentMethodType {
        match self {
            Self::Card { .. } => PaymentMethodType::Card,
            Self::Paypal { .. } => PaymentMethodType::Paypal,
            Self::Sepa { .. } => PaymentMethodType::Sepa,
        }
    }
}

/// Validate a payment submission.
///
/// # Errors
///
/// Returns the first failing field, or [`PaymentValidationError::Unsupported`]
/// for an unknown type.
pub fn validate(form: &PaymentMethodForm) -> Result<ValidatedInstrument, PaymentValidationError> {
    match form.method_type.parse::<PaymentMethodType>()? {
        PaymentMethodType::Card => validate_card(form),
        PaymentMethodType::Paypal => validate_paypal(form),
        PaymentMethodType::Sepa => validate_sepa(form),
    }
}

fn validate_card(form: &PaymentMethodForm) -> Result<ValidatedInstrument, PaymentValidationError> {
    let digits: String = form
        .card_number
        .as_deref()
        .unwrap_or_default()
        .chars()
        .filter(char::is_ascii_digit)
        .collect();
    if digits.len() < MIN_CARD_DIGITS {
        return Err(PaymentValidationError::field(
            "card_number",
            "Please enter a valid card number.",
        ));
    }

    let holder_name = required(form.card_name.as_deref()).ok_or(PaymentValidationError::field(
        "card_name",
        "Please enter the name of the cardholder.",
    ))?;

    let expiry = form.card_expiry.as_deref().unwrap_or_default().trim();
    if !is_month_year(expiry) {
        return Err(PaymentValidationError::field(
            "card_expiry",
            "Please enter a valid expiry date (MM/YY).",
        ));
    }

    let cvv = form.card_cvv.as_deref().unwrap_or_default().trim();
    if !(3..=4).contains(&cvv.len()) || !cvv.chars().all(|c| c.is_ascii_digit()) {
        return Err(PaymentValidationError::field(
            "card_cvv",
            "Please enter a valid security code.",
        ));
    }

    let network = CardNetwork::detect(&digits);
    let last4 = tail(&digits, 4);

    Ok(ValidatedInstrument::Card {
        number: SecretString::from(digits),
        cvv: SecretString::from(cvv.to_owned()),
        holder_name,
        expiry: expiry.to_owned(),
        network,
        last4,
    })
}

fn validate_paypal(form: &PaymentMethodForm) -> Result<ValidatedInstrument, PaymentValidationError> {
    let email = Email::parse(form.paypal_email.as_deref().unwrap_or_default()).map_err(|_| {
        PaymentValidationError::field("paypal_email", "Please enter a valid PayPal email address.")
    })?;
    Ok(ValidatedInstrument::Paypal { email })
}

fn validate_sepa(form: &PaymentMethodForm) -> Result<ValidatedInstrument, PaymentValidationError> {
    let holder_name = required(form.sepa_name.as_deref()).ok_or(PaymentValidationError::field(
        "sepa_name",
        "Please enter the account holder.",
    ))?;

    let iban: String = form
        .sepa_iban
        .as_deref()
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if iban.len() < MIN_IBAN_LENGTH {
        return Err(PaymentValidationError::field(
            "sepa_iban",
            "Please enter a valid IBAN.",
        ));
    }

    let bic = form.sepa_bic.as_deref().unwrap_or_default().trim();
    if bic.len() < MIN_BIC_LENGTH {
        return Err(PaymentValidationError::field(
            "sepa_bic",
            "Please enter a valid BIC.",
        ));
    }

    if !form.sepa_mandate {
        return Err(PaymentValidationError::field(
            "sepa_mandate",
            "Please confirm the SEPA direct debit mandate.",
        ));
    }

    let iban = iban.to_ascii_uppercase();
    let iban_last4 = tail(&iban, 4);

    Ok(ValidatedInstrument::Sepa {
        holder_name,
        iban: SecretString::from(iban),
        iban_last4,
        bic: bic.to_ascii_uppercase(),
    })
}

fn required(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
}

/// `MM/YY`: two digits, a slash, two digits.
fn is_month_year(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() == 5
        && b.get(2) == Some(&b'/')
        && b.iter()
            .enumerate()
            .all(|(i, c)| i == 2 || c.is_ascii_digit())
}

fn tail(s: &str, n: usize) -> String {
    let skip = s.chars().count().saturating_sub(n);
    s.chars().skip(skip).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    fn card(number: &str) -> PaymentMethodForm {
        PaymentMethodForm {
            method_type: "card".to_owned(),
            card_number: Some(number.to_owned()),
            card_name: Some("Erika Mustermann".to_owned()),
            card_expiry: Some("12/27".to_owned()),
            card_cvv: Some("123".to_owned()),
            ..PaymentMethodForm::default()
        }
    }

    fn sepa() -> PaymentMethodForm {
        PaymentMethodForm {
            method_type: "sepa".to_owned(),
            sepa_name: Some("Erika Mustermann".to_owned()),
            sepa_iban: Some("DE89 3704 0044 0532 0130 00".to_owned()),
            sepa_bic: Some("COBADEFFXXX".to_owned()),
            sepa_mandate: true,
            ..PaymentMethodForm::default()
        }
    }

    #[test]
    fn test_valid_visa_card() {
        let validated = validate(&card("4111 1111 1111 1111")).unwrap();
        let ValidatedInstrument::Card {
            network,
            last4,
            number,
            ..
        } = &validated
        else {
            panic!("expected card");
        };
        assert_eq!(*network, CardNetwork::Visa);
        assert_eq!(last4, "1111");
        assert_eq!(number.expose_secret(), "4111111111111111");
    }

    #[test]
    fn test_short_card_number_names_the_field() {
        let err = validate(&card("1234")).unwrap_err();
        assert_eq!(err.field_name(), Some("card_number"));
    }

    #[test]
    fn test_card_checks_are_fail_fast_in_order() {
        let mut form = card("4111111111111111");
        form.card_name = Some("  ".to_owned());
        form.card_expiry = Some("1227".to_owned());
        assert_eq!(validate(&form).unwrap_err().field_name(), Some("card_name"));

        form.card_name = Some("E. M.".to_owned());
        assert_eq!(validate(&form).unwrap_err().field_name(), Some("card_expiry"));

        form.card_expiry = Some("12/27".to_owned());
        form.card_cvv = Some("12a".to_owned());
        assert_eq!(validate(&form).unwrap_err().field_name(), Some("card_cvv"));

        form.card_cvv = Some("1234".to_owned());
        assert!(validate(&form).is_ok());
    }

    #[test]
    fn test_network_detection() {
        assert_eq!(CardNetwork::detect("5500000000000004"), CardNetwork::Mastercard);
        assert_eq!(CardNetwork::detect("340000000000009"), CardNetwork::Amex);
        assert_eq!(CardNetwork::detect("6011000000000004"), CardNetwork::Discover);
        assert_eq!(CardNetwork::detect("6500000000000002"), CardNetwork::Discover);
        assert_eq!(CardNetwork::detect("30000000000004"), CardNetwork::Diners);
        assert_eq!(CardNetwork::detect("36000000000008"), CardNetwork::Diners);
        assert_eq!(CardNetwork::detect("3530111333300000"), CardNetwork::Jcb);
        assert_eq!(CardNetwork::detect("2131000000000008"), CardNetwork::Jcb);
        assert_eq!(CardNetwork::detect("5600000000000000"), CardNetwork::Unknown);
        assert_eq!(CardNetwork::detect("9999999999999"), CardNetwork::Unknown);
    }

    #[test]
    fn test_paypal_requires_valid_email() {
        let mut form = PaymentMethodForm {
            method_type: "paypal".to_owned(),
            paypal_email: Some("not-an-email".to_owned()),
            ..PaymentMethodForm::default()
        };
        assert_eq!(validate(&form).unwrap_err().field_name(), Some("paypal_email"));

        form.paypal_email = Some("buyer@paypal.example".to_owned());
        let details = validate(&form).unwrap().details();
        assert_eq!(details.method_type(), PaymentMethodType::Paypal);
    }

    #[test]
    fn test_sepa_without_mandate_fails() {
        let mut form = sepa();
        form.sepa_mandate = false;
        assert_eq!(validate(&form).unwrap_err().field_name(), Some("sepa_mandate"));
    }

    #[test]
    fn test_sepa_short_iban_and_bic() {
        let mut form = sepa();
        form.sepa_iban = Some("DE89 3704".to_owned());
        assert_eq!(validate(&form).unwrap_err().field_name(), Some("sepa_iban"));

        let mut form = sepa();
        form.sepa_bic = Some("COBA".to_owned());
        assert_eq!(validate(&form).unwrap_err().field_name(), Some("sepa_bic"));
    }

    #[test]
    fn test_sepa_details_mask_iban() {
        let details = validate(&sepa()).unwrap().details();
        assert_eq!(
            details,
            PaymentDetails::Sepa {
                holder_name: "Erika Mustermann".to_owned(),
                iban_last4: "3000".to_owned(),
                bic: "COBADEFFXXX".to_owned(),
            }
        );
    }

    #[test]
    fn test_unknown_type_is_unsupported() {
        let form = PaymentMethodForm {
            method_type: "bitcoin".to_owned(),
            ..PaymentMethodForm::default()
        };
        assert_eq!(
            validate(&form).unwrap_err(),
            PaymentValidationError::Unsupported("bitcoin".to_owned())
        );
    }

    #[test]
    fn test_card_details_never_carry_full_number() {
        let details = validate(&card("4111 1111 1111 1111")).unwrap().details();
        let json = serde_json::to_string(&details).unwrap();
        assert!(!json.contains("4111111111111111"));
        assert!(json.contains("\"type\":\"card\""));
        assert!(json.contains("\"last4\":\"1111\""));
    }
}
