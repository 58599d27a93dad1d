//! ============================================================================
//! Payment - Simulated membership checkout
//! ============================================================================
//! No card network is contacted. Card details are checked for shape only
//! (Luhn checksum, unexpired MM/YY, 3-4 digit CVC), then the processor waits
//! a fixed delay and issues a receipt.
//! ============================================================================

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::repository::random_token;

/// Annual hunter membership, in cents
pub const MEMBERSHIP_PRICE_CENTS: u32 = 6000;

/// Simulated processing time of a charge
pub const DEFAULT_PAYMENT_DELAY: Duration = Duration::from_millis(2500);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymentError {
    #[error("Card number is invalid")]
    InvalidCardNumber,

    #[error("Expiry must be MM/YY: {0}")]
    InvalidExpiry(String),

    #[error("Card expired at the end of {0}")]
    CardExpired(String),

    #[error("Security code must be 3 or 4 digits")]
    InvalidCvc,
}

/// Card details as typed into the checkout form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardDetails {
    pub number: String,
    /// `MM/YY` or `MM / YY`
    pub expiry: String,
    pub cvc: String,
}

impl CardDetails {
    pub fn new(number: &str, expiry: &str, cvc: &str) -> Self {
        Self {
            number: number.to_string(),
            expiry: expiry.to_string(),
            cvc: cvc.to_string(),
        }
    }

    /// Last four digits, for receipts
    pub fn last4(&self) -> String {
        let digits: Vec<char> = self.number.chars().filter(char::is_ascii_digit).collect();
        digits[digits.len().saturating_sub(4)..].iter().collect()
    }

    pub fn validate(&self, today: NaiveDate) -> Result<(), PaymentError> {
        if !luhn_valid(&self.number) {
            return Err(PaymentError::InvalidCardNumber);
        }

        let (month, year) = parse_expiry(&self.expiry)?;
        if (year, month) < (today.year(), today.month()) {
            return Err(PaymentError::CardExpired(format!("{:02}/{}", month, year)));
        }

        let cvc = self.cvc.trim();
        if !(3..=4).contains(&cvc.len()) || !cvc.chars().all(|c| c.is_ascii_digit()) {
            return Err(PaymentError::InvalidCvc);
        }
        Ok(())
    }
}

/// Luhn checksum over the digits; spaces and dashes are ignored
pub fn luhn_valid(number: &str) -> bool {
    let cleaned: String = number.chars().filter(|c| *c != ' ' && *c != '-').collect();
    if !(12..=19).contains(&cleaned.len()) {
        return false;
    }

    let mut sum = 0;
    for (i, c) in cleaned.chars().rev().enumerate() {
        let Some(mut digit) = c.to_digit(10) else {
            return false;
        };
        if i % 2 == 1 {
            digit *= 2;
            if digit > 9 {
                digit -= 9;
            }
        }
        sum += digit;
    }
    sum % 10 == 0
}

fn parse_expiry(raw: &str) -> Result<(u32, i32), PaymentError> {
    let invalid = || PaymentError::InvalidExpiry(raw.to_string());
    let (month, year) = raw.split_once('/').ok_or_else(invalid)?;
    let month: u32 = month.trim().parse().map_err(|_| invalid())?;
    let year = year.trim();
    if year.len() != 2 || !(1..=12).contains(&month) {
        return Err(invalid());
    }
    let year: i32 = year.parse().map_err(|_| invalid())?;
    Ok((month, 2000 + year))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub reference: String,
    pub amount_cents: u32,
    pub currency: String,
    pub card_last4: String,
    pub paid_at: DateTime<Utc>,
}

/// Stand-in for a card processor
#[derive(Debug, Clone)]
pub struct MockPaymentProcessor {
    delay: Duration,
}

impl Default for MockPaymentProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_PAYMENT_DELAY)
    }
}

impl MockPaymentProcessor {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// Validate the card, wait out the processing delay, and issue a receipt
    pub async fn charge(
        &self,
        card: &CardDetails,
        amount_cents: u32,
    ) -> Result<PaymentReceipt, PaymentError> {
        card.validate(Utc::now().date_naive())?;

        debug!("Processing simulated charge of {} cents", amount_cents);
        tokio::time::sleep(self.delay).await;

        let receipt = PaymentReceipt {
            reference: format!("pay_{}", random_token(14)),
            amount_cents,
            currency: "USD".to_string(),
            card_last4: card.last4(),
            paid_at: Utc::now(),
        };
        info!(
            "Simulated charge {} succeeded: ${}.{:02}",
            receipt.reference,
            amount_cents / 100,
            amount_cents % 100
        );
        Ok(receipt)
    }
}
