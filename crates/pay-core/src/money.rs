//! # Money Types
//!
//! Currency and price types for offsite-pay.
//! Amounts are held in the smallest currency unit (cents for EUR/USD)
//! so every guard in the payment state machine is exact integer
//! arithmetic, never floating point.

use serde::{Deserialize, Serialize};

/// Supported currencies (ISO 4217)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    USD,
    EUR,
    GBP,
    JPY,
    CAD,
    AUD,
    CHF,
    MXN,
}

impl Currency {
    /// Returns the ISO 4217 currency code as the gateway sends it
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::JPY => "JPY",
            Currency::CAD => "CAD",
            Currency::AUD => "AUD",
            Currency::CHF => "CHF",
            Currency::MXN => "MXN",
        }
    }

    /// Parse a currency code, case-insensitive
    pub fn parse(code: &str) -> Option<Self> {
        match code.to_uppercase().as_str() {
            "USD" => Some(Currency::USD),
            "EUR" => Some(Currency::EUR),
            "GBP" => Some(Currency::GBP),
            "JPY" => Some(Currency::JPY),
            "CAD" => Some(Currency::CAD),
            "AUD" => Some(Currency::AUD),
            "CHF" => Some(Currency::CHF),
            "MXN" => Some(Currency::MXN),
            _ => None,
        }
    }

    /// Returns the number of decimal places for this currency
    /// (JPY has 0 decimals, most others have 2)
    pub fn decimal_places(&self) -> u8 {
        match self {
            Currency::JPY => 0,
            _ => 2,
        }
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::USD
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Price with amount in smallest currency unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in smallest currency unit (cents for EUR)
    pub amount: i64,
    /// Currency
    pub currency: Currency,
}

impl Price {
    /// Create a price from the smallest unit (cents)
    pub fn from_minor(amount: i64, currency: Currency) -> Self {
        Self { amount, currency }
    }

    /// Parse a major-unit decimal string (e.g. `"60.00"`) into a price.
    ///
    /// The gateway reports `capture_amount` in major units as a decimal
    /// string; this converts it exactly, digit by digit, so `"100.00"`
    /// always becomes `10000` minor units. Returns `None` for negative,
    /// empty, or malformed input and for more fractional digits than
    /// the currency carries.
    pub fn parse_major(s: &str, currency: Currency) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() || s.starts_with('-') || s.starts_with('+') {
            return None;
        }

        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };

        let places = currency.decimal_places() as usize;
        if frac_part.len() > places {
            return None;
        }
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }

        let units: i64 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().ok()?
        };

        let mut frac = frac_part.to_string();
        while frac.len() < places {
            frac.push('0');
        }
        let frac_units: i64 = if frac.is_empty() { 0 } else { frac.parse().ok()? };

        let scale = 10_i64.checked_pow(places as u32)?;
        let amount = units.checked_mul(scale)?.checked_add(frac_units)?;

        Some(Self { amount, currency })
    }

    /// Get the decimal amount (display only, never used in guards)
    pub fn as_decimal(&self) -> f64 {
        let divisor = 10_f64.powi(self.currency.decimal_places() as i32);
        self.amount as f64 / divisor
    }

    /// Format for display (e.g., "100.00 EUR")
    pub fn display(&self) -> String {
        if self.currency.decimal_places() == 0 {
            format!("{} {}", self.amount, self.currency)
        } else {
            format!("{:.2} {}", self.as_decimal(), self.currency)
        }
    }

    /// Checked addition; `None` on currency mismatch or overflow
    pub fn checked_add(&self, other: &Price) -> Option<Price> {
        if self.currency != other.currency {
            return None;
        }
        Some(Price {
            amount: self.amount.checked_add(other.amount)?,
            currency: self.currency,
        })
    }
}
