//! Amount type for handling monetary values with optional euro signs.
//!
//! This module provides the `Amount` type which wraps `Decimal` and handles
//! parsing values that may or may not include a euro sign and thousands
//! separators, as they appear in ledger exports.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

/// Represents how euro amounts were (or should be) formatted.
///
/// # Examples
///  - `AmountFormat{ euro: true, commas: true }` -> `-€60,000.00`
///  - `AmountFormat{ euro: false, commas: true }` -> `-60,000.00`
///  - `AmountFormat{ euro: false, commas: false }` -> `-60000.00`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AmountFormat {
    /// Whether a euro sign is present in the formatting.
    euro: bool,
    /// Whether commas are present as thousands separators in the formatting.
    commas: bool,
}

impl Default for AmountFormat {
    fn default() -> Self {
        DEFAULT_FORMAT
    }
}

/// The default format has no euro sign and no separators: e.g. `-60000.00`.
/// Ledger exports carry plain decimal strings; the decorated forms only show
/// up in accountant-provided spreadsheets.
const DEFAULT_FORMAT: AmountFormat = AmountFormat {
    euro: false,
    commas: false,
};

/// Represents a euro amount.
///
/// This type wraps `Decimal` and provides custom serialization/deserialization
/// to handle amounts that may be formatted with or without euro signs or
/// thousands separators.
///
/// Formatting is not significant for equality: two amounts compare equal when
/// their numeric values are equal, regardless of how they were written.
#[derive(Debug, Clone, Copy, Default)]
pub struct Amount {
    /// The parsed numerical value.
    value: Decimal,
    /// The way the numerical value was parsed from, or should be written to, a `String`.
    format: AmountFormat,
}

impl Amount {
    /// Creates a new Amount from a Decimal value with default `String` formatting.
    pub const fn new(value: Decimal) -> Self {
        Self {
            value,
            format: DEFAULT_FORMAT,
        }
    }

    /// An amount of zero.
    pub const ZERO: Amount = Amount::new(Decimal::ZERO);

    /// Returns the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.value
    }

    /// Returns the absolute value as a new Amount.
    pub fn abs(&self) -> Amount {
        Amount::new(self.value.abs())
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.value().is_zero()
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.value().is_sign_positive()
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.value().is_sign_negative()
    }
}

impl PartialEq for Amount {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for Amount {}

impl PartialOrd for Amount {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Amount {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.value.cmp(&other.value)
    }
}

/// An error that can occur when parsing strings into `Decimal` values.
pub struct AmountError(rust_decimal::Error);

impl Debug for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl Display for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl std::error::Error for AmountError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut euro_sign = false;

        let trimmed = s.trim();

        // An empty string parses as zero, which is how empty spreadsheet
        // cells arrive.
        if trimmed.is_empty() {
            return Ok(Amount::default());
        }

        // Remove the euro sign if present, in either "-€50.00" or "€-50.00"
        // position.
        let without_euro = if let Some(after_minus) = trimmed.strip_prefix('-') {
            if let Some(after_euro) = after_minus.strip_prefix('€') {
                euro_sign = true;
                format!("-{after_euro}")
            } else {
                trimmed.to_string()
            }
        } else if let Some(after_euro) = trimmed.strip_prefix('€') {
            euro_sign = true;
            after_euro.to_string()
        } else {
            trimmed.to_string()
        };

        // Remove commas (thousands separators)
        let without_commas = without_euro.replace(',', "");
        let commas = without_commas.len() < without_euro.len();

        let value = Decimal::from_str(&without_commas).map_err(AmountError)?;
        Ok(Amount {
            value,
            format: AmountFormat {
                euro: euro_sign,
                commas,
            },
        })
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (sign, num) = if self.is_negative() {
            (String::from("-"), self.value().abs())
        } else {
            (String::new(), self.value())
        };

        let sym = if self.format.euro {
            String::from("€")
        } else {
            String::new()
        };

        if self.format.commas {
            write!(
                f,
                "{sign}{sym}{}",
                format_num::format_num!(",.2", num.to_f64().unwrap_or_default())
            )
        } else {
            write!(f, "{sign}{sym}{num}")
        }
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Amount::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.value()
    }
}
