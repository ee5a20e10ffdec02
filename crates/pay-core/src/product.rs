//! # Product Types
//!
//! Currencies and the locally persisted product catalog.
//! Every product mirrors a gateway product with a single one-time price.

use crate::error::PaymentError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Supported currencies (ISO 4217)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
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
    /// Returns the lowercase ISO 4217 currency code (the form the gateway expects)
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::USD => "usd",
            Currency::EUR => "eur",
            Currency::GBP => "gbp",
            Currency::JPY => "jpy",
            Currency::CAD => "cad",
            Currency::AUD => "aud",
            Currency::CHF => "chf",
            Currency::MXN => "mxn",
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

    /// Convert a decimal amount to the smallest currency unit (cents, etc.)
    pub fn to_smallest_unit(&self, amount: f64) -> i64 {
        let multiplier = 10_f64.powi(self.decimal_places() as i32);
        (amount * multiplier).round() as i64
    }

    /// Convert from smallest unit back to decimal
    pub fn from_smallest_unit(&self, amount: i64) -> f64 {
        let divisor = 10_f64.powi(self.decimal_places() as i32);
        amount as f64 / divisor
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::USD
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str().to_uppercase())
    }
}

impl FromStr for Currency {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "usd" => Ok(Currency::USD),
            "eur" => Ok(Currency::EUR),
            "gbp" => Ok(Currency::GBP),
            "jpy" => Ok(Currency::JPY),
            "cad" => Ok(Currency::CAD),
            "aud" => Ok(Currency::AUD),
            "chf" => Ok(Currency::CHF),
            "mxn" => Ok(Currency::MXN),
            other => Err(PaymentError::UnsupportedCurrency {
                currency: other.to_string(),
            }),
        }
    }
}

/// Validate a decimal amount and convert it to the smallest currency unit.
pub fn amount_to_minor(amount: f64, currency: Currency) -> Result<i64, PaymentError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(PaymentError::InvalidAmount {
            message: format!("amount must be greater than zero, got {}", amount),
        });
    }
    let minor = currency.to_smallest_unit(amount);
    if minor <= 0 {
        return Err(PaymentError::InvalidAmount {
            message: format!("amount {} rounds to zero {}", amount, currency),
        });
    }
    Ok(minor)
}

/// A product in the local catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,

    /// Display name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Price in smallest currency unit
    pub price: i64,

    pub currency: Currency,

    /// Gateway product id (prod_...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stripe_product_id: Option<String>,

    /// Gateway price id (price_...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stripe_price_id: Option<String>,

    /// Whether this product is active and listed
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Price as a decimal amount
    pub fn price_decimal(&self) -> f64 {
        self.currency.from_smallest_unit(self.price)
    }
}

/// Input for inserting a product row
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub currency: Currency,
    pub stripe_product_id: Option<String>,
    pub stripe_price_id: Option<String>,
}

/// Partial update of local product fields
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// New price as a decimal amount in the product's currency
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

impl ProductUpdate {
    /// Validate against the product's currency and convert the price to
    /// minor units.
    pub fn into_changes(self, currency: Currency) -> Result<ProductChanges, PaymentError> {
        let price = self
            .price
            .map(|price| amount_to_minor(price, currency))
            .transpose()?;
        Ok(ProductChanges {
            name: self.name,
            description: self.description,
            price,
            is_active: self.is_active,
        })
    }
}

/// Validated product changes, as handed to the store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    /// Smallest currency unit, always > 0
    pub price: Option<i64>,
    pub is_active: Option<bool>,
}

impl ProductChanges {
    /// Apply the changes to an existing product in place
    pub fn apply(&self, product: &mut Product) {
        if let Some(name) = &self.name {
            product.name = name.clone();
        }
        if let Some(description) = &self.description {
            product.description = Some(description.clone());
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(active) = self.is_active {
            product.is_active = active;
        }
    }
}
