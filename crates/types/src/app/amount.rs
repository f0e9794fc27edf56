// Path: crates/types/src/app/amount.rs
//! The `Amount` type: native drops or an issued-currency value.

use super::{Address, Drops, NATIVE_CURRENCY};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An amount of value on the ledger.
///
/// Native amounts are fixed-point integers (drops, 10⁶ per NXF) so that
/// arithmetic is exact and every node computes identical balances. Issued
/// amounts carry their currency code and issuer and use decimal arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Amount {
    /// Native NXF, denominated in drops.
    Drops(Drops),
    /// An issued (IOU) amount on a trust line.
    Issued {
        /// Currency code, e.g. `"USD"`.
        currency: String,
        /// The issuing account.
        issuer: Address,
        /// The decimal value.
        value: Decimal,
    },
}

impl Amount {
    /// True for native NXF amounts.
    pub fn is_native(&self) -> bool {
        matches!(self, Amount::Drops(_))
    }

    /// The native drops value, if this is a native amount.
    pub fn native(&self) -> Option<Drops> {
        match self {
            Amount::Drops(d) => Some(*d),
            Amount::Issued { .. } => None,
        }
    }

    /// The `(currency, issuer, value)` triple, if this is an issued amount.
    pub fn issued(&self) -> Option<(&str, &str, Decimal)> {
        match self {
            Amount::Drops(_) => None,
            Amount::Issued {
                currency,
                issuer,
                value,
            } => Some((currency, issuer, *value)),
        }
    }

    /// The currency code of this amount.
    pub fn currency(&self) -> &str {
        match self {
            Amount::Drops(_) => NATIVE_CURRENCY,
            Amount::Issued { currency, .. } => currency,
        }
    }

    /// True if the amount is exactly zero.
    pub fn is_zero(&self) -> bool {
        match self {
            Amount::Drops(d) => *d == 0,
            Amount::Issued { value, .. } => value.is_zero(),
        }
    }
}

impl From<Drops> for Amount {
    fn from(drops: Drops) -> Self {
        Amount::Drops(drops)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn native_and_issued_accessors() {
        let native = Amount::Drops(1_500_000);
        assert!(native.is_native());
        assert_eq!(native.native(), Some(1_500_000));
        assert_eq!(native.currency(), "NXF");
        assert!(native.issued().is_none());

        let iou = Amount::Issued {
            currency: "USD".into(),
            issuer: "gateway".into(),
            value: dec!(25.50),
        };
        assert!(!iou.is_native());
        assert_eq!(iou.issued(), Some(("USD", "gateway", dec!(25.50))));
        assert!(!iou.is_zero());
    }
}
