//! Unit tests for the Money module
//!
//! Covers creation, arithmetic, allocation of claim totals and display of
//! shilling amounts.

use core_kernel::{Currency, Money, MoneyError};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

mod creation {
    use super::*;

    #[test]
    fn test_new_rounds_to_four_decimal_places() {
        let m = Money::kes(dec!(100.123456789));
        assert_eq!(m.amount(), dec!(100.1235));
    }

    #[test]
    fn test_from_minor_converts_cents() {
        let m = Money::from_minor(250_075, Currency::KES);
        assert_eq!(m.amount(), dec!(2500.75));
    }

    #[test]
    fn test_zero_defaults() {
        let m = Money::zero(Currency::default());
        assert!(m.is_zero());
        assert_eq!(m.currency(), Currency::KES);
        assert!(!m.is_positive());
        assert!(!m.is_negative());
    }
}

mod arithmetic {
    use super::*;

    #[test]
    fn test_checked_add_same_currency() {
        let a = Money::kes(dec!(1500));
        let b = Money::kes(dec!(350.50));
        assert_eq!(a.checked_add(&b).unwrap().amount(), dec!(1850.50));
    }

    #[test]
    fn test_checked_sub_can_go_negative() {
        let a = Money::kes(dec!(100));
        let b = Money::kes(dec!(250));
        let diff = a.checked_sub(&b).unwrap();
        assert!(diff.is_negative());
        assert_eq!(diff.amount(), dec!(-150));
    }

    #[test]
    fn test_checked_ops_reject_mixed_currency() {
        let kes = Money::kes(dec!(100));
        let usd = Money::new(dec!(1), Currency::USD);
        assert!(matches!(kes.checked_add(&usd), Err(MoneyError::CurrencyMismatch(_, _))));
        assert!(matches!(kes.checked_sub(&usd), Err(MoneyError::CurrencyMismatch(_, _))));
    }

    #[test]
    fn test_operators() {
        let a = Money::kes(dec!(10));
        let b = Money::kes(dec!(4));
        assert_eq!((a + b).amount(), dec!(14));
        assert_eq!((a - b).amount(), dec!(6));
        assert_eq!((-a).amount(), dec!(-10));
    }

    #[test]
    fn test_multiply_by_quantity() {
        let unit_price = Money::kes(dec!(450));
        assert_eq!(unit_price.multiply(dec!(3)).amount(), dec!(1350));
    }

    #[test]
    fn test_sum_empty_is_zero() {
        let total = Money::sum(Currency::KES, std::iter::empty()).unwrap();
        assert!(total.is_zero());
    }

    #[test]
    fn test_sum_fails_on_mixed_currency() {
        let items = [Money::kes(dec!(1)), Money::new(dec!(1), Currency::USD)];
        assert!(Money::sum(Currency::KES, items.iter()).is_err());
    }
}

mod allocation {
    use super::*;

    #[test]
    fn test_allocate_handles_remainder() {
        let total = Money::kes(dec!(100));
        let parts = total.allocate(3).unwrap();
        assert_eq!(parts[0].amount(), dec!(33.34));
        assert_eq!(parts[1].amount(), dec!(33.33));
        assert_eq!(parts[2].amount(), dec!(33.33));

        let sum: Decimal = parts.iter().map(|m| m.amount()).sum();
        assert_eq!(sum, dec!(100));
    }

    #[test]
    fn test_allocate_zero_parts_error() {
        assert!(Money::kes(dec!(100)).allocate(0).is_err());
    }
}

mod display {
    use super::*;

    #[test]
    fn test_money_display() {
        assert_eq!(Money::kes(dec!(2500.5)).to_string(), "KSh 2500.50");
        assert_eq!(Money::new(dec!(12), Currency::USD).to_string(), "$ 12.00");
    }

    #[test]
    fn test_round_to_currency() {
        let m = Money::kes(dec!(10.4567)).round_to_currency();
        assert_eq!(m.amount(), dec!(10.46));
    }
}

mod serialization {
    use super::*;

    #[test]
    fn test_currency_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Currency::KES).unwrap(), "\"KES\"");
    }

    #[test]
    fn test_money_json_roundtrip() {
        let m = Money::kes(dec!(4200.25));
        let json = serde_json::to_string(&m).unwrap();
        let back: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(m, back);
    }
}
