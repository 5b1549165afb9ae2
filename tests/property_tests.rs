//! Property-based tests for the curve and revenue math.
//!
//! These tests verify pricing invariants hold under random inputs.

use keys_core::*;
use proptest::prelude::*;

// Strategies for generating test data
fn curve_strategy() -> impl Strategy<Value = CurveConfig> {
    (1u128..1_000_000_000_000_000u128, 0u128..1_000_000_000_000_000u128)
        .prop_map(|(base, inc)| CurveConfig::new(Amount::new(base), Amount::new(inc), None))
}

fn supply_strategy() -> impl Strategy<Value = u64> {
    0u64..1_000_000u64
}

fn quantity_strategy() -> impl Strategy<Value = u64> {
    1u64..500u64
}

fn share_strategy() -> impl Strategy<Value = SharePercent> {
    (0u8..=100u8).prop_map(|p| SharePercent::new(p).unwrap())
}

proptest! {
    /// price(s1) <= price(s2) whenever s1 < s2
    #[test]
    fn price_is_monotonic(
        curve in curve_strategy(),
        s1 in supply_strategy(),
        gap in 1u64..1_000u64,
    ) {
        let p1 = curve.price(s1).unwrap();
        let p2 = curve.price(s1 + gap).unwrap();
        prop_assert!(p1 <= p2);
    }

    /// closed form matches the unit-by-unit sum
    #[test]
    fn cost_matches_discrete_sum(
        curve in curve_strategy(),
        supply in supply_strategy(),
        quantity in 1u64..64u64,
    ) {
        let closed = curve.cost_to_buy(supply, quantity).unwrap();
        let summed: Amount = (0..quantity)
            .map(|i| curve.price(supply + i).unwrap())
            .sum();
        prop_assert_eq!(closed, summed);
    }

    /// selling what was just bought returns exactly what was paid
    #[test]
    fn buy_then_sell_is_neutral(
        curve in curve_strategy(),
        supply in supply_strategy(),
        quantity in quantity_strategy(),
    ) {
        let cost = curve.cost_to_buy(supply, quantity).unwrap();
        let proceeds = curve.proceeds_from_sell(supply + quantity, quantity).unwrap();
        prop_assert_eq!(cost, proceeds);
    }

    /// buying in two steps costs the same as buying in one
    #[test]
    fn cost_is_additive(
        curve in curve_strategy(),
        supply in supply_strategy(),
        q1 in quantity_strategy(),
        q2 in quantity_strategy(),
    ) {
        let whole = curve.cost_to_buy(supply, q1 + q2).unwrap();
        let first = curve.cost_to_buy(supply, q1).unwrap();
        let second = curve.cost_to_buy(supply + q1, q2).unwrap();
        prop_assert_eq!(whole, first.checked_add(second).unwrap());
    }

    /// unit prices bracket the average
    #[test]
    fn average_within_unit_prices(
        curve in curve_strategy(),
        supply in supply_strategy(),
        quantity in quantity_strategy(),
    ) {
        let total = curve.cost_to_buy(supply, quantity).unwrap();
        let (first, last) = curve.buy_unit_prices(supply, quantity).unwrap();
        let avg = average_price(total, quantity);
        prop_assert!(first <= avg && avg <= last);
    }

    /// creator + protocol == total, exactly
    #[test]
    fn split_conserves(
        total in 0u128..u128::MAX,
        share in share_strategy(),
    ) {
        let split = revenue::split(Amount::new(total), share);
        prop_assert_eq!(split.total(), Amount::new(total));
        prop_assert!(split.creator_share <= Amount::new(total));
    }

    /// creator share is floor(total * pct / 100) when nothing overflows
    #[test]
    fn split_is_floor(
        total in 0u128..1_000_000_000_000_000_000_000u128,
        share in share_strategy(),
    ) {
        let split = revenue::split(Amount::new(total), share);
        let expected = total * u128::from(share.value()) / 100;
        prop_assert_eq!(split.creator_share, Amount::new(expected));
    }

    /// selling part of a holding never leaves a negative or orphaned basis
    #[test]
    fn partial_sell_releases_proportionally(
        quantity in 1u64..10_000u64,
        basis in 0u128..1_000_000_000_000_000_000u128,
        sold_frac in 0.0f64..=1.0f64,
    ) {
        let holding = Holding {
            user_id: UserId::new("u"),
            creator_id: CreatorId::new("c"),
            quantity,
            cost_basis: Amount::new(basis),
            updated_at: Timestamp::from_millis(0),
        };
        let sold = ((quantity as f64 * sold_frac) as u64).clamp(1, quantity);
        let after = holding.apply_sell(sold, Timestamp::from_millis(1)).unwrap();

        prop_assert_eq!(after.quantity, quantity - sold);
        prop_assert!(after.cost_basis <= holding.cost_basis);
        prop_assert!(after.validate().is_ok());
        if after.quantity == 0 {
            prop_assert_eq!(after.cost_basis, Amount::zero());
        }
    }
}

#[test]
fn concrete_three_key_purchase() {
    let denom = Denomination::default();
    let curve = CurveConfig::new(
        denom.to_minor(rust_decimal_macros::dec!(0.001)).unwrap(),
        denom.to_minor(rust_decimal_macros::dec!(0.0001)).unwrap(),
        None,
    );
    let cost = curve.cost_to_buy(0, 3).unwrap();
    assert_eq!(denom.to_major(cost).unwrap(), rust_decimal_macros::dec!(0.0033));
    assert_eq!(
        denom.to_major(curve.price(3).unwrap()).unwrap(),
        rust_decimal_macros::dec!(0.0013)
    );
}

#[test]
fn concrete_ten_percent_split() {
    let split = revenue::split(Amount::new(100), SharePercent::new(10).unwrap());
    assert_eq!(split.creator_share, Amount::new(10));
    assert_eq!(split.protocol_share, Amount::new(90));
}
