//! Property-based tests for the vending ledger.
//!
//! These tests use proptest to push random bill mixes and price points
//! through a full kiosk on mock hardware and verify that the money
//! accounting holds for every combination.

mod common;

use proptest::prelude::*;

use cardvend_core::types::{Denomination, KioskConfig, UnitId};
use cardvend_kiosk::KioskState;
use common::Rig;

/// Strategy for generating accepted denomination codes (1-7).
fn denomination_code() -> impl Strategy<Value = u8> {
    1u8..=7u8
}

/// Strategy for generating a short mix of inserted bills.
fn bill_mix() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(denomination_code(), 1..=4)
}

/// Strategy for generating card prices a large bill can cover.
fn card_price() -> impl Strategy<Value = u32> {
    prop_oneof![
        Just(10_000u32),
        Just(20_000u32),
        Just(25_000u32),
        Just(50_000u32),
    ]
}

/// Takes every card the kiosk pays out until it settles back in service.
///
/// Each payout is walked through the gate sensor by hand: wait out the
/// motor pulse, raise the sensor, then drop it again as the customer
/// taking the card. Returns the number of cards taken.
fn drain_vends(rig: &mut Rig, price: u32) -> u32 {
    let mut sales = 0;
    for _ in 0..400 {
        match rig.kiosk.state() {
            KioskState::WaitForPayoutingCard => {
                let unit = rig.kiosk.dispenser().active_unit();
                rig.run_ms(600);
                rig.units.set_card_at_gate(unit, true);
                rig.run_ms(100);
                rig.units.set_card_at_gate(unit, false);
                rig.run_ms(400);
                sales += 1;
            }
            KioskState::Idle if rig.balance() < price && rig.kiosk.dispenser().is_idle() => {
                return sales;
            }
            _ => {
                rig.run_ms(50);
            }
        }
    }
    sales
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    /// Property: the ledger balances for any mix of accepted bills.
    ///
    /// Every stacked bill credits the balance, every taken card debits
    /// exactly one card price, and nothing else moves money. After the
    /// kiosk drains a random mix it must hold that
    /// balance = credits - price * sales, with the lifetime total and
    /// the card counter matching the physical pulse counts.
    #[test]
    fn prop_ledger_balances_any_bill_mix(codes in bill_mix()) {
        let mut rig = Rig::priced();
        rig.boot();

        let credits: u32 = codes
            .iter()
            .map(|&code| Denomination::from_code(code).unwrap().value())
            .sum();
        for &code in &codes {
            rig.insert_stacked(code);
        }
        // One poll slot per queued event, plus slack for the settle scenes.
        rig.run_ms(500 + 300 * codes.len() as u64);

        let sales = drain_vends(&mut rig, 20_000);

        prop_assert_eq!(sales, credits / 20_000);
        prop_assert_eq!(rig.balance(), credits - 20_000 * sales);
        let config = rig.kiosk.settings().borrow().snapshot();
        prop_assert_eq!(config.lifetime_total, credits);
        prop_assert_eq!(config.total_cards, sales);
        prop_assert_eq!(
            rig.units.payout_pulses(UnitId::A) + rig.units.payout_pulses(UnitId::B),
            sales
        );
    }

    /// Property: the configured price carves a single bill into whole
    /// cards plus remainder credit.
    ///
    /// Vending repeats while the balance covers the price, so one large
    /// bill must yield exactly value / price cards and leave value % price
    /// on the balance, for any price the menu could have set.
    #[test]
    fn prop_price_carves_bill_into_cards(price in card_price(), code in 5u8..=6u8) {
        let mut rig = Rig::new(KioskConfig {
            card_price: price,
            ..KioskConfig::default()
        });
        rig.boot();

        let value = Denomination::from_code(code).unwrap().value();
        rig.insert_stacked(code);
        rig.run_ms(800);

        let sales = drain_vends(&mut rig, price);

        prop_assert_eq!(sales, value / price);
        prop_assert_eq!(rig.balance(), value % price);
        prop_assert!(rig.balance() < price);
    }

    /// Property: healthy twin hoppers share consecutive sales evenly.
    ///
    /// Arbitration prefers the unit that did not serve the last payout,
    /// so with both hoppers healthy an even run of sales must split the
    /// pulse counts exactly in half.
    #[test]
    fn prop_healthy_units_share_the_load(pairs in 1u32..=3) {
        let mut rig = Rig::priced();
        rig.boot();

        for _ in 0..pairs * 2 {
            rig.insert_stacked(4);
        }
        rig.run_ms(500 + 300 * (pairs as u64 * 2));

        let sales = drain_vends(&mut rig, 20_000);

        prop_assert_eq!(sales, pairs * 2);
        prop_assert_eq!(rig.units.payout_pulses(UnitId::A), pairs);
        prop_assert_eq!(rig.units.payout_pulses(UnitId::B), pairs);
    }
}

#[cfg(test)]
mod standard_tests {
    use super::*;

    /// Standard test: every generated code maps to a real denomination.
    #[test]
    fn test_denomination_codes_are_all_valid() {
        proptest!(|(code in denomination_code())| {
            let bill = Denomination::from_code(code);
            prop_assert!(bill.is_ok());
            prop_assert!(bill.unwrap().value() >= 2_000);
        });
    }

    /// Standard test: generated prices stay nonzero so vending is armed.
    #[test]
    fn test_card_prices_are_nonzero() {
        proptest!(|(price in card_price())| {
            prop_assert!(price > 0);
            prop_assert_eq!(price % 5_000, 0);
        });
    }
}
