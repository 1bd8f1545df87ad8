//! Property-style coverage for the cross-brand allocation algorithms.

use backend::domain::allocation::{allocate, distribute_largest_remainder, Allocation};
use backend::domain::attribution::AttributionSlice;
use backend::domain::program_config::AllocationStrategy;
use rstest::rstest;

fn slice(account: &str, amount: i64) -> AttributionSlice {
    AttributionSlice {
        account_id: account.to_string(),
        amount,
        settlement_adjustment_bps: None,
    }
}

fn credited(allocations: &[Allocation]) -> i64 {
    allocations.iter().map(|a| a.amount).sum()
}

#[rstest]
fn shares_always_sum_to_the_total() {
    let weight_sets: &[&[i64]] = &[
        &[1],
        &[1, 1],
        &[100, 100],
        &[3, 7, 11, 29],
        &[0, 5, 0, 9],
        &[1_000_000_007, 3],
    ];
    for total in [1_i64, 2, 19, 20, 21, 997, 1_000_000] {
        for weights in weight_sets {
            let shares = distribute_largest_remainder(total, weights);
            assert_eq!(
                shares.iter().sum::<i64>(),
                total,
                "total {total} over {weights:?}"
            );
            assert_eq!(shares.len(), weights.len());
            assert!(shares.iter().all(|share| *share >= 0));
        }
    }
}

#[rstest]
fn shares_are_deterministic_for_identical_input() {
    let weights = [17, 3, 17, 9];
    assert_eq!(
        distribute_largest_remainder(1_003, &weights),
        distribute_largest_remainder(1_003, &weights)
    );
}

#[rstest]
fn permuting_weights_permutes_shares_up_to_ties() {
    // With distinct weights, reordering the inputs reorders the outputs.
    let forward = distribute_largest_remainder(100, &[5, 7, 9]);
    let backward = distribute_largest_remainder(100, &[9, 7, 5]);
    let mut forward_sorted = forward.clone();
    forward_sorted.sort_unstable();
    let mut backward_sorted = backward;
    backward_sorted.sort_unstable();
    assert_eq!(forward_sorted, backward_sorted);
}

#[rstest]
fn every_strategy_credits_exactly_the_redeemed_quantity() {
    let attribution = vec![slice("acct-a", 70), slice("acct-b", 40), slice("acct-c", 15)];
    for strategy in [
        AllocationStrategy::Priority,
        AllocationStrategy::Proportional,
        AllocationStrategy::SourceProportional,
    ] {
        for qty in [1_i64, 25, 99, 125] {
            let allocations = allocate(strategy, qty, &attribution, &[], None);
            assert_eq!(credited(&allocations), qty, "{strategy:?} qty {qty}");
        }
    }
}

#[rstest]
fn priority_exhausts_partners_in_attribution_order() {
    let attribution = vec![slice("acct-a", 10), slice("acct-b", 10), slice("acct-c", 50)];
    let allocations = allocate(AllocationStrategy::Priority, 25, &attribution, &[], None);

    let order: Vec<&str> = allocations
        .iter()
        .map(|a| a.merchant_account.as_str())
        .collect();
    assert_eq!(order, vec!["acct-a", "acct-b", "acct-c"]);
    assert_eq!(allocations[0].amount, 10);
    assert_eq!(allocations[1].amount, 10);
    assert_eq!(allocations[2].amount, 5);
}
