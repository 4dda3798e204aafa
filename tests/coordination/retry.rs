use std::collections::{BTreeMap, BTreeSet};
use std::thread;

use anyhow::Result;
use blockcoord::{
    evaluate_retry_participants_for_key_generation, evaluate_retry_participants_for_signing,
    retry_seed, RetryError,
};

fn operators() -> Vec<String> {
    // Twelve seats over eight operators; a few hold more than one seat.
    ["op-3", "op-1", "op-7", "op-1", "op-4", "op-2", "op-5", "op-7", "op-6", "op-1", "op-8", "op-4"]
        .iter()
        .map(|name| name.to_string())
        .collect()
}

fn seat_counts(members: &[String]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for member in members {
        *counts.entry(member.clone()).or_insert(0) += 1;
    }
    counts
}

fn excluded(members: &[String], selected: &[String]) -> BTreeSet<String> {
    members
        .iter()
        .filter(|member| !selected.contains(member))
        .cloned()
        .collect()
}

#[test]
fn independent_nodes_agree_on_signing_subset() -> Result<()> {
    let members = operators();
    let seed = retry_seed(b"signing request 0x5f2c");

    for retry_count in 0..6 {
        let handles: Vec<_> = (0..6)
            .map(|_| {
                let members = members.clone();
                thread::spawn(move || {
                    evaluate_retry_participants_for_signing(&members, seed, retry_count, 7)
                })
            })
            .collect();

        let mut outputs = Vec::new();
        for handle in handles {
            outputs.push(handle.join().expect("node thread panicked")?);
        }
        assert!(outputs.windows(2).all(|pair| pair[0] == pair[1]));
        assert!(outputs[0].len() >= 7);
    }
    Ok(())
}

#[test]
fn member_order_does_not_change_the_chosen_operators() -> Result<()> {
    let members = operators();
    let mut reversed = members.clone();
    reversed.reverse();
    let seed = retry_seed(b"dkg seed");

    for retry_count in 0..10 {
        let forward = evaluate_retry_participants_for_signing(&members, seed, retry_count, 8)?;
        let backward = evaluate_retry_participants_for_signing(&reversed, seed, retry_count, 8)?;
        assert_eq!(seat_counts(&forward), seat_counts(&backward));

        let forward = evaluate_retry_participants_for_key_generation(&members, seed, retry_count, 8)?;
        let backward =
            evaluate_retry_participants_for_key_generation(&reversed, seed, retry_count, 8)?;
        assert_eq!(excluded(&members, &forward), excluded(&reversed, &backward));
    }
    Ok(())
}

#[test]
fn key_generation_retries_never_repeat_an_exclusion() {
    let members = operators();
    let total = members.len();
    let quantity = total - 4;
    let seed = retry_seed(b"dkg seed");

    let mut seen = BTreeSet::new();
    let mut sizes = Vec::new();
    let mut retry_count = 0;
    let exhausted = loop {
        match evaluate_retry_participants_for_key_generation(&members, seed, retry_count, quantity)
        {
            Ok(selected) => {
                assert!(selected.len() >= quantity);
                let dropped = excluded(&members, &selected);
                sizes.push(dropped.len());
                assert!(seen.insert(dropped), "retry {retry_count} repeated an exclusion");
                retry_count += 1;
            }
            Err(err) => break err,
        }
    };

    // Exclusions escalate from single operators to pairs to triplets.
    assert!(sizes.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(sizes.first(), Some(&1));
    assert_eq!(sizes.last(), Some(&3));
    assert_eq!(
        exhausted,
        RetryError::RetryCountExhausted {
            retry_count,
            available: seen.len(),
            required_additional: 1,
        }
    );
}

#[test]
fn exhausted_retry_count_reports_the_shortfall() {
    let members: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
    // Only single exclusions leave two seats.
    let err = evaluate_retry_participants_for_key_generation(&members, 1, 5, 2).unwrap_err();
    assert_eq!(
        err,
        RetryError::RetryCountExhausted {
            retry_count: 5,
            available: 3,
            required_additional: 3,
        }
    );
    assert!(err.to_string().contains("still needed 3 more"));
}
