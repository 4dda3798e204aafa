use super::seats::{RetryError, SeatMap};
use super::shuffle::RetryRng;
use std::collections::BTreeSet;

/// Picks a retry subset of `members` holding at least `quantity` seats.
///
/// Meant for signing attempts that failed for a reason other than
/// inactivity: every retry shuffles the distinct operators with a generator
/// seeded from `seed + retry_count` and greedily accepts operators, with all
/// of their seats, until the seat floor is met. `seed` must be shared by all
/// operators for a given message (see [`retry_seed`](super::retry_seed)) and
/// `retry_count` is incremented after each failed attempt.
///
/// The returned entries keep the order and duplicates of `members`.
pub fn evaluate_retry_participants_for_signing<A: Ord + Clone>(
    members: &[A],
    seed: i64,
    retry_count: u32,
    quantity: usize,
) -> Result<Vec<A>, RetryError> {
    let seats = SeatMap::new(members);
    seats.ensure_available(quantity)?;

    let mut operators = seats.operators();
    RetryRng::seeded(seed.wrapping_add(i64::from(retry_count))).shuffle(&mut operators);

    let mut seat_count = 0;
    let mut accepted = BTreeSet::new();
    for operator in operators {
        if seat_count >= quantity {
            break;
        }
        seat_count += seats.seats_of(operator);
        accepted.insert(operator);
    }

    Ok(members
        .iter()
        .filter(|member| accepted.contains(*member))
        .cloned()
        .collect())
}
