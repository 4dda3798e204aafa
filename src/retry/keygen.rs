use super::seats::{RetryError, SeatMap};
use super::shuffle::RetryRng;

/// Largest number of distinct operators excluded by a single retry.
const MAX_EXCLUDED_OPERATORS: usize = 3;

/// Picks a retry subset of `members` for key generation by excluding as few
/// operators as possible.
///
/// Candidates are the operators whose seats can be removed while leaving at
/// least `quantity` seats. They are shuffled with a generator seeded from
/// `seed` alone, then every single candidate, every pair and every triplet
/// (in nested order over the shuffled candidates, skipping combinations that
/// would drop below `quantity`) is one exclusion. `retry_count` selects the
/// exclusion, so `0` drops the first shuffled candidate.
///
/// Returns `members` without any seat of the excluded operators.
pub fn evaluate_retry_participants_for_key_generation<A: Ord + Clone>(
    members: &[A],
    seed: i64,
    retry_count: u32,
    quantity: usize,
) -> Result<Vec<A>, RetryError> {
    let seats = SeatMap::new(members);
    seats.ensure_available(quantity)?;

    let spare_seats = seats.total() - quantity;
    let mut candidates: Vec<&A> = seats
        .operators()
        .into_iter()
        .filter(|operator| seats.seats_of(operator) <= spare_seats)
        .collect();
    RetryRng::seeded(seed).shuffle(&mut candidates);

    let weights: Vec<usize> = candidates
        .iter()
        .map(|operator| seats.seats_of(operator))
        .collect();

    let mut enumerated = 0usize;
    for combination in exclusion_combinations(&weights, spare_seats) {
        if enumerated == retry_count as usize {
            let excluded: Vec<&A> = combination.iter().map(|&i| candidates[i]).collect();
            return Ok(members
                .iter()
                .filter(|member| !excluded.contains(member))
                .cloned()
                .collect());
        }
        enumerated += 1;
    }

    Err(RetryError::RetryCountExhausted {
        retry_count,
        available: enumerated,
        required_additional: retry_count as usize + 1 - enumerated,
    })
}

/// Index combinations of one, two, then three candidates, each in nested
/// ascending order, whose summed weight does not exceed `spare`.
fn exclusion_combinations(
    weights: &[usize],
    spare: usize,
) -> impl Iterator<Item = Vec<usize>> + '_ {
    (1..=MAX_EXCLUDED_OPERATORS)
        .flat_map(move |size| Combinations::new(weights.len(), size))
        .filter(move |combination| combination.iter().map(|&i| weights[i]).sum::<usize>() <= spare)
}

/// Lexicographic `size`-combinations of `0..n`.
struct Combinations {
    n: usize,
    indices: Vec<usize>,
    exhausted: bool,
}

impl Combinations {
    fn new(n: usize, size: usize) -> Self {
        Self {
            n,
            indices: (0..size).collect(),
            exhausted: size == 0 || size > n,
        }
    }
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        let current = self.indices.clone();
        let size = self.indices.len();

        // Advance the rightmost index that still has room, then reset the
        // ones after it.
        match (0..size).rev().find(|&i| self.indices[i] < self.n - size + i) {
            Some(i) => {
                self.indices[i] += 1;
                for j in i + 1..size {
                    self.indices[j] = self.indices[j - 1] + 1;
                }
            }
            None => self.exhausted = true,
        }

        Some(current)
    }
}
