use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetryError {
    #[error(
        "asked for too many seats; {requested} seats were requested, \
         but there are only {available} available"
    )]
    InsufficientSeats { requested: usize, available: usize },
    #[error(
        "the retry count {retry_count} was too large to handle; tried every \
         single, pair and triplet ({available} exclusions), but still needed \
         {required_additional} more"
    )]
    RetryCountExhausted {
        retry_count: u32,
        available: usize,
        required_additional: usize,
    },
}

/// Seats held by each distinct operator, keyed in canonical (`Ord`) order.
pub(crate) struct SeatMap<'a, A> {
    seats: BTreeMap<&'a A, usize>,
    total: usize,
}

impl<'a, A: Ord> SeatMap<'a, A> {
    pub(crate) fn new(members: &'a [A]) -> Self {
        let mut seats = BTreeMap::new();
        for member in members {
            *seats.entry(member).or_insert(0) += 1;
        }

        Self {
            seats,
            total: members.len(),
        }
    }

    pub(crate) fn ensure_available(&self, quantity: usize) -> Result<(), RetryError> {
        if quantity > self.total {
            return Err(RetryError::InsufficientSeats {
                requested: quantity,
                available: self.total,
            });
        }
        Ok(())
    }

    pub(crate) fn total(&self) -> usize {
        self.total
    }

    pub(crate) fn seats_of(&self, operator: &A) -> usize {
        self.seats.get(operator).copied().unwrap_or(0)
    }

    /// Distinct operators in canonical order.
    pub(crate) fn operators(&self) -> Vec<&'a A> {
        self.seats.keys().copied().collect()
    }
}
