//! Bounded retry combinator.

use std::future::Future;

/// Result of running an operation under a bounded retry budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bounded<T, E> {
    /// An attempt succeeded; earlier failures are kept.
    Succeeded {
        /// Produced value.
        value: T,
        /// Attempts used, including the successful one.
        attempts: u32,
        /// Failures of the earlier attempts.
        failures: Vec<E>,
    },
    /// Every attempt failed.
    Exhausted {
        /// One failure per attempt, in order.
        failures: Vec<E>,
    },
}

impl<T, E> Bounded<T, E> {
    /// Number of attempts made.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts, .. } => *attempts,
            Self::Exhausted { failures } => u32::try_from(failures.len()).unwrap_or(u32::MAX),
        }
    }
}

/// Run `op` until it succeeds or `max_attempts` attempts have failed.
///
/// `op` receives the 1-based attempt number. At least one attempt is made.
pub async fn retry_bounded<T, E, F, Fut>(max_attempts: u32, mut op: F) -> Bounded<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = max_attempts.max(1);
    let mut failures = Vec::new();
    for attempt in 1..=max_attempts {
        match op(attempt).await {
            Ok(value) => {
                return Bounded::Succeeded {
                    value,
                    attempts: attempt,
                    failures,
                }
            }
            Err(e) => failures.push(e),
        }
    }
    Bounded::Exhausted { failures }
}
