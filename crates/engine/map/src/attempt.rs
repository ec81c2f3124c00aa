//! Ordered-attempt combinator
//!
//! Runs a fallible operation over candidates in order and stops at the first
//! success. Used for resolution fallback chains; anything that needs
//! "try A, then B, then C" can reuse it.

use std::future::Future;

use thiserror::Error;

/// Failure of an ordered attempt
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AttemptError<C, E> {
    #[error("nothing to attempt")]
    NoCandidates,

    #[error("all {attempts} attempts failed, last candidate {last_candidate}: {last_error}")]
    Exhausted {
        attempts: usize,
        last_candidate: C,
        last_error: E,
    },
}

/// Try `candidates` in order, returning the first success and the candidate
/// that produced it.
pub fn first_success<C, T, E, I, F>(candidates: I, mut attempt: F) -> Result<(C, T), AttemptError<C, E>>
where
    I: IntoIterator<Item = C>,
    F: FnMut(&C) -> Result<T, E>,
{
    let mut attempts = 0;
    let mut last_failure = None;

    for candidate in candidates {
        attempts += 1;
        match attempt(&candidate) {
            Ok(value) => return Ok((candidate, value)),
            Err(err) => last_failure = Some((candidate, err)),
        }
    }

    match last_failure {
        Some((last_candidate, last_error)) => Err(AttemptError::Exhausted {
            attempts,
            last_candidate,
            last_error,
        }),
        None => Err(AttemptError::NoCandidates),
    }
}

/// Async form of [`first_success`]; attempts are awaited one after another.
pub async fn first_success_async<C, T, E, I, F, Fut>(
    candidates: I,
    mut attempt: F,
) -> Result<(C, T), AttemptError<C, E>>
where
    C: Clone,
    I: IntoIterator<Item = C>,
    F: FnMut(C) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempts = 0;
    let mut last_failure = None;

    for candidate in candidates {
        attempts += 1;
        match attempt(candidate.clone()).await {
            Ok(value) => return Ok((candidate, value)),
            Err(err) => last_failure = Some((candidate, err)),
        }
    }

    match last_failure {
        Some((last_candidate, last_error)) => Err(AttemptError::Exhausted {
            attempts,
            last_candidate,
            last_error,
        }),
        None => Err(AttemptError::NoCandidates),
    }
}
