//! Randomized exponential back-off for refresh retries.

use rand::Rng;

pub const MIN_SECS: f64 = 1.0;
pub const MAX_SECS: f64 = 7200.0;

/// Computes the next retry timeout given the previous one.
///
/// `next = clamp(random_uniform(0, last) + last * 2, MIN_SECS, MAX_SECS)`.
/// The first retry passes `last_secs = 0.0`, which collapses the jitter term
/// to zero and yields `MIN_SECS` after clamping.
pub fn next_timeout(last_secs: f64) -> f64 {
    let jitter = if last_secs > 0.0 {
        rand::thread_rng().gen_range(0.0..=last_secs)
    } else {
        0.0
    };
    (jitter + last_secs * 2.0).clamp(MIN_SECS, MAX_SECS)
}
