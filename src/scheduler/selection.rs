//! Weighted random selection.

use rand::Rng;

use crate::scheduler::channel::Channel;

/// Roulette-wheel pick over `candidates` in their given order.
///
/// Draws `r` uniformly from `[0, total_weight)` and subtracts each weight in
/// turn; the channel that brings `r` to zero or below wins. Falls back to the
/// last candidate if rounding leaves `r` positive.
pub fn pick_weighted<'a, R>(candidates: &[&'a Channel], rng: &mut R) -> Option<&'a Channel>
where
    R: Rng,
{
    let last = *candidates.last()?;
    let total: u64 = candidates.iter().map(|c| u64::from(c.weight)).sum();

    let mut threshold = rng.gen::<f64>() * total as f64;
    for &channel in candidates {
        threshold -= f64::from(channel.weight);
        if threshold <= 0.0 {
            return Some(channel);
        }
    }
    Some(last)
}
