//! Batch formation: turning a noisy ready queue into exactly-sized games
//! placed on sessions with free slots.

pub mod batch;
pub mod config;
pub mod worker;

pub use config::Config;
pub use worker::Matchmaker;

use rand::Rng;

/// Sample a game duration in milliseconds from a triangular distribution
/// over `[min_seconds, max_seconds]` (mean of two uniforms, peaked at the
/// midpoint).
pub fn sample_duration_ms(rng: &mut impl Rng, min_seconds: u64, max_seconds: u64) -> u64 {
    let low = min_seconds.saturating_mul(1000);
    let high = max_seconds.saturating_mul(1000).max(low);
    if low == high {
        return low;
    }
    let a = rng.gen_range(low..=high);
    let b = rng.gen_range(low..=high);
    a / 2 + b / 2 + (a % 2 + b % 2) / 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_duration_stays_in_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1000 {
            let ms = sample_duration_ms(&mut rng, 30, 300);
            assert!((30_000..=300_000).contains(&ms), "out of range: {ms}");
        }
    }

    #[test]
    fn test_degenerate_range() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(sample_duration_ms(&mut rng, 45, 45), 45_000);
    }

    #[test]
    fn test_distribution_peaks_at_midpoint() {
        // A triangular sample lands in the middle half of the range far
        // more often than a uniform one would.
        let mut rng = StdRng::seed_from_u64(42);
        let (low, high) = (0u64, 100u64);
        let mid_low = 25_000;
        let mid_high = 75_000;
        let hits = (0..2000)
            .filter(|_| {
                let ms = sample_duration_ms(&mut rng, low, high);
                (mid_low..=mid_high).contains(&ms)
            })
            .count();
        assert!(hits > 1200, "only {hits}/2000 samples near the midpoint");
    }
}
