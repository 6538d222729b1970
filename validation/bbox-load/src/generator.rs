//! Bounding-box query generation.

use geo_common::BoundingBox;
use rand::prelude::*;
use std::time::Duration;

use crate::config::{CoordinateDomain, LengthRange, QuerySelection, ScenarioConfig, ThinkTimeRange};

/// Generates query boxes for a single virtual user.
///
/// Each user owns its generator and RNG, so generation never touches shared
/// state.
pub struct QueryGenerator {
    selection: QuerySelection,
    domain: CoordinateDomain,
    lengths: LengthRange,
    rng: StdRng,
}

impl QueryGenerator {
    /// Create a generator for the given user.
    ///
    /// With a configured seed the user's stream is `seed + user_id`, so runs
    /// are reproducible while users still draw different boxes.
    pub fn for_user(config: &ScenarioConfig, user_id: u32) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(user_id as u64)),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(
            config.query_selection.clone(),
            config.coordinate_domain,
            config.query_length_range,
            rng,
        )
    }

    /// Create a generator from explicit bounds.
    pub fn with_rng(
        selection: QuerySelection,
        domain: CoordinateDomain,
        lengths: LengthRange,
        rng: StdRng,
    ) -> Self {
        Self {
            selection,
            domain,
            lengths,
            rng,
        }
    }

    /// Generate the next query box.
    pub fn generate(&mut self) -> BoundingBox {
        match &self.selection {
            QuerySelection::Random => random_square(&mut self.rng, self.domain, self.lengths),
            QuerySelection::Fixed { bbox } => *bbox,
        }
    }
}

/// Draw a square box: lower-left corner uniform in `[min, max)` on both axes,
/// integer side length uniform in `[min_len, max_len]`.
///
/// The upper corner may extend past `domain.max` by up to `max_len`.
pub fn random_square<R: Rng + ?Sized>(
    rng: &mut R,
    domain: CoordinateDomain,
    lengths: LengthRange,
) -> BoundingBox {
    let length = rng.gen_range(lengths.min..=lengths.max) as f64;
    let x0 = rng.gen_range(domain.min..domain.max);
    let y0 = rng.gen_range(domain.min..domain.max);
    BoundingBox::square(x0, y0, length)
}

/// Samples the pause between two iterations of a virtual user.
#[derive(Debug, Clone, Copy)]
pub struct ThinkTime {
    range: ThinkTimeRange,
}

impl ThinkTime {
    pub fn new(range: ThinkTimeRange) -> Self {
        Self { range }
    }

    /// Uniform draw from `[min, max]` milliseconds.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        Duration::from_millis(rng.gen_range(self.range.min..=self.range.max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOMAIN: CoordinateDomain = CoordinateDomain {
        min: 0.0,
        max: 200_000.0,
    };
    const LENGTHS: LengthRange = LengthRange {
        min: 1_000,
        max: 20_000,
    };

    fn seeded(seed: u64) -> QueryGenerator {
        QueryGenerator::with_rng(QuerySelection::Random, DOMAIN, LENGTHS, StdRng::seed_from_u64(seed))
    }

    #[test]
    fn test_generated_queries_are_squares_within_bounds() {
        let mut gen = seeded(7);
        for _ in 0..10_000 {
            let q = gen.generate();
            assert!(q.min_x < q.max_x);
            assert!(q.min_y < q.max_y);
            assert!(q.is_square(), "not square: {:?}", q);

            let side = q.width();
            assert!(side >= LENGTHS.min as f64 - 1e-6 && side <= LENGTHS.max as f64 + 1e-6);
            assert!((side - side.round()).abs() < 1e-6, "side not integral: {}", side);

            assert!(q.min_x >= DOMAIN.min && q.min_x < DOMAIN.max);
            assert!(q.min_y >= DOMAIN.min && q.min_y < DOMAIN.max);
            assert!(q.max_x <= DOMAIN.max + LENGTHS.max as f64);
            assert!(q.max_y <= DOMAIN.max + LENGTHS.max as f64);
        }
    }

    #[test]
    fn test_length_bounds_are_inclusive() {
        let lengths = LengthRange { min: 1, max: 2 };
        let mut rng = StdRng::seed_from_u64(1);
        let mut seen = [false; 3];
        for _ in 0..1_000 {
            let q = random_square(&mut rng, DOMAIN, lengths);
            seen[q.width().round() as usize] = true;
        }
        assert!(seen[1] && seen[2]);
    }

    #[test]
    fn test_same_seed_same_queries() {
        let mut a = seeded(42);
        let mut b = seeded(42);
        for _ in 0..100 {
            assert_eq!(a.generate(), b.generate());
        }
    }

    #[test]
    fn test_users_get_distinct_streams() {
        let mut config = crate::ScenarioConfig::preset("featureserver", "http://localhost").unwrap();
        config.seed = Some(99);
        let mut user0 = QueryGenerator::for_user(&config, 0);
        let mut user1 = QueryGenerator::for_user(&config, 1);
        assert_ne!(user0.generate(), user1.generate());
    }

    #[test]
    fn test_fixed_selection_repeats_box() {
        let bbox = BoundingBox::new(100.0, 100.0, 5000.0, 5000.0);
        let mut gen = QueryGenerator::with_rng(
            QuerySelection::Fixed { bbox },
            DOMAIN,
            LENGTHS,
            StdRng::seed_from_u64(0),
        );
        assert_eq!(gen.generate(), bbox);
        assert_eq!(gen.generate(), bbox);
    }

    #[test]
    fn test_think_time_within_range() {
        let think = ThinkTime::new(ThinkTimeRange { min: 1000, max: 5000 });
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..1_000 {
            let pause = think.sample(&mut rng);
            assert!(pause >= Duration::from_millis(1000));
            assert!(pause <= Duration::from_millis(5000));
        }
    }

    #[test]
    fn test_zero_think_time() {
        let think = ThinkTime::new(ThinkTimeRange { min: 0, max: 0 });
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(think.sample(&mut rng), Duration::ZERO);
    }
}
