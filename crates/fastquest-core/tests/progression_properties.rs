//! Property tests for the level curve and achievement evaluation.

use std::collections::BTreeSet;

use fastquest_core::{AchievementEngine, Catalog, LevelCurve, ProgressionEngine, UserProgress};
use proptest::prelude::*;

#[test]
fn documented_level_boundaries() {
    let engine = ProgressionEngine::default();
    assert_eq!(engine.compute_level(0), 1);
    assert_eq!(engine.compute_level(199), 1);
    assert_eq!(engine.compute_level(200), 2);
    assert_eq!(engine.compute_level(200 + 300), 3);
    assert_eq!(engine.compute_level(200 + 300 + 450), 4);
}

proptest! {
    #[test]
    fn level_is_at_least_one(points in any::<u64>()) {
        prop_assert!(LevelCurve::default().level_for(points) >= 1);
    }

    #[test]
    fn level_is_monotonic(a in 0u64..10_000_000, b in 0u64..10_000_000) {
        let curve = LevelCurve::default();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(curve.level_for(lo) <= curve.level_for(hi));
    }

    #[test]
    fn custom_curves_stay_monotonic(
        base in 1u64..1_000,
        growth in 1.01f64..3.0,
        a in 0u64..1_000_000,
        b in 0u64..1_000_000,
    ) {
        let curve = LevelCurve::new(base, growth).unwrap();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(curve.level_for(lo) <= curve.level_for(hi));
    }

    #[test]
    fn level_progress_is_consistent(points in 0u64..10_000_000) {
        let lp = LevelCurve::default().level_progress(points);
        prop_assert!(lp.ratio >= 0.0 && lp.ratio < 1.0);
        prop_assert!(lp.points_for_next_level > 0);
        prop_assert!(lp.points_into_level <= points);
    }

    #[test]
    fn evaluation_is_idempotent(points in 0u64..5_000, streak in 0u32..60, total in 0u32..150) {
        let curve = LevelCurve::default();
        let engine = AchievementEngine::new(Catalog::builtin(), curve);
        let progress = UserProgress::from_counters(points, streak, total, BTreeSet::new(), &curve);

        // Same input, same answer.
        prop_assert_eq!(engine.evaluate(&progress), engine.evaluate(&progress));

        // Rewards may push points over a points threshold for the next pass,
        // but once a pass unlocks nothing, every later pass is a no-op.
        let mut current = progress;
        for _ in 0..=engine.catalog().len() {
            let pass = engine.evaluate(&current);
            prop_assert_eq!(pass.progress.level(), curve.level_for(pass.progress.points()));
            let settled = pass.newly_unlocked.is_empty();
            current = pass.progress;
            if settled {
                break;
            }
        }
        let again = engine.evaluate(&current);
        prop_assert!(again.newly_unlocked.is_empty());
        prop_assert_eq!(again.points_awarded, 0);
        prop_assert_eq!(&again.progress, &current);
    }
}
