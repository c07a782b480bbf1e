use crate::infra::Vec2;

/// Relative speeds below this are treated as no relative motion.
pub const MIN_RELATIVE_SPEED: f64 = 1e-5;

/// Distance between two vessels at their closest point of approach, assuming
/// both hold their current velocity.
pub fn closest_approach(pos_a: Vec2, vel_a: Vec2, pos_b: Vec2, vel_b: Vec2) -> f64 {
    let r = pos_b - pos_a;
    let v = vel_b - vel_a;
    let speed = v.length();

    if speed < MIN_RELATIVE_SPEED {
        return r.length();
    }

    (r.cross(&v) / speed).abs()
}

/// Time until the closest point of approach. Negative once the vessels are
/// opening; zero without relative motion.
pub fn time_to_closest_approach(pos_a: Vec2, vel_a: Vec2, pos_b: Vec2, vel_b: Vec2) -> f64 {
    let r = pos_b - pos_a;
    let v = vel_b - vel_a;
    let speed_sq = v.dot(&v);

    if speed_sq.sqrt() < MIN_RELATIVE_SPEED {
        return 0.0;
    }

    -r.dot(&v) / speed_sq
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_reciprocal_courses_on_collision_line() {
        // B dead ahead closing along the separation vector.
        let cpa = closest_approach(
            Vec2::ZERO,
            Vec2::new(5.0, 0.0),
            Vec2::new(100.0, 0.0),
            Vec2::new(-5.0, 0.0),
        );
        assert!(cpa.abs() < 1e-9);
    }

    #[test]
    fn test_no_relative_motion_returns_separation() {
        let cpa = closest_approach(
            Vec2::new(1.0, 1.0),
            Vec2::new(3.0, 4.0),
            Vec2::new(4.0, 5.0),
            Vec2::new(3.0, 4.0),
        );
        assert!((cpa - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_passing_abeam() {
        // B crosses 30 units to starboard of a stationary A.
        let cpa = closest_approach(
            Vec2::ZERO,
            Vec2::ZERO,
            Vec2::new(-40.0, 30.0),
            Vec2::new(2.0, 0.0),
        );
        assert!((cpa - 30.0).abs() < 1e-9);
        let tcpa =
            time_to_closest_approach(Vec2::ZERO, Vec2::ZERO, Vec2::new(-40.0, 30.0), Vec2::new(2.0, 0.0));
        assert!((tcpa - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_tcpa_negative_when_opening() {
        let tcpa =
            time_to_closest_approach(Vec2::ZERO, Vec2::ZERO, Vec2::new(10.0, 0.0), Vec2::new(1.0, 0.0));
        assert!(tcpa < 0.0);
        assert_eq!(
            time_to_closest_approach(Vec2::ZERO, Vec2::ZERO, Vec2::new(10.0, 0.0), Vec2::ZERO),
            0.0
        );
    }

    proptest! {
        #[test]
        fn cpa_never_exceeds_separation(
            ax in -500.0f64..500.0, ay in -500.0f64..500.0,
            bx in -500.0f64..500.0, by in -500.0f64..500.0,
            vax in -10.0f64..10.0, vay in -10.0f64..10.0,
            vbx in -10.0f64..10.0, vby in -10.0f64..10.0,
        ) {
            let a = Vec2::new(ax, ay);
            let b = Vec2::new(bx, by);
            let cpa = closest_approach(a, Vec2::new(vax, vay), b, Vec2::new(vbx, vby));
            prop_assert!(cpa >= 0.0);
            prop_assert!(cpa <= a.distance(&b) + 1e-6);
        }
    }
}
