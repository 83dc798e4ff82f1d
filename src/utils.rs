pub(crate) trait Clamp {
    fn clamp(self, lower: Self, upper: Self) -> Self;
}

impl<C: PartialOrd> Clamp for C {
    fn clamp(self, lower: Self, upper: Self) -> Self {
        if self < lower {
            lower
        } else if upper < self {
            upper
        } else {
            self
        }
    }
}

/// The cubic smoothstep, `3x² - 2x³`, for `x` in `[0, 1]`.
///
/// Monotonic, flat at both ends, and hits exactly `0.0` and `1.0` at the
/// boundaries.
pub(crate) fn smoothstep(x: f32) -> f32 {
    let x = Clamp::clamp(x, 0.0, 1.0);
    x * x * (3.0 - 2.0 * x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoothstep_hits_its_end_points() {
        assert_eq!(smoothstep(0.0), 0.0);
        assert_eq!(smoothstep(1.0), 1.0);
        assert_eq!(smoothstep(0.5), 0.5);
        assert_eq!(smoothstep(-3.0), 0.0);
        assert_eq!(smoothstep(42.0), 1.0);
    }

    #[test]
    fn smoothstep_is_monotonic() {
        let mut previous = 0.0;

        for i in 0..=100 {
            let y = smoothstep(i as f32 / 100.0);
            assert!(y >= previous);
            previous = y;
        }
    }
}
