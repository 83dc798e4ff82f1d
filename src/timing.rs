//! Frequency arithmetic for a 16-bit counter with a 16-bit prescaler.

/// The number of distinct values the pulse timer's counter can hold.
pub const COUNTER_RANGE: u32 = 65536;

/// The largest value the prescaler register accepts.
pub const MAX_PRESCALER: u32 = 65535;

/// The register values needed to make a timer overflow at (roughly) a
/// particular frequency.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Timing {
    /// The prescaler register value. The counter is clocked at
    /// `base / (prescaler + 1)`.
    pub prescaler: u16,
    /// The number of counter ticks per pulse (i.e. the auto-reload value plus
    /// one).
    pub period: u16,
}

impl Timing {
    /// The compare value which gives a 50% duty pulse.
    #[inline]
    pub fn compare(&self) -> u16 { self.period / 2 }

    /// The frequency the timer will actually generate when clocked from
    /// `base_frequency`.
    #[inline]
    pub fn frequency(&self, base_frequency: u32) -> u32 {
        let divisor = (u64::from(self.prescaler) + 1) * u64::from(self.period);
        (u64::from(base_frequency) / divisor) as u32
    }
}

/// Why a frequency couldn't be turned into a [`Timing`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimingError {
    /// The prescaler would need to be larger than [`MAX_PRESCALER`].
    #[error("frequency is too low for the timer")]
    FrequencyTooLow,
    /// The period would be less than one counter tick (or the frequency was
    /// zero).
    #[error("frequency is too high for the timer")]
    FrequencyTooHigh,
}

/// Find the prescaler and period which make a timer clocked at
/// `base_frequency` overflow at `target_frequency`.
///
/// The smallest prescaler that fits the counter is always chosen, which keeps
/// the period (and therefore the resolution) as large as possible.
///
/// # Note
///
/// Everything is integer division, so the generated frequency,
/// [`Timing::frequency()`], is never lower than the target and overshoots it
/// by a relative error of less than `1 / period`. Frequencies that need a
/// small period (i.e. close to `base_frequency`) are the least accurate.
pub fn compute_period_prescaler(
    base_frequency: u32,
    target_frequency: u32,
) -> Result<Timing, TimingError> {
    if target_frequency == 0 {
        return Err(TimingError::FrequencyTooHigh);
    }

    let ticks_per_pulse = base_frequency / target_frequency;
    let prescaler = ticks_per_pulse / COUNTER_RANGE;

    if prescaler > MAX_PRESCALER {
        return Err(TimingError::FrequencyTooLow);
    }

    let period = ticks_per_pulse / (prescaler + 1);

    if period < 1 {
        return Err(TimingError::FrequencyTooHigh);
    }

    // ticks_per_pulse < COUNTER_RANGE * (prescaler + 1), so both fit in 16 bits
    Ok(Timing {
        prescaler: prescaler as u16,
        period: period as u16,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: u32 = 72_000_000;

    #[test]
    fn one_kilohertz_needs_a_single_prescaler_step() {
        let got = compute_period_prescaler(BASE, 1000).unwrap();

        assert_eq!(got, Timing { prescaler: 1, period: 36_000 });
        assert_eq!(got.compare(), 18_000);
        assert_eq!(got.frequency(BASE), 1000);
    }

    #[test]
    fn high_frequencies_use_the_raw_clock() {
        let got = compute_period_prescaler(BASE, 200_000).unwrap();

        assert_eq!(got, Timing { prescaler: 0, period: 360 });
    }

    #[test]
    fn low_frequencies_need_a_prescaler() {
        let got = compute_period_prescaler(BASE, 10).unwrap();

        assert_eq!(got.prescaler, 109);
        assert_eq!(got.period, 65_454);
        // 72e6 / (110 * 65454) = 10.00001...
        assert_eq!(got.frequency(BASE), 10);
    }

    #[test]
    fn zero_is_rejected() {
        assert_eq!(
            compute_period_prescaler(BASE, 0),
            Err(TimingError::FrequencyTooHigh)
        );
    }

    #[test]
    fn faster_than_the_base_clock_is_rejected() {
        assert_eq!(
            compute_period_prescaler(BASE, BASE + 1),
            Err(TimingError::FrequencyTooHigh)
        );
        assert!(compute_period_prescaler(BASE, BASE).is_ok());
    }

    #[test]
    fn slowest_possible_frequency_still_fits() {
        let got = compute_period_prescaler(u32::max_value(), 1).unwrap();

        assert_eq!(u32::from(got.prescaler), MAX_PRESCALER);
        assert_eq!(got.period, 65_535);
    }

    #[test]
    fn rounding_error_is_bounded_by_the_period() {
        for &target in &[1, 7, 333, 1_000, 47_123, 250_000, 1_500_000, 3_200_000] {
            let timing = compute_period_prescaler(BASE, target).unwrap();
            let actual = timing.frequency(BASE) as f64;
            let error = (actual - target as f64) / target as f64;

            assert!(actual >= target as f64, "{} -> {:?}", target, timing);
            assert!(
                error < 1.0 / f64::from(timing.period),
                "{} Hz -> {} Hz ({:?})",
                target,
                actual,
                timing
            );
        }
    }
}
