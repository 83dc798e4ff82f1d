//! Tick-driven frequency ramps.
//!
//! A ramp is planned when an accelerated request is accepted, then advanced
//! by [`Engine::on_tick()`] while the DMA keeps streaming the autostop
//! buffer. The ramp only ever rewrites the timer's prescaler, period and
//! compare registers, so the in-flight pulse count is never disturbed.
//!
//! An accelerating move speeds up from its start frequency toward the
//! target, cruises, and once the remaining pulses are within stopping
//! distance it slows back down to the start frequency. A decelerating move
//! (target below start) slows down right away and then holds the target.
//!
//! # Ramp laws
//!
//! Stopping distance for a change from `f₀` to `f₁` at `a` steps/sec/sec is
//! `(f₀² - f₁²) / 2a` steps.
//!
//! - [`RampLaw::Linear`] changes the frequency by `a` every second.
//! - [`RampLaw::SCurve`] follows the smoothstep `h(p) = 3p² - 2p³` over the
//!   distance travelled, where `p` goes from 0 to 1 over the ramp. The
//!   frequency reaches its terminal value exactly when the deceleration
//!   distance runs out.
//!
//! Along a curve spread over `S` steps, the rate of change in time is
//! `f · df/ds = (f₀ + Δh(p)) · Δh'(p) / S`. That is largest when starting from
//! rest, where it peaks at `max(h·h') · Δ² / S ≈ 0.990 Δ² / S` (near
//! `p ≈ 0.69`). The linear law needs `Δ² / 2a` steps for the same change, so
//! stretching the S-curve over twice the linear distance keeps it at or below
//! `a` everywhere.
//!
//! Both laws are monotonic, never change the frequency by more than
//! `max_acceleration` per second, and never leave the axis' frequency bounds.

use crate::{
    axis::{AxisBounds, OutputType},
    engine::Engine,
    error::{Error, Fault},
    hardware::{DmaChannel, PulseTimer},
    tick,
    timing,
    utils::{smoothstep, Clamp},
};

/// How an accelerated request changes frequency over time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RampLaw {
    /// Constant acceleration.
    Linear,
    /// Acceleration eases in and out following a cubic smoothstep.
    SCurve,
}

impl RampLaw {
    fn distance_factor(self) -> f32 {
        match self {
            RampLaw::Linear => 1.0,
            RampLaw::SCurve => 2.0,
        }
    }

    /// The number of steps needed to go from one frequency to another at
    /// `acceleration` steps/sec/sec.
    pub fn distance(self, from: f32, to: f32, acceleration: f32) -> f32 {
        let delta = libm::fabsf(from * from - to * to);

        if delta == 0.0 {
            0.0
        } else if acceleration <= 0.0 {
            f32::INFINITY
        } else {
            self.distance_factor() * delta / (2.0 * acceleration)
        }
    }

    pub fn accelerating(self) -> OutputType {
        match self {
            RampLaw::Linear => OutputType::AccelLinear,
            RampLaw::SCurve => OutputType::AccelS,
        }
    }

    pub fn decelerating(self) -> OutputType {
        match self {
            RampLaw::Linear => OutputType::DecelLinear,
            RampLaw::SCurve => OutputType::DecelS,
        }
    }
}

impl Default for RampLaw {
    fn default() -> RampLaw { RampLaw::Linear }
}

/// The plan for one accelerated transfer.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub(crate) struct Ramp {
    pub(crate) law: RampLaw,
    /// Where acceleration starts from.
    pub(crate) start: f32,
    /// The frequency to cruise at.
    pub(crate) cruise: f32,
    /// The terminal frequency.
    pub(crate) end: f32,
    /// Steps over which an S-curve reaches `cruise`.
    pub(crate) accel_span: f32,
    /// The frequency deceleration started at.
    pub(crate) decel_from: f32,
    /// Steps over which an S-curve reaches `end`.
    pub(crate) decel_span: f32,
    /// The remaining count at which deceleration is finished.
    pub(crate) decel_until: f32,
}

impl Ramp {
    /// Plan a transfer of `steps` pulses, returning the ramp and the state
    /// the axis starts in.
    pub(crate) fn plan(
        law: RampLaw,
        steps: u16,
        start: f32,
        target: f32,
        acceleration: f32,
    ) -> Result<(Ramp, OutputType), Error> {
        let span = law.distance(start, target, acceleration);

        if span > f32::from(steps) {
            return Err(Error::ProfileInfeasible {
                steps,
                required: saturating_steps(span),
            });
        }

        if target >= start {
            let ramp = Ramp {
                law,
                start,
                cruise: target,
                end: start,
                accel_span: span,
                decel_from: target,
                decel_span: span,
                decel_until: 0.0,
            };

            Ok((ramp, law.accelerating()))
        } else {
            let ramp = Ramp {
                law,
                start,
                cruise: start,
                end: target,
                accel_span: 0.0,
                decel_from: start,
                decel_span: span,
                decel_until: f32::from(steps) - span,
            };

            Ok((ramp, law.decelerating()))
        }
    }

    /// Work out the next frequency.
    ///
    /// `done` and `remaining` are pulse counts for the current transfer and
    /// `dt` is the time since the last recalculation, in seconds.
    pub(crate) fn advance(
        &mut self,
        output: OutputType,
        frequency: f32,
        done: u16,
        remaining: u16,
        dt: f32,
        bounds: &AxisBounds,
    ) -> (OutputType, f32) {
        let max_step = bounds.max_acceleration as f32 * dt;
        let min_step = bounds.min_acceleration as f32 * dt;
        let remaining = f32::from(remaining);
        let mut output = output;

        if output == OutputType::AccelLinear || output == OutputType::AccelS {
            let stopping = self.law.distance(
                frequency,
                self.end,
                bounds.max_acceleration as f32,
            );

            if remaining <= stopping {
                output = self.law.decelerating();
                self.decel_from = frequency;
                self.decel_span = remaining;
                self.decel_until = 0.0;
            }
        }

        let next = match output {
            OutputType::AccelLinear => (frequency + max_step).min(self.cruise),
            OutputType::AccelS => {
                let progress = if self.accel_span > 0.0 {
                    f32::from(done) / self.accel_span
                } else {
                    1.0
                };
                let curve =
                    self.start + (self.cruise - self.start) * smoothstep(progress);

                curve
                    .max(frequency + min_step)
                    .min(frequency + max_step)
                    .min(self.cruise)
            },
            OutputType::DecelLinear => (frequency - max_step).max(self.end),
            OutputType::DecelS => {
                let progress = if self.decel_span > 0.0 {
                    (remaining - self.decel_until) / self.decel_span
                } else {
                    0.0
                };
                let curve =
                    self.end + (self.decel_from - self.end) * smoothstep(progress);

                curve
                    .min(frequency - min_step)
                    .max(frequency - max_step)
                    .max(self.end)
            },
            OutputType::Idle | OutputType::ConstOutput => frequency,
        };

        let next = Clamp::clamp(
            next,
            bounds.min_frequency as f32,
            bounds.max_frequency as f32,
        );

        (output, next)
    }
}

fn saturating_steps(steps: f32) -> u32 {
    let steps = libm::ceilf(steps);

    if steps >= u32::max_value() as f32 {
        u32::max_value()
    } else {
        steps as u32
    }
}

impl<T, D, P, const CAPACITY: usize> Engine<T, D, P, CAPACITY>
where
    T: PulseTimer,
    D: DmaChannel,
{
    /// The periodic tick handler.
    ///
    /// Stops any active axis whose DMA channel reported a transfer error, then
    /// recomputes the frequency of every accelerating or decelerating axis.
    /// This does a bounded amount of arithmetic per axis and never blocks.
    pub fn on_tick(&mut self) {
        self.advance_tick();

        for axis in 0..self.slots.len() {
            self.tick_axis(axis);
        }
    }

    /// Bump the tick counter without touching any axes.
    ///
    /// [`Engine::on_tick()`] is equivalent to calling this followed by
    /// [`Engine::tick_axis()`] for every axis. Splitting them up lets a
    /// caller release its critical section between axes.
    pub fn advance_tick(&mut self) -> u32 {
        self.ticks = self.ticks.wrapping_add(1);
        self.ticks
    }

    /// Check a single axis for transfer errors and advance its ramp.
    pub fn tick_axis(&mut self, axis: usize) {
        let now = self.ticks;
        let tick_frequency = self.config.tick_frequency as f32;

        let slot = match self.slots.get_mut(axis) {
            Some(slot) if !slot.axis.output.is_idle() => slot,
            _ => return,
        };

        if slot.binding.dma.transfer_error() {
            let remaining = slot.halt();
            slot.axis.fault = Some(Fault::Transfer);
            log::warn!(
                "Axis {} stopped by a DMA transfer error with {} steps to go",
                axis,
                remaining
            );
            return;
        }

        // a constant rate axis stops itself
        if !slot.axis.output.is_ramping() {
            return;
        }

        let remaining = slot.binding.dma.remaining().min(slot.axis.steps_requested);
        let done = slot.axis.steps_requested - remaining;
        slot.axis.position = slot.axis.position_with_remaining(remaining);

        let dt = tick::elapsed(now, slot.axis.last_tick) as f32 / tick_frequency;
        slot.axis.last_tick = now;

        let bounds = *slot.axis.bounds();
        let previous = slot.axis.current_frequency;
        let (output, next) = slot.axis.ramp.advance(
            slot.axis.output,
            previous,
            done,
            remaining,
            dt,
            &bounds,
        );

        if output != slot.axis.output {
            log::debug!(
                "Axis {} decelerating from {} Hz with {} steps to go",
                axis,
                previous,
                remaining
            );
            slot.axis.output = output;
        }

        let commanded = Clamp::clamp(
            libm::roundf(next) as u32,
            bounds.min_frequency,
            bounds.max_frequency,
        );

        match timing::compute_period_prescaler(slot.axis.base_frequency(), commanded) {
            Ok(t) => {
                slot.load_timing(t);
                slot.axis.current_frequency = next;
                slot.axis.current_acceleration = libm::fabsf(next - previous) / dt;
                log::trace!("Axis {} at {} Hz ({:?})", axis, next, t);
            },
            Err(e) => {
                if slot.axis.fault.is_none() {
                    log::warn!("Axis {} can't be programmed for {} Hz: {}", axis, commanded, e);
                }
                slot.axis.fault = Some(Fault::Timing);
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(got: f32, expected: f32) {
        assert!(
            libm::fabsf(got - expected) < 1e-3,
            "{} != {}",
            got,
            expected
        );
    }

    fn bounds() -> AxisBounds {
        AxisBounds::for_base_frequency(72_000_000)
            .with_frequency(100, 10_000)
            .with_acceleration(0, 1000)
    }

    #[test]
    fn distance_follows_the_kinematics() {
        // (2000² - 1000²) / (2 * 1000)
        assert_eq!(RampLaw::Linear.distance(2000.0, 1000.0, 1000.0), 1500.0);
        assert_eq!(RampLaw::Linear.distance(1000.0, 2000.0, 1000.0), 1500.0);
        assert_eq!(RampLaw::SCurve.distance(2000.0, 1000.0, 1000.0), 3000.0);
        assert_eq!(RampLaw::Linear.distance(5.0, 5.0, 0.0), 0.0);
        assert!(RampLaw::Linear.distance(5.0, 6.0, 0.0).is_infinite());
    }

    #[test]
    fn decelerating_too_hard_is_infeasible() {
        let got = Ramp::plan(RampLaw::Linear, 100, 2000.0, 1000.0, 1000.0);

        assert_eq!(
            got.unwrap_err(),
            Error::ProfileInfeasible {
                steps: 100,
                required: 1500
            }
        );
    }

    #[test]
    fn accelerating_moves_start_in_an_accel_state() {
        let (ramp, output) =
            Ramp::plan(RampLaw::SCurve, 500, 100.0, 500.0, 1000.0).unwrap();

        assert_eq!(output, OutputType::AccelS);
        assert_eq!(ramp.end, 100.0);
        assert_eq!(ramp.cruise, 500.0);
        // 2 * (500² - 100²) / 2000
        assert_eq!(ramp.accel_span, 240.0);
    }

    #[test]
    fn decelerating_moves_finish_early_then_hold() {
        let (ramp, output) =
            Ramp::plan(RampLaw::Linear, 500, 500.0, 100.0, 1000.0).unwrap();

        assert_eq!(output, OutputType::DecelLinear);
        assert_eq!(ramp.end, 100.0);
        assert_eq!(ramp.decel_until, 380.0);
    }

    #[test]
    fn linear_acceleration_is_capped_at_cruise() {
        let (mut ramp, output) =
            Ramp::plan(RampLaw::Linear, 10_000, 100.0, 1000.0, 1000.0).unwrap();

        let (output, f) = ramp.advance(output, 100.0, 0, 10_000, 0.1, &bounds());
        assert_eq!(output, OutputType::AccelLinear);
        assert_close(f, 200.0);

        let (_, f) = ramp.advance(output, 950.0, 100, 9_900, 0.1, &bounds());
        assert_close(f, 1000.0);
    }

    #[test]
    fn switch_to_deceleration_within_stopping_distance() {
        let (mut ramp, output) =
            Ramp::plan(RampLaw::Linear, 10_000, 100.0, 1000.0, 1000.0).unwrap();

        // stopping from 1000 Hz back to 100 Hz takes 495 steps
        let (output, f) = ramp.advance(output, 1000.0, 9_600, 400, 0.001, &bounds());

        assert_eq!(output, OutputType::DecelLinear);
        assert_close(f, 999.0);
        assert_eq!(ramp.decel_from, 1000.0);
    }

    #[test]
    fn s_curve_deceleration_lands_on_the_end_frequency() {
        let (mut ramp, _) =
            Ramp::plan(RampLaw::SCurve, 1000, 100.0, 1000.0, 1000.0).unwrap();
        ramp.decel_from = 1000.0;
        ramp.decel_span = 200.0;
        ramp.decel_until = 0.0;

        let (_, halfway) =
            ramp.advance(OutputType::DecelS, 1000.0, 900, 100, 1.0, &bounds());
        let (_, last) = ramp.advance(OutputType::DecelS, halfway, 1000, 0, 1.0, &bounds());

        assert_close(halfway, 550.0);
        assert_close(last, 100.0);
    }

    #[test]
    fn minimum_acceleration_keeps_an_s_curve_moving() {
        let bounds = bounds().with_acceleration(200, 1000);
        let (mut ramp, output) =
            Ramp::plan(RampLaw::SCurve, 10_000, 100.0, 1000.0, 1000.0).unwrap();

        // no steps have been emitted, so the curve alone would be flat
        let (_, f) = ramp.advance(output, 100.0, 0, 10_000, 0.01, &bounds);

        assert_close(f, 102.0);
    }

    #[test]
    fn s_curve_is_capped_at_the_maximum_acceleration() {
        let (mut ramp, output) =
            Ramp::plan(RampLaw::SCurve, 10_000, 100.0, 1000.0, 1000.0).unwrap();

        // lagging well behind the curve, it may only catch up at 1000 Hz/s
        let (output, f) = ramp.advance(output, 100.0, 900, 9_100, 0.01, &bounds());
        assert_eq!(output, OutputType::AccelS);
        assert_close(f, 110.0);

        let (_, f) = ramp.advance(OutputType::DecelS, 1000.0, 9_999, 1, 0.01, &bounds());
        assert_close(f, 990.0);
    }

    #[test]
    fn never_leaves_the_frequency_bounds() {
        let bounds = bounds().with_frequency(150, 800);
        let (mut ramp, output) =
            Ramp::plan(RampLaw::Linear, 10_000, 150.0, 800.0, 1000.0).unwrap();
        ramp.end = 50.0;

        let (_, f) = ramp.advance(output, 800.0, 100, 9_900, 10.0, &bounds);
        assert_close(f, 800.0);

        let (_, f) = ramp.advance(OutputType::DecelLinear, 200.0, 9_999, 1, 10.0, &bounds);
        assert_close(f, 150.0);
    }
}
