use crate::{
    error::{Error, Fault},
    ramp::Ramp,
    timing::{self, Timing},
};

/// Which way the motor turns while pulses are being emitted.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    /// `+1` or `-1`, for position arithmetic.
    #[inline]
    pub fn sign(self) -> i32 {
        match self {
            Direction::Forward => 1,
            Direction::Backward => -1,
        }
    }
}

impl Default for Direction {
    fn default() -> Direction { Direction::Forward }
}

/// What an axis is currently doing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum OutputType {
    /// No transfer is in flight and the axis accepts new requests.
    Idle,
    /// Pulses at a fixed frequency.
    ConstOutput,
    /// Speeding up (or cruising) with a linear ramp.
    AccelLinear,
    /// Speeding up (or cruising) along an S-curve.
    AccelS,
    /// Slowing down with a linear ramp.
    DecelLinear,
    /// Slowing down along an S-curve.
    DecelS,
}

impl OutputType {
    #[inline]
    pub fn is_idle(self) -> bool { self == OutputType::Idle }

    /// Does the ramp engine need to look at this axis every tick?
    #[inline]
    pub fn is_ramping(self) -> bool {
        match self {
            OutputType::AccelLinear
            | OutputType::AccelS
            | OutputType::DecelLinear
            | OutputType::DecelS => true,
            OutputType::Idle | OutputType::ConstOutput => false,
        }
    }
}

impl Default for OutputType {
    fn default() -> OutputType { OutputType::Idle }
}

/// The range an axis' frequency and acceleration must stay within.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AxisBounds {
    /// The slowest pulse rate, in `steps/second`.
    pub min_frequency: u32,
    /// The fastest pulse rate, in `steps/second`.
    pub max_frequency: u32,
    /// The smallest rate of change a ramp will use, in `steps/sec/sec`.
    pub min_acceleration: u32,
    /// The acceleration/deceleration rate ramps are planned with, in
    /// `steps/sec/sec`.
    pub max_acceleration: u32,
}

impl AxisBounds {
    pub const DEFAULT_MAX_ACCELERATION: u32 = 10_000;

    /// Sensible defaults for a timer clocked at `base_frequency`: anything from
    /// 1 Hz up to half the timer clock, ramping at up to
    /// [`AxisBounds::DEFAULT_MAX_ACCELERATION`].
    pub fn for_base_frequency(base_frequency: u32) -> AxisBounds {
        AxisBounds {
            min_frequency: 1,
            max_frequency: (base_frequency / 2).max(1),
            min_acceleration: 0,
            max_acceleration: AxisBounds::DEFAULT_MAX_ACCELERATION,
        }
    }

    pub fn with_frequency(mut self, min: u32, max: u32) -> AxisBounds {
        self.min_frequency = min;
        self.max_frequency = max;
        self
    }

    pub fn with_acceleration(mut self, min: u32, max: u32) -> AxisBounds {
        self.min_acceleration = min;
        self.max_acceleration = max;
        self
    }

    /// Make sure every frequency in the range can be generated by a timer
    /// clocked at `base_frequency`.
    ///
    /// Checking both ends is enough: the prescaler only grows as the
    /// frequency drops and the period only shrinks as it rises.
    pub fn validate(&self, base_frequency: u32) -> Result<(), Error> {
        timing::compute_period_prescaler(base_frequency, self.min_frequency)?;
        timing::compute_period_prescaler(base_frequency, self.max_frequency)?;

        if self.min_frequency > self.max_frequency {
            return Err(Error::FrequencyOutOfBounds {
                frequency: self.min_frequency,
                min: self.min_frequency,
                max: self.max_frequency,
            });
        }

        if self.min_acceleration > self.max_acceleration {
            return Err(Error::InvalidAcceleration);
        }

        Ok(())
    }

    /// Make sure `frequency` is within bounds.
    pub fn check_frequency(&self, frequency: u32) -> Result<(), Error> {
        if frequency < self.min_frequency || frequency > self.max_frequency {
            Err(Error::FrequencyOutOfBounds {
                frequency,
                min: self.min_frequency,
                max: self.max_frequency,
            })
        } else {
            Ok(())
        }
    }
}

/// The configuration and live state of a single stepper channel.
#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    id: usize,
    base_frequency: u32,
    bounds: AxisBounds,

    pub(crate) position: i32,
    pub(crate) direction: Direction,
    pub(crate) output: OutputType,
    pub(crate) fault: Option<Fault>,

    pub(crate) current_frequency: f32,
    pub(crate) current_acceleration: f32,
    /// Steps requested for the in-flight transfer.
    pub(crate) steps_requested: u16,
    /// Where we were when the transfer was armed.
    pub(crate) position_at_arm: i32,
    /// The registers currently loaded into the timer, if known.
    pub(crate) timing: Option<Timing>,
    pub(crate) ramp: Ramp,
    /// The tick the frequency was last recalculated on.
    pub(crate) last_tick: u32,
}

impl Axis {
    pub(crate) fn new(id: usize, base_frequency: u32) -> Axis {
        Axis {
            id,
            base_frequency,
            bounds: AxisBounds::for_base_frequency(base_frequency),
            position: 0,
            direction: Direction::Forward,
            output: OutputType::Idle,
            fault: None,
            current_frequency: 0.0,
            current_acceleration: 0.0,
            steps_requested: 0,
            position_at_arm: 0,
            timing: None,
            ramp: Ramp::default(),
            last_tick: 0,
        }
    }

    #[inline]
    pub fn id(&self) -> usize { self.id }

    /// The frequency the axis' timer is clocked at, in Hz.
    #[inline]
    pub fn base_frequency(&self) -> u32 { self.base_frequency }

    #[inline]
    pub fn bounds(&self) -> &AxisBounds { &self.bounds }

    pub(crate) fn set_bounds(&mut self, bounds: AxisBounds) { self.bounds = bounds; }

    /// The last position recorded by the engine.
    ///
    /// While a transfer is in flight this is only as fresh as the last ramp
    /// tick. Use [`Engine::query_position()`] for a live estimate.
    ///
    /// [`Engine::query_position()`]: crate::Engine::query_position
    #[inline]
    pub fn position(&self) -> i32 { self.position }

    #[inline]
    pub fn direction(&self) -> Direction { self.direction }

    #[inline]
    pub fn output(&self) -> OutputType { self.output }

    #[inline]
    pub fn fault(&self) -> Option<Fault> { self.fault }

    /// The frequency most recently programmed into the timer, in Hz.
    #[inline]
    pub fn current_frequency(&self) -> f32 { self.current_frequency }

    /// The rate the frequency changed at on the last ramp tick, in
    /// `steps/sec/sec`.
    #[inline]
    pub fn current_acceleration(&self) -> f32 { self.current_acceleration }

    #[inline]
    pub fn steps_requested(&self) -> u16 { self.steps_requested }

    /// The timer registers currently in use, if the axis has ever run.
    #[inline]
    pub fn timing(&self) -> Option<Timing> { self.timing }

    /// Where the axis is after `remaining` of the requested pulses are yet to
    /// be emitted.
    pub(crate) fn position_with_remaining(&self, remaining: u16) -> i32 {
        let remaining = remaining.min(self.steps_requested);
        let done = i32::from(self.steps_requested - remaining);

        self.position_at_arm
            .wrapping_add(self.direction.sign().wrapping_mul(done))
    }
}
