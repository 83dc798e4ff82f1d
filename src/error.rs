use crate::{autostop::InvalidStepCount, timing::TimingError};

/// Everything that can go wrong when talking to the [`Engine`].
///
/// Validation errors are returned synchronously, before any axis state,
/// buffer or timer register is touched.
///
/// [`Engine`]: crate::Engine
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The axis index doesn't refer to a bound axis.
    #[error("axis {0} is not bound")]
    InvalidAxis(usize),
    /// The axis is still emitting pulses from a previous request.
    #[error("axis {0} is busy")]
    AxisBusy(usize),
    /// The frequency can't be represented by the pulse timer.
    ///
    /// Use [`Error::is_invalid_frequency()`] to also catch
    /// [`Error::FrequencyOutOfBounds`].
    #[error("invalid frequency: {0}")]
    InvalidFrequency(#[from] TimingError),
    /// The frequency is representable but outside the axis' configured
    /// bounds.
    #[error("{frequency} Hz is outside the configured range [{min}, {max}] Hz")]
    FrequencyOutOfBounds { frequency: u32, min: u32, max: u32 },
    #[error(transparent)]
    InvalidStepCount(#[from] InvalidStepCount),
    /// Acceleration bounds are inverted, or an accelerated request was made
    /// while the maximum acceleration is zero.
    #[error("invalid acceleration bounds")]
    InvalidAcceleration,
    /// Decelerating to the terminal frequency would take more steps than
    /// were requested.
    #[error("the ramp needs {required} steps to decelerate but only {steps} were requested")]
    ProfileInfeasible { steps: u16, required: u32 },
    /// A fault was latched from interrupt context and hasn't been cleared.
    #[error("hardware fault: {0}")]
    HardwareFault(Fault),
    #[error("{requested} axes were bound but at most {max} are supported")]
    TooManyAxes { requested: usize, max: usize },
}

impl Error {
    /// Is this one of the "the frequency you asked for won't work" errors?
    ///
    /// Covers both [`Error::InvalidFrequency`] and
    /// [`Error::FrequencyOutOfBounds`], so callers don't need to match on
    /// each.
    pub fn is_invalid_frequency(&self) -> bool {
        matches!(
            self,
            Error::InvalidFrequency(_) | Error::FrequencyOutOfBounds { .. }
        )
    }
}

/// A hardware problem detected inside an interrupt handler.
///
/// Faults are latched against the axis instead of being propagated, and
/// stay visible through [`Engine::query_state()`] until cleared with
/// [`Engine::clear_fault()`].
///
/// [`Engine::query_state()`]: crate::Engine::query_state
/// [`Engine::clear_fault()`]: crate::Engine::clear_fault
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Fault {
    /// The DMA channel reported a transfer error.
    #[error("DMA transfer error")]
    Transfer,
    /// The ramp produced a frequency the timer couldn't be programmed for.
    #[error("timer could not be reprogrammed")]
    Timing,
    /// The direction output couldn't be driven.
    #[error("direction output failed")]
    Direction,
}
