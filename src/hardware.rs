use crate::{autostop::EnableWord, axis::Direction};
use void::Void;

/// A timer channel which emits one pulse per overflow on its compare output.
///
/// Implementations are expected to be thin wrappers around register writes.
/// Every method is called from interrupt context at some point, so none of
/// them may block.
pub trait PulseTimer {
    /// Set the prescaler register. The counter runs at
    /// `base_frequency / (prescaler + 1)`.
    fn set_prescaler(&mut self, prescaler: u16);
    /// Set the number of counter ticks per pulse. The auto-reload register
    /// should receive `period - 1`.
    fn set_period(&mut self, period: u16);
    /// Set the number of counter ticks the output stays high for.
    fn set_compare(&mut self, compare: u16);
    /// Force the shadow registers to load, so a new prescaler takes effect
    /// immediately.
    fn generate_update_event(&mut self);

    /// Enable the compare channel and the main output.
    fn enable_output(&mut self);
    /// Disable the compare channel and the main output.
    fn disable_output(&mut self);
    /// Let compare events trigger a DMA transfer.
    fn enable_dma_request(&mut self);
    fn disable_dma_request(&mut self);

    /// Set the counter-enable bit.
    fn start_counter(&mut self);
    /// Clear the counter-enable bit.
    fn stop_counter(&mut self);

    /// The contents of the control register the DMA writes into, and which
    /// bit in it keeps the counter running.
    fn enable_word(&self) -> EnableWord;
    /// The address of the control register the DMA writes into.
    fn control_register(&self) -> u32;
}

/// A memory-to-peripheral DMA channel triggered by a [`PulseTimer`].
pub trait DmaChannel {
    /// Point the channel at a new transfer of `source.len()` bytes. Only
    /// called while the channel is disabled.
    ///
    /// # Caution
    ///
    /// The hardware keeps reading from `source` after this returns, so
    /// implementations will typically stash `source.as_ptr()`. The engine
    /// guarantees the memory stays put until the transfer completes or is
    /// aborted.
    fn configure(&mut self, source: &[u8], destination: u32);
    fn enable(&mut self);
    fn disable(&mut self);
    fn enable_completion_interrupt(&mut self);
    /// How many bytes are yet to be transferred. Reading this must not
    /// disturb the transfer.
    fn remaining(&self) -> u16;
    /// Has the channel flagged a transfer error?
    fn transfer_error(&self) -> bool { false }
}

/// Something which sets the direction the motor turns.
pub trait DirectionOutput {
    /// The type of error that may be encountered when setting the direction.
    ///
    /// Use `!` (or `void::Void` on stable) if this can never fail.
    type Error;

    fn set_direction(&mut self, direction: Direction) -> Result<(), Self::Error>;
}

/// For axes whose direction is hard-wired.
impl DirectionOutput for () {
    type Error = Void;

    fn set_direction(&mut self, _direction: Direction) -> Result<(), Void> { Ok(()) }
}

impl<'a, O: DirectionOutput> DirectionOutput for &'a mut O {
    type Error = O::Error;

    fn set_direction(&mut self, direction: Direction) -> Result<(), O::Error> {
        (**self).set_direction(direction)
    }
}

/// A [`DirectionOutput`] which will call one function when switching to
/// forwards, and another when switching to backwards.
///
/// See [`fallible_func_direction()`] for a version which accepts fallible
/// callbacks.
pub fn func_direction<F, B, T>(forward: F, backward: B) -> impl DirectionOutput<Error = Void>
where
    F: FnMut() -> T,
    B: FnMut() -> T,
{
    Infallible { forward, backward }
}

struct Infallible<F, B> {
    forward: F,
    backward: B,
}

impl<F, B, T> DirectionOutput for Infallible<F, B>
where
    F: FnMut() -> T,
    B: FnMut() -> T,
{
    type Error = Void;

    #[inline]
    fn set_direction(&mut self, direction: Direction) -> Result<(), Self::Error> {
        match direction {
            Direction::Forward => (self.forward)(),
            Direction::Backward => (self.backward)(),
        };

        Ok(())
    }
}

/// A direction output which uses callbacks which may fail.
///
/// See [`func_direction()`] for a version which uses infallible callbacks.
pub fn fallible_func_direction<F, B, T, E>(
    forward: F,
    backward: B,
) -> impl DirectionOutput<Error = E>
where
    F: FnMut() -> Result<T, E>,
    B: FnMut() -> Result<T, E>,
{
    Fallible { forward, backward }
}

struct Fallible<F, B> {
    forward: F,
    backward: B,
}

impl<F, B, T, E> DirectionOutput for Fallible<F, B>
where
    F: FnMut() -> Result<T, E>,
    B: FnMut() -> Result<T, E>,
{
    type Error = E;

    #[inline]
    fn set_direction(&mut self, direction: Direction) -> Result<(), Self::Error> {
        match direction {
            Direction::Forward => (self.forward)()?,
            Direction::Backward => (self.backward)()?,
        };

        Ok(())
    }
}
