//! The DMA source buffers which let a timer stop itself after an exact number
//! of pulses.
//!
//! Every compare event, the DMA copies the next byte of the buffer into the
//! timer's control register. All bytes leave the counter running except the
//! last one, which clears the counter-enable bit. The timer therefore halts
//! on exactly the `n`'th pulse without the CPU being involved.

/// How many pulses a single request may emit when no capacity is specified.
pub const DEFAULT_CAPACITY: usize = 512;

/// The byte written into the timer's control register on every pulse.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct EnableWord {
    /// The control register contents, as configured by the platform.
    pub value: u8,
    /// The counter-enable bit.
    pub run_mask: u8,
}

impl EnableWord {
    /// The control word which keeps the counter running.
    #[inline]
    pub fn running(&self) -> u8 { self.value | self.run_mask }

    /// The control word which halts the counter.
    #[inline]
    pub fn stopped(&self) -> u8 { self.value & !self.run_mask }
}

/// A step count of zero, or one that doesn't fit in the buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{steps} steps can't be armed, expected between 1 and {capacity}")]
pub struct InvalidStepCount {
    pub steps: u16,
    pub capacity: usize,
}

/// A fixed-capacity buffer of control words for one axis.
///
/// The buffer is only ever re-armed in place, so its address stays valid for
/// the DMA for as long as the owner doesn't move.
#[derive(Debug, Clone, PartialEq)]
pub struct AutostopBuffer<const CAPACITY: usize = DEFAULT_CAPACITY> {
    bytes: [u8; CAPACITY],
    armed: usize,
}

impl<const CAPACITY: usize> AutostopBuffer<CAPACITY> {
    pub const fn new() -> Self {
        AutostopBuffer {
            bytes: [0; CAPACITY],
            armed: 0,
        }
    }

    #[inline]
    pub const fn capacity(&self) -> usize { CAPACITY }

    /// Check that `steps` could be armed, without touching the buffer.
    #[inline]
    pub fn check(&self, steps: u16) -> Result<(), InvalidStepCount> {
        if steps == 0 || usize::from(steps) > CAPACITY {
            Err(InvalidStepCount {
                steps,
                capacity: CAPACITY,
            })
        } else {
            Ok(())
        }
    }

    /// Prepare the buffer to stop the timer after `steps` pulses.
    ///
    /// Only the first `steps` bytes are written, anything after that is left
    /// as-is because the DMA will never read it.
    ///
    /// # Caution
    ///
    /// Arming a buffer the DMA is currently streaming from will corrupt the
    /// in-flight pulse count. It's up to the caller to make sure the axis is
    /// idle.
    pub fn arm(
        &mut self,
        steps: u16,
        word: EnableWord,
    ) -> Result<(), InvalidStepCount> {
        self.check(steps)?;

        let last = usize::from(steps) - 1;
        let running = word.running();

        for byte in &mut self.bytes[..last] {
            *byte = running;
        }
        self.bytes[last] = word.stopped();
        self.armed = usize::from(steps);

        Ok(())
    }

    /// The region the DMA should stream from, as set by the most recent
    /// [`AutostopBuffer::arm()`].
    #[inline]
    pub fn armed(&self) -> &[u8] { &self.bytes[..self.armed] }

    /// The entire backing storage, including stale bytes past the armed
    /// region.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] { &self.bytes }
}

impl<const CAPACITY: usize> Default for AutostopBuffer<CAPACITY> {
    fn default() -> Self { AutostopBuffer::new() }
}
