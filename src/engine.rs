use crate::{
    autostop::{AutostopBuffer, DEFAULT_CAPACITY},
    axis::{Axis, AxisBounds, Direction, OutputType},
    error::{Error, Fault},
    hardware::{DirectionOutput, DmaChannel, PulseTimer},
    tick::TickSource,
    timing::{self, Timing, TimingError},
};
use arrayvec::ArrayVec;

/// The most axes a single [`Engine`] can drive.
pub const MAX_AXES: usize = 4;

/// How often [`Engine::on_tick()`] is expected to be called when not
/// otherwise configured, in Hz.
pub const DEFAULT_TICK_FREQUENCY: u32 = 1000;

/// Engine-wide settings.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// The rate the platform calls [`Engine::on_tick()`] at, in Hz.
    pub tick_frequency: u32,
}

impl Default for EngineConfig {
    fn default() -> EngineConfig {
        EngineConfig {
            tick_frequency: DEFAULT_TICK_FREQUENCY,
        }
    }
}

/// The peripherals an axis is wired to, as handed over by the platform.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisBinding<T, D, P = ()> {
    pub timer: T,
    pub dma: D,
    pub direction: P,
    /// The frequency `timer` is clocked at, in Hz.
    pub base_frequency: u32,
}

impl<T, D> AxisBinding<T, D> {
    /// Bind a timer and DMA channel, with no direction output.
    pub fn new(timer: T, dma: D, base_frequency: u32) -> Self {
        AxisBinding {
            timer,
            dma,
            direction: (),
            base_frequency,
        }
    }
}

impl<T, D, P> AxisBinding<T, D, P> {
    /// Use `direction` to set which way the motor turns.
    pub fn with_direction<Q>(self, direction: Q) -> AxisBinding<T, D, Q> {
        AxisBinding {
            timer: self.timer,
            dma: self.dma,
            direction,
            base_frequency: self.base_frequency,
        }
    }
}

/// Everything belonging to one axis.
#[derive(Debug)]
pub(crate) struct Slot<T, D, P, const CAPACITY: usize> {
    pub(crate) axis: Axis,
    pub(crate) binding: AxisBinding<T, D, P>,
    pub(crate) buffer: AutostopBuffer<CAPACITY>,
}

/// The pulse generation engine.
///
/// An `Engine` owns every axis, its peripherals and its autostop buffer. All
/// mutation goes through `&mut self`, so when it's shared between interrupt
/// handlers and the main loop it should live inside a
/// [`SharedEngine`](crate::SharedEngine).
///
/// # Caution
///
/// The DMA reads each axis' autostop buffer straight out of the `Engine`, so
/// it must not be moved while a transfer is in flight. Putting it in a
/// `static` before issuing the first request takes care of this.
#[derive(Debug)]
pub struct Engine<T, D, P = (), const CAPACITY: usize = DEFAULT_CAPACITY> {
    pub(crate) config: EngineConfig,
    pub(crate) ticks: u32,
    pub(crate) slots: ArrayVec<Slot<T, D, P, CAPACITY>, MAX_AXES>,
}

impl<T, D, P, const CAPACITY: usize> Engine<T, D, P, CAPACITY> {
    /// Take ownership of each axis' peripherals. Axes are numbered in the
    /// order they are bound.
    pub fn new<I>(config: EngineConfig, bindings: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = AxisBinding<T, D, P>>,
    {
        if config.tick_frequency == 0 {
            return Err(Error::InvalidFrequency(TimingError::FrequencyTooLow));
        }

        let mut slots = ArrayVec::new();
        let mut bindings = bindings.into_iter();

        for binding in bindings.by_ref() {
            let slot = Slot {
                axis: Axis::new(slots.len(), binding.base_frequency),
                binding,
                buffer: AutostopBuffer::new(),
            };

            if slots.try_push(slot).is_err() {
                return Err(Error::TooManyAxes {
                    requested: MAX_AXES + 1 + bindings.count(),
                    max: MAX_AXES,
                });
            }
        }

        log::info!(
            "Pulse engine started with {} axes, ticking at {} Hz",
            slots.len(),
            config.tick_frequency
        );

        Ok(Engine {
            config,
            ticks: 0,
            slots,
        })
    }

    #[inline]
    pub fn config(&self) -> &EngineConfig { &self.config }

    #[inline]
    pub fn axis_count(&self) -> usize { self.slots.len() }

    /// The number of times [`Engine::on_tick()`] has run (wrapping).
    #[inline]
    pub fn ticks(&self) -> u32 { self.ticks }

    pub fn axis(&self, axis: usize) -> Result<&Axis, Error> {
        self.slot(axis).map(|s| &s.axis)
    }

    /// The peripherals bound to an axis.
    pub fn binding(&self, axis: usize) -> Result<&AxisBinding<T, D, P>, Error> {
        self.slot(axis).map(|s| &s.binding)
    }

    /// The autostop buffer the axis' DMA channel streams from.
    pub fn buffer(&self, axis: usize) -> Result<&AutostopBuffer<CAPACITY>, Error> {
        self.slot(axis).map(|s| &s.buffer)
    }

    /// Start the periodic tick interrupt at the configured rate.
    pub fn start_ticks<S: TickSource>(&self, mut source: S) {
        source.start(self.config.tick_frequency);
    }

    /// Change the frequency and acceleration limits of an idle axis.
    pub fn configure_axis_bounds(
        &mut self,
        axis: usize,
        bounds: AxisBounds,
    ) -> Result<(), Error> {
        let slot = self.slot_mut(axis)?;
        slot.ensure_idle()?;
        bounds.validate(slot.axis.base_frequency())?;

        log::debug!("Axis {} bounds set to {:?}", axis, bounds);
        slot.axis.set_bounds(bounds);

        Ok(())
    }

    /// Reset the position of an idle axis, so the current location is
    /// considered `position`.
    ///
    /// Useful for setting a zero position after homing.
    pub fn set_position(&mut self, axis: usize, position: i32) -> Result<(), Error> {
        let slot = self.slot_mut(axis)?;
        slot.ensure_idle()?;
        slot.axis.position = position;

        Ok(())
    }

    /// Forget about a fault latched by an interrupt handler so the axis can
    /// accept requests again.
    pub fn clear_fault(&mut self, axis: usize) -> Result<Option<Fault>, Error> {
        let slot = self.slot_mut(axis)?;

        Ok(slot.axis.fault.take())
    }

    /// What the axis is currently doing.
    ///
    /// A latched fault takes priority and is reported as
    /// [`Error::HardwareFault`].
    pub fn query_state(&self, axis: usize) -> Result<OutputType, Error> {
        let slot = self.slot(axis)?;

        match slot.axis.fault {
            Some(fault) => Err(Error::HardwareFault(fault)),
            None => Ok(slot.axis.output),
        }
    }

    pub(crate) fn slot(&self, axis: usize) -> Result<&Slot<T, D, P, CAPACITY>, Error> {
        self.slots.get(axis).ok_or(Error::InvalidAxis(axis))
    }

    pub(crate) fn slot_mut(
        &mut self,
        axis: usize,
    ) -> Result<&mut Slot<T, D, P, CAPACITY>, Error> {
        self.slots.get_mut(axis).ok_or(Error::InvalidAxis(axis))
    }
}

impl<T, D, P, const CAPACITY: usize> Engine<T, D, P, CAPACITY>
where
    D: DmaChannel,
{
    /// The axis' absolute position.
    ///
    /// While pulses are being emitted this is estimated from the DMA
    /// channel's remaining transfer count.
    pub fn query_position(&self, axis: usize) -> Result<i32, Error> {
        let slot = self.slot(axis)?;

        if slot.axis.output.is_idle() {
            Ok(slot.axis.position)
        } else {
            Ok(slot.axis.position_with_remaining(slot.binding.dma.remaining()))
        }
    }
}

impl<T, D, P, const CAPACITY: usize> Engine<T, D, P, CAPACITY>
where
    P: DirectionOutput,
{
    /// Set which way an idle axis will move on its next request.
    pub fn set_direction(&mut self, axis: usize, direction: Direction) -> Result<(), Error> {
        let slot = self.slot_mut(axis)?;
        slot.ensure_idle()?;

        if slot.binding.direction.set_direction(direction).is_err() {
            log::warn!("Unable to set the direction of axis {}", axis);
            return Err(Error::HardwareFault(Fault::Direction));
        }

        slot.axis.direction = direction;
        Ok(())
    }
}

impl<T, D, P, const CAPACITY: usize> Slot<T, D, P, CAPACITY> {
    /// Fails if the axis is mid-transfer or has a latched fault.
    pub(crate) fn ensure_idle(&self) -> Result<(), Error> {
        if !self.axis.output.is_idle() {
            return Err(Error::AxisBusy(self.axis.id()));
        }
        if let Some(fault) = self.axis.fault {
            return Err(Error::HardwareFault(fault));
        }

        Ok(())
    }

    /// Check a requested frequency against the axis bounds and the timer.
    pub(crate) fn timing_for(&self, frequency: u32) -> Result<Timing, Error> {
        let timing =
            timing::compute_period_prescaler(self.axis.base_frequency(), frequency)?;
        self.axis.bounds().check_frequency(frequency)?;

        Ok(timing)
    }
}

impl<T, D, P, const CAPACITY: usize> Slot<T, D, P, CAPACITY>
where
    T: PulseTimer,
{
    /// Load new timing registers, skipping the writes if nothing changed.
    ///
    /// The prescaler is buffered by the hardware, so changing it needs an
    /// update event. The period and compare value are written directly and
    /// take effect on the next overflow.
    pub(crate) fn load_timing(&mut self, timing: Timing) {
        let previous = self.axis.timing;
        if previous == Some(timing) {
            return;
        }

        let timer = &mut self.binding.timer;
        timer.set_period(timing.period);
        timer.set_compare(timing.compare());

        if previous.map(|t| t.prescaler) != Some(timing.prescaler) {
            timer.set_prescaler(timing.prescaler);
            timer.generate_update_event();
        }

        self.axis.timing = Some(timing);
    }
}

impl<T, D, P, const CAPACITY: usize> Slot<T, D, P, CAPACITY>
where
    T: PulseTimer,
    D: DmaChannel,
{
    /// Disconnect the timer from its output and DMA channel.
    pub(crate) fn shutdown(&mut self) {
        let AxisBinding { timer, dma, .. } = &mut self.binding;

        timer.disable_dma_request();
        timer.disable_output();
        dma.disable();
    }

    /// Stop pulsing early, keeping the best position estimate we have.
    pub(crate) fn halt(&mut self) -> u16 {
        self.binding.timer.stop_counter();
        let remaining = self.binding.dma.remaining().min(self.axis.steps_requested);
        self.shutdown();

        self.axis.position = self.axis.position_with_remaining(remaining);
        self.axis.output = OutputType::Idle;
        self.axis.current_acceleration = 0.0;

        remaining
    }
}
