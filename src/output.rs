//! Starting, finishing and aborting pulse transfers.

use crate::{
    axis::OutputType,
    engine::{AxisBinding, Engine, Slot},
    error::{Error, Fault},
    hardware::{DmaChannel, PulseTimer},
    ramp::{Ramp, RampLaw},
    timing::Timing,
};

impl<T, D, P, const CAPACITY: usize> Engine<T, D, P, CAPACITY>
where
    T: PulseTimer,
    D: DmaChannel,
{
    /// Emit exactly `steps` pulses at `frequency` Hz.
    ///
    /// This returns as soon as the hardware has been set up. The axis goes
    /// back to [`OutputType::Idle`] when [`Engine::on_transfer_complete()`]
    /// is called for the final pulse.
    ///
    /// Nothing is changed if the request is rejected.
    pub fn request_constant_output(
        &mut self,
        axis: usize,
        steps: u16,
        frequency: u32,
    ) -> Result<(), Error> {
        let now = self.ticks;
        let slot = self.slot_mut(axis)?;

        slot.ensure_idle()?;
        slot.buffer.check(steps)?;
        let timing = slot.timing_for(frequency)?;

        slot.axis.current_acceleration = 0.0;
        slot.start(steps, frequency, timing, OutputType::ConstOutput, now)?;

        log::debug!(
            "Axis {} emitting {} steps at {} Hz",
            axis,
            steps,
            frequency
        );

        Ok(())
    }

    /// Emit exactly `steps` pulses, ramping from `start_frequency` toward
    /// `target_frequency` using the axis' maximum acceleration.
    ///
    /// When the target is above the start frequency the axis accelerates,
    /// cruises, and then decelerates back to `start_frequency` in time for
    /// the last pulse. When the target is below it, the axis decelerates to
    /// the target and holds it.
    ///
    /// The timer is started at `start_frequency`, every change after that is
    /// made by [`Engine::on_tick()`].
    pub fn request_accelerated_output(
        &mut self,
        axis: usize,
        steps: u16,
        start_frequency: u32,
        target_frequency: u32,
        law: RampLaw,
    ) -> Result<(), Error> {
        let now = self.ticks;
        let slot = self.slot_mut(axis)?;

        slot.ensure_idle()?;
        slot.buffer.check(steps)?;

        let acceleration = slot.axis.bounds().max_acceleration;
        if acceleration == 0 {
            return Err(Error::InvalidAcceleration);
        }

        let timing = slot.timing_for(start_frequency)?;
        slot.timing_for(target_frequency)?;

        let (ramp, output) = Ramp::plan(
            law,
            steps,
            start_frequency as f32,
            target_frequency as f32,
            acceleration as f32,
        )?;

        slot.axis.ramp = ramp;
        slot.axis.current_acceleration = slot.axis.bounds().min_acceleration as f32;
        slot.start(steps, start_frequency, timing, output, now)?;

        log::debug!(
            "Axis {} emitting {} steps, {} Hz -> {} Hz ({:?})",
            axis,
            steps,
            start_frequency,
            target_frequency,
            output
        );

        Ok(())
    }

    /// The DMA transfer-complete handler.
    ///
    /// Once the stop byte has been written the timer has already halted
    /// itself, so all that's left is to disconnect the outputs and record
    /// the final position. Calling this again (or for an idle axis) does
    /// nothing.
    pub fn on_transfer_complete(&mut self, axis: usize) -> Result<(), Error> {
        let slot = self.slot_mut(axis)?;

        if slot.axis.output.is_idle() {
            return Ok(());
        }

        if slot.binding.dma.transfer_error() {
            let remaining = slot.halt();
            slot.axis.fault = Some(Fault::Transfer);
            log::warn!(
                "Axis {} stopped by a DMA transfer error with {} steps to go",
                axis,
                remaining
            );
            return Ok(());
        }

        let remaining = slot.binding.dma.remaining();
        if remaining != 0 {
            log::warn!(
                "Ignoring a completion on axis {} with {} transfers outstanding",
                axis,
                remaining
            );
            return Ok(());
        }

        slot.shutdown();
        slot.axis.position = slot.axis.position_with_remaining(0);
        slot.axis.output = OutputType::Idle;
        slot.axis.current_acceleration = 0.0;

        log::debug!("Axis {} finished at {}", axis, slot.axis.position);

        Ok(())
    }

    /// Stop an in-flight transfer immediately.
    ///
    /// The position is estimated from the number of pulses the DMA channel
    /// hadn't delivered yet. Aborting an idle axis does nothing.
    pub fn abort(&mut self, axis: usize) -> Result<(), Error> {
        let slot = self.slot_mut(axis)?;

        if slot.axis.output.is_idle() {
            return Ok(());
        }

        let remaining = slot.halt();
        log::warn!(
            "Axis {} aborted at {} with {} steps to go",
            axis,
            slot.axis.position,
            remaining
        );

        Ok(())
    }

    /// [`Engine::abort()`] every axis.
    pub fn abort_all(&mut self) {
        for slot in &mut self.slots {
            if !slot.axis.output.is_idle() {
                let remaining = slot.halt();
                log::warn!(
                    "Axis {} aborted at {} with {} steps to go",
                    slot.axis.id(),
                    slot.axis.position,
                    remaining
                );
            }
        }
    }
}

impl<T, D, P, const CAPACITY: usize> Slot<T, D, P, CAPACITY>
where
    T: PulseTimer,
    D: DmaChannel,
{
    /// Arm the buffer and kick off the transfer. The caller has already
    /// validated everything.
    fn start(
        &mut self,
        steps: u16,
        frequency: u32,
        timing: Timing,
        output: OutputType,
        now: u32,
    ) -> Result<(), Error> {
        let word = self.binding.timer.enable_word();
        self.buffer.arm(steps, word)?;

        self.axis.position_at_arm = self.axis.position;
        self.axis.steps_requested = steps;
        self.axis.current_frequency = frequency as f32;
        self.axis.output = output;
        self.axis.last_tick = now;

        self.load_timing(timing);

        let AxisBinding { timer, dma, .. } = &mut self.binding;

        // the DMA and compare channel must be ready before the counter starts,
        // otherwise nothing would stop the pulse train
        dma.disable();
        dma.configure(self.buffer.armed(), timer.control_register());
        dma.enable();
        dma.enable_completion_interrupt();
        timer.enable_dma_request();
        timer.enable_output();
        timer.start_counter();

        Ok(())
    }
}
