//! A software model of a pulse timer and its DMA channel.
//!
//! Useful for exercising an [`Engine`](crate::Engine) on a host machine. Both
//! halves share a [`SimChannel`], which you keep hold of to emit pulses and
//! inspect the register state:
//!
//! ```rust
//! use autostop_stepgen::{sim::SimChannel, Engine, EngineConfig};
//!
//! let channel = SimChannel::new();
//! let mut engine: Engine<_, _> =
//!     Engine::new(EngineConfig::default(), Some(channel.binding(72_000_000)))
//!         .unwrap();
//!
//! engine.request_constant_output(0, 10, 1000).unwrap();
//! assert_eq!(channel.run_to_completion(), 10);
//! assert!(channel.take_completion());
//!
//! engine.on_transfer_complete(0).unwrap();
//! assert_eq!(engine.query_position(0), Ok(10));
//! ```

use crate::{
    autostop::EnableWord,
    engine::AxisBinding,
    hardware::{DmaChannel, PulseTimer},
    tick::TickSource,
};
use arrayvec::ArrayVec;
use core::cell::{Cell, RefCell};

/// The most bytes a simulated DMA transfer can hold.
pub const SIM_MAX_TRANSFER: usize = 4096;

/// The address reported for the simulated control register.
pub const SIM_CONTROL_REGISTER: u32 = 0x4001_2C00;

/// The auto-reload preload bit, always set in the simulated control register.
pub const SIM_ARPE: u8 = 0x80;

/// The counter-enable bit.
pub const SIM_CEN: u8 = 0x01;

/// A snapshot of the simulated timer's registers.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Registers {
    pub prescaler: u16,
    pub period: u16,
    pub compare: u16,
    pub control: u8,
    pub update_events: u32,
    pub output_enabled: bool,
    pub dma_request: bool,
}

impl Registers {
    #[inline]
    pub fn counter_enabled(&self) -> bool { self.control & SIM_CEN != 0 }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
struct DmaState {
    enabled: bool,
    completion_interrupt: bool,
    destination: u32,
    cursor: usize,
    remaining: u16,
    transfer_error: bool,
    complete: bool,
    configures: u32,
}

/// The shared state behind a [`SimTimer`] and [`SimDma`] pair.
#[derive(Debug)]
pub struct SimChannel {
    registers: Cell<Registers>,
    dma: Cell<DmaState>,
    transfer: RefCell<ArrayVec<u8, SIM_MAX_TRANSFER>>,
    pulses: Cell<u64>,
    register_writes: Cell<u32>,
}

impl SimChannel {
    pub fn new() -> SimChannel {
        SimChannel {
            registers: Cell::new(Registers {
                control: SIM_ARPE,
                ..Default::default()
            }),
            dma: Cell::new(DmaState::default()),
            transfer: RefCell::new(ArrayVec::new()),
            pulses: Cell::new(0),
            register_writes: Cell::new(0),
        }
    }

    pub fn timer(&self) -> SimTimer<'_> { SimTimer { channel: self } }

    pub fn dma(&self) -> SimDma<'_> { SimDma { channel: self } }

    /// An [`AxisBinding`] using this channel's timer and DMA.
    pub fn binding(&self, base_frequency: u32) -> AxisBinding<SimTimer<'_>, SimDma<'_>> {
        AxisBinding::new(self.timer(), self.dma(), base_frequency)
    }

    pub fn registers(&self) -> Registers { self.registers.get() }

    /// How many times the prescaler, period or compare registers were
    /// written.
    pub fn register_writes(&self) -> u32 { self.register_writes.get() }

    /// The total number of pulses emitted so far.
    pub fn pulses(&self) -> u64 { self.pulses.get() }

    /// How many times the DMA channel has been pointed at a new transfer.
    pub fn dma_configures(&self) -> u32 { self.dma.get().configures }

    /// The bytes captured when the DMA channel was last configured.
    pub fn transfer(&self) -> ArrayVec<u8, SIM_MAX_TRANSFER> { self.transfer.borrow().clone() }

    pub fn remaining(&self) -> u16 { self.dma.get().remaining }

    pub fn dma_enabled(&self) -> bool { self.dma.get().enabled }

    /// Make the DMA channel report a transfer error.
    pub fn inject_transfer_error(&self) {
        self.update_dma(|d| d.transfer_error = true);
    }

    /// Check for (and acknowledge) a pending transfer-complete interrupt.
    pub fn take_completion(&self) -> bool {
        let pending = self.dma.get().complete;
        self.update_dma(|d| d.complete = false);
        pending
    }

    /// Let the timer overflow up to `count` times, returning the number of
    /// pulses that actually made it to the output.
    ///
    /// Each pulse triggers a DMA request which copies the next byte of the
    /// transfer into the control register, exactly like the real thing.
    pub fn run_pulses(&self, count: u32) -> u32 {
        let mut emitted = 0;

        for _ in 0..count {
            let registers = self.registers.get();
            if !registers.counter_enabled() {
                break;
            }

            if registers.output_enabled {
                emitted += 1;
                self.pulses.set(self.pulses.get() + 1);
            }

            if registers.dma_request {
                self.dma_request();
            }
        }

        emitted
    }

    /// Keep pulsing until the counter stops itself.
    pub fn run_to_completion(&self) -> u32 {
        self.run_pulses(u32::from(u16::max_value()) + 1)
    }

    fn dma_request(&self) {
        let mut dma = self.dma.get();
        if !dma.enabled || dma.transfer_error || dma.remaining == 0 {
            return;
        }

        let byte = self.transfer.borrow()[dma.cursor];
        dma.cursor += 1;
        dma.remaining -= 1;
        if dma.remaining == 0 && dma.completion_interrupt {
            dma.complete = true;
        }
        self.dma.set(dma);

        self.update_registers(|r| r.control = byte);
    }

    fn update_registers<F: FnOnce(&mut Registers)>(&self, func: F) {
        let mut registers = self.registers.get();
        func(&mut registers);
        self.registers.set(registers);
    }

    fn update_dma<F: FnOnce(&mut DmaState)>(&self, func: F) {
        let mut dma = self.dma.get();
        func(&mut dma);
        self.dma.set(dma);
    }

    fn count_write(&self) { self.register_writes.set(self.register_writes.get() + 1); }
}

impl Default for SimChannel {
    fn default() -> SimChannel { SimChannel::new() }
}

/// The timer half of a [`SimChannel`].
#[derive(Debug, Copy, Clone)]
pub struct SimTimer<'a> {
    channel: &'a SimChannel,
}

impl<'a> PulseTimer for SimTimer<'a> {
    fn set_prescaler(&mut self, prescaler: u16) {
        self.channel.count_write();
        self.channel.update_registers(|r| r.prescaler = prescaler);
    }

    fn set_period(&mut self, period: u16) {
        self.channel.count_write();
        self.channel.update_registers(|r| r.period = period);
    }

    fn set_compare(&mut self, compare: u16) {
        self.channel.count_write();
        self.channel.update_registers(|r| r.compare = compare);
    }

    fn generate_update_event(&mut self) {
        self.channel.update_registers(|r| r.update_events += 1);
    }

    fn enable_output(&mut self) {
        self.channel.update_registers(|r| r.output_enabled = true);
    }

    fn disable_output(&mut self) {
        self.channel.update_registers(|r| r.output_enabled = false);
    }

    fn enable_dma_request(&mut self) {
        self.channel.update_registers(|r| r.dma_request = true);
    }

    fn disable_dma_request(&mut self) {
        self.channel.update_registers(|r| r.dma_request = false);
    }

    fn start_counter(&mut self) {
        self.channel.update_registers(|r| r.control |= SIM_CEN);
    }

    fn stop_counter(&mut self) {
        self.channel.update_registers(|r| r.control &= !SIM_CEN);
    }

    fn enable_word(&self) -> EnableWord {
        EnableWord {
            value: self.channel.registers().control,
            run_mask: SIM_CEN,
        }
    }

    fn control_register(&self) -> u32 { SIM_CONTROL_REGISTER }
}

/// The DMA half of a [`SimChannel`].
#[derive(Debug, Copy, Clone)]
pub struct SimDma<'a> {
    channel: &'a SimChannel,
}

impl<'a> DmaChannel for SimDma<'a> {
    fn configure(&mut self, source: &[u8], destination: u32) {
        let mut transfer = self.channel.transfer.borrow_mut();
        transfer.clear();
        let fits = transfer.try_extend_from_slice(source).is_ok();

        self.channel.update_dma(|d| {
            d.destination = destination;
            d.cursor = 0;
            d.remaining = if fits { source.len() as u16 } else { 0 };
            d.transfer_error = !fits;
            d.complete = false;
            d.configures += 1;
        });
    }

    fn enable(&mut self) { self.channel.update_dma(|d| d.enabled = true); }

    fn disable(&mut self) { self.channel.update_dma(|d| d.enabled = false); }

    fn enable_completion_interrupt(&mut self) {
        self.channel.update_dma(|d| d.completion_interrupt = true);
    }

    fn remaining(&self) -> u16 { self.channel.remaining() }

    fn transfer_error(&self) -> bool { self.channel.dma.get().transfer_error }
}

/// A [`TickSource`] which just remembers the frequency it was started at.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct SimTickSource {
    pub frequency: Option<u32>,
}

impl TickSource for SimTickSource {
    fn start(&mut self, frequency: u32) { self.frequency = Some(frequency); }
}
