//! Exact-count stepper pulse generation for up to four axes.
//!
//! Each axis pairs a timer, whose compare output produces the step pulses,
//! with a DMA channel that streams an *autostop buffer* into the timer's
//! control register. Every byte but the last keeps the counter running. The
//! last one clears the counter-enable bit, so the timer stops itself after
//! exactly the requested number of pulses without any per-pulse interrupts.
//!
//! On top of that, [`Engine::on_tick()`] can ramp an axis' frequency while
//! the transfer is in flight (see the [`ramp`] module), and
//! [`Engine::on_transfer_complete()`] records the final position when the DMA
//! finishes.
//!
//! The hardware is abstracted behind the [`PulseTimer`], [`DmaChannel`] and
//! [`DirectionOutput`] traits. The [`sim`] module provides a software model
//! for running everything on a host machine.
//!
//! # Cargo Features
//!
//! - `hal` adds [`DirectionPin`], a [`DirectionOutput`] backed by an
//!   `embedded-hal` output pin.

#![no_std]

mod autostop;
mod axis;
mod engine;
mod error;
#[cfg(feature = "hal")]
mod hal_devices;
mod hardware;
mod output;
pub mod ramp;
mod shared;
pub mod sim;
mod tick;
pub mod timing;
mod utils;

pub use crate::{
    autostop::{AutostopBuffer, EnableWord, InvalidStepCount, DEFAULT_CAPACITY},
    axis::{Axis, AxisBounds, Direction, OutputType},
    engine::{AxisBinding, Engine, EngineConfig, DEFAULT_TICK_FREQUENCY, MAX_AXES},
    error::{Error, Fault},
    hardware::{
        fallible_func_direction, func_direction, DirectionOutput, DmaChannel,
        PulseTimer,
    },
    ramp::RampLaw,
    shared::SharedEngine,
    tick::TickSource,
    timing::{compute_period_prescaler, Timing, TimingError},
};

#[cfg(feature = "hal")]
pub use crate::hal_devices::DirectionPin;
