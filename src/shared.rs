use crate::{
    engine::Engine,
    error::Error,
    hardware::{DmaChannel, PulseTimer},
};
use core::cell::RefCell;
use critical_section::Mutex;

/// An [`Engine`] which can be shared between interrupt handlers and the main
/// loop.
///
/// Every access happens inside a critical section, so the tick handler, the
/// DMA completion handler and the thread issuing requests can never
/// interleave on the same axis. The tick handler takes a separate critical
/// section per axis, which keeps interrupt latency down to the cost of
/// recomputing a single ramp.
///
/// ```rust,ignore
/// static ENGINE: SharedEngine<Tim, Dma> = SharedEngine::new();
///
/// #[interrupt]
/// fn DMA1_CHANNEL2() {
///     ENGINE.on_transfer_complete(0);
/// }
///
/// #[exception]
/// fn SysTick() {
///     ENGINE.on_tick();
/// }
/// ```
pub struct SharedEngine<T, D, P = (), const CAPACITY: usize = { crate::DEFAULT_CAPACITY }> {
    inner: Mutex<RefCell<Option<Engine<T, D, P, CAPACITY>>>>,
}

impl<T, D, P, const CAPACITY: usize> SharedEngine<T, D, P, CAPACITY> {
    /// Create an empty slot, suitable for use in a `static`.
    pub const fn new() -> Self {
        SharedEngine {
            inner: Mutex::new(RefCell::new(None)),
        }
    }

    /// Run a closure with exclusive access to the engine.
    ///
    /// Returns `None` if nothing has been installed yet.
    pub fn lock<F, R>(&self, func: F) -> Option<R>
    where
        F: FnOnce(&mut Engine<T, D, P, CAPACITY>) -> R,
    {
        critical_section::with(|cs| {
            self.inner.borrow(cs).borrow_mut().as_mut().map(func)
        })
    }
}

impl<T, D, P, const CAPACITY: usize> SharedEngine<T, D, P, CAPACITY>
where
    T: PulseTimer,
    D: DmaChannel,
{
    /// Move an engine into place, returning the previous one (if any).
    ///
    /// The previous engine is about to move, so every transfer it still has
    /// in flight is aborted first. Its DMA channels never read from a buffer
    /// after it has been moved out.
    pub fn install(
        &self,
        engine: Engine<T, D, P, CAPACITY>,
    ) -> Option<Engine<T, D, P, CAPACITY>> {
        critical_section::with(|cs| {
            let mut inner = self.inner.borrow(cs).borrow_mut();

            if let Some(previous) = inner.as_mut() {
                previous.abort_all();
            }

            inner.replace(engine)
        })
    }

    /// Call [`Engine::on_tick()`], one axis at a time.
    pub fn on_tick(&self) {
        let axes = match self.lock(|engine| {
            engine.advance_tick();
            engine.axis_count()
        }) {
            Some(axes) => axes,
            None => return,
        };

        for axis in 0..axes {
            self.lock(|engine| engine.tick_axis(axis));
        }
    }

    pub fn on_transfer_complete(&self, axis: usize) -> Result<(), Error> {
        self.lock(|engine| engine.on_transfer_complete(axis))
            .unwrap_or(Err(Error::InvalidAxis(axis)))
    }

    /// Abort a transfer from any context.
    pub fn abort(&self, axis: usize) -> Result<(), Error> {
        self.lock(|engine| engine.abort(axis))
            .unwrap_or(Err(Error::InvalidAxis(axis)))
    }
}

impl<T, D, P, const CAPACITY: usize> Default for SharedEngine<T, D, P, CAPACITY> {
    fn default() -> Self { SharedEngine::new() }
}
