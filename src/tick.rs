/// A periodic interrupt which calls [`Engine::on_tick()`].
///
/// [`Engine::on_tick()`]: crate::Engine::on_tick
pub trait TickSource {
    /// Start firing at `frequency` Hz.
    fn start(&mut self, frequency: u32);
}

impl<'a, S: TickSource> TickSource for &'a mut S {
    fn start(&mut self, frequency: u32) { (**self).start(frequency) }
}

/// The number of ticks between `earlier` and `now` on a wrapping tick
/// counter. Never less than one, so a recompute always moves the ramp
/// forward.
#[inline]
pub(crate) fn elapsed(now: u32, earlier: u32) -> u32 {
    now.wrapping_sub(earlier).max(1)
}
