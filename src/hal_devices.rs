use crate::{axis::Direction, hardware::DirectionOutput};
use embedded_hal::digital::OutputPin;

/// A [`DirectionOutput`] backed by a GPIO pin which is driven high for
/// [`Direction::Forward`].
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DirectionPin<Pin> {
    pin: Pin,
    inverted: bool,
}

impl<Pin> DirectionPin<Pin> {
    pub fn new(pin: Pin) -> Self {
        DirectionPin {
            pin,
            inverted: false,
        }
    }

    /// Drive the pin low for [`Direction::Forward`] instead.
    pub fn inverted(pin: Pin) -> Self {
        DirectionPin {
            pin,
            inverted: true,
        }
    }

    pub fn into_inner(self) -> Pin { self.pin }
}

impl<Pin: OutputPin> DirectionOutput for DirectionPin<Pin> {
    type Error = Pin::Error;

    #[inline]
    fn set_direction(&mut self, direction: Direction) -> Result<(), Self::Error> {
        let high = (direction == Direction::Forward) != self.inverted;

        if high {
            self.pin.set_high()
        } else {
            self.pin.set_low()
        }
    }
}
