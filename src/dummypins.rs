//! # Small module to provide "fake" pins
//!
//! Not every board wires up every line of the M5 connector. The busy/status line and the
//! transaction mismatch indicator are optional, and the bit bang backend wants a MISO pin even
//! if you never read keys. Fill those slots with a dummy pin.

use hal::digital::v2::{InputPin, OutputPin};

/// provides a dummy OutputPin.
///
/// Use it as the mismatch indicator when you don't have a spare LED, or as the chip select of a
/// backend whose chip select is hard wired low.
#[derive(Debug, Clone, Copy)]
pub struct DummyOutputPin;

impl OutputPin for DummyOutputPin {
    type Error = core::convert::Infallible;
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Provides a dummy InputPin
///
/// It always reads low, so as a busy line the co-processor is always free, and as MISO every
/// received byte is 0x00.
#[derive(Debug, Clone, Copy)]
pub struct DummyInputPin;

impl InputPin for DummyInputPin {
    type Error = core::convert::Infallible;
    fn is_low(&self) -> Result<bool, Self::Error> {
        Ok(true)
    }

    fn is_high(&self) -> Result<bool, Self::Error> {
        Ok(false)
    }
}
