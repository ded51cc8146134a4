//! Error types of the driver

use core::fmt;

/// Errors that can occur when talking to the M5 co-processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<E> {
    /// Underlying bus or pin error of the backend.
    Bus(E),

    /// The backend did not report a finished transfer (or the device did not report "free")
    /// within the configured spin budget.
    TimedOut,

    /// A payload the frame format cannot carry, like a text payload containing a NUL byte.
    InvalidArgument,
}

// `?` on raw backend errors
impl<E> From<E> for Error<E> {
    fn from(error: E) -> Self {
        Error::Bus(error)
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Bus(e) => write!(f, "bus error: {:?}", e),
            Error::TimedOut => write!(f, "device did not respond within the spin budget"),
            Error::InvalidArgument => write!(f, "payload cannot be framed"),
        }
    }
}

#[cfg(feature = "defmt")]
impl<E: defmt::Format> defmt::Format for Error<E> {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Bus(e) => defmt::write!(f, "bus error: {}", e),
            Error::TimedOut => defmt::write!(f, "timed out"),
            Error::InvalidArgument => defmt::write!(f, "invalid argument"),
        }
    }
}

/// Error of the [`SpiBackend`](crate::backend::SpiBackend), which has an SPI peripheral and a
/// chip select pin that can each fail in their own way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiBackendError<PinErr, SpiErr> {
    Pin(PinErr),
    Spi(SpiErr),
}
