//! # Hardware backends
//!
//! The transaction layer talks to the hardware only through [`Backend`], which is modelled after
//! a register level SPI master: write a byte, poll for "transfer complete", read the byte that
//! was shifted in. Every platform gets its own implementation; the one in here sits on top of any
//! embedded-hal SPI peripheral, [`BitBangBackend`](crate::bitbang::BitBangBackend) drives plain
//! GPIO pins.

use hal::blocking::spi::Transfer;
use hal::digital::v2::OutputPin;

use crate::{error::SpiBackendError, settings::BusConfig};

/// Capabilities of an SPI master as the transaction layer needs them.
pub trait Backend {
    type Error;

    /// `true` if this peripheral has the AVR divisor table with the duplicate divide-by-64 row,
    /// and therefore wants the packed `SPCR`/`SPSR` words from [`BusConfig::registers`].
    /// Other backends use [`BusConfig::frequency`] directly.
    ///
    /// A marker only: the link hands every backend the same [`BusConfig`] and each
    /// [`configure`](Self::configure) picks the part it understands.
    const HAS_DUPLICATE_DIVISOR: bool = false;

    /// One-time setup when the link is first acquired: chip select deasserted, master mode,
    /// peripheral enabled.
    fn enable(&mut self) -> Result<(), Self::Error>;

    /// Switch the peripheral off when the last user released the link.
    fn disable(&mut self) -> Result<(), Self::Error>;

    /// Apply clock, bit order and mode of `config`.
    fn configure(&mut self, config: &BusConfig) -> Result<(), Self::Error>;

    /// Assert chip select (pull it low).
    fn select(&mut self) -> Result<(), Self::Error>;

    /// Deassert chip select.
    fn deselect(&mut self) -> Result<(), Self::Error>;

    /// Start shifting out `value`.
    fn write_byte(&mut self, value: u8) -> Result<(), Self::Error>;

    /// Has the transfer started by [`write_byte`](Self::write_byte) finished?
    fn is_ready(&mut self) -> Result<bool, Self::Error>;

    /// The byte shifted in during the last finished transfer.
    fn read_byte(&mut self) -> Result<u8, Self::Error>;
}

/// Backend on top of an embedded-hal SPI peripheral and a chip select pin.
///
/// The SPI peripheral has to be set up by the HAL with the clock and mode of
/// [`BusConfig::STANDARD`](crate::settings::BusConfig::STANDARD); embedded-hal offers no way to
/// change those at runtime, so [`configure`](Backend::configure) only remembers the config.
/// A blocking `transfer` finishes before it returns, so the backend is always ready.
#[derive(Debug)]
pub struct SpiBackend<SPI, CS> {
    spi: SPI,
    cs: CS,
    config: Option<BusConfig>,
    received: u8,
}

impl<SPI, CS, PinErr, SpiErr> SpiBackend<SPI, CS>
where
    SPI: Transfer<u8, Error = SpiErr>,
    CS: OutputPin<Error = PinErr>,
{
    pub fn new(spi: SPI, mut cs: CS) -> Result<SpiBackend<SPI, CS>, PinErr> {
        cs.set_high()?;
        Ok(SpiBackend {
            spi,
            cs,
            config: None,
            received: 0,
        })
    }

    /// the configuration the link asked for last
    pub fn config(&self) -> Option<BusConfig> {
        self.config
    }

    /// Give back the SPI peripheral and the chip select pin.
    pub fn free(self) -> (SPI, CS) {
        (self.spi, self.cs)
    }
}

impl<SPI, CS, PinErr, SpiErr> Backend for SpiBackend<SPI, CS>
where
    SPI: Transfer<u8, Error = SpiErr>,
    CS: OutputPin<Error = PinErr>,
{
    type Error = SpiBackendError<PinErr, SpiErr>;

    fn enable(&mut self) -> Result<(), Self::Error> {
        self.cs.set_high().map_err(SpiBackendError::Pin)
    }

    fn disable(&mut self) -> Result<(), Self::Error> {
        self.config = None;
        self.cs.set_high().map_err(SpiBackendError::Pin)
    }

    fn configure(&mut self, config: &BusConfig) -> Result<(), Self::Error> {
        self.config = Some(*config);
        Ok(())
    }

    fn select(&mut self) -> Result<(), Self::Error> {
        self.cs.set_low().map_err(SpiBackendError::Pin)
    }

    fn deselect(&mut self) -> Result<(), Self::Error> {
        self.cs.set_high().map_err(SpiBackendError::Pin)
    }

    fn write_byte(&mut self, value: u8) -> Result<(), Self::Error> {
        let mut word = [value];
        let received = self.spi.transfer(&mut word).map_err(SpiBackendError::Spi)?;
        self.received = received.first().copied().unwrap_or(0);
        Ok(())
    }

    fn is_ready(&mut self) -> Result<bool, Self::Error> {
        Ok(true)
    }

    fn read_byte(&mut self) -> Result<u8, Self::Error> {
        Ok(self.received)
    }
}
