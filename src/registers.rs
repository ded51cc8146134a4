//! # Register level backend
//!
//! For AVR-style SPI masters (`SPCR`, `SPSR`, `SPDR`) where the driver pokes the registers
//! itself instead of going through a HAL. Register access is behind [`SpiRegisters`] so the
//! backend works with any PAC, and with a fake register file in tests.

use hal::digital::v2::OutputPin;

use crate::{
    backend::Backend,
    settings::{BusConfig, MSTR, SPE},
};

/// transfer complete flag in `SPSR`
pub const SPIF: u8 = 1 << 7;

/// Raw access to the three SPI registers.
pub trait SpiRegisters {
    fn read_control(&self) -> u8;
    fn write_control(&mut self, value: u8);
    fn read_status(&self) -> u8;
    fn write_status(&mut self, value: u8);
    /// Reading the data register also clears `SPIF` on real hardware.
    fn read_data(&mut self) -> u8;
    fn write_data(&mut self, value: u8);
}

/// Backend writing the packed [`BusConfig`] words straight into the SPI registers.
#[derive(Debug)]
pub struct RegisterBackend<R, CS> {
    regs: R,
    cs: CS,
}

impl<R, CS, ERR> RegisterBackend<R, CS>
where
    R: SpiRegisters,
    CS: OutputPin<Error = ERR>,
{
    pub fn new(regs: R, cs: CS) -> Self {
        RegisterBackend { regs, cs }
    }

    pub fn registers(&self) -> &R {
        &self.regs
    }

    pub fn free(self) -> (R, CS) {
        (self.regs, self.cs)
    }
}

impl<R, CS, ERR> Backend for RegisterBackend<R, CS>
where
    R: SpiRegisters,
    CS: OutputPin<Error = ERR>,
{
    type Error = ERR;

    const HAS_DUPLICATE_DIVISOR: bool = true;

    fn enable(&mut self) -> Result<(), ERR> {
        // Select has to be an output driven high before the peripheral switches to master,
        // otherwise a low level on it turns the peripheral back into a slave.
        self.cs.set_high()?;
        let control = self.regs.read_control();
        self.regs.write_control(control | MSTR | SPE);
        Ok(())
    }

    fn disable(&mut self) -> Result<(), ERR> {
        let control = self.regs.read_control();
        self.regs.write_control(control & !SPE);
        Ok(())
    }

    fn configure(&mut self, config: &BusConfig) -> Result<(), ERR> {
        let (control, status) = config.registers();
        self.regs.write_control(control);
        self.regs.write_status(status);
        Ok(())
    }

    fn select(&mut self) -> Result<(), ERR> {
        self.cs.set_low()
    }

    fn deselect(&mut self) -> Result<(), ERR> {
        self.cs.set_high()
    }

    fn write_byte(&mut self, value: u8) -> Result<(), ERR> {
        self.regs.write_data(value);
        Ok(())
    }

    fn is_ready(&mut self) -> Result<bool, ERR> {
        Ok(self.regs.read_status() & SPIF != 0)
    }

    fn read_byte(&mut self) -> Result<u8, ERR> {
        Ok(self.regs.read_data())
    }
}
