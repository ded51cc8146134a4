//! Transactions: the atomic span from chip select low to chip select high.
//!
//! ```text
//!  begin:  mask interrupts -> configure -> select
//!  end:    deselect -> restore interrupts
//! ```
//!
//! The interrupts registered with [`Link::using_interrupt`] stay masked for the whole span, so
//! no handler can squeeze a transfer of its own into the middle of a frame.
//!
//! Beginning a transaction that is already running, or ending one that isn't, is a bug in the
//! caller. It never stops the transaction from going ahead; it sets a sticky flag
//! ([`Link::mismatch_detected`]) and drives the mismatch indicator if one is wired up.

use hal::digital::v2::OutputPin;

use crate::{
    backend::Backend,
    error::Error,
    interrupts::InterruptControl,
    link::{Link, TransactionState},
    settings::{BitOrder, BusConfig},
};

impl<B, I, LED> Link<B, I, LED>
where
    B: Backend,
    I: InterruptControl,
    LED: OutputPin,
{
    /// Start a transaction with `config`.
    ///
    /// If the backend fails to configure or select, the transaction is rolled back (interrupts
    /// restored, state idle) before the error is returned.
    pub fn begin(&mut self, config: &BusConfig) -> Result<(), Error<B::Error>> {
        let nested = self.state == TransactionState::Active;
        if nested {
            // interrupts are still masked by the outer begin, keep its saved state
            self.flag_mismatch();
        } else {
            self.saved = Some(self.guard.mask(&mut self.interrupts));
            self.state = TransactionState::Active;
        }

        self.bit_order = config.bit_order();
        let selected = self
            .backend
            .configure(config)
            .and_then(|_| self.backend.select());

        if let Err(e) = selected {
            if !nested {
                self.finish();
            }
            return Err(Error::Bus(e));
        }
        Ok(())
    }

    /// End the transaction: deselect, then give the interrupts back.
    ///
    /// Interrupts are restored even if deselecting fails.
    pub fn end(&mut self) -> Result<(), Error<B::Error>> {
        if self.state == TransactionState::Idle {
            self.flag_mismatch();
        }
        let deselected = self.backend.deselect();
        self.finish();
        deselected.map_err(Error::Bus)
    }

    /// Run `f` inside a transaction, ending it whether `f` succeeds or not.
    pub fn transaction<R, F>(&mut self, config: &BusConfig, f: F) -> Result<R, Error<B::Error>>
    where
        F: FnOnce(&mut Self) -> Result<R, Error<B::Error>>,
    {
        self.begin(config)?;
        let result = f(self);
        let ended = self.end();
        let value = result?;
        ended?;
        Ok(value)
    }

    /// Shift `value` out and return the byte shifted in at the same time.
    ///
    /// Only valid inside a transaction.
    pub fn transfer(&mut self, value: u8) -> Result<u8, Error<B::Error>> {
        self.backend.write_byte(value)?;
        self.wait_ready()?;
        Ok(self.backend.read_byte()?)
    }

    /// Transfer 16 bits, most significant byte first unless the transaction runs LSB first.
    pub fn transfer16(&mut self, value: u16) -> Result<u16, Error<B::Error>> {
        let [msb, lsb] = value.to_be_bytes();
        match self.bit_order {
            BitOrder::MsbFirst => {
                let high = self.transfer(msb)?;
                let low = self.transfer(lsb)?;
                Ok(u16::from_be_bytes([high, low]))
            }
            BitOrder::LsbFirst => {
                let low = self.transfer(lsb)?;
                let high = self.transfer(msb)?;
                Ok(u16::from_be_bytes([high, low]))
            }
        }
    }

    /// Transfer every byte of `words`, replacing each with the byte received for it.
    ///
    /// The next byte is written as soon as the previous one completed, before the received
    /// byte is stored, to keep the bus busy.
    pub fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Error<B::Error>> {
        let (first, _) = match words.split_first() {
            Some(split) => split,
            None => return Ok(()),
        };
        self.backend.write_byte(*first)?;
        for i in 1..words.len() {
            let next = words[i];
            self.wait_ready()?;
            let received = self.backend.read_byte()?;
            self.backend.write_byte(next)?;
            words[i - 1] = received;
        }
        self.wait_ready()?;
        let last = words.len() - 1;
        words[last] = self.backend.read_byte()?;
        Ok(())
    }

    pub fn transaction_state(&self) -> TransactionState {
        self.state
    }

    /// Whether a begin/end mismatch was ever detected on this link.
    pub fn mismatch_detected(&self) -> bool {
        self.mismatch
    }

    /// Forget a detected mismatch and switch the indicator off again.
    pub fn clear_mismatch(&mut self) {
        self.mismatch = false;
        if let Some(led) = self.indicator.as_mut() {
            let _ = led.set_low();
        }
    }

    fn wait_ready(&mut self) -> Result<(), Error<B::Error>> {
        for _ in 0..self.spin_budget {
            if self.backend.is_ready()? {
                return Ok(());
            }
        }

        #[cfg(feature = "defmt")]
        defmt::warn!("transfer did not complete after {} polls", self.spin_budget);

        Err(Error::TimedOut)
    }

    fn finish(&mut self) {
        if let Some(saved) = self.saved.take() {
            self.guard.restore(&mut self.interrupts, saved);
        }
        self.state = TransactionState::Idle;
    }

    fn flag_mismatch(&mut self) {
        #[cfg(feature = "defmt")]
        defmt::warn!("transaction begin/end mismatch, state {}", self.state);

        self.mismatch = true;
        if let Some(led) = self.indicator.as_mut() {
            // indicator errors are ignored
            let _ = led.set_high();
        }
    }
}
