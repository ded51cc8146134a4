//! Reference counted enable/disable of the link.
//!
//! Several independent drivers can share one physical bus. Each of them calls
//! [`Link::acquire`] when it starts and [`Link::release`] when it is done; the peripheral is on
//! exactly while at least one of them holds it. The calls don't have to be balanced per caller,
//! a release on an idle link is simply ignored.

use hal::digital::v2::OutputPin;

use crate::{
    backend::Backend,
    error::Error,
    interrupts::InterruptControl,
    link::{Link, TransactionState},
};

impl<B, I, LED> Link<B, I, LED>
where
    B: Backend,
    I: InterruptControl,
    LED: OutputPin,
{
    /// Add a user of the link. The first user switches the peripheral on.
    ///
    /// If switching on fails, the count stays where it was.
    pub fn acquire(&mut self) -> Result<(), Error<B::Error>> {
        critical_section::with(|_| -> Result<(), Error<B::Error>> {
            if self.refs == 0 {
                self.backend.enable()?;
            }
            self.refs += 1;
            Ok(())
        })
    }

    /// Drop a user of the link. The last user switches the peripheral off and clears all
    /// interrupt registrations.
    pub fn release(&mut self) -> Result<(), Error<B::Error>> {
        let (saved, disabled) = critical_section::with(|_| {
            if self.refs == 0 {
                return (None, Ok(()));
            }
            self.refs -= 1;
            if self.refs > 0 {
                return (None, Ok(()));
            }
            self.guard.reset();
            self.state = TransactionState::Idle;
            (self.saved.take(), self.backend.disable())
        });
        // a transaction torn down by the last release must not leave interrupts masked; restoring
        // may switch interrupts back on, so only outside the critical section
        if let Some(saved) = saved {
            self.guard.restore(&mut self.interrupts, saved);
        }
        disabled?;
        Ok(())
    }

    /// number of outstanding [`acquire`](Self::acquire) calls
    pub fn users(&self) -> usize {
        self.refs
    }

    /// whether the peripheral is currently switched on
    pub fn is_enabled(&self) -> bool {
        self.refs > 0
    }
}
