//! # The shared bus link
//!
//! [`Link`] is the one object that owns the bus: the backend, the interrupt controller, the
//! reference count of enabled users and the state of the running transaction. Everything that
//! talks to the M5 co-processor (or to any other device on the same bus) goes through it.
//!
//! - [`acquire`](Link::acquire) / [`release`](Link::release) switch the peripheral on and off,
//!   see the `lifecycle` module
//! - [`using_interrupt`](Link::using_interrupt) / [`not_using_interrupt`](Link::not_using_interrupt)
//!   register interrupt handlers that use the bus, see [`interrupts`](crate::interrupts)
//! - [`begin`](Link::begin) / [`transfer`](Link::transfer) / [`end`](Link::end) run a
//!   transaction, see the `transaction` module

use hal::digital::v2::OutputPin;

use crate::{
    backend::Backend,
    dummypins::DummyOutputPin,
    interrupts::{InterruptControl, InterruptGuard, InterruptMode, SavedInterrupts},
    settings::BitOrder,
};

/// how often `is_ready` gets polled before a transfer counts as timed out
pub const DEFAULT_SPIN_BUDGET: u32 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Whether a transaction is running on the link
pub enum TransactionState {
    Idle,
    Active,
}

/// Bus arbiter, see the module documentation.
///
/// `LED` is the optional diagnostic output that gets driven high when a begin/end mismatch is
/// detected.
#[derive(Debug)]
pub struct Link<B, I, LED = DummyOutputPin> {
    pub(crate) backend: B,
    pub(crate) interrupts: I,
    pub(crate) guard: InterruptGuard,
    pub(crate) refs: usize,
    pub(crate) state: TransactionState,
    pub(crate) saved: Option<SavedInterrupts>,
    pub(crate) bit_order: BitOrder,
    pub(crate) spin_budget: u32,
    pub(crate) mismatch: bool,
    pub(crate) indicator: Option<LED>,
}

impl<B, I> Link<B, I, DummyOutputPin>
where
    B: Backend,
    I: InterruptControl,
{
    /// Create a new link. The peripheral stays off until the first [`acquire`](Link::acquire).
    pub fn new(backend: B, interrupts: I) -> Self {
        Link {
            backend,
            interrupts,
            guard: InterruptGuard::new(),
            refs: 0,
            state: TransactionState::Idle,
            saved: None,
            bit_order: BitOrder::MsbFirst,
            spin_budget: DEFAULT_SPIN_BUDGET,
            mismatch: false,
            indicator: None,
        }
    }
}

impl<B, I, LED> Link<B, I, LED>
where
    B: Backend,
    I: InterruptControl,
    LED: OutputPin,
{
    /// Wire up an output (usually an LED) that goes high the first time a transaction is begun
    /// twice or ended twice, and stays high.
    pub fn with_mismatch_indicator<L: OutputPin>(self, mut led: L) -> Link<B, I, L> {
        // the indicator may be wired up after a mismatch already happened
        if self.mismatch {
            let _ = led.set_high();
        }
        Link {
            backend: self.backend,
            interrupts: self.interrupts,
            guard: self.guard,
            refs: self.refs,
            state: self.state,
            saved: self.saved,
            bit_order: self.bit_order,
            spin_budget: self.spin_budget,
            mismatch: self.mismatch,
            indicator: Some(led),
        }
    }

    /// Set how many times a transfer polls for completion before giving up with
    /// [`Error::TimedOut`](crate::Error::TimedOut). At least one poll always happens.
    pub fn with_spin_budget(mut self, spin_budget: u32) -> Self {
        self.spin_budget = spin_budget.max(1);
        self
    }

    /// Register that the handler of interrupt line `source` uses the bus.
    ///
    /// Call it outside of any transaction and not from an interrupt handler. Use
    /// [`UNIDENTIFIED`](crate::interrupts::UNIDENTIFIED) for handlers that aren't tied to an
    /// external interrupt line, which makes every transaction disable all interrupts.
    pub fn using_interrupt(&mut self, source: u8) {
        self.guard.using(&self.interrupts, source);
    }

    /// Undo [`using_interrupt`](Self::using_interrupt). Has no effect once any unmaskable line
    /// was registered, until the link is released completely.
    pub fn not_using_interrupt(&mut self, source: u8) {
        self.guard.not_using(&self.interrupts, source);
    }

    pub fn interrupt_mode(&self) -> InterruptMode {
        self.guard.mode()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn interrupts(&self) -> &I {
        &self.interrupts
    }

    /// Take the link apart. The caller is responsible for the peripheral still being enabled.
    pub fn free(self) -> (B, I, Option<LED>) {
        (self.backend, self.interrupts, self.indicator)
    }
}
