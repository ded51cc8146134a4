//! # Interrupt masking around transactions
//!
//! If an interrupt handler also talks over the bus, a mainline transaction must not be torn in
//! half by it. Drivers that use the bus from a handler register that handler's interrupt line
//! with [`Link::using_interrupt`](crate::Link::using_interrupt); every transaction then masks
//! those lines between `begin` and `end`.
//!
//! Lines the platform can mask individually are collected into a bit mask. A line it can not
//! mask (a timer, a soft interrupt, or the [`UNIDENTIFIED`] sentinel) escalates to disabling all
//! interrupts for the length of each transaction. Escalation only ever goes up:
//!
//! ```text
//!  None --> Masked(mask) --> Global
//!    ^            |             |
//!    +------------+             |   (mask emptied by not_using)
//!    +--------------------------+   (only when the link's reference count drops to zero)
//! ```
//!
//! Once the mode is `Global` there is no way to know which registered line needed it, so
//! `not_using` can't safely step back down.

/// Interrupt number meaning "some handler that isn't an external interrupt line".
pub const UNIDENTIFIED: u8 = 255;

/// Platform interrupt controller, as far as the transaction layer needs it.
///
/// On an AVR this is `EIMSK` plus the global interrupt flag in `SREG`; other platforms map it
/// onto their own NVIC/PLIC equivalents.
pub trait InterruptControl {
    /// Bit in the source enable register for interrupt line `source`, or `None` if that line can
    /// not be masked on its own.
    fn source_mask(&self, source: u8) -> Option<u8>;

    /// Disable the sources in `mask` and return the previous value of the enable register.
    fn mask_sources(&mut self, mask: u8) -> u8;

    /// Write back an enable register value returned by [`mask_sources`](Self::mask_sources).
    fn restore_sources(&mut self, saved: u8);

    /// Disable all interrupts and return whether they were enabled before.
    fn disable_all(&mut self) -> bool;

    /// Restore the global interrupt flag returned by [`disable_all`](Self::disable_all).
    fn restore_all(&mut self, was_enabled: bool);
}

/// Interrupt controller for hosts where no interrupt handler ever touches the bus.
///
/// It knows no maskable lines, so registering one escalates to `Global`, and its global
/// disable does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoInterrupts;

impl InterruptControl for NoInterrupts {
    fn source_mask(&self, _source: u8) -> Option<u8> {
        None
    }

    fn mask_sources(&mut self, _mask: u8) -> u8 {
        0
    }

    fn restore_sources(&mut self, _saved: u8) {}

    fn disable_all(&mut self) -> bool {
        false
    }

    fn restore_all(&mut self, _was_enabled: bool) {}
}

/// Which interrupts have to be suppressed while a transaction runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InterruptMode {
    /// nobody registered an interrupt, transactions leave interrupts alone
    None,
    /// these bits of the source enable register get cleared during a transaction
    Masked(u8),
    /// all interrupts are disabled during a transaction
    Global,
}

impl Default for InterruptMode {
    fn default() -> Self {
        InterruptMode::None
    }
}

impl InterruptMode {
    /// Register a source, `None` meaning a source that can't be masked on its own.
    pub fn escalate(self, source: Option<u8>) -> InterruptMode {
        match (self, source) {
            (InterruptMode::Global, _) | (_, None) => InterruptMode::Global,
            (InterruptMode::None, Some(bit)) => InterruptMode::Masked(bit),
            (InterruptMode::Masked(mask), Some(bit)) => InterruptMode::Masked(mask | bit),
        }
    }

    /// Unregister a source. A no-op once `Global`.
    pub fn relax(self, source: Option<u8>) -> InterruptMode {
        match (self, source) {
            (InterruptMode::Global, _) => InterruptMode::Global,
            (mode, None) => mode,
            (InterruptMode::None, Some(_)) => InterruptMode::None,
            (InterruptMode::Masked(mask), Some(bit)) => match mask & !bit {
                0 => InterruptMode::None,
                rest => InterruptMode::Masked(rest),
            },
        }
    }
}

/// Interrupt state captured by [`InterruptGuard::mask`], valid for one transaction only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SavedInterrupts {
    /// nothing was masked
    Untouched,
    /// previous value of the source enable register
    Sources(u8),
    /// previous global interrupt flag
    Global(bool),
}

/// Tracks the [`InterruptMode`] and applies it at transaction boundaries.
#[derive(Debug, Default)]
pub struct InterruptGuard {
    mode: InterruptMode,
}

impl InterruptGuard {
    pub const fn new() -> Self {
        InterruptGuard {
            mode: InterruptMode::None,
        }
    }

    pub fn mode(&self) -> InterruptMode {
        self.mode
    }

    /// Register interrupt line `source`. Idempotent.
    pub fn using<I: InterruptControl>(&mut self, control: &I, source: u8) {
        let bit = control.source_mask(source);
        critical_section::with(|_| {
            let before = self.mode;
            self.mode = before.escalate(bit);

            #[cfg(feature = "defmt")]
            {
                if self.mode == InterruptMode::Global && before != InterruptMode::Global {
                    defmt::debug!("interrupt {} escalates transactions to global masking", source);
                }
            }
        });
    }

    /// Unregister interrupt line `source`, unless the mode already went `Global`.
    pub fn not_using<I: InterruptControl>(&mut self, control: &I, source: u8) {
        if self.mode == InterruptMode::Global {
            return;
        }
        let bit = control.source_mask(source);
        critical_section::with(|_| {
            self.mode = self.mode.relax(bit);
        });
    }

    /// Forget all registrations, only valid when the link is shut down.
    pub(crate) fn reset(&mut self) {
        self.mode = InterruptMode::None;
    }

    /// Suppress the registered interrupts and return what to restore afterwards.
    pub fn mask<I: InterruptControl>(&self, control: &mut I) -> SavedInterrupts {
        match self.mode {
            InterruptMode::None => SavedInterrupts::Untouched,
            InterruptMode::Masked(mask) => {
                // the enable register read-modify-write must not be interrupted itself
                let was_enabled = control.disable_all();
                let saved = control.mask_sources(mask);
                control.restore_all(was_enabled);
                SavedInterrupts::Sources(saved)
            }
            InterruptMode::Global => SavedInterrupts::Global(control.disable_all()),
        }
    }

    /// Undo a [`mask`](Self::mask).
    pub fn restore<I: InterruptControl>(&self, control: &mut I, saved: SavedInterrupts) {
        match saved {
            SavedInterrupts::Untouched => {}
            SavedInterrupts::Sources(sources) => {
                let was_enabled = control.disable_all();
                control.restore_sources(sources);
                control.restore_all(was_enabled);
            }
            SavedInterrupts::Global(was_enabled) => control.restore_all(was_enabled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// lines 0..=2 map to bits 0..=2, anything else is unmaskable
    struct FakeController {
        sources: u8,
        global: bool,
    }

    impl FakeController {
        fn new() -> Self {
            FakeController {
                sources: 0xff,
                global: true,
            }
        }
    }

    impl InterruptControl for FakeController {
        fn source_mask(&self, source: u8) -> Option<u8> {
            if source <= 2 {
                Some(1 << source)
            } else {
                None
            }
        }

        fn mask_sources(&mut self, mask: u8) -> u8 {
            let saved = self.sources;
            self.sources &= !mask;
            saved
        }

        fn restore_sources(&mut self, saved: u8) {
            self.sources = saved;
        }

        fn disable_all(&mut self) -> bool {
            core::mem::replace(&mut self.global, false)
        }

        fn restore_all(&mut self, was_enabled: bool) {
            self.global = was_enabled;
        }
    }

    #[test]
    fn using_then_not_using_returns_to_none() {
        let control = FakeController::new();
        let mut guard = InterruptGuard::new();

        guard.using(&control, 1);
        assert_eq!(guard.mode(), InterruptMode::Masked(0b010));
        guard.using(&control, 1);
        assert_eq!(guard.mode(), InterruptMode::Masked(0b010));
        guard.using(&control, 2);
        assert_eq!(guard.mode(), InterruptMode::Masked(0b110));

        guard.not_using(&control, 1);
        assert_eq!(guard.mode(), InterruptMode::Masked(0b100));
        guard.not_using(&control, 2);
        assert_eq!(guard.mode(), InterruptMode::None);
    }

    #[test]
    fn unknown_source_escalates_for_good() {
        let control = FakeController::new();
        let mut guard = InterruptGuard::new();

        guard.using(&control, 0);
        guard.using(&control, UNIDENTIFIED);
        assert_eq!(guard.mode(), InterruptMode::Global);

        guard.not_using(&control, 0);
        guard.not_using(&control, UNIDENTIFIED);
        assert_eq!(guard.mode(), InterruptMode::Global);

        guard.using(&control, 1);
        assert_eq!(guard.mode(), InterruptMode::Global);
    }

    #[test]
    fn masked_mode_clears_only_registered_sources() {
        let mut control = FakeController::new();
        let mut guard = InterruptGuard::new();
        guard.using(&control, 0);
        guard.using(&control, 2);

        let saved = guard.mask(&mut control);
        assert_eq!(saved, SavedInterrupts::Sources(0xff));
        assert_eq!(control.sources, 0b1111_1010);
        assert!(control.global);

        guard.restore(&mut control, saved);
        assert_eq!(control.sources, 0xff);
        assert!(control.global);
    }

    #[test]
    fn global_mode_restores_the_previous_flag() {
        let mut control = FakeController::new();
        let mut guard = InterruptGuard::new();
        guard.using(&control, 7);

        control.global = false;
        let saved = guard.mask(&mut control);
        assert_eq!(saved, SavedInterrupts::Global(false));
        guard.restore(&mut control, saved);
        assert!(!control.global);

        control.global = true;
        let saved = guard.mask(&mut control);
        assert!(!control.global);
        guard.restore(&mut control, saved);
        assert!(control.global);
    }

    #[test]
    fn no_mode_leaves_the_controller_alone() {
        let mut control = FakeController::new();
        let guard = InterruptGuard::new();
        let saved = guard.mask(&mut control);
        assert_eq!(saved, SavedInterrupts::Untouched);
        assert_eq!(control.sources, 0xff);
        assert!(control.global);
    }

    #[test]
    fn relax_on_none_or_unknown_is_harmless() {
        assert_eq!(InterruptMode::None.relax(Some(1)), InterruptMode::None);
        assert_eq!(InterruptMode::Masked(3).relax(None), InterruptMode::Masked(3));
    }
}
