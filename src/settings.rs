//! # Bus clock and framing settings
//!
//! A [`BusConfig`] turns "I want roughly this clock, this bit order and this SPI mode" into the two
//! control words an AVR-style SPI peripheral wants: the control register (`SPCR`) and the status
//! register (`SPSR`, which only carries the double speed bit).
//!
//! The peripheral divides the host clock by a power of two. Its divisor table, written with the
//! double speed bit inverted so the rows count upwards, looks like this:
//!
//! ```text
//!  SPR1 SPR0 ~SPI2X   SCK
//!    0    0     0     fosc/2
//!    0    0     1     fosc/4
//!    0    1     0     fosc/8
//!    0    1     1     fosc/16
//!    1    0     0     fosc/32
//!    1    0     1     fosc/64
//!    1    1     0     fosc/64   <- duplicate
//!    1    1     1     fosc/128
//! ```
//!
//! Backends that configure their clock some other way (an embedded-hal SPI peripheral, a GPIO
//! bit-bang) only look at [`BusConfig::frequency`], [`BusConfig::mode`] and
//! [`BusConfig::bit_order`] and never see the table.

use core::fmt;

use hal::spi::{Mode, Phase, Polarity, MODE_0};

/// SPI enable bit in `SPCR`
pub const SPE: u8 = 1 << 6;
/// data order bit in `SPCR`, set means LSB first
pub const DORD: u8 = 1 << 5;
/// master select bit in `SPCR`
pub const MSTR: u8 = 1 << 4;
/// clock polarity bit in `SPCR`
pub const CPOL: u8 = 1 << 3;
/// clock phase bit in `SPCR`
pub const CPHA: u8 = 1 << 2;
/// mask of the two clock rate bits `SPR1:SPR0` in `SPCR`
pub const CLOCK_MASK: u8 = 0b0000_0011;
/// double speed bit in `SPSR`
pub const SPI2X: u8 = 1 << 0;

/// slowest divider exponent; the divider is `2^(exponent + 1)`
pub const MAX_DIVIDER_EXPONENT: u8 = 6;

/// Clock of the host MCU on stock M5 boards
pub const DEFAULT_HOST_CLOCK: u32 = 16_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
/// Order in which the bits of a byte are shifted out
pub enum BitOrder {
    /// least significant bit first
    LsbFirst,
    /// most significant bit first, what the M5 co-processor expects
    MsbFirst,
}

/// Immutable bus configuration, usually created once as a `const`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    host_clock: u32,
    exponent: u8,
    bit_order: BitOrder,
    mode: Mode,
    spcr: u8,
    spsr: u8,
}

impl BusConfig {
    /// The configuration every M5 frame is sent with: 2 MHz, MSB first, mode 0 on a 16 MHz host.
    pub const STANDARD: BusConfig =
        BusConfig::new(DEFAULT_HOST_CLOCK, 2_000_000, BitOrder::MsbFirst, MODE_0);

    /// Compute the configuration for `requested` Hz on a host clocked at `host_clock` Hz.
    ///
    /// Picks the fastest clock that does not exceed `requested`. If even the slowest divider
    /// (128) is too fast, the slowest divider is used anyway.
    pub const fn new(host_clock: u32, requested: u32, bit_order: BitOrder, mode: Mode) -> Self {
        let mut exponent = 0;
        let mut setting = host_clock / 2;
        while exponent < MAX_DIVIDER_EXPONENT && requested < setting {
            setting /= 2;
            exponent += 1;
        }

        // Rows 6 and 7 of the table both divide by 64, so divide-by-128 lives at row 7.
        let mut code = if exponent == MAX_DIVIDER_EXPONENT { 7 } else { exponent };
        // SPI2X is active high in hardware but the table counts with it inverted.
        code ^= 0x01;

        let order = match bit_order {
            BitOrder::LsbFirst => DORD,
            BitOrder::MsbFirst => 0,
        };

        let spcr = SPE | MSTR | order | mode_bits(mode) | ((code >> 1) & CLOCK_MASK);
        let spsr = code & SPI2X;

        BusConfig {
            host_clock,
            exponent,
            bit_order,
            mode,
            spcr,
            spsr,
        }
    }

    /// Rebuild a configuration from raw `SPCR`/`SPSR` values, e.g. read back from a register dump.
    ///
    /// Bits that are not part of the configuration (interrupt enable, flags) are ignored.
    pub fn from_registers(host_clock: u32, spcr: u8, spsr: u8) -> Self {
        let bit_order = if spcr & DORD != 0 {
            BitOrder::LsbFirst
        } else {
            BitOrder::MsbFirst
        };
        let mode = Mode {
            polarity: if spcr & CPOL != 0 {
                Polarity::IdleHigh
            } else {
                Polarity::IdleLow
            },
            phase: if spcr & CPHA != 0 {
                Phase::CaptureOnSecondTransition
            } else {
                Phase::CaptureOnFirstTransition
            },
        };
        let spcr = spcr & (SPE | MSTR | DORD | CPOL | CPHA | CLOCK_MASK);
        let spsr = spsr & SPI2X;
        let exponent = divider_exponent(spcr, spsr);

        BusConfig {
            host_clock,
            exponent,
            bit_order,
            mode,
            spcr,
            spsr,
        }
    }

    /// value for the control register (`SPCR`)
    pub const fn control(&self) -> u8 {
        self.spcr
    }

    /// value for the status register (`SPSR`), only the double speed bit
    pub const fn status(&self) -> u8 {
        self.spsr
    }

    /// `(SPCR, SPSR)` as a pair
    pub const fn registers(&self) -> (u8, u8) {
        (self.spcr, self.spsr)
    }

    /// Exponent of the chosen divider, the divider being `2^(exponent + 1)`.
    pub const fn divider_exponent(&self) -> u8 {
        self.exponent
    }

    /// Divider between host clock and bus clock, one of 2, 4, 8 ... 128.
    pub const fn divider(&self) -> u32 {
        1 << (self.exponent + 1)
    }

    /// whether the double speed bit ends up set
    pub const fn double_speed(&self) -> bool {
        self.spsr & SPI2X != 0
    }

    /// The bus clock this configuration actually produces, in Hz.
    pub const fn frequency(&self) -> u32 {
        self.host_clock / self.divider()
    }

    /// clock of the host the configuration was computed for, in Hz
    pub const fn host_clock(&self) -> u32 {
        self.host_clock
    }

    pub const fn bit_order(&self) -> BitOrder {
        self.bit_order
    }

    pub const fn mode(&self) -> Mode {
        self.mode
    }
}

// embedded-hal's `Mode` has no `Debug`
impl fmt::Debug for BusConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let polarity = match self.mode.polarity {
            Polarity::IdleLow => "IdleLow",
            Polarity::IdleHigh => "IdleHigh",
        };
        let phase = match self.mode.phase {
            Phase::CaptureOnFirstTransition => "CaptureOnFirstTransition",
            Phase::CaptureOnSecondTransition => "CaptureOnSecondTransition",
        };
        f.debug_struct("BusConfig")
            .field("host_clock", &self.host_clock)
            .field("exponent", &self.exponent)
            .field("bit_order", &self.bit_order)
            .field("polarity", &polarity)
            .field("phase", &phase)
            .field("spcr", &self.spcr)
            .field("spsr", &self.spsr)
            .finish()
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        BusConfig::new(DEFAULT_HOST_CLOCK, 4_000_000, BitOrder::MsbFirst, MODE_0)
    }
}

const fn mode_bits(mode: Mode) -> u8 {
    let polarity = match mode.polarity {
        Polarity::IdleLow => 0,
        Polarity::IdleHigh => CPOL,
    };
    let phase = match mode.phase {
        Phase::CaptureOnFirstTransition => 0,
        Phase::CaptureOnSecondTransition => CPHA,
    };
    polarity | phase
}

// Reverse of the packing in BusConfig::new, reads the divider back from the register bits.
fn divider_exponent(spcr: u8, spsr: u8) -> u8 {
    let code = (((spcr & CLOCK_MASK) << 1) | (spsr & SPI2X)) ^ 0x01;
    match code {
        7 => MAX_DIVIDER_EXPONENT,
        // row 6 is the duplicate fosc/64
        6 => MAX_DIVIDER_EXPONENT - 1,
        n => n,
    }
}
