//! # Driver for the M5 LCD/keypad co-processor
//!
//! The M5 board puts a 128x64 monochrome LCD and a keypad behind a small co-processor that is
//! talked to over SPI. The host never touches pixels: it sends framed instructions
//! (`0xAA opcode args.. 0x55`) and reads back key codes.
//!
//! The crate is made of two layers:
//!
//!  - the bus layer: [`BusConfig`] computes the clock/mode configuration, [`Link`] owns a
//!    [`Backend`] and arbitrates the bus between the main program and interrupt handlers
//!    (reference counted enable, interrupt masking around transactions, begin/end mismatch
//!    detection). It knows nothing about the M5 and can be shared with other devices.
//!  - the device layer: [`FrameCodec`] encodes [`Instruction`]s into frames, [`M5`] wraps it all
//!    into one driver with a method per instruction and a few character grid helpers.
//!
//! Two feature flags add extensions to [`M5`]:
//!
//!  - "textmode": [`core::fmt::Write`] with a text cursor on the 16x4 character grid
//!  - "graphics": the embedded_graphics `DrawTarget` trait
//!
//! The "defmt" feature adds `defmt::Format` to the public types and logs mismatches, interrupt
//! mode escalation and timeouts.
//!
//! ```ignore
//! let backend = SpiBackend::new(spi, cs)?;
//! let link = Link::new(backend, NoInterrupts);
//! let mut m5 = M5::new(link, FrameCodec::new(delay), DummyInputPin)?;
//! m5.reset()?;
//! m5.put_str_line(1, 1, "hello")?;
//! let key = m5.read_key()?;
//! ```
#![no_std]

extern crate embedded_hal as hal;

/// panel width in pixels
pub const WIDTH: u8 = 128;
/// panel height in pixels
pub const HEIGHT: u8 = 64;
/// columns of the character grid (8 pixel wide font)
pub const COLUMNS: u8 = WIDTH / 8;
/// rows of the character grid (16 pixel high rows)
pub const ROWS: u8 = HEIGHT / 16;
/// size of a whole screen bitmap for [`M5::draw_bitmap`], one bit per pixel
pub const BITMAP_SIZE: usize = WIDTH as usize * HEIGHT as usize / 8;

pub mod backend;
pub mod bitbang;
pub mod display;
pub mod dummypins;
pub mod error;
pub mod frame;
pub mod instructions;
pub mod interrupts;
pub mod link;
pub mod registers;
pub mod settings;

mod lifecycle;
mod transaction;

#[cfg(feature = "graphics")]
pub mod graphics;
#[cfg(feature = "textmode")]
pub mod textmode;

pub use crate::{
    backend::{Backend, SpiBackend},
    bitbang::BitBangBackend,
    display::M5,
    dummypins::{DummyInputPin, DummyOutputPin},
    error::{Error, SpiBackendError},
    frame::{Frame, FrameCodec, Timing},
    instructions::Instruction,
    interrupts::{InterruptControl, InterruptMode, NoInterrupts, UNIDENTIFIED},
    link::{Link, TransactionState},
    registers::{RegisterBackend, SpiRegisters},
    settings::{BitOrder, BusConfig},
};

#[cfg(feature = "textmode")]
pub use crate::textmode::TextMode;
