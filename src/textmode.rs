//! # Textmode extension for the M5 driver
//!
//! Keeps a text cursor on the 16x4 character grid of the co-processor's small font and
//! implements [`core::fmt::Write`], so `write!()` and `writeln!()` work on the device.
//!
//! Characters are collected until the end of the line (or of the written string) and then sent
//! as one string frame. `\n` moves to the start of the next row, `\r` to the start of the current
//! row. After the last row the cursor wraps around to the first one. Nothing is erased on the
//! way, call [`TextMode::cls`] or [`M5::clear_str_line`] for that. Characters outside of ASCII
//! show up as `?`.
use core::fmt::Error as FmtError;
use core::fmt::Result as FmtResult;
use core::fmt::Write;

use hal::{
    blocking::delay::{DelayMs, DelayUs},
    digital::v2::{InputPin, OutputPin},
};

use crate::{backend::Backend, display::M5, error::Error, interrupts::InterruptControl, COLUMNS, ROWS};

/// Text cursor handling on top of the [`M5`] driver
pub trait TextMode<E> {
    /// column of the text cursor, 0..16
    fn pos(&self) -> u8;

    /// row of the text cursor, 0..4
    fn row(&self) -> u8;

    /// move the text cursor, out of grid positions are ignored
    fn set_position(&mut self, text_col: u8, text_row: u8);

    /// clear the screen and move the cursor to (0, 0)
    fn cls(&mut self) -> Result<(), Error<E>>;
}

impl<B, I, DELAY, BUSY, LED> TextMode<B::Error> for M5<B, I, DELAY, BUSY, LED>
where
    B: Backend,
    I: InterruptControl,
    DELAY: DelayUs<u16> + DelayMs<u16>,
    BUSY: InputPin,
    LED: OutputPin,
{
    fn pos(&self) -> u8 {
        self.text_col
    }

    fn row(&self) -> u8 {
        self.text_row
    }

    fn set_position(&mut self, text_col: u8, text_row: u8) {
        if text_col < COLUMNS && text_row < ROWS {
            self.text_col = text_col;
            self.text_row = text_row;
        }
    }

    fn cls(&mut self) -> Result<(), Error<B::Error>> {
        self.text_col = 0;
        self.text_row = 0;
        self.clear_screen()
    }
}

impl<B, I, DELAY, BUSY, LED> M5<B, I, DELAY, BUSY, LED>
where
    B: Backend,
    I: InterruptControl,
    DELAY: DelayUs<u16> + DelayMs<u16>,
    BUSY: InputPin,
    LED: OutputPin,
{
    // send the pending characters at the cursor and advance it
    fn flush_text(&mut self, pending: &[u8]) -> Result<(), Error<B::Error>> {
        if pending.is_empty() {
            return Ok(());
        }
        self.put_text_line(self.text_row + 1, self.text_col + 1, pending)?;
        self.text_col += pending.len() as u8;
        Ok(())
    }

    fn line_feed(&mut self) {
        self.text_col = 0;
        self.text_row = (self.text_row + 1) % ROWS;
    }
}

impl<B, I, DELAY, BUSY, LED> Write for M5<B, I, DELAY, BUSY, LED>
where
    B: Backend,
    I: InterruptControl,
    DELAY: DelayUs<u16> + DelayMs<u16>,
    BUSY: InputPin,
    LED: OutputPin,
{
    fn write_str(&mut self, s: &str) -> FmtResult {
        let mut pending = [0u8; COLUMNS as usize];
        let mut len = 0;

        for c in s.chars() {
            match c {
                '\n' => {
                    self.flush_text(&pending[..len]).map_err(|_| FmtError)?;
                    len = 0;
                    self.line_feed();
                }
                '\r' => {
                    self.flush_text(&pending[..len]).map_err(|_| FmtError)?;
                    len = 0;
                    self.text_col = 0;
                }
                _ => {
                    pending[len] = if c.is_ascii() && !c.is_ascii_control() { c as u8 } else { b'?' };
                    len += 1;
                    if usize::from(self.text_col) + len >= usize::from(COLUMNS) {
                        self.flush_text(&pending[..len]).map_err(|_| FmtError)?;
                        len = 0;
                        self.line_feed();
                    }
                }
            }
        }

        self.flush_text(&pending[..len]).map_err(|_| FmtError)
    }
}
