//! # Main driver for the M5 co-processor
//!
//! This contains the [`M5`] device, which owns the bus [`Link`], a [`FrameCodec`] and the
//! co-processor's busy line. The TextMode and Graphics extensions (behind feature flags) are
//! built on top of it, see the similarly named modules.
//!
//! Typically you want to look into the following functions:
//!  - [`M5::new`] to create the device, it also flushes the bus
//!  - [`M5::reset`] to switch the co-processor to user mode and clear the panel
//!  - [`M5::put_str_line`] and friends to write on the 16x4 character grid
//!  - [`M5::read_key`] to get the last key pressed on the keypad
//!
//! The drawing functions take pixel coordinates as the co-processor expects them, 1-based, and
//! pass them through unchecked. The character grid functions take 1-based rows and columns and
//! reject anything outside the grid.
use hal::{
    blocking::delay::{DelayMs, DelayUs},
    digital::v2::{InputPin, OutputPin},
};

use crate::{
    backend::Backend,
    dummypins::{DummyInputPin, DummyOutputPin},
    error::Error,
    frame::FrameCodec,
    instructions::{prelude::*, READ_KEY},
    interrupts::InterruptControl,
    link::Link,
    BITMAP_SIZE, COLUMNS, HEIGHT, ROWS, WIDTH,
};

/// largest number [`M5::put_number_line`] can show
pub const MAX_NUMBER: u32 = 999_999;

const SPACES: [u8; COLUMNS as usize] = [b' '; COLUMNS as usize];

// a text fragment longer than this is cleared in two frames
const CLEAR_SPLIT: u8 = 12;

#[derive(Debug)]
/// main struct for talking to the M5 co-processor, see the module documentation
pub struct M5<B, I, DELAY, BUSY = DummyInputPin, LED = DummyOutputPin> {
    link: Link<B, I, LED>,
    codec: FrameCodec<DELAY>,
    busy: BUSY,
    #[cfg(feature = "textmode")]
    /// column of the text cursor, in range 0..16
    pub text_col: u8,
    #[cfg(feature = "textmode")]
    /// row of the text cursor, in range 0..4
    pub text_row: u8,
}

impl<B, I, DELAY, BUSY, LED> M5<B, I, DELAY, BUSY, LED>
where
    B: Backend,
    I: InterruptControl,
    DELAY: DelayUs<u16> + DelayMs<u16>,
    BUSY: InputPin,
    LED: OutputPin,
{
    /// Create the device and flush the bus.
    ///
    /// Arguments:
    ///
    /// - link: the bus link, it is acquired here and stays acquired until [`release`](Self::release)
    /// - codec: frame codec with the delay provider and timing to use
    /// - busy: the co-processor's status line (high while busy), or a [`DummyInputPin`]
    ///
    /// The co-processor may have seen half a frame while the host was starting up, so two
    /// 0x00 bytes are clocked out before anything else.
    pub fn new(
        mut link: Link<B, I, LED>,
        mut codec: FrameCodec<DELAY>,
        busy: BUSY,
    ) -> Result<Self, Error<B::Error>> {
        link.acquire()?;
        codec.clear_bus(&mut link)?;

        Ok(M5 {
            link,
            codec,
            busy,
            #[cfg(feature = "textmode")]
            text_col: 0,
            #[cfg(feature = "textmode")]
            text_row: 0,
        })
    }

    /// Switch the co-processor to user mode and clear the panel.
    ///
    /// Takes about a second because of the settle time of both instructions.
    pub fn reset(&mut self) -> Result<(), Error<B::Error>> {
        self.send(&UserMode)?;
        self.send(&ClearScreen)
    }

    /// Send any instruction, see [`Instruction`] for the whole set.
    pub fn send(&mut self, instruction: &Instruction) -> Result<(), Error<B::Error>> {
        self.codec.send(&mut self.link, instruction)
    }

    pub fn user_mode(&mut self) -> Result<(), Error<B::Error>> {
        self.send(&UserMode)
    }

    /// Set the contrast ratio of the LCD
    pub fn set_contrast(&mut self, ratio: u8) -> Result<(), Error<B::Error>> {
        self.send(&Contrast(ratio))
    }

    /// Set the brightness of the backlight
    pub fn set_light(&mut self, level: u8) -> Result<(), Error<B::Error>> {
        self.send(&Light(level))
    }

    pub fn clear_screen(&mut self) -> Result<(), Error<B::Error>> {
        self.send(&ClearScreen)
    }

    pub fn full_screen(&mut self) -> Result<(), Error<B::Error>> {
        self.send(&FullScreen)
    }

    pub fn draw_point(&mut self, x: u8, y: u8) -> Result<(), Error<B::Error>> {
        self.send(&DrawPoint { x, y })
    }

    pub fn clear_point(&mut self, x: u8, y: u8) -> Result<(), Error<B::Error>> {
        self.send(&ClearPoint { x, y })
    }

    pub fn put_char(&mut self, x: u8, y: u8, ch: u8) -> Result<(), Error<B::Error>> {
        self.send(&PutChar { x, y, ch })
    }

    pub fn put_char_inverse(&mut self, x: u8, y: u8, ch: u8) -> Result<(), Error<B::Error>> {
        self.send(&PutCharInverse { x, y, ch })
    }

    pub fn put_double_char(&mut self, x: u8, y: u8, ch: u8) -> Result<(), Error<B::Error>> {
        self.send(&PutDoubleChar { x, y, ch })
    }

    pub fn put_double_char_inverse(&mut self, x: u8, y: u8, ch: u8) -> Result<(), Error<B::Error>> {
        self.send(&PutDoubleCharInverse { x, y, ch })
    }

    /// Draw `text` character by character, 8 pixels apart, one frame per character.
    ///
    /// Slower than [`put_str`](Self::put_str) but each character shows up as soon as it is sent.
    pub fn put_chars(&mut self, x: u8, y: u8, text: &str) -> Result<(), Error<B::Error>> {
        let gap = self.codec.timing().char_gap_ms;
        for (i, ch) in text.bytes().enumerate() {
            let x = x.wrapping_add((i as u8).wrapping_mul(8));
            self.put_char(x, y, ch)?;
            self.codec.delay_ms(gap);
        }
        Ok(())
    }

    /// Draw a string at pixel position (`x`, `y`) with the small font
    pub fn put_str(&mut self, x: u8, y: u8, text: &str) -> Result<(), Error<B::Error>> {
        self.send(&PutStr { x, y, text: text.as_bytes() })
    }

    pub fn put_str_inverse(&mut self, x: u8, y: u8, text: &str) -> Result<(), Error<B::Error>> {
        self.send(&PutStrInverse { x, y, text: text.as_bytes() })
    }

    pub fn put_double_str(&mut self, x: u8, y: u8, text: &str) -> Result<(), Error<B::Error>> {
        self.send(&PutDoubleStr { x, y, text: text.as_bytes() })
    }

    pub fn put_double_str_inverse(&mut self, x: u8, y: u8, text: &str) -> Result<(), Error<B::Error>> {
        self.send(&PutDoubleStrInverse { x, y, text: text.as_bytes() })
    }

    pub fn draw_line(&mut self, x1: u8, y1: u8, x2: u8, y2: u8) -> Result<(), Error<B::Error>> {
        self.send(&DrawLine { x1, y1, x2, y2 })
    }

    pub fn clear_line(&mut self, x1: u8, y1: u8, x2: u8, y2: u8) -> Result<(), Error<B::Error>> {
        self.send(&ClearLine { x1, y1, x2, y2 })
    }

    /// Rectangle outline from corner (`x1`, `y1`) to corner (`x2`, `y2`)
    pub fn draw_rect(&mut self, x1: u8, y1: u8, x2: u8, y2: u8) -> Result<(), Error<B::Error>> {
        self.send(&DrawRect { x1, y1, x2, y2 })
    }

    pub fn clear_rect(&mut self, x1: u8, y1: u8, x2: u8, y2: u8) -> Result<(), Error<B::Error>> {
        self.send(&ClearRect { x1, y1, x2, y2 })
    }

    pub fn fill_rect(&mut self, x1: u8, y1: u8, x2: u8, y2: u8) -> Result<(), Error<B::Error>> {
        self.send(&FillRect { x1, y1, x2, y2 })
    }

    pub fn clear_filled_rect(&mut self, x1: u8, y1: u8, x2: u8, y2: u8) -> Result<(), Error<B::Error>> {
        self.send(&ClearFilledRect { x1, y1, x2, y2 })
    }

    pub fn draw_chamfer_rect(&mut self, x1: u8, y1: u8, x2: u8, y2: u8) -> Result<(), Error<B::Error>> {
        self.send(&DrawChamferRect { x1, y1, x2, y2 })
    }

    pub fn clear_chamfer_rect(&mut self, x1: u8, y1: u8, x2: u8, y2: u8) -> Result<(), Error<B::Error>> {
        self.send(&ClearChamferRect { x1, y1, x2, y2 })
    }

    /// Write `text` on the 16x4 character grid, starting at `row` (1..=4) and `col` (1..=16).
    ///
    /// The text is not wrapped, whatever doesn't fit runs off the panel.
    pub fn put_str_line(&mut self, row: u8, col: u8, text: &str) -> Result<(), Error<B::Error>> {
        self.put_text_line(row, col, text.as_bytes())
    }

    /// Write `value` in decimal on the character grid, with at least two digits (`7` shows as
    /// "07"). Values above [`MAX_NUMBER`] are rejected.
    pub fn put_number_line(&mut self, row: u8, col: u8, value: u32) -> Result<(), Error<B::Error>> {
        if value > MAX_NUMBER {
            return Err(Error::InvalidArgument);
        }
        let (digits, start) = number_digits(value);
        self.put_text_line(row, col, &digits[start..])
    }

    /// Blank a whole row of the character grid.
    pub fn clear_str_line(&mut self, row: u8) -> Result<(), Error<B::Error>> {
        let half = COLUMNS / 2 + 1;
        self.put_text_line(row, 1, &SPACES[..usize::from(COLUMNS / 2)])?;
        self.line_gap();
        self.put_text_line(row, half, &SPACES[..usize::from(COLUMNS / 2)])
    }

    /// Blank `len` characters of `row`, starting at `col`.
    ///
    /// The run has to fit into the row. Runs longer than 12 characters go out as two frames,
    /// shorter ones as one frame followed by [`Timing::space_settle_ms`](crate::Timing).
    pub fn clear_space(&mut self, row: u8, col: u8, len: u8) -> Result<(), Error<B::Error>> {
        Self::grid_origin(row, col)?;
        if u16::from(col) + u16::from(len) > u16::from(COLUMNS) + 1 {
            return Err(Error::InvalidArgument);
        }
        if len > CLEAR_SPLIT {
            self.put_text_line(row, col, &SPACES[..usize::from(CLEAR_SPLIT)])?;
            self.line_gap();
            let rest = usize::from(len - CLEAR_SPLIT);
            self.put_text_line(row, col + CLEAR_SPLIT, &SPACES[..rest])
        } else {
            self.put_text_line(row, col, &SPACES[..usize::from(len)])?;
            let settle = self.codec.timing().space_settle_ms;
            self.codec.delay_ms(settle);
            Ok(())
        }
    }

    /// Draw a whole screen bitmap.
    ///
    /// `bitmap` holds 8 bytes per column, 128 columns, the first byte covers the top 8 pixels of
    /// the column with the least significant bit on top. Only the set pixels are sent, each as a
    /// DrawPoint frame, all of them in one transaction. Nothing is cleared first.
    pub fn draw_bitmap(&mut self, bitmap: &[u8; BITMAP_SIZE]) -> Result<(), Error<B::Error>> {
        const BANKS: u8 = HEIGHT / 8;
        let points = (0..WIDTH).flat_map(move |column| {
            (0..BANKS).flat_map(move |bank| {
                let byte = bitmap[usize::from(column) * usize::from(BANKS) + usize::from(bank)];
                (0..8u8)
                    .filter(move |&bit| byte & (1 << bit) != 0)
                    .map(move |bit| DrawPoint {
                        x: column + 1,
                        y: bank * 8 + bit + 1,
                    })
            })
        });
        self.codec.send_all(&mut self.link, points)
    }

    /// The last key pressed on the keypad, as reported by the co-processor.
    pub fn read_key(&mut self) -> Result<u8, Error<B::Error>> {
        self.codec.query(&mut self.link, READ_KEY)
    }

    /// Whether the co-processor is still working on the last instruction
    pub fn is_busy(&self) -> Result<bool, BUSY::Error> {
        self.busy.is_high()
    }

    pub fn is_free(&self) -> Result<bool, BUSY::Error> {
        self.busy.is_low()
    }

    /// Poll the busy line until the co-processor is free, at most [`Timing::busy_polls`]
    /// times.
    ///
    /// [`Timing::busy_polls`]: crate::frame::Timing::busy_polls
    pub fn wait_until_free(&mut self) -> Result<(), Error<BUSY::Error>> {
        let timing = *self.codec.timing();
        for _ in 0..timing.busy_polls.max(1) {
            if self.busy.is_low()? {
                return Ok(());
            }
            self.codec.delay_us(timing.busy_poll_interval_us);
        }

        #[cfg(feature = "defmt")]
        defmt::warn!("co-processor still busy after {} polls", timing.busy_polls);

        Err(Error::TimedOut)
    }

    pub fn link(&self) -> &Link<B, I, LED> {
        &self.link
    }

    /// The bus link, for other drivers sharing the bus.
    pub fn link_mut(&mut self) -> &mut Link<B, I, LED> {
        &mut self.link
    }

    pub fn codec_mut(&mut self) -> &mut FrameCodec<DELAY> {
        &mut self.codec
    }

    /// Give up this device's hold on the link, switching the bus off if nobody else holds it.
    ///
    /// Sending anything afterwards needs another [`Link::acquire`] first.
    pub fn release(&mut self) -> Result<(), Error<B::Error>> {
        self.link.release()
    }

    pub(crate) fn parts_mut(&mut self) -> (&mut Link<B, I, LED>, &mut FrameCodec<DELAY>) {
        (&mut self.link, &mut self.codec)
    }

    /// Take the device apart.
    pub fn free(self) -> (Link<B, I, LED>, FrameCodec<DELAY>, BUSY) {
        (self.link, self.codec, self.busy)
    }

    pub(crate) fn put_text_line(&mut self, row: u8, col: u8, text: &[u8]) -> Result<(), Error<B::Error>> {
        let (x, y) = Self::grid_origin(row, col)?;
        self.send(&PutStr { x, y, text })
    }

    // pixel position of a 1-based grid cell
    fn grid_origin(row: u8, col: u8) -> Result<(u8, u8), Error<B::Error>> {
        if (1..=ROWS).contains(&row) && (1..=COLUMNS).contains(&col) {
            Ok((8 * (col - 1) + 1, 16 * (row - 1) + 1))
        } else {
            Err(Error::InvalidArgument)
        }
    }

    fn line_gap(&mut self) {
        let gap = self.codec.timing().line_gap_ms;
        self.codec.delay_ms(gap);
    }
}

// six digit rendering of `value` and the index of its first shown digit
fn number_digits(value: u32) -> ([u8; 6], usize) {
    let mut digits = [b'0'; 6];
    let mut rest = value;
    for digit in digits.iter_mut().rev() {
        *digit = b'0' + (rest % 10) as u8;
        rest /= 10;
    }
    let leading = digits.iter().take_while(|&&d| d == b'0').count();
    (digits, leading.min(digits.len() - 2))
}
