//! # Framing of instructions on the wire
//!
//! [`Frame`] turns an [`Instruction`] into the byte stream the co-processor expects,
//! [`FrameCodec`] pushes frames through a [`Link`] with the settle times the co-processor needs
//! between bytes.
//!
//! The co-processor samples bytes slowly. After every byte the host waits
//! [`Timing::transfer_settle_us`] and then [`Timing::byte_settle_us`], including after the `0x55`
//! trailer. Shortening those delays makes the co-processor drop bytes silently.

use core::iter;

use hal::{
    blocking::delay::{DelayMs, DelayUs},
    digital::v2::OutputPin,
};

use crate::{
    backend::Backend,
    error::Error,
    instructions::{Args, Instruction, FRAME_END, FRAME_START, TEXT_TERMINATOR},
    interrupts::InterruptControl,
    link::Link,
    settings::BusConfig,
};

/// Longest text payload a single frame can carry.
pub const MAX_TEXT_LEN: usize = 255;

/// Number of 0x00 bytes that flush a half received frame out of the co-processor.
pub const BUS_CLEAR_BYTES: usize = 2;

/// One encoded instruction, see [`Frame::bytes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    opcode: u8,
    args: Args,
    text: Option<&'a [u8]>,
}

impl<'a> Frame<'a> {
    /// Encode `instruction`.
    ///
    /// Returns `None` if its text contains a NUL byte (which would end the text early on the
    /// device) or is longer than [`MAX_TEXT_LEN`].
    pub fn new(instruction: &Instruction<'a>) -> Option<Self> {
        let text = instruction.text();
        if let Some(text) = text {
            if text.len() > MAX_TEXT_LEN || text.contains(&TEXT_TERMINATOR) {
                return None;
            }
        }
        Some(Frame {
            opcode: instruction.opcode(),
            args: instruction.args(),
            text,
        })
    }

    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    /// Whether the frame carries a 0x00 terminated text payload.
    pub fn is_variable_length(&self) -> bool {
        self.text.is_some()
    }

    /// The bytes of the frame in wire order: start marker, opcode, arguments, text and its
    /// terminator (string instructions only), end marker.
    pub fn bytes(&self) -> impl Iterator<Item = u8> + '_ {
        let text: &[u8] = self.text.unwrap_or(&[]);
        let terminator = self.text.map(|_| TEXT_TERMINATOR);

        iter::once(FRAME_START)
            .chain(iter::once(self.opcode))
            .chain(self.args.as_slice().iter().copied())
            .chain(text.iter().copied())
            .chain(terminator)
            .chain(iter::once(FRAME_END))
    }

    /// Number of bytes [`bytes`](Self::bytes) yields.
    pub fn wire_len(&self) -> usize {
        let text = self.text.map_or(0, |text| text.len() + 1);
        3 + self.args.as_slice().len() + text
    }
}

/// Delays the co-processor needs, all of them minimums.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timing {
    /// right after every byte the co-processor clocked in
    pub transfer_settle_us: u16,
    /// after every byte of a frame, on top of `transfer_settle_us`
    pub byte_settle_us: u16,
    /// between selecting the co-processor and the first byte
    pub select_settle_us: u16,
    /// between two frames sent in the same transaction
    pub frame_gap_us: u16,
    /// after the bus was cleared
    pub clear_settle_ms: u16,
    /// between the frames of a multi frame text helper
    pub line_gap_ms: u16,
    /// between the characters of [`M5::put_chars`](crate::M5::put_chars)
    pub char_gap_ms: u16,
    /// after a short run of [`M5::clear_space`](crate::M5::clear_space)
    pub space_settle_ms: u16,
    /// how often the busy line is sampled before giving up
    pub busy_polls: u32,
    /// between two samples of the busy line
    pub busy_poll_interval_us: u16,
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            transfer_settle_us: 30,
            byte_settle_us: 20,
            select_settle_us: 25,
            frame_gap_us: 150,
            clear_settle_ms: 100,
            line_gap_ms: 100,
            char_gap_ms: 40,
            space_settle_ms: 150,
            busy_polls: 5_000,
            busy_poll_interval_us: 100,
        }
    }
}

/// Sends frames through a [`Link`], every frame in its own transaction unless stated otherwise.
#[derive(Debug)]
pub struct FrameCodec<DELAY> {
    delay: DELAY,
    timing: Timing,
    config: BusConfig,
}

impl<DELAY> FrameCodec<DELAY>
where
    DELAY: DelayUs<u16> + DelayMs<u16>,
{
    /// New codec with default [`Timing`] and [`BusConfig::STANDARD`].
    pub fn new(delay: DELAY) -> Self {
        FrameCodec {
            delay,
            timing: Timing::default(),
            config: BusConfig::STANDARD,
        }
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    /// Use another bus configuration, e.g. [`BusConfig::new`] for a host not clocked at 16 MHz.
    pub fn with_config(mut self, config: BusConfig) -> Self {
        self.config = config;
        self
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    pub fn delay_ms(&mut self, ms: u16) {
        self.delay.delay_ms(ms);
    }

    pub fn delay_us(&mut self, us: u16) {
        self.delay.delay_us(us);
    }

    pub fn free(self) -> DELAY {
        self.delay
    }

    /// Send one instruction in a transaction of its own, then wait for its settle time.
    pub fn send<B, I, LED>(
        &mut self,
        link: &mut Link<B, I, LED>,
        instruction: &Instruction,
    ) -> Result<(), Error<B::Error>>
    where
        B: Backend,
        I: InterruptControl,
        LED: OutputPin,
    {
        let frame = match Frame::new(instruction) {
            Some(frame) => frame,
            None => return Err(Error::InvalidArgument),
        };
        let config = self.config;
        link.transaction(&config, |link| {
            self.select_settle();
            self.write_frame(link, &frame)
        })?;

        let settle = instruction.settle_ms();
        if settle > 0 {
            self.delay.delay_ms(settle);
        }
        Ok(())
    }

    /// Send a burst of instructions in a single transaction, [`Timing::frame_gap_us`] apart.
    ///
    /// Meant for long runs of cheap drawing instructions; settle times are not applied.
    pub fn send_all<'t, B, I, LED, It>(
        &mut self,
        link: &mut Link<B, I, LED>,
        instructions: It,
    ) -> Result<(), Error<B::Error>>
    where
        B: Backend,
        I: InterruptControl,
        LED: OutputPin,
        It: IntoIterator<Item = Instruction<'t>>,
    {
        let config = self.config;
        link.transaction(&config, |link| {
            self.select_settle();
            for instruction in instructions {
                let frame = match Frame::new(&instruction) {
                    Some(frame) => frame,
                    None => return Err(Error::InvalidArgument),
                };
                self.write_frame(link, &frame)?;
                self.delay.delay_us(self.timing.frame_gap_us);
            }
            Ok(())
        })
    }

    /// Transfer the single byte `request` in a transaction of its own and return the byte the
    /// co-processor shifted back in response.
    pub fn query<B, I, LED>(
        &mut self,
        link: &mut Link<B, I, LED>,
        request: u8,
    ) -> Result<u8, Error<B::Error>>
    where
        B: Backend,
        I: InterruptControl,
        LED: OutputPin,
    {
        let config = self.config;
        link.transaction(&config, |link| {
            self.select_settle();
            let response = link.transfer(request)?;
            self.byte_settle();
            Ok(response)
        })
    }

    /// Push a few 0x00 bytes so the co-processor drops whatever partial frame it was receiving
    /// when the host came up.
    pub fn clear_bus<B, I, LED>(&mut self, link: &mut Link<B, I, LED>) -> Result<(), Error<B::Error>>
    where
        B: Backend,
        I: InterruptControl,
        LED: OutputPin,
    {
        let config = self.config;
        link.transaction(&config, |link| {
            self.select_settle();
            for _ in 0..BUS_CLEAR_BYTES {
                link.transfer(0x00)?;
                self.byte_settle();
            }
            Ok(())
        })?;
        self.delay.delay_ms(self.timing.clear_settle_ms);
        Ok(())
    }

    fn select_settle(&mut self) {
        self.delay.delay_us(self.timing.select_settle_us);
    }

    fn byte_settle(&mut self) {
        self.delay.delay_us(self.timing.transfer_settle_us);
        self.delay.delay_us(self.timing.byte_settle_us);
    }

    fn write_frame<B, I, LED>(
        &mut self,
        link: &mut Link<B, I, LED>,
        frame: &Frame,
    ) -> Result<(), Error<B::Error>>
    where
        B: Backend,
        I: InterruptControl,
        LED: OutputPin,
    {
        for byte in frame.bytes() {
            link.transfer(byte)?;
            self.byte_settle();
        }
        Ok(())
    }
}
