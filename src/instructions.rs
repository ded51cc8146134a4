//! # Module defining the instruction set of the M5 co-processor
//!
//! Every instruction travels as one frame:
//!
//! ```text
//!  0xAA  opcode  arg_0 .. arg_n  [text .. 0x00]  0x55
//! ```
//!
//! The co-processor owns the LCD and the keypad; the host never sees pixels, only these
//! instructions. Coordinates are passed through as they are, in the device's own 1-based
//! addressing on the 128x64 panel (x = 1..=128, y = 1..=64).
//!
//! ## Text
//! Strings go out as raw bytes followed by a 0x00 terminator, so they can't contain NUL
//! themselves. The "inverse" variants draw dark-on-light text, the "double" variants use the
//! 16 pixel high font.
//!
//! ## Settle time
//! Some instructions keep the co-processor busy for a long time (clearing the whole panel,
//! switching the contrast pump). [`Instruction::settle_ms`] gives the time the host should leave
//! it alone afterwards.

/// first byte of every frame
pub const FRAME_START: u8 = 0xAA;
/// last byte of every frame
pub const FRAME_END: u8 = 0x55;
/// ends the text payload of a string instruction
pub const TEXT_TERMINATOR: u8 = 0x00;
/// fixed last argument of the chamfered rectangle instructions
pub const CHAMFER: u8 = 0x0D;
/// sent on its own (no frame) to read the last pressed key
pub const READ_KEY: u8 = 0xFF;

/// M5 instruction set, see the module documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction<'a> {
    /// switch the co-processor to user mode, sent once after power up
    // translates to: 0x05
    UserMode,

    /// set the LCD contrast ratio
    // translates to: 0x10 ratio
    Contrast(u8),

    /// set the backlight brightness
    // translates to: 0x11 level
    Light(u8),

    /// clear the whole panel
    // translates to: 0x12
    ClearScreen,

    /// fill the whole panel
    // translates to: 0x13
    FullScreen,

    /// set a single pixel
    // translates to: 0x14 x y
    DrawPoint { x: u8, y: u8 },

    /// clear a single pixel
    // translates to: 0x15 x y
    ClearPoint { x: u8, y: u8 },

    /// draw one 8x8 character
    // translates to: 0x16 x y ch
    PutChar { x: u8, y: u8, ch: u8 },

    /// draw one 8x8 character inverted
    // translates to: 0x17 x y ch
    PutCharInverse { x: u8, y: u8, ch: u8 },

    /// draw one 8x16 character
    // translates to: 0x18 x y ch
    PutDoubleChar { x: u8, y: u8, ch: u8 },

    /// draw one 8x16 character inverted
    // translates to: 0x19 x y ch
    PutDoubleCharInverse { x: u8, y: u8, ch: u8 },

    /// draw a string with the 8x8 font
    // translates to: 0x1A x y text.. 0x00
    PutStr { x: u8, y: u8, text: &'a [u8] },

    /// draw a string with the 8x8 font inverted
    // translates to: 0x1B x y text.. 0x00
    PutStrInverse { x: u8, y: u8, text: &'a [u8] },

    /// draw a string with the 8x16 font
    // translates to: 0x1C x y text.. 0x00
    PutDoubleStr { x: u8, y: u8, text: &'a [u8] },

    /// draw a string with the 8x16 font inverted
    // translates to: 0x1D x y text.. 0x00
    PutDoubleStrInverse { x: u8, y: u8, text: &'a [u8] },

    // translates to: 0x1E x1 y1 x2 y2
    DrawLine { x1: u8, y1: u8, x2: u8, y2: u8 },

    // translates to: 0x1F x1 y1 x2 y2
    ClearLine { x1: u8, y1: u8, x2: u8, y2: u8 },

    /// rectangle outline
    // translates to: 0x20 x1 y1 x2 y2
    DrawRect { x1: u8, y1: u8, x2: u8, y2: u8 },

    // translates to: 0x21 x1 y1 x2 y2
    ClearRect { x1: u8, y1: u8, x2: u8, y2: u8 },

    /// solid rectangle
    // translates to: 0x22 x1 y1 x2 y2
    FillRect { x1: u8, y1: u8, x2: u8, y2: u8 },

    // translates to: 0x23 x1 y1 x2 y2
    ClearFilledRect { x1: u8, y1: u8, x2: u8, y2: u8 },

    /// rectangle outline with chamfered corners
    // translates to: 0x24 x1 y1 x2 y2 0x0D
    DrawChamferRect { x1: u8, y1: u8, x2: u8, y2: u8 },

    // translates to: 0x25 x1 y1 x2 y2 0x0D
    ClearChamferRect { x1: u8, y1: u8, x2: u8, y2: u8 },
}

use Instruction::*;

/// Fixed size arguments of one instruction, at most five bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Args {
    bytes: [u8; 5],
    len: u8,
}

impl Args {
    fn new(args: &[u8]) -> Self {
        let mut bytes = [0; 5];
        bytes[..args.len()].copy_from_slice(args);
        Args {
            bytes,
            len: args.len() as u8,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }
}

impl<'a> Instruction<'a> {
    /// The opcode byte following [`FRAME_START`].
    pub fn opcode(&self) -> u8 {
        match self {
            UserMode => 0x05,
            Contrast(_) => 0x10,
            Light(_) => 0x11,
            ClearScreen => 0x12,
            FullScreen => 0x13,
            DrawPoint { .. } => 0x14,
            ClearPoint { .. } => 0x15,
            PutChar { .. } => 0x16,
            PutCharInverse { .. } => 0x17,
            PutDoubleChar { .. } => 0x18,
            PutDoubleCharInverse { .. } => 0x19,
            PutStr { .. } => 0x1a,
            PutStrInverse { .. } => 0x1b,
            PutDoubleStr { .. } => 0x1c,
            PutDoubleStrInverse { .. } => 0x1d,
            DrawLine { .. } => 0x1e,
            ClearLine { .. } => 0x1f,
            DrawRect { .. } => 0x20,
            ClearRect { .. } => 0x21,
            FillRect { .. } => 0x22,
            ClearFilledRect { .. } => 0x23,
            DrawChamferRect { .. } => 0x24,
            ClearChamferRect { .. } => 0x25,
        }
    }

    /// The fixed size arguments, in wire order.
    pub fn args(&self) -> Args {
        match *self {
            UserMode | ClearScreen | FullScreen => Args::new(&[]),
            Contrast(value) | Light(value) => Args::new(&[value]),
            DrawPoint { x, y } | ClearPoint { x, y } => Args::new(&[x, y]),
            PutChar { x, y, ch }
            | PutCharInverse { x, y, ch }
            | PutDoubleChar { x, y, ch }
            | PutDoubleCharInverse { x, y, ch } => Args::new(&[x, y, ch]),
            PutStr { x, y, .. }
            | PutStrInverse { x, y, .. }
            | PutDoubleStr { x, y, .. }
            | PutDoubleStrInverse { x, y, .. } => Args::new(&[x, y]),
            DrawLine { x1, y1, x2, y2 }
            | ClearLine { x1, y1, x2, y2 }
            | DrawRect { x1, y1, x2, y2 }
            | ClearRect { x1, y1, x2, y2 }
            | FillRect { x1, y1, x2, y2 }
            | ClearFilledRect { x1, y1, x2, y2 } => Args::new(&[x1, y1, x2, y2]),
            DrawChamferRect { x1, y1, x2, y2 } | ClearChamferRect { x1, y1, x2, y2 } => {
                Args::new(&[x1, y1, x2, y2, CHAMFER])
            }
        }
    }

    /// The variable length text payload of the string instructions.
    pub fn text(&self) -> Option<&'a [u8]> {
        match *self {
            PutStr { text, .. }
            | PutStrInverse { text, .. }
            | PutDoubleStr { text, .. }
            | PutDoubleStrInverse { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Milliseconds the co-processor needs after this instruction before it takes the next one.
    pub fn settle_ms(&self) -> u16 {
        match self {
            UserMode | Contrast(_) | Light(_) | ClearScreen | FullScreen => 500,
            _ => 0,
        }
    }
}

/// A prelude for convenience, it pulls the instruction enum and its variants into scope.
pub mod prelude {
    pub use super::{Instruction, Instruction::*};
}
