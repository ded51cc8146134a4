//! Graphics support for the M5 driver
//!
//! This module is behind a feature flag. Enable it in your Cargo.toml with feature flag
//! "graphics".
//!
//! It implements [`DrawTarget`] on the [`M5`] device, so all the embedded_graphics primitives can
//! be drawn on the 128x64 panel. There is no framebuffer on the host: the panel memory lives in
//! the co-processor, and every pixel becomes a DrawPoint or ClearPoint frame. One `draw_iter`
//! call is one transaction.
//!
//! Pixel (0, 0) of embedded_graphics is the co-processor's (1, 1).
//!
//! Drawing pixel by pixel is slow, a frame costs about 150 µs plus the settle time of its five
//! bytes. Solid fills are sent as a single FillRect or ClearFilledRect frame instead, and
//! `clear` as ClearScreen or FullScreen.
use hal::{
    blocking::delay::{DelayMs, DelayUs},
    digital::v2::{InputPin, OutputPin},
};

use embedded_graphics_core::{
    draw_target::DrawTarget,
    geometry::{Dimensions, OriginDimensions, Size},
    pixelcolor::BinaryColor,
    primitives::Rectangle,
    Pixel,
};

use crate::{
    backend::Backend,
    display::M5,
    error::Error,
    instructions::prelude::*,
    interrupts::InterruptControl,
    HEIGHT, WIDTH,
};

impl<B, I, DELAY, BUSY, LED> DrawTarget for M5<B, I, DELAY, BUSY, LED>
where
    B: Backend,
    I: InterruptControl,
    DELAY: DelayUs<u16> + DelayMs<u16>,
    BUSY: InputPin,
    LED: OutputPin,
{
    type Color = BinaryColor;
    type Error = Error<B::Error>;

    fn draw_iter<P>(&mut self, pixels: P) -> Result<(), Self::Error>
    where
        P: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let bb = self.bounding_box();

        let points = pixels
            .into_iter()
            .filter(move |Pixel(pos, _color)| bb.contains(*pos))
            .map(|Pixel(pos, color)| {
                let x = pos.x as u8 + 1;
                let y = pos.y as u8 + 1;
                match color {
                    BinaryColor::On => DrawPoint { x, y },
                    BinaryColor::Off => ClearPoint { x, y },
                }
            });

        let (link, codec) = self.parts_mut();
        codec.send_all(link, points)
    }

    fn fill_solid(&mut self, area: &Rectangle, color: BinaryColor) -> Result<(), Self::Error> {
        let area = area.intersection(&self.bounding_box());
        let bottom_right = match area.bottom_right() {
            Some(point) => point,
            None => return Ok(()),
        };

        let x1 = area.top_left.x as u8 + 1;
        let y1 = area.top_left.y as u8 + 1;
        let x2 = bottom_right.x as u8 + 1;
        let y2 = bottom_right.y as u8 + 1;
        match color {
            BinaryColor::On => self.fill_rect(x1, y1, x2, y2),
            BinaryColor::Off => self.clear_filled_rect(x1, y1, x2, y2),
        }
    }

    fn clear(&mut self, color: BinaryColor) -> Result<(), Self::Error> {
        match color {
            BinaryColor::On => self.full_screen(),
            BinaryColor::Off => self.clear_screen(),
        }
    }
}

impl<B, I, DELAY, BUSY, LED> OriginDimensions for M5<B, I, DELAY, BUSY, LED> {
    fn size(&self) -> Size {
        Size::new(WIDTH as u32, HEIGHT as u32)
    }
}
