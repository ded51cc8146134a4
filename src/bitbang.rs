//! "Bit bang" full duplex SPI backend
//!
//! Use when you don't want to sacrifice a SPI port, or the SPI pins of your board don't line up
//! with the co-processor's connector.
//!
//! Unlike a write-only bit bang this one samples MISO, because the M5 co-processor answers key
//! reads over it. Bit order and all four clock modes of the [`BusConfig`] are honoured; the clock
//! frequency only matters if a real delay is passed in, see [`BitBangBackend::new_with_delay`].

use core::marker::PhantomData;

use hal::blocking::delay::DelayUs;
use hal::digital::v2::{InputPin, OutputPin};
use hal::spi::{Mode, Phase, Polarity, MODE_0};

use crate::{
    backend::Backend,
    settings::{BitOrder, BusConfig},
};

/// Used to run without delay on a slow enough clock speed
pub struct NoDelay {}

impl DelayUs<u8> for NoDelay {
    #[inline]
    fn delay_us(&mut self, _us: u8) {}
}

/// "Bit bang" SPI backend.
pub struct BitBangBackend<ERR, SCK, MOSI, MISO, CS, DELAY> {
    sck: SCK,
    mosi: MOSI,
    miso: MISO,
    cs: CS,
    delay: DELAY,
    mode: Mode,
    bit_order: BitOrder,
    half_period_us: u8,
    received: u8,
    _phantom: PhantomData<ERR>,
}

impl<ERR, SCK, MOSI, MISO, CS> BitBangBackend<ERR, SCK, MOSI, MISO, CS, NoDelay>
where
    SCK: OutputPin<Error = ERR>,
    MOSI: OutputPin<Error = ERR>,
    MISO: InputPin<Error = ERR>,
    CS: OutputPin<Error = ERR>,
{
    /// Constructs a "bit bang" backend from clock, data out, data in and chip select pins.
    /// The bus runs as fast as the pins toggle; if that is too fast for the co-processor
    /// use `new_with_delay`.
    pub fn new(
        sck: SCK,
        mosi: MOSI,
        miso: MISO,
        cs: CS,
    ) -> Result<BitBangBackend<ERR, SCK, MOSI, MISO, CS, NoDelay>, ERR> {
        BitBangBackend::new_with_delay(sck, mosi, miso, cs, NoDelay {})
    }
}

impl<ERR, SCK, MOSI, MISO, CS, DELAY> BitBangBackend<ERR, SCK, MOSI, MISO, CS, DELAY>
where
    SCK: OutputPin<Error = ERR>,
    MOSI: OutputPin<Error = ERR>,
    MISO: InputPin<Error = ERR>,
    CS: OutputPin<Error = ERR>,
    DELAY: DelayUs<u8>,
{
    /// Constructs a "bit bang" backend with a delay of half a clock period between edges.
    /// The period is taken from the configuration of each transaction.
    pub fn new_with_delay(
        mut sck: SCK,
        mosi: MOSI,
        miso: MISO,
        mut cs: CS,
        delay: DELAY,
    ) -> Result<BitBangBackend<ERR, SCK, MOSI, MISO, CS, DELAY>, ERR> {
        cs.set_high()?;
        sck.set_low()?;
        Ok(BitBangBackend {
            sck,
            mosi,
            miso,
            cs,
            delay,
            mode: MODE_0,
            bit_order: BitOrder::MsbFirst,
            half_period_us: 1,
            received: 0,
            _phantom: PhantomData::default(),
        })
    }

    /// Give back the pins and the delay.
    pub fn free(self) -> (SCK, MOSI, MISO, CS, DELAY) {
        (self.sck, self.mosi, self.miso, self.cs, self.delay)
    }

    #[inline]
    fn set_clock(&mut self, active: bool) -> Result<(), ERR> {
        let high = match self.mode.polarity {
            Polarity::IdleLow => active,
            Polarity::IdleHigh => !active,
        };
        if high {
            self.sck.set_high()
        } else {
            self.sck.set_low()
        }
    }

    #[inline]
    fn set_data(&mut self, high: bool) -> Result<(), ERR> {
        if high {
            self.mosi.set_high()
        } else {
            self.mosi.set_low()
        }
    }

    #[inline]
    fn transfer_bit(&mut self, out: bool) -> Result<bool, ERR> {
        let sampled;
        match self.mode.phase {
            Phase::CaptureOnFirstTransition => {
                self.set_data(out)?;
                self.delay.delay_us(self.half_period_us);
                self.set_clock(true)?;
                sampled = self.miso.is_high()?;
                self.delay.delay_us(self.half_period_us);
                self.set_clock(false)?;
            }
            Phase::CaptureOnSecondTransition => {
                self.set_clock(true)?;
                self.set_data(out)?;
                self.delay.delay_us(self.half_period_us);
                self.set_clock(false)?;
                sampled = self.miso.is_high()?;
                self.delay.delay_us(self.half_period_us);
            }
        }
        Ok(sampled)
    }
}

impl<ERR, SCK, MOSI, MISO, CS, DELAY> Backend for BitBangBackend<ERR, SCK, MOSI, MISO, CS, DELAY>
where
    SCK: OutputPin<Error = ERR>,
    MOSI: OutputPin<Error = ERR>,
    MISO: InputPin<Error = ERR>,
    CS: OutputPin<Error = ERR>,
    DELAY: DelayUs<u8>,
{
    type Error = ERR;

    fn enable(&mut self) -> Result<(), ERR> {
        self.cs.set_high()?;
        self.set_clock(false)
    }

    fn disable(&mut self) -> Result<(), ERR> {
        self.cs.set_high()
    }

    fn configure(&mut self, config: &BusConfig) -> Result<(), ERR> {
        self.mode = config.mode();
        self.bit_order = config.bit_order();
        let half_period = (500_000 + config.frequency() - 1) / config.frequency().max(1);
        self.half_period_us = half_period.clamp(1, u8::MAX as u32) as u8;
        // park the clock at its idle level before select goes low
        self.set_clock(false)
    }

    fn select(&mut self) -> Result<(), ERR> {
        self.cs.set_low()
    }

    fn deselect(&mut self) -> Result<(), ERR> {
        self.cs.set_high()
    }

    fn write_byte(&mut self, value: u8) -> Result<(), ERR> {
        let mut received = 0u8;
        for i in 0..8 {
            let bit = match self.bit_order {
                BitOrder::MsbFirst => 7 - i,
                BitOrder::LsbFirst => i,
            };
            if self.transfer_bit(value & (1 << bit) != 0)? {
                received |= 1 << bit;
            }
        }
        self.received = received;
        Ok(())
    }

    fn is_ready(&mut self) -> Result<bool, ERR> {
        Ok(true)
    }

    fn read_byte(&mut self) -> Result<u8, ERR> {
        Ok(self.received)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use core::cell::RefCell;
    use core::convert::Infallible;
    use hal::spi::{MODE_1, MODE_2, MODE_3};
    use std::rc::Rc;
    use std::vec::Vec;

    /// Shared wire state: which level each line has, and the edges seen on the clock.
    #[derive(Default)]
    struct Wires {
        sck: bool,
        mosi: bool,
        miso_bits: Vec<bool>,
        /// (sck level after edge, mosi level at that moment)
        edges: Vec<(bool, bool)>,
    }

    type Shared = Rc<RefCell<Wires>>;

    struct Sck(Shared);
    struct Mosi(Shared);
    struct Miso(Shared);
    struct Cs;

    impl OutputPin for Sck {
        type Error = Infallible;
        fn set_low(&mut self) -> Result<(), Infallible> {
            let mut w = self.0.borrow_mut();
            if w.sck {
                let mosi = w.mosi;
                w.edges.push((false, mosi));
            }
            w.sck = false;
            Ok(())
        }
        fn set_high(&mut self) -> Result<(), Infallible> {
            let mut w = self.0.borrow_mut();
            if !w.sck {
                let mosi = w.mosi;
                w.edges.push((true, mosi));
            }
            w.sck = true;
            Ok(())
        }
    }

    impl OutputPin for Mosi {
        type Error = Infallible;
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.0.borrow_mut().mosi = false;
            Ok(())
        }
        fn set_high(&mut self) -> Result<(), Infallible> {
            self.0.borrow_mut().mosi = true;
            Ok(())
        }
    }

    impl InputPin for Miso {
        type Error = Infallible;
        fn is_high(&self) -> Result<bool, Infallible> {
            let mut w = self.0.borrow_mut();
            Ok(if w.miso_bits.is_empty() { false } else { w.miso_bits.remove(0) })
        }
        fn is_low(&self) -> Result<bool, Infallible> {
            self.is_high().map(|high| !high)
        }
    }

    impl OutputPin for Cs {
        type Error = Infallible;
        fn set_low(&mut self) -> Result<(), Infallible> {
            Ok(())
        }
        fn set_high(&mut self) -> Result<(), Infallible> {
            Ok(())
        }
    }

    fn backend(wires: &Shared) -> BitBangBackend<Infallible, Sck, Mosi, Miso, Cs, NoDelay> {
        BitBangBackend::new(Sck(wires.clone()), Mosi(wires.clone()), Miso(wires.clone()), Cs).unwrap()
    }

    fn bits(value: u8) -> Vec<bool> {
        (0..8).rev().map(|i| value & (1 << i) != 0).collect()
    }

    #[test]
    fn mode0_msb_first_shifts_on_rising_edges() {
        let wires = Shared::default();
        wires.borrow_mut().miso_bits = bits(0x3c);
        let mut spi = backend(&wires);
        spi.configure(&BusConfig::STANDARD).unwrap();
        wires.borrow_mut().edges.clear();

        spi.write_byte(0xa5).unwrap();
        assert_eq!(spi.read_byte().unwrap(), 0x3c);

        let w = wires.borrow();
        let sampled: Vec<bool> = w.edges.iter().filter(|(clk, _)| *clk).map(|(_, d)| *d).collect();
        assert_eq!(sampled, bits(0xa5));
        assert!(!w.sck);
    }

    #[test]
    fn lsb_first_reverses_both_directions() {
        let wires = Shared::default();
        let mut reversed = bits(0x01);
        reversed.reverse();
        wires.borrow_mut().miso_bits = reversed;
        let mut spi = backend(&wires);
        let config = BusConfig::new(16_000_000, 2_000_000, BitOrder::LsbFirst, MODE_0);
        spi.configure(&config).unwrap();
        wires.borrow_mut().edges.clear();

        spi.write_byte(0x80).unwrap();
        assert_eq!(spi.read_byte().unwrap(), 0x01);

        let w = wires.borrow();
        let mut sampled: Vec<bool> = w.edges.iter().filter(|(clk, _)| *clk).map(|(_, d)| *d).collect();
        sampled.reverse();
        assert_eq!(sampled, bits(0x80));
    }

    #[test]
    fn idle_level_follows_polarity() {
        for (mode, idle_high) in [(MODE_0, false), (MODE_1, false), (MODE_2, true), (MODE_3, true)].iter() {
            let wires = Shared::default();
            let mut spi = backend(&wires);
            let config = BusConfig::new(16_000_000, 2_000_000, BitOrder::MsbFirst, *mode);
            spi.configure(&config).unwrap();
            spi.write_byte(0xff).unwrap();
            assert_eq!(wires.borrow().sck, *idle_high);
            assert_eq!(wires.borrow().edges.iter().filter(|(clk, _)| clk != idle_high).count(), 8);
        }
    }

    #[test]
    fn mode1_sets_data_after_the_leading_edge() {
        let wires = Shared::default();
        let mut spi = backend(&wires);
        let config = BusConfig::new(16_000_000, 2_000_000, BitOrder::MsbFirst, MODE_1);
        spi.configure(&config).unwrap();
        wires.borrow_mut().edges.clear();

        spi.write_byte(0x80).unwrap();
        let w = wires.borrow();
        // first falling (trailing) edge sees the first data bit
        let trailing: Vec<bool> = w.edges.iter().filter(|(clk, _)| !*clk).map(|(_, d)| *d).collect();
        assert_eq!(trailing, bits(0x80));
    }
}
