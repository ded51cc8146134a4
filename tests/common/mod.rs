//! Recording fakes shared by the integration tests.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use embedded_hal::blocking::delay::{DelayMs, DelayUs};
use embedded_hal::digital::v2::{InputPin, OutputPin};

use m5lcd::{Backend, BusConfig, InterruptControl};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Enable,
    Disable,
    Configure(u8, u8),
    Select,
    Deselect,
    Write(u8),
    MaskSources(u8),
    RestoreSources(u8),
    DisableAll,
    RestoreAll(bool),
    DelayUs(u16),
    DelayMs(u16),
}

pub type Log = Rc<RefCell<Vec<Event>>>;

pub fn log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

/// All bytes written on the bus, in order.
pub fn written(log: &Log) -> Vec<u8> {
    log.borrow()
        .iter()
        .filter_map(|event| match event {
            Event::Write(byte) => Some(*byte),
            _ => None,
        })
        .collect()
}

/// Bytes written between each select and deselect.
pub fn transactions(log: &Log) -> Vec<Vec<u8>> {
    let mut all = Vec::new();
    let mut current: Option<Vec<u8>> = None;
    for event in log.borrow().iter() {
        match event {
            Event::Select => current = Some(Vec::new()),
            Event::Deselect => {
                if let Some(bytes) = current.take() {
                    all.push(bytes);
                }
            }
            Event::Write(byte) => {
                if let Some(bytes) = current.as_mut() {
                    bytes.push(*byte);
                }
            }
            _ => {}
        }
    }
    all
}

pub fn position(log: &Log, wanted: Event) -> Option<usize> {
    log.borrow().iter().position(|event| *event == wanted)
}

pub fn count(log: &Log, wanted: Event) -> usize {
    log.borrow().iter().filter(|event| **event == wanted).count()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FakeError;

/// Backend that records everything and answers from a queue of responses.
///
/// Without queued responses every byte is answered with its complement.
pub struct FakeBackend {
    pub log: Log,
    pub responses: VecDeque<u8>,
    pub last: u8,
    pub never_ready: bool,
    pub fail_enable: bool,
    pub fail_select: bool,
    pub polls: Rc<Cell<u32>>,
}

impl FakeBackend {
    pub fn new(log: &Log) -> Self {
        FakeBackend {
            log: log.clone(),
            responses: VecDeque::new(),
            last: 0,
            never_ready: false,
            fail_enable: false,
            fail_select: false,
            polls: Rc::new(Cell::new(0)),
        }
    }

    fn record(&self, event: Event) {
        self.log.borrow_mut().push(event);
    }
}

impl Backend for FakeBackend {
    type Error = FakeError;

    fn enable(&mut self) -> Result<(), FakeError> {
        if self.fail_enable {
            return Err(FakeError);
        }
        self.record(Event::Enable);
        Ok(())
    }

    fn disable(&mut self) -> Result<(), FakeError> {
        self.record(Event::Disable);
        Ok(())
    }

    fn configure(&mut self, config: &BusConfig) -> Result<(), FakeError> {
        let (control, status) = config.registers();
        self.record(Event::Configure(control, status));
        Ok(())
    }

    fn select(&mut self) -> Result<(), FakeError> {
        if self.fail_select {
            return Err(FakeError);
        }
        self.record(Event::Select);
        Ok(())
    }

    fn deselect(&mut self) -> Result<(), FakeError> {
        self.record(Event::Deselect);
        Ok(())
    }

    fn write_byte(&mut self, value: u8) -> Result<(), FakeError> {
        self.record(Event::Write(value));
        self.last = self.responses.pop_front().unwrap_or(!value);
        Ok(())
    }

    fn is_ready(&mut self) -> Result<bool, FakeError> {
        self.polls.set(self.polls.get() + 1);
        Ok(!self.never_ready)
    }

    fn read_byte(&mut self) -> Result<u8, FakeError> {
        Ok(self.last)
    }
}

/// Lines 0..=7 are maskable, everything else is not.
pub struct FakeInterrupts {
    pub log: Log,
    pub sources: u8,
    pub global: bool,
}

impl FakeInterrupts {
    pub fn new(log: &Log) -> Self {
        FakeInterrupts {
            log: log.clone(),
            sources: 0xff,
            global: true,
        }
    }
}

impl InterruptControl for FakeInterrupts {
    fn source_mask(&self, source: u8) -> Option<u8> {
        if source < 8 {
            Some(1 << source)
        } else {
            None
        }
    }

    fn mask_sources(&mut self, mask: u8) -> u8 {
        self.log.borrow_mut().push(Event::MaskSources(mask));
        let saved = self.sources;
        self.sources &= !mask;
        saved
    }

    fn restore_sources(&mut self, saved: u8) {
        self.log.borrow_mut().push(Event::RestoreSources(saved));
        self.sources = saved;
    }

    fn disable_all(&mut self) -> bool {
        self.log.borrow_mut().push(Event::DisableAll);
        std::mem::replace(&mut self.global, false)
    }

    fn restore_all(&mut self, was_enabled: bool) {
        self.log.borrow_mut().push(Event::RestoreAll(was_enabled));
        self.global = was_enabled;
    }
}

pub struct FakeDelay {
    pub log: Log,
}

impl DelayUs<u16> for FakeDelay {
    fn delay_us(&mut self, us: u16) {
        self.log.borrow_mut().push(Event::DelayUs(us));
    }
}

impl DelayMs<u16> for FakeDelay {
    fn delay_ms(&mut self, ms: u16) {
        self.log.borrow_mut().push(Event::DelayMs(ms));
    }
}

/// Output pin whose level can be watched from the test.
#[derive(Clone, Default)]
pub struct Led {
    pub high: Rc<Cell<bool>>,
}

impl OutputPin for Led {
    type Error = core::convert::Infallible;

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.high.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.high.set(true);
        Ok(())
    }
}

/// Busy line driven from the test, reports busy for the first `busy_for` samples.
#[derive(Clone, Default)]
pub struct BusyLine {
    pub busy_for: Rc<Cell<u32>>,
}

impl InputPin for BusyLine {
    type Error = core::convert::Infallible;

    fn is_high(&self) -> Result<bool, Self::Error> {
        let left = self.busy_for.get();
        if left > 0 {
            self.busy_for.set(left - 1);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn is_low(&self) -> Result<bool, Self::Error> {
        self.is_high().map(|busy| !busy)
    }
}
