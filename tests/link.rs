mod common;

use common::*;

use m5lcd::{BitOrder, BusConfig, Error, InterruptMode, Link, TransactionState, UNIDENTIFIED};

use embedded_hal::spi::{MODE_0, MODE_3};

fn link(log: &Log) -> Link<FakeBackend, FakeInterrupts> {
    Link::new(FakeBackend::new(log), FakeInterrupts::new(log))
}

// small deterministic generator for call patterns
struct Lcg(u32);

impl Lcg {
    fn next(&mut self) -> u32 {
        self.0 = self.0.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        self.0 >> 16
    }
}

#[test]
fn enabled_exactly_while_acquired() {
    for seed in 1..50 {
        let log = log();
        let mut link = link(&log);
        let mut rng = Lcg(seed);
        let mut outstanding = 0usize;

        for _ in 0..200 {
            if rng.next() % 5 < 2 {
                link.acquire().unwrap();
                outstanding += 1;
            } else {
                link.release().unwrap();
                outstanding = outstanding.saturating_sub(1);
            }
            assert_eq!(link.users(), outstanding);
            assert_eq!(link.is_enabled(), outstanding > 0);

            let enables = count(&log, Event::Enable);
            let disables = count(&log, Event::Disable);
            // hardware on iff one more enable than disable
            assert_eq!(enables - disables, usize::from(outstanding > 0));
        }
    }
}

#[test]
fn extra_release_is_ignored() {
    let log = log();
    let mut link = link(&log);

    link.release().unwrap();
    assert_eq!(link.users(), 0);
    assert!(log.borrow().is_empty());

    link.acquire().unwrap();
    link.acquire().unwrap();
    assert_eq!(count(&log, Event::Enable), 1);
    link.release().unwrap();
    assert_eq!(count(&log, Event::Disable), 0);
    link.release().unwrap();
    link.release().unwrap();
    assert_eq!(count(&log, Event::Disable), 1);
    assert!(!link.is_enabled());
}

#[test]
fn failed_enable_keeps_the_count() {
    let log = log();
    let mut backend = FakeBackend::new(&log);
    backend.fail_enable = true;
    let mut link = Link::new(backend, FakeInterrupts::new(&log));

    assert_eq!(link.acquire(), Err(Error::Bus(FakeError)));
    assert_eq!(link.users(), 0);

    link.backend_mut().fail_enable = false;
    link.acquire().unwrap();
    assert_eq!(link.users(), 1);
}

#[test]
fn interrupt_registration_round_trip() {
    let log = log();
    let mut link = link(&log);

    link.using_interrupt(3);
    assert_eq!(link.interrupt_mode(), InterruptMode::Masked(1 << 3));
    link.not_using_interrupt(3);
    assert_eq!(link.interrupt_mode(), InterruptMode::None);
}

#[test]
fn unknown_interrupt_sticks_until_full_release() {
    let log = log();
    let mut link = link(&log);
    link.acquire().unwrap();
    link.acquire().unwrap();

    link.using_interrupt(1);
    link.using_interrupt(UNIDENTIFIED);
    assert_eq!(link.interrupt_mode(), InterruptMode::Global);

    link.not_using_interrupt(UNIDENTIFIED);
    link.not_using_interrupt(1);
    assert_eq!(link.interrupt_mode(), InterruptMode::Global);

    link.release().unwrap();
    assert_eq!(link.interrupt_mode(), InterruptMode::Global);
    link.release().unwrap();
    assert_eq!(link.interrupt_mode(), InterruptMode::None);
}

#[test]
fn masking_brackets_the_whole_transaction() {
    let log = log();
    let mut link = link(&log);
    link.acquire().unwrap();
    link.using_interrupt(0);
    link.using_interrupt(4);

    link.transaction(&BusConfig::STANDARD, |link| {
        link.transfer(0xAA)?;
        link.transfer(0x55)?;
        Ok(())
    })
    .unwrap();

    let mask = position(&log, Event::MaskSources(0b1_0001)).unwrap();
    let configure = position(&log, Event::Configure(0x51, 0x01)).unwrap();
    let select = position(&log, Event::Select).unwrap();
    let first_write = position(&log, Event::Write(0xAA)).unwrap();
    let deselect = position(&log, Event::Deselect).unwrap();
    let restore = position(&log, Event::RestoreSources(0xff)).unwrap();

    assert!(mask < configure);
    assert!(configure < select);
    assert!(select < first_write);
    assert!(first_write < deselect);
    assert!(deselect < restore);
    assert_eq!(link.interrupts().sources, 0xff);
    assert_eq!(link.transaction_state(), TransactionState::Idle);
}

#[test]
fn global_mode_disables_everything_during_the_transaction() {
    let log = log();
    let mut link = link(&log);
    link.acquire().unwrap();
    link.using_interrupt(UNIDENTIFIED);

    link.begin(&BusConfig::STANDARD).unwrap();
    assert!(!link.interrupts().global);
    link.transfer(0x01).unwrap();
    link.end().unwrap();
    assert!(link.interrupts().global);

    let disable = position(&log, Event::DisableAll).unwrap();
    let select = position(&log, Event::Select).unwrap();
    let deselect = position(&log, Event::Deselect).unwrap();
    let restore = position(&log, Event::RestoreAll(true)).unwrap();
    assert!(disable < select);
    assert!(deselect < restore);
}

#[test]
fn nested_begin_is_flagged_without_side_effects() {
    let log = log();
    let led = Led::default();
    let mut link = link(&log).with_mismatch_indicator(led.clone());
    link.acquire().unwrap();
    link.using_interrupt(2);

    link.begin(&BusConfig::STANDARD).unwrap();
    assert!(!link.mismatch_detected());
    link.begin(&BusConfig::STANDARD).unwrap();

    assert!(link.mismatch_detected());
    assert!(led.high.get());
    assert_eq!(link.interrupt_mode(), InterruptMode::Masked(1 << 2));
    assert_eq!(link.users(), 1);
    // masked once, by the outer begin
    assert_eq!(count(&log, Event::MaskSources(1 << 2)), 1);

    link.end().unwrap();
    assert_eq!(link.interrupts().sources, 0xff);
    assert_eq!(link.transaction_state(), TransactionState::Idle);
}

#[test]
fn end_while_idle_is_flagged() {
    let log = log();
    let mut link = link(&log);
    link.acquire().unwrap();

    link.end().unwrap();
    assert!(link.mismatch_detected());
    assert_eq!(link.users(), 1);
    assert_eq!(link.interrupt_mode(), InterruptMode::None);

    // sticky until cleared
    link.transaction(&BusConfig::STANDARD, |link| link.transfer(0)).unwrap();
    assert!(link.mismatch_detected());
    link.clear_mismatch();
    assert!(!link.mismatch_detected());
}

#[test]
fn indicator_wired_up_late_shows_an_earlier_mismatch() {
    let log = log();
    let mut link = link(&log);
    link.end().unwrap();

    let led = Led::default();
    let link = link.with_mismatch_indicator(led.clone());
    assert!(link.mismatch_detected());
    assert!(led.high.get());
}

#[test]
fn silent_device_times_out_and_releases_the_bus() {
    let log = log();
    let mut backend = FakeBackend::new(&log);
    backend.never_ready = true;
    let polls = backend.polls.clone();
    let mut link = Link::new(backend, FakeInterrupts::new(&log)).with_spin_budget(32);
    link.acquire().unwrap();
    link.using_interrupt(1);

    let result = link.transaction(&BusConfig::STANDARD, |link| link.transfer(0xAA));

    assert_eq!(result, Err(Error::TimedOut));
    assert_eq!(polls.get(), 32);
    assert_eq!(link.transaction_state(), TransactionState::Idle);
    assert!(position(&log, Event::Deselect).is_some());
    assert_eq!(link.interrupts().sources, 0xff);
    assert!(!link.mismatch_detected());
}

#[test]
fn failed_select_rolls_back() {
    let log = log();
    let mut backend = FakeBackend::new(&log);
    backend.fail_select = true;
    let mut link = Link::new(backend, FakeInterrupts::new(&log));
    link.acquire().unwrap();
    link.using_interrupt(5);

    assert_eq!(link.begin(&BusConfig::STANDARD), Err(Error::Bus(FakeError)));
    assert_eq!(link.transaction_state(), TransactionState::Idle);
    assert_eq!(link.interrupts().sources, 0xff);

    // a proper transaction afterwards is no mismatch
    link.backend_mut().fail_select = false;
    link.transaction(&BusConfig::STANDARD, |link| link.transfer(1)).unwrap();
    assert!(!link.mismatch_detected());
}

#[test]
fn buffer_transfer_replaces_bytes_in_place() {
    let log = log();
    let mut link = link(&log);
    link.acquire().unwrap();
    link.backend_mut().responses.extend([0x10, 0x20, 0x30].iter().copied());

    let mut buffer = [0xAA, 0x1A, 0x55];
    link.transaction(&BusConfig::STANDARD, |link| link.transfer_in_place(&mut buffer))
        .unwrap();

    assert_eq!(buffer, [0x10, 0x20, 0x30]);
    assert_eq!(written(&log), vec![0xAA, 0x1A, 0x55]);

    let mut empty: [u8; 0] = [];
    link.transaction(&BusConfig::STANDARD, |link| link.transfer_in_place(&mut empty))
        .unwrap();
}

#[test]
fn sixteen_bit_transfers_follow_the_bit_order() {
    let log = log();
    let mut link = link(&log);
    link.acquire().unwrap();

    let msb_first = BusConfig::new(16_000_000, 2_000_000, BitOrder::MsbFirst, MODE_0);
    link.backend_mut().responses.extend([0xBE, 0xEF].iter().copied());
    let received = link
        .transaction(&msb_first, |link| link.transfer16(0x1234))
        .unwrap();
    assert_eq!(received, 0xBEEF);
    assert_eq!(written(&log), vec![0x12, 0x34]);

    log.borrow_mut().clear();
    let lsb_first = BusConfig::new(16_000_000, 2_000_000, BitOrder::LsbFirst, MODE_3);
    link.backend_mut().responses.extend([0xEF, 0xBE].iter().copied());
    let received = link
        .transaction(&lsb_first, |link| link.transfer16(0x1234))
        .unwrap();
    assert_eq!(received, 0xBEEF);
    assert_eq!(written(&log), vec![0x34, 0x12]);
}

#[test]
fn configs_can_be_debug_printed() {
    let printed = format!("{:?}", BusConfig::STANDARD);
    assert!(printed.contains("IdleLow"));
    assert!(printed.contains("CaptureOnFirstTransition"));
    assert!(printed.contains("MsbFirst"));

    let printed = format!("{:?}", BusConfig::new(16_000_000, 2_000_000, BitOrder::LsbFirst, MODE_3));
    assert!(printed.contains("IdleHigh"));
    assert!(printed.contains("CaptureOnSecondTransition"));
}

#[test]
fn last_release_restores_interrupts_after_switching_off() {
    let log = log();
    let mut link = link(&log);
    link.acquire().unwrap();
    link.using_interrupt(UNIDENTIFIED);

    link.begin(&BusConfig::STANDARD).unwrap();
    assert!(!link.interrupts().global);
    link.release().unwrap();

    assert!(link.interrupts().global);
    assert_eq!(link.interrupt_mode(), InterruptMode::None);
    assert_eq!(link.transaction_state(), TransactionState::Idle);
    let disable = position(&log, Event::Disable).unwrap();
    let restore = position(&log, Event::RestoreAll(true)).unwrap();
    assert!(disable < restore);
}
