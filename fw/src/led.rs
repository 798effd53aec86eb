//! `stm32-hal2` GPIO-backed indicator LED bank.
//!
//! [`LedId`]/`LedBank` live in `triplate_core::led`; this is the only
//! hardware-bound implementation of that trait, one owned output
//! [`hal::gpio::Pin`] per indicator — the same "one field per peripheral,
//! held directly" style the teacher uses for its chip-select/enable pins in
//! `Shared`/`Local`. `ModeOff` has no physical pin and is skipped.

use triplate_core::led::{LedBank, LedId, LED_COUNT};

pub struct GpioLedBank {
    pins: [Option<hal::gpio::Pin>; LED_COUNT],
}

impl GpioLedBank {
    pub fn new(pins: [Option<hal::gpio::Pin>; LED_COUNT]) -> Self {
        Self { pins }
    }
}

impl LedBank for GpioLedBank {
    fn set(&mut self, led: LedId) {
        if let Some(pin) = &mut self.pins[led as usize] {
            pin.set_high();
        }
    }

    fn clear(&mut self, led: LedId) {
        if let Some(pin) = &mut self.pins[led as usize] {
            pin.set_low();
        }
    }
}
