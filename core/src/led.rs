//! Mode/target indicator LEDs.
//!
//! Grounded on `examples/original_source/src/balance/balance.c`, which
//! drives each indicator through `PORT_PinSet`/`PORT_PinClear` by a fixed
//! pin identifier per mode/target. Here that's a small `LedId` enum plus a
//! `LedBank` trait so the dispatcher logic (which LED should be lit, and
//! when) can be unit-tested without GPIO hardware. The real GPIO-backed
//! bank lives in the `triplate-fw` binary crate as `GpioLedBank`.

/// One indicator LED. `ModeOff` has no physical LED in the original (the off
/// mode lights nothing) and is kept only so `LedBank::set`/`clear` have a
/// uniform target; dispatcher logic skips it.
#[derive(Clone, Copy, PartialEq, Eq, Debug, defmt::Format)]
pub enum LedId {
    ModeOff,
    ModeHuman,
    ModePid,
    ModeNn,
    ModeFuzzy,
    TargetCenter,
    TargetTopRight,
    TargetTopLeft,
    TargetBottomLeft,
    TargetBottomRight,
    /// Generic single status LED, grounded on `examples/original_source/
    /// mlbb/main.c`'s `led <0|1>` command (`BSP_LED_On`/`_Off`) — a board
    /// indicator independent of the mode/target indicators above.
    Status,
}

/// Total number of [`LedId`] variants, for fixed-size per-LED arrays.
pub const LED_COUNT: usize = 11;

pub trait LedBank {
    fn set(&mut self, led: LedId);
    fn clear(&mut self, led: LedId);
}

/// Host-side recording fake used by dispatcher/target-cycle unit tests.
pub struct RecordingLedBank {
    pub lit: [bool; LED_COUNT],
}

impl RecordingLedBank {
    pub fn new() -> Self {
        Self { lit: [false; LED_COUNT] }
    }

    pub fn is_lit(&self, led: LedId) -> bool {
        self.lit[led as usize]
    }
}

impl Default for RecordingLedBank {
    fn default() -> Self {
        Self::new()
    }
}

impl LedBank for RecordingLedBank {
    fn set(&mut self, led: LedId) {
        self.lit[led as usize] = true;
    }
    fn clear(&mut self, led: LedId) {
        self.lit[led as usize] = false;
    }
}
