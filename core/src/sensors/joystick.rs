//! Joystick/bus driver: config-write sequence, repeating write/read cycle,
//! and zero-offset handling.
//!
//! Grounded on `examples/original_source/mlbb-sam_e51_cnano/src/nunchuk/nunchuk.c`:
//! two one-shot config frames at startup, then a `write{0x00}` / pause /
//! `read(6 bytes)` loop at a fixed scan rate, with an all-`0xFF` read
//! retriggering the config sequence (cable-reseat recovery).

use crate::bus::{BusError, BusTransfer};

const BUS_ADDRESS: u8 = 0x52;
const CONFIG_FRAME_1: [u8; 2] = [0xF0, 0x55];
const CONFIG_FRAME_2: [u8; 2] = [0xFB, 0x00];
const READ_FRAME: [u8; 1] = [0x00];

/// One joystick+button sample, with the operator-selectable zero offset
/// already applied.
#[derive(Clone, Copy, Debug, Default, defmt::Format, PartialEq, Eq)]
pub struct JoystickSample {
    pub x: i16,
    pub y: i16,
    pub button_c: bool,
    pub button_z: bool,
}

/// The operator-settable zero reference the joystick's raw axis readings
/// are subtracted against before publication (spec §3/§4.1: "Zero-point
/// offsets are separate, and the exposed sample subtracts them... a
/// separate zero-offset pair can be snapshotted on demand"). This is the
/// `joystick_zero_set()` of spec §4.1's public contract.
#[derive(Clone, Copy, Debug, Default)]
pub struct JoystickZero {
    x: i16,
    y: i16,
}

impl JoystickZero {
    pub fn new() -> Self {
        Self::default()
    }

    fn apply(&self, raw_x: i16, raw_y: i16) -> (i16, i16) {
        (raw_x.wrapping_sub(self.x), raw_y.wrapping_sub(self.y))
    }

    /// Capture `sample` (an already-offset reading) as the new zero
    /// reference: the next published sample reports `(0, 0)` at the
    /// joystick's current physical position, matching "the operator
    /// presses a button at rest". Recovers the raw reading by undoing the
    /// previous offset (`raw = sample + old_zero`) so this composes
    /// correctly across repeated zero-sets without needing a stashed raw
    /// sample anywhere.
    pub fn set(&mut self, sample: JoystickSample) {
        self.x = self.x.wrapping_add(sample.x);
        self.y = self.y.wrapping_add(sample.y);
    }
}

/// Send the two config frames, each followed by a >=1ms pause the caller
/// provides via `pause`.
pub fn send_config_sequence(bus: &mut impl BusTransfer, pause: impl Fn()) -> Result<(), BusError> {
    bus.write(BUS_ADDRESS, &CONFIG_FRAME_1)?;
    pause();
    bus.write(BUS_ADDRESS, &CONFIG_FRAME_2)?;
    pause();
    Ok(())
}

/// Outcome of one scan cycle: either a decoded sample, or a cable-error
/// indication (`0xFF, 0xFF` raw read) that the caller should follow with a
/// fresh [`send_config_sequence`].
pub enum ScanOutcome {
    Sample(JoystickSample),
    CableError,
}

/// Run one write/pause/read cycle and decode the result.
pub fn scan_once(
    bus: &mut impl BusTransfer,
    pause: impl Fn(),
    zero: &JoystickZero,
) -> Result<ScanOutcome, BusError> {
    bus.write(BUS_ADDRESS, &READ_FRAME)?;
    pause();
    let mut buf = [0u8; 6];
    bus.read(BUS_ADDRESS, &mut buf)?;

    if buf[0] == 0xFF && buf[1] == 0xFF {
        return Ok(ScanOutcome::CableError);
    }

    let (x, y) = zero.apply(buf[0] as i16, buf[1] as i16);
    Ok(ScanOutcome::Sample(JoystickSample {
        x,
        y,
        button_c: buf[5] & 0x02 == 0,
        button_z: buf[5] & 0x01 == 0,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeBus {
        read_reply: [u8; 6],
        writes: heapless::Vec<heapless::Vec<u8, 2>, 4>,
    }

    impl FakeBus {
        fn new(read_reply: [u8; 6]) -> Self {
            Self {
                read_reply,
                writes: heapless::Vec::new(),
            }
        }
    }

    impl BusTransfer for FakeBus {
        fn write(&mut self, _addr: u8, bytes: &[u8]) -> Result<(), BusError> {
            self.writes
                .push(heapless::Vec::from_slice(bytes).unwrap())
                .ok();
            Ok(())
        }

        fn read(&mut self, _addr: u8, buf: &mut [u8]) -> Result<(), BusError> {
            buf.copy_from_slice(&self.read_reply[..buf.len()]);
            Ok(())
        }
    }

    #[test]
    fn config_sequence_sends_both_frames_in_order() {
        let mut bus = FakeBus::new([0; 6]);
        send_config_sequence(&mut bus, || {}).unwrap();
        assert_eq!(bus.writes[0].as_slice(), &CONFIG_FRAME_1);
        assert_eq!(bus.writes[1].as_slice(), &CONFIG_FRAME_2);
    }

    #[test]
    fn scan_decodes_buttons_active_low() {
        let mut bus = FakeBus::new([10, 20, 0, 0, 0, 0b1111_1100]);
        let zero = JoystickZero::new();
        match scan_once(&mut bus, || {}, &zero).unwrap() {
            ScanOutcome::Sample(s) => {
                assert_eq!(s.x, 10);
                assert_eq!(s.y, 20);
                assert!(s.button_c);
                assert!(s.button_z);
            }
            ScanOutcome::CableError => panic!("expected a sample"),
        }
    }

    #[test]
    fn scan_applies_zero_offset() {
        let mut bus = FakeBus::new([130, 140, 0, 0, 0, 0xFF]);
        let mut zero = JoystickZero::new();
        zero.set(JoystickSample {
            x: 5,
            y: -5,
            button_c: false,
            button_z: false,
        });
        match scan_once(&mut bus, || {}, &zero).unwrap() {
            ScanOutcome::Sample(s) => {
                assert_eq!(s.x, 125);
                assert_eq!(s.y, 145);
                assert!(!s.button_c);
                assert!(!s.button_z);
            }
            ScanOutcome::CableError => panic!("expected a sample"),
        }
    }

    #[test]
    fn all_ones_read_reports_cable_error() {
        let mut bus = FakeBus::new([0xFF, 0xFF, 0, 0, 0, 0]);
        let zero = JoystickZero::new();
        match scan_once(&mut bus, || {}, &zero).unwrap() {
            ScanOutcome::Sample(_) => panic!("expected a cable error"),
            ScanOutcome::CableError => {}
        }
    }

    #[test]
    fn zero_set_makes_the_current_reading_report_as_the_origin() {
        let mut bus = FakeBus::new([140, 90, 0, 0, 0, 0xFF]);
        let zero = JoystickZero::new();
        let at_rest = match scan_once(&mut bus, || {}, &zero).unwrap() {
            ScanOutcome::Sample(s) => s,
            ScanOutcome::CableError => panic!("expected a sample"),
        };

        let mut zero = JoystickZero::new();
        zero.set(at_rest);
        let rezeroed = match scan_once(&mut bus, || {}, &zero).unwrap() {
            ScanOutcome::Sample(s) => s,
            ScanOutcome::CableError => panic!("expected a sample"),
        };
        assert_eq!((rezeroed.x, rezeroed.y), (0, 0));
    }

    #[test]
    fn zero_set_composes_across_repeated_calls() {
        // Two successive zero-sets at different physical positions must
        // each independently re-center the reported origin, not compound
        // onto a stashed raw sample from the first call.
        let mut zero = JoystickZero::new();
        zero.set(JoystickSample {
            x: 10,
            y: 10,
            button_c: false,
            button_z: false,
        });
        let mut bus = FakeBus::new([120, 120, 0, 0, 0, 0xFF]);
        let reading = match scan_once(&mut bus, || {}, &zero).unwrap() {
            ScanOutcome::Sample(s) => s,
            ScanOutcome::CableError => panic!("expected a sample"),
        };
        zero.set(reading);
        let rezeroed = match scan_once(&mut bus, || {}, &zero).unwrap() {
            ScanOutcome::Sample(s) => s,
            ScanOutcome::CableError => panic!("expected a sample"),
        };
        assert_eq!((rezeroed.x, rezeroed.y), (0, 0));
    }
}
