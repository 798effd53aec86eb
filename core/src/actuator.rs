//! Three-servo actuator facade: the trait boundary `kinematics` and the
//! controllers drive, independent of how angles actually reach hardware.
//!
//! Grounded on `examples/original_source/src/platform/platform.c`
//! (`PLATFORM_Enable`/`PLATFORM_Disable`/`PLATFORM_Position_ABC_Set`), which
//! staggers the three servo moves on enable/disable so they don't all draw
//! inrush current from the supply at once. The enable/disable stagger
//! sequencing and the `stm32-hal2` timer-PWM implementation live in the
//! `triplate-fw` binary crate, since both need real hardware delay/timer
//! primitives; this crate only carries the trait so [`crate::kinematics`]
//! and the controllers stay host-testable.

/// One of the three rotary actuators.
#[derive(Clone, Copy, PartialEq, Eq, Debug, defmt::Format)]
pub enum Axis {
    A = 0,
    B = 1,
    C = 2,
}

/// Servo travel limits, in q15 angle units (full turn = `0x1_0000`).
#[derive(Clone, Copy, Debug)]
pub struct Limits {
    pub min: i16,
    pub max: i16,
}

impl Default for Limits {
    fn default() -> Self {
        // +/- 90 degrees, matching the original firmware's servo travel.
        Self {
            min: -0x2000,
            max: 0x2000,
        }
    }
}

/// Abstraction over the three-servo output stage so kinematics and
/// controllers can be driven and tested without real timer/PWM hardware.
pub trait Actuator {
    fn enable(&mut self);
    fn disable(&mut self);
    /// Command one axis to a q15 angle, clamped to [`Self::limits`].
    fn set_angle(&mut self, axis: Axis, angle: i16);
    fn limits(&self, axis: Axis) -> Limits;
}

/// Millisecond pauses between successive servo moves on enable/disable,
/// named to match the original's inline comment: staggering avoids all
/// three servos decelerating at once and tripping the power supply. Used by
/// `triplate_fw::actuator::{enable_sequence, disable_sequence}`.
pub const ENABLE_STAGGER_MS: [u32; 3] = [100, 100, 500];

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeActuator {
        angles: [i16; 3],
        enabled: bool,
        limits: [Limits; 3],
    }

    impl FakeActuator {
        fn new() -> Self {
            Self {
                angles: [0; 3],
                enabled: false,
                limits: [Limits::default(); 3],
            }
        }
    }

    impl Actuator for FakeActuator {
        fn enable(&mut self) {
            self.enabled = true;
        }
        fn disable(&mut self) {
            self.enabled = false;
        }
        fn set_angle(&mut self, axis: Axis, angle: i16) {
            let l = self.limits[axis as usize];
            self.angles[axis as usize] = angle.clamp(l.min, l.max);
        }
        fn limits(&self, axis: Axis) -> Limits {
            self.limits[axis as usize]
        }
    }

    #[test]
    fn set_angle_clamps_to_limits() {
        let mut a = FakeActuator::new();
        a.set_angle(Axis::A, 0x7FFF);
        assert_eq!(a.angles[Axis::A as usize], Limits::default().max);
        a.set_angle(Axis::B, -0x7FFF);
        assert_eq!(a.angles[Axis::B as usize], Limits::default().min);
    }

    #[test]
    fn enable_disable_toggles_state() {
        let mut a = FakeActuator::new();
        assert!(!a.enabled);
        a.enable();
        assert!(a.enabled);
        a.disable();
        assert!(!a.enabled);
    }
}
