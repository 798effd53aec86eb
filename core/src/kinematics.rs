//! Forward/inverse kinematics mapping a plate tilt (x, y) onto the three
//! actuator angles (a, b, c), and back.
//!
//! Grounded on `examples/original_source/src/platform/platform.c`
//! (`PLATFORM_Position_XY_Set`/`_Get`/`PLATFORM_Position_ABC_Set`), adapted to
//! a plain struct instead of the original's module-level static plus
//! `CMD_RegisterCommand` side table (the console module owns registration
//! here).

use crate::actuator::Actuator;
use crate::q::{clamp_q15, x_inv_sin60, xcos60, xsin60};

/// Maps plate tilt commands onto actuator angles and hands them to an
/// [`Actuator`] facade. Holds the last commanded `(a, b, c)` so `get_xy`
/// can report the plate's current position without a round trip to the
/// actuator hardware.
pub struct Kinematics {
    a: i16,
    b: i16,
    c: i16,
    /// Optional centroid-height compensation; documented in spec §4.7 as
    /// disabled by default, with the offset slot left in place for later.
    pub centroid_compensation: bool,
}

impl Default for Kinematics {
    fn default() -> Self {
        Self {
            a: 0,
            b: 0,
            c: 0,
            centroid_compensation: false,
        }
    }
}

impl Kinematics {
    /// `a = y; b = -x*sin60 + -y*cos60; c = x*sin60 + -y*cos60`.
    pub fn set_xy(&mut self, actuator: &mut impl Actuator, x: i16, y: i16) {
        let neg_y = y.saturating_neg();
        let a = y;
        let b = xsin60(x.saturating_neg()).saturating_add(xcos60(neg_y));
        let c = xsin60(x).saturating_add(xcos60(neg_y));
        self.set_abc(actuator, a, b, c);
    }

    /// Forward the three angles to the actuator facade, with the optional
    /// (disabled-by-default) centroid-height offset applied first.
    pub fn set_abc(&mut self, actuator: &mut impl Actuator, a: i16, b: i16, c: i16) {
        let (a, b, c) = if self.centroid_compensation {
            let offset = ((a as i32) + (b as i32) + (c as i32)) / 3;
            (
                clamp_q15(a as i32 + offset),
                clamp_q15(b as i32 + offset),
                clamp_q15(c as i32 + offset),
            )
        } else {
            (a, b, c)
        };

        self.a = a;
        self.b = b;
        self.c = c;

        actuator.set_angle(crate::actuator::Axis::A, a);
        actuator.set_angle(crate::actuator::Axis::B, b);
        actuator.set_angle(crate::actuator::Axis::C, c);
    }

    /// Inverse: `y = a; x = (c + a/2) * (1/sin60)`.
    ///
    /// The original source has two inconsistent formulations for this
    /// inverse across revisions (spec §9 Open Question); this adopts the one
    /// named explicitly in spec §4.7/§9 and does not attempt the alternate.
    pub fn get_xy(&self) -> (i16, i16) {
        let y = self.a;
        let sum = (self.c as i32) + (self.a as i32) / 2;
        let x = x_inv_sin60(sum);
        (x, y)
    }

    pub fn get_abc(&self) -> (i16, i16, i16) {
        (self.a, self.b, self.c)
    }

    /// Command a single axis directly, bypassing the `set_xy`/`set_abc`
    /// tilt mapping, for the console's `servo`/`servo-zero` commands.
    /// Grounded on `examples/original_source/.../servo.c`'s
    /// `SERVO_Position_Command_Set_q15angle`, which addresses one servo at a
    /// time independent of the platform-level `xy`/`abc` commands; unlike
    /// the original (which tracks the per-servo angle in a separate module
    /// from the platform's last-commanded position), this keeps a single
    /// tracked position so `get_abc`/telemetry stay consistent regardless of
    /// which command last moved an axis.
    pub fn set_axis(&mut self, actuator: &mut impl Actuator, axis: crate::actuator::Axis, angle: i16) {
        match axis {
            crate::actuator::Axis::A => self.a = angle,
            crate::actuator::Axis::B => self.b = angle,
            crate::actuator::Axis::C => self.c = angle,
        }
        actuator.set_angle(axis, angle);
    }

    /// Last commanded angle for one axis, for `servo <id>`'s query form.
    pub fn axis(&self, axis: crate::actuator::Axis) -> i16 {
        match axis {
            crate::actuator::Axis::A => self.a,
            crate::actuator::Axis::B => self.b,
            crate::actuator::Axis::C => self.c,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::{Axis, Limits};

    struct RecordingActuator {
        last: [i16; 3],
    }

    impl RecordingActuator {
        fn new() -> Self {
            Self { last: [0; 3] }
        }
    }

    impl Actuator for RecordingActuator {
        fn enable(&mut self) {}
        fn disable(&mut self) {}
        fn set_angle(&mut self, axis: Axis, angle: i16) {
            self.last[axis as usize] = angle;
        }
        fn limits(&self, _axis: Axis) -> Limits {
            Limits {
                min: i16::MIN,
                max: i16::MAX,
            }
        }
    }

    #[test]
    fn s3_kinematics_mapping() {
        let mut k = Kinematics::default();
        let mut act = RecordingActuator::new();
        k.set_xy(&mut act, 1000, 500);
        let (a, b, c) = k.get_abc();
        assert_eq!(a, 500);
        assert!((b as i32 - (-1116)).abs() <= 1, "b = {b}");
        assert!((c as i32 - 616).abs() <= 1, "c = {c}");
    }

    #[test]
    fn property3_round_trip_within_tolerance() {
        let mut act = RecordingActuator::new();
        let mut xs = vec![];
        for x in (-8192..=8192).step_by(512) {
            xs.push(x);
        }
        for &x in &xs {
            for &y in &xs {
                let mut k = Kinematics::default();
                k.set_xy(&mut act, x as i16, y as i16);
                let (xp, yp) = k.get_xy();
                assert!(
                    (x - xp as i32).abs() <= 2,
                    "x={x} xp={xp}"
                );
                assert!(
                    (y - yp as i32).abs() <= 2,
                    "y={y} yp={yp}"
                );
            }
        }
    }

    #[test]
    fn set_axis_updates_only_the_addressed_axis() {
        let mut k = Kinematics::default();
        let mut act = RecordingActuator::new();
        k.set_xy(&mut act, 1000, 500);
        let before = k.get_abc();
        k.set_axis(&mut act, Axis::B, 1234);
        let after = k.get_abc();
        assert_eq!(after.1, 1234);
        assert_eq!(after.0, before.0);
        assert_eq!(after.2, before.2);
        assert_eq!(k.axis(Axis::B), 1234);
    }

    #[test]
    fn centroid_compensation_holds_mean_when_enabled() {
        let mut k = Kinematics::default();
        k.centroid_compensation = true;
        let mut act = RecordingActuator::new();
        k.set_abc(&mut act, 300, -300, 900);
        let (a, b, c) = k.get_abc();
        assert_eq!(a as i32 + b as i32 + c as i32, 300 - 300 + 900 + 3 * 300);
    }
}
