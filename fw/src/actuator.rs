//! Hardware side of the actuator facade: enable/disable stagger sequencing
//! and the `stm32-hal2` timer-PWM implementation, one channel per axis.
//!
//! Grounded on `examples/original_source/src/platform/platform.c`
//! (`PLATFORM_Enable`/`PLATFORM_Disable`), which staggers the three servo
//! moves so they don't all draw inrush current from the supply at once.
//! [`Axis`]/[`Limits`]/the [`Actuator`] trait live in `triplate_core` so
//! kinematics and the controllers stay host-testable; only the PWM output
//! and the real-time stagger delay are hardware-bound, so they stay here.

use hal::pac::TIM2;
use hal::timer::{OutputCompare, Timer};
use triplate_core::actuator::{Actuator, Axis, Limits, ENABLE_STAGGER_MS};

/// Zero all three axes with the staggered delay, then enable the driver.
/// Call before the first balancer mode runs.
///
/// Takes a `lock` callback instead of an owned `&mut impl Actuator` so the
/// caller (an RTIC task) can run this against a `#[shared]` actuator
/// resource, locking it only for each synchronous step rather than across
/// the stagger delay's `.await`.
pub async fn enable_sequence(mut lock: impl FnMut(&mut dyn FnMut(&mut dyn Actuator))) {
    use rtic_monotonics::systick::Systick;
    use rtic_monotonics::Monotonic;

    lock(&mut |actuator| actuator.enable());
    for (axis, stagger_ms) in [Axis::A, Axis::B, Axis::C].into_iter().zip(ENABLE_STAGGER_MS) {
        lock(&mut |actuator| actuator.set_angle(axis, 0));
        Systick::delay((stagger_ms as u64).millis()).await;
    }
}

/// Zero all three axes with the staggered delay, then disable the driver.
/// Takes the same lock-callback shape as [`enable_sequence`], for the same
/// reason: a `#[shared]` actuator resource can only be locked synchronously.
pub async fn disable_sequence(mut lock: impl FnMut(&mut dyn FnMut(&mut dyn Actuator))) {
    use rtic_monotonics::systick::Systick;
    use rtic_monotonics::Monotonic;

    for (axis, stagger_ms) in [Axis::A, Axis::B, Axis::C].into_iter().zip(ENABLE_STAGGER_MS) {
        lock(&mut |actuator| actuator.set_angle(axis, 0));
        Systick::delay((stagger_ms as u64).millis()).await;
    }
    lock(&mut |actuator| actuator.disable());
}

/// `stm32-hal2` timer-PWM backed implementation: one TIM2 channel per axis.
pub struct HalActuator {
    timer: Timer<TIM2>,
    limits: [Limits; 3],
    enabled: bool,
}

impl HalActuator {
    pub fn new(timer: Timer<TIM2>) -> Self {
        Self {
            timer,
            limits: [Limits::default(); 3],
            enabled: false,
        }
    }

    fn channel_for(axis: Axis) -> hal::timer::TimerChannel {
        match axis {
            Axis::A => hal::timer::TimerChannel::C1,
            Axis::B => hal::timer::TimerChannel::C2,
            Axis::C => hal::timer::TimerChannel::C3,
        }
    }

    fn angle_to_duty(angle: i16) -> f32 {
        // Map the q15 +/-90deg range onto a 1-2ms servo pulse centered at 1.5ms.
        let frac = angle as f32 / 0x2000 as f32; // -1.0..=1.0 at the travel limits
        0.075 + frac * 0.025
    }

    fn write_angle(&mut self, axis: Axis, angle: i16) {
        let limits = self.limits[axis as usize];
        let clamped = angle.clamp(limits.min, limits.max);
        let duty = Self::angle_to_duty(clamped);
        self.timer.set_duty(Self::channel_for(axis), duty);
    }
}

impl Actuator for HalActuator {
    fn enable(&mut self) {
        if !self.enabled {
            self.timer.enable_pwm_output(OutputCompare::Pwm1, 0.);
            self.enabled = true;
        }
    }

    fn disable(&mut self) {
        if self.enabled {
            self.timer.disable();
            self.enabled = false;
        }
    }

    fn set_angle(&mut self, axis: Axis, angle: i16) {
        self.write_angle(axis, angle);
    }

    fn limits(&self, axis: Axis) -> Limits {
        self.limits[axis as usize]
    }
}
