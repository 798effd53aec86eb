//! Human (manual joystick) controller: a direct-feel mode with a softened,
//! piecewise-linear joystick response. The PID-shaped error history it
//! keeps is diagnostic only — the actuator command comes from the
//! joystick, not from the error feedback.
//!
//! Grounded on `examples/original_source/src/balance/balance_human.c`
//! (`BALANCE_HUMAN_SoftenJoystickValue`, the parallel error-history
//! bookkeeping, and the `human`/`humank`/`humandfs`/`humani` command
//! surface).

const LINEAR_RANGE: i32 = 25;
const FULL_RANGE: i32 = 100;
const GAIN_MIN: i32 = 20;
const GAIN_MAX: i32 = 75;

const HISTORY_DEPTH: usize = 10;
const NEAR_TARGET_THRESHOLD: i32 = 512;
const MOVING_SLOW_THRESHOLD: i32 = 5;

/// Soften a raw joystick axis reading (approximately +/-100) into a q15
/// command: linear with gain `GAIN_MIN` inside `LINEAR_RANGE`, then ramping
/// up to `GAIN_MAX` across the rest of the travel.
pub fn soften_joystick_value(raw: i16) -> i16 {
    let sign = if raw < 0 { -1 } else { 1 };
    let abs_value = (raw as i32).abs();

    let mut gain = GAIN_MIN;
    if abs_value > LINEAR_RANGE {
        gain += (abs_value - LINEAR_RANGE) * (GAIN_MAX - GAIN_MIN) / (FULL_RANGE - LINEAR_RANGE);
    }

    (sign * abs_value * gain).clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

/// Diagnostic-only per-axis error bookkeeping; mirrors the PID history
/// shape so telemetry can report comparable fields, but nothing here feeds
/// back into the axis's own output.
#[derive(Clone, Copy, Debug)]
struct AxisDiagnostics {
    delta_filter_size: usize,
    history: [i32; HISTORY_DEPTH],
    history_index: usize,
    target: i16,
    actual: i16,
    error: i32,
    error_sum: i32,
    error_delta: i32,
    integral_enabled: bool,
}

impl AxisDiagnostics {
    fn new() -> Self {
        Self {
            delta_filter_size: 5,
            history: [0; HISTORY_DEPTH],
            history_index: 0,
            target: 0,
            actual: 0,
            error: 0,
            error_sum: 0,
            error_delta: 0,
            integral_enabled: false,
        }
    }

    fn reset(&mut self) {
        let delta_filter_size = self.delta_filter_size;
        *self = Self::new();
        self.delta_filter_size = delta_filter_size;
    }

    fn run(&mut self, target: i16, actual: i16) {
        self.target = target;
        self.actual = actual;
        self.error = target as i32 - actual as i32;

        let delta_index =
            (self.history_index + HISTORY_DEPTH - self.delta_filter_size) % HISTORY_DEPTH;
        self.error_delta = self.error - self.history[delta_index];

        let near_target = self.error.abs() < NEAR_TARGET_THRESHOLD;
        let moving_slow = self.error_delta.abs() < MOVING_SLOW_THRESHOLD;
        self.integral_enabled = near_target && moving_slow;
        if self.integral_enabled {
            self.error_sum += self.error;
        }

        self.history[self.history_index] = self.error;
        self.history_index = (self.history_index + 1) % HISTORY_DEPTH;
    }
}

pub struct HumanState {
    x: AxisDiagnostics,
    y: AxisDiagnostics,
    pub output_x: i16,
    pub output_y: i16,
}

impl HumanState {
    pub fn new() -> Self {
        Self {
            x: AxisDiagnostics::new(),
            y: AxisDiagnostics::new(),
            output_x: 0,
            output_y: 0,
        }
    }

    pub fn reset(&mut self) {
        self.x.reset();
        self.y.reset();
        self.output_x = 0;
        self.output_y = 0;
    }

    pub fn set_delta_filter_size(&mut self, size: usize) {
        let size = size.min(HISTORY_DEPTH);
        self.x.delta_filter_size = size;
        self.y.delta_filter_size = size;
        self.reset();
    }

    /// Update diagnostics (when the ball is detected) and compute the
    /// softened joystick command, which is the actual actuator demand.
    pub fn run(
        &mut self,
        target_x: i16,
        target_y: i16,
        ball_detected: bool,
        ball_x: i16,
        ball_y: i16,
        joy_x: i16,
        joy_y: i16,
    ) -> (i16, i16) {
        if ball_detected {
            self.x.run(target_x, ball_x);
            self.y.run(target_y, ball_y);
        }

        self.output_x = soften_joystick_value(joy_x);
        self.output_y = soften_joystick_value(joy_y);
        (self.output_x, self.output_y)
    }
}

impl Default for HumanState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soften_is_linear_with_gain_min_inside_the_dead_zone() {
        assert_eq!(soften_joystick_value(10), 10 * GAIN_MIN as i16);
        assert_eq!(soften_joystick_value(-10), -10 * GAIN_MIN as i16);
        assert_eq!(soften_joystick_value(0), 0);
    }

    #[test]
    fn soften_ramps_gain_beyond_the_linear_range() {
        let at_boundary = soften_joystick_value(LINEAR_RANGE as i16);
        let just_beyond = soften_joystick_value(LINEAR_RANGE as i16 + 1);
        assert_eq!(at_boundary, LINEAR_RANGE as i16 * GAIN_MIN as i16);
        // One unit past the linear range, gain ticks up from GAIN_MIN.
        assert!(just_beyond as i32 > (LINEAR_RANGE + 1) * GAIN_MIN);
    }

    #[test]
    fn output_tracks_joystick_not_ball_error() {
        let mut human = HumanState::new();
        let (cx, cy) = human.run(1000, 1000, true, 0, 0, 0, 0);
        assert_eq!((cx, cy), (0, 0));
        let (cx, cy) = human.run(1000, 1000, true, 0, 0, 50, -50);
        assert_eq!(cx, soften_joystick_value(50));
        assert_eq!(cy, soften_joystick_value(-50));
    }

    #[test]
    fn reset_clears_diagnostics_and_output() {
        let mut human = HumanState::new();
        human.run(1000, 1000, true, 0, 0, 80, 80);
        human.reset();
        assert_eq!(human.output_x, 0);
        assert_eq!(human.output_y, 0);
        assert_eq!(human.x.error_sum, 0);
    }

    #[test]
    fn set_delta_filter_size_saturates_to_history_depth() {
        let mut human = HumanState::new();
        human.set_delta_filter_size(99);
        assert_eq!(human.x.delta_filter_size, HISTORY_DEPTH);
    }
}
