//! The balancer dispatcher: debounced button-driven mode arbitration, the
//! fixed target cycle, and the per-cycle control-law/telemetry run.
//!
//! Grounded on `examples/original_source/src/balance/balance.c`'s
//! `BALANCE_RTOS_Task`: it starts in an invalid mode (no LED lit), polls the
//! joystick buttons each cycle, debounces them before acting, toggles the
//! mode LED on every transition, and — only while a mode is active — runs
//! that mode's control law, drives the kinematics, and (when the
//! `dvbalance`-equivalent streaming flag is set) emits one telemetry frame.

use crate::actuator::Actuator;
use crate::controllers::{BalancerInterface, ControlOutput};
use crate::kinematics::Kinematics;
use crate::led::{LedBank, LedId};
use crate::sensors::{BallSample, JoystickSample};
use crate::target::TargetCycle;
use crate::telemetry::{self, BasicFields, ExtendedFields, FrameKind};

/// Consecutive same-state button readings required before a press/release
/// is accepted, matching the original's simple debounce counter.
pub const DEBOUNCE_COUNT: u8 = 3;

#[derive(Clone, Copy, Debug, Default)]
struct ButtonDebounce {
    last_raw: bool,
    count: u8,
    stable: bool,
}

impl ButtonDebounce {
    /// Feed one raw reading. Returns `Some(new_stable)` exactly on the cycle
    /// the stable state changes (edge-triggered in both directions — press
    /// *and* release — so a caller that only cares about presses can match
    /// on `Some(true)`, and one that must track the held state, like the Z
    /// override, can assign the new value unconditionally on `Some(_)`).
    fn update(&mut self, raw: bool) -> Option<bool> {
        if raw == self.last_raw {
            if self.count < DEBOUNCE_COUNT {
                self.count += 1;
            }
        } else {
            self.last_raw = raw;
            self.count = 0;
        }

        if self.count >= DEBOUNCE_COUNT - 1 && self.stable != raw {
            self.stable = raw;
            return Some(self.stable);
        }
        None
    }
}

/// Which button-cycled mode set is active. Per spec §4.6/§8 item 4, button
/// C cycles only `{Off, Pid}`; button Z is a momentary override into
/// `Human` for as long as it's held. `Nn`/`Fuzzy` are reachable only from
/// the console (`nntest`/`fuzzy`), never from the debounced button path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ButtonMode {
    Off,
    Pid,
}

pub struct Dispatcher {
    mode: BalancerInterface,
    button_mode: ButtonMode,
    human_override: bool,
    button_c: ButtonDebounce,
    button_z: ButtonDebounce,
    target_cycle: TargetCycle,
    stream_active: bool,
    /// The persistent PID tuning (spec §3: entities live for the program's
    /// lifetime). A fresh [`crate::controllers::pid::PidControllerPair`] is
    /// constructed from this every time the dispatcher (re)enters `Pid`, so
    /// `kp`/`ki`/`kd`/`pidk`/`osf`/`dfs` edits survive a mode cycle instead
    /// of being discarded with the old controller state.
    pid_gains: crate::controllers::pid::PidGains,
    pub cycle_count: u32,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self {
            mode: BalancerInterface::Off,
            button_mode: ButtonMode::Off,
            human_override: false,
            button_c: ButtonDebounce::default(),
            button_z: ButtonDebounce::default(),
            target_cycle: TargetCycle::new(),
            stream_active: false,
            pid_gains: crate::controllers::pid::PidGains::default(),
            cycle_count: 0,
        }
    }

    pub fn activate_target_led(&self, leds: &mut impl LedBank) {
        self.target_cycle.activate(leds);
    }

    pub fn set_streaming(&mut self, active: bool) {
        self.stream_active = active;
    }

    /// Swap in a new mode, extinguishing the old mode's LED, lighting the
    /// new one, and resetting (never reinitializing) its state. Called both
    /// from the debounced button path and from console mode commands
    /// (`nntest`, `fuzzy`).
    fn transition_to(&mut self, mut new_mode: BalancerInterface, leds: &mut impl LedBank) {
        let old_led = self.mode.led();
        if old_led != LedId::ModeOff {
            leds.clear(old_led);
        }
        new_mode.reset();
        let new_led = new_mode.led();
        if new_led != LedId::ModeOff {
            leds.set(new_led);
        }
        self.mode = new_mode;
    }

    /// Console entry point for mode-forcing commands (`pid`, `human`,
    /// `nntest`, `fuzzy`): switches mode immediately regardless of button
    /// state. A later button edge can still override it on the next cycle.
    pub fn force_mode(&mut self, mode: BalancerInterface, leds: &mut impl LedBank) {
        self.transition_to(mode, leds);
    }

    /// Console entry point for the `pid` command specifically: forces `Pid`
    /// using the persistent tuning rather than the controller's bare
    /// defaults, so a console-forced re-entry doesn't undo earlier
    /// `kp`/`ki`/`kd` edits.
    pub fn force_pid_mode(&mut self, leds: &mut impl LedBank) {
        let mode = self.new_pid_mode();
        self.transition_to(mode, leds);
    }

    /// Mutable access to the active PID controller's gains, for the
    /// `pidk`/`kp`/`ki`/`kd` console commands. `None` when PID isn't active.
    pub fn pid_mut(&mut self) -> Option<&mut crate::controllers::pid::PidControllerPair> {
        match &mut self.mode {
            BalancerInterface::Pid(p) => Some(p),
            _ => None,
        }
    }

    /// The persistent PID tuning, read by the `kp`/`ki`/`kd`/`pidk`/`osf`/
    /// `dfs` console commands so they can report and edit it even while PID
    /// isn't the active mode.
    pub fn pid_gains(&self) -> crate::controllers::pid::PidGains {
        self.pid_gains
    }

    /// Update the persistent PID tuning. Applied immediately to the running
    /// controller if `Pid` is active; always kept for the next time the
    /// dispatcher (re)enters `Pid`.
    pub fn set_pid_gains(&mut self, gains: crate::controllers::pid::PidGains) {
        self.pid_gains = gains;
        if let BalancerInterface::Pid(pair) = &mut self.mode {
            pair.x.set_gains(gains);
            pair.y.set_gains(gains);
        }
    }

    fn new_pid_mode(&self) -> BalancerInterface {
        BalancerInterface::Pid(crate::controllers::pid::PidControllerPair::new_with_gains(self.pid_gains))
    }

    /// Mutable access to the active human controller, for the `humandfs`
    /// console command. `None` when human mode isn't active.
    pub fn human_mut(&mut self) -> Option<&mut crate::controllers::human::HumanState> {
        match &mut self.mode {
            BalancerInterface::Human(h) => Some(h),
            _ => None,
        }
    }

    /// Run one 100 Hz dispatcher cycle: debounce buttons, arbitrate mode,
    /// advance the target cycle, run the active control law, drive
    /// kinematics, and optionally stream telemetry.
    #[allow(clippy::too_many_arguments)]
    pub fn run_cycle(
        &mut self,
        joystick: JoystickSample,
        ball: BallSample,
        actuator: &mut impl Actuator,
        kinematics: &mut Kinematics,
        leds: &mut impl LedBank,
        rand_usize: impl FnMut() -> usize,
        emit_telemetry: impl FnOnce(&[u8]),
        zero_joystick: impl FnOnce(JoystickSample),
    ) {
        self.cycle_count = self.cycle_count.wrapping_add(1);

        let c_pressed = matches!(self.button_c.update(joystick.button_c), Some(true));
        if c_pressed {
            self.button_mode = match self.button_mode {
                ButtonMode::Off => ButtonMode::Pid,
                ButtonMode::Pid => ButtonMode::Off,
            };
        }
        // Both edges matter here, not just the press: Z is a momentary
        // override that must end the instant it's released, so the override
        // flag tracks the debounced stable state directly rather than only
        // reacting to the rising edge.
        if let Some(new_stable) = self.button_z.update(joystick.button_z) {
            self.human_override = new_stable;
        }

        let wants_human = self.human_override;
        let wants_pid = self.button_mode == ButtonMode::Pid;

        let currently_human = matches!(self.mode, BalancerInterface::Human(_));
        let currently_off = matches!(self.mode, BalancerInterface::Off);
        let currently_pid = matches!(self.mode, BalancerInterface::Pid(_));

        if wants_human && !currently_human {
            // The joystick doubles as a zero reference the instant it takes
            // over manual control (spec §1/§4.5: "Reset calls
            // `joystick_zero_set()`"), so the operator steps in "at rest"
            // and the plate doesn't jump.
            zero_joystick(joystick);
            self.transition_to(BalancerInterface::Human(crate::controllers::human::HumanState::new()), leds);
        } else if !wants_human && currently_human {
            let target_mode = if wants_pid { self.new_pid_mode() } else { BalancerInterface::Off };
            self.transition_to(target_mode, leds);
        } else if !wants_human && wants_pid && currently_off {
            let target_mode = self.new_pid_mode();
            self.transition_to(target_mode, leds);
        } else if !wants_human && !wants_pid && currently_pid {
            self.transition_to(BalancerInterface::Off, leds);
        } else if !wants_human && c_pressed && !currently_off && !currently_pid {
            // A console-forced Nn/Fuzzy mode is still in the button-cycled
            // set as far as C is concerned: a C edge cycles it straight back
            // to Off/Pid, same as it would from either of those two.
            let target_mode = if wants_pid { self.new_pid_mode() } else { BalancerInterface::Off };
            self.transition_to(target_mode, leds);
        }

        self.target_cycle.tick(leds, rand_usize);
        let target = self.target_cycle.current();

        if !ball.detected && !matches!(self.mode, BalancerInterface::Off) {
            self.mode.reset();
        }

        let output = self.mode.run(
            target.x,
            target.y,
            ball.detected,
            ball.x,
            ball.y,
            joystick.x,
            joystick.y,
        );

        if ball.detected {
            if self.mode.output_is_abc() {
                kinematics.set_abc(actuator, output.first, output.second, output.third);
            } else {
                kinematics.set_xy(actuator, output.first, output.second);
            }
        } else {
            // Losing the ball must deterministically park the plate flat
            // (spec §4.3/§4.6), not just zero the controller's own state —
            // the actuator otherwise keeps holding its last-commanded angle.
            kinematics.set_xy(actuator, 0, 0);
        }

        if self.stream_active {
            if let Some(kind) = self.mode.frame_kind() {
                let servo_abc = kinematics.get_abc();
                let extended = self.mode.extended_fields(output);
                let mut frame = [0u8; telemetry::MAX_FRAME_LEN];
                let n = build_frame(kind, target, ball, output, servo_abc, extended, &mut frame);
                emit_telemetry(&frame[..n]);
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Build and hand off one telemetry frame for the given mode/output. Split
/// out of [`Dispatcher::run_cycle`] so callers (and tests) can build a frame
/// directly without running a full cycle.
#[allow(clippy::too_many_arguments)]
pub fn build_frame(
    kind: FrameKind,
    target: crate::target::Target,
    ball: BallSample,
    output: ControlOutput,
    servo_abc: (i16, i16, i16),
    extended: Option<ExtendedFields>,
    out: &mut [u8; telemetry::MAX_FRAME_LEN],
) -> usize {
    let basic = BasicFields {
        ball_detected: ball.detected as i16,
        target_x: target.x,
        target_y: target.y,
        ball_x: ball.x,
        ball_y: ball.y,
        command_x: output.first,
        command_y: output.second,
        servo_a: servo_abc.0,
        servo_b: servo_abc.1,
        servo_c: servo_abc.2,
    };

    match extended {
        Some(ext) => telemetry::encode_extended(kind, &ext, &basic, out),
        None => telemetry::encode_basic(kind, &basic, out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::{Axis, Limits};
    use crate::led::RecordingLedBank;

    struct NullActuator;
    impl Actuator for NullActuator {
        fn enable(&mut self) {}
        fn disable(&mut self) {}
        fn set_angle(&mut self, _axis: Axis, _angle: i16) {}
        fn limits(&self, _axis: Axis) -> Limits {
            Limits::default()
        }
    }

    struct RecordingActuator {
        last: [i16; 3],
    }

    impl RecordingActuator {
        fn new() -> Self {
            Self { last: [1; 3] }
        }
    }

    impl Actuator for RecordingActuator {
        fn enable(&mut self) {}
        fn disable(&mut self) {}
        fn set_angle(&mut self, axis: Axis, angle: i16) {
            self.last[axis as usize] = angle;
        }
        fn limits(&self, _axis: Axis) -> Limits {
            Limits::default()
        }
    }

    fn sample(button_c: bool, button_z: bool) -> JoystickSample {
        JoystickSample {
            x: 0,
            y: 0,
            button_c,
            button_z,
        }
    }

    #[test]
    fn starts_in_off_with_no_mode_led_lit() {
        let d = Dispatcher::new();
        assert!(matches!(d.mode, BalancerInterface::Off));
    }

    #[test]
    fn holding_button_z_enters_human_after_debounce() {
        let mut d = Dispatcher::new();
        let mut act = NullActuator;
        let mut kin = Kinematics::default();
        let mut leds = RecordingLedBank::new();
        let ball = BallSample {
            detected: true,
            x: 0,
            y: 0,
        };

        for _ in 0..(DEBOUNCE_COUNT as usize + 1) {
            d.run_cycle(sample(false, true), ball, &mut act, &mut kin, &mut leds, || 0, |_| {}, |_| {});
        }

        assert!(matches!(d.mode, BalancerInterface::Human(_)));
        assert!(leds.is_lit(LedId::ModeHuman));
    }

    #[test]
    fn entering_human_mode_triggers_a_joystick_zero_set() {
        let mut d = Dispatcher::new();
        let mut act = NullActuator;
        let mut kin = Kinematics::default();
        let mut leds = RecordingLedBank::new();
        let ball = BallSample {
            detected: true,
            x: 0,
            y: 0,
        };
        let mut zero_set_calls = 0u32;

        for _ in 0..(DEBOUNCE_COUNT as usize + 1) {
            d.run_cycle(
                sample(false, true),
                ball,
                &mut act,
                &mut kin,
                &mut leds,
                || 0,
                |_| {},
                |_sample| zero_set_calls += 1,
            );
        }

        assert!(matches!(d.mode, BalancerInterface::Human(_)));
        assert_eq!(zero_set_calls, 1, "joystick_zero_set must fire exactly once, on the entry edge");
    }

    #[test]
    fn releasing_button_z_returns_to_off_when_button_c_never_pressed() {
        let mut d = Dispatcher::new();
        let mut act = NullActuator;
        let mut kin = Kinematics::default();
        let mut leds = RecordingLedBank::new();
        let ball = BallSample {
            detected: true,
            x: 0,
            y: 0,
        };

        for _ in 0..(DEBOUNCE_COUNT as usize + 1) {
            d.run_cycle(sample(false, true), ball, &mut act, &mut kin, &mut leds, || 0, |_| {}, |_| {});
        }
        for _ in 0..(DEBOUNCE_COUNT as usize + 1) {
            d.run_cycle(sample(false, false), ball, &mut act, &mut kin, &mut leds, || 0, |_| {}, |_| {});
        }

        assert!(matches!(d.mode, BalancerInterface::Off));
    }

    #[test]
    fn button_c_toggles_between_off_and_pid() {
        let mut d = Dispatcher::new();
        let mut act = NullActuator;
        let mut kin = Kinematics::default();
        let mut leds = RecordingLedBank::new();
        let ball = BallSample {
            detected: true,
            x: 0,
            y: 0,
        };

        for _ in 0..(DEBOUNCE_COUNT as usize + 1) {
            d.run_cycle(sample(true, false), ball, &mut act, &mut kin, &mut leds, || 0, |_| {}, |_| {});
        }
        assert!(matches!(d.mode, BalancerInterface::Pid(_)));

        for _ in 0..(DEBOUNCE_COUNT as usize + 1) {
            d.run_cycle(sample(false, false), ball, &mut act, &mut kin, &mut leds, || 0, |_| {}, |_| {});
        }
        for _ in 0..(DEBOUNCE_COUNT as usize + 1) {
            d.run_cycle(sample(true, false), ball, &mut act, &mut kin, &mut leds, || 0, |_| {}, |_| {});
        }
        assert!(matches!(d.mode, BalancerInterface::Off));
    }

    #[test]
    fn releasing_button_z_restores_pid_when_button_c_was_pressed_first() {
        let mut d = Dispatcher::new();
        let mut act = NullActuator;
        let mut kin = Kinematics::default();
        let mut leds = RecordingLedBank::new();
        let ball = BallSample {
            detected: true,
            x: 0,
            y: 0,
        };

        for _ in 0..(DEBOUNCE_COUNT as usize + 1) {
            d.run_cycle(sample(true, false), ball, &mut act, &mut kin, &mut leds, || 0, |_| {}, |_| {});
        }
        assert!(matches!(d.mode, BalancerInterface::Pid(_)));

        for _ in 0..(DEBOUNCE_COUNT as usize + 1) {
            d.run_cycle(sample(false, true), ball, &mut act, &mut kin, &mut leds, || 0, |_| {}, |_| {});
        }
        assert!(matches!(d.mode, BalancerInterface::Human(_)));

        for _ in 0..(DEBOUNCE_COUNT as usize + 1) {
            d.run_cycle(sample(false, false), ball, &mut act, &mut kin, &mut leds, || 0, |_| {}, |_| {});
        }
        assert!(matches!(d.mode, BalancerInterface::Pid(_)), "releasing Z must restore Pid, not strand in Human");
    }

    #[test]
    fn button_c_edge_exits_a_console_forced_nn_mode() {
        let mut d = Dispatcher::new();
        let mut act = NullActuator;
        let mut kin = Kinematics::default();
        let mut leds = RecordingLedBank::new();
        let ball = BallSample {
            detected: true,
            x: 0,
            y: 0,
        };

        d.force_mode(BalancerInterface::Nn(crate::controllers::nn::NnState::new()), &mut leds);
        assert!(matches!(d.mode, BalancerInterface::Nn(_)));

        for _ in 0..(DEBOUNCE_COUNT as usize + 1) {
            d.run_cycle(sample(true, false), ball, &mut act, &mut kin, &mut leds, || 0, |_| {}, |_| {});
        }
        assert!(matches!(d.mode, BalancerInterface::Pid(_)), "a C edge must cycle NN back to Pid, not strand it");
    }

    #[test]
    fn pid_gain_edits_survive_a_mode_cycle() {
        let mut d = Dispatcher::new();
        let mut act = NullActuator;
        let mut kin = Kinematics::default();
        let mut leds = RecordingLedBank::new();
        let ball = BallSample {
            detected: true,
            x: 0,
            y: 0,
        };

        for _ in 0..(DEBOUNCE_COUNT as usize + 1) {
            d.run_cycle(sample(true, false), ball, &mut act, &mut kin, &mut leds, || 0, |_| {}, |_| {});
        }
        assert!(matches!(d.mode, BalancerInterface::Pid(_)));

        let tuned = crate::controllers::pid::PidGains {
            kp: 4242,
            ..d.pid_gains()
        };
        d.set_pid_gains(tuned);
        assert_eq!(d.pid_mut().unwrap().x.gains.kp, 4242);

        // Release then press C again to cycle Pid -> Off -> Pid.
        for _ in 0..(DEBOUNCE_COUNT as usize + 1) {
            d.run_cycle(sample(false, false), ball, &mut act, &mut kin, &mut leds, || 0, |_| {}, |_| {});
        }
        for _ in 0..(DEBOUNCE_COUNT as usize + 1) {
            d.run_cycle(sample(true, false), ball, &mut act, &mut kin, &mut leds, || 0, |_| {}, |_| {});
        }
        assert!(matches!(d.mode, BalancerInterface::Off));
        for _ in 0..(DEBOUNCE_COUNT as usize + 1) {
            d.run_cycle(sample(false, false), ball, &mut act, &mut kin, &mut leds, || 0, |_| {}, |_| {});
        }
        for _ in 0..(DEBOUNCE_COUNT as usize + 1) {
            d.run_cycle(sample(true, false), ball, &mut act, &mut kin, &mut leds, || 0, |_| {}, |_| {});
        }
        assert!(matches!(d.mode, BalancerInterface::Pid(_)));

        assert_eq!(d.pid_gains().kp, 4242);
        assert_eq!(d.pid_mut().unwrap().x.gains.kp, 4242, "tuned gain must survive the Off/Pid cycle");
    }

    #[test]
    fn losing_the_ball_commands_the_actuator_flat() {
        let mut d = Dispatcher::new();
        let mut act = RecordingActuator::new();
        let mut kin = Kinematics::default();
        let mut leds = RecordingLedBank::new();

        for _ in 0..(DEBOUNCE_COUNT as usize + 1) {
            d.run_cycle(
                sample(true, false),
                BallSample { detected: true, x: 1000, y: -1000 },
                &mut act,
                &mut kin,
                &mut leds,
                || 0,
                |_| {},
                |_| {},
            );
        }
        assert!(matches!(d.mode, BalancerInterface::Pid(_)));
        // Drive a nonzero tilt so the actuator isn't already parked at zero.
        d.run_cycle(
            sample(true, false),
            BallSample { detected: true, x: 4000, y: -4000 },
            &mut act,
            &mut kin,
            &mut leds,
            || 0,
            |_| {},
            |_| {},
        );
        assert_ne!(kin.get_abc(), (0, 0, 0));

        d.run_cycle(
            sample(true, false),
            BallSample { detected: false, x: 4000, y: -4000 },
            &mut act,
            &mut kin,
            &mut leds,
            || 0,
            |_| {},
            |_| {},
        );

        assert_eq!(kin.get_abc(), (0, 0, 0), "losing the ball must re-command the actuator flat, not just reset controller state");
        assert_eq!(act.last, [0, 0, 0]);
    }
}
