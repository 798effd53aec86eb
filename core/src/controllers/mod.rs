//! The closed set of balancer control strategies and the dispatcher-facing
//! enum that switches between them.
//!
//! Grounded on `examples/original_source/src/balance/balance.c`'s
//! `active_balance_mode`/`BALANCE_MODE_t` (a plain mode tag the RTOS task
//! switches on every cycle) and spec §3's `{Off, Human, Pid, Nn, Fuzzy}`
//! enumeration. Rust expresses the same "closed variant with a capability
//! set" as an enum over the concrete controller states rather than a tag
//! plus a union of optional fields, so `reset()`/`run()` can't be called on
//! the wrong state's data.

pub mod human;
pub mod pid;

#[cfg(feature = "fuzzy")]
pub mod fuzzy;
pub mod nn;

use crate::led::LedId;
use crate::telemetry::{ExtendedFields, FrameKind};
use human::HumanState;
use nn::NnState;
use pid::PidControllerPair;

#[cfg(feature = "fuzzy")]
use fuzzy::FuzzyState;

/// One control-law step's command, in q15 plate-tilt coordinates `(x, y)`
/// unless the NN is built with `nn-out-abc`, in which case it is instead an
/// `(a, b, c)` actuator-angle triple; the dispatcher knows which from the
/// active variant (see [`BalancerInterface::output_is_abc`]).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ControlOutput {
    pub first: i16,
    pub second: i16,
    pub third: i16,
}

/// The active balancer mode. Each variant owns exactly the state its
/// control law needs; `Off` holds none.
pub enum BalancerInterface {
    Off,
    Human(HumanState),
    Pid(PidControllerPair),
    Nn(NnState),
    #[cfg(feature = "fuzzy")]
    Fuzzy(FuzzyState),
}

impl BalancerInterface {
    /// The indicator LED for this mode; `Off` has none (per
    /// [`LedId::ModeOff`]'s doc comment, dispatcher logic skips it).
    pub fn led(&self) -> LedId {
        match self {
            BalancerInterface::Off => LedId::ModeOff,
            BalancerInterface::Human(_) => LedId::ModeHuman,
            BalancerInterface::Pid(_) => LedId::ModePid,
            BalancerInterface::Nn(_) => LedId::ModeNn,
            #[cfg(feature = "fuzzy")]
            BalancerInterface::Fuzzy(_) => LedId::ModeFuzzy,
        }
    }

    /// True when this variant's `run()` output is already in actuator `abc`
    /// space and must bypass [`crate::kinematics::Kinematics::set_xy`] in
    /// favor of `set_abc` directly — only the NN built with `nn-out-abc`.
    pub fn output_is_abc(&self) -> bool {
        match self {
            #[cfg(feature = "nn-out-abc")]
            BalancerInterface::Nn(_) => true,
            _ => false,
        }
    }

    /// Clear whatever running state the mode holds. Called on every mode
    /// transition (spec §4.6); never calls anything resembling `init` — the
    /// dispatcher only ever constructs a fresh variant (`PidControllerPair::new()`
    /// and friends) at the moment it transitions into that mode, then calls
    /// `reset()` on it, matching the spec's "the dispatcher never calls
    /// `init` at run time" rule for what happens after startup.
    pub fn reset(&mut self) {
        match self {
            BalancerInterface::Off => {}
            BalancerInterface::Human(h) => h.reset(),
            BalancerInterface::Pid(p) => p.reset(),
            BalancerInterface::Nn(n) => n.reset(),
            #[cfg(feature = "fuzzy")]
            BalancerInterface::Fuzzy(f) => f.reset(),
        }
    }

    /// Telemetry frame tag for this mode, or `None` for `Off` (which never
    /// streams — there is nothing to report).
    pub fn frame_kind(&self) -> Option<FrameKind> {
        match self {
            BalancerInterface::Off => None,
            BalancerInterface::Human(_) => Some(FrameKind::Human),
            BalancerInterface::Pid(_) => Some(FrameKind::Pid),
            BalancerInterface::Nn(_) => Some(FrameKind::Nn),
            #[cfg(feature = "fuzzy")]
            BalancerInterface::Fuzzy(_) => Some(FrameKind::Fuzzy),
        }
    }

    /// The error-term fields an extended telemetry frame prepends ahead of
    /// the basic fields (spec §6); `Human` and `Off` have none since human
    /// mode's output isn't error-driven and off never streams.
    pub fn extended_fields(&self, _output: ControlOutput) -> Option<ExtendedFields> {
        match self {
            // The NN and fuzzy controllers keep their error history private
            // (it isn't part of either's console-facing surface, unlike
            // PID's `pidi`/`error_sum` command); only PID reports the
            // extended error terms, matching its `balance_pid.c`-derived
            // data-visualizer frame.
            BalancerInterface::Off | BalancerInterface::Human(_) => None,
            BalancerInterface::Pid(p) => Some(ExtendedFields {
                error_x: crate::q::clamp_q15(p.last_x.error),
                error_y: crate::q::clamp_q15(p.last_y.error),
                error_sum_x: p.last_x.error_sum,
                error_sum_y: p.last_y.error_sum,
                error_delta_x: crate::q::clamp_q15(p.last_x.error_delta),
                error_delta_y: crate::q::clamp_q15(p.last_y.error_delta),
            }),
            BalancerInterface::Nn(_) => None,
            #[cfg(feature = "fuzzy")]
            BalancerInterface::Fuzzy(_) => None,
        }
    }

    /// Run one control step.
    #[allow(clippy::too_many_arguments)]
    pub fn run(
        &mut self,
        target_x: i16,
        target_y: i16,
        ball_detected: bool,
        ball_x: i16,
        ball_y: i16,
        joy_x: i16,
        joy_y: i16,
    ) -> ControlOutput {
        match self {
            BalancerInterface::Off => ControlOutput::default(),
            BalancerInterface::Human(h) => {
                let (x, y) = h.run(target_x, target_y, ball_detected, ball_x, ball_y, joy_x, joy_y);
                ControlOutput {
                    first: x,
                    second: y,
                    third: 0,
                }
            }
            BalancerInterface::Pid(p) => {
                let (x, y) = p.run(target_x, target_y, ball_x, ball_y);
                ControlOutput {
                    first: x,
                    second: y,
                    third: 0,
                }
            }
            BalancerInterface::Nn(n) => {
                let (a, b, c) = n.run(target_x, target_y, ball_x, ball_y);
                ControlOutput {
                    first: a,
                    second: b,
                    third: c,
                }
            }
            #[cfg(feature = "fuzzy")]
            BalancerInterface::Fuzzy(f) => {
                let (x, y) = f.run(target_x, target_y, ball_x, ball_y);
                ControlOutput {
                    first: x,
                    second: y,
                    third: 0,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn off_mode_commands_nothing_and_has_no_led() {
        let mut off = BalancerInterface::Off;
        assert_eq!(off.led(), LedId::ModeOff);
        let out = off.run(0, 0, true, 0, 0, 0, 0);
        assert_eq!(out, ControlOutput::default());
    }

    #[test]
    fn reset_on_pid_clears_integrator() {
        let mut m = BalancerInterface::Pid(PidControllerPair::new());
        m.run(1000, 1000, true, 0, 0, 0, 0);
        m.reset();
        if let BalancerInterface::Pid(p) = &m {
            assert_eq!(p.x.error_sum(), 0);
        } else {
            unreachable!()
        }
    }
}
