//! Optional fuzzy-logic controller: triangular membership fuzzification over
//! error and filtered error-delta, a fixed 5x5 rule table (MIN for rule
//! strength, weighted-average/center-of-gravity defuzzification), and three
//! runtime-tunable scaling factors.
//!
//! Grounded on `examples/original_source/src/balance/balance_fuzzy.c`: the
//! membership function breakpoints, the rule table, and the default scaling
//! factors are copied verbatim (the original's comments call them
//! "conservative... tuned to eliminate overshoot"; the spec has no recorded
//! baseline of its own, so these become this crate's defaults per its
//! Open-Question instruction to adopt them as tunables rather than invent new
//! ones). Enabled by the `fuzzy` feature, matching the optional fifth
//! dispatcher mode.

use crate::q::clamp_q15;

const SETS_COUNT: usize = 5;
const RULES_COUNT: usize = 25;

const ERROR_SCALE_DEFAULT: u16 = 1200;
const ERROR_DOT_SCALE_DEFAULT: u16 = 2500;
const OUTPUT_SCALE_DEFAULT: u16 = 170;

const HISTORY_DEPTH: usize = 5;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Set {
    NegativeLarge,
    NegativeSmall,
    Zero,
    PositiveSmall,
    PositiveLarge,
}

const ALL_SETS: [Set; SETS_COUNT] = [
    Set::NegativeLarge,
    Set::NegativeSmall,
    Set::Zero,
    Set::PositiveSmall,
    Set::PositiveLarge,
];

#[derive(Clone, Copy, Debug)]
struct Membership {
    left_peak: i32,
    center_peak: i32,
    right_peak: i32,
}

/// Triangular membership degree of `value`, in `[0, 32767]`.
fn membership_degree(value: i32, mf: &Membership) -> i32 {
    if value < mf.left_peak || value > mf.right_peak {
        return 0;
    }
    if value <= mf.center_peak {
        if mf.center_peak == mf.left_peak {
            0
        } else {
            (value - mf.left_peak) * 32767 / (mf.center_peak - mf.left_peak)
        }
    } else if mf.right_peak == mf.center_peak {
        0
    } else {
        (mf.right_peak - value) * 32767 / (mf.right_peak - mf.center_peak)
    }
}

const ERROR_MF: [Membership; SETS_COUNT] = [
    Membership { left_peak: -8192, center_peak: -4096, right_peak: 0 },
    Membership { left_peak: -3584, center_peak: -2048, right_peak: -512 },
    Membership { left_peak: -1024, center_peak: 0, right_peak: 1024 },
    Membership { left_peak: 512, center_peak: 2048, right_peak: 3584 },
    Membership { left_peak: 0, center_peak: 4096, right_peak: 8192 },
];

const ERROR_DOT_MF: [Membership; SETS_COUNT] = [
    Membership { left_peak: -4096, center_peak: -2048, right_peak: 0 },
    Membership { left_peak: -2048, center_peak: -1024, right_peak: 0 },
    Membership { left_peak: -128, center_peak: 0, right_peak: 128 },
    Membership { left_peak: 0, center_peak: 1024, right_peak: 2048 },
    Membership { left_peak: 0, center_peak: 2048, right_peak: 4096 },
];

const OUTPUT_MF: [Membership; SETS_COUNT] = [
    Membership { left_peak: -8192, center_peak: -4096, right_peak: 0 },
    Membership { left_peak: -4096, center_peak: -2048, right_peak: 0 },
    Membership { left_peak: -2048, center_peak: 0, right_peak: 2048 },
    Membership { left_peak: 0, center_peak: 2048, right_peak: 4096 },
    Membership { left_peak: 0, center_peak: 4096, right_peak: 8192 },
];

struct Rule {
    error_set: Set,
    error_dot_set: Set,
    output_set: Set,
}

/// IF error IS X AND error_dot IS Y THEN output IS Z, conservative rows
/// throughout (see the original's per-row comments).
const RULES: [Rule; RULES_COUNT] = [
    Rule { error_set: Set::NegativeLarge, error_dot_set: Set::NegativeLarge, output_set: Set::NegativeLarge },
    Rule { error_set: Set::NegativeLarge, error_dot_set: Set::NegativeSmall, output_set: Set::NegativeLarge },
    Rule { error_set: Set::NegativeLarge, error_dot_set: Set::Zero, output_set: Set::NegativeSmall },
    Rule { error_set: Set::NegativeLarge, error_dot_set: Set::PositiveSmall, output_set: Set::Zero },
    Rule { error_set: Set::NegativeLarge, error_dot_set: Set::PositiveLarge, output_set: Set::Zero },
    Rule { error_set: Set::NegativeSmall, error_dot_set: Set::NegativeLarge, output_set: Set::NegativeSmall },
    Rule { error_set: Set::NegativeSmall, error_dot_set: Set::NegativeSmall, output_set: Set::NegativeSmall },
    Rule { error_set: Set::NegativeSmall, error_dot_set: Set::Zero, output_set: Set::Zero },
    Rule { error_set: Set::NegativeSmall, error_dot_set: Set::PositiveSmall, output_set: Set::Zero },
    Rule { error_set: Set::NegativeSmall, error_dot_set: Set::PositiveLarge, output_set: Set::Zero },
    Rule { error_set: Set::Zero, error_dot_set: Set::NegativeLarge, output_set: Set::NegativeSmall },
    Rule { error_set: Set::Zero, error_dot_set: Set::NegativeSmall, output_set: Set::Zero },
    Rule { error_set: Set::Zero, error_dot_set: Set::Zero, output_set: Set::Zero },
    Rule { error_set: Set::Zero, error_dot_set: Set::PositiveSmall, output_set: Set::Zero },
    Rule { error_set: Set::Zero, error_dot_set: Set::PositiveLarge, output_set: Set::PositiveSmall },
    Rule { error_set: Set::PositiveSmall, error_dot_set: Set::NegativeLarge, output_set: Set::Zero },
    Rule { error_set: Set::PositiveSmall, error_dot_set: Set::NegativeSmall, output_set: Set::Zero },
    Rule { error_set: Set::PositiveSmall, error_dot_set: Set::Zero, output_set: Set::PositiveSmall },
    Rule { error_set: Set::PositiveSmall, error_dot_set: Set::PositiveSmall, output_set: Set::PositiveSmall },
    Rule { error_set: Set::PositiveSmall, error_dot_set: Set::PositiveLarge, output_set: Set::PositiveSmall },
    Rule { error_set: Set::PositiveLarge, error_dot_set: Set::NegativeLarge, output_set: Set::Zero },
    Rule { error_set: Set::PositiveLarge, error_dot_set: Set::NegativeSmall, output_set: Set::Zero },
    Rule { error_set: Set::PositiveLarge, error_dot_set: Set::Zero, output_set: Set::PositiveSmall },
    Rule { error_set: Set::PositiveLarge, error_dot_set: Set::PositiveSmall, output_set: Set::PositiveLarge },
    Rule { error_set: Set::PositiveLarge, error_dot_set: Set::PositiveLarge, output_set: Set::PositiveLarge },
];

fn mf_for(set: Set, table: &[Membership; SETS_COUNT]) -> &Membership {
    &table[set as usize]
}

impl Set {
    const fn index(self) -> usize {
        match self {
            Set::NegativeLarge => 0,
            Set::NegativeSmall => 1,
            Set::Zero => 2,
            Set::PositiveSmall => 3,
            Set::PositiveLarge => 4,
        }
    }
}

impl core::ops::Index<Set> for [i32; SETS_COUNT] {
    type Output = i32;
    fn index(&self, set: Set) -> &i32 {
        &self[set.index()]
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FuzzyScaling {
    pub error_scale: u16,
    pub error_dot_scale: u16,
    pub output_scale: u16,
}

impl Default for FuzzyScaling {
    fn default() -> Self {
        Self {
            error_scale: ERROR_SCALE_DEFAULT,
            error_dot_scale: ERROR_DOT_SCALE_DEFAULT,
            output_scale: OUTPUT_SCALE_DEFAULT,
        }
    }
}

/// One axis's running fuzzy-controller state.
pub struct FuzzyAxis {
    pub scaling: FuzzyScaling,
    prev_error: i32,
    error_history: [i32; HISTORY_DEPTH],
    error_history_index: usize,
}

impl FuzzyAxis {
    pub fn new() -> Self {
        Self {
            scaling: FuzzyScaling::default(),
            prev_error: 0,
            error_history: [0; HISTORY_DEPTH],
            error_history_index: 0,
        }
    }

    pub fn reset(&mut self) {
        self.prev_error = 0;
        self.error_history = [0; HISTORY_DEPTH];
        self.error_history_index = 0;
    }

    /// Run one step: `target`/`actual` in q15, returns the scaled,
    /// defuzzified, clamped command.
    pub fn run(&mut self, target: i16, actual: i16) -> i16 {
        let raw_error = target as i32 - actual as i32;
        let error = (raw_error * self.scaling.error_scale as i32) / 256;

        let delta = error - self.prev_error;
        self.error_history[self.error_history_index] = delta;
        self.error_history_index = (self.error_history_index + 1) % HISTORY_DEPTH;

        let sum: i32 = self.error_history.iter().sum();
        let filtered_delta = sum / HISTORY_DEPTH as i32;
        let error_dot = (filtered_delta * self.scaling.error_dot_scale as i32) / 256;

        let mut error_memberships = [0i32; SETS_COUNT];
        let mut error_dot_memberships = [0i32; SETS_COUNT];
        for &set in &ALL_SETS {
            error_memberships[set] = membership_degree(error, mf_for(set, &ERROR_MF));
            error_dot_memberships[set] = membership_degree(error_dot, mf_for(set, &ERROR_DOT_MF));
        }

        let mut numerator: i64 = 0;
        let mut denominator: i64 = 0;
        for rule in &RULES {
            let strength = error_memberships[rule.error_set].min(error_dot_memberships[rule.error_dot_set]);
            let rule_output = mf_for(rule.output_set, &OUTPUT_MF).center_peak;
            numerator += strength as i64 * rule_output as i64;
            denominator += strength as i64;
        }
        let defuzzified = if denominator == 0 { 0 } else { (numerator / denominator) as i32 };

        let scaled = (defuzzified * self.scaling.output_scale as i32) / 256;
        let command = scaled.clamp(-16384, 16383);

        self.prev_error = error;
        clamp_q15(command)
    }
}

impl Default for FuzzyAxis {
    fn default() -> Self {
        Self::new()
    }
}

/// The X/Y fuzzy controller pair.
pub struct FuzzyState {
    pub x: FuzzyAxis,
    pub y: FuzzyAxis,
}

impl FuzzyState {
    pub fn new() -> Self {
        Self {
            x: FuzzyAxis::new(),
            y: FuzzyAxis::new(),
        }
    }

    pub fn reset(&mut self) {
        self.x.reset();
        self.y.reset();
    }

    /// Run one step on both axes; callers park the command at `(0, 0)` and
    /// reset when the ball isn't detected (mirrors the PID/human/NN modes).
    pub fn run(&mut self, target_x: i16, target_y: i16, actual_x: i16, actual_y: i16) -> (i16, i16) {
        let cx = self.x.run(target_x, actual_x);
        let cy = self.y.run(target_y, actual_y);
        (cx, cy)
    }
}

impl Default for FuzzyState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_error_produces_zero_membership_tie_and_zero_command() {
        let mut fuzzy = FuzzyAxis::new();
        let command = fuzzy.run(0, 0);
        assert_eq!(command, 0);
    }

    #[test]
    fn large_positive_error_drives_a_positive_command() {
        let mut fuzzy = FuzzyAxis::new();
        let command = fuzzy.run(8000, 0);
        assert!(command > 0, "expected a positive command, got {command}");
    }

    #[test]
    fn large_negative_error_drives_a_negative_command() {
        let mut fuzzy = FuzzyAxis::new();
        let command = fuzzy.run(-8000, 0);
        assert!(command < 0, "expected a negative command, got {command}");
    }

    #[test]
    fn membership_degree_peaks_at_one_full_scale_on_center() {
        let mf = Membership { left_peak: -1024, center_peak: 0, right_peak: 1024 };
        assert_eq!(membership_degree(0, &mf), 32767);
        assert_eq!(membership_degree(-2048, &mf), 0);
        assert_eq!(membership_degree(2048, &mf), 0);
    }

    #[test]
    fn reset_clears_history_and_previous_error() {
        let mut fuzzy = FuzzyAxis::new();
        fuzzy.run(4000, 0);
        fuzzy.reset();
        assert_eq!(fuzzy.prev_error, 0);
        assert_eq!(fuzzy.error_history, [0; HISTORY_DEPTH]);
    }

    #[test]
    fn scaling_defaults_match_the_conservative_baseline() {
        let scaling = FuzzyScaling::default();
        assert_eq!(scaling.error_scale, 1200);
        assert_eq!(scaling.error_dot_scale, 2500);
        assert_eq!(scaling.output_scale, 170);
    }
}
