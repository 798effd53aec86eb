//! Pure control-law, kinematics, sensor-decoding, and console logic for the
//! ball-on-plate balancer firmware, kept free of board/peripheral types so
//! it can be exercised with `cargo test` on the host. The hardware-bound
//! binary (`triplate-fw`) wires these types to real timers, GPIO, I2C, and
//! USART peripherals.
//!
//! `no_std` except under `cargo test`, where `std`'s test harness and a few
//! host-only test fixtures (`Vec`, `String`) are needed; this is the same
//! `cfg_attr(not(test), no_std)` split used throughout the embedded crates
//! in this codebase's own reference pack.
#![cfg_attr(not(test), no_std)]

pub mod actuator;
pub mod bus;
pub mod console;
pub mod controllers;
pub mod dispatcher;
pub mod kinematics;
pub mod led;
pub mod q;
pub mod sensors;
pub mod target;
pub mod telemetry;
