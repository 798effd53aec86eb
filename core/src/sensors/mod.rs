//! Sensor producers: the resistive touch panel (ball position) and the
//! 2-axis/2-button joystick. Both publish into lock-protected or lock-free
//! single-writer structures so the balancer dispatcher can snapshot them
//! once per iteration without racing the ISR/task that fills them (spec
//! §4.1's ordering guarantee).

pub mod joystick;
pub mod touch;

pub use joystick::JoystickSample;
pub use touch::BallSample;
