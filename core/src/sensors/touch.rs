//! Ball-position sensor: a resistive touch panel delivering a 5-byte frame
//! per sample, and the lock-free ping-pong buffer the frame parser publishes
//! into.
//!
//! Grounded on `examples/original_source/mlbb-sam_e51_cnano/src/ball/ar1100.c`
//! (byte-at-a-time UART read callback driving a small position state
//! machine) and spec §4.1/§6 for the exact byte layout, which differs from
//! the original's own frame length — the spec is authoritative here, not the
//! original source.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicUsize, Ordering};

/// One ball-position reading.
#[derive(Clone, Copy, Debug, Default, defmt::Format, PartialEq, Eq)]
pub struct BallSample {
    pub detected: bool,
    pub x: i16,
    pub y: i16,
}

/// Single-writer, multi-reader ping-pong buffer for [`BallSample`].
///
/// The touch-frame parser (running at interrupt or DMA-callback context) is
/// the only writer; the dispatcher task is the only reader. `active` names
/// which of the two slots currently holds a fully-validated sample; the
/// writer always writes into the *inactive* slot and only then flips
/// `active`, so a reader that loads `active` and then reads that slot never
/// observes a half-written sample, regardless of where a read is preempted.
///
/// # Safety
/// The `UnsafeCell` access in [`publish`](Self::publish) and
/// [`load`](Self::load) is sound only because exactly one producer ever
/// calls `publish` and the atomic `active` flip happens-after the slot
/// write (`Ordering::Release`) and happens-before any reader's load
/// (`Ordering::Acquire`). Adding a second writer breaks this invariant.
pub struct BallBuffer {
    slots: [UnsafeCell<BallSample>; 2],
    active: AtomicUsize,
}

// SAFETY: single-writer/multi-reader protocol documented above; the only
// shared mutable access is through the atomic-gated `UnsafeCell`s.
unsafe impl Sync for BallBuffer {}

impl BallBuffer {
    pub const fn new() -> Self {
        Self {
            slots: [
                UnsafeCell::new(BallSample {
                    detected: false,
                    x: 0,
                    y: 0,
                }),
                UnsafeCell::new(BallSample {
                    detected: false,
                    x: 0,
                    y: 0,
                }),
            ],
            active: AtomicUsize::new(0),
        }
    }

    /// Write a freshly-validated sample into the inactive slot and publish it.
    pub fn publish(&self, sample: BallSample) {
        let active = self.active.load(Ordering::Relaxed);
        let inactive = active ^ 1;
        // SAFETY: only the single writer reaches this method, and the
        // inactive slot is never concurrently read (readers only ever read
        // whichever slot `active` names).
        unsafe {
            *self.slots[inactive].get() = sample;
        }
        self.active.store(inactive, Ordering::Release);
    }

    /// Snapshot the most recently published sample.
    pub fn load(&self) -> BallSample {
        let active = self.active.load(Ordering::Acquire);
        // SAFETY: `active` names a slot that publish() has finished writing
        // to (Release/Acquire pairing above); readers only ever read it, so
        // no write-write or read-write race is possible on this slot.
        unsafe { *self.slots[active].get() }
    }
}

impl Default for BallBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Touch-frame parser state: hunting for the sync byte vs. collecting the
/// four payload bytes that follow it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ParseState {
    HuntSync,
    Collecting { index: usize },
}

/// Byte-at-a-time decoder for the 5-byte touch-panel frame described in
/// spec §4.1/§6: byte 0 has its MSB set, bytes 1-4 have it clear; any
/// violation resets to hunting for sync.
pub struct FrameParser {
    state: ParseState,
    buf: [u8; 5],
}

impl FrameParser {
    pub const fn new() -> Self {
        Self {
            state: ParseState::HuntSync,
            buf: [0; 5],
        }
    }

    /// Feed one received byte. Returns `Some(BallSample)` exactly when this
    /// byte completes a valid frame.
    pub fn feed(&mut self, byte: u8) -> Option<BallSample> {
        const MSB: u8 = 0x80;

        match self.state {
            ParseState::HuntSync => {
                if byte & MSB != 0 {
                    self.buf[0] = byte;
                    self.state = ParseState::Collecting { index: 1 };
                }
                None
            }
            ParseState::Collecting { index } => {
                if byte & MSB != 0 {
                    // A payload byte must have its MSB clear; treat this as
                    // a new sync byte and restart the frame.
                    self.buf[0] = byte;
                    self.state = ParseState::Collecting { index: 1 };
                    return None;
                }

                self.buf[index] = byte;
                if index == 4 {
                    self.state = ParseState::HuntSync;
                    Some(decode(&self.buf))
                } else {
                    self.state = ParseState::Collecting { index: index + 1 };
                    None
                }
            }
        }
    }
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

fn decode(buf: &[u8; 5]) -> BallSample {
    let detected = buf[0] & 0x01 != 0;
    let x = (((buf[2] & 0x1F) as i16) << 7) | (buf[1] & 0x7F) as i16;
    let y = (((buf[4] & 0x1F) as i16) << 7) | (buf[3] & 0x7F) as i16;
    BallSample { detected, x, y }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(parser: &mut FrameParser, bytes: &[u8]) -> Option<BallSample> {
        let mut last = None;
        for &b in bytes {
            last = parser.feed(b);
        }
        last
    }

    #[test]
    fn property6_valid_frame_decodes_exactly() {
        let mut parser = FrameParser::new();
        // detected=true, x = (0x05 << 7) | 0x10 = 0x290, y = (0x02 << 7) | 0x01 = 0x101
        let sample = feed_all(&mut parser, &[0x81, 0x10, 0x05, 0x01, 0x02]).unwrap();
        assert_eq!(
            sample,
            BallSample {
                detected: true,
                x: 0x290,
                y: 0x101,
            }
        );
    }

    #[test]
    fn property6_msb_violation_suppresses_publication() {
        let mut parser = FrameParser::new();
        // The byte at collection index 3 has its MSB set, violating the
        // MSB-clear rule for payload bytes; the parser must resync on it
        // rather than publish a frame built from mismatched bytes.
        assert_eq!(parser.feed(0x81), None);
        assert_eq!(parser.feed(0x10), None);
        assert_eq!(parser.feed(0x05), None);
        assert_eq!(parser.feed(0x81), None); // resync, not a completed frame
        assert_eq!(parser.feed(0x05), None);
        assert_eq!(parser.feed(0x01), None);
        assert_eq!(parser.feed(0x02), None);
        let sample = parser.feed(0x03).unwrap();
        assert_eq!(
            sample,
            BallSample {
                detected: true,
                x: 133,
                y: 386,
            }
        );
    }

    #[test]
    fn ping_pong_buffer_publishes_latest_sample() {
        let buf = BallBuffer::new();
        buf.publish(BallSample {
            detected: true,
            x: 10,
            y: 20,
        });
        assert_eq!(
            buf.load(),
            BallSample {
                detected: true,
                x: 10,
                y: 20
            }
        );
        buf.publish(BallSample {
            detected: false,
            x: -5,
            y: 0,
        });
        assert_eq!(
            buf.load(),
            BallSample {
                detected: false,
                x: -5,
                y: 0
            }
        );
    }
}
