//! Telemetry packet framing: one `0x03,<kind>,payload...,~0x03` frame per
//! dispatcher cycle, streamed out the console transport when `dvbalance`
//! (or the per-mode equivalent) is active.
//!
//! Grounded on `examples/original_source/src/balance/balance_pid.c`'s
//! data-visualizer frame (a sync byte, a mode tag, a run of little-endian
//! fields, and a checksum/terminator byte) and spec §6's extended-vs-basic
//! field layout. `packed_struct` (a teacher dependency, used the same way
//! `gnss_can.rs` uses it for wire structs) derives the little-endian byte
//! layout instead of hand-written `to_le_bytes` calls, since every field
//! here is already an integer (the float-unfriendliness the teacher's
//! comment warns about doesn't apply).

use num_enum::{IntoPrimitive, TryFromPrimitive};
use packed_struct::prelude::*;

/// Frame delimiter: the original's sync byte, repeated (bit-inverted) as the
/// terminator so a receiver can resync after a dropped byte.
pub const SYNC_BYTE: u8 = 0x03;

#[derive(Clone, Copy, PartialEq, Eq, Debug, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum FrameKind {
    Human = b'H',
    Pid = b'P',
    Nn = b'N',
    Fuzzy = b'F',
}

/// Basic fields every mode's frame carries: per spec §6, the target, the
/// detected ball position, the commanded tilt, and the three servo angles.
#[derive(PackedStruct, Clone, Copy, Debug, Default)]
#[packed_struct(endian = "lsb")]
pub struct BasicFields {
    pub ball_detected: i16,
    pub target_x: i16,
    pub target_y: i16,
    pub ball_x: i16,
    pub ball_y: i16,
    pub command_x: i16,
    pub command_y: i16,
    pub servo_a: i16,
    pub servo_b: i16,
    pub servo_c: i16,
}

/// Extended fields the closed-loop modes (PID, NN, fuzzy) additionally
/// carry: the error terms that produced `command_{x,y}`, ahead of the basic
/// fields in the frame (spec §6).
#[derive(PackedStruct, Clone, Copy, Debug, Default)]
#[packed_struct(endian = "lsb")]
pub struct ExtendedFields {
    pub error_x: i16,
    pub error_y: i16,
    pub error_sum_x: i32,
    pub error_sum_y: i32,
    pub error_delta_x: i16,
    pub error_delta_y: i16,
}

/// Byte length of a packed [`BasicFields`]: ten `i16` fields.
const BASIC_FIELDS_LEN: usize = 20;
/// Byte length of a packed [`ExtendedFields`]: four `i16` and two `i32` fields.
const EXTENDED_FIELDS_LEN: usize = 20;

/// Maximum encoded frame length: sync + kind + extended + basic +
/// terminator, enough for any `FrameKind`.
pub const MAX_FRAME_LEN: usize = 2 + EXTENDED_FIELDS_LEN + BASIC_FIELDS_LEN + 1;

/// Build a basic-only frame (human mode, which has no PID-shaped error
/// terms of its own) into `out`, returning the number of bytes written.
pub fn encode_basic(kind: FrameKind, fields: &BasicFields, out: &mut [u8; MAX_FRAME_LEN]) -> usize {
    let mut n = 0;
    out[n] = SYNC_BYTE;
    n += 1;
    out[n] = kind.into();
    n += 1;
    let bytes = fields.pack().expect("fixed-size struct always packs");
    out[n..n + bytes.len()].copy_from_slice(&bytes);
    n += bytes.len();
    out[n] = !SYNC_BYTE;
    n += 1;
    n
}

/// Build an extended frame (PID/NN/fuzzy, which prepend their error terms
/// ahead of the basic fields) into `out`, returning the number of bytes
/// written.
pub fn encode_extended(
    kind: FrameKind,
    extended: &ExtendedFields,
    basic: &BasicFields,
    out: &mut [u8; MAX_FRAME_LEN],
) -> usize {
    let mut n = 0;
    out[n] = SYNC_BYTE;
    n += 1;
    out[n] = kind.into();
    n += 1;
    let ext_bytes = extended.pack().expect("fixed-size struct always packs");
    out[n..n + ext_bytes.len()].copy_from_slice(&ext_bytes);
    n += ext_bytes.len();
    let basic_bytes = basic.pack().expect("fixed-size struct always packs");
    out[n..n + basic_bytes.len()].copy_from_slice(&basic_bytes);
    n += basic_bytes.len();
    out[n] = !SYNC_BYTE;
    n += 1;
    n
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_frame_starts_and_ends_with_sync_bytes() {
        let mut out = [0u8; MAX_FRAME_LEN];
        let n = encode_basic(FrameKind::Human, &BasicFields::default(), &mut out);
        assert_eq!(out[0], SYNC_BYTE);
        assert_eq!(out[n - 1], !SYNC_BYTE);
        assert_eq!(out[1], b'H');
    }

    #[test]
    fn extended_frame_places_error_terms_before_basic_fields() {
        let mut out = [0u8; MAX_FRAME_LEN];
        let extended = ExtendedFields {
            error_x: 0x1234,
            ..Default::default()
        };
        let n = encode_extended(FrameKind::Pid, &extended, &BasicFields::default(), &mut out);
        // Little-endian error_x immediately follows sync+kind.
        assert_eq!(out[2], 0x34);
        assert_eq!(out[3], 0x12);
        assert_eq!(out[n - 1], !SYNC_BYTE);
    }

    #[test]
    fn frame_kind_round_trips_through_wire_repr() {
        for kind in [FrameKind::Human, FrameKind::Pid, FrameKind::Nn, FrameKind::Fuzzy] {
            let byte: u8 = kind.into();
            assert_eq!(FrameKind::try_from(byte).unwrap(), kind);
        }
    }
}
