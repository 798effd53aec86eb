//! Line-oriented command console: a circular input buffer holding
//! separator-delimited command history, a small state machine driving
//! character echo/backspace/escape-sequence handling, and a fixed command
//! registration table.
//!
//! Grounded on `examples/original_source/src/command/command.c`/`command.h`
//! (Microchip's `CMD_*` command processor): the circular buffer macros
//! (`INCREMENT_CMD_BUFFER_INDEX`/`DECREMENT_CMD_BUFFER_INDEX`), the
//! `CMD_SEPARATOR_CHAR` (`0x1F`) convention for delimiting completed
//! commands in the same buffer history is stored in, the
//! `SearchPreviousCommand`/`SearchNextCommand` separator-counting walk, and
//! the `Init -> Prompt -> WaitRx -> RxChar -> {RxCharEcho, CommandClear,
//! CommandLoad} -> Execute -> CommandReset` state sequence are all carried
//! over verbatim in shape; `CMD_PrintString`/`CMD_PrintByteArray`/
//! `CMD_PrintHex_*`/`CMD_PrintDecimal_*`/`CMD_PrintFixedPoint_*` become
//! inherent methods on [`Console`] taking the same `block: bool` semantics.

use heapless::Vec;

/// Capacity of the circular command-history buffer. Unlike the original's
/// `CMD_BUFFER_SIZE` (a `#define` sized per board), this is fixed: the
/// balancer's command surface is small and bounded.
pub const BUFFER_SIZE: usize = 64;
/// Maximum arguments a single command line may carry (including the command
/// token itself), mirroring `CMD_GetArgc`'s `argv_index == 0` convention.
pub const MAX_ARGS: usize = 8;
/// Maximum registered commands, mirroring `CMD_COMMAND_LIST_SIZE`.
pub const MAX_COMMANDS: usize = 32;

const SEPARATOR_CHAR: u8 = 0x1F;
const BACKSPACE_CHAR: u8 = 0x08;
const LINEFEED_CHAR: u8 = 0x0A;
const CARRIAGE_RETURN_CHAR: u8 = 0x0D;
const ESCAPE_CHAR: u8 = 0x1B;
const SPACE_CHAR: u8 = 0x20;
/// The token delimiter actually stored in the buffer: a typed space is
/// echoed as itself but written into the buffer as this byte, mirroring the
/// original's `RxCharEcho` in-buffer substitution.
const NUL_CHAR: u8 = 0x00;

const CSI_CHAR2: u8 = b'[';
const CSI_CURSOR_UP: u8 = b'A';
const CSI_CURSOR_DOWN: u8 = b'B';

/// Output sink the console writes to; implemented over the USB-CDC serial
/// port in the real app, and over an in-memory buffer in tests. `block`
/// mirrors `CMD_PrintString`'s semantics: `true` spins until every byte is
/// queued, `false` returns early (dropping trailing bytes) the moment the
/// sink reports it's full — the console never actually blocks on hardware
/// since [`Console::write`] degrades to best-effort when `block` is false.
pub trait ConsoleWriter {
    /// Write as many of `bytes` as will fit; returns the number written.
    fn write(&mut self, bytes: &[u8]) -> usize;
}

/// A registered command: its name (matched with [`Console::buffer_matches`])
/// and an opaque numeric id the dispatcher maps back onto a handler. Unlike
/// the original's function-pointer table, commands here are data the
/// dispatcher inspects, since RTIC tasks cannot hold trait-object closures
/// without an allocator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandEntry {
    pub name: &'static str,
    pub id: u16,
}

/// Outcome of one [`Console::poll`] call the dispatcher must act on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing to execute this poll.
    Idle,
    /// A complete command line is ready; the dispatcher looks it up by name
    /// via [`Console::command_name`]/[`Console::arg_count`]/[`Console::arg`]
    /// and runs the matching handler, then calls [`Console::command_done`].
    Execute,
}

/// The command console: circular history buffer, line editor, and the
/// registered-command table.
pub struct Console {
    buffer: [u8; BUFFER_SIZE],
    end: u8,
    full_at: u8,
    history_index: u8,
    /// Start offset of the committed command currently displayed in the
    /// live line, when history navigation is in progress; `None` when the
    /// live line holds fresh (non-recalled) input. Grounded on the
    /// original's `s_cmd_history_index` doubling as both the live-line
    /// anchor and the in-progress navigation cursor; kept as a separate
    /// field here since `history_index` also anchors argument parsing for
    /// the just-committed line.
    nav_offset: Option<u8>,
    in_escape: bool,
    commands: Vec<CommandEntry, MAX_COMMANDS>,
    streaming: Option<StreamState>,
    /// The last command executed that is eligible for `stream` to repeat;
    /// `None` after `?`/`lock`/`unlock` run (mirroring `s_previous_command`
    /// being nulled for those in `Handler_Execute`), preserved across a
    /// `stream` invocation itself.
    last_executed: Option<CommandEntry>,
    /// Password gate, mirroring `CMD_STATE_LOCKED`/`CMD_ENABLE_PASSWORD`.
    /// `lock` sets this; `unlock`, typed while locked, clears it. Unlike the
    /// original (which starts locked), this starts unlocked — no password is
    /// provisioned by default, so starting locked would strand the operator
    /// with no way in. `lock`/`unlock` are opt-in, not a default gate.
    locked: bool,
    /// How many bytes of the literal `unlock` have matched so far while
    /// locked, mirroring `Handler_Locked`'s `s_cmd_end_index` reuse as a
    /// match counter.
    unlock_match: u8,
}

/// Repeat-previous-command state for the `stream` built-in (spec §4.9/§6):
/// a period in milliseconds and how much has elapsed since the last replay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct StreamState {
    period_ms: u16,
    elapsed_ms: u16,
}

const UNLOCK_STRING: &[u8] = b"unlock";

fn inc(index: u8) -> u8 {
    let next = index + 1;
    if next as usize >= BUFFER_SIZE {
        0
    } else {
        next
    }
}

fn dec(index: u8) -> u8 {
    if index > 0 {
        index - 1
    } else {
        (BUFFER_SIZE - 1) as u8
    }
}

impl Console {
    pub fn new() -> Self {
        let mut buffer = [0u8; BUFFER_SIZE];
        // Seed a sentinel separator at the wrap-around slot, mirroring
        // `Handler_Init`'s buffer fill: it supplies the "2nd separator"
        // `search_previous_command` needs to bound the very first command
        // ever committed, before any real separator has been written.
        buffer[BUFFER_SIZE - 1] = SEPARATOR_CHAR;
        Self {
            buffer,
            end: 0,
            full_at: (BUFFER_SIZE - 1) as u8,
            history_index: 0,
            nav_offset: None,
            in_escape: false,
            commands: Vec::new(),
            streaming: None,
            last_executed: None,
            locked: false,
            unlock_match: 0,
        }
    }

    fn not_full(&self) -> bool {
        self.end != self.full_at
    }

    /// Register a command; mirrors `CMD_RegisterCommand`. Returns `false`
    /// if the table is full (same failure mode as the original).
    pub fn register(&mut self, name: &'static str, id: u16) -> bool {
        self.commands.push(CommandEntry { name, id }).is_ok()
    }

    /// Walk backward from `start_index`, counting separator bytes, to find
    /// the start of the previous complete command. Grounded on
    /// `SearchPreviousCommand`: two separators bound one complete command
    /// (one at its end, one at its start); search stops early if it would
    /// walk past `stop_index` (the live line's own write cursor, so the
    /// search never reads into whatever is currently being typed).
    fn search_previous_command(&self, start_index: u8, stop_index: u8) -> u8 {
        let mut separator_count = 0u8;
        let mut search_index = start_index;
        let stop_index = inc(stop_index);

        while separator_count < 2 && search_index != stop_index {
            search_index = dec(search_index);
            if self.buffer[search_index as usize] == SEPARATOR_CHAR {
                separator_count += 1;
            }
        }

        if separator_count >= 2 {
            inc(search_index)
        } else {
            start_index
        }
    }

    /// Walk forward from the active command's current history cursor,
    /// counting separator bytes, to find the start of the next complete
    /// command. Grounded on `SearchNextCommand`.
    fn search_next_command(&self, start_index: u8, stop_index: u8) -> u8 {
        let mut separator_count = 0u8;
        let mut search_index = start_index;
        let mut next_command_index = start_index;

        while separator_count < 2 && search_index != stop_index {
            search_index = inc(search_index);
            if self.buffer[search_index as usize] == SEPARATOR_CHAR {
                separator_count += 1;
                if separator_count == 1 {
                    next_command_index = inc(search_index);
                }
            }
        }

        if separator_count < 2 {
            start_index
        } else {
            next_command_index
        }
    }

    /// Does the buffer, read from `start`, match `command` exactly (up to
    /// its nul terminator)? Grounded on `CheckCommandMatch`.
    fn buffer_matches(&self, command: &str, mut index: u8) -> bool {
        for expected in command.bytes() {
            if self.buffer[index as usize] != expected {
                return false;
            }
            index = inc(index);
        }
        // The command token in the buffer must end exactly here: either the
        // buffer's live end, or a separator/token-delimiter.
        index == self.end
            || self.buffer[index as usize] == SEPARATOR_CHAR
            || self.buffer[index as usize] == NUL_CHAR
    }

    /// Look up a registered command name against the live (just-completed)
    /// command line starting at `start`.
    fn lookup(&self, start: u8) -> Option<CommandEntry> {
        self.commands.iter().find(|c| self.buffer_matches(c.name, start)).copied()
    }

    /// Feed one received byte through the line editor. Returns the console's
    /// next action, if any, and writes any echo/prompt bytes to `out`.
    pub fn feed_byte(&mut self, byte: u8, out: &mut impl ConsoleWriter) -> PollOutcome {
        // While locked, bytes are matched silently (no echo) against the
        // literal `unlock` string and nothing else reaches the line editor,
        // mirroring `Handler_Locked`.
        if self.locked {
            self.feed_byte_locked(byte);
            return PollOutcome::Idle;
        }

        // Escape-sequence detection runs ahead of the line editor so arrow
        // keys never get echoed or inserted into the buffer as literal bytes.
        if self.in_escape {
            self.in_escape = false;
            if byte == CSI_CHAR2 {
                return PollOutcome::Idle;
            }
            return self.dispatch_escape(byte, out);
        }
        if byte == ESCAPE_CHAR {
            self.in_escape = true;
            self.stop_streaming();
            return PollOutcome::Idle;
        }

        match byte {
            CARRIAGE_RETURN_CHAR | LINEFEED_CHAR => self.commit_line(out),
            BACKSPACE_CHAR => self.backspace(out),
            _ => self.insert(byte, out),
        }
    }

    /// Mirrors `Handler_Locked`: matches `byte` against the next expected
    /// character of `unlock`, resetting the counter on any mismatch, and
    /// clears [`Self::locked`] once the whole literal has been typed.
    fn feed_byte_locked(&mut self, byte: u8) {
        if byte == UNLOCK_STRING[self.unlock_match as usize] {
            self.unlock_match += 1;
            if self.unlock_match as usize >= UNLOCK_STRING.len() {
                self.unlock_match = 0;
                self.locked = false;
            }
        } else {
            self.unlock_match = 0;
        }
    }

    /// Is the console currently password-locked (`lock` was run and
    /// `unlock` has not yet been fully typed)?
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// `lock` built-in: engage the password gate, mirroring
    /// `LockCommandProcessor`.
    pub fn lock(&mut self) {
        self.locked = true;
        self.unlock_match = 0;
    }

    fn dispatch_escape(&mut self, code: u8, out: &mut impl ConsoleWriter) -> PollOutcome {
        match code {
            CSI_CURSOR_UP => self.history_previous(out),
            CSI_CURSOR_DOWN => self.history_next(out),
            _ => {}
        }
        PollOutcome::Idle
    }

    fn insert(&mut self, byte: u8, out: &mut impl ConsoleWriter) -> PollOutcome {
        if self.not_full() {
            // A typed space is echoed as itself but stored as the token
            // delimiter (spec's RxCharEcho in-buffer substitution).
            let stored = if byte == SPACE_CHAR { NUL_CHAR } else { byte };
            self.buffer[self.end as usize] = stored;
            self.end = inc(self.end);
            // Abandon any in-progress history recall: the live line has
            // diverged from whatever command was last loaded into it.
            self.nav_offset = None;
            out.write(&[byte]);
        } else {
            out.write(b"\x07"); // bell: buffer full
        }
        PollOutcome::Idle
    }

    fn backspace(&mut self, out: &mut impl ConsoleWriter) -> PollOutcome {
        if self.end != self.history_index {
            self.end = dec(self.end);
            self.nav_offset = None;
            out.write(b"\x08 \x08");
        } else {
            out.write(b"\x07"); // bell: nothing to erase
        }
        PollOutcome::Idle
    }

    /// A full line was committed (CR or LF). Append the separator byte that
    /// terminates it in history, mirroring the original's `CommandReset`
    /// always writing one trailing separator regardless of how the line
    /// ended.
    fn commit_line(&mut self, out: &mut impl ConsoleWriter) -> PollOutcome {
        out.write(b"\r\n");
        if self.end == self.history_index {
            // Blank line: nothing to execute, just re-prompt.
            return PollOutcome::Idle;
        }
        if self.not_full() {
            // Capture the boundary before advancing: `end` must never wrap
            // all the way back around to land exactly here, which is what
            // `not_full` checks on the next insert.
            self.full_at = self.end;
            self.buffer[self.end as usize] = SEPARATOR_CHAR;
            self.end = inc(self.end);
        }
        PollOutcome::Execute
    }

    /// Walk backward through history, replacing the live (uncommitted) line
    /// with the command before whichever one is currently displayed (or
    /// before the live line, if none is). Grounded on
    /// `Handler_CommandClear`/`Handler_CommandLoad`, with `s_cmd_history_index`
    /// doubling as the nav cursor there replaced by [`Self::nav_offset`]
    /// here, since this crate's `history_index` also anchors argument
    /// parsing of the just-committed line and must stay fixed.
    fn history_previous(&mut self, out: &mut impl ConsoleWriter) {
        let search_from = self.nav_offset.unwrap_or(self.history_index);
        let candidate = self.search_previous_command(search_from, self.end);
        if candidate == search_from {
            return; // no earlier command to load
        }
        self.nav_offset = Some(candidate);
        self.clear_live_line(out);
        self.load_command(candidate, out);
    }

    /// Walk forward through history toward the live line; at the most
    /// recent command, clears back to the original (possibly empty) live
    /// line rather than no-opping, so repeated "previous" then "next"
    /// presses are involutive (spec property 8). Grounded on
    /// `SearchNextCommand` consumers in `Handler_CommandLoad`.
    fn history_next(&mut self, out: &mut impl ConsoleWriter) {
        let Some(current) = self.nav_offset else {
            return; // not navigating; nothing to step forward from
        };
        let candidate = self.search_next_command(current, self.history_index);
        self.clear_live_line(out);
        if candidate == current {
            self.nav_offset = None;
        } else {
            self.nav_offset = Some(candidate);
            self.load_command(candidate, out);
        }
    }

    fn clear_live_line(&mut self, out: &mut impl ConsoleWriter) {
        while self.end != self.history_index {
            self.end = dec(self.end);
            out.write(b"\x08 \x08");
        }
    }

    fn load_command(&mut self, mut source: u8, out: &mut impl ConsoleWriter) {
        while self.buffer[source as usize] != SEPARATOR_CHAR && source != self.end {
            let byte = self.buffer[source as usize];
            if self.not_full() {
                self.buffer[self.end as usize] = byte;
                self.end = inc(self.end);
                out.write(&[byte]);
            }
            source = inc(source);
        }
    }

    /// Called once the dispatcher has looked up and run (or failed to find)
    /// the just-committed command. Advances the live-line anchor past it and
    /// returns to `WaitRx`; history is never actively evicted, only
    /// eventually overwritten as `end` wraps around the ring.
    pub fn command_done(&mut self) {
        self.history_index = self.end;
        self.nav_offset = None;
    }

    /// Look up and return the command entry for the just-committed line, if
    /// one of the registered commands matches its leading token.
    pub fn lookup_committed(&self) -> Option<CommandEntry> {
        // The just-committed command starts at history_index (the start of
        // the live line before this commit) per command-processor convention.
        self.lookup(self.history_index)
    }

    /// Argument count of the just-committed line (including the command
    /// token itself), mirroring `CMD_GetArgc`.
    pub fn arg_count(&self) -> u8 {
        let mut count = 0u8;
        let mut index = self.history_index;
        let mut in_token = false;
        while index != self.end && self.buffer[index as usize] != SEPARATOR_CHAR {
            let byte = self.buffer[index as usize];
            if byte == NUL_CHAR {
                in_token = false;
            } else if !in_token {
                in_token = true;
                count += 1;
            }
            index = inc(index);
        }
        count
    }

    /// Copy argument `argv_index` of the just-committed line into `buf`,
    /// returning the copied length. `argv_index == 0` is the command token
    /// itself, mirroring `CMD_GetArgv`.
    pub fn arg(&self, argv_index: u8, buf: &mut [u8]) -> usize {
        let mut index = self.history_index;
        let mut token = 0u8;
        let mut in_token = false;
        let mut written = 0usize;

        while index != self.end && self.buffer[index as usize] != SEPARATOR_CHAR {
            let byte = self.buffer[index as usize];
            if byte == NUL_CHAR {
                if in_token {
                    token += 1;
                }
                in_token = false;
            } else {
                if !in_token {
                    in_token = true;
                }
                if token == argv_index && written < buf.len() {
                    buf[written] = byte;
                    written += 1;
                }
            }
            index = inc(index);
        }
        written
    }

    /// Has an escape sequence started but not yet resolved? Mirrors
    /// `CMD_CheckEscape`, used by `stream` to notice the operator wants out.
    pub fn check_escape(&self) -> bool {
        self.in_escape
    }

    /// `stream` built-in: start repeating [`Self::last_executed`] every
    /// `period_ms`, mirroring `EnableStream`'s period-from-argument parsing.
    /// A `period_ms` of 0 is accepted (matches the original, which puts no
    /// floor on the parsed value) and simply fires every poll.
    pub fn start_streaming(&mut self, period_ms: u16) {
        self.streaming = Some(StreamState { period_ms, elapsed_ms: 0 });
    }

    /// Cancel streaming, mirroring the original's `CMD_CheckEscape`-gated
    /// exit from `CMD_STATE_STREAM` back to the normal state.
    pub fn stop_streaming(&mut self) {
        self.streaming = None;
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.is_some()
    }

    /// Advance the stream timer by `elapsed_ms` (the caller's poll period);
    /// returns `Some(entry)` exactly on the poll where the period elapses
    /// and a repeat is due, resetting the timer for the next one.
    pub fn tick_stream(&mut self, elapsed_ms: u16) -> Option<CommandEntry> {
        let state = self.streaming.as_mut()?;
        state.elapsed_ms = state.elapsed_ms.saturating_add(elapsed_ms);
        if state.elapsed_ms >= state.period_ms {
            state.elapsed_ms = 0;
            self.last_executed
        } else {
            None
        }
    }

    /// Record the command just run as eligible for `stream` to repeat, or
    /// clear it (passing `None`) for built-ins that must not be streamable
    /// (`?`/`lock`/`unlock`), mirroring `s_previous_command` being nulled in
    /// `Handler_Execute` for everything except a `stream` invocation itself.
    pub fn set_last_executed(&mut self, entry: Option<CommandEntry>) {
        self.last_executed = entry;
    }

    pub fn last_executed(&self) -> Option<CommandEntry> {
        self.last_executed
    }

    // -- print helpers, mirroring CMD_PrintString/CMD_PrintByteArray/
    // CMD_PrintHex_*/CMD_PrintDecimal_*/CMD_PrintFixedPoint_*. `block`
    // is accepted for call-site parity with the original API but is a
    // no-op here: `ConsoleWriter::write` is always best-effort.

    pub fn print_string(&self, s: &str, _block: bool, out: &mut impl ConsoleWriter) {
        if self.locked {
            return;
        }
        out.write(s.as_bytes());
    }

    pub fn print_byte_array(&self, bytes: &[u8], _block: bool, out: &mut impl ConsoleWriter) {
        if self.locked {
            return;
        }
        out.write(bytes);
    }

    fn print_hex(&self, value: u32, digits: u8, out: &mut impl ConsoleWriter) {
        const HEX: &[u8; 16] = b"0123456789ABCDEF";
        let mut buf = [0u8; 8];
        for i in 0..digits {
            let shift = (digits - 1 - i) * 4;
            buf[i as usize] = HEX[((value >> shift) & 0xF) as usize];
        }
        out.write(&buf[..digits as usize]);
    }

    pub fn print_hex_u8(&self, value: u8, out: &mut impl ConsoleWriter) {
        if self.locked {
            return;
        }
        self.print_hex(value as u32, 2, out);
    }

    pub fn print_hex_u16(&self, value: u16, out: &mut impl ConsoleWriter) {
        if self.locked {
            return;
        }
        self.print_hex(value as u32, 4, out);
    }

    pub fn print_hex_u32(&self, value: u32, out: &mut impl ConsoleWriter) {
        if self.locked {
            return;
        }
        self.print_hex(value, 8, out);
    }

    /// Prints `value` as decimal, zero-padded (or space-padded if
    /// `!zero_blank`) to `width` digits, mirroring `CMD_PrintDecimal_U32`.
    pub fn print_decimal_u32(&self, value: u32, zero_blank: bool, width: u8, out: &mut impl ConsoleWriter) {
        if self.locked {
            return;
        }
        let mut digits = [0u8; 10];
        let mut v = value;
        let mut n = 0usize;
        loop {
            digits[n] = b'0' + (v % 10) as u8;
            v /= 10;
            n += 1;
            if v == 0 {
                break;
            }
        }
        let pad_char = if zero_blank { b' ' } else { b'0' };
        let mut line = [pad_char; 10];
        let width = (width as usize).max(n).min(10);
        for i in 0..n {
            line[width - 1 - i] = digits[i];
        }
        out.write(&line[..width]);
    }

    /// Prints `value` (in `fractional_bits`-wide q-format) as a decimal with
    /// `precision` digits after the point, mirroring
    /// `CMD_PrintFixedPoint_U32`.
    pub fn print_fixed_point_u32(
        &self,
        value: u32,
        fractional_bits: u8,
        precision: u8,
        out: &mut impl ConsoleWriter,
    ) {
        if self.locked {
            return;
        }
        let scale = 1u64 << fractional_bits;
        let whole = (value as u64) / scale;
        let frac_num = (value as u64) % scale;

        let mut pow10 = 1u64;
        for _ in 0..precision {
            pow10 *= 10;
        }
        let frac_scaled = (frac_num * pow10) / scale;

        self.print_decimal_u32(whole as u32, true, 1, out);
        out.write(b".");
        self.print_decimal_u32(frac_scaled as u32, false, precision, out);
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct RecordingWriter {
        out: Vec<u8, 512>,
    }

    impl RecordingWriter {
        fn new() -> Self {
            Self { out: Vec::new() }
        }
        fn as_str(&self) -> &str {
            core::str::from_utf8(&self.out).unwrap()
        }
    }

    impl ConsoleWriter for RecordingWriter {
        fn write(&mut self, bytes: &[u8]) -> usize {
            let mut n = 0;
            for &b in bytes {
                if self.out.push(b).is_err() {
                    break;
                }
                n += 1;
            }
            n
        }
    }

    fn type_line(console: &mut Console, line: &str, out: &mut RecordingWriter) {
        for b in line.bytes() {
            console.feed_byte(b, out);
        }
        console.feed_byte(CARRIAGE_RETURN_CHAR, out);
    }

    #[test]
    fn a_complete_line_is_recognized_and_looked_up() {
        let mut console = Console::new();
        console.register("pid", 1);
        let mut out = RecordingWriter::new();
        let outcome = {
            for b in b"pid".iter() {
                console.feed_byte(*b, &mut out);
            }
            console.feed_byte(CARRIAGE_RETURN_CHAR, &mut out)
        };
        assert_eq!(outcome, PollOutcome::Execute);
        assert_eq!(console.lookup_committed(), Some(CommandEntry { name: "pid", id: 1 }));
        assert_eq!(console.arg_count(), 1);
    }

    #[test]
    fn args_split_on_spaces_and_arg0_is_the_command() {
        let mut console = Console::new();
        console.register("kp", 2);
        let mut out = RecordingWriter::new();
        type_line(&mut console, "kp 600", &mut out);
        assert_eq!(console.arg_count(), 2);
        let mut buf = [0u8; 16];
        let n = console.arg(0, &mut buf);
        assert_eq!(&buf[..n], b"kp");
        let n = console.arg(1, &mut buf);
        assert_eq!(&buf[..n], b"600");
    }

    #[test]
    fn unknown_command_does_not_match_any_registered_entry() {
        let mut console = Console::new();
        console.register("pid", 1);
        let mut out = RecordingWriter::new();
        type_line(&mut console, "bogus", &mut out);
        assert_eq!(console.lookup_committed(), None);
    }

    #[test]
    fn backspace_erases_the_last_character_only() {
        let mut console = Console::new();
        let mut out = RecordingWriter::new();
        for b in b"ab".iter() {
            console.feed_byte(*b, &mut out);
        }
        console.feed_byte(BACKSPACE_CHAR, &mut out);
        console.feed_byte(b'c', &mut out);
        console.feed_byte(CARRIAGE_RETURN_CHAR, &mut out);
        let mut buf = [0u8; 8];
        let n = console.arg(0, &mut buf);
        assert_eq!(&buf[..n], b"ac");
    }

    #[test]
    fn history_previous_reloads_the_last_committed_command() {
        let mut console = Console::new();
        console.register("touch", 3);
        let mut out = RecordingWriter::new();
        type_line(&mut console, "touch", &mut out);
        console.command_done();

        // ESC [ A = cursor up -> previous command.
        console.feed_byte(ESCAPE_CHAR, &mut out);
        console.feed_byte(CSI_CHAR2, &mut out);
        console.feed_byte(CSI_CURSOR_UP, &mut out);

        let mut buf = [0u8; 8];
        let n = console.arg(0, &mut buf);
        assert_eq!(&buf[..n], b"touch");
    }

    #[test]
    fn property7_committed_commands_are_separated_by_exactly_one_separator() {
        let mut console = Console::new();
        let mut out = RecordingWriter::new();
        type_line(&mut console, "aa", &mut out);
        console.command_done();
        type_line(&mut console, "bb", &mut out);
        console.command_done();
        type_line(&mut console, "cc", &mut out);
        console.command_done();

        let mut separator_run = 0u8;
        let mut index = 0u8;
        while index != console.end {
            if console.buffer[index as usize] == SEPARATOR_CHAR {
                separator_run += 1;
                assert!(separator_run <= 1, "two adjacent separators found");
            } else {
                separator_run = 0;
            }
            index = inc(index);
        }
    }

    #[test]
    fn property8_history_navigation_is_involutive() {
        for n in 1..=3 {
            let mut console = Console::new();
            let mut out = RecordingWriter::new();
            for name in ["pid", "human", "touch"] {
                type_line(&mut console, name, &mut out);
                console.command_done();
            }
            let mut buf = [0u8; 8];
            let before_len = console.arg(0, &mut buf);
            let before = buf;

            for _ in 0..n {
                console.feed_byte(ESCAPE_CHAR, &mut out);
                console.feed_byte(CSI_CHAR2, &mut out);
                console.feed_byte(CSI_CURSOR_UP, &mut out);
            }
            for _ in 0..n {
                console.feed_byte(ESCAPE_CHAR, &mut out);
                console.feed_byte(CSI_CHAR2, &mut out);
                console.feed_byte(CSI_CURSOR_DOWN, &mut out);
            }

            let mut after = [0u8; 8];
            let after_len = console.arg(0, &mut after);
            assert_eq!(&before[..before_len], &after[..after_len], "n={n}");
        }
    }

    #[test]
    fn blank_line_is_ignored_and_does_not_execute() {
        let mut console = Console::new();
        let mut out = RecordingWriter::new();
        let outcome = console.feed_byte(CARRIAGE_RETURN_CHAR, &mut out);
        assert_eq!(outcome, PollOutcome::Idle);
    }

    #[test]
    fn print_decimal_pads_to_width_with_zeros() {
        let console = Console::new();
        let mut out = RecordingWriter::new();
        console.print_decimal_u32(7, false, 3, &mut out);
        assert_eq!(out.as_str(), "007");
    }

    #[test]
    fn print_fixed_point_renders_whole_and_fractional_parts() {
        let console = Console::new();
        let mut out = RecordingWriter::new();
        // q15: 0x4000 / 32768 == 0.5
        console.print_fixed_point_u32(0x4000, 15, 3, &mut out);
        assert_eq!(out.as_str(), "0.500");
    }

    #[test]
    fn print_hex_u16_is_zero_padded_uppercase() {
        let console = Console::new();
        let mut out = RecordingWriter::new();
        console.print_hex_u16(0x2A, &mut out);
        assert_eq!(out.as_str(), "002A");
    }

    #[test]
    fn lock_suppresses_output_and_echo_until_unlock_is_typed() {
        let mut console = Console::new();
        console.lock();
        assert!(console.is_locked());

        let mut out = RecordingWriter::new();
        console.print_string("should not appear", true, &mut out);
        assert_eq!(out.as_str(), "");

        // Garbage input resets the match counter but does not unlock.
        console.feed_byte(b'x', &mut out);
        assert!(console.is_locked());

        for b in b"unlock" {
            console.feed_byte(*b, &mut out);
        }
        assert!(!console.is_locked());
        // Nothing was echoed while locked.
        assert_eq!(out.as_str(), "");
    }

    #[test]
    fn unlock_match_resets_on_a_wrong_byte_mid_sequence() {
        let mut console = Console::new();
        console.lock();
        let mut out = RecordingWriter::new();
        for b in b"unl0ck" {
            console.feed_byte(*b, &mut out);
        }
        assert!(console.is_locked(), "typo must not unlock");
        for b in b"unlock" {
            console.feed_byte(*b, &mut out);
        }
        assert!(!console.is_locked());
    }

    #[test]
    fn stream_repeats_the_last_executed_command_at_its_period() {
        let mut console = Console::new();
        console.set_last_executed(Some(CommandEntry { name: "touch", id: 3 }));
        console.start_streaming(50);
        assert!(console.tick_stream(20).is_none());
        assert!(console.tick_stream(20).is_none());
        let fired = console.tick_stream(20);
        assert_eq!(fired, Some(CommandEntry { name: "touch", id: 3 }));
    }

    #[test]
    fn stop_streaming_clears_the_repeat_state() {
        let mut console = Console::new();
        console.set_last_executed(Some(CommandEntry { name: "touch", id: 3 }));
        console.start_streaming(10);
        assert!(console.is_streaming());
        console.stop_streaming();
        assert!(!console.is_streaming());
        assert_eq!(console.tick_stream(100), None);
    }

    #[test]
    fn escape_byte_cancels_an_active_stream() {
        let mut console = Console::new();
        console.set_last_executed(Some(CommandEntry { name: "touch", id: 3 }));
        console.start_streaming(10);
        let mut out = RecordingWriter::new();
        console.feed_byte(ESCAPE_CHAR, &mut out);
        console.feed_byte(b'[', &mut out);
        assert!(!console.is_streaming());
    }
}
