use tracing::debug;

use crate::completion::{CompletionFn, Completions, Hint, HintsFn};
use crate::console::Console;
use crate::error::EditError;
use crate::history::History;
use crate::keys;
use crate::render::{self, Frame, View, PROMPT_HDR, PROMPT_TLR};

/// Hard cap on the edited line length, in bytes.
pub const MAX_LINE: usize = 4096;

/// Outcome of one [`Editor::step`] call.
#[derive(Debug, PartialEq, Eq)]
pub enum Step {
    /// No byte was available, or an in-progress sub-protocol (probe, escape
    /// sequence, completion browse) needs more input.
    Pending,
    /// The user committed the line with Enter.
    Committed(String),
    /// Ctrl-D on an empty line.
    Eof,
    /// Ctrl-C.
    Interrupted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Mode {
    Probe,
    ProbeInitial,
    ProbeMargin,
    Init,
    Read,
    Esc,
    Completion,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum HistoryDir {
    Prev,
    Next,
}

enum CursorRead {
    Pending,
    Failed,
    Col(usize),
}

/// Accumulator for one cursor position report (`ESC [ rows ; cols R`).
struct CursorReport {
    buf: [u8; 32],
    len: usize,
    reading: bool,
}

impl CursorReport {
    fn new() -> Self {
        Self {
            buf: [0; 32],
            len: 0,
            reading: false,
        }
    }

    fn reset(&mut self) {
        self.len = 0;
        self.reading = false;
    }
}

/// Non-blocking line editor driven one byte at a time.
///
/// Every call to [`Editor::step`] makes at most one input byte of progress
/// and returns, so the host can interleave other work. The editor starts by
/// probing the terminal width with a cursor-position query; a terminal that
/// answers gets full in-line editing, one that stays silent past the probe
/// deadline is treated as dumb and receives no escape sequences at all.
pub struct Editor<C: Console> {
    console: C,
    mode: Mode,
    line: Vec<u8>,
    pos: usize,
    oldpos: usize,
    prompt: String,
    cols: usize,
    maxrows: usize,
    history_index: usize,
    smart_term: bool,
    multiline: bool,
    probe_enabled: bool,
    history: History,
    completion: Option<CompletionFn>,
    hints: Option<HintsFn>,
    seq: [u8; 3],
    seq_idx: usize,
    completions: Completions,
    completion_idx: usize,
    report: CursorReport,
    initial_col: usize,
}

impl<C: Console> Editor<C> {
    pub fn new(console: C) -> Self {
        Self {
            console,
            mode: Mode::Probe,
            line: Vec::new(),
            pos: 0,
            oldpos: 0,
            prompt: String::new(),
            cols: 80,
            maxrows: 0,
            history_index: 0,
            smart_term: false,
            multiline: false,
            probe_enabled: true,
            history: History::new(),
            completion: None,
            hints: None,
            seq: [0; 3],
            seq_idx: 0,
            completions: Completions::new(),
            completion_idx: 0,
            report: CursorReport::new(),
            initial_col: 0,
        }
    }

    /// Install the completion producer invoked when the user presses Tab.
    pub fn with_completion(mut self, complete: impl FnMut(&str, &mut Completions) + 'static) -> Self {
        self.completion = Some(Box::new(complete));
        self
    }

    /// Install the hints producer consulted before every redraw.
    pub fn with_hints(mut self, hints: impl Fn(&str) -> Option<Hint> + 'static) -> Self {
        self.hints = Some(Box::new(hints));
        self
    }

    pub fn with_history(mut self, history: History) -> Self {
        self.history = history;
        self
    }

    /// Select the row-wrapped multi-line renderer instead of the default
    /// horizontally scrolling single-line one.
    pub fn set_multi_line(&mut self, on: bool) {
        self.multiline = on;
    }

    /// Enable or disable terminal probing. With probing off the editor goes
    /// straight to dumb mode with 80 columns.
    pub fn probe_terminal(&mut self, on: bool) {
        self.probe_enabled = on;
    }

    /// True once a probe round-trip succeeded this session.
    pub fn smart_terminal_connected(&self) -> bool {
        self.smart_term
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut History {
        &mut self.history
    }

    pub fn console_mut(&mut self) -> &mut C {
        &mut self.console
    }

    /// Advance the editor by at most one input byte.
    ///
    /// `prompt` is captured when a new line begins; mid-session changes go
    /// through [`Editor::update_prompt`]. Calling `step` with no byte
    /// available is cheap and leaves the state untouched.
    pub fn step(&mut self, prompt: &str) -> Result<Step, EditError> {
        if matches!(self.mode, Mode::Probe | Mode::ProbeInitial | Mode::ProbeMargin)
            && !self.probe_columns()?
        {
            return Ok(Step::Pending);
        }
        if self.mode == Mode::Init {
            self.begin_session(prompt)?;
        }
        match self.mode {
            Mode::Read => self.read_input(),
            Mode::Esc => self.read_esc_sequence(),
            Mode::Completion => self.completion_input(),
            _ => Ok(Step::Pending),
        }
    }

    /// Repaint on demand, e.g. after the host printed a line of its own.
    /// A no-op on dumb terminals and while no line is being edited.
    pub fn refresh(&mut self) -> Result<(), EditError> {
        if !self.smart_term {
            return Ok(());
        }
        match self.mode {
            Mode::Probe | Mode::ProbeInitial | Mode::ProbeMargin | Mode::Init => Ok(()),
            Mode::Completion => self.show_completion(),
            Mode::Read | Mode::Esc => self.refresh_line(),
        }
    }

    /// Swap the prompt string and repaint.
    pub fn update_prompt(&mut self, prompt: &str) -> Result<(), EditError> {
        self.prompt.clear();
        self.prompt.push_str(prompt);
        self.refresh()
    }

    /// Clear the screen and force the next step to re-probe the terminal.
    pub fn clear_screen(&mut self) -> Result<(), EditError> {
        self.console.write(b"\x1b[H\x1b[2J")?;
        self.mode = Mode::Probe;
        Ok(())
    }

    /// Diagnostic loop: print every incoming byte until `quit` is typed.
    pub fn print_key_codes(&mut self) -> Result<(), EditError> {
        self.console.write(
            b"Key codes debugging mode.\r\n\
              Press keys to see scan codes. Type 'quit' at any time to exit.\r\n",
        )?;
        let mut window = [b' '; 4];
        loop {
            let Some(byte) = self.console.poll_byte() else {
                continue;
            };
            window.rotate_left(1);
            window[3] = byte;
            if window == *b"quit" {
                return Ok(());
            }
            let shown = if byte.is_ascii_graphic() || byte == b' ' {
                byte as char
            } else {
                '?'
            };
            let report = format!("'{shown}' {byte:02x} ({byte}) (type quit to exit)\r\n");
            self.console.write(report.as_bytes())?;
        }
    }

    // ---- terminal probing ----

    /// Drive the width probe one byte forward. Returns true once the probe
    /// is settled, leaving the mode at `Init`.
    fn probe_columns(&mut self) -> Result<bool, EditError> {
        if self.mode == Mode::Probe {
            if !self.probe_enabled {
                return self.probe_failed();
            }
            self.report.reset();
            self.mode = Mode::ProbeInitial;
        }
        if self.mode == Mode::ProbeInitial {
            match self.read_cursor_position()? {
                CursorRead::Pending => return Ok(false),
                CursorRead::Failed => return self.probe_failed(),
                CursorRead::Col(col) => {
                    self.smart_term = true;
                    self.initial_col = col;
                    // Jump to the right margin; the next report tells us the
                    // real width.
                    self.console.write(b"\x1b[999C")?;
                    self.report.reset();
                    self.mode = Mode::ProbeMargin;
                }
            }
        }
        match self.read_cursor_position()? {
            CursorRead::Pending => Ok(false),
            CursorRead::Failed => self.probe_failed(),
            CursorRead::Col(col) => {
                self.cols = col.max(1);
                if self.cols > self.initial_col {
                    let restore = format!("\x1b[{}D", self.cols - self.initial_col);
                    self.console.write(restore.as_bytes())?;
                }
                debug!(cols = self.cols, "terminal width probed");
                self.mode = Mode::Init;
                Ok(true)
            }
        }
    }

    fn probe_failed(&mut self) -> Result<bool, EditError> {
        self.smart_term = false;
        self.cols = 80;
        self.mode = Mode::Init;
        Ok(true)
    }

    /// One step of a cursor position query. The first call emits `ESC [ 6 n`
    /// and arms the deadline; later calls consume one reply byte each,
    /// discarding noise until the leading escape shows up.
    fn read_cursor_position(&mut self) -> Result<CursorRead, EditError> {
        if !self.report.reading {
            self.report.reading = true;
            self.report.len = 0;
            self.console.write(b"\x1b[6n")?;
            self.console.arm_timeout();
            return Ok(CursorRead::Pending);
        }
        let Some(byte) = self.console.poll_byte() else {
            if self.console.timeout_elapsed() {
                return Ok(CursorRead::Failed);
            }
            return Ok(CursorRead::Pending);
        };
        if self.report.len == 0 && byte != keys::ESC {
            return Ok(CursorRead::Pending);
        }
        self.report.buf[self.report.len] = byte;
        self.report.len += 1;
        if byte != b'R' && self.report.len < self.report.buf.len() {
            return Ok(CursorRead::Pending);
        }
        match parse_cursor_report(&self.report.buf[..self.report.len]) {
            Some((_rows, cols)) => Ok(CursorRead::Col(cols)),
            None => Ok(CursorRead::Failed),
        }
    }

    // ---- session lifecycle ----

    fn begin_session(&mut self, prompt: &str) -> Result<(), EditError> {
        self.prompt.clear();
        self.prompt.push_str(prompt);
        self.line.clear();
        self.pos = 0;
        self.oldpos = 0;
        self.maxrows = 0;
        self.history_index = 0;

        // The newest history entry is the live buffer, initially empty.
        self.history.add("");

        if self.smart_term {
            let mut frame = Frame::new();
            frame.put_str(PROMPT_HDR);
            frame.put_str(prompt);
            frame.put_str(PROMPT_TLR);
            self.console.write(frame.bytes())?;
        } else {
            self.console.write(prompt.as_bytes())?;
        }
        self.mode = Mode::Read;
        Ok(())
    }

    /// After a line is finished, only re-probe when a smart terminal is
    /// attached; a dumb one goes straight back to the prompt so it is not
    /// spammed with escape sequences.
    fn restart(&mut self) {
        self.mode = if self.smart_term { Mode::Probe } else { Mode::Init };
    }

    fn line_string(&self) -> String {
        String::from_utf8_lossy(&self.line).into_owned()
    }

    // ---- byte dispatch ----

    fn read_input(&mut self) -> Result<Step, EditError> {
        let Some(byte) = self.console.poll_byte() else {
            return Ok(Step::Pending);
        };
        if self.smart_term {
            self.handle_byte(byte)
        } else {
            self.handle_byte_dumb(byte)
        }
    }

    fn handle_byte(&mut self, byte: u8) -> Result<Step, EditError> {
        if byte == keys::TAB {
            self.begin_completion()?;
            return Ok(Step::Pending);
        }
        match byte {
            keys::ENTER => {
                self.history.pop_newest();
                if self.multiline {
                    self.move_end()?;
                }
                // Leave the committed line on screen without a stale hint.
                self.refresh_line_no_hints()?;
                self.restart();
                Ok(Step::Committed(self.line_string()))
            }
            keys::CTRL_C => Ok(Step::Interrupted),
            keys::BACKSPACE | keys::CTRL_H => {
                self.backspace()?;
                Ok(Step::Pending)
            }
            keys::CTRL_D => {
                if self.line.is_empty() {
                    self.history.pop_newest();
                    self.restart();
                    Ok(Step::Eof)
                } else {
                    self.delete_right()?;
                    Ok(Step::Pending)
                }
            }
            keys::CTRL_T => {
                if self.pos > 0 && self.pos < self.line.len() {
                    self.line.swap(self.pos - 1, self.pos);
                    if self.pos != self.line.len() - 1 {
                        self.pos += 1;
                    }
                    self.refresh_line()?;
                }
                Ok(Step::Pending)
            }
            keys::CTRL_B => {
                self.move_left()?;
                Ok(Step::Pending)
            }
            keys::CTRL_F => {
                self.move_right()?;
                Ok(Step::Pending)
            }
            keys::CTRL_P => {
                self.history_move(HistoryDir::Prev)?;
                Ok(Step::Pending)
            }
            keys::CTRL_N => {
                self.history_move(HistoryDir::Next)?;
                Ok(Step::Pending)
            }
            keys::ESC => {
                self.seq_idx = 0;
                self.mode = Mode::Esc;
                Ok(Step::Pending)
            }
            keys::CTRL_U => {
                self.line.clear();
                self.pos = 0;
                self.refresh_line()?;
                Ok(Step::Pending)
            }
            keys::CTRL_K => {
                self.line.truncate(self.pos);
                self.refresh_line()?;
                Ok(Step::Pending)
            }
            keys::CTRL_A => {
                self.move_home()?;
                Ok(Step::Pending)
            }
            keys::CTRL_E => {
                self.move_end()?;
                Ok(Step::Pending)
            }
            keys::CTRL_L => {
                self.clear_screen()?;
                self.refresh_line()?;
                Ok(Step::Pending)
            }
            keys::CTRL_W => {
                self.delete_prev_word()?;
                Ok(Step::Pending)
            }
            _ => {
                self.insert(byte)?;
                Ok(Step::Pending)
            }
        }
    }

    /// Dumb terminals get no echo and no editing: bytes accumulate until
    /// CR/LF or the buffer fills up.
    fn handle_byte_dumb(&mut self, byte: u8) -> Result<Step, EditError> {
        if byte == b'\r' || byte == b'\n' {
            self.history.pop_newest();
            self.restart();
            return Ok(Step::Committed(self.line_string()));
        }
        self.line.push(byte);
        self.pos += 1;
        if self.line.len() >= MAX_LINE {
            self.history.pop_newest();
            self.restart();
            return Ok(Step::Committed(self.line_string()));
        }
        Ok(Step::Pending)
    }

    // ---- escape sequences ----

    fn read_esc_sequence(&mut self) -> Result<Step, EditError> {
        let Some(byte) = self.console.poll_byte() else {
            return Ok(Step::Pending);
        };
        if self.seq_idx >= self.seq.len() {
            self.mode = Mode::Read;
            return Ok(Step::Pending);
        }
        self.seq[self.seq_idx] = byte;
        self.seq_idx += 1;
        if self.seq_idx < 2 {
            return Ok(Step::Pending);
        }

        if self.seq[0] == b'[' {
            if self.seq[1].is_ascii_digit() {
                // Extended sequence; wait for the final byte.
                if self.seq_idx < 3 {
                    return Ok(Step::Pending);
                }
                if self.seq[2] == b'~' && self.seq[1] == b'3' {
                    self.delete_right()?;
                }
            } else {
                match self.seq[1] {
                    b'A' => self.history_move(HistoryDir::Prev)?,
                    b'B' => self.history_move(HistoryDir::Next)?,
                    b'C' => self.move_right()?,
                    b'D' => self.move_left()?,
                    b'H' => self.move_home()?,
                    b'F' => self.move_end()?,
                    _ => {}
                }
            }
        } else if self.seq[0] == b'O' {
            match self.seq[1] {
                b'H' => self.move_home()?,
                b'F' => self.move_end()?,
                _ => {}
            }
        }
        self.mode = Mode::Read;
        Ok(Step::Pending)
    }

    // ---- completion ----

    fn begin_completion(&mut self) -> Result<(), EditError> {
        let mut candidates = Completions::new();
        let line = self.line_string();
        if let Some(complete) = self.completion.as_mut() {
            complete(&line, &mut candidates);
        }
        if candidates.is_empty() {
            return self.beep();
        }
        self.completions = candidates;
        self.completion_idx = 0;
        self.mode = Mode::Completion;
        self.show_completion()
    }

    /// Paint the highlighted candidate in place of the live buffer, without
    /// touching it. The slot one past the last candidate shows the original.
    fn show_completion(&mut self) -> Result<(), EditError> {
        // Skip candidates identical to the line so Tab visibly changes
        // something.
        while let Some(candidate) = self.completions.get(self.completion_idx) {
            if candidate.as_bytes() != self.line.as_slice() {
                break;
            }
            self.completion_idx = (self.completion_idx + 1) % (self.completions.len() + 1);
        }
        let shown = self
            .completions
            .get(self.completion_idx)
            .map(|candidate| candidate.as_bytes().to_vec());
        match shown {
            Some(bytes) => {
                let pos = bytes.len();
                self.paint(Some((&bytes, pos)), true)
            }
            None => self.refresh_line(),
        }
    }

    fn completion_input(&mut self) -> Result<Step, EditError> {
        let Some(byte) = self.console.poll_byte() else {
            return Ok(Step::Pending);
        };
        match byte {
            keys::TAB => {
                self.completion_idx = (self.completion_idx + 1) % (self.completions.len() + 1);
                if self.completion_idx == self.completions.len() {
                    self.beep()?;
                }
                self.show_completion()?;
                Ok(Step::Pending)
            }
            keys::ESC => {
                // Put the original line back on screen.
                if self.completion_idx < self.completions.len() {
                    self.refresh_line()?;
                }
                self.mode = Mode::Read;
                self.completions.clear();
                Ok(Step::Pending)
            }
            _ => {
                let accepted = self
                    .completions
                    .get(self.completion_idx)
                    .map(|candidate| candidate.as_bytes().to_vec());
                if let Some(mut bytes) = accepted {
                    bytes.truncate(MAX_LINE);
                    self.pos = bytes.len();
                    self.line = bytes;
                }
                self.mode = Mode::Read;
                self.completions.clear();
                self.handle_byte(byte)
            }
        }
    }

    // ---- edit operations ----

    fn insert(&mut self, byte: u8) -> Result<(), EditError> {
        if self.line.len() >= MAX_LINE {
            return Ok(());
        }
        if self.pos == self.line.len()
            && !self.multiline
            && self.hints.is_none()
            && self.prompt.len() + self.line.len() + 1 < self.cols
        {
            // Appending within the row with no hint to repaint: echo just
            // the byte.
            self.line.push(byte);
            self.pos += 1;
            self.console.write(&[byte])
        } else {
            self.line.insert(self.pos, byte);
            self.pos += 1;
            self.refresh_line()
        }
    }

    fn backspace(&mut self) -> Result<(), EditError> {
        if self.pos > 0 && !self.line.is_empty() {
            self.line.remove(self.pos - 1);
            self.pos -= 1;
            self.refresh_line()?;
        }
        Ok(())
    }

    /// Delete the byte under the cursor, as the Delete key does.
    fn delete_right(&mut self) -> Result<(), EditError> {
        if !self.line.is_empty() && self.pos < self.line.len() {
            self.line.remove(self.pos);
            self.refresh_line()?;
        }
        Ok(())
    }

    fn delete_prev_word(&mut self) -> Result<(), EditError> {
        let old_pos = self.pos;
        while self.pos > 0 && self.line[self.pos - 1] == b' ' {
            self.pos -= 1;
        }
        while self.pos > 0 && self.line[self.pos - 1] != b' ' {
            self.pos -= 1;
        }
        self.line.drain(self.pos..old_pos);
        self.refresh_line()
    }

    fn move_left(&mut self) -> Result<(), EditError> {
        if self.pos > 0 {
            self.pos -= 1;
            self.refresh_line()?;
        }
        Ok(())
    }

    fn move_right(&mut self) -> Result<(), EditError> {
        if self.pos != self.line.len() {
            self.pos += 1;
            self.refresh_line()?;
        }
        Ok(())
    }

    fn move_home(&mut self) -> Result<(), EditError> {
        if self.pos != 0 {
            self.pos = 0;
            self.refresh_line()?;
        }
        Ok(())
    }

    fn move_end(&mut self) -> Result<(), EditError> {
        if self.pos != self.line.len() {
            self.pos = self.line.len();
            self.refresh_line()?;
        }
        Ok(())
    }

    /// Replace the line with the next or previous history entry, stashing
    /// the in-progress edit in its scratch slot first. Navigation clamps at
    /// both ends rather than wrapping.
    fn history_move(&mut self, dir: HistoryDir) -> Result<(), EditError> {
        if self.history.len() <= 1 {
            return Ok(());
        }
        let slot = self.history.len() - 1 - self.history_index;
        let line = self.line_string();
        self.history.replace(slot, &line);
        match dir {
            HistoryDir::Prev => {
                if self.history_index + 1 >= self.history.len() {
                    self.history_index = self.history.len() - 1;
                    return Ok(());
                }
                self.history_index += 1;
            }
            HistoryDir::Next => {
                if self.history_index == 0 {
                    return Ok(());
                }
                self.history_index -= 1;
            }
        }
        let slot = self.history.len() - 1 - self.history_index;
        let mut entry = self
            .history
            .get(slot)
            .map(|entry| entry.as_bytes().to_vec())
            .unwrap_or_default();
        entry.truncate(MAX_LINE);
        self.pos = entry.len();
        self.line = entry;
        self.refresh_line()
    }

    fn beep(&mut self) -> Result<(), EditError> {
        self.console.write(b"\x07")
    }

    // ---- painting ----

    fn refresh_line(&mut self) -> Result<(), EditError> {
        self.paint(None, true)
    }

    fn refresh_line_no_hints(&mut self) -> Result<(), EditError> {
        self.paint(None, false)
    }

    /// Repaint either the live buffer or, for completion browsing, a
    /// candidate shown in its place. The whole frame is flushed in one
    /// write.
    fn paint(&mut self, shown: Option<(&[u8], usize)>, show_hints: bool) -> Result<(), EditError> {
        let (line, pos) = match shown {
            Some((line, pos)) => (line, pos),
            None => (self.line.as_slice(), self.pos),
        };
        let hint = if show_hints { self.hint_for(line) } else { None };
        let frame = {
            let view = View {
                prompt: &self.prompt,
                line,
                pos,
                cols: self.cols,
                hint,
            };
            if self.multiline {
                render::multi_line_frame(&view, self.oldpos, &mut self.maxrows)
            } else {
                render::single_line_frame(&view)
            }
        };
        if self.multiline {
            self.oldpos = pos;
        }
        self.console.write(frame.bytes())
    }

    fn hint_for(&self, line: &[u8]) -> Option<Hint> {
        let hints = self.hints.as_ref()?;
        if self.prompt.len() + line.len() + 1 >= self.cols {
            return None;
        }
        hints(&String::from_utf8_lossy(line))
    }
}

/// Parse `ESC [ rows ; cols` out of a device status report, ignoring the
/// trailing `R` and anything past the two integers.
fn parse_cursor_report(buf: &[u8]) -> Option<(usize, usize)> {
    let rest = buf.strip_prefix(b"\x1b[")?;
    let semi = rest.iter().position(|&b| b == b';')?;
    let rows = parse_int(&rest[..semi])?;
    let tail = &rest[semi + 1..];
    let end = tail
        .iter()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(tail.len());
    let cols = parse_int(&tail[..end])?;
    Some((rows, cols))
}

fn parse_int(digits: &[u8]) -> Option<usize> {
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

#[cfg(test)]
mod tests;
