use std::collections::VecDeque;

use crate::console::Console;
use crate::editor::{Editor, Step};
use crate::error::EditError;

/// Scripted console for tests: queued input bytes, captured output, and a
/// fake probe timer that fires on demand.
#[derive(Default)]
pub struct TestConsole {
    pub input: VecDeque<u8>,
    pub output: Vec<u8>,
    pub timeout_armed: bool,
    pub timeout_fires: bool,
}

impl TestConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.input.extend(bytes.iter().copied());
    }

    /// Queue a cursor position report the way a terminal answers `ESC [ 6 n`.
    pub fn push_cursor_report(&mut self, row: usize, col: usize) {
        self.push_bytes(format!("\x1b[{row};{col}R").as_bytes());
    }

    pub fn output_str(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }

    pub fn take_output(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.output)
    }
}

impl Console for TestConsole {
    fn poll_byte(&mut self) -> Option<u8> {
        self.input.pop_front()
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), EditError> {
        self.output.extend_from_slice(bytes);
        Ok(())
    }

    fn arm_timeout(&mut self) {
        self.timeout_armed = true;
    }

    fn timeout_elapsed(&mut self) -> bool {
        self.timeout_armed && self.timeout_fires
    }
}

/// Editor wired to a smart terminal of the given width: the two probe
/// replies are already queued.
pub fn smart_editor(cols: usize) -> Editor<TestConsole> {
    let mut console = TestConsole::new();
    console.push_cursor_report(1, 1);
    console.push_cursor_report(1, cols);
    Editor::new(console)
}

/// Queue another pair of probe replies, for the re-probe a smart terminal
/// goes through after every committed line.
pub fn queue_probe_replies(editor: &mut Editor<TestConsole>, cols: usize) {
    editor.console_mut().push_cursor_report(1, 1);
    editor.console_mut().push_cursor_report(1, cols);
}

/// Feed bytes and step until the input queue drains, returning the first
/// non-pending step if one is produced.
pub fn drive(
    editor: &mut Editor<TestConsole>,
    bytes: &[u8],
    prompt: &str,
) -> Result<Step, EditError> {
    editor.console_mut().push_bytes(bytes);
    loop {
        let step = editor.step(prompt)?;
        if step != Step::Pending {
            return Ok(step);
        }
        if editor.console_mut().input.is_empty() {
            return Ok(Step::Pending);
        }
    }
}
