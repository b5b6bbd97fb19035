use std::fmt::{self, Write as _};

use tracing::debug;

use crate::completion::Hint;

pub(crate) const PROMPT_HDR: &str = "\x1b[1;37;49m";
pub(crate) const PROMPT_TLR: &str = "\x1b[0m";

const HINT_BASE: &str = "\x1b[0;35;49m";
const HINT_ACTIVE_ARG: &str = "\x1b[7;35;49m";
const HINT_DESC: &str = "\x1b[1;35;49m";
const SGR_RESET: &str = "\x1b[0m";

/// Append buffer: every escape sequence of a repaint is coalesced here and
/// flushed to the console in a single write to avoid flicker.
pub(crate) struct Frame {
    bytes: Vec<u8>,
}

impl Frame {
    pub(crate) fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    pub(crate) fn put(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    pub(crate) fn put_str(&mut self, text: &str) {
        self.put(text.as_bytes());
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Write for Frame {
    fn write_str(&mut self, text: &str) -> fmt::Result {
        self.put_str(text);
        Ok(())
    }
}

/// Everything a repaint needs to know about the editor.
pub(crate) struct View<'a> {
    pub(crate) prompt: &'a str,
    pub(crate) line: &'a [u8],
    pub(crate) pos: usize,
    pub(crate) cols: usize,
    pub(crate) hint: Option<Hint>,
}

/// Paint the prompt and a horizontally scrolled window of the line, then
/// park the cursor. The window advances until the cursor fits on the row.
pub(crate) fn single_line_frame(view: &View) -> Frame {
    let plen = view.prompt.len();
    let mut start = 0;
    let mut len = view.line.len();
    let mut pos = view.pos;

    while plen + pos >= view.cols && pos > 0 {
        start += 1;
        len -= 1;
        pos -= 1;
    }
    while plen + len > view.cols && len > 0 {
        len -= 1;
    }

    let mut frame = Frame::new();
    frame.put_str("\r");
    frame.put_str(PROMPT_HDR);
    frame.put_str(view.prompt);
    frame.put_str(PROMPT_TLR);
    frame.put(&view.line[start..start + len]);
    if let Some(hint) = &view.hint {
        append_hint(&mut frame, view, hint);
    }
    // Erase to the right, then place the cursor.
    frame.put_str("\x1b[0K");
    let _ = write!(frame, "\r\x1b[{}C", pos + plen);
    frame
}

/// Paint the full line wrapped over `cols`-wide rows, clearing every row the
/// previous paint used. `maxrows` remembers the tallest the line has been so
/// shrinking it still erases the stale rows below.
pub(crate) fn multi_line_frame(view: &View, oldpos: usize, maxrows: &mut usize) -> Frame {
    let plen = view.prompt.len();
    let cols = view.cols;
    let mut rows = (plen + view.line.len() + cols - 1) / cols;
    let rpos = (plen + oldpos + cols) / cols;
    let old_rows = *maxrows;

    if rows > *maxrows {
        *maxrows = rows;
    }
    debug!(rows, rpos, old_rows, "multi-line repaint");

    let mut frame = Frame::new();
    // Walk down to the last row the previous paint touched, then erase every
    // row on the way back up.
    if old_rows > rpos {
        let _ = write!(frame, "\x1b[{}B", old_rows - rpos);
    }
    for _ in 0..old_rows.saturating_sub(1) {
        frame.put_str("\r\x1b[0K\x1b[1A");
    }
    frame.put_str("\r\x1b[0K");

    frame.put_str(PROMPT_HDR);
    frame.put_str(view.prompt);
    frame.put_str(PROMPT_TLR);
    frame.put(view.line);
    if let Some(hint) = &view.hint {
        append_hint(&mut frame, view, hint);
    }

    // Cursor sitting exactly on the right margin: emit a newline so it lives
    // on the row past the end instead of off-screen.
    if view.pos > 0 && view.pos == view.line.len() && (view.pos + plen) % cols == 0 {
        frame.put_str("\n\r");
        rows += 1;
        if rows > *maxrows {
            *maxrows = rows;
        }
    }

    let rpos2 = (plen + view.pos + cols) / cols;
    if rows > rpos2 {
        let _ = write!(frame, "\x1b[{}A", rows - rpos2);
    }
    let col = (plen + view.pos) % cols;
    if col > 0 {
        let _ = write!(frame, "\r\x1b[{}C", col);
    } else {
        frame.put_str("\r");
    }
    frame
}

/// Paint the hint after the buffer, truncated to the columns that remain.
///
/// With spaces in the buffer the argument being typed is located in the
/// `[...]`-delimited template and shown in reverse video.
fn append_hint(frame: &mut Frame, view: &View, hint: &Hint) {
    let plen = view.prompt.len();
    let mut avail = view.cols.saturating_sub(plen + view.line.len() + 1);
    if avail == 0 {
        return;
    }

    frame.put_str(" ");
    frame.put_str(HINT_BASE);
    if !hint.args.is_empty() {
        let args = hint.args.as_bytes();
        let shown = args.len().min(avail);
        let spaces = view.line.iter().filter(|&&b| b == b' ').count();
        if spaces > 0 {
            let (arg_start, arg_end) = active_arg_span(args, spaces);
            if arg_start != arg_end {
                frame.put(&args[..arg_start.min(shown)]);
                frame.put_str(HINT_ACTIVE_ARG);
                let highlighted = if shown < arg_start {
                    0
                } else if shown < arg_end {
                    shown - arg_start
                } else {
                    arg_end - arg_start
                };
                frame.put(&args[arg_start..arg_start + highlighted]);
                frame.put_str(HINT_BASE);
                let tail = shown.saturating_sub(arg_end);
                frame.put(&args[arg_end..arg_end + tail]);
            } else {
                frame.put(&args[..shown]);
            }
        } else {
            frame.put(&args[..shown]);
        }
        avail -= shown;
        if avail > 0 {
            frame.put_str(" ");
            avail -= 1;
        }
    }
    if avail > 0 && !hint.desc.is_empty() {
        frame.put_str(HINT_DESC);
        let shown = hint.desc.len().min(avail);
        frame.put(&hint.desc.as_bytes()[..shown]);
    }
    frame.put_str(SGR_RESET);
}

/// Byte span of the argument placeholder the user is typing: skip one `[`
/// per space already entered, then run to the closing `]` or a space.
fn active_arg_span(args: &[u8], spaces: usize) -> (usize, usize) {
    let mut i = 0;
    let mut arg_start = 0;
    for _ in 0..spaces {
        while i < args.len() && args[i] != b'[' {
            i += 1;
        }
        if i < args.len() {
            i += 1;
        }
        arg_start = i;
    }

    let mut arg_end = 0;
    if arg_start > 0 {
        let mut j = arg_start;
        while j < args.len() && args[j] != b' ' && args[j] != b']' {
            j += 1;
        }
        arg_end = j;
    }
    (arg_start, arg_end)
}
