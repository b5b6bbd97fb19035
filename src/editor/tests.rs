use super::*;
use crate::test_utils::{drive, queue_probe_replies, smart_editor, TestConsole};

const PROMPT: &str = "> ";

fn committed(step: Step) -> String {
    match step {
        Step::Committed(line) => line,
        other => panic!("expected a committed line, got {other:?}"),
    }
}

#[test]
fn commits_line_on_enter() {
    let mut editor = smart_editor(80);
    let line = committed(drive(&mut editor, b"hello\r", PROMPT).unwrap());
    assert_eq!(line, "hello");
    assert_eq!(line.len(), 5);
    assert!(editor.smart_terminal_connected());

    // The scratch slot is popped on commit; the host records the line.
    assert!(editor.history().is_empty());
    editor.history_mut().add(&line);
    assert_eq!(editor.history().entries(), ["hello"]);
}

#[test]
fn eof_on_empty_line() {
    let mut editor = smart_editor(80);
    assert_eq!(drive(&mut editor, b"\x04", PROMPT).unwrap(), Step::Eof);
    assert!(editor.history().is_empty());
}

#[test]
fn eof_leaves_a_usable_editor_behind() {
    let mut editor = smart_editor(80);
    assert_eq!(drive(&mut editor, b"\x04", PROMPT).unwrap(), Step::Eof);
    queue_probe_replies(&mut editor, 80);
    let line = committed(drive(&mut editor, b"ok\r", PROMPT).unwrap());
    assert_eq!(line, "ok");
}

#[test]
fn backspace_removes_previous_char() {
    let mut editor = smart_editor(80);
    let line = committed(drive(&mut editor, b"abc\x7f\r", PROMPT).unwrap());
    assert_eq!(line, "ab");
}

#[test]
fn history_prev_recalls_last_commit() {
    let mut editor = smart_editor(80);
    let line = committed(drive(&mut editor, b"hello\r", PROMPT).unwrap());
    editor.history_mut().add(&line);

    queue_probe_replies(&mut editor, 80);
    let recalled = committed(drive(&mut editor, b"\x1b[A\r", PROMPT).unwrap());
    assert_eq!(recalled, "hello");
}

#[test]
fn history_navigation_clamps_at_both_ends() {
    let mut editor = smart_editor(80);
    editor.history_mut().add("one");
    editor.history_mut().add("two");

    drive(&mut editor, b"\x1b[A", PROMPT).unwrap();
    assert_eq!(editor.line, b"two");
    drive(&mut editor, b"\x1b[A", PROMPT).unwrap();
    assert_eq!(editor.line, b"one");
    drive(&mut editor, b"\x1b[A", PROMPT).unwrap();
    assert_eq!(editor.line, b"one");

    drive(&mut editor, b"\x1b[B", PROMPT).unwrap();
    assert_eq!(editor.line, b"two");
    drive(&mut editor, b"\x1b[B", PROMPT).unwrap();
    assert_eq!(editor.line, b"");
    drive(&mut editor, b"\x1b[B", PROMPT).unwrap();
    assert_eq!(editor.line, b"");

    let line = committed(drive(&mut editor, b"x\r", PROMPT).unwrap());
    assert_eq!(line, "x");
}

#[test]
fn ctrl_w_deletes_previous_word() {
    let mut editor = smart_editor(80);
    let line = committed(drive(&mut editor, b"foo bar baz\x17\x17\r", PROMPT).unwrap());
    assert_eq!(line, "foo ");
    assert_eq!(line.len(), 4);
}

#[test]
fn probe_timeout_degrades_to_dumb_mode() {
    let mut console = TestConsole::new();
    console.timeout_fires = true;
    let mut editor = Editor::new(console);

    // First step emits the query and arms the deadline; the second sees the
    // deadline elapsed with no reply.
    assert_eq!(editor.step(PROMPT).unwrap(), Step::Pending);
    assert_eq!(editor.step(PROMPT).unwrap(), Step::Pending);
    assert!(!editor.smart_terminal_connected());
    assert_eq!(editor.cols, 80);

    editor.console_mut().take_output();
    let line = committed(drive(&mut editor, b"hi\r", PROMPT).unwrap());
    assert_eq!(line, "hi");
    // The dumb handler echoes nothing and never emits escapes.
    assert!(editor.console_mut().output.is_empty());
}

#[test]
fn probing_disabled_goes_straight_to_dumb_mode() {
    let mut editor = Editor::new(TestConsole::new());
    editor.probe_terminal(false);
    assert_eq!(editor.step(PROMPT).unwrap(), Step::Pending);
    assert!(!editor.smart_terminal_connected());
    assert!(!editor.console_mut().output_str().contains('\x1b'));

    let line = committed(drive(&mut editor, b"ok\r", PROMPT).unwrap());
    assert_eq!(line, "ok");
}

#[test]
fn dumb_mode_commits_when_the_buffer_fills_up() {
    let mut editor = Editor::new(TestConsole::new());
    editor.probe_terminal(false);
    let soup = vec![b'a'; MAX_LINE];
    let line = committed(drive(&mut editor, &soup, PROMPT).unwrap());
    assert_eq!(line.len(), MAX_LINE);
}

fn hello_completions(line: &str, candidates: &mut Completions) {
    if line.starts_with('h') {
        candidates.add("hello");
        candidates.add("hello there");
    }
}

#[test]
fn completion_tab_then_escape_restores_line() {
    let mut editor = smart_editor(80).with_completion(hello_completions);
    drive(&mut editor, b"h", PROMPT).unwrap();
    drive(&mut editor, b"\t", PROMPT).unwrap();
    assert_eq!(editor.mode, Mode::Completion);
    assert!(editor.console_mut().output_str().contains("hello"));

    drive(&mut editor, b"\x1b", PROMPT).unwrap();
    assert_eq!(editor.mode, Mode::Read);
    assert_eq!(editor.line, b"h");
    assert_eq!(editor.pos, 1);

    let line = committed(drive(&mut editor, b"\r", PROMPT).unwrap());
    assert_eq!(line, "h");
}

#[test]
fn completion_commits_candidate_on_other_byte() {
    let mut editor = smart_editor(80).with_completion(hello_completions);
    drive(&mut editor, b"h\t", PROMPT).unwrap();
    let line = committed(drive(&mut editor, b"\r", PROMPT).unwrap());
    assert_eq!(line, "hello");
}

#[test]
fn completion_cycles_and_beeps_past_the_last_candidate() {
    let mut editor = smart_editor(80).with_completion(hello_completions);
    drive(&mut editor, b"h\t", PROMPT).unwrap();
    assert_eq!(editor.completion_idx, 0);
    drive(&mut editor, b"\t", PROMPT).unwrap();
    assert_eq!(editor.completion_idx, 1);

    editor.console_mut().take_output();
    drive(&mut editor, b"\t", PROMPT).unwrap();
    // The slot past the candidates shows the original buffer and beeps.
    assert_eq!(editor.completion_idx, 2);
    assert!(editor.console_mut().output.contains(&0x07));

    drive(&mut editor, b"\t", PROMPT).unwrap();
    assert_eq!(editor.completion_idx, 0);
}

#[test]
fn completion_with_no_candidates_beeps_and_stays_regular() {
    let mut editor = smart_editor(80).with_completion(hello_completions);
    drive(&mut editor, b"x", PROMPT).unwrap();
    editor.console_mut().take_output();
    drive(&mut editor, b"\t", PROMPT).unwrap();
    assert_eq!(editor.mode, Mode::Read);
    assert_eq!(editor.console_mut().output, b"\x07");
}

#[test]
fn transpose_swaps_the_two_chars_around_the_cursor() {
    let mut editor = smart_editor(80);
    let line = committed(drive(&mut editor, b"abc\x02\x14\r", PROMPT).unwrap());
    assert_eq!(line, "acb");
}

#[test]
fn ctrl_a_and_ctrl_e_jump_to_the_line_ends() {
    let mut editor = smart_editor(80);
    let line = committed(drive(&mut editor, b"bc\x01a\x05d\r", PROMPT).unwrap());
    assert_eq!(line, "abcd");
}

#[test]
fn arrow_keys_move_the_cursor() {
    let mut editor = smart_editor(80);
    let line = committed(drive(&mut editor, b"ac\x1b[Db\r", PROMPT).unwrap());
    assert_eq!(line, "abc");
}

#[test]
fn delete_key_removes_the_char_under_the_cursor() {
    let mut editor = smart_editor(80);
    let line = committed(drive(&mut editor, b"ab\x1b[H\x1b[3~\r", PROMPT).unwrap());
    assert_eq!(line, "b");
}

#[test]
fn ctrl_k_deletes_from_cursor_to_end() {
    let mut editor = smart_editor(80);
    let line = committed(drive(&mut editor, b"abcd\x02\x02\x0b\r", PROMPT).unwrap());
    assert_eq!(line, "ab");
}

#[test]
fn ctrl_u_deletes_the_whole_line() {
    let mut editor = smart_editor(80);
    let line = committed(drive(&mut editor, b"abc\x15xy\r", PROMPT).unwrap());
    assert_eq!(line, "xy");
}

#[test]
fn ctrl_d_mid_line_deletes_to_the_right() {
    let mut editor = smart_editor(80);
    let line = committed(drive(&mut editor, b"abc\x01\x04\r", PROMPT).unwrap());
    assert_eq!(line, "bc");
}

#[test]
fn ctrl_c_interrupts_without_losing_the_line() {
    let mut editor = smart_editor(80);
    assert_eq!(drive(&mut editor, b"ab\x03", PROMPT).unwrap(), Step::Interrupted);
    let line = committed(drive(&mut editor, b"c\r", PROMPT).unwrap());
    assert_eq!(line, "abc");
}

#[test]
fn insert_at_end_echoes_the_single_byte() {
    let mut editor = smart_editor(80);
    drive(&mut editor, b"", PROMPT).unwrap();
    editor.console_mut().take_output();

    drive(&mut editor, b"a", PROMPT).unwrap();
    assert_eq!(editor.console_mut().output, b"a");
}

#[test]
fn insert_redraws_fully_when_hints_are_installed() {
    let mut editor = smart_editor(80).with_hints(|_| Some(Hint::new("tail", "")));
    drive(&mut editor, b"", PROMPT).unwrap();
    editor.console_mut().take_output();

    drive(&mut editor, b"a", PROMPT).unwrap();
    let out = editor.console_mut().output_str();
    assert!(out.starts_with('\r'));
    assert!(out.contains("tail"));
}

#[test]
fn hint_highlights_the_argument_being_typed() {
    let mut editor =
        smart_editor(80).with_hints(|_| Some(Hint::new("[src] [dst]", "- copies a file")));
    drive(&mut editor, b"cp a ", PROMPT).unwrap();
    let out = editor.console_mut().output_str();
    // Two spaces typed: the second placeholder is shown in reverse video.
    assert!(out.contains("\x1b[7;35;49mdst\x1b[0;35;49m]"));
    assert!(out.contains("\x1b[1;35;49m- copies a file"));
    assert!(out.contains("\x1b[0m"));
}

#[test]
fn committed_line_is_repainted_without_hints() {
    let mut editor = smart_editor(80).with_hints(|_| Some(Hint::new("HINTY", "")));
    drive(&mut editor, b"hi", PROMPT).unwrap();
    editor.console_mut().take_output();

    let line = committed(drive(&mut editor, b"\r", PROMPT).unwrap());
    assert_eq!(line, "hi");
    let out = editor.console_mut().output_str();
    assert!(!out.contains("HINTY"));
    assert!(!out.contains("\x1b[0;35;49m"));
}

#[test]
fn multi_line_wrap_emits_a_newline_on_the_margin() {
    let mut editor = smart_editor(10);
    editor.set_multi_line(true);
    drive(&mut editor, b"", PROMPT).unwrap();
    assert_eq!(editor.cols, 10);
    editor.console_mut().take_output();

    // 8 bytes + the 2-byte prompt land exactly on the right margin.
    drive(&mut editor, b"abcdefgh", PROMPT).unwrap();
    assert!(editor.console_mut().output_str().contains("\n\r"));
    assert_eq!(editor.maxrows, 2);

    drive(&mut editor, b"i", PROMPT).unwrap();
    let plen = PROMPT.len();
    let rows = (plen + editor.line.len() + editor.cols - 1) / editor.cols;
    assert_eq!(rows, 2);
    assert_eq!(editor.maxrows, 2);
}

#[test]
fn refresh_repaints_identically_with_no_input() {
    let mut editor = smart_editor(80);
    drive(&mut editor, b"abc", PROMPT).unwrap();

    editor.console_mut().take_output();
    editor.refresh().unwrap();
    let first = editor.console_mut().take_output();
    editor.refresh().unwrap();
    let second = editor.console_mut().take_output();
    assert_eq!(first, second);
    assert!(!first.is_empty());
}

#[test]
fn refresh_is_a_no_op_on_dumb_terminals() {
    let mut editor = Editor::new(TestConsole::new());
    editor.probe_terminal(false);
    drive(&mut editor, b"ab", PROMPT).unwrap();
    editor.console_mut().take_output();
    editor.refresh().unwrap();
    assert!(editor.console_mut().output.is_empty());
}

#[test]
fn update_prompt_repaints_with_the_new_prompt() {
    let mut editor = smart_editor(80);
    drive(&mut editor, b"ab", PROMPT).unwrap();
    editor.console_mut().take_output();
    editor.update_prompt("new> ").unwrap();
    assert!(editor.console_mut().output_str().contains("new> "));
}

#[test]
fn clear_screen_wipes_and_forces_a_reprobe() {
    let mut editor = smart_editor(80);
    drive(&mut editor, b"ab", PROMPT).unwrap();
    editor.console_mut().take_output();

    drive(&mut editor, b"\x0c", PROMPT).unwrap();
    assert!(editor.console_mut().output_str().contains("\x1b[H\x1b[2J"));

    // The next step starts a fresh width probe.
    editor.console_mut().take_output();
    drive(&mut editor, b"", PROMPT).unwrap();
    assert!(editor.console_mut().output_str().contains("\x1b[6n"));
}

#[test]
fn every_step_preserves_the_buffer_invariants() {
    let soup: &[u8] = b"hello world\x17\x7f\x1b[D\x1b[C\x14\x0b\x15abc \x1b[H\x1b[3~\x05\x02\x06";
    let mut editor = smart_editor(80);
    editor.console_mut().push_bytes(soup);
    loop {
        let step = editor.step(PROMPT).unwrap();
        assert!(editor.pos <= editor.line.len());
        assert!(editor.line.len() <= MAX_LINE);
        if step == Step::Pending && editor.console_mut().input.is_empty() {
            break;
        }
    }
}

#[test]
fn cursor_report_parser_reads_rows_and_cols() {
    assert_eq!(parse_cursor_report(b"\x1b[24;80R"), Some((24, 80)));
    assert_eq!(parse_cursor_report(b"\x1b[1;1R"), Some((1, 1)));
    assert_eq!(parse_cursor_report(b"\x1b[12;34"), Some((12, 34)));
    assert_eq!(parse_cursor_report(b"\x1b[;80R"), None);
    assert_eq!(parse_cursor_report(b"\x1b[24R"), None);
    assert_eq!(parse_cursor_report(b"garbage"), None);
}
