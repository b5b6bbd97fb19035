use std::io::{Read, Write as _};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use color_eyre::eyre::eyre;
use termwiz::caps::Capabilities;
use termwiz::terminal::{new_terminal, Terminal};
use tracing_subscriber::EnvFilter;

use feedline::{Completions, Console, EditError, Editor, Hint, Step};

const HISTORY_FILE: &str = "history.txt";
const PROBE_TIMEOUT: Duration = Duration::from_millis(100);

/// Console backed by the process stdio: a reader thread pumps stdin bytes
/// into a channel so polling never blocks, writes go straight to stdout.
struct StdConsole {
    input: Receiver<u8>,
    stdout: std::io::Stdout,
    deadline: Option<Instant>,
}

impl Console for StdConsole {
    fn poll_byte(&mut self) -> Option<u8> {
        match self.input.try_recv() {
            Ok(byte) => Some(byte),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), EditError> {
        self.stdout.write_all(bytes)?;
        self.stdout.flush()?;
        Ok(())
    }

    fn arm_timeout(&mut self) {
        self.deadline = Some(Instant::now() + PROBE_TIMEOUT);
    }

    fn timeout_elapsed(&mut self) -> bool {
        self.deadline
            .is_some_and(|deadline| Instant::now() >= deadline)
    }
}

fn spawn_stdin_pump() -> Receiver<u8> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut stdin = std::io::stdin();
        let mut byte = [0u8; 1];
        while let Ok(1) = stdin.read(&mut byte) {
            if tx.send(byte[0]).is_err() {
                break;
            }
        }
    });
    rx
}

fn complete(line: &str, candidates: &mut Completions) {
    if line.starts_with('h') {
        candidates.add("hello");
        candidates.add("hello there");
    }
    if line.eq_ignore_ascii_case("/q") {
        candidates.add("/quit");
    }
    if line.eq_ignore_ascii_case("/c") {
        candidates.add("/count");
    }
}

fn hint(line: &str) -> Option<Hint> {
    if line.eq_ignore_ascii_case("hello") {
        return Some(Hint::new("World", "- Displays a traditional greeting"));
    }
    if line.eq_ignore_ascii_case("/q") {
        return Some(Hint::new("/Quit", "- Exits this example"));
    }
    if line.eq_ignore_ascii_case("/c") {
        return Some(Hint::new("/Count", "- Prints the background counter"));
    }
    None
}

fn run(editor: &mut Editor<StdConsole>) -> Result<(), EditError> {
    editor
        .console_mut()
        .write(b"Press Ctrl-D or type '/quit' to quit\r\n")?;

    if editor.history_mut().load(Path::new(HISTORY_FILE)).is_err() {
        // No history file yet; seed one entry so Up has something to show.
        editor.history_mut().add("previously-entered");
    }

    // The background work the non-blocking editor is interleaved with.
    let mut counter: u64 = 0;

    loop {
        match editor.step("hello> ")? {
            Step::Pending => {
                counter += 1;
                thread::sleep(Duration::from_millis(1));
            }
            Step::Interrupted => continue,
            Step::Eof => break,
            Step::Committed(line) => {
                if line == "/quit" {
                    editor
                        .console_mut()
                        .write(b"\r\nQuit command received. Exiting now.\r\n")?;
                    break;
                } else if let Some(len) = line.strip_prefix("/historylen") {
                    match len.trim().parse() {
                        Ok(len) => {
                            editor.history_mut().set_max_len(len);
                        }
                        Err(_) => {
                            editor
                                .console_mut()
                                .write(b"\r\nusage: /historylen <n>\r\n")?;
                        }
                    }
                } else if line == "/count" {
                    let report = format!("\r\nCounter: {counter}\r\n");
                    editor.console_mut().write(report.as_bytes())?;
                } else if line.starts_with('/') {
                    let report = format!("\r\nUnrecognized command: {line}\r\n");
                    editor.console_mut().write(report.as_bytes())?;
                } else if !line.is_empty() {
                    let echo = format!("\r\necho: '{line}'\r\n");
                    editor.console_mut().write(echo.as_bytes())?;
                    editor.history_mut().add(&line);
                    editor.history_mut().save(Path::new(HISTORY_FILE))?;
                }
            }
        }
    }
    Ok(())
}

fn init_tracing() -> color_eyre::Result<()> {
    use std::fs::File;
    use std::path::PathBuf;
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let log_path = PathBuf::from("feedline.log");

    File::options().create(true).append(true).open(&log_path)?;

    let writer = tracing_subscriber::fmt::writer::BoxMakeWriter::new({
        let log_path = log_path.clone();
        move || {
            File::options()
                .create(true)
                .append(true)
                .open(&log_path)
                .expect("log file should remain writable")
        }
    });

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer),
        )
        .with(EnvFilter::from_default_env())
        .try_init()
        .map_err(|error| color_eyre::eyre::eyre!(error))?;

    Ok(())
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    init_tracing()?;

    let keycodes = match std::env::args().nth(1) {
        None => false,
        Some(flag) if flag == "--keycodes" => true,
        Some(flag) => return Err(eyre!("usage: feedline [--keycodes], got {flag:?}")),
    };

    let caps = Capabilities::new_from_env().map_err(|err| eyre!("{err}"))?;
    let mut terminal = new_terminal(caps).map_err(|err| eyre!("{err}"))?;
    terminal.set_raw_mode().map_err(|err| eyre!("{err}"))?;

    let console = StdConsole {
        input: spawn_stdin_pump(),
        stdout: std::io::stdout(),
        deadline: None,
    };
    let mut editor = Editor::new(console)
        .with_completion(complete)
        .with_hints(hint);

    let result = if keycodes {
        editor.print_key_codes()
    } else {
        run(&mut editor)
    };

    let _ = terminal.set_cooked_mode();
    result.map_err(|err| eyre!(format!("{err:?}")))
}
