//! Operator keyboard input.

use std::io::BufRead;
use tokio::sync::mpsc;
use tracing::warn;

/// Whether an input line asks to quit.
pub fn is_quit(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("q")
}

/// Forward the lines of `input` from a detached thread.
///
/// A blocking stdin read cannot be cancelled, so it must not live on the
/// runtime's blocking pool or shutdown would wait for the next Enter. The
/// receiver yields `None` once the input ends.
pub fn spawn_line_reader<R>(input: R) -> mpsc::UnboundedReceiver<String>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in input.lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Could not read from stdin");
                    return;
                }
            }
        }
    });
    rx
}
