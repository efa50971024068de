use std::io::{IsTerminal, Write};

use skydeck_core::{Notice, Notifier, NotifyError};

/// Rings the terminal bell and prints the notice on stderr.
///
/// Only available when stderr is an interactive terminal; otherwise notices
/// fall back to the dashboard's toast tray.
#[derive(Debug, Default)]
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, notice: &Notice) -> Result<(), NotifyError> {
        let stderr = std::io::stderr();
        if !stderr.is_terminal() {
            return Err(NotifyError::Unavailable);
        }

        let mut out = stderr.lock();
        let line = match &notice.body {
            Some(body) => format!("\x07! {}\n  {}", notice.title, body.replace('\n', "\n  ")),
            None => format!("\x07! {}", notice.title),
        };
        writeln!(out, "{line}").map_err(|e| NotifyError::Failed(e.to_string()))
    }
}
