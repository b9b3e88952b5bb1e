use std::io::{self, Write};

use serde::Serialize;

use crate::progress::{ProgressEvent, ProgressSink};

/// Results go to stdout as pretty JSON; progress goes to stderr unless quiet.
pub struct JsonOutput {
    quiet: bool,
}

impl JsonOutput {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    pub fn print<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout().lock();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, event: ProgressEvent) {
        if self.quiet {
            return;
        }
        let mut stderr = io::stderr().lock();
        let _ = match event.elapsed {
            Some(elapsed) => writeln!(stderr, "{} ({:.1}s)", event.message, elapsed.as_secs_f64()),
            None => writeln!(stderr, "{}", event.message),
        };
    }
}
