//! ConsoleMirror - prints received lines with their receipt time

use std::io::{self, Stdout, Write};

use contracts::BootEvent;

use super::MirrorSink;

/// `HH:MM:SS.ffffff` (UTC) of a UNIX timestamp
pub(crate) fn clock_time(ts: f64) -> String {
    let day = ts.rem_euclid(86_400.0);
    let hours = (day / 3600.0).floor();
    let minutes = ((day - hours * 3600.0) / 60.0).floor();
    let seconds = day - hours * 3600.0 - minutes * 60.0;
    format!("{:02}:{:02}:{:09.6}", hours as u32, minutes as u32, seconds)
}

/// Prints every line, optionally with the delta since the previous one
pub struct ConsoleMirror<W: Write + Send = Stdout> {
    out: W,
    show_diff: bool,
    last_ts: Option<f64>,
}

impl ConsoleMirror<Stdout> {
    pub fn new(show_diff: bool) -> Self {
        Self::with_writer(io::stdout(), show_diff)
    }
}

impl<W: Write + Send> ConsoleMirror<W> {
    pub fn with_writer(out: W, show_diff: bool) -> Self {
        Self {
            out,
            show_diff,
            last_ts: None,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> MirrorSink for ConsoleMirror<W> {
    fn name(&self) -> &str {
        "console"
    }

    fn write(&mut self, event: &BootEvent) -> io::Result<()> {
        let time = clock_time(event.timestamp);
        if self.show_diff {
            let diff = self.last_ts.map(|last| event.timestamp - last);
            self.last_ts = Some(event.timestamp);
            if let Some(diff) = diff {
                return writeln!(self.out, "{time} (+{diff:.6}) {}", event.text());
            }
        }
        writeln!(self.out, "{time} {}", event.text())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}
