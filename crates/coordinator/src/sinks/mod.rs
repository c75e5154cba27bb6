//! Raw output mirrors
//!
//! Every received line is handed to each mirror before correlation, whether
//! or not a measurement window is open.

mod console;
mod file;

use std::io;

use contracts::BootEvent;
use tracing::{debug, warn};

use crate::metrics::MirrorMetrics;

pub use self::console::ConsoleMirror;
pub use self::file::FileMirror;

/// A destination for raw lines
pub trait MirrorSink: Send {
    fn name(&self) -> &str;

    /// A measurement window opened; `run` is the number of completed iterations
    fn begin_run(&mut self, _run: usize) -> io::Result<()> {
        Ok(())
    }

    fn write(&mut self, event: &BootEvent) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;
}

/// Fan-out to every mirror; a failing mirror never stops the others
#[derive(Default)]
pub struct MirrorSet {
    mirrors: Vec<(Box<dyn MirrorSink>, MirrorMetrics)>,
}

impl MirrorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mirror: Box<dyn MirrorSink>) {
        debug!(mirror = %mirror.name(), "mirror added");
        self.mirrors.push((mirror, MirrorMetrics::new()));
    }

    pub fn write(&mut self, event: &BootEvent) {
        for (mirror, metrics) in &mut self.mirrors {
            match mirror.write(event) {
                Ok(()) => metrics.inc_write_count(),
                Err(e) => {
                    metrics.inc_failure_count();
                    warn!(mirror = %mirror.name(), error = %e, "mirror write failed");
                }
            }
        }
    }

    pub fn begin_run(&mut self, run: usize) {
        for (mirror, metrics) in &mut self.mirrors {
            if let Err(e) = mirror.begin_run(run) {
                metrics.inc_failure_count();
                warn!(mirror = %mirror.name(), error = %e, "mirror run header failed");
            }
        }
    }

    pub fn flush_all(&mut self) {
        for (mirror, _) in &mut self.mirrors {
            if let Err(e) = mirror.flush() {
                warn!(mirror = %mirror.name(), error = %e, "mirror flush failed");
            }
        }
    }

    /// `(name, metrics)` per mirror
    pub fn metrics(&self) -> Vec<(String, MirrorMetrics)> {
        self.mirrors
            .iter()
            .map(|(m, metrics)| (m.name().to_string(), *metrics))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.mirrors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mirrors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Broken;

    impl MirrorSink for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn write(&mut self, _event: &BootEvent) -> io::Result<()> {
            Err(io::Error::other("disk gone"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_failure_isolation() {
        let mut set = MirrorSet::new();
        set.push(Box::new(Broken));
        set.push(Box::new(ConsoleMirror::with_writer(Vec::new(), false)));

        set.write(&BootEvent::new(1.0, "hello", "serial"));
        set.write(&BootEvent::new(2.0, "world", "serial"));

        let metrics = set.metrics();
        assert_eq!(metrics[0].1.failure_count, 2);
        assert_eq!(metrics[1].1.write_count, 2);
    }
}
