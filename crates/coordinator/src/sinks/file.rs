//! FileMirror - appends raw lines to a log file

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use contracts::{BootEvent, SourceTag};
use tracing::{debug, instrument};

use super::MirrorSink;

/// Writes raw lines of one source to a file, with a `run <n>` header per window
pub struct FileMirror {
    name: String,
    path: PathBuf,
    writer: BufWriter<File>,
    /// Only lines from this source; `None` keeps everything
    source: Option<SourceTag>,
}

impl FileMirror {
    /// Create (truncate) the log file
    #[instrument(name = "file_mirror_create", skip(source))]
    pub fn create(path: &Path, source: Option<SourceTag>) -> io::Result<Self> {
        debug!(path = %path.display(), "opening mirror file");
        let file = File::create(path)?;
        Ok(Self {
            name: format!("file:{}", path.display()),
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            source,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MirrorSink for FileMirror {
    fn name(&self) -> &str {
        &self.name
    }

    fn begin_run(&mut self, run: usize) -> io::Result<()> {
        write!(self.writer, "\nrun {run}\n\n")
    }

    fn write(&mut self, event: &BootEvent) -> io::Result<()> {
        if let Some(source) = &self.source {
            if event.source != *source {
                return Ok(());
            }
        }
        self.writer.write_all(&event.payload)?;
        self.writer.write_all(b"\n")
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}
