//! 设备行事件源 (串口控制台)
//!
//! 等待设备节点出现，打开后按块读取并切行；断开后关闭并重连。

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::{Duration, Instant};

use contracts::{SerialSourceConfig, SourceTag};
use tracing::{debug, info, warn};

use crate::source::{sleep_unless_stopped, EventSource, SourceLink, WorkerThread};
use crate::splitter::LineSplitter;

/// Device path meaning "read standard input"
pub const STDIN_DEVICE: &str = "-";

const READ_CHUNK: usize = 4096;

/// Line-oriented device reader with reconnect loop
pub struct DeviceLineSource {
    tag: SourceTag,
    device: String,
    ready_when_absent: bool,
    poll_interval: Duration,
    worker: WorkerThread,
}

impl DeviceLineSource {
    pub fn new(config: &SerialSourceConfig) -> Self {
        Self {
            tag: SourceTag::new(SourceTag::SERIAL),
            device: config.device.clone(),
            ready_when_absent: config.reconnect,
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            worker: WorkerThread::default(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<SourceTag>) -> Self {
        self.tag = tag.into();
        self
    }

    pub fn device(&self) -> &str {
        &self.device
    }
}

impl EventSource for DeviceLineSource {
    fn name(&self) -> &str {
        &self.tag
    }

    fn is_mandatory(&self) -> bool {
        true
    }

    fn start(&mut self, link: SourceLink) -> crate::Result<()> {
        if self.worker.is_running() {
            return Err(crate::IngestionError::AlreadyRunning {
                source_id: self.tag.to_string(),
            });
        }
        let device = self.device.clone();
        let ready_when_absent = self.ready_when_absent;
        let poll = self.poll_interval;
        let link = link.with_tag(self.tag.clone());

        self.worker = WorkerThread::spawn(&self.tag, move || {
            if device == STDIN_DEVICE {
                read_stdin(&link);
            } else {
                device_loop(&link, Path::new(&device), ready_when_absent, poll);
            }
            debug!(source = %link.tag(), "device source exited");
        })?;
        Ok(())
    }

    fn stop(&mut self) {
        // The thread polls the stop token between reads
    }

    fn join(&mut self, deadline: Instant) -> bool {
        self.worker.join(deadline)
    }

    fn is_running(&self) -> bool {
        self.worker.is_running()
    }
}

fn device_loop(link: &SourceLink, path: &Path, ready_when_absent: bool, poll: Duration) {
    let mut waiting_logged = false;
    while !link.should_stop() {
        if !path.exists() {
            if ready_when_absent {
                // Target-powered adapter: absent until the board is on
                link.mark_ready();
            }
            if !waiting_logged {
                info!(device = %path.display(), "waiting for device");
                waiting_logged = true;
            }
            if !sleep_unless_stopped(link, poll) {
                break;
            }
            continue;
        }

        match File::open(path) {
            Ok(file) => {
                info!(device = %path.display(), "device opened");
                waiting_logged = false;
                link.mark_ready();
                read_until_closed(link, file);
                link.mark_lost();
                debug!(device = %path.display(), "device closed");
            }
            Err(e) => {
                warn!(device = %path.display(), error = %e, "failed to open device");
                if !sleep_unless_stopped(link, poll) {
                    break;
                }
            }
        }
    }
}

fn read_stdin(link: &SourceLink) {
    link.mark_ready();
    read_until_closed(link, std::io::stdin().lock());
    link.mark_lost();
}

/// Read chunks until EOF, error or stop; emits every complete line
fn read_until_closed(link: &SourceLink, mut reader: impl Read) {
    let mut splitter = LineSplitter::new();
    let mut chunk = [0u8; READ_CHUNK];
    let mut last_read = None;
    while !link.should_stop() {
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                let now = link.now();
                if let Some(last) = last_read.replace(now) {
                    link.metrics().record_read_gap(now - last);
                }
                for (timestamp, line) in splitter.push(&chunk[..n], now) {
                    link.emit_line(timestamp, line);
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(source = %link.tag(), error = %e, "read failed");
                break;
            }
        }
    }
    if let Some((timestamp, line)) = splitter.flush() {
        link.emit_line(timestamp, line);
    }
}
