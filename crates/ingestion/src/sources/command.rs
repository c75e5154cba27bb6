//! 外部命令事件源
//!
//! 运行一个外部命令并逐行读取 stdout。两种模式：
//! - 文本：每行 (或 JSON 对象中 `message_field` 的值) 作为一个事件
//! - 电平：每行最后一列 `1` / `0` 为电源状态，变化时发送 `Power`

use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use bytes::Bytes;
use contracts::{CommandSourceConfig, PowerSignalConfig, PowerState, SourceTag};
use tracing::{debug, info, trace, warn};

use crate::source::{EventSource, SourceLink, WorkerThread};
use crate::splitter::clean_line;

/// How the command's output lines are interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandMode {
    /// Each line is an event; JSON objects contribute `message_field`
    Text { message_field: Option<String> },
    /// Each line's last CSV column is a power level
    PowerLevel,
}

/// External command read line by line on its own thread
pub struct CommandSource {
    tag: SourceTag,
    command: String,
    mode: CommandMode,
    child: Arc<Mutex<Option<Child>>>,
    worker: WorkerThread,
}

impl CommandSource {
    pub fn new(tag: impl Into<SourceTag>, command: impl Into<String>, mode: CommandMode) -> Self {
        Self {
            tag: tag.into(),
            command: command.into(),
            mode,
            child: Arc::new(Mutex::new(None)),
            worker: WorkerThread::default(),
        }
    }

    /// Structured-log adapter (journald by default)
    pub fn journal(config: &CommandSourceConfig) -> Self {
        Self::new(
            config.source.as_str(),
            config.command.clone(),
            CommandMode::Text {
                message_field: config.message_field.clone(),
            },
        )
    }

    /// Digital power-state adapter
    pub fn power_signal(config: &PowerSignalConfig) -> Self {
        Self::new(
            config.source.as_str(),
            config.command.clone(),
            CommandMode::PowerLevel,
        )
    }

    pub fn mode(&self) -> &CommandMode {
        &self.mode
    }

    fn kill_child(&self) {
        let mut guard = self.child.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(mut child) = guard.take() {
            debug!(source = %self.tag, "killing command");
            if let Err(e) = child.kill() {
                trace!(source = %self.tag, error = %e, "kill failed (already exited?)");
            }
            let _ = child.wait();
        }
    }
}

impl EventSource for CommandSource {
    fn name(&self) -> &str {
        &self.tag
    }

    fn is_mandatory(&self) -> bool {
        self.mode == CommandMode::PowerLevel
    }

    fn start(&mut self, link: SourceLink) -> crate::Result<()> {
        if self.worker.is_running() {
            return Err(crate::IngestionError::AlreadyRunning {
                source_id: self.tag.to_string(),
            });
        }

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| crate::IngestionError::Spawn {
                source_id: self.tag.to_string(),
                source,
            })?;
        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            return Err(crate::IngestionError::Spawn {
                source_id: self.tag.to_string(),
                source: std::io::Error::other("stdout not captured"),
            });
        };
        info!(source = %self.tag, command = %self.command, "command started");
        *self.child.lock().unwrap_or_else(PoisonError::into_inner) = Some(child);

        let link = link.with_tag(self.tag.clone());
        let mode = self.mode.clone();
        self.worker = WorkerThread::spawn(&self.tag, move || {
            let reader = BufReader::new(stdout);
            match mode {
                CommandMode::Text { message_field } => {
                    read_text(&link, reader, message_field.as_deref())
                }
                CommandMode::PowerLevel => read_levels(&link, reader),
            }
            link.mark_lost();
            debug!(source = %link.tag(), "command output closed");
        })?;
        Ok(())
    }

    fn stop(&mut self) {
        // Killing the child closes stdout and unblocks the reader
        self.kill_child();
    }

    fn join(&mut self, deadline: Instant) -> bool {
        self.worker.join(deadline)
    }

    fn is_running(&self) -> bool {
        self.worker.is_running()
    }
}

impl Drop for CommandSource {
    fn drop(&mut self) {
        self.kill_child();
    }
}

fn read_text(link: &SourceLink, mut reader: impl BufRead, message_field: Option<&str>) {
    let mut raw = Vec::new();
    while !link.should_stop() {
        raw.clear();
        match reader.read_until(b'\n', &mut raw) {
            Ok(0) => break,
            Ok(_) => {
                let now = link.now();
                if let Some(payload) = extract_message(link, &raw, message_field) {
                    link.emit_line(now, payload);
                }
            }
            Err(e) => {
                warn!(source = %link.tag(), error = %e, "read failed");
                break;
            }
        }
    }
}

/// The line itself, or the message field when the line is a JSON object
fn extract_message(link: &SourceLink, raw: &[u8], message_field: Option<&str>) -> Option<Bytes> {
    let field = match message_field {
        Some(field) if raw.first() == Some(&b'{') => field,
        _ => return clean_line(raw),
    };
    let value: serde_json::Value = match serde_json::from_slice(raw) {
        Ok(value) => value,
        Err(e) => {
            link.metrics().record_parse_error();
            trace!(source = %link.tag(), error = %e, "not a JSON record");
            return clean_line(raw);
        }
    };
    match value.get(field)? {
        serde_json::Value::String(s) => clean_line(s.as_bytes()),
        // journald encodes non-UTF-8 messages as byte arrays
        serde_json::Value::Array(items) => {
            let bytes: Vec<u8> = items
                .iter()
                .filter_map(|v| v.as_u64())
                .filter_map(|v| u8::try_from(v).ok())
                .collect();
            clean_line(&bytes)
        }
        _ => None,
    }
}

fn read_levels(link: &SourceLink, reader: impl BufRead) {
    let mut current: Option<PowerState> = None;
    for line in reader.split(b'\n') {
        if link.should_stop() {
            break;
        }
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(source = %link.tag(), error = %e, "read failed");
                break;
            }
        };
        let Some(state) = parse_level(&line) else {
            continue;
        };
        match current {
            None => {
                debug!(source = %link.tag(), ?state, "initial power state");
                current = Some(state);
                link.mark_ready();
            }
            Some(prev) if prev != state => {
                current = Some(state);
                link.emit_power(link.now(), state);
            }
            Some(_) => {}
        }
    }
}

/// Last comma-separated column of a line as a power level
fn parse_level(line: &[u8]) -> Option<PowerState> {
    let text = std::str::from_utf8(line).ok()?;
    let last = text.trim_end().rsplit(',').next()?;
    PowerState::from_level(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::test_support;
    use contracts::SourceMessage;
    use std::time::Duration;

    fn drain(rx: &async_channel::Receiver<SourceMessage>) -> Vec<SourceMessage> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level(b"0.000125,1"), Some(PowerState::On));
        assert_eq!(parse_level(b"0"), Some(PowerState::Off));
        assert_eq!(parse_level(b"Time,D0"), None);
    }

    #[test]
    fn test_levels_emit_changes_only() {
        let (link, rx, readiness) = test_support::link("sigrok", 0);
        let input: &[u8] = b"Time,D0\n0.0,0\n0.1,0\n0.2,1\n0.3,1\n0.4,0\n";
        read_levels(&link, input);

        assert!(readiness.is_complete());
        let msgs = drain(&rx);
        assert_eq!(msgs[0], SourceMessage::Ready);
        let states: Vec<_> = msgs
            .iter()
            .filter_map(|m| match m {
                SourceMessage::Power { state, .. } => Some(*state),
                _ => None,
            })
            .collect();
        assert_eq!(states, vec![PowerState::On, PowerState::Off]);
    }

    #[test]
    fn test_json_message_field() {
        let (link, rx, _) = test_support::link("journald", 0);
        let input: &[u8] =
            b"{\"MESSAGE\":\"Reached target Multi-User\",\"PRIORITY\":\"6\"}\nplain line\r\n{\"MESSAGE\":[104,105]}\n{\"OTHER\":1}\n";
        read_text(&link, input, Some("MESSAGE"));

        let texts: Vec<_> = drain(&rx)
            .into_iter()
            .filter_map(|m| match m {
                SourceMessage::Event(ev) => Some(ev.text()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["Reached target Multi-User", "plain line", "hi"]);
    }

    #[test]
    fn test_spawned_command_is_read_and_joined() {
        let mut source = CommandSource::new(
            "journald",
            "printf 'one\\ntwo\\n'",
            CommandMode::Text {
                message_field: None,
            },
        );
        assert!(!source.is_mandatory());
        let (link, rx, _) = test_support::link("journald", 0);
        source.start(link).unwrap();
        assert!(source.join(Instant::now() + Duration::from_secs(5)));
        assert_eq!(drain(&rx).len(), 2);
        source.stop();
    }
}
