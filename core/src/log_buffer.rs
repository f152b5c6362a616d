//! In-memory sink for the `log` facade. The core only emits records; a host
//! drains them between slices of execution and prints them however it likes.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, OnceLock};

pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    pub level: log::Level,
    pub target: String,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:<5} {}] {}", self.level, self.target, self.message)
    }
}

/// Bounded FIFO of log entries. Once full, the oldest entry is evicted and
/// counted as dropped.
pub struct LogBuffer {
    entries: VecDeque<LogEntry>,
    capacity: usize,
    dropped: u64,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    pub fn push(&mut self, entry: LogEntry) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
            self.dropped += 1;
        }
        self.entries.push_back(entry);
    }

    pub fn drain(&mut self) -> Vec<LogEntry> {
        self.entries.drain(..).collect()
    }

    pub fn entries(&self) -> &VecDeque<LogEntry> {
        &self.entries
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Shrinks or grows the buffer, evicting from the front if needed.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
            self.dropped += 1;
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.dropped = 0;
    }
}

static LOG_BUFFER: OnceLock<Mutex<LogBuffer>> = OnceLock::new();

pub fn global_buffer() -> &'static Mutex<LogBuffer> {
    LOG_BUFFER.get_or_init(|| Mutex::new(LogBuffer::new(DEFAULT_CAPACITY)))
}

pub struct BufferLogger;

impl log::Log for BufferLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let entry = LogEntry {
            level: record.level(),
            target: record.target().to_string(),
            message: record.args().to_string(),
        };
        if let Ok(mut buf) = global_buffer().lock() {
            buf.push(entry);
        }
    }

    fn flush(&self) {}
}

static LOGGER: BufferLogger = BufferLogger;

/// Installs the buffered logger. Fails if another logger is already set.
pub fn init_logger(level: log::LevelFilter, capacity: usize) -> Result<(), log::SetLoggerError> {
    if let Ok(mut buf) = global_buffer().lock() {
        buf.set_capacity(capacity);
    }
    log::set_logger(&LOGGER).map(|()| log::set_max_level(level))
}

pub fn drain_logs() -> Vec<LogEntry> {
    global_buffer()
        .lock()
        .map(|mut buf| buf.drain())
        .unwrap_or_default()
}

pub fn dropped_logs() -> u64 {
    global_buffer().lock().map(|buf| buf.dropped()).unwrap_or(0)
}

pub fn clear_logs() {
    if let Ok(mut buf) = global_buffer().lock() {
        buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(message: &str) -> LogEntry {
        LogEntry { level: log::Level::Info, target: "cpu".into(), message: message.into() }
    }

    #[test]
    fn full_buffer_evicts_oldest_and_counts_it() {
        let mut buf = LogBuffer::new(2);
        for m in ["a", "b", "c"] {
            buf.push(entry(m));
        }
        assert_eq!(buf.dropped(), 1);
        let messages: Vec<_> = buf.drain().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, ["b", "c"]);
        assert!(buf.entries().is_empty());
    }

    #[test]
    fn shrinking_evicts_from_the_front() {
        let mut buf = LogBuffer::new(4);
        for m in ["a", "b", "c", "d"] {
            buf.push(entry(m));
        }
        buf.set_capacity(1);
        assert_eq!(buf.capacity(), 1);
        assert_eq!(buf.dropped(), 3);
        assert_eq!(buf.entries().front().map(|e| e.message.as_str()), Some("d"));

        buf.clear();
        assert_eq!(buf.dropped(), 0);
    }

    #[test]
    fn zero_capacity_still_keeps_the_latest_entry() {
        let mut buf = LogBuffer::new(0);
        buf.push(entry("only"));
        assert_eq!(buf.entries().len(), 1);
    }

    #[test]
    fn global_logger_captures_and_clears() {
        let _ = init_logger(log::LevelFilter::Info, DEFAULT_CAPACITY);
        log::info!(target: "log_test", "kept");
        assert!(drain_logs().iter().any(|e| e.target == "log_test" && e.message == "kept"));

        log::info!(target: "log_test", "cleared");
        clear_logs();
        assert_eq!(dropped_logs(), 0);
        assert!(!drain_logs().iter().any(|e| e.target == "log_test"));
    }

    #[test]
    fn display_shows_level_target_and_message() {
        let e = LogEntry { level: log::Level::Warn, target: "bus".into(), message: "open bus".into() };
        assert_eq!(e.to_string(), "[WARN  bus] open bus");
    }
}
