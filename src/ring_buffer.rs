// src/ring_buffer.rs
//! Ring buffer logger with bounded memory.
//!
//! Keeps the most recent log records in a fixed-size buffer with FIFO
//! eviction. Useful as an in-process sink when no logging backend is wired
//! up, and for asserting on what an interceptor reported.
//!
//! # Design Principles
//!
//! - **Bounded memory**: fixed maximum entry count and per-entry byte cap
//! - **FIFO eviction**: oldest records are dropped first
//! - **RwLock-based**: concurrent readers, exclusive writers
//! - **Cheap reads**: entries share `Arc<str>` text
//!
//! # Example
//!
//! ```rust
//! use intercept_errors::{LogContext, LogLevel, Logger, RingBufferLogger};
//!
//! let logger = RingBufferLogger::new(100, 1024);
//! logger.log(LogLevel::Error, "failed in {file}", &LogContext::new().with("file", "main.rs"));
//!
//! let recent = logger.get_recent(1);
//! assert_eq!(recent[0].message.as_ref(), "failed in main.rs");
//! ```

use crate::format::{interpolate, truncate_to};
use crate::{LogContext, LogLevel, Logger};
use smallvec::SmallVec;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

/// Maximum bytes kept for any single context value.
const MAX_CONTEXT_VALUE_BYTES: usize = 128;

/// A single buffered log record with bounded size.
#[derive(Clone, Debug)]
pub struct LogEntry {
    /// Unix timestamp at which the record was written
    pub timestamp: u64,
    /// Level the record was logged at
    pub level: LogLevel,
    /// Rendered message (template with context substituted)
    pub message: Arc<str>,
    /// Original template
    pub template: Arc<str>,
    /// Context fields, values capped per field
    pub context: Arc<[(Arc<str>, Arc<str>)]>,
    /// Approximate size in bytes
    pub size_bytes: usize,
}

/// Fixed-size ring buffer with exact allocation (no growth).
struct RingBuffer {
    entries: Box<[Option<LogEntry>]>,
    /// Write position
    tail: usize,
    /// Oldest entry
    head: usize,
    len: usize,
}

impl RingBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            entries: std::iter::repeat_with(|| None)
                .take(capacity)
                .collect::<Box<[Option<LogEntry>]>>(),
            tail: 0,
            head: 0,
            len: 0,
        }
    }

    fn push(&mut self, entry: LogEntry) -> Option<LogEntry> {
        let evicted = self.entries[self.tail].replace(entry);
        self.tail = (self.tail + 1) % self.entries.len();

        if self.len < self.entries.len() {
            self.len += 1;
        } else {
            self.head = (self.head + 1) % self.entries.len();
        }

        evicted
    }

    #[inline]
    fn len(&self) -> usize {
        self.len
    }

    fn iter(&self) -> impl DoubleEndedIterator<Item = &LogEntry> {
        let head = self.head;
        let cap = self.entries.len();

        (0..self.len).filter_map(move |i| self.entries[(head + i) % cap].as_ref())
    }

    fn clear(&mut self) {
        for entry in self.entries.iter_mut() {
            *entry = None;
        }
        self.head = 0;
        self.tail = 0;
        self.len = 0;
    }
}

/// Logger that keeps the most recent records in memory.
///
/// Clones share the same buffer.
#[derive(Clone)]
pub struct RingBufferLogger {
    buffer: Arc<RwLock<RingBuffer>>,
    max_entries: usize,
    max_entry_bytes: usize,
    eviction_count: Arc<AtomicU64>,
}

impl RingBufferLogger {
    /// Create a new ring buffer logger.
    ///
    /// * `max_entries` - records kept before FIFO eviction (at least one)
    /// * `max_entry_bytes` - byte cap for the rendered message and context of one record
    pub fn new(max_entries: usize, max_entry_bytes: usize) -> Self {
        let bounded_entries = max_entries.max(1);
        Self {
            buffer: Arc::new(RwLock::new(RingBuffer::new(bounded_entries))),
            max_entries: bounded_entries,
            max_entry_bytes,
            eviction_count: Arc::new(AtomicU64::new(0)),
        }
    }

    #[inline]
    fn read_buffer(&self) -> RwLockReadGuard<'_, RingBuffer> {
        match self.buffer.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[inline]
    fn write_buffer(&self) -> RwLockWriteGuard<'_, RingBuffer> {
        match self.buffer.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn create_entry(&self, level: LogLevel, template: &str, context: &LogContext) -> LogEntry {
        let mut remaining = self.max_entry_bytes;

        let rendered = interpolate(template, context);
        let message = truncate_to(&rendered, remaining);
        let mut size = message.len();
        remaining = remaining.saturating_sub(message.len());

        let mut fields: SmallVec<[(Arc<str>, Arc<str>); 8]> = SmallVec::new();
        for (key, value) in context.iter() {
            if key.len() >= remaining {
                break;
            }
            let value_cap = (remaining - key.len()).min(MAX_CONTEXT_VALUE_BYTES);
            let value = truncate_to(value, value_cap);
            let used = key.len() + value.len();
            size += used;
            remaining = remaining.saturating_sub(used);
            fields.push((Arc::from(key), Arc::from(value.as_ref())));
        }

        LogEntry {
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_or(0, |d| d.as_secs()),
            level,
            message: Arc::from(message.as_ref()),
            template: Arc::from(template),
            context: fields.into_vec().into_boxed_slice().into(),
            size_bytes: size,
        }
    }

    /// Get the N most recent entries, newest first.
    pub fn get_recent(&self, count: usize) -> Vec<LogEntry> {
        let buffer = self.read_buffer();
        buffer.iter().rev().take(count).cloned().collect()
    }

    /// Get all entries, newest first.
    pub fn get_all(&self) -> Vec<LogEntry> {
        let buffer = self.read_buffer();
        buffer.iter().rev().cloned().collect()
    }

    /// Get entries matching a predicate, oldest first.
    pub fn get_filtered<F>(&self, predicate: F) -> Vec<LogEntry>
    where
        F: Fn(&LogEntry) -> bool,
    {
        let buffer = self.read_buffer();
        buffer.iter().filter(|e| predicate(e)).cloned().collect()
    }

    /// Number of buffered entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.read_buffer().len()
    }

    /// Returns whether nothing is buffered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total payload bytes across buffered entries.
    pub fn payload_bytes(&self) -> usize {
        self.read_buffer().iter().map(|e| e.size_bytes).sum()
    }

    /// Number of evictions since creation.
    #[inline]
    pub fn eviction_count(&self) -> u64 {
        self.eviction_count.load(Ordering::Relaxed)
    }

    /// Drops every buffered entry.
    pub fn clear(&self) {
        self.write_buffer().clear();
    }

    /// Maximum number of entries kept.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.max_entries
    }
}

impl Logger for RingBufferLogger {
    fn log(&self, level: LogLevel, message: &str, context: &LogContext) {
        let entry = self.create_entry(level, message, context);
        if self.write_buffer().push(entry).is_some() {
            self.eviction_count.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_n(logger: &RingBufferLogger, n: usize) {
        for i in 0..n {
            logger.log(
                LogLevel::Error,
                "error {n}",
                &LogContext::new().with("n", i.to_string()),
            );
        }
    }

    #[test]
    fn ring_buffer_evicts_oldest() {
        let logger = RingBufferLogger::new(3, 1024);
        log_n(&logger, 5);

        assert_eq!(logger.len(), 3);
        assert_eq!(logger.eviction_count(), 2);

        let entries = logger.get_all();
        assert_eq!(entries[0].message.as_ref(), "error 4");
        assert_eq!(entries[2].message.as_ref(), "error 2");
    }

    #[test]
    fn ring_buffer_respects_size_limit() {
        let logger = RingBufferLogger::new(10, 128);
        let context = LogContext::new().with("message", "A".repeat(10_000));
        logger.log(LogLevel::Error, "{message}", &context);

        let entry = &logger.get_recent(1)[0];
        assert!(entry.size_bytes <= 128);
        assert!(entry.message.contains("TRUNCATED"));
    }

    #[test]
    fn keeps_template_level_and_context() {
        let logger = RingBufferLogger::new(10, 1024);
        let context = LogContext::new().with("file", "f.rs").with("line", 3u32);
        logger.log(LogLevel::Warning, "at {file}[{line}]", &context);

        let entry = &logger.get_recent(1)[0];
        assert_eq!(entry.level, LogLevel::Warning);
        assert_eq!(entry.template.as_ref(), "at {file}[{line}]");
        assert_eq!(entry.message.as_ref(), "at f.rs[3]");
        assert_eq!(entry.context.len(), 2);
        assert_eq!(entry.context[1].1.as_ref(), "3");
    }

    #[test]
    fn filtering_by_level() {
        let logger = RingBufferLogger::new(10, 1024);
        logger.log(LogLevel::Error, "a", &LogContext::new());
        logger.log(LogLevel::Debug, "b", &LogContext::new());
        logger.log(LogLevel::Error, "c", &LogContext::new());

        let errors = logger.get_filtered(|e| e.level == LogLevel::Error);
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].message.as_ref(), "a");
    }

    #[test]
    fn clone_shares_state_and_clear_empties() {
        let logger1 = RingBufferLogger::new(10, 1024);
        let logger2 = logger1.clone();
        log_n(&logger1, 2);
        assert_eq!(logger2.len(), 2);

        logger2.clear();
        assert!(logger1.is_empty());
        assert_eq!(logger1.capacity(), 10);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let logger = RingBufferLogger::new(0, 1024);
        log_n(&logger, 2);
        assert_eq!(logger.len(), 1);
        assert_eq!(logger.eviction_count(), 1);
    }

    #[test]
    fn concurrent_logging() {
        use std::thread;

        let logger = RingBufferLogger::new(64, 256);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let logger = logger.clone();
                thread::spawn(move || log_n(&logger, 50))
            })
            .collect();

        for handle in handles {
            handle.join().expect("thread panicked");
        }

        assert_eq!(logger.len(), 64);
        assert_eq!(logger.eviction_count(), 8 * 50 - 64);
    }
}
