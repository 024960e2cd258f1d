//! Output sinks that receive interpreter `print` output.

use std::io::Write;

use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedSender;

/// Append-only destination for printed output.
///
/// Every printed string is forwarded as soon as it is produced.
pub trait OutputSink: Send + Sync {
    /// Append `text`.
    fn write(&self, text: &str);
}

/// Streams output as chunks over a channel.
///
/// Writes after the receiver is gone are dropped silently; the client
/// disconnecting does not interrupt a running script.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: UnboundedSender<String>,
}

impl ChannelSink {
    /// Wrap a sender.
    pub fn new(tx: UnboundedSender<String>) -> Self {
        Self { tx }
    }
}

impl OutputSink for ChannelSink {
    fn write(&self, text: &str) {
        let _ = self.tx.send(text.to_string());
    }
}

/// Collects output in memory.
#[derive(Debug, Default)]
pub struct BufferSink {
    buf: Mutex<String>,
}

impl BufferSink {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far.
    pub fn contents(&self) -> String {
        self.buf.lock().clone()
    }

    /// Take the contents, leaving the buffer empty.
    pub fn take(&self) -> String {
        std::mem::take(&mut *self.buf.lock())
    }
}

impl OutputSink for BufferSink {
    fn write(&self, text: &str) {
        self.buf.lock().push_str(text);
    }
}

/// Writes output straight to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn write(&self, text: &str) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }
}

/// Writes output straight to stderr, keeping stdout free for results.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl OutputSink for StderrSink {
    fn write(&self, text: &str) {
        let mut err = std::io::stderr().lock();
        let _ = err.write_all(text.as_bytes());
        let _ = err.flush();
    }
}

/// Emits each write as a tracing event.
#[derive(Debug, Clone)]
pub struct TracingSink {
    label: String,
}

impl TracingSink {
    /// Create a sink whose events carry `label`.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl OutputSink for TracingSink {
    fn write(&self, text: &str) {
        tracing::info!(target: "sandpit::script_output", label = %self.label, output = %text, "Script output");
    }
}
