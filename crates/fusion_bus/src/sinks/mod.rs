//! Sink implementations
//!
//! Contains LogSink, FileSink, TerminalSink and MqttSink.

mod file;
mod log;
mod mqtt;
mod terminal;

pub use self::file::{FileSink, FileSinkConfig};
pub use self::log::LogSink;
pub use self::mqtt::{MqttMessage, MqttPlanner, MqttSink, MqttSinkConfig, TopicMetric, UserTopics};
pub use self::terminal::{render_table, TerminalSink};
