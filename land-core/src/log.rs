// Copyright (c) 2025 Redglyph (@gmail.com). All Rights Reserved.

use std::fmt::{Debug, Display, Formatter};
use crate::location::PointLocation;

pub(crate) mod tests;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum MessageType { Trace, Warning, Error }

impl Display for MessageType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageType::Trace =>   write!(f, "Trace  "),
            MessageType::Warning => write!(f, "Warning"),
            MessageType::Error =>   write!(f, "ERROR  "),
        }
    }
}

/// Diagnostic message, optionally attached to a position of the parsed text and to a source
/// (grammar, table, parser, ...).
#[derive(Clone, PartialEq, Debug)]
pub struct Message {
    pub msg_type: MessageType,
    pub text: String,
    pub location: Option<PointLocation>,
    pub source: Option<String>,
}

impl Message {
    pub fn new<T: Into<String>>(msg_type: MessageType, text: T, location: Option<PointLocation>) -> Self {
        Message { msg_type, text: text.into(), location, source: None }
    }

    pub fn trace<T: Into<String>>(text: T, location: Option<PointLocation>) -> Self {
        Message::new(MessageType::Trace, text, location)
    }

    pub fn warning<T: Into<String>>(text: T, location: Option<PointLocation>) -> Self {
        Message::new(MessageType::Warning, text, location)
    }

    pub fn error<T: Into<String>>(text: T, location: Option<PointLocation>) -> Self {
        Message::new(MessageType::Error, text, location)
    }

    pub fn with_source<T: Into<String>>(mut self, source: T) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.msg_type == MessageType::Error
    }

    pub fn is_warning(&self) -> bool {
        self.msg_type == MessageType::Warning
    }

    pub fn is_trace(&self) -> bool {
        self.msg_type == MessageType::Trace
    }
}

impl Display for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: ", self.msg_type)?;
        if let Some(source) = &self.source {
            write!(f, "[{source}] ")?;
        }
        if let Some(loc) = &self.location {
            write!(f, "({loc}) ")?;
        }
        write!(f, "{}", self.text)
    }
}

// ---------------------------------------------------------------------------------------------

/// Common log functionalities for a message consumer/status verifier
pub trait LogStatus: Debug {
    fn num_traces(&self) -> usize;
    fn num_warnings(&self) -> usize;
    fn num_errors(&self) -> usize;
    #[inline]
    fn has_no_errors(&self) -> bool {
        self.num_errors() == 0
    }
    #[inline]
    fn has_no_warnings(&self) -> bool {
        self.num_warnings() == 0
    }

    fn get_messages(&self) -> impl Iterator<Item = &Message>;

    fn get_messages_str(&self) -> String {
        self.get_messages().map(|m| format!("- {m}")).collect::<Vec<_>>().join("\n")
    }

    fn get_traces(&self) -> impl Iterator<Item = &Message> {
        self.get_messages().filter(|m| m.is_trace())
    }

    fn get_warnings(&self) -> impl Iterator<Item = &Message> {
        self.get_messages().filter(|m| m.is_warning())
    }

    fn get_errors(&self) -> impl Iterator<Item = &Message> {
        self.get_messages().filter(|m| m.is_error())
    }
}

/// Common log functionalities for a message producer
pub trait Logger: Debug {
    fn add_message(&mut self, msg: Message);

    fn add_trace<T: Into<String>>(&mut self, msg: T, location: Option<PointLocation>) {
        self.add_message(Message::trace(msg, location));
    }

    fn add_warning<T: Into<String>>(&mut self, msg: T, location: Option<PointLocation>) {
        self.add_message(Message::warning(msg, location));
    }

    fn add_error<T: Into<String>>(&mut self, msg: T, location: Option<PointLocation>) {
        self.add_message(Message::error(msg, location));
    }
}

// ---------------------------------------------------------------------------------------------

/// Basic log system that prints out messages to stderr without storing them
#[derive(Clone, Debug, Default)]
pub struct PrintLog {
    num_traces: usize,
    num_warnings: usize,
    num_errors: usize
}

impl PrintLog {
    pub fn new() -> PrintLog {
        PrintLog { num_traces: 0, num_warnings: 0, num_errors: 0 }
    }
}

impl LogStatus for PrintLog {
    fn num_traces(&self) -> usize {
        self.num_traces
    }

    fn num_warnings(&self) -> usize {
        self.num_warnings
    }

    fn num_errors(&self) -> usize {
        self.num_errors
    }

    fn get_messages(&self) -> impl Iterator<Item = &Message> {
        std::iter::empty()
    }
}

impl Logger for PrintLog {
    fn add_message(&mut self, msg: Message) {
        match msg.msg_type {
            MessageType::Trace => self.num_traces += 1,
            MessageType::Warning => self.num_warnings += 1,
            MessageType::Error => self.num_errors += 1,
        }
        eprintln!("{msg}");
    }
}

// ---------------------------------------------------------------------------------------------

/// Log system that stores the messages
#[derive(Clone, Debug, PartialEq)]
pub struct BufLog {
    messages: Vec<Message>,
    num_traces: usize,
    num_warnings: usize,
    num_errors: usize
}

impl BufLog {
    pub fn new() -> Self {
        BufLog { messages: Vec::new(), num_traces: 0, num_warnings: 0, num_errors: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Clears all messages: traces, warnings, and errors.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.num_traces = 0;
        self.num_warnings = 0;
        self.num_errors = 0;
    }

    /// Extends the messages with another log's messages.
    pub fn extend(&mut self, other: BufLog) {
        self.num_traces += other.num_traces;
        self.num_warnings += other.num_warnings;
        self.num_errors += other.num_errors;
        self.messages.extend(other.messages)
    }

    pub fn extend_messages<T: IntoIterator<Item = Message>>(&mut self, iter: T) {
        for m in iter {
            self.add_message(m);
        }
    }

    /// Sets the source of all the messages that don't have one yet.
    pub fn set_source(&mut self, source: &str) {
        for m in self.messages.iter_mut().filter(|m| m.source.is_none()) {
            m.source = Some(source.to_string());
        }
    }
}

impl LogStatus for BufLog {
    fn num_traces(&self) -> usize {
        self.num_traces
    }

    fn num_warnings(&self) -> usize {
        self.num_warnings
    }

    fn num_errors(&self) -> usize {
        self.num_errors
    }

    fn get_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }
}

impl Logger for BufLog {
    fn add_message(&mut self, msg: Message) {
        match msg.msg_type {
            MessageType::Trace => self.num_traces += 1,
            MessageType::Warning => self.num_warnings += 1,
            MessageType::Error => self.num_errors += 1,
        }
        self.messages.push(msg);
    }
}

impl Default for BufLog {
    fn default() -> Self {
        BufLog::new()
    }
}

impl Display for BufLog {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.get_messages_str())
    }
}

// ---------------------------------------------------------------------------------------------
// blanket implementations: LogReader -> LogStatus, LogWriter -> Logger

pub trait LogReader {
    type Item: LogStatus;

    fn get_log(&self) -> &Self::Item;

    fn give_log(self) -> Self::Item;
}

pub trait LogWriter {
    fn get_mut_log(&mut self) -> &mut impl Logger;
}

impl<T: LogReader + Debug> LogStatus for T {
    fn num_traces(&self) -> usize {
        self.get_log().num_traces()
    }

    fn num_warnings(&self) -> usize {
        self.get_log().num_warnings()
    }

    fn num_errors(&self) -> usize {
        self.get_log().num_errors()
    }

    fn has_no_errors(&self) -> bool {
        self.get_log().has_no_errors()
    }

    fn has_no_warnings(&self) -> bool {
        self.get_log().has_no_warnings()
    }

    fn get_messages(&self) -> impl Iterator<Item = &Message> {
        self.get_log().get_messages()
    }

    fn get_messages_str(&self) -> String {
        self.get_log().get_messages_str()
    }
}

impl<L: LogWriter + Debug> Logger for L {
    fn add_message(&mut self, msg: Message) {
        self.get_mut_log().add_message(msg);
    }
}
