// Copyright (c) 2024-present the scene-logic contributors.
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT.

//! Process-wide logging sink. There's no shortage of logging crates, but a
//! single global `Log` that every part of the engine (including code that
//! has no reasonable way to thread a logger handle through, like a `Drop`
//! impl) can reach is what's actually needed here.

use lazy_static::lazy_static;
use parking_lot::Mutex;
use std::fmt::{Display, Formatter};

/// Severity of a logged message.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MessageKind {
    Information,
    Warning,
    Error,
}

impl Display for MessageKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageKind::Information => write!(f, "[INFO]"),
            MessageKind::Warning => write!(f, "[WARN]"),
            MessageKind::Error => write!(f, "[ERR]"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct LogMessage {
    pub kind: MessageKind,
    pub content: String,
}

impl Display for LogMessage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind, self.content)
    }
}

pub struct Log {
    messages: Vec<LogMessage>,
    verbosity: MessageKind,
}

lazy_static! {
    static ref LOG: Mutex<Log> = Mutex::new(Log {
        messages: Vec::new(),
        verbosity: MessageKind::Information,
    });
}

impl Log {
    /// Messages below this severity are still recorded but not printed to
    /// stderr/stdout.
    pub fn set_verbosity(kind: MessageKind) {
        LOG.lock().verbosity = kind;
    }

    pub fn info<S: Into<String>>(msg: S) {
        Self::write(MessageKind::Information, msg.into());
    }

    pub fn warn<S: Into<String>>(msg: S) {
        Self::write(MessageKind::Warning, msg.into());
    }

    pub fn err<S: Into<String>>(msg: S) {
        Self::write(MessageKind::Error, msg.into());
    }

    fn write(kind: MessageKind, content: String) {
        let mut log = LOG.lock();
        if kind as u8 >= log.verbosity as u8 {
            let line = LogMessage {
                kind,
                content: content.clone(),
            };
            match kind {
                MessageKind::Error => eprintln!("{line}"),
                _ => println!("{line}"),
            }
        }
        log.messages.push(LogMessage { kind, content });
    }

    /// Drains and returns every message recorded so far, in order.
    pub fn flush() -> Vec<LogMessage> {
        std::mem::take(&mut LOG.lock().messages)
    }
}
