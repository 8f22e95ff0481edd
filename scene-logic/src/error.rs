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

//! Errors surfaced by the public engine API. Every variant carries a message
//! that names the offending node or property, so callers (and the log) never
//! have to guess which object a failure came from.

use std::fmt::{Display, Formatter};

/// The four ways a request into the engine can fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogicError {
    /// A link/unlink contract violation, a destroy of an unknown handle, or
    /// any other malformed request caught at the API boundary.
    IllegalArgument(String),
    /// A deserialization inconsistency: a missing required field, an unknown
    /// tag, an unresolved id, or a type mismatch on a bound external object.
    BinaryVersionMismatch(String),
    /// A binding setter rejected a value, or an update-time invariant failed.
    RuntimeError(String),
    /// A `DataArray` (or other resource) from a different engine instance was
    /// passed in.
    ResourceError(String),
}

impl LogicError {
    pub fn illegal_argument<S: Into<String>>(msg: S) -> Self {
        LogicError::IllegalArgument(msg.into())
    }

    pub fn binary_version_mismatch<S: Into<String>>(msg: S) -> Self {
        LogicError::BinaryVersionMismatch(msg.into())
    }

    pub fn runtime<S: Into<String>>(msg: S) -> Self {
        LogicError::RuntimeError(msg.into())
    }

    pub fn resource<S: Into<String>>(msg: S) -> Self {
        LogicError::ResourceError(msg.into())
    }

    pub fn message(&self) -> &str {
        match self {
            LogicError::IllegalArgument(m)
            | LogicError::BinaryVersionMismatch(m)
            | LogicError::RuntimeError(m)
            | LogicError::ResourceError(m) => m,
        }
    }
}

impl Display for LogicError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LogicError::IllegalArgument(m) => write!(f, "illegal argument: {m}"),
            LogicError::BinaryVersionMismatch(m) => write!(f, "binary version mismatch: {m}"),
            LogicError::RuntimeError(m) => write!(f, "runtime error: {m}"),
            LogicError::ResourceError(m) => write!(f, "resource error: {m}"),
        }
    }
}

impl std::error::Error for LogicError {}

pub type LogicResult<T> = Result<T, LogicError>;
