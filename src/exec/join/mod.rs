// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.
//! Hash-join kernel module exports.
//!
//! Responsibilities:
//! - Compiles per-shape pages hash strategies and lookup-source factories.
//! - Indexes build-side rows by synthetic address and answers join probes.
//!
//! Current limitations:
//! - Shape and type errors surface at factory-compile time; probing is total
//!   and reports misses through the `NOT_FOUND` sentinel instead of errors.

use std::fmt;

pub mod address;
pub mod compiler;
pub mod join_hash;
pub(crate) mod kernel;
pub(crate) mod key_blocks;
pub mod strategy;

/// Classifies join-kernel failures; see [`JoinError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinErrorKind {
    /// Join channel index out of bounds, or the type vector is empty.
    InvalidShape,
    /// A column type does not provide hash/equality/append kernels.
    UnsupportedType,
    /// Strategy construction failed; the root cause is preserved in the message.
    Compilation,
    /// The hash index cannot be sized for the requested row count.
    Capacity,
}

#[derive(Debug, Clone)]
pub struct JoinError {
    kind: JoinErrorKind,
    message: String,
}

impl JoinError {
    pub(crate) fn invalid_shape(message: impl Into<String>) -> Self {
        Self {
            kind: JoinErrorKind::InvalidShape,
            message: message.into(),
        }
    }

    pub(crate) fn unsupported_type(message: impl Into<String>) -> Self {
        Self {
            kind: JoinErrorKind::UnsupportedType,
            message: message.into(),
        }
    }

    pub(crate) fn compilation(message: impl Into<String>) -> Self {
        Self {
            kind: JoinErrorKind::Compilation,
            message: message.into(),
        }
    }

    pub(crate) fn capacity(message: impl Into<String>) -> Self {
        Self {
            kind: JoinErrorKind::Capacity,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> JoinErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.kind {
            JoinErrorKind::InvalidShape => "invalid join shape",
            JoinErrorKind::UnsupportedType => "unsupported join key type",
            JoinErrorKind::Compilation => "join strategy compilation failed",
            JoinErrorKind::Capacity => "join hash capacity exceeded",
        };
        write!(f, "{}: {}", prefix, self.message)
    }
}

impl std::error::Error for JoinError {}
