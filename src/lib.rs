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
//! Columnar hash-join kernel.
//!
//! Given a join shape (a column type vector plus the indices of the join-key
//! channels), [`JoinCompiler`] produces a [`PagesHashStrategy`] specialized
//! for that shape: row hashing, row equality, and output emission over batch
//! lists of Arrow arrays, with SQL join-key null semantics (a null key hashes
//! as zero; two nulls at the same position compare equal). On top of a
//! strategy, [`InMemoryJoinHash`] indexes build-side rows by 64-bit synthetic
//! addresses and answers probes. Compiled factories are memoized per shape in
//! a bounded cache with single-flight loading.

pub mod common;
pub mod exec;
pub mod runtime;

pub use common::config::JoinCompilerOptions;
pub use exec::join::address::{decode_batch_index, decode_position, encode_address, NOT_FOUND};
pub use exec::join::compiler::{JoinCompiler, LookupSourceFactory, PagesHashStrategyFactory};
pub use exec::join::join_hash::{InMemoryJoinHash, LookupSource};
pub use exec::join::strategy::PagesHashStrategy;
pub use exec::join::{JoinError, JoinErrorKind};
pub use exec::page::page_builder::{BlockBuilder, PageBuilder};
pub use exec::page::Page;
pub use runtime::operator_context::OperatorContext;
