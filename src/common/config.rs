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
use serde::Deserialize;

fn default_cache_capacity() -> usize {
    1000
}

/// Options for [`crate::JoinCompiler`].
///
/// Deserializable so an embedding engine can splice this into its own config
/// file; every field has a default and `JoinCompiler::default()` uses them.
#[derive(Debug, Clone, Deserialize)]
pub struct JoinCompilerOptions {
    /// Upper bound on memoized shapes in the specialization cache.
    /// Least-recently-used shapes are evicted on insert overflow.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Log the key layout selected for each cache miss at DEBUG level.
    /// Diagnostics only; has no semantic effect.
    #[serde(default)]
    pub trace_specializations: bool,
}

impl Default for JoinCompilerOptions {
    fn default() -> Self {
        Self {
            cache_capacity: default_cache_capacity(),
            trace_specializations: false,
        }
    }
}
