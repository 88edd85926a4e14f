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
use std::sync::Arc;

use crate::runtime::mem_tracker::MemTracker;

/// Per-operator execution context handed to lookup-source construction.
///
/// Carries the operator's memory tracker node; the join hash registers its
/// retained bytes against a child of this node.
#[derive(Debug, Clone)]
pub struct OperatorContext {
    mem_tracker: Arc<MemTracker>,
}

impl OperatorContext {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            mem_tracker: MemTracker::new_root(label),
        }
    }

    pub fn with_mem_tracker(mem_tracker: Arc<MemTracker>) -> Self {
        Self { mem_tracker }
    }

    pub fn mem_tracker(&self) -> &Arc<MemTracker> {
        &self.mem_tracker
    }
}
