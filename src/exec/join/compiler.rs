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
//! Join kernel specialization: compiles per-shape strategy and lookup-source
//! factories and memoizes them in a bounded cache.
//!
//! Responsibilities:
//! - Validates join shapes and binds a key layout before anything is cached,
//!   so shape and type errors never surface at probe time.
//! - Memoizes lookup-source factories per shape with least-recently-used
//!   eviction and single-flight loading.

use std::sync::{Arc, Mutex, OnceLock};

use arrow::array::ArrayRef;
use arrow::datatypes::DataType;
use hashbrown::HashMap;

use crate::common::config::JoinCompilerOptions;
use crate::exec::join::join_hash::InMemoryJoinHash;
use crate::exec::join::kernel::{validate_join_shape, JoinKeyKind};
use crate::exec::join::strategy::{
    create_strategy, pick_join_key_layout, JoinKeyLayout, PagesHashStrategy,
};
use crate::exec::join::JoinError;
use crate::runtime::operator_context::OperatorContext;

/// Builds ready strategies for one validated join shape.
#[derive(Debug)]
pub struct PagesHashStrategyFactory {
    types: Vec<DataType>,
    join_channels: Vec<usize>,
    key_kinds: Vec<JoinKeyKind>,
    layout: JoinKeyLayout,
}

impl PagesHashStrategyFactory {
    pub fn try_new(types: &[DataType], join_channels: &[usize]) -> Result<Self, JoinError> {
        let key_kinds = validate_join_shape(types, join_channels)?;
        let layout = pick_join_key_layout(&key_kinds);
        Ok(Self::from_parts(types, join_channels, key_kinds, layout))
    }

    fn from_parts(
        types: &[DataType],
        join_channels: &[usize],
        key_kinds: Vec<JoinKeyKind>,
        layout: JoinKeyLayout,
    ) -> Self {
        Self {
            types: types.to_vec(),
            join_channels: join_channels.to_vec(),
            key_kinds,
            layout,
        }
    }

    pub fn types(&self) -> &[DataType] {
        &self.types
    }

    pub fn join_channels(&self) -> &[usize] {
        &self.join_channels
    }

    /// Bind the shape's layout to concrete batch lists, indexed
    /// `[channel][batch]`.
    pub fn create_pages_hash_strategy(
        &self,
        channels: &[Vec<ArrayRef>],
    ) -> Result<Arc<dyn PagesHashStrategy>, JoinError> {
        create_strategy(
            self.layout,
            &self.types,
            &self.join_channels,
            &self.key_kinds,
            channels,
        )
    }
}

/// Assembles lookup sources for one validated join shape.
#[derive(Debug)]
pub struct LookupSourceFactory {
    strategy_factory: PagesHashStrategyFactory,
}

impl LookupSourceFactory {
    pub fn try_new(types: &[DataType], join_channels: &[usize]) -> Result<Self, JoinError> {
        Ok(Self {
            strategy_factory: PagesHashStrategyFactory::try_new(types, join_channels)?,
        })
    }

    pub fn pages_hash_strategy_factory(&self) -> &PagesHashStrategyFactory {
        &self.strategy_factory
    }

    /// Build a strategy over the supplied batch lists and index the address
    /// list with it. `types` must match the factory's compiled shape.
    pub fn create_lookup_source(
        &self,
        addresses: Vec<u64>,
        types: &[DataType],
        channels: &[Vec<ArrayRef>],
        operator_context: &OperatorContext,
    ) -> Result<InMemoryJoinHash, JoinError> {
        if types != self.strategy_factory.types() {
            return Err(JoinError::invalid_shape(format!(
                "lookup source types do not match compiled shape: expected {:?}, got {:?}",
                self.strategy_factory.types(),
                types
            )));
        }
        let strategy = self.strategy_factory.create_pages_hash_strategy(channels)?;
        InMemoryJoinHash::try_new(addresses, strategy, operator_context)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct JoinShape {
    types: Vec<DataType>,
    join_channels: Vec<usize>,
}

type FactorySlot = Arc<OnceLock<Arc<LookupSourceFactory>>>;

struct CacheEntry {
    slot: FactorySlot,
    last_used: u64,
}

struct FactoryCache {
    entries: HashMap<JoinShape, CacheEntry>,
    capacity: usize,
    tick: u64,
}

impl FactoryCache {
    fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            tick: 0,
        }
    }

    /// Get or insert the slot for a shape, stamping recency. The slot's
    /// factory is initialized outside the cache lock.
    fn slot_for(&mut self, types: &[DataType], join_channels: &[usize]) -> FactorySlot {
        self.tick += 1;
        let tick = self.tick;
        let shape = JoinShape {
            types: types.to_vec(),
            join_channels: join_channels.to_vec(),
        };
        if let Some(entry) = self.entries.get_mut(&shape) {
            entry.last_used = tick;
            return Arc::clone(&entry.slot);
        }
        if self.entries.len() >= self.capacity {
            self.evict_lru();
        }
        let slot: FactorySlot = Arc::new(OnceLock::new());
        self.entries.insert(
            shape,
            CacheEntry {
                slot: Arc::clone(&slot),
                last_used: tick,
            },
        );
        slot
    }

    fn evict_lru(&mut self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, entry)| entry.last_used)
            .map(|(shape, _)| shape.clone());
        if let Some(shape) = victim {
            self.entries.remove(&shape);
        }
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Compiles and memoizes per-shape join specializations.
///
/// Compilation is a pure function of the shape: no randomness, no time
/// dependence. Two concurrent misses for one shape observe exactly one
/// compilation (the loser blocks on the winner's slot).
pub struct JoinCompiler {
    options: JoinCompilerOptions,
    lookup_source_factories: Mutex<FactoryCache>,
}

impl Default for JoinCompiler {
    fn default() -> Self {
        Self::new(JoinCompilerOptions::default())
    }
}

impl JoinCompiler {
    pub fn new(options: JoinCompilerOptions) -> Self {
        let cache = FactoryCache::new(options.cache_capacity);
        Self {
            options,
            lookup_source_factories: Mutex::new(cache),
        }
    }

    pub fn compile_lookup_source_factory(
        &self,
        types: &[DataType],
        join_channels: &[usize],
    ) -> Result<Arc<LookupSourceFactory>, JoinError> {
        let key_kinds = validate_join_shape(types, join_channels)?;
        let layout = pick_join_key_layout(&key_kinds);
        let slot = {
            let mut cache = self
                .lookup_source_factories
                .lock()
                .expect("specialization cache lock");
            cache.slot_for(types, join_channels)
        };
        let factory = slot.get_or_init(|| {
            if self.options.trace_specializations {
                tracing::debug!(
                    ?layout,
                    channels = types.len(),
                    key_channels = join_channels.len(),
                    "compiled lookup source factory"
                );
            }
            Arc::new(LookupSourceFactory {
                strategy_factory: PagesHashStrategyFactory::from_parts(
                    types,
                    join_channels,
                    key_kinds,
                    layout,
                ),
            })
        });
        Ok(Arc::clone(factory))
    }

    /// Uncached strategy-factory compilation for callers that manage their
    /// own lifetimes.
    pub fn compile_pages_hash_strategy_factory(
        &self,
        types: &[DataType],
        join_channels: &[usize],
    ) -> Result<PagesHashStrategyFactory, JoinError> {
        PagesHashStrategyFactory::try_new(types, join_channels)
    }

    pub fn cached_shape_count(&self) -> usize {
        self.lookup_source_factories
            .lock()
            .expect("specialization cache lock")
            .len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::datatypes::DataType;

    use super::JoinCompiler;
    use crate::common::config::JoinCompilerOptions;
    use crate::exec::join::JoinErrorKind;

    #[test]
    fn shape_errors_surface_at_compile_time() {
        let compiler = JoinCompiler::default();
        let err = compiler
            .compile_lookup_source_factory(&[], &[])
            .unwrap_err();
        assert_eq!(err.kind(), JoinErrorKind::InvalidShape);

        let err = compiler
            .compile_lookup_source_factory(&[DataType::Int64], &[1])
            .unwrap_err();
        assert_eq!(err.kind(), JoinErrorKind::InvalidShape);

        let err = compiler
            .compile_lookup_source_factory(&[DataType::Null], &[0])
            .unwrap_err();
        assert_eq!(err.kind(), JoinErrorKind::UnsupportedType);
        assert_eq!(compiler.cached_shape_count(), 0);
    }

    #[test]
    fn same_shape_reuses_the_compiled_factory() {
        let compiler = JoinCompiler::default();
        let types = vec![DataType::Int64, DataType::Utf8];
        let first = compiler
            .compile_lookup_source_factory(&types, &[0])
            .expect("factory");
        let second = compiler
            .compile_lookup_source_factory(&types, &[0])
            .expect("factory");
        assert!(Arc::ptr_eq(&first, &second));

        let other = compiler
            .compile_lookup_source_factory(&types, &[1])
            .expect("factory");
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(compiler.cached_shape_count(), 2);
    }

    #[test]
    fn least_recently_used_shape_is_evicted_on_overflow() {
        let compiler = JoinCompiler::new(JoinCompilerOptions {
            cache_capacity: 2,
            trace_specializations: false,
        });
        let a = vec![DataType::Int64];
        let b = vec![DataType::Utf8];
        let c = vec![DataType::Int32];

        let a1 = compiler.compile_lookup_source_factory(&a, &[0]).unwrap();
        let b1 = compiler.compile_lookup_source_factory(&b, &[0]).unwrap();
        // Touch `a` so `b` becomes the eviction victim.
        let _ = compiler.compile_lookup_source_factory(&a, &[0]).unwrap();
        let _ = compiler.compile_lookup_source_factory(&c, &[0]).unwrap();
        assert_eq!(compiler.cached_shape_count(), 2);

        let a2 = compiler.compile_lookup_source_factory(&a, &[0]).unwrap();
        assert!(Arc::ptr_eq(&a1, &a2));
        let b2 = compiler.compile_lookup_source_factory(&b, &[0]).unwrap();
        assert!(!Arc::ptr_eq(&b1, &b2));
    }

    #[test]
    fn concurrent_misses_share_one_compilation() {
        let compiler = Arc::new(JoinCompiler::default());
        let types = vec![DataType::Int64];
        let mut factories = Vec::new();
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let compiler = Arc::clone(&compiler);
                    let types = types.clone();
                    scope.spawn(move || {
                        compiler
                            .compile_lookup_source_factory(&types, &[0])
                            .expect("factory")
                    })
                })
                .collect();
            for handle in handles {
                factories.push(handle.join().expect("thread"));
            }
        });
        for factory in &factories[1..] {
            assert!(Arc::ptr_eq(&factories[0], factory));
        }
        assert_eq!(compiler.cached_shape_count(), 1);
    }
}
