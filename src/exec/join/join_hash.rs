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
//! In-memory join hash over synthetic row addresses.
//!
//! Responsibilities:
//! - Builds an open-addressed bucket array from the build side's address
//!   list, hashing rows through the pages hash strategy.
//! - Answers probes and enumerates duplicate-key matches; reports retained
//!   memory against the operator's tracker.
//!
//! Current limitations:
//! - Build is single-threaded; the frozen table supports lock-free
//!   concurrent probing only after construction returns.

use std::mem;
use std::sync::Arc;

use arrow::array::ArrayRef;

use crate::exec::join::address::{decode_batch_index, decode_position, NOT_FOUND};
use crate::exec::join::strategy::PagesHashStrategy;
use crate::exec::join::JoinError;
use crate::exec::page::page_builder::PageBuilder;
use crate::runtime::mem_tracker::MemTracker;
use crate::runtime::operator_context::OperatorContext;

const MIN_BUCKET_CAPACITY: usize = 1024;
const MAX_LOAD_NUMERATOR: usize = 3;
const MAX_LOAD_DENOMINATOR: usize = 4;

/// Indexed build side of a join, ready for probing.
pub trait LookupSource: Send + Sync {
    fn channel_count(&self) -> usize;

    /// First build-side address whose key row equals the probe row, or
    /// [`NOT_FOUND`]. `raw_hash` is the probe row's strategy hash.
    fn join_position(&self, probe_position: usize, probe_blocks: &[ArrayRef], raw_hash: i32)
        -> u64;

    /// Next address with the same key as `previous_address`, in bucket
    /// order, or [`NOT_FOUND`].
    fn next_join_position(&self, previous_address: u64) -> u64;

    /// Emit every channel of the row at `address` into the page builder.
    fn append_to(
        &self,
        address: u64,
        page_builder: &mut PageBuilder,
        out_channel_offset: usize,
    ) -> Result<(), JoinError>;

    /// Retained bytes of the bucket array and address list.
    fn estimated_retained_bytes(&self) -> usize;
}

/// Open-addressed hash index: power-of-two bucket array of addresses with
/// the all-ones empty sentinel, load factor at most 0.75.
pub struct InMemoryJoinHash {
    addresses: Vec<u64>,
    strategy: Arc<dyn PagesHashStrategy>,
    mask: usize,
    key: Vec<u64>,
    mem_tracker: Arc<MemTracker>,
    accounted_bytes: i64,
}

impl InMemoryJoinHash {
    /// Index `addresses` in input order. Bucket occupation is a
    /// deterministic function of the input order and the strategy's hash.
    pub fn try_new(
        addresses: Vec<u64>,
        strategy: Arc<dyn PagesHashStrategy>,
        operator_context: &OperatorContext,
    ) -> Result<Self, JoinError> {
        let capacity = bucket_capacity(addresses.len())?;
        let mask = capacity - 1;
        let mut key = vec![NOT_FOUND; capacity];
        for &address in &addresses {
            if address == NOT_FOUND {
                return Err(JoinError::invalid_shape(
                    "address collides with the reserved empty-slot sentinel",
                ));
            }
            let batch_index = decode_batch_index(address) as usize;
            let position = decode_position(address) as usize;
            let raw_hash = strategy.hash_position(batch_index, position);
            let mut slot = slot_index(raw_hash, mask);
            while key[slot] != NOT_FOUND {
                slot = (slot + 1) & mask;
            }
            key[slot] = address;
        }
        tracing::trace!(
            rows = addresses.len(),
            capacity,
            "built in-memory join hash"
        );

        let mem_tracker = MemTracker::new_child("InMemoryJoinHash", operator_context.mem_tracker());
        let mut hash = Self {
            addresses,
            strategy,
            mask,
            key,
            mem_tracker,
            accounted_bytes: 0,
        };
        hash.accounted_bytes = i64::try_from(hash.estimated_retained_bytes()).unwrap_or(i64::MAX);
        hash.mem_tracker.consume(hash.accounted_bytes);
        Ok(hash)
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

impl LookupSource for InMemoryJoinHash {
    fn channel_count(&self) -> usize {
        self.strategy.channel_count()
    }

    fn join_position(
        &self,
        probe_position: usize,
        probe_blocks: &[ArrayRef],
        raw_hash: i32,
    ) -> u64 {
        let mut slot = slot_index(raw_hash, self.mask);
        loop {
            let candidate = self.key[slot];
            if candidate == NOT_FOUND {
                return NOT_FOUND;
            }
            if self.strategy.position_equals_row(
                decode_batch_index(candidate) as usize,
                decode_position(candidate) as usize,
                probe_position,
                probe_blocks,
            ) {
                return candidate;
            }
            slot = (slot + 1) & self.mask;
        }
    }

    fn next_join_position(&self, previous_address: u64) -> u64 {
        if previous_address == NOT_FOUND {
            return NOT_FOUND;
        }
        let batch_index = decode_batch_index(previous_address) as usize;
        let position = decode_position(previous_address) as usize;

        // Re-locate the previous match's slot by probing from its own hash,
        // then continue the chain from the slot after it. Candidates are
        // re-tested for key equality against the previous match.
        let raw_hash = self.strategy.hash_position(batch_index, position);
        let mut slot = slot_index(raw_hash, self.mask);
        loop {
            let candidate = self.key[slot];
            if candidate == NOT_FOUND {
                return NOT_FOUND;
            }
            if candidate == previous_address {
                break;
            }
            slot = (slot + 1) & self.mask;
        }
        loop {
            slot = (slot + 1) & self.mask;
            let candidate = self.key[slot];
            if candidate == NOT_FOUND {
                return NOT_FOUND;
            }
            if self.strategy.position_equals_position(
                batch_index,
                position,
                decode_batch_index(candidate) as usize,
                decode_position(candidate) as usize,
            ) {
                return candidate;
            }
        }
    }

    fn append_to(
        &self,
        address: u64,
        page_builder: &mut PageBuilder,
        out_channel_offset: usize,
    ) -> Result<(), JoinError> {
        self.strategy.append_to(
            decode_batch_index(address) as usize,
            decode_position(address) as usize,
            page_builder,
            out_channel_offset,
        )
    }

    fn estimated_retained_bytes(&self) -> usize {
        mem::size_of::<u64>() * (self.key.len() + self.addresses.capacity())
    }
}

impl Drop for InMemoryJoinHash {
    fn drop(&mut self) {
        self.mem_tracker.release(self.accounted_bytes);
    }
}

fn slot_index(raw_hash: i32, mask: usize) -> usize {
    (raw_hash as u32 as usize) & mask
}

/// Smallest power of two at or above the minimum capacity keeping the load
/// factor at or below 3/4.
fn bucket_capacity(row_count: usize) -> Result<usize, JoinError> {
    let scaled = row_count
        .checked_mul(MAX_LOAD_DENOMINATOR)
        .ok_or_else(|| {
            JoinError::capacity(format!("join hash cannot index {} rows", row_count))
        })?;
    let needed = scaled
        .div_ceil(MAX_LOAD_NUMERATOR)
        .max(MIN_BUCKET_CAPACITY);
    needed
        .checked_next_power_of_two()
        .ok_or_else(|| JoinError::capacity(format!("join hash cannot index {} rows", row_count)))
}

#[cfg(test)]
mod tests {
    use super::{bucket_capacity, slot_index, MIN_BUCKET_CAPACITY};

    #[test]
    fn capacity_stays_at_or_below_three_quarters_load() {
        assert_eq!(bucket_capacity(0).unwrap(), MIN_BUCKET_CAPACITY);
        assert_eq!(bucket_capacity(768).unwrap(), 1024);
        assert_eq!(bucket_capacity(769).unwrap(), 2048);
        assert_eq!(bucket_capacity(1536).unwrap(), 2048);
        assert_eq!(bucket_capacity(1537).unwrap(), 4096);
    }

    #[test]
    fn oversized_row_counts_are_capacity_errors() {
        assert!(bucket_capacity(usize::MAX).is_err());
    }

    #[test]
    fn negative_hashes_index_low_bits() {
        assert_eq!(slot_index(-1, 1023), 1023);
        assert_eq!(slot_index(i32::MIN, 1023), 0);
    }
}
