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
//! Pages hash strategies: row hashing, row equality, and output emission
//! over batch lists, specialized per join shape.
//!
//! The key layout is selected once at factory-compile time; single-channel
//! bigint and utf8 keys get monomorphic strategies, everything else goes
//! through the generic per-channel dispatch. All layouts share the scalar
//! kernels, so hash and equality results are identical across them.

use std::sync::Arc;

use arrow::array::{ArrayRef, Int64Array, StringArray};
use arrow::datatypes::DataType;

use crate::exec::join::kernel::{
    combine_key_hash, hash_bytes, hash_i64, nullable_key_equal, JoinKeyKind,
};
use crate::exec::join::key_blocks::{
    downcast_batches, hash_block_value, primitive_array_value, string_array_value,
    KeyColumnBlocks,
};
use crate::exec::join::JoinError;
use crate::exec::page::page_builder::PageBuilder;

/// Row-level operations over one join shape's batch lists.
///
/// `hash_row` and `position_equals_row` take the probe row as a parallel
/// block array ordered like the join channels. Implementations are frozen
/// after construction and safe for concurrent probing.
pub trait PagesHashStrategy: Send + Sync + std::fmt::Debug {
    /// Number of channels in the page layout (all channels, not only keys).
    fn channel_count(&self) -> usize;

    /// Write every channel's value at `(batch_index, position)` into the
    /// page builder starting at `out_channel_offset`.
    fn append_to(
        &self,
        batch_index: usize,
        position: usize,
        page_builder: &mut PageBuilder,
        out_channel_offset: usize,
    ) -> Result<(), JoinError>;

    /// Row hash of the join-key tuple at `(batch_index, position)`.
    fn hash_position(&self, batch_index: usize, position: usize) -> i32;

    /// Row hash of a probe-side row packaged as one block per join channel.
    fn hash_row(&self, position: usize, blocks: &[ArrayRef]) -> i32;

    /// Join-key equality between a build-side row and a probe-side row.
    fn position_equals_row(
        &self,
        left_batch_index: usize,
        left_position: usize,
        right_position: usize,
        right_blocks: &[ArrayRef],
    ) -> bool;

    /// Join-key equality between two build-side rows.
    fn position_equals_position(
        &self,
        left_batch_index: usize,
        left_position: usize,
        right_batch_index: usize,
        right_position: usize,
    ) -> bool;
}

/// Key layout selected for a join shape at factory-compile time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum JoinKeyLayout {
    /// Single `Int64` key channel.
    SingleBigint,
    /// Single `Utf8` key channel.
    SingleUtf8,
    /// Any other shape, including the empty key list.
    Generic,
}

pub(crate) fn pick_join_key_layout(key_kinds: &[JoinKeyKind]) -> JoinKeyLayout {
    match key_kinds {
        [JoinKeyKind::Int64] => JoinKeyLayout::SingleBigint,
        [JoinKeyKind::Utf8] => JoinKeyLayout::SingleUtf8,
        _ => JoinKeyLayout::Generic,
    }
}

/// Bind a layout to concrete batch lists. `channels` is indexed
/// `[channel][batch]`; every channel must carry the same number of batches.
pub(crate) fn create_strategy(
    layout: JoinKeyLayout,
    types: &[DataType],
    join_channels: &[usize],
    key_kinds: &[JoinKeyKind],
    channels: &[Vec<ArrayRef>],
) -> Result<Arc<dyn PagesHashStrategy>, JoinError> {
    if channels.len() != types.len() {
        return Err(JoinError::invalid_shape(format!(
            "channel count mismatch: expected {}, got {}",
            types.len(),
            channels.len()
        )));
    }
    let batch_count = channels.first().map(|channel| channel.len()).unwrap_or(0);
    for (index, channel) in channels.iter().enumerate() {
        if channel.len() != batch_count {
            return Err(JoinError::invalid_shape(format!(
                "channel {} batch count mismatch: expected {}, got {}",
                index,
                batch_count,
                channel.len()
            )));
        }
    }

    match layout {
        JoinKeyLayout::SingleBigint => {
            let key_channel = single_key_channel(join_channels)?;
            let key_batches = downcast_batches::<Int64Array>(key_channel_blocks(channels, key_channel)?, "Int64Array")?;
            Ok(Arc::new(SingleBigintStrategy {
                channels: channels.to_vec(),
                key_batches,
            }))
        }
        JoinKeyLayout::SingleUtf8 => {
            let key_channel = single_key_channel(join_channels)?;
            let key_batches = downcast_batches::<StringArray>(key_channel_blocks(channels, key_channel)?, "StringArray")?;
            Ok(Arc::new(SingleUtf8Strategy {
                channels: channels.to_vec(),
                key_batches,
            }))
        }
        JoinKeyLayout::Generic => {
            let mut key_blocks = Vec::with_capacity(join_channels.len());
            for (&channel, &kind) in join_channels.iter().zip(key_kinds.iter()) {
                let blocks = key_channel_blocks(channels, channel)?;
                key_blocks.push(KeyColumnBlocks::from_blocks(kind, blocks)?);
            }
            Ok(Arc::new(GenericPagesHashStrategy {
                channels: channels.to_vec(),
                key_kinds: key_kinds.to_vec(),
                key_blocks,
            }))
        }
    }
}

fn single_key_channel(join_channels: &[usize]) -> Result<usize, JoinError> {
    match join_channels {
        [channel] => Ok(*channel),
        other => Err(JoinError::invalid_shape(format!(
            "single-key layout expects one join channel, got {}",
            other.len()
        ))),
    }
}

fn key_channel_blocks(channels: &[Vec<ArrayRef>], channel: usize) -> Result<&Vec<ArrayRef>, JoinError> {
    channels.get(channel).ok_or_else(|| {
        JoinError::invalid_shape(format!(
            "join channel {} out of bounds for {} channels",
            channel,
            channels.len()
        ))
    })
}

fn append_channels(
    channels: &[Vec<ArrayRef>],
    batch_index: usize,
    position: usize,
    page_builder: &mut PageBuilder,
    out_channel_offset: usize,
) -> Result<(), JoinError> {
    for (index, channel) in channels.iter().enumerate() {
        let block = channel.get(batch_index).ok_or_else(|| {
            JoinError::invalid_shape(format!(
                "batch index {} out of bounds for {} batches",
                batch_index,
                channel.len()
            ))
        })?;
        let builder = page_builder.block_builder(out_channel_offset + index)?;
        builder.append_from_block(block, position)?;
    }
    Ok(())
}

/// Fallback strategy: per-join-channel typed batch lists, match dispatch per
/// row. Handles every supported shape, including the empty key list (hash 0,
/// everything equal).
#[derive(Debug)]
struct GenericPagesHashStrategy {
    channels: Vec<Vec<ArrayRef>>,
    key_kinds: Vec<JoinKeyKind>,
    key_blocks: Vec<KeyColumnBlocks>,
}

impl PagesHashStrategy for GenericPagesHashStrategy {
    fn channel_count(&self) -> usize {
        self.channels.len()
    }

    fn append_to(
        &self,
        batch_index: usize,
        position: usize,
        page_builder: &mut PageBuilder,
        out_channel_offset: usize,
    ) -> Result<(), JoinError> {
        append_channels(
            &self.channels,
            batch_index,
            position,
            page_builder,
            out_channel_offset,
        )
    }

    fn hash_position(&self, batch_index: usize, position: usize) -> i32 {
        self.key_blocks.iter().fold(0, |result, key_column| {
            combine_key_hash(result, key_column.hash_value(batch_index, position))
        })
    }

    fn hash_row(&self, position: usize, blocks: &[ArrayRef]) -> i32 {
        self.key_kinds
            .iter()
            .enumerate()
            .fold(0, |result, (index, &kind)| {
                let value_hash = blocks
                    .get(index)
                    .map(|block| hash_block_value(kind, block, position))
                    .unwrap_or(0);
                combine_key_hash(result, value_hash)
            })
    }

    fn position_equals_row(
        &self,
        left_batch_index: usize,
        left_position: usize,
        right_position: usize,
        right_blocks: &[ArrayRef],
    ) -> bool {
        self.key_blocks
            .iter()
            .enumerate()
            .all(|(index, key_column)| match right_blocks.get(index) {
                Some(block) => key_column.equals_row(
                    left_batch_index,
                    left_position,
                    block,
                    right_position,
                ),
                None => false,
            })
    }

    fn position_equals_position(
        &self,
        left_batch_index: usize,
        left_position: usize,
        right_batch_index: usize,
        right_position: usize,
    ) -> bool {
        self.key_blocks.iter().all(|key_column| {
            key_column.positions_equal(
                left_batch_index,
                left_position,
                right_batch_index,
                right_position,
            )
        })
    }
}

/// Monomorphic strategy for the most common join shape: one bigint key.
#[derive(Debug)]
struct SingleBigintStrategy {
    channels: Vec<Vec<ArrayRef>>,
    key_batches: Vec<Int64Array>,
}

impl SingleBigintStrategy {
    fn key_value(&self, batch_index: usize, position: usize) -> Option<i64> {
        primitive_array_value(self.key_batches.get(batch_index)?, position)
    }
}

impl PagesHashStrategy for SingleBigintStrategy {
    fn channel_count(&self) -> usize {
        self.channels.len()
    }

    fn append_to(
        &self,
        batch_index: usize,
        position: usize,
        page_builder: &mut PageBuilder,
        out_channel_offset: usize,
    ) -> Result<(), JoinError> {
        append_channels(
            &self.channels,
            batch_index,
            position,
            page_builder,
            out_channel_offset,
        )
    }

    fn hash_position(&self, batch_index: usize, position: usize) -> i32 {
        self.key_value(batch_index, position)
            .map(hash_i64)
            .unwrap_or(0)
    }

    fn hash_row(&self, position: usize, blocks: &[ArrayRef]) -> i32 {
        blocks
            .first()
            .and_then(|block| block.as_any().downcast_ref::<Int64Array>())
            .and_then(|array| primitive_array_value(array, position))
            .map(hash_i64)
            .unwrap_or(0)
    }

    fn position_equals_row(
        &self,
        left_batch_index: usize,
        left_position: usize,
        right_position: usize,
        right_blocks: &[ArrayRef],
    ) -> bool {
        let Some(right) = right_blocks
            .first()
            .and_then(|block| block.as_any().downcast_ref::<Int64Array>())
        else {
            return false;
        };
        nullable_key_equal(
            self.key_value(left_batch_index, left_position),
            primitive_array_value(right, right_position),
            |l, r| l == r,
        )
    }

    fn position_equals_position(
        &self,
        left_batch_index: usize,
        left_position: usize,
        right_batch_index: usize,
        right_position: usize,
    ) -> bool {
        nullable_key_equal(
            self.key_value(left_batch_index, left_position),
            self.key_value(right_batch_index, right_position),
            |l, r| l == r,
        )
    }
}

/// Monomorphic strategy for a single utf8 key.
#[derive(Debug)]
struct SingleUtf8Strategy {
    channels: Vec<Vec<ArrayRef>>,
    key_batches: Vec<StringArray>,
}

impl SingleUtf8Strategy {
    fn key_value(&self, batch_index: usize, position: usize) -> Option<&str> {
        string_array_value(self.key_batches.get(batch_index)?, position)
    }
}

impl PagesHashStrategy for SingleUtf8Strategy {
    fn channel_count(&self) -> usize {
        self.channels.len()
    }

    fn append_to(
        &self,
        batch_index: usize,
        position: usize,
        page_builder: &mut PageBuilder,
        out_channel_offset: usize,
    ) -> Result<(), JoinError> {
        append_channels(
            &self.channels,
            batch_index,
            position,
            page_builder,
            out_channel_offset,
        )
    }

    fn hash_position(&self, batch_index: usize, position: usize) -> i32 {
        self.key_value(batch_index, position)
            .map(|value| hash_bytes(value.as_bytes()))
            .unwrap_or(0)
    }

    fn hash_row(&self, position: usize, blocks: &[ArrayRef]) -> i32 {
        blocks
            .first()
            .and_then(|block| block.as_any().downcast_ref::<StringArray>())
            .and_then(|array| string_array_value(array, position))
            .map(|value| hash_bytes(value.as_bytes()))
            .unwrap_or(0)
    }

    fn position_equals_row(
        &self,
        left_batch_index: usize,
        left_position: usize,
        right_position: usize,
        right_blocks: &[ArrayRef],
    ) -> bool {
        let Some(right) = right_blocks
            .first()
            .and_then(|block| block.as_any().downcast_ref::<StringArray>())
        else {
            return false;
        };
        nullable_key_equal(
            self.key_value(left_batch_index, left_position),
            string_array_value(right, right_position),
            |l, r| l == r,
        )
    }

    fn position_equals_position(
        &self,
        left_batch_index: usize,
        left_position: usize,
        right_batch_index: usize,
        right_position: usize,
    ) -> bool {
        nullable_key_equal(
            self.key_value(left_batch_index, left_position),
            self.key_value(right_batch_index, right_position),
            |l, r| l == r,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{ArrayRef, Int32Array, Int64Array, StringArray};
    use arrow::datatypes::DataType;

    use super::{create_strategy, pick_join_key_layout, JoinKeyLayout, PagesHashStrategy};
    use crate::exec::join::kernel::{combine_key_hash, hash_i64, validate_join_shape};
    use crate::exec::join::JoinErrorKind;

    fn int64_channel(batches: &[&[Option<i64>]]) -> Vec<ArrayRef> {
        batches
            .iter()
            .map(|values| Arc::new(Int64Array::from(values.to_vec())) as ArrayRef)
            .collect()
    }

    fn compile(
        types: &[DataType],
        join_channels: &[usize],
        layout: JoinKeyLayout,
        channels: &[Vec<ArrayRef>],
    ) -> Arc<dyn PagesHashStrategy> {
        let key_kinds = validate_join_shape(types, join_channels).expect("shape");
        create_strategy(layout, types, join_channels, &key_kinds, channels).expect("strategy")
    }

    #[test]
    fn picks_monomorphic_layouts_for_single_keys() {
        let kinds = validate_join_shape(&[DataType::Int64], &[0]).expect("shape");
        assert_eq!(pick_join_key_layout(&kinds), JoinKeyLayout::SingleBigint);
        let kinds = validate_join_shape(&[DataType::Utf8], &[0]).expect("shape");
        assert_eq!(pick_join_key_layout(&kinds), JoinKeyLayout::SingleUtf8);
        let kinds = validate_join_shape(&[DataType::Int64, DataType::Utf8], &[0, 1]).expect("shape");
        assert_eq!(pick_join_key_layout(&kinds), JoinKeyLayout::Generic);
        let kinds = validate_join_shape(&[DataType::Int64], &[]).expect("shape");
        assert_eq!(pick_join_key_layout(&kinds), JoinKeyLayout::Generic);
    }

    #[test]
    fn layouts_agree_on_hash_and_equality() {
        let channels = vec![int64_channel(&[&[Some(7), None, Some(-3)]])];
        let types = [DataType::Int64];
        let fast = compile(&types, &[0], JoinKeyLayout::SingleBigint, &channels);
        let generic = compile(&types, &[0], JoinKeyLayout::Generic, &channels);

        let probe = vec![Arc::new(Int64Array::from(vec![Some(7), None])) as ArrayRef];
        for position in 0..3 {
            assert_eq!(
                fast.hash_position(0, position),
                generic.hash_position(0, position)
            );
            for probe_position in 0..2 {
                assert_eq!(
                    fast.position_equals_row(0, position, probe_position, &probe),
                    generic.position_equals_row(0, position, probe_position, &probe)
                );
            }
        }
        assert_eq!(fast.hash_row(0, &probe), generic.hash_row(0, &probe));
    }

    #[test]
    fn hash_position_matches_hash_row_over_same_data() {
        let values: &[Option<i64>] = &[Some(1), Some(2), None];
        let channels = vec![int64_channel(&[values])];
        let strategy = compile(
            &[DataType::Int64],
            &[0],
            JoinKeyLayout::SingleBigint,
            &channels,
        );
        let probe = channels[0].clone();
        for position in 0..3 {
            assert_eq!(
                strategy.hash_position(0, position),
                strategy.hash_row(position, &probe)
            );
        }
    }

    #[test]
    fn empty_key_list_hashes_zero_and_always_matches() {
        let channels = vec![int64_channel(&[&[Some(1), Some(2)]])];
        let strategy = compile(&[DataType::Int64], &[], JoinKeyLayout::Generic, &channels);
        assert_eq!(strategy.hash_position(0, 0), 0);
        assert_eq!(strategy.hash_row(0, &[]), 0);
        assert!(strategy.position_equals_position(0, 0, 0, 1));
        assert!(strategy.position_equals_row(0, 0, 1, &[]));
    }

    #[test]
    fn key_order_changes_hash_combination() {
        let ints: Vec<ArrayRef> = vec![Arc::new(Int64Array::from(vec![Some(2)])) as ArrayRef];
        let more: Vec<ArrayRef> = vec![Arc::new(Int64Array::from(vec![Some(9)])) as ArrayRef];
        let channels = vec![ints, more];
        let types = [DataType::Int64, DataType::Int64];
        let forward = compile(&types, &[0, 1], JoinKeyLayout::Generic, &channels);
        let reversed = compile(&types, &[1, 0], JoinKeyLayout::Generic, &channels);
        assert_eq!(
            forward.hash_position(0, 0),
            combine_key_hash(combine_key_hash(0, hash_i64(2)), hash_i64(9))
        );
        assert_eq!(
            reversed.hash_position(0, 0),
            combine_key_hash(combine_key_hash(0, hash_i64(9)), hash_i64(2))
        );
    }

    #[test]
    fn repeated_key_channel_hashes_twice() {
        let channels = vec![int64_channel(&[&[Some(5)]])];
        let strategy = compile(
            &[DataType::Int64],
            &[0, 0],
            JoinKeyLayout::Generic,
            &channels,
        );
        let expected = combine_key_hash(combine_key_hash(0, hash_i64(5)), hash_i64(5));
        assert_eq!(strategy.hash_position(0, 0), expected);
    }

    #[test]
    fn mismatched_channel_batch_counts_are_rejected() {
        let channels = vec![
            int64_channel(&[&[Some(1)], &[Some(2)]]),
            int64_channel(&[&[Some(1)]]),
        ];
        let types = [DataType::Int64, DataType::Int64];
        let key_kinds = validate_join_shape(&types, &[0]).expect("shape");
        let err = create_strategy(JoinKeyLayout::Generic, &types, &[0], &key_kinds, &channels)
            .unwrap_err();
        assert_eq!(err.kind(), JoinErrorKind::InvalidShape);
    }

    #[test]
    fn probe_blocks_follow_join_channel_order() {
        let ints: Vec<ArrayRef> = vec![Arc::new(Int64Array::from(vec![Some(1)])) as ArrayRef];
        let names: Vec<ArrayRef> = vec![Arc::new(StringArray::from(vec![Some("x")])) as ArrayRef];
        let channels = vec![ints, names];
        let types = [DataType::Int64, DataType::Utf8];
        let strategy = compile(&types, &[1, 0], JoinKeyLayout::Generic, &channels);

        // Probe row packaged channels-in-join-order: utf8 first, then int64.
        let probe: Vec<ArrayRef> = vec![
            Arc::new(StringArray::from(vec![Some("x")])) as ArrayRef,
            Arc::new(Int64Array::from(vec![Some(1)])) as ArrayRef,
        ];
        assert_eq!(strategy.hash_position(0, 0), strategy.hash_row(0, &probe));
        assert!(strategy.position_equals_row(0, 0, 0, &probe));

        let wrong_order: Vec<ArrayRef> = vec![
            Arc::new(Int64Array::from(vec![Some(1)])) as ArrayRef,
            Arc::new(StringArray::from(vec![Some("x")])) as ArrayRef,
        ];
        assert!(!strategy.position_equals_row(0, 0, 0, &wrong_order));
    }

    #[test]
    fn unsupported_probe_width_never_matches() {
        let channels = vec![int64_channel(&[&[Some(1)]])];
        let strategy = compile(
            &[DataType::Int64],
            &[0],
            JoinKeyLayout::SingleBigint,
            &channels,
        );
        let narrow = vec![Arc::new(Int32Array::from(vec![Some(1)])) as ArrayRef];
        assert!(!strategy.position_equals_row(0, 0, 0, &narrow));
        assert_eq!(strategy.hash_row(0, &narrow), 0);
    }
}
