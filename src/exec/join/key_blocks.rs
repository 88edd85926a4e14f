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
//! Typed batch-lists for join-key channels.
//!
//! Each join channel downcasts its blocks once, at strategy construction,
//! into a concrete array vector; row-level hash and equality then dispatch
//! on the enum variant instead of going through `dyn Array` per row.
//! Out-of-range batch or position access behaves as null.

use arrow::array::{
    Array, ArrayRef, BinaryArray, BooleanArray, Date32Array, Decimal128Array, Float32Array,
    Float64Array, Int16Array, Int32Array, Int64Array, Int8Array, PrimitiveArray, StringArray,
    TimestampMicrosecondArray, TimestampMillisecondArray, TimestampNanosecondArray,
    TimestampSecondArray,
};
use arrow::datatypes::{ArrowPrimitiveType, TimeUnit};

use crate::exec::join::kernel::{
    float32_key_equal, float64_key_equal, hash_bool, hash_bytes, hash_f32, hash_f64, hash_i128,
    hash_i64, nullable_key_equal, JoinKeyKind,
};
use crate::exec::join::JoinError;

/// One join channel's blocks, one entry per appended page, pre-downcast to
/// the channel's concrete array type.
#[derive(Debug, Clone)]
pub(crate) enum KeyColumnBlocks {
    Boolean(Vec<BooleanArray>),
    Int8(Vec<Int8Array>),
    Int16(Vec<Int16Array>),
    Int32(Vec<Int32Array>),
    Int64(Vec<Int64Array>),
    Float32(Vec<Float32Array>),
    Float64(Vec<Float64Array>),
    Date32(Vec<Date32Array>),
    TimestampSecond(Vec<TimestampSecondArray>),
    TimestampMillisecond(Vec<TimestampMillisecondArray>),
    TimestampMicrosecond(Vec<TimestampMicrosecondArray>),
    TimestampNanosecond(Vec<TimestampNanosecondArray>),
    Utf8(Vec<StringArray>),
    Binary(Vec<BinaryArray>),
    Decimal128 {
        batches: Vec<Decimal128Array>,
        precision: u8,
        scale: i8,
    },
}

impl KeyColumnBlocks {
    pub(crate) fn from_blocks(kind: JoinKeyKind, blocks: &[ArrayRef]) -> Result<Self, JoinError> {
        let column = match kind {
            JoinKeyKind::Boolean => Self::Boolean(downcast_batches(blocks, "BooleanArray")?),
            JoinKeyKind::Int8 => Self::Int8(downcast_batches(blocks, "Int8Array")?),
            JoinKeyKind::Int16 => Self::Int16(downcast_batches(blocks, "Int16Array")?),
            JoinKeyKind::Int32 => Self::Int32(downcast_batches(blocks, "Int32Array")?),
            JoinKeyKind::Int64 => Self::Int64(downcast_batches(blocks, "Int64Array")?),
            JoinKeyKind::Float32 => Self::Float32(downcast_batches(blocks, "Float32Array")?),
            JoinKeyKind::Float64 => Self::Float64(downcast_batches(blocks, "Float64Array")?),
            JoinKeyKind::Date32 => Self::Date32(downcast_batches(blocks, "Date32Array")?),
            JoinKeyKind::Timestamp(TimeUnit::Second) => {
                Self::TimestampSecond(downcast_batches(blocks, "TimestampSecondArray")?)
            }
            JoinKeyKind::Timestamp(TimeUnit::Millisecond) => {
                Self::TimestampMillisecond(downcast_batches(blocks, "TimestampMillisecondArray")?)
            }
            JoinKeyKind::Timestamp(TimeUnit::Microsecond) => {
                Self::TimestampMicrosecond(downcast_batches(blocks, "TimestampMicrosecondArray")?)
            }
            JoinKeyKind::Timestamp(TimeUnit::Nanosecond) => {
                Self::TimestampNanosecond(downcast_batches(blocks, "TimestampNanosecondArray")?)
            }
            JoinKeyKind::Utf8 => Self::Utf8(downcast_batches(blocks, "StringArray")?),
            JoinKeyKind::Binary => Self::Binary(downcast_batches(blocks, "BinaryArray")?),
            JoinKeyKind::Decimal128 { precision, scale } => {
                let batches: Vec<Decimal128Array> = downcast_batches(blocks, "Decimal128Array")?;
                for array in &batches {
                    if array.precision() != precision || array.scale() != scale {
                        return Err(JoinError::compilation(format!(
                            "decimal key block parameters mismatch: declared ({}, {}), block ({}, {})",
                            precision,
                            scale,
                            array.precision(),
                            array.scale()
                        )));
                    }
                }
                Self::Decimal128 {
                    batches,
                    precision,
                    scale,
                }
            }
        };
        Ok(column)
    }

    pub(crate) fn batch_count(&self) -> usize {
        match self {
            Self::Boolean(batches) => batches.len(),
            Self::Int8(batches) => batches.len(),
            Self::Int16(batches) => batches.len(),
            Self::Int32(batches) => batches.len(),
            Self::Int64(batches) => batches.len(),
            Self::Float32(batches) => batches.len(),
            Self::Float64(batches) => batches.len(),
            Self::Date32(batches) => batches.len(),
            Self::TimestampSecond(batches) => batches.len(),
            Self::TimestampMillisecond(batches) => batches.len(),
            Self::TimestampMicrosecond(batches) => batches.len(),
            Self::TimestampNanosecond(batches) => batches.len(),
            Self::Utf8(batches) => batches.len(),
            Self::Binary(batches) => batches.len(),
            Self::Decimal128 { batches, .. } => batches.len(),
        }
    }

    /// Hash of the value at `(batch, position)`; null (or out of range)
    /// contributes 0.
    pub(crate) fn hash_value(&self, batch: usize, position: usize) -> i32 {
        match self {
            Self::Boolean(batches) => boolean_value(batches, batch, position)
                .map(hash_bool)
                .unwrap_or(0),
            Self::Int8(batches) => primitive_value(batches, batch, position)
                .map(|v| hash_i64(v as i64))
                .unwrap_or(0),
            Self::Int16(batches) => primitive_value(batches, batch, position)
                .map(|v| hash_i64(v as i64))
                .unwrap_or(0),
            Self::Int32(batches) => primitive_value(batches, batch, position)
                .map(|v| hash_i64(v as i64))
                .unwrap_or(0),
            Self::Int64(batches) => primitive_value(batches, batch, position)
                .map(hash_i64)
                .unwrap_or(0),
            Self::Float32(batches) => primitive_value(batches, batch, position)
                .map(hash_f32)
                .unwrap_or(0),
            Self::Float64(batches) => primitive_value(batches, batch, position)
                .map(hash_f64)
                .unwrap_or(0),
            Self::Date32(batches) => primitive_value(batches, batch, position)
                .map(|v| hash_i64(v as i64))
                .unwrap_or(0),
            Self::TimestampSecond(batches) => primitive_value(batches, batch, position)
                .map(hash_i64)
                .unwrap_or(0),
            Self::TimestampMillisecond(batches) => primitive_value(batches, batch, position)
                .map(hash_i64)
                .unwrap_or(0),
            Self::TimestampMicrosecond(batches) => primitive_value(batches, batch, position)
                .map(hash_i64)
                .unwrap_or(0),
            Self::TimestampNanosecond(batches) => primitive_value(batches, batch, position)
                .map(hash_i64)
                .unwrap_or(0),
            Self::Utf8(batches) => string_value(batches, batch, position)
                .map(|v| hash_bytes(v.as_bytes()))
                .unwrap_or(0),
            Self::Binary(batches) => binary_value(batches, batch, position)
                .map(hash_bytes)
                .unwrap_or(0),
            Self::Decimal128 { batches, .. } => primitive_value(batches, batch, position)
                .map(hash_i128)
                .unwrap_or(0),
        }
    }

    /// Join-key equality between two build-side rows of this channel.
    pub(crate) fn positions_equal(
        &self,
        left_batch: usize,
        left_position: usize,
        right_batch: usize,
        right_position: usize,
    ) -> bool {
        match self {
            Self::Boolean(batches) => nullable_key_equal(
                boolean_value(batches, left_batch, left_position),
                boolean_value(batches, right_batch, right_position),
                |l, r| l == r,
            ),
            Self::Int8(batches) => nullable_key_equal(
                primitive_value(batches, left_batch, left_position),
                primitive_value(batches, right_batch, right_position),
                |l, r| l == r,
            ),
            Self::Int16(batches) => nullable_key_equal(
                primitive_value(batches, left_batch, left_position),
                primitive_value(batches, right_batch, right_position),
                |l, r| l == r,
            ),
            Self::Int32(batches) => nullable_key_equal(
                primitive_value(batches, left_batch, left_position),
                primitive_value(batches, right_batch, right_position),
                |l, r| l == r,
            ),
            Self::Int64(batches) => nullable_key_equal(
                primitive_value(batches, left_batch, left_position),
                primitive_value(batches, right_batch, right_position),
                |l, r| l == r,
            ),
            Self::Float32(batches) => nullable_key_equal(
                primitive_value(batches, left_batch, left_position),
                primitive_value(batches, right_batch, right_position),
                float32_key_equal,
            ),
            Self::Float64(batches) => nullable_key_equal(
                primitive_value(batches, left_batch, left_position),
                primitive_value(batches, right_batch, right_position),
                float64_key_equal,
            ),
            Self::Date32(batches) => nullable_key_equal(
                primitive_value(batches, left_batch, left_position),
                primitive_value(batches, right_batch, right_position),
                |l, r| l == r,
            ),
            Self::TimestampSecond(batches) => nullable_key_equal(
                primitive_value(batches, left_batch, left_position),
                primitive_value(batches, right_batch, right_position),
                |l, r| l == r,
            ),
            Self::TimestampMillisecond(batches) => nullable_key_equal(
                primitive_value(batches, left_batch, left_position),
                primitive_value(batches, right_batch, right_position),
                |l, r| l == r,
            ),
            Self::TimestampMicrosecond(batches) => nullable_key_equal(
                primitive_value(batches, left_batch, left_position),
                primitive_value(batches, right_batch, right_position),
                |l, r| l == r,
            ),
            Self::TimestampNanosecond(batches) => nullable_key_equal(
                primitive_value(batches, left_batch, left_position),
                primitive_value(batches, right_batch, right_position),
                |l, r| l == r,
            ),
            Self::Utf8(batches) => nullable_key_equal(
                string_value(batches, left_batch, left_position),
                string_value(batches, right_batch, right_position),
                |l, r| l == r,
            ),
            Self::Binary(batches) => nullable_key_equal(
                binary_value(batches, left_batch, left_position),
                binary_value(batches, right_batch, right_position),
                |l, r| l == r,
            ),
            Self::Decimal128 { batches, .. } => nullable_key_equal(
                primitive_value(batches, left_batch, left_position),
                primitive_value(batches, right_batch, right_position),
                |l, r| l == r,
            ),
        }
    }

    /// Join-key equality between a build-side row of this channel and a
    /// probe-side block. A probe block of the wrong concrete type never
    /// matches; probing stays total.
    pub(crate) fn equals_row(
        &self,
        batch: usize,
        position: usize,
        right_block: &ArrayRef,
        right_position: usize,
    ) -> bool {
        match self {
            Self::Boolean(batches) => {
                let Some(right) = right_block.as_any().downcast_ref::<BooleanArray>() else {
                    return false;
                };
                nullable_key_equal(
                    boolean_value(batches, batch, position),
                    boolean_array_value(right, right_position),
                    |l, r| l == r,
                )
            }
            Self::Int8(batches) => {
                let Some(right) = right_block.as_any().downcast_ref::<Int8Array>() else {
                    return false;
                };
                nullable_key_equal(
                    primitive_value(batches, batch, position),
                    primitive_array_value(right, right_position),
                    |l, r| l == r,
                )
            }
            Self::Int16(batches) => {
                let Some(right) = right_block.as_any().downcast_ref::<Int16Array>() else {
                    return false;
                };
                nullable_key_equal(
                    primitive_value(batches, batch, position),
                    primitive_array_value(right, right_position),
                    |l, r| l == r,
                )
            }
            Self::Int32(batches) => {
                let Some(right) = right_block.as_any().downcast_ref::<Int32Array>() else {
                    return false;
                };
                nullable_key_equal(
                    primitive_value(batches, batch, position),
                    primitive_array_value(right, right_position),
                    |l, r| l == r,
                )
            }
            Self::Int64(batches) => {
                let Some(right) = right_block.as_any().downcast_ref::<Int64Array>() else {
                    return false;
                };
                nullable_key_equal(
                    primitive_value(batches, batch, position),
                    primitive_array_value(right, right_position),
                    |l, r| l == r,
                )
            }
            Self::Float32(batches) => {
                let Some(right) = right_block.as_any().downcast_ref::<Float32Array>() else {
                    return false;
                };
                nullable_key_equal(
                    primitive_value(batches, batch, position),
                    primitive_array_value(right, right_position),
                    float32_key_equal,
                )
            }
            Self::Float64(batches) => {
                let Some(right) = right_block.as_any().downcast_ref::<Float64Array>() else {
                    return false;
                };
                nullable_key_equal(
                    primitive_value(batches, batch, position),
                    primitive_array_value(right, right_position),
                    float64_key_equal,
                )
            }
            Self::Date32(batches) => {
                let Some(right) = right_block.as_any().downcast_ref::<Date32Array>() else {
                    return false;
                };
                nullable_key_equal(
                    primitive_value(batches, batch, position),
                    primitive_array_value(right, right_position),
                    |l, r| l == r,
                )
            }
            Self::TimestampSecond(batches) => {
                let Some(right) = right_block.as_any().downcast_ref::<TimestampSecondArray>()
                else {
                    return false;
                };
                nullable_key_equal(
                    primitive_value(batches, batch, position),
                    primitive_array_value(right, right_position),
                    |l, r| l == r,
                )
            }
            Self::TimestampMillisecond(batches) => {
                let Some(right) = right_block
                    .as_any()
                    .downcast_ref::<TimestampMillisecondArray>()
                else {
                    return false;
                };
                nullable_key_equal(
                    primitive_value(batches, batch, position),
                    primitive_array_value(right, right_position),
                    |l, r| l == r,
                )
            }
            Self::TimestampMicrosecond(batches) => {
                let Some(right) = right_block
                    .as_any()
                    .downcast_ref::<TimestampMicrosecondArray>()
                else {
                    return false;
                };
                nullable_key_equal(
                    primitive_value(batches, batch, position),
                    primitive_array_value(right, right_position),
                    |l, r| l == r,
                )
            }
            Self::TimestampNanosecond(batches) => {
                let Some(right) = right_block
                    .as_any()
                    .downcast_ref::<TimestampNanosecondArray>()
                else {
                    return false;
                };
                nullable_key_equal(
                    primitive_value(batches, batch, position),
                    primitive_array_value(right, right_position),
                    |l, r| l == r,
                )
            }
            Self::Utf8(batches) => {
                let Some(right) = right_block.as_any().downcast_ref::<StringArray>() else {
                    return false;
                };
                nullable_key_equal(
                    string_value(batches, batch, position),
                    string_array_value(right, right_position),
                    |l, r| l == r,
                )
            }
            Self::Binary(batches) => {
                let Some(right) = right_block.as_any().downcast_ref::<BinaryArray>() else {
                    return false;
                };
                nullable_key_equal(
                    binary_value(batches, batch, position),
                    binary_array_value(right, right_position),
                    |l, r| l == r,
                )
            }
            Self::Decimal128 {
                batches,
                precision,
                scale,
            } => {
                let Some(right) = right_block.as_any().downcast_ref::<Decimal128Array>() else {
                    return false;
                };
                if right.precision() != *precision || right.scale() != *scale {
                    return false;
                }
                nullable_key_equal(
                    primitive_value(batches, batch, position),
                    primitive_array_value(right, right_position),
                    |l, r| l == r,
                )
            }
        }
    }
}

/// Hash of a probe-side block value by the channel's declared kind; null,
/// out of range, or a block of the wrong concrete type contributes 0.
pub(crate) fn hash_block_value(kind: JoinKeyKind, block: &ArrayRef, position: usize) -> i32 {
    match kind {
        JoinKeyKind::Boolean => block
            .as_any()
            .downcast_ref::<BooleanArray>()
            .and_then(|array| boolean_array_value(array, position))
            .map(hash_bool)
            .unwrap_or(0),
        JoinKeyKind::Int8 => block
            .as_any()
            .downcast_ref::<Int8Array>()
            .and_then(|array| primitive_array_value(array, position))
            .map(|v| hash_i64(v as i64))
            .unwrap_or(0),
        JoinKeyKind::Int16 => block
            .as_any()
            .downcast_ref::<Int16Array>()
            .and_then(|array| primitive_array_value(array, position))
            .map(|v| hash_i64(v as i64))
            .unwrap_or(0),
        JoinKeyKind::Int32 => block
            .as_any()
            .downcast_ref::<Int32Array>()
            .and_then(|array| primitive_array_value(array, position))
            .map(|v| hash_i64(v as i64))
            .unwrap_or(0),
        JoinKeyKind::Int64 => block
            .as_any()
            .downcast_ref::<Int64Array>()
            .and_then(|array| primitive_array_value(array, position))
            .map(hash_i64)
            .unwrap_or(0),
        JoinKeyKind::Float32 => block
            .as_any()
            .downcast_ref::<Float32Array>()
            .and_then(|array| primitive_array_value(array, position))
            .map(hash_f32)
            .unwrap_or(0),
        JoinKeyKind::Float64 => block
            .as_any()
            .downcast_ref::<Float64Array>()
            .and_then(|array| primitive_array_value(array, position))
            .map(hash_f64)
            .unwrap_or(0),
        JoinKeyKind::Date32 => block
            .as_any()
            .downcast_ref::<Date32Array>()
            .and_then(|array| primitive_array_value(array, position))
            .map(|v| hash_i64(v as i64))
            .unwrap_or(0),
        JoinKeyKind::Timestamp(TimeUnit::Second) => block
            .as_any()
            .downcast_ref::<TimestampSecondArray>()
            .and_then(|array| primitive_array_value(array, position))
            .map(hash_i64)
            .unwrap_or(0),
        JoinKeyKind::Timestamp(TimeUnit::Millisecond) => block
            .as_any()
            .downcast_ref::<TimestampMillisecondArray>()
            .and_then(|array| primitive_array_value(array, position))
            .map(hash_i64)
            .unwrap_or(0),
        JoinKeyKind::Timestamp(TimeUnit::Microsecond) => block
            .as_any()
            .downcast_ref::<TimestampMicrosecondArray>()
            .and_then(|array| primitive_array_value(array, position))
            .map(hash_i64)
            .unwrap_or(0),
        JoinKeyKind::Timestamp(TimeUnit::Nanosecond) => block
            .as_any()
            .downcast_ref::<TimestampNanosecondArray>()
            .and_then(|array| primitive_array_value(array, position))
            .map(hash_i64)
            .unwrap_or(0),
        JoinKeyKind::Utf8 => block
            .as_any()
            .downcast_ref::<StringArray>()
            .and_then(|array| string_array_value(array, position))
            .map(|v| hash_bytes(v.as_bytes()))
            .unwrap_or(0),
        JoinKeyKind::Binary => block
            .as_any()
            .downcast_ref::<BinaryArray>()
            .and_then(|array| binary_array_value(array, position))
            .map(hash_bytes)
            .unwrap_or(0),
        JoinKeyKind::Decimal128 { .. } => block
            .as_any()
            .downcast_ref::<Decimal128Array>()
            .and_then(|array| primitive_array_value(array, position))
            .map(hash_i128)
            .unwrap_or(0),
    }
}

pub(crate) fn downcast_batches<T: Array + Clone + 'static>(
    blocks: &[ArrayRef],
    type_name: &str,
) -> Result<Vec<T>, JoinError> {
    blocks
        .iter()
        .map(|block| {
            block
                .as_any()
                .downcast_ref::<T>()
                .cloned()
                .ok_or_else(|| {
                    JoinError::compilation(format!(
                        "failed to downcast {:?} block to {}",
                        block.data_type(),
                        type_name
                    ))
                })
        })
        .collect()
}

pub(crate) fn primitive_array_value<T: ArrowPrimitiveType>(
    array: &PrimitiveArray<T>,
    position: usize,
) -> Option<T::Native> {
    if position >= array.len() || array.is_null(position) {
        return None;
    }
    Some(array.value(position))
}

pub(crate) fn primitive_value<T: ArrowPrimitiveType>(
    batches: &[PrimitiveArray<T>],
    batch: usize,
    position: usize,
) -> Option<T::Native> {
    primitive_array_value(batches.get(batch)?, position)
}

pub(crate) fn boolean_array_value(array: &BooleanArray, position: usize) -> Option<bool> {
    if position >= array.len() || array.is_null(position) {
        return None;
    }
    Some(array.value(position))
}

fn boolean_value(batches: &[BooleanArray], batch: usize, position: usize) -> Option<bool> {
    boolean_array_value(batches.get(batch)?, position)
}

pub(crate) fn string_array_value(array: &StringArray, position: usize) -> Option<&str> {
    if position >= array.len() || array.is_null(position) {
        return None;
    }
    Some(array.value(position))
}

fn string_value(batches: &[StringArray], batch: usize, position: usize) -> Option<&str> {
    string_array_value(batches.get(batch)?, position)
}

fn binary_array_value(array: &BinaryArray, position: usize) -> Option<&[u8]> {
    if position >= array.len() || array.is_null(position) {
        return None;
    }
    Some(array.value(position))
}

fn binary_value(batches: &[BinaryArray], batch: usize, position: usize) -> Option<&[u8]> {
    binary_array_value(batches.get(batch)?, position)
}
