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
//! Per-type join-key capability layer: kind tags over `DataType`, scalar
//! hash functions, key equality helpers, and join-shape validation.
//!
//! Row hashes combine per-channel value hashes with multiplier 31 and treat
//! null as hash 0; both rules are load-bearing for build/probe co-location
//! and must not change. Value hashes are stable within one process run only.

use arrow::datatypes::{DataType, TimeUnit};

use crate::exec::join::JoinError;

/// Key-kind tag bound to a join channel at factory-compile time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum JoinKeyKind {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Date32,
    Timestamp(TimeUnit),
    Utf8,
    Binary,
    Decimal128 { precision: u8, scale: i8 },
}

pub(crate) fn join_key_kind(data_type: &DataType) -> Result<JoinKeyKind, JoinError> {
    let kind = match data_type {
        DataType::Boolean => JoinKeyKind::Boolean,
        DataType::Int8 => JoinKeyKind::Int8,
        DataType::Int16 => JoinKeyKind::Int16,
        DataType::Int32 => JoinKeyKind::Int32,
        DataType::Int64 => JoinKeyKind::Int64,
        DataType::Float32 => JoinKeyKind::Float32,
        DataType::Float64 => JoinKeyKind::Float64,
        DataType::Date32 => JoinKeyKind::Date32,
        DataType::Timestamp(unit, _tz) => JoinKeyKind::Timestamp(*unit),
        DataType::Utf8 => JoinKeyKind::Utf8,
        DataType::Binary => JoinKeyKind::Binary,
        DataType::Decimal128(precision, scale) => JoinKeyKind::Decimal128 {
            precision: *precision,
            scale: *scale,
        },
        other => {
            return Err(JoinError::unsupported_type(format!(
                "type {:?} does not provide hash/equality/append kernels",
                other
            )));
        }
    };
    Ok(kind)
}

/// Validate a join shape and resolve the kind of every join channel.
///
/// Every type in the vector must carry kernels (the strategy emits all
/// channels, not only the keyed ones); join channel indices may repeat but
/// must be in bounds.
pub(crate) fn validate_join_shape(
    types: &[DataType],
    join_channels: &[usize],
) -> Result<Vec<JoinKeyKind>, JoinError> {
    if types.is_empty() {
        return Err(JoinError::invalid_shape("type vector is empty"));
    }
    let kinds = types
        .iter()
        .map(join_key_kind)
        .collect::<Result<Vec<_>, _>>()?;
    let mut key_kinds = Vec::with_capacity(join_channels.len());
    for &channel in join_channels {
        let kind = kinds.get(channel).copied().ok_or_else(|| {
            JoinError::invalid_shape(format!(
                "join channel {} out of bounds for {} channels",
                channel,
                types.len()
            ))
        })?;
        key_kinds.push(kind);
    }
    Ok(key_kinds)
}

/// Fold one channel's value hash into the row hash.
pub(crate) fn combine_key_hash(result: i32, value_hash: i32) -> i32 {
    result.wrapping_mul(31).wrapping_add(value_hash)
}

pub(crate) fn hash_i64(value: i64) -> i32 {
    mix_u64(value as u64) as i32
}

pub(crate) fn hash_bool(value: bool) -> i32 {
    hash_i64(i64::from(value))
}

pub(crate) fn hash_f32(value: f32) -> i32 {
    mix_u64(canonical_f32_bits(value) as u64) as i32
}

pub(crate) fn hash_f64(value: f64) -> i32 {
    mix_u64(canonical_f64_bits(value)) as i32
}

pub(crate) fn hash_i128(value: i128) -> i32 {
    let value = value as u128;
    let low = mix_u64(value as u64);
    let high = mix_u64((value >> 64) as u64);
    (low ^ high) as i32
}

pub(crate) fn hash_bytes(bytes: &[u8]) -> i32 {
    let mut hash = 0xcbf29ce484222325u64;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash as i32
}

/// All NaN payloads hash and compare as one value.
pub(crate) fn canonical_f32_bits(value: f32) -> u32 {
    if value.is_nan() {
        f32::NAN.to_bits()
    } else {
        value.to_bits()
    }
}

pub(crate) fn canonical_f64_bits(value: f64) -> u64 {
    if value.is_nan() {
        f64::NAN.to_bits()
    } else {
        value.to_bits()
    }
}

pub(crate) fn float32_key_equal(left: f32, right: f32) -> bool {
    (left.is_nan() && right.is_nan()) || left == right
}

pub(crate) fn float64_key_equal(left: f64, right: f64) -> bool {
    (left.is_nan() && right.is_nan()) || left == right
}

/// Join-key equality over nullable values: two nulls match, null-vs-value
/// does not. This is not SQL three-valued equality; hash-build consumers
/// rely on the distinction.
pub(crate) fn nullable_key_equal<T>(
    left: Option<T>,
    right: Option<T>,
    equal: impl FnOnce(T, T) -> bool,
) -> bool {
    match (left, right) {
        (None, None) => true,
        (Some(left), Some(right)) => equal(left, right),
        _ => false,
    }
}

fn mix_u64(mut value: u64) -> u64 {
    value = value.wrapping_add(0x9e3779b97f4a7c15);
    value = (value ^ (value >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    value = (value ^ (value >> 27)).wrapping_mul(0x94d049bb133111eb);
    value ^ (value >> 31)
}

#[cfg(test)]
mod tests {
    use arrow::datatypes::{DataType, TimeUnit};

    use super::*;
    use crate::exec::join::JoinErrorKind;

    #[test]
    fn resolves_supported_kinds() {
        assert_eq!(join_key_kind(&DataType::Int64).unwrap(), JoinKeyKind::Int64);
        assert_eq!(
            join_key_kind(&DataType::Timestamp(TimeUnit::Millisecond, None)).unwrap(),
            JoinKeyKind::Timestamp(TimeUnit::Millisecond)
        );
        assert_eq!(
            join_key_kind(&DataType::Decimal128(18, 2)).unwrap(),
            JoinKeyKind::Decimal128 {
                precision: 18,
                scale: 2
            }
        );
    }

    #[test]
    fn rejects_types_without_kernels() {
        let err = join_key_kind(&DataType::Null).unwrap_err();
        assert_eq!(err.kind(), JoinErrorKind::UnsupportedType);
    }

    #[test]
    fn validates_channel_bounds_and_repeats() {
        let types = vec![DataType::Int32, DataType::Utf8];
        let kinds = validate_join_shape(&types, &[1, 0, 1]).expect("shape");
        assert_eq!(
            kinds,
            vec![JoinKeyKind::Utf8, JoinKeyKind::Int32, JoinKeyKind::Utf8]
        );

        let err = validate_join_shape(&types, &[2]).unwrap_err();
        assert_eq!(err.kind(), JoinErrorKind::InvalidShape);

        let err = validate_join_shape(&[], &[]).unwrap_err();
        assert_eq!(err.kind(), JoinErrorKind::InvalidShape);
    }

    #[test]
    fn row_hash_combination_uses_31_multiplier() {
        let h0 = hash_i64(7);
        let h1 = hash_i64(11);
        let combined = combine_key_hash(combine_key_hash(0, h0), h1);
        assert_eq!(combined, h0.wrapping_mul(31).wrapping_add(h1));
    }

    #[test]
    fn nan_values_hash_and_compare_equal() {
        let quiet = f64::NAN;
        let weird = f64::from_bits(0x7ff8_0000_0000_0001);
        assert!(weird.is_nan());
        assert_eq!(hash_f64(quiet), hash_f64(weird));
        assert!(float64_key_equal(quiet, weird));
        assert!(!float64_key_equal(quiet, 1.0));
        assert!(float32_key_equal(f32::NAN, f32::NAN));
    }

    #[test]
    fn nullable_key_equality_is_not_three_valued() {
        assert!(nullable_key_equal::<i64>(None, None, |_, _| false));
        assert!(!nullable_key_equal(Some(1i64), None, |l, r| l == r));
        assert!(!nullable_key_equal(None, Some(1i64), |l, r| l == r));
        assert!(nullable_key_equal(Some(2i64), Some(2i64), |l, r| l == r));
    }
}
