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
//! Per-channel output builders used by strategy `append_to` emission.

use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BinaryArray, BinaryBuilder, BooleanArray, BooleanBuilder, Date32Builder,
    Decimal128Array, Decimal128Builder, Float32Builder, Float64Builder, Int16Builder,
    Int32Builder, Int64Builder, Int8Builder, PrimitiveArray, PrimitiveBuilder, StringArray,
    StringBuilder, TimestampMicrosecondBuilder, TimestampMillisecondBuilder,
    TimestampNanosecondBuilder, TimestampSecondBuilder,
};
use arrow::datatypes::{ArrowPrimitiveType, DataType, TimeUnit};

use crate::exec::join::JoinError;
use crate::exec::page::Page;

/// Builder for one output block, matched to the channel's type at
/// construction. Appends copy one value (or null) at a time from a source
/// block position.
#[derive(Debug)]
pub enum BlockBuilder {
    Boolean(BooleanBuilder),
    Int8(Int8Builder),
    Int16(Int16Builder),
    Int32(Int32Builder),
    Int64(Int64Builder),
    Float32(Float32Builder),
    Float64(Float64Builder),
    Date32(Date32Builder),
    TimestampSecond(TimestampSecondBuilder),
    TimestampMillisecond(TimestampMillisecondBuilder),
    TimestampMicrosecond(TimestampMicrosecondBuilder),
    TimestampNanosecond(TimestampNanosecondBuilder),
    Utf8(StringBuilder),
    Binary(BinaryBuilder),
    Decimal128 {
        builder: Decimal128Builder,
        precision: u8,
        scale: i8,
    },
}

impl BlockBuilder {
    pub fn for_type(data_type: &DataType) -> Result<Self, JoinError> {
        let builder = match data_type {
            DataType::Boolean => Self::Boolean(BooleanBuilder::new()),
            DataType::Int8 => Self::Int8(Int8Builder::new()),
            DataType::Int16 => Self::Int16(Int16Builder::new()),
            DataType::Int32 => Self::Int32(Int32Builder::new()),
            DataType::Int64 => Self::Int64(Int64Builder::new()),
            DataType::Float32 => Self::Float32(Float32Builder::new()),
            DataType::Float64 => Self::Float64(Float64Builder::new()),
            DataType::Date32 => Self::Date32(Date32Builder::new()),
            DataType::Timestamp(TimeUnit::Second, _) => Self::TimestampSecond(
                TimestampSecondBuilder::new().with_data_type(data_type.clone()),
            ),
            DataType::Timestamp(TimeUnit::Millisecond, _) => Self::TimestampMillisecond(
                TimestampMillisecondBuilder::new().with_data_type(data_type.clone()),
            ),
            DataType::Timestamp(TimeUnit::Microsecond, _) => Self::TimestampMicrosecond(
                TimestampMicrosecondBuilder::new().with_data_type(data_type.clone()),
            ),
            DataType::Timestamp(TimeUnit::Nanosecond, _) => Self::TimestampNanosecond(
                TimestampNanosecondBuilder::new().with_data_type(data_type.clone()),
            ),
            DataType::Utf8 => Self::Utf8(StringBuilder::new()),
            DataType::Binary => Self::Binary(BinaryBuilder::new()),
            DataType::Decimal128(precision, scale) => {
                let builder = Decimal128Builder::new()
                    .with_precision_and_scale(*precision, *scale)
                    .map_err(|e| {
                        JoinError::unsupported_type(format!(
                            "invalid decimal parameters ({}, {}): {}",
                            precision, scale, e
                        ))
                    })?;
                Self::Decimal128 {
                    builder,
                    precision: *precision,
                    scale: *scale,
                }
            }
            other => {
                return Err(JoinError::unsupported_type(format!(
                    "type {:?} does not provide an output block builder",
                    other
                )));
            }
        };
        Ok(builder)
    }

    /// Copy the value at `position` of `block` into this builder; nulls are
    /// appended as nulls.
    pub fn append_from_block(&mut self, block: &ArrayRef, position: usize) -> Result<(), JoinError> {
        match self {
            Self::Boolean(builder) => {
                let array = downcast::<BooleanArray>(block, "BooleanArray")?;
                check_position(array.len(), position)?;
                if array.is_null(position) {
                    builder.append_null();
                } else {
                    builder.append_value(array.value(position));
                }
                Ok(())
            }
            Self::Int8(builder) => append_primitive(builder, block, position, "Int8Array"),
            Self::Int16(builder) => append_primitive(builder, block, position, "Int16Array"),
            Self::Int32(builder) => append_primitive(builder, block, position, "Int32Array"),
            Self::Int64(builder) => append_primitive(builder, block, position, "Int64Array"),
            Self::Float32(builder) => append_primitive(builder, block, position, "Float32Array"),
            Self::Float64(builder) => append_primitive(builder, block, position, "Float64Array"),
            Self::Date32(builder) => append_primitive(builder, block, position, "Date32Array"),
            Self::TimestampSecond(builder) => {
                append_primitive(builder, block, position, "TimestampSecondArray")
            }
            Self::TimestampMillisecond(builder) => {
                append_primitive(builder, block, position, "TimestampMillisecondArray")
            }
            Self::TimestampMicrosecond(builder) => {
                append_primitive(builder, block, position, "TimestampMicrosecondArray")
            }
            Self::TimestampNanosecond(builder) => {
                append_primitive(builder, block, position, "TimestampNanosecondArray")
            }
            Self::Utf8(builder) => {
                let array = downcast::<StringArray>(block, "StringArray")?;
                check_position(array.len(), position)?;
                if array.is_null(position) {
                    builder.append_null();
                } else {
                    builder.append_value(array.value(position));
                }
                Ok(())
            }
            Self::Binary(builder) => {
                let array = downcast::<BinaryArray>(block, "BinaryArray")?;
                check_position(array.len(), position)?;
                if array.is_null(position) {
                    builder.append_null();
                } else {
                    builder.append_value(array.value(position));
                }
                Ok(())
            }
            Self::Decimal128 {
                builder,
                precision,
                scale,
            } => {
                let array = downcast::<Decimal128Array>(block, "Decimal128Array")?;
                if array.precision() != *precision || array.scale() != *scale {
                    return Err(JoinError::compilation(format!(
                        "decimal block parameters mismatch: builder ({}, {}), block ({}, {})",
                        precision,
                        scale,
                        array.precision(),
                        array.scale()
                    )));
                }
                check_position(array.len(), position)?;
                if array.is_null(position) {
                    builder.append_null();
                } else {
                    builder.append_value(array.value(position));
                }
                Ok(())
            }
        }
    }

    pub fn finish(&mut self) -> ArrayRef {
        match self {
            Self::Boolean(builder) => Arc::new(builder.finish()),
            Self::Int8(builder) => Arc::new(builder.finish()),
            Self::Int16(builder) => Arc::new(builder.finish()),
            Self::Int32(builder) => Arc::new(builder.finish()),
            Self::Int64(builder) => Arc::new(builder.finish()),
            Self::Float32(builder) => Arc::new(builder.finish()),
            Self::Float64(builder) => Arc::new(builder.finish()),
            Self::Date32(builder) => Arc::new(builder.finish()),
            Self::TimestampSecond(builder) => Arc::new(builder.finish()),
            Self::TimestampMillisecond(builder) => Arc::new(builder.finish()),
            Self::TimestampMicrosecond(builder) => Arc::new(builder.finish()),
            Self::TimestampNanosecond(builder) => Arc::new(builder.finish()),
            Self::Utf8(builder) => Arc::new(builder.finish()),
            Self::Binary(builder) => Arc::new(builder.finish()),
            Self::Decimal128 { builder, .. } => Arc::new(builder.finish()),
        }
    }
}

fn downcast<'a, T: Array + 'static>(block: &'a ArrayRef, type_name: &str) -> Result<&'a T, JoinError> {
    block.as_any().downcast_ref::<T>().ok_or_else(|| {
        JoinError::compilation(format!(
            "failed to downcast {:?} block to {}",
            block.data_type(),
            type_name
        ))
    })
}

fn check_position(len: usize, position: usize) -> Result<(), JoinError> {
    if position >= len {
        return Err(JoinError::invalid_shape(format!(
            "position {} out of bounds for block of {} rows",
            position, len
        )));
    }
    Ok(())
}

fn append_primitive<T: ArrowPrimitiveType>(
    builder: &mut PrimitiveBuilder<T>,
    block: &ArrayRef,
    position: usize,
    type_name: &str,
) -> Result<(), JoinError> {
    let array = downcast::<PrimitiveArray<T>>(block, type_name)?;
    check_position(array.len(), position)?;
    if array.is_null(position) {
        builder.append_null();
    } else {
        builder.append_value(array.value(position));
    }
    Ok(())
}

/// Output page under construction: one [`BlockBuilder`] per channel.
#[derive(Debug)]
pub struct PageBuilder {
    builders: Vec<BlockBuilder>,
}

impl PageBuilder {
    pub fn try_new(types: &[DataType]) -> Result<Self, JoinError> {
        let builders = types
            .iter()
            .map(BlockBuilder::for_type)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { builders })
    }

    pub fn channel_count(&self) -> usize {
        self.builders.len()
    }

    pub fn block_builder(&mut self, channel: usize) -> Result<&mut BlockBuilder, JoinError> {
        let count = self.builders.len();
        self.builders.get_mut(channel).ok_or_else(|| {
            JoinError::invalid_shape(format!(
                "output channel {} out of bounds for {} builders",
                channel, count
            ))
        })
    }

    /// Finish every channel and assemble the output page. Builders reset and
    /// may be reused for the next page.
    pub fn build(&mut self) -> Result<Page, JoinError> {
        let columns = self
            .builders
            .iter_mut()
            .map(|builder| builder.finish())
            .collect::<Vec<_>>();
        Page::try_new(columns)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{Array, ArrayRef, Int64Array, StringArray};
    use arrow::datatypes::DataType;

    use super::PageBuilder;
    use crate::exec::join::JoinErrorKind;

    #[test]
    fn copies_values_and_nulls_bit_identically() {
        let ints = Arc::new(Int64Array::from(vec![Some(5), None, Some(-1)])) as ArrayRef;
        let names = Arc::new(StringArray::from(vec![Some("a"), Some("ab"), None])) as ArrayRef;

        let mut builder =
            PageBuilder::try_new(&[DataType::Int64, DataType::Utf8]).expect("builder");
        for position in 0..3 {
            builder
                .block_builder(0)
                .expect("channel 0")
                .append_from_block(&ints, position)
                .expect("append int");
            builder
                .block_builder(1)
                .expect("channel 1")
                .append_from_block(&names, position)
                .expect("append name");
        }
        let page = builder.build().expect("page");
        assert_eq!(page.num_rows(), 3);
        assert_eq!(page.column(0).expect("ints").to_data(), ints.to_data());
        assert_eq!(page.column(1).expect("names").to_data(), names.to_data());
    }

    #[test]
    fn rejects_type_mismatch_on_append() {
        let names = Arc::new(StringArray::from(vec!["a"])) as ArrayRef;
        let mut builder = PageBuilder::try_new(&[DataType::Int64]).expect("builder");
        let err = builder
            .block_builder(0)
            .expect("channel 0")
            .append_from_block(&names, 0)
            .unwrap_err();
        assert_eq!(err.kind(), JoinErrorKind::Compilation);
    }

    #[test]
    fn rejects_unsupported_output_type() {
        let err = PageBuilder::try_new(&[DataType::Null]).unwrap_err();
        assert_eq!(err.kind(), JoinErrorKind::UnsupportedType);
    }
}
