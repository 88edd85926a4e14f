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
//! Synthetic 64-bit row addresses: batch index in the high 32 bits,
//! position within the batch in the low 32 bits. Address order is row
//! append order. The all-ones value is reserved as the empty-slot and
//! probe-miss sentinel.

/// Reserved sentinel: empty hash-index slot, or "no matching row".
pub const NOT_FOUND: u64 = u64::MAX;

pub fn encode_address(batch_index: u32, position: u32) -> u64 {
    ((batch_index as u64) << 32) | position as u64
}

pub fn decode_batch_index(address: u64) -> u32 {
    (address >> 32) as u32
}

pub fn decode_position(address: u64) -> u32 {
    address as u32
}

#[cfg(test)]
mod tests {
    use super::{decode_batch_index, decode_position, encode_address, NOT_FOUND};

    #[test]
    fn round_trips_batch_and_position() {
        for (batch, position) in [(0, 0), (1, 2), (7, 0), (0, u32::MAX), (u32::MAX, 0)] {
            let address = encode_address(batch, position);
            assert_eq!(decode_batch_index(address), batch);
            assert_eq!(decode_position(address), position);
        }
    }

    #[test]
    fn addresses_order_by_batch_then_position() {
        assert!(encode_address(0, 5) < encode_address(1, 0));
        assert!(encode_address(3, 1) < encode_address(3, 2));
    }

    #[test]
    fn sentinel_is_all_ones() {
        assert_eq!(NOT_FOUND, 0xFFFF_FFFF_FFFF_FFFF);
    }
}
