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
use arrow::array::{Array, ArrayRef};

use crate::exec::join::JoinError;

pub mod page_builder;

/// An ordered tuple of equal-length column blocks; the unit of batch
/// transfer on both the build and probe sides of a join.
#[derive(Debug, Clone)]
pub struct Page {
    columns: Vec<ArrayRef>,
    num_rows: usize,
}

impl Page {
    pub fn try_new(columns: Vec<ArrayRef>) -> Result<Self, JoinError> {
        let num_rows = columns.first().map(|column| column.len()).unwrap_or(0);
        for (index, column) in columns.iter().enumerate() {
            if column.len() != num_rows {
                return Err(JoinError::invalid_shape(format!(
                    "page column row count mismatch: column={} expected_rows={} actual_rows={}",
                    index,
                    num_rows,
                    column.len()
                )));
            }
        }
        Ok(Self { columns, num_rows })
    }

    pub fn new(columns: Vec<ArrayRef>) -> Self {
        match Self::try_new(columns) {
            Ok(page) => page,
            Err(e) => panic!("{e}"),
        }
    }

    pub fn channel_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, channel: usize) -> Option<&ArrayRef> {
        self.columns.get(channel)
    }

    pub fn columns(&self) -> &[ArrayRef] {
        &self.columns
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    pub fn estimated_bytes(&self) -> usize {
        self.columns
            .iter()
            .map(|column| column.get_array_memory_size())
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arrow::array::{ArrayRef, Int32Array, StringArray};

    use super::Page;
    use crate::exec::join::JoinErrorKind;

    #[test]
    fn page_validates_column_lengths() {
        let ints = Arc::new(Int32Array::from(vec![1, 2, 3])) as ArrayRef;
        let names = Arc::new(StringArray::from(vec!["a", "b"])) as ArrayRef;
        let err = Page::try_new(vec![ints, names]).expect_err("length mismatch");
        assert_eq!(err.kind(), JoinErrorKind::InvalidShape);
    }

    #[test]
    fn page_exposes_columns_and_rows() {
        let ints = Arc::new(Int32Array::from(vec![1, 2, 3])) as ArrayRef;
        let names = Arc::new(StringArray::from(vec![Some("a"), None, Some("c")])) as ArrayRef;
        let page = Page::try_new(vec![ints, names]).expect("page");
        assert_eq!(page.channel_count(), 2);
        assert_eq!(page.num_rows(), 3);
        assert!(!page.is_empty());
        assert!(page.column(1).is_some());
        assert!(page.column(2).is_none());
        assert!(page.estimated_bytes() > 0);
    }

    #[test]
    fn empty_page_has_no_rows() {
        let page = Page::try_new(Vec::new()).expect("page");
        assert_eq!(page.channel_count(), 0);
        assert!(page.is_empty());
    }
}
