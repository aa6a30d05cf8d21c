//! Binary search over sorted on-disk tables

use super::format::Record;
use super::source::ByteSource;
use crate::error::{LocError, Result};
use std::cmp::Ordering;

/// A section holding `count` records of type `T`
pub struct Table<'a, T> {
    source: &'a dyn ByteSource,
    offset: u64,
    count: u64,
    _record: std::marker::PhantomData<T>,
}

impl<'a, T: Record> Table<'a, T> {
    pub fn new(source: &'a dyn ByteSource, offset: u64, length: u64) -> Self {
        let size = T::SIZE as u64;
        if length % size != 0 {
            log::warn!(
                "{} section length {} is not a multiple of {}",
                T::KIND.name(),
                length,
                size
            );
        }
        Self {
            source,
            offset,
            count: length / size,
            _record: std::marker::PhantomData,
        }
    }

    pub fn len(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Record at `index`, read on demand
    pub fn get(&self, index: u64) -> Result<T> {
        let at = self.offset + index * T::SIZE as u64;
        T::decode(&self.source.read_at(at, T::SIZE)?)
    }

    /// Find the record for which `cmp` returns `Equal`
    ///
    /// `cmp` orders a candidate relative to the key: `Less` means the candidate sorts
    /// before it.
    pub fn binary_search_by<F>(&self, mut cmp: F) -> Result<T>
    where
        F: FnMut(&T) -> Ordering,
    {
        if self.count == 0 {
            return Err(LocError::NotFound(format!("empty {} table", T::KIND.name())));
        }

        let mut lo: i64 = 0;
        let mut hi: i64 = self.count as i64 - 1;

        while lo <= hi {
            let mid = lo + (hi - lo) / 2;
            let record = self.get(mid as u64)?;

            match cmp(&record) {
                Ordering::Equal => return Ok(record),
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid - 1,
            }
        }

        Err(LocError::NotFound(format!("no matching {} record", T::KIND.name())))
    }

    /// Sequential pass over the whole section
    pub fn iter(&self) -> TableIter<'a, T> {
        TableIter {
            table: Table {
                source: self.source,
                offset: self.offset,
                count: self.count,
                _record: std::marker::PhantomData,
            },
            next: 0,
        }
    }
}

/// Lazy, section-sequential record iterator; stops after the first error
pub struct TableIter<'a, T> {
    table: Table<'a, T>,
    next: u64,
}

impl<T: Record> Iterator for TableIter<'_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.table.count {
            return None;
        }
        let item = self.table.get(self.next);
        self.next = if item.is_ok() { self.next + 1 } else { self.table.count };
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.table.count - self.next) as usize;
        (0, Some(left))
    }
}
