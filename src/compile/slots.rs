//! Sparse, explicitly-indexed slot arrays for tracks and groups.
//!
//! Grounded on `BKTKCompilerTrackAtOffset`/`BKTKCompilerTrackGroupAtOffset`
//! in `BKTKCompiler.c`: a lazily-growing array addressed by an explicit
//! index, or by the first unused slot when the source left the index out
//! (`firstUnusedSlot`).

use crate::error::TextPosition;

/// The outcome of a failed [`SparseSlots::insert`].
#[derive(Debug, Clone, Copy)]
pub enum InsertError {
    /// `index` was negative or `>= max`.
    OutOfRange,
    /// The slot was already occupied; carries the position it was first
    /// defined at.
    AlreadyDefined(TextPosition),
}

/// A sparse `0..max` array of optionally-occupied slots.
#[derive(Debug, Clone)]
pub struct SparseSlots<T> {
    slots: Vec<Option<(T, TextPosition)>>,
    max: u32,
}

impl<T> SparseSlots<T> {
    /// Creates an empty array with the given inclusive capacity bound.
    #[must_use]
    pub fn new(max: u32) -> Self {
        Self {
            slots: Vec::new(),
            max,
        }
    }

    /// Inserts `value` at `index` (or the first free slot, when `index` is
    /// `None`, matching a source `-1`).
    ///
    /// # Errors
    ///
    /// See [`InsertError`].
    pub fn insert(
        &mut self,
        index: Option<i64>,
        position: TextPosition,
        value: T,
    ) -> Result<u32, InsertError> {
        let idx = match index {
            Some(i) => {
                if i < 0 || i as u64 >= u64::from(self.max) {
                    return Err(InsertError::OutOfRange);
                }
                i as u32
            }
            None => self.first_free(),
        };
        if idx as usize >= self.slots.len() {
            self.slots.resize_with(idx as usize + 1, || None);
        }
        if let Some((_, prior)) = &self.slots[idx as usize] {
            return Err(InsertError::AlreadyDefined(*prior));
        }
        self.slots[idx as usize] = Some((value, position));
        Ok(idx)
    }

    fn first_free(&self) -> u32 {
        self.slots
            .iter()
            .position(Option::is_none)
            .map_or(self.slots.len() as u32, |i| i as u32)
    }

    /// Looks up the value at `index`, if occupied.
    #[must_use]
    pub fn get(&self, index: u32) -> Option<&T> {
        self.slots.get(index as usize).and_then(Option::as_ref).map(|(v, _)| v)
    }

    /// Mutably looks up the value at `index`, if occupied.
    pub fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        self.slots
            .get_mut(index as usize)
            .and_then(Option::as_mut)
            .map(|(v, _)| v)
    }

    /// Iterates over occupied `(index, value)` pairs in index order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|(v, _)| (i as u32, v)))
    }

    /// Whether `index` is occupied.
    #[must_use]
    pub fn contains(&self, index: u32) -> bool {
        self.slots
            .get(index as usize)
            .is_some_and(Option::is_some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos() -> TextPosition {
        TextPosition { line: 1, col: 1 }
    }

    #[test]
    fn auto_index_fills_first_free_slot() {
        let mut slots: SparseSlots<i32> = SparseSlots::new(8);
        assert_eq!(slots.insert(None, pos(), 10).unwrap(), 0);
        assert_eq!(slots.insert(Some(0), pos(), 20).is_err(), true);
        assert_eq!(slots.insert(None, pos(), 30).unwrap(), 1);
    }

    #[test]
    fn explicit_index_out_of_range_errors() {
        let mut slots: SparseSlots<i32> = SparseSlots::new(4);
        assert!(matches!(
            slots.insert(Some(10), pos(), 1),
            Err(InsertError::OutOfRange)
        ));
    }

    #[test]
    fn redefinition_reports_prior_position() {
        let mut slots: SparseSlots<i32> = SparseSlots::new(4);
        let first = TextPosition { line: 3, col: 1 };
        slots.insert(Some(2), first, 1).unwrap();
        match slots.insert(Some(2), pos(), 2) {
            Err(InsertError::AlreadyDefined(p)) => assert_eq!(p.line, 3),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
