//! Name resolution tables for instruments, waveforms and samples.
//!
//! Grounded on the hash-table-of-name-to-object pattern in
//! `BKTKCompiler.c`'s `BKTKCompilerGetInstrument`/`GetWaveform`/`GetSample`
//! helpers: a missing explicit name auto-generates the next `"<count>"`,
//! and redefining an already-used name (whether auto or explicit) is a
//! compile error naming both offsets.

use std::collections::HashMap;

use crate::error::{CompileError, TextPosition};

/// A name -> object table with stable, append-only indices.
#[derive(Debug, Clone, Default)]
pub struct SymbolTable<T> {
    by_name: HashMap<String, u32>,
    objects: Vec<T>,
    defined_at: Vec<TextPosition>,
    auto_count: u32,
}

impl<T> SymbolTable<T> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_name: HashMap::new(),
            objects: Vec::new(),
            defined_at: Vec::new(),
            auto_count: 0,
        }
    }

    /// Defines a new entry. `explicit_name` is `None` when the source left
    /// the name out, in which case the next `"<count>"` is generated.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::Redefined`] if the resolved name (auto or
    /// explicit) is already taken.
    pub fn define(
        &mut self,
        explicit_name: Option<&str>,
        position: TextPosition,
        object: T,
    ) -> Result<(String, u32), CompileError> {
        let (name, is_auto) = match explicit_name {
            Some(n) => (n.to_owned(), false),
            None => (self.auto_count.to_string(), true),
        };
        if let Some(&existing) = self.by_name.get(&name) {
            return Err(CompileError::Redefined {
                name,
                first_position: self.defined_at[existing as usize],
                new_position: position,
                same_autoindex: is_auto,
            });
        }
        let index = self.objects.len() as u32;
        self.by_name.insert(name.clone(), index);
        self.defined_at.push(position);
        self.objects.push(object);
        if is_auto {
            self.auto_count += 1;
        }
        Ok((name, index))
    }

    /// Resolves a name to its stable index.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<u32> {
        self.by_name.get(name).copied()
    }

    /// Looks up an object by its stable index.
    #[must_use]
    pub fn get(&self, index: u32) -> Option<&T> {
        self.objects.get(index as usize)
    }

    /// Mutably looks up an object by its stable index.
    pub fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        self.objects.get_mut(index as usize)
    }

    /// The number of defined entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether no entries have been defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Iterates over all defined objects in index order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.objects.iter()
    }

    /// Consumes the table, yielding its objects in index order.
    #[must_use]
    pub fn into_objects(self) -> Vec<T> {
        self.objects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(line: usize) -> TextPosition {
        TextPosition { line, col: 1 }
    }

    #[test]
    fn auto_indexes_are_stringified_counts() {
        let mut table: SymbolTable<()> = SymbolTable::new();
        let (name0, idx0) = table.define(None, pos(1), ()).unwrap();
        let (name1, idx1) = table.define(None, pos(2), ()).unwrap();
        assert_eq!((name0.as_str(), idx0), ("0", 0));
        assert_eq!((name1.as_str(), idx1), ("1", 1));
    }

    #[test]
    fn explicit_redefinition_reports_both_positions() {
        let mut table: SymbolTable<()> = SymbolTable::new();
        table.define(Some("kick"), pos(1), ()).unwrap();
        let err = table.define(Some("kick"), pos(5), ()).unwrap_err();
        match err {
            CompileError::Redefined {
                first_position,
                new_position,
                same_autoindex,
                ..
            } => {
                assert_eq!(first_position.line, 1);
                assert_eq!(new_position.line, 5);
                assert!(!same_autoindex);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn explicit_name_colliding_with_autoindex_errors() {
        let mut table: SymbolTable<()> = SymbolTable::new();
        table.define(None, pos(1), ()).unwrap();
        let err = table.define(Some("0"), pos(2), ()).unwrap_err();
        assert!(matches!(err, CompileError::Redefined { .. }));
    }
}
