//! WebAssembly table
//!
//! Tables hold nullable references. Element segments are not decoded, so a
//! slot is either null or a function index set through [`Table::set`].

use super::RuntimeError;
use crate::parser::module::{Limits, RefType};

#[derive(Debug)]
pub struct Table {
    ref_type: RefType,
    elements: Vec<Option<u32>>,
    limits: Limits,
}

impl Table {
    /// Create a table of `limits.min` null references.
    pub fn new(ref_type: RefType, limits: Limits) -> Result<Self, RuntimeError> {
        if matches!(limits.max, Some(max) if max < limits.min) {
            return Err(RuntimeError::TableSizeExceeded);
        }
        Ok(Table {
            ref_type,
            elements: vec![None; limits.min as usize],
            limits,
        })
    }

    pub fn ref_type(&self) -> RefType {
        self.ref_type
    }

    pub fn size(&self) -> u32 {
        self.elements.len() as u32
    }

    pub fn max(&self) -> Option<u32> {
        self.limits.max
    }

    pub fn get(&self, index: u32) -> Result<Option<u32>, RuntimeError> {
        self.elements
            .get(index as usize)
            .copied()
            .ok_or(RuntimeError::TableIndexOutOfBounds(index))
    }

    pub fn set(&mut self, index: u32, value: Option<u32>) -> Result<(), RuntimeError> {
        let elem = self
            .elements
            .get_mut(index as usize)
            .ok_or(RuntimeError::TableIndexOutOfBounds(index))?;
        *elem = value;
        Ok(())
    }

    /// Grow by `delta` null slots, returning the previous size, or `None`
    /// if the maximum would be exceeded.
    pub fn grow(&mut self, delta: u32) -> Option<u32> {
        let old_size = self.size();
        let new_size = old_size.checked_add(delta)?;
        if matches!(self.limits.max, Some(max) if new_size > max) {
            return None;
        }
        self.elements.resize(new_size as usize, None);
        Some(old_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn funcref_table(min: u32, max: Option<u32>) -> Table {
        Table::new(RefType::FuncRef, Limits { min, max }).unwrap()
    }

    #[test]
    fn test_new_table_is_null() {
        let table = funcref_table(2, None);
        assert_eq!(table.size(), 2);
        assert_eq!(table.get(1).unwrap(), None);
        assert!(matches!(table.get(2), Err(RuntimeError::TableIndexOutOfBounds(2))));
    }

    #[test]
    fn test_set_get() {
        let mut table = funcref_table(1, None);
        table.set(0, Some(3)).unwrap();
        assert_eq!(table.get(0).unwrap(), Some(3));
        assert!(table.set(1, None).is_err());
    }

    #[test]
    fn test_grow_respects_max() {
        let mut table = funcref_table(0, Some(3));
        assert_eq!(table.grow(2), Some(0));
        assert_eq!(table.grow(2), None);
        assert_eq!(table.size(), 2);
    }

    #[test]
    fn test_inverted_limits() {
        assert!(Table::new(RefType::FuncRef, Limits { min: 2, max: Some(1) }).is_err());
    }
}
