//! WebAssembly linear memory
//!
//! Only sizing is modelled: the bridge shares memories between the host and
//! instances and checks import limits, it does not execute memory instructions.

use super::RuntimeError;
use crate::parser::module::Limits;

/// WebAssembly page size in bytes (64KB)
pub const PAGE_SIZE: usize = 65536;

/// Maximum number of pages (2^16 = 64K pages = 4GB total)
pub const MAX_PAGES: u32 = 65536;

#[derive(Debug)]
pub struct Memory {
    data: Vec<u8>,
    current_pages: u32,
    max_pages: Option<u32>,
}

impl Memory {
    /// Create a zero-filled memory of `initial_pages`.
    ///
    /// # Errors
    /// - Initial pages exceeds maximum
    /// - Either bound exceeds [`MAX_PAGES`]
    pub fn new(initial_pages: u32, max_pages: Option<u32>) -> Result<Self, RuntimeError> {
        if initial_pages > MAX_PAGES {
            return Err(RuntimeError::MemoryError(format!(
                "initial memory size {initial_pages} pages exceeds maximum {MAX_PAGES} pages"
            )));
        }
        if let Some(max) = max_pages {
            if initial_pages > max {
                return Err(RuntimeError::MemoryError(format!(
                    "initial size {initial_pages} pages exceeds specified maximum {max} pages"
                )));
            }
            if max > MAX_PAGES {
                return Err(RuntimeError::MemoryError(format!(
                    "maximum size {max} pages exceeds system maximum {MAX_PAGES} pages"
                )));
            }
        }

        Ok(Memory {
            data: vec![0u8; initial_pages as usize * PAGE_SIZE],
            current_pages: initial_pages,
            max_pages,
        })
    }

    pub fn from_limits(limits: &Limits) -> Result<Self, RuntimeError> {
        Memory::new(limits.min, limits.max)
    }

    /// Current size in pages
    pub fn size(&self) -> u32 {
        self.current_pages
    }

    pub fn max_pages(&self) -> Option<u32> {
        self.max_pages
    }

    /// Current size in bytes
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Grow by `delta_pages`, returning the previous size in pages, or `None`
    /// when the new size would exceed the maximum or cannot be allocated.
    pub fn grow(&mut self, delta_pages: u32) -> Option<u32> {
        let current = self.current_pages;
        let new_pages = current.checked_add(delta_pages)?;
        if new_pages > self.max_pages.unwrap_or(MAX_PAGES) {
            return None;
        }

        let new_bytes = new_pages as usize * PAGE_SIZE;
        self.data.try_reserve(new_bytes - self.data.len()).ok()?;
        self.data.resize(new_bytes, 0);
        self.current_pages = new_pages;
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_memory() {
        let memory = Memory::new(1, Some(2)).unwrap();
        assert_eq!(memory.size(), 1);
        assert_eq!(memory.byte_len(), PAGE_SIZE);
        assert_eq!(memory.max_pages(), Some(2));
    }

    #[test]
    fn test_invalid_limits() {
        assert!(Memory::new(2, Some(1)).is_err());
        assert!(Memory::new(0, Some(MAX_PAGES + 1)).is_err());
        assert!(Memory::new(MAX_PAGES + 1, None).is_err());
    }

    #[test]
    fn test_grow() {
        let mut memory = Memory::new(0, Some(2)).unwrap();
        assert_eq!(memory.grow(1), Some(0));
        assert_eq!(memory.grow(1), Some(1));
        assert_eq!(memory.grow(1), None);
        assert_eq!(memory.size(), 2);
        assert_eq!(memory.byte_len(), 2 * PAGE_SIZE);
    }
}
