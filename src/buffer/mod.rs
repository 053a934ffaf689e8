//! Shared geometry buffer arenas.
//!
//! Brush geometry for a whole map lives in one buffer that is bound as both
//! the vertex and the index buffer. Models carve out element-aligned ranges
//! at load time; the arena is only reset when the map is unloaded.
//!
//! # Example
//!
//! ```ignore
//! let alloc = arena.allocate(BrushVertex::STRIDE, 4).ok_or(...)?;
//! arena.write(&alloc, bytemuck::cast_slice(&vertices));
//! // draw with base vertex = alloc.unit_offset
//! ```

#[cfg(not(target_arch = "wasm32"))]
mod vulkan;

#[cfg(not(target_arch = "wasm32"))]
pub use vulkan::{VulkanArenaConfig, VulkanBufferArena};

use std::ops::Range;

use crate::backend::BufferHandle;

/// A sub-allocation from a buffer arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArenaAllocation {
    /// Offset in units of `element_size`
    pub unit_offset: u32,
    /// Byte offset into the arena buffer
    pub byte_offset: u64,
    pub element_size: u32,
    pub count: u32,
}

impl ArenaAllocation {
    /// Size of the allocation in bytes.
    pub fn size(&self) -> u64 {
        self.element_size as u64 * self.count as u64
    }

    /// Get the end offset (byte_offset + size).
    pub fn end(&self) -> u64 {
        self.byte_offset + self.size()
    }
}

/// Growable shared buffer the brush geometry is allocated from.
pub trait BufferArena {
    /// Buffer bound for vertex and index fetch
    fn buffer(&self) -> BufferHandle;

    /// Reserve `count` elements of `element_size` bytes, aligned to the
    /// element size. Returns `None` when the arena is exhausted.
    fn allocate(&mut self, element_size: u32, count: u32) -> Option<ArenaAllocation>;

    /// Copy `data` to the start of `allocation`.
    fn write(&mut self, allocation: &ArenaAllocation, data: &[u8]);

    /// Release every allocation. Only valid once the GPU stopped reading.
    fn reset(&mut self);

    /// Bytes handed out since the last reset
    fn used(&self) -> u64;

    fn capacity(&self) -> u64;
}

/// Compute the next element-aligned allocation in a bump arena.
pub(crate) fn bump_allocate(
    used: u64,
    capacity: u64,
    element_size: u32,
    count: u32,
) -> Option<ArenaAllocation> {
    if element_size == 0 {
        return None;
    }
    let unit = element_size as u64;
    let unit_offset = used.div_ceil(unit);
    let byte_offset = unit_offset * unit;
    let end = byte_offset.checked_add(unit * count as u64)?;
    if end > capacity {
        return None;
    }
    Some(ArenaAllocation {
        unit_offset: u32::try_from(unit_offset).ok()?,
        byte_offset,
        element_size,
        count,
    })
}

/// Byte range a write of `len` bytes to `allocation` covers, or `None` when
/// it would spill past the allocation or the `buffer_len`-byte backing store.
pub(crate) fn write_range(
    allocation: &ArenaAllocation,
    len: usize,
    buffer_len: usize,
) -> Option<Range<usize>> {
    let start = usize::try_from(allocation.byte_offset).ok()?;
    let end = start.checked_add(len)?;
    if len as u64 > allocation.size() || end > buffer_len {
        log::warn!(
            "Dropping {} byte arena write at offset {}: allocation holds {} bytes, buffer {}",
            len,
            start,
            allocation.size(),
            buffer_len
        );
        return None;
    }
    Some(start..end)
}

/// Buffer arena in CPU memory.
///
/// Stands in for the GPU arena in headless runs, and doubles as a staging
/// copy that can be inspected after baking.
#[derive(Debug, Clone)]
pub struct HostBufferArena {
    handle: BufferHandle,
    data: Vec<u8>,
    capacity: u64,
    writes: usize,
}

impl HostBufferArena {
    pub fn new(handle: BufferHandle, capacity: u64) -> Self {
        Self {
            handle,
            data: Vec::new(),
            capacity,
            writes: 0,
        }
    }

    /// Contents written so far.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Read back an allocation as typed elements.
    pub fn read<T: bytemuck::Pod>(&self, allocation: &ArenaAllocation) -> Vec<T> {
        let start = allocation.byte_offset as usize;
        let end = allocation.end() as usize;
        let bytes = self.data.get(start..end).unwrap_or(&[]);
        bytemuck::pod_collect_to_vec(bytes)
    }

    /// Number of `write` calls since creation.
    pub fn write_count(&self) -> usize {
        self.writes
    }
}

impl BufferArena for HostBufferArena {
    fn buffer(&self) -> BufferHandle {
        self.handle
    }

    fn allocate(&mut self, element_size: u32, count: u32) -> Option<ArenaAllocation> {
        let allocation =
            bump_allocate(self.data.len() as u64, self.capacity, element_size, count)?;
        self.data.resize(allocation.end() as usize, 0);
        Some(allocation)
    }

    fn write(&mut self, allocation: &ArenaAllocation, data: &[u8]) {
        if let Some(range) = write_range(allocation, data.len(), self.data.len()) {
            self.data[range].copy_from_slice(data);
            self.writes += 1;
        }
    }

    fn reset(&mut self) {
        self.data.clear();
    }

    fn used(&self) -> u64 {
        self.data.len() as u64
    }

    fn capacity(&self) -> u64 {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocations_are_element_aligned() {
        let mut arena = HostBufferArena::new(BufferHandle::from_raw(1), 1024);

        let indices = arena.allocate(2, 3).unwrap();
        assert_eq!(indices.byte_offset, 0);
        assert_eq!(arena.used(), 6);

        let vertices = arena.allocate(28, 2).unwrap();
        assert_eq!(vertices.unit_offset, 1);
        assert_eq!(vertices.byte_offset, 28);
        assert_eq!(arena.used(), 84);

        let more = arena.allocate(2, 1).unwrap();
        assert_eq!(more.unit_offset, 42);
    }

    #[test]
    fn test_exhaustion_returns_none() {
        let mut arena = HostBufferArena::new(BufferHandle::from_raw(1), 64);
        assert!(arena.allocate(28, 2).is_some());
        assert!(arena.allocate(28, 1).is_none());
        assert_eq!(arena.used(), 56);

        arena.reset();
        assert_eq!(arena.used(), 0);
        assert!(arena.allocate(28, 2).is_some());
    }

    #[test]
    fn test_write_and_read_back() {
        let mut arena = HostBufferArena::new(BufferHandle::from_raw(1), 64);
        let alloc = arena.allocate(2, 3).unwrap();
        arena.write(&alloc, bytemuck::cast_slice(&[0u16, 1, 2]));

        assert_eq!(arena.read::<u16>(&alloc), vec![0, 1, 2]);
        assert_eq!(arena.write_count(), 1);
    }

    #[test]
    fn test_oversized_write_is_dropped() {
        let mut arena = HostBufferArena::new(BufferHandle::from_raw(1), 64);
        let first = arena.allocate(2, 2).unwrap();
        let second = arena.allocate(2, 2).unwrap();

        arena.write(&first, bytemuck::cast_slice(&[7u16, 8, 9]));

        assert_eq!(arena.write_count(), 0);
        assert_eq!(arena.read::<u16>(&first), vec![0, 0]);
        assert_eq!(arena.read::<u16>(&second), vec![0, 0]);
    }

    #[test]
    fn test_write_range_checks_backing_store() {
        let alloc = ArenaAllocation {
            unit_offset: 4,
            byte_offset: 8,
            element_size: 2,
            count: 4,
        };
        assert_eq!(write_range(&alloc, 8, 16), Some(8..16));
        assert_eq!(write_range(&alloc, 6, 16), Some(8..14));
        assert_eq!(write_range(&alloc, 8, 12), None);
        assert_eq!(write_range(&alloc, 10, 64), None);
    }

    #[test]
    fn test_zero_sized_elements_are_rejected() {
        assert!(bump_allocate(0, 64, 0, 4).is_none());
    }
}
