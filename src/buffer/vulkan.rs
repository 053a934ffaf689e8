//! Host-visible Vulkan buffer arena backed by gpu-allocator.

use std::sync::Arc;

use ash::vk;
use ash::vk::Handle;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};
use gpu_allocator::{AllocationError, MemoryLocation};
use parking_lot::Mutex;

use super::{bump_allocate, write_range, ArenaAllocation, BufferArena};
use crate::backend::{BackendError, BackendResult, BufferHandle};

/// Creation parameters for a [`VulkanBufferArena`].
#[derive(Debug, Clone)]
pub struct VulkanArenaConfig {
    /// Total size in bytes
    pub capacity: u64,
    pub label: String,
}

impl Default for VulkanArenaConfig {
    fn default() -> Self {
        Self {
            capacity: 16 * 1024 * 1024,
            label: "brush geometry".to_string(),
        }
    }
}

/// Persistently mapped buffer usable for both vertex and index fetch.
pub struct VulkanBufferArena {
    device: ash::Device,
    allocator: Arc<Mutex<Allocator>>,
    buffer: vk::Buffer,
    allocation: Option<Allocation>,
    capacity: u64,
    used: u64,
}

impl VulkanBufferArena {
    pub fn new(
        device: ash::Device,
        allocator: Arc<Mutex<Allocator>>,
        config: &VulkanArenaConfig,
    ) -> BackendResult<Self> {
        if config.capacity == 0 {
            return Err(BackendError::InvalidParameter(
                "Arena capacity must be non-zero".into(),
            ));
        }

        unsafe {
            let buffer_info = vk::BufferCreateInfo {
                size: config.capacity,
                usage: vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::INDEX_BUFFER,
                sharing_mode: vk::SharingMode::EXCLUSIVE,
                ..Default::default()
            };

            let buffer = device
                .create_buffer(&buffer_info, None)
                .map_err(|e| BackendError::BufferCreationFailed(e.to_string()))?;

            let requirements = device.get_buffer_memory_requirements(buffer);

            let allocation = allocator.lock().allocate(&AllocationCreateDesc {
                name: &config.label,
                requirements,
                location: MemoryLocation::CpuToGpu,
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            });
            let allocation = match allocation {
                Ok(allocation) => allocation,
                Err(AllocationError::OutOfMemory) => {
                    device.destroy_buffer(buffer, None);
                    return Err(BackendError::OutOfMemory);
                }
                Err(e) => {
                    device.destroy_buffer(buffer, None);
                    return Err(BackendError::BufferCreationFailed(e.to_string()));
                }
            };

            if let Err(e) = device.bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
            {
                device.destroy_buffer(buffer, None);
                if let Err(free_err) = allocator.lock().free(allocation) {
                    log::warn!("Failed to free arena memory after bind error: {}", free_err);
                }
                return Err(BackendError::BufferCreationFailed(e.to_string()));
            }

            log::debug!(
                "Created {} arena ({} bytes)",
                config.label,
                config.capacity
            );

            Ok(Self {
                device,
                allocator,
                buffer,
                allocation: Some(allocation),
                capacity: config.capacity,
                used: 0,
            })
        }
    }

    pub fn raw_buffer(&self) -> vk::Buffer {
        self.buffer
    }

    /// Release the buffer and its memory. The GPU must be done with it.
    pub fn destroy(&mut self) {
        if let Some(allocation) = self.allocation.take() {
            unsafe {
                self.device.destroy_buffer(self.buffer, None);
            }
            if let Err(e) = self.allocator.lock().free(allocation) {
                log::warn!("Failed to free arena memory: {}", e);
            }
            self.buffer = vk::Buffer::null();
            self.used = 0;
        }
    }
}

impl BufferArena for VulkanBufferArena {
    fn buffer(&self) -> BufferHandle {
        BufferHandle::from_raw(self.buffer.as_raw())
    }

    fn allocate(&mut self, element_size: u32, count: u32) -> Option<ArenaAllocation> {
        self.allocation.as_ref()?;
        let allocation = bump_allocate(self.used, self.capacity, element_size, count)?;
        self.used = allocation.end();
        Some(allocation)
    }

    fn write(&mut self, allocation: &ArenaAllocation, data: &[u8]) {
        let Some(mapped) = self
            .allocation
            .as_mut()
            .and_then(|allocation| allocation.mapped_slice_mut())
        else {
            log::error!("Arena memory is not host mapped");
            return;
        };
        if let Some(range) = write_range(allocation, data.len(), mapped.len()) {
            mapped[range].copy_from_slice(data);
        }
    }

    fn reset(&mut self) {
        self.used = 0;
    }

    fn used(&self) -> u64 {
        self.used
    }

    fn capacity(&self) -> u64 {
        self.capacity
    }
}

impl Drop for VulkanBufferArena {
    fn drop(&mut self) {
        if self.allocation.is_some() {
            log::warn!("VulkanBufferArena dropped without destroy(), releasing now");
            self.destroy();
        }
    }
}
