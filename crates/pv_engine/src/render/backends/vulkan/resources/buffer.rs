//! Buffer management
//!
//! Host-visible buffers are written through a temporary mapping. Device-local
//! buffers are filled from a staging buffer with a blocking one-shot copy.

use ash::{vk, Device};
use std::marker::PhantomData;
use crate::render::backends::vulkan::{
    memory, SingleTimeCommands, VkResultExt, VulkanContext, VulkanError, VulkanResult,
};
use crate::render::primitives::Mesh;

/// Host-visible and host-coherent, so writes need no explicit flush
pub const HOST_MEMORY: vk::MemoryPropertyFlags = vk::MemoryPropertyFlags::from_raw(
    vk::MemoryPropertyFlags::HOST_VISIBLE.as_raw() | vk::MemoryPropertyFlags::HOST_COHERENT.as_raw(),
);

/// Buffer with its own memory allocation
pub struct Buffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
}

impl Buffer {
    /// Create an exclusive buffer of `size` bytes backed by memory with `properties`
    pub fn new(
        context: &VulkanContext,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<Self> {
        let device = context.raw_device().clone();
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.create_buffer(&buffer_info, None).vk_context("vkCreateBuffer")? };

        // From here on Drop releases whatever has been created
        let mut result = Self {
            device,
            buffer,
            memory: vk::DeviceMemory::null(),
            size,
        };

        let requirements = unsafe { result.device.get_buffer_memory_requirements(buffer) };
        result.memory = memory::allocate(
            &result.device,
            &context.physical_device.memory_properties,
            requirements,
            properties,
        )?;
        unsafe {
            result
                .device
                .bind_buffer_memory(buffer, result.memory, 0)
                .vk_context("vkBindBufferMemory")?;
        }

        Ok(result)
    }

    /// Create a host-visible staging buffer holding `bytes`
    pub fn staging(context: &VulkanContext, bytes: &[u8]) -> VulkanResult<Self> {
        let staging = Self::new(context, device_size(bytes.len()), vk::BufferUsageFlags::TRANSFER_SRC, HOST_MEMORY)?;
        staging.write_bytes(bytes)?;
        Ok(staging)
    }

    /// Create a device-local buffer with `usage` and fill it with `bytes`
    ///
    /// Blocks until the copy has completed; the staging buffer is gone on return.
    pub fn device_local(
        context: &VulkanContext,
        commands: &SingleTimeCommands<'_>,
        bytes: &[u8],
        usage: vk::BufferUsageFlags,
    ) -> VulkanResult<Self> {
        if bytes.is_empty() {
            return Err(VulkanError::InvalidOperation {
                reason: "Cannot upload an empty buffer".to_string(),
            });
        }

        let staging = Self::staging(context, bytes)?;
        let buffer = Self::new(
            context,
            staging.size,
            vk::BufferUsageFlags::TRANSFER_DST | usage,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;

        commands.submit(|device, command_buffer| {
            let region = vk::BufferCopy { src_offset: 0, dst_offset: 0, size: staging.size };
            unsafe { device.cmd_copy_buffer(command_buffer, staging.buffer, buffer.buffer, &[region]) };
            Ok(())
        })?;

        log::debug!("Uploaded {} bytes to device-local {:?} buffer", bytes.len(), usage);

        Ok(buffer)
    }

    /// Copy `bytes` into host-visible memory
    pub fn write_bytes(&self, bytes: &[u8]) -> VulkanResult<()> {
        if device_size(bytes.len()) > self.size {
            return Err(VulkanError::InvalidOperation {
                reason: format!("Write of {} bytes exceeds buffer of {} bytes", bytes.len(), self.size),
            });
        }

        unsafe {
            let mapped = self
                .device
                .map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())
                .vk_context("vkMapMemory")?;
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), mapped.cast::<u8>(), bytes.len());
            self.device.unmap_memory(self.memory);
        }
        Ok(())
    }

    /// Get the buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Size in bytes
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

fn device_size(len: usize) -> vk::DeviceSize {
    len as vk::DeviceSize
}

/// Persistently mapped uniform buffer holding one `T`
pub struct UniformBuffer<T: bytemuck::Pod> {
    mapped: *mut u8,
    buffer: Buffer,
    _marker: PhantomData<T>,
}

impl<T: bytemuck::Pod> UniformBuffer<T> {
    /// Create and map the buffer; it stays mapped until dropped
    pub fn new(context: &VulkanContext) -> VulkanResult<Self> {
        let size = device_size(std::mem::size_of::<T>());
        let buffer = Buffer::new(context, size, vk::BufferUsageFlags::UNIFORM_BUFFER, HOST_MEMORY)?;
        let mapped = unsafe {
            buffer
                .device
                .map_memory(buffer.memory, 0, size, vk::MemoryMapFlags::empty())
                .vk_context("vkMapMemory")?
        };

        Ok(Self {
            mapped: mapped.cast::<u8>(),
            buffer,
            _marker: PhantomData,
        })
    }

    /// Overwrite the buffer contents; visible to the next submission
    pub fn write(&mut self, value: &T) {
        let bytes = bytemuck::bytes_of(value);
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), self.mapped, bytes.len());
        }
    }

    /// Get the buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.handle()
    }

    /// Size in bytes
    pub fn size(&self) -> vk::DeviceSize {
        self.buffer.size()
    }
}

impl<T: bytemuck::Pod> Drop for UniformBuffer<T> {
    fn drop(&mut self) {
        unsafe {
            self.buffer.device.unmap_memory(self.buffer.memory);
        }
    }
}

/// Vertex and index buffers for one mesh
pub struct MeshBuffers {
    index_buffer: Buffer,
    vertex_buffer: Buffer,
    index_count: u32,
}

impl MeshBuffers {
    /// Validate `mesh` and upload it to device-local memory
    pub fn upload(
        context: &VulkanContext,
        commands: &SingleTimeCommands<'_>,
        mesh: &Mesh,
    ) -> VulkanResult<Self> {
        mesh.validate().map_err(VulkanError::InvalidMesh)?;
        let index_count = u32::try_from(mesh.indices.len())
            .map_err(|_| VulkanError::InvalidMesh("Too many indices".to_string()))?;
        let vertex_count = u32::try_from(mesh.vertices.len())
            .map_err(|_| VulkanError::InvalidMesh("Too many vertices".to_string()))?;

        let vertex_buffer = Buffer::device_local(
            context,
            commands,
            bytemuck::cast_slice(&mesh.vertices),
            vk::BufferUsageFlags::VERTEX_BUFFER,
        )?;
        let index_buffer = Buffer::device_local(
            context,
            commands,
            bytemuck::cast_slice(&mesh.indices),
            vk::BufferUsageFlags::INDEX_BUFFER,
        )?;

        log::info!("Uploaded mesh: {} vertices, {} indices", vertex_count, index_count);

        Ok(Self {
            index_buffer,
            vertex_buffer,
            index_count,
        })
    }

    /// Vertex buffer handle
    pub fn vertex_buffer(&self) -> vk::Buffer {
        self.vertex_buffer.handle()
    }

    /// Index buffer handle
    pub fn index_buffer(&self) -> vk::Buffer {
        self.index_buffer.handle()
    }

    /// Number of indices to draw
    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}
