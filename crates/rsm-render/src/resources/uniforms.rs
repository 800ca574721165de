//! Per-draw constant upload
//!
//! Each draw gets its own slot in one dynamic-offset uniform buffer. A frame
//! starts by discarding the previous frame's slots (`begin`), passes push the
//! constants of every draw they are about to record, and `flush` uploads the
//! pending slots with a single `queue.write_buffer` before the pass records
//! its draws. Slots are never patched in place after a flush, so no draw can
//! observe a partially written region.

use crate::{Error, Result};
use glam::{Mat4, Vec4};

/// Per-draw transform bundle and tint
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameConstants {
    pub model: Mat4,
    pub view: Mat4,
    pub projection: Mat4,
    /// Inverse-transpose of `model`
    pub normal_matrix: Mat4,
    /// Albedo (GBuffer) or flux (RSM); `w` unused
    pub tint: Vec4,
}

pub struct DrawUniforms {
    layout: wgpu::BindGroupLayout,
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    stride: u64,
    capacity: usize,
    staging: Vec<u8>,
    flushed: usize,
}

impl DrawUniforms {
    const INITIAL_CAPACITY: usize = 64;

    pub fn new(device: &wgpu::Device) -> Self {
        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let stride = aligned_stride(std::mem::size_of::<FrameConstants>() as u64, alignment);

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Draw Uniforms Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<FrameConstants>() as u64),
                },
                count: None,
            }],
        });

        let (buffer, bind_group) = Self::allocate(device, &layout, stride, Self::INITIAL_CAPACITY);
        Self {
            layout,
            buffer,
            bind_group,
            stride,
            capacity: Self::INITIAL_CAPACITY,
            staging: Vec::new(),
            flushed: 0,
        }
    }

    fn allocate(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        stride: u64,
        capacity: usize,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Draw Uniforms Buffer"),
            size: stride * capacity as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Draw Uniforms Bind Group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<FrameConstants>() as u64),
                }),
            }],
        });
        (buffer, bind_group)
    }

    /// Discard last frame's slots and make room for `draws` slots
    ///
    /// Growing replaces the buffer and bind group, so it must happen before
    /// any pass of the frame records a draw.
    pub fn begin(&mut self, device: &wgpu::Device, draws: usize) {
        self.staging.clear();
        self.flushed = 0;
        if draws > self.capacity {
            let capacity = draws.next_power_of_two();
            log::debug!("Growing draw uniforms {} -> {} slots", self.capacity, capacity);
            let (buffer, bind_group) = Self::allocate(device, &self.layout, self.stride, capacity);
            self.buffer = buffer;
            self.bind_group = bind_group;
            self.capacity = capacity;
        }
    }

    /// Stage one draw's constants; returns its dynamic offset
    pub fn push(&mut self, constants: &FrameConstants) -> Result<u32> {
        let slot = self.len();
        if slot >= self.capacity {
            return Err(Error::Resource(format!(
                "draw uniform arena full ({} slots reserved this frame)",
                self.capacity
            )));
        }
        let offset = slot as u64 * self.stride;
        self.staging.extend_from_slice(bytemuck::bytes_of(constants));
        self.staging.resize((offset + self.stride) as usize, 0);
        Ok(offset as u32)
    }

    /// Upload every slot pushed since the last flush
    pub fn flush(&mut self, queue: &wgpu::Queue) {
        if self.flushed < self.staging.len() {
            queue.write_buffer(&self.buffer, self.flushed as u64, &self.staging[self.flushed..]);
            self.flushed = self.staging.len();
        }
    }

    /// Slots staged this frame
    pub fn len(&self) -> usize {
        self.staging.len() / self.stride as usize
    }

    pub fn is_empty(&self) -> bool {
        self.staging.is_empty()
    }

    pub fn layout(&self) -> &wgpu::BindGroupLayout {
        &self.layout
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }
}

fn aligned_stride(size: u64, alignment: u64) -> u64 {
    let alignment = alignment.max(1);
    size.div_ceil(alignment) * alignment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_constants_layout() {
        assert_eq!(std::mem::size_of::<FrameConstants>(), 4 * 64 + 16);
    }

    #[test]
    fn stride_rounds_up_to_alignment() {
        assert_eq!(aligned_stride(272, 256), 512);
        assert_eq!(aligned_stride(256, 256), 256);
        assert_eq!(aligned_stride(10, 0), 10);
    }
}
