//! Typed GPU buffers and the vertex-array object that groups them for a draw.

use bytemuck::Pod;

use crate::error::{RenderError, Result};

/// What a buffer is bound as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    /// Per-element vertex data. Also readable as storage for sprite expansion
    /// and the presort kernel.
    Attribute,
    /// 32-bit draw indices. Also readable as storage by sprite expansion.
    Element,
    Uniform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutability {
    /// Written once at creation.
    Static,
    /// Rewritten through [`GpuBuffer::update`] or as a copy destination.
    Dynamic,
}

impl BufferKind {
    fn usages(self, mutability: Mutability) -> wgpu::BufferUsages {
        use wgpu::BufferUsages as U;
        let base = match self {
            BufferKind::Attribute => U::VERTEX | U::STORAGE,
            BufferKind::Element => U::INDEX | U::STORAGE,
            BufferKind::Uniform => U::UNIFORM,
        };
        match mutability {
            Mutability::Static => base | U::COPY_SRC,
            Mutability::Dynamic => base | U::COPY_SRC | U::COPY_DST,
        }
    }
}

/// Zero-sized bindings are invalid, keep every allocation at least this large.
const MIN_BUFFER_SIZE: u64 = 16;

pub struct GpuBuffer {
    buffer: wgpu::Buffer,
    label: &'static str,
    mutability: Mutability,
    len: usize,
    byte_size: u64,
}

impl GpuBuffer {
    /// Allocate a buffer holding a copy of `data`.
    pub fn from_slice<T: Pod>(
        device: &wgpu::Device,
        label: &'static str,
        data: &[T],
        kind: BufferKind,
        mutability: Mutability,
    ) -> Self {
        let bytes: &[u8] = bytemuck::cast_slice(data);
        let byte_size = bytes.len() as u64;
        let size = byte_size
            .next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT)
            .max(MIN_BUFFER_SIZE);

        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: kind.usages(mutability),
            mapped_at_creation: true,
        });
        buffer.slice(..).get_mapped_range_mut()[..bytes.len()].copy_from_slice(bytes);
        buffer.unmap();

        Self { buffer, label, mutability, len: data.len(), byte_size }
    }

    /// Replace the whole contents. The new data must have the original byte size
    /// and a size that is a multiple of four bytes.
    pub fn update<T: Pod>(&self, queue: &wgpu::Queue, data: &[T]) -> Result<()> {
        if self.mutability == Mutability::Static {
            return Err(RenderError::StaticBufferUpdate { label: self.label });
        }
        let bytes: &[u8] = bytemuck::cast_slice(data);
        if bytes.len() as u64 != self.byte_size {
            return Err(RenderError::BufferSizeMismatch {
                label: self.label,
                expected: self.byte_size,
                actual: bytes.len() as u64,
            });
        }
        if !bytes.is_empty() {
            queue.write_buffer(&self.buffer, 0, bytes);
        }
        Ok(())
    }

    pub fn handle(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    /// Number of elements the buffer was created with.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

struct AttribSlot {
    location: u32,
    buffer: GpuBuffer,
    attributes: [wgpu::VertexAttribute; 1],
}

/// Attribute buffers bound to shader locations plus the element buffer that
/// orders the draw.
pub struct VertexArray {
    attribs: Vec<AttribSlot>,
    elements: GpuBuffer,
}

impl VertexArray {
    pub fn new(elements: GpuBuffer) -> Self {
        Self { attribs: Vec::new(), elements }
    }

    /// Bind `buffer` to shader `location`, replacing any previous binding.
    pub fn set_attrib_buffer(
        &mut self,
        location: u32,
        format: wgpu::VertexFormat,
        buffer: GpuBuffer,
    ) {
        let slot = AttribSlot {
            location,
            buffer,
            attributes: [wgpu::VertexAttribute { format, offset: 0, shader_location: location }],
        };
        match self.attribs.binary_search_by_key(&location, |s| s.location) {
            Ok(i) => self.attribs[i] = slot,
            Err(i) => self.attribs.insert(i, slot),
        }
    }

    /// Bound attributes as `(location, buffer)`, ascending by location.
    pub fn attrib_buffers(&self) -> impl Iterator<Item = (u32, &GpuBuffer)> {
        self.attribs.iter().map(|s| (s.location, &s.buffer))
    }

    pub fn element_buffer(&self) -> &GpuBuffer {
        &self.elements
    }

    /// One tightly packed, per-vertex buffer layout per attribute, in slot order.
    pub fn vertex_buffer_layouts(&self) -> Vec<wgpu::VertexBufferLayout<'_>> {
        self.attribs
            .iter()
            .map(|s| wgpu::VertexBufferLayout {
                array_stride: s.attributes[0].format.size(),
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &s.attributes,
            })
            .collect()
    }

    /// Record an indexed draw of the first `count` elements.
    pub fn draw_elements(&self, pass: &mut wgpu::RenderPass<'_>, count: u32) {
        for (slot, attrib) in self.attribs.iter().enumerate() {
            pass.set_vertex_buffer(slot as u32, attrib.buffer.handle().slice(..));
        }
        pass.set_index_buffer(self.elements.handle().slice(..), wgpu::IndexFormat::Uint32);
        pass.draw_indexed(0..count, 0, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usages() {
        use wgpu::BufferUsages as U;
        let element = BufferKind::Element.usages(Mutability::Dynamic);
        assert!(element.contains(U::INDEX | U::STORAGE | U::COPY_DST | U::COPY_SRC));

        let attrib = BufferKind::Attribute.usages(Mutability::Static);
        assert!(attrib.contains(U::VERTEX | U::STORAGE));
        assert!(!attrib.contains(U::COPY_DST));
    }
}
