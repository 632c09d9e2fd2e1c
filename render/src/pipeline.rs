//! The per-frame ordering pipeline shared by both renderers:
//! depth keys, then the GPU sort, then the copy of the sorted indices into the
//! renderer's element buffer.

use sort::{GpuSorter, KeyValueBuffers};

use crate::buffers::GpuBuffer;
use crate::context::GpuContext;
use crate::depth::ViewRay;
use crate::error::Result;

/// A source of per-element depth keys.
///
/// Implementations fill the first [`len`](DepthKeyProvider::len) keys of
/// `buffers` from the view ray and the matching values with the identity
/// permutation, either by queued writes or by commands recorded into `encoder`.
pub trait DepthKeyProvider {
    fn len(&self) -> u32;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write_keys(
        &mut self,
        ctx: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        ray: &ViewRay,
        buffers: &KeyValueBuffers,
    ) -> Result<()>;
}

pub struct SortPipeline<P> {
    sorter: GpuSorter,
    buffers: KeyValueBuffers,
    provider: P,
}

impl<P: DepthKeyProvider> SortPipeline<P> {
    /// Create a sorter for `count` elements and hand its buffers to `provider`.
    pub fn new(
        ctx: &GpuContext,
        count: u32,
        provider: impl FnOnce(&KeyValueBuffers) -> Result<P>,
    ) -> Result<Self> {
        let sorter = GpuSorter::new(&ctx.device, count)?;
        let buffers = sorter.create_key_value_buffers(&ctx.device);
        let provider = provider(&buffers)?;
        Ok(Self { sorter, buffers, provider })
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn buffers(&self) -> &KeyValueBuffers {
        &self.buffers
    }

    /// Record one full ordering pass ending with `element_buffer` holding
    /// element indices far to near.
    pub fn run(
        &mut self,
        ctx: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        ray: &ViewRay,
        element_buffer: &GpuBuffer,
    ) -> Result<()> {
        let count = self.provider.len();
        if count == 0 {
            return Ok(());
        }

        {
            let _span = tracing::trace_span!("depth keys", count).entered();
            self.provider.write_keys(ctx, encoder, ray, &self.buffers)?;
        }

        {
            let _span = tracing::trace_span!("sort", count).entered();
            self.sorter.sort(&ctx.queue, encoder, &self.buffers, count)?;
        }

        let _span = tracing::trace_span!("copy sorted indices", count).entered();
        encoder.copy_buffer_to_buffer(
            self.buffers.values(),
            0,
            element_buffer.handle(),
            0,
            count as u64 * std::mem::size_of::<u32>() as u64,
        );
        Ok(())
    }
}
