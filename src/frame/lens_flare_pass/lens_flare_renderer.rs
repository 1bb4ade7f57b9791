use std::sync::Arc;

use log::warn;
use vulkano::command_buffer::{
    AutoCommandBufferBuilder, CommandBufferUsage, PrimaryAutoCommandBuffer, RenderPassBeginInfo,
    SubpassContents,
};
use vulkano::device::Queue;
use vulkano::format::Format;
use vulkano::image::ImageViewAbstract;
use vulkano::render_pass::{Framebuffer, FramebufferCreateInfo, RenderPass};
use vulkano::sync::GpuFuture;

use crate::error::GfxError;
use crate::frame::frame_plan::LensFlareParams;

use super::lens_flare_pass::LensFlarePass;

/// Owns the composite render pass targeting the swapchain image. Runs
/// exactly one full-screen draw per frame.
pub struct LensFlareRenderer {
    pub gfx_queue: Arc<Queue>,
    pub render_pass: Arc<RenderPass>,
    lens_flare_pass: LensFlarePass,

    framebuffer: Option<Arc<Framebuffer>>,
    command_buffer_builder: Option<AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>>,
}

impl LensFlareRenderer {
    pub fn new(gfx_queue: Arc<Queue>, final_output_format: Format) -> Result<LensFlareRenderer, GfxError> {
        let render_pass = vulkano::single_pass_renderpass!(gfx_queue.device().clone(),
            attachments: {
                final_color: {
                    load: Clear,
                    store: Store,
                    format: final_output_format,
                    samples: 1,
                }
            },
            pass: {
                color: [final_color],
                depth_stencil: {}
            }
        )
        .map_err(|e| GfxError::creation("lens flare render pass", e))?;

        let lens_flare_pass = LensFlarePass::new(gfx_queue.clone(), render_pass.clone())?;

        Ok(LensFlareRenderer {
            gfx_queue,
            render_pass,
            lens_flare_pass,
            framebuffer: None,
            command_buffer_builder: None,
        })
    }

    pub fn draw(
        &mut self,
        scene_image: Arc<dyn ImageViewAbstract + 'static>,
        params: Option<&LensFlareParams>,
    ) -> usize {
        let dimensions = match &self.framebuffer {
            Some(framebuffer) => framebuffer.extent(),
            None => return 0,
        };
        match self.lens_flare_pass.draw(dimensions, scene_image, params) {
            Ok(cb) => {
                let builder = match self.command_buffer_builder.as_mut() {
                    Some(builder) => builder,
                    None => return 0,
                };
                match builder.execute_commands(cb) {
                    Ok(_) => 1,
                    Err(err) => {
                        warn!("failed to record lens flare draw: {}", err);
                        0
                    }
                }
            }
            Err(err) => {
                warn!("skipping lens flare composite: {}", err);
                0
            }
        }
    }

    pub fn begin_render_pass(
        &mut self,
        final_image: Arc<dyn ImageViewAbstract + 'static>,
    ) -> Result<(), GfxError> {
        let framebuffer = Framebuffer::new(
            self.render_pass.clone(),
            FramebufferCreateInfo {
                attachments: vec![final_image],
                ..Default::default()
            },
        )
        .map_err(|e| GfxError::creation("lens flare framebuffer", e))?;

        let mut command_buffer_builder = AutoCommandBufferBuilder::primary(
            self.gfx_queue.device().clone(),
            self.gfx_queue.queue_family_index(),
            CommandBufferUsage::OneTimeSubmit,
        )
        .map_err(|e| GfxError::creation("lens flare command buffer", e))?;
        command_buffer_builder
            .begin_render_pass(
                RenderPassBeginInfo {
                    clear_values: vec![Some([0.0, 0.0, 0.0, 1.0].into())],
                    ..RenderPassBeginInfo::framebuffer(framebuffer.clone())
                },
                SubpassContents::SecondaryCommandBuffers,
            )
            .map_err(|e| GfxError::creation("lens flare render pass begin", e))?;
        self.framebuffer = Some(framebuffer);
        self.command_buffer_builder = Some(command_buffer_builder);
        Ok(())
    }

    pub fn end_render_pass<F: GpuFuture + 'static>(
        &mut self,
        future: F,
    ) -> Result<Box<dyn GpuFuture>, GfxError> {
        let mut builder = self
            .command_buffer_builder
            .take()
            .ok_or_else(|| GfxError::creation("lens flare render pass end", "pass never began"))?;
        builder
            .end_render_pass()
            .map_err(|e| GfxError::creation("lens flare render pass end", e))?;
        let command_buffer = builder
            .build()
            .map_err(|e| GfxError::creation("lens flare command buffer build", e))?;

        Ok(future
            .then_execute(self.gfx_queue.clone(), command_buffer)
            .map_err(|e| GfxError::creation("lens flare command submission", e))?
            .boxed())
    }
}
