use std::sync::Arc;

use log::warn;
use vulkano::command_buffer::{
    AutoCommandBufferBuilder, CommandBufferUsage, PrimaryAutoCommandBuffer, RenderPassBeginInfo,
    SubpassContents,
};
use vulkano::device::Queue;
use vulkano::format::Format;
use vulkano::image::view::ImageView;
use vulkano::image::{AttachmentImage, ImageUsage};
use vulkano::render_pass::{Framebuffer, FramebufferCreateInfo, RenderPass};
use vulkano::sync::GpuFuture;

use crate::error::GfxError;
use crate::scene_pkg::scene::Scene;

use super::object_3d_shadow_pass::Object3DShadowPass;

/// Renders the scene's depth from the light's point of view into a
/// sampled D16 attachment. The whole pass runs once per session; the
/// resulting image is then only ever read.
pub struct ShadowMapRenderer {
    pub gfx_queue: Arc<Queue>,
    pub render_pass: Arc<RenderPass>,
    // Parallel to `scene.objects`; `None` marks objects without a mesh.
    object_3d_passes: Vec<Option<Object3DShadowPass>>,

    framebuffer: Option<Arc<Framebuffer>>,
    command_buffer_builder: Option<AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>>,

    pub shadow_image: Arc<ImageView<AttachmentImage>>,
}

impl ShadowMapRenderer {
    pub fn new(queue: Arc<Queue>, scene: &Scene) -> Result<ShadowMapRenderer, GfxError> {
        let render_pass = vulkano::single_pass_renderpass!(queue.device().clone(),
                attachments: {
                    depth: {
                        load: Clear,
                        store: Store,
                        format: Format::D16_UNORM,
                        samples: 1,
                    }
                },
                pass: {
                    color: [],
                    depth_stencil: {depth}
                }
            )
        .map_err(|e| GfxError::creation("shadow render pass", e))?;

        let shadow_image = AttachmentImage::with_usage(
            queue.device().clone(),
            [scene.shadows.width, scene.shadows.height],
            Format::D16_UNORM,
            ImageUsage {
                sampled: true,
                ..ImageUsage::empty()
            },
        )
        .map_err(|e| GfxError::creation("shadow map image", e))?;
        let shadow_image = ImageView::new_default(shadow_image)
            .map_err(|e| GfxError::creation("shadow map image view", e))?;

        let mut object_3d_passes = Vec::with_capacity(scene.objects.len());
        for object_3d in &scene.objects {
            let pass = match &object_3d.mesh {
                Some(mesh) => Some(Object3DShadowPass::new(
                    queue.clone(),
                    render_pass.clone(),
                    mesh,
                )?),
                None => None,
            };
            object_3d_passes.push(pass);
        }

        Ok(ShadowMapRenderer {
            gfx_queue: queue,
            render_pass,
            object_3d_passes,
            framebuffer: None,
            command_buffer_builder: None,
            shadow_image,
        })
    }

    /// Records every meshed object against the light's frustum. A
    /// failed object draw is logged and skipped; the rest of the map
    /// still bakes.
    pub fn draw(&mut self, scene: &Scene) -> usize {
        let light_vp = match &scene.light {
            Some(light) => light.view_projection(),
            None => return 0,
        };
        let dimensions = match &self.framebuffer {
            Some(framebuffer) => framebuffer.extent(),
            None => return 0,
        };

        let mut draw_calls = 0;
        for index in 0..self.object_3d_passes.len() {
            let model = scene.objects[index].transform.model_matrix();
            let recorded = match &self.object_3d_passes[index] {
                Some(pass) => pass.draw(dimensions, model, light_vp),
                None => continue,
            };
            match recorded {
                Ok(cb) => {
                    if self.execute_draw_pass(cb) {
                        draw_calls += 1;
                    }
                }
                Err(err) => warn!("skipping object {} in shadow pass: {}", index, err),
            }
        }
        draw_calls
    }

    pub fn begin_render_pass(&mut self) -> Result<(), GfxError> {
        let framebuffer = Framebuffer::new(
            self.render_pass.clone(),
            FramebufferCreateInfo {
                attachments: vec![self.shadow_image.clone()],
                ..Default::default()
            },
        )
        .map_err(|e| GfxError::creation("shadow framebuffer", e))?;
        let mut command_buffer_builder = AutoCommandBufferBuilder::primary(
            self.gfx_queue.device().clone(),
            self.gfx_queue.queue_family_index(),
            CommandBufferUsage::OneTimeSubmit,
        )
        .map_err(|e| GfxError::creation("shadow command buffer", e))?;
        command_buffer_builder
            .begin_render_pass(
                RenderPassBeginInfo {
                    clear_values: vec![Some(1.0f32.into())],
                    ..RenderPassBeginInfo::framebuffer(framebuffer.clone())
                },
                SubpassContents::SecondaryCommandBuffers,
            )
            .map_err(|e| GfxError::creation("shadow render pass begin", e))?;
        self.framebuffer = Some(framebuffer);
        self.command_buffer_builder = Some(command_buffer_builder);
        Ok(())
    }

    fn execute_draw_pass(
        &mut self,
        command_buffer: vulkano::command_buffer::SecondaryAutoCommandBuffer,
    ) -> bool {
        let builder = match self.command_buffer_builder.as_mut() {
            Some(builder) => builder,
            None => return false,
        };
        match builder.execute_commands(command_buffer) {
            Ok(_) => true,
            Err(err) => {
                warn!("failed to record shadow draw: {}", err);
                false
            }
        }
    }

    pub fn end_render_pass<F: GpuFuture + 'static>(
        &mut self,
        future: F,
    ) -> Result<Box<dyn GpuFuture>, GfxError> {
        let mut builder = self
            .command_buffer_builder
            .take()
            .ok_or_else(|| GfxError::creation("shadow render pass end", "pass never began"))?;
        builder
            .end_render_pass()
            .map_err(|e| GfxError::creation("shadow render pass end", e))?;
        let command_buffer = builder
            .build()
            .map_err(|e| GfxError::creation("shadow command buffer build", e))?;

        Ok(future
            .then_execute(self.gfx_queue.clone(), command_buffer)
            .map_err(|e| GfxError::creation("shadow command submission", e))?
            .boxed())
    }
}
