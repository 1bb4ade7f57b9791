use std::sync::Arc;

use cgmath::{Matrix4, SquareMatrix, Vector3};
use log::warn;
use vulkano::command_buffer::{
    AutoCommandBufferBuilder, CommandBufferUsage, PrimaryAutoCommandBuffer, RenderPassBeginInfo,
    SubpassContents,
};
use vulkano::device::Queue;
use vulkano::format::Format;
use vulkano::image::view::ImageView;
use vulkano::image::{AttachmentImage, ImageViewAbstract};
use vulkano::render_pass::{Framebuffer, FramebufferCreateInfo, RenderPass};
use vulkano::sync::GpuFuture;

use crate::error::GfxError;
use crate::frame::frame_plan::FramePlan;
use crate::scene_pkg::scene::Scene;

use super::object_3d_forward_pass::{ForwardMaterial, Object3DForwardPass};

const CLEAR_COLOR: [f32; 4] = [0.1, 0.1, 0.15, 1.0];
const LIGHT_MARKER_SCALE: f32 = 0.2;

/// Camera and light state shared by every draw in one forward pass.
pub struct ForwardFrame {
    pub view: Matrix4<f32>,
    pub projection: Matrix4<f32>,
    pub light_vp: Matrix4<f32>,
    pub camera_position: Vector3<f32>,
    pub light_position: Vector3<f32>,
    pub light_color: [f32; 3],
    pub shininess: f32,
    pub ambient: f32,
    /// False when the scene has no light; surfaces render unshaded.
    pub lit: bool,
    pub shadows_active: bool,
    pub shadow_texel: [f32; 2],
}

impl ForwardFrame {
    pub fn from_scene(scene: &Scene, plan: &FramePlan) -> Option<ForwardFrame> {
        let camera = scene.camera.as_ref()?;
        let mut frame = ForwardFrame {
            view: camera.view_matrix(),
            projection: camera.projection_matrix(),
            light_vp: Matrix4::identity(),
            camera_position: camera.transform.position,
            light_position: Vector3::new(0.0, 0.0, 0.0),
            light_color: [1.0, 1.0, 1.0],
            shininess: 1.0,
            ambient: 1.0,
            lit: false,
            shadows_active: plan.shadows_active,
            shadow_texel: [
                1.0 / scene.shadows.width as f32,
                1.0 / scene.shadows.height as f32,
            ],
        };
        if let Some(light) = &scene.light {
            frame.light_vp = light.view_projection();
            frame.light_position = light.position;
            frame.light_color = light.color;
            frame.shininess = light.shininess;
            frame.ambient = light.ambient;
            frame.lit = true;
        }
        Some(frame)
    }
}

/// The color pass: draws the opaque bucket, the light marker and the
/// transparent bucket into one color+depth framebuffer, which is either
/// a swapchain image or the offscreen target the lens flare samples.
pub struct ForwardRenderer {
    pub gfx_queue: Arc<Queue>,
    pub render_pass: Arc<RenderPass>,
    // Parallel to `scene.objects`; `None` marks objects without a mesh.
    object_3d_passes: Vec<Option<Object3DForwardPass>>,
    marker_pass: Option<Object3DForwardPass>,

    framebuffer: Option<Arc<Framebuffer>>,
    command_buffer_builder: Option<AutoCommandBufferBuilder<PrimaryAutoCommandBuffer>>,
    depth_buffer: Option<Arc<ImageView<AttachmentImage>>>,
}

impl ForwardRenderer {
    pub fn new(
        queue: Arc<Queue>,
        scene: &Scene,
        output_format: Format,
        max_anisotropy: Option<f32>,
    ) -> Result<ForwardRenderer, GfxError> {
        let render_pass = vulkano::single_pass_renderpass!(queue.device().clone(),
            attachments: {
                color: {
                    load: Clear,
                    store: Store,
                    format: output_format,
                    samples: 1,
                },
                depth: {
                    load: Clear,
                    store: DontCare,
                    format: Format::D16_UNORM,
                    samples: 1,
                }
            },
            pass: {
                color: [color],
                depth_stencil: {depth}
            }
        )
        .map_err(|e| GfxError::creation("forward render pass", e))?;

        let mut object_3d_passes = Vec::with_capacity(scene.objects.len());
        for object_3d in &scene.objects {
            let pass = match &object_3d.mesh {
                Some(mesh) => Some(Object3DForwardPass::new(
                    queue.clone(),
                    render_pass.clone(),
                    mesh,
                    ForwardMaterial {
                        base_color: object_3d.base_color,
                        texture: object_3d.texture.clone(),
                        texture_mix: object_3d.texture_mix,
                        texture_scale: object_3d.texture_scale,
                        lit: true,
                    },
                    max_anisotropy,
                )?),
                None => None,
            };
            object_3d_passes.push(pass);
        }

        let marker_pass = match scene.light.as_ref().and_then(|light| light.mesh.as_ref()) {
            Some(mesh) => {
                let light = scene.light.as_ref().map(|light| {
                    (
                        [light.color[0], light.color[1], light.color[2], 1.0],
                        light.texture.clone(),
                    )
                });
                let (base_color, texture) = light.unwrap_or(([1.0; 4], None));
                let texture_mix = if texture.is_some() { 1.0 } else { 0.0 };
                Some(Object3DForwardPass::new(
                    queue.clone(),
                    render_pass.clone(),
                    mesh,
                    ForwardMaterial {
                        base_color,
                        texture,
                        texture_mix,
                        texture_scale: 1.0,
                        lit: false,
                    },
                    max_anisotropy,
                )?)
            }
            None => None,
        };

        Ok(ForwardRenderer {
            gfx_queue: queue,
            render_pass,
            object_3d_passes,
            marker_pass,
            framebuffer: None,
            command_buffer_builder: None,
            depth_buffer: None,
        })
    }

    /// Draws the plan's buckets in order. Returns the number of draw
    /// calls recorded; a failed object is logged and skipped.
    pub fn draw(
        &mut self,
        scene: &Scene,
        plan: &FramePlan,
        shadow_image: Arc<dyn ImageViewAbstract + 'static>,
    ) -> usize {
        let frame = match ForwardFrame::from_scene(scene, plan) {
            Some(frame) => frame,
            None => return 0,
        };
        let dimensions = match &self.framebuffer {
            Some(framebuffer) => framebuffer.extent(),
            None => return 0,
        };

        let mut draw_calls = 0;
        for &index in &plan.opaque {
            draw_calls += self.draw_object(index, scene, &frame, shadow_image.clone(), dimensions, true);
        }

        if plan.light_marker {
            if let (Some(pass), Some(light)) = (&self.marker_pass, &scene.light) {
                let model = Matrix4::from_translation(light.position)
                    * Matrix4::from_scale(LIGHT_MARKER_SCALE);
                match pass.draw(dimensions, model, &frame, shadow_image.clone(), true) {
                    Ok(cb) => {
                        if self.execute_draw_pass(cb) {
                            draw_calls += 1;
                        }
                    }
                    Err(err) => warn!("skipping light marker: {}", err),
                }
            }
        }

        for &index in &plan.transparent {
            draw_calls +=
                self.draw_object(index, scene, &frame, shadow_image.clone(), dimensions, false);
        }
        draw_calls
    }

    fn draw_object(
        &mut self,
        index: usize,
        scene: &Scene,
        frame: &ForwardFrame,
        shadow_image: Arc<dyn ImageViewAbstract + 'static>,
        dimensions: [u32; 2],
        opaque: bool,
    ) -> usize {
        let pass = match self.object_3d_passes.get(index).and_then(Option::as_ref) {
            Some(pass) => pass,
            None => return 0,
        };
        let model = scene.objects[index].transform.model_matrix();
        match pass.draw(dimensions, model, frame, shadow_image, opaque) {
            Ok(cb) => {
                if self.execute_draw_pass(cb) {
                    1
                } else {
                    0
                }
            }
            Err(err) => {
                warn!("skipping object {} in forward pass: {}", index, err);
                0
            }
        }
    }

    pub fn begin_render_pass(
        &mut self,
        final_image: Arc<dyn ImageViewAbstract + 'static>,
    ) -> Result<(), GfxError> {
        let dimensions = final_image.dimensions().width_height();
        let depth_buffer = self.depth_buffer_for(dimensions)?;

        let framebuffer = Framebuffer::new(
            self.render_pass.clone(),
            FramebufferCreateInfo {
                attachments: vec![final_image, depth_buffer],
                ..Default::default()
            },
        )
        .map_err(|e| GfxError::creation("forward framebuffer", e))?;

        let mut command_buffer_builder = AutoCommandBufferBuilder::primary(
            self.gfx_queue.device().clone(),
            self.gfx_queue.queue_family_index(),
            CommandBufferUsage::OneTimeSubmit,
        )
        .map_err(|e| GfxError::creation("forward command buffer", e))?;
        command_buffer_builder
            .begin_render_pass(
                RenderPassBeginInfo {
                    clear_values: vec![Some(CLEAR_COLOR.into()), Some(1.0f32.into())],
                    ..RenderPassBeginInfo::framebuffer(framebuffer.clone())
                },
                SubpassContents::SecondaryCommandBuffers,
            )
            .map_err(|e| GfxError::creation("forward render pass begin", e))?;
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
                warn!("failed to record forward draw: {}", err);
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
            .ok_or_else(|| GfxError::creation("forward render pass end", "pass never began"))?;
        builder
            .end_render_pass()
            .map_err(|e| GfxError::creation("forward render pass end", e))?;
        let command_buffer = builder
            .build()
            .map_err(|e| GfxError::creation("forward command buffer build", e))?;

        Ok(future
            .then_execute(self.gfx_queue.clone(), command_buffer)
            .map_err(|e| GfxError::creation("forward command submission", e))?
            .boxed())
    }

    fn depth_buffer_for(
        &mut self,
        dimensions: [u32; 2],
    ) -> Result<Arc<ImageView<AttachmentImage>>, GfxError> {
        let matches = self
            .depth_buffer
            .as_ref()
            .map_or(false, |view| view.dimensions().width_height() == dimensions);
        if !matches {
            let image =
                AttachmentImage::transient(self.gfx_queue.device().clone(), dimensions, Format::D16_UNORM)
                    .map_err(|e| GfxError::creation("forward depth buffer", e))?;
            let view = ImageView::new_default(image)
                .map_err(|e| GfxError::creation("forward depth buffer view", e))?;
            self.depth_buffer = Some(view);
        }
        self.depth_buffer
            .clone()
            .ok_or_else(|| GfxError::creation("forward depth buffer", "missing after creation"))
    }
}
