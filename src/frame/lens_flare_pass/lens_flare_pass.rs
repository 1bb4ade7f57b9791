use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use rand::Rng;
use vulkano::buffer::{BufferUsage, CpuAccessibleBuffer, TypedBufferAccess};
use vulkano::command_buffer::{
    AutoCommandBufferBuilder, CommandBufferInheritanceInfo, CommandBufferUsage,
    SecondaryAutoCommandBuffer,
};
use vulkano::descriptor_set::{PersistentDescriptorSet, WriteDescriptorSet};
use vulkano::device::Queue;
use vulkano::format::Format;
use vulkano::image::view::ImageView;
use vulkano::image::{ImageDimensions, ImageViewAbstract, ImmutableImage, MipmapsCount};
use vulkano::impl_vertex;
use vulkano::pipeline::graphics::input_assembly::InputAssemblyState;
use vulkano::pipeline::graphics::vertex_input::BuffersDefinition;
use vulkano::pipeline::graphics::viewport::{Viewport, ViewportState};
use vulkano::pipeline::{GraphicsPipeline, Pipeline, PipelineBindPoint};
use vulkano::render_pass::{RenderPass, Subpass};
use vulkano::sampler::{Filter, Sampler, SamplerAddressMode, SamplerCreateInfo};

use crate::error::{DrawError, GfxError};
use crate::frame::frame_plan::LensFlareParams;

const NOISE_SIZE: u32 = 256;

/// Full-screen composite: copies the forward pass's color image to the
/// swapchain and layers flare ghosts on top when the light is on
/// screen. With no flare parameters it degenerates to a plain blit.
pub struct LensFlarePass {
    gfx_queue: Arc<Queue>,
    pipeline: Arc<GraphicsPipeline>,
    subpass: Subpass,
    vertex_buffer: Arc<CpuAccessibleBuffer<[Vertex]>>,
    noise_view: Arc<dyn ImageViewAbstract + 'static>,
}

impl LensFlarePass {
    pub fn new(gfx_queue: Arc<Queue>, render_pass: Arc<RenderPass>) -> Result<LensFlarePass, GfxError> {
        let subpass = Subpass::from(render_pass, 0).ok_or_else(|| {
            GfxError::creation("lens flare subpass", "render pass has no subpass 0")
        })?;

        let vertices = [
            Vertex {
                position: [-1.0, -1.0],
            },
            Vertex {
                position: [-1.0, 3.0],
            },
            Vertex {
                position: [3.0, -1.0],
            },
        ];
        let vertex_buffer = CpuAccessibleBuffer::from_iter(
            gfx_queue.device().clone(),
            BufferUsage {
                vertex_buffer: true,
                ..BufferUsage::empty()
            },
            false,
            vertices,
        )
        .map_err(|e| GfxError::creation("lens flare vertex buffer", e))?;

        let noise_view = LensFlarePass::create_noise_texture(&gfx_queue)?;

        let pipeline = LensFlarePass::create_pipeline(&gfx_queue, subpass.clone())?;

        Ok(LensFlarePass {
            gfx_queue,
            pipeline,
            subpass,
            vertex_buffer,
            noise_view,
        })
    }

    pub fn draw(
        &self,
        viewport_dimensions: [u32; 2],
        scene_image: Arc<dyn ImageViewAbstract + 'static>,
        params: Option<&LensFlareParams>,
    ) -> Result<SecondaryAutoCommandBuffer, DrawError> {
        let aspect = viewport_dimensions[0] as f32 / viewport_dimensions[1].max(1) as f32;
        let push_constants = match params {
            Some(params) => fs::ty::PushConstants {
                sun: [
                    params.screen_position[0],
                    params.screen_position[1],
                    1.0,
                    aspect,
                ],
                tint: [params.tint[0], params.tint[1], params.tint[2], 1.0],
            },
            None => fs::ty::PushConstants {
                sun: [0.0, 0.0, 0.0, aspect],
                tint: [0.0; 4],
            },
        };

        let sampler = Sampler::new(
            self.gfx_queue.device().clone(),
            SamplerCreateInfo {
                mag_filter: Filter::Linear,
                min_filter: Filter::Linear,
                address_mode: [SamplerAddressMode::ClampToEdge; 3],
                ..Default::default()
            },
        )
        .map_err(|e| DrawError::command("lens flare sampler", e))?;
        let noise_sampler = Sampler::new(
            self.gfx_queue.device().clone(),
            SamplerCreateInfo {
                mag_filter: Filter::Linear,
                min_filter: Filter::Linear,
                address_mode: [SamplerAddressMode::Repeat; 3],
                ..Default::default()
            },
        )
        .map_err(|e| DrawError::command("lens flare noise sampler", e))?;

        let layout = self
            .pipeline
            .layout()
            .set_layouts()
            .get(0)
            .ok_or(DrawError::MissingSetLayout { index: 0 })?;
        let descriptor_set = PersistentDescriptorSet::new(
            layout.clone(),
            [
                WriteDescriptorSet::image_view_sampler(0, scene_image, sampler),
                WriteDescriptorSet::image_view_sampler(1, self.noise_view.clone(), noise_sampler),
            ],
        )
        .map_err(|e| DrawError::command("lens flare descriptor set", e))?;

        let mut builder = AutoCommandBufferBuilder::secondary(
            self.gfx_queue.device().clone(),
            self.gfx_queue.queue_family_index(),
            CommandBufferUsage::MultipleSubmit,
            CommandBufferInheritanceInfo {
                render_pass: Some(self.subpass.clone().into()),
                ..Default::default()
            },
        )
        .map_err(|e| DrawError::command("lens flare command buffer", e))?;
        builder
            .set_viewport(
                0,
                [Viewport {
                    origin: [0.0, 0.0],
                    dimensions: [viewport_dimensions[0] as f32, viewport_dimensions[1] as f32],
                    depth_range: 0.0..1.0,
                }],
            )
            .bind_pipeline_graphics(self.pipeline.clone())
            .bind_descriptor_sets(
                PipelineBindPoint::Graphics,
                self.pipeline.layout().clone(),
                0,
                descriptor_set,
            )
            .push_constants(self.pipeline.layout().clone(), 0, push_constants)
            .bind_vertex_buffers(0, self.vertex_buffer.clone())
            .draw(self.vertex_buffer.len() as u32, 1, 0, 0)
            .map_err(|e| DrawError::command("lens flare draw", e))?;
        builder
            .build()
            .map_err(|e| DrawError::command("lens flare command buffer build", e))
    }

    // private methods

    fn create_noise_texture(
        gfx_queue: &Arc<Queue>,
    ) -> Result<Arc<dyn ImageViewAbstract + 'static>, GfxError> {
        let mut rng = rand::thread_rng();
        let mut data = vec![0u8; (NOISE_SIZE * NOISE_SIZE * 4) as usize];
        rng.fill(data.as_mut_slice());

        let (image, _future) = ImmutableImage::from_iter(
            data,
            ImageDimensions::Dim2d {
                width: NOISE_SIZE,
                height: NOISE_SIZE,
                array_layers: 1,
            },
            MipmapsCount::One,
            Format::R8G8B8A8_UNORM,
            gfx_queue.clone(),
        )
        .map_err(|e| GfxError::creation("lens flare noise texture", e))?;
        let view = ImageView::new_default(image)
            .map_err(|e| GfxError::creation("lens flare noise view", e))?;
        Ok(view)
    }

    fn create_pipeline(gfx_queue: &Arc<Queue>, subpass: Subpass) -> Result<Arc<GraphicsPipeline>, GfxError> {
        let vs = vs::load(gfx_queue.device().clone())
            .map_err(|e| GfxError::creation("lens flare vertex shader", e))?;
        let fs = fs::load(gfx_queue.device().clone())
            .map_err(|e| GfxError::creation("lens flare fragment shader", e))?;
        let vs_entry = vs.entry_point("main").ok_or_else(|| {
            GfxError::creation("lens flare vertex shader", "missing entry point")
        })?;
        let fs_entry = fs.entry_point("main").ok_or_else(|| {
            GfxError::creation("lens flare fragment shader", "missing entry point")
        })?;

        GraphicsPipeline::start()
            .vertex_input_state(BuffersDefinition::new().vertex::<Vertex>())
            .vertex_shader(vs_entry, ())
            .input_assembly_state(InputAssemblyState::new())
            .viewport_state(ViewportState::viewport_dynamic_scissor_irrelevant())
            .fragment_shader(fs_entry, ())
            .render_pass(subpass)
            .build(gfx_queue.device().clone())
            .map_err(|e| GfxError::creation("lens flare pipeline", e))
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Zeroable, Pod)]
struct Vertex {
    position: [f32; 2],
}
impl_vertex!(Vertex, position);

mod vs {
    vulkano_shaders::shader! {
        ty: "vertex",
        src: "
#version 450

layout(location = 0) in vec2 position;

layout(location = 0) out vec2 v_uv;

void main() {
    gl_Position = vec4(position, 0.0, 1.0);
    v_uv = position * 0.5 + 0.5;
}"
    }
}

mod fs {
    vulkano_shaders::shader! {
        ty: "fragment",
        src: "
#version 450

layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 f_color;

layout(set = 0, binding = 0) uniform sampler2D scene_color;
layout(set = 0, binding = 1) uniform sampler2D noise_map;

layout(push_constant) uniform PushConstants {
    // xy screen position of the sun, z active flag, w aspect ratio
    vec4 sun;
    vec4 tint;
} push_constants;

float ghost(vec2 uv, vec2 center, float radius, float aspect) {
    vec2 d = (uv - center) * vec2(aspect, 1.0);
    return smoothstep(radius, 0.0, length(d));
}

void main() {
    vec3 scene = texture(scene_color, v_uv).rgb;

    if (push_constants.sun.z < 0.5) {
        f_color = vec4(scene, 1.0);
        return;
    }

    float aspect = push_constants.sun.w;
    vec2 sun_pos = push_constants.sun.xy;
    vec2 to_center = vec2(0.5) - sun_pos;

    vec3 flare = vec3(0.0);

    // Halo straight on the light.
    vec2 d = (v_uv - sun_pos) * vec2(aspect, 1.0);
    flare += push_constants.tint.rgb * pow(max(1.0 - length(d), 0.0), 8.0);

    // Ghosts strung along the line through the screen center.
    flare += push_constants.tint.rgb * 0.30 * ghost(v_uv, sun_pos + to_center * 0.6, 0.06, aspect);
    flare += push_constants.tint.rgb * 0.20 * ghost(v_uv, sun_pos + to_center * 1.1, 0.10, aspect);
    flare += push_constants.tint.rgb * 0.15 * ghost(v_uv, sun_pos + to_center * 1.6, 0.16, aspect);
    flare += push_constants.tint.rgb * 0.10 * ghost(v_uv, sun_pos + to_center * 2.1, 0.22, aspect);

    float grain = texture(noise_map, v_uv * 3.0).r;
    flare *= 0.85 + 0.3 * grain;

    f_color = vec4(scene + flare, 1.0);
}",
        types_meta: {
            use bytemuck::{Pod, Zeroable};

            #[derive(Clone, Copy, Zeroable, Pod)]
        },
    }
}
