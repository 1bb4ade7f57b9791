use std::sync::Arc;

use cgmath::{Matrix, Matrix4, SquareMatrix};
use vulkano::buffer::{BufferUsage, CpuAccessibleBuffer, CpuBufferPool, TypedBufferAccess};
use vulkano::command_buffer::{
    AutoCommandBufferBuilder, CommandBufferInheritanceInfo, CommandBufferUsage,
    SecondaryAutoCommandBuffer,
};
use vulkano::descriptor_set::{PersistentDescriptorSet, WriteDescriptorSet};
use vulkano::device::Queue;
use vulkano::format::Format;
use vulkano::image::view::ImageView;
use vulkano::image::{ImageDimensions, ImageViewAbstract, ImmutableImage, MipmapsCount};
use vulkano::pipeline::graphics::color_blend::{AttachmentBlend, ColorBlendState};
use vulkano::pipeline::graphics::depth_stencil::{CompareOp, DepthState, DepthStencilState};
use vulkano::pipeline::graphics::input_assembly::InputAssemblyState;
use vulkano::pipeline::graphics::vertex_input::BuffersDefinition;
use vulkano::pipeline::graphics::viewport::{Viewport, ViewportState};
use vulkano::pipeline::{GraphicsPipeline, Pipeline, PipelineBindPoint, StateMode};
use vulkano::render_pass::{RenderPass, Subpass};
use vulkano::sampler::{
    BorderColor, Filter, Sampler, SamplerAddressMode, SamplerCreateInfo, SamplerMipmapMode,
};
use vulkano::shader::ShaderModule;

use crate::error::{DrawError, GfxError};
use crate::object_3d_loader::texture_registry::TextureData;
use crate::scene_pkg::mesh::{Mesh, Normal, Uv, Vertex};

use super::forward_renderer::ForwardFrame;

/// Per-object material state fixed at construction.
pub struct ForwardMaterial {
    pub base_color: [f32; 4],
    pub texture: Option<Arc<TextureData>>,
    pub texture_mix: f32,
    pub texture_scale: f32,
    /// Unlit surfaces (the light marker) skip shading entirely.
    pub lit: bool,
}

#[derive(Clone)]
struct Buffers {
    vertex_buffer: Arc<CpuAccessibleBuffer<[Vertex]>>,
    normals_buffer: Arc<CpuAccessibleBuffer<[Normal]>>,
    uv_buffer: Arc<CpuAccessibleBuffer<[Uv]>>,
    index_buffer: Arc<CpuAccessibleBuffer<[u16]>>,
    uniform_buffer: CpuBufferPool<vs::ty::Data>,
}

/// Records one object's draw into the forward color pass. Both blend
/// variants are prepared up front; the frame plan picks per draw
/// whether the object goes through the opaque pipeline (depth writes
/// on) or the transparent one (depth writes off, alpha blended).
pub struct Object3DForwardPass {
    gfx_queue: Arc<Queue>,
    material: ForwardMaterial,
    pipeline_opaque: Arc<GraphicsPipeline>,
    pipeline_transparent: Arc<GraphicsPipeline>,
    subpass: Subpass,
    buffers: Buffers,
    diffuse_set_opaque: Arc<PersistentDescriptorSet>,
    diffuse_set_transparent: Arc<PersistentDescriptorSet>,
}

impl Object3DForwardPass {
    pub fn new(
        gfx_queue: Arc<Queue>,
        render_pass: Arc<RenderPass>,
        mesh: &Mesh,
        material: ForwardMaterial,
        max_anisotropy: Option<f32>,
    ) -> Result<Object3DForwardPass, GfxError> {
        let subpass = Subpass::from(render_pass, 0)
            .ok_or_else(|| GfxError::creation("forward subpass", "render pass has no subpass 0"))?;

        let buffers = Object3DForwardPass::create_buffers(&gfx_queue, mesh)?;

        let (vs, fs) = load_shaders(&gfx_queue)?;
        let pipeline_opaque =
            Object3DForwardPass::create_pipeline(&gfx_queue, subpass.clone(), &vs, &fs, true)?;
        let pipeline_transparent =
            Object3DForwardPass::create_pipeline(&gfx_queue, subpass.clone(), &vs, &fs, false)?;

        let diffuse_view = Object3DForwardPass::create_diffuse_view(&gfx_queue, &material)?;
        let diffuse_set_opaque = Object3DForwardPass::create_diffuse_set(
            &gfx_queue,
            &pipeline_opaque,
            diffuse_view.clone(),
            max_anisotropy,
        )?;
        let diffuse_set_transparent = Object3DForwardPass::create_diffuse_set(
            &gfx_queue,
            &pipeline_transparent,
            diffuse_view,
            max_anisotropy,
        )?;

        Ok(Object3DForwardPass {
            gfx_queue,
            material,
            pipeline_opaque,
            pipeline_transparent,
            subpass,
            buffers,
            diffuse_set_opaque,
            diffuse_set_transparent,
        })
    }

    pub fn draw(
        &self,
        viewport_dimensions: [u32; 2],
        model: Matrix4<f32>,
        frame: &ForwardFrame,
        shadow_image: Arc<dyn ImageViewAbstract + 'static>,
        opaque: bool,
    ) -> Result<SecondaryAutoCommandBuffer, DrawError> {
        let (pipeline, diffuse_set) = if opaque {
            (&self.pipeline_opaque, &self.diffuse_set_opaque)
        } else {
            (&self.pipeline_transparent, &self.diffuse_set_transparent)
        };

        // Inverse-transpose of the model matrix alone: lighting runs in
        // world space, with light and camera positions kept there too.
        // Folding `view` in here would require view-space positions in
        // the fragment shader as well.
        let normal_matrix = model.invert().unwrap_or_else(Matrix4::identity).transpose();
        let uniform_buffer_subbuffer = self
            .buffers
            .uniform_buffer
            .from_data(vs::ty::Data {
                model: model.into(),
                view: frame.view.into(),
                proj: frame.projection.into(),
                normal_matrix: normal_matrix.into(),
                light_vp: frame.light_vp.into(),
            })
            .map_err(|e| DrawError::command("forward uniform upload", e))?;

        let lit = self.material.lit && frame.lit;
        let push_constants = fs::ty::PushConstants {
            light_position: frame.light_position.extend(1.0).into(),
            light_color: [
                frame.light_color[0],
                frame.light_color[1],
                frame.light_color[2],
                frame.shininess,
            ],
            base_color: self.material.base_color,
            camera_position: frame.camera_position.extend(1.0).into(),
            params: [
                self.material.texture_mix,
                self.material.texture_scale,
                frame.ambient,
                if lit { 1.0 } else { 0.0 },
            ],
            shadow_params: [
                if frame.shadows_active { 1.0 } else { 0.0 },
                frame.shadow_texel[0],
                frame.shadow_texel[1],
                0.0,
            ],
        };

        let layout = pipeline
            .layout()
            .set_layouts()
            .get(0)
            .ok_or(DrawError::MissingSetLayout { index: 0 })?;
        let uniform_set = PersistentDescriptorSet::new(
            layout.clone(),
            [WriteDescriptorSet::buffer(0, uniform_buffer_subbuffer)],
        )
        .map_err(|e| DrawError::command("forward descriptor set", e))?;

        let shadow_set = self.create_shadow_set(pipeline, shadow_image)?;

        let mut builder = AutoCommandBufferBuilder::secondary(
            self.gfx_queue.device().clone(),
            self.gfx_queue.queue_family_index(),
            CommandBufferUsage::MultipleSubmit,
            CommandBufferInheritanceInfo {
                render_pass: Some(self.subpass.clone().into()),
                ..Default::default()
            },
        )
        .map_err(|e| DrawError::command("forward command buffer", e))?;
        builder
            .set_viewport(
                0,
                [Viewport {
                    origin: [0.0, 0.0],
                    dimensions: [viewport_dimensions[0] as f32, viewport_dimensions[1] as f32],
                    depth_range: 0.0..1.0,
                }],
            )
            .bind_pipeline_graphics(pipeline.clone())
            .bind_descriptor_sets(
                PipelineBindPoint::Graphics,
                pipeline.layout().clone(),
                0,
                uniform_set,
            )
            .bind_descriptor_sets(
                PipelineBindPoint::Graphics,
                pipeline.layout().clone(),
                1,
                diffuse_set.clone(),
            )
            .bind_descriptor_sets(
                PipelineBindPoint::Graphics,
                pipeline.layout().clone(),
                2,
                shadow_set,
            )
            .push_constants(pipeline.layout().clone(), 0, push_constants)
            .bind_vertex_buffers(
                0,
                (
                    self.buffers.vertex_buffer.clone(),
                    self.buffers.normals_buffer.clone(),
                    self.buffers.uv_buffer.clone(),
                ),
            )
            .bind_index_buffer(self.buffers.index_buffer.clone())
            .draw_indexed(self.buffers.index_buffer.len() as u32, 1, 0, 0, 0)
            .map_err(|e| DrawError::command("forward draw", e))?;
        builder
            .build()
            .map_err(|e| DrawError::command("forward command buffer build", e))
    }

    // private methods

    fn create_pipeline(
        gfx_queue: &Arc<Queue>,
        subpass: Subpass,
        vs: &Arc<ShaderModule>,
        fs: &Arc<ShaderModule>,
        opaque: bool,
    ) -> Result<Arc<GraphicsPipeline>, GfxError> {
        let vs_entry = vs
            .entry_point("main")
            .ok_or_else(|| GfxError::creation("forward vertex shader", "missing entry point"))?;
        let fs_entry = fs
            .entry_point("main")
            .ok_or_else(|| GfxError::creation("forward fragment shader", "missing entry point"))?;

        let start = GraphicsPipeline::start()
            .vertex_input_state(
                BuffersDefinition::new()
                    .vertex::<Vertex>()
                    .vertex::<Normal>()
                    .vertex::<Uv>(),
            )
            .vertex_shader(vs_entry, ())
            .input_assembly_state(InputAssemblyState::new())
            .viewport_state(ViewportState::viewport_dynamic_scissor_irrelevant())
            .fragment_shader(fs_entry, ());

        let built = if opaque {
            start
                .depth_stencil_state(DepthStencilState::simple_depth_test())
                .render_pass(subpass)
                .build(gfx_queue.device().clone())
        } else {
            // Transparent surfaces still test against opaque depth but
            // never write it, so stacked glass does not punch holes in
            // whatever renders behind it.
            start
                .depth_stencil_state(DepthStencilState {
                    depth: Some(DepthState {
                        enable_dynamic: false,
                        write_enable: StateMode::Fixed(false),
                        compare_op: StateMode::Fixed(CompareOp::Less),
                    }),
                    ..DepthStencilState::default()
                })
                .color_blend_state(ColorBlendState::new(1).blend(AttachmentBlend::alpha()))
                .render_pass(subpass)
                .build(gfx_queue.device().clone())
        };
        built.map_err(|e| GfxError::creation("forward pipeline", e))
    }

    fn create_diffuse_view(
        gfx_queue: &Arc<Queue>,
        material: &ForwardMaterial,
    ) -> Result<Arc<dyn ImageViewAbstract + 'static>, GfxError> {
        // Untextured objects sample a single white texel so that one
        // shader serves both cases; the base color carries the surface
        // color through `texture_mix = 0`.
        let (data, dimensions) = match &material.texture {
            Some(texture) => (
                texture.rgba.clone(),
                ImageDimensions::Dim2d {
                    width: texture.width,
                    height: texture.height,
                    array_layers: 1,
                },
            ),
            None => (
                vec![255u8; 4],
                ImageDimensions::Dim2d {
                    width: 1,
                    height: 1,
                    array_layers: 1,
                },
            ),
        };

        let (image, _future) = ImmutableImage::from_iter(
            data,
            dimensions,
            MipmapsCount::Log2,
            Format::R8G8B8A8_SRGB,
            gfx_queue.clone(),
        )
        .map_err(|e| GfxError::creation("diffuse texture", e))?;
        let view = ImageView::new_default(image)
            .map_err(|e| GfxError::creation("diffuse texture view", e))?;
        Ok(view)
    }

    fn create_diffuse_set(
        gfx_queue: &Arc<Queue>,
        pipeline: &Arc<GraphicsPipeline>,
        view: Arc<dyn ImageViewAbstract + 'static>,
        max_anisotropy: Option<f32>,
    ) -> Result<Arc<PersistentDescriptorSet>, GfxError> {
        let sampler = Sampler::new(
            gfx_queue.device().clone(),
            SamplerCreateInfo {
                mag_filter: Filter::Linear,
                min_filter: Filter::Linear,
                mipmap_mode: SamplerMipmapMode::Linear,
                address_mode: [SamplerAddressMode::MirroredRepeat; 3],
                anisotropy: max_anisotropy,
                lod: 0.0..=vulkano::sampler::LOD_CLAMP_NONE,
                ..Default::default()
            },
        )
        .map_err(|e| GfxError::creation("diffuse sampler", e))?;

        let layout = pipeline
            .layout()
            .set_layouts()
            .get(1)
            .ok_or_else(|| GfxError::creation("diffuse descriptor set", "missing set layout 1"))?;
        PersistentDescriptorSet::new(
            layout.clone(),
            [WriteDescriptorSet::image_view_sampler(0, view, sampler)],
        )
        .map_err(|e| GfxError::creation("diffuse descriptor set", e))
    }

    fn create_shadow_set(
        &self,
        pipeline: &Arc<GraphicsPipeline>,
        shadow_image: Arc<dyn ImageViewAbstract + 'static>,
    ) -> Result<Arc<PersistentDescriptorSet>, DrawError> {
        // Fragments outside the light frustum clamp to the white border
        // and read as fully lit.
        let sampler = Sampler::new(
            self.gfx_queue.device().clone(),
            SamplerCreateInfo {
                mag_filter: Filter::Linear,
                min_filter: Filter::Linear,
                border_color: BorderColor::FloatOpaqueWhite,
                address_mode: [SamplerAddressMode::ClampToBorder; 3],
                ..Default::default()
            },
        )
        .map_err(|e| DrawError::command("shadow sampler", e))?;

        let layout = pipeline
            .layout()
            .set_layouts()
            .get(2)
            .ok_or(DrawError::MissingSetLayout { index: 2 })?;
        PersistentDescriptorSet::new(
            layout.clone(),
            [WriteDescriptorSet::image_view_sampler(
                0,
                shadow_image,
                sampler,
            )],
        )
        .map_err(|e| DrawError::command("shadow descriptor set", e))
    }

    fn create_buffers(gfx_queue: &Arc<Queue>, mesh: &Mesh) -> Result<Buffers, GfxError> {
        let vertex_usage = BufferUsage {
            vertex_buffer: true,
            ..BufferUsage::empty()
        };

        let vertex_buffer = CpuAccessibleBuffer::from_iter(
            gfx_queue.device().clone(),
            vertex_usage,
            false,
            mesh.vertices.iter().copied(),
        )
        .map_err(|e| GfxError::creation("forward vertex buffer", e))?;

        let normals_buffer = CpuAccessibleBuffer::from_iter(
            gfx_queue.device().clone(),
            vertex_usage,
            false,
            mesh.normals.iter().copied(),
        )
        .map_err(|e| GfxError::creation("forward normal buffer", e))?;

        let uv_buffer = CpuAccessibleBuffer::from_iter(
            gfx_queue.device().clone(),
            vertex_usage,
            false,
            mesh.uvs.iter().copied(),
        )
        .map_err(|e| GfxError::creation("forward uv buffer", e))?;

        let index_buffer = CpuAccessibleBuffer::from_iter(
            gfx_queue.device().clone(),
            BufferUsage {
                index_buffer: true,
                ..BufferUsage::empty()
            },
            false,
            mesh.indices.iter().copied(),
        )
        .map_err(|e| GfxError::creation("forward index buffer", e))?;

        let uniform_buffer = CpuBufferPool::<vs::ty::Data>::new(
            gfx_queue.device().clone(),
            BufferUsage {
                uniform_buffer: true,
                ..BufferUsage::empty()
            },
        );

        Ok(Buffers {
            vertex_buffer,
            normals_buffer,
            uv_buffer,
            index_buffer,
            uniform_buffer,
        })
    }
}

fn load_shaders(gfx_queue: &Arc<Queue>) -> Result<(Arc<ShaderModule>, Arc<ShaderModule>), GfxError> {
    let vs = vs::load(gfx_queue.device().clone())
        .map_err(|e| GfxError::creation("forward vertex shader", e))?;
    let fs = fs::load(gfx_queue.device().clone())
        .map_err(|e| GfxError::creation("forward fragment shader", e))?;
    Ok((vs, fs))
}

mod vs {
    vulkano_shaders::shader! {
        ty: "vertex",
        src: "
#version 450

layout(location = 0) in vec3 position;
layout(location = 1) in vec3 normal;
layout(location = 2) in vec2 uv;

layout(location = 0) out vec3 v_world_position;
layout(location = 1) out vec3 v_normal;
layout(location = 2) out vec2 v_uv;
layout(location = 3) out vec4 v_light_space;

layout(set = 0, binding = 0) uniform Data {
    mat4 model;
    mat4 view;
    mat4 proj;
    mat4 normal_matrix;
    mat4 light_vp;
} uniforms;

void main() {
    vec4 world_position = uniforms.model * vec4(position, 1.0);
    gl_Position = uniforms.proj * uniforms.view * world_position;
    v_world_position = world_position.xyz;
    v_normal = mat3(uniforms.normal_matrix) * normal;
    v_uv = uv;
    v_light_space = uniforms.light_vp * world_position;
}",
types_meta: {
    use bytemuck::{Pod, Zeroable};

    #[derive(Clone, Copy, Zeroable, Pod)]
}
    }
}

mod fs {
    vulkano_shaders::shader! {
        ty: "fragment",
        src: "
#version 450

layout(location = 0) in vec3 v_world_position;
layout(location = 1) in vec3 v_normal;
layout(location = 2) in vec2 v_uv;
layout(location = 3) in vec4 v_light_space;

layout(location = 0) out vec4 f_color;

layout(set = 1, binding = 0) uniform sampler2D diffuse_map;
layout(set = 2, binding = 0) uniform sampler2D shadow_map;

layout(push_constant) uniform PushConstants {
    vec4 light_position;
    // rgb color, shininess in w
    vec4 light_color;
    vec4 base_color;
    vec4 camera_position;
    // texture_mix, texture_scale, ambient, lit
    vec4 params;
    // shadows_active, texel x, texel y
    vec4 shadow_params;
} push_constants;

float shadow_factor() {
    if (push_constants.shadow_params.x < 0.5) {
        return 0.0;
    }
    vec3 coords = v_light_space.xyz / v_light_space.w;
    vec2 shadow_uv = coords.xy * 0.5 + 0.5;
    if (coords.z > 1.0) {
        return 0.0;
    }

    float bias = 0.002;
    float shadow = 0.0;
    vec2 texel_size = push_constants.shadow_params.yz;
    for (int x = -1; x <= 1; ++x) {
        for (int y = -1; y <= 1; ++y) {
            float pcf_depth = texture(shadow_map, shadow_uv + vec2(x, y) * texel_size).r;
            shadow += coords.z - bias > pcf_depth ? 1.0 : 0.0;
        }
    }
    return shadow / 9.0;
}

void main() {
    vec4 texel = texture(diffuse_map, v_uv * push_constants.params.y);
    vec3 surface = mix(push_constants.base_color.rgb, texel.rgb, push_constants.params.x);

    if (push_constants.params.w < 0.5) {
        f_color = vec4(surface, push_constants.base_color.a);
        return;
    }

    vec3 normal = normalize(v_normal);
    vec3 to_light = normalize(push_constants.light_position.xyz - v_world_position);
    float diffuse = max(dot(normal, to_light), 0.0);

    vec3 to_camera = normalize(push_constants.camera_position.xyz - v_world_position);
    vec3 reflected = reflect(-to_light, normal);
    float specular = pow(max(dot(to_camera, reflected), 0.0), push_constants.light_color.w);

    float shadow = shadow_factor();
    vec3 light_color = push_constants.light_color.rgb;
    float ambient = push_constants.params.z;
    vec3 color = surface * light_color * (ambient + (1.0 - shadow) * diffuse)
        + light_color * (1.0 - shadow) * specular;

    f_color = vec4(color, push_constants.base_color.a);
}",
        types_meta: {
            use bytemuck::{Pod, Zeroable};

            #[derive(Clone, Copy, Zeroable, Pod)]
        },
    }
}
