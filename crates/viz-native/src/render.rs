//! wgpu renderer for the session's scene graph.
//!
//! Two pipelines: an indexed mesh pipeline running the displacement
//! shader, and an instanced quad pipeline for the particle clouds. GPU
//! buffers are rebuilt whenever the tracker's generation token changes
//! and re-written in place when the frame path marks attributes dirty.
//! The post-processing chain is composed in core as configuration; this
//! frontend renders the base pass and logs the chain it was handed.

use std::time::Instant;

use glam::Mat4;
use wgpu::util::DeviceExt;

use viz_core::scene::{Background, NodeHandle};
use viz_core::{SceneSession, BACKGROUND_COLOR};

const MESH_WGSL: &str = r#"
struct Uniforms {
    view_proj: mat4x4<f32>,
    // rgb = material color, w = displacement amplitude
    color: vec4<f32>,
    // x = textured flag, y = opacity
    params: vec4<f32>,
};

@group(0) @binding(0) var<uniform> u: Uniforms;
@group(1) @binding(0) var color_map: texture_2d<f32>;
@group(1) @binding(1) var color_sampler: sampler;

struct VsOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
    @location(3) displacement: f32,
) -> VsOut {
    var out: VsOut;
    let displaced = position + normal * (u.color.w * displacement);
    out.clip = u.view_proj * vec4<f32>(displaced, 1.0);
    out.uv = uv;
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    let sampled = textureSample(color_map, color_sampler, in.uv);
    let rgb = mix(u.color.rgb, sampled.rgb, step(0.5, u.params.x));
    return vec4<f32>(rgb, u.params.y);
}
"#;

const POINTS_WGSL: &str = r#"
struct Uniforms {
    view: mat4x4<f32>,
    proj: mat4x4<f32>,
    model: mat4x4<f32>,
    // x = opacity
    misc: vec4<f32>,
};

@group(0) @binding(0) var<uniform> u: Uniforms;

struct VsOut {
    @builtin(position) clip: vec4<f32>,
    @location(0) color: vec3<f32>,
};

@vertex
fn vs_main(
    @location(0) corner: vec2<f32>,
    @location(1) center: vec3<f32>,
    @location(2) color: vec3<f32>,
    @location(3) scale: f32,
) -> VsOut {
    var out: VsOut;
    // Billboard: expand the quad in view space so points always face
    // the camera.
    var view_pos = u.view * u.model * vec4<f32>(center, 1.0);
    view_pos = vec4<f32>(view_pos.xy + corner * scale, view_pos.zw);
    out.clip = u.proj * view_pos;
    out.color = color;
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4<f32> {
    return vec4<f32>(in.color, u.misc.x);
}
"#;

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct MeshUniforms {
    view_proj: [[f32; 4]; 4],
    color: [f32; 4],
    params: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct PointsUniforms {
    view: [[f32; 4]; 4],
    proj: [[f32; 4]; 4],
    model: [[f32; 4]; 4],
    misc: [f32; 4],
}

/// Per-generation GPU buffers for the deformed mesh.
struct MeshGpu {
    positions: wgpu::Buffer,
    normals: wgpu::Buffer,
    uvs: wgpu::Buffer,
    displacement: wgpu::Buffer,
    index: wgpu::Buffer,
    index_count: u32,
    vertex_count: u32,
    uniform: wgpu::Buffer,
    uniform_bind: wgpu::BindGroup,
    texture_bind: wgpu::BindGroup,
    textured: bool,
}

/// Per-generation GPU buffers for one particle cloud.
struct CloudGpu {
    centers: wgpu::Buffer,
    colors: wgpu::Buffer,
    scales: wgpu::Buffer,
    count: u32,
    opacity: f32,
    uniform: wgpu::Buffer,
    uniform_bind: wgpu::BindGroup,
}

pub struct GpuState<'w> {
    pub window: &'w winit::window::Window,
    surface: wgpu::Surface<'w>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    width: u32,
    height: u32,

    mesh_pipeline: wgpu::RenderPipeline,
    points_pipeline: wgpu::RenderPipeline,
    mesh_uniform_layout: wgpu::BindGroupLayout,
    mesh_texture_layout: wgpu::BindGroupLayout,
    points_uniform_layout: wgpu::BindGroupLayout,
    quad_vb: wgpu::Buffer,
    sampler: wgpu::Sampler,
    white_texture: wgpu::TextureView,

    mesh_gpu: Option<MeshGpu>,
    points_gpu: Option<CloudGpu>,
    points_other_gpu: Option<CloudGpu>,
    generation: u64,
    last_frame: Instant,
}

impl<'w> GpuState<'w> {
    pub async fn new(window: &'w winit::window::Window) -> anyhow::Result<Self> {
        let size = window.inner_size();
        let instance = wgpu::Instance::default();
        let surface = instance.create_surface(window)?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow::anyhow!("No GPU adapter"))?;
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::Performance,
                    label: None,
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let format = surface_caps.formats[0];
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps.alpha_modes[0],
            desired_maximum_frame_latency: 2,
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let mesh_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("mesh_shader"),
            source: wgpu::ShaderSource::Wgsl(MESH_WGSL.into()),
        });
        let points_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("points_shader"),
            source: wgpu::ShaderSource::Wgsl(POINTS_WGSL.into()),
        });

        let mesh_uniform_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("mesh_uniforms_bgl"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });
        let mesh_texture_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("mesh_texture_bgl"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });
        let points_uniform_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("points_uniforms_bgl"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let mesh_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("mesh_pl"),
            bind_group_layouts: &[&mesh_uniform_layout, &mesh_texture_layout],
            push_constant_ranges: &[],
        });
        let mesh_buffers = [
            slot_layout(3, wgpu::VertexStepMode::Vertex, &POSITION_ATTR),
            slot_layout(3, wgpu::VertexStepMode::Vertex, &NORMAL_ATTR),
            slot_layout(2, wgpu::VertexStepMode::Vertex, &UV_ATTR),
            slot_layout(1, wgpu::VertexStepMode::Vertex, &SCALAR_ATTR),
        ];
        let mesh_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("mesh_pipeline"),
            layout: Some(&mesh_layout),
            vertex: wgpu::VertexState {
                module: &mesh_shader,
                entry_point: Some("vs_main"),
                buffers: &mesh_buffers,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &mesh_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            cache: None,
            multiview: None,
        });

        let points_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("points_pl"),
            bind_group_layouts: &[&points_uniform_layout],
            push_constant_ranges: &[],
        });
        let points_buffers = [
            // slot 0: quad corners, the rest step per instance
            slot_layout(2, wgpu::VertexStepMode::Vertex, &CORNER_ATTR),
            slot_layout(3, wgpu::VertexStepMode::Instance, &CENTER_ATTR),
            slot_layout(3, wgpu::VertexStepMode::Instance, &COLOR_ATTR),
            slot_layout(1, wgpu::VertexStepMode::Instance, &SCALAR_ATTR),
        ];
        let points_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("points_pipeline"),
            layout: Some(&points_layout),
            vertex: wgpu::VertexState {
                module: &points_shader,
                entry_point: Some("vs_main"),
                buffers: &points_buffers,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &points_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            cache: None,
            multiview: None,
        });

        // Quad vertices for two triangles
        let quad_vertices: [f32; 12] = [
            -0.5, -0.5, 0.5, -0.5, 0.5, 0.5, -0.5, -0.5, 0.5, 0.5, -0.5, 0.5,
        ];
        let quad_vb = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("quad_vb"),
            contents: bytemuck::cast_slice(&quad_vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("color_sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let white_texture = upload_texture(&device, &queue, 1, 1, &[255, 255, 255, 255]);

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            width: size.width.max(1),
            height: size.height.max(1),
            mesh_pipeline,
            points_pipeline,
            mesh_uniform_layout,
            mesh_texture_layout,
            points_uniform_layout,
            quad_vb,
            sampler,
            white_texture,
            mesh_gpu: None,
            points_gpu: None,
            points_other_gpu: None,
            generation: u64::MAX,
            last_frame: Instant::now(),
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.width = new_size.width;
        self.height = new_size.height;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
    }

    pub fn render(&mut self, session: &mut SceneSession) -> Result<(), wgpu::SurfaceError> {
        let now = Instant::now();
        let dt = now - self.last_frame;
        self.last_frame = now;
        log::trace!("frame dt {:?}", dt);

        session.camera.aspect = self.width as f32 / self.height as f32;
        self.sync(session);

        let frame = self.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let view_mat = session.camera.view_matrix();
        let proj_mat = session.camera.projection_matrix();
        self.write_uniforms(session, view_mat, proj_mat);

        let clear = match &session.scene.background {
            Background::Color(c) => *c,
            // The probe texture backdrop collapses to the flat base
            // color in the single-pass renderer.
            Background::Texture(_) => BACKGROUND_COLOR,
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("encoder"),
            });
        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("rpass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: clear[0] as f64,
                            g: clear[1] as f64,
                            b: clear[2] as f64,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let Some(mesh) = &self.mesh_gpu {
                rpass.set_pipeline(&self.mesh_pipeline);
                rpass.set_bind_group(0, &mesh.uniform_bind, &[]);
                rpass.set_bind_group(1, &mesh.texture_bind, &[]);
                rpass.set_vertex_buffer(0, mesh.positions.slice(..));
                rpass.set_vertex_buffer(1, mesh.normals.slice(..));
                rpass.set_vertex_buffer(2, mesh.uvs.slice(..));
                rpass.set_vertex_buffer(3, mesh.displacement.slice(..));
                if mesh.index_count > 0 {
                    rpass.set_index_buffer(mesh.index.slice(..), wgpu::IndexFormat::Uint32);
                    rpass.draw_indexed(0..mesh.index_count, 0, 0..1);
                } else {
                    rpass.draw(0..mesh.vertex_count, 0..1);
                }
            }

            rpass.set_pipeline(&self.points_pipeline);
            for cloud in [&self.points_gpu, &self.points_other_gpu].into_iter().flatten() {
                rpass.set_bind_group(0, &cloud.uniform_bind, &[]);
                rpass.set_vertex_buffer(0, self.quad_vb.slice(..));
                rpass.set_vertex_buffer(1, cloud.centers.slice(..));
                rpass.set_vertex_buffer(2, cloud.colors.slice(..));
                rpass.set_vertex_buffer(3, cloud.scales.slice(..));
                rpass.draw(0..6, 0..cloud.count);
            }
        }
        self.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }

    /// Rebuild all per-generation buffers when the tracker sweeps, and
    /// re-write buffers the animation path marked dirty since last frame.
    fn sync(&mut self, session: &SceneSession) {
        let generation = session.tracker.generation().get();
        if generation != self.generation {
            self.generation = generation;
            log::info!(
                "generation {generation}: rand1={} rand2={} fov={:.0} post={:?}",
                session.rand1,
                session.rand2,
                session.camera.fov_degrees,
                session.post.passes
            );
            self.mesh_gpu = session.mesh.as_ref().and_then(|m| self.build_mesh(m));
            self.points_gpu = session.points.as_ref().and_then(|p| self.build_cloud(p));
            self.points_other_gpu = session
                .points_other
                .as_ref()
                .and_then(|p| self.build_cloud(p));
            return;
        }

        if let (Some(node), Some(gpu)) = (&session.mesh, &self.mesh_gpu) {
            if let Some(geometry) = node.borrow().geometry.clone() {
                let mut g = geometry.borrow_mut();
                if !g.is_disposed() {
                    if g.dirty.positions {
                        self.queue
                            .write_buffer(&gpu.positions, 0, bytemuck::cast_slice(&g.positions));
                    }
                    if g.dirty.displacement {
                        let scalars = fitted(&g.displacement, gpu.vertex_count as usize);
                        self.queue
                            .write_buffer(&gpu.displacement, 0, bytemuck::cast_slice(&scalars));
                    }
                    g.dirty = Default::default();
                }
            }
        }
        let queue = &self.queue;
        for (node, gpu) in [
            (&session.points, &self.points_gpu),
            (&session.points_other, &self.points_other_gpu),
        ] {
            if let (Some(node), Some(gpu)) = (node, gpu) {
                sync_cloud(queue, node, gpu);
            }
        }
    }

    fn write_uniforms(&self, session: &SceneSession, view: Mat4, proj: Mat4) {
        if let (Some(node), Some(gpu)) = (&session.mesh, &self.mesh_gpu) {
            let n = node.borrow();
            let mut color = [1.0f32, 1.0, 0.0];
            let mut amplitude = 1.0f32;
            let mut opacity = 1.0f32;
            if let Some(material) = &n.material {
                let m = material.borrow();
                color = m.uniforms.color;
                amplitude = m.uniforms.amplitude;
                opacity = if m.transparent { m.opacity } else { 1.0 };
            }
            let uniforms = MeshUniforms {
                view_proj: (proj * view).to_cols_array_2d(),
                color: [color[0], color[1], color[2], amplitude],
                params: [if gpu.textured { 1.0 } else { 0.0 }, opacity, 0.0, 0.0],
            };
            self.queue
                .write_buffer(&gpu.uniform, 0, bytemuck::bytes_of(&uniforms));
        }
        for (node, gpu) in [
            (&session.points, &self.points_gpu),
            (&session.points_other, &self.points_other_gpu),
        ] {
            if let (Some(node), Some(gpu)) = (node, gpu) {
                let n = node.borrow();
                let model = Mat4::from_rotation_x(n.rotation.x)
                    * Mat4::from_rotation_z(n.rotation.z)
                    * Mat4::from_translation(n.position);
                let uniforms = PointsUniforms {
                    view: view.to_cols_array_2d(),
                    proj: proj.to_cols_array_2d(),
                    model: model.to_cols_array_2d(),
                    misc: [gpu.opacity, 0.0, 0.0, 0.0],
                };
                self.queue
                    .write_buffer(&gpu.uniform, 0, bytemuck::bytes_of(&uniforms));
            }
        }
    }

    fn build_mesh(&self, node: &NodeHandle) -> Option<MeshGpu> {
        let n = node.borrow();
        let geometry = n.geometry.clone()?;
        let g = geometry.borrow();
        if g.is_disposed() || g.positions.is_empty() {
            return None;
        }
        let vertex_count = g.vertex_count();

        let mut textured = false;
        let mut texture_view = None;
        if let Some(material) = &n.material {
            let m = material.borrow();
            if let Some(map) = &m.uniforms.color_texture {
                let t = map.borrow();
                if !t.is_disposed() && !t.pixels.is_empty() {
                    texture_view =
                        Some(upload_texture(&self.device, &self.queue, t.width, t.height, &t.pixels));
                    textured = true;
                }
            }
        }

        let positions = init_buffer(&self.device, "mesh_positions", &g.positions);
        let normals = init_buffer(&self.device, "mesh_normals", &fitted3(&g.normals, vertex_count));
        let uvs = init_buffer(&self.device, "mesh_uvs", &fitted2(&g.uvs, vertex_count));
        let displacement = init_buffer(
            &self.device,
            "mesh_displacement",
            &fitted(&g.displacement, vertex_count),
        );
        let index = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("mesh_indices"),
                contents: bytemuck::cast_slice(&g.indices),
                usage: wgpu::BufferUsages::INDEX,
            });

        let uniform = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("mesh_uniforms"),
            size: std::mem::size_of::<MeshUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("mesh_uniforms_bg"),
            layout: &self.mesh_uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform.as_entire_binding(),
            }],
        });
        let texture_bind = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("mesh_texture_bg"),
            layout: &self.mesh_texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(
                        texture_view.as_ref().unwrap_or(&self.white_texture),
                    ),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        Some(MeshGpu {
            positions,
            normals,
            uvs,
            displacement,
            index,
            index_count: g.indices.len() as u32,
            vertex_count: vertex_count as u32,
            uniform,
            uniform_bind,
            texture_bind,
            textured,
        })
    }

    fn build_cloud(&self, node: &NodeHandle) -> Option<CloudGpu> {
        let n = node.borrow();
        let geometry = n.geometry.clone()?;
        let g = geometry.borrow();
        if g.is_disposed() || g.positions.is_empty() {
            return None;
        }
        let count = g.vertex_count();

        let mut opacity = 1.0f32;
        let mut base_color = [1.0f32, 1.0, 1.0];
        let mut base_scale = 1.0f32;
        if let Some(material) = &n.material {
            let m = material.borrow();
            if m.transparent {
                opacity = m.opacity;
            }
            base_color = m.uniforms.color;
            base_scale = m.point_size;
        }

        let colors = if g.colors.len() >= count * 3 {
            g.colors[..count * 3].to_vec()
        } else {
            base_color.iter().copied().cycle().take(count * 3).collect()
        };
        let scales = if g.scales.len() >= count {
            g.scales[..count].to_vec()
        } else {
            vec![base_scale; count]
        };

        let centers = init_buffer(&self.device, "cloud_centers", &g.positions);
        let colors = init_buffer(&self.device, "cloud_colors", &colors);
        let scales = init_buffer(&self.device, "cloud_scales", &scales);
        let uniform = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("cloud_uniforms"),
            size: std::mem::size_of::<PointsUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("cloud_uniforms_bg"),
            layout: &self.points_uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform.as_entire_binding(),
            }],
        });

        Some(CloudGpu {
            centers,
            colors,
            scales,
            count: count as u32,
            opacity,
            uniform,
            uniform_bind,
        })
    }
}

fn sync_cloud(queue: &wgpu::Queue, node: &NodeHandle, gpu: &CloudGpu) {
    let Some(geometry) = node.borrow().geometry.clone() else {
        return;
    };
    let mut g = geometry.borrow_mut();
    if g.is_disposed() || g.positions.is_empty() {
        return;
    }
    let count = gpu.count as usize;
    if g.dirty.positions && g.positions.len() >= count * 3 {
        queue.write_buffer(&gpu.centers, 0, bytemuck::cast_slice(&g.positions[..count * 3]));
    }
    if g.dirty.colors && g.colors.len() >= count * 3 {
        queue.write_buffer(&gpu.colors, 0, bytemuck::cast_slice(&g.colors[..count * 3]));
    }
    if g.dirty.scales && g.scales.len() >= count {
        queue.write_buffer(&gpu.scales, 0, bytemuck::cast_slice(&g.scales[..count]));
    }
    g.dirty = Default::default();
}

// One attribute per buffer slot; the core keeps attributes in separate
// arrays, so interleaving would only add a repack step.
const CORNER_ATTR: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];
const POSITION_ATTR: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];
const NORMAL_ATTR: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x3];
const CENTER_ATTR: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x3];
const UV_ATTR: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![2 => Float32x2];
const COLOR_ATTR: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![2 => Float32x3];
const SCALAR_ATTR: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![3 => Float32];

fn slot_layout(
    floats: u64,
    step_mode: wgpu::VertexStepMode,
    attributes: &'static [wgpu::VertexAttribute],
) -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<f32>() as u64 * floats,
        step_mode,
        attributes,
    }
}

fn init_buffer(device: &wgpu::Device, label: &str, contents: &[f32]) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::cast_slice(contents),
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
    })
}

/// Truncate or zero-pad a scalar attribute to the realized vertex count.
fn fitted(values: &[f32], count: usize) -> Vec<f32> {
    let mut out = values.to_vec();
    out.resize(count, 0.0);
    out
}

fn fitted2(values: &[f32], count: usize) -> Vec<f32> {
    let mut out = values.to_vec();
    out.resize(count * 2, 0.0);
    out
}

fn fitted3(values: &[f32], count: usize) -> Vec<f32> {
    let mut out = values.to_vec();
    out.resize(count * 3, 0.0);
    out
}

fn upload_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    width: u32,
    height: u32,
    pixels: &[u8],
) -> wgpu::TextureView {
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("color_map"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        pixels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        size,
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}
