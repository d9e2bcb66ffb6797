//! Variante GPU : machine à états ping-pong et accumulation additive.
//!
//! Deux textures rgba32float de même taille portent chacune un ensemble de
//! trajectoires (une par texel, position dans les canaux rg). À chaque pas,
//! une passe de calcul lit la texture source et écrit la texture destination,
//! puis les rôles s'échangent. Une passe de rendu en mode PointList projette
//! ensuite chaque texel comme un point translucide en mélange additif : la
//! densité émerge de l'accumulation dans la cible, sans histogramme CPU.
//!
//! La cible est une texture hors écran relue par tampon intermédiaire, ce qui
//! permet les captures PNG et les tests sans surface de fenêtre.

use std::num::NonZeroU64;

use bytemuck::{Pod, Zeroable};
use tracing::{info, warn};
use wgpu::util::DeviceExt;

use crate::attractor::{AttractorKind, AttractorParams};
use crate::color::hsv_to_rgb;

const WORKGROUP_SIZE: u32 = 16;

/// Côté de la grille d'états : STATE_DIM² trajectoires simultanées.
pub const STATE_DIM: u32 = 1024;

/// Opacité de chaque point accumulé.
const POINT_ALPHA: f32 = 0.05;

/// Pas d'itération par image selon la largeur de la fenêtre.
///
/// Les petites fenêtres couvrent moins de texels par point : on compense en
/// itérant davantage pour converger aussi vite visuellement. Les grandes
/// fenêtres paient chaque passe plus cher et reçoivent moins de pas.
pub fn max_iterations_for(width: u32) -> u32 {
    if width >= 1920 {
        250
    } else if width >= 1280 {
        500
    } else {
        1000
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct StepParams {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    kind: u32,
    frame: u32,
    jitter: f32,
    _pad: u32,
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct DrawParams {
    scale: f32,
    left: f32,
    top: f32,
    alpha: f32,
    width: f32,
    height: f32,
    r: f32,
    g: f32,
    b: f32,
    _pad: [f32; 3],
}

/// Simulateur d'attracteur sur GPU.
pub struct GpuAttractor {
    device: wgpu::Device,
    queue: wgpu::Queue,
    step_pipeline: wgpu::ComputePipeline,
    draw_pipeline: wgpu::RenderPipeline,
    step_layout: wgpu::BindGroupLayout,
    draw_layout: wgpu::BindGroupLayout,
    states: [wgpu::Texture; 2],
    state_views: [wgpu::TextureView; 2],
    target: wgpu::Texture,
    target_view: wgpu::TextureView,
    width: u32,
    height: u32,
    /// Indice de la texture d'état source du prochain pas.
    flip: bool,
    frame: u32,
    params: AttractorParams,
}

impl GpuAttractor {
    /// Initialise l'adaptateur, les pipelines et les textures d'état.
    ///
    /// Retourne `None` si aucun adaptateur compatible n'est disponible ;
    /// l'hôte retombe alors sur un backend CPU.
    pub fn new(params: AttractorParams, width: u32, height: u32) -> Option<Self> {
        pollster::block_on(async {
            let instance = wgpu::Instance::default();
            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: None,
                    force_fallback_adapter: false,
                })
                .await?;

            let (device, queue) = adapter
                .request_device(
                    &wgpu::DeviceDescriptor {
                        label: Some("attractor-device"),
                        required_features: wgpu::Features::empty(),
                        required_limits: wgpu::Limits::default(),
                    },
                    None,
                )
                .await
                .map_err(|err| warn!(%err, "requête de device refusée"))
                .ok()?;

            let step_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("attractor-step-layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: NonZeroU64::new(
                                std::mem::size_of::<StepParams>() as u64
                            ),
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: false },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::StorageTexture {
                            access: wgpu::StorageTextureAccess::WriteOnly,
                            format: wgpu::TextureFormat::Rgba32Float,
                            view_dimension: wgpu::TextureViewDimension::D2,
                        },
                        count: None,
                    },
                ],
            });

            let step_pipeline_layout =
                device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some("attractor-step-pipeline-layout"),
                    bind_group_layouts: &[&step_layout],
                    push_constant_ranges: &[],
                });

            let step_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("attractor-step"),
                source: wgpu::ShaderSource::Wgsl(include_str!("step.wgsl").into()),
            });

            let step_pipeline =
                device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some("attractor-step-pipeline"),
                    layout: Some(&step_pipeline_layout),
                    module: &step_shader,
                    entry_point: "main",
                });

            let draw_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("attractor-draw-layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: NonZeroU64::new(
                                std::mem::size_of::<DrawParams>() as u64
                            ),
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::VERTEX,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: false },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                ],
            });

            let draw_pipeline_layout =
                device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some("attractor-draw-pipeline-layout"),
                    bind_group_layouts: &[&draw_layout],
                    push_constant_ranges: &[],
                });

            let draw_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("attractor-points"),
                source: wgpu::ShaderSource::Wgsl(include_str!("points.wgsl").into()),
            });

            let draw_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("attractor-draw-pipeline"),
                layout: Some(&draw_pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &draw_shader,
                    entry_point: "vs_main",
                    buffers: &[],
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::PointList,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &draw_shader,
                    entry_point: "fs_main",
                    targets: &[Some(wgpu::ColorTargetState {
                        format: wgpu::TextureFormat::Rgba8Unorm,
                        // Accumulation additive : la densité émerge des
                        // recouvrements de points translucides.
                        blend: Some(wgpu::BlendState {
                            color: wgpu::BlendComponent {
                                src_factor: wgpu::BlendFactor::SrcAlpha,
                                dst_factor: wgpu::BlendFactor::One,
                                operation: wgpu::BlendOperation::Add,
                            },
                            alpha: wgpu::BlendComponent {
                                src_factor: wgpu::BlendFactor::One,
                                dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                                operation: wgpu::BlendOperation::Add,
                            },
                        }),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                multiview: None,
            });

            let states = [
                Self::create_state_texture(&device, "attractor-state-a"),
                Self::create_state_texture(&device, "attractor-state-b"),
            ];
            let state_views = [
                states[0].create_view(&wgpu::TextureViewDescriptor::default()),
                states[1].create_view(&wgpu::TextureViewDescriptor::default()),
            ];
            let (target, target_view) = Self::create_target(&device, width, height);

            let mut gpu = Self {
                device,
                queue,
                step_pipeline,
                draw_pipeline,
                step_layout,
                draw_layout,
                states,
                state_views,
                target,
                target_view,
                width,
                height,
                flip: false,
                frame: 0,
                params,
            };
            gpu.reset();
            info!(width, height, dim = STATE_DIM, "simulateur GPU initialisé");
            Some(gpu)
        })
    }

    fn create_state_texture(device: &wgpu::Device, label: &str) -> wgpu::Texture {
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: STATE_DIM,
                height: STATE_DIM,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba32Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        })
    }

    fn create_target(
        device: &wgpu::Device,
        width: u32,
        height: u32,
    ) -> (wgpu::Texture, wgpu::TextureView) {
        let target = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("attractor-target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = target.create_view(&wgpu::TextureViewDescriptor::default());
        (target, view)
    }

    pub fn params(&self) -> &AttractorParams {
        &self.params
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Change les paramètres. Un changement de famille réensemence les
    /// trajectoires, un simple réglage de coefficients les laisse courir.
    pub fn set_params(&mut self, params: AttractorParams) {
        let reseed = params.kind != self.params.kind;
        self.params = params;
        if reseed {
            self.reset();
        }
    }

    /// Redimensionne la cible et repart d'un état frais.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == self.width && height == self.height {
            return;
        }
        self.width = width;
        self.height = height;
        let (target, view) = Self::create_target(&self.device, width, height);
        self.target = target;
        self.target_view = view;
        self.reset();
    }

    /// Réensemence les deux textures d'état avec des positions initiales
    /// quadrillant [-1, 1]².
    pub fn reset(&mut self) {
        let mut seed = Vec::with_capacity((STATE_DIM * STATE_DIM * 4) as usize);
        for ty in 0..STATE_DIM {
            for tx in 0..STATE_DIM {
                let x = tx as f32 / STATE_DIM as f32 * 2.0 - 1.0;
                let y = ty as f32 / STATE_DIM as f32 * 2.0 - 1.0;
                seed.extend_from_slice(&[x, y, 0.0, 1.0]);
            }
        }
        let bytes = bytemuck::cast_slice(&seed);
        for texture in &self.states {
            self.queue.write_texture(
                wgpu::ImageCopyTexture {
                    texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                bytes,
                wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(STATE_DIM * 16),
                    rows_per_image: Some(STATE_DIM),
                },
                wgpu::Extent3d {
                    width: STATE_DIM,
                    height: STATE_DIM,
                    depth_or_array_layers: 1,
                },
            );
        }
        self.flip = false;
        self.frame = 0;
    }

    /// Un pas d'itération : source -> destination, puis échange des rôles.
    pub fn step(&mut self) {
        let (src, dst) = if self.flip { (1, 0) } else { (0, 1) };

        let params_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("attractor-step-params"),
                contents: bytemuck::bytes_of(&StepParams {
                    a: self.params.a as f32,
                    b: self.params.b as f32,
                    c: self.params.c as f32,
                    d: self.params.d as f32,
                    kind: match self.params.kind {
                        AttractorKind::Clifford => 0,
                        AttractorKind::DeJong => 1,
                    },
                    frame: self.frame,
                    jitter: 0.2 / self.params.effective_scale() as f32,
                    _pad: 0,
                }),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("attractor-step-bind-group"),
            layout: &self.step_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&self.state_views[src]),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&self.state_views[dst]),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("attractor-step-encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("attractor-step-pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.step_pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            let dispatch = (STATE_DIM + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE;
            pass.dispatch_workgroups(dispatch, dispatch, 1);
        }
        self.queue.submit(Some(encoder.finish()));

        self.flip = !self.flip;
        self.frame = self.frame.wrapping_add(1);
    }

    /// Efface la cible puis dessine l'état courant en nuage de points.
    pub fn draw(&mut self) {
        let src = if self.flip { 1 } else { 0 };
        let (r, g, b) = hsv_to_rgb(
            self.params.hue,
            self.params.saturation,
            self.params.brightness,
        );

        let params_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("attractor-draw-params"),
                contents: bytemuck::bytes_of(&DrawParams {
                    scale: self.params.effective_scale() as f32,
                    left: self.params.left as f32,
                    top: self.params.top as f32,
                    alpha: POINT_ALPHA,
                    width: self.width as f32,
                    height: self.height as f32,
                    r: r as f32 / 255.0,
                    g: g as f32 / 255.0,
                    b: b as f32 / 255.0,
                    _pad: [0.0; 3],
                }),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("attractor-draw-bind-group"),
            layout: &self.draw_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&self.state_views[src]),
                },
            ],
        });

        let background = self.params.background;
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("attractor-draw-encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("attractor-draw-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: background[0] as f64 / 255.0,
                            g: background[1] as f64 / 255.0,
                            b: background[2] as f64 / 255.0,
                            a: background[3] as f64 / 255.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.draw_pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..STATE_DIM * STATE_DIM, 0..1);
        }
        self.queue.submit(Some(encoder.finish()));
    }

    /// Une image complète : le budget de pas de la largeur courante, puis
    /// un dessin.
    pub fn frame(&mut self) {
        for _ in 0..max_iterations_for(self.width) {
            self.step();
        }
        self.draw();
    }

    /// Relit la cible en RGBA8 serré (octets r, g, b, a par pixel).
    pub fn read_pixels(&self) -> Option<Vec<u8>> {
        // bytes_per_row aligné sur 256 pour la copie texture -> tampon.
        let unpadded = self.width * 4;
        let padded = (unpadded + 255) / 256 * 256;
        let size = padded as u64 * self.height as u64;

        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("attractor-readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("attractor-readback-encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &self.target,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &readback,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(Some(encoder.finish()));

        let slice = readback.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |r| {
            let _ = sender.send(r);
        });
        loop {
            if let Ok(result) = receiver.try_recv() {
                result.ok()?;
                break;
            }
            self.device.poll(wgpu::Maintain::Poll);
            std::thread::sleep(std::time::Duration::from_millis(1));
        }

        let data = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((unpadded * self.height) as usize);
        for row in 0..self.height {
            let start = (row * padded) as usize;
            pixels.extend_from_slice(&data[start..start + unpadded as usize]);
        }
        drop(data);
        readback.unmap();

        Some(pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iteration_budget_grows_for_smaller_viewports() {
        // Une petite fenêtre itère plus par image qu'une grande.
        assert!(max_iterations_for(640) > max_iterations_for(1280));
        assert!(max_iterations_for(1280) > max_iterations_for(1920));
        assert_eq!(max_iterations_for(1920), max_iterations_for(3840));
    }

    #[test]
    fn test_iteration_budget_is_monotonic() {
        let mut previous = u32::MAX;
        for width in (320..=3840).step_by(160) {
            let budget = max_iterations_for(width);
            assert!(budget <= previous);
            previous = budget;
        }
    }
}
