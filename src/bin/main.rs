use cgmath::prelude::*;
use clap::Parser;
use eframe::egui_wgpu::wgpu;
use eframe::wgpu::include_wgsl;
use eframe::{egui, wgpu::util::DeviceExt};
use encase::{ShaderSize, ShaderType, UniformBuffer};
use parking_lot::RwLock;
use particle_field::gpu::{self, GpuParticles};
use particle_field::{
    Bounds, Collider, Population, RandomSource, SimulationConfig, SimulationStage, StepOutcome,
    Timestep,
};
use rand::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

const ROTATION_SPEED: f32 = 90.0;
const MOVEMENT_SPEED: f32 = 5.0;

/// Interactive viewer for the collider-driven particle field.
#[derive(Parser, Debug)]
#[command(name = "particle-field", version, about)]
struct Cli {
    /// Number of particles
    #[arg(short = 'n', long, default_value_t = 20_000)]
    particles: usize,

    /// Collider slots available to the tracker
    #[arg(long, default_value_t = SimulationConfig::DEFAULT_MAX_COLLIDERS)]
    max_colliders: usize,

    /// Hash position and time for randomness instead of carrying a per-particle seed
    #[arg(long)]
    stateless: bool,

    /// Integrate with `velocity * time_delta * FACTOR` instead of one unit per step
    #[arg(long, value_name = "FACTOR")]
    time_scale: Option<f32>,

    /// Worker threads for the simulation step (default: one per core)
    #[arg(long)]
    threads: Option<usize>,

    /// Seed for the initial population
    #[arg(long)]
    seed: Option<u64>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(ShaderType)]
struct GpuCamera {
    pub view_matrix: cgmath::Matrix4<f32>,
    pub projection_matrix: cgmath::Matrix4<f32>,
}

struct Axes {
    pub forward: cgmath::Vector3<f32>,
    pub right: cgmath::Vector3<f32>,
    pub up: cgmath::Vector3<f32>,
}

struct Camera {
    pub position: cgmath::Vector3<f32>,
    pub up: cgmath::Vector3<f32>,
    pub pitch: f32,
    pub yaw: f32,
}

impl Camera {
    fn new(position: cgmath::Vector3<f32>) -> Self {
        Self {
            position,
            up: cgmath::vec3(0.0, 1.0, 0.0),
            pitch: 0.0,
            yaw: 0.0,
        }
    }

    fn axes(&self) -> Axes {
        let yaw = self.yaw.to_radians();
        let pitch = self.pitch.to_radians();

        let forward = cgmath::vec3(
            pitch.cos() * yaw.sin(),
            pitch.sin(),
            -pitch.cos() * yaw.cos(),
        )
        .normalize();
        let right = forward.cross(self.up).normalize();
        let up = right.cross(forward).normalize();

        Axes { forward, right, up }
    }

    fn uniform(&self, aspect: f32) -> GpuCamera {
        let axes = self.axes();
        GpuCamera {
            view_matrix: cgmath::Matrix4::look_to_rh(
                cgmath::point3(self.position.x, self.position.y, self.position.z),
                axes.forward,
                axes.up,
            ),
            projection_matrix: cgmath::perspective(
                cgmath::Rad::from(cgmath::Deg(70.0)),
                aspect,
                0.01,
                100.0,
            ),
        }
    }
}

struct Renderer {
    camera_uniform_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    particles_storage_buffer: wgpu::Buffer,
    particles_storage_buffer_size: usize,
    particles_bind_group_layout: wgpu::BindGroupLayout,
    particles_bind_group: wgpu::BindGroup,
    particles_render_pipeline: wgpu::RenderPipeline,
    border_render_pipeline: wgpu::RenderPipeline,
}

impl Renderer {
    fn new(render_state: &eframe::egui_wgpu::RenderState) -> Self {
        let device = &render_state.device;

        let particles_shader = device.create_shader_module(include_wgsl!("./particles.wgsl"));
        let border_shader = device.create_shader_module(include_wgsl!("./border.wgsl"));

        let camera_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Camera Bind Group Layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: Some(<GpuCamera as ShaderSize>::SHADER_SIZE),
                    },
                    count: None,
                }],
            });

        let particles_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Particles Bind Group Layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: Some(<GpuParticles as ShaderType>::min_size()),
                    },
                    count: None,
                }],
            });

        const PARTICLES_STORAGE_BUFFER_SIZE: usize =
            <GpuParticles as ShaderType>::METADATA.min_size().get() as _;

        let camera_uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Uniform Buffer"),
            contents: &[0; <GpuCamera as ShaderSize>::SHADER_SIZE.get() as _],
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::UNIFORM,
        });

        let particles_storage_buffer =
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Particles Storage Buffer"),
                contents: &[0; PARTICLES_STORAGE_BUFFER_SIZE],
                usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::STORAGE,
            });

        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Camera Bind Group"),
            layout: &camera_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_uniform_buffer.as_entire_binding(),
            }],
        });

        let particles_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Particles Bind Group"),
            layout: &particles_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: particles_storage_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Particle Field Pipeline Layout"),
            bind_group_layouts: &[&camera_bind_group_layout, &particles_bind_group_layout],
            push_constant_ranges: &[],
        });

        let depth_stencil = wgpu::DepthStencilState {
            format: wgpu::TextureFormat::Depth32Float,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        };

        let (particles_render_pipeline, border_render_pipeline) = rayon::join(
            || {
                device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some("Particles Render Pipeline"),
                    layout: Some(&pipeline_layout),
                    vertex: wgpu::VertexState {
                        module: &particles_shader,
                        entry_point: "vs_main",
                        buffers: &[],
                    },
                    fragment: Some(wgpu::FragmentState {
                        module: &particles_shader,
                        entry_point: "fs_main",
                        targets: &[Some(render_state.target_format.into())],
                    }),
                    primitive: wgpu::PrimitiveState {
                        polygon_mode: wgpu::PolygonMode::Fill,
                        topology: wgpu::PrimitiveTopology::TriangleStrip,
                        ..Default::default()
                    },
                    depth_stencil: Some(depth_stencil.clone()),
                    multisample: wgpu::MultisampleState::default(),
                    multiview: None,
                })
            },
            || {
                device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some("Border Render Pipeline"),
                    layout: Some(&pipeline_layout),
                    vertex: wgpu::VertexState {
                        module: &border_shader,
                        entry_point: "vs_main",
                        buffers: &[],
                    },
                    fragment: Some(wgpu::FragmentState {
                        module: &border_shader,
                        entry_point: "fs_main",
                        targets: &[Some(render_state.target_format.into())],
                    }),
                    primitive: wgpu::PrimitiveState {
                        polygon_mode: wgpu::PolygonMode::Fill,
                        topology: wgpu::PrimitiveTopology::LineList,
                        ..Default::default()
                    },
                    depth_stencil: Some(depth_stencil.clone()),
                    multisample: wgpu::MultisampleState::default(),
                    multiview: None,
                })
            },
        );

        Self {
            camera_uniform_buffer,
            camera_bind_group,
            particles_storage_buffer,
            particles_storage_buffer_size: PARTICLES_STORAGE_BUFFER_SIZE,
            particles_bind_group_layout,
            particles_bind_group,
            particles_render_pipeline,
            border_render_pipeline,
        }
    }

    fn prepare(
        &mut self,
        camera: &[u8],
        particles: &[u8],
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> Vec<wgpu::CommandBuffer> {
        queue.write_buffer(&self.camera_uniform_buffer, 0, camera);

        if self.particles_storage_buffer_size >= particles.len() {
            queue.write_buffer(&self.particles_storage_buffer, 0, particles);
        } else {
            log::debug!(
                "growing particle storage buffer to {} bytes",
                particles.len()
            );
            self.particles_storage_buffer =
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Particles Storage Buffer"),
                    contents: particles,
                    usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::STORAGE,
                });
            self.particles_storage_buffer_size = particles.len();
            self.particles_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Particles Bind Group"),
                layout: &self.particles_bind_group_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.particles_storage_buffer.as_entire_binding(),
                }],
            });
        }

        vec![]
    }

    fn paint<'a>(&'a self, particle_count: u32, render_pass: &mut wgpu::RenderPass<'a>) {
        render_pass.set_pipeline(&self.particles_render_pipeline);
        render_pass.set_bind_group(0, &self.camera_bind_group, &[]);
        render_pass.set_bind_group(1, &self.particles_bind_group, &[]);
        render_pass.draw(0..4, 0..particle_count);

        render_pass.set_pipeline(&self.border_render_pipeline);
        render_pass.set_bind_group(0, &self.camera_bind_group, &[]);
        render_pass.set_bind_group(1, &self.particles_bind_group, &[]);
        render_pass.draw(0..24, 0..1);
    }
}

/// Knobs the UI hands to the simulation worker.
#[derive(Clone, Copy, Debug)]
struct Controls {
    tracker_count: usize,
    collider_radius: f32,
    orbit_speed: f32,
    simulation_rate: f32,
    paused: bool,
}

/// Stand-in for pose tracking: spheres on Lissajous paths through the volume.
struct OrbitTracker {
    bounds: Bounds,
}

impl OrbitTracker {
    fn colliders_at(&self, t: f32, controls: &Controls) -> Vec<Collider> {
        let h = self.bounds.half_extents;
        let count = controls.tracker_count;
        (0..count)
            .map(|i| {
                let phase = i as f32 * std::f32::consts::TAU / count as f32;
                let a = t * controls.orbit_speed + phase;
                let center = cgmath::vec3(
                    h.x * 0.6 * a.cos(),
                    h.y * 0.5 * (a * 1.7).sin(),
                    h.z * 0.4 * (a * 0.8).sin(),
                );
                Collider::new(center, controls.collider_radius)
            })
            .collect()
    }
}

/// Latest encoded state published by the worker.
#[derive(Default)]
struct SharedFrame {
    particles: Arc<Vec<u8>>,
    particle_count: usize,
    interacted: usize,
    step_time: Duration,
    steps: u64,
    time: f32,
}

fn run_worker(
    mut stage: SimulationStage,
    controls: Arc<RwLock<Controls>>,
    frame: Arc<RwLock<SharedFrame>>,
    shutdown: Arc<AtomicBool>,
) {
    let clock = Instant::now();
    let bounds = stage.config().bounds;
    let tracker = OrbitTracker { bounds };

    while !shutdown.load(Ordering::Acquire) {
        let tick = Instant::now();
        let controls = *controls.read();

        if !controls.paused {
            let t = clock.elapsed().as_secs_f32();
            if let Err(err) = stage.set_time(t) {
                log::warn!("{err}");
            }
            if let Err(err) = stage.set_colliders(&tracker.colliders_at(t, &controls)) {
                log::warn!("tracker produced an unusable collider list: {err}");
            }
            if stage.step_cancellable(&shutdown) == StepOutcome::Cancelled {
                break;
            }
        }
        let step_time = tick.elapsed();

        let view = stage.current_buffer();
        match gpu::encode_particles(&view, &bounds) {
            Ok(bytes) => {
                let mut shared = frame.write();
                shared.particles = Arc::new(bytes);
                shared.particle_count = view.len();
                shared.interacted = view.interacted_count();
                shared.step_time = step_time;
                shared.steps = stage.steps_taken();
                shared.time = stage.time();
            }
            Err(err) => log::error!("{err}"),
        }

        let period = Duration::from_secs_f32(1.0 / controls.simulation_rate.max(1.0));
        if let Some(rest) = period.checked_sub(tick.elapsed()) {
            std::thread::sleep(rest);
        }
    }
    log::info!("simulation worker stopped after {} steps", stage.steps_taken());
}

struct ParticleViewer {
    camera: Camera,
    last_frame_time: Instant,
    max_colliders: usize,
    controls: Arc<RwLock<Controls>>,
    frame: Arc<RwLock<SharedFrame>>,
    shutdown: Arc<AtomicBool>,
    worker: Option<std::thread::JoinHandle<()>>,
}

impl ParticleViewer {
    fn new(cc: &eframe::CreationContext, stage: SimulationStage) -> Self {
        let render_state = cc
            .wgpu_render_state
            .as_ref()
            .expect("viewer is started with the wgpu renderer");
        let renderer = Renderer::new(render_state);
        render_state
            .renderer
            .write()
            .paint_callback_resources
            .insert(renderer);

        let max_colliders = stage.config().max_colliders;
        let controls = Arc::new(RwLock::new(Controls {
            tracker_count: max_colliders.min(2),
            collider_radius: 0.35,
            orbit_speed: 0.6,
            simulation_rate: 60.0,
            paused: false,
        }));
        let frame = Arc::new(RwLock::new(SharedFrame::default()));
        let shutdown = Arc::new(AtomicBool::new(false));

        let worker = {
            let controls = Arc::clone(&controls);
            let frame = Arc::clone(&frame);
            let shutdown = Arc::clone(&shutdown);
            std::thread::Builder::new()
                .name("particle-simulation".into())
                .spawn(move || run_worker(stage, controls, frame, shutdown))
        };
        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(err) => {
                log::error!("could not start simulation worker: {err}");
                None
            }
        };

        Self {
            camera: Camera::new(cgmath::vec3(0.0, 0.0, 9.0)),
            last_frame_time: Instant::now(),
            max_colliders,
            controls,
            frame,
            shutdown,
            worker,
        }
    }

    fn handle_camera_input(&mut self, ctx: &egui::Context, ts: f32) {
        if ctx.wants_keyboard_input() {
            return;
        }
        ctx.input(|i| {
            let axes = self.camera.axes();

            if i.key_down(egui::Key::W) {
                self.camera.position += axes.forward * MOVEMENT_SPEED * ts;
            }
            if i.key_down(egui::Key::S) {
                self.camera.position -= axes.forward * MOVEMENT_SPEED * ts;
            }
            if i.key_down(egui::Key::A) {
                self.camera.position -= axes.right * MOVEMENT_SPEED * ts;
            }
            if i.key_down(egui::Key::D) {
                self.camera.position += axes.right * MOVEMENT_SPEED * ts;
            }
            if i.key_down(egui::Key::Q) {
                self.camera.position -= axes.up * MOVEMENT_SPEED * ts;
            }
            if i.key_down(egui::Key::E) {
                self.camera.position += axes.up * MOVEMENT_SPEED * ts;
            }

            if i.key_down(egui::Key::ArrowUp) {
                self.camera.pitch += ROTATION_SPEED * ts;
            }
            if i.key_down(egui::Key::ArrowDown) {
                self.camera.pitch -= ROTATION_SPEED * ts;
            }
            if i.key_down(egui::Key::ArrowLeft) {
                self.camera.yaw -= ROTATION_SPEED * ts;
            }
            if i.key_down(egui::Key::ArrowRight) {
                self.camera.yaw += ROTATION_SPEED * ts;
            }

            self.camera.pitch = self.camera.pitch.clamp(-89.9999, 89.9999);
        });
    }

    fn render_ui_panel(&mut self, ui: &mut egui::Ui, frame_time: f32) {
        {
            let shared = self.frame.read();
            ui.label(format!("FPS: {:.1}", 1.0 / frame_time.max(f32::EPSILON)));
            ui.label(format!(
                "Step Time: {:.3}ms",
                shared.step_time.as_secs_f64() * 1000.0
            ));
            ui.label(format!("Steps: {}", shared.steps));
            ui.label(format!("Sim Time: {:.2}s", shared.time));
            ui.label(format!(
                "Interacted: {} / {}",
                shared.interacted, shared.particle_count
            ));
        }

        ui.separator();
        let mut controls = *self.controls.read();
        ui.horizontal(|ui| {
            ui.label("Colliders: ");
            ui.add(egui::Slider::new(
                &mut controls.tracker_count,
                0..=self.max_colliders,
            ));
        });
        ui.horizontal(|ui| {
            ui.label("Radius: ");
            ui.add(egui::Slider::new(&mut controls.collider_radius, 0.0..=1.5));
        });
        ui.horizontal(|ui| {
            ui.label("Orbit Speed: ");
            ui.add(egui::Slider::new(&mut controls.orbit_speed, 0.0..=3.0));
        });
        ui.horizontal(|ui| {
            ui.label("Simulation Rate: ");
            ui.add(egui::Slider::new(&mut controls.simulation_rate, 1.0..=240.0));
        });
        ui.checkbox(&mut controls.paused, "Paused");
        *self.controls.write() = controls;
    }
}

impl Drop for ParticleViewer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("simulation worker panicked");
            }
        }
    }
}

impl eframe::App for ParticleViewer {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        let ts = now.duration_since(self.last_frame_time).as_secs_f32();
        self.last_frame_time = now;

        self.handle_camera_input(ctx, ts);

        egui::SidePanel::left("Control Panel").show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| {
                self.render_ui_panel(ui, ts);
                ui.allocate_space(ui.available_size());
            });
        });

        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(ctx.style().visuals.panel_fill))
            .show(ctx, |ui| {
                let (rect, _response) =
                    ui.allocate_exact_size(ui.available_size(), egui::Sense::drag());

                let mut camera_uniform = UniformBuffer::new(Vec::<u8>::new());
                let aspect = rect.width() / rect.height();
                if let Err(err) = camera_uniform.write(&self.camera.uniform(aspect)) {
                    log::error!("failed to encode camera uniform: {err:?}");
                    return;
                }
                let camera = camera_uniform.into_inner();

                let (particles, particle_count) = {
                    let shared = self.frame.read();
                    (Arc::clone(&shared.particles), shared.particle_count)
                };
                if particles.is_empty() {
                    return;
                }

                ui.painter().add(egui::PaintCallback {
                    rect,
                    callback: Arc::new(
                        eframe::egui_wgpu::CallbackFn::new()
                            .prepare(move |device, queue, _encoder, paint_callback_resources| {
                                let Some(renderer) =
                                    paint_callback_resources.get_mut::<Renderer>()
                                else {
                                    return Vec::new();
                                };
                                renderer.prepare(&camera, &particles, device, queue)
                            })
                            .paint(move |_info, render_pass, paint_callback_resources| {
                                if let Some(renderer) = paint_callback_resources.get::<Renderer>() {
                                    renderer.paint(particle_count as _, render_pass);
                                }
                            }),
                    ),
                });
            });

        ctx.request_repaint();
    }
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let random_source = if cli.stateless {
        RandomSource::Stateless
    } else {
        RandomSource::PerParticle
    };
    let mut config = SimulationConfig::new(cli.max_colliders, random_source);
    if let Some(factor) = cli.time_scale {
        config.timestep = Timestep::Scaled { factor };
    }
    config.execution.threads = cli.threads;

    let mut rng = match cli.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let stage = Population::scatter(
        cli.particles,
        &config.bounds,
        config.dynamics.respawn_jitter,
        &mut rng,
    )
    .and_then(|population| SimulationStage::configure(config, population));
    let stage = match stage {
        Ok(stage) => stage,
        Err(err) => {
            log::error!("{err}");
            std::process::exit(1);
        }
    };

    let result = eframe::run_native(
        "Particle Field",
        eframe::NativeOptions {
            renderer: eframe::Renderer::Wgpu,
            wgpu_options: eframe::egui_wgpu::WgpuConfiguration {
                present_mode: wgpu::PresentMode::AutoNoVsync,
                depth_format: Some(wgpu::TextureFormat::Depth32Float),
                ..Default::default()
            },
            vsync: false,
            depth_buffer: 32,
            ..Default::default()
        },
        Box::new(move |cc| Box::new(ParticleViewer::new(cc, stage))),
    );
    if let Err(err) = result {
        log::error!("viewer exited with an error: {err:?}");
        std::process::exit(1);
    }
}
