use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use log::warn;
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::EventLoop;
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowBuilder};

use crate::domain::{
    Display, DisplayError, EventQueue, Framebuffer, InputSource, Palette, PointerPosition, Rect,
    check_blit, keys, resolve_blit,
};

pub const WINDOW_WIDTH: u32 = 800;
pub const WINDOW_HEIGHT: u32 = 480;

/// Open the host window and split it into its display and input halves.
/// Window creation and GPU bring-up are video init: failure here is
/// fatal, so this panics rather than limping on.
pub fn open(title: &str, width: u32, height: u32) -> (WindowDisplay, WindowInput) {
    let host = Rc::new(RefCell::new(WindowHost::new(title, width, height)));
    (
        WindowDisplay {
            host: Rc::clone(&host),
            width,
            height,
        },
        WindowInput { host },
    )
}

/// Display half of the window backend: software palette resolve into
/// the framebuffer, presented by uploading to a GPU texture.
pub struct WindowDisplay {
    host: Rc<RefCell<WindowHost>>,
    width: u32,
    height: u32,
}

impl Display for WindowDisplay {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn blit(&mut self, src: &[u8], palette: &Palette, rect: Rect) -> Result<(), DisplayError> {
        check_blit(self.width, self.height, src.len(), rect)?;
        let mut host = self.host.borrow_mut();
        resolve_blit(&mut host.framebuffer, src, palette, rect);
        Ok(())
    }

    fn present(&mut self) -> Result<(), DisplayError> {
        self.host.borrow_mut().render()
    }
}

/// Input half of the window backend: pumps the event loop, feeds key
/// events into the queue, and tracks the cursor as the pointer reading.
pub struct WindowInput {
    host: Rc<RefCell<WindowHost>>,
}

impl InputSource for WindowInput {
    fn poll(&mut self, queue: &EventQueue) {
        self.host.borrow_mut().pump(queue);
    }

    fn pointer_position(&self) -> Option<PointerPosition> {
        self.host.borrow().pointer
    }

    fn quit_requested(&self) -> bool {
        self.host.borrow().quit
    }
}

struct WindowHost {
    event_loop: EventLoop<()>,
    window: Arc<Window>,
    gpu: Gpu,
    framebuffer: Framebuffer,
    pointer: Option<PointerPosition>,
    quit: bool,
}

impl WindowHost {
    fn new(title: &str, width: u32, height: u32) -> Self {
        let event_loop = EventLoop::new().expect("event loop");
        let window = Arc::new(
            WindowBuilder::new()
                .with_title(title)
                .with_inner_size(PhysicalSize::new(width, height))
                .with_resizable(false)
                .build(&event_loop)
                .expect("window"),
        );
        let gpu = pollster::block_on(Gpu::new(Arc::clone(&window), width, height));

        Self {
            event_loop,
            window,
            gpu,
            framebuffer: Framebuffer::new(width, height),
            pointer: None,
            quit: false,
        }
    }

    fn pump(&mut self, queue: &EventQueue) {
        let target = self.window.id();
        let mut pending = Vec::new();
        let status = self
            .event_loop
            .pump_events(Some(Duration::ZERO), |event, _| {
                if let Event::WindowEvent { event, window_id } = event {
                    if window_id == target {
                        pending.push(event);
                    }
                }
            });
        if let PumpStatus::Exit(_) = status {
            self.quit = true;
        }
        for event in pending {
            self.handle(event, queue);
        }
    }

    fn handle(&mut self, event: WindowEvent, queue: &EventQueue) {
        match event {
            WindowEvent::CloseRequested => self.quit = true,
            WindowEvent::Resized(size) => self.gpu.resize(size),
            WindowEvent::KeyboardInput { event, .. } => {
                if event.repeat {
                    return;
                }
                if let PhysicalKey::Code(code) = event.physical_key {
                    if let Some(code) = map_key(code) {
                        queue.push(code, event.state == ElementState::Pressed);
                    }
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.pointer = Some(PointerPosition {
                    x: position.x as i32,
                    y: position.y as i32,
                });
            }
            WindowEvent::CursorLeft { .. } => self.pointer = None,
            _ => {}
        }
    }

    fn render(&mut self) -> Result<(), DisplayError> {
        match self.gpu.render(&self.framebuffer) {
            Ok(()) => Ok(()),
            Err(wgpu::SurfaceError::Lost) | Err(wgpu::SurfaceError::Outdated) => {
                // The surface comes back on the next configure; the frame
                // is simply dropped.
                warn!("surface lost, reconfiguring");
                self.gpu.resize(self.gpu.size);
                Ok(())
            }
            Err(wgpu::SurfaceError::Timeout) => Ok(()),
            Err(wgpu::SurfaceError::OutOfMemory) => {
                Err(DisplayError::Present("surface out of memory".to_string()))
            }
        }
    }
}

struct Gpu {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,
    texture: wgpu::Texture,
    _texture_view: wgpu::TextureView,
    _texture_sampler: wgpu::Sampler,
    bind_group: wgpu::BindGroup,
    pipeline: wgpu::RenderPipeline,
    frame_width: u32,
    frame_height: u32,
}

impl Gpu {
    async fn new(window: Arc<Window>, frame_width: u32, frame_height: u32) -> Self {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance.create_surface(window).expect("surface");
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                compatible_surface: Some(&surface),
                power_preference: wgpu::PowerPreference::HighPerformance,
                force_fallback_adapter: false,
            })
            .await
            .expect("adapter");
        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                },
                None,
            )
            .await
            .expect("device");

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|format| format.is_srgb())
            .unwrap_or(surface_caps.formats[0]);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps.present_modes[0],
            desired_maximum_frame_latency: 2,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("framebuffer"),
            size: wgpu::Extent3d {
                width: frame_width,
                height: frame_height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let texture_view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let texture_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("framebuffer_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("texture_bind_group_layout"),
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

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("texture_bind_group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&texture_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&texture_sampler),
                },
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("blit_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shader_blit.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("blit_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        Self {
            surface,
            device,
            queue,
            config,
            size,
            texture,
            _texture_view: texture_view,
            _texture_sampler: texture_sampler,
            bind_group,
            pipeline,
            frame_width,
            frame_height,
        }
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        self.size = size;
        self.config.width = size.width;
        self.config.height = size.height;
        self.surface.configure(&self.device, &self.config);
    }

    fn render(&mut self, frame: &Framebuffer) -> Result<(), wgpu::SurfaceError> {
        let (padded, bytes_per_row) = prepare_framebuffer_upload(frame);
        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &padded,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(self.frame_height),
            },
            wgpu::Extent3d {
                width: self.frame_width,
                height: self.frame_height,
                depth_or_array_layers: 1,
            },
        );

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("render_encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("render_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            render_pass.set_pipeline(&self.pipeline);
            render_pass.set_bind_group(0, &self.bind_group, &[]);
            render_pass.draw(0..3, 0..1);
        }

        self.queue.submit(Some(encoder.finish()));
        output.present();
        Ok(())
    }
}

/// Expand packed `0x00RRGGBB` pixels to RGBA rows padded to the copy
/// alignment wgpu requires.
fn prepare_framebuffer_upload(frame: &Framebuffer) -> (Vec<u8>, u32) {
    let width = frame.width() as usize;
    let height = frame.height() as usize;
    let unpadded = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as usize;
    let padded = unpadded.div_ceil(align) * align;
    let pixels = frame.as_slice();
    let mut data = vec![0u8; padded * height];
    for y in 0..height {
        let src = y * width;
        let dst = y * padded;
        for x in 0..width {
            let pixel = pixels[src + x];
            let out = dst + x * 4;
            data[out] = (pixel >> 16) as u8;
            data[out + 1] = (pixel >> 8) as u8;
            data[out + 2] = pixel as u8;
            data[out + 3] = 0xFF;
        }
    }
    (data, padded as u32)
}

fn map_key(code: KeyCode) -> Option<u8> {
    let mapped = match code {
        KeyCode::Enter => keys::ENTER,
        KeyCode::Escape => keys::ESCAPE,
        KeyCode::Space => keys::SPACE,
        KeyCode::Tab => keys::TAB,
        KeyCode::Backspace => keys::BACKSPACE,
        KeyCode::ArrowUp => keys::UP_ARROW,
        KeyCode::ArrowDown => keys::DOWN_ARROW,
        KeyCode::ArrowLeft => keys::LEFT_ARROW,
        KeyCode::ArrowRight => keys::RIGHT_ARROW,
        KeyCode::AltLeft | KeyCode::AltRight => keys::ALT,
        KeyCode::ControlLeft | KeyCode::ControlRight => keys::CTRL,
        KeyCode::ShiftLeft | KeyCode::ShiftRight => keys::SHIFT,
        KeyCode::Comma => keys::COMMA,
        KeyCode::Period => keys::PERIOD,
        KeyCode::KeyA => b'a',
        KeyCode::KeyB => b'b',
        KeyCode::KeyC => b'c',
        KeyCode::KeyD => b'd',
        KeyCode::KeyE => b'e',
        KeyCode::KeyF => b'f',
        KeyCode::KeyG => b'g',
        KeyCode::KeyH => b'h',
        KeyCode::KeyI => b'i',
        KeyCode::KeyJ => b'j',
        KeyCode::KeyK => b'k',
        KeyCode::KeyL => b'l',
        KeyCode::KeyM => b'm',
        KeyCode::KeyN => b'n',
        KeyCode::KeyO => b'o',
        KeyCode::KeyP => b'p',
        KeyCode::KeyQ => b'q',
        KeyCode::KeyR => b'r',
        KeyCode::KeyS => b's',
        KeyCode::KeyT => b't',
        KeyCode::KeyU => b'u',
        KeyCode::KeyV => b'v',
        KeyCode::KeyW => b'w',
        KeyCode::KeyX => b'x',
        KeyCode::KeyY => b'y',
        KeyCode::KeyZ => b'z',
        KeyCode::Digit0 => b'0',
        KeyCode::Digit1 => b'1',
        KeyCode::Digit2 => b'2',
        KeyCode::Digit3 => b'3',
        KeyCode::Digit4 => b'4',
        KeyCode::Digit5 => b'5',
        KeyCode::Digit6 => b'6',
        KeyCode::Digit7 => b'7',
        KeyCode::Digit8 => b'8',
        KeyCode::Digit9 => b'9',
        _ => return None,
    };
    Some(mapped)
}
