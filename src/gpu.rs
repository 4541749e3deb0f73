use std::sync::{Arc, OnceLock, mpsc};

use image::DynamicImage;
use tracing::{debug, info, warn};

use crate::buffer::{self, PixelBuffer};
use crate::config::GpuSettings;
use crate::error::Error;
use crate::geom::ImageSize;

const WORKGROUP_SIZE: u32 = 16;

/// Names one of the three compiled compute kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kernel {
    /// Per-channel multiply by independent scale factors.
    ChannelScale,
    /// Keep pixels inside a circle, transparent outside.
    CircularMask,
    /// Translate a crop rectangle into a smaller preview grid.
    RegionExtract,
}

impl Kernel {
    fn label(self) -> &'static str {
        match self {
            Kernel::ChannelScale => "channel_scale",
            Kernel::CircularMask => "circular_mask",
            Kernel::RegionExtract => "region_extract",
        }
    }
}

struct PipelineBundle {
    pipeline: wgpu::ComputePipeline,
    bgl: wgpu::BindGroupLayout,
}

/// Owner of the compute device, submission queue, and the three compiled
/// kernel pipelines.
///
/// Constructed once (either explicitly via [`GpuContext::new`] and shared
/// by `Arc`, or through the process-wide [`GpuContext::shared`] slot) and
/// never mutated afterwards; the compiled pipelines are safe to use from
/// multiple threads. Initialization failure of the shared slot is cached
/// for the process lifetime with no retry.
pub struct GpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    channel_scale: PipelineBundle,
    circular_mask: PipelineBundle,
    region_extract: PipelineBundle,
    adapter_name: String,
    adapter_backend: String,
}

static SHARED_CONTEXT: OnceLock<Option<Arc<GpuContext>>> = OnceLock::new();

impl GpuContext {
    /// Acquires a compute device and compiles all three kernels.
    ///
    /// Any failure here means the context is unusable; there is no
    /// software fallback.
    pub fn new(settings: &GpuSettings) -> Result<Arc<Self>, Error> {
        init_context(settings).map(Arc::new)
    }

    /// Process-wide context, initialized exactly once on first use.
    ///
    /// Concurrent first calls race on the same `OnceLock`, so device
    /// acquisition runs once; a failed initialization is permanent and
    /// every later call keeps returning `GpuUnavailable`.
    pub fn shared() -> Result<Arc<Self>, Error> {
        SHARED_CONTEXT
            .get_or_init(|| match init_context(&GpuSettings::load()) {
                Ok(ctx) => Some(Arc::new(ctx)),
                Err(err) => {
                    warn!("gpu context initialization failed: {err}");
                    None
                }
            })
            .clone()
            .ok_or(Error::GpuUnavailable)
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    pub fn adapter_backend(&self) -> &str {
        &self.adapter_backend
    }

    /// The device's maximum 2D texture dimension.
    pub fn max_texture_dimension(&self) -> u32 {
        self.device.limits().max_texture_dimension_2d
    }

    fn bundle(&self, kernel: Kernel) -> &PipelineBundle {
        match kernel {
            Kernel::ChannelScale => &self.channel_scale,
            Kernel::CircularMask => &self.circular_mask,
            Kernel::RegionExtract => &self.region_extract,
        }
    }

    /// Runs one kernel against `input` and returns the displayable
    /// result.
    ///
    /// One invocation is one synchronous round trip: upload, a single
    /// 16x16-workgroup dispatch covering `output_size`, submit, block
    /// until complete, read back. There is no cancellation and no
    /// timeout; a device stall blocks the caller. A failure aborts only
    /// this request and leaves the input buffer untouched for retry.
    ///
    /// `params` is the kernel's parameter blob: four little-endian f32
    /// slots, unused slots zero.
    pub fn run(
        &self,
        kernel: Kernel,
        input: &PixelBuffer,
        output_size: ImageSize,
        params: [f32; 4],
    ) -> Result<DynamicImage, Error> {
        let input_size = input.size();
        self.check_texture_size(input_size)?;
        self.check_texture_size(output_size)?;
        debug!(
            kernel = kernel.label(),
            input_w = input_size.width,
            input_h = input_size.height,
            output_w = output_size.width,
            output_h = output_size.height,
            "dispatching kernel"
        );

        let input_extent = wgpu::Extent3d {
            width: input_size.width,
            height: input_size.height,
            depth_or_array_layers: 1,
        };
        let output_extent = wgpu::Extent3d {
            width: output_size.width,
            height: output_size.height,
            depth_or_array_layers: 1,
        };

        let input_texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("viewfinder_input"),
            size: input_extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            input_texture.as_image_copy(),
            input.data(),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(input_size.width.saturating_mul(4)),
                rows_per_image: Some(input_size.height),
            },
            input_extent,
        );

        let output_texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("viewfinder_output"),
            size: output_extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::STORAGE_BINDING | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        let params_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("viewfinder_params"),
            size: std::mem::size_of_val(&params) as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.queue
            .write_buffer(&params_buffer, 0, f32s_as_bytes(&params));

        let bundle = self.bundle(kernel);
        let input_view = input_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let output_view = output_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(kernel.label()),
            layout: &bundle.bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&input_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&output_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: params_buffer.as_entire_binding(),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("viewfinder_encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(kernel.label()),
                timestamp_writes: None,
            });
            pass.set_pipeline(&bundle.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(
                workgroups_for(output_size.width),
                workgroups_for(output_size.height),
                1,
            );
        }

        // Readback rows must be aligned to COPY_BYTES_PER_ROW_ALIGNMENT;
        // the padding is stripped after mapping.
        let unpadded_bytes_per_row = output_size.width.saturating_mul(4);
        let padded_bytes_per_row =
            unpadded_bytes_per_row.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
                * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let readback_size = padded_bytes_per_row as u64 * output_size.height as u64;
        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("viewfinder_readback"),
            size: readback_size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        encoder.copy_texture_to_buffer(
            output_texture.as_image_copy(),
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(output_size.height),
                },
            },
            output_extent,
        );

        self.queue.submit([encoder.finish()]);
        let slice = readback.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = self.device.poll(wgpu::Maintain::wait());
        let map_result = rx
            .recv()
            .map_err(|_| Error::KernelDispatch("readback callback never fired".into()))?;
        map_result.map_err(|err| Error::KernelDispatch(err.to_string()))?;

        let mapped = slice.get_mapped_range();
        let unpadded = unpadded_bytes_per_row as usize;
        let padded = padded_bytes_per_row as usize;
        let mut out = vec![0_u8; unpadded * output_size.height as usize];
        for row in 0..output_size.height as usize {
            let src_offset = row * padded;
            let dst_offset = row * unpadded;
            out[dst_offset..dst_offset + unpadded]
                .copy_from_slice(&mapped[src_offset..src_offset + unpadded]);
        }
        drop(mapped);
        readback.unmap();

        // wgpu's texture origin already matches the image origin, so the
        // orientation fix-up other APIs need after readback is the
        // identity here.
        buffer::encode(&out, output_size)
    }

    fn check_texture_size(&self, size: ImageSize) -> Result<(), Error> {
        let max = self.max_texture_dimension();
        if size.is_empty() || size.width > max || size.height > max {
            return Err(Error::TextureAllocation {
                width: size.width,
                height: size.height,
            });
        }
        Ok(())
    }
}

fn workgroups_for(dim: u32) -> u32 {
    dim.div_ceil(WORKGROUP_SIZE)
}

fn init_context(settings: &GpuSettings) -> Result<GpuContext, Error> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: settings.backends(),
        ..Default::default()
    });
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: settings.power_preference(),
        force_fallback_adapter: settings.force_fallback_adapter(),
        compatible_surface: None,
    }))
    .ok_or(Error::GpuUnavailable)?;
    let adapter_info = adapter.get_info();
    let (device, queue) = pollster::block_on(adapter.request_device(
        &wgpu::DeviceDescriptor {
            label: Some("viewfinder_device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: wgpu::MemoryHints::Performance,
        },
        None,
    ))
    .map_err(|_| Error::GpuUnavailable)?;

    let entries = tex_storage_uniform_entries();
    let channel_scale =
        create_pipeline_bundle(&device, "channel_scale", CHANNEL_SCALE_SHADER_SRC, &entries);
    let circular_mask =
        create_pipeline_bundle(&device, "circular_mask", CIRCULAR_MASK_SHADER_SRC, &entries);
    let region_extract = create_pipeline_bundle(
        &device,
        "region_extract",
        REGION_EXTRACT_SHADER_SRC,
        &entries,
    );

    info!(
        adapter = %adapter_info.name,
        backend = %adapter_info.backend,
        "compute context initialized"
    );

    Ok(GpuContext {
        device,
        queue,
        channel_scale,
        circular_mask,
        region_extract,
        adapter_name: adapter_info.name,
        adapter_backend: adapter_info.backend.to_string(),
    })
}

fn create_pipeline_bundle(
    device: &wgpu::Device,
    label: &str,
    shader_src: &str,
    bgl_entries: &[wgpu::BindGroupLayoutEntry],
) -> PipelineBundle {
    let bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: bgl_entries,
    });
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(shader_src.into()),
    });
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[&bgl],
        push_constant_ranges: &[],
    });
    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: Some(&layout),
        module: &shader,
        entry_point: Some("main"),
        cache: None,
        compilation_options: wgpu::PipelineCompilationOptions::default(),
    });
    PipelineBundle { pipeline, bgl }
}

/// Shared bind group layout: texture_2d input + storage_texture output +
/// uniform parameter buffer, identical across all three kernels.
fn tex_storage_uniform_entries() -> [wgpu::BindGroupLayoutEntry; 3] {
    [
        wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        },
        wgpu::BindGroupLayoutEntry {
            binding: 1,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::StorageTexture {
                access: wgpu::StorageTextureAccess::WriteOnly,
                format: wgpu::TextureFormat::Rgba8Unorm,
                view_dimension: wgpu::TextureViewDimension::D2,
            },
            count: None,
        },
        wgpu::BindGroupLayoutEntry {
            binding: 2,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        },
    ]
}

fn f32s_as_bytes(values: &[f32]) -> &[u8] {
    // f32 has no invalid bit patterns; reinterpreting as bytes is safe.
    unsafe {
        std::slice::from_raw_parts(values.as_ptr().cast::<u8>(), std::mem::size_of_val(values))
    }
}

// Per-channel scale. Factors are unclamped inputs; the result is clamped
// to [0, 1] before the unorm store, so byte values land in [0, 255] with
// round-to-nearest and negative factors clamp to 0.
const CHANNEL_SCALE_SHADER_SRC: &str = r#"
struct Params {
    dominance: vec4<f32>,
};

@group(0) @binding(0)
var src_tex: texture_2d<f32>;
@group(0) @binding(1)
var dst_tex: texture_storage_2d<rgba8unorm, write>;
@group(0) @binding(2)
var<uniform> params: Params;

@compute @workgroup_size(16, 16, 1)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let dims = textureDimensions(dst_tex);
    if (gid.x >= dims.x || gid.y >= dims.y) {
        return;
    }
    let coord = vec2<i32>(i32(gid.x), i32(gid.y));
    let px = textureLoad(src_tex, coord, 0);
    let scaled = clamp(px * params.dominance, vec4<f32>(0.0), vec4<f32>(1.0));
    textureStore(dst_tex, coord, scaled);
}
"#;

// Hard-cutoff circular mask: pixels whose squared distance from the
// center exceeds radius^2 become fully transparent. No antialiasing at
// the boundary.
const CIRCULAR_MASK_SHADER_SRC: &str = r#"
struct Params {
    center: vec2<f32>,
    radius: f32,
    _pad: f32,
};

@group(0) @binding(0)
var src_tex: texture_2d<f32>;
@group(0) @binding(1)
var dst_tex: texture_storage_2d<rgba8unorm, write>;
@group(0) @binding(2)
var<uniform> params: Params;

@compute @workgroup_size(16, 16, 1)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let dims = textureDimensions(dst_tex);
    if (gid.x >= dims.x || gid.y >= dims.y) {
        return;
    }
    let coord = vec2<i32>(i32(gid.x), i32(gid.y));
    let px = textureLoad(src_tex, coord, 0);
    let dx = f32(gid.x) - params.center.x;
    let dy = f32(gid.y) - params.center.y;
    let inside = dx * dx + dy * dy <= params.radius * params.radius;
    textureStore(dst_tex, coord, select(vec4<f32>(0.0), px, inside));
}
"#;

// Translation-only crop: destination (u, v) samples source
// (origin.x + u, origin.y + v). The caller keeps the crop rectangle
// equal to the preview size; out-of-range source coordinates produce
// transparent pixels instead of undefined reads.
const REGION_EXTRACT_SHADER_SRC: &str = r#"
struct Params {
    origin: vec2<f32>,
    _pad: vec2<f32>,
};

@group(0) @binding(0)
var src_tex: texture_2d<f32>;
@group(0) @binding(1)
var dst_tex: texture_storage_2d<rgba8unorm, write>;
@group(0) @binding(2)
var<uniform> params: Params;

@compute @workgroup_size(16, 16, 1)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let dims = textureDimensions(dst_tex);
    if (gid.x >= dims.x || gid.y >= dims.y) {
        return;
    }
    let src_dims = textureDimensions(src_tex);
    let sx = i32(round(params.origin.x)) + i32(gid.x);
    let sy = i32(round(params.origin.y)) + i32(gid.y);
    var color = vec4<f32>(0.0);
    if (sx >= 0 && sy >= 0 && sx < i32(src_dims.x) && sy < i32(src_dims.y)) {
        color = textureLoad(src_tex, vec2<i32>(sx, sy), 0);
    }
    textureStore(dst_tex, vec2<i32>(i32(gid.x), i32(gid.y)), color);
}
"#;
