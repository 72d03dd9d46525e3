use canvas_protocol::{CanvasPlacement, DrawResult, Layer, Pen, PixelPoint, Rgba, ViewInfo};
use canvas_runtime::CanvasRuntime;
use pretty_assertions::assert_eq;

use crate::testing::{CompiledPipeline, RecordingDevice};
use crate::{
    BackendDrawContext, BackendInitError, DrawSubmitError, LayerPhase, LayerState,
    ProvisionError, SurfaceError, TextureLayerSurface, WgpuDevice,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn recording_context() -> BackendDrawContext<RecordingDevice> {
    let (device, queue) = RecordingDevice::new();
    BackendDrawContext::new(device, queue)
}

fn view(width_px: u32, height_px: u32) -> ViewInfo {
    ViewInfo::new(width_px, height_px, 1.0)
}

fn draw_stroke(runtime: &CanvasRuntime, points: &[(f64, f64)], seal: bool) {
    runtime.begin_stroke().expect("begin stroke");
    for (x, y) in points {
        runtime
            .record_stroke_point(100.0, 100.0, *x, *y)
            .expect("record stroke point");
    }
    if seal {
        runtime.end_stroke().expect("end stroke");
    }
}

#[test]
fn provisioned_layer_draws_and_unprovisioned_layer_is_not_ready() {
    init_logger();
    let context = recording_context();
    let runtime = CanvasRuntime::default();
    draw_stroke(&runtime, &[(0.0, 0.0), (1.0, 1.0)], true);

    let surface = context.device().surface(100, 100, 0);
    context
        .provision_layer(Layer::Background, surface)
        .expect("provision background");

    assert_eq!(
        context.draw_flush_and_submit(&runtime, Layer::Background, view(100, 100)),
        Ok(DrawResult::submitted(Layer::Background))
    );
    let error = context
        .draw_flush_and_submit(&runtime, Layer::Foreground, view(100, 100))
        .expect_err("foreground was never provisioned");
    assert_eq!(
        error,
        DrawSubmitError::LayerNotReady {
            layer: Layer::Foreground,
            state: LayerState::Unprovisioned,
        }
    );
    assert_eq!(error.layer(), Layer::Foreground);
    assert_eq!(context.device().submissions().len(), 1);
}

#[test]
fn zero_size_view_is_successful_no_op_on_bound_layer_only() {
    let context = recording_context();
    let runtime = CanvasRuntime::default();
    assert!(matches!(
        context.draw_flush_and_submit(&runtime, Layer::Foreground, view(0, 0)),
        Err(DrawSubmitError::LayerNotReady { .. })
    ));

    let surface = context.device().surface(10, 10, 0);
    context
        .provision_layer(Layer::Foreground, surface)
        .expect("provision");
    for empty in [view(0, 10), view(10, 0)] {
        assert_eq!(
            context.draw_flush_and_submit(&runtime, Layer::Foreground, empty),
            Ok(DrawResult::no_op(Layer::Foreground))
        );
    }
    assert!(context.device().submissions().is_empty());
    assert_eq!(
        context.layer_status(Layer::Foreground).total_frames_submitted,
        0
    );
}

#[test]
fn submission_rescales_strokes_to_view_size() {
    let context = recording_context();
    let runtime = CanvasRuntime::default();
    draw_stroke(&runtime, &[(0.5, 0.5)], true);
    let surface = context.device().surface(200, 200, 0);
    context
        .provision_layer(Layer::Foreground, surface)
        .expect("provision");

    context
        .draw_flush_and_submit(&runtime, Layer::Foreground, ViewInfo::new(200, 200, 2.0))
        .expect("draw");

    let submissions = context.device().submissions();
    let polyline = &submissions[0].polylines[0];
    assert_eq!(polyline.points, vec![PixelPoint { x: 100.0, y: 100.0 }]);
    assert_eq!(polyline.paint.width, 4.0);
    assert_eq!(polyline.paint.color, Rgba::BLACK);
}

#[test]
fn reprovisioning_reuses_pipeline_unless_format_changes() {
    let context = recording_context();
    let first = context.device().surface(10, 10, 1);
    let resized = context.device().surface(20, 20, 1);
    let reformatted = context.device().surface(20, 20, 2);

    context
        .provision_layer(Layer::Background, first)
        .expect("provision");
    context
        .reload_surface(Layer::Background, resized)
        .expect("reload");
    assert_eq!(
        context.device().compiled_pipelines(),
        vec![CompiledPipeline {
            layer: Layer::Background,
            format: 1,
        }]
    );

    context
        .reload_surface(Layer::Background, reformatted)
        .expect("reload with new format");
    assert_eq!(context.device().compiled_pipelines().len(), 2);
    assert_eq!(context.device().resources_created().len(), 3);
    assert_eq!(context.layer_status(Layer::Background).surface_generation, 3);
}

#[test]
fn provision_all_binds_every_layer() {
    let context = recording_context();
    let device = context.device();
    context
        .provision_all(
            device.surface(10, 10, 0),
            device.surface(10, 10, 0),
            device.surface(10, 10, 0),
            device.surface(10, 10, 0),
        )
        .expect("provision all");
    assert_eq!(context.bound_layers(), Layer::ALL.to_vec());
}

#[test]
fn failed_provision_all_leaves_previous_bindings_untouched() {
    let context = recording_context();
    let device = context.device();
    context
        .provision_layer(Layer::Background, device.surface(10, 10, 0))
        .expect("provision background");
    let before = context.layer_status(Layer::Background);
    device.fail_pipeline_for(Layer::ForegroundActive);

    let error = context
        .provision_all(
            device.surface(10, 10, 5),
            device.surface(10, 10, 5),
            device.surface(10, 10, 5),
            device.surface(10, 10, 5),
        )
        .expect_err("foreground-active pipeline must fail");

    assert!(matches!(error, ProvisionError::PartialProvisioning { .. }));
    assert_eq!(error.failed_layers(), vec![Layer::ForegroundActive]);
    assert_eq!(context.layer_status(Layer::Background), before);
    assert_eq!(context.bound_layers(), vec![Layer::Background]);
}

#[test]
fn single_layer_compile_failure_is_reported() {
    let context = recording_context();
    context.device().fail_pipeline_for(Layer::Foreground);
    let surface = context.device().surface(10, 10, 0);
    assert!(matches!(
        context.provision_layer(Layer::Foreground, surface),
        Err(ProvisionError::PipelineCompile {
            layer: Layer::Foreground,
            ..
        })
    ));
    assert_eq!(context.layer_state(Layer::Foreground), LayerState::Unprovisioned);
}

#[test]
fn device_lost_is_reported_and_layer_returns_to_idle() {
    let context = recording_context();
    let runtime = CanvasRuntime::default();
    let surface = context.device().surface(10, 10, 0);
    context
        .provision_layer(Layer::Foreground, surface)
        .expect("provision");
    context.device().lose_device();

    let result = context.draw_flush_and_submit(&runtime, Layer::Foreground, view(10, 10));
    assert!(matches!(result, Err(DrawSubmitError::DeviceLost { .. })));

    let status = context.layer_status(Layer::Foreground);
    assert_eq!(status.phase, LayerPhase::Idle);
    assert_eq!(status.state, LayerState::Bound);
    assert_eq!(status.total_frames_submitted, 0);
    assert!(context.device().presented().is_empty());
}

#[test]
fn second_draw_while_encoding_is_layer_busy() {
    let context = recording_context();
    let runtime = CanvasRuntime::default();
    let surface = context.device().surface(10, 10, 0);
    context
        .provision_layer(Layer::ForegroundActive, surface)
        .expect("provision");
    let pause = context.device().pause_next_encoding();

    std::thread::scope(|scope| {
        let first = scope.spawn(|| {
            context.draw_flush_and_submit(&runtime, Layer::ForegroundActive, view(10, 10))
        });
        pause.wait_until_encoding();

        assert_eq!(
            context.layer_status(Layer::ForegroundActive).phase,
            LayerPhase::Encoding
        );
        assert_eq!(
            context.draw_flush_and_submit(&runtime, Layer::ForegroundActive, view(10, 10)),
            Err(DrawSubmitError::LayerBusy {
                layer: Layer::ForegroundActive
            })
        );
        // Other layers are independent of the busy one.
        assert!(matches!(
            context.draw_flush_and_submit(&runtime, Layer::Background, view(10, 10)),
            Err(DrawSubmitError::LayerNotReady { .. })
        ));

        pause.release();
        let first = first.join().expect("draw thread");
        assert_eq!(first, Ok(DrawResult::submitted(Layer::ForegroundActive)));
    });

    assert_eq!(
        context.layer_status(Layer::ForegroundActive).phase,
        LayerPhase::Idle
    );
}

#[test]
fn reprovision_during_encoding_keeps_new_surface() {
    let context = recording_context();
    let runtime = CanvasRuntime::default();
    let old_surface = context.device().surface(10, 10, 0);
    let old_id = old_surface.id();
    context
        .provision_layer(Layer::Foreground, old_surface)
        .expect("provision");
    let pause = context.device().pause_next_encoding();

    std::thread::scope(|scope| {
        let draw = scope
            .spawn(|| context.draw_flush_and_submit(&runtime, Layer::Foreground, view(10, 10)));
        pause.wait_until_encoding();
        let new_surface = context.device().surface(20, 20, 0);
        context
            .reload_surface(Layer::Foreground, new_surface)
            .expect("reload while encoding");
        pause.release();
        draw.join().expect("draw thread").expect("draw");
    });

    context
        .draw_flush_and_submit(&runtime, Layer::Foreground, view(20, 20))
        .expect("draw on new surface");
    let surface_ids: Vec<u32> = context
        .device()
        .submissions()
        .iter()
        .map(|submission| submission.surface_id)
        .collect();
    assert_eq!(surface_ids, vec![old_id, old_id + 1]);
}

#[test]
fn stale_drawable_marks_layer_stale_until_reloaded() {
    let context = recording_context();
    let runtime = CanvasRuntime::default();
    let surface = context.device().surface(10, 10, 0);
    let surface_id = surface.id();
    context
        .provision_layer(Layer::Background, surface)
        .expect("provision");
    context
        .device()
        .fail_next_acquire(surface_id, SurfaceError::Outdated);

    assert_eq!(
        context.draw_flush_and_submit(&runtime, Layer::Background, view(10, 10)),
        Err(DrawSubmitError::LayerNotReady {
            layer: Layer::Background,
            state: LayerState::Stale,
        })
    );
    assert_eq!(context.layer_state(Layer::Background), LayerState::Stale);

    let replacement = context.device().surface(10, 10, 0);
    context
        .reload_surface(Layer::Background, replacement)
        .expect("reload");
    assert!(
        context
            .draw_flush_and_submit(&runtime, Layer::Background, view(10, 10))
            .is_ok()
    );
}

#[test]
fn transient_drawable_failure_keeps_layer_bound() {
    let context = recording_context();
    let runtime = CanvasRuntime::default();
    let surface = context.device().surface(10, 10, 0);
    let surface_id = surface.id();
    context
        .provision_layer(Layer::Background, surface)
        .expect("provision");
    context
        .device()
        .fail_next_acquire(surface_id, SurfaceError::Timeout);

    assert_eq!(
        context.draw_flush_and_submit(&runtime, Layer::Background, view(10, 10)),
        Err(DrawSubmitError::Surface {
            layer: Layer::Background,
            source: SurfaceError::Timeout,
        })
    );
    assert_eq!(context.layer_state(Layer::Background), LayerState::Bound);
    assert!(
        context
            .draw_flush_and_submit(&runtime, Layer::Background, view(10, 10))
            .is_ok()
    );
}

#[test]
fn invalidated_layer_must_be_reprovisioned() {
    let context = recording_context();
    let runtime = CanvasRuntime::default();
    assert!(!context.invalidate_layer(Layer::Foreground));

    let surface = context.device().surface(10, 10, 0);
    context
        .provision_layer(Layer::Foreground, surface)
        .expect("provision");
    assert!(context.invalidate_layer(Layer::Foreground));
    assert!(matches!(
        context.draw_flush_and_submit(&runtime, Layer::Foreground, view(10, 10)),
        Err(DrawSubmitError::LayerNotReady {
            state: LayerState::Stale,
            ..
        })
    ));

    let surface = context.device().surface(10, 10, 0);
    context
        .provision_layer(Layer::Foreground, surface)
        .expect("reprovision");
    assert_eq!(context.device().compiled_pipelines().len(), 1);
}

#[test]
fn active_and_committed_layers_receive_routed_strokes() {
    let context = recording_context();
    let device = context.device();
    context
        .provision_all(
            device.surface(100, 100, 0),
            device.surface(100, 100, 0),
            device.surface(100, 100, 0),
            device.surface(100, 100, 0),
        )
        .expect("provision all");

    let runtime = CanvasRuntime::default();
    runtime
        .pen_state()
        .set_active_pen(Pen {
            placement: CanvasPlacement::Background,
            ..Pen::default()
        })
        .expect("highlighter");
    draw_stroke(&runtime, &[(0.1, 0.1)], true);
    runtime
        .pen_state()
        .set_active_pen(Pen::default())
        .expect("pen");
    draw_stroke(&runtime, &[(0.2, 0.2)], true);
    draw_stroke(&runtime, &[(0.3, 0.3), (0.4, 0.4)], false);

    for layer in Layer::ALL {
        context
            .draw_flush_and_submit(&runtime, layer, view(100, 100))
            .expect("draw");
    }

    let counts: Vec<(Layer, usize)> = device
        .submissions()
        .iter()
        .map(|submission| (submission.layer, submission.polylines.len()))
        .collect();
    assert_eq!(
        counts,
        vec![
            (Layer::Background, 1),
            (Layer::BackgroundActive, 0),
            (Layer::Foreground, 1),
            (Layer::ForegroundActive, 1),
        ]
    );
    assert_eq!(device.presented().len(), 4);
    assert_eq!(
        context.layer_status(Layer::ForegroundActive).total_frames_submitted,
        1
    );
}

#[test]
fn init_rejects_missing_device_or_queue() {
    let (device, queue) = RecordingDevice::new();
    assert!(matches!(
        BackendDrawContext::<RecordingDevice>::init(None, Some(queue)),
        Err(BackendInitError::NullDevice)
    ));
    assert!(matches!(
        BackendDrawContext::init(Some(device), None),
        Err(BackendInitError::NullQueue)
    ));
    let (device, queue) = RecordingDevice::new();
    assert!(BackendDrawContext::init(Some(device), Some(queue)).is_ok());
}

fn create_device_queue() -> Option<(wgpu::Device, wgpu::Queue)> {
    pollster::block_on(async {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok()?;
        adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("renderer.test_device"),
                required_features: wgpu::Features::empty(),
                required_limits: adapter.limits(),
                experimental_features: wgpu::ExperimentalFeatures::disabled(),
                memory_hints: wgpu::MemoryHints::Performance,
                trace: wgpu::Trace::Off,
            })
            .await
            .ok()
    })
}

fn read_rgba8_pixel(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    x: u32,
    y: u32,
) -> [u8; 4] {
    // Texture-to-buffer copies need 256-byte aligned rows.
    let padded_bytes_per_row = (texture.width() * 4).div_ceil(256) * 256;
    let readback = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("renderer.test.readback"),
        size: u64::from(padded_bytes_per_row) * u64::from(texture.height()),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("renderer.test.readback_encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &readback,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_bytes_per_row),
                rows_per_image: Some(texture.height()),
            },
        },
        texture.size(),
    );
    queue.submit(Some(encoder.finish()));

    let (sender, receiver) = std::sync::mpsc::channel();
    readback
        .slice(..)
        .map_async(wgpu::MapMode::Read, move |result| {
            sender.send(result).expect("send map result");
        });
    device
        .poll(wgpu::PollType::wait_indefinitely())
        .expect("device poll must succeed for readback mapping");
    receiver
        .recv()
        .expect("receive map result")
        .expect("map readback buffer");
    let mapped = readback.slice(..).get_mapped_range();
    let offset = (y * padded_bytes_per_row + x * 4) as usize;
    let pixel = [
        mapped[offset],
        mapped[offset + 1],
        mapped[offset + 2],
        mapped[offset + 3],
    ];
    drop(mapped);
    readback.unmap();
    pixel
}

#[test]
fn wgpu_backend_renders_stroke_into_texture_layer() {
    init_logger();
    let Some((device, queue)) = create_device_queue() else {
        eprintln!("[renderer] no wgpu adapter available, skipping");
        return;
    };
    let texture_surface =
        TextureLayerSurface::create(&device, 64, 64, wgpu::TextureFormat::Rgba8Unorm);
    let texture = texture_surface.texture().clone();
    let (wgpu_device, wgpu_queue) = WgpuDevice::new(device.clone(), queue.clone());
    let context = BackendDrawContext::new(wgpu_device, wgpu_queue);
    context
        .provision_layer(Layer::Foreground, texture_surface.into())
        .expect("provision texture layer");

    let runtime = CanvasRuntime::default();
    runtime
        .pen_state()
        .set_active_pen(Pen {
            size: 6.0,
            ..Pen::default()
        })
        .expect("pen");
    draw_stroke(&runtime, &[(0.25, 0.5), (0.75, 0.5)], true);

    assert_eq!(
        context.draw_flush_and_submit(&runtime, Layer::Foreground, view(64, 64)),
        Ok(DrawResult::submitted(Layer::Foreground))
    );
    assert_eq!(read_rgba8_pixel(&device, &queue, &texture, 32, 32), [0, 0, 0, 255]);
    assert_eq!(read_rgba8_pixel(&device, &queue, &texture, 4, 4)[3], 0);
    assert!(!context.device().is_lost());
}
