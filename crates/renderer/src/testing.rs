//! In-memory device for exercising the draw pipeline without a GPU.
//!
//! Every surface created through [`RecordingDevice::surface`] shares the
//! device journal, so tests can inspect compilations, submissions and
//! presents after the surfaces have been moved into a draw context.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Barrier, Mutex, MutexGuard};

use canvas_protocol::{Layer, PixelPoint, ViewInfo};
use canvas_runtime::{RasterTarget, RecordedPolyline, StrokePaint};

use crate::device::{
    CommandQueue, DeviceError, GraphicsDevice, LayerSurface, PipelineError, SurfaceError,
};

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSubmission {
    pub layer: Layer,
    pub surface_id: u32,
    pub view: ViewInfo,
    pub polylines: Vec<RecordedPolyline>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompiledPipeline {
    pub layer: Layer,
    pub format: u32,
}

/// Pauses the next encoding until released, so a test can act while a layer
/// is mid-frame.
#[derive(Clone)]
pub struct EncodingPause {
    entered: Arc<Barrier>,
    release: Arc<Barrier>,
}

impl EncodingPause {
    pub fn wait_until_encoding(&self) {
        self.entered.wait();
    }

    pub fn release(&self) {
        self.release.wait();
    }
}

#[derive(Default)]
struct Journal {
    next_surface_id: u32,
    compiled: Vec<CompiledPipeline>,
    resources_created: Vec<(Layer, u32)>,
    submissions: Vec<RecordedSubmission>,
    presented: Vec<u32>,
    device_lost: bool,
    failing_layers: HashSet<Layer>,
    acquire_failures: HashMap<u32, SurfaceError>,
    pause: Option<EncodingPause>,
}

type SharedJournal = Arc<Mutex<Journal>>;

fn lock(journal: &SharedJournal) -> MutexGuard<'_, Journal> {
    journal
        .lock()
        .unwrap_or_else(|_| panic!("recording journal lock poisoned"))
}

pub struct RecordingDevice {
    journal: SharedJournal,
}

pub struct RecordingQueue {
    journal: SharedJournal,
}

impl RecordingDevice {
    pub fn new() -> (Self, RecordingQueue) {
        let journal = SharedJournal::default();
        (
            Self {
                journal: Arc::clone(&journal),
            },
            RecordingQueue { journal },
        )
    }

    /// A surface of the given size. Surfaces with different `format` values
    /// cannot share a pipeline.
    pub fn surface(&self, width: u32, height: u32, format: u32) -> RecordingSurface {
        let mut journal = lock(&self.journal);
        journal.next_surface_id += 1;
        RecordingSurface {
            id: journal.next_surface_id,
            width,
            height,
            format,
            frames_acquired: 0,
            journal: Arc::clone(&self.journal),
        }
    }

    pub fn lose_device(&self) {
        lock(&self.journal).device_lost = true;
    }

    pub fn fail_pipeline_for(&self, layer: Layer) {
        lock(&self.journal).failing_layers.insert(layer);
    }

    pub fn fail_next_acquire(&self, surface_id: u32, error: SurfaceError) {
        lock(&self.journal).acquire_failures.insert(surface_id, error);
    }

    pub fn pause_next_encoding(&self) -> EncodingPause {
        let pause = EncodingPause {
            entered: Arc::new(Barrier::new(2)),
            release: Arc::new(Barrier::new(2)),
        };
        lock(&self.journal).pause = Some(pause.clone());
        pause
    }

    pub fn compiled_pipelines(&self) -> Vec<CompiledPipeline> {
        lock(&self.journal).compiled.clone()
    }

    pub fn resources_created(&self) -> Vec<(Layer, u32)> {
        lock(&self.journal).resources_created.clone()
    }

    pub fn submissions(&self) -> Vec<RecordedSubmission> {
        lock(&self.journal).submissions.clone()
    }

    pub fn presented(&self) -> Vec<u32> {
        lock(&self.journal).presented.clone()
    }
}

pub struct RecordingSurface {
    id: u32,
    width: u32,
    height: u32,
    format: u32,
    frames_acquired: u64,
    journal: SharedJournal,
}

impl RecordingSurface {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingDrawable {
    pub surface_id: u32,
    pub frame: u64,
}

impl LayerSurface for RecordingSurface {
    type Drawable = RecordingDrawable;

    fn acquire_drawable(&mut self) -> Result<RecordingDrawable, SurfaceError> {
        if let Some(error) = lock(&self.journal).acquire_failures.remove(&self.id) {
            return Err(error);
        }
        self.frames_acquired += 1;
        Ok(RecordingDrawable {
            surface_id: self.id,
            frame: self.frames_acquired,
        })
    }

    fn present(&mut self, drawable: RecordingDrawable) {
        lock(&self.journal).presented.push(drawable.surface_id);
    }
}

#[derive(Debug)]
pub struct RecordingPipeline {
    pub layer: Layer,
    pub format: u32,
}

#[derive(Debug)]
pub struct RecordingResources {
    pub surface_id: u32,
    pub size: (u32, u32),
}

pub struct RecordingEncoder {
    submission: RecordedSubmission,
}

impl RasterTarget for RecordingEncoder {
    fn draw_polyline(&mut self, points: &[PixelPoint], paint: &StrokePaint) {
        self.submission.polylines.draw_polyline(points, paint);
    }
}

impl CommandQueue for RecordingQueue {
    type CommandBuffer = RecordedSubmission;

    fn submit(&self, command_buffer: RecordedSubmission) -> Result<(), DeviceError> {
        let mut journal = lock(&self.journal);
        if journal.device_lost {
            return Err(DeviceError::Lost {
                reason: "recording device lost".to_owned(),
            });
        }
        journal.submissions.push(command_buffer);
        Ok(())
    }
}

impl GraphicsDevice for RecordingDevice {
    type Surface = RecordingSurface;
    type Pipeline = RecordingPipeline;
    type SurfaceResources = RecordingResources;
    type Encoder = RecordingEncoder;
    type CommandBuffer = RecordedSubmission;
    type Queue = RecordingQueue;

    fn compile_pipeline(
        &self,
        layer: Layer,
        surface: &RecordingSurface,
    ) -> Result<RecordingPipeline, PipelineError> {
        let mut journal = lock(&self.journal);
        if journal.failing_layers.contains(&layer) {
            return Err(PipelineError {
                reason: format!("{layer} pipeline rejected by recording device"),
            });
        }
        journal.compiled.push(CompiledPipeline {
            layer,
            format: surface.format,
        });
        Ok(RecordingPipeline {
            layer,
            format: surface.format,
        })
    }

    fn pipeline_matches(&self, pipeline: &RecordingPipeline, surface: &RecordingSurface) -> bool {
        pipeline.format == surface.format
    }

    fn create_surface_resources(
        &self,
        layer: Layer,
        _pipeline: &RecordingPipeline,
        surface: &RecordingSurface,
    ) -> RecordingResources {
        lock(&self.journal)
            .resources_created
            .push((layer, surface.id));
        RecordingResources {
            surface_id: surface.id,
            size: surface.size(),
        }
    }

    fn begin_encoding(
        &self,
        layer: Layer,
        resources: &mut RecordingResources,
        _drawable: &RecordingDrawable,
        view: ViewInfo,
    ) -> RecordingEncoder {
        let pause = lock(&self.journal).pause.take();
        if let Some(pause) = pause {
            pause.entered.wait();
            pause.release.wait();
        }
        RecordingEncoder {
            submission: RecordedSubmission {
                layer,
                surface_id: resources.surface_id,
                view,
                polylines: Vec::new(),
            },
        }
    }

    fn finish_encoding(
        &self,
        _pipeline: &RecordingPipeline,
        _resources: &RecordingResources,
        encoder: RecordingEncoder,
    ) -> RecordedSubmission {
        encoder.submission
    }
}
