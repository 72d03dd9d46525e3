//! Frame-paced rendering on a dedicated thread.
//!
//! Ticks arrive on a bounded channel. A tick that finds the channel full is
//! dropped: the next tick draws the latest canvas state anyway. The thread
//! exits once the tick sender is gone.

use std::sync::Arc;
use std::thread::JoinHandle;

use canvas_protocol::{CanvasHandle, ViewInfo};
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use renderer::GraphicsDevice;

use crate::{CanvasCore, CanvasCoreError, FrameReport};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTick {
    pub handle: CanvasHandle,
    pub view: ViewInfo,
}

pub type FrameOutcome = Result<FrameReport, CanvasCoreError>;

pub struct RenderThread {
    tick_sender: Option<Sender<FrameTick>>,
    report_receiver: Receiver<FrameOutcome>,
    join_handle: Option<JoinHandle<()>>,
}

impl RenderThread {
    pub fn spawn<D>(core: Arc<CanvasCore<D>>, channel_capacity: usize) -> Self
    where
        D: GraphicsDevice + 'static,
        CanvasCore<D>: Send + Sync,
    {
        // A zero-capacity channel would make every tick a rendezvous.
        let channel_capacity = channel_capacity.max(1);
        let (tick_sender, tick_receiver) = bounded(channel_capacity);
        let (report_sender, report_receiver) = bounded(channel_capacity);

        let join_handle = std::thread::Builder::new()
            .name("canvas_render".to_owned())
            .spawn(move || render_loop(core, tick_receiver, report_sender))
            .expect("spawn canvas render thread");
        log::info!("[render] thread started");

        Self {
            tick_sender: Some(tick_sender),
            report_receiver,
            join_handle: Some(join_handle),
        }
    }

    /// Queues a frame. Returns false when the tick was dropped because the
    /// thread is still behind on earlier ticks or has stopped.
    pub fn tick(&self, tick: FrameTick) -> bool {
        let Some(sender) = self.tick_sender.as_ref() else {
            return false;
        };
        match sender.try_send(tick) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::trace!("[render] tick dropped, thread busy");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                log::error!("[render] tick dropped, render thread is gone");
                false
            }
        }
    }

    pub fn reports(&self) -> &Receiver<FrameOutcome> {
        &self.report_receiver
    }

    /// Closes the tick channel and waits for in-flight frames to finish.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        drop(self.tick_sender.take());
        if let Some(join_handle) = self.join_handle.take() {
            if join_handle.join().is_err() {
                log::error!("[render] render thread panicked");
            }
            log::info!("[render] thread stopped");
        }
    }
}

impl Drop for RenderThread {
    fn drop(&mut self) {
        self.stop();
    }
}

fn render_loop<D: GraphicsDevice>(
    core: Arc<CanvasCore<D>>,
    ticks: Receiver<FrameTick>,
    reports: Sender<FrameOutcome>,
) {
    for tick in ticks.iter() {
        let outcome = core.draw_frame(tick.handle, tick.view);
        if let Err(error) = &outcome {
            log::warn!("[render] frame for {:?} failed: {error}", tick.handle);
        }
        match reports.try_send(outcome) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => log::trace!("[render] report dropped, reader behind"),
            Err(TrySendError::Disconnected(_)) => return,
        }
    }
    log::debug!("[render] tick channel closed");
}
