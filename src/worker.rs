use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::hid::{execute_all, PointerSink};
use crate::pipeline::{FrameReport, GesturePipeline};
use crate::settings::SharedSettings;
use crate::source::{LandmarkSource, Poll};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub target_fps: f32,
    /// Espera cuando la fuente no tiene frame o falla
    pub idle_poll_ms: u64,
    /// Eventos pendientes de leer; con el canal lleno se descartan los nuevos
    pub event_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            target_fps: 60.0,
            idle_poll_ms: 5,
            event_capacity: 256,
        }
    }
}

impl WorkerConfig {
    fn frame_budget(&self) -> Duration {
        Duration::try_from_secs_f32(1.0 / self.target_fps).unwrap_or(Duration::ZERO)
    }
}

/// Eventos que el worker publica hacia el hilo interactivo
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Frame(FrameReport),
    MovementToggled { enabled: bool },
    /// La fuente terminó; el worker se detiene solo
    SourceExhausted,
}

/// Contadores de la sesión del worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub frames: u64,
    pub source_errors: u64,
    pub sink_errors: u64,
    /// Eventos descartados porque nadie vaciaba el canal
    pub dropped_events: u64,
}

/// Hilo dedicado que consulta la fuente, ejecuta el pipeline y aplica los comandos al sink
pub struct TrackingWorker<S> {
    stop_tx: Option<Sender<()>>,
    events: Receiver<WorkerEvent>,
    handle: Option<JoinHandle<(S, WorkerStats)>>,
}

impl<S: PointerSink + Send + 'static> TrackingWorker<S> {
    pub fn spawn<L>(
        mut pipeline: GesturePipeline,
        mut source: L,
        mut sink: S,
        settings: SharedSettings,
        config: WorkerConfig,
    ) -> std::io::Result<Self>
    where
        L: LandmarkSource + Send + 'static,
    {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let (event_tx, events) = bounded::<WorkerEvent>(config.event_capacity.max(1));

        let handle = thread::Builder::new()
            .name("quirocursor-tracking".into())
            .spawn(move || {
                let stats = run_loop(&mut pipeline, &mut source, &mut sink, &settings, config, &stop_rx, &event_tx);
                (sink, stats)
            })?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            events,
            handle: Some(handle),
        })
    }

    /// Canal de eventos (informes por frame, toggles, fin de fuente)
    pub fn events(&self) -> &Receiver<WorkerEvent> {
        &self.events
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Detiene el hilo y devuelve el sink. La segunda llamada devuelve `None`.
    pub fn stop(&mut self) -> Option<(S, WorkerStats)> {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.try_send(());
        }
        self.join()
    }

    /// Espera a que el hilo termine por sí solo (fuente agotada)
    pub fn wait(mut self) -> Option<(S, WorkerStats)> {
        let result = self.join();
        self.stop_tx = None;
        result
    }

    fn join(&mut self) -> Option<(S, WorkerStats)> {
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(result) => Some(result),
            Err(_) => {
                warn!("❌ El hilo de seguimiento terminó con panic");
                None
            }
        }
    }
}

impl<S> Drop for TrackingWorker<S> {
    fn drop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.try_send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn should_stop(stop_rx: &Receiver<()>) -> bool {
    match stop_rx.try_recv() {
        Ok(()) | Err(TryRecvError::Disconnected) => true,
        Err(TryRecvError::Empty) => false,
    }
}

fn publish(event_tx: &Sender<WorkerEvent>, event: WorkerEvent, stats: &mut WorkerStats) {
    match event_tx.try_send(event) {
        Ok(()) | Err(TrySendError::Disconnected(_)) => {}
        Err(TrySendError::Full(_)) => {
            stats.dropped_events += 1;
            if stats.dropped_events == 1 {
                debug!("Canal de eventos lleno, se descartan eventos");
            }
        }
    }
}

fn run_loop<L: LandmarkSource, S: PointerSink>(
    pipeline: &mut GesturePipeline,
    source: &mut L,
    sink: &mut S,
    settings: &SharedSettings,
    config: WorkerConfig,
    stop_rx: &Receiver<()>,
    event_tx: &Sender<WorkerEvent>,
) -> WorkerStats {
    let frame_budget = config.frame_budget();
    let idle = Duration::from_millis(config.idle_poll_ms);
    let mut stats = WorkerStats::default();

    pipeline.start();

    while !should_stop(stop_rx) {
        let started = Instant::now();

        match source.poll() {
            Ok(Poll::Frame(frame)) => {
                let snapshot = settings.snapshot();
                let report = pipeline.process(&frame, &snapshot, started);
                stats.frames += 1;
                stats.sink_errors += execute_all(sink, &report.commands) as u64;

                if report.movement_toggled {
                    let enabled = settings.update(|s| s.toggle_movement());
                    info!("🔁 Movimiento {}", if enabled { "activado" } else { "desactivado" });
                    publish(event_tx, WorkerEvent::MovementToggled { enabled }, &mut stats);
                }
                publish(event_tx, WorkerEvent::Frame(report), &mut stats);

                // Limitar a target_fps
                let elapsed = started.elapsed();
                if elapsed < frame_budget {
                    thread::sleep(frame_budget - elapsed);
                }
            }
            Ok(Poll::Pending) => thread::sleep(idle),
            Ok(Poll::Exhausted) => {
                info!("🏁 Fuente agotada tras {} frames", stats.frames);
                publish(event_tx, WorkerEvent::SourceExhausted, &mut stats);
                break;
            }
            Err(e) => {
                stats.source_errors += 1;
                if stats.source_errors == 1 || stats.source_errors % 100 == 0 {
                    warn!("⚠️  Error leyendo la fuente ({} en total): {}", stats.source_errors, e);
                }
                thread::sleep(idle);
            }
        }
    }

    let release = pipeline.stop();
    stats.sink_errors += execute_all(sink, &release) as u64;
    debug!("Worker detenido: {:?}", stats);
    stats
}
