use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::actions::{GestureAction, GestureActionMap};
use crate::dispatcher::ActionDispatcher;
use crate::gesture_classifier::{Classification, CursorPoint, GestureClassifier};
use crate::hid::PointerCommand;
use crate::mouse_filter::{MotionMapper, MotionSample};
use crate::settings::Settings;
use crate::types::{CursorFingerMode, GestureLabel, HandFrame};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Frames seguidos sin mano tolerados antes de reiniciar el estado de movimiento
    pub hand_loss_grace_frames: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            hand_loss_grace_frames: 5,
        }
    }
}

/// Lo ocurrido en un frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub classification: Classification,
    pub cursor_finger: CursorFingerMode,
    pub cursor: Option<CursorPoint>,
    /// Posición de salida si el cursor se mapeó en este frame
    pub target: Option<(i32, i32)>,
    pub motion: Option<MotionSample>,
    /// Comandos a ejecutar sobre el sink, en orden
    pub commands: Vec<PointerCommand>,
    /// Se completó el doble gesto de alternar movimiento
    pub movement_toggled: bool,
}

impl FrameReport {
    pub fn label(&self) -> GestureLabel {
        self.classification.label
    }
}

/// Clasificador + mapeo + dispatcher para un frame a la vez.
/// No toca dispositivos: devuelve los comandos en el `FrameReport`.
pub struct GesturePipeline {
    classifier: GestureClassifier,
    mapper: MotionMapper,
    dispatcher: ActionDispatcher,
    actions: GestureActionMap,
    config: PipelineConfig,
    missed_frames: u32,
    last_label: GestureLabel,
}

impl GesturePipeline {
    pub fn new(
        classifier: GestureClassifier,
        mapper: MotionMapper,
        dispatcher: ActionDispatcher,
        actions: GestureActionMap,
        config: PipelineConfig,
    ) -> Self {
        Self {
            classifier,
            mapper,
            dispatcher,
            actions,
            config,
            missed_frames: 0,
            last_label: GestureLabel::NoHand,
        }
    }

    pub fn classifier(&self) -> &GestureClassifier {
        &self.classifier
    }

    pub fn mapper(&self) -> &MotionMapper {
        &self.mapper
    }

    pub fn dispatcher(&self) -> &ActionDispatcher {
        &self.dispatcher
    }

    pub fn actions(&self) -> &GestureActionMap {
        &self.actions
    }

    pub fn set_actions(&mut self, actions: GestureActionMap) {
        self.actions = actions;
    }

    fn reset_session(&mut self) {
        self.classifier.reset();
        self.mapper.reset();
        self.dispatcher.reset();
        self.missed_frames = 0;
        self.last_label = GestureLabel::NoHand;
    }

    /// Empieza una sesión de seguimiento limpia
    pub fn start(&mut self) {
        self.reset_session();
        info!("▶️  Seguimiento iniciado");
    }

    /// Termina la sesión. Devuelve `MouseUp` si había un arrastre en curso. Idempotente.
    pub fn stop(&mut self) -> Vec<PointerCommand> {
        let commands: Vec<_> = self.dispatcher.release().into_iter().collect();
        self.reset_session();
        if !commands.is_empty() {
            info!("⏹️  Seguimiento detenido, botón liberado");
        }
        commands
    }

    pub fn process(&mut self, frame: &HandFrame, settings: &Settings, now: Instant) -> FrameReport {
        let classification = self.classifier.classify(&frame.landmarks);
        let label = classification.label;
        let mut commands = Vec::new();

        if label.is_signal_lost() {
            commands.extend(self.dispatcher.update_pinch(false, now));
            self.register_miss();
            self.last_label = label;
            return FrameReport {
                classification,
                cursor_finger: self.classifier.cursor_finger(),
                cursor: None,
                target: None,
                motion: None,
                commands,
                movement_toggled: false,
            };
        }
        self.missed_frames = 0;

        let cursor = self.classifier.cursor_point(&frame.landmarks);
        let motion = match cursor {
            Some(point) if point.valid => {
                self.mapper
                    .map_with_sample((point.x, point.y), (frame.width, frame.height), settings)
            }
            _ => None,
        };
        if let Some(sample) = motion {
            let (x, y) = sample.output;
            commands.push(PointerCommand::MoveTo { x, y });
        }

        let entered = label != self.last_label;
        let mut movement_toggled = false;
        let action = self.actions.get(label).clone();
        match &action {
            // el gesto asignado a click_hold hace de pinch
            GestureAction::ClickHold => {
                let holding = label != GestureLabel::Pinch || classification.pinch_active;
                commands.extend(self.dispatcher.update_pinch(holding, now));
            }
            GestureAction::ToggleMovement => {
                commands.extend(self.dispatcher.update_pinch(false, now));
                if entered && self.dispatcher.register_toggle(now) {
                    movement_toggled = true;
                    debug!("🔁 Doble {} detectado", label);
                }
            }
            discrete if discrete.is_discrete() => {
                commands.extend(self.dispatcher.update_pinch(false, now));
                commands.extend(self.dispatcher.request_action(discrete, now));
            }
            _ => commands.extend(self.dispatcher.update_pinch(false, now)),
        }

        if entered {
            debug!("Gesto: {} -> {} ({})", self.last_label, label, action);
        }
        self.last_label = label;

        FrameReport {
            classification,
            cursor_finger: self.classifier.cursor_finger(),
            cursor,
            target: motion.map(|sample| sample.output),
            motion,
            commands,
            movement_toggled,
        }
    }

    fn register_miss(&mut self) {
        self.missed_frames = self.missed_frames.saturating_add(1);
        if self.missed_frames > self.config.hand_loss_grace_frames && self.mapper.state().is_seeded() {
            self.mapper.reset();
            debug!("🤚 Mano perdida {} frames, movimiento reiniciado", self.missed_frames);
        }
    }
}

impl Default for GesturePipeline {
    fn default() -> Self {
        Self::new(
            GestureClassifier::default(),
            MotionMapper::default(),
            ActionDispatcher::default(),
            GestureActionMap::default(),
            PipelineConfig::default(),
        )
    }
}
