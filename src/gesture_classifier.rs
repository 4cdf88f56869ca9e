use crate::gesture_buffer::StabilityWindow;
use crate::types::{
    CursorFingerMode, GestureLabel, Landmark, NUM_LANDMARKS, PIP_IDS, THUMB_IP, THUMB_TIP,
    TIP_IDS, WRIST,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug, PartialEq)]
pub enum ClassifierError {
    #[error("Landmark {index} con coordenadas no finitas ({x}, {y})")]
    NonFiniteCoordinate { index: usize, x: f32, y: f32 },

    #[error("Landmark fuera de orden: posición {position} tiene id {id}")]
    OutOfOrder { position: usize, id: usize },
}

/// Umbrales del clasificador. Son valores por defecto ajustables, no invariantes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Distancia máxima (px) entre punta del pulgar e índice para considerar pinch
    pub pinch_threshold_px: f32,
    /// Tamaño de la ventana de anti-rebote
    pub stability_window: usize,
    /// Positivos exigidos dentro de la ventana (por defecto K-1)
    pub stability_min_true: Option<usize>,
    /// Longitud mínima punta-MCP (px) para aceptar el dedo cursor
    pub cursor_min_length_px: f32,
    /// Longitud de referencia (px) para la estabilidad por longitud
    pub cursor_reference_length_px: f32,
    /// Estabilidad mínima del dedo cursor
    pub cursor_min_stability: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            pinch_threshold_px: 40.0,
            stability_window: 3,
            stability_min_true: None,
            cursor_min_length_px: 20.0,
            cursor_reference_length_px: 80.0,
            cursor_min_stability: 0.4,
        }
    }
}

/// Resultado de clasificar un frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub label: GestureLabel,
    pub pinch_active: bool,
    /// Distancia pulgar-índice en px (infinita si no se pudo medir)
    pub pinch_distance: f32,
    /// [pulgar, índice, medio, anular, meñique]
    pub fingers_up: [bool; 5],
}

impl Classification {
    fn without_hand(label: GestureLabel) -> Self {
        Self {
            label,
            pinch_active: false,
            pinch_distance: f32::INFINITY,
            fingers_up: [false; 5],
        }
    }

    pub fn no_hand() -> Self {
        Self::without_hand(GestureLabel::NoHand)
    }

    pub fn error() -> Self {
        Self::without_hand(GestureLabel::Error)
    }

    pub fn fingers_extended(&self) -> usize {
        self.fingers_up.iter().filter(|&&up| up).count()
    }
}

/// Posición del dedo cursor y cuán fiable es
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorPoint {
    pub x: f32,
    pub y: f32,
    pub finger: CursorFingerMode,
    pub stability: f32,
    pub valid: bool,
}

/// Clasificador por reglas sobre los 21 landmarks, con anti-rebote del pinch
pub struct GestureClassifier {
    config: ClassifierConfig,
    pinch_window: StabilityWindow,
    cursor_finger: CursorFingerMode,
}

impl GestureClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        let pinch_window = match config.stability_min_true {
            Some(min_true) => StabilityWindow::with_min_true(config.stability_window, min_true),
            None => StabilityWindow::new(config.stability_window),
        };

        Self {
            config,
            pinch_window,
            cursor_finger: CursorFingerMode::Index,
        }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Dedo que controla el cursor actualmente
    pub fn cursor_finger(&self) -> CursorFingerMode {
        self.cursor_finger
    }

    pub fn set_cursor_finger(&mut self, finger: CursorFingerMode) {
        if self.cursor_finger != finger {
            debug!("Dedo cursor: {} -> {}", self.cursor_finger.as_str(), finger.as_str());
            self.cursor_finger = finger;
        }
    }

    /// Vuelve al estado inicial de sesión
    pub fn reset(&mut self) {
        self.pinch_window.clear();
        self.cursor_finger = CursorFingerMode::Index;
    }

    /// Clasifica un frame. Nunca falla: los problemas degradan a `no_hand` / `error`.
    pub fn classify(&mut self, landmarks: &[Landmark]) -> Classification {
        if landmarks.len() != NUM_LANDMARKS {
            return Classification::no_hand();
        }

        match self.try_classify(landmarks) {
            Ok(classification) => classification,
            Err(e) => {
                warn!("❌ Error clasificando gesto: {}", e);
                Classification::error()
            }
        }
    }

    fn try_classify(&mut self, landmarks: &[Landmark]) -> Result<Classification, ClassifierError> {
        validate_landmarks(landmarks)?;

        let fingers_up = fingers_extended(landmarks);
        let total = fingers_up.iter().filter(|&&up| up).count();
        let (pinch_active, pinch_distance) = self.detect_pinch(landmarks);

        let label = if pinch_active {
            // El índice participa en el pinch: el cursor pasa al meñique
            self.set_cursor_finger(CursorFingerMode::Pinky);
            GestureLabel::Pinch
        } else if self.is_point(&fingers_up) {
            self.set_cursor_finger(CursorFingerMode::Index);
            GestureLabel::Point
        } else if fingers_up[1] && fingers_up[2] && !fingers_up[3] && !fingers_up[4] {
            GestureLabel::Peace
        } else if total <= 1 {
            GestureLabel::Fist
        } else if total >= 4 {
            GestureLabel::OpenHand
        } else {
            GestureLabel::Other
        };

        Ok(Classification {
            label,
            pinch_active,
            pinch_distance,
            fingers_up,
        })
    }

    /// Dedo cursor arriba y el resto (sin contar el pulgar) doblados
    fn is_point(&self, fingers_up: &[bool; 5]) -> bool {
        let cursor_idx = self.cursor_finger.finger_index();
        fingers_up[cursor_idx]
            && (1..5)
                .filter(|&i| i != cursor_idx)
                .all(|i| !fingers_up[i])
    }

    /// Pinch pulgar-índice con anti-rebote. Devuelve (estable, distancia).
    fn detect_pinch(&mut self, landmarks: &[Landmark]) -> (bool, f32) {
        let distance = landmarks[THUMB_TIP].distance_to(&landmarks[TIP_IDS[1]]);
        self.pinch_window.push(distance < self.config.pinch_threshold_px);
        (self.pinch_window.is_stable(), distance)
    }

    /// Punta del dedo cursor activo con su estabilidad
    pub fn cursor_point(&self, landmarks: &[Landmark]) -> Option<CursorPoint> {
        if landmarks.len() != NUM_LANDMARKS || validate_landmarks(landmarks).is_err() {
            return None;
        }

        let finger = self.cursor_finger;
        let tip = landmarks[finger.tip_id()];
        let pip = landmarks[finger.pip_id()];
        let mcp = landmarks[finger.mcp_id()];

        let finger_length = tip.distance_to(&mcp);
        let length_stability =
            (finger_length / self.config.cursor_reference_length_px.max(1.0)).min(1.0);
        let extension_stability = if tip.y < pip.y { 1.0 } else { 0.3 };
        let stability = (length_stability + extension_stability) / 2.0;

        let valid = finger_length > self.config.cursor_min_length_px
            && stability > self.config.cursor_min_stability;

        Some(CursorPoint {
            x: tip.x,
            y: tip.y,
            finger,
            stability,
            valid,
        })
    }
}

impl Default for GestureClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

fn validate_landmarks(landmarks: &[Landmark]) -> Result<(), ClassifierError> {
    for (position, lm) in landmarks.iter().enumerate() {
        if lm.id != position {
            return Err(ClassifierError::OutOfOrder {
                position,
                id: lm.id,
            });
        }
        if !lm.is_finite() {
            return Err(ClassifierError::NonFiniteCoordinate {
                index: position,
                x: lm.x,
                y: lm.y,
            });
        }
    }
    Ok(())
}

/// Dedos extendidos [pulgar, índice, medio, anular, meñique].
/// Supone la mano vertical con y creciendo hacia abajo; una mano girada se clasifica mal.
pub fn fingers_extended(landmarks: &[Landmark]) -> [bool; 5] {
    let mut up = [false; 5];
    if landmarks.len() < NUM_LANDMARKS {
        return up;
    }

    let wrist = landmarks[WRIST];
    up[0] = landmarks[THUMB_TIP].distance_to(&wrist) > landmarks[THUMB_IP].distance_to(&wrist);

    for finger in 1..5 {
        up[finger] = landmarks[TIP_IDS[finger]].y < landmarks[PIP_IDS[finger]].y;
    }
    up
}
