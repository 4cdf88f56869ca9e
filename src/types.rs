use serde::{Deserialize, Serialize};
use std::fmt;

/// Número de landmarks que entrega el detector por mano
pub const NUM_LANDMARKS: usize = 21;

pub const WRIST: usize = 0;
pub const THUMB_IP: usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_MCP: usize = 5;
pub const INDEX_PIP: usize = 6;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_PIP: usize = 10;
pub const MIDDLE_TIP: usize = 12;
pub const RING_PIP: usize = 14;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_PIP: usize = 18;
pub const PINKY_TIP: usize = 20;

/// Puntas de dedo: [pulgar, índice, medio, anular, meñique]
pub const TIP_IDS: [usize; 5] = [THUMB_TIP, INDEX_TIP, MIDDLE_TIP, RING_TIP, PINKY_TIP];
/// Articulación de referencia para "dedo arriba" (IP en el pulgar, PIP en el resto)
pub const PIP_IDS: [usize; 5] = [THUMB_IP, INDEX_PIP, MIDDLE_PIP, RING_PIP, PINKY_PIP];

/// Punto clave de la mano en coordenadas de píxel del frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Landmark {
    pub id: usize,
    pub x: f32,
    pub y: f32,
}

impl Landmark {
    pub fn new(id: usize, x: f32, y: f32) -> Self {
        Self { id, x, y }
    }

    pub fn distance_to(&self, other: &Landmark) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Un frame ya procesado por el detector: tamaño de imagen + landmarks (vacío si no hay mano)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HandFrame {
    pub width: u32,
    pub height: u32,
    pub landmarks: Vec<Landmark>,
}

impl HandFrame {
    pub fn new(width: u32, height: u32, landmarks: Vec<Landmark>) -> Self {
        Self {
            width,
            height,
            landmarks,
        }
    }

    pub fn empty(width: u32, height: u32) -> Self {
        Self::new(width, height, Vec::new())
    }
}

/// Etiqueta discreta del gesto de la mano en un frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureLabel {
    NoHand,
    Point,
    Pinch,
    Fist,
    Peace,
    OpenHand,
    Other,
    Error,
}

impl GestureLabel {
    /// Los 5 gestos que admiten una acción asignada
    pub const MAPPABLE: [GestureLabel; 5] = [
        GestureLabel::Point,
        GestureLabel::Pinch,
        GestureLabel::Fist,
        GestureLabel::Peace,
        GestureLabel::OpenHand,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoHand => "no_hand",
            Self::Point => "point",
            Self::Pinch => "pinch",
            Self::Fist => "fist",
            Self::Peace => "peace",
            Self::OpenHand => "open_hand",
            Self::Other => "other",
            Self::Error => "error",
        }
    }

    /// No hay señal útil de mano en este frame
    pub fn is_signal_lost(&self) -> bool {
        matches!(self, Self::NoHand | Self::Error)
    }
}

impl fmt::Display for GestureLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Dedo que controla el cursor. Durante el pinch (pulgar + índice) se usa el meñique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorFingerMode {
    #[default]
    Index,
    Pinky,
}

impl CursorFingerMode {
    /// Posición del dedo en el arreglo [pulgar, índice, medio, anular, meñique]
    pub fn finger_index(self) -> usize {
        match self {
            Self::Index => 1,
            Self::Pinky => 4,
        }
    }

    pub fn tip_id(self) -> usize {
        match self {
            Self::Index => INDEX_TIP,
            Self::Pinky => PINKY_TIP,
        }
    }

    pub fn pip_id(self) -> usize {
        match self {
            Self::Index => INDEX_PIP,
            Self::Pinky => PINKY_PIP,
        }
    }

    pub fn mcp_id(self) -> usize {
        match self {
            Self::Index => INDEX_MCP,
            Self::Pinky => PINKY_MCP,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Pinky => "pinky",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn landmark_distance_is_euclidean() {
        let a = Landmark::new(4, 0.0, 0.0);
        let b = Landmark::new(8, 3.0, 4.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn cursor_finger_joints_match_topology() {
        assert_eq!(CursorFingerMode::Index.tip_id(), 8);
        assert_eq!(CursorFingerMode::Pinky.tip_id(), 20);
        assert_eq!(CursorFingerMode::Pinky.pip_id(), 18);
        assert_eq!(CursorFingerMode::Index.mcp_id(), 5);
        assert_eq!(CursorFingerMode::Pinky.finger_index(), 4);
    }

    #[test]
    fn gesture_label_serializes_as_snake_case() {
        let json = serde_json::to_string(&GestureLabel::OpenHand).unwrap();
        assert_eq!(json, "\"open_hand\"");
        assert_eq!(GestureLabel::NoHand.to_string(), "no_hand");
        assert!(GestureLabel::Error.is_signal_lost());
        assert!(!GestureLabel::Other.is_signal_lost());
    }
}
