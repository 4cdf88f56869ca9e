use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::info;

pub const SENSITIVITY_RANGE: RangeInclusive<f32> = 0.3..=2.0;
pub const SMOOTHING_RANGE: RangeInclusive<f32> = 0.1..=0.8;
pub const ACCELERATION_RANGE: RangeInclusive<f32> = 1.0..=3.0;

const DEFAULT_SENSITIVITY: f32 = 1.0;
const DEFAULT_SMOOTHING: f32 = 0.3;
const DEFAULT_ACCELERATION: f32 = 1.5;

/// Limita `value` al rango; valores no finitos caen al valor por defecto
fn clamp_to(value: f32, range: &RangeInclusive<f32>, fallback: f32) -> f32 {
    if value.is_nan() {
        return fallback;
    }
    value.clamp(*range.start(), *range.end())
}

/// Punto del espacio de ajuste (sensibilidad, suavizado, aceleración)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionParams {
    pub sensitivity: f32,
    pub smoothing: f32,
    pub acceleration: f32,
}

impl MotionParams {
    pub fn new(sensitivity: f32, smoothing: f32, acceleration: f32) -> Self {
        Self {
            sensitivity,
            smoothing,
            acceleration,
        }
    }

    /// Copia con cada dimensión dentro de su rango
    pub fn clamped(self) -> Self {
        Self {
            sensitivity: clamp_to(self.sensitivity, &SENSITIVITY_RANGE, DEFAULT_SENSITIVITY),
            smoothing: clamp_to(self.smoothing, &SMOOTHING_RANGE, DEFAULT_SMOOTHING),
            acceleration: clamp_to(self.acceleration, &ACCELERATION_RANGE, DEFAULT_ACCELERATION),
        }
    }
}

impl Default for MotionParams {
    fn default() -> Self {
        Self::new(DEFAULT_SENSITIVITY, DEFAULT_SMOOTHING, DEFAULT_ACCELERATION)
    }
}

/// Ajustes de movimiento del cursor. Toda escritura queda dentro de rango.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "SettingsRepr", into = "SettingsRepr")]
pub struct Settings {
    sensitivity: f32,
    smoothing: f32,
    acceleration: f32,
    inverted: bool,
    movement_enabled: bool,
}

/// Forma serializada: se acepta cualquier valor y se limita al convertir
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
struct SettingsRepr {
    sensitivity: f32,
    smoothing: f32,
    acceleration: f32,
    inverted: bool,
    movement_enabled: bool,
}

impl Default for SettingsRepr {
    fn default() -> Self {
        Settings::default().into()
    }
}

impl From<SettingsRepr> for Settings {
    fn from(repr: SettingsRepr) -> Self {
        let mut settings = Settings::default();
        settings.set_sensitivity(repr.sensitivity);
        settings.set_smoothing(repr.smoothing);
        settings.set_acceleration(repr.acceleration);
        settings.set_inverted(repr.inverted);
        settings.set_movement_enabled(repr.movement_enabled);
        settings
    }
}

impl From<Settings> for SettingsRepr {
    fn from(s: Settings) -> Self {
        Self {
            sensitivity: s.sensitivity,
            smoothing: s.smoothing,
            acceleration: s.acceleration,
            inverted: s.inverted,
            movement_enabled: s.movement_enabled,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sensitivity: DEFAULT_SENSITIVITY,
            smoothing: DEFAULT_SMOOTHING,
            acceleration: DEFAULT_ACCELERATION,
            inverted: false,
            movement_enabled: true,
        }
    }
}

impl Settings {
    pub fn sensitivity(&self) -> f32 {
        self.sensitivity
    }

    pub fn smoothing(&self) -> f32 {
        self.smoothing
    }

    pub fn acceleration(&self) -> f32 {
        self.acceleration
    }

    pub fn inverted(&self) -> bool {
        self.inverted
    }

    pub fn movement_enabled(&self) -> bool {
        self.movement_enabled
    }

    pub fn set_sensitivity(&mut self, value: f32) {
        self.sensitivity = clamp_to(value, &SENSITIVITY_RANGE, DEFAULT_SENSITIVITY);
    }

    pub fn set_smoothing(&mut self, value: f32) {
        self.smoothing = clamp_to(value, &SMOOTHING_RANGE, DEFAULT_SMOOTHING);
    }

    pub fn set_acceleration(&mut self, value: f32) {
        self.acceleration = clamp_to(value, &ACCELERATION_RANGE, DEFAULT_ACCELERATION);
    }

    pub fn set_inverted(&mut self, inverted: bool) {
        self.inverted = inverted;
    }

    pub fn set_movement_enabled(&mut self, enabled: bool) {
        self.movement_enabled = enabled;
    }

    /// Alterna el movimiento y devuelve el nuevo estado
    pub fn toggle_movement(&mut self) -> bool {
        self.movement_enabled = !self.movement_enabled;
        self.movement_enabled
    }

    pub fn params(&self) -> MotionParams {
        MotionParams::new(self.sensitivity, self.smoothing, self.acceleration)
    }

    pub fn apply_params(&mut self, params: MotionParams) {
        self.set_sensitivity(params.sensitivity);
        self.set_smoothing(params.smoothing);
        self.set_acceleration(params.acceleration);
    }
}

/// Ajustes compartidos entre el hilo interactivo (escribe) y el worker (lee cada iteración)
#[derive(Debug, Clone, Default)]
pub struct SharedSettings {
    inner: Arc<Mutex<Settings>>,
}

impl SharedSettings {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(Mutex::new(settings)),
        }
    }

    // Un panic en otro hilo no invalida unos ajustes que siempre están en rango
    fn lock(&self) -> MutexGuard<'_, Settings> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copia consistente de los ajustes actuales
    pub fn snapshot(&self) -> Settings {
        *self.lock()
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut Settings) -> R) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }

    pub fn apply_params(&self, params: MotionParams) {
        let applied = self.update(|s| {
            s.apply_params(params);
            s.params()
        });
        info!(
            "⚙️  Ajustes actualizados: S={:.2}, Sm={:.2}, A={:.2}",
            applied.sensitivity, applied.smoothing, applied.acceleration
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensitivity_requests_are_clamped() {
        let mut s = Settings::default();
        s.set_sensitivity(-5.0);
        assert_eq!(s.sensitivity(), 0.3);
        s.set_sensitivity(99.0);
        assert_eq!(s.sensitivity(), 2.0);
    }

    #[test]
    fn smoothing_and_acceleration_are_clamped() {
        let mut s = Settings::default();
        s.set_smoothing(-1.0);
        assert_eq!(s.smoothing(), 0.1);
        s.set_smoothing(5.0);
        assert_eq!(s.smoothing(), 0.8);
        s.set_acceleration(0.0);
        assert_eq!(s.acceleration(), 1.0);
        s.set_acceleration(10.0);
        assert_eq!(s.acceleration(), 3.0);
    }

    #[test]
    fn nan_falls_back_to_default() {
        let mut s = Settings::default();
        s.set_sensitivity(1.7);
        s.set_sensitivity(f32::NAN);
        assert_eq!(s.sensitivity(), 1.0);
        s.set_acceleration(f32::INFINITY);
        assert_eq!(s.acceleration(), 3.0);
    }

    #[test]
    fn deserialization_clamps_out_of_range_values() {
        let s: Settings =
            serde_json::from_str(r#"{"sensitivity": 99, "smoothing": 0.0, "inverted": true}"#)
                .unwrap();
        assert_eq!(s.sensitivity(), 2.0);
        assert_eq!(s.smoothing(), 0.1);
        assert_eq!(s.acceleration(), 1.5);
        assert!(s.inverted());
        assert!(s.movement_enabled());
    }

    #[test]
    fn params_roundtrip_through_settings() {
        let mut s = Settings::default();
        s.apply_params(MotionParams::new(5.0, 0.5, 2.2));
        assert_eq!(s.params(), MotionParams::new(2.0, 0.5, 2.2));
    }

    #[test]
    fn shared_settings_are_visible_across_clones() {
        let shared = SharedSettings::default();
        let reader = shared.clone();
        shared.update(|s| s.set_inverted(true));
        assert!(reader.snapshot().inverted());
        assert!(!shared.update(|s| s.toggle_movement()));
        assert!(!reader.snapshot().movement_enabled());
    }
}
