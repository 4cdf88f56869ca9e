use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::actions::GestureActionMap;
use crate::dispatcher::{ActionDispatcher, DispatcherConfig};
use crate::gesture_classifier::{ClassifierConfig, GestureClassifier};
use crate::mouse_filter::{MotionConfig, MotionMapper};
use crate::optimizer::{DedupKey, OptimizerConfig, OptimizerState, ParameterOptimizer};
use crate::pipeline::{GesturePipeline, PipelineConfig};
use crate::settings::Settings;
use crate::worker::WorkerConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no se pudo leer {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON inválido: {0}")]
    Json(#[from] serde_json::Error),
    #[error("valor inválido para {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Configuración completa de la aplicación (JSON). Toda sección es opcional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub classifier: ClassifierConfig,
    pub motion: MotionConfig,
    pub dispatcher: DispatcherConfig,
    pub pipeline: PipelineConfig,
    pub worker: WorkerConfig,
    pub settings: Settings,
    pub optimizer: OptimizerConfig,
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

impl AppConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&content)?;
        info!("📄 Configuración cargada desde {}", path.display());
        Ok(config)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Valores estructurales; los ajustes de movimiento ya se limitan al deserializar
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.classifier;
        if c.stability_window == 0 {
            return Err(invalid("classifier.stability_window", "debe ser >= 1"));
        }
        if let Some(min_true) = c.stability_min_true {
            if min_true > c.stability_window {
                return Err(invalid(
                    "classifier.stability_min_true",
                    format!("{} supera la ventana de {}", min_true, c.stability_window),
                ));
            }
        }
        if !(c.pinch_threshold_px.is_finite() && c.pinch_threshold_px > 0.0) {
            return Err(invalid("classifier.pinch_threshold_px", "debe ser > 0"));
        }

        let m = &self.motion;
        if m.surface_width == 0 || m.surface_height == 0 {
            return Err(invalid("motion.surface", "la superficie debe medir al menos 1 px"));
        }
        if m.jitter_window == 0 {
            return Err(invalid("motion.jitter_window", "debe ser >= 1"));
        }
        if !(m.margin_px.is_finite() && m.margin_px >= 0.0) {
            return Err(invalid("motion.margin_px", "debe ser >= 0"));
        }

        let d = &self.dispatcher;
        let timings = [
            d.hold_threshold_secs,
            d.click_cooldown_secs,
            d.scroll_cooldown_secs,
            d.key_cooldown_secs,
            d.toggle_window_secs,
        ];
        if timings.iter().any(|t| !t.is_finite() || *t < 0.0) {
            return Err(invalid("dispatcher", "los tiempos deben ser finitos y >= 0"));
        }

        if !(self.worker.target_fps.is_finite() && self.worker.target_fps > 0.0) {
            return Err(invalid("worker.target_fps", "debe ser > 0"));
        }
        if self.worker.event_capacity == 0 {
            return Err(invalid("worker.event_capacity", "debe ser >= 1"));
        }

        Ok(())
    }

    pub fn build_pipeline(&self, actions: GestureActionMap) -> GesturePipeline {
        GesturePipeline::new(
            GestureClassifier::new(self.classifier.clone()),
            MotionMapper::new(self.motion),
            ActionDispatcher::new(self.dispatcher),
            actions,
            self.pipeline,
        )
    }

    pub fn build_optimizer(&self) -> ParameterOptimizer {
        let mut optimizer = ParameterOptimizer::new(self.optimizer);
        optimizer.set_current(self.settings.params());
        optimizer
    }

    /// Retoma una búsqueda guardada; si los ajustes activos no son el punto en evaluación,
    /// se evalúan los ajustes activos (el usuario jugó con ellos)
    pub fn resume_optimizer(&self, state: Option<OptimizerState>) -> ParameterOptimizer {
        let Some(state) = state else {
            return self.build_optimizer();
        };
        let mut optimizer = ParameterOptimizer::from_state(self.optimizer, state);
        let active = self.settings.params();
        if DedupKey::from(active) != DedupKey::from(optimizer.current()) {
            info!("↪️  Los ajustes activos difieren del candidato guardado; se evalúan los activos");
            optimizer.set_current(active);
        }
        optimizer
    }
}
