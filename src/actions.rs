use crate::config::ConfigError;
use crate::types::GestureLabel;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

pub const DEFAULT_KEY: &str = "space";
pub const DEFAULT_COMBO: [&str; 2] = ["ctrl", "c"];

static NO_ACTION: GestureAction = GestureAction::NoAction;

/// Acción asignable a un gesto
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GestureAction {
    CursorMove,
    LeftClick,
    RightClick,
    DoubleClick,
    ClickHold,
    ScrollUp,
    ScrollDown,
    KeyPress { key: String },
    KeyCombo { keys: Vec<String> },
    ToggleMovement,
    NoAction,
}

impl GestureAction {
    pub fn id(&self) -> &'static str {
        match self {
            Self::CursorMove => "cursor_move",
            Self::LeftClick => "left_click",
            Self::RightClick => "right_click",
            Self::DoubleClick => "double_click",
            Self::ClickHold => "click_hold",
            Self::ScrollUp => "scroll_up",
            Self::ScrollDown => "scroll_down",
            Self::KeyPress { .. } => "key_press",
            Self::KeyCombo { .. } => "key_combo",
            Self::ToggleMovement => "toggle_movement",
            Self::NoAction => "no_action",
        }
    }

    /// Acción discreta que pasa por las puertas de cooldown del dispatcher
    pub fn is_discrete(&self) -> bool {
        matches!(
            self,
            Self::LeftClick
                | Self::RightClick
                | Self::DoubleClick
                | Self::ScrollUp
                | Self::ScrollDown
                | Self::KeyPress { .. }
                | Self::KeyCombo { .. }
        )
    }

    fn from_raw(raw: RawEntry) -> Self {
        let params = raw.params.unwrap_or_default();
        match raw.action.as_str() {
            "cursor_move" => Self::CursorMove,
            "left_click" => Self::LeftClick,
            "right_click" => Self::RightClick,
            "double_click" => Self::DoubleClick,
            "click_hold" => Self::ClickHold,
            "scroll_up" => Self::ScrollUp,
            "scroll_down" => Self::ScrollDown,
            "key_press" => Self::KeyPress {
                key: params.key.unwrap_or_else(|| DEFAULT_KEY.to_string()),
            },
            "key_combo" => Self::KeyCombo {
                keys: params
                    .keys
                    .unwrap_or_else(|| DEFAULT_COMBO.iter().map(|k| k.to_string()).collect()),
            },
            "toggle_movement" => Self::ToggleMovement,
            "no_action" => Self::NoAction,
            other => {
                warn!("⚠️  Acción desconocida '{}', se usa no_action", other);
                Self::NoAction
            }
        }
    }

    fn to_raw(&self) -> RawEntry {
        let params = match self {
            Self::KeyPress { key } => Some(RawParams {
                key: Some(key.clone()),
                keys: None,
            }),
            Self::KeyCombo { keys } => Some(RawParams {
                key: None,
                keys: Some(keys.clone()),
            }),
            _ => Some(RawParams::default()),
        };
        RawEntry {
            action: self.id().to_string(),
            params,
        }
    }
}

impl fmt::Display for GestureAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KeyPress { key } => write!(f, "key_press({key})"),
            Self::KeyCombo { keys } => write!(f, "key_combo({})", keys.join("+")),
            other => f.write_str(other.id()),
        }
    }
}

/// Entrada tal como aparece en el JSON: {"action": "...", "params": {...}}
#[derive(Debug, Serialize, Deserialize)]
struct RawEntry {
    action: String,
    #[serde(default)]
    params: Option<RawParams>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RawParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    keys: Option<Vec<String>>,
}

/// Asignación gesto -> acción para los 5 gestos mapeables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GestureActionMap {
    actions: BTreeMap<GestureLabel, GestureAction>,
}

impl Default for GestureActionMap {
    fn default() -> Self {
        let actions = BTreeMap::from([
            (GestureLabel::Point, GestureAction::CursorMove),
            (GestureLabel::Pinch, GestureAction::ClickHold),
            (GestureLabel::Fist, GestureAction::LeftClick),
            (GestureLabel::Peace, GestureAction::RightClick),
            (GestureLabel::OpenHand, GestureAction::ScrollUp),
        ]);
        Self { actions }
    }
}

impl GestureActionMap {
    /// Mapa vacío: todo gesto resuelve a `NoAction`
    pub fn empty() -> Self {
        Self {
            actions: BTreeMap::new(),
        }
    }

    pub fn get(&self, label: GestureLabel) -> &GestureAction {
        self.actions.get(&label).unwrap_or(&NO_ACTION)
    }

    /// Asigna una acción; sólo se aceptan los gestos mapeables
    pub fn set(&mut self, label: GestureLabel, action: GestureAction) -> bool {
        if !GestureLabel::MAPPABLE.contains(&label) {
            return false;
        }
        self.actions.insert(label, action);
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (GestureLabel, &GestureAction)> {
        self.actions.iter().map(|(label, action)| (*label, action))
    }

    /// Gesto asignado a una acción concreta (p. ej. el de click_hold)
    pub fn gesture_for(&self, action_id: &str) -> Option<GestureLabel> {
        self.iter()
            .find(|(_, action)| action.id() == action_id)
            .map(|(label, _)| label)
    }

    /// Los gestos ausentes del JSON quedan sin acción
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let raw: BTreeMap<String, RawEntry> = serde_json::from_str(json)?;
        let mut map = Self::empty();

        for (gesture, entry) in raw {
            let label = GestureLabel::MAPPABLE
                .iter()
                .copied()
                .find(|label| label.as_str() == gesture);

            match label {
                Some(label) => {
                    map.set(label, GestureAction::from_raw(entry));
                }
                None => warn!("⚠️  Gesto no mapeable '{}' ignorado", gesture),
            }
        }

        Ok(map)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        let raw: BTreeMap<&str, RawEntry> = self
            .actions
            .iter()
            .map(|(label, action)| (label.as_str(), action.to_raw()))
            .collect();
        Ok(serde_json::to_string_pretty(&raw)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Archivo ausente o ilegible -> mapeo por defecto
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match Self::load(path) {
            Ok(map) => {
                info!("🎭 Mapeo de gestos cargado desde {}", path.display());
                map
            }
            Err(e) => {
                warn!("⚠️  Error cargando mapeo de gestos: {}. Se usa el de por defecto", e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = self.to_json_string()?;
        std::fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
