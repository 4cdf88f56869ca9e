use crate::actions::GestureAction;
use crate::hid::{PointerCommand, ScrollDirection};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

/// Estado del click/arrastre asociado al pinch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HoldState {
    #[default]
    Idle,
    PendingHold { since: Instant },
    Holding,
}

/// Familias de acción con cooldown independiente
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Click,
    RightClick,
    DoubleClick,
    Scroll,
    Key,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Pinch sostenido más allá de este tiempo = arrastre
    pub hold_threshold_secs: f32,
    pub click_cooldown_secs: f32,
    pub scroll_cooldown_secs: f32,
    pub key_cooldown_secs: f32,
    /// Ventana para el doble gesto que alterna el movimiento
    pub toggle_window_secs: f32,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            hold_threshold_secs: 0.3,
            click_cooldown_secs: 0.15,
            scroll_cooldown_secs: 0.1,
            key_cooldown_secs: 0.5,
            toggle_window_secs: 1.0,
        }
    }
}

fn secs(value: f32) -> Duration {
    Duration::try_from_secs_f32(value.max(0.0)).unwrap_or(Duration::ZERO)
}

/// Puerta de cooldown: deja pasar si desde el último disparo pasó más que `cooldown`
#[derive(Debug, Clone, Copy)]
struct CooldownGate {
    cooldown: Duration,
    last: Option<Instant>,
}

impl CooldownGate {
    fn new(cooldown: Duration) -> Self {
        Self { cooldown, last: None }
    }

    fn try_fire(&mut self, now: Instant) -> bool {
        let open = match self.last {
            Some(last) => now.saturating_duration_since(last) > self.cooldown,
            None => true,
        };
        if open {
            self.last = Some(now);
        }
        open
    }

    fn reset(&mut self) {
        self.last = None;
    }
}

/// Máquina de estados click / mantener + puertas de cooldown.
/// Sólo devuelve comandos; quien llama los ejecuta sobre el `PointerSink`.
pub struct ActionDispatcher {
    config: DispatcherConfig,
    hold_threshold: Duration,
    toggle_window: Duration,
    state: HoldState,
    click_gate: CooldownGate,
    right_click_gate: CooldownGate,
    double_click_gate: CooldownGate,
    scroll_gate: CooldownGate,
    key_gate: CooldownGate,
    last_toggle: Option<Instant>,
}

impl ActionDispatcher {
    pub fn new(config: DispatcherConfig) -> Self {
        let click = secs(config.click_cooldown_secs);
        Self {
            config,
            hold_threshold: secs(config.hold_threshold_secs),
            toggle_window: secs(config.toggle_window_secs),
            state: HoldState::Idle,
            click_gate: CooldownGate::new(click),
            right_click_gate: CooldownGate::new(click),
            double_click_gate: CooldownGate::new(click),
            scroll_gate: CooldownGate::new(secs(config.scroll_cooldown_secs)),
            key_gate: CooldownGate::new(secs(config.key_cooldown_secs)),
            last_toggle: None,
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn hold_state(&self) -> HoldState {
        self.state
    }

    pub fn is_holding(&self) -> bool {
        self.state == HoldState::Holding
    }

    /// Avanza la máquina con el estado del pinch en este frame
    pub fn update_pinch(&mut self, active: bool, now: Instant) -> Option<PointerCommand> {
        match (self.state, active) {
            (HoldState::Idle, true) => {
                self.state = HoldState::PendingHold { since: now };
                debug!("🤏 Pinch iniciado");
                None
            }
            (HoldState::PendingHold { since }, true) => {
                if now.saturating_duration_since(since) > self.hold_threshold {
                    self.state = HoldState::Holding;
                    debug!("✊ Arrastre iniciado");
                    Some(PointerCommand::MouseDown)
                } else {
                    None
                }
            }
            (HoldState::PendingHold { since }, false) => {
                self.state = HoldState::Idle;
                // Soltar tras el umbral sin haber pasado a Holding no es un click
                let quick = now.saturating_duration_since(since) < self.hold_threshold;
                if quick && self.click_gate.try_fire(now) {
                    debug!("👆 Click por pinch");
                    Some(PointerCommand::Click)
                } else {
                    None
                }
            }
            (HoldState::Holding, false) => {
                self.state = HoldState::Idle;
                debug!("✋ Arrastre terminado");
                Some(PointerCommand::MouseUp)
            }
            (HoldState::Holding, true) | (HoldState::Idle, false) => None,
        }
    }

    /// Consulta la puerta de cooldown de `kind`; si está abierta la consume
    pub fn request(&mut self, kind: ActionKind, now: Instant) -> bool {
        let gate = match kind {
            ActionKind::Click => &mut self.click_gate,
            ActionKind::RightClick => &mut self.right_click_gate,
            ActionKind::DoubleClick => &mut self.double_click_gate,
            ActionKind::Scroll => &mut self.scroll_gate,
            ActionKind::Key => &mut self.key_gate,
        };
        gate.try_fire(now)
    }

    /// Traduce una acción discreta a comando si su cooldown lo permite.
    /// Las acciones continuas (cursor, click_hold, toggle) no pasan por aquí.
    pub fn request_action(&mut self, action: &GestureAction, now: Instant) -> Option<PointerCommand> {
        let (kind, command) = match action {
            GestureAction::LeftClick => (ActionKind::Click, PointerCommand::Click),
            GestureAction::RightClick => (ActionKind::RightClick, PointerCommand::RightClick),
            GestureAction::DoubleClick => (ActionKind::DoubleClick, PointerCommand::DoubleClick),
            GestureAction::ScrollUp => (ActionKind::Scroll, PointerCommand::Scroll(ScrollDirection::Up)),
            GestureAction::ScrollDown => (ActionKind::Scroll, PointerCommand::Scroll(ScrollDirection::Down)),
            GestureAction::KeyPress { key } => (ActionKind::Key, PointerCommand::PressKey(key.clone())),
            GestureAction::KeyCombo { keys } => (ActionKind::Key, PointerCommand::KeyCombo(keys.clone())),
            GestureAction::CursorMove
            | GestureAction::ClickHold
            | GestureAction::ToggleMovement
            | GestureAction::NoAction => return None,
        };

        self.request(kind, now).then_some(command)
    }

    /// Registra la entrada en el gesto de alternar movimiento.
    /// Devuelve true en la segunda entrada dentro de la ventana.
    pub fn register_toggle(&mut self, now: Instant) -> bool {
        match self.last_toggle {
            Some(prev) if now.saturating_duration_since(prev) <= self.toggle_window => {
                self.last_toggle = None;
                true
            }
            _ => {
                self.last_toggle = Some(now);
                false
            }
        }
    }

    /// Fuerza Idle; `MouseUp` sólo si se estaba arrastrando. Idempotente.
    pub fn release(&mut self) -> Option<PointerCommand> {
        let was_holding = self.is_holding();
        self.state = HoldState::Idle;
        was_holding.then_some(PointerCommand::MouseUp)
    }

    /// Estado de sesión a cero (no emite nada; usar `release` antes si hace falta)
    pub fn reset(&mut self) {
        self.state = HoldState::Idle;
        self.click_gate.reset();
        self.right_click_gate.reset();
        self.double_click_gate.reset();
        self.scroll_gate.reset();
        self.key_gate.reset();
        self.last_toggle = None;
    }
}

impl Default for ActionDispatcher {
    fn default() -> Self {
        Self::new(DispatcherConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(t0: Instant, millis: u64) -> Instant {
        t0 + Duration::from_millis(millis)
    }

    #[test]
    fn short_pinch_is_a_click() {
        let mut d = ActionDispatcher::default();
        let t0 = Instant::now();
        assert_eq!(d.update_pinch(true, t0), None);
        assert!(matches!(d.hold_state(), HoldState::PendingHold { .. }));
        assert_eq!(d.update_pinch(true, ms(t0, 100)), None);
        assert_eq!(d.update_pinch(false, ms(t0, 200)), Some(PointerCommand::Click));
        assert_eq!(d.hold_state(), HoldState::Idle);
    }

    #[test]
    fn long_pinch_is_a_hold() {
        let mut d = ActionDispatcher::default();
        let t0 = Instant::now();
        d.update_pinch(true, t0);
        assert_eq!(d.update_pinch(true, ms(t0, 200)), None);
        assert_eq!(d.update_pinch(true, ms(t0, 350)), Some(PointerCommand::MouseDown));
        assert_eq!(d.hold_state(), HoldState::Holding);
        assert_eq!(d.update_pinch(true, ms(t0, 500)), None);
        assert_eq!(d.update_pinch(false, ms(t0, 600)), Some(PointerCommand::MouseUp));
        assert_eq!(d.hold_state(), HoldState::Idle);
    }

    #[test]
    fn late_release_without_hold_emits_nothing() {
        let mut d = ActionDispatcher::default();
        let t0 = Instant::now();
        d.update_pinch(true, t0);
        // no hubo frame intermedio que pasara a Holding
        assert_eq!(d.update_pinch(false, ms(t0, 400)), None);
        assert_eq!(d.hold_state(), HoldState::Idle);
    }

    #[test]
    fn pinch_click_respects_click_cooldown() {
        let mut d = ActionDispatcher::default();
        let t0 = Instant::now();
        d.update_pinch(true, t0);
        assert_eq!(d.update_pinch(false, ms(t0, 50)), Some(PointerCommand::Click));
        d.update_pinch(true, ms(t0, 80));
        assert_eq!(d.update_pinch(false, ms(t0, 120)), None);
        d.update_pinch(true, ms(t0, 200));
        assert_eq!(d.update_pinch(false, ms(t0, 250)), Some(PointerCommand::Click));
    }

    #[test]
    fn gates_are_independent() {
        let mut d = ActionDispatcher::default();
        let t0 = Instant::now();
        assert!(d.request(ActionKind::Click, t0));
        assert!(!d.request(ActionKind::Click, ms(t0, 100)));
        assert!(d.request(ActionKind::RightClick, ms(t0, 100)));
        assert!(d.request(ActionKind::Scroll, ms(t0, 100)));
        assert!(!d.request(ActionKind::Scroll, ms(t0, 150)));
        assert!(d.request(ActionKind::Scroll, ms(t0, 250)));
        assert!(d.request(ActionKind::Click, ms(t0, 160)));
    }

    #[test]
    fn held_key_gesture_does_not_repeat_at_frame_rate() {
        let mut d = ActionDispatcher::default();
        let t0 = Instant::now();
        let action = GestureAction::KeyPress { key: "space".into() };
        let fired: Vec<_> = (0..30)
            .filter_map(|i| d.request_action(&action, ms(t0, i * 33)))
            .collect();
        // 0 ms y 528 ms
        assert_eq!(fired.len(), 2);
        assert_eq!(fired[0], PointerCommand::PressKey("space".into()));
    }

    #[test]
    fn continuous_actions_are_not_dispatched() {
        let mut d = ActionDispatcher::default();
        let t0 = Instant::now();
        assert_eq!(d.request_action(&GestureAction::CursorMove, t0), None);
        assert_eq!(d.request_action(&GestureAction::ClickHold, t0), None);
        assert_eq!(d.request_action(&GestureAction::NoAction, t0), None);
        assert_eq!(
            d.request_action(&GestureAction::ScrollDown, t0),
            Some(PointerCommand::Scroll(ScrollDirection::Down))
        );
    }

    #[test]
    fn double_gesture_toggles_within_window() {
        let mut d = ActionDispatcher::default();
        let t0 = Instant::now();
        assert!(!d.register_toggle(t0));
        assert!(d.register_toggle(ms(t0, 600)));
        // la tercera entrada abre una ventana nueva
        assert!(!d.register_toggle(ms(t0, 900)));
        assert!(!d.register_toggle(ms(t0, 2500)));
        assert!(d.register_toggle(ms(t0, 3000)));
    }

    #[test]
    fn release_only_emits_mouse_up_when_holding() {
        let mut d = ActionDispatcher::default();
        let t0 = Instant::now();
        assert_eq!(d.release(), None);

        d.update_pinch(true, t0);
        assert_eq!(d.release(), None);
        assert_eq!(d.hold_state(), HoldState::Idle);

        d.update_pinch(true, ms(t0, 10));
        d.update_pinch(true, ms(t0, 400));
        assert_eq!(d.release(), Some(PointerCommand::MouseUp));
        assert_eq!(d.release(), None);
    }

    #[test]
    fn reset_reopens_gates() {
        let mut d = ActionDispatcher::default();
        let t0 = Instant::now();
        assert!(d.request(ActionKind::Key, t0));
        d.register_toggle(t0);
        d.reset();
        assert!(d.request(ActionKind::Key, ms(t0, 10)));
        assert!(!d.register_toggle(ms(t0, 20)));
    }
}
