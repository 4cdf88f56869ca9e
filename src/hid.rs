use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("dispositivo de salida no disponible: {0}")]
    Unavailable(String),
    #[error("tecla desconocida: {0}")]
    UnknownKey(String),
    #[error("fallo al emitir evento: {0}")]
    Emit(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    Up,
    Down,
}

impl ScrollDirection {
    /// Pasos de rueda por evento
    pub fn steps(self) -> i32 {
        match self {
            Self::Up => 3,
            Self::Down => -3,
        }
    }
}

/// Efecto de puntero/teclado a ejecutar sobre un `PointerSink`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PointerCommand {
    MoveTo { x: i32, y: i32 },
    MouseDown,
    MouseUp,
    Click,
    RightClick,
    DoubleClick,
    Scroll(ScrollDirection),
    PressKey(String),
    KeyCombo(Vec<String>),
}

impl fmt::Display for PointerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MoveTo { x, y } => write!(f, "move_to({x}, {y})"),
            Self::MouseDown => f.write_str("mouse_down"),
            Self::MouseUp => f.write_str("mouse_up"),
            Self::Click => f.write_str("click"),
            Self::RightClick => f.write_str("right_click"),
            Self::DoubleClick => f.write_str("double_click"),
            Self::Scroll(dir) => write!(f, "scroll({dir:?})"),
            Self::PressKey(key) => write!(f, "press_key({key})"),
            Self::KeyCombo(keys) => write!(f, "key_combo({})", keys.join("+")),
        }
    }
}

/// Destino de los eventos de puntero (uinput, log, grabación en tests...)
pub trait PointerSink {
    fn move_to(&mut self, x: i32, y: i32) -> Result<(), SinkError>;
    fn mouse_down(&mut self) -> Result<(), SinkError>;
    fn mouse_up(&mut self) -> Result<(), SinkError>;
    fn click(&mut self) -> Result<(), SinkError>;
    fn right_click(&mut self) -> Result<(), SinkError>;
    fn double_click(&mut self) -> Result<(), SinkError>;
    fn scroll(&mut self, direction: ScrollDirection) -> Result<(), SinkError>;
    fn press_key(&mut self, key: &str) -> Result<(), SinkError>;
    fn key_combo(&mut self, keys: &[String]) -> Result<(), SinkError>;
}

/// Ejecuta un comando sobre el sink
pub fn execute<S: PointerSink + ?Sized>(sink: &mut S, command: &PointerCommand) -> Result<(), SinkError> {
    match command {
        PointerCommand::MoveTo { x, y } => sink.move_to(*x, *y),
        PointerCommand::MouseDown => sink.mouse_down(),
        PointerCommand::MouseUp => sink.mouse_up(),
        PointerCommand::Click => sink.click(),
        PointerCommand::RightClick => sink.right_click(),
        PointerCommand::DoubleClick => sink.double_click(),
        PointerCommand::Scroll(dir) => sink.scroll(*dir),
        PointerCommand::PressKey(key) => sink.press_key(key),
        PointerCommand::KeyCombo(keys) => sink.key_combo(keys),
    }
}

/// Ejecuta todos los comandos; los fallos se registran y no cortan la secuencia
pub fn execute_all<S: PointerSink + ?Sized>(sink: &mut S, commands: &[PointerCommand]) -> usize {
    let mut failures = 0;
    for command in commands {
        if let Err(e) = execute(sink, command) {
            warn!("⚠️  Error ejecutando {}: {}", command, e);
            failures += 1;
        }
    }
    failures
}

impl<T: PointerSink + ?Sized> PointerSink for Box<T> {
    fn move_to(&mut self, x: i32, y: i32) -> Result<(), SinkError> {
        (**self).move_to(x, y)
    }

    fn mouse_down(&mut self) -> Result<(), SinkError> {
        (**self).mouse_down()
    }

    fn mouse_up(&mut self) -> Result<(), SinkError> {
        (**self).mouse_up()
    }

    fn click(&mut self) -> Result<(), SinkError> {
        (**self).click()
    }

    fn right_click(&mut self) -> Result<(), SinkError> {
        (**self).right_click()
    }

    fn double_click(&mut self) -> Result<(), SinkError> {
        (**self).double_click()
    }

    fn scroll(&mut self, direction: ScrollDirection) -> Result<(), SinkError> {
        (**self).scroll(direction)
    }

    fn press_key(&mut self, key: &str) -> Result<(), SinkError> {
        (**self).press_key(key)
    }

    fn key_combo(&mut self, keys: &[String]) -> Result<(), SinkError> {
        (**self).key_combo(keys)
    }
}

/// Limita los `move_to`: sólo se reenvían si la distancia al último movimiento supera el umbral
pub struct MoveThrottle<S> {
    inner: S,
    min_distance_px: f32,
    last: Option<(i32, i32)>,
}

pub const DEFAULT_MIN_MOVE_PX: f32 = 3.0;

impl<S: PointerSink> MoveThrottle<S> {
    pub fn new(inner: S) -> Self {
        Self::with_min_distance(inner, DEFAULT_MIN_MOVE_PX)
    }

    pub fn with_min_distance(inner: S, min_distance_px: f32) -> Self {
        Self {
            inner,
            min_distance_px,
            last: None,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: PointerSink> PointerSink for MoveThrottle<S> {
    fn move_to(&mut self, x: i32, y: i32) -> Result<(), SinkError> {
        if let Some((lx, ly)) = self.last {
            let dx = (x - lx) as f32;
            let dy = (y - ly) as f32;
            if (dx * dx + dy * dy).sqrt() <= self.min_distance_px {
                return Ok(());
            }
        }
        self.inner.move_to(x, y)?;
        self.last = Some((x, y));
        Ok(())
    }

    fn mouse_down(&mut self) -> Result<(), SinkError> {
        self.inner.mouse_down()
    }

    fn mouse_up(&mut self) -> Result<(), SinkError> {
        self.inner.mouse_up()
    }

    fn click(&mut self) -> Result<(), SinkError> {
        self.inner.click()
    }

    fn right_click(&mut self) -> Result<(), SinkError> {
        self.inner.right_click()
    }

    fn double_click(&mut self) -> Result<(), SinkError> {
        self.inner.double_click()
    }

    fn scroll(&mut self, direction: ScrollDirection) -> Result<(), SinkError> {
        self.inner.scroll(direction)
    }

    fn press_key(&mut self, key: &str) -> Result<(), SinkError> {
        self.inner.press_key(key)
    }

    fn key_combo(&mut self, keys: &[String]) -> Result<(), SinkError> {
        self.inner.key_combo(keys)
    }
}

/// Guarda los comandos recibidos en orden
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    pub commands: Vec<PointerCommand>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, command: &PointerCommand) -> usize {
        self.commands.iter().filter(|c| *c == command).count()
    }

    pub fn moves(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.commands.iter().filter_map(|c| match c {
            PointerCommand::MoveTo { x, y } => Some((*x, *y)),
            _ => None,
        })
    }
}

impl PointerSink for RecordingSink {
    fn move_to(&mut self, x: i32, y: i32) -> Result<(), SinkError> {
        self.commands.push(PointerCommand::MoveTo { x, y });
        Ok(())
    }

    fn mouse_down(&mut self) -> Result<(), SinkError> {
        self.commands.push(PointerCommand::MouseDown);
        Ok(())
    }

    fn mouse_up(&mut self) -> Result<(), SinkError> {
        self.commands.push(PointerCommand::MouseUp);
        Ok(())
    }

    fn click(&mut self) -> Result<(), SinkError> {
        self.commands.push(PointerCommand::Click);
        Ok(())
    }

    fn right_click(&mut self) -> Result<(), SinkError> {
        self.commands.push(PointerCommand::RightClick);
        Ok(())
    }

    fn double_click(&mut self) -> Result<(), SinkError> {
        self.commands.push(PointerCommand::DoubleClick);
        Ok(())
    }

    fn scroll(&mut self, direction: ScrollDirection) -> Result<(), SinkError> {
        self.commands.push(PointerCommand::Scroll(direction));
        Ok(())
    }

    fn press_key(&mut self, key: &str) -> Result<(), SinkError> {
        self.commands.push(PointerCommand::PressKey(key.to_string()));
        Ok(())
    }

    fn key_combo(&mut self, keys: &[String]) -> Result<(), SinkError> {
        self.commands.push(PointerCommand::KeyCombo(keys.to_vec()));
        Ok(())
    }
}

/// Sink sin dispositivo: sólo registra los eventos (modo simulación)
#[derive(Debug, Default)]
pub struct LogSink;

impl LogSink {
    fn log(&self, command: PointerCommand) -> Result<(), SinkError> {
        match command {
            PointerCommand::MoveTo { .. } => debug!("🖱️  {}", command),
            _ => info!("🖱️  {}", command),
        }
        Ok(())
    }
}

impl PointerSink for LogSink {
    fn move_to(&mut self, x: i32, y: i32) -> Result<(), SinkError> {
        self.log(PointerCommand::MoveTo { x, y })
    }

    fn mouse_down(&mut self) -> Result<(), SinkError> {
        self.log(PointerCommand::MouseDown)
    }

    fn mouse_up(&mut self) -> Result<(), SinkError> {
        self.log(PointerCommand::MouseUp)
    }

    fn click(&mut self) -> Result<(), SinkError> {
        self.log(PointerCommand::Click)
    }

    fn right_click(&mut self) -> Result<(), SinkError> {
        self.log(PointerCommand::RightClick)
    }

    fn double_click(&mut self) -> Result<(), SinkError> {
        self.log(PointerCommand::DoubleClick)
    }

    fn scroll(&mut self, direction: ScrollDirection) -> Result<(), SinkError> {
        self.log(PointerCommand::Scroll(direction))
    }

    fn press_key(&mut self, key: &str) -> Result<(), SinkError> {
        self.log(PointerCommand::PressKey(key.to_string()))
    }

    fn key_combo(&mut self, keys: &[String]) -> Result<(), SinkError> {
        self.log(PointerCommand::KeyCombo(keys.to_vec()))
    }
}

#[cfg(feature = "uinput")]
pub use self::uinput_sink::UinputSink;

#[cfg(feature = "uinput")]
mod uinput_sink {
    use super::{PointerSink, ScrollDirection, SinkError};
    use std::time::Duration;
    use uinput::device::Device;
    use uinput::event::controller;
    use uinput::event::keyboard::{self, Key};
    use uinput::event::relative;

    const TAP_DELAY: Duration = Duration::from_millis(10);

    impl From<uinput::Error> for SinkError {
        fn from(e: uinput::Error) -> Self {
            SinkError::Emit(e.to_string())
        }
    }

    /// Ratón/teclado virtual sobre /dev/uinput.
    /// uinput sólo admite movimiento relativo: se sigue la posición enviada para convertir `move_to`.
    pub struct UinputSink {
        dev: Device,
        position: Option<(i32, i32)>,
    }

    impl UinputSink {
        pub fn new() -> Result<Self, SinkError> {
            let dev = uinput::default()
                .and_then(|b| b.name("quirocursor-hid"))
                .and_then(|b| b.event(uinput::event::Keyboard::All))
                .and_then(|b| b.event(uinput::event::Controller::Mouse(controller::Mouse::Left)))
                .and_then(|b| b.event(uinput::event::Controller::Mouse(controller::Mouse::Right)))
                .and_then(|b| b.event(uinput::event::Relative::Position(relative::Position::X)))
                .and_then(|b| b.event(uinput::event::Relative::Position(relative::Position::Y)))
                .and_then(|b| b.event(uinput::event::Relative::Wheel(relative::Wheel::Vertical)))
                .and_then(|b| b.create())
                .map_err(|e| SinkError::Unavailable(e.to_string()))?;

            Ok(Self { dev, position: None })
        }

        fn sync(&mut self) -> Result<(), SinkError> {
            Ok(self.dev.synchronize()?)
        }

        fn button_tap(&mut self, button: controller::Mouse) -> Result<(), SinkError> {
            self.dev.press(&controller::Controller::Mouse(button))?;
            self.sync()?;
            std::thread::sleep(TAP_DELAY);
            self.dev.release(&controller::Controller::Mouse(button))?;
            self.sync()
        }

        fn key_tap(&mut self, key: Key) -> Result<(), SinkError> {
            self.dev.press(&keyboard::Keyboard::Key(key))?;
            self.sync()?;
            std::thread::sleep(TAP_DELAY);
            self.dev.release(&keyboard::Keyboard::Key(key))?;
            self.sync()
        }
    }

    fn parse_key(name: &str) -> Result<Key, SinkError> {
        let key = match name.to_ascii_lowercase().as_str() {
            "space" => Key::Space,
            "enter" | "return" => Key::Enter,
            "esc" | "escape" => Key::Esc,
            "tab" => Key::Tab,
            "backspace" => Key::BackSpace,
            "ctrl" | "control" => Key::LeftControl,
            "shift" => Key::LeftShift,
            "alt" => Key::LeftAlt,
            "super" | "win" | "cmd" => Key::LeftMeta,
            "left" => Key::Left,
            "right" => Key::Right,
            "up" => Key::Up,
            "down" => Key::Down,
            "a" => Key::A,
            "c" => Key::C,
            "v" => Key::V,
            "x" => Key::X,
            "z" => Key::Z,
            "y" => Key::Y,
            "s" => Key::S,
            other => return Err(SinkError::UnknownKey(other.to_string())),
        };
        Ok(key)
    }

    impl PointerSink for UinputSink {
        fn move_to(&mut self, x: i32, y: i32) -> Result<(), SinkError> {
            let Some((px, py)) = self.position else {
                // Sin referencia absoluta: la primera posición sólo se memoriza
                self.position = Some((x, y));
                return Ok(());
            };
            self.dev.send(relative::Position::X, x - px)?;
            self.dev.send(relative::Position::Y, y - py)?;
            self.sync()?;
            self.position = Some((x, y));
            Ok(())
        }

        fn mouse_down(&mut self) -> Result<(), SinkError> {
            self.dev.press(&controller::Controller::Mouse(controller::Mouse::Left))?;
            self.sync()
        }

        fn mouse_up(&mut self) -> Result<(), SinkError> {
            self.dev.release(&controller::Controller::Mouse(controller::Mouse::Left))?;
            self.sync()
        }

        fn click(&mut self) -> Result<(), SinkError> {
            self.button_tap(controller::Mouse::Left)
        }

        fn right_click(&mut self) -> Result<(), SinkError> {
            self.button_tap(controller::Mouse::Right)
        }

        fn double_click(&mut self) -> Result<(), SinkError> {
            self.button_tap(controller::Mouse::Left)?;
            std::thread::sleep(TAP_DELAY);
            self.button_tap(controller::Mouse::Left)
        }

        fn scroll(&mut self, direction: ScrollDirection) -> Result<(), SinkError> {
            self.dev.send(relative::Wheel::Vertical, direction.steps())?;
            self.sync()
        }

        fn press_key(&mut self, key: &str) -> Result<(), SinkError> {
            let key = parse_key(key)?;
            self.key_tap(key)
        }

        fn key_combo(&mut self, keys: &[String]) -> Result<(), SinkError> {
            let parsed = keys.iter().map(|k| parse_key(k)).collect::<Result<Vec<_>, _>>()?;
            for key in &parsed {
                self.dev.press(&keyboard::Keyboard::Key(*key))?;
                self.sync()?;
                std::thread::sleep(TAP_DELAY);
            }
            for key in parsed.iter().rev() {
                self.dev.release(&keyboard::Keyboard::Key(*key))?;
            }
            self.sync()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSink;

    impl PointerSink for FailingSink {
        fn move_to(&mut self, _x: i32, _y: i32) -> Result<(), SinkError> {
            Err(SinkError::Emit("move".into()))
        }
        fn mouse_down(&mut self) -> Result<(), SinkError> {
            Ok(())
        }
        fn mouse_up(&mut self) -> Result<(), SinkError> {
            Ok(())
        }
        fn click(&mut self) -> Result<(), SinkError> {
            Err(SinkError::Emit("click".into()))
        }
        fn right_click(&mut self) -> Result<(), SinkError> {
            Ok(())
        }
        fn double_click(&mut self) -> Result<(), SinkError> {
            Ok(())
        }
        fn scroll(&mut self, _direction: ScrollDirection) -> Result<(), SinkError> {
            Ok(())
        }
        fn press_key(&mut self, key: &str) -> Result<(), SinkError> {
            Err(SinkError::UnknownKey(key.to_string()))
        }
        fn key_combo(&mut self, _keys: &[String]) -> Result<(), SinkError> {
            Ok(())
        }
    }

    #[test]
    fn throttle_drops_small_moves() {
        let mut sink = MoveThrottle::new(RecordingSink::new());
        sink.move_to(100, 100).unwrap();
        sink.move_to(102, 101).unwrap();
        sink.move_to(103, 100).unwrap();
        sink.move_to(104, 100).unwrap();
        let moves: Vec<_> = sink.inner().moves().collect();
        assert_eq!(moves, vec![(100, 100), (104, 100)]);
    }

    #[test]
    fn throttle_passes_other_commands() {
        let mut sink = MoveThrottle::new(RecordingSink::new());
        execute(&mut sink, &PointerCommand::Click).unwrap();
        execute(&mut sink, &PointerCommand::Scroll(ScrollDirection::Down)).unwrap();
        let inner = sink.into_inner();
        assert_eq!(
            inner.commands,
            vec![PointerCommand::Click, PointerCommand::Scroll(ScrollDirection::Down)]
        );
    }

    #[test]
    fn execute_all_continues_after_failures() {
        let mut sink = FailingSink;
        let commands = vec![
            PointerCommand::MoveTo { x: 1, y: 1 },
            PointerCommand::MouseDown,
            PointerCommand::Click,
            PointerCommand::PressKey("space".into()),
            PointerCommand::MouseUp,
        ];
        assert_eq!(execute_all(&mut sink, &commands), 3);
    }

    #[test]
    fn recording_sink_keeps_order() {
        let mut sink = RecordingSink::new();
        let commands = vec![
            PointerCommand::MouseDown,
            PointerCommand::MoveTo { x: 5, y: 6 },
            PointerCommand::MouseUp,
            PointerCommand::KeyCombo(vec!["ctrl".into(), "c".into()]),
        ];
        assert_eq!(execute_all(&mut sink, &commands), 0);
        assert_eq!(sink.commands, commands);
        assert_eq!(sink.count(&PointerCommand::MouseUp), 1);
    }

    #[test]
    fn scroll_steps_are_signed() {
        assert_eq!(ScrollDirection::Up.steps(), 3);
        assert_eq!(ScrollDirection::Down.steps(), -3);
        assert_eq!(
            PointerCommand::KeyCombo(vec!["ctrl".into(), "c".into()]).to_string(),
            "key_combo(ctrl+c)"
        );
    }
}
