use crate::settings::Settings;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Parámetros fijos del mapeo mano -> pantalla
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Margen (px) descartado en cada borde del frame; las detecciones cerca del borde son poco fiables
    pub margin_px: f32,
    /// Tamaño del historial del filtro anti-jitter
    pub jitter_window: usize,
    /// Velocidad (px/frame) a partir de la cual se aplica la aceleración
    pub acceleration_threshold_px: f32,
    pub surface_width: u32,
    pub surface_height: u32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            margin_px: 40.0,
            jitter_window: 3,
            acceleration_threshold_px: 15.0,
            surface_width: 1920,
            surface_height: 1080,
        }
    }
}

/// Estado de movimiento de una sesión. Se reinicia al empezar/parar o al perder la mano.
#[derive(Clone, Debug, Default)]
pub struct MotionState {
    prev_output: Option<(f32, f32)>,
    velocity: (f32, f32),
    history: VecDeque<(f32, f32)>,
}

impl MotionState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_seeded(&self) -> bool {
        self.prev_output.is_some()
    }

    pub fn velocity(&self) -> (f32, f32) {
        self.velocity
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn last_output(&self) -> Option<(i32, i32)> {
        self.prev_output.map(|(x, y)| (x as i32, y as i32))
    }
}

/// Detalle de un paso de mapeo (diagnóstico)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotionSample {
    /// Objetivo tras el filtro anti-jitter
    pub filtered: (f32, f32),
    /// filtered - salida anterior
    pub raw_delta: (f32, f32),
    /// Velocidad mezclada antes de la aceleración
    pub blended: (f32, f32),
    /// Velocidad final aplicada
    pub velocity: (f32, f32),
    pub accelerated: bool,
    pub output: (i32, i32),
}

/// Filtro + mapeo de la punta del dedo cursor a coordenadas de pantalla
pub struct MotionMapper {
    config: MotionConfig,
    state: MotionState,
}

impl MotionMapper {
    pub fn new(config: MotionConfig) -> Self {
        Self {
            config,
            state: MotionState::default(),
        }
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    pub fn state(&self) -> &MotionState {
        &self.state
    }

    pub fn reset(&mut self) {
        self.state.reset();
    }

    pub fn last_output(&self) -> Option<(i32, i32)> {
        self.state.last_output()
    }

    /// Mapea un punto en px del frame a la superficie de salida.
    /// Si el movimiento está desactivado o la entrada es inválida devuelve la última salida.
    pub fn map(&mut self, raw: (f32, f32), frame: (u32, u32), settings: &Settings) -> Option<(i32, i32)> {
        self.map_with_sample(raw, frame, settings)
            .map(|sample| sample.output)
            .or_else(|| self.last_output())
    }

    /// Igual que `map` pero devuelve el detalle; `None` cuando no hubo paso de mapeo
    pub fn map_with_sample(
        &mut self,
        raw: (f32, f32),
        frame: (u32, u32),
        settings: &Settings,
    ) -> Option<MotionSample> {
        if !settings.movement_enabled() {
            return None;
        }

        let (norm_x, norm_y) = self.normalize(raw, frame)?;
        let (norm_x, norm_y) = if settings.inverted() {
            (1.0 - norm_x, 1.0 - norm_y)
        } else {
            (norm_x, norm_y)
        };

        let surface_w = self.config.surface_width.max(1) as f32;
        let surface_h = self.config.surface_height.max(1) as f32;
        let target = (
            norm_x * surface_w * settings.sensitivity(),
            norm_y * surface_h * settings.sensitivity(),
        );

        let filtered = self.apply_jitter_filter(target);
        let clamp = |(x, y): (f32, f32)| (x.clamp(0.0, surface_w - 1.0), y.clamp(0.0, surface_h - 1.0));

        let Some(prev) = self.state.prev_output else {
            // Primer frame tras reset: se siembra la posición sin velocidad
            let seeded = clamp(filtered);
            self.state.prev_output = Some(seeded);
            self.state.velocity = (0.0, 0.0);
            return Some(MotionSample {
                filtered,
                raw_delta: (0.0, 0.0),
                blended: (0.0, 0.0),
                velocity: (0.0, 0.0),
                accelerated: false,
                output: (seeded.0 as i32, seeded.1 as i32),
            });
        };

        let raw_delta = (filtered.0 - prev.0, filtered.1 - prev.1);
        let s = settings.smoothing();
        let (vx_prev, vy_prev) = self.state.velocity;
        let blended = (
            vx_prev * s + raw_delta.0 * (1.0 - s),
            vy_prev * s + raw_delta.1 * (1.0 - s),
        );

        // Acelerar solo movimientos grandes, no el temblor
        let magnitude = (blended.0 * blended.0 + blended.1 * blended.1).sqrt();
        let accelerated = magnitude > self.config.acceleration_threshold_px;
        let velocity = if accelerated {
            (
                blended.0 * settings.acceleration(),
                blended.1 * settings.acceleration(),
            )
        } else {
            blended
        };

        let output = clamp((prev.0 + velocity.0, prev.1 + velocity.1));
        self.state.velocity = velocity;
        self.state.prev_output = Some(output);

        Some(MotionSample {
            filtered,
            raw_delta,
            blended,
            velocity,
            accelerated,
            output: (output.0 as i32, output.1 as i32),
        })
    }

    /// Normaliza a [0, 1] descontando el margen; `None` si la entrada no es usable
    fn normalize(&self, raw: (f32, f32), frame: (u32, u32)) -> Option<(f32, f32)> {
        if !raw.0.is_finite() || !raw.1.is_finite() {
            return None;
        }

        let margin = self.config.margin_px;
        let effective_w = frame.0 as f32 - 2.0 * margin;
        let effective_h = frame.1 as f32 - 2.0 * margin;
        if effective_w <= 0.0 || effective_h <= 0.0 {
            return None;
        }

        Some((
            ((raw.0 - margin) / effective_w).clamp(0.0, 1.0),
            ((raw.1 - margin) / effective_h).clamp(0.0, 1.0),
        ))
    }

    /// Media ponderada del historial, pesos lineales de 0.3 (antiguo) a 1.0 (reciente)
    fn apply_jitter_filter(&mut self, point: (f32, f32)) -> (f32, f32) {
        self.state.history.push_back(point);
        while self.state.history.len() > self.config.jitter_window.max(1) {
            self.state.history.pop_front();
        }

        let n = self.state.history.len();
        if n < 2 {
            return point;
        }

        let step = 0.7 / (n - 1) as f32;
        let mut weight_sum = 0.0;
        let mut acc = (0.0, 0.0);
        for (i, (x, y)) in self.state.history.iter().enumerate() {
            let w = 0.3 + step * i as f32;
            acc.0 += x * w;
            acc.1 += y * w;
            weight_sum += w;
        }

        (acc.0 / weight_sum, acc.1 / weight_sum)
    }
}

impl Default for MotionMapper {
    fn default() -> Self {
        Self::new(MotionConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: (u32, u32) = (640, 480);

    fn mapper() -> MotionMapper {
        MotionMapper::new(MotionConfig::default())
    }

    #[test]
    fn first_call_seeds_position_without_jump() {
        let mut m = mapper();
        let s = Settings::default();
        let sample = m.map_with_sample((320.0, 240.0), FRAME, &s).unwrap();
        assert_eq!(sample.velocity, (0.0, 0.0));
        // (320-40)/560 = 0.5 -> 960; (240-40)/400 = 0.5 -> 540
        assert_eq!(sample.output, (960, 540));
        assert!(m.state().is_seeded());
    }

    #[test]
    fn margins_clip_to_surface_edges() {
        let mut m = mapper();
        let s = Settings::default();
        assert_eq!(m.map((10.0, 5.0), FRAME, &s), Some((0, 0)));

        m.reset();
        assert_eq!(m.map((639.0, 479.0), FRAME, &s), Some((1919, 1079)));
    }

    #[test]
    fn inversion_mirrors_both_axes() {
        let mut m = mapper();
        let mut s = Settings::default();
        s.set_inverted(true);
        assert_eq!(m.map((40.0, 40.0), FRAME, &s), Some((1919, 1079)));
    }

    #[test]
    fn disabled_movement_returns_last_output() {
        let mut m = mapper();
        let mut s = Settings::default();
        let first = m.map((320.0, 240.0), FRAME, &s);

        s.set_movement_enabled(false);
        assert_eq!(m.map((600.0, 400.0), FRAME, &s), first);
        assert_eq!(m.state().history_len(), 1);
    }

    #[test]
    fn disabled_before_seed_gives_nothing() {
        let mut m = mapper();
        let mut s = Settings::default();
        s.set_movement_enabled(false);
        assert_eq!(m.map((320.0, 240.0), FRAME, &s), None);
    }

    #[test]
    fn malformed_input_is_a_noop() {
        let mut m = mapper();
        let s = Settings::default();
        let first = m.map((320.0, 240.0), FRAME, &s);
        assert_eq!(m.map((f32::NAN, 10.0), FRAME, &s), first);
        assert_eq!(m.map((100.0, 100.0), (60, 60), &s), first);
    }

    #[test]
    fn jitter_filter_weights_newest_most() {
        let mut m = mapper();
        m.apply_jitter_filter((0.0, 0.0));
        let filtered = m.apply_jitter_filter((100.0, 0.0));
        // pesos 0.3 y 1.0 -> 100 * 1.0 / 1.3
        assert!((filtered.0 - 76.923).abs() < 0.01);

        let filtered = m.apply_jitter_filter((100.0, 0.0));
        // pesos 0.3, 0.65, 1.0 sobre [0, 100, 100]
        assert!((filtered.0 - 165.0 / 1.95).abs() < 0.01);
        assert_eq!(m.state().history_len(), 3);

        m.apply_jitter_filter((100.0, 0.0));
        assert_eq!(m.state().history_len(), 3);
    }

    #[test]
    fn small_motion_is_not_accelerated() {
        let mut m = mapper();
        let mut s = Settings::default();
        s.set_acceleration(3.0);
        m.map((320.0, 240.0), FRAME, &s);
        // 1 px de frame ~ 3.4 px de pantalla: por debajo del umbral de 15 px
        let sample = m.map_with_sample((321.0, 240.0), FRAME, &s).unwrap();
        assert!(!sample.accelerated);
        assert_eq!(sample.velocity, sample.blended);
    }

    #[test]
    fn large_motion_is_accelerated() {
        let mut m = mapper();
        let mut s = Settings::default();
        s.set_smoothing(0.1);
        s.set_acceleration(2.0);
        m.map((100.0, 240.0), FRAME, &s);
        let sample = m.map_with_sample((300.0, 240.0), FRAME, &s).unwrap();
        assert!(sample.accelerated);
        assert!((sample.velocity.0 - sample.blended.0 * 2.0).abs() < 1e-3);
        assert!(sample.output.0 > 343);
    }

    #[test]
    fn velocity_blends_with_previous() {
        let mut m = mapper();
        let mut s = Settings::default();
        s.set_smoothing(0.5);
        m.map((320.0, 240.0), FRAME, &s);
        let sample = m.map_with_sample((322.0, 240.0), FRAME, &s).unwrap();
        // velocidad previa 0: la mezcla es la mitad del delta
        assert!((sample.blended.0 - sample.raw_delta.0 * 0.5).abs() < 1e-4);
    }

    #[test]
    fn output_stays_inside_surface() {
        let mut m = mapper();
        let mut s = Settings::default();
        s.set_sensitivity(2.0);
        s.set_acceleration(3.0);
        s.set_smoothing(0.1);
        for i in 0..30 {
            let x = if i % 2 == 0 { 40.0 } else { 600.0 };
            let (ox, oy) = m.map((x, 400.0), FRAME, &s).unwrap();
            assert!((0..1920).contains(&ox));
            assert!((0..1080).contains(&oy));
        }
    }

    #[test]
    fn reset_forgets_session() {
        let mut m = mapper();
        let s = Settings::default();
        m.map((320.0, 240.0), FRAME, &s);
        m.map((330.0, 240.0), FRAME, &s);
        m.reset();
        assert!(!m.state().is_seeded());
        assert_eq!(m.state().history_len(), 0);
        assert_eq!(m.state().velocity(), (0.0, 0.0));
        assert_eq!(m.last_output(), None);
    }
}
