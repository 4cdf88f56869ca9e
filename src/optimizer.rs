use crate::config::ConfigError;
use crate::settings::MotionParams;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

/// Valoración cualitativa del usuario tras un nivel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feedback {
    MuchFaster,
    Faster,
    Perfect,
    Slower,
    MuchSlower,
    Sharper,
    Smoother,
    Unknown,
}

impl Feedback {
    /// Etiquetas desconocidas -> `Unknown` (peso neutro)
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "much_faster" => Self::MuchFaster,
            "faster" => Self::Faster,
            "perfect" => Self::Perfect,
            "slower" => Self::Slower,
            "much_slower" => Self::MuchSlower,
            "sharper" => Self::Sharper,
            "smoother" => Self::Smoother,
            _ => Self::Unknown,
        }
    }

    pub fn weight(self) -> f32 {
        match self {
            Self::MuchFaster => 1.5,
            Self::Faster => 1.2,
            Self::Perfect => 2.0,
            Self::Slower => 0.8,
            Self::MuchSlower => 0.6,
            Self::Sharper => 1.3,
            Self::Smoother => 1.1,
            Self::Unknown => 1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MuchFaster => "much_faster",
            Self::Faster => "faster",
            Self::Perfect => "perfect",
            Self::Slower => "slower",
            Self::MuchSlower => "much_slower",
            Self::Sharper => "sharper",
            Self::Smoother => "smoother",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Feedback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Punto discretizado a 2 decimales
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DedupKey([i32; 3]);

impl From<MotionParams> for DedupKey {
    fn from(p: MotionParams) -> Self {
        let q = |v: f32| (v * 100.0).round() as i32;
        Self([q(p.sensitivity), q(p.smoothing), q(p.acceleration)])
    }
}

impl From<DedupKey> for MotionParams {
    fn from(key: DedupKey) -> Self {
        let [s, sm, a] = key.0;
        MotionParams::new(s as f32 / 100.0, sm as f32 / 100.0, a as f32 / 100.0)
    }
}

/// Dentro de rango y exactamente sobre la rejilla de 2 decimales
fn snapped(p: MotionParams) -> MotionParams {
    DedupKey::from(p.clamped()).into()
}

/// Candidatos pendientes en orden FIFO + conjunto de visitados
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Frontier {
    queue: VecDeque<(MotionParams, f32)>,
    visited: HashSet<DedupKey>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encola si la clave no se ha visto; devuelve si se encoló
    pub fn offer(&mut self, candidate: MotionParams, seed_score: f32) -> bool {
        if !self.visited.insert(DedupKey::from(candidate)) {
            return false;
        }
        self.queue.push_back((candidate, seed_score));
        true
    }

    /// Marca un punto como visto sin encolarlo
    pub fn mark_visited(&mut self, point: MotionParams) {
        self.visited.insert(DedupKey::from(point));
    }

    pub fn pop(&mut self) -> Option<(MotionParams, f32)> {
        self.queue.pop_front()
    }

    pub fn is_visited(&self, point: MotionParams) -> bool {
        self.visited.contains(&DedupKey::from(point))
    }

    pub fn candidates(&self) -> impl Iterator<Item = MotionParams> + '_ {
        self.queue.iter().map(|(p, _)| *p)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn visited_len(&self) -> usize {
        self.visited.len()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.visited.clear();
    }
}

/// Entrada del historial de optimización
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationRecord {
    pub evaluated: MotionParams,
    pub raw_score: f32,
    pub feedback: Feedback,
    pub adjusted_score: f32,
    pub promoted: bool,
    pub next: MotionParams,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Paso por dimensión al generar vecinos
    pub steps: MotionParams,
    pub initial: MotionParams,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            steps: MotionParams::new(0.1, 0.05, 0.1),
            initial: MotionParams::default(),
        }
    }
}

/// Estado de la búsqueda que sobrevive entre envíos de feedback (se guarda en JSON)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerState {
    pub best: MotionParams,
    pub best_score: f32,
    /// Punto en evaluación (el último devuelto)
    pub current: MotionParams,
    pub frontier: Frontier,
    pub history: Vec<OptimizationRecord>,
}

impl OptimizerState {
    fn starting_at(initial: MotionParams) -> Self {
        let initial = snapped(initial);
        let mut frontier = Frontier::new();
        frontier.mark_visited(initial);
        Self {
            best: initial,
            best_score: 0.0,
            current: initial,
            frontier,
            history: Vec::new(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = self.to_json_string()?;
        std::fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Búsqueda local en anchura sobre (sensibilidad, suavizado, aceleración) guiada por feedback.
///
/// Cada petición evalúa el punto actual con la puntuación recibida, encola sus vecinos
/// no visitados y devuelve el siguiente candidato de la frontera (o el mejor si está vacía).
/// Todos los puntos devueltos caen sobre la rejilla de 2 decimales.
pub struct ParameterOptimizer {
    config: OptimizerConfig,
    state: OptimizerState,
}

impl ParameterOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self {
            config,
            state: OptimizerState::starting_at(config.initial),
        }
    }

    /// Retoma una búsqueda guardada. Los puntos se vuelven a llevar a rango y a la rejilla.
    pub fn from_state(config: OptimizerConfig, mut state: OptimizerState) -> Self {
        state.best = snapped(state.best);
        state.current = snapped(state.current);
        if !state.best_score.is_finite() || state.best_score < 0.0 {
            state.best_score = 0.0;
        }
        state.frontier.mark_visited(state.best);
        state.frontier.mark_visited(state.current);
        Self { config, state }
    }

    pub fn state(&self) -> &OptimizerState {
        &self.state
    }

    pub fn into_state(self) -> OptimizerState {
        self.state
    }

    pub fn best(&self) -> MotionParams {
        self.state.best
    }

    pub fn best_score(&self) -> f32 {
        self.state.best_score
    }

    /// Punto que se está evaluando (el último devuelto)
    pub fn current(&self) -> MotionParams {
        self.state.current
    }

    pub fn frontier(&self) -> &Frontier {
        &self.state.frontier
    }

    pub fn history(&self) -> &[OptimizationRecord] {
        &self.state.history
    }

    /// Fija el punto en evaluación (p. ej. los ajustes que el usuario tiene activos)
    pub fn set_current(&mut self, params: MotionParams) {
        self.state.current = snapped(params);
        self.state.frontier.mark_visited(self.state.current);
    }

    pub fn reset(&mut self) {
        self.state = OptimizerState::starting_at(self.config.initial);
    }

    /// ±1 paso por dimensión, limitado al rango
    fn neighbors(&self, p: MotionParams) -> [MotionParams; 6] {
        let s = self.config.steps;
        [
            MotionParams { sensitivity: p.sensitivity + s.sensitivity, ..p },
            MotionParams { sensitivity: p.sensitivity - s.sensitivity, ..p },
            MotionParams { smoothing: p.smoothing + s.smoothing, ..p },
            MotionParams { smoothing: p.smoothing - s.smoothing, ..p },
            MotionParams { acceleration: p.acceleration + s.acceleration, ..p },
            MotionParams { acceleration: p.acceleration - s.acceleration, ..p },
        ]
        .map(snapped)
    }

    /// Procesa una puntuación + feedback y devuelve los próximos ajustes a probar
    pub fn optimize(&mut self, raw_score: f32, feedback: Feedback) -> MotionParams {
        let raw_score = if raw_score.is_finite() { raw_score.max(0.0) } else { 0.0 };
        let evaluated = self.state.current;

        let mut enqueued = 0;
        for neighbor in self.neighbors(evaluated) {
            if self.state.frontier.offer(neighbor, raw_score) {
                enqueued += 1;
            }
        }

        let adjusted_score = raw_score * feedback.weight();
        let promoted = adjusted_score > self.state.best_score;
        if promoted {
            self.state.best = evaluated;
            self.state.best_score = adjusted_score;
            info!(
                "🏆 Nuevos mejores ajustes: S={:.2}, Sm={:.2}, A={:.2} (puntuación {:.2})",
                evaluated.sensitivity, evaluated.smoothing, evaluated.acceleration, adjusted_score
            );
        }

        let next = match self.state.frontier.pop() {
            Some((candidate, _seed)) => candidate,
            None => self.state.best,
        };
        self.state.current = next;

        debug!(
            "🔎 feedback={} ajustada={:.2} vecinos nuevos={} frontera={}",
            feedback,
            adjusted_score,
            enqueued,
            self.state.frontier.len()
        );

        self.state.history.push(OptimizationRecord {
            evaluated,
            raw_score,
            feedback,
            adjusted_score,
            promoted,
            next,
        });

        next
    }
}

impl Default for ParameterOptimizer {
    fn default() -> Self {
        Self::new(OptimizerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: MotionParams, b: MotionParams) -> bool {
        DedupKey::from(a) == DedupKey::from(b)
    }

    #[test]
    fn feedback_labels_map_to_weights() {
        assert_eq!(Feedback::parse("perfect").weight(), 2.0);
        assert_eq!(Feedback::parse("MUCH_SLOWER").weight(), 0.6);
        assert_eq!(Feedback::parse("smoother"), Feedback::Smoother);
        assert_eq!(Feedback::parse("meh"), Feedback::Unknown);
        assert_eq!(Feedback::parse("").weight(), 1.0);
    }

    #[test]
    fn first_request_explores_in_fifo_order() {
        let mut opt = ParameterOptimizer::default();
        let next = opt.optimize(10.0, Feedback::Unknown);
        assert!(close(next, MotionParams::new(1.1, 0.3, 1.5)));
        assert_eq!(opt.frontier().len(), 5);

        let next = opt.optimize(10.0, Feedback::Unknown);
        assert!(close(next, MotionParams::new(0.9, 0.3, 1.5)));
    }

    #[test]
    fn neighbors_are_deduplicated() {
        let mut opt = ParameterOptimizer::default();
        opt.optimize(10.0, Feedback::Unknown);
        // seed + 6 vecinos
        assert_eq!(opt.frontier().visited_len(), 7);

        // desde (1.1, 0.3, 1.5) el vecino (1.0, 0.3, 1.5) ya está visto
        opt.optimize(10.0, Feedback::Unknown);
        assert_eq!(opt.frontier().visited_len(), 12);
        assert_eq!(opt.frontier().len(), 5 - 1 + 5);
    }

    #[test]
    fn clamped_neighbors_collapse_onto_visited_point() {
        let mut opt = ParameterOptimizer::default();
        opt.set_current(MotionParams::new(2.0, 0.8, 3.0));
        opt.optimize(10.0, Feedback::Unknown);
        // sólo los 3 vecinos hacia abajo son nuevos
        assert_eq!(opt.frontier().len(), 2);
        assert!(close(opt.current(), MotionParams::new(1.9, 0.8, 3.0)));
    }

    #[test]
    fn promotion_requires_beating_best() {
        let mut opt = ParameterOptimizer::default();
        let evaluated = opt.current();
        opt.optimize(80.0, Feedback::Perfect);
        assert_eq!(opt.best_score(), 160.0);
        assert_eq!(opt.best(), evaluated);

        let second = opt.current();
        opt.optimize(10.0, Feedback::MuchSlower);
        assert_eq!(opt.best_score(), 160.0);
        assert_eq!(opt.best(), evaluated);
        assert_ne!(opt.best(), second);
        assert!(opt.history()[0].promoted);
        assert!(!opt.history()[1].promoted);
    }

    #[test]
    fn lower_adjusted_score_does_not_replace_best() {
        let mut opt = ParameterOptimizer::default();
        opt.optimize(50.0, Feedback::Unknown);
        assert_eq!(opt.best_score(), 50.0);
        opt.optimize(10.0, Feedback::MuchSlower);
        assert_eq!(opt.best_score(), 50.0);
    }

    #[test]
    fn invalid_scores_count_as_zero() {
        let mut opt = ParameterOptimizer::default();
        opt.optimize(-20.0, Feedback::Perfect);
        opt.optimize(f32::NAN, Feedback::Perfect);
        assert_eq!(opt.best_score(), 0.0);
        assert_eq!(opt.history()[0].raw_score, 0.0);
        assert_eq!(opt.history()[1].adjusted_score, 0.0);
        assert!(opt.history().iter().all(|r| !r.promoted));
    }

    #[test]
    fn empty_frontier_returns_best() {
        let mut opt = ParameterOptimizer::new(OptimizerConfig {
            steps: MotionParams::new(0.0, 0.0, 0.0),
            initial: MotionParams::default(),
        });
        let next = opt.optimize(30.0, Feedback::Faster);
        assert_eq!(next, opt.best());
        assert_eq!(opt.best_score(), 36.0);
        assert!(opt.frontier().is_empty());
    }

    #[test]
    fn every_request_is_recorded() {
        let mut opt = ParameterOptimizer::default();
        for score in [10.0, 20.0, 5.0] {
            opt.optimize(score, Feedback::Sharper);
        }
        assert_eq!(opt.history().len(), 3);
        assert_eq!(opt.history()[1].evaluated, opt.history()[0].next);

        opt.reset();
        assert!(opt.history().is_empty());
        assert_eq!(opt.best_score(), 0.0);
    }

    #[test]
    fn suggestions_stay_in_range() {
        let mut opt = ParameterOptimizer::default();
        for i in 0..200 {
            let p = opt.optimize(i as f32, Feedback::Faster);
            assert!((0.3..=2.0).contains(&p.sensitivity));
            assert!((0.1..=0.8).contains(&p.smoothing));
            assert!((1.0..=3.0).contains(&p.acceleration));
        }
    }

    #[test]
    fn repeated_request_from_same_point_adds_nothing() {
        let mut opt = ParameterOptimizer::default();
        let p = MotionParams::new(1.2, 0.4, 2.0);

        opt.set_current(p);
        opt.optimize(10.0, Feedback::Unknown);
        let visited = opt.frontier().visited_len();

        opt.set_current(p);
        opt.optimize(10.0, Feedback::Unknown);
        assert_eq!(opt.frontier().visited_len(), visited);

        let keys: Vec<DedupKey> = opt.frontier().candidates().map(DedupKey::from).collect();
        let unique: HashSet<DedupKey> = keys.iter().copied().collect();
        assert_eq!(keys.len(), unique.len());
    }

    #[test]
    fn suggestions_sit_exactly_on_two_decimal_grid() {
        let mut opt = ParameterOptimizer::default();
        // siempre se explora primero +sensibilidad
        opt.set_current(MotionParams::new(1.0, 0.3, 1.5));
        let mut next = opt.current();
        for _ in 0..3 {
            opt.set_current(next);
            next = opt.optimize(10.0, Feedback::Unknown);
            opt.state.frontier.clear();
        }
        assert_eq!(next.sensitivity, 1.3);
        assert_eq!(serde_json::to_string(&next.sensitivity).unwrap(), "1.3");

        opt.set_current(MotionParams::new(1.234_567, 0.3, 1.5));
        assert_eq!(opt.current().sensitivity, 1.23);
    }

    #[test]
    fn saved_state_continues_the_same_search() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("optimizer_state.json");

        let mut continuous = ParameterOptimizer::default();
        continuous.optimize(40.0, Feedback::Perfect);
        continuous.optimize(40.0, Feedback::MuchSlower);

        let mut first = ParameterOptimizer::default();
        first.optimize(40.0, Feedback::Perfect);
        first.state().save(&path).unwrap();

        let mut second = ParameterOptimizer::from_state(OptimizerConfig::default(), OptimizerState::load(&path).unwrap());
        assert_eq!(second.frontier().visited_len(), 7);
        assert_eq!(second.best_score(), 80.0);
        let next = second.optimize(40.0, Feedback::MuchSlower);

        assert_eq!(next, continuous.current());
        assert_eq!(second.frontier().visited_len(), continuous.frontier().visited_len());
        assert_eq!(second.best_score(), 80.0);
        assert_eq!(second.history().len(), 2);
        assert!(!second.history()[1].promoted);
    }
}
