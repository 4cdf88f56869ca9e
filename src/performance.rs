use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Niveles recientes que cuentan para la puntuación del optimizador
pub const RECENT_LEVELS: usize = 3;
const DEFAULT_ACCURACY: f32 = 50.0;
const DEFAULT_TIME_SECS: f32 = 10.0;

/// Resultado de un nivel del juego de entrenamiento
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelResult {
    pub completion_secs: f32,
    pub attempts: u32,
    pub successes: u32,
}

impl LevelResult {
    pub fn new(completion_secs: f32, attempts: u32, successes: u32) -> Self {
        Self {
            completion_secs,
            attempts,
            successes,
        }
    }

    /// Porcentaje de aciertos (0-100)
    pub fn accuracy(&self) -> f32 {
        self.successes as f32 / self.attempts.max(1) as f32 * 100.0
    }

    pub fn time_score(&self) -> f32 {
        (100.0 - self.completion_secs * 3.0).max(0.0)
    }

    pub fn score(&self) -> f32 {
        (self.time_score() + self.accuracy()) / 2.0
    }
}

/// Niveles recientes de una sesión de entrenamiento (sólo se guardan los que puntúan)
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    levels: VecDeque<LevelResult>,
    completed: usize,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, level: LevelResult) -> f32 {
        if self.levels.len() == RECENT_LEVELS {
            self.levels.pop_front();
        }
        self.levels.push_back(level);
        self.completed += 1;
        level.score()
    }

    /// Niveles completados en la sesión, incluidos los que ya no puntúan
    pub fn len(&self) -> usize {
        self.completed
    }

    pub fn recent_len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.completed == 0
    }

    pub fn clear(&mut self) {
        self.levels.clear();
        self.completed = 0;
    }

    fn recent(&self) -> impl Iterator<Item = &LevelResult> {
        self.levels.iter()
    }

    fn mean_of(&self, f: impl Fn(&LevelResult) -> f32, fallback: f32) -> f32 {
        let (sum, n) = self.recent().fold((0.0, 0usize), |(s, n), l| (s + f(l), n + 1));
        if n == 0 {
            fallback
        } else {
            sum / n as f32
        }
    }

    pub fn recent_accuracy(&self) -> f32 {
        self.mean_of(LevelResult::accuracy, DEFAULT_ACCURACY)
    }

    pub fn recent_time(&self) -> f32 {
        self.mean_of(|l| l.completion_secs, DEFAULT_TIME_SECS)
    }

    /// Puntuación que se entrega al optimizador junto con el feedback
    pub fn feedback_score(&self) -> f32 {
        self.recent_accuracy() * 50.0 / self.recent_time().max(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_score_averages_time_and_accuracy() {
        let level = LevelResult::new(10.0, 4, 3);
        assert_eq!(level.accuracy(), 75.0);
        assert_eq!(level.time_score(), 70.0);
        assert_eq!(level.score(), 72.5);
    }

    #[test]
    fn slow_level_time_score_floors_at_zero() {
        let level = LevelResult::new(60.0, 0, 0);
        assert_eq!(level.time_score(), 0.0);
        assert_eq!(level.accuracy(), 0.0);
    }

    #[test]
    fn empty_session_uses_defaults() {
        let stats = SessionStats::new();
        assert_eq!(stats.feedback_score(), 250.0);
    }

    #[test]
    fn only_last_three_levels_count() {
        let mut stats = SessionStats::new();
        stats.record(LevelResult::new(100.0, 10, 0));
        for _ in 0..3 {
            stats.record(LevelResult::new(5.0, 2, 2));
        }
        assert_eq!(stats.len(), 4);
        assert_eq!(stats.recent_len(), RECENT_LEVELS);
        assert_eq!(stats.recent_accuracy(), 100.0);
        assert_eq!(stats.recent_time(), 5.0);
        assert_eq!(stats.feedback_score(), 1000.0);
    }

    #[test]
    fn fast_levels_do_not_divide_by_less_than_one() {
        let mut stats = SessionStats::new();
        stats.record(LevelResult::new(0.2, 1, 1));
        assert_eq!(stats.feedback_score(), 5000.0);
    }

    #[test]
    fn long_session_keeps_only_recent_levels() {
        let mut stats = SessionStats::new();
        for i in 0..1000 {
            stats.record(LevelResult::new(i as f32, 1, 1));
        }
        assert_eq!(stats.len(), 1000);
        assert_eq!(stats.recent_len(), RECENT_LEVELS);
        assert_eq!(stats.recent_time(), 998.0);

        stats.clear();
        assert!(stats.is_empty());
        assert_eq!(stats.feedback_score(), 250.0);
    }
}
