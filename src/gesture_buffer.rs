use std::collections::VecDeque;

/// Tamaño de ventana por defecto para el anti-rebote del pinch
pub const DEFAULT_STABILITY_WINDOW: usize = 3;

/// Buffer circular de detecciones booleanas para anti-rebote.
/// Al insertar con la ventana llena se descarta la más antigua.
#[derive(Debug, Clone)]
pub struct StabilityWindow {
    buffer: VecDeque<bool>,
    capacity: usize,
    min_true: usize,
}

impl StabilityWindow {
    /// Ventana de tamaño `capacity` que exige `capacity - 1` positivos
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self::with_min_true(capacity, capacity.saturating_sub(1))
    }

    pub fn with_min_true(capacity: usize, min_true: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity,
            min_true: min_true.min(capacity),
        }
    }

    /// Añade una detección nueva
    pub fn push(&mut self, detected: bool) {
        self.buffer.push_back(detected);

        if self.buffer.len() > self.capacity {
            self.buffer.pop_front();
        }
    }

    pub fn is_full(&self) -> bool {
        self.buffer.len() >= self.capacity
    }

    pub fn true_count(&self) -> usize {
        self.buffer.iter().filter(|&&v| v).count()
    }

    /// Estable = ventana llena y al menos `min_true` positivos
    pub fn is_stable(&self) -> bool {
        self.is_full() && self.true_count() >= self.min_true
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for StabilityWindow {
    fn default() -> Self {
        Self::new(DEFAULT_STABILITY_WINDOW)
    }
}
