use std::collections::VecDeque;
use std::path::Path;

use thiserror::Error;

use crate::csv_loader::load_frames_from_csv;
use crate::types::{HandFrame, Landmark};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("frame de {width}x{height} con {len} bytes (se esperaban {expected})")]
    FrameSize {
        width: u32,
        height: u32,
        len: usize,
        expected: usize,
    },
    #[error("lectura de frame fallida: {0}")]
    Read(String),
    #[error("detector de mano fallido: {0}")]
    Detector(String),
}

/// Imagen RGB de 8 bits, `width * height * 3` bytes
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Frame {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, SourceError> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected || expected == 0 {
            return Err(SourceError::FrameSize {
                width,
                height,
                len: data.len(),
                expected,
            });
        }
        Ok(Self { width, height, data })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Cámara u otra fuente de vídeo. No bloqueante: `Ok(None)` si aún no hay frame.
pub trait FrameSource {
    fn get_frame(&mut self) -> Result<Option<Frame>, SourceError>;
}

/// Detector de landmarks: `Ok(None)` si no hay mano en el frame
pub trait HandLandmarker {
    fn detect(&mut self, frame: &Frame) -> Result<Option<Vec<Landmark>>, SourceError>;
}

/// Resultado de consultar una fuente de landmarks
#[derive(Debug, Clone, PartialEq)]
pub enum Poll {
    Frame(HandFrame),
    /// Todavía no hay datos; reintentar más tarde
    Pending,
    /// La fuente terminó (fin de grabación)
    Exhausted,
}

/// Lo que consulta el worker en cada iteración
pub trait LandmarkSource {
    fn poll(&mut self) -> Result<Poll, SourceError>;
}

/// Cámara + detector compuestos en una fuente de landmarks
pub struct CameraLandmarks<F, H> {
    frames: F,
    landmarker: H,
}

impl<F: FrameSource, H: HandLandmarker> CameraLandmarks<F, H> {
    pub fn new(frames: F, landmarker: H) -> Self {
        Self { frames, landmarker }
    }
}

impl<F: FrameSource, H: HandLandmarker> LandmarkSource for CameraLandmarks<F, H> {
    fn poll(&mut self) -> Result<Poll, SourceError> {
        let Some(frame) = self.frames.get_frame()? else {
            return Ok(Poll::Pending);
        };

        let hand = match self.landmarker.detect(&frame)? {
            Some(landmarks) => HandFrame::new(frame.width(), frame.height(), landmarks),
            None => HandFrame::empty(frame.width(), frame.height()),
        };
        Ok(Poll::Frame(hand))
    }
}

/// Reproduce landmarks grabados, un frame por consulta
#[derive(Debug, Clone, Default)]
pub struct ReplaySource {
    frames: VecDeque<HandFrame>,
}

impl ReplaySource {
    pub fn new(frames: Vec<HandFrame>) -> Self {
        Self {
            frames: frames.into(),
        }
    }

    pub fn from_csv(path: impl AsRef<Path>, width: u32, height: u32) -> anyhow::Result<Self> {
        Ok(Self::new(load_frames_from_csv(path, width, height)?))
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl LandmarkSource for ReplaySource {
    fn poll(&mut self) -> Result<Poll, SourceError> {
        Ok(match self.frames.pop_front() {
            Some(frame) => Poll::Frame(frame),
            None => Poll::Exhausted,
        })
    }
}

impl<T: LandmarkSource + ?Sized> LandmarkSource for Box<T> {
    fn poll(&mut self) -> Result<Poll, SourceError> {
        (**self).poll()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture_classifier::synthetic;

    /// Alterna: sin frame, frame con mano, frame sin mano, error de lectura
    struct ScriptedCamera {
        step: usize,
    }

    impl FrameSource for ScriptedCamera {
        fn get_frame(&mut self) -> Result<Option<Frame>, SourceError> {
            self.step += 1;
            match self.step {
                1 => Ok(None),
                2 | 3 => Frame::new(4, 2, vec![self.step as u8; 24]).map(Some),
                _ => Err(SourceError::Read("cámara desconectada".into())),
            }
        }
    }

    /// "Detecta" mano si el primer byte es par
    struct ParityLandmarker;

    impl HandLandmarker for ParityLandmarker {
        fn detect(&mut self, frame: &Frame) -> Result<Option<Vec<Landmark>>, SourceError> {
            Ok((frame.data()[0] % 2 == 0).then(|| synthetic::point((2.0, 1.0))))
        }
    }

    #[test]
    fn frame_size_is_checked() {
        assert!(Frame::new(2, 2, vec![0; 12]).is_ok());
        assert!(matches!(
            Frame::new(2, 2, vec![0; 11]),
            Err(SourceError::FrameSize { expected: 12, .. })
        ));
        assert!(Frame::new(0, 0, Vec::new()).is_err());
    }

    #[test]
    fn camera_landmarks_composes_source_and_detector() {
        let mut source = CameraLandmarks::new(ScriptedCamera { step: 0 }, ParityLandmarker);
        assert_eq!(source.poll().unwrap(), Poll::Pending);

        match source.poll().unwrap() {
            Poll::Frame(hand) => {
                assert_eq!((hand.width, hand.height), (4, 2));
                assert_eq!(hand.landmarks.len(), 21);
            }
            other => panic!("se esperaba frame, llegó {:?}", other),
        }

        assert_eq!(source.poll().unwrap(), Poll::Frame(HandFrame::empty(4, 2)));
        assert!(matches!(source.poll(), Err(SourceError::Read(_))));
    }

    #[test]
    fn replay_source_drains_then_exhausts() {
        let mut source = ReplaySource::new(vec![HandFrame::empty(640, 480); 2]);
        assert_eq!(source.remaining(), 2);
        assert!(matches!(source.poll().unwrap(), Poll::Frame(_)));
        assert!(matches!(source.poll().unwrap(), Poll::Frame(_)));
        assert_eq!(source.poll().unwrap(), Poll::Exhausted);
        assert_eq!(source.poll().unwrap(), Poll::Exhausted);
    }
}
