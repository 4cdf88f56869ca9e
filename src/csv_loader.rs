use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use csv::{ReaderBuilder, WriterBuilder};

use crate::types::{HandFrame, Landmark, NUM_LANDMARKS};

/// Carga una grabación de landmarks desde un CSV en el formato
/// frame,id,x,y (coordenadas en píxeles del frame original).
/// Los frames sin filas quedan como frames sin mano.
pub fn load_frames_from_csv(path: impl AsRef<Path>, width: u32, height: u32) -> Result<Vec<HandFrame>> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("No se pudo abrir el CSV {:?}", path))?;

    let mut frames: BTreeMap<usize, Vec<Landmark>> = BTreeMap::new();

    for (row_idx, result) in reader.records().enumerate() {
        let row = row_idx + 1;
        let record = result.with_context(|| format!("Fila {} inválida en {:?}", row, path))?;
        if record.len() < 4 {
            bail!("La fila {} no tiene 4 columnas", row);
        }

        let frame: usize = record[0]
            .parse()
            .with_context(|| format!("frame inválido en fila {}", row))?;
        let id: usize = record[1]
            .parse()
            .with_context(|| format!("id inválido en fila {}", row))?;
        if id >= NUM_LANDMARKS {
            bail!("Landmark {} fuera de rango (fila {})", id, row);
        }

        let x: f32 = record[2]
            .parse()
            .with_context(|| format!("x inválida en fila {}", row))?;
        let y: f32 = record[3]
            .parse()
            .with_context(|| format!("y inválida en fila {}", row))?;

        let landmarks = frames.entry(frame).or_default();
        if landmarks.iter().any(|lm| lm.id == id) {
            bail!("Landmark {} repetido en el frame {} (fila {})", id, frame, row);
        }
        landmarks.push(Landmark::new(id, x, y));
    }

    let Some(&max_frame) = frames.keys().next_back() else {
        bail!("El CSV {:?} no contiene datos", path);
    };

    let mut out = Vec::with_capacity(max_frame + 1);
    for frame_idx in 0..=max_frame {
        match frames.remove(&frame_idx) {
            Some(mut landmarks) => {
                landmarks.sort_by_key(|lm| lm.id);
                out.push(HandFrame::new(width, height, landmarks));
            }
            // Hueco en la grabación = no se detectó mano
            None => out.push(HandFrame::empty(width, height)),
        }
    }

    Ok(out)
}

/// Escribe frames en el mismo formato que lee `load_frames_from_csv`
pub fn write_frames_csv<W: Write>(writer: W, frames: &[HandFrame]) -> Result<()> {
    let mut wtr = WriterBuilder::new().from_writer(writer);
    wtr.write_record(["frame", "id", "x", "y"])?;
    for (idx, frame) in frames.iter().enumerate() {
        for lm in &frame.landmarks {
            wtr.write_record(&[
                idx.to_string(),
                lm.id.to_string(),
                lm.x.to_string(),
                lm.y.to_string(),
            ])?;
        }
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gesture_classifier::synthetic;
    use std::io::Write as _;

    #[test]
    fn gaps_become_empty_frames() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "frame,id,x,y").unwrap();
        writeln!(file, "0,1,10.5,20").unwrap();
        writeln!(file, "0,0,1,2").unwrap();
        writeln!(file, "2,0,3,4").unwrap();

        let frames = load_frames_from_csv(file.path(), 640, 480).unwrap();
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].landmarks[0], Landmark::new(0, 1.0, 2.0));
        assert_eq!(frames[0].landmarks[1], Landmark::new(1, 10.5, 20.0));
        assert!(frames[1].landmarks.is_empty());
        assert_eq!(frames[1].width, 640);
        assert_eq!(frames[2].landmarks.len(), 1);
    }

    #[test]
    fn rejects_out_of_range_and_duplicate_ids() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "frame,id,x,y\n0,21,1,1").unwrap();
        assert!(load_frames_from_csv(file.path(), 640, 480).is_err());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "frame,id,x,y\n0,3,1,1\n0,3,2,2").unwrap();
        assert!(load_frames_from_csv(file.path(), 640, 480).is_err());
    }

    #[test]
    fn empty_csv_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "frame,id,x,y").unwrap();
        assert!(load_frames_from_csv(file.path(), 640, 480).is_err());
    }

    #[test]
    fn written_recording_loads_back() {
        let frames = vec![
            HandFrame::new(640, 480, synthetic::point((320.0, 400.0))),
            HandFrame::empty(640, 480),
            HandFrame::new(640, 480, synthetic::fist((300.0, 380.0))),
        ];
        let file = tempfile::NamedTempFile::new().unwrap();
        write_frames_csv(file.as_file(), &frames).unwrap();

        let loaded = load_frames_from_csv(file.path(), 640, 480).unwrap();
        assert_eq!(loaded, frames);
    }
}
