use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use quirocursor::actions::GestureActionMap;
use quirocursor::config::AppConfig;
use quirocursor::csv_loader::load_frames_from_csv;
use quirocursor::types::HandFrame;

/// Reproduce una grabación frame a frame, sin hilos ni dispositivo, con tiempos simulados
#[derive(Parser, Debug)]
#[command(name = "replay_csv")]
struct Args {
    csv: PathBuf,
    #[arg(long, default_value_t = 640)]
    width: u32,
    #[arg(long, default_value_t = 480)]
    height: u32,
    /// Frames por segundo simulados
    #[arg(long, default_value_t = 30.0)]
    fps: f32,
    /// Ruido uniforme (px) añadido a cada landmark
    #[arg(long, default_value_t = 0.0)]
    jitter: f32,
    /// Semilla del ruido para reproducir una corrida
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    gestures: Option<PathBuf>,
    /// Mostrar también los frames sin comandos
    #[arg(long)]
    verbose: bool,
}

fn add_jitter(frame: &mut HandFrame, amplitude: f32, rng: &mut StdRng) {
    for lm in &mut frame.landmarks {
        lm.x += rng.gen_range(-amplitude..=amplitude);
        lm.y += rng.gen_range(-amplitude..=amplitude);
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quirocursor=warn".into()),
        )
        .init();

    println!("🎞️  Reproduciendo landmarks desde {:?}", args.csv);

    let config = match &args.config {
        Some(path) => AppConfig::load(path).with_context(|| format!("Configuración inválida en {:?}", path))?,
        None => AppConfig::default(),
    };
    let actions = match &args.gestures {
        Some(path) => GestureActionMap::load_or_default(path),
        None => GestureActionMap::default(),
    };

    let mut frames = load_frames_from_csv(&args.csv, args.width, args.height)?;
    if args.jitter > 0.0 {
        let mut rng = match args.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        for frame in &mut frames {
            add_jitter(frame, args.jitter, &mut rng);
        }
        println!("🎲 Ruido de ±{:.1} px aplicado", args.jitter);
    }

    let mut pipeline = config.build_pipeline(actions);
    pipeline.start();

    let step = Duration::try_from_secs_f32(1.0 / args.fps.max(1.0)).unwrap_or(Duration::from_millis(33));
    let t0 = Instant::now();
    let mut settings = config.settings;
    let mut commands = 0usize;

    for (idx, frame) in frames.iter().enumerate() {
        let now = t0 + step * idx as u32;
        let report = pipeline.process(frame, &settings, now);

        if report.movement_toggled {
            let enabled = settings.toggle_movement();
            println!("{:>5}  🔁 movimiento {}", idx, if enabled { "activado" } else { "desactivado" });
        }

        if args.verbose || !report.commands.is_empty() {
            let target = report
                .target
                .map(|(x, y)| format!("({}, {})", x, y))
                .unwrap_or_else(|| "-".to_string());
            let cmds: Vec<String> = report.commands.iter().map(|c| c.to_string()).collect();
            println!(
                "{:>5}  {:<10} {:<6} {:<14} {}",
                idx,
                report.label(),
                report.cursor_finger.as_str(),
                target,
                cmds.join(", ")
            );
        }
        commands += report.commands.len();
    }

    for command in pipeline.stop() {
        println!("  ⏹️  {}", command);
        commands += 1;
    }

    println!("\n🏁 {} frames, {} comandos", frames.len(), commands);
    Ok(())
}
