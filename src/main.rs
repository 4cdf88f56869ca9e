/*
Control del cursor por gestos de mano - Rust

Sistema que:
1. Recibe landmarks de la mano (21 puntos por frame) desde una fuente
2. Clasifica el gesto con anti-rebote del pinch
3. Suaviza y mapea la punta del dedo cursor a la pantalla
4. Despacha clicks / arrastre / scroll / teclas según el mapeo de gestos
5. Ajusta sensibilidad, suavizado y aceleración a partir del feedback del usuario

Reproducir una grabación (sin dispositivo, sólo log):
     ./target/release/quirocursor run grabacion.csv

Con ratón virtual real (compilar con --features uinput):
     sg input -c './target/release/quirocursor run grabacion.csv --uinput'

Auto-ajuste tras un nivel de entrenamiento:
     ./target/release/quirocursor tune --feedback faster --level 12.5:10:8
*/

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use quirocursor::actions::GestureActionMap;
use quirocursor::config::AppConfig;
use quirocursor::hid::{LogSink, MoveThrottle, PointerSink};
use quirocursor::optimizer::{Feedback, OptimizerState};
use quirocursor::performance::{LevelResult, SessionStats};
use quirocursor::settings::SharedSettings;
use quirocursor::source::ReplaySource;
use quirocursor::types::GestureLabel;
use quirocursor::worker::{TrackingWorker, WorkerEvent};

const DEFAULT_GESTURES_FILE: &str = "gesture_settings.json";
const DEFAULT_OPTIMIZER_STATE_FILE: &str = "optimizer_state.json";

#[derive(Parser, Debug)]
#[command(name = "quirocursor", about = "Control del cursor por gestos de mano")]
struct Cli {
    /// Archivo de configuración JSON (por defecto, valores de fábrica)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reproduce una grabación de landmarks (frame,id,x,y) a través del pipeline
    Run {
        csv: PathBuf,
        #[arg(long, default_value_t = 640)]
        width: u32,
        #[arg(long, default_value_t = 480)]
        height: u32,
        /// Mapeo gesto -> acción
        #[arg(long, default_value = DEFAULT_GESTURES_FILE)]
        gestures: PathBuf,
        /// Emitir eventos reales por /dev/uinput
        #[arg(long)]
        uinput: bool,
    },
    /// Propone los siguientes ajustes a partir de la puntuación y el feedback
    Tune {
        /// much_faster, faster, perfect, slower, much_slower, sharper, smoother
        #[arg(long)]
        feedback: String,
        /// Puntuación directa (si no se dan niveles)
        #[arg(long)]
        score: Option<f32>,
        /// Niveles jugados como segundos:intentos:aciertos
        #[arg(long = "level", value_parser = parse_level)]
        levels: Vec<LevelResult>,
        /// Guardar los ajustes propuestos en el archivo de configuración
        #[arg(long)]
        write: bool,
        /// Estado de la búsqueda (frontera, visitados, mejor punto, historial)
        #[arg(long, default_value = DEFAULT_OPTIMIZER_STATE_FILE)]
        state: PathBuf,
        /// Empezar una búsqueda nueva ignorando el estado guardado
        #[arg(long)]
        reset: bool,
    },
    /// Muestra el mapeo de gestos efectivo
    Gestures {
        #[arg(default_value = DEFAULT_GESTURES_FILE)]
        path: PathBuf,
        /// Escribir el mapeo por defecto en `path`
        #[arg(long)]
        init: bool,
    },
    /// Imprime la configuración efectiva en JSON
    Config,
}

fn parse_level(s: &str) -> std::result::Result<LevelResult, String> {
    let parts: Vec<&str> = s.split(':').collect();
    let [secs, attempts, successes] = parts.as_slice() else {
        return Err(format!("'{}' no tiene el formato segundos:intentos:aciertos", s));
    };
    let secs: f32 = secs.parse().map_err(|e| format!("segundos inválidos: {}", e))?;
    let attempts: u32 = attempts.parse().map_err(|e| format!("intentos inválidos: {}", e))?;
    let successes: u32 = successes.parse().map_err(|e| format!("aciertos inválidos: {}", e))?;
    Ok(LevelResult::new(secs, attempts, successes))
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load(path).with_context(|| format!("Configuración inválida en {:?}", path)),
        None => Ok(AppConfig::default()),
    }
}

#[cfg(feature = "uinput")]
fn open_sink(uinput: bool) -> Result<Box<dyn PointerSink + Send>> {
    if uinput {
        let sink = quirocursor::hid::UinputSink::new().context("No se pudo inicializar /dev/uinput")?;
        println!("✅ HID inicializado (/dev/uinput)");
        return Ok(Box::new(sink));
    }
    Ok(Box::new(LogSink))
}

#[cfg(not(feature = "uinput"))]
fn open_sink(uinput: bool) -> Result<Box<dyn PointerSink + Send>> {
    if uinput {
        bail!("Compilado sin soporte uinput (usar --features uinput)");
    }
    Ok(Box::new(LogSink))
}

fn run(config: &AppConfig, csv: &Path, width: u32, height: u32, gestures: &Path, uinput: bool) -> Result<()> {
    println!("🎞️  Reproduciendo landmarks desde {:?}", csv);

    let source = ReplaySource::from_csv(csv, width, height)?;
    println!("📄 {} frames cargados", source.remaining());

    let actions = GestureActionMap::load_or_default(gestures);
    for (label, action) in actions.iter() {
        println!("   {:<10} → {}", label, action);
    }

    let sink = MoveThrottle::new(open_sink(uinput)?);
    let settings = SharedSettings::new(config.settings);
    let worker = TrackingWorker::spawn(
        config.build_pipeline(actions),
        source,
        sink,
        settings.clone(),
        config.worker,
    )
    .context("No se pudo lanzar el hilo de seguimiento")?;

    let events = worker.events().clone();
    let mut label_counts: BTreeMap<GestureLabel, usize> = BTreeMap::new();
    let mut commands = 0usize;

    for event in events.iter() {
        match event {
            WorkerEvent::Frame(report) => {
                *label_counts.entry(report.label()).or_default() += 1;
                commands += report.commands.len();
            }
            WorkerEvent::MovementToggled { enabled } => {
                println!("🔁 Movimiento {}", if enabled { "activado" } else { "desactivado" });
            }
            WorkerEvent::SourceExhausted => break,
        }
    }

    let Some((_sink, stats)) = worker.wait() else {
        bail!("El hilo de seguimiento terminó con error");
    };

    println!("\n🏁 {} frames procesados, {} comandos", stats.frames, commands);
    if stats.sink_errors > 0 {
        println!("⚠️  {} comandos fallaron en el dispositivo", stats.sink_errors);
    }
    println!("\nGestos:");
    for (label, count) in &label_counts {
        println!("  {:<10} {:>6}", label, count);
    }

    let s = settings.snapshot();
    println!(
        "\n⚙️  Ajustes finales: S={:.2}, Sm={:.2}, A={:.2}, movimiento {}",
        s.sensitivity(),
        s.smoothing(),
        s.acceleration(),
        if s.movement_enabled() { "activo" } else { "pausado" }
    );
    Ok(())
}

struct TuneArgs<'a> {
    feedback: &'a str,
    score: Option<f32>,
    levels: &'a [LevelResult],
    write: bool,
    state: &'a Path,
    reset: bool,
}

fn load_optimizer_state(path: &Path, reset: bool) -> Option<OptimizerState> {
    if reset || !path.exists() {
        return None;
    }
    match OptimizerState::load(path) {
        Ok(state) => {
            println!("📂 Búsqueda retomada desde {:?} ({} envíos previos)", path, state.history.len());
            Some(state)
        }
        Err(e) => {
            println!("⚠️  Estado del optimizador ilegible ({}), se empieza de cero", e);
            None
        }
    }
}

fn tune(mut config: AppConfig, config_path: Option<&Path>, args: TuneArgs<'_>) -> Result<()> {
    let TuneArgs {
        feedback,
        score,
        levels,
        write,
        state,
        reset,
    } = args;

    let feedback = Feedback::parse(feedback);
    if feedback == Feedback::Unknown {
        println!("⚠️  Feedback desconocido, se usa peso neutro");
    }

    let score = match score {
        Some(score) => score,
        None => {
            let mut stats = SessionStats::new();
            for level in levels {
                let level_score = stats.record(*level);
                println!(
                    "🎯 Nivel: {:.1}s, precisión {:.1}%, puntuación {:.1}",
                    level.completion_secs,
                    level.accuracy(),
                    level_score
                );
            }
            stats.feedback_score()
        }
    };

    let mut optimizer = config.resume_optimizer(load_optimizer_state(state, reset));
    let next = optimizer.optimize(score, feedback);
    println!(
        "📈 Puntuación {:.2} × {} ({:.1}) → siguiente: S={:.2}, Sm={:.2}, A={:.2}",
        score,
        feedback,
        feedback.weight(),
        next.sensitivity,
        next.smoothing,
        next.acceleration
    );
    println!(
        "   mejor hasta ahora: S={:.2}, Sm={:.2}, A={:.2} ({:.2}), {} candidatos pendientes",
        optimizer.best().sensitivity,
        optimizer.best().smoothing,
        optimizer.best().acceleration,
        optimizer.best_score(),
        optimizer.frontier().len()
    );

    optimizer
        .state()
        .save(state)
        .with_context(|| format!("No se pudo guardar el estado del optimizador en {:?}", state))?;

    if write {
        let Some(path) = config_path else {
            bail!("--write requiere --config");
        };
        config.settings.apply_params(next);
        std::fs::write(path, config.to_json_string()?)
            .with_context(|| format!("No se pudo escribir {:?}", path))?;
        println!("💾 Ajustes guardados en {:?}", path);
    }
    Ok(())
}

fn gestures(path: &Path, init: bool) -> Result<()> {
    if init {
        GestureActionMap::default().save(path)?;
        println!("💾 Mapeo por defecto escrito en {:?}", path);
    }

    let actions = GestureActionMap::load_or_default(path);
    for label in GestureLabel::MAPPABLE {
        println!("  {:<10} → {}", label, actions.get(label));
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quirocursor=info".into()),
        )
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Run {
            csv,
            width,
            height,
            gestures: gestures_path,
            uinput,
        } => run(&config, &csv, width, height, &gestures_path, uinput),
        Command::Tune {
            feedback,
            score,
            levels,
            write,
            state,
            reset,
        } => tune(
            config,
            cli.config.as_deref(),
            TuneArgs {
                feedback: &feedback,
                score,
                levels: &levels,
                write,
                state: &state,
                reset,
            },
        ),
        Command::Gestures { path, init } => gestures(&path, init),
        Command::Config => {
            println!("{}", config.to_json_string()?);
            Ok(())
        }
    }
}
