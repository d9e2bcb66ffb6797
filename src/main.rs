use std::path::PathBuf;

use clap::Parser;
use tracing::info;

mod attractor;
mod backend;
mod color;
mod gpu;
mod io;

use attractor::{default_params, AttractorKind, QualityMode};
use backend::{render_parallel, render_sync};
use io::save_png;

/// Utilitaire CLI pour générer des rendus de densité d'attracteurs étranges.
///
/// Exemple d'utilisation :
///   chaoscanvas-cli --kind clifford --width 1920 --height 1080 --output clifford.png
#[derive(Parser, Debug)]
#[command(
    name = "chaoscanvas-cli",
    about = "Générateur d'attracteurs étranges (Clifford, De Jong) en ligne de commande",
    version
)]
struct Cli {
    /// Famille d'attracteur (clifford, dejong)
    #[arg(long, default_value = "clifford")]
    kind: String,

    /// Largeur de l'image de sortie en pixels
    #[arg(long, default_value_t = 1920)]
    width: u32,

    /// Hauteur de l'image de sortie en pixels
    #[arg(long, default_value_t = 1080)]
    height: u32,

    /// Coefficient a (sinon valeur par défaut de la famille)
    #[arg(long)]
    a: Option<f64>,

    /// Coefficient b
    #[arg(long)]
    b: Option<f64>,

    /// Coefficient c
    #[arg(long)]
    c: Option<f64>,

    /// Coefficient d
    #[arg(long)]
    d: Option<f64>,

    /// Teinte de base [0, 360)
    #[arg(long)]
    hue: Option<f64>,

    /// Saturation [0, 100]
    #[arg(long)]
    saturation: Option<f64>,

    /// Brillance [0, 100]
    #[arg(long)]
    brightness: Option<f64>,

    /// Couleur de fond "r,g,b" ou "r,g,b,a"
    #[arg(long)]
    background: Option<String>,

    /// Multiplicateur d'échelle (> 0)
    #[arg(long)]
    scale: Option<f64>,

    /// Décalage horizontal du centre, en fraction de la largeur
    #[arg(long)]
    left: Option<f64>,

    /// Décalage vertical du centre, en fraction de la hauteur
    #[arg(long)]
    top: Option<f64>,

    /// Budget de points (sinon valeur par défaut du mode de qualité)
    #[arg(long)]
    points: Option<u64>,

    /// Mode de qualité (low, high)
    #[arg(long, default_value = "high")]
    quality: String,

    /// Moteur d'exécution (sync, kernel, gpu)
    #[arg(long, default_value = "kernel")]
    backend: String,

    /// Fichier de sortie PNG
    #[arg(long, value_name = "FICHIER")]
    output: PathBuf,
}

fn parse_background(value: &str) -> Option<[u8; 4]> {
    let parts: Vec<u8> = value
        .split(',')
        .map(|p| p.trim().parse().ok())
        .collect::<Option<_>>()?;
    match parts.as_slice() {
        [r, g, b] => Some([*r, *g, *b, 255]),
        [r, g, b, a] => Some([*r, *g, *b, *a]),
        _ => None,
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let kind = match AttractorKind::from_cli_name(&cli.kind) {
        Some(kind) => kind,
        None => {
            eprintln!("Famille d'attracteur invalide: {} (attendu clifford ou dejong)", cli.kind);
            std::process::exit(1);
        }
    };

    let quality = match QualityMode::from_cli_name(&cli.quality) {
        Some(quality) => quality,
        None => {
            eprintln!("Mode de qualité invalide: {} (attendu low ou high)", cli.quality);
            std::process::exit(1);
        }
    };

    let mut params = default_params(kind);
    if let Some(a) = cli.a {
        params.a = a;
    }
    if let Some(b) = cli.b {
        params.b = b;
    }
    if let Some(c) = cli.c {
        params.c = c;
    }
    if let Some(d) = cli.d {
        params.d = d;
    }
    if let Some(hue) = cli.hue {
        params.hue = hue;
    }
    if let Some(saturation) = cli.saturation {
        params.saturation = saturation;
    }
    if let Some(brightness) = cli.brightness {
        params.brightness = brightness;
    }
    if let Some(background) = &cli.background {
        match parse_background(background) {
            Some(rgba) => params.background = rgba,
            None => {
                eprintln!("Couleur de fond invalide: {} (attendu r,g,b ou r,g,b,a)", background);
                std::process::exit(1);
            }
        }
    }
    if let Some(scale) = cli.scale {
        params.scale = scale;
    }
    if let Some(left) = cli.left {
        params.left = left;
    }
    if let Some(top) = cli.top {
        params.top = top;
    }

    let total_points = cli.points.unwrap_or_else(|| quality.default_points());

    info!(
        kind = kind.name(),
        width = cli.width,
        height = cli.height,
        points = total_points,
        backend = cli.backend.as_str(),
        "démarrage du rendu"
    );
    let start = std::time::Instant::now();

    let pixels = match cli.backend.as_str() {
        "sync" | "kernel" => {
            let result = if cli.backend == "sync" {
                render_sync(params, cli.width, cli.height, total_points, quality)
            } else {
                render_parallel(params, cli.width, cli.height, total_points, quality)
            };
            match result {
                Ok(render) => {
                    info!(max_density = render.max_density, "histogramme accumulé");
                    render.pixels
                }
                Err(err) => {
                    eprintln!("Échec du rendu: {}", err);
                    std::process::exit(1);
                }
            }
        }
        "gpu" => match gpu::GpuAttractor::new(params, cli.width, cli.height) {
            Some(mut attractor) => {
                attractor.frame();
                match attractor.read_pixels() {
                    Some(bytes) => bytemuck::cast_slice::<u8, u32>(&bytes).to_vec(),
                    None => {
                        eprintln!("Échec de la relecture GPU");
                        std::process::exit(1);
                    }
                }
            }
            None => {
                eprintln!("Aucun adaptateur GPU disponible (essayez --backend kernel)");
                std::process::exit(1);
            }
        },
        other => {
            eprintln!("Moteur invalide: {} (attendu sync, kernel ou gpu)", other);
            std::process::exit(1);
        }
    };

    if let Err(err) = save_png(&pixels, cli.width, cli.height, &cli.output) {
        eprintln!("Erreur lors de l'écriture de {}: {}", cli.output.display(), err);
        std::process::exit(1);
    }

    info!(
        elapsed = format!("{:.2}s", start.elapsed().as_secs_f64()),
        output = %cli.output.display(),
        "rendu terminé"
    );
}
