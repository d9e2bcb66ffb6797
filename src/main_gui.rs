mod attractor;
mod backend;
mod color;
mod gpu;
mod gui;
mod io;

use gui::AttractorApp;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    // Panic hook plus informatif pour les échecs d'initialisation graphique
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let msg = panic_info
            .payload()
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| {
                panic_info
                    .payload()
                    .downcast_ref::<String>()
                    .cloned()
            })
            .unwrap_or_else(|| "Panic inconnu".to_string());

        eprintln!("\nErreur fatale lors de l'initialisation de la GUI:");
        eprintln!("   {}", msg);

        if let Some(location) = panic_info.location() {
            eprintln!(
                "   Fichier: {}:{}:{}",
                location.file(),
                location.line(),
                location.column()
            );
        }

        if msg.contains("BadAccess") || msg.contains("egl") || msg.contains("wgpu") || msg.contains("EGL") {
            eprintln!("\nSolutions possibles:");
            eprintln!("   1. Vérifiez que vous avez un affichage disponible (echo $DISPLAY)");
            eprintln!("   2. En SSH, utilisez le X11 forwarding (ssh -X)");
            eprintln!("   3. Forcez un backend graphique:");
            eprintln!("      WGPU_BACKEND=vulkan cargo run --release --bin chaoscanvas-gui");
            eprintln!("      WGPU_BACKEND=gl cargo run --release --bin chaoscanvas-gui");
            eprintln!("   4. En headless, essayez xvfb-run -a");
        }

        default_hook(panic_info);
    }));

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("ChaosCanvas - Attracteurs étranges")
            .with_inner_size([1000.0, 700.0]),
        hardware_acceleration: eframe::HardwareAcceleration::Preferred,
        renderer: eframe::Renderer::Wgpu,
        ..Default::default()
    };

    if let Err(e) = eframe::run_native(
        "ChaosCanvas",
        options,
        Box::new(|cc| Box::new(AttractorApp::new(cc))),
    ) {
        eprintln!("Erreur lors du lancement de l'application: {}", e);
        std::process::exit(1);
    }
}
