use std::time::Instant;

use egui::{Context, TextureHandle, TextureOptions};

use crate::attractor::{
    default_params, AttractorKind, AttractorParams, QualityMode, RunError,
};
use crate::backend::{RenderMessage, WorkerBackend};
use crate::gpu::GpuAttractor;
use crate::gui::texture::pixels_to_color_image;

/// Application egui : exploration interactive des attracteurs.
///
/// Tout changement de paramètre supplante le run courant. Le rendu tourne
/// dans le thread du `WorkerBackend` ; l'UI draine ses points de contrôle à
/// chaque image et met la texture à jour.
pub struct AttractorApp {
    params: AttractorParams,
    quality: QualityMode,
    total_points: u64,

    backend: WorkerBackend,
    rendering: bool,
    progress: f64,
    error: Option<RunError>,

    // Aperçu GPU : accumulation additive en continu, sans histogramme CPU.
    use_gpu: bool,
    gpu: Option<GpuAttractor>,

    // Dernier tampon reçu, conservé pour l'export PNG.
    pixels: Vec<u32>,
    texture: Option<TextureHandle>,

    width: u32,
    height: u32,
    pending_resize: Option<(u32, u32)>,

    last_render_time: Option<f64>,
    render_start_time: Option<Instant>,
}

impl AttractorApp {
    pub fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let width = 800;
        let height = 600;
        let quality = QualityMode::High;
        let mut app = Self {
            params: default_params(AttractorKind::Clifford),
            quality,
            total_points: quality.default_points(),
            backend: WorkerBackend::new(),
            rendering: false,
            progress: 0.0,
            error: None,
            use_gpu: false,
            gpu: None,
            pixels: Vec::new(),
            texture: None,
            width,
            height,
            pending_resize: None,
            last_render_time: None,
            render_start_time: None,
        };
        app.start_render();
        app
    }

    /// Supplante le run courant avec les paramètres actuels.
    fn start_render(&mut self) {
        if self.use_gpu {
            return;
        }
        self.backend.submit(
            self.params.clone(),
            self.width,
            self.height,
            self.total_points,
            self.quality,
        );
        self.rendering = true;
        self.progress = 0.0;
        self.error = None;
        self.render_start_time = Some(Instant::now());
    }

    /// Draine les points de contrôle du thread de rendu.
    ///
    /// Tous les messages en attente sont consommés ; seul le dernier tampon
    /// atteint la texture, les intermédiaires ne servent qu'à la progression.
    fn check_render_progress(&mut self, ctx: &Context) {
        if !self.rendering {
            return;
        }

        let mut latest: Option<(Vec<u32>, u32, u32)> = None;
        for msg in self.backend.poll() {
            match msg {
                RenderMessage::Checkpoint {
                    pixels,
                    width,
                    height,
                    progress,
                    is_final,
                    ..
                } => {
                    self.progress = progress;
                    latest = Some((pixels, width, height));
                    if is_final {
                        self.rendering = false;
                        if let Some(start) = self.render_start_time.take() {
                            self.last_render_time = Some(start.elapsed().as_secs_f64());
                        }
                    }
                }
                RenderMessage::Cancelled => {
                    // Un nouveau run a déjà été soumis ; l'ancien s'éteint.
                }
                RenderMessage::Failed(err) => {
                    self.rendering = false;
                    self.error = Some(err);
                }
            }
        }

        if let Some((pixels, width, height)) = latest {
            self.pixels = pixels;
            let image = pixels_to_color_image(&self.pixels, width, height);
            self.texture = Some(ctx.load_texture("attractor", image, TextureOptions::LINEAR));
            ctx.request_repaint();
        }

        if self.rendering {
            ctx.request_repaint();
        } else if let Some((w, h)) = self.pending_resize.take() {
            self.apply_resize(w, h);
        }
    }

    /// Avance l'aperçu GPU d'une image et met la texture à jour.
    fn update_gpu_preview(&mut self, ctx: &Context) {
        if self.gpu.is_none() {
            self.gpu = GpuAttractor::new(self.params.clone(), self.width, self.height);
            if self.gpu.is_none() {
                self.use_gpu = false;
                self.error = Some(RunError::BackendUnavailable(
                    "aucun adaptateur GPU disponible".into(),
                ));
                self.start_render();
                return;
            }
        }

        if let Some(gpu) = &mut self.gpu {
            gpu.set_params(self.params.clone());
            gpu.resize(self.width, self.height);
            gpu.frame();
            if let Some(bytes) = gpu.read_pixels() {
                self.pixels = bytemuck::cast_slice::<u8, u32>(&bytes).to_vec();
                let image = pixels_to_color_image(&self.pixels, gpu.width(), gpu.height());
                self.texture = Some(ctx.load_texture("attractor", image, TextureOptions::LINEAR));
            }
            ctx.request_repaint();
        }
    }

    fn queue_resize(&mut self, new_width: u32, new_height: u32) {
        if new_width == 0 || new_height == 0 {
            return;
        }
        if new_width == self.width && new_height == self.height {
            return;
        }
        if self.rendering {
            self.pending_resize = Some((new_width, new_height));
        } else {
            self.apply_resize(new_width, new_height);
        }
    }

    fn apply_resize(&mut self, new_width: u32, new_height: u32) {
        self.width = new_width;
        self.height = new_height;
        self.texture = None;
        self.start_render();
    }

    /// Change la famille d'attracteur, coefficients par défaut compris.
    fn change_kind(&mut self, kind: AttractorKind) {
        if kind == self.params.kind {
            return;
        }
        let mut new_params = default_params(kind);
        // Conserver les réglages d'apparence et de cadrage.
        new_params.hue = self.params.hue;
        new_params.saturation = self.params.saturation;
        new_params.brightness = self.params.brightness;
        new_params.background = self.params.background;
        new_params.scale = self.params.scale;
        new_params.left = self.params.left;
        new_params.top = self.params.top;
        self.params = new_params;
        self.start_render();
    }

    fn change_quality(&mut self, quality: QualityMode) {
        if quality == self.quality {
            return;
        }
        self.quality = quality;
        self.total_points = quality.default_points();
        self.start_render();
    }

    fn reset_to_defaults(&mut self) {
        let kind = self.params.kind;
        self.params = default_params(kind);
        self.start_render();
    }

    fn save_screenshot(&self) {
        use crate::io::save_png;
        use std::path::Path;

        if self.pixels.is_empty() {
            return;
        }
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let filename = format!("attractor_{}.png", timestamp);
        match save_png(&self.pixels, self.width, self.height, Path::new(&filename)) {
            Ok(()) => println!("Capture sauvegardée: {}", filename),
            Err(e) => eprintln!("Erreur export PNG: {}", e),
        }
    }
}

impl eframe::App for AttractorApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        if self.use_gpu {
            self.update_gpu_preview(ctx);
        } else {
            self.check_render_progress(ctx);
        }

        ctx.input(|i| {
            // S pour screenshot
            if i.key_pressed(egui::Key::S) {
                self.save_screenshot();
            }
        });

        let mut params_changed = false;
        let mut reset_requested = false;
        let mut kind_change: Option<AttractorKind> = None;
        let mut quality_change: Option<QualityMode> = None;

        egui::SidePanel::left("controls").show(ctx, |ui| {
            ui.heading("Attracteur");

            ui.horizontal(|ui| {
                ui.label("Famille:");
                for &kind in AttractorKind::all() {
                    if ui
                        .selectable_label(self.params.kind == kind, kind.name())
                        .clicked()
                    {
                        kind_change = Some(kind);
                    }
                }
            });

            ui.horizontal(|ui| {
                ui.label("Qualité:");
                if ui
                    .selectable_label(self.quality == QualityMode::High, "Haute")
                    .clicked()
                {
                    quality_change = Some(QualityMode::High);
                }
                if ui
                    .selectable_label(self.quality == QualityMode::Low, "Basse")
                    .clicked()
                {
                    quality_change = Some(QualityMode::Low);
                }
            });

            ui.separator();
            ui.label("Coefficients");
            for (label, value) in [
                ("a", &mut self.params.a),
                ("b", &mut self.params.b),
                ("c", &mut self.params.c),
                ("d", &mut self.params.d),
            ] {
                if ui
                    .add(egui::Slider::new(value, -3.0..=3.0).text(label))
                    .drag_stopped()
                {
                    params_changed = true;
                }
            }

            ui.separator();
            ui.label("Couleur");
            if ui
                .add(egui::Slider::new(&mut self.params.hue, 0.0..=359.0).text("teinte"))
                .drag_stopped()
            {
                params_changed = true;
            }
            if ui
                .add(egui::Slider::new(&mut self.params.saturation, 0.0..=100.0).text("saturation"))
                .drag_stopped()
            {
                params_changed = true;
            }
            if ui
                .add(egui::Slider::new(&mut self.params.brightness, 0.0..=100.0).text("brillance"))
                .drag_stopped()
            {
                params_changed = true;
            }

            ui.separator();
            ui.label("Cadrage");
            if ui
                .add(
                    egui::Slider::new(&mut self.params.scale, 0.1..=5.0)
                        .logarithmic(true)
                        .text("échelle"),
                )
                .drag_stopped()
            {
                params_changed = true;
            }
            if ui
                .add(egui::Slider::new(&mut self.params.left, -0.5..=0.5).text("gauche"))
                .drag_stopped()
            {
                params_changed = true;
            }
            if ui
                .add(egui::Slider::new(&mut self.params.top, -0.5..=0.5).text("haut"))
                .drag_stopped()
            {
                params_changed = true;
            }

            ui.separator();
            if ui.checkbox(&mut self.use_gpu, "Aperçu GPU").changed() {
                if self.use_gpu {
                    self.backend.cancel();
                    self.rendering = false;
                } else {
                    self.gpu = None;
                    self.start_render();
                }
            }

            if ui.button("Réinitialiser").clicked() {
                reset_requested = true;
            }
            if ui.button("Capture PNG (S)").clicked() {
                self.save_screenshot();
            }

            ui.separator();
            if self.rendering {
                ui.add(egui::ProgressBar::new(self.progress as f32).show_percentage());
            } else if let Some(err) = &self.error {
                ui.colored_label(egui::Color32::RED, format!("Erreur: {err}"));
            } else if let Some(seconds) = self.last_render_time {
                ui.label(format!("Rendu en {:.2}s", seconds));
            }
        });

        if let Some(kind) = kind_change {
            self.change_kind(kind);
        } else if let Some(quality) = quality_change {
            self.change_quality(quality);
        } else if reset_requested {
            self.reset_to_defaults();
        } else if params_changed {
            self.start_render();
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            let available = ui.available_size();
            self.queue_resize(available.x as u32, available.y as u32);

            if let Some(texture) = &self.texture {
                ui.image((texture.id(), available));
            } else {
                ui.centered_and_justified(|ui| {
                    ui.spinner();
                });
            }
        });
    }
}
