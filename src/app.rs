use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use eframe::egui;
use image::{Rgba, RgbaImage};

use crate::settings::AppSettings;
use crate::state::AppState;
use crate::ui::{dialogs, panels, plot, table_view};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct RustyPeaksApp {
    pub state: AppState,
    /// Screen area of the plot in the last frame, in points.
    plot_rect: Option<egui::Rect>,
    screenshot_requested: bool,
}

impl RustyPeaksApp {
    pub fn new(settings: AppSettings) -> Self {
        Self {
            state: AppState::new(settings),
            plot_rect: None,
            screenshot_requested: false,
        }
    }

    fn handle_screenshot(&mut self, ctx: &egui::Context) {
        if self.state.pending_screenshot.is_none() {
            return;
        }
        let shot = ctx.input(|i| {
            i.events.iter().rev().find_map(|e| match e {
                egui::Event::Screenshot { image, .. } => Some(Arc::clone(image)),
                _ => None,
            })
        });
        let Some(image) = shot else {
            if !self.screenshot_requested {
                self.screenshot_requested = true;
                ctx.send_viewport_cmd(egui::ViewportCommand::Screenshot(Default::default()));
            }
            ctx.request_repaint();
            return;
        };
        self.screenshot_requested = false;
        let Some(path) = self.state.pending_screenshot.take() else {
            return;
        };

        let cropped = match self.plot_rect {
            Some(rect) => image.region(&rect, Some(ctx.pixels_per_point())),
            None => (*image).clone(),
        };
        let result = save_png(&cropped, &path);
        self.state
            .report(result, |_| format!("plot saved to {}", path.display()));
    }
}

fn save_png(image: &egui::ColorImage, path: &Path) -> anyhow::Result<()> {
    let [w, h] = image.size;
    let mut out = RgbaImage::new(w as u32, h as u32);
    for (i, p) in image.pixels.iter().enumerate() {
        out.put_pixel((i % w) as u32, (i / w) as u32, Rgba([p.r(), p.g(), p.b(), p.a()]));
    }
    out.save(path)
        .with_context(|| format!("writing {}", path.display()))?;
    log::info!("Saved plot screenshot to {:?}", path);
    Ok(())
}

impl eframe::App for RustyPeaksApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.state.refresh();
        self.handle_screenshot(ctx);

        // ---- Top panel: menu bar ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &mut self.state);
        });

        // ---- Left side panel: tables ----
        egui::SidePanel::left("table_panel")
            .default_width(240.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // ---- Bottom panel: data grid ----
        if self.state.show_table {
            egui::TopBottomPanel::bottom("data_grid")
                .resizable(true)
                .default_height(220.0)
                .show(ctx, |ui| match self.state.selected_table() {
                    Some(table) => table_view::data_grid(ui, table),
                    None => {
                        ui.label("No table selected.");
                    }
                });
        }

        // ---- Central panel: plot ----
        egui::CentralPanel::default().show(ctx, |ui| {
            self.plot_rect = plot::spectral_plot(ui, &self.state);
        });

        dialogs::show(ctx, &mut self.state);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.state.settings.save();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn png_export_writes_a_readable_image() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plot.png");
        let img = egui::ColorImage::new([3, 2], egui::Color32::from_rgb(10, 20, 30));
        save_png(&img, &path).unwrap();

        let back = image::open(&path).unwrap().to_rgba8();
        assert_eq!(back.dimensions(), (3, 2));
        assert_eq!(back.get_pixel(2, 1).0, [10, 20, 30, 255]);
    }
}
