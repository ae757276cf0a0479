use eframe::egui::{self, Ui};
use egui_plot::{Line, Plot, PlotPoints, PlotUi, Points};

use crate::data::model::{RenderType, Table};
use crate::data::loader::DEFAULT_FREQUENCY_AXIS;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Spectral plot (central panel)
// ---------------------------------------------------------------------------

/// Render every visible column of every open table. Returns the plot area
/// so screenshots can be cropped to it.
pub fn spectral_plot(ui: &mut Ui, state: &AppState) -> Option<egui::Rect> {
    if state.registry.is_empty() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("Open a file to view spectra  (File → Open…)");
        });
        return None;
    }

    let x_label = state
        .selected_table()
        .map_or(DEFAULT_FREQUENCY_AXIS, |t| t.display_axis())
        .to_string();

    let response = Plot::new("spectral_plot")
        .legend(egui_plot::Legend::default())
        .x_axis_label(x_label)
        .y_axis_label("Intensity")
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
        .show(ui, |plot_ui| {
            for (_, table) in state.registry.list() {
                draw_table(plot_ui, table, state);
            }
        });
    Some(response.response.rect)
}

fn draw_table(plot_ui: &mut PlotUi, table: &Table, state: &AppState) {
    let Some(xs) = table.column(table.display_axis()) else {
        return;
    };
    for col in table.value_columns() {
        if col.name == table.display_axis() {
            continue;
        }
        let render_type = table.render_type(&col.name).unwrap_or_default();
        if !render_type.is_visible() {
            continue;
        }

        let color = state.colors.color_for(&table.name, &col.name);
        let name = format!("{} · {}", table.name, col.name);
        let points: Vec<[f64; 2]> = xs
            .iter()
            .zip(&col.values)
            .filter(|(x, y)| !x.is_nan() && !y.is_nan())
            .map(|(&x, &y)| [x, y])
            .collect();

        match render_type {
            RenderType::Line => {
                plot_ui.line(Line::new(PlotPoints::from(points)).name(&name).color(color).width(1.5));
            }
            RenderType::Scatter => {
                plot_ui.points(Points::new(PlotPoints::from(points)).name(&name).color(color).radius(2.5));
            }
            RenderType::Stem => {
                // One segment per point; equal names share a legend entry.
                for [x, y] in points {
                    let stem = PlotPoints::from(vec![[x, 0.0], [x, y]]);
                    plot_ui.line(Line::new(stem).name(&name).color(color).width(1.0));
                }
            }
            RenderType::Hidden => {}
        }
    }
}
