use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use crate::data::loader;
use crate::data::model::RenderType;
use crate::data::registry::TableId;
use crate::state::{ActiveDialog, AppState, ColumnsForm, ModifyForm, RatioForm, RowFilterForm, TransformForm};

// ---------------------------------------------------------------------------
// Left side panel – open tables
// ---------------------------------------------------------------------------

/// Render the list of open tables and the columns of the selected one.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Tables");
    ui.separator();

    if state.registry.is_empty() {
        ui.label("No tables open.");
        return;
    }

    // Snapshot the listing so the state can be mutated below.
    let entries: Vec<(TableId, String, usize)> = state
        .registry
        .list()
        .map(|(id, t)| (id, t.name.clone(), t.len()))
        .collect();

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            for (id, name, rows) in &entries {
                let selected = state.selected == Some(*id);
                let label = format!("{name}  ({rows} rows)");
                if ui.selectable_label(selected, label).clicked() {
                    state.selected = Some(*id);
                }
            }
            ui.separator();
            render_type_list(ui, state);
        });
}

/// Per-column render type pickers for the selected table.
fn render_type_list(ui: &mut Ui, state: &mut AppState) {
    let Some(id) = state.selected else {
        return;
    };
    let Some(table) = state.selected_table() else {
        return;
    };
    let columns: Vec<(String, RenderType)> = table
        .render_types()
        .iter()
        .map(|(c, rt)| (c.clone(), *rt))
        .collect();
    let axis = table.frequency_axis().to_string();

    ui.strong("Columns");
    ui.label(RichText::new(format!("axis: {axis}")).weak());
    for (column, current) in columns {
        let mut chosen = current;
        ui.horizontal(|ui: &mut Ui| {
            egui::ComboBox::from_id_salt(("render_type", &column))
                .selected_text(chosen.to_string())
                .show_ui(ui, |ui: &mut Ui| {
                    for rt in RenderType::ALL {
                        ui.selectable_value(&mut chosen, rt, rt.to_string());
                    }
                });
            ui.label(&column);
        });
        if chosen != current {
            let result = state
                .registry
                .update(id, |t| t.set_render_type(&column, chosen));
            state.report(result, |_| format!("'{column}' drawn as {chosen}"));
        }
    }
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open…").clicked() {
                open_file_dialog(state);
                ui.close_menu();
            }
            let has_table = state.selected.is_some();
            if ui
                .add_enabled(has_table, egui::Button::new("Export table as CSV…"))
                .clicked()
            {
                export_csv_dialog(state);
                ui.close_menu();
            }
            if ui.button("Export plot as PNG…").clicked() {
                if let Some(path) = rfd::FileDialog::new()
                    .set_title("Save plot")
                    .add_filter("PNG", &["png"])
                    .set_file_name("spectra.png")
                    .save_file()
                {
                    state.pending_screenshot = Some(path);
                }
                ui.close_menu();
            }
        });

        ui.menu_button("Table", |ui: &mut Ui| {
            let Some(id) = state.selected else {
                ui.label("No table selected");
                return;
            };
            if ui.button("Duplicate").clicked() {
                let result = state.registry.duplicate(id);
                if let Some(new_id) = state.report(result, |_| "table duplicated".into()) {
                    state.selected = Some(new_id);
                }
                ui.close_menu();
            }
            if ui.button("Close").clicked() {
                let result = state.registry.remove(id);
                state.report(result, |t| format!("closed '{}'", t.name));
                ui.close_menu();
            }
            if ui.button("Columns and axes…").clicked() {
                state.dialog = ActiveDialog::Columns(ColumnsForm::default());
                ui.close_menu();
            }
            ui.checkbox(&mut state.show_table, "Show data grid");
        });

        ui.menu_button("Operations", |ui: &mut Ui| {
            let enabled = state.selected.is_some();
            ui.add_enabled_ui(enabled, |ui: &mut Ui| {
                if ui.button("Merge…").clicked() {
                    state.open_merge();
                    ui.close_menu();
                }
                if ui.button("Pick peaks…").clicked() {
                    state.open_peaks();
                    ui.close_menu();
                }
                if ui.button("Ratios…").clicked() {
                    state.dialog = ActiveDialog::Ratio(RatioForm::default());
                    ui.close_menu();
                }
                if ui.button("Remove near lines…").clicked() {
                    state.open_proximity();
                    ui.close_menu();
                }
                ui.separator();
                if ui.button("Remove rows…").clicked() {
                    state.dialog = ActiveDialog::RowFilter(RowFilterForm {
                        whole_row: true,
                        ..RowFilterForm::default()
                    });
                    ui.close_menu();
                }
                if ui.button("Modify column…").clicked() {
                    state.dialog = ActiveDialog::Modify(ModifyForm::default());
                    ui.close_menu();
                }
                if ui.button("Transforms…").clicked() {
                    state.dialog = ActiveDialog::Transform(TransformForm::default());
                    ui.close_menu();
                }
            });
        });

        ui.separator();

        if let Some(table) = state.selected_table() {
            ui.label(format!(
                "{}: {} rows, {} columns",
                table.name,
                table.len(),
                table.columns().len()
            ));
        }

        if let Some(msg) = &state.status_message {
            let color = if msg.starts_with("Error") {
                Color32::RED
            } else {
                Color32::GRAY
            };
            ui.label(RichText::new(msg).color(color));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let files = rfd::FileDialog::new()
        .set_title("Open spectral data")
        .add_filter(
            "Supported files",
            &["csv", "ft", "dat", "cat", "fit", "json", "parquet", "pq"],
        )
        .add_filter("CSV", &["csv"])
        .add_filter("Spectra", &["ft", "dat"])
        .add_filter("Line lists", &["cat", "fit"])
        .add_filter("JSON", &["json"])
        .add_filter("Parquet", &["parquet", "pq"])
        .pick_files();

    for path in files.unwrap_or_default() {
        state.open_file(&path);
    }
}

fn export_csv_dialog(state: &mut AppState) {
    let Some(table) = state.selected_table() else {
        return;
    };
    let Some(path) = rfd::FileDialog::new()
        .set_title("Export table")
        .add_filter("CSV", &["csv"])
        .set_file_name(format!("{}.csv", table.name))
        .save_file()
    else {
        return;
    };
    let result = loader::export_csv(table, &path);
    state.report(result, |_| format!("exported to {}", path.display()));
}
