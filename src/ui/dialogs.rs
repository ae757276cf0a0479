use eframe::egui::{self, Ui};

use crate::data::filter::{modify_column, remove_rows, ColumnOp, RowFilter};
use crate::data::model::Table;
use crate::data::peaks::PeakParams;
use crate::data::proximity::ProximityParams;
use crate::data::ratio::{self, BandMode};
use crate::data::registry::TableId;
use crate::plugins::TRANSFORMS;
use crate::state::{
    ActiveDialog, AppState, ColumnsForm, MergeForm, ModifyForm, PeakForm, ProximityForm, RatioForm,
    RowFilterForm, TransformForm,
};

// ---------------------------------------------------------------------------
// Operation windows
// ---------------------------------------------------------------------------

/// Show the open operation window, if any. Every window acts on the
/// selected table.
pub fn show(ctx: &egui::Context, state: &mut AppState) {
    let Some(id) = state.selected else {
        return;
    };
    let mut dialog = std::mem::take(&mut state.dialog);

    let title = match &dialog {
        ActiveDialog::None => return,
        ActiveDialog::Merge(_) => "Merge tables",
        ActiveDialog::Peaks(_) => "Pick peaks",
        ActiveDialog::Ratio(_) => "Ratios",
        ActiveDialog::Proximity(_) => "Remove near lines",
        ActiveDialog::RowFilter(_) => "Remove rows",
        ActiveDialog::Modify(_) => "Modify column",
        ActiveDialog::Columns(_) => "Columns and axes",
        ActiveDialog::Transform(_) => "Transforms",
    };

    let mut open = true;
    let mut done = false;
    egui::Window::new(title)
        .open(&mut open)
        .resizable(false)
        .collapsible(false)
        .show(ctx, |ui: &mut Ui| {
            done = match &mut dialog {
                ActiveDialog::None => true,
                ActiveDialog::Merge(form) => merge_window(ui, state, id, form),
                ActiveDialog::Peaks(form) => peaks_window(ui, state, id, form),
                ActiveDialog::Ratio(form) => ratio_window(ui, state, id, form),
                ActiveDialog::Proximity(form) => proximity_window(ui, state, id, form),
                ActiveDialog::RowFilter(form) => row_filter_window(ui, state, id, form),
                ActiveDialog::Modify(form) => modify_window(ui, state, id, form),
                ActiveDialog::Columns(form) => columns_window(ui, state, id, form),
                ActiveDialog::Transform(form) => transform_window(ui, state, id, form),
            };
        });

    // Keep the window unless it was closed, finished, or replaced.
    if open && !done && matches!(state.dialog, ActiveDialog::None) {
        state.dialog = dialog;
    }
}

// -- Shared widgets --

fn table_choices(state: &AppState, except: TableId) -> Vec<(TableId, String)> {
    state
        .registry
        .list()
        .filter(|(id, _)| *id != except)
        .map(|(id, t)| (id, t.name.clone()))
        .collect()
}

fn table_combo(ui: &mut Ui, salt: &str, choices: &[(TableId, String)], selected: &mut Option<TableId>) {
    let text = choices
        .iter()
        .find(|(id, _)| Some(*id) == *selected)
        .map_or("choose…", |(_, name)| name.as_str());
    egui::ComboBox::from_id_salt(salt)
        .selected_text(text)
        .show_ui(ui, |ui: &mut Ui| {
            for (id, name) in choices {
                ui.selectable_value(selected, Some(*id), name);
            }
        });
}

fn column_combo(ui: &mut Ui, salt: &str, columns: &[String], selected: &mut String) {
    let text = if selected.is_empty() { "choose…" } else { selected.as_str() }.to_string();
    egui::ComboBox::from_id_salt(salt)
        .selected_text(text)
        .show_ui(ui, |ui: &mut Ui| {
            for name in columns {
                ui.selectable_value(selected, name.clone(), name);
            }
        });
}

fn value_columns(table: &Table) -> Vec<String> {
    table.value_columns().map(|c| c.name.clone()).collect()
}

fn number(ui: &mut Ui, label: &str, value: &mut f64, speed: f64) {
    ui.horizontal(|ui: &mut Ui| {
        ui.label(label);
        ui.add(egui::DragValue::new(value).speed(speed));
    });
}

// -- Windows. Each returns true when the window should close. --

fn merge_window(ui: &mut Ui, state: &mut AppState, left: TableId, form: &mut MergeForm) -> bool {
    let choices = table_choices(state, left);
    ui.horizontal(|ui: &mut Ui| {
        ui.label("Merge into the selected table:");
        table_combo(ui, "merge_right", &choices, &mut form.right);
    });
    ui.checkbox(&mut form.combine, "Combine near-duplicate rows");
    ui.add_enabled_ui(form.combine, |ui: &mut Ui| {
        number(ui, "Threshold (kHz)", &mut form.threshold_khz, 0.5);
    });

    let Some(right) = form.right else {
        return false;
    };
    if !ui.button("Merge").clicked() {
        return false;
    }
    let result = state
        .registry
        .merge_tables(left, right, form.combine, form.threshold_khz);
    state.settings.merge_threshold_khz = form.threshold_khz;
    state.report(result, |_| "tables merged".into()).is_some()
}

fn peaks_window(ui: &mut Ui, state: &mut AppState, id: TableId, form: &mut PeakForm) -> bool {
    ui.horizontal(|ui: &mut Ui| {
        ui.label("Result name");
        ui.text_edit_singleline(&mut form.name);
    });
    number(ui, "Resolution (MHz)", &mut form.resolution_mhz, 0.001);
    number(ui, "Intensity above", &mut form.intensity_min, 0.01);
    number(ui, "Intensity below", &mut form.intensity_max, 0.01);

    if !ui.button("Pick peaks").clicked() {
        return false;
    }
    let params = PeakParams {
        target_resolution: form.resolution_mhz,
        intensity_min: form.intensity_min,
        intensity_max: form.intensity_max,
    };
    let result = state.registry.pick_peaks(id, &form.name, params);
    state.settings.peak_resolution_mhz = form.resolution_mhz;
    state.settings.peak_intensity_min = form.intensity_min;
    state.settings.peak_intensity_max = form.intensity_max;
    match state.report(result, |_| format!("peaks extracted into '{}'", form.name)) {
        Some(new_id) => {
            state.selected = Some(new_id);
            true
        }
        None => false,
    }
}

fn ratio_window(ui: &mut Ui, state: &mut AppState, id: TableId, form: &mut RatioForm) -> bool {
    let Some(table) = state.selected_table() else {
        return true;
    };
    let columns = value_columns(table);
    let is_ratio = table.is_ratio;
    let suffix = format!("/{}", form.reference);
    let ratio_columns: Vec<String> = columns
        .iter()
        .filter(|c| !form.reference.is_empty() && c.ends_with(&suffix))
        .cloned()
        .collect();

    ui.horizontal(|ui: &mut Ui| {
        ui.label("Reference column");
        column_combo(ui, "ratio_reference", &columns, &mut form.reference);
    });
    let can_derive = !is_ratio && !form.reference.is_empty();
    if ui
        .add_enabled(can_derive, egui::Button::new("Derive ratios"))
        .clicked()
    {
        let reference = form.reference.clone();
        let result = state.registry.derive_ratios(id, &reference);
        state.report(result, |map| format!("derived {} ratio columns", map.len()));
        return false;
    }
    if is_ratio {
        ui.label("Ratios already derived for this table.");
    }

    ui.separator();
    ui.label(format!("Band filter over {} ratio columns", ratio_columns.len()));
    number(ui, "Target ratio", &mut form.target, 0.01);
    number(ui, "Margin", &mut form.margin, 0.01);
    ui.horizontal(|ui: &mut Ui| {
        ui.radio_value(&mut form.mode, BandMode::Include, "Keep inside band");
        ui.radio_value(&mut form.mode, BandMode::Exclude, "Keep outside band");
    });
    if ui
        .add_enabled(!ratio_columns.is_empty(), egui::Button::new("Filter rows"))
        .clicked()
    {
        let (target, margin, mode) = (form.target, form.margin, form.mode);
        let result = state
            .registry
            .update(id, |t| ratio::filter_by_ratio(t, &ratio_columns, target, margin, mode));
        return state
            .report(result, |n| format!("{n} rows dropped by the ratio band"))
            .is_some();
    }
    false
}

fn proximity_window(ui: &mut Ui, state: &mut AppState, target: TableId, form: &mut ProximityForm) -> bool {
    let choices = table_choices(state, target);
    ui.horizontal(|ui: &mut Ui| {
        ui.label("Reference line list");
        table_combo(ui, "proximity_reference", &choices, &mut form.reference);
    });
    number(ui, "Threshold (kHz)", &mut form.threshold_khz, 1.0);
    ui.checkbox(&mut form.return_removed, "Open removed rows as a table");
    ui.checkbox(&mut form.add_back, "Add removed rows back as annotated columns");

    let Some(reference) = form.reference else {
        return false;
    };
    if !ui.button("Remove").clicked() {
        return false;
    }
    let params = ProximityParams {
        threshold_khz: form.threshold_khz,
        return_removed: form.return_removed,
        add_back: form.add_back,
    };
    let result = state.registry.remove_near(target, reference, params);
    state.settings.proximity_threshold_khz = form.threshold_khz;
    match state.report(result, |_| "proximity filter applied".into()) {
        Some(ids) => {
            state.selected = Some(ids.kept);
            true
        }
        None => false,
    }
}

fn row_filter_window(ui: &mut Ui, state: &mut AppState, id: TableId, form: &mut RowFilterForm) -> bool {
    let Some(table) = state.selected_table() else {
        return true;
    };
    let columns: Vec<String> = table.column_names().map(str::to_string).collect();

    ui.horizontal(|ui: &mut Ui| {
        ui.label("Column");
        column_combo(ui, "filter_column", &columns, &mut form.column);
    });
    ui.horizontal(|ui: &mut Ui| {
        ui.label("Remove where");
        ui.text_edit_singleline(&mut form.expression);
    });
    ui.label(egui::RichText::new("e.g.  < 0.5   or   {A} > {B}").weak());
    ui.checkbox(&mut form.whole_row, "Remove whole rows (otherwise blank the column)");

    if !ui
        .add_enabled(!form.column.is_empty(), egui::Button::new("Apply"))
        .clicked()
    {
        return false;
    }
    let (column, expression, whole_row) = (form.column.clone(), form.expression.clone(), form.whole_row);
    let result = state.registry.update(id, |t| {
        let filter = RowFilter::parse(&expression, &column)?;
        remove_rows(t, &column, &filter, whole_row)
    });
    state
        .report(result, |n| format!("{n} rows matched '{expression}'"))
        .is_some()
}

fn modify_window(ui: &mut Ui, state: &mut AppState, id: TableId, form: &mut ModifyForm) -> bool {
    let Some(table) = state.selected_table() else {
        return true;
    };
    let columns = value_columns(table);

    ui.horizontal(|ui: &mut Ui| {
        ui.label("Column");
        column_combo(ui, "modify_column", &columns, &mut form.column);
    });
    ui.horizontal(|ui: &mut Ui| {
        ui.label("Operation");
        ui.text_edit_singleline(&mut form.expression);
    });
    ui.label(egui::RichText::new("* k   / k   ^ k   log b").weak());

    if !ui
        .add_enabled(!form.column.is_empty(), egui::Button::new("Apply"))
        .clicked()
    {
        return false;
    }
    let (column, expression) = (form.column.clone(), form.expression.clone());
    let result = state.registry.update(id, |t| {
        let op = ColumnOp::parse(&expression)?;
        modify_column(t, &column, op)
    });
    state
        .report(result, |_| format!("'{column}' modified by '{expression}'"))
        .is_some()
}

fn columns_window(ui: &mut Ui, state: &mut AppState, id: TableId, form: &mut ColumnsForm) -> bool {
    let Some(table) = state.selected_table() else {
        return true;
    };
    let all: Vec<String> = table.column_names().map(str::to_string).collect();
    let values = value_columns(table);
    let mut frequency_axis = table.frequency_axis().to_string();
    let mut display_axis = table.display_axis().to_string();
    let (old_frequency, old_display) = (frequency_axis.clone(), display_axis.clone());

    egui::Grid::new("axes_grid").num_columns(2).show(ui, |ui: &mut Ui| {
        ui.label("Frequency axis");
        column_combo(ui, "frequency_axis", &all, &mut frequency_axis);
        ui.end_row();
        ui.label("Display axis");
        column_combo(ui, "display_axis", &all, &mut display_axis);
        ui.end_row();
    });
    if frequency_axis != old_frequency {
        let result = state.registry.update(id, |t| {
            t.set_frequency_axis(&frequency_axis)?;
            t.sort_by_frequency();
            Ok(())
        });
        state.report(result, |_| format!("frequency axis is now '{frequency_axis}'"));
    }
    if display_axis != old_display {
        let result = state.registry.update(id, |t| t.set_display_axis(&display_axis));
        state.report(result, |_| format!("plotting against '{display_axis}'"));
    }

    ui.separator();
    ui.horizontal(|ui: &mut Ui| {
        column_combo(ui, "rename_from", &values, &mut form.rename_from);
        ui.label("→");
        ui.text_edit_singleline(&mut form.rename_to);
    });
    ui.horizontal(|ui: &mut Ui| {
        let ready = !form.rename_from.is_empty() && !form.rename_to.trim().is_empty();
        if ui.add_enabled(ready, egui::Button::new("Rename")).clicked() {
            let (from, to) = (form.rename_from.clone(), form.rename_to.trim().to_string());
            let result = state.registry.update(id, |t| t.rename_column(&from, &to));
            if state.report(result, |_| format!("renamed '{from}' to '{to}'")).is_some() {
                form.rename_from.clear();
                form.rename_to.clear();
            }
        }
        if ui
            .add_enabled(!form.rename_from.is_empty(), egui::Button::new("Drop"))
            .clicked()
        {
            let name = form.rename_from.clone();
            let result = state.registry.update(id, |t| t.drop_column(&name));
            if state.report(result, |_| format!("dropped '{name}'")).is_some() {
                form.rename_from.clear();
            }
        }
    });

    ui.separator();
    ui.label("Split columns into a new table:");
    for name in &values {
        let mut checked = form.split.contains(name);
        if ui.checkbox(&mut checked, name).changed() {
            if checked {
                form.split.insert(name.clone());
            } else {
                form.split.remove(name);
            }
        }
    }
    if ui
        .add_enabled(!form.split.is_empty(), egui::Button::new("Split off"))
        .clicked()
    {
        let columns: Vec<String> = form.split.iter().cloned().collect();
        let result = state.registry.split(id, &columns);
        if let Some(new_id) = state.report(result, |_| "columns split off".into()) {
            state.selected = Some(new_id);
            return true;
        }
    }
    false
}

fn transform_window(ui: &mut Ui, state: &mut AppState, id: TableId, form: &mut TransformForm) -> bool {
    let Some(table) = state.selected_table() else {
        return true;
    };
    let columns = value_columns(table);

    ui.horizontal(|ui: &mut Ui| {
        ui.label("Column");
        column_combo(ui, "transform_column", &columns, &mut form.column);
    });
    for (i, transform) in TRANSFORMS.iter().enumerate() {
        ui.radio_value(&mut form.transform, i, transform.label);
    }

    if !ui
        .add_enabled(!form.column.is_empty(), egui::Button::new("Apply"))
        .clicked()
    {
        return false;
    }
    let Some(transform) = TRANSFORMS.get(form.transform) else {
        return false;
    };
    let result = state.registry.apply_external(id, &form.column, transform.apply);
    match state.report(result, |_| format!("{} applied", transform.label)) {
        Some(new_id) => {
            state.selected = Some(new_id);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::tests::{table, FREQ};
    use crate::settings::AppSettings;

    fn frame(ctx: &egui::Context, state: &mut AppState) {
        let _ = ctx.run(egui::RawInput::default(), |ctx| show(ctx, state));
    }

    #[test]
    fn window_survives_frames_without_a_selection() {
        let ctx = egui::Context::default();
        let mut state = AppState::new(AppSettings::default());
        state.open_merge();

        frame(&ctx, &mut state);
        assert!(matches!(state.dialog, ActiveDialog::Merge(_)));

        let id = state.registry.add(table("a", &[(FREQ, &[1.0]), ("I", &[1.0])]));
        state.selected = Some(id);
        frame(&ctx, &mut state);
        assert!(matches!(state.dialog, ActiveDialog::Merge(_)));
    }
}
