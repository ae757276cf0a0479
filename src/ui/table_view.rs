use eframe::egui::{RichText, Ui};
use egui_extras::{Column as GridColumn, TableBuilder};

use crate::data::model::Table;

/// Scrollable grid of the table's cells. Missing values render as blanks.
pub fn data_grid(ui: &mut Ui, table: &Table) {
    let columns = table.columns();
    TableBuilder::new(ui)
        .striped(true)
        .resizable(true)
        .columns(GridColumn::auto().at_least(90.0), columns.len())
        .header(20.0, |mut header| {
            for col in columns {
                header.col(|ui| {
                    let mut text = RichText::new(&col.name).strong();
                    if col.name == table.frequency_axis() {
                        text = text.underline();
                    }
                    ui.label(text);
                });
            }
        })
        .body(|body| {
            body.rows(18.0, table.len(), |mut row| {
                let i = row.index();
                for col in columns {
                    row.col(|ui| {
                        let v = col.values[i];
                        if !v.is_nan() {
                            ui.label(format!("{v}"));
                        }
                    });
                }
            });
        });
}
