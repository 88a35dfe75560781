use eframe::egui::Ui;
use egui_extras::{Column, TableBuilder};

use hazard_lens::data::schema::metric_display_name;
use hazard_lens::Table;

const ROW_HEIGHT: f32 = 18.0;

/// Striped, scrollable view of a table. Missing cells render empty.
pub fn data_table(ui: &mut Ui, id: &str, table: &Table) {
    if table.columns.is_empty() {
        ui.label("No columns.");
        return;
    }
    ui.push_id(id, |ui: &mut Ui| {
        TableBuilder::new(ui)
            .striped(true)
            .resizable(true)
            .columns(Column::auto().at_least(60.0), table.columns.len())
            .header(ROW_HEIGHT + 4.0, |mut header| {
                for col in &table.columns {
                    header.col(|ui: &mut Ui| {
                        ui.strong(metric_display_name(col));
                    });
                }
            })
            .body(|body| {
                body.rows(ROW_HEIGHT, table.len(), |mut row| {
                    let i = row.index();
                    for c in 0..table.columns.len() {
                        row.col(|ui: &mut Ui| {
                            ui.label(table.value(i, c).to_string());
                        });
                    }
                });
            });
    });
}
