use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};

use hazard_lens::data::filter::ALL_STATES;
use hazard_lens::data::pipeline::{THRESHOLD_RANGE, TOP_N_RANGE};
use hazard_lens::data::schema::{metric_display_name, DatasetKind};
use hazard_lens::{BivariateView, Signal};

use crate::state::{AppState, Tab};
use crate::ui::{plot, table};

// ---------------------------------------------------------------------------
// Left side panel – parameter widgets
// ---------------------------------------------------------------------------

/// Render the left parameter panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Filters");
    ui.separator();

    let mut changed = false;

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            // ---- Dataset selector ----
            ui.strong("Dataset");
            let mut kind = state.params.kind;
            egui::ComboBox::from_id_salt("dataset")
                .selected_text(kind.to_string())
                .show_ui(ui, |ui: &mut Ui| {
                    for k in DatasetKind::ALL {
                        ui.selectable_value(&mut kind, k, k.to_string());
                    }
                });
            if kind != state.params.kind {
                state.set_kind(kind);
            }
            ui.separator();

            // ---- Map overlay ----
            ui.strong("Hazards on map");
            for k in DatasetKind::ALL.into_iter().filter(|k| k.is_hazard()) {
                let mut selected = state.params.hazards.contains(&k);
                if ui.checkbox(&mut selected, k.to_string()).changed() {
                    state.toggle_hazard(k);
                }
            }
            ui.separator();

            // ---- State scope ----
            ui.strong("State");
            let states = state.states.clone();
            egui::ComboBox::from_id_salt("state_scope")
                .selected_text(state.params.state_scope.clone())
                .show_ui(ui, |ui: &mut Ui| {
                    changed |= ui
                        .selectable_value(&mut state.params.state_scope, ALL_STATES.to_string(), ALL_STATES)
                        .changed();
                    for s in &states {
                        changed |= ui
                            .selectable_value(&mut state.params.state_scope, s.clone(), s.as_str())
                            .changed();
                    }
                });

            // ---- Region search ----
            ui.strong("Search county / state");
            changed |= ui.text_edit_singleline(&mut state.params.search).changed();
            ui.separator();

            // ---- Metric ----
            ui.strong("Metric");
            let metrics = state.metrics.clone();
            let current = state
                .view
                .as_ref()
                .map(|v| v.metric.clone())
                .unwrap_or_default();
            egui::ComboBox::from_id_salt("metric")
                .selected_text(metric_display_name(&current))
                .show_ui(ui, |ui: &mut Ui| {
                    for m in &metrics {
                        if ui
                            .selectable_label(current == *m, metric_display_name(m))
                            .clicked()
                        {
                            state.params.metric = Some(m.clone());
                            changed = true;
                        }
                    }
                });

            changed |= ui
                .add(
                    egui::Slider::new(&mut state.params.threshold, THRESHOLD_RANGE.0..=THRESHOLD_RANGE.1)
                        .step_by(1.0)
                        .text("Minimum level"),
                )
                .changed();
            changed |= ui
                .add(egui::Slider::new(&mut state.params.top_n, TOP_N_RANGE.0..=TOP_N_RANGE.1).text("Top N"))
                .changed();

            // ---- Boolean indicator ----
            if !state.flags.is_empty() {
                ui.separator();
                ui.strong("Require indicator");
                let flags = state.flags.clone();
                let label = state.params.flag.clone().unwrap_or_else(|| "None".to_string());
                egui::ComboBox::from_id_salt("flag")
                    .selected_text(label)
                    .show_ui(ui, |ui: &mut Ui| {
                        changed |= ui.selectable_value(&mut state.params.flag, None, "None").changed();
                        for f in &flags {
                            changed |= ui
                                .selectable_value(&mut state.params.flag, Some(f.clone()), f.as_str())
                                .changed();
                        }
                    });
            }
        });

    if changed {
        state.recompute();
    }
}

/// Column pickers for the bivariate tab.
fn bivariate_controls(ui: &mut Ui, state: &mut AppState) {
    let columns = state.bivariate_columns();
    let mut changed = false;
    ui.horizontal(|ui: &mut Ui| {
        for (id, target) in [("bivar_a", &mut state.bivariate_a), ("bivar_b", &mut state.bivariate_b)] {
            egui::ComboBox::from_id_salt(id)
                .selected_text(metric_display_name(target.as_str()))
                .show_ui(ui, |ui: &mut Ui| {
                    for c in &columns {
                        changed |= ui
                            .selectable_value(&mut *target, c.clone(), metric_display_name(c))
                            .changed();
                    }
                });
        }
        changed |= ui
            .add(egui::Slider::new(&mut state.buckets, 2..=4).text("Buckets"))
            .changed();
    });
    if changed {
        state.recompute_bivariate();
    }
}

// ---------------------------------------------------------------------------
// Central panel
// ---------------------------------------------------------------------------

pub fn central_panel(ui: &mut Ui, state: &mut AppState) {
    ui.horizontal(|ui: &mut Ui| {
        ui.selectable_value(&mut state.tab, Tab::Map, "Map");
        ui.selectable_value(&mut state.tab, Tab::Ranking, "Top N");
        ui.selectable_value(&mut state.tab, Tab::Table, "Table");
        ui.selectable_value(&mut state.tab, Tab::Bivariate, "Income vs. indicator");
    });
    ui.separator();

    if let Some(msg) = state.active_diagnostic() {
        ui.label(RichText::new(msg).color(Color32::RED));
    }
    let Some(view) = state.view.take() else {
        ui.label(if state.is_loading() { "Loading datasets…" } else { "No data loaded." });
        return;
    };
    view_body(ui, state, &view);
    state.view = Some(view);
}

fn view_body(ui: &mut Ui, state: &mut AppState, view: &hazard_lens::PanelView) {
    if state.tab == Tab::Map {
        for layer in &state.overlay {
            for w in &layer.view.warnings {
                ui.label(RichText::new(w).color(Color32::YELLOW));
            }
        }
        plot::hazard_map(ui, &state.overlay);
        return;
    }

    for w in &view.warnings {
        ui.label(RichText::new(w).color(Color32::YELLOW));
    }
    if view.signal == Signal::Ok {
        ui.label(view.summary.as_str());
    }

    let kind = state.params.kind;
    match state.tab {
        Tab::Map => {} // overlay drawn above
        Tab::Ranking => plot::ranking_bars(ui, kind, view),
        Tab::Table => table::data_table(ui, "matches", &view.matches),
        Tab::Bivariate => {
            bivariate_controls(ui, state);
            match &state.bivariate {
                Some(BivariateView::Chart(b)) => {
                    plot::category_bars(ui, b, state.category_colors.as_ref());
                }
                Some(BivariateView::Fallback { warning, stats }) => {
                    ui.label(RichText::new(warning).color(Color32::YELLOW));
                    for s in stats {
                        ui.label(format!(
                            "{}: n={}, min={:.2}, median={:.2}, mean={:.2}, max={:.2}",
                            metric_display_name(&s.column),
                            s.count,
                            s.min,
                            s.median,
                            s.mean,
                            s.max
                        ));
                    }
                }
                None => {}
            }
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
            if ui.button("Export CSV…").clicked() {
                save_csv_dialog(state);
                ui.close_menu();
            }
            if ui
                .add_enabled(!state.is_loading(), egui::Button::new("Reload sources"))
                .clicked()
            {
                state.reload(true);
                ui.close_menu();
            }
        });

        ui.separator();

        if let Some(view) = &state.view {
            ui.label(format!(
                "{} rows loaded, {} matching, {} on map",
                state.active_table().len(),
                view.matches.len(),
                view.display.len()
            ));
        }

        if state.is_loading() {
            ui.spinner();
            ui.label("Loading…");
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialog
// ---------------------------------------------------------------------------

pub fn save_csv_dialog(state: &mut AppState) {
    let file_name = format!("{}_filtered.csv", state.params.kind.key());
    let file = rfd::FileDialog::new()
        .set_title("Export filtered table")
        .set_file_name(file_name)
        .add_filter("CSV", &["csv"])
        .save_file();

    if let Some(path) = file {
        match state.export_csv(&path) {
            Ok(()) => state.status_message = None,
            Err(e) => {
                log::error!("Failed to export: {e:#}");
                state.status_message = Some(format!("Error: {e:#}"));
            }
        }
    }
}
