use std::collections::BTreeMap;

use eframe::egui::{Color32, Ui};
use egui_plot::{Bar, BarChart, Legend, MarkerShape, Plot, PlotPoints, Points};

use hazard_lens::data::bucket::Bivariate;
use hazard_lens::data::schema::{metric_display_name, DatasetKind, COUNTY, LAT, LON, LOW_INCOME_PCT, STATE};
use hazard_lens::{HazardLayer, PanelView};

use crate::color::{risk_color, CategoryColors};

/// Colour steps used to batch map markers into a few series.
const COLOR_STEPS: usize = 8;

/// Marker diameter from low-income share: `pct * 0.15 + 5`.
fn marker_radius(pct: Option<f64>) -> f32 {
    let pct = pct.unwrap_or(0.0).clamp(0.0, 100.0);
    ((pct * 0.15 + 5.0) / 2.0) as f32
}

// ---------------------------------------------------------------------------
// Map (central panel)
// ---------------------------------------------------------------------------

/// Map marker batches for one layer: (colour step, radius in quarter-points) → points.
fn layer_series(view: &PanelView) -> BTreeMap<(usize, u32), Vec<[f64; 2]>> {
    let table = &view.display;
    let mut series: BTreeMap<(usize, u32), Vec<[f64; 2]>> = BTreeMap::new();
    let (Some(lat), Some(lon), Some(metric)) = (
        table.column_index(LAT),
        table.column_index(LON),
        table.column_index(&view.metric),
    ) else {
        return series;
    };
    let pct = table.column_index(LOW_INCOME_PCT);

    let values: Vec<f64> = (0..table.len()).filter_map(|i| table.number(i, metric)).collect();
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    for i in 0..table.len() {
        let (Some(y), Some(x), Some(v)) = (table.number(i, lat), table.number(i, lon), table.number(i, metric))
        else {
            continue;
        };
        let t = if range.abs() < f64::EPSILON { 1.0 } else { (v - min) / range };
        let step = ((t * (COLOR_STEPS - 1) as f64).round() as usize).min(COLOR_STEPS - 1);
        let radius = marker_radius(pct.and_then(|p| table.number(i, p)));
        series
            .entry((step, (radius * 4.0).round() as u32))
            .or_default()
            .push([x, y]);
    }
    series
}

/// Scatter of county centroids, one layer per hazard: colour = risk on the
/// hazard's own ramp, size = low-income %.
pub fn hazard_map(ui: &mut Ui, layers: &[HazardLayer]) {
    let batches: Vec<(DatasetKind, BTreeMap<(usize, u32), Vec<[f64; 2]>>)> = layers
        .iter()
        .map(|layer| (layer.kind, layer_series(&layer.view)))
        .filter(|(_, series)| !series.is_empty())
        .collect();
    if batches.is_empty() {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("No map points to show");
        });
        return;
    }

    Plot::new("hazard_map")
        .legend(Legend::default())
        .x_axis_label("Longitude")
        .y_axis_label("Latitude")
        .data_aspect(1.2)
        .allow_boxed_zoom(true)
        .allow_drag(true)
        .allow_scroll(true)
        .allow_zoom(true)
        .show(ui, |plot_ui| {
            for (kind, series) in batches {
                for (n, ((step, quarter_radius), pts)) in series.into_iter().enumerate() {
                    let t = step as f64 / (COLOR_STEPS - 1) as f64;
                    let mut points = Points::new(PlotPoints::from(pts))
                        .color(risk_color(kind, t))
                        .shape(MarkerShape::Circle)
                        .filled(true)
                        .radius(quarter_radius as f32 / 4.0);
                    // One legend entry per hazard.
                    if n == 0 {
                        points = points.name(kind.to_string());
                    }
                    plot_ui.points(points);
                }
            }
        });
}

// ---------------------------------------------------------------------------
// Bar charts
// ---------------------------------------------------------------------------

/// Top-N regions by the ranking metric, highest first.
pub fn ranking_bars(ui: &mut Ui, kind: DatasetKind, view: &PanelView) {
    let table = &view.ranked;
    let Some(metric) = table.column_index(&view.metric) else {
        ui.label("No ranking available.");
        return;
    };
    let county = table.column_index(COUNTY);
    let state = table.column_index(STATE);

    let bars: Vec<Bar> = (0..table.len())
        .filter_map(|i| {
            let v = table.number(i, metric)?;
            let label = format!(
                "{}, {}",
                county.and_then(|c| table.text(i, c)).unwrap_or("?"),
                state.and_then(|s| table.text(i, s)).unwrap_or("?"),
            );
            Some(Bar::new(i as f64, v).name(label).width(0.7))
        })
        .collect();

    let name = metric_display_name(&view.metric);
    Plot::new("ranking_bars")
        .legend(Legend::default())
        .x_axis_label("Rank")
        .y_axis_label(name.clone())
        .allow_drag(false)
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(BarChart::new(bars).name(&name).color(risk_color(kind, 0.8)));
        });
}

/// Row counts per bivariate category.
pub fn category_bars(ui: &mut Ui, bivariate: &Bivariate, colors: Option<&CategoryColors>) {
    Plot::new("category_bars")
        .legend(Legend::default())
        .y_axis_label("Counties")
        .allow_drag(false)
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            for (i, (label, count)) in bivariate.counts.iter().enumerate() {
                let color = colors
                    .map(|c| c.color_for(label))
                    .unwrap_or(Color32::LIGHT_BLUE);
                let bar = Bar::new(i as f64, *count as f64).width(0.7).fill(color);
                plot_ui.bar_chart(BarChart::new(vec![bar]).name(label).color(color));
            }
        });
}
