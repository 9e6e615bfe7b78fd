//! Chart rendering using Plotters

use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::Path;

use crate::config::ChartFormat;
use crate::report::ChartSpec;

/// Bar colors, cycled by category position
const BAR_COLORS: [RGBColor; 3] = [GREEN, RED, RGBColor(128, 128, 128)];

/// Render a bar chart to `output_path` in the requested format
///
/// # Arguments
/// * `spec` - Fully computed chart specification
/// * `output_path` - Destination file
/// * `format` - png (bitmap backend) or svg
pub fn render_chart(spec: &ChartSpec, output_path: &Path, format: ChartFormat) -> crate::Result<()> {
    match format {
        ChartFormat::Png => {
            let root = BitMapBackend::new(output_path, (800, 500)).into_drawing_area();
            draw_bar_chart(&root, spec)?;
            root.present()?;
        }
        ChartFormat::Svg => {
            let root = SVGBackend::new(output_path, (800, 500)).into_drawing_area();
            draw_bar_chart(&root, spec)?;
            root.present()?;
        }
    }

    tracing::debug!(chart = %spec.name, "chart saved to {}", output_path.display());
    Ok(())
}

fn draw_bar_chart<DB>(root: &DrawingArea<DB, Shift>, spec: &ChartSpec) -> crate::Result<()>
where
    DB: DrawingBackend,
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;

    let n_bars = spec.bars.len().max(1);
    let y_max = if spec.y_max > 0.0 { spec.y_max } else { 1.0 };

    let mut chart = ChartBuilder::on(root)
        .caption(&spec.title, ("sans-serif", 28))
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..(n_bars as f64 - 0.5), 0f64..y_max)?;

    // Bar centres sit on integer x positions
    let category_label = |x: &f64| -> String {
        let idx = x.round();
        if (x - idx).abs() > 1e-6 || idx < 0.0 {
            return String::new();
        }
        spec.bars
            .get(idx as usize)
            .map(|bar| bar.category.clone())
            .unwrap_or_default()
    };

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n_bars)
        .x_label_formatter(&category_label)
        .x_desc(spec.x_label.as_str())
        .y_desc(spec.y_label.as_str())
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    chart.draw_series(spec.bars.iter().enumerate().filter_map(|(i, bar)| {
        let x = i as f64;
        let color = BAR_COLORS[i % BAR_COLORS.len()];
        bar.value
            .map(|value| Rectangle::new([(x - 0.35, 0.0), (x + 0.35, value)], color.filled()))
    }))?;

    // Categories without data are annotated rather than drawn as zero
    chart.draw_series(
        spec.bars
            .iter()
            .enumerate()
            .filter(|(_, bar)| bar.value.is_none())
            .map(|(i, _)| {
                Text::new(
                    "no data".to_string(),
                    (i as f64 - 0.2, y_max * 0.05),
                    ("sans-serif", 14),
                )
            }),
    )?;

    Ok(())
}
