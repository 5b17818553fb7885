//! SVG charts of valuation results.
//!
//! Comparative charts put every bank on one figure (lines for ROE and Ke,
//! grouped bars for the spread). Per-bank charts show ROE against Ke and the
//! yearly spread.

use crate::export::{BankValuation, ExportError};
use crate::pivot::{PivotMetric, PivotTable};
use crate::summary::format_pct;
use plotters::prelude::*;
use std::ops::Range;

const SIZE: (u32, u32) = (960, 540);

const PALETTE: [RGBColor; 6] = [
    RGBColor(0x1f, 0x77, 0xb4),
    RGBColor(0xff, 0x7f, 0x0e),
    RGBColor(0x2c, 0xa0, 0x2c),
    RGBColor(0xd6, 0x27, 0x28),
    RGBColor(0x94, 0x67, 0xbd),
    RGBColor(0x8c, 0x56, 0x4b),
];

/// Share of a year slot covered by a group of bars.
const GROUP_WIDTH: f64 = 0.8;

/// Named (year, value) points.
#[derive(Debug, Clone, PartialEq)]
struct ChartSeries {
    name: String,
    points: Vec<(i32, f64)>,
}

fn chart_error(e: impl std::fmt::Display) -> ExportError {
    ExportError::Chart(e.to_string())
}

fn color(index: usize) -> RGBColor {
    PALETTE[index % PALETTE.len()]
}

fn year_label(x: &f64) -> String {
    if (x - x.round()).abs() < 1e-6 {
        format!("{:.0}", x)
    } else {
        String::new()
    }
}

fn brl_billions(v: &f64) -> String {
    format!("R$ {:.1} bi", v / 1e9)
}

fn pct_label(v: &f64) -> String {
    format_pct(*v)
}

/// Year axis padded by half a year on each side, and a value axis that
/// always includes zero.
fn bounds(series: &[ChartSeries]) -> Option<(Range<f64>, Range<f64>)> {
    let points = series.iter().flat_map(|s| s.points.iter());
    let (mut first, mut last) = (i32::MAX, i32::MIN);
    let (mut low, mut high) = (0.0_f64, 0.0_f64);
    let mut any = false;
    for &(year, value) in points {
        any = true;
        first = first.min(year);
        last = last.max(year);
        low = low.min(value);
        high = high.max(value);
    }
    if !any {
        return None;
    }

    let span = high - low;
    let pad = if span > 0.0 { span * 0.1 } else { 0.01 };
    Some((
        (f64::from(first) - 0.5)..(f64::from(last) + 0.5),
        (low - pad)..(high + pad),
    ))
}

fn line_chart(
    title: &str,
    series: &[ChartSeries],
    y_label: fn(&f64) -> String,
) -> Result<String, ExportError> {
    let (x_range, y_range) = bounds(series).ok_or_else(|| chart_error("no data to plot"))?;
    let years = (x_range.end - x_range.start).round() as usize;

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(chart_error)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 24))
            .margin(16)
            .x_label_area_size(36)
            .y_label_area_size(80)
            .build_cartesian_2d(x_range.clone(), y_range)
            .map_err(chart_error)?;

        chart
            .configure_mesh()
            .x_labels(years + 1)
            .x_label_formatter(&year_label)
            .y_label_formatter(&y_label)
            .x_desc("Ano")
            .draw()
            .map_err(chart_error)?;

        chart
            .draw_series(LineSeries::new(
                [(x_range.start, 0.0), (x_range.end, 0.0)],
                BLACK.stroke_width(1),
            ))
            .map_err(chart_error)?;

        for (i, s) in series.iter().enumerate() {
            let c = color(i);
            let points: Vec<(f64, f64)> =
                s.points.iter().map(|&(year, v)| (f64::from(year), v)).collect();

            chart
                .draw_series(LineSeries::new(points.iter().copied(), c.stroke_width(2)))
                .map_err(chart_error)?
                .label(s.name.as_str())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], c.stroke_width(2)));
            chart
                .draw_series(points.iter().map(|&p| Circle::new(p, 3, c.filled())))
                .map_err(chart_error)?;
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(chart_error)?;

        root.present().map_err(chart_error)?;
    }
    Ok(svg)
}

fn bar_chart(
    title: &str,
    series: &[ChartSeries],
    y_label: fn(&f64) -> String,
) -> Result<String, ExportError> {
    let (x_range, y_range) = bounds(series).ok_or_else(|| chart_error("no data to plot"))?;
    let years = (x_range.end - x_range.start).round() as usize;
    let width = GROUP_WIDTH / series.len().max(1) as f64;

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(chart_error)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 24))
            .margin(16)
            .x_label_area_size(36)
            .y_label_area_size(80)
            .build_cartesian_2d(x_range.clone(), y_range)
            .map_err(chart_error)?;

        chart
            .configure_mesh()
            .x_labels(years + 1)
            .x_label_formatter(&year_label)
            .y_label_formatter(&y_label)
            .x_desc("Ano")
            .draw()
            .map_err(chart_error)?;

        for (i, s) in series.iter().enumerate() {
            let c = color(i);
            let offset = -GROUP_WIDTH / 2.0 + width * i as f64;
            chart
                .draw_series(s.points.iter().map(|&(year, v)| {
                    let left = f64::from(year) + offset;
                    Rectangle::new([(left, 0.0), (left + width, v)], c.filled())
                }))
                .map_err(chart_error)?
                .label(s.name.as_str())
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 12, y + 5)], c.filled()));
        }

        chart
            .draw_series(LineSeries::new(
                [(x_range.start, 0.0), (x_range.end, 0.0)],
                BLACK.stroke_width(1),
            ))
            .map_err(chart_error)?;

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(&WHITE.mix(0.8))
            .border_style(&BLACK)
            .draw()
            .map_err(chart_error)?;

        root.present().map_err(chart_error)?;
    }
    Ok(svg)
}

fn pivot_series(table: &PivotTable) -> Vec<ChartSeries> {
    table
        .banks
        .iter()
        .enumerate()
        .map(|(column, bank)| ChartSeries {
            name: bank.clone(),
            points: table
                .rows
                .iter()
                .filter_map(|r| r.values.get(column).copied().flatten().map(|v| (r.year, v)))
                .collect(),
        })
        .collect()
}

/// Metrics charted across banks in the report bundle.
pub const CHARTED: [PivotMetric; 3] = [PivotMetric::Roe, PivotMetric::Spread, PivotMetric::Ke];

/// Render a metric across banks as SVG.
///
/// Spreads and excess returns are drawn as grouped bars, rates as lines.
pub fn pivot_chart(table: &PivotTable) -> Result<String, ExportError> {
    let series = pivot_series(table);
    let y_label: fn(&f64) -> String = if table.metric.is_rate() {
        pct_label
    } else {
        brl_billions
    };
    match table.metric {
        PivotMetric::Roe | PivotMetric::Ke => line_chart(table.metric.title(), &series, y_label),
        PivotMetric::Spread | PivotMetric::ExcessReturn => {
            bar_chart(table.metric.title(), &series, y_label)
        }
    }
}

/// Render a bank's ROE against its cost of equity as SVG.
pub fn roe_vs_ke_chart(valuation: &BankValuation) -> Result<String, ExportError> {
    let series = [
        ChartSeries {
            name: "ROE".to_string(),
            points: valuation.rows.iter().map(|r| (r.year, r.roe)).collect(),
        },
        ChartSeries {
            name: "Ke".to_string(),
            points: valuation.rows.iter().map(|r| (r.year, r.ke)).collect(),
        },
    ];
    line_chart(&format!("{}: ROE vs. Ke", valuation.bank), &series, pct_label)
}

/// Render a bank's yearly value spread as SVG.
pub fn spread_chart(valuation: &BankValuation) -> Result<String, ExportError> {
    let series = [ChartSeries {
        name: "ROE - Ke".to_string(),
        points: valuation.rows.iter().map(|r| (r.year, r.spread)).collect(),
    }];
    bar_chart(&format!("{}: Spread de Valor", valuation.bank), &series, pct_label)
}
