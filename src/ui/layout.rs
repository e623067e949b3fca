use {
    crate::pipeline::{IngestStats, PipelineEngine},
    crate::ui::renderer::{format_elapsed, format_timestamp_ms, format_value},
    ratatui::{
        layout::{Constraint, Layout as RatLayout, Rect},
        style::{Color, Modifier, Style},
        symbols,
        text::{Line, Span},
        widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
        Frame,
    },
};

/// Everything one frame needs, copied out of the engine under its lock
///
/// Both series are placed on one x axis measured from the earlier of the two
/// origins, so points line up by absolute time rather than by index.
#[derive(Debug, Clone, Default)]
pub struct ChartView {
    pub raw: Vec<(f64, f64)>,
    pub aggregates: Vec<(f64, f64)>,
    pub aggregate_label: &'static str,
    pub origin_ms: Option<i64>,
    pub latest_ms: Option<i64>,
    pub raw_total: usize,
    pub aggregate_total: usize,
    pub stats: IngestStats,
}

impl ChartView {
    pub fn build(engine: &PipelineEngine, trailing_secs: f64) -> Self {
        let series = engine.series();
        let raw = series.trailing_raw(trailing_secs);
        let aggregates = series.trailing_aggregates(trailing_secs);

        let origin_ms = match (series.raw_origin(), series.aggregate_origin()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        let latest_ms = raw
            .last()
            .map(|s| s.timestamp_ms)
            .into_iter()
            .chain(aggregates.last().map(|r| r.timestamp_ms))
            .max();

        let origin = origin_ms.unwrap_or(0);
        let offset = |ts: i64| (ts - origin) as f64 / 1000.0;

        Self {
            raw: raw.iter().map(|s| (offset(s.timestamp_ms), s.value)).collect(),
            aggregates: aggregates
                .iter()
                .map(|r| (offset(r.timestamp_ms), r.value))
                .collect(),
            aggregate_label: engine.mode().label(),
            origin_ms,
            latest_ms,
            raw_total: series.raw().len(),
            aggregate_total: series.aggregates().len(),
            stats: engine.stats(),
        }
    }
}

/// X and Y bounds covering both series, padded so lines don't touch the frame
pub fn chart_bounds(raw: &[(f64, f64)], aggregates: &[(f64, f64)]) -> ([f64; 2], [f64; 2]) {
    let points = raw.iter().chain(aggregates.iter());

    let (mut x_min, mut x_max) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut y_min, mut y_max) = (f64::INFINITY, f64::NEG_INFINITY);
    for (x, y) in points {
        x_min = x_min.min(*x);
        x_max = x_max.max(*x);
        y_min = y_min.min(*y);
        y_max = y_max.max(*y);
    }

    if !x_min.is_finite() {
        return ([0.0, 1.0], [0.0, 1.0]);
    }
    if x_max - x_min < 1.0 {
        x_max = x_min + 1.0;
    }
    let pad = ((y_max - y_min) * 0.1).max(0.5);

    ([x_min, x_max], [y_min - pad, y_max + pad])
}

/// Render the main UI layout
pub fn render_layout(f: &mut Frame, area: Rect, view: &ChartView) {
    let chunks = RatLayout::default()
        .direction(ratatui::layout::Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Chart
            Constraint::Length(3), // Footer/Status
        ])
        .split(area);

    render_header(f, chunks[0], view);
    render_chart(f, chunks[1], view);
    render_footer(f, chunks[2], view);
}

fn render_header(f: &mut Frame, area: Rect, view: &ChartView) {
    let header = Block::default()
        .borders(Borders::ALL)
        .title("SensorFlow - Live Aggregation");

    let text = vec![Line::from(vec![
        Span::styled("Received Data", Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD)),
        Span::raw(" vs "),
        Span::styled(view.aggregate_label, Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
        Span::raw("  |  Press 'q' or Esc to stop"),
    ])];

    f.render_widget(Paragraph::new(text).block(header), area);
}

fn render_chart(f: &mut Frame, area: Rect, view: &ChartView) {
    let (x_bounds, y_bounds) = chart_bounds(&view.raw, &view.aggregates);

    let datasets = vec![
        Dataset::default()
            .name("Received Data")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Blue))
            .data(&view.raw),
        Dataset::default()
            .name(view.aggregate_label)
            .marker(symbols::Marker::Dot)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::Red))
            .data(&view.aggregates),
    ];

    let x_mid = (x_bounds[0] + x_bounds[1]) / 2.0;
    let y_mid = (y_bounds[0] + y_bounds[1]) / 2.0;

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Data and Moving Average/Mean Plot"),
        )
        .x_axis(
            Axis::default()
                .title("Time (s)")
                .style(Style::default().fg(Color::Gray))
                .bounds(x_bounds)
                .labels(vec![
                    Span::raw(format_elapsed(x_bounds[0])),
                    Span::raw(format_elapsed(x_mid)),
                    Span::raw(format_elapsed(x_bounds[1])),
                ]),
        )
        .y_axis(
            Axis::default()
                .title("Value")
                .style(Style::default().fg(Color::Gray))
                .bounds(y_bounds)
                .labels(vec![
                    Span::raw(format_value(y_bounds[0])),
                    Span::raw(format_value(y_mid)),
                    Span::raw(format_value(y_bounds[1])),
                ]),
        );

    f.render_widget(chart, area);
}

fn render_footer(f: &mut Frame, area: Rect, view: &ChartView) {
    let latest = view
        .latest_ms
        .map(format_timestamp_ms)
        .unwrap_or_else(|| "waiting for data".to_string());
    let last_aggregate = view
        .aggregates
        .last()
        .map(|(_, v)| format_value(*v))
        .unwrap_or_else(|| "-".to_string());

    let text = vec![Line::from(vec![
        Span::styled("Samples: ", Style::default().fg(Color::Cyan)),
        Span::raw(view.raw_total.to_string()),
        Span::raw(" | "),
        Span::styled("Aggregates: ", Style::default().fg(Color::Cyan)),
        Span::raw(view.aggregate_total.to_string()),
        Span::raw(" | "),
        Span::styled("Last: ", Style::default().fg(Color::Cyan)),
        Span::raw(last_aggregate),
        Span::raw(" | "),
        Span::styled("Dropped: ", Style::default().fg(Color::Yellow)),
        Span::raw(view.stats.parse_failures.to_string()),
        Span::raw(" | "),
        Span::raw(latest),
    ])];

    let footer = Block::default().borders(Borders::ALL).title("Status");
    f.render_widget(Paragraph::new(text).block(footer), area);
}
