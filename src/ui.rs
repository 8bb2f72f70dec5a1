use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame,
};
use crate::app::App;
use crate::simulation::PortfolioSample;

/// Low-to-high Sharpe palette, yellow through green to blue.
const SHARPE_PALETTE: [Color; 5] = [
    Color::Rgb(255, 255, 204),
    Color::Rgb(161, 218, 180),
    Color::Rgb(65, 182, 196),
    Color::Rgb(44, 127, 184),
    Color::Rgb(37, 52, 148),
];

/// Splits samples into `n_bands` equal-width Sharpe bands of
/// `(volatility, return)` points, lowest band first.
pub fn sharpe_bands(samples: &[PortfolioSample], n_bands: usize) -> Vec<Vec<(f64, f64)>> {
    let mut bands = vec![Vec::new(); n_bands];
    if samples.is_empty() || n_bands == 0 {
        return bands;
    }

    let (min, max) = sharpe_range(samples);
    let span = max - min;

    for s in samples {
        let band = if span > 0.0 {
            (((s.metrics.sharpe - min) / span) * n_bands as f64) as usize
        } else {
            0
        };
        bands[band.min(n_bands - 1)].push((s.metrics.annual_vol, s.metrics.annual_return));
    }
    bands
}

fn sharpe_range(samples: &[PortfolioSample]) -> (f64, f64) {
    samples.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
        (lo.min(s.metrics.sharpe), hi.max(s.metrics.sharpe))
    })
}

/// Legend label for band `band` of `n_bands` over the Sharpe range `[min, max]`.
fn band_label(min: f64, max: f64, band: usize, n_bands: usize) -> String {
    let step = (max - min) / n_bands as f64;
    let lo = min + step * band as f64;
    let hi = if band + 1 == n_bands { max } else { lo + step };
    format!("Sharpe {:.2}..{:.2}", lo, hi)
}

fn padded_bounds(values: impl Iterator<Item = f64>) -> [f64; 2] {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let pad = ((hi - lo) * 0.05).max(1e-3);
    [lo - pad, hi + pad]
}

fn pct(v: f64) -> String {
    format!("{:.1}%", v * 100.0)
}

pub fn render(f: &mut Frame, app: &App) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(f.area());

    render_header(f, app, layout[0]);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(72), Constraint::Percentage(28)])
        .split(layout[1]);

    render_frontier(f, app, body[0]);
    render_details(f, app, body[1]);
    render_footer(f, layout[2]);
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let report = &app.report;
    let spans = vec![
        Span::styled(" Efficient Frontier ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw(" | "),
        Span::styled(report.assets.join(", "), Style::default().fg(Color::White)),
        Span::raw(" | "),
        Span::styled(
            format!(
                "{} portfolios, {} weights, seed {}",
                report.samples.len(),
                report.sampling.as_str(),
                report.seed
            ),
            Style::default().fg(Color::Yellow),
        ),
    ];

    let header = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    f.render_widget(header, area);
}

fn render_footer(f: &mut Frame, area: Rect) {
    let footer = Paragraph::new(Line::from(vec![
        Span::styled(" Controls: ", Style::default().fg(Color::Gray)),
        Span::styled("b: toggle benchmark | q/Esc: quit", Style::default().fg(Color::White)),
    ]))
    .block(Block::default().borders(Borders::ALL));

    f.render_widget(footer, area);
}

fn render_frontier(f: &mut Frame, app: &App, area: Rect) {
    let report = &app.report;
    let best = report.optimal();
    let bench = &report.benchmark_metrics;

    let bands = sharpe_bands(&report.samples, SHARPE_PALETTE.len());
    let optimum_point = vec![(best.metrics.annual_vol, best.metrics.annual_return)];
    let benchmark_point = vec![(bench.annual_vol, bench.annual_return)];

    let (min_sharpe, max_sharpe) = sharpe_range(&report.samples);
    let n_bands = bands.len();
    let mut datasets: Vec<Dataset> = bands
        .iter()
        .zip(SHARPE_PALETTE.iter())
        .enumerate()
        .filter(|(_, (points, _))| !points.is_empty())
        .map(|(i, (points, color))| {
            Dataset::default()
                .name(band_label(min_sharpe, max_sharpe, i, n_bands))
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Scatter)
                .style(Style::default().fg(*color))
                .data(points)
        })
        .collect();

    if app.show_benchmark {
        datasets.push(
            Dataset::default()
                .name(format!("Market ({})", report.benchmark))
                .marker(symbols::Marker::Block)
                .graph_type(GraphType::Scatter)
                .style(Style::default().fg(Color::Red))
                .data(&benchmark_point),
        );
    }

    datasets.push(
        Dataset::default()
            .name(format!("Optimal (Sharpe {:.2})", best.metrics.sharpe))
            .marker(symbols::Marker::Block)
            .graph_type(GraphType::Scatter)
            .style(Style::default().fg(Color::Green))
            .data(&optimum_point),
    );

    let mut vols: Vec<f64> = report.samples.iter().map(|s| s.metrics.annual_vol).collect();
    let mut rets: Vec<f64> = report.samples.iter().map(|s| s.metrics.annual_return).collect();
    if app.show_benchmark {
        vols.push(bench.annual_vol);
        rets.push(bench.annual_return);
    }
    let x_bounds = padded_bounds(vols.into_iter());
    let y_bounds = padded_bounds(rets.into_iter());

    let chart = Chart::new(datasets)
        .block(
            Block::default()
                .title(Span::styled(
                    " Simulated Portfolios ",
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL),
        )
        .x_axis(
            Axis::default()
                .title("Volatility")
                .style(Style::default().fg(Color::Gray))
                .bounds(x_bounds)
                .labels(vec![
                    Span::styled(pct(x_bounds[0]), Style::default().fg(Color::Gray)),
                    Span::styled(pct((x_bounds[0] + x_bounds[1]) / 2.0), Style::default().fg(Color::Gray)),
                    Span::styled(pct(x_bounds[1]), Style::default().fg(Color::Gray)),
                ]),
        )
        .y_axis(
            Axis::default()
                .title("Return")
                .style(Style::default().fg(Color::Gray))
                .bounds(y_bounds)
                .labels(vec![
                    Span::styled(pct(y_bounds[0]), Style::default().fg(Color::Gray)),
                    Span::styled(pct((y_bounds[0] + y_bounds[1]) / 2.0), Style::default().fg(Color::Gray)),
                    Span::styled(pct(y_bounds[1]), Style::default().fg(Color::Gray)),
                ]),
        );

    f.render_widget(chart, area);
}

fn render_details(f: &mut Frame, app: &App, area: Rect) {
    let report = &app.report;
    let best = report.optimal();
    let bench = &report.benchmark_metrics;

    let mut info_text = vec![
        Line::from(Span::styled("Optimal Weights", Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))),
    ];
    for (asset, w) in report.optimal_weights() {
        info_text.push(Line::from(format!("{:<8} {:>6.2}%", asset, w * 100.0)));
    }

    info_text.push(Line::from(""));
    info_text.push(Line::from(Span::styled("Optimized Portfolio", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))));
    info_text.push(Line::from(format!("Return:     {:.2}%", best.metrics.annual_return * 100.0)));
    info_text.push(Line::from(format!("Volatility: {:.2}%", best.metrics.annual_vol * 100.0)));
    info_text.push(Line::from(format!("Sharpe:     {:.2}", best.metrics.sharpe)));
    info_text.push(Line::from(format!("Simulation: #{}", best.index)));

    info_text.push(Line::from(""));
    info_text.push(Line::from(Span::styled(
        format!("Market ({})", report.benchmark),
        Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
    )));
    info_text.push(Line::from(format!("Return:     {:.2}%", bench.annual_return * 100.0)));
    info_text.push(Line::from(format!("Volatility: {:.2}%", bench.annual_vol * 100.0)));
    info_text.push(Line::from(format!("Sharpe:     {:.2}", bench.sharpe)));

    let info_block = Paragraph::new(info_text)
        .block(Block::default().borders(Borders::ALL).title("Details"))
        .style(Style::default().fg(Color::White));

    f.render_widget(info_block, area);
}
