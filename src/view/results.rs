use ratatui::prelude::*;
use ratatui::widgets::*;
use tracing::warn;

use crate::error::ClientError;
use crate::handoff::ResultHandoff;
use crate::types::BacktestResult;

// ─── Colors & style helpers ───

const BORDER: Style = Style::new().fg(Color::DarkGray);
const LABEL: Style = Style::new().fg(Color::DarkGray);

pub const EMPTY_TITLE: &str = "No Results Found";
pub const EMPTY_HINT: &str = "run a backtest first";

fn pnl_color(v: f64) -> Color {
    if v >= 0.0 { Color::Green } else { Color::Red }
}

fn field_line(label: &str, value: String, color: Color) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{:<16}", label), LABEL),
        Span::styled(value, Style::default().fg(color)),
    ])
}

/// What a results view shows. Built once from the handoff; reopening the
/// view reads the slot again.
#[derive(Clone, Debug, PartialEq)]
pub enum ResultsView {
    Loaded(Box<BacktestResult>),
    /// Nothing published yet.
    Empty,
    /// The slot exists but could not be read or decoded.
    Unreadable(String),
}

impl ResultsView {
    pub fn load(handoff: &ResultHandoff) -> Self {
        match handoff.consume() {
            Ok(r) => ResultsView::Loaded(Box::new(r)),
            Err(ClientError::NotFound(_)) => ResultsView::Empty,
            Err(e) => {
                warn!(error = %e, "results slot unreadable");
                ResultsView::Unreadable(e.user_message())
            }
        }
    }

    pub fn result(&self) -> Option<&BacktestResult> {
        match self {
            ResultsView::Loaded(r) => Some(r),
            _ => None,
        }
    }

    pub fn draw(&self, frame: &mut Frame) {
        let [header_area, body_area, footer_area] = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(8),
            Constraint::Length(1),
        ])
        .areas(frame.area());

        let buf = frame.buffer_mut();
        render_header(self.result(), header_area, buf);
        Paragraph::new(" [Esc] Close  [r] Reload  [q] Quit")
            .style(Style::default().fg(Color::Black).bg(Color::DarkGray))
            .render(footer_area, buf);

        match self {
            ResultsView::Loaded(r) => render_result(r, body_area, buf),
            ResultsView::Empty => render_empty(body_area, buf),
            ResultsView::Unreadable(msg) => render_unreadable(msg, body_area, buf),
        }
    }
}

// ─── Chart data ───

/// Cumulative P&L as (day index, pnl) points.
pub fn pnl_series(result: &BacktestResult) -> Vec<(f64, f64)> {
    result
        .results
        .daily_pnl
        .iter()
        .enumerate()
        .map(|(i, d)| (i as f64, d.cumulative_pnl))
        .collect()
}

/// Y bounds for the P&L chart. Always includes zero; padded so a flat
/// series still gets a visible band.
pub fn pnl_bounds(series: &[(f64, f64)]) -> (f64, f64) {
    let lo = series.iter().map(|p| p.1).fold(0.0_f64, f64::min);
    let hi = series.iter().map(|p| p.1).fold(0.0_f64, f64::max);
    let pad = ((hi - lo) * 0.1).max(1.0);
    (lo - pad, hi + pad)
}

// ─── Sections ───

fn render_header(result: Option<&BacktestResult>, area: Rect, buf: &mut Buffer) {
    let text = match result {
        Some(r) => {
            let s = &r.strategy_summary;
            let exec = r
                .execution_time_ms
                .map(|ms| format!(" | {} ms", ms))
                .unwrap_or_default();
            format!(
                " Backtest Results | {} {} {:.2} exp {}{}",
                s.position_direction, s.option_type, s.strike, s.expiry, exec
            )
        }
        None => " Backtest Results".to_string(),
    };
    Paragraph::new(text)
        .style(Style::default().fg(Color::Black).bg(Color::Cyan))
        .render(area, buf);
}

fn render_result(r: &BacktestResult, area: Rect, buf: &mut Buffer) {
    let [top_area, chart_area] = Layout::vertical([
        Constraint::Length(9),
        Constraint::Min(6),
    ])
    .areas(area);

    let [summary_area, metrics_area, period_area] = Layout::horizontal([
        Constraint::Percentage(36),
        Constraint::Percentage(36),
        Constraint::Percentage(28),
    ])
    .areas(top_area);

    render_summary(r, summary_area, buf);
    render_metrics(r, metrics_area, buf);
    render_period(r, period_area, buf);
    render_pnl_chart(r, chart_area, buf);
}

fn render_summary(r: &BacktestResult, area: Rect, buf: &mut Buffer) {
    let s = &r.strategy_summary;
    let lines = vec![
        field_line("Option Type", s.option_type.to_string(), Color::White),
        field_line("Strike", format!("${:.2}", s.strike), Color::White),
        field_line("Position", s.position_direction.to_string(), Color::White),
        field_line("Entry Price", format!("${:.2}", s.entry_price), Color::Yellow),
        field_line("Entry Date", s.entry_date.clone(), Color::White),
        field_line("Expiry", s.expiry.clone(), Color::White),
        field_line(
            "Quantity",
            s.quantity.map(|q| q.to_string()).unwrap_or_else(|| "-".into()),
            Color::White,
        ),
    ];
    Paragraph::new(lines)
        .block(Block::bordered().title("Strategy Summary").border_style(BORDER))
        .render(area, buf);
}

fn render_metrics(r: &BacktestResult, area: Rect, buf: &mut Buffer) {
    let m = &r.results;
    let lines = vec![
        field_line("Final P&L", format!("${:+.2}", m.final_pnl), pnl_color(m.final_pnl)),
        field_line("Win Rate", format!("{:.1}%", m.win_rate), Color::White),
        field_line("Max Drawdown", format!("${:.2}", m.max_drawdown), Color::LightRed),
        field_line(
            "Position Closed",
            if m.position_closed { "Yes" } else { "No" }.to_string(),
            Color::White,
        ),
        field_line("Exit Reason", m.exit_reason.replace('_', " "), Color::White),
    ];
    Paragraph::new(lines)
        .block(Block::bordered().title("Performance Metrics").border_style(BORDER))
        .render(area, buf);
}

fn render_period(r: &BacktestResult, area: Rect, buf: &mut Buffer) {
    let lines = match &r.backtest_period {
        Some(p) => vec![
            field_line("Start", p.start_date.clone(), Color::White),
            field_line("End", p.end_date.clone(), Color::White),
            field_line("Trading Days", p.total_days.to_string(), Color::White),
        ],
        None => vec![Line::styled("not reported", LABEL)],
    };
    Paragraph::new(lines)
        .block(Block::bordered().title("Backtest Period").border_style(BORDER))
        .render(area, buf);
}

fn render_pnl_chart(r: &BacktestResult, area: Rect, buf: &mut Buffer) {
    let block = Block::bordered().title("Cumulative P&L").border_style(BORDER);
    let data = pnl_series(r);
    if data.is_empty() {
        Paragraph::new(Line::styled("no daily P&L", LABEL))
            .block(block)
            .render(area, buf);
        return;
    }

    let x_max = (data.len() - 1).max(1) as f64;
    let (y_min, y_max) = pnl_bounds(&data);
    let zero = vec![(0.0, 0.0), (x_max, 0.0)];
    let color = pnl_color(r.results.final_pnl);

    let datasets = vec![
        Dataset::default().name("P&L").marker(symbols::Marker::Braille).graph_type(GraphType::Line)
            .style(Style::default().fg(color)).data(&data),
        Dataset::default().marker(symbols::Marker::Braille).graph_type(GraphType::Line)
            .style(BORDER).data(&zero),
    ];

    let daily = &r.results.daily_pnl;
    let first_date = daily.first().map(|d| d.date.clone()).unwrap_or_default();
    let last_date = daily.last().map(|d| d.date.clone()).unwrap_or_default();

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(Axis::default().bounds([0.0, x_max])
            .labels::<Vec<Line>>(vec![first_date.into(), last_date.into()])
            .style(BORDER))
        .y_axis(Axis::default().bounds([y_min, y_max])
            .labels::<Vec<Line>>(vec![format!("{:.0}", y_min).into(), "0".into(), format!("{:.0}", y_max).into()])
            .style(BORDER))
        .hidden_legend_constraints((Constraint::Percentage(0), Constraint::Percentage(0)));

    Widget::render(chart, area, buf);
}

fn render_empty(area: Rect, buf: &mut Buffer) {
    let lines = vec![
        Line::default(),
        Line::styled(EMPTY_TITLE, Style::default().fg(Color::Yellow).bold()),
        Line::styled(format!("{} – press [q], configure a strategy and press [r]", EMPTY_HINT), LABEL),
    ];
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .block(Block::bordered().border_style(BORDER))
        .render(area, buf);
}

fn render_unreadable(msg: &str, area: Rect, buf: &mut Buffer) {
    let lines = vec![
        Line::default(),
        Line::styled("Results could not be loaded", Style::default().fg(Color::Red).bold()),
        Line::styled(msg.to_string(), LABEL),
    ];
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(Block::bordered().border_style(BORDER))
        .render(area, buf);
}
