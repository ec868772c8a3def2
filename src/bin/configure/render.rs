use ratatui::prelude::*;
use ratatui::widgets::*;

use options_backtester::engine::{FormController, FormState, RequestState};
use options_backtester::types::{ConnectivityStatus, DraftKind};

use crate::app::{fields, App, Field};

// ─── Colors & style helpers ───

const BORDER: Style = Style::new().fg(Color::DarkGray);
const FOCUS_BORDER: Style = Style::new().fg(Color::Cyan);
const LABEL: Style = Style::new().fg(Color::DarkGray);

fn connectivity_color(status: ConnectivityStatus) -> Color {
    match status {
        ConnectivityStatus::Checking => Color::Yellow,
        ConnectivityStatus::Healthy => Color::Green,
        ConnectivityStatus::Unhealthy => Color::Red,
    }
}

// ─── Main draw ───

pub fn draw(app: &App, frame: &mut Frame) {
    if let Some(view) = &app.results {
        view.draw(frame);
        return;
    }

    let requests = app.orchestrator.snapshot();

    let [header_area, body_area, status_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(12),
        Constraint::Length(5),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    let [validate_area, backtest_area] = Layout::horizontal([
        Constraint::Percentage(50),
        Constraint::Percentage(50),
    ])
    .areas(body_area);

    let buf = frame.buffer_mut();
    render_header(app, &requests, header_area, buf);
    render_form(app, DraftKind::Validation, validate_area, buf);
    render_form(app, DraftKind::Backtest, backtest_area, buf);
    render_status(&requests, status_area, buf);
    render_footer(app, footer_area, buf);
}

fn render_header(app: &App, requests: &RequestState, area: Rect, buf: &mut Buffer) {
    let busy = if requests.busy() { " | working..." } else { "" };
    let line = Line::from(vec![
        Span::raw(format!(" Options Strategy Backtester | {} | ", app.api_label)),
        Span::styled(
            app.connectivity.label(),
            Style::default().fg(connectivity_color(app.connectivity)).bg(Color::Black),
        ),
        Span::raw(busy),
    ]);
    Paragraph::new(line)
        .style(Style::default().fg(Color::Black).bg(Color::Cyan))
        .render(area, buf);
}

fn render_form(app: &App, kind: DraftKind, area: Rect, buf: &mut Buffer) {
    let form = app.form(kind);
    let focused = app.focus == kind;
    let title = match kind {
        DraftKind::Validation => "Validate Strategy [v]",
        DraftKind::Backtest => "Run Backtest [r]",
    };
    let state = match form.state() {
        FormState::Uninitialized if form.last_error().is_some() => " (metadata unavailable)",
        FormState::Uninitialized => "",
        FormState::AwaitingMetadata => " (loading metadata)",
        FormState::Ready => "",
    };

    let lines: Vec<Line> = fields(kind)
        .iter()
        .enumerate()
        .map(|(i, field)| {
            let selected = focused && i == app.cursor;
            let marker = if selected { "> " } else { "  " };
            let value_style = if selected {
                Style::default().fg(Color::Black).bg(Color::Yellow)
            } else {
                Style::default().fg(Color::White)
            };
            Line::from(vec![
                Span::raw(marker),
                Span::styled(format!("{:<13}", field.label()), LABEL),
                Span::styled(field_value(form, *field), value_style),
            ])
        })
        .collect();

    Paragraph::new(lines)
        .block(
            Block::bordered()
                .title(format!("{}{}", title, state))
                .border_style(if focused { FOCUS_BORDER } else { BORDER }),
        )
        .render(area, buf);
}

fn field_value(form: &FormController, field: Field) -> String {
    let d = form.draft();
    let or_dash = |v: Option<String>| v.unwrap_or_else(|| "-".into());
    match field {
        Field::Dataset if d.dataset_name.is_empty() => "-".into(),
        Field::Dataset => d.dataset_name.clone(),
        Field::OptionType => d.option_type.to_string(),
        Field::Expiry => or_dash(d.expiry.clone()),
        Field::Strike => or_dash(d.strike.map(|s| format!("{:.2}", s))),
        Field::Direction => d.position_direction.to_string(),
        Field::Quantity => d.quantity.to_string(),
        Field::StartDate => or_dash(d.start_date.map(|x| x.to_string())),
        Field::EndDate => or_dash(d.end_date.map(|x| x.to_string())),
    }
}

fn render_status(requests: &RequestState, area: Rect, buf: &mut Buffer) {
    let mut lines = Vec::new();

    if let Some(err) = &requests.error {
        lines.push(Line::from(vec![
            Span::styled("Error: ", Style::default().fg(Color::Red).bold()),
            Span::styled(err.clone(), Style::default().fg(Color::Red)),
        ]));
    }

    if let Some(v) = &requests.validation {
        let (tag, color) = if v.valid { ("VALID", Color::Green) } else { ("INVALID", Color::Red) };
        let mut spans = vec![
            Span::styled(format!("{} ", tag), Style::default().fg(color).bold()),
            Span::raw(v.message.clone()),
        ];
        if let Some(p) = v.entry_price {
            spans.push(Span::styled(format!("  entry ${:.2}", p), Style::default().fg(Color::Yellow)));
        }
        lines.push(Line::from(spans));
    }

    if let Some(r) = &requests.backtest {
        let pnl = r.results.final_pnl;
        lines.push(Line::from(vec![
            Span::styled("Last backtest: ", LABEL),
            Span::styled(
                format!("P&L ${:+.2}", pnl),
                Style::default().fg(if pnl >= 0.0 { Color::Green } else { Color::Red }),
            ),
            Span::styled(format!("  win {:.1}%  [o] view", r.results.win_rate), LABEL),
        ]));
    }

    if lines.is_empty() {
        lines.push(Line::styled("Configure a strategy, then validate or run a backtest.", LABEL));
    }

    Paragraph::new(lines)
        .wrap(Wrap { trim: true })
        .block(Block::bordered().title("Status").border_style(BORDER))
        .render(area, buf);
}

fn render_footer(app: &App, area: Rect, buf: &mut Buffer) {
    if let Some(msg) = app.notice() {
        Paragraph::new(format!(" {}", msg))
            .style(Style::default().fg(Color::Black).bg(Color::Green))
            .render(area, buf);
        return;
    }
    let text = " [Tab] Section  [Up/Dn] Field  [</>] Change  [+/-] Qty/Date  [v] Validate  [r] Backtest  [o] Results  [q] Quit";
    Paragraph::new(text)
        .style(Style::default().fg(Color::Black).bg(Color::DarkGray))
        .render(area, buf);
}
