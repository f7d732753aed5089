// src/tui/mod.rs
use crate::core::advisor::Analysis;
use crate::core::operations::{OperationStatus, TradingOperation};
use crate::core::stats::TradingStats;
use crate::types::{AssetQuote, UiCommand, UiEvent};
use crate::utils::precision::format_price;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Row, Table, Wrap},
    Terminal,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::{io, time::Duration};
use tokio::sync::mpsc;

const MAX_LOGS: usize = 20;

pub struct App {
    pub quotes: Vec<AssetQuote>,
    pub live_prices: HashMap<String, Decimal>,
    pub analysis: Option<Analysis>,
    pub operations: Vec<TradingOperation>,
    pub stats: Option<TradingStats>,
    pub logs: Vec<String>,
}

impl App {
    pub fn new() -> Self {
        Self {
            quotes: Vec::new(),
            live_prices: HashMap::new(),
            analysis: None,
            operations: Vec::new(),
            stats: None,
            logs: Vec::new(),
        }
    }

    fn push_log(&mut self, msg: String) {
        self.logs.push(msg);
        if self.logs.len() > MAX_LOGS {
            self.logs.remove(0);
        }
    }

    pub fn on_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::MarketUpdate(quotes) => {
                self.quotes = quotes;
            }
            UiEvent::PriceUpdate(tick) => {
                self.live_prices.insert(tick.symbol, tick.price);
            }
            UiEvent::Analysis(analysis) => {
                self.analysis = Some(*analysis);
            }
            UiEvent::Operations { operations, stats } => {
                self.operations = operations;
                self.stats = Some(stats);
            }
            UiEvent::Alert(msg) => self.push_log(format!("ALERT {}", msg)),
            UiEvent::Log(msg) => self.push_log(msg),
        }
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

fn command_for(code: KeyCode) -> Option<UiCommand> {
    match code {
        KeyCode::Char('p') => Some(UiCommand::Plan),
        KeyCode::Char('c') => Some(UiCommand::Commit),
        KeyCode::Char('s') => Some(UiCommand::StartNext),
        KeyCode::Char('x') => Some(UiCommand::CloseNext),
        KeyCode::Char('d') => Some(UiCommand::DeleteNext),
        _ => None,
    }
}

pub async fn run(
    mut rx: mpsc::Receiver<UiEvent>,
    commands: mpsc::Sender<UiCommand>,
) -> anyhow::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new();

    loop {
        terminal.draw(|f| ui(f, &app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if let KeyCode::Char('q') = key.code {
                    break;
                }
                if let Some(command) = command_for(key.code) {
                    if commands.try_send(command).is_err() {
                        app.push_log("Engine busy, command dropped".to_string());
                    }
                }
            }
        }

        while let Ok(event) = rx.try_recv() {
            app.on_event(event);
        }
    }

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    Ok(())
}

fn status_color(status: OperationStatus) -> Color {
    match status {
        OperationStatus::Planned => Color::Blue,
        OperationStatus::Active => Color::Yellow,
        OperationStatus::Completed => Color::Green,
        OperationStatus::Stopped => Color::Red,
    }
}

fn ui(f: &mut ratatui::Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(12),
            Constraint::Length(8),
            Constraint::Length(8),
        ])
        .split(f.size());

    let header_text = match &app.stats {
        Some(s) => format!(
            "Capital ${:.2} | Profit ${:.2} (today ${:.2}) | Ops {} (today {}) | Win {:.1}% | Avg {:.1}min | L/S {}/{}",
            s.total_capital,
            s.total_profit,
            s.today_profit,
            s.total_operations,
            s.today_operations,
            s.success_rate,
            s.average_duration_minutes,
            s.long_operations,
            s.short_operations
        ),
        None => "Loading...".to_string(),
    };
    let header = Paragraph::new(Line::from(vec![
        Span::styled("Scalp Planner", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" | "),
        Span::styled(header_text, Style::default().fg(Color::Yellow)),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title("p plan | c commit | s start | x close | d delete | q quit"),
    );
    f.render_widget(header, chunks[0]);

    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(chunks[1]);

    let rows: Vec<Row> = app
        .quotes
        .iter()
        .map(|q| {
            let change_color = if q.price_change_percent >= Decimal::ZERO {
                Color::Green
            } else {
                Color::Red
            };
            let price = app.live_prices.get(&q.symbol).copied().unwrap_or(q.price);
            Row::new(vec![
                Span::raw(q.symbol.clone()),
                Span::raw(format_price(price)),
                Span::styled(
                    format!("{:.2}%", q.price_change_percent),
                    Style::default().fg(change_color),
                ),
                Span::raw(format!("{:.0}M", q.volume / Decimal::from(1_000_000))),
                Span::raw(q.source.clone()),
            ])
        })
        .collect();
    let market = Table::new(
        rows,
        [
            Constraint::Length(10),
            Constraint::Length(12),
            Constraint::Length(8),
            Constraint::Length(8),
            Constraint::Min(8),
        ],
    )
    .header(
        Row::new(vec!["Symbol", "Price", "24h", "Volume", "Source"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(Block::default().borders(Borders::ALL).title("Market"));
    f.render_widget(market, middle[0]);

    let analysis_lines: Vec<Line> = match &app.analysis {
        Some(a) => {
            let mut lines = Vec::new();
            if let Some(plan) = &a.plan {
                lines.push(Line::from(Span::styled(
                    format!(
                        "{} {} {}x | entry {} exit {} stop {}",
                        plan.symbol,
                        plan.direction,
                        plan.leverage,
                        format_price(plan.entry_price),
                        format_price(plan.exit_price),
                        format_price(plan.stop_loss)
                    ),
                    Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
                )));
                lines.push(Line::from(format!(
                    "gross ${:.2} fees ${:.2} funding ${:.2} net ${:.2} | {} | success {}% | R/R {:.2}",
                    plan.expected_profit,
                    plan.fees,
                    plan.funding_cost,
                    plan.net_profit,
                    plan.duration,
                    plan.success_rate,
                    plan.risk_reward
                )));
                lines.push(Line::from(""));
            }
            lines.extend(a.narrative.lines().map(|l| Line::from(l.to_string())));
            lines
        }
        None => vec![Line::from("Press p to analyse")],
    };
    let analysis = Paragraph::new(analysis_lines)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Analysis"));
    f.render_widget(analysis, middle[1]);

    let operations: Vec<ListItem> = app
        .operations
        .iter()
        .rev()
        .map(|op| {
            let result = op
                .actual_profit()
                .map(|p| format!("${:.2}", p))
                .unwrap_or_else(|| format!("planned ${:.2}", op.planned_profit));
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<10}", op.status()),
                    Style::default().fg(status_color(op.status())),
                ),
                Span::raw(format!(
                    "{} {} {}x entry {} | {}",
                    op.symbol,
                    op.direction,
                    op.leverage,
                    format_price(op.entry_price),
                    result
                )),
            ]))
        })
        .collect();
    let operations_list =
        List::new(operations).block(Block::default().borders(Borders::ALL).title("Operations"));
    f.render_widget(operations_list, chunks[2]);

    let logs: Vec<ListItem> = app
        .logs
        .iter()
        .rev()
        .map(|s| ListItem::new(Line::from(Span::raw(s.as_str()))))
        .collect();

    let logs_list =
        List::new(logs).block(Block::default().borders(Borders::ALL).title("System Logs"));
    f.render_widget(logs_list, chunks[3]);
}
