use std::io::{self, Stdout};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use sqlab_adapters::browser::{open_in_browser, BrowserError};
use sqlab_adapters::http::{HttpClientError, HttpSqlService};
use sqlab_core::bootstrap::{bootstrap, ConnectionIndicator, SampleQuerySurface};
use sqlab_core::error_presenter::{RenderedError, REMEDIATION_HINT};
use sqlab_core::markup::sanitize_terminal;
use sqlab_core::query_controller::{QueryController, ResultsSurface};
use sqlab_core::sample_catalog::{SampleQueryCatalog, QUERY_PLACEHOLDER};
use sqlab_core::settings::Settings;
use sqlab_core::table_renderer::{RenderedResult, RenderedTable, LOADING_TEXT, NO_RESULTS_TEXT};
use thiserror::Error;
use tokio::runtime::{Handle, Runtime};
use tracing::warn;

const TICK_RATE: Duration = Duration::from_millis(120);

#[derive(Debug, Error)]
pub enum TuiError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Client(#[from] HttpClientError),
}

/// What the results pane currently shows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
enum ResultsView {
    #[default]
    Empty,
    Loading,
    Result(RenderedResult),
    Error(RenderedError),
}

#[derive(Debug, Default)]
struct Screen {
    results: ResultsView,
    connected: Option<bool>,
    catalog: SampleQueryCatalog,
    table_names: Vec<String>,
    pending_query_text: Option<String>,
}

/// Presentation sinks shared between the event loop and the async handlers.
#[derive(Debug, Clone, Default)]
pub struct SharedScreen {
    inner: Arc<Mutex<Screen>>,
}

impl SharedScreen {
    fn lock(&self) -> MutexGuard<'_, Screen> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ResultsSurface for SharedScreen {
    fn show_loading(&self) {
        self.lock().results = ResultsView::Loading;
    }

    fn show_result(&self, rendered: &RenderedResult) {
        self.lock().results = ResultsView::Result(rendered.clone());
    }

    fn show_error(&self, rendered: &RenderedError) {
        self.lock().results = ResultsView::Error(rendered.clone());
    }
}

impl ConnectionIndicator for SharedScreen {
    fn set_status(&self, connected: bool) {
        self.lock().connected = Some(connected);
    }
}

impl SampleQuerySurface for SharedScreen {
    fn show_samples(&self, catalog: &SampleQueryCatalog, table_names: &[String]) {
        let mut screen = self.lock();
        if !catalog.is_empty() {
            screen.pending_query_text = Some(catalog.initial_query_text().to_string());
        }
        screen.catalog = catalog.clone();
        screen.table_names = table_names.to_vec();
    }
}

/// Hands query text to whatever runs the controller.
pub trait QuerySubmitter {
    fn submit(&self, sql: String);
    fn clear(&self);
}

struct SpawningSubmitter {
    handle: Handle,
    controller: Arc<QueryController<HttpSqlService, SharedScreen>>,
}

impl QuerySubmitter for SpawningSubmitter {
    fn submit(&self, sql: String) {
        let ticket = self.controller.begin(&sql);
        let controller = Arc::clone(&self.controller);
        self.handle.spawn(async move {
            controller.resolve(ticket, &sql).await;
        });
    }

    fn clear(&self) {
        self.controller.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pane {
    Samples,
    Editor,
    Results,
}

impl Pane {
    fn next(self) -> Self {
        match self {
            Self::Samples => Self::Editor,
            Self::Editor => Self::Results,
            Self::Results => Self::Samples,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Samples => "Sample Queries",
            Self::Editor => "Query Editor",
            Self::Results => "Results",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DirectionKey {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Msg {
    Quit,
    ToggleHelp,
    NextPane,
    Execute,
    Select,
    ClearResults,
    OpenConsole,
    Input(char),
    Backspace,
    Navigate(DirectionKey),
    Tick,
}

type ConsoleOpener = fn(&str) -> Result<(), BrowserError>;

struct TuiApp {
    screen: SharedScreen,
    submitter: Box<dyn QuerySubmitter>,
    open_console: ConsoleOpener,
    console_url: String,
    pane: Pane,
    query_text: String,
    selected_sample: usize,
    results_scroll: u16,
    show_help: bool,
    should_quit: bool,
    status_line: String,
}

impl TuiApp {
    fn new(
        screen: SharedScreen,
        submitter: Box<dyn QuerySubmitter>,
        open_console: ConsoleOpener,
        console_url: String,
    ) -> Self {
        Self {
            screen,
            submitter,
            open_console,
            console_url,
            pane: Pane::Editor,
            query_text: String::new(),
            selected_sample: 0,
            results_scroll: 0,
            show_help: false,
            should_quit: false,
            status_line: "Checking service health...".to_string(),
        }
    }

    fn handle(&mut self, msg: Msg) {
        match msg {
            Msg::Quit => self.should_quit = true,
            Msg::ToggleHelp => self.show_help = !self.show_help,
            Msg::NextPane => {
                self.pane = self.pane.next();
                self.status_line = format!("Switched pane to {}", self.pane.name());
            }
            Msg::Execute => self.execute(),
            Msg::Select => match self.pane {
                Pane::Samples => self.load_selected_sample(),
                Pane::Editor => self.execute(),
                Pane::Results => self.status_line = "Nothing to select in results".to_string(),
            },
            Msg::ClearResults => {
                self.submitter.clear();
                self.screen.lock().results = ResultsView::Empty;
                self.results_scroll = 0;
                self.status_line = "Results cleared".to_string();
            }
            Msg::OpenConsole => match (self.open_console)(&self.console_url) {
                Ok(()) => self.status_line = format!("Opened {}", self.console_url),
                Err(error) => {
                    warn!(%error, "failed to open database console");
                    self.status_line = format!("Console launch failed: {error}");
                }
            },
            Msg::Input(ch) => {
                if self.pane == Pane::Editor {
                    self.query_text.push(ch);
                }
            }
            Msg::Backspace => {
                if self.pane == Pane::Editor {
                    self.query_text.pop();
                }
            }
            Msg::Navigate(direction) => self.navigate(direction),
            Msg::Tick => self.on_tick(),
        }
    }

    fn on_tick(&mut self) {
        let pending = self.screen.lock().pending_query_text.take();
        if let Some(text) = pending {
            self.query_text = text;
            self.status_line = "Sample queries loaded".to_string();
        }
    }

    fn execute(&mut self) {
        let sql = self.query_text.trim().to_string();
        self.results_scroll = 0;
        self.submitter.submit(sql);
        self.status_line = "Running query...".to_string();
    }

    fn load_selected_sample(&mut self) {
        let screen = self.screen.lock();
        let Some(sample) = screen.catalog.get(self.selected_sample) else {
            drop(screen);
            self.status_line = "No sample queries available".to_string();
            return;
        };
        let (title, query) = (sample.title.clone(), sample.query.clone());
        drop(screen);

        self.query_text = query;
        self.pane = Pane::Editor;
        self.status_line = format!("Loaded sample `{}`", sanitize_terminal(&title));
    }

    fn navigate(&mut self, direction: DirectionKey) {
        match self.pane {
            Pane::Samples => {
                let count = self.screen.lock().catalog.len();
                if count == 0 {
                    self.status_line = "No sample queries available".to_string();
                    return;
                }
                self.selected_sample = match direction {
                    DirectionKey::Up => self.selected_sample.saturating_sub(1),
                    DirectionKey::Down => (self.selected_sample + 1).min(count - 1),
                };
            }
            Pane::Results => {
                self.results_scroll = match direction {
                    DirectionKey::Up => self.results_scroll.saturating_sub(1),
                    DirectionKey::Down => self.results_scroll.saturating_add(1),
                };
            }
            Pane::Editor => {}
        }
    }
}

#[must_use]
pub fn ui_name() -> &'static str {
    "sqlab-tui"
}

pub fn run(settings: &Settings) -> Result<(), TuiError> {
    let runtime = Runtime::new()?;
    let service = HttpSqlService::from_settings(settings)?;
    let screen = SharedScreen::default();

    let health_service = service.clone();
    let health_screen = screen.clone();
    runtime.spawn(async move {
        bootstrap(&health_service, &health_screen, &health_screen).await;
    });

    let controller = Arc::new(QueryController::new(service, screen.clone()));
    let submitter = SpawningSubmitter {
        handle: runtime.handle().clone(),
        controller,
    };
    let mut app = TuiApp::new(
        screen,
        Box::new(submitter),
        open_in_browser,
        settings.console_url.clone(),
    );

    let mut terminal = setup_terminal()?;
    let run_result = run_loop(&mut terminal, &mut app);
    let restore_result = restore_terminal(&mut terminal);
    runtime.shutdown_background();

    if let Err(error) = run_result {
        restore_result?;
        return Err(error);
    }

    restore_result?;
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>, TuiError> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<(), TuiError> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut TuiApp,
) -> Result<(), TuiError> {
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|frame| render(frame, app))?;

        let timeout = TICK_RATE
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Some(message) = map_key_event(key, app.pane) {
                        app.handle(message);
                    }
                }
            }
        }

        if last_tick.elapsed() >= TICK_RATE {
            app.handle(Msg::Tick);
            last_tick = Instant::now();
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

fn render(frame: &mut Frame<'_>, app: &TuiApp) {
    let screen = app.screen.lock();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(4),
        ])
        .split(frame.area());

    let (indicator, indicator_color) = match screen.connected {
        Some(true) => ("● connected", Color::Green),
        Some(false) => ("● disconnected", Color::Red),
        None => ("○ checking", Color::Yellow),
    };
    let badge = match &screen.results {
        ResultsView::Result(rendered) => rendered.badge.to_string(),
        ResultsView::Error(rendered) => rendered.badge.to_string(),
        ResultsView::Empty | ResultsView::Loading => "-".to_string(),
    };
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            format!(" Pane: {} ", app.pane.name()),
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | "),
        Span::styled(indicator, Style::default().fg(indicator_color)),
        Span::raw(" | "),
        Span::raw(format!("Time: {badge}")),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title("SQL Learning Console"),
    );
    frame.render_widget(header, chunks[0]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(32), Constraint::Percentage(68)])
        .split(chunks[1]);
    render_samples(frame, app, &screen, columns[0]);

    let workspace = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5),
            Constraint::Min(4),
            Constraint::Length(5),
        ])
        .split(columns[1]);

    let editor_text = if app.query_text.is_empty() {
        Line::styled(QUERY_PLACEHOLDER, Style::default().fg(Color::DarkGray))
    } else {
        Line::from(sanitize_terminal(&app.query_text))
    };
    let editor = Paragraph::new(editor_text)
        .wrap(Wrap { trim: false })
        .block(pane_block(app, Pane::Editor));
    frame.render_widget(editor, workspace[0]);

    let results = Paragraph::new(results_lines(&screen.results))
        .scroll((app.results_scroll, 0))
        .block(pane_block(app, Pane::Results));
    frame.render_widget(results, workspace[1]);

    let stats = Paragraph::new(stats_lines(&screen.results)).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Data Statistics"),
    );
    frame.render_widget(stats, workspace[2]);

    let footer = Paragraph::new(vec![
        Line::from("Tab: pane | Enter: run/select | Ctrl+L: clear | Ctrl+O: DB console | F1: help"),
        Line::from(format!("Status: {}", app.status_line)),
    ])
    .block(Block::default().borders(Borders::ALL).title("Keys"));
    frame.render_widget(footer, chunks[2]);

    if app.show_help {
        render_help_popup(frame);
    }
}

fn pane_block(app: &TuiApp, pane: Pane) -> Block<'static> {
    let style = if app.pane == pane {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    Block::default()
        .borders(Borders::ALL)
        .border_style(style)
        .title(pane.name())
}

fn render_samples(frame: &mut Frame<'_>, app: &TuiApp, screen: &Screen, area: Rect) {
    let mut lines = Vec::new();
    let mut flat_index = 0;
    for group in screen.catalog.groups() {
        lines.push(Line::styled(
            sanitize_terminal(&group.category),
            Style::default().add_modifier(Modifier::BOLD),
        ));
        for item in &group.items {
            let marker = if flat_index == app.selected_sample && app.pane == Pane::Samples {
                ">"
            } else {
                " "
            };
            lines.push(Line::from(format!(
                "{marker} {}",
                sanitize_terminal(&item.title)
            )));
            flat_index += 1;
        }
    }
    if !screen.table_names.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::styled(
            "Tables",
            Style::default().add_modifier(Modifier::BOLD),
        ));
        for table in &screen.table_names {
            lines.push(Line::from(format!("  {}", sanitize_terminal(table))));
        }
    }

    let samples = Paragraph::new(lines).block(pane_block(app, Pane::Samples));
    frame.render_widget(samples, area);
}

fn results_lines(view: &ResultsView) -> Vec<Line<'static>> {
    match view {
        ResultsView::Empty => vec![Line::from("Press Enter in the editor to run a query.")],
        ResultsView::Loading => vec![Line::from(LOADING_TEXT)],
        ResultsView::Result(rendered) => match &rendered.table {
            RenderedTable::NoResults => vec![Line::from(NO_RESULTS_TEXT)],
            RenderedTable::Table(view) => {
                let mut lines = vec![Line::styled(
                    join_cells(&view.header),
                    Style::default().add_modifier(Modifier::BOLD),
                )];
                lines.extend(view.body.iter().map(|row| Line::from(join_cells(row))));
                lines
            }
        },
        ResultsView::Error(rendered) => vec![Line::styled(
            sanitize_terminal(&rendered.headline()),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )],
    }
}

fn stats_lines(view: &ResultsView) -> Vec<Line<'static>> {
    match view {
        ResultsView::Result(rendered) => vec![Line::from(format!(
            "Records returned: {}",
            rendered.records_returned
        ))],
        ResultsView::Error(_) => vec![
            Line::from("Query Error"),
            Line::from("Status: Failed"),
            Line::from(format!("Tip: {REMEDIATION_HINT}")),
        ],
        ResultsView::Empty | ResultsView::Loading => Vec::new(),
    }
}

fn join_cells(cells: &[String]) -> String {
    cells
        .iter()
        .map(|cell| sanitize_terminal(cell))
        .collect::<Vec<_>>()
        .join(" | ")
}

fn render_help_popup(frame: &mut Frame<'_>) {
    let area = centered_rect(70, 60, frame.area());
    frame.render_widget(Clear, area);
    let help = Paragraph::new(vec![
        Line::from("Global keymap"),
        Line::from("Ctrl+C / Ctrl+Q: quit (q outside the editor)"),
        Line::from("F1: toggle help"),
        Line::from("Tab: cycle panes"),
        Line::from("Enter: run query (editor) or load sample (samples)"),
        Line::from("F5 / Ctrl+E: run query from any pane"),
        Line::from("Ctrl+L: clear results"),
        Line::from("Ctrl+O: open the database console"),
        Line::from("Arrows or j/k: navigation"),
    ])
    .block(Block::default().borders(Borders::ALL).title("Help"));
    frame.render_widget(help, area);
}

fn centered_rect(width_percent: u16, height_percent: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100_u16 - height_percent) / 2),
            Constraint::Percentage(height_percent),
            Constraint::Percentage((100_u16 - height_percent) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100_u16 - width_percent) / 2),
            Constraint::Percentage(width_percent),
            Constraint::Percentage((100_u16 - width_percent) / 2),
        ])
        .split(vertical[1])[1]
}

fn map_key_event(key: KeyEvent, pane: Pane) -> Option<Msg> {
    match (key.modifiers, key.code) {
        (KeyModifiers::CONTROL, KeyCode::Char('c' | 'q')) => Some(Msg::Quit),
        (KeyModifiers::CONTROL, KeyCode::Char('e')) | (_, KeyCode::F(5)) => Some(Msg::Execute),
        (KeyModifiers::CONTROL, KeyCode::Char('l')) => Some(Msg::ClearResults),
        (KeyModifiers::CONTROL, KeyCode::Char('o')) => Some(Msg::OpenConsole),
        (_, KeyCode::F(1)) => Some(Msg::ToggleHelp),
        (_, KeyCode::Tab) => Some(Msg::NextPane),
        (_, KeyCode::Enter) => Some(Msg::Select),
        (_, KeyCode::Up) => Some(Msg::Navigate(DirectionKey::Up)),
        (_, KeyCode::Down) => Some(Msg::Navigate(DirectionKey::Down)),
        (_, KeyCode::Backspace) if pane == Pane::Editor => Some(Msg::Backspace),
        (KeyModifiers::NONE | KeyModifiers::SHIFT, KeyCode::Char(ch)) if pane == Pane::Editor => {
            Some(Msg::Input(ch))
        }
        (_, KeyCode::Char('q')) => Some(Msg::Quit),
        (_, KeyCode::Char('?')) => Some(Msg::ToggleHelp),
        (_, KeyCode::Char('k')) => Some(Msg::Navigate(DirectionKey::Up)),
        (_, KeyCode::Char('j')) => Some(Msg::Navigate(DirectionKey::Down)),
        _ => None,
    }
}
