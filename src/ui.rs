use std::io::{self, Stdout};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use crossbeam_channel::{unbounded, Receiver, Sender};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Clear, Padding, Paragraph, Wrap};
use ratatui::{Frame, Terminal};
use textwrap::wrap;
use tracing::{info, warn};
use unicode_width::UnicodeWidthStr;

use crate::data::{FeedService, PostService};
use crate::format::{self, TokenKind};
use crate::session;
use crate::timeline::{Command, Item, RenderState, Timeline, TimelineOptions};

const COLOR_BG: Color = Color::Rgb(30, 30, 46);
const COLOR_PANEL_BG: Color = Color::Rgb(24, 24, 36);
const COLOR_PANEL_SELECTED_BG: Color = Color::Rgb(49, 50, 68);
const COLOR_BORDER_IDLE: Color = Color::Rgb(88, 91, 112);
const COLOR_BORDER_SELECTED: Color = Color::Rgb(137, 180, 250);
const COLOR_TEXT_PRIMARY: Color = Color::Rgb(205, 214, 244);
const COLOR_TEXT_SECONDARY: Color = Color::Rgb(166, 173, 200);
const COLOR_ACCENT: Color = Color::Rgb(137, 180, 250);
const COLOR_HANDLE: Color = Color::Rgb(166, 227, 161);
const COLOR_SUCCESS: Color = Color::Rgb(166, 227, 161);
const COLOR_WARNING: Color = Color::Rgb(249, 226, 175);
const COLOR_ERROR: Color = Color::Rgb(243, 139, 168);
const COLOR_MENTION: Color = Color::Rgb(137, 220, 235);
const COLOR_LINK: Color = Color::Rgb(116, 199, 236);
const COLOR_HASHTAG: Color = Color::Rgb(203, 166, 247);

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const HEADER_HEIGHT: u16 = 3;
const STATUS_HEIGHT: u16 = 2;
const FOOTER_HEIGHT: u16 = 3;
pub const MAX_POST_CHARS: usize = 300;
const TIMELINE_TITLE: &str = "Bluesky Terminal - Timeline";
const FOOTER_HELP: &str =
    "↑/k ↓/j move · PgUp/PgDn page · g/G top/bottom · l like · r refresh · c compose · L logout · q quit";

pub struct Options {
    pub feed_service: Arc<dyn FeedService>,
    pub post_service: Arc<dyn PostService>,
    /// `None` runs without accounts (demo mode); the timeline opens directly.
    pub sessions: Option<Arc<session::Manager>>,
    pub timeline_options: TimelineOptions,
    /// Handle of an already active session.
    pub handle: Option<String>,
    /// Pre-filled handle for the login screen.
    pub login_handle: String,
    pub status_message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Screen {
    Login,
    Timeline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginStep {
    Handle,
    Password,
}

struct LoginForm {
    step: LoginStep,
    handle: String,
    password: String,
    error: Option<String>,
    in_progress: bool,
}

impl LoginForm {
    fn new(handle: String) -> Self {
        Self {
            step: LoginStep::Handle,
            handle,
            password: String::new(),
            error: None,
            in_progress: false,
        }
    }

    fn active_value_mut(&mut self) -> &mut String {
        match self.step {
            LoginStep::Handle => &mut self.handle,
            LoginStep::Password => &mut self.password,
        }
    }
}

#[derive(Default)]
struct ComposeForm {
    text: String,
    posting: bool,
    error: Option<String>,
}

impl ComposeForm {
    fn remaining(&self) -> i64 {
        MAX_POST_CHARS as i64 - self.text.chars().count() as i64
    }

    fn can_submit(&self) -> bool {
        !self.posting && !self.text.trim().is_empty() && self.remaining() >= 0
    }
}

enum AsyncResponse {
    Login { result: Result<String> },
    Post { result: Result<()> },
}

struct Spinner {
    index: usize,
    last_tick: Instant,
}

impl Spinner {
    fn new() -> Self {
        Self {
            index: 0,
            last_tick: Instant::now(),
        }
    }

    fn frame(&self) -> &'static str {
        SPINNER_FRAMES[self.index % SPINNER_FRAMES.len()]
    }

    fn advance(&mut self) -> bool {
        let now = Instant::now();
        if now.duration_since(self.last_tick) >= Duration::from_millis(120) {
            self.index = (self.index + 1) % SPINNER_FRAMES.len();
            self.last_tick = now;
            true
        } else {
            false
        }
    }

    fn reset(&mut self) {
        self.index = 0;
        self.last_tick = Instant::now();
    }
}

pub struct Model {
    screen: Screen,
    login: LoginForm,
    compose: Option<ComposeForm>,
    timeline: Option<Timeline>,
    view: RenderState,
    feed_service: Arc<dyn FeedService>,
    post_service: Arc<dyn PostService>,
    sessions: Option<Arc<session::Manager>>,
    timeline_options: TimelineOptions,
    handle: Option<String>,
    status_message: String,
    terminal_height: u16,
    needs_redraw: bool,
    spinner: Spinner,
    response_tx: Sender<AsyncResponse>,
    response_rx: Receiver<AsyncResponse>,
}

impl Model {
    pub fn new(opts: Options) -> Self {
        let (response_tx, response_rx) = unbounded();
        let screen = if opts.sessions.is_none() || opts.handle.is_some() {
            Screen::Timeline
        } else {
            Screen::Login
        };
        Self {
            screen,
            login: LoginForm::new(opts.login_handle),
            compose: None,
            timeline: None,
            view: RenderState::default(),
            feed_service: opts.feed_service,
            post_service: opts.post_service,
            sessions: opts.sessions,
            timeline_options: opts.timeline_options,
            handle: opts.handle,
            status_message: opts.status_message,
            terminal_height: crate::timeline::viewport::DEFAULT_TERMINAL_HEIGHT,
            needs_redraw: true,
            spinner: Spinner::new(),
            response_tx,
            response_rx,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode()?;
        stdout.execute(EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal);

        disable_raw_mode()?;
        terminal.backend_mut().execute(LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        self.terminal_height = terminal.size()?.height;
        if self.screen == Screen::Timeline {
            self.start_timeline();
        }

        let mut last_tick = Instant::now();
        let tick_rate = Duration::from_millis(120);

        loop {
            if self.poll_async() {
                self.mark_dirty();
            }

            if self.needs_redraw {
                terminal.draw(|frame| self.draw(frame))?;
                self.needs_redraw = false;
            }

            let timeout = tick_rate
                .checked_sub(last_tick.elapsed())
                .unwrap_or_else(|| Duration::from_millis(16));

            if event::poll(timeout)? {
                match event::read()? {
                    Event::Key(key) if key.kind == KeyEventKind::Press => {
                        match self.handle_key(key) {
                            Ok(true) => break,
                            Ok(false) => {}
                            Err(err) => {
                                self.status_message = format!("Error: {}", err);
                            }
                        }
                        self.mark_dirty();
                    }
                    Event::Resize(_, height) => {
                        self.resize(height);
                    }
                    _ => {}
                }
            }

            if last_tick.elapsed() >= tick_rate {
                last_tick = Instant::now();
                if self.is_loading() {
                    if self.spinner.advance() {
                        self.mark_dirty();
                    }
                } else {
                    self.spinner.reset();
                }
            }
        }

        Ok(())
    }

    fn mark_dirty(&mut self) {
        self.needs_redraw = true;
    }

    fn is_loading(&self) -> bool {
        self.login.in_progress
            || self.compose.as_ref().is_some_and(|form| form.posting)
            || (self.screen == Screen::Timeline && self.view.loading)
    }

    fn start_timeline(&mut self) {
        let mut timeline = Timeline::new(
            Arc::clone(&self.feed_service),
            self.timeline_options,
            self.terminal_height,
        );
        self.view = timeline.load_timeline(false);
        self.timeline = Some(timeline);
        self.screen = Screen::Timeline;
        self.mark_dirty();
    }

    fn dispatch(&mut self, command: Command) {
        if let Some(timeline) = self.timeline.as_mut() {
            self.view = timeline.dispatch(command);
            self.mark_dirty();
        }
    }

    fn resize(&mut self, height: u16) {
        self.terminal_height = height;
        self.dispatch(Command::Resize(height));
        self.mark_dirty();
    }

    fn poll_async(&mut self) -> bool {
        let mut changed = false;
        if let Some(timeline) = self.timeline.as_mut() {
            if let Some(view) = timeline.poll() {
                self.view = view;
                changed = true;
            }
        }
        while let Ok(message) = self.response_rx.try_recv() {
            self.handle_async_response(message);
            changed = true;
        }
        changed
    }

    fn handle_async_response(&mut self, message: AsyncResponse) {
        match message {
            AsyncResponse::Login { result } => {
                self.login.in_progress = false;
                match result {
                    Ok(handle) => {
                        self.login.password.clear();
                        self.login.error = None;
                        self.status_message = format!("Logged in as @{handle}");
                        self.handle = Some(handle);
                        self.start_timeline();
                    }
                    Err(err) => {
                        self.login.error = Some(format!("{err:#}"));
                        self.login.password.clear();
                    }
                }
            }
            AsyncResponse::Post { result } => match result {
                Ok(()) => {
                    info!("post published");
                    self.compose = None;
                    self.status_message = "Post published".to_string();
                    self.dispatch(Command::Refresh);
                }
                Err(err) => {
                    warn!(error = %format!("{err:#}"), "post failed");
                    if let Some(form) = self.compose.as_mut() {
                        form.posting = false;
                        form.error = Some(format!("{err:#}"));
                    }
                }
            },
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl && key.code == KeyCode::Char('c') {
            return Ok(true);
        }
        match self.screen {
            Screen::Login => Ok(self.handle_login_key(key)),
            Screen::Timeline if self.compose.is_some() => {
                self.handle_compose_key(key);
                Ok(false)
            }
            Screen::Timeline => self.handle_timeline_key(key),
        }
    }

    fn handle_login_key(&mut self, key: KeyEvent) -> bool {
        if key.code == KeyCode::Esc {
            return true;
        }
        if self.login.in_progress {
            return false;
        }
        match key.code {
            KeyCode::Enter => match self.login.step {
                LoginStep::Handle => {
                    if !self.login.handle.trim().is_empty() {
                        self.login.step = LoginStep::Password;
                        self.login.error = None;
                    }
                }
                LoginStep::Password => {
                    if !self.login.password.trim().is_empty() {
                        self.submit_login();
                    }
                }
            },
            KeyCode::Backspace => {
                if self.login.step == LoginStep::Password && self.login.password.is_empty() {
                    self.login.step = LoginStep::Handle;
                } else {
                    self.login.active_value_mut().pop();
                }
            }
            KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.login.active_value_mut().push(ch);
            }
            _ => {}
        }
        false
    }

    fn submit_login(&mut self) {
        let Some(sessions) = self.sessions.clone() else {
            return;
        };
        self.login.in_progress = true;
        self.login.error = None;
        let handle = self.login.handle.clone();
        let password = self.login.password.clone();
        let tx = self.response_tx.clone();
        thread::spawn(move || {
            let result = sessions
                .login(&handle, &password)
                .map(|session| session.handle);
            let _ = tx.send(AsyncResponse::Login { result });
        });
    }

    fn handle_compose_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        match key.code {
            KeyCode::Esc => {
                self.compose = None;
            }
            KeyCode::Enter => self.submit_post(),
            KeyCode::Char('d') if ctrl => self.submit_post(),
            KeyCode::Backspace => {
                if let Some(form) = self.compose.as_mut().filter(|form| !form.posting) {
                    form.text.pop();
                }
            }
            KeyCode::Char(ch) if !ctrl => {
                if let Some(form) = self.compose.as_mut().filter(|form| !form.posting) {
                    form.text.push(ch);
                    form.error = None;
                }
            }
            _ => {}
        }
    }

    fn submit_post(&mut self) {
        let Some(form) = self.compose.as_mut() else {
            return;
        };
        if !form.can_submit() {
            return;
        }
        form.posting = true;
        form.error = None;
        let text = form.text.clone();
        let service = Arc::clone(&self.post_service);
        let tx = self.response_tx.clone();
        thread::spawn(move || {
            let result = service.create_post(&text);
            let _ = tx.send(AsyncResponse::Post { result });
        });
    }

    fn handle_timeline_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Char('c') => {
                self.compose = Some(ComposeForm::default());
            }
            KeyCode::Char('L') => self.logout()?,
            _ => {
                if let Some(command) = timeline_command(&key) {
                    self.dispatch(command);
                }
            }
        }
        Ok(false)
    }

    fn logout(&mut self) -> Result<()> {
        let Some(sessions) = self.sessions.as_ref() else {
            self.status_message = "Demo mode has no account to log out of".to_string();
            return Ok(());
        };
        sessions.logout()?;
        info!("logged out");
        self.timeline = None;
        self.view = RenderState::default();
        self.compose = None;
        self.login = LoginForm::new(self.handle.take().unwrap_or_default());
        self.screen = Screen::Login;
        self.status_message = "Logged out".to_string();
        Ok(())
    }

    fn draw(&self, frame: &mut Frame<'_>) {
        let full = frame.size();
        frame.render_widget(Block::default().style(Style::default().bg(COLOR_BG)), full);
        match self.screen {
            Screen::Login => self.draw_login(frame, full),
            Screen::Timeline => {
                self.draw_timeline(frame, full);
                if let Some(form) = self.compose.as_ref() {
                    self.draw_compose(frame, full, form);
                }
            }
        }
    }

    fn draw_login(&self, frame: &mut Frame<'_>, area: Rect) {
        let popup = centered_rect(60, 60, area);
        let form = &self.login;
        let secondary = Style::default().fg(COLOR_TEXT_SECONDARY);
        let mut lines = vec![
            Line::from(Span::styled(
                "🦋 Welcome to Bluesky Terminal",
                Style::default()
                    .fg(COLOR_ACCENT)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::default(),
        ];

        if form.in_progress {
            lines.push(Line::from(vec![
                Span::styled(self.spinner.frame(), Style::default().fg(COLOR_SUCCESS)),
                Span::raw(" Logging in..."),
            ]));
        } else {
            let handle_value = match (form.step, form.handle.is_empty()) {
                (LoginStep::Handle, true) => {
                    Span::styled("alice.bsky.social", secondary.add_modifier(Modifier::ITALIC))
                }
                (LoginStep::Handle, false) => Span::styled(
                    format!("{}▏", form.handle),
                    Style::default().fg(COLOR_TEXT_PRIMARY),
                ),
                (LoginStep::Password, _) => {
                    Span::styled(form.handle.clone(), Style::default().fg(COLOR_HANDLE))
                }
            };
            lines.push(Line::from(vec![Span::raw("Handle:   "), handle_value]));

            if form.step == LoginStep::Password {
                let masked = if form.password.is_empty() {
                    Span::styled(
                        "Enter your app password",
                        secondary.add_modifier(Modifier::ITALIC),
                    )
                } else {
                    Span::styled(
                        format!("{}▏", "*".repeat(form.password.chars().count())),
                        Style::default().fg(COLOR_TEXT_PRIMARY),
                    )
                };
                lines.push(Line::from(vec![Span::raw("Password: "), masked]));
            }

            if let Some(error) = form.error.as_ref() {
                lines.push(Line::default());
                lines.push(Line::from(Span::styled(
                    format!("Error: {error}"),
                    Style::default().fg(COLOR_ERROR),
                )));
            }

            lines.push(Line::default());
            let hint = match form.step {
                LoginStep::Handle => "Enter your Bluesky handle and press Enter",
                LoginStep::Password => "Enter your app password and press Enter",
            };
            lines.push(Line::from(Span::styled(hint, secondary)));
        }

        lines.push(Line::default());
        lines.push(Line::from(Span::styled("Press Ctrl+C to exit", secondary)));
        if !self.status_message.is_empty() {
            lines.push(Line::from(Span::styled(
                self.status_message.clone(),
                secondary.add_modifier(Modifier::ITALIC),
            )));
        }

        let login = Paragraph::new(lines)
            .block(
                Block::default()
                    .title(Span::styled(
                        "Login",
                        Style::default()
                            .fg(COLOR_ACCENT)
                            .add_modifier(Modifier::BOLD),
                    ))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(COLOR_ACCENT))
                    .padding(Padding::uniform(1))
                    .style(Style::default().bg(COLOR_PANEL_BG)),
            )
            .wrap(Wrap { trim: false });
        frame.render_widget(login, popup);
    }

    fn draw_timeline(&self, frame: &mut Frame<'_>, area: Rect) {
        let reserved = self.timeline_options.reserved_rows;
        let (header, status, footer) = chrome_heights(reserved);
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(header),
                Constraint::Length(area.height.saturating_sub(reserved)),
                Constraint::Length(status),
                Constraint::Length(footer),
            ])
            .split(area);

        self.draw_header(frame, layout[0]);
        self.draw_items(frame, layout[1]);
        self.draw_status(frame, layout[2]);

        let footer = Paragraph::new(FOOTER_HELP)
            .style(
                Style::default()
                    .fg(COLOR_TEXT_SECONDARY)
                    .bg(COLOR_PANEL_BG)
                    .add_modifier(Modifier::ITALIC),
            )
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(COLOR_BORDER_IDLE)),
            )
            .wrap(Wrap { trim: true });
        frame.render_widget(footer, layout[3]);
    }

    fn draw_header(&self, frame: &mut Frame<'_>, area: Rect) {
        let inner_width = area.width.saturating_sub(4) as usize;
        let left = match self.handle.as_deref() {
            Some(handle) => format!("@{handle}"),
            None if self.sessions.is_none() => "demo feed".to_string(),
            None => String::new(),
        };
        let right = self.view.scroll_indicator.clone().unwrap_or_default();
        let line = spread_line(
            vec![Span::styled(left, Style::default().fg(COLOR_HANDLE))],
            Span::styled(right, Style::default().fg(COLOR_TEXT_SECONDARY)),
            inner_width,
        );
        let header = Paragraph::new(line).block(
            Block::default()
                .title(Span::styled(
                    TIMELINE_TITLE,
                    Style::default()
                        .fg(COLOR_ACCENT)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(COLOR_ACCENT))
                .padding(Padding::horizontal(1))
                .style(Style::default().bg(COLOR_PANEL_BG)),
        );
        frame.render_widget(header, area);
    }

    fn draw_items(&self, frame: &mut Frame<'_>, area: Rect) {
        if self.view.is_empty() {
            let lines = self.empty_feed_lines();
            let message = Paragraph::new(lines)
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true });
            let message_area = centered_rect(80, 30, area);
            frame.render_widget(message, message_area);
            return;
        }

        let item_height = self.timeline_options.item_height.max(1);
        let constraints: Vec<Constraint> = self
            .view
            .visible_items
            .iter()
            .map(|_| Constraint::Length(item_height))
            .chain(std::iter::once(Constraint::Min(0)))
            .collect();
        let slots = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(area);

        for (visible, slot) in self.view.visible_items.iter().zip(slots.iter()) {
            let inner_width = slot.width.saturating_sub(4);
            let text_rows = item_height.saturating_sub(4) as usize;
            let mut lines = card_lines(&visible.item, inner_width as usize, text_rows);
            let bg = if visible.selected {
                COLOR_PANEL_SELECTED_BG
            } else {
                COLOR_PANEL_BG
            };
            pad_lines_to_width(&mut lines, inner_width);
            let border = if visible.selected {
                COLOR_BORDER_SELECTED
            } else {
                COLOR_BORDER_IDLE
            };
            let card = Paragraph::new(lines).block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(border))
                    .padding(Padding::horizontal(1))
                    .style(Style::default().bg(bg)),
            );
            frame.render_widget(card, *slot);
        }
    }

    fn empty_feed_lines(&self) -> Vec<Line<'static>> {
        let secondary = Style::default().fg(COLOR_TEXT_SECONDARY);
        if self.view.loading {
            return vec![Line::from(vec![
                Span::styled(self.spinner.frame(), Style::default().fg(COLOR_SUCCESS)),
                Span::styled(" Loading timeline...", secondary),
            ])];
        }
        if let Some(error) = self.view.error.as_ref() {
            return vec![
                Line::from(Span::styled(
                    format!("Error: {error}"),
                    Style::default().fg(COLOR_ERROR),
                )),
                Line::default(),
                Line::from(Span::styled("Press 'r' to retry", secondary)),
            ];
        }
        vec![Line::from(Span::styled("No posts to display", secondary))]
    }

    fn draw_status(&self, frame: &mut Frame<'_>, area: Rect) {
        let mut lines = Vec::new();
        if !self.view.is_empty() {
            if let Some(error) = self.view.error.as_ref() {
                lines.push(Line::from(Span::styled(
                    format!("Error: {error}"),
                    Style::default().fg(COLOR_ERROR),
                )));
            }
            if self.view.loading {
                lines.push(Line::from(vec![
                    Span::styled(self.spinner.frame(), Style::default().fg(COLOR_SUCCESS)),
                    Span::styled(
                        " Loading more posts...",
                        Style::default().fg(COLOR_TEXT_SECONDARY),
                    ),
                ]));
            }
        }
        if lines.is_empty() && !self.status_message.is_empty() {
            lines.push(Line::from(Span::styled(
                self.status_message.clone(),
                Style::default().fg(COLOR_TEXT_SECONDARY),
            )));
        }
        let status = Paragraph::new(lines).alignment(Alignment::Center);
        frame.render_widget(status, area);
    }

    fn draw_compose(&self, frame: &mut Frame<'_>, area: Rect, form: &ComposeForm) {
        let popup = centered_rect(80, 50, area);
        frame.render_widget(Clear, popup);

        let remaining = form.remaining();
        let counter_color = if remaining < 0 {
            COLOR_ERROR
        } else if remaining < 50 {
            COLOR_WARNING
        } else {
            COLOR_SUCCESS
        };
        let inner_width = popup.width.saturating_sub(4) as usize;
        let secondary = Style::default().fg(COLOR_TEXT_SECONDARY);

        let mut lines = vec![
            spread_line(
                vec![Span::styled(
                    "📝 Compose Post",
                    Style::default()
                        .fg(COLOR_ACCENT)
                        .add_modifier(Modifier::BOLD),
                )],
                Span::styled(
                    format!("{remaining} characters"),
                    Style::default().fg(counter_color),
                ),
                inner_width,
            ),
            Line::default(),
        ];
        if form.text.is_empty() {
            lines.push(Line::from(Span::styled(
                "What's happening?",
                secondary.add_modifier(Modifier::ITALIC),
            )));
        } else {
            let cursor = if form.posting { "" } else { "▏" };
            lines.push(Line::from(Span::styled(
                format!("{}{cursor}", form.text),
                Style::default().fg(COLOR_TEXT_PRIMARY),
            )));
        }
        if let Some(error) = form.error.as_ref() {
            lines.push(Line::default());
            lines.push(Line::from(Span::styled(
                format!("Error: {error}"),
                Style::default().fg(COLOR_ERROR),
            )));
        }
        lines.push(Line::default());
        let hint = if form.posting {
            format!("{} Posting...", self.spinner.frame())
        } else {
            "[Ctrl+D] Post  [Enter] Send  [Esc] Cancel".to_string()
        };
        lines.push(Line::from(Span::styled(hint, secondary)));

        let compose = Paragraph::new(lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_type(BorderType::Double)
                    .border_style(Style::default().fg(COLOR_ACCENT))
                    .padding(Padding::horizontal(1))
                    .style(Style::default().bg(COLOR_PANEL_BG)),
            )
            .wrap(Wrap { trim: false });
        frame.render_widget(compose, popup);
    }
}

/// Keys that map directly onto timeline commands.
fn timeline_command(key: &KeyEvent) -> Option<Command> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return None;
    }
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => Some(Command::Up),
        KeyCode::Down | KeyCode::Char('j') => Some(Command::Down),
        KeyCode::PageUp => Some(Command::PageUp),
        KeyCode::PageDown => Some(Command::PageDown),
        KeyCode::Home | KeyCode::Char('g') => Some(Command::Top),
        KeyCode::End | KeyCode::Char('G') => Some(Command::Bottom),
        KeyCode::Char('l') => Some(Command::ToggleLike),
        KeyCode::Char('r') => Some(Command::Refresh),
        _ => None,
    }
}

/// Splits the reserved chrome rows between header, status and footer so the
/// card area matches the row count the viewport was computed from. Header
/// and footer are filled first; the status area takes the rest.
fn chrome_heights(reserved: u16) -> (u16, u16, u16) {
    let header = reserved.min(HEADER_HEIGHT);
    let footer = reserved.saturating_sub(header).min(FOOTER_HEIGHT);
    let status = reserved - header - footer;
    (header, status, footer)
}

fn card_lines(item: &Item, width: usize, text_rows: usize) -> Vec<Line<'static>> {
    let mut author = vec![Span::styled(
        format!("@{}", item.author.handle),
        Style::default()
            .fg(COLOR_HANDLE)
            .add_modifier(Modifier::BOLD),
    )];
    if let Some(name) = item.author.display_name.as_deref().filter(|n| !n.is_empty()) {
        author.push(Span::styled(
            format!(" · {name}"),
            Style::default().fg(COLOR_TEXT_SECONDARY),
        ));
    }
    let age = Span::styled(
        format::time_ago(&item.created_at),
        Style::default().fg(COLOR_TEXT_SECONDARY),
    );
    let mut lines = vec![spread_line(author, age, width)];

    if text_rows > 0 && width > 0 {
        let wrapped = wrap(&item.text, width);
        let overflow = wrapped.len() > text_rows;
        let base = Style::default().fg(COLOR_TEXT_PRIMARY);
        for (i, row) in wrapped.iter().take(text_rows).enumerate() {
            let text = if overflow && i + 1 == text_rows {
                format::truncate_text(&format!("{row}..."), width)
            } else {
                row.to_string()
            };
            lines.push(Line::from(rich_spans(&text, base)));
        }
    }

    let dim = Style::default().fg(COLOR_TEXT_SECONDARY);
    let heart = if item.is_liked() {
        Style::default().fg(COLOR_ERROR)
    } else {
        dim
    };
    let repost = if item.is_reposted() {
        Style::default().fg(COLOR_SUCCESS)
    } else {
        dim
    };
    lines.push(Line::from(vec![
        Span::styled("♥", heart),
        Span::styled(format!(" {}   ", item.like_count), dim),
        Span::styled("⇄", repost),
        Span::styled(format!(" {}   ", item.repost_count), dim),
        Span::styled(format!("↩ {}", item.reply_count), dim),
    ]));
    lines
}

fn rich_spans(text: &str, base: Style) -> Vec<Span<'static>> {
    format::tokenize(text)
        .into_iter()
        .map(|token| {
            let style = match token.kind {
                TokenKind::Text => base,
                TokenKind::Mention => base.fg(COLOR_MENTION),
                TokenKind::Link => base.fg(COLOR_LINK).add_modifier(Modifier::UNDERLINED),
                TokenKind::Hashtag => base.fg(COLOR_HASHTAG),
            };
            Span::styled(token.text.to_string(), style)
        })
        .collect()
}

/// Places `right` flush against the right edge of a `width`-column line.
fn spread_line(mut left: Vec<Span<'static>>, right: Span<'static>, width: usize) -> Line<'static> {
    let used: usize = left
        .iter()
        .map(|span| UnicodeWidthStr::width(span.content.as_ref()))
        .sum::<usize>()
        + UnicodeWidthStr::width(right.content.as_ref());
    let gap = width.saturating_sub(used).max(1);
    left.push(Span::raw(" ".repeat(gap)));
    left.push(right);
    Line::from(left)
}

fn pad_lines_to_width(lines: &mut [Line<'static>], width: u16) {
    let width = width as usize;
    if width == 0 {
        return;
    }

    for line in lines {
        let mut current_width = 0usize;
        for span in &line.spans {
            current_width =
                current_width.saturating_add(UnicodeWidthStr::width(span.content.as_ref()));
        }
        if current_width >= width {
            continue;
        }
        let pad_style = line.spans.last().map(|span| span.style).unwrap_or_default();
        let padding = " ".repeat(width - current_width);
        line.spans.push(Span::styled(padding, pad_style));
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let percent_x = percent_x.min(100);
    let percent_y = percent_y.min(100);
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage(100 - percent_x - (100 - percent_x) / 2),
        ])
        .split(area);
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage(100 - percent_y - (100 - percent_y) / 2),
        ])
        .split(horizontal[1]);
    vertical[1]
}
