#![forbid(unsafe_code)]

//! Built-in terminal picker.
//!
//! [`TerminalSelect`] draws the prompt and candidate list on the alternate
//! screen with crossterm and edits through [`PickerState`]. It draws on
//! stderr so stdout stays free for the caller's result. Between keystrokes it
//! polls for input every `poll_interval` and, when idle, consumes redisplay
//! requests from the refresh ticker so output from a running program shows up
//! without the user typing.
//!
//! # Terminal lifecycle
//!
//! [`TtySession`] owns raw mode and the alternate screen and restores both on
//! drop. A panic hook restores them before the panic message prints. On unix,
//! SIGINT and SIGTERM set an interrupt flag that the input loop turns into
//! [`SelectError::Cancelled`], so the orchestrator's cleanup runs normally.

use std::io::{self, Write};
use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use asel_core::SelectError;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::{Attribute, Print, SetAttribute};
use crossterm::{cursor, queue, terminal};
use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

#[cfg(unix)]
use signal_hook::consts::signal::{SIGINT, SIGTERM};
#[cfg(unix)]
use signal_hook::iterator::Signals;

use crate::delegate::{SelectFn, SelectRequest};
use crate::picker::{PickerKey, PickerOutcome, PickerState};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);
const SELECTED_MARKER: &str = "> ";
const UNSELECTED_MARKER: &str = "  ";

/// Interactive picker on the controlling terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalSelect {
    /// How long to wait for input before checking for redisplay requests.
    pub poll_interval: Duration,
    /// Cap on listed candidates; `None` fills the screen.
    pub max_visible: Option<usize>,
}

impl Default for TerminalSelect {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_visible: None,
        }
    }
}

impl TerminalSelect {
    /// Set the input poll interval (builder).
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Cap the number of listed candidates (builder).
    #[must_use]
    pub fn with_max_visible(mut self, rows: usize) -> Self {
        self.max_visible = Some(rows);
        self
    }

    fn list_height(&self, rows: u16) -> usize {
        let available = usize::from(rows.saturating_sub(1)).max(1);
        self.max_visible.map_or(available, |cap| available.min(cap.max(1)))
    }
}

impl SelectFn for TerminalSelect {
    fn select(&self, request: SelectRequest<'_>) -> Result<String, SelectError> {
        let SelectRequest {
            prompt,
            source,
            channel,
            options,
            redisplay,
        } = request;

        let session = TtySession::open().map_err(SelectError::Terminal)?;
        let _surface = redisplay.attach();

        let (mut cols, rows) = terminal::size().map_err(SelectError::Terminal)?;
        let mut state = PickerState::new(options, self.list_height(rows));
        state.refresh(source, channel);

        let mut out = io::stderr();
        render(&mut out, prompt, &state, cols).map_err(SelectError::Terminal)?;

        loop {
            if session.interrupted() {
                tracing::debug!("interrupted by signal");
                return Err(SelectError::Cancelled);
            }

            if event::poll(self.poll_interval).map_err(SelectError::Terminal)? {
                match event::read().map_err(SelectError::Terminal)? {
                    Event::Key(key) if key.kind != KeyEventKind::Release => {
                        let Some(key) = map_key(key) else {
                            continue;
                        };
                        match state.handle_key(key, source, channel) {
                            PickerOutcome::Continue => {}
                            PickerOutcome::Accept(choice) => return Ok(choice),
                            PickerOutcome::Cancel => return Err(SelectError::Cancelled),
                        }
                    }
                    Event::Resize(new_cols, new_rows) => {
                        cols = new_cols;
                        state.set_height(self.list_height(new_rows));
                    }
                    _ => continue,
                }
            } else if redisplay.take() {
                state.refresh(source, channel);
            } else {
                continue;
            }

            render(&mut out, prompt, &state, cols).map_err(SelectError::Terminal)?;
        }
    }
}

/// Translate a crossterm key into a picker key.
pub fn map_key(key: KeyEvent) -> Option<PickerKey> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('a') => Some(PickerKey::Home),
            KeyCode::Char('e') => Some(PickerKey::End),
            KeyCode::Char('p') => Some(PickerKey::Up),
            KeyCode::Char('n') => Some(PickerKey::Down),
            KeyCode::Char('u') => Some(PickerKey::Clear),
            KeyCode::Char('c' | 'g') => Some(PickerKey::Cancel),
            _ => None,
        };
    }
    if key.modifiers.contains(KeyModifiers::ALT) {
        return None;
    }
    match key.code {
        KeyCode::Char(c) => Some(PickerKey::Char(c)),
        KeyCode::Backspace => Some(PickerKey::Backspace),
        KeyCode::Delete => Some(PickerKey::Delete),
        KeyCode::Left => Some(PickerKey::Left),
        KeyCode::Right => Some(PickerKey::Right),
        KeyCode::Home => Some(PickerKey::Home),
        KeyCode::End => Some(PickerKey::End),
        KeyCode::Up => Some(PickerKey::Up),
        KeyCode::Down => Some(PickerKey::Down),
        KeyCode::Tab => Some(PickerKey::Complete),
        KeyCode::Enter => Some(PickerKey::Accept),
        KeyCode::Esc => Some(PickerKey::Cancel),
        _ => None,
    }
}

/// Draw the whole picker: input line first, then the visible candidates.
pub fn render<W: Write>(out: &mut W, prompt: &str, state: &PickerState, cols: u16) -> io::Result<()> {
    let width = usize::from(cols);
    queue!(
        out,
        cursor::MoveTo(0, 0),
        terminal::Clear(terminal::ClearType::All)
    )?;

    let mut input = format!("{prompt}{}", state.query());
    if let Some(status) = state.status() {
        input.push(' ');
        input.push_str(status);
    }
    queue!(out, Print(truncate_to_width(&input, width)))?;

    let item_width = width.saturating_sub(SELECTED_MARKER.width());
    for (row, (index, candidate)) in state.visible().enumerate() {
        let line = truncate_to_width(candidate, item_width);
        let y = u16::try_from(row + 1).unwrap_or(u16::MAX);
        queue!(out, cursor::MoveTo(0, y))?;
        if index == state.selected() {
            queue!(
                out,
                SetAttribute(Attribute::Reverse),
                Print(SELECTED_MARKER),
                Print(line),
                SetAttribute(Attribute::Reset)
            )?;
        } else {
            queue!(out, Print(UNSELECTED_MARKER), Print(line))?;
        }
    }

    let before_cursor = &state.query()[..state.cursor_byte()];
    let x = (prompt.width() + before_cursor.width()).min(width.saturating_sub(1));
    queue!(out, cursor::MoveTo(u16::try_from(x).unwrap_or(u16::MAX), 0))?;
    out.flush()
}

/// Longest grapheme-aligned prefix of `text` that fits in `width` columns.
pub fn truncate_to_width(text: &str, width: usize) -> &str {
    let mut used = 0;
    for (offset, grapheme) in text.grapheme_indices(true) {
        let w = grapheme.width();
        if used + w > width {
            return &text[..offset];
        }
        used += w;
    }
    text
}

/// Raw mode plus alternate screen, restored on drop.
#[derive(Debug)]
pub struct TtySession {
    interrupted: Arc<AtomicBool>,
    #[cfg(unix)]
    signal_guard: Option<SignalGuard>,
}

impl TtySession {
    /// Enter raw mode and the alternate screen.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal cannot be configured. Anything already
    /// enabled is restored first.
    pub fn open() -> io::Result<Self> {
        install_panic_hook();
        let interrupted = Arc::new(AtomicBool::new(false));

        terminal::enable_raw_mode()?;
        tracing::debug!("terminal raw mode enabled");

        let mut session = Self {
            interrupted: Arc::clone(&interrupted),
            #[cfg(unix)]
            signal_guard: None,
        };
        #[cfg(unix)]
        {
            session.signal_guard = Some(SignalGuard::new(interrupted)?);
        }

        crossterm::execute!(io::stderr(), terminal::EnterAlternateScreen)?;
        Ok(session)
    }

    /// Whether a termination signal arrived.
    pub fn interrupted(&self) -> bool {
        self.interrupted.load(Ordering::Acquire)
    }
}

impl Drop for TtySession {
    fn drop(&mut self) {
        #[cfg(unix)]
        let _ = self.signal_guard.take();
        restore_terminal();
        tracing::debug!("terminal restored");
    }
}

fn install_panic_hook() {
    static HOOK: OnceLock<()> = OnceLock::new();
    HOOK.get_or_init(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            restore_terminal();
            previous(info);
        }));
    });
}

fn restore_terminal() {
    let mut stderr = io::stderr();
    let _ = crossterm::execute!(stderr, cursor::Show, terminal::LeaveAlternateScreen);
    let _ = terminal::disable_raw_mode();
    let _ = stderr.flush();
}

#[cfg(unix)]
#[derive(Debug)]
struct SignalGuard {
    handle: signal_hook::iterator::Handle,
    thread: Option<std::thread::JoinHandle<()>>,
}

#[cfg(unix)]
impl SignalGuard {
    fn new(interrupted: Arc<AtomicBool>) -> io::Result<Self> {
        let mut signals = Signals::new([SIGINT, SIGTERM]).map_err(io::Error::other)?;
        let handle = signals.handle();
        let thread = std::thread::Builder::new()
            .name("asel-signals".into())
            .spawn(move || {
                for signal in signals.forever() {
                    tracing::warn!(signal, "termination signal received, cancelling prompt");
                    interrupted.store(true, Ordering::Release);
                }
            })?;
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }
}

#[cfg(unix)]
impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
