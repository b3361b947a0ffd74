use std::io::{self, Stdout, Write};

use async_trait::async_trait;
use crossterm::cursor::{Hide, Show};
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use futures_util::StreamExt;
use sqlwalk_core::PickError;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Keys the selector and prompts react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Backspace,
    Enter,
    Up,
    Down,
    PageUp,
    PageDown,
    Home,
    End,
    Cancel,
    /// The terminal changed size and the frame should be redrawn.
    Resize,
}

pub fn map_key_event(key: KeyEvent) -> Option<Key> {
    if key.kind == KeyEventKind::Release {
        return None;
    }

    match (key.modifiers, key.code) {
        (KeyModifiers::CONTROL, KeyCode::Char('c' | 'd')) | (_, KeyCode::Esc) => Some(Key::Cancel),
        (KeyModifiers::CONTROL, KeyCode::Char('p')) | (_, KeyCode::Up) => Some(Key::Up),
        (KeyModifiers::CONTROL, KeyCode::Char('n')) | (_, KeyCode::Down) => Some(Key::Down),
        (_, KeyCode::PageUp | KeyCode::Left) => Some(Key::PageUp),
        (_, KeyCode::PageDown | KeyCode::Right) => Some(Key::PageDown),
        (_, KeyCode::Home) => Some(Key::Home),
        (_, KeyCode::End) => Some(Key::End),
        (_, KeyCode::Enter) => Some(Key::Enter),
        (_, KeyCode::Backspace) => Some(Key::Backspace),
        (KeyModifiers::NONE | KeyModifiers::SHIFT, KeyCode::Char(ch)) => Some(Key::Char(ch)),
        _ => None,
    }
}

/// The raw terminal as seen by selectors and prompts.
#[async_trait]
pub trait TerminalDriver: Send {
    /// Puts the terminal into the mode interactive sessions need.
    fn begin(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn end(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Waits for the next key. Cancellation of `cancel` yields [`PickError::Cancelled`].
    async fn read_key(&mut self, cancel: &CancellationToken) -> Result<Key, PickError>;

    /// Current `(columns, rows)`.
    fn size(&self) -> io::Result<(u16, u16)>;

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()>;
}

/// [`TerminalDriver`] over the process's stdin and stdout.
pub struct CrosstermDriver {
    events: EventStream,
    out: Stdout,
    raw: bool,
}

impl CrosstermDriver {
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: EventStream::new(),
            out: io::stdout(),
            raw: false,
        }
    }
}

impl Default for CrosstermDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TerminalDriver for CrosstermDriver {
    fn begin(&mut self) -> io::Result<()> {
        if !self.raw {
            enable_raw_mode()?;
            self.raw = true;
        }
        execute!(self.out, Hide)
    }

    fn end(&mut self) -> io::Result<()> {
        execute!(self.out, Show)?;
        if self.raw {
            disable_raw_mode()?;
            self.raw = false;
        }
        Ok(())
    }

    async fn read_key(&mut self, cancel: &CancellationToken) -> Result<Key, PickError> {
        loop {
            let event = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(PickError::Cancelled),
                event = self.events.next() => event,
            };

            match event {
                Some(Ok(Event::Key(key))) => {
                    if let Some(key) = map_key_event(key) {
                        return Ok(key);
                    }
                }
                Some(Ok(Event::Resize(..))) => return Ok(Key::Resize),
                Some(Ok(_)) => {}
                Some(Err(error)) => return Err(PickError::Io(error)),
                None => {
                    return Err(PickError::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "terminal event stream closed",
                    )))
                }
            }
        }
    }

    fn size(&self) -> io::Result<(u16, u16)> {
        crossterm::terminal::size()
    }

    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.out.write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

impl Drop for CrosstermDriver {
    fn drop(&mut self) {
        if self.raw {
            if let Err(error) = self.end() {
                warn!(%error, "failed to restore terminal mode");
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

    use super::{map_key_event, Key};

    #[test]
    fn cancel_keys_are_mapped() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        let ctrl_d = KeyEvent::new(KeyCode::Char('d'), KeyModifiers::CONTROL);
        let esc = KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE);

        assert_eq!(map_key_event(ctrl_c), Some(Key::Cancel));
        assert_eq!(map_key_event(ctrl_d), Some(Key::Cancel));
        assert_eq!(map_key_event(esc), Some(Key::Cancel));
    }

    #[test]
    fn movement_keys_have_emacs_aliases() {
        let ctrl_p = KeyEvent::new(KeyCode::Char('p'), KeyModifiers::CONTROL);
        let ctrl_n = KeyEvent::new(KeyCode::Char('n'), KeyModifiers::CONTROL);
        let left = KeyEvent::new(KeyCode::Left, KeyModifiers::NONE);

        assert_eq!(map_key_event(ctrl_p), Some(Key::Up));
        assert_eq!(map_key_event(ctrl_n), Some(Key::Down));
        assert_eq!(map_key_event(left), Some(Key::PageUp));
    }

    #[test]
    fn printable_characters_pass_through() {
        let lower = KeyEvent::new(KeyCode::Char('j'), KeyModifiers::NONE);
        let upper = KeyEvent::new(KeyCode::Char('T'), KeyModifiers::SHIFT);
        let alt = KeyEvent::new(KeyCode::Char('x'), KeyModifiers::ALT);

        assert_eq!(map_key_event(lower), Some(Key::Char('j')));
        assert_eq!(map_key_event(upper), Some(Key::Char('T')));
        assert_eq!(map_key_event(alt), None);
    }

    #[test]
    fn key_releases_are_ignored() {
        let mut release = KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE);
        release.kind = KeyEventKind::Release;
        assert_eq!(map_key_event(release), None);
    }
}
