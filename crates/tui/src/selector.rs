use std::io;

use async_trait::async_trait;
use sqlwalk_core::item::Item;
use sqlwalk_core::navigator::{PickRequest, Picker, Selection};
use sqlwalk_core::search::{filter_indices, SearchPredicate};
use sqlwalk_core::template::{Line, RenderTemplate, TextStyle};
use sqlwalk_core::viewport::viewport_height;
use sqlwalk_core::PickError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::render::{erase_footer, Screen};
use crate::terminal::{Key, TerminalDriver};

const SEARCH_PROMPT: &str = "Search: ";
const NO_MATCHES: &str = "  (no matches)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Continue,
    Chosen(usize),
    Cancelled,
}

/// Cursor, query and scroll position of one selector session.
pub struct SelectorState<'r> {
    items: &'r [&'r dyn Item],
    predicate: Option<&'r SearchPredicate>,
    query: String,
    matches: Vec<usize>,
    cursor: usize,
    offset: usize,
    height: usize,
}

impl<'r> SelectorState<'r> {
    #[must_use]
    pub fn new(
        items: &'r [&'r dyn Item],
        predicate: Option<&'r SearchPredicate>,
        height: usize,
    ) -> Self {
        Self {
            items,
            predicate,
            query: String::new(),
            matches: (0..items.len()).collect(),
            cursor: 0,
            offset: 0,
            height: height.max(1),
        }
    }

    #[must_use]
    pub fn query(&self) -> &str {
        &self.query
    }

    #[must_use]
    pub fn matches(&self) -> &[usize] {
        &self.matches
    }

    /// Original index of the highlighted item.
    #[must_use]
    pub fn active(&self) -> Option<usize> {
        self.matches.get(self.cursor).copied()
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    pub fn set_height(&mut self, height: usize) {
        self.height = height.max(1);
        self.scroll_to_cursor();
    }

    /// Visible `(original index, is active)` pairs, top to bottom.
    pub fn visible(&self) -> impl Iterator<Item = (usize, bool)> + '_ {
        self.matches
            .iter()
            .enumerate()
            .skip(self.offset)
            .take(self.height)
            .map(|(position, index)| (*index, position == self.cursor))
    }

    pub fn apply(&mut self, key: Key) -> Outcome {
        match key {
            Key::Cancel => return Outcome::Cancelled,
            Key::Enter => {
                if let Some(index) = self.active() {
                    return Outcome::Chosen(index);
                }
            }
            Key::Char(ch) if self.predicate.is_some() => {
                self.query.push(ch);
                self.refilter();
            }
            Key::Char('j') => self.move_by(1),
            Key::Char('k') => self.move_by(-1),
            Key::Backspace if self.predicate.is_some() => {
                if self.query.pop().is_some() {
                    self.refilter();
                }
            }
            Key::Up => self.move_by(-1),
            Key::Down => self.move_by(1),
            Key::PageUp => self.move_by(-self.page()),
            Key::PageDown => self.move_by(self.page()),
            Key::Home => self.move_to(0),
            Key::End => self.move_to(self.matches.len().saturating_sub(1)),
            Key::Char(_) | Key::Backspace | Key::Resize => {}
        }
        Outcome::Continue
    }

    fn page(&self) -> isize {
        isize::try_from(self.height).unwrap_or(isize::MAX)
    }

    fn move_by(&mut self, delta: isize) {
        let target = self.cursor.saturating_add_signed(delta);
        self.move_to(target);
    }

    fn move_to(&mut self, position: usize) {
        self.cursor = position.min(self.matches.len().saturating_sub(1));
        self.scroll_to_cursor();
    }

    fn scroll_to_cursor(&mut self) {
        if self.cursor < self.offset {
            self.offset = self.cursor;
        } else if self.cursor >= self.offset + self.height {
            self.offset = self.cursor + 1 - self.height;
        }
    }

    fn refilter(&mut self) {
        self.matches = filter_indices(&self.query, self.items, self.predicate);
        self.cursor = 0;
        self.offset = 0;
    }
}

/// Incremental fuzzy-search list picker drawn inline on a [`TerminalDriver`].
pub struct Selector<D> {
    driver: D,
}

impl<D: TerminalDriver> Selector<D> {
    #[must_use]
    pub fn new(driver: D) -> Self {
        Self { driver }
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    #[must_use]
    pub fn into_driver(self) -> D {
        self.driver
    }

    /// Runs one selection session.
    ///
    /// Whatever the outcome, the frame is collapsed to one footer line which is
    /// then erased, leaving the cursor where the session started.
    pub async fn select(
        &mut self,
        request: PickRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<Selection, PickError> {
        if request.items.is_empty() {
            return Ok(Selection::Nothing);
        }

        self.driver.begin()?;
        let mut screen = Screen::new();
        let outcome = self.session(&request, &mut screen, cancel).await;
        let cleanup = self.finish(&request, &mut screen);
        debug!(label = request.label, ?outcome, "selector closed");

        let selection = outcome?;
        cleanup?;
        Ok(selection)
    }

    async fn session(
        &mut self,
        request: &PickRequest<'_>,
        screen: &mut Screen,
        cancel: &CancellationToken,
    ) -> Result<Selection, PickError> {
        let plain = RenderTemplate::plain();
        let template = request.template.unwrap_or(&plain);
        let mut state = SelectorState::new(request.items, request.predicate, 1);

        loop {
            let size = self.terminal_size();
            screen.set_width(size.map(|(columns, _)| columns));
            state.set_height(viewport_height(size.map(|(_, rows)| rows), request.template));
            let frame = frame_lines(request, template, &state);
            let mut buffer = Vec::new();
            screen.draw(&mut buffer, &frame)?;
            self.driver.write_all(&buffer)?;
            self.driver.flush()?;

            let key = self.driver.read_key(cancel).await?;
            trace!(?key, "selector key");
            match state.apply(key) {
                Outcome::Continue => {}
                Outcome::Chosen(index) => return Ok(Selection::Chosen(index)),
                Outcome::Cancelled => return Err(PickError::Cancelled),
            }
        }
    }

    fn finish(&mut self, request: &PickRequest<'_>, screen: &mut Screen) -> io::Result<()> {
        let footer = request
            .template
            .map_or_else(|| plain_line(request.label), |template| template.render_label(request.label));

        let mut buffer = Vec::new();
        screen.collapse(&mut buffer, &footer)?;
        erase_footer(&mut buffer)?;
        let written = self
            .driver
            .write_all(&buffer)
            .and_then(|()| self.driver.flush());
        let ended = self.driver.end();
        written.and(ended)
    }

    fn terminal_size(&self) -> Option<(u16, u16)> {
        match self.driver.size() {
            Ok(size) => Some(size),
            Err(error) => {
                debug!(%error, "terminal size unavailable");
                None
            }
        }
    }
}

#[async_trait]
impl<D: TerminalDriver> Picker for Selector<D> {
    async fn pick(
        &mut self,
        request: PickRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<Selection, PickError> {
        self.select(request, cancel).await
    }
}

fn plain_line(text: &str) -> Line {
    let mut line = Line::default();
    line.push(text, TextStyle::default());
    line
}

fn frame_lines(
    request: &PickRequest<'_>,
    template: &RenderTemplate,
    state: &SelectorState<'_>,
) -> Vec<Line> {
    let mut lines = vec![template.render_label(request.label)];

    if request.predicate.is_some() {
        let mut search = Line::default();
        search.push(
            SEARCH_PROMPT,
            TextStyle {
                faint: true,
                ..TextStyle::default()
            },
        );
        search.push(state.query(), TextStyle::default());
        lines.push(search);
    }

    if state.matches().is_empty() {
        lines.push(plain_line(NO_MATCHES));
    }
    for (index, active) in state.visible() {
        lines.push(template.render_row(request.items[index], active));
    }

    if let Some(active) = state.active() {
        lines.extend(template.render_details(request.items[active]));
    }
    lines
}
