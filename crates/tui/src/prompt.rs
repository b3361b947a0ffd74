use sqlwalk_core::error::ValidationError;
use sqlwalk_core::template::{Color, Line, TextStyle};
use sqlwalk_core::PickError;
use tokio_util::sync::CancellationToken;

use crate::render::{erase_footer, Screen};
use crate::terminal::{Key, TerminalDriver};

const MASK: char = '*';

pub type Validator = dyn Fn(&str) -> Result<(), ValidationError> + Send + Sync;

fn faint() -> TextStyle {
    TextStyle {
        faint: true,
        ..TextStyle::default()
    }
}

fn bold() -> TextStyle {
    TextStyle {
        bold: true,
        ..TextStyle::default()
    }
}

/// Single-line text input.
pub struct TextPrompt<'a> {
    label: &'a str,
    default: Option<&'a str>,
    masked: bool,
    validate: Option<&'a Validator>,
}

impl<'a> TextPrompt<'a> {
    #[must_use]
    pub fn new(label: &'a str) -> Self {
        Self {
            label,
            default: None,
            masked: false,
            validate: None,
        }
    }

    /// Value used when the input is left empty.
    #[must_use]
    pub fn with_default(mut self, default: &'a str) -> Self {
        self.default = Some(default);
        self
    }

    #[must_use]
    pub fn masked(mut self) -> Self {
        self.masked = true;
        self
    }

    #[must_use]
    pub fn with_validator(mut self, validate: &'a Validator) -> Self {
        self.validate = Some(validate);
        self
    }

    fn shown(&self, input: &str) -> String {
        if self.masked {
            std::iter::repeat(MASK).take(input.chars().count()).collect()
        } else {
            input.to_string()
        }
    }

    fn resolve(&self, input: &str) -> Result<String, ValidationError> {
        let value = if input.is_empty() {
            self.default.unwrap_or_default()
        } else {
            input
        };
        if let Some(validate) = self.validate {
            validate(value)?;
        }
        Ok(value.to_string())
    }

    fn frame(&self, input: &str, problem: Option<&ValidationError>) -> Vec<Line> {
        let mut line = Line::default();
        line.push(self.label, bold());
        if let Some(default) = self.default {
            line.push(format!(" ({})", self.shown(default)), faint());
        }
        line.push(": ", TextStyle::default());
        line.push(self.shown(input), TextStyle::default());

        let mut lines = vec![line];
        if let Some(problem) = problem {
            let mut hint = Line::default();
            hint.push(
                format!("✗ {problem}"),
                TextStyle {
                    fg: Some(Color::Red),
                    ..TextStyle::default()
                },
            );
            lines.push(hint);
        }
        lines
    }

    fn summary(&self, value: &str) -> Line {
        let mut line = Line::default();
        line.push(self.label, faint());
        line.push(": ", faint());
        line.push(self.shown(value), TextStyle::default());
        line
    }

    /// Reads a value. Invalid input keeps the prompt open with the error shown below it.
    pub async fn run<D: TerminalDriver + ?Sized>(
        &self,
        driver: &mut D,
        cancel: &CancellationToken,
    ) -> Result<String, PickError> {
        driver.begin()?;
        let mut screen = Screen::new();
        let outcome = self.read(driver, &mut screen, cancel).await;

        let mut buffer = Vec::new();
        match &outcome {
            Ok(value) => screen.collapse(&mut buffer, &self.summary(value))?,
            Err(_) => {
                screen.collapse(&mut buffer, &Line::default())?;
                erase_footer(&mut buffer)?;
            }
        }
        let written = driver.write_all(&buffer).and_then(|()| driver.flush());
        let ended = driver.end();

        let value = outcome?;
        written?;
        ended?;
        Ok(value)
    }

    async fn read<D: TerminalDriver + ?Sized>(
        &self,
        driver: &mut D,
        screen: &mut Screen,
        cancel: &CancellationToken,
    ) -> Result<String, PickError> {
        let mut input = String::new();
        let mut problem = None;

        loop {
            screen.set_width(driver.size().ok().map(|(columns, _)| columns));
            let mut buffer = Vec::new();
            screen.draw(&mut buffer, &self.frame(&input, problem.as_ref()))?;
            driver.write_all(&buffer)?;
            driver.flush()?;

            match driver.read_key(cancel).await? {
                Key::Cancel => return Err(PickError::Cancelled),
                Key::Enter => match self.resolve(&input) {
                    Ok(value) => return Ok(value),
                    Err(error) => problem = Some(error),
                },
                Key::Char(ch) => {
                    input.push(ch);
                    problem = None;
                }
                Key::Backspace => {
                    input.pop();
                    problem = None;
                }
                _ => {}
            }
        }
    }
}

/// Yes/no question answered with `y`, `n`, or Enter for `default`.
pub async fn confirm<D: TerminalDriver + ?Sized>(
    driver: &mut D,
    label: &str,
    default: bool,
    cancel: &CancellationToken,
) -> Result<bool, PickError> {
    let mut question = Line::default();
    question.push(label, bold());
    question.push(if default { " [Y/n] " } else { " [y/N] " }, faint());

    driver.begin()?;
    let mut screen = Screen::new();
    screen.set_width(driver.size().ok().map(|(columns, _)| columns));
    let mut buffer = Vec::new();
    screen.draw(&mut buffer, std::slice::from_ref(&question))?;
    driver.write_all(&buffer)?;
    driver.flush()?;

    let outcome = loop {
        match driver.read_key(cancel).await {
            Ok(Key::Char('y' | 'Y')) => break Ok(true),
            Ok(Key::Char('n' | 'N')) => break Ok(false),
            Ok(Key::Enter) => break Ok(default),
            Ok(Key::Cancel) => break Err(PickError::Cancelled),
            Ok(_) => {}
            Err(error) => break Err(error),
        }
    };

    let mut buffer = Vec::new();
    if let Ok(answer) = &outcome {
        let mut summary = Line::default();
        summary.push(label, faint());
        summary.push(if *answer { " yes" } else { " no" }, TextStyle::default());
        screen.collapse(&mut buffer, &summary)?;
    } else {
        screen.collapse(&mut buffer, &Line::default())?;
        erase_footer(&mut buffer)?;
    }
    let written = driver.write_all(&buffer).and_then(|()| driver.flush());
    let ended = driver.end();

    let answer = outcome?;
    written?;
    ended?;
    Ok(answer)
}

#[cfg(test)]
mod tests {
    use sqlwalk_core::error::require_non_empty;
    use sqlwalk_core::PickError;
    use tokio_util::sync::CancellationToken;

    use super::{confirm, TextPrompt};
    use crate::terminal::fake::ScriptedDriver;
    use crate::terminal::Key;

    #[tokio::test]
    async fn empty_input_takes_the_default() {
        let mut driver = ScriptedDriver::with_keys([Key::Enter]);
        let value = TextPrompt::new("Host")
            .with_default("127.0.0.1")
            .run(&mut driver, &CancellationToken::new())
            .await
            .expect("prompt should succeed");

        assert_eq!(value, "127.0.0.1");
        assert!(driver.output_text().ends_with("127.0.0.1\r\n"));
        assert!(!driver.active);
    }

    #[tokio::test]
    async fn validation_rejects_empty_input_until_corrected() {
        let keys = [Key::Enter]
            .into_iter()
            .chain(ScriptedDriver::typed("inventory"))
            .chain([Key::Enter]);
        let mut driver = ScriptedDriver::with_keys(keys);
        let required = require_non_empty("database");

        let value = TextPrompt::new("Database")
            .with_validator(&required)
            .run(&mut driver, &CancellationToken::new())
            .await
            .expect("prompt should succeed");

        assert_eq!(value, "inventory");
        assert!(driver.output_text().contains("must provide a database"));
    }

    #[tokio::test]
    async fn masked_input_never_echoes() {
        let keys = ScriptedDriver::typed("hunter2").chain([Key::Backspace, Key::Enter]);
        let mut driver = ScriptedDriver::with_keys(keys);

        let value = TextPrompt::new("Password")
            .masked()
            .run(&mut driver, &CancellationToken::new())
            .await
            .expect("prompt should succeed");

        assert_eq!(value, "hunter");
        let output = driver.output_text();
        assert!(!output.contains("hunter"));
        assert!(output.contains("******"));
    }

    #[tokio::test]
    async fn cancel_key_aborts_prompt() {
        let mut driver = ScriptedDriver::with_keys([Key::Char('r'), Key::Cancel]);
        let error = TextPrompt::new("User")
            .run(&mut driver, &CancellationToken::new())
            .await
            .expect_err("prompt should be cancelled");

        assert!(matches!(error, PickError::Cancelled));
        assert!(!driver.active);
    }

    #[tokio::test]
    async fn confirm_reads_yes_no_and_default() {
        let cancel = CancellationToken::new();

        let mut driver = ScriptedDriver::with_keys([Key::Char('y')]);
        assert!(confirm(&mut driver, "Save profile?", false, &cancel)
            .await
            .expect("confirm should succeed"));

        let mut driver = ScriptedDriver::with_keys([Key::Down, Key::Char('N')]);
        assert!(!confirm(&mut driver, "Save profile?", true, &cancel)
            .await
            .expect("confirm should succeed"));

        let mut driver = ScriptedDriver::with_keys([Key::Enter]);
        assert!(confirm(&mut driver, "Use a saved profile?", true, &cancel)
            .await
            .expect("confirm should succeed"));
        assert!(driver.output_text().contains("[Y/n]"));
    }
}
