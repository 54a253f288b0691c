//! Terminal output: log lines above a single status line.

use {
    crossterm::{
        QueueableCommand, cursor,
        style::{Color, ResetColor, SetForegroundColor},
        terminal,
    },
    parking_lot::Mutex,
    std::{
        fmt::{self, Display, Write as _},
        io::{self, Stdout, Write},
        process,
        sync::LazyLock,
    },
    tokio::{runtime::Handle, signal::ctrl_c},
    tracing::{
        Event, Level, Metadata, Subscriber, error,
        field::{Field, Visit},
        warn,
    },
    tracing_subscriber::{Layer, layer::Context},
};

struct Term {
    stdout: Stdout,
    current_status: Option<String>,
}

static TERM: LazyLock<Mutex<Term>> = LazyLock::new(|| Mutex::new(Term::new()));

/// Replaces the status line.
#[inline]
pub fn set_status(status: impl Display) {
    // Nothing sensible can be done if the terminal is gone.
    TERM.lock().set_status(status.to_string()).ok();
}

#[inline]
pub fn clear_status() {
    TERM.lock().clear_status().ok();
}

impl Term {
    fn new() -> Self {
        if let Ok(handle) = Handle::try_current() {
            handle.spawn(async {
                match ctrl_c().await {
                    Ok(()) => {
                        clear_status();
                        error!("Interrupted.");
                        #[expect(clippy::exit, reason = "interrupted by user")]
                        process::exit(1);
                    }
                    Err(err) => {
                        warn!(?err, "failed to listen to interrupt signal");
                    }
                }
            });
        }
        Self {
            stdout: io::stdout(),
            current_status: None,
        }
    }

    fn set_status(&mut self, status: String) -> io::Result<()> {
        if self.current_status.is_none() {
            self.stdout.queue(cursor::Hide)?;
            self.stdout.queue(terminal::DisableLineWrap)?;
        } else {
            self.stdout.queue(cursor::RestorePosition)?;
            self.stdout
                .queue(terminal::Clear(terminal::ClearType::FromCursorDown))?;
        }
        self.stdout.queue(cursor::SavePosition)?;
        self.stdout.queue(SetForegroundColor(Color::DarkGreen))?;
        self.stdout.write_all(status.as_bytes())?;
        self.stdout.queue(ResetColor)?;
        self.stdout.queue(cursor::RestorePosition)?;
        self.stdout.flush()?;
        self.current_status = Some(status);
        Ok(())
    }

    fn clear_status(&mut self) -> io::Result<()> {
        if self.current_status.is_none() {
            return Ok(());
        }
        self.current_status = None;
        self.stdout.queue(cursor::RestorePosition)?;
        self.stdout
            .queue(terminal::Clear(terminal::ClearType::FromCursorDown))?;
        self.stdout.queue(terminal::EnableLineWrap)?;
        self.stdout.queue(cursor::Show)?;
        self.stdout.flush()
    }

    fn write(&mut self, color: Option<Color>, text: &str) -> io::Result<()> {
        let old_status = self.current_status.clone();
        self.clear_status()?;
        if let Some(color) = color {
            self.stdout.queue(SetForegroundColor(color))?;
        }
        self.stdout.write_all(text.as_bytes())?;
        if !text.ends_with('\n') {
            self.stdout.write_all(b"\n")?;
        }
        if color.is_some() {
            self.stdout.queue(ResetColor)?;
        }
        if let Some(old_status) = old_status {
            self.set_status(old_status)?;
        }
        self.stdout.flush()
    }
}

/// Prints events of this application's crates to the terminal.
pub struct TermLayer;

impl<S: Subscriber> Layer<S> for TermLayer {
    #[inline]
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = *event.metadata().level();
        let color = if level == Level::ERROR || level == Level::WARN {
            Some(Color::Red)
        } else if level == Level::INFO {
            None
        } else {
            Some(Color::Grey)
        };
        let message = format_event(event);
        TERM.lock().write(color, &message).ok();
    }

    #[inline]
    fn enabled(&self, metadata: &Metadata<'_>, _ctx: Context<'_, S>) -> bool {
        metadata.module_path().is_some_and(is_own_module)
    }
}

fn is_own_module(path: &str) -> bool {
    path == "eph" || path.starts_with("eph::") || path.starts_with("eph_")
}

fn format_event(event: &Event<'_>) -> String {
    let mut visitor = MessageVisitor::default();
    event.record(&mut visitor);
    let mut message = visitor.message;
    if !visitor.fields.is_empty() {
        write!(message, " ({})", visitor.fields.join(", ")).ok();
    }
    message
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: Vec<String>,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            write!(self.message, "{value:?}").ok();
        } else {
            self.fields.push(format!("{} = {:?}", field.name(), value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn own_modules() {
        assert!(is_own_module("eph"));
        assert!(is_own_module("eph::config"));
        assert!(is_own_module("eph_sdk::session"));
        assert!(!is_own_module("ephemeral"));
        assert!(!is_own_module("reqwest::connect"));
        assert!(!is_own_module("hyper_util"));
    }
}
