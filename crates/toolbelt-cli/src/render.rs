use std::io::IsTerminal;
use std::time::Duration;

use anstyle::{AnsiColor, Style};
use indicatif::{ProgressBar, ProgressStyle};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputStyle {
    Plain,
    Rich,
}

pub fn current_output_style() -> OutputStyle {
    if std::env::var_os("NO_COLOR").is_some() || !std::io::stdout().is_terminal() {
        OutputStyle::Plain
    } else {
        OutputStyle::Rich
    }
}

pub fn print_status(style: OutputStyle, status: &str, message: &str) {
    match style {
        OutputStyle::Plain => println!("{status}: {message}"),
        OutputStyle::Rich => {
            let accent = Style::new().bold().fg_color(Some(AnsiColor::Green.into()));
            println!("{}{status}{} {message}", accent.render(), accent.render_reset());
        }
    }
}

/// Keeps a spinner ticking while a blocking task (the external restore)
/// runs. Plain output skips the spinner entirely.
pub fn with_spinner<T>(style: OutputStyle, label: &str, task: impl FnOnce() -> T) -> T {
    if style != OutputStyle::Rich {
        return task();
    }

    let spinner = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::with_template("{spinner:.cyan.bold} {msg}") {
        spinner.set_style(template);
    }
    spinner.set_message(label.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    let value = task();
    spinner.finish_and_clear();
    value
}
