//! Terminal colours for the chat front-end. `console` drops the escapes when
//! stdout is not a tty or colours are disabled.

use console::{Style, style};
use std::fmt::Display;

fn paint<D: Display>(text: D, with: &Style) -> String {
    with.apply_to(text).to_string()
}

/// Confirmations after a command succeeds.
pub fn success<D: Display>(text: D) -> String {
    paint(text, &Style::new().green().bold())
}

/// Session names and section titles.
pub fn header<D: Display>(text: D) -> String {
    paint(text, &Style::new().white().bold())
}

pub fn dim<D: Display>(text: D) -> String {
    paint(text, &Style::new().dim())
}

/// Usage hints and recoverable failures.
pub fn warn<D: Display>(text: D) -> String {
    paint(text, &Style::new().yellow())
}

pub fn value<D: Display>(text: D) -> String {
    paint(text, &Style::new().green())
}

/// Assistant speaker label and list bullets.
pub fn accent<D: Display>(text: D) -> String {
    paint(text, &Style::new().cyan().bold())
}

pub fn label<D: Display>(text: D) -> String {
    paint(text, &Style::new().cyan())
}

pub fn url<D: Display>(text: D) -> String {
    style(text).cyan().underlined().to_string()
}

/// Match percentage, green from 80 and yellow from 50.
pub fn score(percentage: f64) -> String {
    let band = match percentage {
        p if p >= 80.0 => Style::new().green(),
        p if p >= 50.0 => Style::new().yellow(),
        _ => Style::new().red(),
    };
    paint(format!("{percentage:.0}%"), &band.bold())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_rounds_to_whole_percent() {
        console::set_colors_enabled(false);
        assert_eq!(score(87.6), "88%");
        assert_eq!(score(12.0), "12%");
    }
}
