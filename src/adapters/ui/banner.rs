//! Startup banner: "CALL-REPORT" in FIGlet letters with a vertical color gradient.

use crossterm::ExecutableCommand;
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use figlet_rs::FIGfont;
use std::io::{Write, stdout};

const TITLE: &str = "CALL-REPORT";

/// Amber (#ffb000).
const AMBER: (u8, u8, u8) = (0xff, 0xb0, 0x00);
/// Teal (#00b3a4).
const TEAL: (u8, u8, u8) = (0x00, 0xb3, 0xa4);

/// Color of line `i` out of `total`, blending amber at the top into teal at the bottom.
fn gradient_at(i: usize, total: usize) -> Color {
    let t = if total <= 1 {
        1.0
    } else {
        i as f64 / (total - 1) as f64
    };
    let mix = |a: u8, b: u8| (f64::from(a) + (f64::from(b) - f64::from(a)) * t).round() as u8;
    Color::Rgb {
        r: mix(AMBER.0, TEAL.0),
        g: mix(AMBER.1, TEAL.1),
        b: mix(AMBER.2, TEAL.2),
    }
}

/// FIGlet rendering of the title, or the plain title if the font is unavailable.
fn title_art() -> String {
    FIGfont::standard()
        .ok()
        .and_then(|font| font.convert(TITLE).map(|figure| figure.to_string()))
        .unwrap_or_else(|| TITLE.to_string())
}

/// Prints the banner with an amber-to-teal gradient, then the version line.
pub fn print_welcome() {
    let mut out = stdout();
    let art = title_art();
    let total = art.lines().count();

    for (i, line) in art.lines().enumerate() {
        let _ = out
            .execute(SetForegroundColor(gradient_at(i, total)))
            .and_then(|o| o.execute(Print(format!("{}\r\n", line))))
            .and_then(|o| o.execute(ResetColor));
    }

    let _ = out
        .execute(SetForegroundColor(gradient_at(1, 1)))
        .and_then(|o| {
            o.execute(Print(format!(
                "v{}  weekly payroll & conversion\r\n",
                env!("CARGO_PKG_VERSION")
            )))
        })
        .and_then(|o| o.execute(ResetColor));
    let _ = out.flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gradient_endpoints() {
        let rgb = |(r, g, b): (u8, u8, u8)| Color::Rgb { r, g, b };
        assert_eq!(gradient_at(0, 6), rgb(AMBER));
        assert_eq!(gradient_at(5, 6), rgb(TEAL));
        assert_eq!(gradient_at(0, 1), rgb(TEAL));
    }

    #[test]
    fn test_title_art_is_multiline() {
        assert!(title_art().lines().count() > 1);
    }
}
