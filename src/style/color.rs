use crossterm::style::Color;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StyleError {
    #[error("unknown colour `{0}`")]
    UnknownColor(String),
    #[error("malformed hex colour `{0}`")]
    BadHex(String),
    #[error("malformed rgb() colour `{0}`")]
    BadRgb(String),
}

/// Parse a colour written as a name, `#rrggbb`, `#rgb`, `rgb(r, g, b)` or a
/// palette index.
pub fn parse_color(text: &str) -> Result<Color, StyleError> {
    let value = text.trim();
    if let Some(hex) = value.strip_prefix('#') {
        return parse_hex(hex).ok_or_else(|| StyleError::BadHex(value.to_string()));
    }

    let lower = value.to_ascii_lowercase();
    if let Some(body) = lower
        .strip_prefix("rgb(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        return parse_rgb(body).ok_or_else(|| StyleError::BadRgb(value.to_string()));
    }

    if let Ok(index) = lower.parse::<u8>() {
        return Ok(Color::AnsiValue(index));
    }

    named(&lower).ok_or_else(|| StyleError::UnknownColor(value.to_string()))
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    match hex.len() {
        6 => Some(Color::Rgb {
            r: u8::from_str_radix(&hex[0..2], 16).ok()?,
            g: u8::from_str_radix(&hex[2..4], 16).ok()?,
            b: u8::from_str_radix(&hex[4..6], 16).ok()?,
        }),
        3 => {
            let digit = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|d| d * 17);
            Some(Color::Rgb {
                r: digit(0)?,
                g: digit(1)?,
                b: digit(2)?,
            })
        }
        _ => None,
    }
}

fn parse_rgb(body: &str) -> Option<Color> {
    let parts: Vec<u8> = body
        .split(',')
        .map(|part| part.trim().parse::<u8>())
        .collect::<Result<_, _>>()
        .ok()?;
    match parts.as_slice() {
        [r, g, b] => Some(Color::Rgb {
            r: *r,
            g: *g,
            b: *b,
        }),
        _ => None,
    }
}

fn named(name: &str) -> Option<Color> {
    let name = name.replace(['-', ' '], "_");
    let color = match name.as_str() {
        "reset" | "default" => Color::Reset,
        "black" => Color::Black,
        "red" => Color::Red,
        "dark_red" => Color::DarkRed,
        "green" => Color::Green,
        "dark_green" => Color::DarkGreen,
        "yellow" => Color::Yellow,
        "dark_yellow" => Color::DarkYellow,
        "blue" => Color::Blue,
        "dark_blue" => Color::DarkBlue,
        "magenta" => Color::Magenta,
        "dark_magenta" => Color::DarkMagenta,
        "cyan" => Color::Cyan,
        "dark_cyan" => Color::DarkCyan,
        "white" => Color::White,
        "grey" | "gray" => Color::Grey,
        "dark_grey" | "dark_gray" => Color::DarkGrey,
        _ => return None,
    };
    Some(color)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_forms() {
        assert_eq!(
            parse_color("#aadb2d"),
            Ok(Color::Rgb {
                r: 0xaa,
                g: 0xdb,
                b: 0x2d
            })
        );
        assert_eq!(
            parse_color("#fff"),
            Ok(Color::Rgb {
                r: 255,
                g: 255,
                b: 255
            })
        );
        assert!(matches!(parse_color("#12345"), Err(StyleError::BadHex(_))));
    }

    #[test]
    fn parses_rgb_function() {
        assert_eq!(
            parse_color("rgb(100, 20, 12)"),
            Ok(Color::Rgb {
                r: 100,
                g: 20,
                b: 12
            })
        );
        assert!(matches!(
            parse_color("rgb(300, 0, 0)"),
            Err(StyleError::BadRgb(_))
        ));
    }

    #[test]
    fn parses_names_and_indices() {
        assert_eq!(parse_color("Dark-Grey"), Ok(Color::DarkGrey));
        assert_eq!(parse_color("202"), Ok(Color::AnsiValue(202)));
        assert!(matches!(
            parse_color("chartreuse"),
            Err(StyleError::UnknownColor(_))
        ));
    }
}
