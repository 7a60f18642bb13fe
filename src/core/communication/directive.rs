use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;

/// In-band instruction carried by a `#`-prefixed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// Hold the queue without transmitting
    Pause(Duration),
    /// Open the transport
    Connect,
    /// Close the transport
    Close,
}

fn directive_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^#(\w+)(?: (\w+)(?:,(\w+)?)?)?").expect("directive pattern is valid")
    })
}

/// Parse `#<name>[ <arg1>[,<arg2>]]`. Unknown or malformed directives yield `None`.
pub fn parse(command: &str) -> Option<Directive> {
    let captures = directive_pattern().captures(command)?;
    let name = captures.get(1)?.as_str().to_ascii_lowercase();
    match name.as_str() {
        "pause" => {
            let ms = captures.get(2).map(|m| leading_integer(m.as_str())).unwrap_or(0);
            Some(Directive::Pause(Duration::from_millis(ms)))
        }
        "connect" => Some(Directive::Connect),
        "close" => Some(Directive::Close),
        _ => None,
    }
}

/// Integer prefix of `arg`; `"500ms"` is 500 and anything without leading digits is 0.
fn leading_integer(arg: &str) -> u64 {
    let digits: String = arg.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pause() {
        assert_eq!(parse("#pause 500"), Some(Directive::Pause(Duration::from_millis(500))));
        assert_eq!(parse("#PAUSE 20"), Some(Directive::Pause(Duration::from_millis(20))));
        assert_eq!(parse("#pause 250ms"), Some(Directive::Pause(Duration::from_millis(250))));
    }

    #[test]
    fn test_pause_without_number_is_zero() {
        assert_eq!(parse("#pause"), Some(Directive::Pause(Duration::ZERO)));
        assert_eq!(parse("#pause soon"), Some(Directive::Pause(Duration::ZERO)));
    }

    #[test]
    fn test_connect_and_close() {
        assert_eq!(parse("#connect"), Some(Directive::Connect));
        assert_eq!(parse("#Close"), Some(Directive::Close));
        assert_eq!(parse("#close now,please"), Some(Directive::Close));
    }

    #[test]
    fn test_unknown_or_malformed() {
        assert_eq!(parse("#reboot"), None);
        assert_eq!(parse("# pause 10"), None);
        assert_eq!(parse("#"), None);
        assert_eq!(parse("pause 10"), None);
    }
}
