use std::{fmt::Display, fs, io::{self, Read, Write}, path::Path};

/// Longest result line printed before it is cut short.
pub const MAX_LINE: usize = 75;

/// Prompt until `parser` accepts a line of stdin.
pub fn ask_for_with_parser<T, E: Display>(msg: &str, failmsg: &str, mut parser: impl FnMut(&str) -> Result<T, E>) -> io::Result<T> {
    loop {
        let line = input_msg(msg)?;
        if line.is_empty() {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "no more input"));
        }
        match parser(line.trim()) {
            Ok(val) => return Ok(val),
            Err(err) => {
                println!("{failmsg}: {err}");
                continue;
            }
        }
    }
}

pub fn input_msg(message: &str) -> io::Result<String> {
    print!("{message}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line)
}

/// Read a whole input file, or stdin when no path is given.
pub fn read_source(path: Option<&Path>) -> io::Result<String> {
    match path {
        Some(path) => fs::read_to_string(path),
        None => {
            let mut src = String::new();
            io::stdin().read_to_string(&mut src)?;
            Ok(src)
        }
    }
}

/// Shorten `text` to at most `max` characters, ending in `...` when cut.
pub fn trim_length(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut trimmed = text.chars().take(max.saturating_sub(3)).collect::<String>();
    trimmed.push_str("...");
    trimmed
}

pub fn initial_state_arrow_num(initial_state_name: &impl Display, num: usize) -> String {
    format!(
        "invis{num} [label = \"\", shape = none, height = 0, width = 0]\n\
        invis{num} -> \"{initial_state_name}\"\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn trimming() {
        assert_eq!(trim_length("short", MAX_LINE), "short");
        assert_eq!(trim_length("abcdefgh", 6), "abc...");
        assert_eq!(trim_length("abcdef", 6), "abcdef");
    }

    #[test]
    fn arrow() {
        assert_eq!(
            initial_state_arrow_num(&3, 1),
            "invis1 [label = \"\", shape = none, height = 0, width = 0]\ninvis1 -> \"3\"\n"
        );
    }
}
