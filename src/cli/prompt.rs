//! Interactive prompts on stdin.

use std::io::{self, BufRead, Write};

/// Ask a yes/no question. An empty answer takes `default`, or asks again when there is none.
pub fn confirm(prompt: &str, default: Option<bool>) -> io::Result<bool> {
    confirm_with(prompt, default, &mut io::stdin().lock(), &mut io::stdout())
}

fn confirm_with(
    prompt: &str,
    default: Option<bool>,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> io::Result<bool> {
    let mut line = String::new();
    loop {
        line.clear();
        match default {
            Some(true) => write!(output, "{} (Y/n): ", prompt)?,
            Some(false) | None => write!(output, "{} (y/N): ", prompt)?,
        }
        output.flush()?;

        if input.read_line(&mut line)? == 0 {
            // stdin closed
            return Ok(default.unwrap_or(false));
        }

        match line.trim().to_uppercase().as_str() {
            "Y" | "YES" => return Ok(true),
            "N" | "NO" => return Ok(false),
            "" => {
                if let Some(default) = default {
                    return Ok(default);
                }
            }
            _ => {}
        }
    }
}

/// Ask for the operator's initials until a non-blank answer is given
pub fn initials() -> io::Result<Option<String>> {
    initials_with(&mut io::stdin().lock(), &mut io::stdout())
}

fn initials_with(input: &mut impl BufRead, output: &mut impl Write) -> io::Result<Option<String>> {
    let mut line = String::new();
    loop {
        line.clear();
        write!(output, "Your initials: ")?;
        output.flush()?;

        if input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let answer = line.trim();
        if !answer.is_empty() {
            return Ok(Some(answer.to_uppercase()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_confirm_answers() {
        let mut out = Vec::new();
        assert!(confirm_with("Go?", Some(false), &mut Cursor::new("y\n"), &mut out).unwrap());
        assert!(!confirm_with("Go?", Some(true), &mut Cursor::new("no\n"), &mut out).unwrap());
        assert!(!confirm_with("Go?", Some(false), &mut Cursor::new("\n"), &mut out).unwrap());
        assert!(confirm_with("Go?", None, &mut Cursor::new("maybe\n\nY\n"), &mut out).unwrap());
        assert!(String::from_utf8(out).unwrap().starts_with("Go? (y/N): "));
    }

    #[test]
    fn test_confirm_closed_stdin() {
        let mut out = Vec::new();
        assert!(!confirm_with("Go?", None, &mut Cursor::new(""), &mut out).unwrap());
    }

    #[test]
    fn test_initials_uppercased_and_retried() {
        let mut out = Vec::new();
        let answer = initials_with(&mut Cursor::new("  \n ab \n"), &mut out).unwrap();
        assert_eq!(answer.as_deref(), Some("AB"));
        assert_eq!(initials_with(&mut Cursor::new(""), &mut out).unwrap(), None);
    }
}
