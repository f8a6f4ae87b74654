use std::io::{BufRead, Write};

use chaindefs_diff::{ChangeRequest, ChangeResolver, Resolution};
use colored::Colorize;

/// Color a rendered line diff: removals red, additions green.
pub fn colorize_diff(diff: &str) -> String {
    diff.lines()
        .map(|line| match line.chars().next() {
            Some('-') => line.red().to_string(),
            Some('+') => line.green().to_string(),
            _ => line.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Asks an operator about each protected change.
pub struct TerminalResolver<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> TerminalResolver<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, request: &ChangeRequest<'_>) -> std::io::Result<Resolution> {
        writeln!(self.output, "{} {}", "==".bold(), request.key.to_string().bold())?;
        for field in request.fields.iter().filter(|f| f.protected) {
            writeln!(self.output, "  {}: {} -> {}", field.field, field.old.red(), field.new.green())?;
        }
        writeln!(self.output, "{}", colorize_diff(request.diff))?;
        loop {
            write!(self.output, "Accept this change? [y/n] ")?;
            self.output.flush()?;
            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Ok(Resolution::Reject);
            }
            match line.trim().to_ascii_lowercase().as_str() {
                "y" | "yes" => return Ok(Resolution::Accept),
                "n" | "no" => return Ok(Resolution::Reject),
                _ => writeln!(self.output, "Please answer y or n.")?,
            }
        }
    }
}

impl<R: BufRead, W: Write> ChangeResolver for TerminalResolver<R, W> {
    fn resolve(&mut self, request: &ChangeRequest<'_>) -> Resolution {
        self.ask(request).unwrap_or_else(|e| {
            tracing::error!(key = %request.key, error = %e, "prompt failed, rejecting change");
            Resolution::Reject
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chaindefs_types::{DefinitionKey, DefinitionKind, FieldChange};

    fn ask(answers: &str) -> (Resolution, String) {
        let key = DefinitionKey::Network { chain_id: 1 };
        let fields = [FieldChange {
            field: "symbol",
            old: "\"ABC\"".into(),
            new: "\"XYZ\"".into(),
            protected: true,
        }];
        let request = ChangeRequest {
            kind: DefinitionKind::Network,
            key: &key,
            fields: &fields,
            diff: "-  \"symbol\": \"ABC\"\n+  \"symbol\": \"XYZ\"",
        };
        let mut out = Vec::new();
        let resolution = TerminalResolver::new(answers.as_bytes(), &mut out).resolve(&request);
        (resolution, String::from_utf8(out).unwrap())
    }

    #[test]
    fn yes_accepts() {
        assert_eq!(ask("y\n").0, Resolution::Accept);
        assert_eq!(ask("YES\n").0, Resolution::Accept);
    }

    #[test]
    fn no_rejects() {
        assert_eq!(ask("n\n").0, Resolution::Reject);
    }

    #[test]
    fn end_of_input_rejects() {
        assert_eq!(ask("").0, Resolution::Reject);
    }

    #[test]
    fn asks_again_on_garbage() {
        let (resolution, out) = ask("maybe\ny\n");
        assert_eq!(resolution, Resolution::Accept);
        assert!(out.contains("Please answer y or n."));
        assert!(out.contains("network 1"));
    }
}
