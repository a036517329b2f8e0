//! Structural repair of truncated tool-call arguments.
//!
//! Only truncation at a single point is handled: the payload is assumed to be
//! a valid JSON prefix. Unterminated strings are closed, open containers are
//! closed in nesting order, and the result is accepted only if it parses.

/// Bracket bookkeeping for a JSON prefix.
#[derive(Debug, Default)]
struct Scan {
    /// Closers still owed, innermost last.
    owed: Vec<char>,
    in_string: bool,
    /// Last character inside an open string was a lone backslash.
    dangling_escape: bool,
    /// A closer did not match its opener.
    mismatched: bool,
}

impl Scan {
    fn of(text: &str) -> Self {
        let mut scan = Scan::default();
        for c in text.chars() {
            if scan.in_string {
                if scan.dangling_escape {
                    scan.dangling_escape = false;
                } else if c == '\\' {
                    scan.dangling_escape = true;
                } else if c == '"' {
                    scan.in_string = false;
                }
                continue;
            }
            match c {
                '"' => scan.in_string = true,
                '{' => scan.owed.push('}'),
                '[' => scan.owed.push(']'),
                '}' | ']' => {
                    if scan.owed.pop() != Some(c) {
                        scan.mismatched = true;
                    }
                }
                _ => {}
            }
        }
        scan
    }
}

/// Try to turn a truncated JSON payload into a parseable one.
///
/// Returns the repaired text, or `None` when no closing suffix makes it valid.
/// A payload that already parses comes back unchanged apart from surrounding
/// whitespace.
pub fn repair(partial: &str) -> Option<String> {
    let mut fixed = partial.trim().to_string();
    if fixed.is_empty() {
        return None;
    }

    let mut scan = Scan::of(&fixed);
    if scan.mismatched {
        return None;
    }

    if scan.in_string {
        if scan.dangling_escape {
            fixed.pop();
        }
        fixed.push('"');
    } else {
        let kept = fixed
            .trim_end_matches(|c: char| c == ',' || c.is_whitespace())
            .len();
        fixed.truncate(kept);
    }

    while let Some(closer) = scan.owed.pop() {
        fixed.push(closer);
    }

    match serde_json::from_str::<serde_json::Value>(&fixed) {
        Ok(_) => Some(fixed),
        Err(_) => None,
    }
}
