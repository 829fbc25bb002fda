//! Per-line matcher for `l = [t1 t2 … tk]` list dumps.

use crate::stats::permutation::Permutation;

const DUMP_OPEN: &str = "l = [";
const DUMP_CLOSE: char = ']';

/// Classification of one transcript line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DumpLine {
    /// A dump with exactly the expected number of tokens.
    Observation(Permutation),
    /// A dump with a different token count, e.g. a truncated `... ]` dump.
    Malformed { tokens: usize },
    /// Anything else: echoed commands, prompts, diagnostics.
    Other,
}

/// Match `line` against the list-dump format with `arity` tokens.
#[must_use]
pub fn match_dump_line(line: &str, arity: usize) -> DumpLine {
    let trimmed = line.trim();
    let Some(body) = trimmed
        .strip_prefix(DUMP_OPEN)
        .and_then(|rest| rest.strip_suffix(DUMP_CLOSE))
    else {
        return DumpLine::Other;
    };

    let tokens: Vec<&str> = body.split_whitespace().collect();
    if tokens.len() != arity || tokens.iter().any(|t| t.contains(['[', ']'])) {
        return DumpLine::Malformed {
            tokens: tokens.len(),
        };
    }
    DumpLine::Observation(Permutation::new(
        tokens.into_iter().map(str::to_owned).collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observed(line: &str, arity: usize) -> Option<String> {
        match match_dump_line(line, arity) {
            DumpLine::Observation(p) => Some(p.canonical()),
            _ => None,
        }
    }

    #[test]
    fn matches_well_formed_dump() {
        assert_eq!(observed("l = [3 1 4 2]", 4).as_deref(), Some("3142"));
        assert_eq!(observed("  l = [3 1 4 2]\r", 4).as_deref(), Some("3142"));
        assert_eq!(observed("l = [10 20]", 2).as_deref(), Some("10 20"));
    }

    #[test]
    fn collapses_repeated_whitespace() {
        assert_eq!(observed("l = [3  1\t4 2]", 4).as_deref(), Some("3142"));
    }

    #[test]
    fn wrong_arity_is_malformed() {
        assert_eq!(
            match_dump_line("l = [1 2 3]", 4),
            DumpLine::Malformed { tokens: 3 }
        );
        assert_eq!(
            match_dump_line("l = [1 2 3 4 ... ]", 4),
            DumpLine::Malformed { tokens: 5 }
        );
        assert_eq!(match_dump_line("l = []", 4), DumpLine::Malformed { tokens: 0 });
    }

    #[test]
    fn non_dump_lines_are_other() {
        for line in [
            "",
            "cmd> shuffle",
            "l = NULL",
            "1 2 3 4",
            "ERROR:  Queue is not doubly circular",
            "l = [1 2 3 4",
            "Freeing queue",
        ] {
            assert_eq!(match_dump_line(line, 4), DumpLine::Other, "line {line:?}");
        }
    }
}
