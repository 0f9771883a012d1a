//! Artist-name canonicalization for comparison.
//!
//! All similarity scoring and exact-match checks run on normalized names, so
//! "The Beatles (Remastered)" and "the beatles" compare equal-ish instead of
//! being penalized for punctuation and annotations.

/// Normalize a raw artist name.  Deterministic, total, idempotent.
///
/// Transform order matters:
/// 1. lowercase
/// 2. strip `(...)` and `[...]` annotations
/// 3. replace anything that is not alphanumeric, whitespace, hyphen or
///    period with a space
/// 4. collapse whitespace runs to a single space
/// 5. collapse spaces around hyphens (`"ac - dc"` → `"ac-dc"`)
/// 6. trim
pub fn normalize(raw: &str) -> String {
    let lowered = raw.to_lowercase();

    let stripped = strip_annotations(&lowered);

    let cleaned: String = stripped
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() || c == '-' || c == '.' {
                c
            } else {
                ' '
            }
        })
        .collect();

    let mut collapsed = String::with_capacity(cleaned.len());
    let mut prev_space = false;
    for c in cleaned.chars() {
        if c.is_whitespace() {
            if !prev_space {
                collapsed.push(' ');
            }
            prev_space = true;
        } else {
            collapsed.push(c);
            prev_space = false;
        }
    }

    let collapsed = collapsed.replace(" - ", "-").replace("- ", "-").replace(" -", "-");

    collapsed.trim().to_string()
}

/// Remove parenthesized and bracketed annotations, including unterminated
/// ones ("Artist (Live" drops everything from the opener on).
fn strip_annotations(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut depth_paren = 0u32;
    let mut depth_bracket = 0u32;
    for c in s.chars() {
        match c {
            '(' => depth_paren += 1,
            ')' => depth_paren = depth_paren.saturating_sub(1),
            '[' => depth_bracket += 1,
            ']' => depth_bracket = depth_bracket.saturating_sub(1),
            _ if depth_paren == 0 && depth_bracket == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercase_and_trim() {
        assert_eq!(normalize("  The Beatles  "), "the beatles");
    }

    #[test]
    fn test_strips_annotations() {
        assert_eq!(normalize("Nirvana (Live)"), "nirvana");
        assert_eq!(normalize("Miles Davis [Remastered]"), "miles davis");
        assert_eq!(normalize("Foo (bar) Baz"), "foo baz");
    }

    #[test]
    fn test_special_characters_become_spaces() {
        assert_eq!(normalize("Sigur Rós!"), "sigur rós");
        assert_eq!(normalize("Florence + The Machine"), "florence the machine");
    }

    #[test]
    fn test_keeps_hyphen_and_period() {
        assert_eq!(normalize("JAY-Z"), "jay-z");
        assert_eq!(normalize("R.E.M."), "r.e.m.");
    }

    #[test]
    fn test_collapses_spaces_around_hyphens() {
        assert_eq!(normalize("AC - DC"), "ac-dc");
    }

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(normalize("a   b\t c"), "a b c");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("   "), "");
        assert_eq!(normalize("(everything annotated)"), "");
    }

    #[test]
    fn test_idempotent() {
        for name in ["The Beatles", "AC - DC", "Sigur Rós!", "Foo (bar)", ""] {
            let once = normalize(name);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", name);
        }
    }
}
