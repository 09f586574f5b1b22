//! Segment matchers of a compiled pattern

use super::context::ExecContext;

/// How a variable decides where its value ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Extract {
    /// Up to the first occurrence of the following constant
    Until(String),

    /// Up to a constant that closes the template, anchored at end of input
    Suffix(String),

    /// Everything that is left
    ToEnd,
}

impl Extract {
    /// Length of the extracted value, `None` when nothing can be taken
    fn extract(&self, input: &str) -> Option<usize> {
        match self {
            Extract::ToEnd => (!input.is_empty()).then_some(input.len()),
            Extract::Suffix(suffix) => {
                let len = input.len().checked_sub(suffix.len())?;
                (len > 0 && input.ends_with(suffix.as_str())).then_some(len)
            }
            Extract::Until(delimiter) => input
                .match_indices(delimiter.as_str())
                .map(|(pos, _)| pos)
                .find(|&pos| pos >= 1 && pos + delimiter.len() < input.len()),
        }
    }
}

/// One segment of a compiled pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Matcher {
    /// Literal text, never empty
    Const(String),

    /// First occurrence of a variable
    Var { name: String, extract: Extract },

    /// Later occurrence of an already bound variable
    Ref(String),
}

impl Matcher {
    /// Consume the head of `input`, returning the number of bytes taken
    ///
    /// A successful match always consumes at least one byte.
    pub(crate) fn consume(&self, input: &str, ctx: &mut ExecContext) -> Option<usize> {
        match self {
            Matcher::Const(text) => input.starts_with(text.as_str()).then_some(text.len()),
            Matcher::Var { name, extract } => {
                let len = extract.extract(input)?;
                ctx.set(name.as_str(), &input[..len]);
                Some(len)
            }
            Matcher::Ref(name) => {
                let bound = ctx.get(name)?;
                (!bound.is_empty() && input.starts_with(bound)).then_some(bound.len())
            }
        }
    }

    /// Variable name, if this segment is one
    pub(crate) fn var_name(&self) -> Option<&str> {
        match self {
            Matcher::Const(_) => None,
            Matcher::Var { name, .. } | Matcher::Ref(name) => Some(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_const_matcher() {
        let mut ctx = ExecContext::new();
        let m = Matcher::Const("user_".into());
        assert_eq!(m.consume("user_42", &mut ctx), Some(5));
        assert_eq!(m.consume("post_42", &mut ctx), None);
    }

    #[test]
    fn test_until_requires_text_on_both_sides() {
        let until = Extract::Until("$".into());
        assert_eq!(until.extract("val1$val2"), Some(4));
        assert_eq!(until.extract("$val2"), None);
        assert_eq!(until.extract("val1$"), None);
        assert_eq!(until.extract("a$b$c"), Some(1));
    }

    #[test]
    fn test_suffix_anchors_at_end() {
        let suffix = Extract::Suffix(".json".into());
        assert_eq!(suffix.extract("a.json.json"), Some(6));
        assert_eq!(suffix.extract(".json"), None);
        assert_eq!(suffix.extract("42.txt"), None);
    }

    #[test]
    fn test_var_binds_value() {
        let mut ctx = ExecContext::new();
        let m = Matcher::Var {
            name: "id".into(),
            extract: Extract::ToEnd,
        };
        assert_eq!(m.consume("42", &mut ctx), Some(2));
        assert_eq!(ctx.get("id"), Some("42"));
        assert_eq!(m.consume("", &mut ctx), None);
    }

    #[test]
    fn test_ref_requires_same_value() {
        let mut ctx = ExecContext::new();
        ctx.set("id", "7");
        let m = Matcher::Ref("id".into());
        assert_eq!(m.consume("7/x", &mut ctx), Some(1));
        assert_eq!(m.consume("8/x", &mut ctx), None);
    }
}
