//! Path vocabulary: literal segments and typed parameters.
//!
//! A [`Segment`] matches structure without capturing anything. A
//! [`Param`] captures one typed value, either from a single path component
//! or from all remaining components at once.

use crate::codec::{Codec, SeqCodec};

/// A path element that captures nothing.
#[derive(Debug, Clone)]
pub enum Segment {
    /// Matches exactly this component.
    Literal(String),
    /// Matches all remaining components and discards them. Closes the path.
    Rest,
}

impl Segment {
    /// Literal segment from anything string-like.
    pub fn literal(value: impl Into<String>) -> Self {
        Segment::Literal(value.into())
    }
}

pub(crate) enum ParamKind<A> {
    /// Consumes exactly one component.
    One(Codec<A>),
    /// Consumes all remaining components. Closes the path.
    All(SeqCodec<A>),
}

/// A named, typed capture of path components.
///
/// The name never affects matching; it only labels the capture in
/// `describe` output and no-match diagnostics.
pub struct Param<A> {
    name: &'static str,
    pub(crate) kind: ParamKind<A>,
}

impl<A: 'static> Param<A> {
    /// Captures one component through `codec`.
    pub fn one(name: &'static str, codec: Codec<A>) -> Self {
        Self { name, kind: ParamKind::One(codec) }
    }

    /// Captures every remaining component through `codec`.
    ///
    /// An all-param closes the path, so it is only valid as the final
    /// element.
    pub fn all(name: &'static str, codec: SeqCodec<A>) -> Self {
        Self { name, kind: ParamKind::All(codec) }
    }

    /// The debug label this capture was declared with.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) fn expected(&self) -> &str {
        match &self.kind {
            ParamKind::One(codec) => codec.expected(),
            ParamKind::All(codec) => codec.expected(),
        }
    }
}

impl Param<i64> {
    /// One component parsed as `i64`.
    pub fn int(name: &'static str) -> Self {
        Self::one(name, Codec::int())
    }
}

impl Param<String> {
    /// One component taken verbatim.
    pub fn string(name: &'static str) -> Self {
        Self::one(name, Codec::string())
    }
}

impl Param<bool> {
    /// One component parsed as `true` or `false`.
    pub fn boolean(name: &'static str) -> Self {
        Self::one(name, Codec::boolean())
    }
}

impl Param<Vec<String>> {
    /// All remaining components, verbatim.
    pub fn strings(name: &'static str) -> Self {
        Self::all(name, SeqCodec::strings())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_captures_keep_their_label() {
        assert_eq!(Param::int("user_id").name(), "user_id");
        assert_eq!(Param::strings("rest").name(), "rest");
    }

    #[test]
    fn expected_comes_from_the_codec() {
        assert_eq!(Param::int("id").expected(), "an integer");
        let custom = Param::one("slug", Codec::<String>::of("a slug"));
        assert_eq!(custom.expected(), "a slug");
    }
}
