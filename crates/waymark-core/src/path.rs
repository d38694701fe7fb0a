//! Bidirectional path matchers.
//!
//! A [`Path<P>`] both parses a request path into a typed capture tuple `P`
//! and renders a `P` back into a canonical path string, so a route's links
//! can be generated from the same value that describes its matching.
//!
//! Paths are built left to right with the `/` operator, starting from
//! [`Path::root`]:
//!
//! ```rust,ignore
//! let view = Path::root() / "user" / Param::int("user_id") / "view";
//! assert_eq!(view.extract("/user/37/view"), Some((37,)));
//! assert_eq!(view.path_to((37,)), "/user/37/view");
//! ```
//!
//! Matching is per-component. The raw path is split on `/`, each component
//! is percent-decoded, and the path's elements consume components in order:
//! literals must equal their component, a one-param decodes exactly one
//! component, and an all-param swallows every remaining component. A path
//! matches only if every element succeeds and no components are left over.
//!
//! Appending an all-param or a rest segment closes the path. Appending
//! anything after that is a construction bug and panics immediately.

use std::fmt;
use std::ops::Div;
use std::sync::Arc;

use smallvec::SmallVec;
use thiserror::Error;

use crate::codec::{Codec, DecodeError, SeqCodec, SeqDecodeError};
use crate::param::{Param, ParamKind, Segment};
use crate::tuple::Combine;

/// Why a path did not match.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// A literal element saw a different component.
    #[error("expected `{expected}`, found `{found}`")]
    LiteralMismatch { expected: String, found: String },
    /// The path ran out of components before the elements did.
    #[error("path ended while expecting {expected}")]
    MissingComponent { expected: String },
    /// Components were left over after the last element.
    #[error("{count} unmatched component(s): `{suffix}`")]
    UnmatchedSuffix { count: usize, suffix: String },
    /// A one-param rejected its component.
    #[error(transparent)]
    Component(#[from] DecodeError),
    /// An all-param rejected the remaining components.
    #[error(transparent)]
    Components(#[from] SeqDecodeError),
}

/// Cursor over the percent-decoded components of a request path.
struct Components<'a> {
    parts: &'a [String],
    idx: usize,
}

impl<'a> Components<'a> {
    fn new(parts: &'a [String]) -> Self {
        Self { parts, idx: 0 }
    }

    fn next(&mut self) -> Option<&'a str> {
        let part = self.parts.get(self.idx)?;
        self.idx += 1;
        Some(part)
    }

    fn take_rest(&mut self) -> &'a [String] {
        let rest = &self.parts[self.idx..];
        self.idx = self.parts.len();
        rest
    }

    fn remaining(&self) -> &'a [String] {
        &self.parts[self.idx..]
    }
}

fn split_components(path: &str) -> SmallVec<[String; 8]> {
    let trimmed = path.strip_prefix('/').unwrap_or(path);
    if trimmed.is_empty() {
        return SmallVec::new();
    }
    trimmed.split('/').map(decode_component).collect()
}

/// Percent-decodes one component, leaving it untouched if the encoded bytes
/// are not valid UTF-8.
fn decode_component(raw: &str) -> String {
    match urlencoding::decode(raw) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => raw.to_owned(),
    }
}

fn encode_component(raw: &str) -> String {
    urlencoding::encode(raw).into_owned()
}

#[derive(Debug, Clone)]
enum Shape {
    Literal(String),
    One { name: &'static str },
    All { name: &'static str },
    Rest,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Literal(value) => f.write_str(value),
            Shape::One { name } => write!(f, "{{{name}}}"),
            Shape::All { name } => write!(f, "{{*{name}}}"),
            Shape::Rest => f.write_str("{*_}"),
        }
    }
}

type PathDecodeFn<P> = Arc<dyn Fn(&mut Components<'_>) -> Result<P, PathError> + Send + Sync>;
type PathEncodeFn<P> = Arc<dyn Fn(P, &mut Vec<String>) + Send + Sync>;

/// A bidirectional matcher for the path part of a URI, capturing `P`.
///
/// `P` is always a flat tuple: `()` for a path of pure structure, `(A,)`
/// after one capture, `(A, B)` after two, and so on in declaration order.
pub struct Path<P> {
    shape: Vec<Shape>,
    open: bool,
    decode: PathDecodeFn<P>,
    encode: PathEncodeFn<P>,
}

impl<P> Clone for Path<P> {
    fn clone(&self) -> Self {
        Self {
            shape: self.shape.clone(),
            open: self.open,
            decode: self.decode.clone(),
            encode: self.encode.clone(),
        }
    }
}

impl<P> fmt::Debug for Path<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Path")
            .field("describe", &self.describe())
            .field("open", &self.open)
            .finish()
    }
}

impl Path<()> {
    /// The empty path. Matches only the URI root `/`.
    pub fn root() -> Self {
        Path {
            shape: Vec::new(),
            open: true,
            decode: Arc::new(|_: &mut Components<'_>| Ok(())),
            encode: Arc::new(|(), _: &mut Vec<String>| {}),
        }
    }
}

impl Default for Path<()> {
    fn default() -> Self {
        Self::root()
    }
}

impl<P> Path<P> {
    /// Human-readable form of this path, e.g. `/user/{user_id}/view`.
    pub fn describe(&self) -> String {
        if self.shape.is_empty() {
            return "/".to_owned();
        }
        let mut out = String::new();
        for shape in &self.shape {
            out.push('/');
            out.push_str(&shape.to_string());
        }
        out
    }

    /// Whether further elements may still be appended.
    pub fn is_open(&self) -> bool {
        self.open
    }

    fn assert_open(&self, appending: &str) {
        if !self.open {
            panic!(
                "cannot append {appending} to `{}`: the path is closed by its final element",
                self.describe()
            );
        }
    }
}

impl<P: 'static> Path<P> {
    /// Parses a request path into this path's captures.
    ///
    /// `path` is the path part of a URI only; pass `uri.path()`, not the
    /// full URI.
    pub fn extract(&self, path: &str) -> Option<P> {
        self.try_extract(path).ok()
    }

    /// Like [`extract`](Self::extract), but reports why matching failed.
    pub fn try_extract(&self, path: &str) -> Result<P, PathError> {
        let parts = split_components(path);
        let mut cursor = Components::new(&parts);
        let captured = (self.decode)(&mut cursor)?;
        let leftover = cursor.remaining();
        if leftover.is_empty() {
            Ok(captured)
        } else {
            Err(PathError::UnmatchedSuffix {
                count: leftover.len(),
                suffix: leftover.join("/"),
            })
        }
    }

    /// Renders captures back into a canonical path string.
    ///
    /// Components are percent-encoded, so
    /// `extract(&path_to(p)) == Some(p)` holds for every path without a
    /// rest segment.
    pub fn path_to(&self, params: P) -> String {
        let mut components = Vec::with_capacity(self.shape.len());
        (self.encode)(params, &mut components);
        if components.is_empty() {
            return "/".to_owned();
        }
        let mut out = String::new();
        for component in &components {
            out.push('/');
            out.push_str(&encode_component(component));
        }
        out
    }

    fn push_literal(self, value: String) -> Path<P> {
        self.assert_open("a literal");
        let mut shape = self.shape;
        shape.push(Shape::Literal(value.clone()));

        let prev = self.decode;
        let expected = value.clone();
        let decode = Arc::new(move |cursor: &mut Components<'_>| {
            let prefix = prev(cursor)?;
            match cursor.next() {
                Some(found) if found == expected => Ok(prefix),
                Some(found) => Err(PathError::LiteralMismatch {
                    expected: expected.clone(),
                    found: found.to_owned(),
                }),
                None => Err(PathError::MissingComponent {
                    expected: format!("`{expected}`"),
                }),
            }
        });

        let prev = self.encode;
        let encode = Arc::new(move |params: P, out: &mut Vec<String>| {
            prev(params, out);
            out.push(value.clone());
        });

        Path { shape, open: true, decode, encode }
    }

    fn push_one<A>(self, name: &'static str, codec: Codec<A>) -> Path<<P as Combine<(A,)>>::Out>
    where
        A: 'static,
        P: Combine<(A,)>,
        <P as Combine<(A,)>>::Out: 'static,
    {
        self.assert_open(&format!("param `{name}`"));
        let mut shape = self.shape;
        shape.push(Shape::One { name });

        let prev = self.decode;
        let decoder = codec.clone();
        let decode = Arc::new(move |cursor: &mut Components<'_>| {
            let prefix = prev(cursor)?;
            let raw = cursor.next().ok_or_else(|| PathError::MissingComponent {
                expected: format!("a value for `{name}` ({})", decoder.expected()),
            })?;
            let value = decoder.decode(raw)?;
            Ok(prefix.combine((value,)))
        });

        let prev = self.encode;
        let encode = Arc::new(move |params: <P as Combine<(A,)>>::Out, out: &mut Vec<String>| {
            let (prefix, (value,)) = <P as Combine<(A,)>>::split(params);
            prev(prefix, out);
            out.push(codec.encode(&value));
        });

        Path { shape, open: true, decode, encode }
    }

    fn push_all<A>(self, name: &'static str, codec: SeqCodec<A>) -> Path<<P as Combine<(A,)>>::Out>
    where
        A: 'static,
        P: Combine<(A,)>,
        <P as Combine<(A,)>>::Out: 'static,
    {
        self.assert_open(&format!("param `{name}`"));
        let mut shape = self.shape;
        shape.push(Shape::All { name });

        let prev = self.decode;
        let decoder = codec.clone();
        let decode = Arc::new(move |cursor: &mut Components<'_>| {
            let prefix = prev(cursor)?;
            let value = decoder.decode(cursor.take_rest())?;
            Ok(prefix.combine((value,)))
        });

        let prev = self.encode;
        let encode = Arc::new(move |params: <P as Combine<(A,)>>::Out, out: &mut Vec<String>| {
            let (prefix, (value,)) = <P as Combine<(A,)>>::split(params);
            prev(prefix, out);
            out.extend(codec.encode(&value));
        });

        Path { shape, open: false, decode, encode }
    }

    fn push_rest(self) -> Path<P> {
        self.assert_open("a rest segment");
        let mut shape = self.shape;
        shape.push(Shape::Rest);

        let prev = self.decode;
        let decode = Arc::new(move |cursor: &mut Components<'_>| {
            let prefix = prev(cursor)?;
            cursor.take_rest();
            Ok(prefix)
        });

        // Canonical rendering of "zero or more components" is zero.
        let encode = self.encode;

        Path { shape, open: false, decode, encode }
    }
}

/// Anything that can be appended to a [`Path`] with the `/` operator.
pub trait PathElement<P> {
    /// The capture tuple after appending.
    type Out;

    fn append_to(self, path: Path<P>) -> Path<Self::Out>;
}

impl<'a, P: 'static> PathElement<P> for &'a str {
    type Out = P;

    fn append_to(self, path: Path<P>) -> Path<P> {
        path.push_literal(self.to_owned())
    }
}

impl<P: 'static> PathElement<P> for String {
    type Out = P;

    fn append_to(self, path: Path<P>) -> Path<P> {
        path.push_literal(self)
    }
}

impl<P: 'static> PathElement<P> for Segment {
    type Out = P;

    fn append_to(self, path: Path<P>) -> Path<P> {
        match self {
            Segment::Literal(value) => path.push_literal(value),
            Segment::Rest => path.push_rest(),
        }
    }
}

impl<P, A> PathElement<P> for Param<A>
where
    A: 'static,
    P: Combine<(A,)> + 'static,
    <P as Combine<(A,)>>::Out: 'static,
{
    type Out = <P as Combine<(A,)>>::Out;

    fn append_to(self, path: Path<P>) -> Path<Self::Out> {
        let name = self.name();
        match self.kind {
            ParamKind::One(codec) => path.push_one(name, codec),
            ParamKind::All(codec) => path.push_all(name, codec),
        }
    }
}

impl<P, E> Div<E> for Path<P>
where
    E: PathElement<P>,
{
    type Output = Path<E::Out>;

    fn div(self, rhs: E) -> Self::Output {
        rhs.append_to(self)
    }
}
