//! Bidirectional query-string matchers.
//!
//! A [`Query<Q>`] decodes the query part of a URI into a typed capture
//! tuple `Q` and encodes a `Q` back into query parameters. Parameters are
//! appended with builder calls and accumulate positionally, in declaration
//! order, exactly like path params:
//!
//! ```rust,ignore
//! let paging = Query::new()
//!     .required("page", Codec::int())
//!     .optional("count", Codec::int());
//! // captures (i64, Option<i64>)
//! ```
//!
//! Query strings are order-free and multi-valued, so matching runs against
//! a [`QueryMap`]: every declared parameter looks its name up
//! independently. Decoding stops at the first parameter that fails.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::codec::{Codec, DecodeError, SeqCodec, SeqDecodeError};
use crate::tuple::Combine;

/// Parsed query parameters: name to values, in first-seen value order.
pub type QueryMap = BTreeMap<String, Vec<String>>;

/// Parses a raw query string (without the leading `?`) into a [`QueryMap`].
///
/// `+` and percent-escapes are decoded. An unparseable query string yields
/// the empty map.
pub fn parse_query_string(raw: &str) -> QueryMap {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_str(raw).unwrap_or_default();
    let mut map = QueryMap::new();
    for (name, value) in pairs {
        map.entry(name).or_default().push(value);
    }
    map
}

/// Renders a [`QueryMap`] back into a raw query string without the
/// leading `?`.
pub fn render_query_string(map: &QueryMap) -> String {
    let pairs: Vec<(&str, &str)> = map
        .iter()
        .flat_map(|(name, values)| values.iter().map(move |v| (name.as_str(), v.as_str())))
        .collect();
    serde_urlencoded::to_string(pairs).unwrap_or_default()
}

/// Why a query did not match.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// A required parameter was not present at all.
    #[error("missing query parameter `{name}`")]
    NoParameterWithName { name: &'static str },
    /// A required parameter was present but carried no values.
    #[error("query parameter `{name}` has no value")]
    NoValuesForName { name: &'static str },
    /// A single-valued parameter rejected its value.
    #[error("query parameter `{name}`: {source}")]
    Value {
        name: &'static str,
        source: DecodeError,
    },
    /// A multi-valued parameter rejected its values.
    #[error("query parameter `{name}`: {source}")]
    Values {
        name: &'static str,
        source: SeqDecodeError,
    },
}

#[derive(Debug, Clone)]
enum QueryShape {
    Required { name: &'static str, expected: String },
    Optional { name: &'static str, expected: String },
    All { name: &'static str, expected: String },
    Everything,
}

impl fmt::Display for QueryShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryShape::Required { name, expected } => write!(f, "{name}=<{expected}>"),
            QueryShape::Optional { name, expected } => write!(f, "[{name}=<{expected}>]"),
            QueryShape::All { name, expected } => write!(f, "{name}=<{expected}>*"),
            QueryShape::Everything => f.write_str("*"),
        }
    }
}

type QueryDecodeFn<Q> = Arc<dyn Fn(&QueryMap) -> Result<Q, QueryError> + Send + Sync>;
type QueryEncodeFn<Q> = Arc<dyn Fn(Q, &mut QueryMap) + Send + Sync>;

/// A bidirectional matcher for the query part of a URI, capturing `Q`.
///
/// Like [`Path`](crate::Path), `Q` is always a flat tuple growing by one
/// element per declared parameter.
pub struct Query<Q> {
    shape: Vec<QueryShape>,
    decode: QueryDecodeFn<Q>,
    encode: QueryEncodeFn<Q>,
}

impl<Q> Clone for Query<Q> {
    fn clone(&self) -> Self {
        Self {
            shape: self.shape.clone(),
            decode: self.decode.clone(),
            encode: self.encode.clone(),
        }
    }
}

impl<Q> fmt::Debug for Query<Q> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query").field("describe", &self.describe()).finish()
    }
}

impl Query<()> {
    /// A query matcher with no declared parameters.
    ///
    /// Matches any query string, including none at all; undeclared
    /// parameters are always ignored.
    pub fn new() -> Self {
        Query {
            shape: Vec::new(),
            decode: Arc::new(|_: &QueryMap| Ok(())),
            encode: Arc::new(|(), _: &mut QueryMap| {}),
        }
    }
}

impl Default for Query<()> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Q> Query<Q> {
    /// Human-readable form of the declared parameters, e.g.
    /// `?page=<an integer>&[count=<an integer>]`, or the empty string if
    /// nothing is declared.
    pub fn describe(&self) -> String {
        if self.shape.is_empty() {
            return String::new();
        }
        let rendered: Vec<String> = self.shape.iter().map(QueryShape::to_string).collect();
        format!("?{}", rendered.join("&"))
    }
}

impl<Q: 'static> Query<Q> {
    /// Decodes a parsed query map into this query's captures.
    pub fn extract(&self, map: &QueryMap) -> Option<Q> {
        self.try_extract(map).ok()
    }

    /// Like [`extract`](Self::extract), but reports why matching failed.
    ///
    /// Decoding stops at the first parameter that fails; the error names
    /// that parameter.
    pub fn try_extract(&self, map: &QueryMap) -> Result<Q, QueryError> {
        (self.decode)(map)
    }

    /// Renders captures back into query parameters.
    ///
    /// Optional captures that are `None` and multi-valued captures that
    /// render to nothing are omitted entirely, so the result is canonical.
    pub fn query_to(&self, params: Q) -> QueryMap {
        let mut map = QueryMap::new();
        (self.encode)(params, &mut map);
        map
    }

    /// A parameter that must be present with a decodable first value.
    pub fn required<A>(self, name: &'static str, codec: Codec<A>) -> Query<<Q as Combine<(A,)>>::Out>
    where
        A: 'static,
        Q: Combine<(A,)>,
        <Q as Combine<(A,)>>::Out: 'static,
    {
        let mut shape = self.shape;
        shape.push(QueryShape::Required { name, expected: codec.expected().to_owned() });

        let prev = self.decode;
        let decoder = codec.clone();
        let decode = Arc::new(move |map: &QueryMap| {
            let prefix = prev(map)?;
            let values = map
                .get(name)
                .ok_or(QueryError::NoParameterWithName { name })?;
            let first = values.first().ok_or(QueryError::NoValuesForName { name })?;
            let value = decoder
                .decode(first)
                .map_err(|source| QueryError::Value { name, source })?;
            Ok(prefix.combine((value,)))
        });

        let prev = self.encode;
        let encode = Arc::new(move |params: <Q as Combine<(A,)>>::Out, map: &mut QueryMap| {
            let (prefix, (value,)) = <Q as Combine<(A,)>>::split(params);
            prev(prefix, map);
            map.entry(name.to_owned()).or_default().push(codec.encode(&value));
        });

        Query { shape, decode, encode }
    }

    /// A parameter that may be absent. Absent or empty yields `None`; a
    /// present value that fails to decode still fails the whole match.
    pub fn optional<A>(self, name: &'static str, codec: Codec<A>) -> Query<<Q as Combine<(Option<A>,)>>::Out>
    where
        A: 'static,
        Q: Combine<(Option<A>,)>,
        <Q as Combine<(Option<A>,)>>::Out: 'static,
    {
        let mut shape = self.shape;
        shape.push(QueryShape::Optional { name, expected: codec.expected().to_owned() });

        let prev = self.decode;
        let decoder = codec.clone();
        let decode = Arc::new(move |map: &QueryMap| {
            let prefix = prev(map)?;
            let value = match map.get(name).and_then(|values| values.first()) {
                Some(first) => Some(
                    decoder
                        .decode(first)
                        .map_err(|source| QueryError::Value { name, source })?,
                ),
                None => None,
            };
            Ok(prefix.combine((value,)))
        });

        let prev = self.encode;
        let encode = Arc::new(move |params: <Q as Combine<(Option<A>,)>>::Out, map: &mut QueryMap| {
            let (prefix, (value,)) = <Q as Combine<(Option<A>,)>>::split(params);
            prev(prefix, map);
            if let Some(value) = value {
                map.entry(name.to_owned()).or_default().push(codec.encode(&value));
            }
        });

        Query { shape, decode, encode }
    }

    /// A parameter that collects every value under its name.
    ///
    /// An absent name decodes exactly like a present name with no values,
    /// so `?tag=` never needs to be distinguished from no `tag` at all.
    pub fn all<A>(self, name: &'static str, codec: SeqCodec<A>) -> Query<<Q as Combine<(A,)>>::Out>
    where
        A: 'static,
        Q: Combine<(A,)>,
        <Q as Combine<(A,)>>::Out: 'static,
    {
        let mut shape = self.shape;
        shape.push(QueryShape::All { name, expected: codec.expected().to_owned() });

        let prev = self.decode;
        let decoder = codec.clone();
        let decode = Arc::new(move |map: &QueryMap| {
            let prefix = prev(map)?;
            let values = map.get(name).map(Vec::as_slice).unwrap_or(&[]);
            let value = decoder
                .decode(values)
                .map_err(|source| QueryError::Values { name, source })?;
            Ok(prefix.combine((value,)))
        });

        let prev = self.encode;
        let encode = Arc::new(move |params: <Q as Combine<(A,)>>::Out, map: &mut QueryMap| {
            let (prefix, (value,)) = <Q as Combine<(A,)>>::split(params);
            prev(prefix, map);
            let rendered = codec.encode(&value);
            if !rendered.is_empty() {
                map.entry(name.to_owned()).or_default().extend(rendered);
            }
        });

        Query { shape, decode, encode }
    }

    /// Captures the entire raw query map.
    ///
    /// This is lossy in combination with other parameters: encoding writes
    /// the captured map back verbatim, so round-tripping is only exact
    /// when `everything` is the sole declared parameter.
    pub fn everything(self) -> Query<<Q as Combine<(QueryMap,)>>::Out>
    where
        Q: Combine<(QueryMap,)>,
        <Q as Combine<(QueryMap,)>>::Out: 'static,
    {
        let mut shape = self.shape;
        shape.push(QueryShape::Everything);

        let prev = self.decode;
        let decode = Arc::new(move |map: &QueryMap| {
            let prefix = prev(map)?;
            Ok(prefix.combine((map.clone(),)))
        });

        let prev = self.encode;
        let encode = Arc::new(move |params: <Q as Combine<(QueryMap,)>>::Out, map: &mut QueryMap| {
            let (prefix, (captured,)) = <Q as Combine<(QueryMap,)>>::split(params);
            prev(prefix, map);
            for (name, values) in captured {
                map.entry(name).or_default().extend(values);
            }
        });

        Query { shape, decode, encode }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn map(pairs: &[(&str, &str)]) -> QueryMap {
        let mut out = QueryMap::new();
        for (name, value) in pairs {
            out.entry((*name).to_owned()).or_default().push((*value).to_owned());
        }
        out
    }

    #[test]
    fn parse_splits_decodes_and_groups() {
        let parsed = parse_query_string("a=1&b=x+y&a=3");
        assert_eq!(parsed, map(&[("a", "1"), ("a", "3"), ("b", "x y")]));
        assert_eq!(parse_query_string(""), QueryMap::new());
        assert_eq!(parse_query_string("flag"), map(&[("flag", "")]));
    }

    #[test]
    fn required_needs_a_decodable_value() {
        let query = Query::new().required("page", Codec::int());
        assert_eq!(query.extract(&map(&[("page", "2")])), Some((2,)));
        assert_eq!(query.extract(&map(&[])), None);
        assert_eq!(query.extract(&map(&[("page", "two")])), None);
        match query.try_extract(&map(&[])) {
            Err(QueryError::NoParameterWithName { name }) => assert_eq!(name, "page"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn optional_is_none_when_absent_but_strict_when_present() {
        let query = Query::new().optional("count", Codec::int());
        assert_eq!(query.extract(&map(&[])), Some((None,)));
        assert_eq!(query.extract(&map(&[("count", "5")])), Some((Some(5),)));
        assert_eq!(query.extract(&map(&[("count", "five")])), None);
        assert_eq!(query.extract(&map(&[("other", "5")])), Some((None,)));
    }

    #[test]
    fn an_empty_value_list_fails_required_but_not_optional() {
        let mut raw = QueryMap::new();
        raw.insert("page".to_owned(), vec![]);

        let required = Query::new().required("page", Codec::int());
        match required.try_extract(&raw) {
            Err(QueryError::NoValuesForName { name }) => assert_eq!(name, "page"),
            other => panic!("unexpected result: {other:?}"),
        }

        let optional = Query::new().optional("page", Codec::int());
        assert_eq!(optional.extract(&raw), Some((None,)));
    }

    #[test]
    fn all_collects_every_value_and_absent_means_empty() {
        let query = Query::new().all("tag", SeqCodec::strings());
        assert_eq!(
            query.extract(&map(&[("tag", "a"), ("tag", "b")])),
            Some((vec!["a".to_owned(), "b".to_owned()],))
        );
        assert_eq!(query.extract(&map(&[])), Some((vec![],)));
    }

    #[test]
    fn all_with_typed_codec_fails_on_any_bad_value() {
        let query = Query::new().all("id", SeqCodec::each(Codec::int()));
        assert_eq!(query.extract(&map(&[("id", "1"), ("id", "2")])), Some((vec![1, 2],)));
        assert_eq!(query.extract(&map(&[("id", "1"), ("id", "x")])), None);
    }

    #[test]
    fn everything_captures_the_raw_map() {
        let query = Query::new().everything();
        let raw = map(&[("a", "1"), ("b", "2")]);
        assert_eq!(query.extract(&raw), Some((raw.clone(),)));
        assert_eq!(query.query_to((raw.clone(),)), raw);
    }

    #[test]
    fn parameters_accumulate_in_declaration_order() {
        let query = Query::new()
            .required("page", Codec::int())
            .optional("count", Codec::int());
        let captured = query.extract(&map(&[("count", "10"), ("page", "3")]));
        assert_eq!(captured, Some((3, Some(10))));
    }

    #[test]
    fn decoding_stops_at_the_first_failure() {
        let query = Query::new()
            .required("page", Codec::int())
            .required("count", Codec::int());
        match query.try_extract(&map(&[("count", "10")])) {
            Err(QueryError::NoParameterWithName { name }) => assert_eq!(name, "page"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn encoding_omits_empty_captures() {
        let query = Query::new()
            .optional("count", Codec::int())
            .all("tag", SeqCodec::strings());
        let rendered = query.query_to((None, vec![]));
        assert_eq!(rendered, QueryMap::new());
    }

    #[test]
    fn describe_lists_declared_parameters() {
        let query = Query::new()
            .required("page", Codec::int())
            .optional("count", Codec::int());
        assert_eq!(
            query.describe(),
            "?page=<an integer>&[count=<an integer>]"
        );
        assert_eq!(Query::new().describe(), "");
    }

    proptest! {
        #[test]
        fn required_and_optional_round_trip(page: i64, count: Option<i64>) {
            let query = Query::new()
                .required("page", Codec::int())
                .optional("count", Codec::int());
            let rendered = query.query_to((page, count));
            prop_assert_eq!(query.extract(&rendered), Some((page, count)));
        }

        #[test]
        fn multi_value_round_trips(tags in proptest::collection::vec("[a-z]{0,6}", 0..5)) {
            let query = Query::new().all("tag", SeqCodec::strings());
            let rendered = query.query_to((tags.clone(),));
            prop_assert_eq!(query.extract(&rendered), Some((tags,)));
        }

        #[test]
        fn raw_query_strings_round_trip(pairs in proptest::collection::vec(("[a-z]{1,4}", "[a-z0-9 ]{0,6}"), 0..5)) {
            let mut map = QueryMap::new();
            for (name, value) in pairs {
                map.entry(name).or_default().push(value);
            }
            prop_assert_eq!(parse_query_string(&render_query_string(&map)), map);
        }
    }
}
