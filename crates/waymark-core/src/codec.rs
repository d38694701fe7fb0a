//! Invertible codecs between raw URI text and typed values.
//!
//! A [`Codec`] pairs a decode function with its inverse encode function so
//! the same value can be pulled out of an incoming URI and rendered back
//! into an outgoing one. [`SeqCodec`] does the same for positions that carry
//! many raw values at once, such as a repeated query parameter or the tail
//! of a path.
//!
//! Codecs are cheap to clone and are shared freely between the decode and
//! encode closures a matcher builds, so both directions always agree.
//!
//! ```rust,ignore
//! let level = Codec::of::<u8>("a level between 0 and 99")
//!     .imap(Level, |l: &Level| l.0);
//! ```

use std::fmt::Display;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

/// A single raw value failed to decode.
///
/// `expected` is the human description the codec was built with and shows up
/// verbatim in no-match diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected {expected}, got `{raw}`")]
pub struct DecodeError {
    /// The raw text that was rejected.
    pub raw: String,
    /// Description of what the codec accepts.
    pub expected: String,
}

/// A sequence of raw values failed to decode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("expected {expected}, got {raw:?}")]
pub struct SeqDecodeError {
    /// The raw values that were rejected.
    pub raw: Vec<String>,
    /// Description of what the codec accepts.
    pub expected: String,
}

type DecodeFn<A> = Arc<dyn Fn(&str) -> Option<A> + Send + Sync>;
type EncodeFn<A> = Arc<dyn Fn(&A) -> String + Send + Sync>;

/// An invertible codec between one raw string and a value of type `A`.
///
/// Decoding is total over failure: a codec rejects input by returning
/// `None` from its decode function, and the surrounding matcher turns that
/// into a no-match with the codec's `expected` description. Encoding never
/// fails; values of `A` always have a canonical rendering.
pub struct Codec<A> {
    expected: String,
    decode: DecodeFn<A>,
    encode: EncodeFn<A>,
}

impl<A> Clone for Codec<A> {
    fn clone(&self) -> Self {
        Self {
            expected: self.expected.clone(),
            decode: self.decode.clone(),
            encode: self.encode.clone(),
        }
    }
}

impl<A> std::fmt::Debug for Codec<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Codec").field("expected", &self.expected).finish()
    }
}

impl<A: 'static> Codec<A> {
    /// Builds a codec from a decode function and its inverse.
    ///
    /// `expected` describes accepted input and is quoted in diagnostics,
    /// so phrase it like "an integer" or "a lowercase slug".
    pub fn new<D, E>(expected: impl Into<String>, decode: D, encode: E) -> Self
    where
        D: Fn(&str) -> Option<A> + Send + Sync + 'static,
        E: Fn(&A) -> String + Send + Sync + 'static,
    {
        Self {
            expected: expected.into(),
            decode: Arc::new(decode),
            encode: Arc::new(encode),
        }
    }

    /// Codec for any type that round-trips through [`FromStr`] and
    /// [`Display`].
    pub fn of(expected: impl Into<String>) -> Self
    where
        A: FromStr + Display,
    {
        Self::new(expected, |raw| raw.parse().ok(), |value| value.to_string())
    }

    /// Decodes one raw value, reporting the codec's `expected` description
    /// on failure.
    pub fn decode(&self, raw: &str) -> Result<A, DecodeError> {
        (self.decode)(raw).ok_or_else(|| DecodeError {
            raw: raw.to_owned(),
            expected: self.expected.clone(),
        })
    }

    /// Renders a value back to its raw form.
    pub fn encode(&self, value: &A) -> String {
        (self.encode)(value)
    }

    /// The description of accepted input.
    pub fn expected(&self) -> &str {
        &self.expected
    }

    /// Maps both directions through a lossless conversion.
    ///
    /// No validation is added: `forward` must accept every value the
    /// underlying codec produces, and `backward` must invert it.
    pub fn imap<B, F, G>(self, forward: F, backward: G) -> Codec<B>
    where
        B: 'static,
        F: Fn(A) -> B + Send + Sync + 'static,
        G: Fn(&B) -> A + Send + Sync + 'static,
    {
        let decode = self.decode;
        let encode = self.encode;
        Codec {
            expected: self.expected,
            decode: Arc::new(move |raw| decode(raw).map(&forward)),
            encode: Arc::new(move |value| encode(&backward(value))),
        }
    }

    /// Codec for values joined into one raw string by `separator`.
    ///
    /// The empty string decodes to the empty list, matching what the
    /// encoder produces for it.
    pub fn separated(inner: Codec<A>, separator: impl Into<String>) -> Codec<Vec<A>> {
        let separator = separator.into();
        let expected = format!("{} separated by `{separator}`", inner.expected);
        let dec_inner = inner.clone();
        let enc_inner = inner;
        let dec_sep = separator.clone();
        Codec::new(
            expected,
            move |raw: &str| {
                if raw.is_empty() {
                    return Some(Vec::new());
                }
                raw.split(dec_sep.as_str())
                    .map(|piece| (dec_inner.decode)(piece))
                    .collect()
            },
            move |values: &Vec<A>| {
                values
                    .iter()
                    .map(|v| (enc_inner.encode)(v))
                    .collect::<Vec<_>>()
                    .join(&separator)
            },
        )
    }
}

impl Codec<i64> {
    /// Codec for signed 64-bit integers.
    pub fn int() -> Self {
        Self::of("an integer")
    }
}

impl Codec<String> {
    /// The identity codec.
    pub fn string() -> Self {
        Self::new("a string", |raw| Some(raw.to_owned()), Clone::clone)
    }
}

impl Codec<bool> {
    /// Codec accepting `true` and `false`.
    pub fn boolean() -> Self {
        Self::of("`true` or `false`")
    }
}

type SeqDecodeFn<A> = Arc<dyn Fn(&[String]) -> Option<A> + Send + Sync>;
type SeqEncodeFn<A> = Arc<dyn Fn(&A) -> Vec<String> + Send + Sync>;

/// An invertible codec between many raw strings and a value of type `A`.
///
/// Used where one logical position carries several raw values: a repeated
/// query parameter (`?tag=a&tag=b`) or the remaining segments of a path.
pub struct SeqCodec<A> {
    expected: String,
    decode: SeqDecodeFn<A>,
    encode: SeqEncodeFn<A>,
}

impl<A> Clone for SeqCodec<A> {
    fn clone(&self) -> Self {
        Self {
            expected: self.expected.clone(),
            decode: self.decode.clone(),
            encode: self.encode.clone(),
        }
    }
}

impl<A> std::fmt::Debug for SeqCodec<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeqCodec").field("expected", &self.expected).finish()
    }
}

impl<A: 'static> SeqCodec<A> {
    /// Builds a sequence codec from a decode function and its inverse.
    pub fn new<D, E>(expected: impl Into<String>, decode: D, encode: E) -> Self
    where
        D: Fn(&[String]) -> Option<A> + Send + Sync + 'static,
        E: Fn(&A) -> Vec<String> + Send + Sync + 'static,
    {
        Self {
            expected: expected.into(),
            decode: Arc::new(decode),
            encode: Arc::new(encode),
        }
    }

    /// Decodes a slice of raw values.
    pub fn decode(&self, raw: &[String]) -> Result<A, SeqDecodeError> {
        (self.decode)(raw).ok_or_else(|| SeqDecodeError {
            raw: raw.to_vec(),
            expected: self.expected.clone(),
        })
    }

    /// Renders a value back to its raw values.
    pub fn encode(&self, value: &A) -> Vec<String> {
        (self.encode)(value)
    }

    /// The description of accepted input.
    pub fn expected(&self) -> &str {
        &self.expected
    }

    /// Maps both directions through a lossless conversion.
    pub fn imap<B, F, G>(self, forward: F, backward: G) -> SeqCodec<B>
    where
        B: 'static,
        F: Fn(A) -> B + Send + Sync + 'static,
        G: Fn(&B) -> A + Send + Sync + 'static,
    {
        let decode = self.decode;
        let encode = self.encode;
        SeqCodec {
            expected: self.expected,
            decode: Arc::new(move |raw| decode(raw).map(&forward)),
            encode: Arc::new(move |value| encode(&backward(value))),
        }
    }

    /// Applies `codec` to every raw value; fails if any single value fails.
    pub fn each(codec: Codec<A>) -> SeqCodec<Vec<A>> {
        let expected = format!("each {}", codec.expected);
        let dec = codec.clone();
        let enc = codec;
        SeqCodec::new(
            expected,
            move |raw: &[String]| raw.iter().map(|v| (dec.decode)(v)).collect(),
            move |values: &Vec<A>| values.iter().map(|v| (enc.encode)(v)).collect(),
        )
    }
}

impl SeqCodec<Vec<String>> {
    /// The identity sequence codec.
    pub fn strings() -> Self {
        Self::new("strings", |raw: &[String]| Some(raw.to_vec()), Clone::clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn int_decodes_and_rejects() {
        let codec = Codec::int();
        assert_eq!(codec.decode("42"), Ok(42));
        assert_eq!(codec.decode("-7"), Ok(-7));
        let err = codec.decode("forty-two").unwrap_err();
        assert_eq!(err.expected, "an integer");
        assert_eq!(err.raw, "forty-two");
    }

    #[test]
    fn imap_adds_no_validation() {
        #[derive(Debug, PartialEq)]
        struct UserId(i64);
        let codec = Codec::int().imap(UserId, |id: &UserId| id.0);
        assert_eq!(codec.decode("9"), Ok(UserId(9)));
        assert_eq!(codec.encode(&UserId(9)), "9");
        assert!(codec.decode("x").is_err());
    }

    #[test]
    fn separated_splits_and_joins() {
        let codec = Codec::separated(Codec::int(), ",");
        assert_eq!(codec.decode("1,2,3"), Ok(vec![1, 2, 3]));
        assert_eq!(codec.encode(&vec![1, 2, 3]), "1,2,3");
        assert_eq!(codec.decode(""), Ok(vec![]));
        assert_eq!(codec.encode(&vec![]), "");
        assert!(codec.decode("1,x,3").is_err());
    }

    #[test]
    fn each_fails_on_any_bad_value() {
        let codec = SeqCodec::each(Codec::int());
        let ok = ["1".to_string(), "2".to_string()];
        assert_eq!(codec.decode(&ok), Ok(vec![1, 2]));
        let bad = ["1".to_string(), "nope".to_string()];
        let err = codec.decode(&bad).unwrap_err();
        assert_eq!(err.raw, vec!["1".to_string(), "nope".to_string()]);
    }

    #[test]
    fn seq_strings_is_identity() {
        let codec = SeqCodec::strings();
        let raw = ["a".to_string(), "b".to_string()];
        assert_eq!(codec.decode(&raw), Ok(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(codec.encode(&vec!["a".to_string()]), vec!["a".to_string()]);
    }

    proptest! {
        #[test]
        fn int_round_trips(n: i64) {
            let codec = Codec::int();
            prop_assert_eq!(codec.decode(&codec.encode(&n)), Ok(n));
        }

        #[test]
        fn separated_round_trips(values in proptest::collection::vec(any::<i64>(), 0..8)) {
            let codec = Codec::separated(Codec::int(), ",");
            prop_assert_eq!(codec.decode(&codec.encode(&values)), Ok(values));
        }

        #[test]
        fn string_round_trips(s in "[a-zA-Z0-9 _.-]{0,24}") {
            let codec = Codec::string();
            prop_assert_eq!(codec.decode(&codec.encode(&s)), Ok(s));
        }
    }
}
