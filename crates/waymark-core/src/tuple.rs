//! Flat tuple concatenation.
//!
//! Matchers accumulate their captures positionally: a path that captures an
//! `i64` and a `String` produces `(i64, String)`, and appending a query
//! parameter extends that to `(i64, String, u32)`. [`Combine`] is the glue
//! that concatenates two capture tuples into one flat tuple and splits it
//! back apart for reverse routing.
//!
//! The unit tuple `()` is the identity on both sides, so matchers that
//! capture nothing disappear from the combined record instead of leaving
//! `()` holes in it.
//!
//! Implementations are generated for every left/right arity pair whose
//! combined width is at most eight. Routes that need more captures than
//! that should group related values into a struct via
//! [`Codec::imap`](crate::Codec::imap).

/// Concatenation of two capture tuples into one flat tuple.
///
/// `combine` is used on the decode side (URI to values) and `split` on the
/// encode side (values back to URI), so for every implementation
/// `split(lhs.combine(rhs)) == (lhs, rhs)` must hold.
pub trait Combine<R> {
    /// The concatenated tuple type.
    type Out;

    /// Appends `rhs` after `self`.
    fn combine(self, rhs: R) -> Self::Out;

    /// Splits a combined tuple back into its left and right parts.
    fn split(out: Self::Out) -> (Self, R)
    where
        Self: Sized;
}

macro_rules! impl_combine {
    ( ($($l:ident),*) + ($($r:ident),*) ) => {
        impl<$($l,)* $($r,)*> Combine<($($r,)*)> for ($($l,)*) {
            type Out = ($($l,)* $($r,)*);

            #[inline]
            #[allow(non_snake_case, clippy::unused_unit)]
            fn combine(self, rhs: ($($r,)*)) -> Self::Out {
                let ($($l,)*) = self;
                let ($($r,)*) = rhs;
                ($($l,)* $($r,)*)
            }

            #[inline]
            #[allow(non_snake_case, clippy::unused_unit)]
            fn split(out: Self::Out) -> (Self, ($($r,)*)) {
                let ($($l,)* $($r,)*) = out;
                (($($l,)*), ($($r,)*))
            }
        }
    };
}

impl_combine!(() + ());
impl_combine!(() + (R1));
impl_combine!(() + (R1, R2));
impl_combine!(() + (R1, R2, R3));
impl_combine!(() + (R1, R2, R3, R4));
impl_combine!(() + (R1, R2, R3, R4, R5));
impl_combine!(() + (R1, R2, R3, R4, R5, R6));
impl_combine!(() + (R1, R2, R3, R4, R5, R6, R7));
impl_combine!(() + (R1, R2, R3, R4, R5, R6, R7, R8));

impl_combine!((L1) + ());
impl_combine!((L1) + (R1));
impl_combine!((L1) + (R1, R2));
impl_combine!((L1) + (R1, R2, R3));
impl_combine!((L1) + (R1, R2, R3, R4));
impl_combine!((L1) + (R1, R2, R3, R4, R5));
impl_combine!((L1) + (R1, R2, R3, R4, R5, R6));
impl_combine!((L1) + (R1, R2, R3, R4, R5, R6, R7));

impl_combine!((L1, L2) + ());
impl_combine!((L1, L2) + (R1));
impl_combine!((L1, L2) + (R1, R2));
impl_combine!((L1, L2) + (R1, R2, R3));
impl_combine!((L1, L2) + (R1, R2, R3, R4));
impl_combine!((L1, L2) + (R1, R2, R3, R4, R5));
impl_combine!((L1, L2) + (R1, R2, R3, R4, R5, R6));

impl_combine!((L1, L2, L3) + ());
impl_combine!((L1, L2, L3) + (R1));
impl_combine!((L1, L2, L3) + (R1, R2));
impl_combine!((L1, L2, L3) + (R1, R2, R3));
impl_combine!((L1, L2, L3) + (R1, R2, R3, R4));
impl_combine!((L1, L2, L3) + (R1, R2, R3, R4, R5));

impl_combine!((L1, L2, L3, L4) + ());
impl_combine!((L1, L2, L3, L4) + (R1));
impl_combine!((L1, L2, L3, L4) + (R1, R2));
impl_combine!((L1, L2, L3, L4) + (R1, R2, R3));
impl_combine!((L1, L2, L3, L4) + (R1, R2, R3, R4));

impl_combine!((L1, L2, L3, L4, L5) + ());
impl_combine!((L1, L2, L3, L4, L5) + (R1));
impl_combine!((L1, L2, L3, L4, L5) + (R1, R2));
impl_combine!((L1, L2, L3, L4, L5) + (R1, R2, R3));

impl_combine!((L1, L2, L3, L4, L5, L6) + ());
impl_combine!((L1, L2, L3, L4, L5, L6) + (R1));
impl_combine!((L1, L2, L3, L4, L5, L6) + (R1, R2));

impl_combine!((L1, L2, L3, L4, L5, L6, L7) + ());
impl_combine!((L1, L2, L3, L4, L5, L6, L7) + (R1));

impl_combine!((L1, L2, L3, L4, L5, L6, L7, L8) + ());

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_is_identity_on_both_sides() {
        let left: ((), (i64, String)) = ((), (7, "x".into()));
        assert_eq!(left.0.combine(left.1.clone()), (7, "x".to_string()));
        assert_eq!((7i64, "x".to_string()).combine(()), (7, "x".to_string()));
        let () = ().combine(());
    }

    #[test]
    fn combine_concatenates_in_order() {
        let out = (1u8, 2u16).combine((3u32, 4u64));
        assert_eq!(out, (1, 2, 3, 4));
    }

    #[test]
    fn split_inverts_combine() {
        let lhs = (1i64, "a".to_string());
        let rhs = (true, 2.5f64, 9u8);
        let out = lhs.clone().combine(rhs.clone());
        let (l2, r2) = <(i64, String) as Combine<(bool, f64, u8)>>::split(out);
        assert_eq!(l2, lhs);
        assert_eq!(r2, rhs);
    }

    #[test]
    fn split_unit_sides() {
        let ((), rest) = <() as Combine<(u8,)>>::split((5u8,));
        assert_eq!(rest, (5,));
        let (rest, ()) = <(u8,) as Combine<()>>::split((5u8,));
        assert_eq!(rest, (5,));
    }
}
