//! Value contracts
//!
//! [`ParsableFromString`] is the canonical text contract: `Display` renders a
//! value with invariant formatting and `parse_invariant` constructs it back.
//! Types without this contract cannot be stored in text-only backends.

use std::fmt::Display;

/// Construct-from-string contract with invariant formatting
pub trait ParsableFromString: Display + Sized {
    /// Parse a value previously rendered with `Display`
    fn parse_invariant(text: &str) -> std::result::Result<Self, String>;
}

/// Implement [`ParsableFromString`] through the type's `FromStr`
#[macro_export]
macro_rules! parsable_via_from_str {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::value::ParsableFromString for $ty {
                fn parse_invariant(text: &str) -> ::std::result::Result<Self, String> {
                    <$ty as ::std::str::FromStr>::from_str(text).map_err(|e| e.to_string())
                }
            }
        )*
    };
}

parsable_via_from_str!(
    bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
);

impl ParsableFromString for String {
    fn parse_invariant(text: &str) -> std::result::Result<Self, String> {
        Ok(text.to_string())
    }
}
