//! Macro for implementing string conversions on small label enums
//!
//! Granularities, directory operations and identity providers are persisted
//! as lowercase text columns. This macro keeps their `as_str`, `Display` and
//! `FromStr` implementations in one place.
//!
//! # Example
//!
//! ```rust
//! use communaute_domain::impl_label_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Period {
//!     Day,
//!     Month,
//! }
//!
//! impl_label_conversions!(Period {
//!     Day => "day",
//!     Month => "month",
//! });
//!
//! assert_eq!(Period::Month.as_str(), "month");
//! assert_eq!("DAY".parse::<Period>(), Ok(Period::Day));
//! ```

/// Implements `as_str`, `Display` and `FromStr` for label enums
///
/// Parsing is case-insensitive; output is always the declared label.
#[macro_export]
macro_rules! impl_label_conversions {
    ($enum_name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        impl $enum_name {
            /// Canonical lowercase label.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($label => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
