//! Macro for implementing Display and FromStr for wire-coded enums
//!
//! Voucher type, environment and emission type all have a canonical
//! configuration spelling plus a handful of accepted aliases (the Spanish
//! name used by the tax authority's documentation and the raw wire digit).
//! This macro generates both conversions from a single table.
//!
//! # Example
//!
//! ```rust
//! use vouchergate_domain::impl_wire_enum_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Channel {
//!     Online,
//!     Batch,
//! }
//!
//! impl_wire_enum_conversions!(Channel {
//!     Online => "online" | "en-linea",
//!     Batch => "batch" | "lote",
//! });
//!
//! assert_eq!("LOTE".parse::<Channel>().unwrap(), Channel::Batch);
//! assert_eq!(Channel::Online.to_string(), "online");
//! ```

/// Implements Display and FromStr traits for wire-coded enums
///
/// This macro generates:
/// - Display trait: writes the canonical (first) spelling
/// - FromStr trait: parses the canonical spelling or any alias,
///   case-insensitively and ignoring surrounding whitespace
///
/// # Arguments
///
/// * `$enum_name` - The name of the enum type
/// * `$variant => $str | $alias...` - Canonical spelling followed by aliases
#[macro_export]
macro_rules! impl_wire_enum_conversions {
    ($enum_name:ident { $($variant:ident => $str:literal $(| $alias:literal)*),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($str $(| $alias)* => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
