//! Enums mapping to SMALLINT lookup tables.
//!
//! Each enum variant's discriminant matches the seed data order (1-based)
//! in the corresponding lookup table created by the migrations.

/// Lookup ID type matching SMALLINT in the database.
pub type StatusId = i16;

/// Declare an enum whose discriminants mirror a lookup table.
///
/// Generates `id()`, `from_id()`, `as_str()`, `ALL`, plus `Display` and
/// `FromStr` (case-insensitive on the snake_case name).
macro_rules! define_lookup_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:literal => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Every variant in seed order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Return the database lookup ID.
            pub fn id(self) -> $crate::lookup::StatusId {
                self as $crate::lookup::StatusId
            }

            /// Resolve a database lookup ID, `None` for unknown IDs.
            pub fn from_id(id: $crate::lookup::StatusId) -> Option<Self> {
                match id {
                    $( $val => Some($name::$variant), )+
                    _ => None,
                }
            }

            /// Stable lowercase name used in logs, URLs and JSON.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( $name::$variant => $label, )+
                }
            }
        }

        impl From<$name> for $crate::lookup::StatusId {
            fn from(value: $name) -> Self {
                value as $crate::lookup::StatusId
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::error::CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let lowered = s.trim().to_ascii_lowercase();
                match lowered.as_str() {
                    $( $label => Ok($name::$variant), )+
                    _ => Err($crate::error::CoreError::Configuration(format!(
                        "Unknown {} '{}'. Must be one of: {}",
                        stringify!($name),
                        s,
                        [$($label),+].join(", "),
                    ))),
                }
            }
        }
    };
}
