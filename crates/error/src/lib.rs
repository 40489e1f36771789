//! Error declaration macro shared by the PageWalk crates.
//!
//! Every error enum carries a one-byte subsystem id and a one-byte code per
//! variant. The full code `(subsystem << 8) | code` is stable and is what shows
//! up in log lines and in the trace tool's output.
//!
//! ## Usage
//!
//! ```ignore
//! define_error! {
//!     pub enum MmuError(0x01) {
//!         AllocationFailed = 0x01 => "Page table allocation failed",
//!         PpnOutOfRange = 0x03 => "Physical page number does not fit a PTE",
//!     }
//! }
//! ```
//!
//! Variants may wrap an inner error, which is appended to the display text:
//!
//! ```ignore
//! define_error! {
//!     pub enum ReplayError(0x02) {
//!         Engine(MmuError) = 0x01 => "Page table update failed",
//!     }
//! }
//! ```

#![no_std]

/// Declare an error enum with per-variant codes and descriptions.
///
/// Generates `SUBSYSTEM`, `code()`, `local_code()`, `name()`, a `Display`
/// impl of the form `E{code:04X}: {desc}` and `core::error::Error`.
#[macro_export]
macro_rules! define_error {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident($subsystem:literal) {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident $(($inner:ty))? = $code:literal => $desc:literal
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant $(($inner))?,
            )*
        }

        impl $name {
            /// Subsystem identifier, the high byte of every code.
            pub const SUBSYSTEM: u8 = $subsystem;

            /// Full numeric code: subsystem in the high byte.
            pub const fn code(&self) -> u16 {
                ((Self::SUBSYSTEM as u16) << 8) | self.local_code() as u16
            }

            /// Variant code without the subsystem byte.
            pub const fn local_code(&self) -> u8 {
                match self {
                    $(
                        $crate::define_error!(@pattern $variant $(($inner))? _unused) => $code,
                    )*
                }
            }

            /// Static description of the variant.
            pub const fn name(&self) -> &'static str {
                match self {
                    $(
                        $crate::define_error!(@pattern $variant $(($inner))? _unused) => $desc,
                    )*
                }
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                match self {
                    $(
                        $crate::define_error!(@pattern $variant $(($inner))? inner) => {
                            $crate::define_error!(@display self f $desc $(($inner))? inner)
                        }
                    )*
                }
            }
        }

        impl core::error::Error for $name {}
    };

    (@pattern $variant:ident ($inner:ty) $bind:ident) => { Self::$variant($bind) };
    (@pattern $variant:ident $bind:ident) => { Self::$variant };

    (@display $self:ident $f:ident $desc:literal ($inner:ty) $bind:ident) => {
        write!($f, "E{:04X}: {} ({})", $self.code(), $desc, $bind)
    };
    (@display $self:ident $f:ident $desc:literal $bind:ident) => {
        write!($f, "E{:04X}: {}", $self.code(), $desc)
    };
}
