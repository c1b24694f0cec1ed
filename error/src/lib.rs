//! TEAM_155: Kernel error handling infrastructure.
//!
//! Provides the `define_kernel_error!` macro for consistent error type definitions.
//!
//! ## Usage
//!
//! ### Simple errors (no inner data)
//! ```ignore
//! define_kernel_error! {
//!     pub enum NetError(0x07) {
//!         NotInitialized = 0x01 => "Network device not initialized",
//!         DeviceBusy = 0x02 => "TX queue full",
//!     }
//! }
//! ```
//!
//! ### Nested errors (with inner error type)
//! ```ignore
//! define_kernel_error! {
//!     pub enum SpawnError(0x03) {
//!         Elf(ElfError) = 0x01 => "ELF loading failed",
//!         PageTable(MmuError) = 0x02 => "Page table creation failed",
//!     }
//! }
//! ```

#![no_std]

/// Macro to define a kernel error type with consistent handling.
///
/// Supports both simple variants and nested variants containing inner errors.
#[macro_export]
macro_rules! define_kernel_error {
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
            /// Subsystem identifier for this error type.
            pub const SUBSYSTEM: u8 = $subsystem;

            /// Get numeric error code for debugging.
            pub const fn code(&self) -> u16 {
                match self {
                    $(
                        $crate::define_kernel_error!(@pattern $variant $(($inner))? _unused) => {
                            (($subsystem as u16) << 8) | $code
                        }
                    )*
                }
            }

            /// Get error name for logging.
            pub const fn name(&self) -> &'static str {
                match self {
                    $(
                        $crate::define_kernel_error!(@pattern $variant $(($inner))? _unused) => {
                            $desc
                        }
                    )*
                }
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                match self {
                    $(
                        $crate::define_kernel_error!(@pattern $variant $(($inner))? inner) => {
                            $crate::define_kernel_error!(@display_body self f $desc $(($inner))? inner)
                        }
                    )*
                }
            }
        }

        impl core::error::Error for $name {}
    };

    // Helper to generate patterns
    (@pattern $variant:ident ($inner:ty) $bind:ident) => { Self::$variant($bind) };
    (@pattern $variant:ident $bind:ident) => { Self::$variant };

    // Helper to generate display bodies
    (@display_body $self:ident $f:ident $desc:literal ($inner:ty) $bind:ident) => {
        write!($f, "E{:04X}: {} ({})", $self.code(), $desc, $bind)
    };
    (@display_body $self:ident $f:ident $desc:literal $bind:ident) => {
        write!($f, "E{:04X}: {}", $self.code(), $desc)
    };
}

/// Kernel-internal error kinds, shared across subsystems (§7 of the design).
///
/// Every subsystem error type converges here at the syscall boundary via
/// `KernelError::errno`, which is the only place POSIX errno numbers are
/// produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum KernelError {
    OutOfMemory,
    PermissionDenied,
    InvalidArgument,
    NoSuchProcess,
    NoSuchEntry,
    AlreadyExists,
    NotADirectory,
    NotSupported,
    BrokenPipe,
    TooManyAttaches,
    QueueFull,
    MessageTooLarge,
    WouldBlock,
    FilterLocked,
    SyscallOutOfRange,
    OperationLocked,
    PcrMismatch,
    ResourceLimitExceeded,
    RateLimitExceeded,
    InvalidTime,
    IntervalTooSmall,
    BadFileDescriptor,
    Interrupted,
}

impl KernelError {
    /// Negative-errno encoding used at the syscall boundary.
    pub const fn errno(self) -> i64 {
        match self {
            KernelError::NoSuchEntry => -2,
            KernelError::NoSuchProcess => -3,
            KernelError::Interrupted => -4,
            KernelError::BadFileDescriptor => -9,
            KernelError::OutOfMemory => -12,
            KernelError::PermissionDenied => -13,
            KernelError::InvalidArgument => -22,
            KernelError::AlreadyExists => -17,
            KernelError::NotADirectory => -20,
            KernelError::BrokenPipe => -32,
            KernelError::WouldBlock => -11,
            KernelError::NotSupported => -95,
            KernelError::TooManyAttaches => -24,
            KernelError::QueueFull => -105,
            KernelError::MessageTooLarge => -90,
            KernelError::FilterLocked => -1,
            KernelError::SyscallOutOfRange => -38,
            KernelError::OperationLocked => -1,
            KernelError::PcrMismatch => -1,
            KernelError::ResourceLimitExceeded => -11,
            KernelError::RateLimitExceeded => -11,
            KernelError::InvalidTime => -22,
            KernelError::IntervalTooSmall => -22,
        }
    }
}

impl core::fmt::Display for KernelError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{self:?} (errno {})", self.errno())
    }
}

impl core::error::Error for KernelError {}

/// Convenience alias for fallible kernel-internal operations.
pub type KernelResult<T> = Result<T, KernelError>;

#[cfg(test)]
mod tests {

    define_kernel_error! {
        /// Test error type
        pub enum TestError(0xFF) {
            /// First error
            First = 0x01 => "First error",
            /// Second error
            Second = 0x02 => "Second error",
        }
    }

    define_kernel_error! {
        pub enum NestedTestError(0xFE) {
            Inner(TestError) = 0x01 => "Nested error",
        }
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(TestError::First.code(), 0xFF01);
        assert_eq!(TestError::Second.code(), 0xFF02);
        assert_eq!(NestedTestError::Inner(TestError::First).code(), 0xFE01);
    }

    #[test]
    fn test_error_names() {
        assert_eq!(TestError::First.name(), "First error");
        assert_eq!(TestError::Second.name(), "Second error");
        assert_eq!(
            NestedTestError::Inner(TestError::First).name(),
            "Nested error"
        );
    }

    #[test]
    fn test_display_format() {
        // Simple
        extern crate std;
        use std::format;
        assert_eq!(format!("{}", TestError::First), "EFF01: First error");

        // Nested
        let inner = TestError::First;
        assert_eq!(
            format!("{}", NestedTestError::Inner(inner)),
            "EFE01: Nested error (EFF01: First error)"
        );
    }

    #[test]
    fn test_subsystem_constant() {
        assert_eq!(TestError::SUBSYSTEM, 0xFF);
        assert_eq!(NestedTestError::SUBSYSTEM, 0xFE);
    }

    #[test]
    fn test_derives() {
        // Clone
        let e = TestError::First;
        let e2 = e.clone();
        assert_eq!(e, e2);

        // Copy
        let e3 = e;
        assert_eq!(e, e3);

        // Debug
        extern crate std;
        use std::format;
        let debug_str = format!("{:?}", TestError::First);
        assert!(debug_str.contains("First"));
    }
}
