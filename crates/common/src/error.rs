//! Error plumbing shared by per-crate error types.
//!
//! Each parrot crate defines its own `thiserror` enum with a `Message`
//! variant; `FromMessage` plus [`crate::impl_context!`] give those enums a
//! uniform `.context("...")` extension without pulling `anyhow` into
//! library seams.

/// Construct an error from a plain message string.
pub trait FromMessage {
    fn from_message(message: String) -> Self;
}

/// Generate a `Context` extension trait for the calling crate's
/// `Error`/`Result` pair.
///
/// Expects the calling module to have `Error: FromMessage + Display` and
/// `Result<T> = std::result::Result<T, Error>` in scope.
#[macro_export]
macro_rules! impl_context {
    () => {
        /// Attach context to errors, mirroring `anyhow::Context` for this
        /// crate's error type.
        pub trait Context<T> {
            fn context(self, message: impl Into<String>) -> Result<T>;
            fn with_context<F, S>(self, f: F) -> Result<T>
            where
                F: FnOnce() -> S,
                S: Into<String>;
        }

        impl<T, E: std::fmt::Display> Context<T> for std::result::Result<T, E> {
            fn context(self, message: impl Into<String>) -> Result<T> {
                self.map_err(|e| {
                    $crate::FromMessage::from_message(format!("{}: {e}", message.into()))
                })
            }

            fn with_context<F, S>(self, f: F) -> Result<T>
            where
                F: FnOnce() -> S,
                S: Into<String>,
            {
                self.map_err(|e| {
                    $crate::FromMessage::from_message(format!("{}: {e}", f().into()))
                })
            }
        }

        impl<T> Context<T> for Option<T> {
            fn context(self, message: impl Into<String>) -> Result<T> {
                self.ok_or_else(|| $crate::FromMessage::from_message(message.into()))
            }

            fn with_context<F, S>(self, f: F) -> Result<T>
            where
                F: FnOnce() -> S,
                S: Into<String>,
            {
                self.ok_or_else(|| $crate::FromMessage::from_message(f().into()))
            }
        }
    };
}
