//! `.context()` for crate-local error types.
//!
//! A crate implements [`FromMessage`] for its `Error` and calls
//! [`impl_context!`](crate::impl_context) from its error module.

pub trait FromMessage: Sized {
    fn from_message(message: String) -> Self;

    /// Build `"{context}: {source}"`.
    fn wrap(context: impl Into<String>, source: impl std::fmt::Display) -> Self {
        Self::from_message(format!("{}: {source}", context.into()))
    }
}

/// Define a `Context` trait over `Result` and `Option` producing the
/// surrounding module's `Error` and `Result<T>`.
#[macro_export]
macro_rules! impl_context {
    () => {
        pub trait Context<T>: Sized {
            fn with_context<C: Into<String>>(self, f: impl FnOnce() -> C) -> Result<T>;

            fn context(self, context: impl Into<String>) -> Result<T> {
                let context = context.into();
                self.with_context(move || context)
            }
        }

        impl<T, E: std::fmt::Display> Context<T> for std::result::Result<T, E> {
            fn with_context<C: Into<String>>(self, f: impl FnOnce() -> C) -> Result<T> {
                self.map_err(|source| <Error as $crate::FromMessage>::wrap(f(), source))
            }
        }

        impl<T> Context<T> for Option<T> {
            fn with_context<C: Into<String>>(self, f: impl FnOnce() -> C) -> Result<T> {
                self.ok_or_else(|| <Error as $crate::FromMessage>::from_message(f().into()))
            }
        }
    };
}
