//! Error handling, definitions, and utilities shared by the nullsem crates.
//!
//! Errors fall into two classes. [`NullSemError::Internal`] marks a programming error in the
//! caller (a structurally invalid node was requested); it is raised with [`internal!`],
//! [`invariant!`] or [`invariant_eq!`] and is never recovered from inside this workspace.
//! [`NullSemError::Untranslatable`] marks a query shape that cannot be expressed in SQL with the
//! requested semantics, and should be surfaced to the end user as such.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// General error type used across the nullsem crates.
#[derive(Serialize, Deserialize, Error, Debug, Clone, PartialEq, Eq)]
pub enum NullSemError {
    /// An internal invariant was violated. This always indicates a bug in the caller.
    #[error("Internal invariant violated: {0}")]
    Internal(String),

    /// The expression has a shape which cannot be translated into SQL.
    #[error("The expression '{shape}' could not be translated: {reason}")]
    Untranslatable {
        /// The rendered form of the offending expression.
        shape: String,
        /// A textual reason why the expression could not be translated.
        reason: String,
    },

    /// The runtime value of a parameter was needed but none was bound.
    #[error("No value was bound for parameter '{name}'")]
    MissingParameterValue {
        /// The name of the parameter.
        name: String,
    },

    /// The operation has no SQL rendering in this AST family.
    #[error("Operation unsupported: {0}")]
    Unsupported(String),
}

impl NullSemError {
    /// Returns `true` if the error is [`NullSemError::Internal`].
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(..))
    }

    /// Returns `true` if the error is [`NullSemError::Untranslatable`].
    pub fn is_untranslatable(&self) -> bool {
        matches!(self, Self::Untranslatable { .. })
    }

    /// Returns `true` if the error is [`NullSemError::Unsupported`].
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported(..))
    }
}

/// Make a new [`NullSemError::Internal`] with the provided string-able argument.
pub fn internal_err<T: Into<String>>(err: T) -> NullSemError {
    NullSemError::Internal(err.into())
}

/// Make a new [`NullSemError::Unsupported`] with the provided string-able argument.
pub fn unsupported_err<T: Into<String>>(err: T) -> NullSemError {
    NullSemError::Unsupported(err.into())
}

/// Make a new [`NullSemError::Untranslatable`] for the given expression shape.
pub fn untranslatable_err<S, R>(shape: S, reason: R) -> NullSemError
where
    S: ToString,
    R: Into<String>,
{
    NullSemError::Untranslatable {
        shape: shape.to_string(),
        reason: reason.into(),
    }
}

/// Make a new [`NullSemError::MissingParameterValue`] for the named parameter.
pub fn missing_parameter_err<T: Into<String>>(name: T) -> NullSemError {
    NullSemError::MissingParameterValue { name: name.into() }
}

/// Renders information about the current source location *if* building in debug mode, for use in
/// error-generating macros
#[doc(hidden)]
#[macro_export]
macro_rules! __location_info {
    () => {
        $crate::__location_info!(" (in {})")
    };
    ($fstr: literal) => {
        if cfg!(debug_assertions) {
            format!(
                $fstr,
                format!("{}:{}:{}", std::file!(), std::line!(), std::column!(),)
            )
        } else {
            "".to_owned()
        }
    };
}

/// Return a [`NullSemError::Internal`] from the current function.
///
/// Usage is like [`unreachable!`], with an optional format string.
#[macro_export]
macro_rules! internal {
    () => {
        $crate::internal!("entered unreachable code")
    };
    ($($tt:tt)*) => {
        return Err($crate::internal_err(format!(
            "{}{}",
            $crate::__location_info!("in {}: "),
            format_args!($($tt)*)
        )).into());
    };
}

/// Return a [`NullSemError::Unsupported`] from the current function.
#[macro_export]
macro_rules! unsupported {
    () => {
        $crate::unsupported!("operation not implemented yet")
    };
    ($($tt:tt)*) => {
        return Err($crate::unsupported_err(format!(
            "{}{}",
            format_args!($($tt)*),
            $crate::__location_info!()
        )).into());
    };
}

/// Return a [`NullSemError::Untranslatable`] for the given expression from the current function.
///
/// The first argument is rendered with [`ToString`] to describe the offending shape; the rest is
/// a format string giving the reason.
#[macro_export]
macro_rules! untranslatable {
    ($shape:expr, $($tt:tt)*) => {
        return Err($crate::untranslatable_err(&$shape, format!($($tt)*)).into());
    };
}

/// Return a [`NullSemError::Internal`] from the current function, if and only if
/// the argument evaluates to false.
#[macro_export]
macro_rules! invariant {
    ($expr:expr, $($tt:tt)*) => {
        if !$expr {
            $crate::internal!($($tt)*);
        }
    };
    ($expr:expr) => {
        if !$expr {
            $crate::internal!("assertion failed: {}", std::stringify!($expr));
        }
    };
}

/// Return a [`NullSemError::Internal`] from the current function, if and only if
/// the two arguments aren't equal.
#[macro_export]
macro_rules! invariant_eq {
    ($expr:expr, $expr2:expr, $($tt:tt)*) => {
        if $expr != $expr2 {
            $crate::internal!(
                "assertion failed: {} == {} ({});\nleft = {:?};\nright = {:?}",
                std::stringify!($expr),
                std::stringify!($expr2),
                format_args!($($tt)*),
                $expr,
                $expr2
            );
        }
    };
    ($expr:expr, $expr2:expr) => {
        if $expr != $expr2 {
            $crate::internal!(
                "assertion failed: {} == {}\nleft = {:?};\nright = {:?}",
                std::stringify!($expr),
                std::stringify!($expr2),
                $expr,
                $expr2
            );
        }
    };
}

/// Standard result type used across the nullsem crates.
pub type NullSemResult<T> = ::std::result::Result<T, NullSemError>;
