//! Positional argument decoding for capability methods.

use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Why positional arguments did not fit a method's declared parameters.
#[derive(Debug, Error)]
pub enum ArgumentError {
    /// Wrong number of arguments.
    #[error("expected {expected} argument(s), received {actual}")]
    Arity { expected: usize, actual: usize },
    /// An argument had the wrong shape.
    #[error("argument {index} is invalid: {source}")]
    Type {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Parameter shapes that can be decoded from an `Invoke`'s `args` array.
///
/// Tuples declare a strict shape: surplus or missing entries are rejected.
/// `Vec<Value>` takes the array as-is, for methods that ignore their input.
pub trait FromArgs: Sized {
    /// Decodes `args` into the method's parameters.
    fn from_args(args: Vec<Value>) -> Result<Self, ArgumentError>;
}

impl FromArgs for Vec<Value> {
    fn from_args(args: Vec<Value>) -> Result<Self, ArgumentError> {
        Ok(args)
    }
}

impl FromArgs for () {
    fn from_args(args: Vec<Value>) -> Result<Self, ArgumentError> {
        expect_arity(&args, 0)
    }
}

fn expect_arity(args: &[Value], expected: usize) -> Result<(), ArgumentError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(ArgumentError::Arity {
            expected,
            actual: args.len(),
        })
    }
}

fn decode<T: DeserializeOwned>(index: usize, value: Value) -> Result<T, ArgumentError> {
    serde_json::from_value(value).map_err(|source| ArgumentError::Type { index, source })
}

macro_rules! impl_from_args {
    ($count:expr; $($name:ident => $index:tt),+) => {
        impl<$($name),+> FromArgs for ($($name,)+)
        where
            $($name: DeserializeOwned),+
        {
            fn from_args(args: Vec<Value>) -> Result<Self, ArgumentError> {
                expect_arity(&args, $count)?;
                let mut values = args.into_iter();
                Ok(($(
                    decode::<$name>($index, values.next().unwrap_or(Value::Null))?,
                )+))
            }
        }
    };
}

impl_from_args!(1; A => 0);
impl_from_args!(2; A => 0, B => 1);
impl_from_args!(3; A => 0, B => 1, C => 2);
impl_from_args!(4; A => 0, B => 1, C => 2, D => 3);
