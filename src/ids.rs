use std::fmt;
use std::sync::Arc;

use crate::error::ProviderError;

/// Identifies a registered [`Source`](crate::source::Source) within a
/// [`ResourceProvider`](crate::provider::ResourceProvider).
///
/// Cloning an id is cheap: the underlying string is reference counted and
/// shared across the registry, the cache, and every handle derived from it.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SourceId(Arc<str>);

/// Identifies a single resource within a source.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ResourceId(Arc<str>);

macro_rules! id_type {
    ($name:ident) => {
        impl $name {
            /// Builds an id, rejecting the empty string.
            pub fn new(value: impl Into<Arc<str>>) -> Result<Self, ProviderError> {
                let value = value.into();
                if value.is_empty() {
                    return Err(ProviderError::EmptyId);
                }
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({:?})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = ProviderError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ProviderError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }
    };
}

id_type!(SourceId);
id_type!(ResourceId);
