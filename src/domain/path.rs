use std::{fmt, ops::Deref, str::FromStr};

use non_empty_string::NonEmptyString;
use nonempty::NonEmpty;

/// A validated subsystem name.
///
/// Names are non-empty, contain no `/` (the path separator) and no leading or
/// trailing whitespace.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Name(NonEmptyString);

impl Name {
    /// Creates a new `Name`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidNameError`] if the string is empty, contains `/`, or
    /// has surrounding whitespace.
    pub fn new(s: String) -> Result<Self, InvalidNameError> {
        if s.contains('/') || s.trim() != s {
            return Err(InvalidNameError(s));
        }
        NonEmptyString::new(s).map(Self).map_err(InvalidNameError)
    }

    /// Returns the string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<String> for Name {
    type Error = InvalidNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Name {
    type Error = InvalidNameError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value.to_string())
    }
}

impl Deref for Name {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        self.0.as_str()
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a valid subsystem name.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("invalid name '{0}': must be non-empty without surrounding whitespace or '/'")]
pub struct InvalidNameError(String);

/// A slash-separated path of names, from a top-level subsystem down.
///
/// Examples: `pendulum`, `pendulum/link/origin`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FeaturePath(NonEmpty<Name>);

impl FeaturePath {
    /// A path consisting of a single top-level name.
    #[must_use]
    pub fn root(name: Name) -> Self {
        Self(NonEmpty::new(name))
    }

    /// Returns a new path with `name` appended.
    #[must_use]
    pub fn join(&self, name: Name) -> Self {
        let mut segments = self.0.clone();
        segments.push(name);
        Self(segments)
    }

    /// The path with its last segment removed, or `None` for a top-level path.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let mut segments: Vec<Name> = self.0.iter().cloned().collect();
        segments.pop();
        NonEmpty::from_vec(segments).map(Self)
    }

    /// The last segment of the path.
    #[must_use]
    pub fn name(&self) -> &Name {
        self.0.last()
    }

    /// Iterates over the segments, top-level first.
    pub fn segments(&self) -> impl Iterator<Item = &Name> {
        self.0.iter()
    }
}

impl fmt::Display for FeaturePath {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for segment in &self.0 {
            if !first {
                f.write_str("/")?;
            }
            f.write_str(segment)?;
            first = false;
        }
        Ok(())
    }
}

/// Errors that can occur when parsing a [`FeaturePath`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PathError {
    /// The path is empty or has empty segments.
    #[error("invalid path syntax: '{0}'")]
    Syntax(String),

    /// One of the segments is not a valid name.
    #[error(transparent)]
    Name(#[from] InvalidNameError),
}

impl FromStr for FeaturePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.starts_with('/') || s.ends_with('/') || s.contains("//") {
            return Err(PathError::Syntax(s.to_string()));
        }

        let segments = s
            .split('/')
            .map(Name::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        NonEmpty::from_vec(segments)
            .map(Self)
            .ok_or_else(|| PathError::Syntax(s.to_string()))
    }
}

impl TryFrom<&str> for FeaturePath {
    type Error = PathError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::from_str(value)
    }
}
