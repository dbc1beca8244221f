//! Face embedding type.

use serde::{Deserialize, Serialize};

/// Errors that can occur when building an [`Embedding`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EmbeddingError {
    /// The vector has no components.
    #[error("embedding cannot be empty")]
    Empty,
    /// A component is NaN or infinite.
    #[error("embedding component {index} is not a finite number")]
    NonFinite {
        /// Position of the offending component.
        index: usize,
    },
    /// The stored text is not a JSON array of numbers.
    #[error("embedding is not a JSON number array: {0}")]
    Malformed(String),
    /// The vector could not be written as JSON.
    #[error("embedding could not be encoded: {0}")]
    Encode(String),
}

/// A face embedding produced by the biometric service.
///
/// The vector is opaque to this system: it is stored, sent back for
/// matching, and never interpreted. It is always non-empty and every
/// component is finite.
///
/// ## Examples
///
/// ```
/// use attendance_core::Embedding;
///
/// let embedding = Embedding::new(vec![0.25, -1.5]).unwrap();
/// assert_eq!(embedding.to_json().unwrap(), "[0.25,-1.5]");
///
/// assert!(Embedding::new(vec![]).is_err());
/// assert!(Embedding::new(vec![f64::NAN]).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct Embedding(Vec<f64>);

impl Embedding {
    /// Build an embedding from its components.
    ///
    /// # Errors
    ///
    /// Returns an error if the vector is empty or contains a non-finite value.
    pub fn new(values: Vec<f64>) -> Result<Self, EmbeddingError> {
        if values.is_empty() {
            return Err(EmbeddingError::Empty);
        }

        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(EmbeddingError::NonFinite { index });
        }

        Ok(Self(values))
    }

    /// Parse an embedding from its stored JSON array form.
    ///
    /// # Errors
    ///
    /// Returns [`EmbeddingError::Malformed`] if `text` is not a JSON number
    /// array, or the errors of [`Embedding::new`].
    pub fn from_json(text: &str) -> Result<Self, EmbeddingError> {
        let values: Vec<f64> =
            serde_json::from_str(text).map_err(|e| EmbeddingError::Malformed(e.to_string()))?;
        Self::new(values)
    }

    /// Serialize as a compact JSON array, the form used both for storage and
    /// for the `embedding` field sent to the verify endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`EmbeddingError::Encode`] if `serde_json` rejects the vector.
    pub fn to_json(&self) -> Result<String, EmbeddingError> {
        serde_json::to_string(&self.0).map_err(|e| EmbeddingError::Encode(e.to_string()))
    }

    /// Number of components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the components.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}

impl TryFrom<Vec<f64>> for Embedding {
    type Error = EmbeddingError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<Embedding> for Vec<f64> {
    fn from(embedding: Embedding) -> Self {
        embedding.0
    }
}
