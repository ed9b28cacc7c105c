use thiserror::Error;

/// Pipeline failures. Join-time misses are not represented here: a region
/// with no attainment record is recovered locally with a fallback datum and
/// a diagnostic, never an error.
#[derive(Debug, Error)]
pub enum Error {
    /// The geometry input is missing the structure the extractor expects.
    /// Fatal: reported before any drawing occurs.
    #[error("malformed topology: {0}")]
    MalformedTopology(String),

    /// A dataset could not be read from its path or URL. The caller must
    /// surface this as a visible "data unavailable" state.
    #[error("failed to fetch {resource}: {detail}")]
    Fetch { resource: String, detail: String },

    /// The attainment input parsed as neither a JSON record list nor CSV.
    #[error("malformed attainment records: {0}")]
    MalformedRecords(String),

    /// No attainment records at all; the classifier has no value domain.
    #[error("attainment dataset contains no records")]
    EmptyAttainment,

    /// The palette cannot express even one bucket.
    #[error("palette needs at least two colors, got {0}")]
    PaletteTooSmall(usize),
}

impl Error {
    pub(crate) fn fetch(source: &str, detail: impl std::fmt::Display) -> Self {
        Error::Fetch {
            resource: source.to_owned(),
            detail: detail.to_string(),
        }
    }
}
