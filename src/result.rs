use std::fmt::Display;

/// Failure of a pass, classified by how the pipeline must react to it.
///
/// `Materialize` and `Publish` are per-item and only ever counted;
/// the other classes abort the pass.
#[derive(Debug)]
pub enum Error {
    /// The source items could not be listed
    Enumeration(miette::Report),

    /// No publisher session could be established
    Authentication(miette::Report),

    /// An item could not be fetched to local storage
    Materialize(miette::Report),

    /// A local file could not be published
    Publish(miette::Report),

    /// The progress record could not be read or written
    Persistence(miette::Report),
}

impl From<Error> for miette::Report {
    fn from(err: Error) -> Self {
        match err {
            Error::Enumeration(err) => err.wrap_err("Could not list the source videos"),
            Error::Authentication(err) => err.wrap_err("Could not authenticate to the destination"),
            Error::Materialize(err) => err.wrap_err("Could not download the video"),
            Error::Publish(err) => err.wrap_err("Could not upload the video"),
            Error::Persistence(err) => err.wrap_err("Could not access the upload progress"),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Enumeration(err)
            | Error::Authentication(err)
            | Error::Materialize(err)
            | Error::Publish(err)
            | Error::Persistence(err) => write!(f, "{err:#}"),
        }
    }
}

impl Error {
    pub fn wrap_err_with<D, F>(self, f: F) -> Error
    where
        D: Display + Send + Sync + 'static,
        F: FnOnce() -> D,
    {
        match self {
            Error::Enumeration(report) => Error::Enumeration(report.wrap_err(f())),
            Error::Authentication(report) => Error::Authentication(report.wrap_err(f())),
            Error::Materialize(report) => Error::Materialize(report.wrap_err(f())),
            Error::Publish(report) => Error::Publish(report.wrap_err(f())),
            Error::Persistence(report) => Error::Persistence(report.wrap_err(f())),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
