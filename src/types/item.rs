/// One remote video, as seen by the latest listing of the source account.
///
/// Only the `id` identifies the video across passes: the title and
/// description may change upstream between two listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemDescriptor {
    pub id: String,
    pub title: String,
    /// Reference given back to the source to download the video
    pub source_locator: String,
    pub description: Option<String>,
}

impl ItemDescriptor {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        source_locator: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            source_locator: source_locator.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}
