use serde::Deserialize;

use super::{ItemDescriptor, Privacy};

/// Marker appended to titles cut to the destination limit
const ELLIPSIS: &str = "...";

/// How the metadata of every published video is built
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PublishSettings {
    /// Maximum number of characters of a title
    pub title_limit: usize,
    /// Used when the source video has no description
    pub default_description: String,
    /// Appended to every description
    pub promo_suffix: String,
    /// The source account name is added after these
    pub tags: Vec<String>,
    pub category_id: String,
    pub privacy: Privacy,
    pub made_for_kids: bool,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            title_limit: 100,
            default_description: "Check out my other content!".to_owned(),
            promo_suffix: "\n\n📱 Share and subscribe\n#Shorts".to_owned(),
            tags: vec!["TikTok".to_owned(), "shorts".to_owned()],
            category_id: "22".to_owned(),
            privacy: Privacy::Public,
            made_for_kids: false,
        }
    }
}

/// Everything sent along a video file when publishing it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
    pub privacy: Privacy,
    pub made_for_kids: bool,
}

impl PublishMetadata {
    pub fn for_item(item: &ItemDescriptor, account: &str, settings: &PublishSettings) -> Self {
        let description = item
            .description
            .as_deref()
            .unwrap_or(&settings.default_description);

        let mut tags = settings.tags.clone();
        tags.push(account.to_owned());

        Self {
            title: truncate_title(&item.title, settings.title_limit),
            description: format!("{description}{}", settings.promo_suffix),
            tags,
            category_id: settings.category_id.clone(),
            privacy: settings.privacy,
            made_for_kids: settings.made_for_kids,
        }
    }
}

/// Cut the title so that it holds in `limit` characters, ending it with
/// an ellipsis when it was too long.
fn truncate_title(title: &str, limit: usize) -> String {
    if title.chars().count() <= limit {
        return title.to_owned();
    }

    let keep = limit.saturating_sub(ELLIPSIS.len());
    let mut truncated: String = title.chars().take(keep).collect();
    truncated.push_str(ELLIPSIS);
    truncated
}
