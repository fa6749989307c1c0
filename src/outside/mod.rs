mod command;
mod ytdl;

pub use ytdl::{ListingOrder, SourceSettings, VideoSource, Ytdl};
