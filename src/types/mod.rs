mod item;
mod metadata;
mod privacy;

pub use item::ItemDescriptor;
pub use metadata::{PublishMetadata, PublishSettings};
pub use privacy::Privacy;
