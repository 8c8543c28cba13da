pub mod inaturalist;
pub mod photos;
pub mod progress;

pub use inaturalist::INatClient;
pub use photos::{CacheUsage, CachedPhotos, PhotoCache};
pub use progress::{create_spinner, StageProgress};
