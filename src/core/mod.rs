pub mod collector;
pub mod config;
pub mod paths;
pub mod registry;
pub mod resolver;
pub mod retry;
pub mod source;

pub use collector::{LeafCollector, LeafIdSet};
pub use config::Config;
pub use registry::NodeRegistry;
pub use resolver::{AncestorResolver, ResolverOptions};
pub use retry::RetryPolicy;
