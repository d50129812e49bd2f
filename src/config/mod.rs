mod settings;

pub use settings::{
    CacheConfig, RegistryConfig, Settings, StorageConfig, TrackedChannel, load_settings,
    parse_channels,
};
