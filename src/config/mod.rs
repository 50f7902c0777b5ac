// Configuration management module
// Layered settings: defaults, optional TOML file, then environment overrides

pub mod display;
pub mod settings;


pub use display::{render_config, show_config};
pub use settings::{
    CONFIG_FILE_NAME, Config, ConfigError, EmbeddingConfig, IngestConfig, ModelConfig,
    SessionConfig, StoreConfig,
};
