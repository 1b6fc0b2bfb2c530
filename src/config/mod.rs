//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, apply GUARD_* env overrides)
//!     → validation.rs (semantic checks)
//!     → GuardConfig (validated, immutable)
//!     → each guard built from its own section
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server swaps the IP rule set; other sections need a restart
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Secrets can come from the environment so files stay shareable

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_from_env, ConfigError};
pub use schema::{
    CorsConfig, EncryptionConfig, GuardConfig, IpAccessConfig, ListenerConfig, ObservabilityConfig,
    RateLimitConfig, SecurityConfig, SignatureConfig, TimeoutConfig, TokenConfig,
};
pub use validation::{validate_config, ValidationError};
pub use watcher::ConfigWatcher;
