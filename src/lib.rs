//! ProdChain - Production Pipeline Compiler
//!
//! Compiles an INI production description into chains of persistent,
//! dependency-linked transformations on a distributed workload system.
//! For every tag (one parameter variant of a production) the requested
//! pipeline stages are registered in order, each consuming the output of its
//! predecessor, followed by the requested move/replication steps.
//!
//! # Architecture
//!
//! - [`config`]: INI reading and the two-tier option merge
//! - [`profile`]: Pipeline shapes of the production and reconstruction tools
//! - [`tag`]: Tag parsing, parameter conversion and mode templates
//! - [`catalog`]: The path-keyed metadata store used as dependency database
//! - [`backend`]: Transformation registration and its local implementations
//! - [`production`]: Step and move planning over all tags
//!
//! # Example
//!
//! ```rust,no_run
//! use prodchain::backend::LocalRegistry;
//! use prodchain::catalog::LocalCatalog;
//! use prodchain::config::Overrides;
//! use prodchain::production::Identity;
//! use prodchain::{Config, Profile, ProductionChain};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load("prod.ini", &Overrides::new(), Profile::Production)?;
//!     let catalog = LocalCatalog::open(".prodchain/catalog")?;
//!     let registry = LocalRegistry::open(".prodchain/transformations.json")?;
//!
//!     let identity = Identity::new("zhangxm", "juno_user", "juno");
//!     let chain = ProductionChain::new(&config, &identity, &catalog, &registry)?;
//!     let report = chain.run()?;
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod catalog;
pub mod config;
pub mod error;
pub mod production;
pub mod profile;
pub mod tag;

// Re-export commonly used types
pub use backend::ExecutionBackend;
pub use catalog::MetadataStore;
pub use config::Config;
pub use error::{ConfigError, ProdError};
pub use production::ProductionChain;
pub use profile::Profile;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "ProdChain";
