//! # embedmod-core
//!
//! Load binary modules bundled inside the host program - THE LOADER.
//!
//! A host ships its modules as embedded resources. At startup it loads the
//! ones it needs explicitly; later, when running code references a module
//! the host cannot find, the resolution hook looks it up in the bundle on
//! demand.
//!
//! ## Components
//!
//! - `locator`: reads resources out of a [`ResourceBundle`]
//! - `stager`: writes modules to disk for runtimes that need a file, skipping
//!   the write when the staged copy already has the same BLAKE3 hash
//! - `registry`: identity → [`ModuleHandle`] map, the only shared state
//! - `loader`: the startup `load(resource_id, file_name)` entry point
//! - `resolve`: the hook answering "module not found" requests
//!
//! ## Guarantees
//!
//! - A registered handle is never replaced unless the caller asks for it
//! - Lookups and resolution never return errors for identities we do not own
//! - The resolution hook never panics or propagates errors to the host
//! - Staged files are replaced atomically

// =============================================================================
// MODULES
// =============================================================================

pub mod bundle;
pub mod config;
pub mod formats;
pub mod loader;
pub mod locator;
pub mod primitives;
pub mod registry;
pub mod resolve;
pub mod runtime;
pub mod stager;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types
// =============================================================================

pub use types::{LoadOrigin, LoaderError, ModuleHandle, ModuleRequest};

// =============================================================================
// RE-EXPORTS: Components
// =============================================================================

pub use bundle::{DirectoryBundle, MemoryBundle, ResourceBundle, StaticBundle};
pub use config::{LoaderConfig, StagingLayout};
pub use loader::EmbeddedLoader;
pub use locator::ResourceLocator;
pub use registry::{DuplicatePolicy, ModuleRegistry, Registration};
pub use resolve::{ModuleResolver, Resolution, ResolutionHook, ResolverChain};
pub use runtime::{ImageRuntime, LayeredRuntime, ModuleRuntime};
#[cfg(feature = "native")]
pub use runtime::{NativeLibrary, NativeRuntime};
pub use stager::{ContentStager, StagedFile, content_hash};

// =============================================================================
// RE-EXPORTS: Formats
// =============================================================================

pub use formats::{ImageHeader, ImageManifest, ModuleImage};
