//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use super::{BundleArgs, Settings};
use embedmod_core::{
    DirectoryBundle, DuplicatePolicy, EmbeddedLoader, ImageManifest, ImageRuntime,
    LayeredRuntime, LoaderError, ModuleHandle, ModuleImage, ModuleRegistry, ModuleResolver,
    ModuleRuntime, Resolution, ResourceBundle, content_hash,
    primitives::{MAX_IMAGE_SIZE, RESOURCE_NAME_SEPARATOR},
};
use std::path::Path;
use std::sync::Arc;

// =============================================================================
// FILE HELPERS
// =============================================================================

/// Read an input file, refusing anything larger than a module image may be.
fn read_input(path: &Path) -> Result<Vec<u8>, LoaderError> {
    let read_error = |reason: String| LoaderError::Io {
        path: path.to_path_buf(),
        reason,
    };

    let metadata = std::fs::metadata(path).map_err(|e| read_error(e.to_string()))?;
    if !metadata.is_file() {
        return Err(read_error("not a regular file".to_string()));
    }
    if metadata.len() > MAX_IMAGE_SIZE as u64 {
        return Err(read_error(format!(
            "size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            MAX_IMAGE_SIZE
        )));
    }

    std::fs::read(path).map_err(|e| read_error(e.to_string()))
}

fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

/// Staging file name derived from a resource name: its last two parts.
///
/// `App.codecs.Zip.dll` stages as `Zip.dll`.
pub fn default_file_name(resource_id: &str) -> String {
    let parts: Vec<&str> = resource_id.rsplitn(3, RESOURCE_NAME_SEPARATOR).collect();
    match parts.as_slice() {
        [ext, stem, ..] => format!("{}{}{}", stem, RESOURCE_NAME_SEPARATOR, ext),
        _ => resource_id.to_string(),
    }
}

// =============================================================================
// LOADER CONSTRUCTION
// =============================================================================

/// The runtime stack used by the CLI: images, then native libraries.
fn runtime() -> Arc<dyn ModuleRuntime> {
    let layered = LayeredRuntime::new().with(Arc::new(ImageRuntime::new()));
    #[cfg(feature = "native")]
    let layered = layered.with(Arc::new(embedmod_core::NativeRuntime::new()));
    Arc::new(layered)
}

fn open_bundle(settings: &Settings, args: &BundleArgs) -> Result<DirectoryBundle, LoaderError> {
    let dir = args
        .bundle
        .clone()
        .or_else(|| settings.bundle.dir.clone())
        .ok_or_else(|| {
            LoaderError::Config("no bundle directory given (use --bundle)".to_string())
        })?;
    let namespace = args
        .namespace
        .as_deref()
        .or(settings.bundle.namespace.as_deref());

    Ok(DirectoryBundle::open(&dir, namespace)?
        .with_max_resource_size(settings.loader.max_resource_size))
}

fn loader(settings: &Settings, args: &BundleArgs) -> Result<EmbeddedLoader, LoaderError> {
    let bundle = open_bundle(settings, args)?;
    EmbeddedLoader::new(
        Arc::new(bundle),
        runtime(),
        Arc::new(ModuleRegistry::new()),
        settings.loader.clone(),
    )
}

fn handle_json(handle: &ModuleHandle) -> serde_json::Value {
    serde_json::json!({
        "identity": handle.identity(),
        "origin": handle.origin().to_string(),
    })
}

// =============================================================================
// PACK COMMAND
// =============================================================================

/// Build a module image.
pub fn cmd_pack(
    name: &str,
    version: &str,
    file_backed: bool,
    exports: Vec<String>,
    payload: Option<&Path>,
    output: &Path,
    json_mode: bool,
) -> Result<(), LoaderError> {
    let payload = match payload {
        Some(path) => read_input(path)?,
        None => Vec::new(),
    };

    let mut manifest = ImageManifest::new(name, version).with_exports(exports);
    if file_backed {
        manifest = manifest.file_backed();
    }
    let image = ModuleImage::new(manifest, payload);
    let bytes = image.to_bytes()?;

    std::fs::write(output, &bytes).map_err(|e| LoaderError::Io {
        path: output.to_path_buf(),
        reason: e.to_string(),
    })?;
    tracing::info!("Packed {} into {:?}", image.identity(), output);

    if json_mode {
        print_json(&serde_json::json!({
            "identity": image.identity(),
            "output": output.to_string_lossy(),
            "size": bytes.len(),
            "hash": content_hash(&bytes),
        }));
        return Ok(());
    }

    println!("Packed {}", image.identity());
    println!("  Output: {}", output.display());
    println!("  Size:   {} bytes", bytes.len());
    Ok(())
}

// =============================================================================
// INSPECT COMMAND
// =============================================================================

/// Show a module image's manifest.
pub fn cmd_inspect(file: &Path, json_mode: bool) -> Result<(), LoaderError> {
    let bytes = read_input(file)?;
    let image = ModuleImage::from_bytes(&bytes)?;
    let manifest = &image.manifest;

    if json_mode {
        print_json(&serde_json::json!({
            "identity": image.identity(),
            "name": manifest.name,
            "version": manifest.version,
            "file_backed": manifest.file_backed,
            "exports": manifest.exports,
            "payload_size": image.payload.len(),
            "hash": content_hash(&bytes),
        }));
        return Ok(());
    }

    println!("Module Image");
    println!("============");
    println!("Identity:    {}", image.identity());
    println!("File-backed: {}", manifest.file_backed);
    println!("Payload:     {} bytes", image.payload.len());
    println!("BLAKE3:      {}", content_hash(&bytes));
    if !manifest.exports.is_empty() {
        println!("Exports:");
        for export in &manifest.exports {
            println!("  {}", export);
        }
    }
    Ok(())
}

// =============================================================================
// LIST COMMAND
// =============================================================================

/// List bundle resources.
pub fn cmd_list(settings: &Settings, args: &BundleArgs, json_mode: bool) -> Result<(), LoaderError> {
    let bundle = open_bundle(settings, args)?;
    let names = bundle.resource_names();

    if json_mode {
        print_json(&serde_json::json!({
            "root": bundle.root().to_string_lossy(),
            "resources": names,
        }));
        return Ok(());
    }

    println!("Bundle: {}", bundle.root().display());
    for name in &names {
        println!("  {}", name);
    }
    println!("{} resource(s)", names.len());
    Ok(())
}

// =============================================================================
// STAGE COMMAND
// =============================================================================

/// Stage a file into the staging cache.
pub fn cmd_stage(
    settings: &Settings,
    input: &Path,
    file_name: Option<&str>,
    json_mode: bool,
) -> Result<(), LoaderError> {
    let file_name = match file_name {
        Some(name) => name.to_string(),
        None => input
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| LoaderError::InvalidFileName(input.display().to_string()))?,
    };

    let bytes = read_input(input)?;
    let stager = settings.loader.stager()?;
    let staged = stager.stage(&bytes, &file_name)?;

    if json_mode {
        print_json(&serde_json::json!({
            "path": staged.path.to_string_lossy(),
            "hash": staged.hash,
        }));
        return Ok(());
    }

    println!("Staged {}", staged.path.display());
    println!("  BLAKE3: {}", staged.hash);
    Ok(())
}

// =============================================================================
// LOAD COMMAND
// =============================================================================

/// Load a resource from a bundle directory.
pub fn cmd_load(
    settings: &Settings,
    args: &BundleArgs,
    resource: &str,
    file_name: Option<&str>,
    policy: Option<DuplicatePolicy>,
    json_mode: bool,
) -> Result<(), LoaderError> {
    let loader = loader(settings, args)?;
    let file_name = file_name
        .map(str::to_string)
        .unwrap_or_else(|| default_file_name(resource));

    let policy = policy.unwrap_or(settings.loader.duplicate_policy);
    let handle = loader.load_with_policy(resource, &file_name, policy)?;

    if json_mode {
        print_json(&handle_json(&handle));
        return Ok(());
    }

    println!("Loaded {}", handle.identity());
    println!("  Origin: {}", handle.origin());
    Ok(())
}

// =============================================================================
// RESOLVE COMMAND
// =============================================================================

/// Resolve a module request against a bundle directory.
pub fn cmd_resolve(
    settings: &Settings,
    args: &BundleArgs,
    request: &str,
    json_mode: bool,
) -> Result<(), LoaderError> {
    let loader = loader(settings, args)?;
    let hook = loader.resolution_hook();
    let resolution = hook.resolve(&embedmod_core::ModuleRequest::parse(request));

    if json_mode {
        let output = match &resolution {
            Resolution::Handled(handle) => serde_json::json!({
                "request": request,
                "outcome": "handled",
                "module": handle_json(handle),
            }),
            Resolution::Unhandled => serde_json::json!({
                "request": request,
                "outcome": "unhandled",
            }),
            Resolution::Failed(reason) => serde_json::json!({
                "request": request,
                "outcome": "failed",
                "reason": reason,
            }),
        };
        print_json(&output);
        return Ok(());
    }

    match resolution {
        Resolution::Handled(handle) => {
            println!("Resolved {} -> {}", request, handle.identity());
            println!("  Origin: {}", handle.origin());
        }
        Resolution::Unhandled => println!("Unhandled: no bundle resource matches {}", request),
        Resolution::Failed(reason) => println!("Failed: {}", reason),
    }
    Ok(())
}
