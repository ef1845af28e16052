//! # Loader Scenario Tests
//!
//! End-to-end behaviour of the loader, registry, stager, and resolution hook.
//!
//! ## Tiers
//! - S0: Staging cache
//! - S1: Explicit loads
//! - S2: Resolution hook
//! - S3: Concurrency

#![allow(clippy::unwrap_used, clippy::panic)]

use embedmod_core::{
    DuplicatePolicy, EmbeddedLoader, ImageManifest, ImageRuntime, LoaderConfig, LoaderError,
    MemoryBundle, ModuleImage, ModuleRegistry, ModuleRuntime, ResourceBundle, StagingLayout,
};
use std::path::Path;
use std::sync::Arc;

fn image(name: &str, file_backed: bool) -> Vec<u8> {
    let mut manifest = ImageManifest::new(name, "1.0.0");
    if file_backed {
        manifest = manifest.file_backed();
    }
    ModuleImage::new(manifest, format!("{name} body").into_bytes())
        .to_bytes()
        .unwrap()
}

fn loader_for(bundle: MemoryBundle, staging: &Path) -> EmbeddedLoader {
    let config = LoaderConfig {
        staging_dir: staging.to_path_buf(),
        namespace: Some("scenario-host".to_string()),
        layout: StagingLayout::Namespaced,
        ..LoaderConfig::default()
    };
    EmbeddedLoader::new(
        Arc::new(bundle),
        Arc::new(ImageRuntime::new()),
        Arc::new(ModuleRegistry::new()),
        config,
    )
    .unwrap()
}

// =============================================================================
// TIER S0: STAGING CACHE
// =============================================================================

mod s0_staging_cache {
    use super::*;
    use embedmod_core::ContentStager;

    /// S0.1: Staging identical bytes twice writes the file once.
    #[test]
    fn identical_bytes_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let stager = ContentStager::new(dir.path());

        let first = stager.stage(b"module bytes", "Mod.bin").unwrap();
        let before = std::fs::metadata(&first.path).unwrap();

        let second = stager.stage(b"module bytes", "Mod.bin").unwrap();
        let after = std::fs::metadata(&second.path).unwrap();

        assert_eq!(first, second);
        assert_eq!(before.modified().unwrap(), after.modified().unwrap());
        #[cfg(unix)]
        {
            // The atomic rename would have produced a new inode
            use std::os::unix::fs::MetadataExt;
            assert_eq!(before.ino(), after.ino());
        }
    }

    /// S0.2: Different bytes under the same name overwrite the file.
    #[test]
    fn different_bytes_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let stager = ContentStager::new(dir.path());

        stager.stage(b"version one", "Mod.bin").unwrap();
        let staged = stager.stage(b"version two", "Mod.bin").unwrap();

        assert_eq!(std::fs::read(&staged.path).unwrap(), b"version two");
    }

    /// S0.3: A tampered staged file is detected and rewritten.
    #[test]
    fn tampered_file_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let stager = ContentStager::new(dir.path());

        let staged = stager.stage(b"genuine", "Mod.bin").unwrap();
        std::fs::write(&staged.path, b"tampered").unwrap();

        stager.stage(b"genuine", "Mod.bin").unwrap();
        assert_eq!(std::fs::read(&staged.path).unwrap(), b"genuine");
    }

    /// S0.4: File-backed modules reuse the staged copy across loaders.
    #[test]
    fn restaging_across_loaders_reuses_file() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = MemoryBundle::new().with("Pkg.Native.dll", image("Native", true));

        let first = loader_for(bundle.clone(), dir.path());
        let handle = first.load("Pkg.Native.dll", "Native.dll").unwrap();
        let path = handle.origin().path().unwrap().to_path_buf();
        let before = std::fs::metadata(&path).unwrap().modified().unwrap();

        // A fresh registry, as after a process restart
        let second = loader_for(bundle, dir.path());
        second.load("Pkg.Native.dll", "Native.dll").unwrap();
        let after = std::fs::metadata(&path).unwrap().modified().unwrap();

        assert_eq!(before, after);
        assert_eq!(path, dir.path().join("scenario-host").join("Native.dll"));
    }
}

// =============================================================================
// TIER S1: EXPLICIT LOADS
// =============================================================================

mod s1_explicit_loads {
    use super::*;

    /// S1.1: Load then Get returns the handle a direct load would report.
    #[test]
    fn load_get_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let bytes = image("Mod", false);
        let loader = loader_for(MemoryBundle::new().with("Pkg.Mod.bin", bytes.clone()), dir.path());

        let loaded = loader.load("Pkg.Mod.bin", "Mod.bin").unwrap();
        let direct = ImageRuntime::new().load_from_bytes(&bytes).unwrap();

        let fetched = loader.get(direct.identity()).unwrap();
        assert!(fetched.same_module(&loaded));
        assert_eq!(fetched.identity(), direct.identity());
    }

    /// S1.2: Two resources register two identities; a third is unknown.
    #[test]
    fn two_loads_two_identities() {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader_for(
            MemoryBundle::new()
                .with("A.dll", image("A", false))
                .with("B.dll", image("B", true)),
            dir.path(),
        );

        let a = loader.load("A.dll", "A.dll").unwrap();
        let b = loader.load("B.dll", "B.dll").unwrap();

        assert_ne!(a.identity(), b.identity());
        assert!(loader.get(a.identity()).is_some());
        assert!(loader.get(b.identity()).is_some());
        assert!(loader.get("C, Version=1.0.0").is_none());
    }

    /// S1.3: Lookups for identities nobody owns never fail.
    #[test]
    fn unrelated_lookups_are_none() {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader_for(MemoryBundle::new(), dir.path());

        for probe in ["App.Images.logo.png", "q9XvT2-random", "", "Mod, Version=1.0.0"] {
            assert!(loader.get(probe).is_none());
        }
    }

    /// S1.4: A missing resource is reported, not swallowed.
    #[test]
    fn missing_resource_reported() {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader_for(MemoryBundle::new(), dir.path());

        let err = loader.load("Pkg.Missing.dll", "Missing.dll").unwrap_err();
        assert!(matches!(err, LoaderError::ResourceNotFound(_)));
    }

    /// S1.5: The configured duplicate policy applies to `load`.
    #[test]
    fn configured_duplicate_policy() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoaderConfig {
            staging_dir: dir.path().to_path_buf(),
            duplicate_policy: DuplicatePolicy::Replace,
            ..LoaderConfig::default()
        };
        let loader = EmbeddedLoader::new(
            Arc::new(MemoryBundle::new().with("A.dll", image("A", false))),
            Arc::new(ImageRuntime::new()),
            Arc::new(ModuleRegistry::new()),
            config,
        )
        .unwrap();

        let first = loader.load("A.dll", "A.dll").unwrap();
        let second = loader.load("A.dll", "A.dll").unwrap();

        assert!(!second.same_module(&first));
        assert!(loader.get(first.identity()).unwrap().same_module(&second));
    }

    /// S1.6: Resources compiled in with `embedded_bundle!` are readable.
    #[test]
    fn embedded_bundle_macro() {
        let bundle = embedmod_core::embedded_bundle! {
            "Tests.fixtures.greeting.txt" => "fixtures/greeting.txt",
        };

        assert_eq!(bundle.resource_names(), vec!["Tests.fixtures.greeting.txt"]);
        let bytes = bundle.read("Tests.fixtures.greeting.txt").unwrap().unwrap();
        assert_eq!(&*bytes, b"hello from the bundle\n");
    }

    /// S1.7: A staging failure reaches the caller and registers nothing.
    #[test]
    fn staging_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_dir = dir.path().join("occupied");
        std::fs::write(&not_a_dir, b"plain file").unwrap();

        let config = LoaderConfig {
            staging_dir: not_a_dir,
            layout: StagingLayout::Flat,
            ..LoaderConfig::default()
        };
        let registry = Arc::new(ModuleRegistry::new());
        let loader = EmbeddedLoader::new(
            Arc::new(MemoryBundle::new().with("Pkg.Native.dll", image("Native", true))),
            Arc::new(ImageRuntime::new()),
            Arc::clone(&registry),
            config,
        )
        .unwrap();

        let err = loader.load("Pkg.Native.dll", "Native.dll").unwrap_err();

        assert!(matches!(err, LoaderError::StagingIo { .. }));
        assert!(registry.is_empty());
        assert!(loader.get("Native, Version=1.0.0").is_none());
    }
}

// =============================================================================
// TIER S2: RESOLUTION HOOK
// =============================================================================

mod s2_resolution_hook {
    use super::*;
    use embedmod_core::{Resolution, ResolverChain};

    /// S2.1: A bundled module resolves by short name; others are unhandled.
    #[test]
    fn helper_resolves_nonexistent_does_not() {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader_for(
            MemoryBundle::new().with("App.Helper.dll", image("Helper", false)),
            dir.path(),
        );
        let hook = loader.resolution_hook();

        assert!(hook.resolve_name("Helper").is_handled());
        assert!(matches!(hook.resolve_name("Nonexistent"), Resolution::Unhandled));
    }

    /// S2.2: Resolved modules become visible through `get`.
    #[test]
    fn resolved_module_registered() {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader_for(
            MemoryBundle::new().with("App.Helper.dll", image("Helper", false)),
            dir.path(),
        );

        let handle = loader
            .resolution_hook()
            .resolve_name("Helper")
            .into_handle()
            .unwrap();

        assert!(loader.get(handle.identity()).unwrap().same_module(&handle));
    }

    /// S2.3: Non-module resources never escape as errors.
    #[test]
    fn picture_request_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader_for(
            MemoryBundle::new()
                .with("App.logo.dll", b"\x89PNG\r\n\x1a\n".to_vec())
                .with("App.Helper.dll", image("Helper", false)),
            dir.path(),
        );
        let chain = ResolverChain::new();
        chain.register(Arc::new(loader.resolution_hook()));

        assert!(chain.resolve("logo").is_none());
        assert!(chain.resolve("Helper").is_some());
    }

    /// S2.4: Registering the hook repeatedly keeps a single entry.
    #[test]
    fn defensive_double_registration() {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader_for(MemoryBundle::new(), dir.path());
        let chain = ResolverChain::new();

        chain.register(Arc::new(loader.resolution_hook()));
        chain.register(Arc::new(loader.resolution_hook()));

        assert_eq!(chain.len(), 1);
    }

    /// S2.5: An explicitly loaded module satisfies later requests for it.
    #[test]
    fn explicit_load_then_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader_for(
            MemoryBundle::new().with("App.Helper.dll", image("Helper", false)),
            dir.path(),
        );

        let loaded = loader.load("App.Helper.dll", "Helper.dll").unwrap();
        let resolved = loader
            .resolution_hook()
            .resolve_name("Helper, Version=1.0.0")
            .into_handle()
            .unwrap();

        assert!(resolved.same_module(&loaded));
    }
}

// =============================================================================
// TIER S3: CONCURRENCY
// =============================================================================

mod s3_concurrency {
    use super::*;

    /// S3.1: Parallel resolutions of one module converge on one handle.
    #[test]
    fn parallel_resolution_converges() {
        let dir = tempfile::tempdir().unwrap();
        let loader = loader_for(
            MemoryBundle::new().with("App.Helper.dll", image("Helper", false)),
            dir.path(),
        );
        let hook = Arc::new(loader.resolution_hook());

        let threads: Vec<_> = (0..16)
            .map(|_| {
                let hook = Arc::clone(&hook);
                std::thread::spawn(move || hook.resolve_name("Helper").into_handle().unwrap())
            })
            .collect();
        let handles: Vec<_> = threads.into_iter().map(|t| t.join().unwrap()).collect();

        let stored = loader.get("Helper, Version=1.0.0").unwrap();
        assert!(handles.iter().all(|h| h.same_module(&stored)));
        assert_eq!(loader.registry().len(), 1);
    }

    /// S3.2: Parallel staging of identical bytes leaves one intact file.
    #[test]
    fn parallel_staging_same_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let stager = Arc::new(embedmod_core::ContentStager::new(dir.path()));
        let bytes = image("Native", true);

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let stager = Arc::clone(&stager);
                let bytes = bytes.clone();
                std::thread::spawn(move || stager.stage(&bytes, "Native.dll").unwrap())
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(std::fs::read(dir.path().join("Native.dll")).unwrap(), bytes);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
