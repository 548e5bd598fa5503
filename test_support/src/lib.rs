//! Test-support crate for xcplan.
//!
//! Shared fixtures for the integration tests: spec registries resolved to
//! absolute paths, a canned SDK and build environment, and target
//! builders. All items are intended for use in tests within this
//! workspace; avoid using them in production code.

use camino::Utf8Path;
use xcplan::context::{BuildContext, BuildEnvironment, WorkspaceRef};
use xcplan::graph::Target;
use xcplan::phase::{FrameworksPhase, SourcesResolver};
use xcplan::settings::Layer;
use xcplan::specs::{self, Sdk, SpecRegistry, ToolSpec};

/// Registry resolving the four linker categories to absolute paths, so
/// emitted invocations do not depend on the host toolchain being present.
#[must_use]
pub fn absolute_spec_registry() -> SpecRegistry {
    let mut registry = SpecRegistry::new();
    registry.register(
        specs::DEFAULT_DOMAIN,
        ToolSpec::new(specs::LD, "Ld", "/toolchain/bin/ld"),
    );
    registry.register(
        specs::DEFAULT_DOMAIN,
        ToolSpec::new(specs::LIBTOOL, "Libtool", "/toolchain/bin/libtool"),
    );
    registry.register(
        specs::DEFAULT_DOMAIN,
        ToolSpec::new(specs::LIPO, "CreateUniversalBinary", "/toolchain/bin/lipo"),
    );
    registry.register(
        specs::DEFAULT_DOMAIN,
        ToolSpec::new(specs::DSYMUTIL, "GenerateDSYMFile", "/toolchain/bin/dsymutil"),
    );
    registry
}

/// SDK with no search paths; resolution then only accepts absolute
/// executables.
#[must_use]
pub fn macos_sdk() -> Sdk {
    Sdk {
        name: "macosx".to_owned(),
        executable_search_paths: Vec::new(),
        domains: vec!["macosx".to_owned()],
    }
}

/// Build environment rooted at `root` with the absolute registry and the
/// macOS SDK registered.
#[must_use]
pub fn build_environment(root: &Utf8Path) -> BuildEnvironment {
    let mut environment = BuildEnvironment {
        base_settings: Layer::new("build")
            .with("OBJROOT", root.join("obj").as_str())
            .with("SDKROOT", "macosx"),
        specs: absolute_spec_registry(),
        ..BuildEnvironment::default()
    };
    environment.sdks.insert("macosx".to_owned(), macos_sdk());
    environment
}

/// A plain build request against a project file.
#[must_use]
pub fn build_context() -> BuildContext {
    BuildContext {
        action: "build".to_owned(),
        scheme: None,
        configuration: "Debug".to_owned(),
        workspace: WorkspaceRef::Project("/src/App.xcodeproj".into()),
        base_settings: Layer::new("request"),
    }
}

/// Target settings for a single-architecture executable named `name`.
#[must_use]
pub fn executable_settings(root: &Utf8Path, name: &str) -> Layer {
    Layer::new("target")
        .with("TARGET_TEMP_DIR", root.join("tmp").join(name).as_str())
        .with("BUILT_PRODUCTS_DIR", root.join("products").as_str())
        .with("EXECUTABLE_NAME", name)
        .with("EXECUTABLE_PATH", name)
        .with(
            "OBJECT_FILE_DIR_normal",
            root.join("obj").join(name).as_str(),
        )
        .with("ARCHS", "x86_64")
        .with("MACH_O_TYPE", "mh_execute")
}

/// An executable target with an empty frameworks phase and the given
/// sources resolution.
#[must_use]
pub fn executable_target(root: &Utf8Path, name: &str, sources: SourcesResolver) -> Target {
    Target {
        name: name.to_owned(),
        settings: executable_settings(root, name),
        working_directory: "/src".into(),
        frameworks: FrameworksPhase::default(),
        sources,
    }
}
