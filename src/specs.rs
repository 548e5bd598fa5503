//! Tool specifications and SDK snapshots.
//!
//! Specs are immutable value snapshots looked up by `(identifier, domains)`
//! rather than shared pointer graphs. Loading spec files from disk is an
//! upstream concern; this module only models the resolved registry.

use camino::Utf8PathBuf;
use indexmap::IndexMap;

/// Domain consulted when none of a lookup's explicit domains match.
pub const DEFAULT_DOMAIN: &str = "default";

/// Identifier of the standard dynamic linker spec.
pub const LD: &str = "com.apple.pbx.linkers.ld";
/// Identifier of the static-library archiver spec.
pub const LIBTOOL: &str = "com.apple.pbx.linkers.libtool";
/// Identifier of the universal-binary merger spec.
pub const LIPO: &str = "com.apple.xcode.linkers.lipo";
/// Identifier of the debug-symbol extractor spec.
pub const DSYMUTIL: &str = "com.apple.tools.dsymutil";

/// An immutable tool specification.
#[derive(Clone, Debug)]
pub struct ToolSpec {
    pub identifier: String,
    /// Status verb shown for invocations of this tool, for example `Ld`.
    pub name: String,
    /// Default executable, used when no driver overrides it.
    pub executable: String,
}

impl ToolSpec {
    #[must_use]
    pub fn new(
        identifier: impl Into<String>,
        name: impl Into<String>,
        executable: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            name: name.into(),
            executable: executable.into(),
        }
    }
}

/// Tool specs indexed by domain, then identifier.
#[derive(Clone, Debug, Default)]
pub struct SpecRegistry {
    domains: IndexMap<String, IndexMap<String, ToolSpec>>,
}

impl SpecRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry carrying the four linker-category specs in the default
    /// domain.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(DEFAULT_DOMAIN, ToolSpec::new(LD, "Ld", "ld"));
        registry.register(DEFAULT_DOMAIN, ToolSpec::new(LIBTOOL, "Libtool", "libtool"));
        registry.register(
            DEFAULT_DOMAIN,
            ToolSpec::new(LIPO, "CreateUniversalBinary", "lipo"),
        );
        registry.register(
            DEFAULT_DOMAIN,
            ToolSpec::new(DSYMUTIL, "GenerateDSYMFile", "dsymutil"),
        );
        registry
    }

    /// Register `spec` under `domain`, replacing any previous spec with the
    /// same identifier there.
    pub fn register(&mut self, domain: impl Into<String>, spec: ToolSpec) {
        self.domains
            .entry(domain.into())
            .or_default()
            .insert(spec.identifier.clone(), spec);
    }

    /// Look `identifier` up, trying `domains` in order before falling back
    /// to the default domain.
    #[must_use]
    pub fn lookup(&self, identifier: &str, domains: &[String]) -> Option<&ToolSpec> {
        domains
            .iter()
            .map(String::as_str)
            .chain([DEFAULT_DOMAIN])
            .find_map(|domain| self.domains.get(domain)?.get(identifier))
    }
}

/// A platform toolchain snapshot.
#[derive(Clone, Debug, Default)]
pub struct Sdk {
    pub name: String,
    /// Directories searched for tool executables, in order.
    pub executable_search_paths: Vec<Utf8PathBuf>,
    /// Spec domains this SDK makes visible, in lookup order.
    pub domains: Vec<String>,
}
