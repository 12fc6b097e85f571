//! Capability registry
//!
//! The native elements live in loadable plugin libraries. Before any
//! graph work the assembler checks that the required capability names are
//! registered, loading them from the plugin search path when missing.
//! The registry is an injected dependency scoped to a single run, so
//! tests can substitute an in-memory provider.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::{HomeAudioError, Result};

/// Capability names the assembler needs before building any graph
pub const REQUIRED_CAPABILITIES: [&str; 4] = ["audiodecbin", "ac3parse", "ac3dec", "renderer"];

/// Discovery and loading of native processing capabilities
pub trait CapabilityProvider {
    /// True if the capability is currently registered
    fn is_registered(&self, capability: &str) -> bool;

    /// Load capabilities from a filesystem path
    fn load_from(&mut self, path: &Path) -> Result<()>;
}

/// Verify that all required capabilities are available, loading from the
/// search path at most once.
pub fn ensure_capabilities(
    provider: &mut dyn CapabilityProvider,
    search_path: &Path,
) -> Result<()> {
    let missing: Vec<&str> = REQUIRED_CAPABILITIES
        .iter()
        .copied()
        .filter(|cap| !provider.is_registered(cap))
        .collect();

    if missing.is_empty() {
        debug!("all required capabilities already registered");
        return Ok(());
    }

    info!(
        "loading capabilities from {}: missing {:?}",
        search_path.display(),
        missing
    );
    provider.load_from(search_path)?;

    for cap in missing {
        if !provider.is_registered(cap) {
            return Err(HomeAudioError::PluginUnavailable {
                capability: cap.to_string(),
                search_path: search_path.display().to_string(),
            });
        }
    }
    Ok(())
}

/// Registry that discovers capabilities from plugin files on disk.
///
/// A plugin library named `libfoo.so` (or `foo.dll`, `libfoo.dylib`)
/// registers the capability `foo`.
#[derive(Debug, Default)]
pub struct FsRegistry {
    registered: BTreeSet<String>,
    scanned: Vec<PathBuf>,
}

impl FsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn capability_from_file(name: &str) -> Option<String> {
        let stem = name
            .strip_suffix(".so")
            .or_else(|| name.strip_suffix(".dll"))
            .or_else(|| name.strip_suffix(".dylib"))?;
        Some(stem.strip_prefix("lib").unwrap_or(stem).to_string())
    }
}

impl CapabilityProvider for FsRegistry {
    fn is_registered(&self, capability: &str) -> bool {
        self.registered.contains(capability)
    }

    fn load_from(&mut self, path: &Path) -> Result<()> {
        if self.scanned.contains(&path.to_path_buf()) {
            return Ok(());
        }
        for entry in fs::read_dir(path)? {
            let entry = entry?;
            let file_name = entry.file_name();
            if let Some(cap) = Self::capability_from_file(&file_name.to_string_lossy()) {
                debug!("registered capability '{}'", cap);
                self.registered.insert(cap);
            }
        }
        self.scanned.push(path.to_path_buf());
        Ok(())
    }
}

/// In-memory provider with a fixed capability set, for tests
#[derive(Debug, Default)]
pub struct StaticProvider {
    registered: BTreeSet<String>,
    loadable: BTreeSet<String>,
}

impl StaticProvider {
    /// Provider that already has every required capability registered
    pub fn complete() -> Self {
        Self {
            registered: REQUIRED_CAPABILITIES
                .iter()
                .map(|c| c.to_string())
                .collect(),
            loadable: BTreeSet::new(),
        }
    }

    /// Provider with nothing registered; `loadable` names become
    /// registered when `load_from` is called
    pub fn with_loadable(loadable: impl IntoIterator<Item = &'static str>) -> Self {
        Self {
            registered: BTreeSet::new(),
            loadable: loadable.into_iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl CapabilityProvider for StaticProvider {
    fn is_registered(&self, capability: &str) -> bool {
        self.registered.contains(capability)
    }

    fn load_from(&mut self, _path: &Path) -> Result<()> {
        self.registered.extend(self.loadable.iter().cloned());
        Ok(())
    }
}
