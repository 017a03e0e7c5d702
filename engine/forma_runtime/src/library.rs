//! The type library: at-most-once synthesis, the type cache, and the factory.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use forma_compile::{
    Artifact, BuiltinRegistry, CompileError, InProcessCompiler, Instance, LoadError, Module,
    TypeHandle, UnitCompiler,
};
use forma_diagnostic::Diagnostic;
use forma_host::{HostEndpoint, RemoteCompiler};
use forma_ir::{TypeUnit, Value};
use parking_lot::Mutex;

use crate::config::{CancelToken, LibraryConfig};
use crate::context::EmitContext;
use crate::error::{FactoryError, SynthError};
use crate::key::TypeKey;
use crate::template::PipelineBuilder;

/// What one `ensure_written` call did.
#[derive(Clone, Debug, PartialEq)]
pub struct Written {
    /// True when this call ran the pipeline and the compile; false when the
    /// key was already cached.
    pub performed: bool,
    /// Warnings the compile produced. Empty on a cache hit: warnings are
    /// reported by the call that performed the write.
    pub warnings: Vec<Diagnostic>,
}

impl Written {
    fn hit() -> Self {
        Self {
            performed: false,
            warnings: Vec::new(),
        }
    }
}

/// One library of synthesized types.
///
/// A library owns a compiler backend, the module its compiled types load
/// into, and the key-indexed type cache. For any [`TypeKey`], synthesis and
/// compilation run at most once per library lifetime: concurrent callers of
/// the same key serialize on a per-key mutex while unrelated keys proceed
/// in parallel, and once a key is cached every call is a lock-free hit.
///
/// Failed syntheses install nothing; calling again with the same key
/// retries from scratch. Libraries share nothing with each other, so two
/// libraries given the same key will each synthesize their own type.
pub struct TypeLibrary {
    backend: Arc<dyn UnitCompiler>,
    module: Module,
    cache: DashMap<TypeKey, Arc<TypeHandle>>,
    locks: DashMap<TypeKey, Arc<Mutex<()>>>,
    config: LibraryConfig,
}

impl TypeLibrary {
    pub fn new(backend: Arc<dyn UnitCompiler>) -> Self {
        Self::with_config(backend, LibraryConfig::default())
    }

    pub fn with_config(backend: Arc<dyn UnitCompiler>, config: LibraryConfig) -> Self {
        let registry = config
            .registry
            .clone()
            .unwrap_or_else(|| Arc::new(BuiltinRegistry::standard()));
        Self {
            backend,
            module: Module::new(registry),
            cache: DashMap::new(),
            locks: DashMap::new(),
            config,
        }
    }

    /// A library compiling on the calling thread with the standard builtins.
    #[must_use]
    pub fn in_process() -> Self {
        Self::new(Arc::new(InProcessCompiler::new()))
    }

    /// A library delegating compiles to the compiler host at `endpoint`.
    #[must_use]
    pub fn remote(endpoint: HostEndpoint) -> Self {
        Self::new(Arc::new(RemoteCompiler::new(endpoint)))
    }

    /// Make sure a compiled type exists for `key`.
    ///
    /// On a miss, `build` assembles the pipeline, the templates run in
    /// insertion order against a fresh context, the backend compiles the
    /// emitted unit, and the loaded handle is cached. On a hit, `build` is
    /// never called. After an `Ok` the key is in the cache either way.
    pub fn ensure_written(
        &self,
        key: &TypeKey,
        build: impl FnOnce(&mut PipelineBuilder),
    ) -> Result<Written, SynthError> {
        self.write_if_missing(key, None, build)
    }

    /// [`ensure_written`](Self::ensure_written) with cooperative
    /// cancellation, observed at stage boundaries: before the pipeline,
    /// before compile, before install.
    pub fn ensure_written_opts(
        &self,
        key: &TypeKey,
        cancel: &CancelToken,
        build: impl FnOnce(&mut PipelineBuilder),
    ) -> Result<Written, SynthError> {
        self.write_if_missing(key, Some(cancel), build)
    }

    fn write_if_missing(
        &self,
        key: &TypeKey,
        cancel: Option<&CancelToken>,
        build: impl FnOnce(&mut PipelineBuilder),
    ) -> Result<Written, SynthError> {
        if self.cache.contains_key(key) {
            return Ok(Written::hit());
        }

        // One mutex per key: same-key callers serialize here, unrelated
        // keys never meet. The entry guard must drop before locking, or it
        // would hold the shard against other keys on it.
        let lock = Arc::clone(self.locks.entry(key.clone()).or_default().value());
        let _guard = lock.lock();

        if self.cache.contains_key(key) {
            return Ok(Written::hit());
        }

        ensure_live(cancel, key)?;

        let mut builder = PipelineBuilder::new();
        build(&mut builder);
        let pipeline = builder.finish();
        tracing::debug!(key = %key, templates = pipeline.len(), "synthesizing");

        let mut cx = EmitContext::new(key.type_name());
        for template in pipeline.iter() {
            if let Err(source) = template.apply(&mut cx) {
                return Err(SynthError::Template {
                    key: key.clone(),
                    template: template.name().to_owned(),
                    source,
                });
            }
        }
        let (unit, references) = cx.into_parts();

        ensure_live(cancel, key)?;

        let units = [unit];
        let artifact = match self.backend.compile(&units, &references) {
            Ok(artifact) => artifact,
            Err(CompileError::Rejected(diagnostics)) => {
                return Err(SynthError::Compile {
                    key: key.clone(),
                    diagnostics,
                });
            }
            Err(source) => {
                return Err(SynthError::Host {
                    key: key.clone(),
                    source,
                });
            }
        };
        for warning in &artifact.warnings {
            tracing::warn!(key = %key, "{warning}");
        }

        ensure_live(cancel, key)?;

        if let Some(dir) = &self.config.dump_dir {
            dump_written(dir, key, &units[0], &artifact);
        }

        let handles = self
            .module
            .install(&artifact)
            .map_err(|source| SynthError::Load {
                key: key.clone(),
                source,
            })?;
        let name = key.type_name();
        let Some(handle) = handles.into_iter().find(|handle| handle.name() == &name) else {
            // Only a misbehaving remote backend can get here: the unit we
            // emitted carries the key's name by construction.
            return Err(SynthError::Load {
                key: key.clone(),
                source: LoadError::Malformed {
                    unit: name,
                    detail: "artifact does not contain the requested type",
                },
            });
        };

        self.cache.insert(key.clone(), handle);
        tracing::info!(key = %key, "type written");
        Ok(Written {
            performed: true,
            warnings: artifact.warnings,
        })
    }

    /// Instantiate a written type by constructor ordinal.
    ///
    /// Ordinal 0 is always the implicit constructor that leaves every slot
    /// at its declared default; declared constructors follow in declaration
    /// order. Slots take their defaults before any constructor body runs.
    pub fn create_instance(
        &self,
        key: &TypeKey,
        ctor_index: usize,
        args: &[Value],
    ) -> Result<Instance, FactoryError> {
        let Some(handle) = self.written(key) else {
            return Err(FactoryError::TypeNotFound { key: key.clone() });
        };
        let available = handle.ctor_count();
        if ctor_index >= available {
            return Err(FactoryError::CtorNotFound {
                key: key.clone(),
                index: ctor_index,
                available,
            });
        }
        handle
            .instantiate(ctor_index, args)
            .map_err(FactoryError::Ctor)
    }

    #[must_use]
    pub fn contains(&self, key: &TypeKey) -> bool {
        self.cache.contains_key(key)
    }

    /// The written handle for a key, if any. Handles expose read-only
    /// introspection: members in declaration order, bases, ctor count.
    #[must_use]
    pub fn written(&self, key: &TypeKey) -> Option<Arc<TypeHandle>> {
        self.cache.get(key).map(|entry| Arc::clone(entry.value()))
    }

    #[must_use]
    pub fn written_count(&self) -> usize {
        self.cache.len()
    }

    /// The module every written type is loaded into.
    #[must_use]
    pub fn module(&self) -> &Module {
        &self.module
    }
}

fn ensure_live(cancel: Option<&CancelToken>, key: &TypeKey) -> Result<(), SynthError> {
    match cancel {
        Some(token) if token.is_cancelled() => Err(SynthError::Cancelled { key: key.clone() }),
        _ => Ok(()),
    }
}

fn dump_written(dir: &Path, key: &TypeKey, unit: &TypeUnit, artifact: &Artifact) {
    if let Err(err) = try_dump(dir, key, unit, artifact) {
        tracing::warn!(error = %err, dir = %dir.display(), "artifact dump failed");
    }
}

fn try_dump(dir: &Path, key: &TypeKey, unit: &TypeUnit, artifact: &Artifact) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    let stem = file_stem(key);
    fs::write(dir.join(format!("{stem}.txt")), unit.to_string())?;
    let bytes = artifact.to_bytes().map_err(io::Error::other)?;
    fs::write(dir.join(format!("{stem}.bin")), bytes)?;
    Ok(())
}

fn file_stem(key: &TypeKey) -> String {
    key.to_string()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn dump_stems_are_filesystem_safe() {
        let key = TypeKey::with_discriminator("app.Audit", "v2");
        assert_eq!(file_stem(&key), "app_Audit_v2");
    }
}
