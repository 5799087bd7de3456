//! Stack lifecycle: configuration, lazy construction, reset, teardown.
//!
//! A `LifecycleManager` is an explicit, externally constructed instance —
//! share it by reference (it is `Send + Sync`); there is no process-global
//! singleton. `reset` drops the inner stack generation, which is what
//! invalidates outstanding session handles.

use std::path::PathBuf;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use strata_model::{ModelBundle, load_model};
use strata_store::{FileBackend, MemoryBackend, StoreBackend, StoreCoordinator};

use crate::core::{StackCore, lock_unpoisoned};
use crate::error::StackError;
use crate::notify::PersistEvent;
use crate::save::SaveCoordinator;
use crate::scratch::ScratchSession;
use crate::session::{BackgroundSession, MainSession};

/// Which physical store the stack opens.
pub enum StoreKind {
    /// Durable JSONL file at `directory/<store_name or model_name>.jsonl`.
    PersistentFile {
        directory: PathBuf,
        store_name: Option<String>,
    },
    /// Nothing survives a reset. Intended for test isolation.
    InMemoryEphemeral,
}

type BackendFactory = Box<dyn Fn() -> Box<dyn StoreBackend> + Send>;

/// Configuration captured before the stack is first constructed.
pub struct StackConfig {
    model_name: String,
    bundle: ModelBundle,
    store_kind: StoreKind,
    backend_factory: Option<BackendFactory>,
}

impl StackConfig {
    /// A new configuration with an ephemeral store by default.
    pub fn new(model_name: impl Into<String>, bundle: ModelBundle) -> Self {
        Self {
            model_name: model_name.into(),
            bundle,
            store_kind: StoreKind::InMemoryEphemeral,
            backend_factory: None,
        }
    }

    /// Use a durable file-backed store under `directory`.
    pub fn persistent(mut self, directory: impl Into<PathBuf>) -> Self {
        self.store_kind = StoreKind::PersistentFile {
            directory: directory.into(),
            store_name: None,
        };
        self
    }

    /// Override the store file name (defaults to the model name).
    pub fn store_name(mut self, name: impl Into<String>) -> Self {
        if let StoreKind::PersistentFile { store_name, .. } = &mut self.store_kind {
            *store_name = Some(name.into());
        }
        self
    }

    pub fn in_memory(mut self) -> Self {
        self.store_kind = StoreKind::InMemoryEphemeral;
        self
    }

    /// Supply the backend directly, bypassing `store_kind`. The factory is
    /// invoked once per stack generation; this is the seam test doubles
    /// (e.g. fault-injecting backends) plug into.
    pub fn with_backend_factory(
        mut self,
        factory: impl Fn() -> Box<dyn StoreBackend> + Send + 'static,
    ) -> Self {
        self.backend_factory = Some(Box::new(factory));
        self
    }

    fn store_path(&self) -> Option<PathBuf> {
        match &self.store_kind {
            StoreKind::PersistentFile {
                directory,
                store_name,
            } => {
                let name = store_name.as_deref().unwrap_or(&self.model_name);
                Some(directory.join(format!("{name}.jsonl")))
            }
            StoreKind::InMemoryEphemeral => None,
        }
    }

    fn make_backend(&self) -> Box<dyn StoreBackend> {
        if let Some(factory) = &self.backend_factory {
            return factory();
        }
        match self.store_path() {
            Some(path) => Box::new(FileBackend::new(path)),
            None => Box::new(MemoryBackend::new()),
        }
    }
}

struct ManagerState {
    config: StackConfig,
    core: Option<Arc<StackCore>>,
}

/// Owns the stack: store coordinator, main session state, and hierarchy.
///
/// Construction is lazy — the model is loaded and the store opened on the
/// first session access, and any failure surfaces to that caller.
pub struct LifecycleManager {
    state: Mutex<ManagerState>,
}

impl LifecycleManager {
    pub fn new(config: StackConfig) -> Self {
        Self {
            state: Mutex::new(ManagerState { config, core: None }),
        }
    }

    fn core(&self) -> Result<Arc<StackCore>, StackError> {
        let mut state = lock_unpoisoned(&self.state);
        if let Some(core) = &state.core {
            return Ok(Arc::clone(core));
        }

        let model = Arc::new(load_model(&state.config.model_name, &state.config.bundle)?);
        let backend = state.config.make_backend();
        let store = StoreCoordinator::open(model, backend)?;
        let core = Arc::new(StackCore::new(store));
        tracing::info!(model = %state.config.model_name, "stack constructed");

        state.core = Some(Arc::clone(&core));
        Ok(core)
    }

    /// A handle on the foreground session. Keep it on the foreground
    /// domain; the handle is `!Send`.
    pub fn main_session(&self) -> Result<MainSession, StackError> {
        Ok(MainSession::attached(&self.core()?))
    }

    /// A fresh background session parented to main, affine to the calling
    /// thread.
    pub fn new_background_session(&self) -> Result<BackgroundSession, StackError> {
        Ok(BackgroundSession::attached(&self.core()?))
    }

    /// Run `work` with a fresh background session on a worker thread.
    ///
    /// Saves automatically when `work` returns `Ok`, then joins. The save
    /// (and so any `CommitError`) is part of the returned result. A
    /// failing `work` skips the save, leaving nothing absorbed.
    pub fn perform_in_background<T, F>(&self, work: F) -> Result<T, StackError>
    where
        F: FnOnce(&BackgroundSession) -> Result<T, StackError> + Send,
        T: Send,
    {
        let core = self.core()?;
        std::thread::scope(|scope| {
            let handle = scope.spawn(|| {
                let session = BackgroundSession::attached(&core);
                let value = work(&session)?;
                session.save()?;
                Ok(value)
            });
            handle
                .join()
                .unwrap_or_else(|payload| std::panic::resume_unwind(payload))
        })
    }

    /// Commit the main session's accumulated working set to the store.
    ///
    /// A failed persist leaves all pending edits intact and reports the
    /// failure.
    pub fn persist(&self) -> Result<(), StackError> {
        let core = self.core()?;
        let coordinator = SaveCoordinator::new(&core);
        let mut main = lock_unpoisoned(&core.main);
        coordinator.commit_root(&mut main)
    }

    /// Observe root-commit outcomes.
    pub fn subscribe_persist_events(&self) -> Result<mpsc::Receiver<PersistEvent>, StackError> {
        Ok(self.core()?.hierarchy.register_persist_subscriber())
    }

    /// An isolated scratch session (discard-on-save, no store).
    pub fn new_scratch_session(&self) -> ScratchSession {
        ScratchSession::new()
    }

    /// Reconfigure the model name. Only effective before the stack is
    /// first constructed; afterwards the call is ignored with a warning.
    pub fn set_model(&self, name: impl Into<String>) {
        let mut state = lock_unpoisoned(&self.state);
        if state.core.is_some() {
            tracing::warn!("set_model ignored: stack already constructed, reset first");
            return;
        }
        state.config.model_name = name.into();
    }

    /// Reconfigure the model bundle. Same timing rule as `set_model`.
    pub fn set_model_bundle(&self, bundle: ModelBundle) {
        let mut state = lock_unpoisoned(&self.state);
        if state.core.is_some() {
            tracing::warn!("set_model_bundle ignored: stack already constructed, reset first");
            return;
        }
        state.config.bundle = bundle;
    }

    /// Switch to an ephemeral store, tearing down an already-built stack
    /// first. The next access reconstructs against the in-memory kind.
    pub fn use_in_memory_store(&self) {
        let mut state = lock_unpoisoned(&self.state);
        if let Some(core) = state.core.take() {
            lock_unpoisoned(&core.store).close();
        }
        state.config.store_kind = StoreKind::InMemoryEphemeral;
    }

    /// Close the store and discard the stack generation.
    ///
    /// Every previously obtained session handle becomes stale and fails
    /// fast on next use; the next access reconstructs from scratch.
    pub fn reset(&self) {
        let mut state = lock_unpoisoned(&self.state);
        if let Some(core) = state.core.take() {
            lock_unpoisoned(&core.store).close();
            tracing::info!("stack reset");
        }
    }

    /// Reset, then delete the on-disk store file (persistent kind only).
    pub fn destroy_store(&self) {
        self.reset();
        let state = lock_unpoisoned(&self.state);
        if let Some(path) = state.config.store_path()
            && path.exists()
            && let Err(error) = std::fs::remove_file(&path)
        {
            tracing::warn!(%error, path = %path.display(), "could not delete store file");
        }
    }
}
