//! The lifecycle booter.
//!
//! Every model class goes through a one-time boot the first time an
//! instance of it is constructed. Booting runs the `boot{Trait}` hook of
//! each bundle applied to the class and records which `initialize{Trait}`
//! hooks the class has; those initializers then run on every new instance.
//!
//! The booter owns the set of booted classes and the recorded initializers.
//! Both survive until [`LifecycleBooter::clear`] (normally reached through
//! [`ModelRegistry::clear_booted_models`](crate::registry::ModelRegistry::clear_booted_models)).

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use modelkit_core::logging::class_span;
use modelkit_core::ModelResult;

use crate::class::{ClassId, InstanceMember, ModelClass, StaticMember};
use crate::model::Model;

#[derive(Default)]
struct BootState {
    booted: HashSet<ClassId>,
    // classes whose boot pass is running, and the thread running it
    booting: HashMap<ClassId, ThreadId>,
    initializers: HashMap<ClassId, Vec<String>>,
}

/// Tracks booted classes and their per-instance initializers.
///
/// A class is marked booted *before* its boot hooks run and stays marked
/// even if one of them fails; a failing hook is therefore never retried.
/// The same mark makes construction of a class from inside its own boot
/// pass a no-op boot. Other threads constructing the class while it boots
/// wait for the pass to finish, so they see every recorded initializer.
#[derive(Default)]
pub struct LifecycleBooter {
    state: Mutex<BootState>,
    finished: Condvar,
}

impl LifecycleBooter {
    /// Creates a booter with no booted classes.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BootState> {
        self.state.lock().expect("boot registry lock poisoned")
    }

    /// Returns `true` if `class` has been booted.
    pub fn is_booted(&self, class: ClassId) -> bool {
        self.lock().booted.contains(&class)
    }

    /// Marks `class` as booted. Returns `false` if it already was.
    pub fn mark_booted(&self, class: ClassId) -> bool {
        self.lock().booted.insert(class)
    }

    /// Boots the model's class unless it has been booted already.
    ///
    /// Marks the class, fires `booting`, runs
    /// [`ModelClass::boot`], then fires `booted`. An error from a boot hook
    /// is returned as is; `booted` is not fired in that case.
    ///
    /// If another thread is booting the class, this waits for it to finish
    /// first. Called from inside the class's own boot pass it returns at
    /// once.
    pub fn boot_if_not_booted(&self, model: &Model) -> ModelResult<()> {
        let class = model.class();
        if !self.begin_boot(class.id()) {
            return Ok(());
        }
        let _finish = FinishBoot {
            booter: self,
            class: class.id(),
        };

        let span = class_span(class.name());
        let _enter = span.enter();
        tracing::debug!("booting model class");

        model.fire_model_event("booting", false);
        class.boot()?;
        model.fire_model_event("booted", false);

        tracing::debug!("model class booted");
        Ok(())
    }

    fn begin_boot(&self, class: ClassId) -> bool {
        let current = thread::current().id();
        let mut state = self.lock();
        while let Some(&owner) = state.booting.get(&class) {
            if owner == current {
                return false;
            }
            state = self
                .finished
                .wait(state)
                .expect("boot registry lock poisoned");
        }
        if !state.booted.insert(class) {
            return false;
        }
        state.booting.insert(class, current);
        true
    }

    /// Runs the boot hook of every bundle applied to `class` and records
    /// the class's instance initializers.
    ///
    /// Bundles are visited in application order. Each derived hook name is
    /// invoked at most once per pass, so two bundles sharing a name boot
    /// once. Initializers are recorded as they are found; if a hook fails,
    /// bundles after it are neither booted nor recorded.
    pub fn boot_traits(&self, class: &Arc<ModelClass>) -> ModelResult<()> {
        let bundles = class.registry().traits().applied_traits(class);
        self.lock().initializers.insert(class.id(), Vec::new());

        let mut invoked = HashSet::new();
        for bundle in &bundles {
            let hook = bundle.boot_hook_name();
            if invoked.insert(hook.clone()) {
                match class.static_member(&hook) {
                    Some(StaticMember::Boot(boot)) => {
                        tracing::trace!(hook = %hook, "running boot hook");
                        boot(class)?;
                    }
                    Some(StaticMember::Method(method)) => {
                        tracing::trace!(hook = %hook, "running boot hook");
                        method(class, &[])?;
                    }
                    Some(StaticMember::Property(_)) | None => {}
                }
            }

            let initializer = bundle.initializer_name();
            if class.has_instance_member(&initializer) {
                let mut state = self.lock();
                let recorded = state.initializers.entry(class.id()).or_default();
                if !recorded.contains(&initializer) {
                    recorded.push(initializer);
                }
            }
        }
        Ok(())
    }

    /// Runs every initializer recorded for the model's class, in order.
    ///
    /// A recorded initializer that the class no longer resolves is an
    /// [`UndefinedMember`](modelkit_core::ModelError::UndefinedMember) error.
    pub fn initialize_traits(&self, model: &mut Model) -> ModelResult<()> {
        let class = Arc::clone(model.class());
        for name in self.initializers(class.id()) {
            match class.instance_member(&name) {
                Some(InstanceMember::Initializer(init)) => init(model)?,
                Some(InstanceMember::Method(method)) => {
                    method(model, &[])?;
                }
                None => return Err(class.undefined(&name)),
            }
        }
        Ok(())
    }

    /// The initializer names recorded for `class`, in recording order.
    pub fn initializers(&self, class: ClassId) -> Vec<String> {
        self.lock()
            .initializers
            .get(&class)
            .cloned()
            .unwrap_or_default()
    }

    /// Forgets every booted class and recorded initializer.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.booted.clear();
        state.initializers.clear();
    }
}

/// Ends a boot pass and wakes waiting threads, also when a hook fails.
struct FinishBoot<'a> {
    booter: &'a LifecycleBooter,
    class: ClassId,
}

impl Drop for FinishBoot<'_> {
    fn drop(&mut self) {
        self.booter
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .booting
            .remove(&self.class);
        self.booter.finished.notify_all();
    }
}
