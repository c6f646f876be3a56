//! Mutable script context
//!
//! One `ScriptContext` lives for a whole template render. It holds the
//! variable table, the output accumulator, the sticky return flag, user
//! functions and the per-iteration call cache. Parallel phases run on forks
//! of it and merge their changes back with [`ContextDelta`].

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use super::values::Val;
use crate::executor::errors::ScriptError;
use crate::executor::interp::Interpreter;

/* ===================== User Functions ===================== */

/// Callback that executes a function body against the caller's interpreter
pub type FunctionBody =
    Arc<dyn Fn(&mut Interpreter<'_>, Vec<Val>) -> Result<Val, ScriptError> + Send + Sync>;

/// A function declared with `function name(...) { ... }`
#[derive(Clone)]
pub struct UserFunction {
    pub name: String,
    pub params: Vec<String>,
    pub body: FunctionBody,
}

impl fmt::Debug for UserFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserFunction")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/* ===================== Script Context ===================== */

/// Prior values of scoped bindings, restored by [`ScriptContext::restore_bindings`]
#[derive(Debug, Default)]
pub struct SavedBindings(Vec<(String, Option<Val>)>);

#[derive(Debug, Clone)]
pub struct ScriptContext {
    variables: HashMap<String, Val>,
    /// Pending string builders; a name here shadows its entry in `variables`
    builders: HashMap<String, String>,
    accumulator: String,
    return_requested: bool,
    return_value: Option<Val>,
    functions: HashMap<String, UserFunction>,
    iteration_cache: HashMap<String, Val>,
}

impl ScriptContext {
    pub fn new(accumulator: impl Into<String>) -> Self {
        let accumulator = accumulator.into();
        let mut variables = HashMap::new();
        variables.insert(accumulator.clone(), Val::Str(String::new()));
        Self {
            variables,
            builders: HashMap::new(),
            accumulator,
            return_requested: false,
            return_value: None,
            functions: HashMap::new(),
            iteration_cache: HashMap::new(),
        }
    }

    pub fn with_variables(mut self, vars: impl IntoIterator<Item = (String, Val)>) -> Self {
        self.variables.extend(vars);
        self
    }

    pub fn accumulator_name(&self) -> &str {
        &self.accumulator
    }

    /* ----- variables ----- */

    pub fn get(&self, name: &str) -> Option<Val> {
        if let Some(pending) = self.builders.get(name) {
            return Some(Val::Str(pending.clone()));
        }
        self.variables.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.builders.contains_key(name) || self.variables.contains_key(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Val) {
        let name = name.into();
        self.builders.remove(&name);
        self.variables.insert(name, value);
    }

    pub fn remove(&mut self, name: &str) -> Option<Val> {
        let pending = self.builders.remove(name).map(Val::Str);
        let stored = self.variables.remove(name);
        pending.or(stored)
    }

    /// Finalized view of every variable, sorted by name
    pub fn variables(&self) -> BTreeMap<String, Val> {
        let mut all: BTreeMap<String, Val> = self
            .variables
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (k, v) in &self.builders {
            all.insert(k.clone(), Val::Str(v.clone()));
        }
        all
    }

    /* ----- string builders ----- */

    /// Append to a string variable without reallocating it on every `+=`.
    ///
    /// Returns false (and does nothing) when the variable does not currently
    /// hold a string.
    pub fn append_string(&mut self, name: &str, suffix: &str) -> bool {
        if let Some(pending) = self.builders.get_mut(name) {
            pending.push_str(suffix);
            return true;
        }
        match self.variables.remove(name) {
            Some(Val::Str(mut s)) => {
                s.push_str(suffix);
                self.builders.insert(name.to_string(), s);
                true
            }
            Some(other) => {
                self.variables.insert(name.to_string(), other);
                false
            }
            None => false,
        }
    }

    /// Move every pending builder back into the variable table.
    pub fn finalize_builders(&mut self) {
        for (name, s) in self.builders.drain() {
            self.variables.insert(name, Val::Str(s));
        }
    }

    pub fn has_pending_builders(&self) -> bool {
        !self.builders.is_empty()
    }

    /* ----- accumulator ----- */

    pub fn reset_accumulator(&mut self) {
        let name = self.accumulator.clone();
        self.set(name, Val::Str(String::new()));
    }

    /// The accumulator's text after finalizing pending builders
    pub fn accumulated_output(&mut self) -> String {
        self.finalize_builders();
        match self.variables.get(&self.accumulator) {
            Some(Val::Str(s)) => s.clone(),
            Some(v) if !v.is_nullish() => v.to_display_string(),
            _ => String::new(),
        }
    }

    /* ----- scoped bindings ----- */

    /// Remember the current values of `names` so they can be restored later.
    pub fn save_bindings<S: AsRef<str>>(&mut self, names: &[S]) -> SavedBindings {
        SavedBindings(
            names
                .iter()
                .map(|n| (n.as_ref().to_string(), self.get(n.as_ref())))
                .collect(),
        )
    }

    /// Put saved bindings back: prior values are reinstated, names that were
    /// unbound before are removed.
    pub fn restore_bindings(&mut self, saved: SavedBindings) {
        for (name, prior) in saved.0.into_iter().rev() {
            match prior {
                Some(v) => self.set(name, v),
                None => {
                    self.remove(&name);
                }
            }
        }
    }

    /* ----- return ----- */

    pub fn request_return(&mut self, value: Option<Val>) {
        self.return_requested = true;
        self.return_value = value;
    }

    pub fn return_requested(&self) -> bool {
        self.return_requested
    }

    pub fn return_value(&self) -> Option<&Val> {
        self.return_value.as_ref()
    }

    /* ----- functions ----- */

    pub fn define_function(&mut self, function: UserFunction) {
        self.functions.insert(function.name.clone(), function);
    }

    pub fn function(&self, name: &str) -> Option<UserFunction> {
        self.functions.get(name).cloned()
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /* ----- per-iteration cache ----- */

    pub fn cached_call(&self, key: &str) -> Option<Val> {
        self.iteration_cache.get(key).cloned()
    }

    pub fn cache_call(&mut self, key: String, value: Val) {
        self.iteration_cache.insert(key, value);
    }

    pub fn clear_iteration_cache(&mut self) {
        self.iteration_cache.clear();
    }

    /* ----- fork / merge ----- */

    /// Copy of this context for a block running in a parallel phase
    pub fn fork(&self) -> ScriptContext {
        let mut fork = self.clone();
        fork.finalize_builders();
        fork.iteration_cache.clear();
        fork
    }

    /// Changes this fork made relative to `base`. The accumulator is
    /// per-block output and never part of a delta.
    pub fn delta_from(&self, base: &ScriptContext) -> ContextDelta {
        let current = self.variables();
        let before = base.variables();

        let set = current
            .iter()
            .filter(|(k, _)| **k != self.accumulator)
            .filter(|(k, v)| before.get(*k) != Some(*v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let removed = before
            .keys()
            .filter(|k| **k != self.accumulator && !current.contains_key(*k))
            .cloned()
            .collect();
        let functions = self
            .functions
            .values()
            .filter(|f| {
                base.functions
                    .get(&f.name)
                    .map_or(true, |g| !Arc::ptr_eq(&f.body, &g.body))
            })
            .cloned()
            .collect();
        let return_value = (self.return_requested && !base.return_requested)
            .then(|| self.return_value.clone());

        ContextDelta {
            set,
            removed,
            functions,
            return_value,
        }
    }

    /// Apply a fork's changes.
    pub fn apply(&mut self, delta: ContextDelta) {
        for (name, value) in delta.set {
            self.set(name, value);
        }
        for name in delta.removed {
            self.remove(&name);
        }
        for function in delta.functions {
            self.define_function(function);
        }
        if let Some(value) = delta.return_value {
            self.request_return(value);
        }
    }
}

/// Changes made by a forked context
#[derive(Debug, Default)]
pub struct ContextDelta {
    pub set: Vec<(String, Val)>,
    pub removed: Vec<String>,
    pub functions: Vec<UserFunction>,
    /// `Some` when the fork requested a return
    pub return_value: Option<Option<Val>>,
}

impl ContextDelta {
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
            && self.removed.is_empty()
            && self.functions.is_empty()
            && self.return_value.is_none()
    }
}
