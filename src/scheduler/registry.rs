//! Function side-effect registry
//!
//! Calls are sorted into two disjoint sets. Barrier calls touch the outside
//! world (prompts, file moves, web requests, user scripts) and force their
//! block to run alone. Pure calls depend only on their arguments and may be
//! cached within a loop iteration.

use std::collections::HashSet;

const BARRIER_CALLS: &[&str] = &[
    "system.prompt",
    "system.suggester",
    "system.clipboard",
    "file.create_new",
    "file.move",
    "file.rename",
    "file.cursor",
    "file.cursor_append",
    "file.include",
    "file.exists",
    "file.find_tfile",
];

/// Module namespaces where every call is a barrier
const BARRIER_MODULES: &[&str] = &["web", "user", "hooks"];

const PURE_CALLS: &[&str] = &[
    "date.now",
    "date.tomorrow",
    "date.yesterday",
    "date.weekday",
    "file.title",
    "file.path",
    "file.folder",
    "file.creation_date",
    "file.last_modified_date",
    "file.tags",
    "file.content",
    "frontmatter",
];

const PURE_GLOBALS: &[&str] = &[
    "parseInt",
    "parseFloat",
    "String",
    "Number",
    "Boolean",
    "isNaN",
    "isFinite",
];

#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    module_root: String,
    barrier: HashSet<String>,
    pure: HashSet<String>,
    barrier_modules: Vec<String>,
}

impl FunctionRegistry {
    pub fn new(module_root: impl Into<String>) -> Self {
        let module_root = module_root.into();
        let qualify = |name: &&str| format!("{}.{}", module_root, name);
        let barrier = BARRIER_CALLS.iter().map(qualify).collect();
        let pure = PURE_CALLS
            .iter()
            .map(qualify)
            .chain(PURE_GLOBALS.iter().map(|g| g.to_string()))
            .collect();
        let barrier_modules = BARRIER_MODULES
            .iter()
            .map(|m| format!("{}.{}.", module_root, m))
            .collect();
        Self {
            module_root,
            barrier,
            pure,
            barrier_modules,
        }
    }

    pub fn module_root(&self) -> &str {
        &self.module_root
    }

    /// Register an extra side-effecting call (`tp.custom.save`)
    pub fn add_barrier(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.pure.remove(&name);
        self.barrier.insert(name);
    }

    /// Register an extra side-effect-free call
    pub fn add_pure(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.barrier.remove(&name);
        self.pure.insert(name);
    }

    pub fn is_barrier(&self, name: &str) -> bool {
        self.barrier.contains(name) || self.barrier_modules.iter().any(|p| name.starts_with(p))
    }

    pub fn is_pure(&self, name: &str) -> bool {
        self.pure.contains(name)
    }

    /// Whether `name` lives under the module root (`tp.` prefix)
    pub fn is_module_call(&self, name: &str) -> bool {
        name.strip_prefix(self.module_root.as_str())
            .is_some_and(|rest| rest.starts_with('.'))
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new("tp")
    }
}
