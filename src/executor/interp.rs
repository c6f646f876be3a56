//! Interpreter handle
//!
//! [`Interpreter`] binds a [`ScriptContext`] to the engine [`Services`] and
//! the render's cancellation checker, and implements [`RuntimeContext`] on
//! top of them. Name resolution order for a bare identifier:
//!
//! 1. a variable in the context
//! 2. a user function (as a function reference)
//! 3. the module root (`tp`) and built-in namespaces (`Math`, `JSON`, ...)
//! 4. a global function (`parseInt`, ...)
//! 5. `undefined`

use super::builtins;
use super::errors::{self, ScriptError};
use super::evaluate;
use super::expressions::{EvalResult, RuntimeContext};
use super::services::Services;
use super::statements::{self, Control};
use super::types::{ArrowBody, Closure, ScriptContext, UserFunction, Val};
use crate::host::CancellationChecker;

const FRONTMATTER: &str = "frontmatter";

pub struct Interpreter<'a> {
    pub ctx: &'a mut ScriptContext,
    pub services: &'a Services,
    pub cancel: &'a dyn CancellationChecker,
    /// Template block being executed, for traces
    pub block: usize,
    call_depth: usize,
    /// Loops currently running; pure calls are only cached inside one
    loop_depth: usize,
}

impl<'a> Interpreter<'a> {
    pub fn new(
        ctx: &'a mut ScriptContext,
        services: &'a Services,
        cancel: &'a dyn CancellationChecker,
    ) -> Self {
        Self {
            ctx,
            services,
            cancel,
            block: 0,
            call_depth: 0,
            loop_depth: 0,
        }
    }

    pub fn with_block(mut self, block: usize) -> Self {
        self.block = block;
        self
    }

    /// Evaluate expression source with the configured evaluator
    pub fn evaluate(&mut self, source: &str) -> EvalResult {
        evaluate::evaluate(self, source)
    }

    pub fn check_cancelled(&self) -> Result<(), ScriptError> {
        self.cancel.check_cancelled()
    }

    pub(crate) fn enter_loop(&mut self) {
        self.loop_depth += 1;
    }

    /// Leave a loop; its cached call results do not outlive it.
    pub(crate) fn exit_loop(&mut self) {
        self.loop_depth = self.loop_depth.saturating_sub(1);
        self.ctx.clear_iteration_cache();
    }

    fn module_root(&self) -> &str {
        &self.services.config.module_root
    }

    fn frontmatter_path(&self) -> String {
        format!("{}.{}", self.module_root(), FRONTMATTER)
    }

    /// Module name for `tp.<module>` paths
    fn module_name<'p>(&self, path: &'p str) -> Option<&'p str> {
        path.strip_prefix(self.module_root())?.strip_prefix('.')
    }

    /// Replace the frontmatter handle by a plain object copy
    fn materialize(&self, value: Val) -> Val {
        match value {
            Val::Module(path) if path == self.frontmatter_path() => {
                Val::Obj(self.services.frontmatter.get_all())
            }
            other => other,
        }
    }

    /* ===================== Calls ===================== */

    fn enter_call(&mut self, name: &str) -> Result<(), ScriptError> {
        if self.call_depth >= self.services.config.max_call_depth {
            return Err(ScriptError::runtime(
                errors::RANGE_ERROR,
                format!("Maximum call stack size exceeded in '{}'", name),
            ));
        }
        self.call_depth += 1;
        Ok(())
    }

    fn call_user(&mut self, function: UserFunction, args: Vec<Val>) -> EvalResult {
        self.enter_call(&function.name)?;
        let result = (function.body)(self, args);
        self.call_depth -= 1;
        result
    }

    /// Call a user or global function, ignoring variables.
    fn call_named(&mut self, name: &str, args: Vec<Val>) -> EvalResult {
        if let Some(function) = self.ctx.function(name) {
            return self.call_user(function, args);
        }
        match builtins::call_global(name, &args) {
            Some(result) => result,
            None => Err(ScriptError::runtime(
                errors::UNKNOWN_FUNCTION,
                format!("{} is not defined", name),
            )),
        }
    }

    fn call_closure(&mut self, closure: &Closure, args: Vec<Val>) -> EvalResult {
        self.enter_call("<arrow>")?;
        let saved = self.ctx.save_bindings(&closure.params);
        for (i, param) in closure.params.iter().enumerate() {
            self.ctx
                .set(param.clone(), args.get(i).cloned().unwrap_or_default());
        }

        let result = match &closure.body {
            ArrowBody::Expr { e } => super::expressions::eval_expr(e, self),
            ArrowBody::Block { source } => match statements::execute_source(self, source) {
                Ok(Control::Return(v)) => Ok(v.unwrap_or_default()),
                Ok(_) => Ok(Val::Undefined),
                Err(e) => Err(e),
            },
        };

        self.ctx.restore_bindings(saved);
        self.call_depth -= 1;
        result
    }

    fn call_module(&mut self, path: &str, function: &str, args: Vec<Val>) -> EvalResult {
        let Some(module) = self.module_name(path).map(str::to_string) else {
            return Err(ScriptError::runtime(
                errors::UNKNOWN_FUNCTION,
                format!("{}.{} is not a function", path, function),
            ));
        };

        let qualified = format!("{}.{}", path, function);
        let cacheable = self.loop_depth > 0 && self.services.registry.is_pure(&qualified);
        let cache_key = cacheable.then(|| {
            let rendered: Vec<String> = args.iter().map(|a| a.to_json().to_string()).collect();
            format!("{}({})", qualified, rendered.join(","))
        });
        if let Some(hit) = cache_key.as_deref().and_then(|k| self.ctx.cached_call(k)) {
            return Ok(hit);
        }

        tracing::debug!(module = %module, function = %function, "Calling module function");
        let value = self
            .services
            .modules
            .execute_module_function(&module, function, &args)?;
        if let Some(key) = cache_key {
            self.ctx.cache_call(key, value.clone());
        }
        Ok(value)
    }
}

/* ===================== Runtime Context ===================== */

impl RuntimeContext for Interpreter<'_> {
    fn get_variable(&self, name: &str) -> EvalResult {
        if let Some(v) = self.ctx.get(name) {
            return Ok(v);
        }
        if self.ctx.has_function(name) {
            return Ok(Val::Function(name.to_string()));
        }
        if name == self.module_root() || builtins::NAMESPACES.contains(&name) {
            return Ok(Val::Module(name.to_string()));
        }
        if builtins::GLOBAL_FUNCTIONS.contains(&name) {
            return Ok(Val::Function(name.to_string()));
        }
        Ok(Val::Undefined)
    }

    fn set_variable(&mut self, name: &str, value: Val) -> Result<(), ScriptError> {
        let value = self.materialize(value);
        self.ctx.set(name, value);
        Ok(())
    }

    fn call_function(&mut self, name: &str, args: Vec<Val>) -> EvalResult {
        match self.ctx.get(name) {
            Some(callee @ (Val::Closure(_) | Val::Function(_))) => self.call_value(&callee, args),
            Some(other) => Err(ScriptError::type_error(format!(
                "{} is not a function ({})",
                name,
                other.type_name()
            ))),
            None => self.call_named(name, args),
        }
    }

    fn call_method(&mut self, receiver: &mut Val, method: &str, args: Vec<Val>) -> EvalResult {
        let args: Vec<Val> = args.into_iter().map(|a| self.materialize(a)).collect();
        if let Val::Module(path) = &*receiver {
            let path = path.clone();
            if path == self.frontmatter_path() {
                let mut object = Val::Obj(self.services.frontmatter.get_all());
                return builtins::call_method(self, &mut object, method, args);
            }
            if builtins::NAMESPACES.contains(&path.as_str()) {
                return builtins::call_namespace(&path, method, args);
            }
            return self.call_module(&path, method, args);
        }
        builtins::call_method(self, receiver, method, args)
    }

    fn call_value(&mut self, callee: &Val, args: Vec<Val>) -> EvalResult {
        match callee {
            Val::Closure(closure) => self.call_closure(closure, args),
            Val::Function(name) => self.call_named(name, args),
            other => Err(ScriptError::type_error(format!(
                "{} is not a function",
                other.to_display_string()
            ))),
        }
    }

    fn get_property(&mut self, object: &Val, property: &str) -> EvalResult {
        let Val::Module(path) = object else {
            return Ok(builtins::get_property(object, property));
        };

        if *path == self.frontmatter_path() {
            return Ok(self
                .services
                .frontmatter
                .get_value(property)
                .unwrap_or(Val::Undefined));
        }
        if path == self.module_root() {
            return Ok(Val::Module(format!("{}.{}", path, property)));
        }
        if builtins::NAMESPACES.contains(&path.as_str()) {
            return Ok(builtins::namespace_property(path, property).unwrap_or(Val::Undefined));
        }
        // `tp.file.title` style property reads are zero-argument calls
        let path = path.clone();
        self.call_module(&path, property, Vec::new())
    }

    fn get_index(&mut self, object: &Val, index: &Val) -> EvalResult {
        match object {
            Val::Module(_) => self.get_property(object, &index.to_display_string()),
            _ => Ok(builtins::get_index(object, index)),
        }
    }

    fn construct(&mut self, class: &str, args: Vec<Val>) -> EvalResult {
        builtins::construct(class, args)
    }
}
