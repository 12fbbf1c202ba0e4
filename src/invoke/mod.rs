//! Call adaptation
//!
//! Anything callable with an execution context and a slice of values
//! implements [`Invoke`]. A [`Proc`] is a shared handle to one, usable as a
//! callback; an [`Object`] dispatches named methods to installed procs.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{Error, Result};
use crate::runtime::ExecutionContext;
use crate::value::Value;

/// Callable with a fixed number of arguments
pub trait Invoke: Send + Sync {
    fn arity(&self) -> usize;

    fn invoke(&self, cx: &mut ExecutionContext<'_>, args: &[Value]) -> Result<Value>;
}

/// Shared callable handle
#[derive(Clone)]
pub struct Proc(Arc<dyn Invoke>);

impl Proc {
    pub fn new(target: impl Invoke + 'static) -> Self {
        Self(Arc::new(target))
    }

    #[inline]
    pub fn arity(&self) -> usize {
        self.0.arity()
    }

    pub fn call(&self, cx: &mut ExecutionContext<'_>, args: &[Value]) -> Result<Value> {
        self.0.invoke(cx, args)
    }

    pub fn ptr_eq(&self, other: &Proc) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Invoke for Proc {
    fn arity(&self) -> usize {
        self.0.arity()
    }

    fn invoke(&self, cx: &mut ExecutionContext<'_>, args: &[Value]) -> Result<Value> {
        self.0.invoke(cx, args)
    }
}

impl fmt::Debug for Proc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proc").field("arity", &self.arity()).finish()
    }
}

/// Proc from a closure; arity is checked before `f` runs
pub struct Closure<F> {
    arity: usize,
    f: F,
}

impl<F> Closure<F>
where
    F: Fn(&mut ExecutionContext<'_>, &[Value]) -> Result<Value> + Send + Sync + 'static,
{
    pub fn new(arity: usize, f: F) -> Self {
        Self { arity, f }
    }
}

impl<F> Invoke for Closure<F>
where
    F: Fn(&mut ExecutionContext<'_>, &[Value]) -> Result<Value> + Send + Sync,
{
    fn arity(&self) -> usize {
        self.arity
    }

    fn invoke(&self, cx: &mut ExecutionContext<'_>, args: &[Value]) -> Result<Value> {
        if args.len() != self.arity {
            return Err(Error::Arity {
                expected: self.arity,
                got: args.len(),
            });
        }
        (self.f)(cx, args)
    }
}

/// Receiver with methods installed at runtime
pub struct Object {
    class_name: String,
    methods: DashMap<String, Proc>,
}

impl Object {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            methods: DashMap::new(),
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Install `body` as `name`, replacing any previous method of that name
    pub fn define_method(&self, name: impl Into<String>, body: impl Into<Proc>) {
        let name = name.into();
        tracing::debug!(class = %self.class_name, method = %name, "method defined");
        self.methods.insert(name, body.into());
    }

    pub fn respond_to(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Invoke the method `name`
    pub fn send(&self, cx: &mut ExecutionContext<'_>, name: &str, args: &[Value]) -> Result<Value> {
        // Clone out so the map shard is not held across the call
        let method = self
            .methods
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::NoMethod {
                receiver: self.class_name.clone(),
                method: name.to_string(),
            })?;
        method.call(cx, args)
    }
}

impl fmt::Debug for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.methods.iter().map(|e| e.key().clone()).collect();
        names.sort();
        f.debug_struct("Object")
            .field("class_name", &self.class_name)
            .field("methods", &names)
            .finish()
    }
}

impl From<crate::function::Function> for Proc {
    fn from(f: crate::function::Function) -> Self {
        Proc::new(f)
    }
}

impl<F> From<Closure<F>> for Proc
where
    F: Fn(&mut ExecutionContext<'_>, &[Value]) -> Result<Value> + Send + Sync + 'static,
{
    fn from(c: Closure<F>) -> Self {
        Proc::new(c)
    }
}
