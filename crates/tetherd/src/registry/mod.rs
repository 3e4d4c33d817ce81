//! Static tree of named services and their callable methods.
//!
//! Every node maps names either to a child service or to a bound [`Method`].
//! A dotted function path such as `fs.put` walks the services from the root
//! and ends at a method, so resolution is a pure lookup with no reflection.
//!
//! Methods are registered from async closures. The closure declares its
//! parameters as a type implementing [`FromArgs`], usually a tuple; the
//! positional `args` of an invocation are decoded into it before the body
//! runs, and a mismatch fails the call with
//! [`CapabilityError::InvalidArguments`].

mod args;
mod error;

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{self, BoxFuture};
use serde::Serialize;
use serde_json::Value;

use tether_protocol::FunctionPath;

pub use self::args::{ArgumentError, FromArgs};
pub use self::error::{CapabilityError, ResolveError};

/// An asynchronous operation exposed by a service.
pub trait Method: Send + Sync {
    /// Runs the method with positional arguments.
    fn call(&self, args: Vec<Value>) -> BoxFuture<'static, Result<Value, CapabilityError>>;
}

struct TypedMethod<A, F> {
    name: String,
    body: F,
    marker: PhantomData<fn(A)>,
}

impl<A, F, Fut, R> Method for TypedMethod<A, F>
where
    A: FromArgs + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, CapabilityError>> + Send + 'static,
    R: Serialize + Send + 'static,
{
    fn call(&self, args: Vec<Value>) -> BoxFuture<'static, Result<Value, CapabilityError>> {
        match A::from_args(args) {
            Ok(decoded) => {
                let pending = (self.body)(decoded);
                async move {
                    let output = pending.await?;
                    serde_json::to_value(output).map_err(CapabilityError::Encode)
                }
                .boxed()
            }
            Err(reason) => future::ready(Err(CapabilityError::InvalidArguments {
                method: self.name.clone(),
                reason,
            }))
            .boxed(),
        }
    }
}

/// One service: named methods plus nested services.
#[derive(Default)]
pub struct ServiceNode {
    methods: BTreeMap<String, Arc<dyn Method>>,
    services: BTreeMap<String, ServiceNode>,
}

impl ServiceNode {
    fn collect_paths(&self, prefix: &str, paths: &mut Vec<String>) {
        for name in self.methods.keys() {
            paths.push(join_path(prefix, name));
        }
        for (name, child) in &self.services {
            child.collect_paths(&join_path(prefix, name), paths);
        }
    }
}

impl fmt::Debug for ServiceNode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ServiceNode")
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("services", &self.services)
            .finish()
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

/// Builder for a [`ServiceNode`].
#[derive(Debug, Default)]
pub struct ServiceBuilder {
    node: ServiceNode,
}

impl ServiceBuilder {
    /// Starts an empty service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `body` under `name`, decoding arguments into `A` first.
    #[must_use]
    pub fn method<A, F, Fut, R>(mut self, name: &str, body: F) -> Self
    where
        A: FromArgs + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, CapabilityError>> + Send + 'static,
        R: Serialize + Send + 'static,
    {
        let method = TypedMethod {
            name: name.to_string(),
            body,
            marker: PhantomData,
        };
        self.node.methods.insert(name.to_string(), Arc::new(method));
        self
    }

    /// Registers a method whose body receives a shared handle to `target`.
    #[must_use]
    pub fn bind<S, A, F, Fut, R>(self, target: &Arc<S>, name: &str, body: F) -> Self
    where
        S: Send + Sync + 'static,
        A: FromArgs + 'static,
        F: Fn(Arc<S>, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, CapabilityError>> + Send + 'static,
        R: Serialize + Send + 'static,
    {
        let target = Arc::clone(target);
        self.method(name, move |args: A| body(Arc::clone(&target), args))
    }

    /// Nests `child` under `name`.
    #[must_use]
    pub fn service(mut self, name: &str, child: ServiceBuilder) -> Self {
        self.node.services.insert(name.to_string(), child.node);
        self
    }

    /// Freezes the tree.
    #[must_use]
    pub fn build(self) -> ServiceRegistry {
        ServiceRegistry { root: self.node }
    }
}

/// Immutable service tree bound to one session.
#[derive(Debug)]
pub struct ServiceRegistry {
    root: ServiceNode,
}

impl ServiceRegistry {
    /// Finds the method addressed by a dotted `function` path.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::FunctionNotFound`] for unknown services or
    /// methods and for paths whose last segment is empty.
    pub fn resolve(&self, function: &str) -> Result<Arc<dyn Method>, ResolveError> {
        let not_found = || ResolveError::FunctionNotFound {
            function: function.to_string(),
        };
        let path = FunctionPath::parse(function);
        if path.method().is_empty() {
            return Err(not_found());
        }
        let mut node = &self.root;
        for service in path.services() {
            node = node.services.get(service).ok_or_else(not_found)?;
        }
        node.methods.get(path.method()).cloned().ok_or_else(not_found)
    }

    /// Every callable dotted path, sorted within each service.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        self.root.collect_paths("", &mut paths);
        paths
    }
}
