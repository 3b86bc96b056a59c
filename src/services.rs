//! Named services plugins expose to each other.
//!
//! A service is any `'static` value, usually a function pointer or an
//! `Rc<dyn Fn>`, registered under `"<plugin>.<name>"`. Callers look it up by
//! full name and by the type they expect; a lookup with the wrong type is a
//! miss.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::hash::{hash_str, in_namespace, qualified_name};
use crate::map::OrderedMap;

/// A registered service.
pub struct Service {
    name: String,
    entry: Rc<dyn Any>,
}

impl Service {
    /// Fully qualified name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The type-erased entry point.
    pub fn entry(&self) -> Rc<dyn Any> {
        Rc::clone(&self.entry)
    }

    /// The entry point, if it is an `F`.
    pub fn downcast<F: Clone + 'static>(&self) -> Option<F> {
        self.entry.downcast_ref::<F>().cloned()
    }
}

impl fmt::Debug for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Service").field("name", &self.name).finish()
    }
}

/// Directory of services for one game instance.
#[derive(Default)]
pub struct ServiceRegistry {
    services: OrderedMap<Service>,
}

impl ServiceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `entry` as `"<plugin>.<name>"`.
    ///
    /// Fails without replacing anything if the name is taken.
    pub fn register<F: Any>(&mut self, plugin: &str, name: &str, entry: F) -> Result<()> {
        let full_name = qualified_name(plugin, name);
        if self.lookup(&full_name).is_some() {
            warn!(service = %full_name, "service already registered");
            return Err(Error::DuplicateService(full_name));
        }

        let key = hash_str(&full_name);
        let service = Service {
            name: full_name.clone(),
            entry: Rc::new(entry),
        };
        self.services.insert(key, service).map_err(|e| match e {
            // a different name hashing to the same key
            Error::DuplicateKey(_) => Error::DuplicateService(full_name.clone()),
            other => other,
        })?;

        debug!(service = %full_name, "registered service");
        Ok(())
    }

    /// Remove `"<plugin>.<name>"`.
    pub fn unregister(&mut self, plugin: &str, name: &str) -> Result<()> {
        let full_name = qualified_name(plugin, name);
        if self.lookup(&full_name).is_none() {
            return Err(Error::ServiceNotFound(full_name));
        }
        self.services.erase(hash_str(&full_name));
        debug!(service = %full_name, "unregistered service");
        Ok(())
    }

    /// Remove every service in the plugin's namespace. Returns how many were
    /// removed.
    pub fn unregister_all(&mut self, plugin: &str) -> usize {
        let before = self.services.count();
        self.services
            .retain(|_, service| !in_namespace(&service.name, plugin));
        let removed = before - self.services.count();
        if removed > 0 {
            debug!(plugin, removed, "unregistered all services of plugin");
        }
        removed
    }

    fn lookup(&self, full_name: &str) -> Option<&Service> {
        self.services
            .find(hash_str(full_name))
            .filter(|service| service.name == full_name)
    }

    /// Look up a service by full name.
    pub fn get_raw(&self, full_name: &str) -> Option<&Service> {
        self.lookup(full_name)
    }

    /// Look up a service by full name and expected type.
    pub fn get<F: Clone + 'static>(&self, full_name: &str) -> Option<F> {
        self.lookup(full_name)?.downcast::<F>()
    }

    /// Whether a service with this full name exists.
    pub fn contains(&self, full_name: &str) -> bool {
        self.lookup(full_name).is_some()
    }

    /// Number of registered services.
    pub fn len(&self) -> usize {
        self.services.count()
    }

    /// Whether no service is registered.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Full names of all services.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.services.values().map(|service| service.name.as_str())
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.services.count())
            .finish()
    }
}
