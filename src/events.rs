//! Named events and their listeners.
//!
//! Events are created under `"<plugin>.<name>"`. Each event keeps its
//! listeners in registration order, tagged with the `"<plugin>."` namespace
//! of whoever registered them so a plugin's listeners can be swept when it
//! unloads. A plugin may listen to a given event at most once; listeners
//! registered without a plugin belong to the built-in namespace and are not
//! limited.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::hash::{hash_str, in_namespace, namespace_of, qualified_name, BUILTIN_NAMESPACE};
use crate::map::OrderedMap;

/// Listener callback. Receives the arguments passed to
/// [`EventRegistry::dispatch`].
pub type Listener = Rc<dyn Fn(&dyn Any)>;

/// Wrap a callback taking `&T` into a [`Listener`]-compatible closure.
///
/// Dispatches with arguments of another type are ignored.
pub fn typed<T, F>(callback: F) -> impl Fn(&dyn Any) + 'static
where
    T: 'static,
    F: Fn(&T) + 'static,
{
    move |args: &dyn Any| {
        if let Some(args) = args.downcast_ref::<T>() {
            callback(args);
        }
    }
}

struct ListenerEntry {
    namespace: String,
    callback: Listener,
}

/// A named event and its listeners.
pub struct Event {
    name: String,
    listeners: Vec<ListenerEntry>,
}

impl Event {
    fn new(name: String) -> Self {
        Self {
            name,
            listeners: Vec::new(),
        }
    }

    /// Fully qualified name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Namespaces of the listeners, in registration order.
    pub fn listener_namespaces(&self) -> impl Iterator<Item = &str> + '_ {
        self.listeners.iter().map(|l| l.namespace.as_str())
    }

    /// Listener callbacks, in registration order.
    pub fn listeners(&self) -> impl Iterator<Item = &Listener> + '_ {
        self.listeners.iter().map(|l| &l.callback)
    }

    /// Whether a listener from `plugin` is registered.
    pub fn has_listener(&self, plugin: &str) -> bool {
        let namespace = namespace_of(plugin);
        self.listeners.iter().any(|l| l.namespace == namespace)
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("name", &self.name)
            .field("listeners", &self.listener_namespaces().collect::<Vec<_>>())
            .finish()
    }
}

/// Directory of events for one game instance.
#[derive(Default)]
pub struct EventRegistry {
    events: OrderedMap<Event>,
}

impl EventRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the event `"<plugin>.<name>"` with no listeners.
    pub fn create(&mut self, plugin: &str, name: &str) -> Result<()> {
        self.create_full(qualified_name(plugin, name))
    }

    pub(crate) fn create_full(&mut self, full_name: String) -> Result<()> {
        if self.get(&full_name).is_some() {
            warn!(event = %full_name, "event already exists");
            return Err(Error::DuplicateEvent(full_name));
        }
        let key = hash_str(&full_name);
        self.events
            .insert(key, Event::new(full_name.clone()))
            .map_err(|e| match e {
                Error::DuplicateKey(_) => Error::DuplicateEvent(full_name.clone()),
                other => other,
            })?;
        debug!(event = %full_name, "created event");
        Ok(())
    }

    /// Destroy an event by full name, dropping its listeners.
    pub fn destroy(&mut self, full_name: &str) -> Result<()> {
        if self.get(full_name).is_none() {
            return Err(Error::EventNotFound(full_name.to_string()));
        }
        self.events.erase(hash_str(full_name));
        debug!(event = full_name, "destroyed event");
        Ok(())
    }

    /// Destroy `"<plugin>.<name>"`.
    pub fn destroy_plugin_event(&mut self, plugin: &str, name: &str) -> Result<()> {
        self.destroy(&qualified_name(plugin, name))
    }

    /// Destroy every event in the plugin's namespace. Returns how many were
    /// destroyed.
    pub fn destroy_all_plugin_events(&mut self, plugin: &str) -> usize {
        let before = self.events.count();
        self.events.retain(|_, event| !in_namespace(&event.name, plugin));
        let removed = before - self.events.count();
        if removed > 0 {
            debug!(plugin, removed, "destroyed all events of plugin");
        }
        removed
    }

    /// Look up an event by full name.
    pub fn get(&self, full_name: &str) -> Option<&Event> {
        self.events
            .find(hash_str(full_name))
            .filter(|event| event.name == full_name)
    }

    fn get_mut(&mut self, full_name: &str) -> Option<&mut Event> {
        self.events
            .find_mut(hash_str(full_name))
            .filter(|event| event.name == full_name)
    }

    /// Listen to `event_full_name`.
    ///
    /// `plugin` is the registering plugin's name; `None` registers a built-in
    /// listener. Fails if the event does not exist, or if the plugin already
    /// listens to it.
    pub fn register_listener<F>(
        &mut self,
        plugin: Option<&str>,
        event_full_name: &str,
        callback: F,
    ) -> Result<()>
    where
        F: Fn(&dyn Any) + 'static,
    {
        let namespace = namespace_of(plugin.unwrap_or(BUILTIN_NAMESPACE));
        let event = self
            .get_mut(event_full_name)
            .ok_or_else(|| Error::EventNotFound(event_full_name.to_string()))?;

        if plugin.is_some() && event.listeners.iter().any(|l| l.namespace == namespace) {
            warn!(event = event_full_name, namespace = %namespace, "listener already registered");
            return Err(Error::DuplicateListener {
                namespace,
                event: event_full_name.to_string(),
            });
        }

        debug!(event = event_full_name, namespace = %namespace, "registered listener");
        event.listeners.push(ListenerEntry {
            namespace,
            callback: Rc::new(callback),
        });
        Ok(())
    }

    /// Remove the first listener `plugin` registered on `event_full_name`.
    pub fn unregister_listener(&mut self, plugin: &str, event_full_name: &str) -> Result<()> {
        let namespace = namespace_of(plugin);
        let event = self
            .get_mut(event_full_name)
            .ok_or_else(|| Error::EventNotFound(event_full_name.to_string()))?;

        let Some(index) = event.listeners.iter().position(|l| l.namespace == namespace) else {
            return Err(Error::ListenerNotFound {
                namespace,
                event: event_full_name.to_string(),
            });
        };
        event.listeners.remove(index);
        debug!(event = event_full_name, namespace = %namespace, "unregistered listener");
        Ok(())
    }

    /// Remove every listener from one event. Returns how many were removed.
    pub fn unregister_all_listeners(&mut self, event_full_name: &str) -> Result<usize> {
        let event = self
            .get_mut(event_full_name)
            .ok_or_else(|| Error::EventNotFound(event_full_name.to_string()))?;
        Ok(std::mem::take(&mut event.listeners).len())
    }

    /// Remove the plugin's listeners from every event. Returns how many were
    /// removed.
    pub fn unregister_all_listeners_of_plugin(&mut self, plugin: &str) -> usize {
        let namespace = namespace_of(plugin);
        let mut removed = 0;
        for event in self.events.values_mut() {
            let before = event.listeners.len();
            event.listeners.retain(|l| l.namespace != namespace);
            removed += before - event.listeners.len();
        }
        if removed > 0 {
            debug!(plugin, removed, "unregistered all listeners of plugin");
        }
        removed
    }

    /// Call every listener of `event_full_name` in registration order.
    ///
    /// Returns the number of listeners called.
    pub fn dispatch(&self, event_full_name: &str, args: &dyn Any) -> Result<usize> {
        let event = self
            .get(event_full_name)
            .ok_or_else(|| Error::EventNotFound(event_full_name.to_string()))?;
        for listener in &event.listeners {
            (listener.callback)(args);
        }
        Ok(event.listeners.len())
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.count()
    }

    /// Whether no event exists.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Full names of all events.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.events.values().map(|event| event.name.as_str())
    }
}

impl fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRegistry")
            .field("events", &self.events.count())
            .finish()
    }
}
