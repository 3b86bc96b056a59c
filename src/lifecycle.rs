//! Plugin lifecycle states and observer hooks.

use std::time::Instant;

/// Where a plugin is in its load/start/stop/unload cycle.
///
/// `Loaded` and `Stopped` are equivalent for the purpose of starting again;
/// only `Started` plugins are presumed to be providing services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LifecycleState {
    /// Not attached to any game.
    #[default]
    Unloaded,
    /// Module opened and `plugin_init` returned a plugin object.
    Loaded,
    /// `plugin_start` succeeded.
    Started,
    /// `plugin_stop` ran.
    Stopped,
}

impl LifecycleState {
    /// Check if the plugin can be started.
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Loaded | Self::Stopped)
    }

    /// Check if the plugin needs stopping before it can be unloaded.
    pub fn can_stop(&self) -> bool {
        matches!(self, Self::Started)
    }

    /// Check if the plugin is expected to serve calls.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Started)
    }

    /// Get the state name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unloaded => "unloaded",
            Self::Loaded => "loaded",
            Self::Started => "started",
            Self::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to a plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Loaded from `file` and attached to the game.
    Loaded {
        /// File the plugin came from.
        file: String,
    },
    /// `plugin_start` succeeded.
    Started,
    /// `plugin_stop` ran.
    Stopped,
    /// Deinitialized and its module closed.
    Unloaded,
    /// A load or start attempt failed.
    Failed {
        /// Error message.
        message: String,
    },
}

impl Transition {
    /// Short name, e.g. `"loaded"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loaded { .. } => "loaded",
            Self::Started => "started",
            Self::Stopped => "stopped",
            Self::Unloaded => "unloaded",
            Self::Failed { .. } => "failed",
        }
    }
}

/// A transition observed by [`LifecycleHooks`].
#[derive(Debug, Clone)]
pub struct LifecycleEvent {
    plugin: String,
    transition: Transition,
    at: Instant,
}

impl LifecycleEvent {
    /// Record `transition` of `plugin`, timestamped now.
    pub fn new(plugin: impl Into<String>, transition: Transition) -> Self {
        Self {
            plugin: plugin.into(),
            transition,
            at: Instant::now(),
        }
    }

    /// Plugin the event is about. For failed loads this is the requested name.
    pub fn plugin_name(&self) -> &str {
        &self.plugin
    }

    /// The transition.
    pub fn transition(&self) -> &Transition {
        &self.transition
    }

    /// When it happened.
    pub fn timestamp(&self) -> Instant {
        self.at
    }

    /// Short transition name.
    pub fn event_name(&self) -> &'static str {
        self.transition.as_str()
    }
}

/// Observers notified by the plugin manager.
#[derive(Default)]
pub struct LifecycleHooks {
    observers: Vec<Box<dyn Fn(&LifecycleEvent)>>,
}

impl LifecycleHooks {
    /// Create an empty observer list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer. Observers run in registration order.
    pub fn on_event<F>(&mut self, observer: F)
    where
        F: Fn(&LifecycleEvent) + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    /// Number of observers.
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Whether nobody is observing.
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Notify every observer of `event`.
    pub fn emit(&self, event: &LifecycleEvent) {
        self.observers.iter().for_each(|observer| observer(event));
    }

    fn notify(&self, plugin: &str, transition: Transition) {
        if !self.observers.is_empty() {
            self.emit(&LifecycleEvent::new(plugin, transition));
        }
    }

    pub(crate) fn emit_loaded(&self, plugin: &str, file: &str) {
        self.notify(
            plugin,
            Transition::Loaded {
                file: file.to_string(),
            },
        );
    }

    pub(crate) fn emit_started(&self, plugin: &str) {
        self.notify(plugin, Transition::Started);
    }

    pub(crate) fn emit_stopped(&self, plugin: &str) {
        self.notify(plugin, Transition::Stopped);
    }

    pub(crate) fn emit_unloaded(&self, plugin: &str) {
        self.notify(plugin, Transition::Unloaded);
    }

    pub(crate) fn emit_failed(&self, plugin: &str, message: &str) {
        self.notify(
            plugin,
            Transition::Failed {
                message: message.to_string(),
            },
        );
    }
}

impl std::fmt::Debug for LifecycleHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleHooks")
            .field("observers", &self.observers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_state_predicates() {
        assert!(LifecycleState::Loaded.can_start());
        assert!(LifecycleState::Stopped.can_start());
        assert!(!LifecycleState::Started.can_start());
        assert!(!LifecycleState::Unloaded.can_start());

        assert!(LifecycleState::Started.can_stop());
        assert!(!LifecycleState::Stopped.can_stop());
        assert!(!LifecycleState::Loaded.can_stop());

        assert!(LifecycleState::Started.is_active());
        assert_eq!(LifecycleState::default(), LifecycleState::Unloaded);
        assert_eq!(LifecycleState::Stopped.to_string(), "stopped");
    }

    #[test]
    fn test_observers_see_transitions_in_order() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);

        let mut hooks = LifecycleHooks::new();
        hooks.on_event(move |event| sink.borrow_mut().push(event.transition().clone()));

        hooks.emit_loaded("renderer_gl", "renderer_gl-0-2-11.so");
        hooks.emit_started("renderer_gl");
        hooks.emit_stopped("renderer_gl");
        hooks.emit_unloaded("renderer_gl");
        hooks.emit_failed("input", "module input-1-0-0.so does not export plugin_stop");

        let seen = seen.borrow();
        assert_eq!(seen.len(), 5);
        assert_eq!(
            seen[0],
            Transition::Loaded {
                file: "renderer_gl-0-2-11.so".into()
            }
        );
        assert_eq!(seen[3], Transition::Unloaded);
        assert!(matches!(&seen[4], Transition::Failed { message } if message.contains("plugin_stop")));
    }

    #[test]
    fn test_event_accessors() {
        let event = LifecycleEvent::new("menu", Transition::Started);

        assert_eq!(event.plugin_name(), "menu");
        assert_eq!(event.event_name(), "started");
        assert!(event.timestamp() <= Instant::now());
    }
}
