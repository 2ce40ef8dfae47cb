//! Flat key/value view over one qualifier
//!
//! [`LegacyPreferences`] presents `/instance/<qualifier>` as a single
//! property store whose defaults come from `/default/<qualifier>`. Writing
//! the default value removes the explicit setting, so the instance node only
//! holds values that differ from their defaults.

use crate::error::Result;
use std::str::FromStr;
use std::sync::Arc;
use strata_core::{ListenerId, PreferenceChangeEvent, PreferenceTree, Preferences};
use strata_scopes::{DEFAULT_SCOPE, INSTANCE_SCOPE};

/// Which node a proxied change came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertySource {
    /// Explicit setting changed
    Instance,
    /// Default value changed
    Default,
}

/// Change reported to legacy listeners
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyChangeEvent {
    /// Property name
    pub name: String,
    /// Previous value
    pub old_value: Option<String>,
    /// Effective new value; removing an explicit setting reports the default
    pub new_value: Option<String>,
    /// Node the change came from
    pub source: PropertySource,
}

/// Registration handle covering both proxied nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyListener {
    instance: ListenerId,
    defaults: ListenerId,
}

/// Single-store view of one qualifier
#[derive(Debug, Clone)]
pub struct LegacyPreferences {
    instance: Preferences,
    defaults: Preferences,
}

fn parse_bool(value: &str) -> Option<bool> {
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

impl LegacyPreferences {
    /// View over `/instance/<qualifier>` with defaults from
    /// `/default/<qualifier>`
    ///
    /// # Errors
    /// Returns error if either node cannot be navigated to
    pub fn new(tree: &PreferenceTree, qualifier: &str) -> Result<Self> {
        let root = tree.root();
        Ok(Self::with_nodes(
            root.node(INSTANCE_SCOPE)?.node(qualifier)?,
            root.node(DEFAULT_SCOPE)?.node(qualifier)?,
        ))
    }

    /// View over arbitrary nodes
    #[must_use]
    pub fn with_nodes(instance: Preferences, defaults: Preferences) -> Self {
        Self { instance, defaults }
    }

    /// Node holding explicit settings
    #[must_use]
    pub fn instance_node(&self) -> &Preferences {
        &self.instance
    }

    /// Node holding defaults
    #[must_use]
    pub fn default_node(&self) -> &Preferences {
        &self.defaults
    }

    /// Check if a property has an explicit or default value
    ///
    /// # Errors
    /// Returns error if a node was removed
    pub fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.instance.get(name)?.is_some() || self.defaults.get(name)?.is_some())
    }

    fn effective(&self, name: &str) -> Result<Option<String>> {
        match self.instance.get(name)? {
            Some(value) => Ok(Some(value)),
            None => Ok(self.defaults.get(name)?),
        }
    }

    fn effective_parsed<T, F>(&self, name: &str, parse: F, fallback: T) -> Result<T>
    where
        F: Fn(&str) -> Option<T>,
    {
        if let Some(value) = self.instance.get(name)?.and_then(|v| parse(&v)) {
            return Ok(value);
        }
        self.default_parsed(name, parse, fallback)
    }

    fn default_parsed<T, F>(&self, name: &str, parse: F, fallback: T) -> Result<T>
    where
        F: Fn(&str) -> Option<T>,
    {
        Ok(self.defaults.get(name)?.and_then(|v| parse(&v)).unwrap_or(fallback))
    }

    // ------------------------------------------------------------------
    // Effective values
    // ------------------------------------------------------------------

    /// Effective string value, `""` if unset
    ///
    /// # Errors
    /// Returns error if a node was removed
    pub fn get_string(&self, name: &str) -> Result<String> {
        Ok(self.effective(name)?.unwrap_or_default())
    }

    /// Effective boolean value, `false` if unset
    ///
    /// # Errors
    /// Returns error if a node was removed
    pub fn get_bool(&self, name: &str) -> Result<bool> {
        self.effective_parsed(name, parse_bool, false)
    }

    /// Effective `i32` value, `0` if unset
    ///
    /// # Errors
    /// Returns error if a node was removed
    pub fn get_i32(&self, name: &str) -> Result<i32> {
        self.effective_parsed(name, |v| i32::from_str(v).ok(), 0)
    }

    /// Effective `i64` value, `0` if unset
    ///
    /// # Errors
    /// Returns error if a node was removed
    pub fn get_i64(&self, name: &str) -> Result<i64> {
        self.effective_parsed(name, |v| i64::from_str(v).ok(), 0)
    }

    /// Effective `f32` value, `0.0` if unset
    ///
    /// # Errors
    /// Returns error if a node was removed
    pub fn get_f32(&self, name: &str) -> Result<f32> {
        self.effective_parsed(name, |v| f32::from_str(v).ok(), 0.0)
    }

    /// Effective `f64` value, `0.0` if unset
    ///
    /// # Errors
    /// Returns error if a node was removed
    pub fn get_f64(&self, name: &str) -> Result<f64> {
        self.effective_parsed(name, |v| f64::from_str(v).ok(), 0.0)
    }

    // ------------------------------------------------------------------
    // Default values
    // ------------------------------------------------------------------

    /// Default string value, `""` if unset
    ///
    /// # Errors
    /// Returns error if the defaults node was removed
    pub fn get_default_string(&self, name: &str) -> Result<String> {
        Ok(self.defaults.get(name)?.unwrap_or_default())
    }

    /// Default boolean value, `false` if unset
    ///
    /// # Errors
    /// Returns error if the defaults node was removed
    pub fn get_default_bool(&self, name: &str) -> Result<bool> {
        self.default_parsed(name, parse_bool, false)
    }

    /// Default `i32` value, `0` if unset
    ///
    /// # Errors
    /// Returns error if the defaults node was removed
    pub fn get_default_i32(&self, name: &str) -> Result<i32> {
        self.default_parsed(name, |v| i32::from_str(v).ok(), 0)
    }

    /// Default `i64` value, `0` if unset
    ///
    /// # Errors
    /// Returns error if the defaults node was removed
    pub fn get_default_i64(&self, name: &str) -> Result<i64> {
        self.default_parsed(name, |v| i64::from_str(v).ok(), 0)
    }

    /// Default `f32` value, `0.0` if unset
    ///
    /// # Errors
    /// Returns error if the defaults node was removed
    pub fn get_default_f32(&self, name: &str) -> Result<f32> {
        self.default_parsed(name, |v| f32::from_str(v).ok(), 0.0)
    }

    /// Default `f64` value, `0.0` if unset
    ///
    /// # Errors
    /// Returns error if the defaults node was removed
    pub fn get_default_f64(&self, name: &str) -> Result<f64> {
        self.default_parsed(name, |v| f64::from_str(v).ok(), 0.0)
    }

    // ------------------------------------------------------------------
    // Setters
    // ------------------------------------------------------------------

    fn store(&self, name: &str, value: &str, is_default: bool) -> Result<()> {
        if is_default {
            self.instance.remove(name)?;
        } else {
            self.instance.put(name, value)?;
        }
        Ok(())
    }

    /// Set a string value; the default value removes the explicit setting
    ///
    /// # Errors
    /// Returns error for an empty name or a removed node
    pub fn set_value(&self, name: &str, value: &str) -> Result<()> {
        let is_default = self.get_default_string(name)? == value;
        self.store(name, value, is_default)
    }

    /// Set a boolean value
    ///
    /// # Errors
    /// Returns error for an empty name or a removed node
    pub fn set_value_bool(&self, name: &str, value: bool) -> Result<()> {
        let is_default = self.get_default_bool(name)? == value;
        self.store(name, &value.to_string(), is_default)
    }

    /// Set an `i32` value
    ///
    /// # Errors
    /// Returns error for an empty name or a removed node
    pub fn set_value_i32(&self, name: &str, value: i32) -> Result<()> {
        let is_default = self.get_default_i32(name)? == value;
        self.store(name, &value.to_string(), is_default)
    }

    /// Set an `i64` value
    ///
    /// # Errors
    /// Returns error for an empty name or a removed node
    pub fn set_value_i64(&self, name: &str, value: i64) -> Result<()> {
        let is_default = self.get_default_i64(name)? == value;
        self.store(name, &value.to_string(), is_default)
    }

    /// Set an `f32` value
    ///
    /// # Errors
    /// Returns error for an empty name or a removed node
    #[allow(clippy::float_cmp)]
    pub fn set_value_f32(&self, name: &str, value: f32) -> Result<()> {
        let is_default = self.get_default_f32(name)? == value;
        self.store(name, &value.to_string(), is_default)
    }

    /// Set an `f64` value
    ///
    /// # Errors
    /// Returns error for an empty name or a removed node
    #[allow(clippy::float_cmp)]
    pub fn set_value_f64(&self, name: &str, value: f64) -> Result<()> {
        let is_default = self.get_default_f64(name)? == value;
        self.store(name, &value.to_string(), is_default)
    }

    /// Set a default string value
    ///
    /// # Errors
    /// Returns error for an empty name or a removed node
    pub fn set_default(&self, name: &str, value: &str) -> Result<()> {
        Ok(self.defaults.put(name, value)?)
    }

    /// Set a default boolean value
    ///
    /// # Errors
    /// Returns error for an empty name or a removed node
    pub fn set_default_bool(&self, name: &str, value: bool) -> Result<()> {
        Ok(self.defaults.put_bool(name, value)?)
    }

    /// Set a default `i32` value
    ///
    /// # Errors
    /// Returns error for an empty name or a removed node
    pub fn set_default_i32(&self, name: &str, value: i32) -> Result<()> {
        Ok(self.defaults.put_i32(name, value)?)
    }

    /// Set a default `i64` value
    ///
    /// # Errors
    /// Returns error for an empty name or a removed node
    pub fn set_default_i64(&self, name: &str, value: i64) -> Result<()> {
        Ok(self.defaults.put_i64(name, value)?)
    }

    /// Set a default `f32` value
    ///
    /// # Errors
    /// Returns error for an empty name or a removed node
    pub fn set_default_f32(&self, name: &str, value: f32) -> Result<()> {
        Ok(self.defaults.put_f32(name, value)?)
    }

    /// Set a default `f64` value
    ///
    /// # Errors
    /// Returns error for an empty name or a removed node
    pub fn set_default_f64(&self, name: &str, value: f64) -> Result<()> {
        Ok(self.defaults.put_f64(name, value)?)
    }

    /// Drop the explicit setting of a property
    ///
    /// # Errors
    /// Returns error if the instance node was removed
    pub fn set_to_default(&self, name: &str) -> Result<()> {
        Ok(self.instance.remove(name)?)
    }

    /// Check if a property has no explicit setting
    ///
    /// # Errors
    /// Returns error if the instance node was removed
    pub fn is_default(&self, name: &str) -> Result<bool> {
        Ok(self.instance.get(name)?.is_none())
    }

    /// Names with an explicit setting
    ///
    /// # Errors
    /// Returns error if the instance node was removed
    pub fn property_names(&self) -> Result<Vec<String>> {
        Ok(self.instance.keys()?)
    }

    /// Names with a default value
    ///
    /// # Errors
    /// Returns error if the defaults node was removed
    pub fn default_property_names(&self) -> Result<Vec<String>> {
        Ok(self.defaults.keys()?)
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Check if explicit settings have unsaved changes
    #[must_use]
    pub fn needs_saving(&self) -> bool {
        self.instance.is_dirty()
    }

    /// Persist explicit settings
    ///
    /// # Errors
    /// Returns error if the backing store write fails
    pub fn save(&self) -> Result<()> {
        Ok(self.instance.flush()?)
    }

    // ------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------

    /// Listen to changes of explicit settings and defaults
    ///
    /// # Errors
    /// Returns error if a node was removed
    pub fn add_property_change_listener<F>(&self, listener: F) -> Result<LegacyListener>
    where
        F: Fn(&PropertyChangeEvent) + Send + Sync + 'static,
    {
        let listener = Arc::new(listener);
        let defaults_path = self.defaults.absolute_path().to_string();

        let on_instance = Arc::clone(&listener);
        let instance = self.instance.add_preference_change_listener(
            move |event: &PreferenceChangeEvent| {
                let new_value = match &event.new_value {
                    Some(value) => Some(value.clone()),
                    None => event
                        .node
                        .node(&defaults_path)
                        .and_then(|defaults| defaults.get(&event.key))
                        .unwrap_or(None),
                };
                (*on_instance)(&PropertyChangeEvent {
                    name: event.key.clone(),
                    old_value: event.old_value.clone(),
                    new_value,
                    source: PropertySource::Instance,
                });
            },
        )?;

        let defaults = self.defaults.add_preference_change_listener(
            move |event: &PreferenceChangeEvent| {
                (*listener)(&PropertyChangeEvent {
                    name: event.key.clone(),
                    old_value: event.old_value.clone(),
                    new_value: event.new_value.clone(),
                    source: PropertySource::Default,
                });
            },
        );
        let defaults = match defaults {
            Ok(id) => id,
            Err(err) => {
                self.instance.remove_preference_change_listener(instance)?;
                return Err(err.into());
            }
        };
        Ok(LegacyListener { instance, defaults })
    }

    /// Stop a listener; returns `false` if it was not registered
    ///
    /// # Errors
    /// Returns error if a node was removed
    pub fn remove_property_change_listener(&self, handle: LegacyListener) -> Result<bool> {
        let instance = self.instance.remove_preference_change_listener(handle.instance)?;
        let defaults = self.defaults.remove_preference_change_listener(handle.defaults)?;
        Ok(instance || defaults)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn legacy() -> LegacyPreferences {
        let tree = PreferenceTree::new();
        let prefs = LegacyPreferences::new(&tree, "app").unwrap();
        prefs.set_default("color", "black").unwrap();
        prefs.set_default_i32("size", 10).unwrap();
        prefs
    }

    #[test]
    fn defaults_fill_missing_values() {
        let prefs = legacy();
        assert_eq!(prefs.get_string("color").unwrap(), "black");
        assert_eq!(prefs.get_i32("size").unwrap(), 10);
        assert_eq!(prefs.get_string("missing").unwrap(), "");
        assert!(!prefs.get_bool("missing").unwrap());
        assert!(prefs.contains("color").unwrap());
        assert!(!prefs.contains("missing").unwrap());
    }

    #[test]
    fn writing_default_removes_setting() {
        let prefs = legacy();
        prefs.set_value("color", "blue").unwrap();
        assert!(!prefs.is_default("color").unwrap());
        assert_eq!(prefs.property_names().unwrap(), vec!["color"]);

        prefs.set_value("color", "black").unwrap();
        assert!(prefs.is_default("color").unwrap());
        assert!(prefs.property_names().unwrap().is_empty());

        prefs.set_value_i32("size", 10).unwrap();
        assert!(prefs.is_default("size").unwrap());
        prefs.set_value_i32("size", 12).unwrap();
        assert_eq!(prefs.get_i32("size").unwrap(), 12);
        prefs.set_to_default("size").unwrap();
        assert_eq!(prefs.get_i32("size").unwrap(), 10);
    }

    #[test]
    fn unparseable_setting_falls_back_to_default() {
        let prefs = legacy();
        prefs.instance_node().put("size", "huge").unwrap();
        assert_eq!(prefs.get_i32("size").unwrap(), 10);
        assert_eq!(prefs.get_default_i64("size").unwrap(), 10);
    }

    #[test]
    fn listener_sees_default_on_removal() {
        let prefs = legacy();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let handle = prefs
            .add_property_change_listener(move |e| sink.lock().push(e.clone()))
            .unwrap();

        prefs.set_value("color", "blue").unwrap();
        prefs.set_to_default("color").unwrap();
        prefs.set_default("color", "white").unwrap();

        {
            let events = seen.lock();
            assert_eq!(events.len(), 3);
            assert_eq!(events[0].new_value.as_deref(), Some("blue"));
            assert_eq!(events[1].old_value.as_deref(), Some("blue"));
            assert_eq!(events[1].new_value.as_deref(), Some("black"));
            assert_eq!(events[1].source, PropertySource::Instance);
            assert_eq!(events[2].source, PropertySource::Default);
        }

        assert!(prefs.remove_property_change_listener(handle).unwrap());
        prefs.set_value("color", "red").unwrap();
        assert_eq!(seen.lock().len(), 3);
    }
}
