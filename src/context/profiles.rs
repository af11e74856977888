// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 planflow contributors

//! Read-only profile lookup handed to planners

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Profiles keyed by namespace (usually a planner or task name) and profile name.
///
/// Loading profiles is the caller's business; planflow only passes the
/// dictionary through to the planners.
#[derive(Clone, Default)]
pub struct ProfileDictionary {
    profiles: HashMap<String, HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl ProfileDictionary {
    /// Create an empty dictionary
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a profile
    pub fn add_profile<T: Any + Send + Sync>(
        &mut self,
        namespace: &str,
        name: &str,
        profile: T,
    ) {
        self.profiles
            .entry(namespace.to_string())
            .or_default()
            .insert(name.to_string(), Arc::new(profile));
    }

    /// Check whether a profile exists
    pub fn has_profile(&self, namespace: &str, name: &str) -> bool {
        self.profiles
            .get(namespace)
            .is_some_and(|ns| ns.contains_key(name))
    }

    /// Look up a profile of a given type
    pub fn get_profile<T: Any + Send + Sync>(&self, namespace: &str, name: &str) -> Option<Arc<T>> {
        let profile = self.profiles.get(namespace)?.get(name)?;
        Arc::clone(profile).downcast::<T>().ok()
    }

    /// Look up a profile, falling back to `default` when missing or of another type
    pub fn get_profile_or<T: Any + Send + Sync>(
        &self,
        namespace: &str,
        name: &str,
        default: Arc<T>,
    ) -> Arc<T> {
        self.get_profile(namespace, name).unwrap_or(default)
    }

    /// Namespaces with at least one profile, sorted
    pub fn namespaces(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for ProfileDictionary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileDictionary")
            .field("namespaces", &self.namespaces())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct MinLength(usize);

    #[test]
    fn test_profile_lookup() {
        let mut profiles = ProfileDictionary::new();
        profiles.add_profile("SeedMinLength", "DEFAULT", MinLength(10));

        assert!(profiles.has_profile("SeedMinLength", "DEFAULT"));
        assert_eq!(
            *profiles.get_profile::<MinLength>("SeedMinLength", "DEFAULT").unwrap(),
            MinLength(10)
        );
        assert!(profiles.get_profile::<String>("SeedMinLength", "DEFAULT").is_none());

        let fallback = profiles.get_profile_or("SeedMinLength", "RASTER", Arc::new(MinLength(3)));
        assert_eq!(*fallback, MinLength(3));
        assert_eq!(profiles.namespaces(), vec!["SeedMinLength"]);
    }
}
