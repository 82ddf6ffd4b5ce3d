// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Case-insensitive header map preserving insertion order.

/// Header collection for a request.
///
/// Names compare case-insensitively (RFC 7230 §3.2); iteration yields
/// entries in the order they arrived. Duplicate fields are kept separate;
/// [`HeaderMap::folded`] joins list-valued duplicates with `", "` but never
/// folds `Set-Cookie`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Append a field, keeping any existing fields with the same name.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), value.into()));
    }

    /// Replace every field named `name` with a single entry.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.remove(name);
        self.entries.push((name.to_string(), value.into()));
    }

    /// Remove every field named `name`.
    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
    }

    /// First value for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values for `name`, in arrival order.
    pub fn values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> {
        self.entries
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Folded view of a list-valued field: duplicates joined with `", "`.
    ///
    /// `Set-Cookie` is exempt from folding per RFC 7230 §3.2.2; for it only
    /// the first value is returned.
    pub fn folded(&self, name: &str) -> Option<String> {
        if name.eq_ignore_ascii_case("set-cookie") {
            return self.get(name).map(str::to_string);
        }
        let mut values = self.values(name);
        let first = values.next()?;
        let mut out = first.to_string();
        for value in values {
            out.push_str(", ");
            out.push_str(value);
        }
        Some(out)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// True when any value of `name` contains `token` as a comma-separated
    /// element, compared case-insensitively. Used for `Connection` and
    /// `Transfer-Encoding` checks.
    pub fn has_token(&self, name: &str, token: &str) -> bool {
        self.values(name).any(|value| {
            value.split(',').any(|part| part.trim().eq_ignore_ascii_case(token))
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }
}

#[cfg(test)]
#[path = "headers_tests.rs"]
mod tests;
