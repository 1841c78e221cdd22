// src/plan/template.rs

//! `%(name)s` template substitution
//!
//! Build descriptions are stored as templates plus a binding table so a plan
//! records exactly what was substituted. Only `%(identifier)s` is special;
//! any other `%` (RPM macros, `printf` formats) passes through untouched.
//! Substitution is a single pass, so bound values are never re-expanded.

use crate::error::{Error, Result};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%\(([A-Za-z_][A-Za-z0-9_]*)\)s").unwrap());

/// Substitute every placeholder in `template`
///
/// Fails with [`Error::MissingVariable`] naming the first unbound variable.
pub fn render(template: &str, bindings: &BTreeMap<String, String>) -> Result<String> {
    let mut output = String::with_capacity(template.len());
    let mut last = 0;

    for caps in PLACEHOLDER_RE.captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let value = bindings
            .get(name.as_str())
            .ok_or_else(|| Error::MissingVariable(name.as_str().to_string()))?;
        output.push_str(&template[last..whole.start()]);
        output.push_str(value);
        last = whole.end();
    }

    output.push_str(&template[last..]);
    Ok(output)
}

/// Names referenced by a template, sorted
pub fn variables(template: &str) -> BTreeSet<String> {
    PLACEHOLDER_RE
        .captures_iter(template)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_substitutes() {
        let vars = bindings(&[("name", "zlib"), ("version", "1.3")]);
        assert_eq!(render("%(name)s-%(version)s.tar.gz", &vars).unwrap(), "zlib-1.3.tar.gz");
    }

    #[test]
    fn test_render_leaves_other_percents() {
        let vars = bindings(&[("name", "zlib")]);
        assert_eq!(
            render("%{buildroot}/%(name)s 100% %s", &vars).unwrap(),
            "%{buildroot}/zlib 100% %s"
        );
    }

    #[test]
    fn test_values_not_reexpanded() {
        let vars = bindings(&[("a", "%(b)s")]);
        assert_eq!(render("x%(a)sy", &vars).unwrap(), "x%(b)sy");
    }

    #[test]
    fn test_missing_variable() {
        let err = render("make DESTDIR=%(destdir)s", &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, Error::MissingVariable(name) if name == "destdir"));
    }

    #[test]
    fn test_variables() {
        let names = variables("%(b)s %(a)s %(b)s %(not closed");
        assert_eq!(names.into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
