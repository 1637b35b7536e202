use std::sync::LazyLock;

use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::errors::Error;
use crate::render::{Template, STD_VARS};

/// Matches a `<Placeholder>` token in a generic name or reference.
static RE_VAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<([[:word:]]+)>").unwrap());

/// Placeholder names extracted from a name or parametric reference, in
/// order of appearance.
pub fn template_vars(name: &str) -> Vec<String> {
    RE_VAR
        .captures_iter(name)
        .map(|c| c[1].to_string())
        .collect()
}

/// A generic declaration as collected from pragma comments, before
/// compilation into a [`Generic`].
#[derive(Debug, Clone, Default)]
pub struct GenericDecl {
    pub package_name: String,
    pub name: String,
    pub needs: Vec<String>,
    pub embeds: Vec<String>,
    pub required_vars: Vec<String>,
    pub common: bool,
    pub source: String,
}

/// A compiled generic: the declarative record plus the derived matching
/// and rendering machinery. Immutable once added to a [`Store`].
#[derive(Debug)]
pub struct Generic {
    pub package_name: String,
    pub name: String,
    pub vars: Vec<String>,
    pub needs: Vec<String>,
    pub embeds: Vec<String>,
    pub required_vars: Vec<String>,
    pub common: bool,

    /// Name with whitespace removed and placeholder brackets stripped,
    /// e.g. `Observable<Foo> Map<Bar>` → `ObservableFooMapBar`.
    identifier: String,
    /// Anchored match pattern, e.g. `^Observable([[:word:]]*) Map([[:word:]]*)$`.
    signature: Regex,
    name_tpl: Template,
    source_tpl: Template,
}

impl Generic {
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Render the fragment name for a substitution map, e.g. `StringStack`.
    pub fn render_name(&self, dot: &FxHashMap<String, String>) -> Result<String, Error> {
        self.name_tpl.render(dot)
    }

    /// Render the fragment source for a substitution map.
    pub fn render_source(&self, dot: &FxHashMap<String, String>) -> Result<String, Error> {
        self.source_tpl.render(dot)
    }
}

/// Owns the loaded generics, sorted so that [`Store::find`] tries the most
/// specific match first.
#[derive(Debug, Default)]
pub struct Store {
    generics: Vec<Generic>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.generics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.generics.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Generic> {
        self.generics.iter()
    }

    /// Compile and add one generic. Rejects declarations that violate the
    /// store invariants (duplicate names, repeated or excess placeholders,
    /// dangling placeholder references).
    pub fn add(&mut self, decl: GenericDecl) -> Result<(), Error> {
        let vars = template_vars(&decl.name);
        if vars.len() > STD_VARS.len() {
            return Err(Error::TooManyVars {
                name: decl.name,
                count: vars.len(),
            });
        }
        let mut seen = FxHashSet::default();
        for var in &vars {
            if !seen.insert(var.as_str()) {
                return Err(Error::RepeatedVar {
                    name: decl.name.clone(),
                    var: var.clone(),
                });
            }
        }
        for (clause, refs) in [("needs", &decl.needs), ("embeds", &decl.embeds)] {
            for reference in refs {
                for var in template_vars(reference) {
                    if !vars.contains(&var) {
                        return Err(Error::UnknownVar {
                            name: decl.name.clone(),
                            clause,
                            var,
                        });
                    }
                }
            }
        }
        for var in &decl.required_vars {
            if !vars.contains(var) {
                return Err(Error::UnknownVar {
                    name: decl.name,
                    clause: "required-vars",
                    var: var.clone(),
                });
            }
        }
        if self.generics.iter().any(|g| g.name == decl.name) {
            return Err(Error::DuplicateGeneric { name: decl.name });
        }

        // Identifier: drop whitespace, then strip the placeholder brackets.
        let mut identifier: String = decl.name.chars().filter(|c| !c.is_whitespace()).collect();
        for var in &vars {
            identifier = identifier.replace(&format!("<{var}>"), var);
        }

        // Remap author placeholders to the canonical variable set. The
        // lowercase placeholder form carries the real type in source.
        let mut name_text = identifier.clone();
        let mut source_text = decl.source.clone();
        for (i, var) in vars.iter().enumerate() {
            name_text = name_text.replace(var, &format!("{{{{.{}}}}}", STD_VARS[i]));
            source_text = source_text.replace(var, &format!("{{{{.{}}}}}", STD_VARS[i]));
            source_text = source_text.replace(
                &var.to_lowercase(),
                &format!("{{{{.{}}}}}", STD_VARS[i].to_lowercase()),
            );
        }
        let name_tpl = Template::compile(&decl.name, &name_text)?;
        let source_tpl = Template::compile(&decl.name, &source_text)?;

        // Signature: literal runs escaped, each placeholder a word capture.
        let mut pattern = String::from("^");
        let mut last = 0;
        for m in RE_VAR.find_iter(&decl.name) {
            pattern.push_str(&regex::escape(&decl.name[last..m.start()]));
            pattern.push_str(r"([[:word:]]*)");
            last = m.end();
        }
        pattern.push_str(&regex::escape(&decl.name[last..]));
        pattern.push('$');
        let signature = Regex::new(&pattern).map_err(|e| Error::Template {
            template: decl.name.clone(),
            detail: e.to_string(),
        })?;

        // Self-consistency: the pattern must accept the bracket-stripped name.
        let mut probe = decl.name.clone();
        for var in &vars {
            probe = probe.replace(&format!("<{var}>"), var);
        }
        if !signature.is_match(&probe) {
            return Err(Error::BadSignature { name: decl.name });
        }

        self.generics.push(Generic {
            package_name: decl.package_name,
            name: decl.name,
            vars,
            needs: decl.needs,
            embeds: decl.embeds,
            required_vars: decl.required_vars,
            common: decl.common,
            identifier,
            signature,
            name_tpl,
            source_tpl,
        });
        Ok(())
    }

    /// Add all generics of one package. When `inject_common` is set, the
    /// package's common generics are prepended to every non-common
    /// generic's needs, giving support utilities a single declaration point.
    pub fn add_package(
        &mut self,
        decls: Vec<GenericDecl>,
        inject_common: bool,
    ) -> Result<usize, Error> {
        let commons: Vec<String> = decls
            .iter()
            .filter(|d| d.common)
            .map(|d| d.name.clone())
            .collect();
        let count = decls.len();
        for mut decl in decls {
            if inject_common && !decl.common {
                let mut needs = commons.clone();
                needs.append(&mut decl.needs);
                decl.needs = needs;
            }
            self.add(decl)?;
        }
        Ok(count)
    }

    /// Sort for matching: most placeholders first, longest name first
    /// within a tier, so the most specific generic is tried first.
    pub fn sort(&mut self) {
        self.generics.sort_by(|a, b| {
            b.vars
                .len()
                .cmp(&a.vars.len())
                .then_with(|| b.name.len().cmp(&a.name.len()))
        });
    }

    /// Find the first generic whose signature matches in full. When
    /// `parent_types` is non-empty, every captured type must be one of
    /// them. Generics with required vars reject empty captures.
    pub fn find(&self, signature: &str, parent_types: &[String]) -> Option<(&Generic, Vec<String>)> {
        for generic in &self.generics {
            let Some(caps) = generic.signature.captures(signature) else {
                continue;
            };
            let types: Vec<String> = caps
                .iter()
                .skip(1)
                .map(|m| m.map_or(String::new(), |m| m.as_str().to_string()))
                .collect();
            if !parent_types.is_empty()
                && !types.iter().all(|t| parent_types.iter().any(|p| p == t))
            {
                continue;
            }
            if !generic.required_vars.is_empty() {
                if generic.vars.len() != types.len() {
                    continue;
                }
                let rejected = generic.required_vars.iter().any(|required| {
                    generic
                        .vars
                        .iter()
                        .position(|v| v == required)
                        .is_some_and(|i| types[i].is_empty())
                });
                if rejected {
                    continue;
                }
            }
            return Some((generic, types));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(name: &str) -> GenericDecl {
        GenericDecl {
            package_name: "rx".to_string(),
            name: name.to_string(),
            source: format!("// body of {name}\n"),
            ..GenericDecl::default()
        }
    }

    #[test]
    fn identifier_strips_spaces_and_brackets() {
        let mut store = Store::new();
        store.add(decl("Observable<Foo> Map<Bar>")).unwrap();
        let generic = store.iter().next().unwrap();
        assert_eq!(generic.identifier(), "ObservableFooMapBar");
        assert_eq!(generic.vars, vec!["Foo", "Bar"]);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut store = Store::new();
        store.add(decl("Observable<Foo>")).unwrap();
        assert!(matches!(
            store.add(decl("Observable<Foo>")),
            Err(Error::DuplicateGeneric { .. }),
        ));
    }

    #[test]
    fn repeated_placeholder_is_rejected() {
        let mut store = Store::new();
        assert!(matches!(
            store.add(decl("<Foo>Pair<Foo>")),
            Err(Error::RepeatedVar { .. }),
        ));
    }

    #[test]
    fn eighth_placeholder_is_rejected() {
        let mut store = Store::new();
        assert!(matches!(
            store.add(decl("X<A><B><C><D><E><F><G><H>")),
            Err(Error::TooManyVars { count: 8, .. }),
        ));
    }

    #[test]
    fn needs_must_reference_declared_placeholders() {
        let mut store = Store::new();
        let mut d = decl("Observable<Foo>");
        d.needs = vec!["Observer<Bar>".to_string()];
        assert!(matches!(
            store.add(d),
            Err(Error::UnknownVar { clause: "needs", .. }),
        ));
    }

    #[test]
    fn find_captures_types_positionally() {
        let mut store = Store::new();
        store.add(decl("Observable<Foo> Map<Bar>")).unwrap();
        store.sort();
        let (generic, types) = store.find("ObservableInt32 MapFloat64", &[]).unwrap();
        assert_eq!(generic.name, "Observable<Foo> Map<Bar>");
        assert_eq!(types, vec!["Int32", "Float64"]);
    }

    #[test]
    fn empty_capture_is_a_match() {
        let mut store = Store::new();
        store.add(decl("Observable<Foo>")).unwrap();
        store.sort();
        let (_, types) = store.find("Observable", &[]).unwrap();
        assert_eq!(types, vec![""]);
    }

    #[test]
    fn more_placeholders_win() {
        let mut store = Store::new();
        store.add(decl("Observable<Foo>")).unwrap();
        store.add(decl("Observable<Foo> Map<Bar>")).unwrap();
        store.sort();
        let (generic, _) = store.find("ObservableInt MapString", &[]).unwrap();
        assert_eq!(generic.vars.len(), 2);
    }

    #[test]
    fn longer_name_wins_within_a_tier() {
        let mut store = Store::new();
        store.add(decl("Observable<Foo>")).unwrap();
        store.add(decl("ObservableInt<Foo>")).unwrap();
        store.sort();
        let (generic, types) = store.find("ObservableInt32", &[]).unwrap();
        assert_eq!(generic.name, "ObservableInt<Foo>");
        assert_eq!(types, vec!["32"]);
    }

    #[test]
    fn parent_types_filter_captures() {
        let mut store = Store::new();
        store.add(decl("Observable<Foo>")).unwrap();
        store.sort();
        assert!(store.find("ObservableInt", &["String".to_string()]).is_none());
        assert!(store.find("ObservableInt", &["Int".to_string()]).is_some());
    }

    #[test]
    fn required_vars_reject_empty_captures() {
        let mut store = Store::new();
        let mut d = decl("Observable<Foo>");
        d.required_vars = vec!["Foo".to_string()];
        store.add(d).unwrap();
        store.sort();
        assert!(store.find("Observable", &[]).is_none());
        assert!(store.find("ObservableInt", &[]).is_some());
    }

    #[test]
    fn common_injection_prepends_needs() {
        let mut store = Store::new();
        let mut scheduler = decl("Scheduler");
        scheduler.common = true;
        let mut observable = decl("Observable<Foo>");
        observable.needs = vec!["<Foo>Observer".to_string()];
        let mut observer = decl("<Foo>Observer");
        observer.common = false;
        store
            .add_package(vec![scheduler, observable, observer], true)
            .unwrap();
        let observable = store.iter().find(|g| g.name == "Observable<Foo>").unwrap();
        assert_eq!(observable.needs, vec!["Scheduler", "<Foo>Observer"]);
        let scheduler = store.iter().find(|g| g.name == "Scheduler").unwrap();
        assert!(scheduler.needs.is_empty());
    }

    #[test]
    fn no_injection_when_disabled() {
        let mut store = Store::new();
        let mut scheduler = decl("Scheduler");
        scheduler.common = true;
        let observable = decl("Observable<Foo>");
        store.add_package(vec![scheduler, observable], false).unwrap();
        let observable = store.iter().find(|g| g.name == "Observable<Foo>").unwrap();
        assert!(observable.needs.is_empty());
    }
}
