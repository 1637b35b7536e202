use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{Error, ErrorReporter, PragmaError};
use crate::package::Package;
use crate::pragma::{self, Directive};
use crate::source::{scan_source, SourceFile, SOURCE_EXT};
use crate::span::Span;
use crate::store::{GenericDecl, Store};

/// A generic region under construction: the declaration plus the byte
/// range its body declarations must fall strictly inside.
struct Region {
    decl: GenericDecl,
    open: usize,
    close: usize,
}

const UNCLOSED: usize = usize::MAX;

/// Collect the generic declarations of one scanned file.
///
/// A `template` pragma opens a region at the end of its comment; the region
/// closes at the next `template` or `end` pragma, or at EOF. Declarations
/// whose byte range falls strictly inside a region form that generic's
/// source, blank-line separated, doc comments included unless `strip_docs`.
pub fn scan_generics(
    file: &SourceFile,
    strip_docs: bool,
    diags: &mut Vec<PragmaError>,
) -> Vec<GenericDecl> {
    let mut regions: Vec<Region> = Vec::new();

    for comment in &file.comments {
        let directive = match pragma::parse(&comment.text, comment.span) {
            None => continue,
            Some(Err(err)) => {
                diags.push(err);
                continue;
            }
            Some(Ok(directive)) => directive,
        };
        // Directives other than `template`/`end` attach to the region that
        // is currently open, if any.
        let current = regions.last_mut().filter(|r| r.close == UNCLOSED);
        match directive {
            Directive::Template(name) => {
                if let Some(region) = current {
                    region.close = comment.span.start;
                }
                regions.push(Region {
                    decl: GenericDecl {
                        package_name: file.package_name.clone(),
                        name,
                        ..GenericDecl::default()
                    },
                    open: comment.span.end,
                    close: UNCLOSED,
                });
            }
            Directive::End => {
                if let Some(region) = current {
                    region.close = comment.span.start;
                }
            }
            Directive::Needs(list) => {
                if let Some(region) = current {
                    region.decl.needs.extend(list);
                }
            }
            Directive::Embeds(list) => {
                if let Some(region) = current {
                    // An embedded type is also a dependency.
                    region.decl.needs.extend(list.iter().cloned());
                    region.decl.embeds.extend(list);
                }
            }
            Directive::Common => {
                if let Some(region) = current {
                    region.decl.common = true;
                }
            }
            Directive::RequiredVars(list) => {
                if let Some(region) = current {
                    region.decl.required_vars = list;
                }
            }
            // Package configuration pragmas; handled by the package scan.
            Directive::Name(_) | Directive::File(_) | Directive::Type { .. } | Directive::NoCommon => {}
        }
    }
    if let Some(region) = regions.last_mut() {
        if region.close == UNCLOSED {
            region.close = file.text.len() + 1;
        }
    }

    for decl in &file.decls {
        for region in &mut regions {
            if Span::new(region.open, region.close).strictly_contains(decl.span) {
                let mut text = String::new();
                if !strip_docs {
                    if let Some(doc) = file.doc_text(decl) {
                        text.push_str(doc);
                        text.push('\n');
                    }
                }
                text.push_str(file.decl_text(decl));
                add_source(&mut region.decl.source, &text);
            }
        }
    }

    regions.into_iter().map(|r| r.decl).collect()
}

fn add_source(buf: &mut String, text: &str) {
    if !buf.is_empty() {
        buf.push('\n');
    }
    buf.push_str(text);
    buf.push('\n');
}

/// The package's source file paths, sorted for deterministic scan order.
pub fn source_paths(dir: &Path) -> Result<Vec<PathBuf>, Error> {
    let entries = fs::read_dir(dir).map_err(|e| Error::Io {
        path: dir.to_path_buf(),
        error: e,
    })?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == SOURCE_EXT))
        .collect();
    paths.sort();
    Ok(paths)
}

/// Render pragma diagnostics for one file to stderr.
pub fn report_diags(file: &SourceFile, diags: &[PragmaError]) {
    if diags.is_empty() {
        return;
    }
    let reporter = ErrorReporter::new(file.path.display().to_string(), file.text.clone());
    for diag in diags {
        reporter.report_pragma_error(diag);
    }
}

/// Scan a generic library directory and add its generics to the store.
/// Returns a message describing what was found.
pub fn load_library(
    store: &mut Store,
    dir: &Path,
    inject_common: bool,
    strip_docs: bool,
) -> Result<String, Error> {
    let mut decls = Vec::new();
    for path in source_paths(dir)? {
        let text = fs::read_to_string(&path).map_err(|e| Error::Io {
            path: path.clone(),
            error: e,
        })?;
        let file = scan_source(path, text);
        let mut diags = Vec::new();
        decls.extend(scan_generics(&file, strip_docs, &mut diags));
        report_diags(&file, &diags);
    }
    let count = store.add_package(decls, inject_common)?;
    Ok(format!("found {} generics in package '{}'", count, dir.display()))
}

/// Add the target package's own generics to the store. Common injection
/// never applies to the target package itself.
pub fn load_target(store: &mut Store, pkg: &Package) -> Result<usize, Error> {
    let mut decls = Vec::new();
    for file in pkg.files() {
        let mut diags = Vec::new();
        decls.extend(scan_generics(file, pkg.strip_docs, &mut diags));
        report_diags(file, &diags);
    }
    store.add_package(decls, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::scan_source;
    use std::path::PathBuf;

    fn generics_of(text: &str) -> Vec<GenericDecl> {
        let file = scan_source(PathBuf::from("lib.go"), text.to_string());
        let mut diags = Vec::new();
        let decls = scan_generics(&file, false, &mut diags);
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        decls
    }

    const STACK_LIB: &str = "\
package stack

//swage:template <Foo>Stack

type FooStack []foo

var zeroFoo foo

//swage:template <Foo>Stack Push
//swage:needs <Foo>Stack

func (s *FooStack) Push(v foo) {
\t*s = append(*s, v)
}

//swage:end

func helper() {}
";

    #[test]
    fn regions_collect_their_declarations() {
        let decls = generics_of(STACK_LIB);
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[0].name, "<Foo>Stack");
        assert_eq!(
            decls[0].source,
            "type FooStack []foo\n\nvar zeroFoo foo\n",
        );
        assert_eq!(decls[1].name, "<Foo>Stack Push");
        assert_eq!(decls[1].needs, vec!["<Foo>Stack"]);
        assert!(decls[1].source.starts_with("func (s *FooStack) Push"));
    }

    #[test]
    fn declarations_after_end_are_ignored() {
        let decls = generics_of(STACK_LIB);
        assert!(!decls[1].source.contains("helper"));
    }

    #[test]
    fn package_clause_is_outside_all_regions() {
        let decls = generics_of(STACK_LIB);
        assert!(!decls[0].source.contains("package"));
    }

    #[test]
    fn embeds_are_also_needs() {
        let decls = generics_of(
            "package rx\n\n//swage:template Connectable<Foo>\n//swage:embeds Observable<Foo>\n\ntype ConnectableFoo struct{}\n",
        );
        assert_eq!(decls[0].embeds, vec!["Observable<Foo>"]);
        assert_eq!(decls[0].needs, vec!["Observable<Foo>"]);
    }

    #[test]
    fn common_and_required_vars_flags() {
        let decls = generics_of(
            "package rx\n\n//swage:template Scheduler\n//swage:common\n\ntype scheduler struct{}\n\n//swage:template Observable<Foo>\n//swage:required-vars Foo\n\ntype ObservableFoo func()\n",
        );
        assert!(decls[0].common);
        assert!(!decls[1].common);
        assert_eq!(decls[1].required_vars, vec!["Foo"]);
    }

    #[test]
    fn trailing_region_closes_at_eof() {
        let decls = generics_of(
            "package p\n\n//swage:template <Foo>Last\n\nvar lastFoo foo",
        );
        assert_eq!(decls[0].source, "var lastFoo foo\n");
    }

    #[test]
    fn doc_comments_follow_strip_setting() {
        let text = "package p\n\n//swage:template <Foo>Doc\n\n// Documented decl.\nvar docFoo foo\n";
        let file = scan_source(PathBuf::from("lib.go"), text.to_string());
        let mut diags = Vec::new();
        let kept = scan_generics(&file, false, &mut diags);
        assert_eq!(kept[0].source, "// Documented decl.\nvar docFoo foo\n");
        let stripped = scan_generics(&file, true, &mut diags);
        assert_eq!(stripped[0].source, "var docFoo foo\n");
    }

    #[test]
    fn malformed_directive_is_diagnosed_and_ignored() {
        let file = scan_source(
            PathBuf::from("lib.go"),
            "package p\n\n//swage:template <Foo>X\n//swage:needs\n\nvar xFoo foo\n".to_string(),
        );
        let mut diags = Vec::new();
        let decls = scan_generics(&file, false, &mut diags);
        assert_eq!(diags.len(), 1);
        assert!(decls[0].needs.is_empty());
    }
}
