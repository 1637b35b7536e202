use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::errors::{Error, PragmaError, PragmaErrorKind};
use crate::pragma::{self, Directive};
use crate::render::{self, Template};
use crate::scan;
use crate::source::{scan_source, SourceFile};

/// Default filename template: one file per generated fragment.
pub const DEFAULT_FILE_TEMPLATE: &str = "swage{{.Package}}{{.Name}}.go";

/// The package being specialized: its in-memory file set, the record of
/// generated fragments, and the per-package configuration read from
/// pragmas (`file`, `type`, `no-common`).
pub struct Package {
    dir: PathBuf,
    /// Package name from the first scanned file's package clause.
    pub name: String,
    fileset: BTreeMap<PathBuf, SourceFile>,
    /// Fragment name → file the fragment lives in. Grows monotonically
    /// within a run.
    generated: FxHashMap<String, PathBuf>,
    /// Display-type → real-type overrides, overlaying the builtin table.
    typemap: FxHashMap<String, String>,
    filename: Template,
    pub no_common: bool,
    pub strip_docs: bool,
    /// Files modified in memory since the last disk sync.
    dirty: FxHashSet<PathBuf>,
}

impl Package {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            name: String::new(),
            fileset: BTreeMap::new(),
            generated: FxHashMap::default(),
            typemap: FxHashMap::default(),
            filename: Template::compile("filename", DEFAULT_FILE_TEMPLATE)
                .expect("default filename template"),
            no_common: false,
            strip_docs: false,
            dirty: FxHashSet::default(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The package's files in path order.
    pub fn files(&self) -> impl Iterator<Item = &SourceFile> {
        self.fileset.values()
    }

    pub fn typemap(&self) -> &FxHashMap<String, String> {
        &self.typemap
    }

    pub fn has_generated(&self, name: &str) -> bool {
        self.generated.contains_key(name)
    }

    pub fn generated_count(&self) -> usize {
        self.generated.len()
    }

    /// Scan every source file in the package directory into the fileset,
    /// recording previously generated fragments (`name` pragmas) and the
    /// package configuration pragmas.
    pub fn parse_dir(&mut self) -> Result<(), Error> {
        for path in scan::source_paths(&self.dir)? {
            let text = fs::read_to_string(&path).map_err(|e| Error::Io {
                path: path.clone(),
                error: e,
            })?;
            let file = scan_source(path.clone(), text);
            if self.name.is_empty() {
                self.name = file.package_name.clone();
            }
            let diags = self.scan_file_pragmas(&file);
            scan::report_diags(&file, &diags);
            self.fileset.insert(path, file);
        }
        Ok(())
    }

    /// Apply a file's configuration pragmas to the package. Syntax errors
    /// in template-machinery pragmas are left for the generics scan to
    /// report; only problems specific to this scan are returned.
    fn scan_file_pragmas(&mut self, file: &SourceFile) -> Vec<PragmaError> {
        let mut diags = Vec::new();
        for comment in &file.comments {
            let Some(Ok(directive)) = pragma::parse(&comment.text, comment.span) else {
                continue;
            };
            match directive {
                Directive::Name(name) => {
                    self.generated.insert(name, file.path.clone());
                }
                Directive::File(text) => match Template::compile("filename", &text) {
                    Ok(template) => self.filename = template,
                    Err(err) => diags.push(PragmaError {
                        kind: PragmaErrorKind::BadFileTemplate(err.to_string()),
                        span: comment.span,
                    }),
                },
                Directive::Type { display, real } => {
                    self.typemap.insert(display, real);
                }
                Directive::NoCommon => self.no_common = true,
                _ => {}
            }
        }
        diags
    }

    /// Append a rendered fragment to the package.
    ///
    /// The target file is chosen by the filename template; the fragment is
    /// preceded by its `name` marker pragma and the file is rescanned in
    /// place so the next check sees it.
    pub fn generate_source(
        &mut self,
        package_name: &str,
        name: &str,
        source: &str,
    ) -> Result<(), Error> {
        let mut data = FxHashMap::default();
        data.insert("Package".to_string(), render::title(package_name));
        data.insert("package".to_string(), package_name.to_lowercase());
        data.insert("Name".to_string(), render::title(name));
        data.insert("name".to_string(), name.to_lowercase());
        let filename = self.filename.render(&data)?;
        let path = self.dir.join(filename);

        let mut text = match self.fileset.get(&path) {
            Some(file) => file.text.clone(),
            None => format!("package {}\n", self.name),
        };
        text.push_str(&format!("\n//swage:name {name}\n\n{source}"));
        if !text.ends_with('\n') {
            text.push('\n');
        }

        self.fileset.insert(path.clone(), scan_source(path.clone(), text));
        self.generated.insert(name.to_string(), path.clone());
        self.dirty.insert(path);
        Ok(())
    }

    /// Paths of files holding at least one generated fragment, sorted.
    fn generated_fileset(&self) -> BTreeSet<PathBuf> {
        self.generated.values().cloned().collect()
    }

    /// Write every file containing generated fragments back to disk.
    /// Unchanged files are left untouched.
    pub fn write_generated(&mut self) -> Result<Vec<String>, Error> {
        let mut messages = Vec::new();
        for path in self.generated_fileset() {
            if self.write_if_changed(&path)? {
                messages.push(format!("writing file '{}'", path.display()));
            }
            self.dirty.remove(&path);
        }
        Ok(messages)
    }

    /// Sync files modified in memory to disk (used before handing the
    /// package to an on-disk checker).
    pub fn flush(&mut self) -> Result<(), Error> {
        let mut paths: Vec<PathBuf> = self.dirty.drain().collect();
        paths.sort();
        for path in paths {
            self.write_if_changed(&path)?;
        }
        Ok(())
    }

    fn write_if_changed(&self, path: &Path) -> Result<bool, Error> {
        let Some(file) = self.fileset.get(path) else {
            return Ok(false);
        };
        if let Ok(existing) = fs::read_to_string(path) {
            if existing == file.text {
                return Ok(false);
            }
        }
        fs::write(path, &file.text).map_err(|e| Error::Io {
            path: path.to_path_buf(),
            error: e,
        })?;
        Ok(true)
    }

    /// Remove every file containing generated fragments, from disk and
    /// from the fileset, and forget the fragments.
    pub fn remove_generated(&mut self) -> Result<Vec<String>, Error> {
        let mut messages = Vec::new();
        for path in self.generated_fileset() {
            messages.push(format!("removing file '{}'", path.display()));
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(Error::Io {
                        path: path.clone(),
                        error: e,
                    });
                }
            }
            self.fileset.remove(&path);
            self.dirty.remove(&path);
        }
        self.generated.clear();
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("swage_pkg_{}_{}", tag, process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn generate_creates_one_file_per_fragment() {
        let dir = temp_dir("per_fragment");
        let mut pkg = Package::new(&dir);
        pkg.name = "main".to_string();
        pkg.generate_source("stack", "StringStack", "type StringStack []string\n")
            .unwrap();
        pkg.generate_source("stack", "StringStackPush", "func (s *StringStack) Push(v string) {}\n")
            .unwrap();

        assert!(pkg.has_generated("StringStack"));
        assert_eq!(pkg.generated_count(), 2);
        assert_eq!(pkg.files().count(), 2);

        let file = pkg
            .files()
            .find(|f| f.path.ends_with("swageStackStringStack.go"))
            .unwrap();
        assert!(file.text.starts_with("package main\n"));
        assert!(file.text.contains("//swage:name StringStack\n"));
        assert!(file.text.contains("type StringStack []string"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn shared_file_accumulates_fragments_in_order() {
        let dir = temp_dir("shared_file");
        let mut pkg = Package::new(&dir);
        pkg.name = "main".to_string();
        pkg.filename = Template::compile("filename", "swage{{.package}}.go").unwrap();
        pkg.generate_source("stack", "First", "var first int\n").unwrap();
        pkg.generate_source("stack", "Second", "var second int\n").unwrap();

        assert_eq!(pkg.files().count(), 1);
        let file = pkg.files().next().unwrap();
        let first = file.text.find("//swage:name First").unwrap();
        let second = file.text.find("//swage:name Second").unwrap();
        assert!(first < second);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn parse_dir_recovers_generated_names_and_config() {
        let dir = temp_dir("reparse");
        fs::write(
            dir.join("main.go"),
            "package main\n\n//swage:type Mouse mouse\n\nfunc main() {}\n",
        )
        .unwrap();
        fs::write(
            dir.join("swageMainStringStack.go"),
            "package main\n\n//swage:name StringStack\n\ntype StringStack []string\n",
        )
        .unwrap();

        let mut pkg = Package::new(&dir);
        pkg.parse_dir().unwrap();
        assert_eq!(pkg.name, "main");
        assert!(pkg.has_generated("StringStack"));
        assert_eq!(pkg.typemap()["Mouse"], "mouse");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn write_is_idempotent() {
        let dir = temp_dir("idempotent");
        let mut pkg = Package::new(&dir);
        pkg.name = "main".to_string();
        pkg.generate_source("p", "Frag", "var frag int\n").unwrap();

        let first = pkg.write_generated().unwrap();
        assert_eq!(first.len(), 1);
        let second = pkg.write_generated().unwrap();
        assert!(second.is_empty(), "unchanged file rewritten: {second:?}");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn remove_generated_deletes_files() {
        let dir = temp_dir("remove");
        let mut pkg = Package::new(&dir);
        pkg.name = "main".to_string();
        pkg.generate_source("p", "Frag", "var frag int\n").unwrap();
        pkg.write_generated().unwrap();

        let messages = pkg.remove_generated().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(pkg.generated_count(), 0);
        assert_eq!(pkg.files().count(), 0);
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn no_common_pragma_sets_flag() {
        let dir = temp_dir("no_common");
        fs::write(dir.join("main.go"), "package main\n\n//swage:no-common\n").unwrap();
        let mut pkg = Package::new(&dir);
        pkg.parse_dir().unwrap();
        assert!(pkg.no_common);
        let _ = fs::remove_dir_all(&dir);
    }
}
