use crate::errors::Error;
use crate::extract;
use crate::package::Package;
use crate::specialize;
use crate::store::Store;

/// The external type-checker contract. An implementation checks the
/// package's current file set and returns the raw error strings, each
/// carrying a `file:line:col:` prefix. Checkers that run out of process
/// may sync the fileset to disk first (see [`crate::host::CommandToolkit`]).
pub trait Toolkit {
    fn check(&mut self, pkg: &mut Package) -> Result<Vec<String>, Error>;
}

/// Outcome of one fixed-point run.
#[derive(Debug)]
pub struct RunReport {
    /// Progress messages: what was generated, what was missing, what was
    /// written.
    pub messages: Vec<String>,
    /// Errors surviving the fixed point, returned to the caller as-is.
    pub unresolved: Vec<String>,
    /// Fragments generated by this run.
    pub fragments: usize,
    /// Check passes performed.
    pub passes: usize,
}

/// Couples the package, the generic store and a type-checker into the
/// fixed-point loop: check, extract signatures, specialize, repeat until
/// the package checks cleanly or a pass makes no progress.
pub struct Driver<T> {
    pub pkg: Package,
    pub store: Store,
    toolkit: T,
}

impl<T: Toolkit> Driver<T> {
    /// The package must be loaded (`parse_dir`) and the store populated
    /// and sorted before the run.
    pub fn new(pkg: Package, store: Store, toolkit: T) -> Self {
        Self { pkg, store, toolkit }
    }

    pub fn run(&mut self) -> Result<RunReport, Error> {
        let initial = self.pkg.generated_count();
        let mut messages = Vec::new();
        let mut passes = 0;

        let unresolved = loop {
            passes += 1;
            let errors = self.toolkit.check(&mut self.pkg)?;
            let signatures = extract::suggest(&errors);
            if signatures.is_empty() {
                // No fixable errors left; whatever remains is the caller's.
                break errors;
            }
            let before = self.pkg.generated_count();
            for signature in &signatures {
                let msgs =
                    specialize::generate_code_for_type(&self.store, &mut self.pkg, signature)?;
                messages.extend(msgs);
            }
            if self.pkg.generated_count() == before {
                // Fixable errors, but nothing we can satisfy.
                break errors;
            }
        };

        messages.extend(self.pkg.write_generated()?);
        Ok(RunReport {
            messages,
            unresolved,
            fragments: self.pkg.generated_count() - initial,
            passes,
        })
    }
}
