use std::process::Command;

use crate::driver::Toolkit;
use crate::errors::Error;
use crate::package::Package;

/// A [`Toolkit`] that runs an external checker command in the package
/// directory, e.g. `go build .`, and harvests its output lines. The
/// in-memory fileset is synced to disk first, since a subprocess can only
/// see on-disk state; unchanged files are left untouched.
pub struct CommandToolkit {
    program: String,
    args: Vec<String>,
}

impl CommandToolkit {
    /// Build from a whitespace-split command line. Returns `None` for an
    /// empty command.
    pub fn new(command_line: &str) -> Option<Self> {
        let mut words = command_line.split_whitespace().map(str::to_string);
        let program = words.next()?;
        Some(Self {
            program,
            args: words.collect(),
        })
    }
}

impl Toolkit for CommandToolkit {
    fn check(&mut self, pkg: &mut Package) -> Result<Vec<String>, Error> {
        pkg.flush()?;

        let output = Command::new(&self.program)
            .args(&self.args)
            .current_dir(pkg.dir())
            .output()
            .map_err(|e| Error::Checker(format!("cannot run '{}': {e}", self.program)))?;

        // Checkers report diagnostics on either stream.
        let mut lines = Vec::new();
        for stream in [&output.stderr, &output.stdout] {
            for line in String::from_utf8_lossy(stream).lines() {
                let line = line.trim_end();
                if !line.is_empty() {
                    lines.push(line.to_string());
                }
            }
        }
        Ok(lines)
    }
}
