use std::env;
use std::path::{Path, PathBuf};
use std::process;

use swage::driver::Driver;
use swage::host::CommandToolkit;
use swage::package::Package;
use swage::scan;
use swage::store::Store;

const DEFAULT_CHECKER: &str = "go build .";

fn usage() -> ! {
    eprintln!("Usage: swage gen <dir> [--lib <dir>]... [--checker <cmd>] [--no-doc] [-v]");
    eprintln!("       swage list <dir> [--lib <dir>]...");
    eprintln!("       swage clean <dir>");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  gen    specialize generics until the package type-checks");
    eprintln!("  list   show the generics found in the package and its libraries");
    eprintln!("  clean  remove previously generated files");
    process::exit(2);
}

/// Parsed command line. Flags may appear anywhere after the command.
struct Options {
    dir: PathBuf,
    libs: Vec<PathBuf>,
    checker: String,
    no_doc: bool,
    verbose: bool,
}

fn parse_options(args: &[String]) -> Options {
    let mut dir = None;
    let mut libs = Vec::new();
    let mut checker = DEFAULT_CHECKER.to_string();
    let mut no_doc = false;
    let mut verbose = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--lib" => match iter.next() {
                Some(value) => libs.push(PathBuf::from(value)),
                None => usage(),
            },
            "--checker" => match iter.next() {
                Some(value) => checker = value.clone(),
                None => usage(),
            },
            "--no-doc" => no_doc = true,
            "-v" | "--verbose" => verbose = true,
            other if other.starts_with('-') => usage(),
            other => {
                if dir.replace(PathBuf::from(other)).is_some() {
                    usage();
                }
            }
        }
    }

    match dir {
        Some(dir) => Options {
            dir,
            libs,
            checker,
            no_doc,
            verbose,
        },
        None => usage(),
    }
}

/// Load the package and populate the store from its libraries and its own
/// files. Exits the process on fatal errors.
fn load(opts: &Options) -> (Package, Store) {
    let mut pkg = Package::new(&opts.dir);
    pkg.strip_docs = opts.no_doc;
    if let Err(e) = pkg.parse_dir() {
        eprintln!("Error: {e}");
        process::exit(1);
    }

    let mut store = Store::new();
    for lib in &opts.libs {
        match scan::load_library(&mut store, lib, !pkg.no_common, pkg.strip_docs) {
            Ok(message) => {
                if opts.verbose {
                    println!("{message}");
                }
            }
            Err(e) => {
                eprintln!("Error: {e}");
                process::exit(1);
            }
        }
    }
    if let Err(e) = scan::load_target(&mut store, &pkg) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
    store.sort();
    (pkg, store)
}

fn cmd_gen(opts: Options) {
    let (pkg, store) = load(&opts);

    let toolkit = CommandToolkit::new(&opts.checker).unwrap_or_else(|| {
        eprintln!("Error: empty --checker command");
        process::exit(2);
    });

    let mut driver = Driver::new(pkg, store, toolkit);
    let report = match driver.run() {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    for message in &report.messages {
        println!("{message}");
    }
    if opts.verbose {
        println!(
            "{} fragment(s) generated in {} pass(es)",
            report.fragments, report.passes
        );
    }
    if !report.unresolved.is_empty() {
        eprintln!("\n{} error(s) remain:", report.unresolved.len());
        for error in &report.unresolved {
            eprintln!("  {error}");
        }
        process::exit(1);
    }
}

fn cmd_list(opts: Options) {
    let (_pkg, store) = load(&opts);
    for generic in store.iter() {
        println!("{:<12} {}", generic.package_name, generic.name);
    }
    if opts.verbose {
        println!("{} generic(s)", store.len());
    }
}

fn cmd_clean(dir: &Path) {
    let mut pkg = Package::new(dir);
    if let Err(e) = pkg.parse_dir() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
    match pkg.remove_generated() {
        Ok(messages) => {
            for message in messages {
                println!("{message}");
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        usage();
    }

    let command = args[1].as_str();
    let rest = &args[2..];
    match command {
        "gen" => cmd_gen(parse_options(rest)),
        "list" => cmd_list(parse_options(rest)),
        "clean" => {
            let opts = parse_options(rest);
            cmd_clean(&opts.dir);
        }
        _ => usage(),
    }
}
