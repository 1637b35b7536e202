use std::sync::LazyLock;

use regex::Regex;
use rustc_hash::FxHashSet;

/// The fixable-error patterns. Each matches a type-checker error string
/// with a `file:line:col:` prefix; captures 4 and (when present) 5 name
/// the missing symbol.
static FIXABLE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"^(.*):(\d+):(\d+): undeclared name: (.*)$").unwrap(),
        Regex::new(
            r"^(.*):(\d+):(\d+): invalid operation: .* \(value of type \*?(.*)\) has no field or method (.*)$",
        )
        .unwrap(),
        Regex::new(
            r"^(.*):(\d+):(\d+): invalid operation: .* \(variable of type \*?(.*)\) has no field or method (.*)$",
        )
        .unwrap(),
    ]
});

/// Derive specialization signatures from type-checker error strings.
///
/// A "has no field or method" error on `ObservableInt` missing `MapFloat32`
/// yields the two-token signature `ObservableInt MapFloat32`; an undeclared
/// name yields the identifier alone. Deduplicated and sorted so each pass
/// processes signatures in a stable order.
pub fn suggest(errors: &[String]) -> Vec<String> {
    let mut set = FxHashSet::default();
    for error in errors {
        for pattern in FIXABLE.iter() {
            if let Some(caps) = pattern.captures(error) {
                let signature = caps
                    .iter()
                    .skip(4)
                    .flatten()
                    .map(|m| m.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                set.insert(signature);
                break;
            }
        }
    }
    let mut signatures: Vec<String> = set.into_iter().collect();
    signatures.sort();
    signatures
}
