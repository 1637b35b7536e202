use rustc_hash::FxHashSet;

use crate::errors::Error;
use crate::package::Package;
use crate::render;
use crate::store::{Generic, Store};

/// A generic paired with the concrete types captured for its placeholders,
/// ready to render.
struct Apply<'a> {
    generic: &'a Generic,
    types: Vec<String>,
}

/// Specialize generics to satisfy one missing-symbol signature.
///
/// Walks the matched generic's dependency closure in post-order (so every
/// dependency is rendered before its dependent), renders each instantiation
/// and hands the fragments to the package. Returns progress messages; a
/// signature no generic matches is not an error, only a "missing" note.
pub fn generate_code_for_type(
    store: &Store,
    pkg: &mut Package,
    signature: &str,
) -> Result<Vec<String>, Error> {
    let mut applies = Vec::new();
    let mut missing = Vec::new();
    let mut visited = FxHashSet::default();
    collect(store, pkg, signature, &[], &mut visited, &mut applies, &mut missing)?;

    let mut messages = Vec::new();
    for apply in &applies {
        if let Some(concrete) = specialize(pkg, apply)? {
            if messages.is_empty() {
                messages.push(format!("generating {signature:?}"));
                messages.push(format!("  {concrete}"));
                messages.extend(missing.iter().map(|m| format!("  {m}")));
            } else {
                messages.push(format!("  {concrete}"));
            }
        }
    }
    Ok(messages)
}

/// Recurse down the needs tree of generics matching `signature`,
/// accumulating instantiations in post-order. The visited set is keyed by
/// concrete signature strings, which breaks reference cycles: identical
/// concrete signatures produce identical fragments.
fn collect<'a>(
    store: &'a Store,
    pkg: &Package,
    signature: &str,
    parent_types: &[String],
    visited: &mut FxHashSet<String>,
    out: &mut Vec<Apply<'a>>,
    missing: &mut Vec<String>,
) -> Result<(), Error> {
    visited.insert(signature.to_string());

    if let Some((generic, types)) = store.find(signature, parent_types) {
        if generic.vars.len() != types.len() {
            return Err(Error::ArityMismatch {
                signature: signature.to_string(),
                generic: generic.name.clone(),
            });
        }
        let apply = Apply { generic, types };
        // Already-generated fragments prune the whole branch.
        if !already_generated(pkg, &apply)? {
            for need in &generic.needs {
                let need = substitute(need, &generic.vars, &apply.types);
                if !visited.contains(&need) {
                    collect(store, pkg, &need, &apply.types, visited, out, missing)?;
                }
            }
            out.push(apply);
        }
        return Ok(());
    }

    // No direct match. For a "Type Method" signature, look up the type
    // alone: a generic with embeds inherits the methods of the types it
    // embeds, so each embed is substituted and recombined with the method.
    let fields: Vec<&str> = signature.split_whitespace().collect();
    if fields.len() == 2 {
        let (name, method) = (fields[0], fields[1]);
        if let Some((generic, types)) = store.find(name, parent_types) {
            if !generic.embeds.is_empty() {
                if generic.vars.len() != types.len() {
                    return Err(Error::ArityMismatch {
                        signature: name.to_string(),
                        generic: generic.name.clone(),
                    });
                }
                for embed in &generic.embeds {
                    let alternative =
                        format!("{} {}", substitute(embed, &generic.vars, &types), method);
                    if !visited.contains(&alternative) {
                        collect(store, pkg, &alternative, &types, visited, out, missing)?;
                    }
                }
            }
        }
    }

    // Not an error: the type-checking loop reports what stays missing.
    missing.push(format!("missing {signature:?}"));
    Ok(())
}

fn already_generated(pkg: &Package, apply: &Apply) -> Result<bool, Error> {
    let dot = render::dot(pkg.typemap(), &apply.types);
    let name = apply.generic.render_name(&dot)?;
    Ok(pkg.has_generated(&name))
}

/// Render one instantiation and append it to the package. Returns the
/// concrete signature for display, or `None` when the fragment already
/// exists.
fn specialize(pkg: &mut Package, apply: &Apply) -> Result<Option<String>, Error> {
    let dot = render::dot(pkg.typemap(), &apply.types);
    let name = apply.generic.render_name(&dot)?;
    if pkg.has_generated(&name) {
        return Ok(None);
    }
    let source = apply.generic.render_source(&dot)?;
    pkg.generate_source(&apply.generic.package_name, &name, &source)?;
    Ok(Some(substitute(
        &apply.generic.name,
        &apply.generic.vars,
        &apply.types,
    )))
}

/// Substitute `<Var>` placeholders in a parametric reference with the
/// captured types, positionally.
fn substitute(reference: &str, vars: &[String], types: &[String]) -> String {
    let mut out = reference.to_string();
    for (var, concrete) in vars.iter().zip(types) {
        out = out.replace(&format!("<{var}>"), concrete);
    }
    out
}
