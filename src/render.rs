use rustc_hash::FxHashMap;

use crate::errors::Error;

/// Canonical template variables. Author-facing placeholders (`Foo`, `Bar`)
/// are remapped by position to these before template compilation, which
/// keeps placeholder words appearing elsewhere in the source from being
/// substituted. Their lowercase forms (`t`, `u`, …) carry the real types.
pub const STD_VARS: [&str; 7] = ["T", "U", "V", "W", "X", "Y", "Z"];

/// A compiled `{{.Var}}` text template.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone)]
enum Segment {
    Lit(String),
    Var(String),
}

impl Template {
    /// Compile `text`, splitting it into literal runs and `{{.Var}}`
    /// substitution points. A stray `{{` that does not form a substitution
    /// is a compile error.
    pub fn compile(name: &str, text: &str) -> Result<Template, Error> {
        let err = |detail: String| Error::Template {
            template: name.to_string(),
            detail,
        };

        let mut segments = Vec::new();
        let mut lit = String::new();
        let mut rest = text;
        while let Some(at) = rest.find("{{") {
            lit.push_str(&rest[..at]);
            rest = &rest[at + 2..];
            let inner = rest
                .strip_prefix('.')
                .ok_or_else(|| err("expected '.' after '{{'".to_string()))?;
            let close = inner
                .find("}}")
                .ok_or_else(|| err("unterminated '{{' substitution".to_string()))?;
            let var = &inner[..close];
            if var.is_empty() || !var.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(err(format!("bad substitution variable {var:?}")));
            }
            if !lit.is_empty() {
                segments.push(Segment::Lit(std::mem::take(&mut lit)));
            }
            segments.push(Segment::Var(var.to_string()));
            rest = &inner[close + 2..];
        }
        lit.push_str(rest);
        if !lit.is_empty() {
            segments.push(Segment::Lit(lit));
        }

        Ok(Template {
            name: name.to_string(),
            segments,
        })
    }

    /// Render against a substitution map. Referencing a variable absent
    /// from `dot` is an error.
    pub fn render(&self, dot: &FxHashMap<String, String>) -> Result<String, Error> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Lit(lit) => out.push_str(lit),
                Segment::Var(var) => match dot.get(var) {
                    Some(value) => out.push_str(value),
                    None => {
                        return Err(Error::Render {
                            template: self.name.clone(),
                            var: var.clone(),
                        });
                    }
                },
            }
        }
        Ok(out)
    }
}

/// Built-in display-type → real-type table for the target language's
/// scalars. The empty display type (an empty capture) maps to the top type.
pub fn builtin_real(display: &str) -> Option<&'static str> {
    let real = match display {
        "" => "interface{}",
        "Bool" => "bool",
        "Byte" => "byte",
        "Complex128" => "complex128",
        "Complex64" => "complex64",
        "Error" => "error",
        "Float32" => "float32",
        "Float64" => "float64",
        "Int" => "int",
        "Int16" => "int16",
        "Int32" => "int32",
        "Int64" => "int64",
        "Int8" => "int8",
        "Rune" => "rune",
        "String" => "string",
        "Uint" => "uint",
        "Uint16" => "uint16",
        "Uint32" => "uint32",
        "Uint64" => "uint64",
        "Uint8" => "uint8",
        "Uintptr" => "uintptr",
        _ => return None,
    };
    Some(real)
}

/// Build the substitution map for a concrete type tuple.
///
/// For each position i: the canonical uppercase variable carries the display
/// type verbatim, and its lowercase counterpart carries the real type
/// resolved through the package typemap first, the builtin table second,
/// and falling back to the display type itself.
pub fn dot(typemap: &FxHashMap<String, String>, types: &[String]) -> FxHashMap<String, String> {
    let mut d = FxHashMap::default();
    for (i, display) in types.iter().enumerate() {
        d.insert(STD_VARS[i].to_string(), display.clone());
        let real = typemap
            .get(display)
            .map(String::as_str)
            .or_else(|| builtin_real(display))
            .unwrap_or(display);
        d.insert(STD_VARS[i].to_lowercase(), real.to_string());
    }
    d
}

/// Uppercase the first character, e.g. `stack` → `Stack`.
pub fn title(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot_of(pairs: &[(&str, &str)]) -> FxHashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn compile_and_render() {
        let tpl = Template::compile("t", "type {{.T}}Stack []{{.t}}").unwrap();
        let rendered = tpl.render(&dot_of(&[("T", "String"), ("t", "string")])).unwrap();
        assert_eq!(rendered, "type StringStack []string");
    }

    #[test]
    fn literal_only_template() {
        let tpl = Template::compile("t", "no substitutions here").unwrap();
        assert_eq!(tpl.render(&FxHashMap::default()).unwrap(), "no substitutions here");
    }

    #[test]
    fn stray_open_is_a_compile_error() {
        assert!(matches!(
            Template::compile("t", "a {{ b"),
            Err(Error::Template { .. }),
        ));
        assert!(matches!(
            Template::compile("t", "a {{.T b"),
            Err(Error::Template { .. }),
        ));
    }

    #[test]
    fn undefined_variable_is_a_render_error() {
        let tpl = Template::compile("t", "{{.U}}").unwrap();
        assert!(matches!(
            tpl.render(&dot_of(&[("T", "Int")])),
            Err(Error::Render { .. }),
        ));
    }

    #[test]
    fn dot_resolves_typemap_then_builtin_then_identity() {
        let typemap = dot_of(&[("Mouse", "mouse")]);
        let d = dot(&typemap, &["Int32".to_string(), "Mouse".to_string(), "Move".to_string()]);
        assert_eq!(d["T"], "Int32");
        assert_eq!(d["t"], "int32");
        assert_eq!(d["U"], "Mouse");
        assert_eq!(d["u"], "mouse");
        assert_eq!(d["V"], "Move");
        assert_eq!(d["v"], "Move");
    }

    #[test]
    fn empty_capture_resolves_to_top_type() {
        let d = dot(&FxHashMap::default(), &[String::new()]);
        assert_eq!(d["T"], "");
        assert_eq!(d["t"], "interface{}");
    }

    #[test]
    fn title_cases_first_char() {
        assert_eq!(title("stack"), "Stack");
        assert_eq!(title("Stack"), "Stack");
        assert_eq!(title(""), "");
    }
}
