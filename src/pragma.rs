use std::sync::LazyLock;

use regex::Regex;

use crate::errors::{PragmaError, PragmaErrorKind};
use crate::span::Span;

/// Comment prefix shared by all directives, e.g. `//swage:template`.
pub const PREFIX: &str = "//swage:";

/// A parsed pragma directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Opens a generic region: `//swage:template Observable<Foo> Map<Bar>`.
    Template(String),
    /// Closes the current generic region.
    End,
    /// Parametric references this generic depends on.
    Needs(Vec<String>),
    /// Parametric references whose methods are inherited for matching.
    Embeds(Vec<String>),
    /// Marks the current generic as an implicit dependency of every other
    /// generic in its package.
    Common,
    /// Placeholders that must capture a non-empty concrete type.
    RequiredVars(Vec<String>),
    /// Marks a previously generated fragment: `//swage:name StringStack`.
    Name(String),
    /// Filename template for generated fragments.
    File(String),
    /// Maps a display type to its real type: `//swage:type Mouse mouse`.
    Type { display: String, real: String },
    /// Disables implicit common-generic injection for this package.
    NoCommon,
}

static RE_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([[:word:]]+)[[:space:]]+([[:word:]]+)$").unwrap());

/// Parse one comment line. Returns `None` when the comment is not a pragma
/// at all; `Some(Err(..))` when it is a pragma with a problem.
pub fn parse(comment: &str, span: Span) -> Option<Result<Directive, PragmaError>> {
    let rest = comment.strip_prefix(PREFIX)?;
    let (keyword, payload) = match rest.find(char::is_whitespace) {
        Some(at) => (&rest[..at], rest[at..].trim()),
        None => (rest, ""),
    };

    let err = |kind| Some(Err(PragmaError { kind, span }));
    let need_payload = |directive: &str| {
        Some(Err(PragmaError {
            kind: PragmaErrorKind::MissingPayload(directive.to_string()),
            span,
        }))
    };

    match keyword {
        "template" => {
            if payload.is_empty() {
                return need_payload("template");
            }
            Some(Ok(Directive::Template(payload.to_string())))
        }
        "end" => Some(Ok(Directive::End)),
        "needs" => {
            if payload.is_empty() {
                return need_payload("needs");
            }
            Some(Ok(Directive::Needs(comma_list(payload))))
        }
        "embeds" => {
            if payload.is_empty() {
                return need_payload("embeds");
            }
            Some(Ok(Directive::Embeds(comma_list(payload))))
        }
        "common" => Some(Ok(Directive::Common)),
        "required-vars" => {
            if payload.is_empty() {
                return need_payload("required-vars");
            }
            Some(Ok(Directive::RequiredVars(comma_list(payload))))
        }
        "name" => {
            if payload.is_empty() {
                return need_payload("name");
            }
            Some(Ok(Directive::Name(payload.to_string())))
        }
        "file" => {
            if payload.is_empty() {
                return need_payload("file");
            }
            Some(Ok(Directive::File(payload.to_string())))
        }
        "type" => match RE_TYPE.captures(payload) {
            Some(caps) => Some(Ok(Directive::Type {
                display: caps[1].to_string(),
                real: caps[2].to_string(),
            })),
            None => err(PragmaErrorKind::MalformedType(payload.to_string())),
        },
        "no-common" | "no-support" => Some(Ok(Directive::NoCommon)),
        other => err(PragmaErrorKind::UnknownDirective(other.to_string())),
    }
}

fn comma_list(payload: &str) -> Vec<String> {
    payload
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(comment: &str) -> Directive {
        parse(comment, Span::dummy())
            .expect("not a pragma")
            .expect("pragma error")
    }

    #[test]
    fn non_pragma_comments_are_skipped() {
        assert!(parse("// ordinary comment", Span::dummy()).is_none());
        assert!(parse("//swage-ish: nope", Span::dummy()).is_none());
    }

    #[test]
    fn template_keeps_full_signature() {
        assert_eq!(
            parse_ok("//swage:template Observable<Foo> Map<Bar>"),
            Directive::Template("Observable<Foo> Map<Bar>".to_string()),
        );
    }

    #[test]
    fn needs_splits_on_commas_and_trims() {
        assert_eq!(
            parse_ok("//swage:needs Observable<Foo>, Scheduler ,<Foo>Observer"),
            Directive::Needs(vec![
                "Observable<Foo>".to_string(),
                "Scheduler".to_string(),
                "<Foo>Observer".to_string(),
            ]),
        );
    }

    #[test]
    fn type_requires_two_words() {
        assert_eq!(
            parse_ok("//swage:type Mouse mouse"),
            Directive::Type {
                display: "Mouse".to_string(),
                real: "mouse".to_string(),
            },
        );
        assert!(parse("//swage:type Mouse", Span::dummy()).unwrap().is_err());
        assert!(parse("//swage:type a b c", Span::dummy()).unwrap().is_err());
    }

    #[test]
    fn no_support_is_an_alias() {
        assert_eq!(parse_ok("//swage:no-common"), Directive::NoCommon);
        assert_eq!(parse_ok("//swage:no-support"), Directive::NoCommon);
    }

    #[test]
    fn unknown_directive_is_reported() {
        let err = parse("//swage:frobnicate x", Span::dummy()).unwrap().unwrap_err();
        assert!(matches!(err.kind, PragmaErrorKind::UnknownDirective(ref d) if d == "frobnicate"));
    }

    #[test]
    fn missing_payload_is_reported() {
        let err = parse("//swage:needs", Span::dummy()).unwrap().unwrap_err();
        assert!(matches!(err.kind, PragmaErrorKind::MissingPayload(_)));
    }
}
