use std::path::PathBuf;
use std::sync::LazyLock;

use logos::Logos;
use regex::Regex;

use crate::pragma;
use crate::span::Span;

/// Extension of the target-language source files the engine operates on.
pub const SOURCE_EXT: &str = "go";

/// Raw tokens produced by the logos scanner. Only the structure needed to
/// delimit top-level declarations is recognized: comments, string-ish
/// literals (so braces inside them don't count), brackets and newlines.
/// Everything else (identifiers, numbers, operators) surfaces as a lexer
/// error chunk and is treated as plain declaration content.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r]+")]
enum RawToken {
    #[regex(r"//[^\n]*")]
    LineComment,

    #[regex(r"/\*(?:[^*]|\*+[^*/])*\*+/")]
    BlockComment,

    #[regex(r#""(?:\\.|[^"\\\n])*""#)]
    StringLit,

    #[regex(r"`[^`]*`")]
    RawStringLit,

    #[regex(r"'(?:\\.|[^'\\\n])*'")]
    RuneLit,

    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,

    #[token("\n")]
    Newline,
}

/// A comment with its byte span. `text` includes the comment markers.
#[derive(Debug, Clone)]
pub struct Comment {
    pub text: String,
    pub span: Span,
}

/// A top-level declaration block. `doc` is the span of the contiguous
/// comment block directly above it, when one is attached.
#[derive(Debug, Clone, Copy)]
pub struct Decl {
    pub span: Span,
    pub doc: Option<Span>,
}

/// A scanned source file: the verbatim text plus an index of its comments
/// and top-level declarations.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub package_name: String,
    pub text: String,
    pub comments: Vec<Comment>,
    pub decls: Vec<Decl>,
}

static RE_PACKAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^package[ \t]+([[:word:]]+)").unwrap());

/// Scan `text` into a [`SourceFile`]. Never fails: unrecognized input is
/// treated as declaration content, which is all the engine needs.
pub fn scan_source(path: PathBuf, text: String) -> SourceFile {
    let package_name = RE_PACKAGE
        .captures(&text)
        .map(|c| c[1].to_string())
        .unwrap_or_default();

    let mut comments = Vec::new();
    let mut decls = Vec::new();

    let mut depth: usize = 0;
    // Start offset of the currently open declaration.
    let mut open: Option<usize> = None;
    // The open declaration is balanced and ends at the next newline.
    let mut closable = false;
    // Contiguous line comments directly above the cursor (doc candidate).
    let mut doc_block: Option<Span> = None;
    let mut line_has_content = false;
    let mut line_has_comment = false;

    for (token, range) in RawToken::lexer(&text).spanned() {
        let span = Span::new(range.start, range.end);
        match token {
            Ok(RawToken::LineComment) | Ok(RawToken::BlockComment) => {
                let is_line = matches!(token, Ok(RawToken::LineComment));
                let comment_text = &text[range.clone()];
                if is_line
                    && open.is_none()
                    && depth == 0
                    && !line_has_content
                    && !comment_text.starts_with(pragma::PREFIX)
                {
                    doc_block = Some(doc_block.map_or(span, |d| d.merge(span)));
                }
                comments.push(Comment {
                    text: comment_text.to_string(),
                    span,
                });
                line_has_comment = true;
            }
            Ok(RawToken::Newline) => {
                if let Some(start) = open {
                    if closable {
                        decls.push(Decl {
                            span: Span::new(start, span.start),
                            doc: doc_block.take(),
                        });
                        open = None;
                        closable = false;
                    }
                } else if !line_has_content && !line_has_comment {
                    // Blank line breaks doc attachment.
                    doc_block = None;
                }
                line_has_content = false;
                line_has_comment = false;
            }
            Ok(RawToken::LBrace) | Ok(RawToken::LParen) => {
                if open.is_none() && depth == 0 {
                    open = Some(span.start);
                }
                depth += 1;
                closable = false;
                line_has_content = true;
            }
            Ok(RawToken::RBrace) | Ok(RawToken::RParen) => {
                depth = depth.saturating_sub(1);
                if open.is_some() {
                    closable = depth == 0;
                }
                line_has_content = true;
            }
            _ => {
                // Literals and unrecognized chunks: plain content.
                if open.is_none() && depth == 0 {
                    open = Some(span.start);
                }
                if open.is_some() {
                    closable = depth == 0;
                }
                line_has_content = true;
            }
        }
    }

    if let Some(start) = open {
        decls.push(Decl {
            span: Span::new(start, text.len()),
            doc: doc_block.take(),
        });
    }

    SourceFile {
        path,
        package_name,
        text,
        comments,
        decls,
    }
}

impl SourceFile {
    /// The declaration's text, without its doc comment.
    pub fn decl_text(&self, decl: &Decl) -> &str {
        &self.text[decl.span.start..decl.span.end]
    }

    /// The doc comment text attached to the declaration, if any.
    pub fn doc_text(&self, decl: &Decl) -> Option<&str> {
        decl.doc.map(|d| &self.text[d.start..d.end])
    }
}
