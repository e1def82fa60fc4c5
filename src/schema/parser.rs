//! Minimal YANG statement parser.
//!
//! Reads just enough of a module to build the schema model: the generic
//! `keyword [argument] (";" | "{" ... "}")` statement grammar, comments,
//! quoted strings with `+` concatenation, and the handful of module-level
//! statements the cache needs (`namespace`, `prefix`, `revision`, `import`
//! and top-level data definitions).

use std::collections::BTreeSet;

use super::model::{ModuleImport, ModuleSchema};
use crate::error::SchemaResolutionError;

/// Top-level statements that declare data-tree roots.
const DATA_DEFINITION_KEYWORDS: &[&str] = &[
    "container",
    "list",
    "leaf",
    "leaf-list",
    "choice",
    "anydata",
    "anyxml",
];

/// Deepest statement nesting accepted before a source is rejected.
const MAX_NESTING_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Quoted(String),
    Open,
    Close,
    Semicolon,
}

/// One parsed statement with its substatements.
#[derive(Debug, Clone)]
struct Statement {
    keyword: String,
    argument: Option<String>,
    children: Vec<Statement>,
    line: usize,
}

impl Statement {
    fn child(&self, keyword: &str) -> Option<&Statement> {
        self.children.iter().find(|s| s.keyword == keyword)
    }

    fn children_named<'a>(&'a self, keyword: &'a str) -> impl Iterator<Item = &'a Statement> {
        self.children.iter().filter(move |s| s.keyword == keyword)
    }

    fn child_argument(&self, keyword: &str) -> Option<&str> {
        self.child(keyword).and_then(|s| s.argument.as_deref())
    }
}

struct Parser<'a> {
    source_id: &'a str,
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

/// Parses module text into a [`ModuleSchema`].
///
/// # Errors
///
/// Returns [`SchemaResolutionError::Parse`] if the text is not a single
/// well-formed `module` statement carrying `namespace` and `prefix`.
pub fn parse_module(source_id: &str, text: &str) -> Result<ModuleSchema, SchemaResolutionError> {
    let tokens = tokenize(source_id, text)?;
    let mut parser = Parser {
        source_id,
        tokens,
        pos: 0,
    };

    let Some(root) = parser.statement(0)? else {
        return Err(parse_error(source_id, 1, "empty schema source"));
    };
    if let Some((_, line)) = parser.peek() {
        return Err(parse_error(
            source_id,
            line,
            "unexpected content after the module statement",
        ));
    }

    match root.keyword.as_str() {
        "module" => {}
        "submodule" => {
            return Err(parse_error(
                source_id,
                root.line,
                "submodules cannot be mounted directly",
            ));
        }
        other => {
            return Err(parse_error(
                source_id,
                root.line,
                &format!("expected `module`, found `{other}`"),
            ));
        }
    }

    let name = root
        .argument
        .clone()
        .ok_or_else(|| parse_error(source_id, root.line, "module without a name"))?;
    let namespace = root
        .child_argument("namespace")
        .ok_or_else(|| parse_error(source_id, root.line, "module without namespace"))?
        .to_string();
    let prefix = root
        .child_argument("prefix")
        .ok_or_else(|| parse_error(source_id, root.line, "module without prefix"))?
        .to_string();

    let revision = root
        .children_named("revision")
        .filter_map(|s| s.argument.clone())
        .max();

    let mut imports = Vec::new();
    for import in root.children_named("import") {
        let module = import
            .argument
            .clone()
            .ok_or_else(|| parse_error(source_id, import.line, "import without module name"))?;
        imports.push(ModuleImport {
            module,
            prefix: import.child_argument("prefix").map(str::to_string),
            revision_date: import.child_argument("revision-date").map(str::to_string),
        });
    }

    let data_nodes: BTreeSet<String> = root
        .children
        .iter()
        .filter(|s| DATA_DEFINITION_KEYWORDS.contains(&s.keyword.as_str()))
        .filter_map(|s| s.argument.clone())
        .collect();

    Ok(ModuleSchema {
        name,
        namespace,
        prefix,
        revision,
        imports,
        data_nodes,
    })
}

impl Parser<'_> {
    fn peek(&self) -> Option<(&Token, usize)> {
        self.tokens.get(self.pos).map(|(t, l)| (t, *l))
    }

    fn next(&mut self) -> Option<(Token, usize)> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Parses one statement nested `depth` blocks deep, or returns `None`
    /// at end of input.
    fn statement(&mut self, depth: usize) -> Result<Option<Statement>, SchemaResolutionError> {
        let Some((token, line)) = self.next() else {
            return Ok(None);
        };
        if depth >= MAX_NESTING_DEPTH {
            return Err(parse_error(
                self.source_id,
                line,
                &format!("statements nested deeper than {MAX_NESTING_DEPTH} levels"),
            ));
        }
        let keyword = match token {
            Token::Word(word) => word,
            other => {
                return Err(parse_error(
                    self.source_id,
                    line,
                    &format!("expected a keyword, found {other:?}"),
                ));
            }
        };

        let argument = self.argument()?;

        match self.next() {
            Some((Token::Semicolon, _)) => Ok(Some(Statement {
                keyword,
                argument,
                children: Vec::new(),
                line,
            })),
            Some((Token::Open, _)) => {
                let mut children = Vec::new();
                loop {
                    match self.peek() {
                        Some((Token::Close, _)) => {
                            self.pos += 1;
                            break;
                        }
                        Some(_) => {
                            if let Some(child) = self.statement(depth + 1)? {
                                children.push(child);
                            }
                        }
                        None => {
                            return Err(parse_error(
                                self.source_id,
                                line,
                                &format!("unterminated block for `{keyword}`"),
                            ));
                        }
                    }
                }
                Ok(Some(Statement {
                    keyword,
                    argument,
                    children,
                    line,
                }))
            }
            Some((other, at)) => Err(parse_error(
                self.source_id,
                at,
                &format!("expected `;` or `{{` after `{keyword}`, found {other:?}"),
            )),
            None => Err(parse_error(
                self.source_id,
                line,
                &format!("unexpected end of input after `{keyword}`"),
            )),
        }
    }

    fn argument(&mut self) -> Result<Option<String>, SchemaResolutionError> {
        match self.peek() {
            Some((Token::Word(_), _)) => match self.next() {
                Some((Token::Word(word), _)) => Ok(Some(word)),
                _ => Ok(None),
            },
            Some((Token::Quoted(_), _)) => {
                let mut value = String::new();
                while let Some((Token::Quoted(part), _)) = self.peek() {
                    value.push_str(part);
                    self.pos += 1;
                    // `"a" + "b"` concatenation
                    match (self.tokens.get(self.pos), self.tokens.get(self.pos + 1)) {
                        (Some((Token::Word(plus), _)), Some((Token::Quoted(_), _))) if plus == "+" => {
                            self.pos += 1;
                        }
                        _ => break,
                    }
                }
                Ok(Some(value))
            }
            _ => Ok(None),
        }
    }
}

fn tokenize(source_id: &str, text: &str) -> Result<Vec<(Token, usize)>, SchemaResolutionError> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    let mut line = 1usize;

    while let Some(&c) = chars.peek() {
        match c {
            '\n' => {
                line += 1;
                chars.next();
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            '{' => {
                tokens.push((Token::Open, line));
                chars.next();
            }
            '}' => {
                tokens.push((Token::Close, line));
                chars.next();
            }
            ';' => {
                tokens.push((Token::Semicolon, line));
                chars.next();
            }
            '"' | '\'' => {
                let start = line;
                chars.next();
                let mut value = String::new();
                let mut terminated = false;
                while let Some(ch) = chars.next() {
                    if ch == '\n' {
                        line += 1;
                    }
                    if ch == c {
                        terminated = true;
                        break;
                    }
                    if c == '"' && ch == '\\' {
                        match chars.next() {
                            Some('n') => value.push('\n'),
                            Some('t') => value.push('\t'),
                            Some(escaped) => value.push(escaped),
                            None => break,
                        }
                        continue;
                    }
                    value.push(ch);
                }
                if !terminated {
                    return Err(parse_error(source_id, start, "unterminated quoted string"));
                }
                tokens.push((Token::Quoted(value), start));
            }
            '/' => {
                chars.next();
                match chars.peek() {
                    Some('/') => {
                        for ch in chars.by_ref() {
                            if ch == '\n' {
                                line += 1;
                                break;
                            }
                        }
                    }
                    Some('*') => {
                        chars.next();
                        let start = line;
                        let mut previous = '\0';
                        let mut closed = false;
                        for ch in chars.by_ref() {
                            if ch == '\n' {
                                line += 1;
                            }
                            if previous == '*' && ch == '/' {
                                closed = true;
                                break;
                            }
                            previous = ch;
                        }
                        if !closed {
                            return Err(parse_error(source_id, start, "unterminated block comment"));
                        }
                    }
                    _ => {
                        let mut word = String::from('/');
                        read_word(&mut chars, &mut word);
                        tokens.push((Token::Word(word), line));
                    }
                }
            }
            _ => {
                let mut word = String::new();
                read_word(&mut chars, &mut word);
                tokens.push((Token::Word(word), line));
            }
        }
    }

    Ok(tokens)
}

fn read_word(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, word: &mut String) {
    while let Some(&ch) = chars.peek() {
        if ch.is_whitespace() || matches!(ch, '{' | '}' | ';' | '"' | '\'') {
            break;
        }
        word.push(ch);
        chars.next();
    }
}

fn parse_error(source_id: &str, line: usize, message: &str) -> SchemaResolutionError {
    SchemaResolutionError::Parse {
        source_id: source_id.to_string(),
        line,
        message: message.to_string(),
    }
}
