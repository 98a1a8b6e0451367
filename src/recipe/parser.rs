//! Hand-written recursive descent parser for the recipe DSL.
//!
//! Operates on a mutable `{buffer, index}` cursor over raw bytes — tokens
//! are bytes, whitespace is any run of ASCII whitespace. `@import`
//! directives are resolved textually, relative to the including file's
//! directory, before the parser ever sees their contents.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ChariotError, Result};
use crate::recipe::{
    Dependency, HostTargetBody, ImageDependency, Namespace, Recipe, RecipeBody, RecipeSet,
    SourceBody, SourceType, Status,
};

/// Parse a top-level config file (and everything it `@import`s) into a
/// flat [`RecipeSet`]. Does not resolve dependency references — see
/// [`crate::recipe::resolver`].
pub fn parse_config(path: &Path) -> Result<RecipeSet> {
    let mut set = RecipeSet::new();
    let mut visited = HashSet::new();
    parse_file_into(path, &mut set, &mut visited)?;
    Ok(set)
}

fn parse_file_into(
    path: &Path,
    set: &mut RecipeSet,
    visited: &mut HashSet<PathBuf>,
) -> Result<()> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(canonical) {
        return Ok(());
    }

    let text = fs::read_to_string(path).map_err(|e| ChariotError::io(path, e))?;
    let dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut cursor = Cursor::new(text.as_bytes(), path.to_path_buf());

    loop {
        cursor.skip_ws_and_comments();
        if cursor.is_eof() {
            break;
        }

        if cursor.eat_literal("@import") {
            cursor.skip_inline_ws();
            let rel = cursor.read_to_eol();
            let rel = rel.trim();
            if rel.is_empty() {
                return Err(cursor.err("@import with no path"));
            }
            let import_path = dir.join(rel);
            parse_file_into(&import_path, set, visited)?;
            continue;
        }

        let recipe = cursor.parse_recipe()?;
        set.push(recipe);
    }

    Ok(())
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
    file: PathBuf,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8], file: PathBuf) -> Self {
        Cursor { buf, pos: 0, file }
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.buf.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn line(&self) -> usize {
        1 + self.buf[..self.pos.min(self.buf.len())]
            .iter()
            .filter(|&&b| b == b'\n')
            .count()
    }

    fn err(&self, message: impl Into<String>) -> ChariotError {
        ChariotError::Parse {
            file: self.file.clone(),
            line: self.line(),
            message: message.into(),
        }
    }

    /// Skip any run of ASCII whitespace (spaces, tabs, newlines).
    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_ascii_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    /// Skip spaces/tabs only, stopping at a newline.
    fn skip_inline_ws(&mut self) {
        while let Some(c) = self.peek() {
            if c == b' ' || c == b'\t' {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn skip_ws_and_comments(&mut self) {
        loop {
            self.skip_ws();
            if self.peek() == Some(b'/') && self.peek_at(1) == Some(b'/') {
                while let Some(c) = self.peek() {
                    if c == b'\n' {
                        break;
                    }
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn eat_literal(&mut self, lit: &str) -> bool {
        let bytes = lit.as_bytes();
        if self.buf[self.pos..].starts_with(bytes) {
            self.pos += bytes.len();
            true
        } else {
            false
        }
    }

    fn read_to_eol(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == b'\n' {
                break;
            }
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.buf[start..self.pos]).into_owned()
    }

    /// Read `[A-Za-z_][A-Za-z0-9_-]*`.
    fn read_ident(&mut self) -> Option<String> {
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() || c == b'_' => self.pos += 1,
            _ => return None,
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == b'_' || c == b'-' {
                self.pos += 1;
            } else {
                break;
            }
        }
        Some(String::from_utf8_lossy(&self.buf[start..self.pos]).into_owned())
    }

    /// Read a bare keyword token: alphanumeric plus `_`/`-`, used for
    /// field names (distinct from `read_ident` only in that it tolerates
    /// a leading digit, which never actually occurs but keeps the two
    /// concepts independently named for clarity at call sites).
    fn read_keyword(&mut self) -> Option<String> {
        self.read_ident()
    }

    /// Read a balanced `{ ... }` block, returning its interior, with the
    /// cursor positioned just past the closing `}`. Assumes the opening
    /// `{` has not yet been consumed.
    fn read_block(&mut self) -> Result<String> {
        if self.peek() != Some(b'{') {
            return Err(self.err("expected `{`"));
        }
        self.pos += 1;
        let start = self.pos;
        let mut depth = 1usize;
        loop {
            match self.bump() {
                None => return Err(self.err("unclosed block, expected `}`")),
                Some(b'{') => depth += 1,
                Some(b'}') => {
                    depth -= 1;
                    if depth == 0 {
                        let end = self.pos - 1;
                        return Ok(String::from_utf8_lossy(&self.buf[start..end])
                            .trim_matches('\n')
                            .to_string());
                    }
                }
                _ => {}
            }
        }
    }

    /// Parse a `dependencies` value: `[ ("*"? ("image/"|namespace "/") ident)* ]`.
    fn read_dependencies(&mut self) -> Result<(Vec<Dependency>, Vec<ImageDependency>)> {
        self.skip_ws();
        if self.peek() == Some(b':') {
            self.pos += 1;
            self.skip_ws();
        }
        if self.peek() != Some(b'[') {
            return Err(self.err("expected `[` after `dependencies`"));
        }
        self.pos += 1;

        let mut deps = Vec::new();
        let mut image_deps = Vec::new();

        loop {
            self.skip_ws_and_comments();
            match self.peek() {
                None => return Err(self.err("unclosed dependency list, expected `]`")),
                Some(b']') => {
                    self.pos += 1;
                    break;
                }
                _ => {}
            }

            let runtime = if self.peek() == Some(b'*') {
                self.pos += 1;
                true
            } else {
                false
            };

            let start = self.pos;
            while let Some(c) = self.peek() {
                if c.is_ascii_whitespace() || c == b']' {
                    break;
                }
                self.pos += 1;
            }
            let token = String::from_utf8_lossy(&self.buf[start..self.pos]).into_owned();
            if token.is_empty() {
                return Err(self.err("expected dependency entry"));
            }
            let (prefix, name) = token
                .split_once('/')
                .ok_or_else(|| self.err(format!("malformed dependency entry: {token}")))?;
            if name.is_empty() {
                return Err(self.err(format!("malformed dependency entry: {token}")));
            }

            if prefix == "image" {
                image_deps.push(ImageDependency {
                    name: name.to_string(),
                    runtime,
                });
            } else if let Some(namespace) = Namespace::parse(prefix) {
                deps.push(Dependency::new(namespace, name, runtime));
            } else {
                return Err(self.err(format!("unknown dependency namespace: {prefix}")));
            }
        }

        Ok((deps, image_deps))
    }

    fn parse_recipe(&mut self) -> Result<Recipe> {
        let namespace_word = self
            .read_ident()
            .ok_or_else(|| self.err("expected `source`, `host`, or `target`"))?;
        let namespace = Namespace::parse(&namespace_word)
            .ok_or_else(|| self.err(format!("unknown namespace: {namespace_word}")))?;

        if self.peek() != Some(b'/') {
            return Err(self.err("expected `/` after namespace"));
        }
        self.pos += 1;

        let name = self
            .read_ident()
            .ok_or_else(|| self.err("expected a recipe name"))?;

        self.skip_ws_and_comments();
        if self.peek() != Some(b'{') {
            return Err(self.err(format!("expected `{{` to start {namespace}/{name}")));
        }
        self.pos += 1;

        match namespace {
            Namespace::Source => self.parse_source_fields(name),
            Namespace::Host | Namespace::Target => self.parse_host_target_fields(namespace, name),
        }
    }

    fn parse_source_fields(&mut self, name: String) -> Result<Recipe> {
        let mut url = None;
        let mut source_type = None;
        let mut b2sum = None;
        let mut commit = None;
        let mut patch = None;
        let mut strap = None;
        let mut dependencies = Vec::new();
        let mut image_dependencies = Vec::new();

        loop {
            self.skip_ws_and_comments();
            if self.peek() == Some(b'}') {
                self.pos += 1;
                break;
            }

            let keyword = self
                .read_keyword()
                .ok_or_else(|| self.err("expected a field name or `}`"))?;

            match keyword.as_str() {
                "url" => {
                    self.expect_colon()?;
                    url = Some(self.read_to_eol().trim().to_string());
                }
                "type" => {
                    self.expect_colon()?;
                    let raw = self.read_to_eol();
                    let raw = raw.trim();
                    source_type = Some(SourceType::parse(raw).ok_or_else(|| {
                        self.err(format!("unknown source type: {raw}"))
                    })?);
                }
                "b2sum" => {
                    self.expect_colon()?;
                    b2sum = Some(self.read_to_eol().trim().to_string());
                }
                "commit" => {
                    self.expect_colon()?;
                    commit = Some(self.read_to_eol().trim().to_string());
                }
                "patch" => {
                    self.expect_colon()?;
                    patch = Some(self.read_to_eol().trim().to_string());
                }
                "dependencies" => {
                    let (d, i) = self.read_dependencies()?;
                    dependencies = d;
                    image_dependencies = i;
                }
                "strap" => {
                    self.skip_inline_ws();
                    strap = Some(self.read_block()?);
                }
                other => {
                    return Err(self.err(format!(
                        "unknown directive `{other}` in source/{name}, expected `}}`"
                    )));
                }
            }
        }

        let source_type = source_type.ok_or_else(|| ChariotError::MissingRequiredField {
            namespace: Namespace::Source,
            name: name.clone(),
            field: "type",
        })?;
        let url = url.ok_or_else(|| ChariotError::MissingRequiredField {
            namespace: Namespace::Source,
            name: name.clone(),
            field: "url",
        })?;

        if source_type.is_tar() && b2sum.is_none() {
            return Err(ChariotError::MissingRequiredField {
                namespace: Namespace::Source,
                name: name.clone(),
                field: "b2sum",
            });
        }
        if !source_type.is_tar() && b2sum.is_some() {
            return Err(ChariotError::ForbiddenFieldCombination {
                namespace: Namespace::Source,
                name: name.clone(),
                a: "type",
                b: "b2sum",
            });
        }
        if source_type == SourceType::Git && commit.is_none() {
            return Err(ChariotError::MissingRequiredField {
                namespace: Namespace::Source,
                name: name.clone(),
                field: "commit",
            });
        }
        if source_type != SourceType::Git && commit.is_some() {
            return Err(ChariotError::ForbiddenFieldCombination {
                namespace: Namespace::Source,
                name: name.clone(),
                a: "type",
                b: "commit",
            });
        }

        Ok(Recipe {
            namespace: Namespace::Source,
            name,
            dependencies,
            image_dependencies,
            status: Status::default(),
            body: RecipeBody::Source(SourceBody {
                url,
                source_type,
                b2sum,
                commit,
                patch,
                strap,
            }),
        })
    }

    fn parse_host_target_fields(&mut self, namespace: Namespace, name: String) -> Result<Recipe> {
        let mut source_name = None;
        let mut configure = None;
        let mut build = None;
        let mut install = None;
        let mut dependencies = Vec::new();
        let mut image_dependencies = Vec::new();

        loop {
            self.skip_ws_and_comments();
            if self.peek() == Some(b'}') {
                self.pos += 1;
                break;
            }

            let keyword = self
                .read_keyword()
                .ok_or_else(|| self.err("expected a field name or `}`"))?;

            match keyword.as_str() {
                "source" => {
                    self.expect_colon()?;
                    self.skip_inline_ws();
                    let ident = self
                        .read_ident()
                        .ok_or_else(|| self.err("expected a source recipe name"))?;
                    source_name = Some(ident);
                    // consume the remainder of the line, if any trailing noise
                    self.read_to_eol();
                }
                "configure" => {
                    self.skip_inline_ws();
                    configure = Some(self.read_block()?);
                }
                "build" => {
                    self.skip_inline_ws();
                    build = Some(self.read_block()?);
                }
                "install" => {
                    self.skip_inline_ws();
                    install = Some(self.read_block()?);
                }
                "dependencies" => {
                    let (d, i) = self.read_dependencies()?;
                    dependencies = d;
                    image_dependencies = i;
                }
                other => {
                    return Err(self.err(format!(
                        "unknown directive `{other}` in {namespace}/{name}, expected `}}`"
                    )));
                }
            }
        }

        Ok(Recipe {
            namespace,
            name,
            dependencies,
            image_dependencies,
            status: Status::default(),
            body: RecipeBody::HostTarget(HostTargetBody {
                source_name,
                source: std::cell::Cell::new(None),
                configure,
                build,
                install,
            }),
        })
    }

    fn expect_colon(&mut self) -> Result<()> {
        self.skip_inline_ws();
        if self.peek() != Some(b':') {
            return Err(self.err("expected `:`"));
        }
        self.pos += 1;
        self.skip_inline_ws();
        Ok(())
    }
}
