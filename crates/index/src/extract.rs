//! Item extraction from file contents
//!
//! The index core only depends on the [`Extractor`] trait. [`SymbolExtractor`]
//! is the default implementation: every readable file yields a `File` item,
//! followed by line-oriented symbol matches for the languages it recognizes.
//! Extraction is deterministic for identical file contents.

use std::{
  path::{Path, PathBuf},
  sync::LazyLock,
};

use async_trait::async_trait;
use everywhere_core::{Item, ItemKind, Language};
use regex::Regex;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
  #[error("Cannot read {path}: {source}")]
  Unreadable {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("File not found: {0}")]
  NotFound(PathBuf),

  #[error("Cannot parse {path}: {reason}")]
  Unparseable { path: PathBuf, reason: String },
}

impl ExtractionError {
  fn from_io(path: &Path, source: std::io::Error) -> Self {
    if source.kind() == std::io::ErrorKind::NotFound {
      ExtractionError::NotFound(path.to_path_buf())
    } else {
      ExtractionError::Unreadable {
        path: path.to_path_buf(),
        source,
      }
    }
  }
}

/// Produces the items cached for a single file
#[async_trait]
pub trait Extractor: Send + Sync + 'static {
  async fn extract_items(&self, path: &Path) -> Result<Vec<Item>, ExtractionError>;
}

// ============================================================================
// Symbol Patterns
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Capture {
  /// Emit an item of this kind
  Symbol(ItemKind),
  /// Emit a function, or a method when nested inside a scope
  Callable,
  /// Open a scope without emitting an item (`impl Foo`)
  Scope,
}

struct Pattern {
  regex: Regex,
  capture: Capture,
  /// Top-level matches of this pattern become the container of nested callables
  opens_scope: bool,
}

type PatternTable = Vec<Pattern>;

fn table(specs: &[(&str, Capture, bool)]) -> PatternTable {
  specs
    .iter()
    .filter_map(|(source, capture, opens_scope)| {
      Regex::new(source).ok().map(|regex| Pattern {
        regex,
        capture: *capture,
        opens_scope: *opens_scope,
      })
    })
    .collect()
}

static RUST: LazyLock<PatternTable> = LazyLock::new(|| {
  table(&[
    (
      r"^(\s*)(?:pub(?:\([^)]*\))?\s+)?(?:const\s+)?(?:async\s+)?(?:unsafe\s+)?(?:extern\s+\S+\s+)?fn\s+([A-Za-z_]\w*)",
      Capture::Callable,
      false,
    ),
    (r"^(\s*)(?:pub(?:\([^)]*\))?\s+)?struct\s+([A-Za-z_]\w*)", Capture::Symbol(ItemKind::Struct), false),
    (r"^(\s*)(?:pub(?:\([^)]*\))?\s+)?enum\s+([A-Za-z_]\w*)", Capture::Symbol(ItemKind::Enum), false),
    (r"^(\s*)(?:pub(?:\([^)]*\))?\s+)?(?:unsafe\s+)?trait\s+([A-Za-z_]\w*)", Capture::Symbol(ItemKind::Interface), true),
    (r"^(\s*)(?:pub(?:\([^)]*\))?\s+)?mod\s+([A-Za-z_]\w*)", Capture::Symbol(ItemKind::Module), false),
    (r"^(\s*)(?:pub(?:\([^)]*\))?\s+)?(?:const|static)\s+(?:mut\s+)?([A-Z_][A-Z0-9_]*)\s*:", Capture::Symbol(ItemKind::Constant), false),
    (r"^(\s*)impl(?:<[^>]*>)?\s+(?:[\w:]+(?:<[^>]*>)?\s+for\s+)?([A-Za-z_]\w*)", Capture::Scope, true),
  ])
});

static TYPESCRIPT: LazyLock<PatternTable> = LazyLock::new(|| {
  table(&[
    (r"^(\s*)(?:export\s+)?(?:default\s+)?(?:async\s+)?function\s*\*?\s*([A-Za-z_$][\w$]*)", Capture::Callable, false),
    (r"^(\s*)(?:export\s+)?(?:default\s+)?(?:abstract\s+)?class\s+([A-Za-z_$][\w$]*)", Capture::Symbol(ItemKind::Class), true),
    (r"^(\s*)(?:export\s+)?interface\s+([A-Za-z_$][\w$]*)", Capture::Symbol(ItemKind::Interface), false),
    (r"^(\s*)(?:export\s+)?(?:const\s+)?enum\s+([A-Za-z_$][\w$]*)", Capture::Symbol(ItemKind::Enum), false),
    (r"^(\s*)(?:export\s+)?type\s+([A-Za-z_$][\w$]*)\s*(?:<[^=]*>)?\s*=", Capture::Symbol(ItemKind::TypeParameter), false),
    (r"^(\s*)(?:export\s+)?(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*(?::[^=]*)?=\s*(?:async\s+)?(?:\([^)]*\)|[A-Za-z_$][\w$]*)\s*=>", Capture::Callable, false),
    (r"^(\s+)(?:public\s+|private\s+|protected\s+|static\s+|async\s+|readonly\s+)*([A-Za-z_$][\w$]*)\s*\([^)]*\)\s*(?::[^{]*)?\{", Capture::Callable, false),
  ])
});

static PYTHON: LazyLock<PatternTable> = LazyLock::new(|| {
  table(&[
    (r"^(\s*)(?:async\s+)?def\s+([A-Za-z_]\w*)", Capture::Callable, false),
    (r"^(\s*)class\s+([A-Za-z_]\w*)", Capture::Symbol(ItemKind::Class), true),
  ])
});

static GO: LazyLock<PatternTable> = LazyLock::new(|| {
  table(&[
    (r"^()func\s+\([^)]*\)\s*([A-Za-z_]\w*)", Capture::Symbol(ItemKind::Method), false),
    (r"^()func\s+([A-Za-z_]\w*)", Capture::Symbol(ItemKind::Function), false),
    (r"^()type\s+([A-Za-z_]\w*)\s+struct\b", Capture::Symbol(ItemKind::Struct), false),
    (r"^()type\s+([A-Za-z_]\w*)\s+interface\b", Capture::Symbol(ItemKind::Interface), false),
  ])
});

static JVM_LIKE: LazyLock<PatternTable> = LazyLock::new(|| {
  table(&[
    (
      r"^(\s*)(?:(?:public|private|protected|internal|static|abstract|final|sealed|partial)\s+)*class\s+([A-Za-z_]\w*)",
      Capture::Symbol(ItemKind::Class),
      false,
    ),
    (
      r"^(\s*)(?:(?:public|private|protected|internal)\s+)*interface\s+([A-Za-z_]\w*)",
      Capture::Symbol(ItemKind::Interface),
      false,
    ),
    (r"^(\s*)(?:(?:public|private|protected|internal)\s+)*enum\s+([A-Za-z_]\w*)", Capture::Symbol(ItemKind::Enum), false),
  ])
});

static C_LIKE: LazyLock<PatternTable> = LazyLock::new(|| {
  table(&[
    (r"^(\s*)(?:typedef\s+)?struct\s+([A-Za-z_]\w*)", Capture::Symbol(ItemKind::Struct), false),
    (r"^(\s*)(?:template\s*<[^>]*>\s*)?class\s+([A-Za-z_]\w*)", Capture::Symbol(ItemKind::Class), false),
    (r"^(\s*)enum\s+(?:class\s+)?([A-Za-z_]\w*)", Capture::Symbol(ItemKind::Enum), false),
    (r"^(\s*)#define\s+([A-Za-z_]\w*)", Capture::Symbol(ItemKind::Constant), false),
  ])
});

static RUBY: LazyLock<PatternTable> = LazyLock::new(|| {
  table(&[
    (r"^(\s*)def\s+(?:self\.)?([A-Za-z_]\w*[?!=]?)", Capture::Callable, false),
    (r"^(\s*)class\s+([A-Z]\w*)", Capture::Symbol(ItemKind::Class), true),
    (r"^(\s*)module\s+([A-Z]\w*)", Capture::Symbol(ItemKind::Module), true),
  ])
});

static PHP: LazyLock<PatternTable> = LazyLock::new(|| {
  table(&[
    (r"^(\s*)(?:(?:public|private|protected|static|abstract|final)\s+)*function\s+([A-Za-z_]\w*)", Capture::Callable, false),
    (r"^(\s*)(?:(?:abstract|final)\s+)?class\s+([A-Za-z_]\w*)", Capture::Symbol(ItemKind::Class), true),
    (r"^(\s*)interface\s+([A-Za-z_]\w*)", Capture::Symbol(ItemKind::Interface), false),
  ])
});

static MARKDOWN: LazyLock<PatternTable> =
  LazyLock::new(|| table(&[(r"^()#{1,6}\s+(.+?)\s*#*\s*$", Capture::Symbol(ItemKind::String), false)]));

fn patterns(language: Language) -> &'static PatternTable {
  match language {
    Language::Rust => &RUST,
    Language::TypeScript | Language::JavaScript => &TYPESCRIPT,
    Language::Python => &PYTHON,
    Language::Go => &GO,
    Language::Java | Language::CSharp => &JVM_LIKE,
    Language::Cpp | Language::C => &C_LIKE,
    Language::Ruby => &RUBY,
    Language::Php => &PHP,
    Language::Markdown => &MARKDOWN,
  }
}

// ============================================================================
// Symbol Extractor
// ============================================================================

/// Default extractor: one file item plus regex-matched symbols
#[derive(Debug, Clone)]
pub struct SymbolExtractor {
  max_file_size: u64,
}

impl Default for SymbolExtractor {
  fn default() -> Self {
    Self::new()
  }
}

impl SymbolExtractor {
  pub fn new() -> Self {
    Self {
      max_file_size: 1024 * 1024, // 1MB
    }
  }

  /// Extract items from already-loaded content
  pub fn extract_from_str(&self, path: &Path, content: &str) -> Vec<Item> {
    let mut items = vec![Item::file(path)];
    if let Some(language) = Language::from_path(path) {
      items.extend(extract_symbols(path, content, patterns(language)));
    }
    items
  }
}

#[async_trait]
impl Extractor for SymbolExtractor {
  async fn extract_items(&self, path: &Path) -> Result<Vec<Item>, ExtractionError> {
    let metadata = tokio::fs::metadata(path)
      .await
      .map_err(|e| ExtractionError::from_io(path, e))?;

    if !metadata.is_file() {
      return Err(ExtractionError::Unparseable {
        path: path.to_path_buf(),
        reason: "not a regular file".to_string(),
      });
    }

    // Oversized files are still listed, just without symbols
    if metadata.len() > self.max_file_size {
      return Ok(vec![Item::file(path)]);
    }

    let bytes = tokio::fs::read(path).await.map_err(|e| ExtractionError::from_io(path, e))?;
    let content = String::from_utf8(bytes).map_err(|e| ExtractionError::Unparseable {
      path: path.to_path_buf(),
      reason: format!("invalid UTF-8 at byte {}", e.utf8_error().valid_up_to()),
    })?;

    Ok(self.extract_from_str(path, &content))
  }
}

const CONTROL_KEYWORDS: &[&str] = &["if", "for", "while", "switch", "catch", "return", "function", "constructor"];

fn extract_symbols(path: &Path, content: &str, patterns: &[Pattern]) -> Vec<Item> {
  let mut items = Vec::new();
  let mut scope: Option<String> = None;

  for (line_no, line) in content.lines().enumerate() {
    let Some((pattern, indent, name)) = patterns.iter().find_map(|pattern| {
      let caps = pattern.regex.captures(line)?;
      let indent = caps.get(1).map_or(0, |m| m.as_str().len());
      let name = caps.get(2)?;
      Some((pattern, indent, name))
    }) else {
      continue;
    };

    let line_no = line_no as u32;
    let column = name.start() as u32;
    let name = name.as_str();

    // `if (x) {` looks like a method declaration to the loose class-body pattern
    if matches!(pattern.capture, Capture::Callable) && CONTROL_KEYWORDS.contains(&name) {
      continue;
    }

    if indent == 0 {
      scope = pattern.opens_scope.then(|| name.to_string());
    }

    let item = match pattern.capture {
      Capture::Scope => continue,
      Capture::Symbol(kind) => Item::symbol(name, kind, path, line_no, column),
      Capture::Callable => match (&scope, indent) {
        (Some(container), 1..) => Item::symbol(name, ItemKind::Method, path, line_no, column).with_container(container),
        _ => Item::symbol(name, ItemKind::Function, path, line_no, column),
      },
    };
    items.push(item);
  }

  items
}
