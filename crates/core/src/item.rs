use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Kind of an indexed item.
///
/// Discriminants follow the editor symbol-kind numbering so that the
/// `items_filter` and `icons` config maps can refer to kinds by number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u32)]
pub enum ItemKind {
  File = 0,
  Module = 1,
  Namespace = 2,
  Package = 3,
  Class = 4,
  Method = 5,
  Property = 6,
  Field = 7,
  Constructor = 8,
  Enum = 9,
  Interface = 10,
  Function = 11,
  Variable = 12,
  Constant = 13,
  String = 14,
  Number = 15,
  Boolean = 16,
  Array = 17,
  Object = 18,
  Key = 19,
  Null = 20,
  EnumMember = 21,
  Struct = 22,
  Event = 23,
  Operator = 24,
  TypeParameter = 25,
}

impl ItemKind {
  pub fn as_u32(self) -> u32 {
    self as u32
  }

  /// Human readable name used in item descriptions
  pub fn label(self) -> &'static str {
    match self {
      ItemKind::File => "file",
      ItemKind::Module => "module",
      ItemKind::Namespace => "namespace",
      ItemKind::Package => "package",
      ItemKind::Class => "class",
      ItemKind::Method => "method",
      ItemKind::Property => "property",
      ItemKind::Field => "field",
      ItemKind::Constructor => "constructor",
      ItemKind::Enum => "enum",
      ItemKind::Interface => "interface",
      ItemKind::Function => "function",
      ItemKind::Variable => "variable",
      ItemKind::Constant => "constant",
      ItemKind::String => "string",
      ItemKind::Number => "number",
      ItemKind::Boolean => "boolean",
      ItemKind::Array => "array",
      ItemKind::Object => "object",
      ItemKind::Key => "key",
      ItemKind::Null => "null",
      ItemKind::EnumMember => "enum member",
      ItemKind::Struct => "struct",
      ItemKind::Event => "event",
      ItemKind::Operator => "operator",
      ItemKind::TypeParameter => "type parameter",
    }
  }
}

/// A single extracted index entry (a file or a symbol within it)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
  pub name: String,
  pub kind: ItemKind,
  pub path: PathBuf,
  /// Zero-based line of the item's start
  pub line: u32,
  /// Zero-based column of the item's start
  pub column: u32,
  /// Enclosing symbol name, if any
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub container: Option<String>,
}

impl Item {
  /// The item representing a whole file
  pub fn file(path: &Path) -> Self {
    let name = path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| path.to_string_lossy().into_owned());
    Self {
      name,
      kind: ItemKind::File,
      path: path.to_path_buf(),
      line: 0,
      column: 0,
      container: None,
    }
  }

  pub fn symbol(name: impl Into<String>, kind: ItemKind, path: &Path, line: u32, column: u32) -> Self {
    Self {
      name: name.into(),
      kind,
      path: path.to_path_buf(),
      line,
      column,
      container: None,
    }
  }

  pub fn with_container(mut self, container: impl Into<String>) -> Self {
    self.container = Some(container.into());
    self
  }
}

/// Presentation form of an item, consumed by pickers and listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickPickItem {
  pub label: String,
  pub description: String,
  pub detail: String,
  pub path: PathBuf,
  pub kind: ItemKind,
  pub line: u32,
  pub column: u32,
}

/// Source language, used to pick symbol patterns during extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
  TypeScript,
  JavaScript,
  Rust,
  Python,
  Go,
  Java,
  CSharp,
  Cpp,
  C,
  Ruby,
  Php,
  Markdown,
}

impl Language {
  pub fn from_extension(ext: &str) -> Option<Self> {
    match ext.to_lowercase().as_str() {
      "ts" | "mts" | "tsx" => Some(Language::TypeScript),
      "js" | "mjs" | "cjs" | "jsx" => Some(Language::JavaScript),
      "rs" => Some(Language::Rust),
      "py" | "pyi" | "pyw" => Some(Language::Python),
      "go" => Some(Language::Go),
      "java" => Some(Language::Java),
      "cs" => Some(Language::CSharp),
      "cpp" | "cc" | "cxx" | "hpp" | "hxx" | "h" => Some(Language::Cpp),
      "c" => Some(Language::C),
      "rb" | "rake" => Some(Language::Ruby),
      "php" => Some(Language::Php),
      "md" | "markdown" => Some(Language::Markdown),
      _ => None,
    }
  }

  pub fn from_path(path: &Path) -> Option<Self> {
    path.extension().and_then(|ext| ext.to_str()).and_then(Self::from_extension)
  }
}
