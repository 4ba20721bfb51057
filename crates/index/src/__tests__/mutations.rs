//! Cache mutation scenarios against a real temporary workspace.

#[cfg(test)]
mod tests {
  use pretty_assertions::assert_eq;

  use crate::{
    __tests__::helpers::WorkspaceTestContext,
    action::{ActionTrigger, ActionType, ActionWork, DetailedActionType},
    workspace::WorkspaceEvent,
  };

  /// Test: startup walks the workspace and indexes eligible files only.
  #[tokio::test]
  async fn test_startup_indexes_eligible_files() {
    let ctx = WorkspaceTestContext::new();
    ctx.write("src/lib.rs", "pub fn greet() {}\n");
    ctx.write("src/util/mod.rs", "pub struct Helper;\n");
    ctx.write("README.md", "# Project\n");
    ctx.write("node_modules/pkg/index.js", "function hidden() {}\n");
    ctx.write("target/debug/build.rs", "fn generated() {}\n");
    ctx.write("data.bin", "\0\0");

    ctx.workspace.startup().await.unwrap();

    assert_eq!(ctx.cached(), vec!["README.md", "src/lib.rs", "src/util/mod.rs"]);

    let data = ctx.workspace.get_data();
    assert!(data.iter().any(|item| item.label.ends_with("greet")));
    assert!(data.iter().any(|item| item.label.ends_with("Helper")));
  }

  /// Test: the workspace's own config directory is never indexed.
  #[tokio::test]
  async fn test_startup_skips_config_directory() {
    let ctx = WorkspaceTestContext::new();
    ctx.write("src/lib.rs", "pub fn greet() {}\n");
    ctx.write(".everywhere/config.toml", "[search_everywhere]\n");

    ctx.workspace.startup().await.unwrap();

    assert_eq!(ctx.cached(), vec!["src/lib.rs"]);
  }

  /// Test: renaming a file removes the old entry and adds the new one.
  #[tokio::test]
  async fn test_rename_file_moves_entry() {
    let ctx = WorkspaceTestContext::new();
    let old = ctx.write("a.rs", "fn alpha() {}\n");
    ctx.workspace.startup().await.unwrap();
    assert_eq!(ctx.cached(), vec!["a.rs"]);

    let new = ctx.path("b.rs");
    std::fs::rename(&old, &new).unwrap();
    ctx.workspace.handle_event(WorkspaceEvent::Rename(vec![(old, new.clone())]));
    ctx.workspace.wait_idle().await;

    assert_eq!(ctx.cached(), vec!["b.rs"]);
    let items = ctx.workspace.cache().get(&new).unwrap();
    assert!(items.iter().any(|item| item.name == "alpha"));
  }

  /// Test: renaming a directory re-walks the new location.
  #[tokio::test]
  async fn test_rename_directory_moves_subtree() {
    let ctx = WorkspaceTestContext::new();
    ctx.write("src/x/a.rs", "fn a() {}\n");
    ctx.write("src/x/nested/b.rs", "fn b() {}\n");
    ctx.write("src/xx.rs", "fn keep() {}\n");
    ctx.workspace.startup().await.unwrap();

    let (old, new) = (ctx.path("src/x"), ctx.path("src/y"));
    std::fs::rename(&old, &new).unwrap();
    ctx.workspace.handle_event(WorkspaceEvent::Rename(vec![(old, new)]));
    ctx.workspace.wait_idle().await;

    assert_eq!(ctx.cached(), vec!["src/xx.rs", "src/y/a.rs", "src/y/nested/b.rs"]);
  }

  /// Test: deleting a directory drops exactly the entries below it.
  #[tokio::test]
  async fn test_delete_directory_removes_prefix_only() {
    let ctx = WorkspaceTestContext::new();
    ctx.write("src/a.rs", "fn a() {}\n");
    ctx.write("src/deep/b.rs", "fn b() {}\n");
    ctx.write("src-old.rs", "fn old() {}\n");
    ctx.write("src2/c.rs", "fn c() {}\n");
    ctx.workspace.startup().await.unwrap();

    let dir = ctx.path("src");
    std::fs::remove_dir_all(&dir).unwrap();
    ctx.workspace.handle_event(WorkspaceEvent::Delete(vec![dir]));
    ctx.workspace.wait_idle().await;

    assert_eq!(ctx.cached(), vec!["src-old.rs", "src2/c.rs"]);
  }

  /// Test: each path of a multi-path event is classified on its own.
  #[tokio::test]
  async fn test_mixed_delete_classifies_each_path() {
    let ctx = WorkspaceTestContext::new();
    ctx.write("lib/a.rs", "fn a() {}\n");
    let file = ctx.write("main.rs", "fn main() {}\n");
    ctx.write("other.rs", "fn other() {}\n");
    ctx.workspace.startup().await.unwrap();

    let dir = ctx.path("lib");
    std::fs::remove_dir_all(&dir).unwrap();
    std::fs::remove_file(&file).unwrap();
    ctx.workspace.handle_event(WorkspaceEvent::Delete(vec![file, dir]));
    ctx.workspace.wait_idle().await;

    assert_eq!(ctx.cached(), vec!["other.rs"]);
  }

  /// Test: creating a directory adds its eligible files.
  #[tokio::test]
  async fn test_create_directory_adds_files() {
    let ctx = WorkspaceTestContext::new();
    ctx.workspace.startup().await.unwrap();
    assert!(ctx.cached().is_empty());

    ctx.write("pkg/one.rs", "fn one() {}\n");
    ctx.write("pkg/two.py", "def two():\n    pass\n");
    ctx.write("pkg/node_modules/dep.js", "function dep() {}\n");
    ctx.workspace.handle_event(WorkspaceEvent::Create(vec![ctx.path("pkg")]));
    ctx.workspace.wait_idle().await;

    assert_eq!(ctx.cached(), vec!["pkg/one.rs", "pkg/two.py"]);
  }

  /// Test: an update followed by a removal of the same path leaves no entry.
  #[tokio::test]
  async fn test_update_then_remove_leaves_no_entry() {
    let ctx = WorkspaceTestContext::new();
    let path = ctx.write("gone.rs", "fn gone() {}\n");
    let common = ctx.workspace.common();

    common.register_action(
      ActionType::Update,
      ActionWork::Update {
        path: path.clone(),
        detail: DetailedActionType::CreateNewFile,
        old_path: None,
      },
      ActionTrigger::DidCreateFiles,
      Some(path.clone()),
      None,
    );
    common.register_action(
      ActionType::Remove,
      ActionWork::Remove {
        path: path.clone(),
        detail: DetailedActionType::RemoveFile,
      },
      ActionTrigger::DidDeleteFiles,
      Some(path.clone()),
      None,
    );
    ctx.workspace.wait_idle().await;

    assert!(!ctx.workspace.cache().contains(&path));
  }

  /// Test: repeating a text change with unchanged content is idempotent.
  #[tokio::test]
  async fn test_repeated_text_change_is_idempotent() {
    let ctx = WorkspaceTestContext::new();
    let path = ctx.write("lib.rs", "pub fn greet() {}\npub struct Greeter;\n");
    ctx.workspace.startup().await.unwrap();

    let text_change = || WorkspaceEvent::TextChange {
      path: path.clone(),
      change_count: 1,
    };

    ctx.workspace.handle_event(text_change());
    ctx.workspace.wait_idle().await;
    let once = ctx.workspace.cache().snapshot();

    ctx.workspace.handle_event(text_change());
    ctx.workspace.handle_event(text_change());
    ctx.workspace.wait_idle().await;

    assert_eq!(ctx.workspace.cache().snapshot(), once);
    assert_eq!(once.entries.len(), 1);
  }

  /// Test: a text change for a file that vanished drops its entry.
  #[tokio::test]
  async fn test_text_change_for_vanished_file_drops_entry() {
    let ctx = WorkspaceTestContext::new();
    let path = ctx.write("flaky.rs", "fn flaky() {}\n");
    ctx.workspace.startup().await.unwrap();

    std::fs::remove_file(&path).unwrap();
    ctx.workspace.handle_event(WorkspaceEvent::TextChange {
      path: path.clone(),
      change_count: 1,
    });
    ctx.workspace.wait_idle().await;

    assert!(ctx.cached().is_empty());
  }

  /// Test: adding a root reindexes with the new folder included.
  #[tokio::test]
  async fn test_folder_change_reindexes_new_roots() {
    let ctx = WorkspaceTestContext::new();
    ctx.write("main/app.rs", "fn app() {}\n");
    ctx.write("extra/tool.rs", "fn tool() {}\n");

    // Narrow the workspace to one folder first
    ctx.workspace.handle_event(WorkspaceEvent::FolderChange {
      added: vec![ctx.path("main")],
      removed: vec![ctx.root.clone()],
    });
    ctx.workspace.wait_idle().await;
    assert_eq!(ctx.cached(), vec!["main/app.rs"]);

    ctx.workspace.handle_event(WorkspaceEvent::FolderChange {
      added: vec![ctx.path("extra")],
      removed: vec![],
    });
    ctx.workspace.wait_idle().await;
    assert_eq!(ctx.cached(), vec!["extra/tool.rs", "main/app.rs"]);

    // No actual change means no reindex
    let before = ctx.workspace.common().processor().pending();
    ctx.workspace.handle_event(WorkspaceEvent::FolderChange {
      added: vec![ctx.path("extra")],
      removed: vec![],
    });
    assert_eq!(ctx.workspace.common().processor().pending(), before);
  }
}
