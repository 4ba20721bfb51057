//! Configuration change scenarios.

#[cfg(test)]
mod tests {
  use everywhere_core::{ConfigChange, ConfigError, ExcludeMode};
  use pretty_assertions::assert_eq;

  use crate::{
    __tests__::helpers::{WorkspaceTestContext, drain_events, executed},
    action::{ActionError, ActionTrigger},
    events::IndexEvent,
    workspace::WorkspaceEvent,
  };

  const EXCLUDE_DOCS: &str = "[search_everywhere]\nexclude = [\"**/docs/**\", \"**/.everywhere/**\"]\n";
  const BROKEN: &str = "[search_everywhere\ninclude = ";

  fn change(settings: &[&str]) -> WorkspaceEvent {
    WorkspaceEvent::ConfigChange(ConfigChange::from_settings(settings.iter().copied()))
  }

  /// Test: toggling only the debounce flag notifies without reindexing.
  #[tokio::test]
  async fn test_debounce_toggle_notifies_without_reindex() {
    let ctx = WorkspaceTestContext::new();
    let mut rx = ctx.workspace.events().subscribe();

    ctx.update_config(|config| {
      config.search_everywhere.should_use_debounce = !config.search_everywhere.should_use_debounce;
    });
    ctx.workspace.handle_event(change(&["searchEverywhere.shouldUseDebounce"]));

    assert_eq!(ctx.workspace.common().processor().pending(), 0);
    ctx.workspace.wait_idle().await;
    assert_eq!(drain_events(&mut rx), vec![IndexEvent::DidDebounceConfigToggle]);
    assert!(ctx.cached().is_empty());
  }

  /// Test: an include change announces and performs a full reindex.
  #[tokio::test]
  async fn test_include_change_reindexes() {
    let ctx = WorkspaceTestContext::new();
    ctx.write("a.rs", "fn a() {}\n");
    ctx.write("b.py", "def b():\n    pass\n");
    ctx.workspace.startup().await.unwrap();
    assert_eq!(ctx.cached(), vec!["a.rs", "b.py"]);

    let mut rx = ctx.workspace.events().subscribe();
    let before = ctx.config();
    ctx.update_config(|config| config.search_everywhere.include = "**/*.py".to_string());
    let diff = before.changed_settings(&ctx.config());

    ctx.workspace.handle_event(WorkspaceEvent::ConfigChange(diff));
    ctx.workspace.wait_idle().await;

    let events = drain_events(&mut rx);
    let announced = events
      .iter()
      .position(|e| *e == IndexEvent::WillReindexOnConfigurationChange)
      .unwrap();
    let started = events
      .iter()
      .position(|e| matches!(e, IndexEvent::WillExecuteAction(_)))
      .unwrap();
    assert!(announced < started);
    assert_eq!(executed(&events).len(), 1);
    assert_eq!(ctx.cached(), vec!["b.py"]);
  }

  /// Test: host exclude maps only matter in files-and-search mode.
  #[tokio::test]
  async fn test_host_exclude_change_depends_on_exclude_mode() {
    let ctx = WorkspaceTestContext::new();
    ctx.write("src/app.rs", "fn app() {}\n");
    ctx.write("gen/out.rs", "fn out() {}\n");
    ctx.workspace.startup().await.unwrap();

    // Custom mode ignores host maps
    ctx.update_config(|config| {
      config.files.exclude.insert("**/gen/**".to_string(), true);
    });
    ctx.workspace.handle_event(change(&["files.exclude"]));
    assert_eq!(ctx.workspace.common().processor().pending(), 0);
    assert_eq!(ctx.cached(), vec!["gen/out.rs", "src/app.rs"]);

    // The mode switch itself is a change to the own section
    ctx.update_config(|config| config.search_everywhere.exclude_mode = ExcludeMode::FilesAndSearch);
    ctx.workspace.handle_event(change(&["searchEverywhere.excludeMode"]));
    ctx.workspace.wait_idle().await;
    assert_eq!(ctx.cached(), vec!["src/app.rs"]);

    ctx.update_config(|config| {
      config.files.exclude.insert("**/gen/**".to_string(), false);
    });
    ctx.workspace.handle_event(change(&["files.exclude"]));
    ctx.workspace.wait_idle().await;
    assert_eq!(ctx.cached(), vec!["gen/out.rs", "src/app.rs"]);
  }

  /// Test: changes outside the watched settings are ignored.
  #[tokio::test]
  async fn test_unrelated_change_is_ignored() {
    let ctx = WorkspaceTestContext::new();
    let mut rx = ctx.workspace.events().subscribe();

    ctx.workspace.handle_event(change(&["watcher.pollIntervalSecs", "log.level"]));

    assert_eq!(ctx.workspace.common().processor().pending(), 0);
    assert!(drain_events(&mut rx).is_empty());
  }

  /// Test: reload picks up the new configuration before reindexing.
  #[tokio::test]
  async fn test_reload_uses_fresh_configuration() {
    let ctx = WorkspaceTestContext::new();
    ctx.write("a.rs", "fn a() {}\n");
    ctx.write("docs/guide.md", "# Guide\n");
    ctx.workspace.startup().await.unwrap();
    assert_eq!(ctx.cached(), vec!["a.rs", "docs/guide.md"]);

    ctx.update_config(|config| config.search_everywhere.exclude.push("docs/**".to_string()));
    // The memoized snapshot still applies until a reload
    assert!(ctx.workspace.is_path_in_workspace(&ctx.path("docs/guide.md")));

    ctx.workspace.reload().await.unwrap();
    assert_eq!(ctx.cached(), vec!["a.rs"]);
    assert!(!ctx.workspace.is_path_in_workspace(&ctx.path("docs/guide.md")));
  }

  /// Test: a config that stops parsing keeps the previous filters for updates.
  #[tokio::test]
  async fn test_broken_config_keeps_previous_filters() {
    let ctx = WorkspaceTestContext::with_config_file(EXCLUDE_DOCS);
    ctx.write("a.rs", "fn a() {}\n");
    let guide = ctx.write("docs/guide.md", "# Guide\n");
    ctx.workspace.startup().await.unwrap();
    assert_eq!(ctx.cached(), vec!["a.rs"]);

    ctx.write_config(BROKEN);
    ctx.workspace.handle_event(change(&["searchEverywhere.exclude"]));
    ctx.workspace.wait_idle().await;
    assert_eq!(ctx.cached(), vec!["a.rs"]);

    let notes = ctx.write("docs/notes.md", "# Notes\n");
    let lib = ctx.write("lib.rs", "fn lib() {}\n");
    ctx.workspace.handle_event(WorkspaceEvent::TextChange {
      path: guide.clone(),
      change_count: 1,
    });
    ctx.workspace.handle_event(WorkspaceEvent::Create(vec![notes, lib]));
    ctx.workspace.wait_idle().await;

    assert_eq!(ctx.cached(), vec!["a.rs", "lib.rs"]);
    assert!(!ctx.workspace.is_path_in_workspace(&guide));
  }

  /// Test: a reindex under a broken config fails and leaves the cache alone.
  #[tokio::test]
  async fn test_failed_reindex_surfaces_error_and_keeps_cache() {
    let ctx = WorkspaceTestContext::with_config_file(EXCLUDE_DOCS);
    ctx.write("a.rs", "fn a() {}\n");
    ctx.workspace.startup().await.unwrap();
    assert_eq!(ctx.cached(), vec!["a.rs"]);

    ctx.write("b.rs", "fn b() {}\n");
    ctx.write_config(BROKEN);

    let result = ctx.workspace.reload().await;
    assert!(matches!(result, Err(ActionError::Config(ConfigError::Parse { .. }))));
    assert_eq!(ctx.cached(), vec!["a.rs"]);

    let result = ctx.workspace.index(ActionTrigger::Manual).await;
    assert!(matches!(result, Err(ActionError::Config(_))));
    assert_eq!(ctx.cached(), vec!["a.rs"]);

    // Fixing the file lets the next reindex through
    ctx.write_config(EXCLUDE_DOCS);
    ctx.workspace.reload().await.unwrap();
    assert_eq!(ctx.cached(), vec!["a.rs", "b.rs"]);
  }

  /// Test: startup with an unreadable config reports the failure.
  #[tokio::test]
  async fn test_startup_with_broken_config_fails() {
    let ctx = WorkspaceTestContext::with_config_file(BROKEN);
    ctx.write("a.rs", "fn a() {}\n");

    let result = ctx.workspace.startup().await;

    assert!(matches!(result, Err(ActionError::Config(ConfigError::Parse { .. }))));
    assert!(ctx.cached().is_empty());
  }
}
