//! Queue ordering and failure isolation scenarios.

#[cfg(test)]
mod tests {
  use std::{path::PathBuf, sync::Arc};

  use pretty_assertions::assert_eq;

  use crate::{
    __tests__::helpers::{FakeExtractor, WorkspaceTestContext, drain_events, executed},
    action::{ActionTrigger, ActionType, ActionWork, DetailedActionType},
    events::IndexEvent,
    workspace::WorkspaceEvent,
  };

  fn register_update(ctx: &WorkspaceTestContext, path: PathBuf) -> crate::action::ActionId {
    ctx.workspace.common().register_action(
      ActionType::Update,
      ActionWork::Update {
        path: path.clone(),
        detail: DetailedActionType::CreateNewFile,
        old_path: None,
      },
      ActionTrigger::DidCreateFiles,
      Some(path),
      None,
    )
  }

  fn register_remove(ctx: &WorkspaceTestContext, path: PathBuf) -> crate::action::ActionId {
    ctx.workspace.common().register_action(
      ActionType::Remove,
      ActionWork::Remove {
        path: path.clone(),
        detail: DetailedActionType::RemoveFile,
      },
      ActionTrigger::DidDeleteFiles,
      Some(path),
      None,
    )
  }

  /// Test: actions execute in registration order, never two at a time.
  #[tokio::test]
  async fn test_actions_execute_in_registration_order() {
    let extractor = Arc::new(FakeExtractor::default());
    let ctx = WorkspaceTestContext::with_extractor(extractor.clone());
    let mut rx = ctx.workspace.events().subscribe();

    let mut registered = Vec::new();
    for i in 0..20 {
      let path = ctx.path(&format!("src/file_{i}.rs"));
      registered.push(if i % 3 == 0 {
        register_remove(&ctx, path)
      } else {
        register_update(&ctx, path)
      });
    }

    ctx.workspace.wait_idle().await;

    let ids: Vec<_> = executed(&drain_events(&mut rx)).into_iter().map(|(id, _)| id).collect();
    assert_eq!(ids, registered);
    assert_eq!(ctx.workspace.common().processor().max_concurrent_executions(), 1);
  }

  /// Test: actions registered from many tasks still run one at a time.
  #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
  async fn test_concurrent_registration_stays_serial() {
    let extractor = Arc::new(FakeExtractor::default());
    let ctx = Arc::new(WorkspaceTestContext::with_extractor(extractor.clone()));

    let mut tasks = Vec::new();
    for t in 0..4 {
      let ctx = ctx.clone();
      tasks.push(tokio::spawn(async move {
        for i in 0..25 {
          register_update(&ctx, ctx.path(&format!("t{t}/f{i}.rs")));
        }
      }));
    }
    for task in tasks {
      task.await.unwrap();
    }

    ctx.workspace.wait_idle().await;
    assert_eq!(extractor.calls().len(), 100);
    assert_eq!(ctx.workspace.cache().len(), 100);
    assert_eq!(ctx.workspace.common().processor().max_concurrent_executions(), 1);
  }

  /// Test: a failing extraction is terminal for its action only.
  #[tokio::test]
  async fn test_failed_action_does_not_block_the_queue() {
    let extractor = Arc::new(FakeExtractor::default());
    let ctx = WorkspaceTestContext::with_extractor(extractor.clone());
    let mut rx = ctx.workspace.events().subscribe();

    let broken = ctx.path("b.rs");
    extractor.mark_broken(&broken);

    register_update(&ctx, ctx.path("a.rs"));
    register_update(&ctx, broken.clone());
    register_update(&ctx, ctx.path("c.rs"));
    ctx.workspace.wait_idle().await;

    assert_eq!(ctx.cached(), vec!["a.rs", "c.rs"]);
    assert_eq!(executed(&drain_events(&mut rx)).len(), 3);

    // The broken path is not retried
    assert_eq!(extractor.calls().iter().filter(|p| **p == broken).count(), 1);
  }

  /// Test: a text change registers a removal followed by an update.
  #[tokio::test]
  async fn test_text_change_registers_remove_then_update() {
    let extractor = Arc::new(FakeExtractor::default());
    let ctx = WorkspaceTestContext::with_extractor(extractor.clone());
    let mut rx = ctx.workspace.events().subscribe();

    let path = ctx.path("src/lib.rs");
    ctx.workspace.handle_event(WorkspaceEvent::TextChange {
      path: path.clone(),
      change_count: 2,
    });
    ctx.workspace.wait_idle().await;

    let kinds: Vec<_> = executed(&drain_events(&mut rx)).into_iter().map(|(_, kind)| kind).collect();
    assert_eq!(kinds, vec![ActionType::Remove, ActionType::Update]);
    assert_eq!(ctx.cached(), vec!["src/lib.rs"]);
  }

  /// Test: empty changes and paths outside the workspace register nothing.
  #[tokio::test]
  async fn test_text_change_without_content_or_outside_workspace_is_ignored() {
    let extractor = Arc::new(FakeExtractor::default());
    let ctx = WorkspaceTestContext::with_extractor(extractor.clone());

    ctx.workspace.handle_event(WorkspaceEvent::TextChange {
      path: ctx.path("src/lib.rs"),
      change_count: 0,
    });
    ctx.workspace.handle_event(WorkspaceEvent::TextChange {
      path: PathBuf::from("/definitely/not/in/workspace.rs"),
      change_count: 1,
    });
    // Excluded by the default exclude list
    ctx.workspace.handle_event(WorkspaceEvent::TextChange {
      path: ctx.path("node_modules/pkg/index.js"),
      change_count: 1,
    });

    assert_eq!(ctx.workspace.common().processor().pending(), 0);
    ctx.workspace.wait_idle().await;
    assert!(extractor.calls().is_empty());
  }

  /// Test: the processor brackets each drain with WillProcess and DidProcess.
  #[tokio::test]
  async fn test_drain_is_bracketed_by_lifecycle_events() {
    let extractor = Arc::new(FakeExtractor::default());
    let ctx = WorkspaceTestContext::with_extractor(extractor);
    let mut rx = ctx.workspace.events().subscribe();

    register_update(&ctx, ctx.path("a.rs"));

    let first = rx.recv().await.unwrap();
    assert_eq!(first, IndexEvent::WillProcess);
    assert!(matches!(rx.recv().await.unwrap(), IndexEvent::WillExecuteAction(_)));
    assert_eq!(rx.recv().await.unwrap(), IndexEvent::DidProcess);
  }
}
