//! Debounced event listener scenarios.
//!
//! These run on a paused clock with the in-memory extractor, so no test waits
//! on real time and nothing blocks on the filesystem.

#[cfg(test)]
mod tests {
  use std::{path::Path, sync::Arc, time::Duration};

  use everywhere_core::ConfigChange;
  use pretty_assertions::assert_eq;
  use tokio::{sync::mpsc, time::sleep};

  use crate::{
    __tests__::helpers::{FakeExtractor, WorkspaceTestContext, drain_events},
    events::IndexEvent,
    workspace::WorkspaceEvent,
  };

  fn text_change(path: &Path) -> WorkspaceEvent {
    WorkspaceEvent::TextChange {
      path: path.to_path_buf(),
      change_count: 1,
    }
  }

  /// Test: a burst of edits dispatches once, with the last document edited.
  #[tokio::test(start_paused = true)]
  async fn test_text_change_burst_keeps_last_document() {
    let extractor = Arc::new(FakeExtractor::default());
    let ctx = WorkspaceTestContext::with_extractor(extractor.clone());
    let (tx, rx) = mpsc::channel(16);
    let _listener = ctx.workspace.spawn_listener(rx);

    let a = ctx.path("a.rs");
    let b = ctx.path("b.rs");

    // a at t=0,100,200 then b at t=300
    for _ in 0..3 {
      tx.send(text_change(&a)).await.unwrap();
      sleep(Duration::from_millis(100)).await;
    }
    tx.send(text_change(&b)).await.unwrap();

    // t=950: the window restarted at 300 and ends at 1000
    sleep(Duration::from_millis(650)).await;
    ctx.workspace.wait_idle().await;
    assert!(extractor.calls().is_empty(), "nothing fires inside the window");

    sleep(Duration::from_millis(100)).await;
    ctx.workspace.wait_idle().await;
    assert_eq!(extractor.calls(), vec![b]);

    sleep(Duration::from_millis(1000)).await;
    ctx.workspace.wait_idle().await;
    assert_eq!(extractor.calls().len(), 1);
  }

  /// Test: configuration changes in a burst dispatch only the last one.
  #[tokio::test(start_paused = true)]
  async fn test_configuration_burst_keeps_last_change() {
    let extractor = Arc::new(FakeExtractor::default());
    let ctx = WorkspaceTestContext::with_extractor(extractor.clone());
    let mut events = ctx.workspace.events().subscribe();
    let (tx, rx) = mpsc::channel(16);
    let _listener = ctx.workspace.spawn_listener(rx);

    let include = ConfigChange::from_settings(["searchEverywhere.include"]);
    let toggle = ConfigChange::from_settings(["searchEverywhere.shouldUseDebounce"]);

    tx.send(WorkspaceEvent::ConfigChange(include.clone())).await.unwrap();
    sleep(Duration::from_millis(50)).await;
    tx.send(WorkspaceEvent::ConfigChange(include)).await.unwrap();
    sleep(Duration::from_millis(50)).await;
    tx.send(WorkspaceEvent::ConfigChange(toggle)).await.unwrap();

    sleep(Duration::from_millis(200)).await;
    assert!(drain_events(&mut events).is_empty());

    sleep(Duration::from_millis(100)).await;
    ctx.workspace.wait_idle().await;
    assert_eq!(drain_events(&mut events), vec![IndexEvent::DidDebounceConfigToggle]);
    assert!(extractor.calls().is_empty());
  }

  /// Test: closing the channel dispatches calls still waiting on their window.
  #[tokio::test(start_paused = true)]
  async fn test_closing_channel_flushes_pending_calls() {
    let extractor = Arc::new(FakeExtractor::default());
    let ctx = WorkspaceTestContext::with_extractor(extractor.clone());
    let (tx, rx) = mpsc::channel(16);
    let listener = ctx.workspace.spawn_listener(rx);

    let path = ctx.path("src/main.rs");
    tx.send(text_change(&path)).await.unwrap();
    drop(tx);

    listener.await.unwrap();
    ctx.workspace.wait_idle().await;
    assert_eq!(extractor.calls(), vec![path]);
  }

  /// Test: file events bypass debouncing and register right away.
  #[tokio::test(start_paused = true)]
  async fn test_file_events_are_not_debounced() {
    let extractor = Arc::new(FakeExtractor::default());
    let ctx = WorkspaceTestContext::with_extractor(extractor.clone());
    let (tx, rx) = mpsc::channel(16);
    let _listener = ctx.workspace.spawn_listener(rx);

    let created = ctx.path("new.rs");
    tx.send(WorkspaceEvent::Create(vec![created.clone()])).await.unwrap();
    sleep(Duration::from_millis(1)).await;
    ctx.workspace.wait_idle().await;

    assert_eq!(extractor.calls(), vec![created]);
  }
}
