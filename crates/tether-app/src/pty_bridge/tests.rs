use std::collections::BTreeMap;
use std::time::Duration;

use tether_common::SessionId;
use tether_session::{LaunchSpec, PendingInput, SessionStatus, ShellHandle, ShellState};
use tokio::task::JoinHandle;

use super::*;

fn sh(script: &str) -> LaunchSpec {
    let mut env = BTreeMap::new();
    if let Ok(path) = std::env::var("PATH") {
        env.insert("PATH".to_string(), path);
    }
    LaunchSpec {
        program: "/bin/sh".into(),
        args: vec!["-c".into(), script.into()],
        cwd: std::env::temp_dir(),
        env,
    }
}

async fn with_session() -> (ShellHandle, JoinHandle<ShellState>, SessionId) {
    let (handle, task) = ShellHandle::spawn(ShellState::in_memory());
    let id = handle
        .call(|s| s.create_session(Some("pty".into()), None).id().clone())
        .await
        .unwrap();
    (handle, task, id)
}

async fn status(handle: &ShellHandle, id: &SessionId) -> Option<SessionStatus> {
    let id = id.clone();
    handle
        .call(move |s| s.session(&id).map(|s| s.status()))
        .await
        .unwrap()
}

async fn raw(handle: &ShellHandle, id: &SessionId) -> String {
    let id = id.clone();
    handle
        .call(move |s| String::from_utf8_lossy(s.raw_output(&id)).into_owned())
        .await
        .unwrap()
}

async fn wait_for_terminated(handle: &ShellHandle, id: &SessionId) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while status(handle, id).await != Some(SessionStatus::Terminated) {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("session never reported as ended");
}

#[tokio::test]
async fn process_exit_ends_the_session() {
    let (handle, task, id) = with_session().await;

    let _bridge = spawn_bridge(&sh("printf hi"), id.clone(), handle.clone(), DEFAULT_COLS, DEFAULT_ROWS)
        .unwrap();
    wait_for_terminated(&handle, &id).await;

    assert_eq!(raw(&handle, &id).await, "hi");
    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn detach_does_not_end_the_session() {
    let (handle, task, id) = with_session().await;

    let bridge = spawn_bridge(&sh("sleep 30"), id.clone(), handle.clone(), DEFAULT_COLS, DEFAULT_ROWS)
        .unwrap();
    bridge.detach();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(status(&handle, &id).await, Some(SessionStatus::Active));
    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn delivered_command_reaches_the_process() {
    let (handle, task, id) = with_session().await;

    let mut bridge = spawn_bridge(
        &sh("read line; printf 'got:%s' \"$line\""),
        id.clone(),
        handle.clone(),
        DEFAULT_COLS,
        DEFAULT_ROWS,
    )
    .unwrap();
    bridge.deliver(PendingInput::Command("abc\n".into())).unwrap();
    wait_for_terminated(&handle, &id).await;

    assert!(raw(&handle, &id).await.contains("got:abc"));
    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn spawning_a_missing_program_is_a_spawn_error() {
    let (handle, _task) = ShellHandle::spawn(ShellState::in_memory());
    let spec = LaunchSpec {
        program: "/nonexistent/tether-shell".into(),
        ..sh("true")
    };
    let err = spawn_bridge(&spec, SessionId::new(), handle, DEFAULT_COLS, DEFAULT_ROWS)
        .err()
        .unwrap();
    assert!(matches!(err, PtyError::Spawn { .. }), "got: {err}");
}
