// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::*;
use crate::notifier::InstanceNotifierTemplate;

fn spawn_instance(program: &str, args: &[&str]) -> Arc<PluginInstance> {
    let mut cmd = tokio::process::Command::new(program);
    cmd.args(args)
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .kill_on_drop(true);
    let mut child = cmd.spawn().unwrap();
    let stdin = child.stdin.take().unwrap();
    let stdout = child.stdout.take().unwrap();
    let stderr = child.stderr.take().unwrap();

    let instance =
        PluginInstance::new("acme/demo:1.0.0@abc".to_string(), child, stdin, 5 * 1024 * 1024);
    tokio::spawn(Arc::clone(&instance).run_stdout_pump(stdout));
    tokio::spawn(Arc::clone(&instance).run_stderr_pump(stderr));
    instance
}

/// `cat` echoes whatever we write to stdin back through the stdout pump.
fn spawn_cat() -> Arc<PluginInstance> {
    spawn_instance("cat", &[])
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2s");
}

#[tokio::test]
async fn session_frames_reach_the_attached_listener() {
    let instance = spawn_cat();
    let (tx, mut sub) = warden_core::broadcast::channel(8);
    instance.attach_listener("s-1", tx);

    let frame =
        br#"{"event":"session","session_id":"s-1","data":{"type":"stream","data":{"n":1}}}"#;
    instance.write(&[frame.as_slice(), b"\n"].concat()).await.unwrap();

    let message = tokio::time::timeout(Duration::from_secs(2), sub.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(message.kind, warden_wire::SessionMessageType::Stream);
    assert_eq!(message.data["n"], 1);

    instance.stop();
}

#[tokio::test]
async fn session_ordering_is_preserved() {
    let instance = spawn_cat();
    let (tx, mut sub) = warden_core::broadcast::channel(32);
    instance.attach_listener("s-1", tx);

    for n in 0..10 {
        let frame = format!(
            "{{\"event\":\"session\",\"session_id\":\"s-1\",\"data\":{{\"type\":\"stream\",\"data\":{{\"n\":{n}}}}}}}\n"
        );
        instance.write(frame.as_bytes()).await.unwrap();
    }
    for n in 0..10 {
        let message = tokio::time::timeout(Duration::from_secs(2), sub.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(message.data["n"], n);
    }

    instance.stop();
}

#[tokio::test]
async fn first_heartbeat_fires_ready_exactly_once() {
    let instance = spawn_cat();
    let ready = Arc::new(AtomicUsize::new(0));
    let ready2 = Arc::clone(&ready);
    instance.add_notifier(Arc::new(InstanceNotifierTemplate {
        on_ready: Some(Box::new(move |_| {
            ready2.fetch_add(1, Ordering::SeqCst);
        })),
        ..Default::default()
    }));

    instance.write(b"{\"event\":\"heartbeat\"}\n").await.unwrap();
    instance.write(b"{\"event\":\"heartbeat\"}\n").await.unwrap();

    wait_until(|| instance.is_started()).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(ready.load(Ordering::SeqCst), 1);

    instance.stop();
}

#[tokio::test]
async fn detached_listener_receives_nothing() {
    let instance = spawn_cat();
    let (tx, mut sub) = warden_core::broadcast::channel(8);
    instance.attach_listener("s-1", tx);
    instance.detach_listener("s-1");
    // idempotent
    instance.detach_listener("s-1");

    let frame = br#"{"event":"session","session_id":"s-1","data":{"type":"end","data":{}}}"#;
    instance.write(&[frame.as_slice(), b"\n"].concat()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(sub.try_recv().is_none());

    instance.stop();
}

#[tokio::test]
async fn stderr_output_lands_in_the_error_buffer() {
    let instance = spawn_instance("sh", &["-c", "echo oops >&2; sleep 5"]);
    wait_until(|| instance.error().is_some()).await;
    assert!(instance.error().unwrap().contains("oops"));
    instance.stop();
}

#[tokio::test]
async fn error_log_frames_land_in_the_error_buffer() {
    let instance = spawn_cat();
    instance
        .write(b"{\"event\":\"error\",\"data\":{\"message\":\"bad credential\"}}\n")
        .await
        .unwrap();
    wait_until(|| instance.error().is_some()).await;
    assert!(instance.error().unwrap().contains("bad credential"));
    instance.stop();
}

#[tokio::test]
async fn error_buffer_is_trimmed_from_the_front() {
    let instance = spawn_cat();
    instance.write_error(&"a".repeat(1000));
    instance.write_error(&"b".repeat(600));
    let error = instance.error().unwrap();
    assert!(error.len() <= MAX_ERR_MSG_LEN);
    assert!(error.ends_with(&"b".repeat(600)));
    instance.stop();
}

#[tokio::test]
async fn oversized_single_write_is_capped() {
    let instance = spawn_cat();
    instance.write_error(&"x".repeat(4096));
    assert_eq!(instance.error().unwrap().len(), MAX_ERR_MSG_LEN);
    instance.stop();
}

#[tokio::test]
async fn stdout_eof_marks_shutdown_and_notifies_once() {
    // short sleep so the observer is attached before the process exits
    let instance = spawn_instance("sh", &["-c", "sleep 0.2"]);
    let shutdowns = Arc::new(AtomicUsize::new(0));
    let shutdowns2 = Arc::clone(&shutdowns);
    instance.add_notifier(Arc::new(InstanceNotifierTemplate {
        on_shutdown: Some(Box::new(move |_| {
            shutdowns2.fetch_add(1, Ordering::SeqCst);
        })),
        ..Default::default()
    }));

    wait_until(|| instance.is_shutdown()).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn stop_is_idempotent_and_write_fails_afterwards() {
    let instance = spawn_cat();
    instance.stop();
    instance.stop();
    wait_until(|| instance.is_shutdown()).await;
    assert!(instance.write(b"{}\n").await.is_err());
}

#[tokio::test]
async fn graceful_stop_returns_once_listeners_are_gone() {
    let instance = spawn_cat();
    // no listeners bound: the drain completes on the first poll
    tokio::time::timeout(Duration::from_secs(2), instance.graceful_stop(Duration::from_secs(60)))
        .await
        .unwrap();
    wait_until(|| instance.is_shutdown()).await;
}
