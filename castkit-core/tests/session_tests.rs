//! Integration tests for the stream session lifecycle

mod mocks;

use std::sync::Arc;
use std::time::Duration;

use castkit_core::config::{AudioBackend, CaptureConfig, ALSA_FALLBACK_DEVICE};
use castkit_core::encoder::ProcessEvent;
use castkit_core::error::CastError;
use castkit_core::session::{SessionManager, SessionState};
use castkit_core::types::Platform;

use mocks::{has_pair, Behavior, MockLauncher, INTERRUPTED_EXIT_CODE, SUPERVISION_ERROR};

const GRACE: Duration = Duration::from_millis(50);
const URL: &str = "rtmp://live.example.com/app/streamkey";

fn manager(launcher: &Arc<MockLauncher>) -> SessionManager {
    SessionManager::with_launcher(launcher.clone()).with_startup_grace(GRACE)
}

fn linux_config() -> CaptureConfig {
    CaptureConfig::new(Platform::Linux, URL)
}

fn mac_config() -> CaptureConfig {
    CaptureConfig::new(Platform::MacOs, URL)
}

#[tokio::test]
async fn test_start_reaches_running() {
    let launcher = Arc::new(MockLauncher::always(Behavior::RunUntilInterrupted));
    let mut manager = manager(&launcher);

    let handle = manager.start(mac_config()).await.unwrap();

    assert_eq!(manager.state(), &SessionState::Running);
    let session = manager.session().unwrap();
    assert_eq!(session.handle(), handle);
    assert_eq!(session.pid(), Some(1001));
    assert_eq!(launcher.last_program().as_deref(), Some("ffmpeg"));
    assert_eq!(session.args().last().map(String::as_str), Some(URL));
}

#[tokio::test]
async fn test_second_start_is_rejected_without_spawning() {
    let launcher = Arc::new(MockLauncher::always(Behavior::RunUntilInterrupted));
    let mut manager = manager(&launcher);

    manager.start(mac_config()).await.unwrap();
    let err = manager.start(mac_config()).await.unwrap_err();

    assert!(matches!(err, CastError::AlreadyRunning));
    assert_eq!(launcher.launch_count(), 1);
    assert_eq!(manager.state(), &SessionState::Running);
}

#[tokio::test]
async fn test_invalid_config_spawns_nothing() {
    let launcher = Arc::new(MockLauncher::always(Behavior::RunUntilInterrupted));
    let mut manager = manager(&launcher);

    let err = manager
        .start(CaptureConfig::new(Platform::MacOs, ""))
        .await
        .unwrap_err();

    assert!(matches!(err, CastError::InvalidConfiguration(_)));
    assert_eq!(launcher.launch_count(), 0);
    assert_eq!(manager.state(), &SessionState::Idle);
}

#[tokio::test]
async fn test_linux_fallback_retries_once_then_fails() {
    let launcher = Arc::new(MockLauncher::always(Behavior::FailToSpawn));
    let mut manager = manager(&launcher);

    let err = manager.start(linux_config()).await.unwrap_err();

    assert!(err.is_launch_failure());
    assert_eq!(launcher.launch_count(), 2);
    let launches = launcher.launched_args();
    assert!(has_pair(&launches[0], "-f", "pulse"));
    assert!(has_pair(&launches[0], "-i", "default"));
    assert!(has_pair(&launches[1], "-f", "alsa"));
    assert!(has_pair(&launches[1], "-i", ALSA_FALLBACK_DEVICE));
    assert!(matches!(manager.state(), SessionState::Failed(_)));
    assert!(manager.session().is_none());
}

#[tokio::test]
async fn test_linux_fallback_recovers_after_early_exit() {
    let launcher = Arc::new(MockLauncher::scripted(
        vec![Behavior::ExitOnStart(Some(1))],
        Behavior::RunUntilInterrupted,
    ));
    let mut manager = manager(&launcher);

    manager.start(linux_config()).await.unwrap();

    assert_eq!(launcher.launch_count(), 2);
    assert_eq!(manager.state(), &SessionState::Running);
    let config = manager.session().unwrap().config();
    assert_eq!(config.audio_backend, AudioBackend::Alsa);
    assert_eq!(config.audio_device.as_deref(), Some(ALSA_FALLBACK_DEVICE));
}

#[tokio::test]
async fn test_no_fallback_on_macos() {
    let launcher = Arc::new(MockLauncher::always(Behavior::FailToSpawn));
    let mut manager = manager(&launcher);

    assert!(manager.start(mac_config()).await.is_err());
    assert_eq!(launcher.launch_count(), 1);
}

#[tokio::test]
async fn test_no_fallback_without_audio() {
    let launcher = Arc::new(MockLauncher::always(Behavior::FailToSpawn));
    let mut manager = manager(&launcher);

    assert!(manager.start(linux_config().with_audio(false)).await.is_err());
    assert_eq!(launcher.launch_count(), 1);
}

#[tokio::test]
async fn test_no_fallback_when_already_alsa() {
    let launcher = Arc::new(MockLauncher::always(Behavior::ExitOnStart(Some(1))));
    let mut manager = manager(&launcher);

    let config = linux_config().with_audio_backend(AudioBackend::Alsa);
    assert!(manager.start(config).await.is_err());
    assert_eq!(launcher.launch_count(), 1);
}

#[tokio::test]
async fn test_stop_interrupts_and_waits_for_exit() {
    let launcher = Arc::new(MockLauncher::always(Behavior::RunUntilInterrupted));
    let mut manager = manager(&launcher);

    manager.start(mac_config()).await.unwrap();
    manager.stop().await.unwrap();

    assert_eq!(
        manager.state(),
        &SessionState::Exited(Some(INTERRUPTED_EXIT_CODE))
    );
    assert!(!manager.is_active());
}

#[tokio::test]
async fn test_stop_without_session_is_noop() {
    let launcher = Arc::new(MockLauncher::always(Behavior::RunUntilInterrupted));
    let mut manager = manager(&launcher);

    manager.stop().await.unwrap();
    assert_eq!(manager.state(), &SessionState::Idle);

    // and again after the stream has ended
    manager.start(mac_config()).await.unwrap();
    manager.stop().await.unwrap();
    let ended = manager.state().clone();
    manager.stop().await.unwrap();
    assert_eq!(manager.state(), &ended);
}

#[tokio::test]
async fn test_unexpected_exit_is_observed() {
    let launcher = Arc::new(MockLauncher::always(Behavior::ExitAfter(
        Duration::from_millis(150),
        Some(1),
    )));
    let mut manager = manager(&launcher);

    manager.start(mac_config()).await.unwrap();
    assert_eq!(manager.state(), &SessionState::Running);

    let mut saw_output = false;
    while let Some(event) = manager.next_event().await {
        match event {
            ProcessEvent::Output { .. } => saw_output = true,
            ProcessEvent::Exited { code } => {
                assert_eq!(code, Some(1));
                break;
            }
            ProcessEvent::Error(e) => panic!("unexpected error: {}", e),
        }
    }

    assert!(saw_output);
    assert_eq!(manager.state(), &SessionState::Exited(Some(1)));
    assert!(manager.next_event().await.is_none());
}

#[tokio::test]
async fn test_wait_returns_terminal_state() {
    let launcher = Arc::new(MockLauncher::always(Behavior::ExitAfter(
        Duration::from_millis(100),
        Some(0),
    )));
    let mut manager = manager(&launcher);

    manager.start(mac_config()).await.unwrap();
    assert_eq!(manager.wait().await, SessionState::Exited(Some(0)));
}

#[tokio::test]
async fn test_poll_events_returns_startup_output() {
    let launcher = Arc::new(MockLauncher::always(Behavior::RunUntilInterrupted));
    let mut manager = manager(&launcher);

    manager.start(mac_config()).await.unwrap();
    let events = manager.poll_events();

    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], ProcessEvent::Output { .. }));
    assert_eq!(manager.state(), &SessionState::Running);
    assert!(manager.poll_events().is_empty());
}

#[tokio::test]
async fn test_restart_after_exit() {
    let launcher = Arc::new(MockLauncher::always(Behavior::RunUntilInterrupted));
    let mut manager = manager(&launcher);

    let first = manager.start(mac_config()).await.unwrap();
    manager.stop().await.unwrap();
    let second = manager.start(mac_config()).await.unwrap();

    assert_ne!(first, second);
    assert_eq!(launcher.launch_count(), 2);
    assert_eq!(manager.state(), &SessionState::Running);
}

#[tokio::test]
async fn test_custom_encoder_binary() {
    let launcher = Arc::new(MockLauncher::always(Behavior::RunUntilInterrupted));
    let mut manager = manager(&launcher).with_encoder("/opt/ffmpeg/bin/ffmpeg");

    manager.start(mac_config()).await.unwrap();
    assert_eq!(
        launcher.last_program().as_deref(),
        Some("/opt/ffmpeg/bin/ffmpeg")
    );
}

#[tokio::test]
async fn test_runtime_error_fails_running_session() {
    let launcher = Arc::new(MockLauncher::always(Behavior::ErrorAfter(GRACE * 2)));
    let mut manager = manager(&launcher);

    manager.start(mac_config()).await.unwrap();
    assert_eq!(manager.state(), &SessionState::Running);

    let event = manager.next_event().await.unwrap();
    assert_eq!(event, ProcessEvent::Error(SUPERVISION_ERROR.to_string()));
    assert_eq!(
        manager.state(),
        &SessionState::Failed(SUPERVISION_ERROR.to_string())
    );
    assert!(manager.next_event().await.is_none());
}

#[tokio::test]
async fn test_wait_reports_runtime_error() {
    let launcher = Arc::new(MockLauncher::always(Behavior::ErrorAfter(GRACE * 2)));
    let mut manager = manager(&launcher);

    manager.start(linux_config()).await.unwrap();
    let state = manager.wait().await;

    assert!(matches!(state, SessionState::Failed(ref msg) if msg == SUPERVISION_ERROR));
    assert!(!manager.is_active());
}

#[tokio::test]
async fn test_stop_returns_when_error_arrives_while_stopping() {
    let launcher = Arc::new(MockLauncher::always(Behavior::ErrorOnInterrupt));
    let mut manager = manager(&launcher);

    manager.start(mac_config()).await.unwrap();
    tokio::time::timeout(Duration::from_secs(2), manager.stop())
        .await
        .expect("stop hung after a supervision error")
        .unwrap();

    assert!(matches!(manager.state(), SessionState::Failed(_)));
    // A failed session can be replaced
    manager.start(mac_config()).await.unwrap();
    assert_eq!(launcher.launch_count(), 2);
}
