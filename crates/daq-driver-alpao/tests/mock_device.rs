//! Driver behaviour against the simulated SDK.
//!
//! Covers the lifecycle, command clamping and error channel guarantees
//! without hardware. Tests that change the process working directory are
//! marked `#[serial]`.

use daq_driver_alpao::mock::{MockCall, MockSdk, MOCK_INJECTED_FAILURE};
use daq_driver_alpao::{
    clamp_command, AlpaoConfig, AlpaoError, DeformableMirror, ErrorDetail, ErrorRecord, SyncMode,
    CMD_MAX, CMD_MIN,
};
use serial_test::serial;
use tracing_test::traced_test;

const N_ACTUATORS: u32 = 97;

fn open_mock() -> (MockSdk, DeformableMirror<MockSdk>) {
    let sdk = MockSdk::new(N_ACTUATORS);
    let dm = DeformableMirror::open_with(sdk.clone(), "BOL143").unwrap();
    (sdk, dm)
}

/// Deterministic spread of values across and beyond the command range.
fn sample_command(n: usize, seed: usize) -> Vec<f64> {
    (0..n)
        .map(|i| (((i * 37 + seed * 11) % 101) as f64 - 50.0) / 12.5)
        .collect()
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn test_open_bol143_with_97_actuators() {
    let (sdk, dm) = open_mock();

    assert_eq!(dm.n_actuators(), 97);
    assert_eq!(dm.last_command(), vec![0.0; 97].as_slice());
    assert_eq!(dm.identifier(), "BOL143");
    assert_eq!(sdk.open_requests()[0].serial_name, "BOL143");
    assert_eq!(sdk.live_handles(), 1);
}

#[test]
fn test_open_failure_embeds_popped_error() {
    let sdk = MockSdk::new(N_ACTUATORS);
    sdk.fail(MockCall::Open);

    let err = DeformableMirror::open_with(sdk.clone(), "BOL143").unwrap_err();
    assert!(matches!(err, AlpaoError::Open { .. }));
    assert_eq!(err.native_code(), Some(MOCK_INJECTED_FAILURE));
    assert!(err.to_string().contains("BOL143"));
    assert!(sdk.pending_errors().is_empty());
}

#[test]
fn test_failed_actuator_query_releases_handle() {
    let sdk = MockSdk::new(N_ACTUATORS);
    sdk.fail(MockCall::Get);

    let err = DeformableMirror::open_with(sdk.clone(), "BOL143").unwrap_err();
    assert!(matches!(err, AlpaoError::Open { .. }));
    assert_eq!(sdk.live_handles(), 0);
    assert_eq!(sdk.call_count(MockCall::Release), 1);
}

#[test]
fn test_open_failure_without_error_detail() {
    let sdk = MockSdk::new(N_ACTUATORS);
    sdk.fail(MockCall::Open);
    sdk.break_error_query();

    let err = DeformableMirror::open_with(sdk, "BOL143").unwrap_err();
    assert_eq!(err.detail(), Some(&ErrorDetail::Unavailable));
    assert!(err.to_string().contains("failed to retrieve error detail"));
}

#[test]
fn test_close_is_idempotent() {
    let (sdk, mut dm) = open_mock();

    dm.close().unwrap();
    dm.close().unwrap();

    assert!(!dm.is_open());
    assert_eq!(sdk.call_count(MockCall::Release), 1);
    assert_eq!(sdk.live_handles(), 0);
}

#[test]
fn test_failed_release_still_closes() {
    let (sdk, mut dm) = open_mock();
    sdk.fail(MockCall::Release);

    let err = dm.close().unwrap_err();
    assert!(matches!(err, AlpaoError::Release { .. }));
    assert!(!dm.is_open());

    dm.close().unwrap();
    drop(dm);
    assert_eq!(sdk.call_count(MockCall::Release), 1);
}

#[test]
fn test_drop_releases_open_mirror() {
    let (sdk, dm) = open_mock();
    drop(dm);

    assert_eq!(sdk.live_handles(), 0);
    assert_eq!(sdk.call_count(MockCall::Release), 1);
}

#[test]
fn test_drop_after_close_makes_no_native_call() {
    let (sdk, mut dm) = open_mock();
    dm.close().unwrap();
    let calls = sdk.calls().len();

    drop(dm);
    assert_eq!(sdk.calls().len(), calls);
}

#[test]
#[traced_test]
fn test_drop_logs_release_failure() {
    let (sdk, dm) = open_mock();
    sdk.fail(MockCall::Release);
    drop(dm);

    assert!(logs_contain("Error closing deformable mirror"));
    assert_eq!(sdk.live_handles(), 0);
}

#[test]
fn test_reset_zeroes_command() {
    let (sdk, mut dm) = open_mock();
    dm.send(&sample_command(97, 1)).unwrap();
    dm.send(&sample_command(97, 2)).unwrap();

    dm.reset().unwrap();
    assert_eq!(dm.last_command(), vec![0.0; 97].as_slice());
    assert_eq!(sdk.call_count(MockCall::Reset), 1);
}

#[test]
fn test_failed_reset_keeps_local_zeroing() {
    let (sdk, mut dm) = open_mock();
    dm.send(&vec![0.5; 97]).unwrap();
    sdk.fail(MockCall::Reset);

    let err = dm.reset().unwrap_err();
    assert!(matches!(err, AlpaoError::Reset { .. }));
    assert!(dm.last_command().iter().all(|&v| v == 0.0));
}

#[test]
fn test_failed_stop() {
    let (sdk, mut dm) = open_mock();
    sdk.fail(MockCall::Stop);
    assert!(matches!(dm.stop().unwrap_err(), AlpaoError::Stop { .. }));
}

// =============================================================================
// Working directory handling
// =============================================================================

#[test]
#[serial]
fn test_path_identifier_opens_from_its_directory() {
    let config_dir = tempfile::tempdir().unwrap();
    let original = std::env::current_dir().unwrap();
    let identifier = config_dir.path().join("BOL143");

    let sdk = MockSdk::new(N_ACTUATORS);
    let dm = DeformableMirror::open_with(sdk.clone(), identifier.to_str().unwrap()).unwrap();

    let requests = sdk.open_requests();
    let request = &requests[0];
    assert_eq!(request.serial_name, "BOL143");
    assert_eq!(
        request.working_dir.as_ref().unwrap().canonicalize().unwrap(),
        config_dir.path().canonicalize().unwrap()
    );
    assert_eq!(std::env::current_dir().unwrap(), original);
    drop(dm);
}

#[test]
#[serial]
fn test_working_directory_restored_after_failed_open() {
    let config_dir = tempfile::tempdir().unwrap();
    let original = std::env::current_dir().unwrap();
    let identifier = config_dir.path().join("BOL143");

    let sdk = MockSdk::new(N_ACTUATORS);
    sdk.fail(MockCall::Open);
    assert!(DeformableMirror::open_with(sdk, identifier.to_str().unwrap()).is_err());

    assert_eq!(std::env::current_dir().unwrap(), original);
}

#[test]
#[serial]
fn test_missing_directory_fails_before_open() {
    let sdk = MockSdk::new(N_ACTUATORS);
    let err = DeformableMirror::open_with(sdk.clone(), "no/such/dir/BOL143").unwrap_err();

    assert!(matches!(err, AlpaoError::WorkingDirectory { .. }));
    assert_eq!(sdk.call_count(MockCall::Open), 0);
}

#[test]
#[serial]
fn test_open_with_config_applies_settings() {
    let config_dir = tempfile::tempdir().unwrap();
    let config = AlpaoConfig::from_toml_str(&format!(
        "identifier = \"BOL143\"\nconfig_dir = {:?}\nsync_mode = \"asynchronous\"\nack_timeout_ms = 500\nlog_print_level = 1\n",
        config_dir.path().to_str().unwrap()
    ))
    .unwrap();

    let sdk = MockSdk::new(N_ACTUATORS);
    let dm = DeformableMirror::open_with_config(sdk.clone(), &config).unwrap();

    assert_eq!(dm.n_actuators(), 97);
    assert_eq!(sdk.open_requests()[0].serial_name, "BOL143");
    assert_eq!(sdk.parameter("SyncMode"), Some(1.0));
    assert_eq!(sdk.parameter("AckTimeout"), Some(500.0));
    assert_eq!(sdk.parameter("LogPrintLevel"), Some(1.0));
}

#[test]
fn test_open_with_config_closes_on_rejected_setting() {
    let mut config = AlpaoConfig::new("BOL143");
    config.sync_mode = Some(SyncMode::Synchronous);

    let sdk = MockSdk::new(N_ACTUATORS);
    sdk.fail(MockCall::Set);

    let err = DeformableMirror::open_with_config(sdk.clone(), &config).unwrap_err();
    assert!(matches!(err, AlpaoError::Parameter { .. }));
    assert_eq!(sdk.live_handles(), 0);
}

// =============================================================================
// Command buffer
// =============================================================================

#[test]
fn test_send_clamps_every_value() {
    let (sdk, mut dm) = open_mock();

    for seed in 0..20 {
        let command = sample_command(97, seed);
        let sent = dm.send(&command).unwrap().to_vec();

        for (i, (&raw, &actual)) in command.iter().zip(&sent).enumerate() {
            assert!((CMD_MIN..=CMD_MAX).contains(&actual), "index {}", i);
            assert_eq!(actual, raw.clamp(-1.0, 1.0), "index {}", i);
        }
        assert_eq!(sdk.sent_commands().last().unwrap(), &sent);
    }
}

#[test]
fn test_send_known_vector() {
    let (_sdk, mut dm) = open_mock();
    let mut command = vec![0.0; 97];
    command[..3].copy_from_slice(&[1.5, -2.0, 0.3]);

    let sent = dm.send(&command).unwrap();
    assert_eq!(&sent[..3], &[1.0, -1.0, 0.3]);
    assert_eq!(command[0], 1.5, "caller input must not be mutated");
}

#[test]
fn test_wrong_length_rejected_before_native_call() {
    let (sdk, mut dm) = open_mock();
    dm.send(&vec![0.2; 97]).unwrap();
    let before = dm.last_command().to_vec();
    let sends = sdk.call_count(MockCall::Send);

    for len in [0, 1, 96, 98, 194] {
        let err = dm.send(&vec![0.9; len]).unwrap_err();
        assert!(err.is_dimension_error());
        assert!(matches!(
            err,
            AlpaoError::Dimension {
                expected: 97,
                actual,
            } if actual == len
        ));
    }

    assert_eq!(dm.last_command(), before.as_slice());
    assert_eq!(sdk.call_count(MockCall::Send), sends);
}

#[test]
fn test_failed_send_keeps_attempted_values() {
    let (sdk, mut dm) = open_mock();
    sdk.fail(MockCall::Send);

    let err = dm.send(&vec![3.0; 97]).unwrap_err();
    assert!(matches!(err, AlpaoError::Send { .. }));
    assert_eq!(dm.last_command(), vec![1.0; 97].as_slice());
}

#[test]
fn test_error_record_available_after_send_failure() {
    let (sdk, mut dm) = open_mock();
    sdk.fail(MockCall::Send);

    let err = dm.send(&vec![0.0; 97]).unwrap_err();
    let record = err.detail().and_then(ErrorDetail::record).unwrap();
    assert!(record.is_error());
    assert!(!record.message.is_empty());

    // The embedded record was consumed from the SDK stack
    assert!(!dm.pop_last_error().unwrap().is_error());
}

#[test]
fn test_pop_last_error_after_native_failure() {
    let (sdk, dm) = open_mock();
    sdk.push_error(ErrorRecord::new(7, "USB timeout"));

    let record = dm.pop_last_error().unwrap();
    assert_eq!(record.code, 7);
    assert_eq!(record.message, "USB timeout");
}

#[test]
fn test_send_and_overwrite_updates_caller_buffer() {
    let (sdk, mut dm) = open_mock();
    let mut command = sample_command(97, 3);
    let expected: Vec<f64> = command.iter().map(|&v| clamp_command(v)).collect();

    dm.send_and_overwrite(&mut command).unwrap();
    assert_eq!(command, expected);
    assert_eq!(dm.last_command(), expected.as_slice());
    assert_eq!(sdk.sent_commands().last().unwrap(), &expected);
}

#[test]
fn test_send_and_overwrite_wrong_length_leaves_buffer() {
    let (_sdk, mut dm) = open_mock();
    let mut command = vec![5.0; 10];

    assert!(dm.send_and_overwrite(&mut command).unwrap_err().is_dimension_error());
    assert_eq!(command, vec![5.0; 10]);
}

#[test]
fn test_send_and_overwrite_on_closed_mirror_leaves_buffer() {
    let sdk = MockSdk::new(3);
    let mut dm = DeformableMirror::open_with(sdk.clone(), "BOL143").unwrap();
    dm.send(&[0.5; 3]).unwrap();
    dm.close().unwrap();

    let mut command = [-0.2, 0.1, 0.9];
    assert!(dm.send_and_overwrite(&mut command).unwrap_err().is_closed());
    assert_eq!(command, [-0.2, 0.1, 0.9]);
}

#[test]
fn test_send_and_overwrite_writes_back_on_native_failure() {
    let sdk = MockSdk::new(3);
    let mut dm = DeformableMirror::open_with(sdk.clone(), "BOL143").unwrap();
    sdk.fail(MockCall::Send);

    let mut command = [1.5, -3.0, 0.25];
    let err = dm.send_and_overwrite(&mut command).unwrap_err();
    assert!(matches!(err, AlpaoError::Send { .. }));
    assert_eq!(command, [1.0, -1.0, 0.25]);
    assert_eq!(dm.last_command(), &[1.0, -1.0, 0.25]);
    assert!(sdk.sent_commands().is_empty());
}

#[test]
fn test_send_pattern() {
    let (sdk, mut dm) = open_mock();
    let mut patterns = vec![0.0; 97 * 3];
    patterns[97 * 2] = -4.0;

    let clamped = dm.send_pattern(&patterns, 5).unwrap();
    assert_eq!(clamped.len(), 97 * 3);
    assert_eq!(dm.last_command()[0], -1.0);

    let uploads = sdk.pattern_uploads();
    let upload = &uploads[0];
    assert_eq!(upload.n_patterns, 3);
    assert_eq!(upload.n_repeat, 5);
    assert_eq!(upload.values, clamped);
}

#[test]
fn test_send_pattern_rejects_partial_frames() {
    let (sdk, mut dm) = open_mock();

    for len in [0, 96, 97 * 2 + 1] {
        assert!(dm.send_pattern(&vec![0.0; len], 1).unwrap_err().is_dimension_error());
    }
    assert_eq!(sdk.call_count(MockCall::SendPattern), 0);
}

// =============================================================================
// Error channel
// =============================================================================

#[test]
fn test_error_query_failure_is_distinct() {
    let (sdk, dm) = open_mock();
    sdk.break_error_query();
    assert!(matches!(dm.pop_last_error(), Err(AlpaoError::ErrorQuery)));
}

#[test]
fn test_print_last_error() {
    let (sdk, dm) = open_mock();
    dm.print_last_error();
    assert_eq!(sdk.printed_errors(), 1);
}
