//! Integration tests for the Runtime → HealthScheduler → FaultRecorder
//! pipeline.
//!
//! Each test boots a [`Runtime`] against the mock board, drives loop
//! iterations with `tick()`, and observes fault-forced restarts by
//! catching the [`Restarted`] unwind from `wait_for_reset`.  Restart
//! cycles are simulated by moving the storage into a fresh boot.

use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::mock_hw::{BoardCall, MockBoard, MockStorage, RecordingSink, Restarted};

use faultwatch::app::events::BootEvent;
use faultwatch::app::ports::StorageError;
use faultwatch::app::service::{Runtime, RuntimeState};
use faultwatch::config::{CursorPolicy, LOG_CAPACITY, RuntimeConfig};
use faultwatch::diagnostics::{FaultRecord, RECORD_SIZE};
use faultwatch::drivers::status_led::HeartbeatLed;
use faultwatch::error::{Error, FaultKind};
use faultwatch::reset_cause::{ResetCause, ResetKind};

type TestRuntime = Runtime<MockBoard, MockStorage, HeartbeatLed>;

const WATCHDOG_BITS: u8 = 1 << 3;

fn boot_with(
    config: RuntimeConfig,
    board: MockBoard,
    storage: MockStorage,
) -> (TestRuntime, RecordingSink) {
    let mut sink = RecordingSink::default();
    let runtime = Runtime::boot(config, board, storage, HeartbeatLed::new(13), &mut sink)
        .expect("boot should succeed");
    (runtime, sink)
}

fn boot() -> (TestRuntime, RecordingSink) {
    boot_with(RuntimeConfig::default(), MockBoard::new(), MockStorage::new())
}

/// Run one iteration.  Returns `true` if it ended in a forced restart.
fn tick_restarts(runtime: &mut TestRuntime) -> bool {
    match catch_unwind(AssertUnwindSafe(|| runtime.tick())) {
        Ok(()) => false,
        Err(payload) => {
            assert!(
                payload.is::<Restarted>(),
                "tick panicked for a reason other than a forced restart"
            );
            true
        }
    }
}

/// Boot, make the battery sag at uptime `now_ms`, tick into the fault and
/// hand back the storage as the next boot would find it.
fn low_voltage_cycle(
    config: &RuntimeConfig,
    reset_bits: u8,
    storage: MockStorage,
    now_ms: u32,
) -> MockStorage {
    let (mut rt, _) = boot_with(
        config.clone(),
        MockBoard::with_reset_bits(reset_bits),
        storage,
    );
    rt.board_mut().now_ms = now_ms;
    rt.board_mut().battery = config.voltage_floor - 1;
    assert!(tick_restarts(&mut rt));
    let (_, storage, _) = rt.into_parts();
    storage
}

// ── Boot sequence ─────────────────────────────────────────────

#[test]
fn boot_replays_banner_every_slot_then_initialized() {
    let (rt, sink) = boot();

    assert_eq!(sink.events.len(), 1 + LOG_CAPACITY + 1);
    assert_eq!(
        sink.events[0],
        BootEvent::Banner {
            reset_cause: ResetCause::from_kind(ResetKind::PowerOn),
            implied_fault: None,
            populated: 0,
            capacity: LOG_CAPACITY,
        }
    );
    for (i, event) in sink.events[1..=LOG_CAPACITY].iter().enumerate() {
        assert_eq!(
            *event,
            BootEvent::Record {
                index: i,
                record: FaultRecord::EMPTY
            }
        );
    }
    assert_eq!(sink.events.last(), Some(&BootEvent::Initialized));

    assert_eq!(
        rt.board().calls,
        vec![BoardCall::ReadResetCause, BoardCall::Arm(2000)]
    );
}

#[test]
fn boot_on_erased_storage_reports_empty_log() {
    let (rt, sink) = boot_with(
        RuntimeConfig::default(),
        MockBoard::new(),
        MockStorage::erased(),
    );
    assert!(matches!(
        sink.events[0],
        BootEvent::Banner { populated: 0, .. }
    ));
    assert_eq!(rt.recorder().store().cursor(), 0);
}

#[test]
fn boot_fails_on_undersized_storage() {
    let mut sink = RecordingSink::default();
    let result: faultwatch::error::Result<TestRuntime> = Runtime::boot(
        RuntimeConfig::default(),
        MockBoard::new(),
        MockStorage::sized(LOG_CAPACITY * RECORD_SIZE - 1),
        HeartbeatLed::new(13),
        &mut sink,
    );
    assert!(matches!(
        result,
        Err(Error::Storage(StorageError::OutOfBounds))
    ));
    assert!(sink.events.is_empty(), "nothing may be replayed without a store");
}

// ── Healthy operation ─────────────────────────────────────────

#[test]
fn healthy_tick_acknowledges_first_and_pulses_heartbeat() {
    let (mut rt, _) = boot();
    rt.board_mut().clear_calls();

    assert!(!tick_restarts(&mut rt));

    assert_eq!(
        rt.board().calls,
        vec![
            BoardCall::Acknowledge,
            BoardCall::ReadSensor,
            BoardCall::ReadBattery,
            BoardCall::Delay(20),
            BoardCall::Delay(50),
        ]
    );
    assert_eq!(rt.heartbeat().pulses(), 1);
    assert!(!rt.heartbeat().is_lit());
    assert_eq!(rt.scheduler().passes(), 1);
}

#[test]
fn many_healthy_ticks_never_touch_storage() {
    let (mut rt, _) = boot();
    for _ in 0..50 {
        assert!(!tick_restarts(&mut rt));
    }
    assert_eq!(rt.board().count(BoardCall::Acknowledge), 50);
    assert_eq!(rt.recorder().store().storage().writes, 0);
}

#[test]
fn battery_at_floor_is_healthy() {
    let (mut rt, _) = boot();
    rt.board_mut().battery = 600;
    assert!(!tick_restarts(&mut rt));
    assert!(!rt.board().restarted());
}

#[test]
fn sensor_range_endpoints_are_valid() {
    let (mut rt, _) = boot();
    rt.board_mut().sensor_script.extend([0, 1023]);
    assert!(!tick_restarts(&mut rt));
    assert!(!tick_restarts(&mut rt));
    assert_eq!(rt.scheduler().passes(), 2);
}

// ── Fault handling ────────────────────────────────────────────

#[test]
fn low_voltage_raises_once_and_records() {
    let (mut rt, _) = boot();
    rt.board_mut().battery = 599;
    rt.board_mut().clear_calls();

    assert!(tick_restarts(&mut rt));

    assert_eq!(
        rt.board().calls,
        vec![
            BoardCall::Acknowledge,
            BoardCall::ReadSensor,
            BoardCall::ReadBattery,
            // capture: fresh readings for the record
            BoardCall::ReadSensor,
            BoardCall::ReadBattery,
            BoardCall::Delay(50),
            BoardCall::ForceRestart,
        ]
    );
    assert_eq!(rt.heartbeat().pulses(), 0);
    assert_eq!(rt.scheduler().passes(), 0);

    let store = rt.recorder().store();
    assert_eq!(store.count(), 1);
    let (slot, record) = store.latest().expect("record must be persisted");
    assert_eq!(slot, 0);
    assert_eq!(record.error_code, FaultKind::LowVoltage);
    assert_eq!(record.battery_level, 599);
    assert_eq!(record.sensor_value, 512);
    assert_eq!(record.reset_cause, ResetCause::from_kind(ResetKind::PowerOn));
}

#[test]
fn sensor_one_past_either_end_is_invalid() {
    for bad in [-1, 1024] {
        let (mut rt, _) = boot();
        rt.board_mut().sensor = bad;
        assert!(tick_restarts(&mut rt));
        let (_, record) = rt.recorder().store().latest().unwrap();
        assert_eq!(record.error_code, FaultKind::InvalidSensor, "reading {bad}");
    }
}

#[test]
fn first_failing_check_wins() {
    let (mut rt, _) = boot();
    rt.board_mut().sensor = 1024;
    rt.board_mut().battery = 10;
    rt.board_mut().clear_calls();

    assert!(tick_restarts(&mut rt));

    // The voltage check never sampled the battery; only the capture did.
    assert_eq!(rt.board().count(BoardCall::ReadBattery), 1);
    assert_eq!(rt.board().count(BoardCall::ForceRestart), 1);
    let store = rt.recorder().store();
    assert_eq!(store.count(), 1);
    assert_eq!(store.read_slot(0).error_code, FaultKind::InvalidSensor);
    assert_eq!(store.read_slot(0).battery_level, 10);
}

#[test]
fn slow_iteration_raises_loop_stall_with_duration() {
    let (mut rt, _) = boot();
    rt.board_mut().ms_per_sensor_read = 201;

    assert!(tick_restarts(&mut rt));

    let (_, record) = rt.recorder().store().latest().unwrap();
    assert_eq!(record.error_code, FaultKind::LoopStall);
    assert_eq!(record.loop_duration_ms, 201);
}

#[test]
fn loop_exactly_on_budget_is_healthy() {
    let (mut rt, _) = boot();
    rt.board_mut().ms_per_sensor_read = 200;
    assert!(!tick_restarts(&mut rt));
}

#[test]
fn stale_sensor_raises_sensor_timeout_before_loop_stall() {
    let (mut rt, _) = boot();
    // One slow battery read makes both budgets overrun; staleness is checked first.
    rt.board_mut().ms_per_battery_read = 301;

    assert!(tick_restarts(&mut rt));

    let (_, record) = rt.recorder().store().latest().unwrap();
    assert_eq!(record.error_code, FaultKind::SensorTimeout);
}

#[test]
fn record_carries_uptime_in_seconds() {
    let (mut rt, _) = boot();
    rt.board_mut().now_ms = 42_750;
    rt.board_mut().battery = 100;

    assert!(tick_restarts(&mut rt));

    let (_, record) = rt.recorder().store().latest().unwrap();
    assert_eq!(record.uptime_secs, 42);
}

#[test]
fn storage_failure_still_restarts() {
    let mut storage = MockStorage::new();
    storage.fail_writes = true;
    let (mut rt, _) = boot_with(RuntimeConfig::default(), MockBoard::new(), storage);
    rt.board_mut().battery = 0;

    assert!(tick_restarts(&mut rt));

    assert!(rt.board().restarted());
    assert_eq!(rt.recorder().store().count(), 0);
}

#[test]
fn cursor_cell_failure_keeps_the_fault_record() {
    let mut storage = MockStorage::new();
    storage.fail_at = Some(LOG_CAPACITY * RECORD_SIZE);
    let (mut rt, _) = boot_with(RuntimeConfig::default(), MockBoard::new(), storage);
    rt.board_mut().battery = 0;

    assert!(tick_restarts(&mut rt));

    let store = rt.recorder().store();
    assert_eq!(store.cursor(), 1);
    assert_eq!(store.read_slot(0).error_code, FaultKind::LowVoltage);
    assert_eq!(store.latest().map(|(slot, _)| slot), Some(0));
}

// ── Lifecycle ─────────────────────────────────────────────────

#[test]
fn runtime_is_running_after_boot() {
    let (mut rt, _) = boot();
    assert_eq!(rt.state(), RuntimeState::Running);
    assert!(!tick_restarts(&mut rt));
    assert_eq!(rt.state(), RuntimeState::Running);
}

#[test]
fn failed_pass_enters_halting_before_restart() {
    let (mut rt, _) = boot();
    rt.board_mut().sensor = 2000;

    assert!(tick_restarts(&mut rt));

    assert_eq!(rt.state(), RuntimeState::Halting);
    assert!(rt.board().restarted());
    assert_eq!(rt.scheduler().passes(), 0);
}

#[test]
fn custom_config_limits_apply() {
    let config = RuntimeConfig {
        voltage_floor: 650,
        heartbeat_on_ms: 5,
        heartbeat_off_ms: 10,
        ..Default::default()
    };
    let (mut rt, _) = boot_with(config, MockBoard::new(), MockStorage::new());
    rt.board_mut().battery = 660;
    rt.board_mut().clear_calls();
    assert!(!tick_restarts(&mut rt));
    assert!(rt.board().calls.ends_with(&[BoardCall::Delay(5), BoardCall::Delay(10)]));

    rt.board_mut().battery = 649;
    assert!(tick_restarts(&mut rt));
}

// ── Restart cycles ────────────────────────────────────────────

#[test]
fn next_boot_replays_the_fault_and_reports_watchdog_reset() {
    let config = RuntimeConfig::default();
    let storage = low_voltage_cycle(&config, 0b0001, MockStorage::new(), 3_000);

    let (rt, sink) = boot_with(
        config,
        MockBoard::with_reset_bits(WATCHDOG_BITS),
        storage,
    );

    assert_eq!(
        sink.events[0],
        BootEvent::Banner {
            reset_cause: ResetCause::from_kind(ResetKind::Watchdog),
            implied_fault: Some(FaultKind::WatchdogTimeout),
            populated: 1,
            capacity: LOG_CAPACITY,
        }
    );
    match &sink.events[1] {
        BootEvent::Record { index: 0, record } => {
            assert_eq!(record.error_code, FaultKind::LowVoltage);
            assert_eq!(record.uptime_secs, 3);
            assert!(record.reset_cause.is_power_on());
        }
        other => panic!("unexpected first record event {other:?}"),
    }
    assert_eq!(rt.reset_cause().primary(), ResetKind::Watchdog);
}

#[test]
fn persisted_cursor_appends_after_previous_boot() {
    let config = RuntimeConfig::default();
    let storage = low_voltage_cycle(&config, 0b0001, MockStorage::new(), 1_000);
    let storage = low_voltage_cycle(&config, WATCHDOG_BITS, storage, 2_000);

    let (rt, _) = boot_with(config, MockBoard::with_reset_bits(WATCHDOG_BITS), storage);
    let store = rt.recorder().store();
    assert_eq!(store.count(), 2);
    assert_eq!(store.cursor(), 2);
    assert_eq!(store.read_slot(0).uptime_secs, 1);
    assert_eq!(store.read_slot(1).uptime_secs, 2);
    assert!(store.read_slot(1).reset_cause.is_watchdog());
}

#[test]
fn six_faults_wrap_onto_slot_zero() {
    let config = RuntimeConfig::default();
    let mut storage = MockStorage::new();
    for i in 1..=6u32 {
        storage = low_voltage_cycle(&config, WATCHDOG_BITS, storage, i * 1_000);
    }

    let (rt, sink) = boot_with(config, MockBoard::with_reset_bits(WATCHDOG_BITS), storage);
    let store = rt.recorder().store();
    assert_eq!(store.read_slot(0).uptime_secs, 6);
    for slot in 1..LOG_CAPACITY {
        assert_eq!(store.read_slot(slot).uptime_secs, slot as u32 + 1);
    }
    assert!(matches!(
        sink.events[0],
        BootEvent::Banner { populated: 5, .. }
    ));
    let chronological: Vec<u32> = store
        .iter_chronological()
        .map(|(_, r)| r.uptime_secs)
        .collect();
    assert_eq!(chronological, vec![2, 3, 4, 5, 6]);
}

#[test]
fn reset_on_boot_policy_overwrites_slot_zero_every_run() {
    let config = RuntimeConfig {
        cursor_policy: CursorPolicy::ResetOnBoot,
        ..Default::default()
    };
    let storage = MockStorage::sized(LOG_CAPACITY * RECORD_SIZE);
    let storage = low_voltage_cycle(&config, 0b0001, storage, 1_000);
    let storage = low_voltage_cycle(&config, WATCHDOG_BITS, storage, 2_000);

    let (rt, _) = boot_with(config, MockBoard::with_reset_bits(WATCHDOG_BITS), storage);
    let store = rt.recorder().store();
    assert_eq!(store.count(), 1);
    assert_eq!(store.read_slot(0).uptime_secs, 2);
}
