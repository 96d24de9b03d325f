mod common;

use common::*;
use embassy_futures::block_on;
use embassy_time::Duration;
use eprobe_core::connectivity::ConnectionState;
use eprobe_core::display::layout::DisplayLayout;
use eprobe_core::display::{DisplayError, RefreshKind};
use eprobe_core::sensors::SensorSample;
use eprobe_core::{CycleState, Probe, ProbeConfig, ProbeError};

fn started(scenario: Scenario) -> (Probe<TestBoard>, Trace) {
    started_with(scenario, config())
}

fn started_with(scenario: Scenario, config: ProbeConfig) -> (Probe<TestBoard>, Trace) {
    let (hw, trace) = hardware(&scenario, &fresh_slot());
    let mut probe = Probe::new(hw, config);
    block_on(probe.start()).expect("startup");
    trace.borrow_mut().clear();
    (probe, trace)
}

fn delays(trace: &Trace) -> Vec<u32> {
    trace
        .borrow()
        .iter()
        .filter_map(|e| match e {
            Event::Delay(ms) => Some(*ms),
            _ => None,
        })
        .collect()
}

fn is_window(e: &Event) -> bool {
    matches!(e, Event::PanelWindow(_))
}

fn is_save(e: &Event) -> bool {
    matches!(e, Event::Save(..))
}

fn is_append(e: &Event) -> bool {
    matches!(e, Event::Append(_))
}

fn ends_with_heartbeat(trace: &Trace) -> bool {
    let trace = trace.borrow();
    trace.ends_with(&[Event::PinLow, Event::Delay(100), Event::PinHigh])
}

#[test]
fn test_startup_sequence_reports_each_step() {
    let (hw, trace) = hardware(&Scenario::default(), &fresh_slot());
    let mut probe = Probe::new(hw, config());

    block_on(probe.start()).unwrap();

    let layout = DisplayLayout::Wide128x250;
    let status = layout.status_region().area;
    let trace = trace.borrow();
    let panel: Vec<&Event> = trace
        .iter()
        .filter(|e| matches!(e, Event::PanelInit | Event::PanelFull | Event::PanelWindow(_)))
        .collect();
    assert_eq!(
        panel,
        [
            &Event::PanelInit,
            &Event::PanelFull,
            &Event::PanelWindow(status),
            &Event::PanelWindow(status),
            &Event::PanelWindow(status),
            &Event::PanelWindow(status),
            &Event::PanelFull,
            &Event::PanelFull,
        ]
    );
    assert!(trace.contains(&Event::SessionConnect));
    assert_eq!(probe.persisted().boot_count, 1);
    assert_eq!(probe.cycle_count(), 0);
}

#[test]
fn test_no_network_cycle_still_renders_logs_and_pulses() {
    let (mut probe, trace) = started(Scenario {
        network: false,
        ..Scenario::default()
    });

    let report = block_on(probe.run_cycle()).unwrap();

    assert_eq!(report.cycle, 1);
    assert_eq!(report.connection, ConnectionState::Failed);
    assert_eq!(count(&trace, |e| *e == Event::LinkPoll), 10);
    assert_eq!(delays(&trace)[..10], [1000; 10]);
    assert_eq!(count(&trace, |e| *e == Event::SessionConnect), 0);

    assert_eq!(report.refresh, RefreshKind::Partial);
    assert_eq!(count(&trace, is_window), 5);
    assert!(report.logged);
    assert_eq!(count(&trace, is_append), 1);

    assert!(report.published.none_sent());
    assert_eq!(count(&trace, is_save), 0);
    assert_eq!(count(&trace, |e| *e == Event::Pump), 0);
    assert!(ends_with_heartbeat(&trace));
}

#[test]
fn test_full_refresh_only_on_multiples_of_forty() {
    let (mut probe, trace) = started(Scenario::default());

    for cycle in 1..=80u32 {
        trace.borrow_mut().clear();
        let report = block_on(probe.run_cycle()).unwrap();
        assert_eq!(report.cycle, cycle);

        let fulls = count(&trace, |e| *e == Event::PanelFull);
        let windows = count(&trace, is_window);
        if cycle % 40 == 0 {
            assert_eq!(report.refresh, RefreshKind::Full, "cycle {}", cycle);
            assert_eq!((fulls, windows), (2, 0), "cycle {}", cycle);
        } else {
            assert_eq!(report.refresh, RefreshKind::Partial, "cycle {}", cycle);
            assert_eq!((fulls, windows), (0, 5), "cycle {}", cycle);
        }
    }
}

#[test]
fn test_sensor_failure_yields_zeroed_record_and_heartbeat() {
    let (mut probe, trace) = started(Scenario {
        sensor: false,
        ..Scenario::default()
    });

    let report = block_on(probe.run_cycle()).unwrap();

    assert_eq!(report.sample, SensorSample::zeroed(NOW));
    assert!(trace.borrow().contains(&Event::Append(
        "'Tue Nov 14 23:13:20 2023',0.00,0.00,0.00,0.0000\n".to_string()
    )));
    assert_eq!(count(&trace, is_save), 4);
    assert!(ends_with_heartbeat(&trace));
    assert_eq!(probe.sensor_reader().failures(), 1);
}

#[test]
fn test_cycle_logs_reference_record() {
    let (mut probe, trace) = started(Scenario::default());

    block_on(probe.run_cycle()).unwrap();

    assert!(trace.borrow().contains(&Event::Append(
        "'Tue Nov 14 23:13:20 2023',21.50,44.12,1013.25,150.0000\n".to_string()
    )));
}

#[test]
fn test_storage_failure_does_not_stop_publish_or_heartbeat() {
    let (mut probe, trace) = started(Scenario {
        storage: false,
        ..Scenario::default()
    });

    let report = block_on(probe.run_cycle()).unwrap();

    assert!(!report.logged);
    assert!(report.published.all_sent());
    assert_eq!(count(&trace, is_save), 4);
    assert!(ends_with_heartbeat(&trace));
    assert_eq!(probe.logger().dropped(), 1);
}

#[test]
fn test_stages_run_in_fixed_order() {
    let (mut probe, trace) = started(Scenario::default());

    block_on(probe.run_cycle()).unwrap();

    let pump = position(&trace, |e| *e == Event::Pump).unwrap();
    let measure = position(&trace, |e| *e == Event::Measure).unwrap();
    let render = position(&trace, is_window).unwrap();
    let append = position(&trace, is_append).unwrap();
    let publish = position(&trace, is_save).unwrap();
    let pulse = rposition(&trace, |e| *e == Event::PinLow).unwrap();
    assert!(pump < measure);
    assert!(measure < render);
    assert!(render < append);
    assert!(append < publish);
    assert!(publish < pulse);
    assert_eq!(probe.cycle_state(), CycleState::Idle);
}

#[test]
fn test_connected_probe_publishes_native_units_without_reconnecting() {
    let (mut probe, trace) = started(Scenario::default());
    let attempts = probe.connectivity().attempts();

    let report = block_on(probe.run_cycle()).unwrap();

    assert_eq!(report.connection, ConnectionState::Connected);
    assert_eq!(probe.connectivity().attempts(), attempts);
    assert_eq!(count(&trace, |e| *e == Event::LinkBegin), 0);
    let saves: Vec<Event> = trace.borrow().iter().filter(|e| is_save(e)).cloned().collect();
    assert_eq!(
        saves,
        [
            Event::Save("temperature", 21.5),
            Event::Save("humidity", 44.12),
            Event::Save("pressure", 101_325.0),
            Event::Save("airquality", 150_000.0),
        ]
    );
    assert_eq!(probe.publisher().stats().sent, 4);
}

#[test]
fn test_time_is_synced_once_after_first_connection() {
    let (hw, trace) = hardware(
        &Scenario {
            clock: 0,
            ..Scenario::default()
        },
        &fresh_slot(),
    );
    let mut probe = Probe::new(hw, config());

    block_on(probe.start()).unwrap();
    assert_eq!(probe.time().now(), NOW);
    assert!(probe.time().is_time_set());

    block_on(probe.run_cycle()).unwrap();
    block_on(probe.run_cycle()).unwrap();
    assert_eq!(count(&trace, |e| *e == Event::SyncPoll), 1);
}

#[test]
fn test_missing_display_is_fatal_at_startup() {
    let (hw, trace) = hardware(
        &Scenario {
            panel: false,
            ..Scenario::default()
        },
        &fresh_slot(),
    );
    let mut probe = Probe::new(hw, config());

    assert_eq!(
        block_on(probe.start()),
        Err(ProbeError::Display(DisplayError::InitFailed))
    );
    assert_eq!(count(&trace, |e| *e == Event::LinkBegin), 0);
}

#[test]
fn test_display_failure_mid_cycle_completes_cycle_then_errors() {
    // Startup uses seven refreshes; everything after that fails
    let (mut probe, trace) = started(Scenario {
        panel_fails_after: Some(7),
        ..Scenario::default()
    });

    let result = block_on(probe.run_cycle());

    assert_eq!(result, Err(ProbeError::Display(DisplayError::RefreshFailed)));
    assert_eq!(count(&trace, is_append), 1);
    assert_eq!(count(&trace, is_save), 4);
    assert!(ends_with_heartbeat(&trace));
    assert_eq!(probe.cycle_state(), CycleState::Idle);
}

#[test]
fn test_run_stops_on_display_failure() {
    let (mut probe, trace) = started(Scenario {
        panel_fails_after: Some(7 + 5),
        ..Scenario::default()
    });

    let result = block_on(probe.run());

    assert_eq!(result, Err(ProbeError::Display(DisplayError::RefreshFailed)));
    assert_eq!(probe.cycle_count(), 2);
    assert_eq!(count(&trace, |e| *e == Event::Delay(30_000)), 1);
}

#[test]
fn test_light_sleep_retains_cycle_counter() {
    let slot = fresh_slot();
    let (hw, trace) = hardware(&Scenario::default(), &slot);
    let mut probe = Probe::new(hw, ProbeConfig::low_power());
    block_on(probe.start()).unwrap();
    block_on(probe.run_cycle()).unwrap();

    block_on(probe.wait_for_next_cycle());

    assert_eq!(count(&trace, |e| *e == Event::Sleep(Duration::from_secs(30))), 1);
    assert_eq!(count(&trace, |e| *e == Event::Delay(30_000)), 0);

    // A reset after the sleep restores the counters from the slot
    let (hw, _) = hardware(&Scenario::default(), &slot);
    let mut probe = Probe::new(hw, ProbeConfig::low_power());
    block_on(probe.start()).unwrap();
    assert_eq!(probe.persisted().boot_count, 2);
    assert_eq!(probe.cycle_count(), 1);
    assert_eq!(block_on(probe.run_cycle()).unwrap().cycle, 2);
}

#[test]
fn test_always_on_restart_resets_cycle_counter() {
    let slot = fresh_slot();
    let (hw, _) = hardware(&Scenario::default(), &slot);
    let mut probe = Probe::new(hw, ProbeConfig::low_power());
    block_on(probe.start()).unwrap();
    block_on(probe.run_cycle()).unwrap();
    block_on(probe.wait_for_next_cycle());

    let (hw, _) = hardware(&Scenario::default(), &slot);
    let mut probe = Probe::new(hw, config());
    block_on(probe.start()).unwrap();
    assert_eq!(probe.persisted().boot_count, 2);
    assert_eq!(probe.cycle_count(), 0);
}

#[test]
fn test_boot_count_survives_always_on_resets() {
    let slot = fresh_slot();

    for boot in 1..=3u32 {
        let (hw, _) = hardware(&Scenario::default(), &slot);
        let mut probe = Probe::new(hw, config());
        block_on(probe.start()).unwrap();
        assert_eq!(probe.persisted().boot_count, boot);

        block_on(probe.run_cycle()).unwrap();
        block_on(probe.wait_for_next_cycle());
        assert_eq!(probe.cycle_count(), 1);
    }
}

#[test]
fn test_link_is_dropped_before_sleep_and_restored_next_cycle() {
    let (mut probe, trace) = started_with(Scenario::default(), ProbeConfig::low_power());
    block_on(probe.run_cycle()).unwrap();

    block_on(probe.wait_for_next_cycle());

    let disconnect = position(&trace, |e| *e == Event::LinkDisconnect).unwrap();
    let sleep = position(&trace, |e| matches!(e, Event::Sleep(_))).unwrap();
    assert!(disconnect < sleep);
    assert_eq!(probe.connectivity().state(), ConnectionState::Disconnected);

    trace.borrow_mut().clear();
    let report = block_on(probe.run_cycle()).unwrap();
    assert_eq!(report.connection, ConnectionState::Connected);
    assert_eq!(count(&trace, |e| *e == Event::LinkBegin), 1);
    assert!(report.published.all_sent());
}

#[test]
fn test_always_on_cycle_keeps_link_between_cycles() {
    let (mut probe, trace) = started(Scenario::default());
    block_on(probe.run_cycle()).unwrap();

    block_on(probe.wait_for_next_cycle());

    assert_eq!(count(&trace, |e| *e == Event::LinkDisconnect), 0);
    assert_eq!(probe.connectivity().state(), ConnectionState::Connected);
}

#[test]
fn test_square_layout_refreshes_counter_region_too() {
    let (mut probe, trace) = started_with(Scenario::default(), ProbeConfig::low_power());

    block_on(probe.run_cycle()).unwrap();

    assert_eq!(count(&trace, is_window), 6);
}
