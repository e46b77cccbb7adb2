//! Sorting station runs against scripted detections and the simulated arm.

use std::sync::atomic::AtomicBool;
use tictacarm::{
    Actuator, ColorCalibration, CubeColor, DetectedObject, Joint, ScriptedDetector, SimulatedActuator,
    SortStats, SortingConfig, SortingStation,
};

#[tokio::test(start_paused = true)]
async fn test_run_sorts_largest_cube_per_scan() {
    let config = SortingConfig::default();
    let sim = SimulatedActuator::new();
    let detector = ScriptedDetector::new([
        vec![
            DetectedObject::new(CubeColor::Aqua, 100, 100, 600),
            DetectedObject::new(CubeColor::Black, 300, 200, 3000),
        ],
        vec![],
        vec![DetectedObject::new(CubeColor::Aqua, 320, 240, 2000)],
    ]);
    let mut station = SortingStation::new(&sim, &detector, &config, ColorCalibration::default());
    let stop = AtomicBool::new(false);

    let stats = station.run(Some(3), &stop).await.unwrap();

    assert_eq!(
        stats,
        SortStats {
            black: 1,
            aqua: 1,
            total: 2
        }
    );
    assert_eq!(stats.to_string(), "Black: 1, Aqua: 1, Total: 2");
    assert_eq!(sim.angle(Joint::Base).await, Some(15.0));
    assert_eq!(sim.angle(Joint::Claw).await, Some(40.0));
}

#[tokio::test(start_paused = true)]
async fn test_stop_flag_ends_run_at_home() {
    let config = SortingConfig::default();
    let sim = SimulatedActuator::new();
    let detector = ScriptedDetector::new([vec![DetectedObject::new(CubeColor::Black, 1, 1, 5000)]]);
    let mut station = SortingStation::new(&sim, &detector, &config, ColorCalibration::default());
    let stop = AtomicBool::new(true);

    let stats = station.run(None, &stop).await.unwrap();

    assert_eq!(stats, SortStats::default());
    assert_eq!(sim.angle(Joint::WristPitch).await, Some(180.0));
}

#[tokio::test(start_paused = true)]
async fn test_fault_still_reports_error_after_cleanup() {
    let config = SortingConfig::default();
    let sim = SimulatedActuator::new();
    sim.fail_after(0);
    let detector = ScriptedDetector::default();
    let mut station = SortingStation::new(&sim, &detector, &config, ColorCalibration::default());

    let result = station.run(Some(1), &AtomicBool::new(false)).await;

    assert!(result.is_err());
    assert_eq!(sim.command_count(), 0);
}
