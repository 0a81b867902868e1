//! Classification and query properties checked through the full loop.

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use common::*;
use freefloor_middleware::{EventBus, Topic};
use freefloor_perception::{
    ClassifierParams, ColumnKey, GroundPointCloud, PassablePixelSet, PinholeIntrinsics,
};
use freefloor_runtime::{
    CycleOutcome, FloorConfig, FloorDetectionLoop, PeriodicThread, QueryOutcome,
    SharedFloorState, TargetQueryHandler,
};
use freefloor_types::{EventPayload, TargetPosition};

struct Rig {
    lp: FloorDetectionLoop,
    bus: EventBus,
    shared: SharedFloorState,
    config: FloorConfig,
}

fn rig(width: u32, height: u32, intrinsics: PinholeIntrinsics, depth: Vec<f32>) -> Rig {
    let sensor = MockSensor::new(width, height, intrinsics, depth);
    let tf = MockTransforms::identity();
    let config = mock_config(width, height);
    let bus = EventBus::default();
    let shared = SharedFloorState::new();
    let lp = FloorDetectionLoop::init(&config, &registry(&sensor, &tf), &bus, shared.clone())
        .unwrap();
    Rig {
        lp,
        bus,
        shared,
        config,
    }
}

/// Deterministic heights spread over floor, obstacle, overhead and
/// below-ground bands.
fn mixed_depths(n: usize) -> Vec<f32> {
    let mut seed: u32 = 0x2545_f491;
    (0..n)
        .map(|_| {
            seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            match seed >> 30 {
                0 => 0.02 + (seed % 7) as f32 * 0.01,
                1 => 0.3 + (seed % 20) as f32 * 0.1,
                2 => 3.5,
                _ => -0.05,
            }
        })
        .collect()
}

#[test]
fn end_to_end_four_by_four_grid() {
    // With f = 0.25 and an identity transform pixel (u, v) at height z lands in
    // column (trunc(40·u·z), trunc(40·v·z)): (1,0)@0.02 → (0,0),
    // (3,3)@0.02 → (2,2), and every -0.05 pixel in a non-positive column.
    let k = PinholeIntrinsics {
        fx: 0.25,
        fy: 0.25,
        cx: 0.0,
        cy: 0.0,
    };
    #[rustfmt::skip]
    let depth = vec![
        1.5,   0.02,  -0.05, -0.05,
        -0.05, -0.05, -0.05, -0.05,
        -0.05, -0.05, -0.05, -0.05,
        -0.05, -0.05, -0.05,  0.02,
    ];
    let mut rig = rig(4, 4, k, depth);
    assert_eq!(rig.lp.run_cycle(), CycleOutcome::Completed { passable: 1 });

    let snap = rig.shared.lock();
    let scale = rig.config.clipping.column_scale;
    let blocked_origin = snap.cloud.get(1, 0).unwrap();
    assert_eq!(ColumnKey::from_point(blocked_origin, scale), ColumnKey { x: 0, y: 0 });
    assert!(!snap.passable.contains(1, 0));

    let clear = snap.cloud.get(3, 3).unwrap();
    assert_eq!(ColumnKey::from_point(clear, scale), ColumnKey { x: 2, y: 2 });
    assert_eq!(snap.passable.pixels(), &[(3, 3)]);
}

#[test]
fn first_observation_decides_the_column() {
    // Every pixel shares column (0, 0).
    let mut blocked_first = rig(2, 2, single_column(), vec![1.0, 0.02, 0.02, 0.02]);
    assert_eq!(blocked_first.lp.run_cycle(), CycleOutcome::Completed { passable: 0 });

    let mut below_ground_first = rig(2, 2, single_column(), vec![-0.01, 0.02, 0.02, 0.02]);
    assert_eq!(below_ground_first.lp.run_cycle(), CycleOutcome::Completed { passable: 0 });

    // Known behaviour, kept on purpose: an obstacle seen after the column was
    // cleared does not block it, so floor under an overhang can read as
    // passable.
    let mut clear_first = rig(2, 2, single_column(), vec![0.02, 1.0, 0.02, 0.02]);
    assert_eq!(clear_first.lp.run_cycle(), CycleOutcome::Completed { passable: 3 });
}

#[test]
fn traversal_is_row_major_rows_outer() {
    // Swapping the two rows changes which pixel of the shared column is seen
    // first, and with it the whole result.
    let mut obstacle_row_first = rig(2, 2, single_column(), vec![1.0, 0.02, 0.02, 0.02]);
    let mut floor_row_first = rig(2, 2, single_column(), vec![0.02, 0.02, 1.0, 0.02]);
    obstacle_row_first.lp.run_cycle();
    floor_row_first.lp.run_cycle();

    assert!(obstacle_row_first.shared.lock().passable.is_empty());
    assert_eq!(
        floor_row_first.shared.lock().passable.pixels(),
        &[(0, 0), (1, 0), (1, 1)]
    );

    // Passable pixels are reported in visit order.
    let mut flat = rig(3, 2, single_column(), vec![0.02; 6]);
    flat.lp.run_cycle();
    assert_eq!(
        flat.shared.lock().passable.pixels(),
        &[(0, 0), (1, 0), (2, 0), (0, 1), (1, 1), (2, 1)]
    );
}

#[test]
fn passable_pixels_satisfy_the_floor_predicate() {
    let (w, h) = (12, 9);
    let mut rig = rig(w, h, spread(), mixed_depths((w * h) as usize));
    rig.lp.run_cycle();
    let params: ClassifierParams = rig.config.classifier_params();

    let snap = rig.shared.lock();
    let mut first_seen: HashMap<ColumnKey, bool> = HashMap::new();
    let mut expected = Vec::new();
    for r in 0..h {
        for c in 0..w {
            let p = snap.cloud.get(c, r).unwrap();
            let key = ColumnKey::from_point(p, params.column_scale);
            let blocked = *first_seen
                .entry(key)
                .or_insert(p.z < 0.0 || (p.z >= params.floor_height && p.z <= params.ceiling_height));
            if !blocked && p.z >= 0.0 && p.z < params.floor_height {
                expected.push((c, r));
            }
        }
    }

    assert!(!expected.is_empty(), "fixture should contain some floor");
    assert!(expected.len() < (w * h) as usize, "fixture should contain obstacles");
    assert_eq!(snap.passable.pixels(), expected.as_slice());
    for &(c, r) in snap.passable.pixels() {
        let z = snap.cloud.get(c, r).unwrap().z;
        assert!((0.0..params.floor_height).contains(&z), "pixel ({c}, {r}) at z = {z}");
    }
}

#[test]
fn repeated_cycles_on_identical_input_agree() {
    let (w, h) = (8, 6);
    let mut rig = rig(w, h, spread(), mixed_depths((w * h) as usize));
    let mut masks = rig.bus.subscribe_to(Topic::FloorMask);

    rig.lp.run_cycle();
    let first = rig.shared.lock().passable.clone();
    rig.lp.run_cycle();
    let second = rig.shared.lock().passable.clone();

    assert_eq!(first, second);
    assert_eq!(rig.shared.pass_count(), 2);
    let (EventPayload::FloorMask(a), EventPayload::FloorMask(b)) =
        (masks.try_recv().unwrap().payload, masks.try_recv().unwrap().payload)
    else {
        panic!("expected two masks");
    };
    assert_eq!(a, b);
}

#[test]
fn query_returns_stored_ground_position() {
    let (w, h) = (8, 6);
    let mut rig = rig(w, h, spread(), mixed_depths((w * h) as usize));
    rig.lp.run_cycle();

    let mut targets = rig.bus.subscribe_to(Topic::TargetPosition);
    let handler = TargetQueryHandler::open(&rig.config, &rig.bus, rig.shared.clone());

    for r in 0..h {
        for c in 0..w {
            let (passable, stored) = {
                let snap = rig.shared.lock();
                (snap.passable.contains(c, r), snap.cloud.get(c, r).unwrap())
            };
            let outcome = handler.handle(i64::from(c), i64::from(r));
            if passable {
                let expected = TargetPosition {
                    x: stored.x,
                    y: stored.y,
                };
                assert_eq!(outcome, QueryOutcome::Emitted(expected));
                let EventPayload::Target(got) = targets.try_recv().unwrap().payload else {
                    panic!("expected a target");
                };
                assert_eq!(got, expected);
            } else {
                assert_eq!(outcome, QueryOutcome::NotPassable);
                assert!(targets.try_recv().is_err());
            }
        }
    }
}

#[test]
fn out_of_bounds_query_leaves_state_alone() {
    let mut rig = rig(4, 3, spread(), mixed_depths(12));
    rig.lp.run_cycle();
    let mut targets = rig.bus.subscribe_to(Topic::TargetPosition);
    let handler = TargetQueryHandler::open(&rig.config, &rig.bus, rig.shared.clone());

    let before = {
        let snap = rig.shared.lock();
        (snap.cloud.clone(), snap.passable.clone(), snap.pass)
    };
    for (u, v) in [(4, 0), (0, 3), (4, 3), (-1, 0), (0, -1), (i64::MAX, 0)] {
        assert!(
            matches!(handler.handle(u, v), QueryOutcome::OutOfBounds(_)),
            "({u}, {v}) accepted"
        );
    }
    assert!(targets.try_recv().is_err());

    let snap = rig.shared.lock();
    assert_eq!(snap.cloud, before.0);
    assert_eq!(snap.passable, before.1);
    assert_eq!(snap.pass, before.2);
}

/// Checkerboard depth: floor at `floor_z` where `(c + r) % 2 == parity`,
/// overhead everywhere else.
fn checkerboard(w: u32, h: u32, parity: u32, floor_z: f32) -> Vec<f32> {
    (0..h)
        .flat_map(|r| (0..w).map(move |c| if (c + r) % 2 == parity { floor_z } else { 3.5 }))
        .collect()
}

/// Cloud and passable set one cycle produces for `depth`.
fn single_pass(w: u32, h: u32, depth: Vec<f32>) -> (GroundPointCloud, PassablePixelSet) {
    let mut rig = rig(w, h, spread(), depth);
    assert!(matches!(rig.lp.run_cycle(), CycleOutcome::Completed { .. }));
    let snap = rig.shared.lock();
    (snap.cloud.clone(), snap.passable.clone())
}

#[test]
fn queries_during_cycles_see_one_whole_pass() {
    let (w, h) = (6, 4);
    let even = checkerboard(w, h, 0, 0.02);
    let odd = checkerboard(w, h, 1, 0.04);
    let passes = [single_pass(w, h, even.clone()), single_pass(w, h, odd.clone())];
    assert!(passes[0].1.pixels().iter().all(|&(c, r)| !passes[1].1.contains(c, r)));

    let sensor = MockSensor::new(w, h, spread(), even.clone());
    let tf = MockTransforms::identity();
    let config = mock_config(w, h);
    let bus = EventBus::default();
    let shared = SharedFloorState::new();
    let lp = FloorDetectionLoop::init(&config, &registry(&sensor, &tf), &bus, shared.clone())
        .unwrap();
    let counters = lp.counters();
    let handler = TargetQueryHandler::open(&config, &bus, shared.clone());

    let thread = PeriodicThread::spawn(
        "floor-loop",
        Duration::from_millis(1),
        Arc::new(AtomicBool::new(false)),
        lp,
    )
    .unwrap();
    while shared.pass_count() == 0 {
        std::thread::sleep(Duration::from_millis(1));
    }

    let done = AtomicBool::new(false);
    let (emitted, checked) = std::thread::scope(|scope| {
        let queries = scope.spawn(|| {
            let mut emitted = 0usize;
            while !done.load(Ordering::Acquire) {
                for r in 0..h {
                    for c in 0..w {
                        let QueryOutcome::Emitted(got) = handler.handle(i64::from(c), i64::from(r))
                        else {
                            continue;
                        };
                        let (cloud, _) = passes
                            .iter()
                            .find(|(_, passable)| passable.contains(c, r))
                            .unwrap_or_else(|| panic!("({c}, {r}) passable in neither input"));
                        let p = cloud.get(c, r).unwrap();
                        assert_eq!((got.x, got.y), (p.x, p.y), "pixel ({c}, {r})");
                        emitted += 1;
                    }
                }
            }
            emitted
        });

        let snapshots = scope.spawn(|| {
            let mut checked = 0usize;
            while !done.load(Ordering::Acquire) {
                let snap = shared.lock();
                let whole = passes
                    .iter()
                    .any(|(cloud, passable)| snap.cloud == *cloud && snap.passable == *passable);
                assert!(whole, "pass {} mixes two inputs", snap.pass);
                checked += 1;
            }
            checked
        });

        let deadline = Instant::now() + Duration::from_secs(10);
        let mut flips = 0u64;
        while counters.snapshot().completed < 60 && Instant::now() < deadline {
            flips += 1;
            sensor.set_depth(if flips % 2 == 0 { even.clone() } else { odd.clone() });
            std::thread::sleep(Duration::from_micros(700));
        }
        done.store(true, Ordering::Release);
        (queries.join().unwrap(), snapshots.join().unwrap())
    });

    thread.join().unwrap();
    assert!(counters.snapshot().completed >= 2, "loop barely ran");
    assert!(emitted > 0);
    assert!(checked > 0);
}
