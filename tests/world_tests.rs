//! Whole-world behaviour of the snow simulation
//!
//! These drive the seeded default town through the public API only.

use snow_sim::simulation::{
    find_route, LocationKind, RoutePolicy, SegmentId, ServiceKind, SimWorld,
};

fn seeded_world(seed: u64) -> SimWorld {
    SimWorld::create_test_world_with_seed(seed).expect("default town builds")
}

#[test]
fn test_seeded_runs_are_identical() {
    let mut first = seeded_world(7);
    let mut second = seeded_world(7);

    for _ in 0..600 {
        first.tick(0.1);
        second.tick(0.1);
    }

    assert_eq!(first.stats(), second.stats());
    assert_eq!(first.car_views(), second.car_views());
    assert_eq!(first.segment_views(), second.segment_views());
    assert!(first.stats().total_cars_spawned > 0);
}

#[test]
fn test_long_run_keeps_invariants() {
    let mut world = seeded_world(3);
    let depot = world.network.depot().unwrap();
    let depot_segments = world.network.segments_at(depot);

    for tick in 1..=2000 {
        world.tick(0.1);

        // Plow the worst road once a second
        if tick % 10 == 0 {
            let deepest = world.deepest_segment().map(|segment| segment.id);
            if let Some(segment) = deepest {
                world.dispatch_plow(segment);
            }
        }

        for segment in world.network.segments() {
            assert!(segment.accumulation >= 0.0);
        }
        for segment in &depot_segments {
            assert_eq!(world.network.segment(*segment).unwrap().accumulation, 0.0);
        }
        for car in world.traffic.cars() {
            assert!((0.0..1.0).contains(&car.progress()));
            assert!(!(car.immobilized && car.yielding));
        }
    }

    let stats = world.stats();
    assert_eq!(
        stats.total_cars_spawned,
        stats.total_cars_exited + stats.total_cars_rescued + stats.active_cars
    );
    assert_eq!(
        stats.plows_dispatched + stats.tows_dispatched,
        stats.active_service_vehicles
            + stats.service_vehicles_returned
            + stats.service_vehicles_abandoned
    );
    assert!(stats.total_cars_exited > 0);
    assert!(stats.plows_dispatched > 0);
}

#[test]
fn test_plow_cooldown_through_world() {
    let mut world = seeded_world(11);
    let segment = SegmentId(0);

    assert!(world.dispatch_plow(segment).is_some());
    assert!(world.dispatch_plow(segment).is_none());
    assert!(world.plow_cooldown_remaining() > 0.0);

    for _ in 0..55 {
        world.tick(0.1);
    }
    assert_eq!(world.plow_cooldown_remaining(), 0.0);
    assert!(world.dispatch_plow(segment).is_some());
    assert_eq!(world.stats().plows_dispatched, 2);
}

#[test]
fn test_plow_round_trip_ends_at_depot() {
    let mut world = seeded_world(5);
    let depot = world.network.depot().unwrap();
    let target = SegmentId(0);
    let (a, b) = {
        let segment = world.network.segment(target).unwrap();
        (segment.a, segment.b)
    };

    let plow = world.dispatch_plow(target).unwrap();
    let mut saw_return = false;
    let mut arrived = false;

    for _ in 0..2000 {
        let report = world.tick(0.1);
        if report.dispatch.returned.contains(&plow) {
            arrived = true;
            break;
        }

        let vehicle = world.dispatch.vehicle(plow).expect("plow still out");
        assert_eq!(vehicle.kind, ServiceKind::Plow);
        if vehicle.returning && !saw_return {
            saw_return = true;
            let location = vehicle.current_location();
            assert!(location == a || location == b);

            let last = *vehicle.cursor.route().segments().last().unwrap();
            assert!(world.network.segment(last).unwrap().touches(depot));
        }
    }

    assert!(saw_return);
    assert!(arrived);
    assert!(world.dispatch.vehicle(plow).is_none());
}

#[test]
fn test_obstructed_junction_is_routed_around() {
    let mut world = seeded_world(1);
    let centre = world
        .network
        .locations()
        .iter()
        .find(|location| {
            location.kind == LocationKind::Junction
                && location.position.x == 0.0
                && location.position.y == 0.0
        })
        .unwrap()
        .id;
    let termini = world.network.locations_of_kind(LocationKind::Terminus);
    let (west, east) = (termini[1], termini[2]);
    let closed = world.network.segments_at(centre);

    let direct = find_route(&world.network, west, east, RoutePolicy::AWARE).unwrap();
    assert!(direct.segments().iter().any(|segment| closed.contains(segment)));

    assert!(world.toggle_obstruction(centre).unwrap());
    let detour = find_route(&world.network, west, east, RoutePolicy::AWARE).unwrap();
    assert!(detour.segments().iter().all(|segment| !closed.contains(segment)));

    // Service vehicles still drive straight through
    let service = find_route(&world.network, west, east, RoutePolicy::IGNORE_ALL).unwrap();
    assert_eq!(service, direct);

    assert!(!world.toggle_obstruction(centre).unwrap());
}

#[test]
fn test_storm_cycles_through_phases() {
    let mut world = seeded_world(2);
    assert_eq!(world.storm_phase().name, "Calm");

    for _ in 0..800 {
        world.tick(0.1);
    }
    let storm = world.storm_phase();
    assert_eq!(storm.name, "Blizzard");
    assert_eq!(storm.intensity, 2.0);

    for _ in 0..110 {
        world.tick(0.1);
    }
    assert_eq!(world.storm_phase().name, "Calm");
}
