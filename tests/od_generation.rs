//! Tests that generate vehicles from OD demand.

use assert_approx_eq::assert_approx_eq;
use std::rc::Rc;
use std::sync::Arc;
use traffic_network::{
    math::{LineSegment2d, Point2d},
    od::{
        apply_od, Categorization, Category, CategoryValue, Dimension, ErrorHandler, HeadwayDistribution,
        Interpolation, MarkovCorrelation, OdMatrix, OdOptions,
    },
    GtuType, LaneAttributes, LaneId, LinkAttributes, LinkKind, LinkPriority, LinkType, Network, NodeId,
    SimClock, TrafficError,
};

/// A network from O to D, with a two lane link. A1 is the right lane.
struct TwoLanes {
    network: Rc<Network>,
    origin: NodeId,
    destination: NodeId,
    right: LaneId,
    left: LaneId,
}

fn two_lanes() -> TwoLanes {
    let mut net = Network::new();
    let origin = net.add_node("O", Point2d::new(0.0, 0.0));
    let destination = net.add_node("D", Point2d::new(1000.0, 0.0));
    let link = net
        .add_link(&LinkAttributes {
            name: "OD",
            start: origin,
            end: destination,
            link_type: LinkType::new("FREEWAY"),
            priority: LinkPriority::None,
            kind: LinkKind::CrossSection,
        })
        .unwrap();
    let mut add_lane = |name: &str, offset: f64| {
        net.add_lane(&LaneAttributes {
            name,
            link,
            curve: &LineSegment2d::from_ends(Point2d::new(0.0, offset), Point2d::new(1000.0, offset)),
            start_width: 3.5,
            end_width: 3.5,
            lateral_offset: offset,
        })
        .unwrap()
    };
    // Added left first, so that generators are ordered by offset rather than insertion
    let left = add_lane("A2", 1.75);
    let right = add_lane("A1", -1.75);
    net.connect_lateral(left, right, true, true).unwrap();
    TwoLanes {
        network: Rc::new(net),
        origin,
        destination,
        right,
        left,
    }
}

fn od_matrix(net: &TwoLanes, dimensions: Vec<Dimension>, times: Vec<f64>) -> OdMatrix {
    let categorization = Arc::new(Categorization::new("test", dimensions).unwrap());
    OdMatrix::new(
        "od",
        &[net.origin],
        &[net.destination],
        categorization,
        times,
        Interpolation::Stepwise,
        &net.network,
    )
    .unwrap()
}

/// A constant demand of one hour, split between cars and trucks.
fn car_truck_matrix(net: &TwoLanes, cars: f64, trucks: f64) -> OdMatrix {
    let mut od = od_matrix(net, vec![Dimension::GtuType], vec![0.0, 3600.0]);
    for (gtu_type, demand) in [(GtuType::car(), cars), (GtuType::truck(), trucks)] {
        let category = Category::new(od.categorization(), vec![CategoryValue::GtuType(gtu_type)]).unwrap();
        od.put_demand_vector(net.origin, net.destination, category, vec![demand, demand])
            .unwrap();
    }
    od
}

/// Constant demand over an hour gives that many trips.
#[test]
fn hourly_demand_gives_trips() {
    let net = two_lanes();
    let mut od = od_matrix(&net, vec![Dimension::GtuType], vec![0.0, 3600.0]);
    let car = Category::new(od.categorization(), vec![CategoryValue::GtuType(GtuType::car())]).unwrap();
    od.put_demand_vector(net.origin, net.destination, car.clone(), vec![1800.0, 1800.0])
        .unwrap();
    assert_eq!(od.get_trips(net.origin, net.destination, &car, 0).unwrap(), 1800);
    assert_eq!(od.origin_total(net.origin).unwrap(), 1800);
    assert_eq!(od.matrix_total(), 1800);
    assert_approx_eq!(od.get_demand(net.origin, net.destination, &car, 1800.0, true).unwrap(), 1800.0);
}

/// Trips put per period come back per period, and can be adjusted.
#[test]
fn trips_round_trip() {
    let net = two_lanes();
    let mut od = od_matrix(&net, vec![Dimension::GtuType], vec![0.0, 900.0, 1800.0]);
    let truck = Category::new(od.categorization(), vec![CategoryValue::GtuType(GtuType::truck())]).unwrap();
    od.put_trips_vector(net.origin, net.destination, truck.clone(), &[12, 30])
        .unwrap();
    assert_eq!(
        od.get_trips_vector(net.origin, net.destination, &truck).unwrap(),
        Some(vec![12, 30])
    );
    od.increase_trips(net.origin, net.destination, &truck, 1, -10).unwrap();
    assert_eq!(od.get_trips(net.origin, net.destination, &truck, 1).unwrap(), 20);
    assert_eq!(od.origin_destination_total(net.origin, net.destination).unwrap(), 32);
    assert!(od.increase_trips(net.origin, net.destination, &truck, 0, -13).is_err());
    assert!(matches!(
        od.get_trips(net.origin, net.destination, &truck, 2),
        Err(TrafficError::IndexOutOfRange { index: 2, len: 2 })
    ));
}

/// Headways integrate demand that changes over time, and end once demand runs out.
#[test]
fn headways_follow_demand() {
    let net = two_lanes();
    let times = vec![100.0, 200.0, 300.0, 400.0, 500.0, 600.0];
    let demand = [1000.0, 2000.0, 0.0, 0.0, 2000.0, 0.0];
    let mut od = od_matrix(&net, vec![Dimension::Lane, Dimension::GtuType], times.clone());
    for (lane, gtu_type, fraction) in [
        (net.right, GtuType::car(), 0.2),
        (net.right, GtuType::truck(), 0.2),
        (net.left, GtuType::car(), 0.6),
    ] {
        let category = Category::new(
            od.categorization(),
            vec![CategoryValue::Lane(lane), CategoryValue::GtuType(gtu_type)],
        )
        .unwrap();
        od.put_demand_vector_scaled(
            net.origin,
            net.destination,
            category,
            &demand,
            times.clone(),
            Interpolation::Stepwise,
            fraction,
        )
        .unwrap();
    }

    let clock = Rc::new(SimClock::new().with_stream("generation", 1));
    let options = OdOptions::new().set(OdOptions::HEADWAY_DIST, HeadwayDistribution::Constant);
    let generators = apply_od(&net.network, &od, &options, clock.clone()).unwrap();
    assert_eq!(generators.len(), 2);
    assert_eq!(generators[0].id(), "O1");
    assert_eq!(generators[1].id(), "O2");
    assert_eq!(generators[0].generator.positions().positions()[0].lane, net.right);
    assert_eq!(generators[1].generator.positions().positions()[0].lane, net.left);

    // The right lane carries 40% of demand: 400 veh/h, then 800 veh/h
    let headway = &generators[0].headway;
    let expected = [
        (0.0, Some(109.0)),
        (30.0, Some(79.0)),
        (100.0, Some(9.0)),
        (199.0, Some(5.0)),
        (299.0, Some(204.5)),
        (599.0, None),
        (600.0, None),
        (700.0, None),
    ];
    for (time, headway_expected) in expected {
        clock.set_time(time);
        match (headway.next_headway(), headway_expected) {
            (Some(h), Some(e)) => assert_approx_eq!(h, e),
            (None, None) => {}
            (h, e) => panic!("at {} s: expected {:?}, got {:?}", time, e, h),
        }
    }
}

/// Correlated GTU types keep the demand share of each type, but come in platoons.
#[test]
fn markov_types_keep_demand_share() {
    let net = two_lanes();
    let od = car_truck_matrix(&net, 1080.0, 720.0);
    let mut correlation = MarkovCorrelation::new();
    correlation.add_state(GtuType::truck(), 0.5).unwrap();
    let options = OdOptions::new().set(OdOptions::MARKOV, Some(correlation));
    let clock = Rc::new(SimClock::new().with_stream("generation", 7));
    let generators = apply_od(&net.network, &od, &options, clock).unwrap();
    assert_eq!(generators.len(), 1);
    assert_eq!(generators[0].id(), "O");

    let draws = 10_000;
    let types = (0..draws)
        .map(|_| {
            generators[0]
                .generator
                .draw_arrival()
                .unwrap()
                .unwrap()
                .characteristics
                .gtu_type
        })
        .collect::<Vec<_>>();
    let trucks = types.iter().filter(|t| **t == GtuType::truck()).count();
    assert!((trucks as f64 / draws as f64 - 0.4).abs() < 0.03, "{} trucks", trucks);

    // Independent draws would repeat a truck 40% of the time
    let after_truck = types.windows(2).filter(|w| w[0] == GtuType::truck()).collect::<Vec<_>>();
    let repeats = after_truck.iter().filter(|w| w[1] == GtuType::truck()).count();
    let repeat_rate = repeats as f64 / after_truck.len() as f64;
    assert!(repeat_rate > 0.6, "truck repeat rate {}", repeat_rate);
}

/// Generated GTUs go from origin to destination, with trucks on the right lane.
#[test]
fn generated_gtus_have_routes_and_positions() {
    let net = two_lanes();
    let od = car_truck_matrix(&net, 0.0, 500.0);
    let clock = Rc::new(SimClock::new().with_stream("generation", 3));
    let generators = apply_od(&net.network, &od, &OdOptions::new(), clock).unwrap();
    let generator = &generators[0].generator;
    assert_eq!(generator.positions().positions().len(), 2);

    let mut on_right = 0;
    for _ in 0..200 {
        let gtu = generator.draw_arrival().unwrap().unwrap();
        assert_eq!(gtu.characteristics.gtu_type, GtuType::truck());
        assert_eq!(gtu.characteristics.origin, net.origin);
        assert_eq!(gtu.characteristics.destination, net.destination);
        let route = gtu.characteristics.route.unwrap();
        assert_eq!(route.nodes(), &[net.origin, net.destination]);
        assert_eq!(gtu.position.position, 0.0);
        if gtu.position.lane == net.right {
            on_right += 1;
        }
    }
    assert!(on_right > 180, "{} trucks on the right lane", on_right);
}

/// The same seed gives the same GTUs, with IDs counting up over all generators.
#[test]
fn generation_is_deterministic() {
    let run = || {
        let net = two_lanes();
        let od = car_truck_matrix(&net, 900.0, 100.0);
        let clock = Rc::new(SimClock::new().with_stream("generation", 11));
        let generators = apply_od(&net.network, &od, &OdOptions::new(), clock.clone()).unwrap();
        let generator = &generators[0];
        (0..20)
            .map(|_| {
                let headway = generator.headway.next_headway().unwrap();
                clock.advance(headway);
                let gtu = generator.generator.draw_arrival().unwrap().unwrap();
                (gtu.id, gtu.characteristics.gtu_type, gtu.position.lane == net.right, headway)
            })
            .collect::<Vec<_>>()
    };
    let first = run();
    let second = run();
    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(&second) {
        assert_eq!((&a.0, &a.1, a.2), (&b.0, &b.1, b.2));
        assert_approx_eq!(a.3, b.3);
    }
    assert_eq!(first[0].0, "1");
    assert_eq!(first[19].0, "20");
}

/// Generators can only be created before the simulation starts.
#[test]
fn generators_need_time_zero() {
    let net = two_lanes();
    let od = car_truck_matrix(&net, 900.0, 100.0);
    let clock = Rc::new(SimClock::new());
    clock.set_time(5.0);
    assert!(matches!(
        apply_od(&net.network, &od, &OdOptions::new(), clock),
        Err(TrafficError::NotAtTimeZero(t)) if t == 5.0
    ));
}

/// A simulator without a generation stream falls back to its default stream, or a new one.
#[test]
fn stream_fallbacks() {
    let net = two_lanes();
    let od = car_truck_matrix(&net, 900.0, 100.0);
    for clock in [SimClock::new().with_stream("default", 2), SimClock::new()] {
        let generators = apply_od(&net.network, &od, &OdOptions::new(), Rc::new(clock)).unwrap();
        assert!(generators[0].generator.draw_arrival().unwrap().is_some());
    }
}

/// A GTU that cannot be drawn halts generation, unless errors are logged and skipped.
#[test]
fn error_handlers() {
    let net = two_lanes();
    let mut od = od_matrix(&net, vec![Dimension::GtuType], vec![0.0, 3600.0]);
    let van = Category::new(od.categorization(), vec![CategoryValue::GtuType(GtuType::new("VAN"))]).unwrap();
    od.put_demand_vector(net.origin, net.destination, van, vec![600.0, 600.0])
        .unwrap();

    let clock = Rc::new(SimClock::new().with_stream("generation", 1));
    let generators = apply_od(&net.network, &od, &OdOptions::new(), clock.clone()).unwrap();
    assert!(matches!(
        generators[0].generator.draw_arrival(),
        Err(TrafficError::Generation { ref generator, .. }) if generator == "O"
    ));

    let options = OdOptions::new().set(OdOptions::ERROR_HANDLER, ErrorHandler::LogAndSkip);
    let generators = apply_od(&net.network, &od, &options, clock).unwrap();
    assert_eq!(generators[0].generator.error_handler(), ErrorHandler::LogAndSkip);
    assert!(generators[0].generator.draw_arrival().unwrap().is_none());
}

/// A zone reaches the network through a connector, whose link types set the options.
#[test]
fn zones_generate_through_connectors() {
    let mut net = Network::new();
    let zone = net.add_node("Z", Point2d::new(-50.0, 0.0));
    let entry = net.add_node("N", Point2d::new(0.0, 0.0));
    let destination = net.add_node("D", Point2d::new(500.0, 0.0));
    net.add_link(&LinkAttributes {
        name: "ZN",
        start: zone,
        end: entry,
        link_type: LinkType::new("CONNECTOR"),
        priority: LinkPriority::None,
        kind: LinkKind::Connector { demand_weight: 1.0 },
    })
    .unwrap();
    let link = net
        .add_link(&LinkAttributes {
            name: "ND",
            start: entry,
            end: destination,
            link_type: LinkType::new("FREEWAY"),
            priority: LinkPriority::None,
            kind: LinkKind::CrossSection,
        })
        .unwrap();
    for (name, offset) in [("ND1", -1.75), ("ND2", 1.75)] {
        net.add_lane(&LaneAttributes {
            name,
            link,
            curve: &LineSegment2d::from_ends(Point2d::new(0.0, offset), Point2d::new(500.0, offset)),
            start_width: 3.5,
            end_width: 3.5,
            lateral_offset: offset,
        })
        .unwrap();
    }
    let network = Rc::new(net);

    let categorization = Arc::new(Categorization::new("types", vec![Dimension::GtuType]).unwrap());
    let mut od = OdMatrix::new(
        "zones",
        &[zone],
        &[destination],
        categorization,
        vec![0.0, 3600.0],
        Interpolation::Linear,
        &network,
    )
    .unwrap();
    let car = Category::new(od.categorization(), vec![CategoryValue::GtuType(GtuType::car())]).unwrap();
    od.put_demand_vector(zone, destination, car, vec![1000.0, 2000.0])
        .unwrap();

    let options = OdOptions::new()
        .set(OdOptions::NO_LC_DIST, 10.0)
        .set_for_link_type(LinkType::new("FREEWAY"), OdOptions::NO_LC_DIST, 50.0)
        .set_for_node(entry, OdOptions::INSTANT_LC, true);
    let clock = Rc::new(SimClock::new().with_stream("generation", 1));
    let generators = apply_od(&network, &od, &options, clock).unwrap();
    assert_eq!(generators.len(), 1);
    let generator = &generators[0].generator;
    assert_eq!(generator.id(), "Z");
    assert_eq!(generator.no_lane_change_distance(), 50.0);
    // Node options apply to the origin, not the node the connector leads to
    assert!(!generator.instant_lane_change());

    let positions = generator.positions();
    assert_eq!(positions.positions().len(), 2);
    assert_eq!(positions.via_node(link), Some(entry));
    assert_eq!(positions.link_weight(link), Some(1.0));
    let gtu = generator.draw_arrival().unwrap().unwrap();
    assert_eq!(gtu.position.link, link);

    // Linear demand of 1000 veh/h rising by 1000 veh/h per hour
    let headway = generators[0].headway.next_headway();
    assert!(headway.map_or(false, |h| h > 0.0 && h < 3600.0));
}
