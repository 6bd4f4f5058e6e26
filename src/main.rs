use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use traffic_network::math::{LineSegment2d, Point2d};
use traffic_network::od::{
    apply_od, Categorization, Category, CategoryValue, Dimension, Interpolation, OdMatrix, OdOptions,
};
use traffic_network::{
    ConflictBuilder, GtuType, LaneAttributes, LinkAttributes, LinkKind, LinkPriority, LinkType, Network,
    NodeId, SimClock, Simulator, TrafficError, TrafficResult,
};

/// Lanes per direction of the demo grid.
const GRID_SIZE: usize = 30;

fn main() -> TrafficResult<()> {
    println!("Building conflicts of a {0}x{0} grid...", GRID_SIZE);
    let start = Instant::now();
    let mut net = grid()?;
    let report = net.build_conflicts(&ConflictBuilder::new())?;
    println!("Sequential: {:?} ({} conflict pairs)", start.elapsed(), report.conflict_pairs());

    let start = Instant::now();
    let mut net = grid()?;
    let report = net.build_conflicts_parallel(&ConflictBuilder::new());
    println!(
        "Parallel: {:?} ({} conflict pairs, {} failed tasks)",
        start.elapsed(),
        report.conflict_pairs(),
        report.failed_tasks
    );

    println!("Generating vehicles...");
    let net = Rc::new(net);
    let origin = node(&net, "h0-start")?;
    let destination = node(&net, "h0-end")?;
    let categorization = Arc::new(Categorization::new("types", vec![Dimension::GtuType])?);
    let mut od = OdMatrix::new(
        "demo",
        &[origin],
        &[destination],
        categorization,
        vec![0.0, 1800.0, 3600.0],
        Interpolation::Linear,
        &net,
    )?;
    for (gtu_type, demand) in [(GtuType::car(), 1200.0), (GtuType::truck(), 300.0)] {
        let category = Category::new(od.categorization(), vec![CategoryValue::GtuType(gtu_type)])?;
        od.put_demand_vector(origin, destination, category, vec![demand, 2.0 * demand, demand])?;
    }
    println!("{}", od);

    let clock = Rc::new(SimClock::new().with_stream("generation", 42));
    let generators = apply_od(&net, &od, &OdOptions::new(), clock.clone())?;
    for objects in &generators {
        let generator = &objects.generator;
        let mut count = 0;
        while let Some(headway) = generator.next_headway() {
            clock.advance(headway);
            if let Some(gtu) = generator.draw_arrival()? {
                count += 1;
                if count <= 5 {
                    println!(
                        "{:8.1}s  {} {} on {}",
                        clock.time(),
                        gtu.id,
                        gtu.characteristics.gtu_type,
                        net.lane(gtu.position.lane).name()
                    );
                }
            }
        }
        println!("Generator {} generated {} GTUs", generator.id(), count);
    }
    Ok(())
}

fn node(net: &Network, name: &str) -> TrafficResult<NodeId> {
    net.node_by_name(name)
        .ok_or_else(|| TrafficError::UnknownNode(name.to_owned()))
}

/// A grid of single lane links, eastbound and northbound, every 20 m.
fn grid() -> TrafficResult<Network> {
    let mut net = Network::new();
    let extent = 20.0 * GRID_SIZE as f64;
    for i in 0..GRID_SIZE {
        let c = 20.0 * i as f64 + 10.0;
        straight(&mut net, &format!("h{}", i), Point2d::new(0.0, c), Point2d::new(extent, c))?;
        straight(&mut net, &format!("v{}", i), Point2d::new(c, 0.0), Point2d::new(c, extent))?;
    }
    net.init_topology();
    Ok(net)
}

fn straight(net: &mut Network, name: &str, from: Point2d, to: Point2d) -> TrafficResult<()> {
    let start = net.add_node(&format!("{}-start", name), from);
    let end = net.add_node(&format!("{}-end", name), to);
    let link = net.add_link(&LinkAttributes {
        name,
        start,
        end,
        link_type: LinkType::new("URBAN"),
        priority: LinkPriority::None,
        kind: LinkKind::CrossSection,
    })?;
    net.add_lane(&LaneAttributes {
        name,
        link,
        curve: &LineSegment2d::from_ends(from, to),
        start_width: 3.5,
        end_width: 3.5,
        lateral_offset: 0.0,
    })?;
    Ok(())
}
