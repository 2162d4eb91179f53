use super::*;

/// Random obstacle layout plus optional terrain weights.
fn random_fields(rng: &mut fastrand::Rng, weighted: bool) -> (Grid, CrowdFields) {
    let grid = Grid::new(rng.usize(3..24), rng.usize(3..24)).unwrap();
    let mut fields = CrowdFields::new(&grid);

    for _ in 0..rng.usize(0..8) {
        let min = IVec2::new(rng.i32(-2..grid.width() as i32), rng.i32(-2..grid.height() as i32));
        let size = IVec2::new(rng.i32(0..4), rng.i32(0..4));
        fields.registry.add_obstacle(min, min + size);
    }
    if weighted {
        for _ in 0..grid.total_cells() / 3 {
            let cell = rng.usize(0..grid.total_cells());
            fields.cost.set_terrain_cost(cell, rng.u8(1..20));
        }
    }
    fields.cost.rebuild_all(&fields.registry);
    (grid, fields)
}

fn assert_locally_optimal(grid: &Grid, fields: &CrowdFields) {
    let (tx, ty) = fields.integration.target_cell().unwrap();
    let target = grid.cell_index(tx, ty);
    assert_eq!(fields.integration.value(target), 0);

    for cell in 0..grid.total_cells() {
        if cell == target {
            continue;
        }
        let value = fields.integration.value(cell);
        let (cx, cy) = grid.cell_coords(cell);
        let best = grid
            .neighbors4(cx, cy)
            .into_iter()
            .map(|(nx, ny)| fields.integration.value(grid.cell_index(nx, ny)))
            .filter(|&v| v != UNREACHED)
            .min();

        if fields.cost.is_impassable(cell) {
            assert_eq!(value, UNREACHED, "impassable cell {} was reached", cell);
            continue;
        }
        match best {
            Some(best) if value != UNREACHED => {
                assert_eq!(value, best + fields.cost.cost(cell) as u32, "cell {}", cell);
            }
            // A reached neighbor implies this walkable cell is reached too.
            Some(_) => panic!("walkable cell {} next to the wavefront was not reached", cell),
            None => assert_eq!(value, UNREACHED, "isolated cell {}", cell),
        }
    }
}

#[test]
fn test_local_optimality_on_random_uniform_grids() {
    let mut rng = fastrand::Rng::with_seed(0x5eed);
    for _ in 0..40 {
        let (grid, mut fields) = random_fields(&mut rng, false);
        let target = IVec2::new(rng.i32(0..grid.width() as i32), rng.i32(0..grid.height() as i32));
        // Keep the target walkable so it is the only zero-cost source.
        let target_cell = grid.cell_index(target.x as usize, target.y as usize);
        if fields.cost.is_impassable(target_cell) {
            continue;
        }

        let report = fields.resolve(Some(target));
        assert_eq!(report.strategy, SolveStrategy::Wavefront);
        assert_locally_optimal(&grid, &fields);
    }
}

#[test]
fn test_local_optimality_on_random_weighted_grids() {
    let mut rng = fastrand::Rng::with_seed(0xd1d1);
    for _ in 0..40 {
        let (grid, mut fields) = random_fields(&mut rng, true);
        let target = IVec2::new(rng.i32(0..grid.width() as i32), rng.i32(0..grid.height() as i32));
        let target_cell = grid.cell_index(target.x as usize, target.y as usize);
        if fields.cost.is_impassable(target_cell) {
            continue;
        }

        let report = fields.resolve(Some(target));
        if !fields.cost.is_uniform() {
            assert_eq!(report.strategy, SolveStrategy::Dijkstra);
        }
        assert_locally_optimal(&grid, &fields);
    }
}

#[test]
fn test_impassable_cells_are_unreached_with_zero_flow() {
    let mut rng = fastrand::Rng::with_seed(7);
    for _ in 0..20 {
        let (grid, mut fields) = random_fields(&mut rng, false);
        fields.resolve(None);

        for cell in 0..grid.total_cells() {
            let (tx, ty) = grid.center_cell();
            if fields.cost.is_impassable(cell) && cell != grid.cell_index(tx, ty) {
                assert_eq!(fields.integration.value(cell), UNREACHED);
                assert_eq!(fields.flow.direction(cell), Vec2::ZERO);
            }
        }
    }
}

#[test]
fn test_flow_directions_are_unit_or_zero_and_point_downhill() {
    let mut rng = fastrand::Rng::with_seed(99);
    for _ in 0..20 {
        let (grid, mut fields) = random_fields(&mut rng, false);
        fields.resolve(None);

        for cell in 0..grid.total_cells() {
            let dir = fields.flow.direction(cell);
            if dir == Vec2::ZERO {
                continue;
            }
            assert!((dir.length() - 1.0).abs() < 1e-5, "cell {} has length {}", cell, dir.length());

            // Following the dominant axis never climbs.
            let (cx, cy) = grid.cell_coords(cell);
            let step = if dir.x.abs() >= dir.y.abs() {
                IVec2::new(dir.x.signum() as i32, 0)
            } else {
                IVec2::new(0, dir.y.signum() as i32)
            };
            let next = IVec2::new(cx as i32, cy as i32) + step;
            if grid.contains(next) {
                let next_value = fields.integration.value(grid.cell_index(next.x as usize, next.y as usize));
                if next_value != UNREACHED {
                    assert!(next_value < fields.integration.value(cell), "cell {} flows uphill", cell);
                }
            }
        }
    }
}

#[test]
fn test_rebuilds_are_idempotent() {
    let mut rng = fastrand::Rng::with_seed(42);
    let (_, mut fields) = random_fields(&mut rng, true);
    fields.resolve(None);

    let cost = fields.cost.clone();
    let integration = fields.integration.clone();
    let flow = fields.flow.clone();

    fields.cost.rebuild_all(&fields.registry);
    fields.resolve(None);

    assert_eq!(fields.cost, cost);
    assert_eq!(fields.integration, integration);
    assert_eq!(fields.flow.directions().len(), flow.directions().len());
    for (a, b) in fields.flow.directions().iter().zip(flow.directions()) {
        assert_eq!(a.x.to_bits(), b.x.to_bits());
        assert_eq!(a.y.to_bits(), b.y.to_bits());
    }
}

#[test]
fn test_add_then_remove_restores_cost_field() {
    let mut rng = fastrand::Rng::with_seed(1234);
    for _ in 0..20 {
        let grid = Grid::new(rng.usize(2..16), rng.usize(2..16)).unwrap();
        let mut fields = CrowdFields::new(&grid);
        fields.cost.rebuild_all(&fields.registry);
        let before = fields.cost.clone();

        let min = IVec2::new(rng.i32(-3..grid.width() as i32), rng.i32(-3..grid.height() as i32));
        let footprint = fields.registry.add_obstacle(min, min + IVec2::new(rng.i32(0..5), rng.i32(0..5)));
        let dirty = fields.registry.take_dirty();
        fields.cost.rebuild_dirty(&fields.registry, &dirty);

        fields.registry.remove_obstacle(&footprint);
        fields.cost.reconcile_footprint(&grid, &fields.registry, &footprint);

        assert_eq!(fields.cost, before);
    }
}

#[test]
fn test_five_by_five_scenario() {
    let grid = Grid::new(5, 5).unwrap();
    let mut fields = CrowdFields::new(&grid);
    fields.resolve(Some(IVec2::new(2, 2)));

    assert_eq!(fields.integration.value(grid.cell_index(0, 0)), 4);
    assert_eq!(fields.integration.value(grid.cell_index(2, 2)), 0);
}

#[test]
fn test_three_by_three_with_blocked_cell() {
    let grid = Grid::new(3, 3).unwrap();
    let mut fields = CrowdFields::new(&grid);
    fields.registry.add_obstacle(IVec2::new(1, 0), IVec2::new(1, 0));
    fields.cost.rebuild_all(&fields.registry);

    fields.resolve(Some(IVec2::new(1, 2)));

    assert_eq!(fields.integration.value(grid.cell_index(1, 0)), UNREACHED);
    assert_eq!(fields.flow.direction(grid.cell_index(1, 0)), Vec2::ZERO);
    assert_eq!(fields.integration.value(grid.cell_index(1, 1)), 1);
}

#[test]
fn test_impassable_target_still_propagates() {
    let grid = Grid::new(3, 3).unwrap();
    let mut fields = CrowdFields::new(&grid);
    fields.registry.add_obstacle(IVec2::new(1, 1), IVec2::new(1, 1));
    fields.cost.rebuild_all(&fields.registry);

    let report = fields.resolve(Some(IVec2::new(1, 1)));

    assert_eq!(fields.integration.value(grid.cell_index(1, 1)), 0);
    assert_eq!(fields.integration.value(grid.cell_index(0, 0)), 2);
    assert_eq!(report.reached, 9);
}

#[test]
fn test_insert_into_world_replaces_resources() {
    let grid = Grid::new(8, 4).unwrap();
    let mut world = World::new();
    CrowdFields::new(&grid).insert_into(&mut world, grid);

    assert_eq!(*world.resource::<Grid>(), grid);
    assert_eq!(world.resource::<CostField>().len(), 32);
    assert_eq!(world.resource::<FlowField>().directions().len(), 32);
    assert_eq!(world.resource::<IntegrationField>().values().len(), 32);
}
