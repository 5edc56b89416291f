use approx::assert_relative_eq;
use std::path::Path;
use tempfile::TempDir;
use topo_dem::{
    create_metadata_file, write_bil, AssemblyConfig, DatabaseBounds, DatabaseKind, DemAssembler, DemError, DemSource,
    ElevationGrid, GeoBounds, MetadataFile, TileDatabase,
};

/// Write an 8x8 (1/8 degree) tile filled with `value`.
fn write_tile(dir: &Path, name: &str, bounds: GeoBounds, value: f32) {
    let grid = ElevationGrid::filled(8, 8, value);
    write_bil(dir.join(format!("{name}.dem")), &grid, &bounds).unwrap();
}

fn side_by_side(dir: &Path) {
    write_tile(dir, "left", GeoBounds::new(10.0, 1.0, 11.0, 0.0), 100.0);
    write_tile(dir, "right", GeoBounds::new(11.0, 1.0, 12.0, 0.0), 200.0);
}

fn across_antimeridian(dir: &Path) {
    write_tile(dir, "far_east", GeoBounds::new(179.0, 1.0, 180.0, 0.0), 100.0);
    write_tile(dir, "far_west", GeoBounds::new(-180.0, 1.0, -179.0, 0.0), 200.0);
}

#[test]
fn test_scanned_database() {
    let dir = TempDir::new().unwrap();
    let folder = dir.path().join("tiles");
    std::fs::create_dir(&folder).unwrap();
    side_by_side(&folder);

    let db = TileDatabase::open(&folder).unwrap();
    assert_eq!(db.kind(), DatabaseKind::Generic);
    assert_eq!(db.tiles().len(), 2);
    assert_eq!(db.global_bounds(), Some(GeoBounds::new(10.0, 1.0, 12.0, 0.0)));
    assert_eq!(db.resolution(), Some((0.125, 0.125)));

    // Touching edges do not count as overlap
    assert_eq!(db.tiles_for_bounds(&GeoBounds::new(11.0, 1.0, 11.5, 0.0)).len(), 1);
    assert_eq!(db.tiles_for_bounds(&GeoBounds::new(10.5, 1.0, 11.5, 0.0)).len(), 2);
    assert!(db.tiles_for_bounds(&GeoBounds::new(20.0, 1.0, 21.0, 0.0)).is_empty());

    let info = db.dataset_info();
    assert_eq!(info.tiles_total, 2);
    assert_eq!(info.tiles_loaded, 0);
    assert_eq!((info.total_width_pixels, info.total_height_pixels), (16, 8));
    assert_relative_eq!(info.pixels_per_degree, 8.0);
}

#[test]
fn test_assemble_side_by_side() {
    let dir = TempDir::new().unwrap();
    side_by_side(dir.path());
    let db = TileDatabase::open(dir.path()).unwrap();

    let grid = db
        .assemble(&GeoBounds::new(10.5, 1.0, 11.5, 0.0))
        .unwrap()
        .unwrap();
    // Upsampled to 120 pixels per degree
    assert_eq!(grid.dimensions(), (120, 120));
    assert_eq!(grid.valid_count(), 120 * 120);
    assert_relative_eq!(grid.get(10, 60).unwrap(), 100.0, epsilon = 1e-3);
    assert_relative_eq!(grid.get(110, 60).unwrap(), 200.0, epsilon = 1e-3);
    assert_eq!(db.loaded_tile_count(), 2);

    db.unload_tile("left").unwrap();
    assert_eq!(db.loaded_tile_count(), 1);
    db.clear_cache();
    assert_eq!(db.loaded_tile_count(), 0);

    assert!(db.assemble(&GeoBounds::new(50.0, 1.0, 51.0, 0.0)).unwrap().is_none());
}

#[test]
fn test_assemble_across_antimeridian() {
    let dir = TempDir::new().unwrap();
    across_antimeridian(dir.path());
    let db = TileDatabase::open(dir.path()).unwrap();

    for bounds in [
        GeoBounds::new(179.5, 1.0, -179.5, 0.0),
        GeoBounds::new(179.5, 1.0, 180.5, 0.0),
    ] {
        assert_eq!(db.tiles_for_bounds(&bounds).len(), 2);
        let grid = db.assemble(&bounds).unwrap().unwrap();
        assert_eq!(grid.dimensions(), (120, 120));
        assert_eq!(grid.valid_count(), 120 * 120);
        // Western half of the output comes from the tile east of 179°
        assert_relative_eq!(grid.get(30, 60).unwrap(), 100.0, epsilon = 1e-3);
        assert_relative_eq!(grid.get(90, 60).unwrap(), 200.0, epsilon = 1e-3);
    }
}

#[test]
fn test_metadata_sidecar_database() {
    let dir = TempDir::new().unwrap();
    let folder = dir.path().join("pacific");
    std::fs::create_dir(&folder).unwrap();
    across_antimeridian(&folder);

    let sidecar = create_metadata_file(&folder, Some("Pacific Test")).unwrap();
    assert_eq!(sidecar, folder.join("pacific_metadata.json"));
    let file = MetadataFile::load(&sidecar).unwrap();
    assert_eq!(file.dataset_info.name, "Pacific Test");
    assert_eq!(file.tiles["far_east"].file_path, "far_east.dem");
    assert_eq!(file.tiles["far_west"].bounds, [-180.0, 1.0, -179.0, 0.0]);

    let db = TileDatabase::open(&folder).unwrap();
    assert_eq!(db.kind(), DatabaseKind::Metadata);
    assert_eq!(db.dataset_info().name, "Pacific Test");

    // A sidecar listing a missing file still opens with the remaining tiles
    std::fs::remove_file(folder.join("far_west.dem")).unwrap();
    let db = TileDatabase::open(&folder).unwrap();
    assert_eq!(db.tiles().len(), 1);
}

#[test]
fn test_coordinates_against_database() {
    let dir = TempDir::new().unwrap();
    side_by_side(dir.path());
    let db = TileDatabase::open(dir.path()).unwrap();
    let bounds = DatabaseBounds::from_summary(&db.dataset_info()).unwrap();

    let (lon, text) = topo_dem::validate_and_format_coordinate("10°20\"N", &bounds, true, false, None).unwrap();
    // 10.333 snaps to the 1/8 degree grid
    assert_relative_eq!(lon, 10.375);
    assert_eq!(text, "10.375");

    let (lon, _) = topo_dem::validate_and_format_coordinate("25", &bounds, true, false, None).unwrap();
    assert_relative_eq!(lon, 12.0);
}

#[test]
fn test_assemble_to_file_in_memory_and_chunked() {
    let dir = TempDir::new().unwrap();
    let tiles = dir.path().join("tiles");
    std::fs::create_dir(&tiles).unwrap();
    across_antimeridian(&tiles);
    let db = TileDatabase::open(&tiles).unwrap();
    let bounds = GeoBounds::new(179.5, 1.0, -179.5, 0.0);

    let in_memory = dir.path().join("memory.dem");
    DemAssembler::new(AssemblyConfig::default().with_force_in_memory(true))
        .assemble_to_file(&db, &bounds, 50.0, &in_memory)
        .unwrap();
    let chunked = dir.path().join("chunked.dem");
    DemAssembler::new(AssemblyConfig::default().with_force_chunked(true))
        .assemble_to_file(&db, &bounds, 50.0, &chunked)
        .unwrap();

    for path in [&in_memory, &chunked] {
        let source = DemSource::open(path).unwrap();
        assert_eq!((source.metadata().width, source.metadata().height), (60, 60));
        let grid = source.read(None).unwrap();
        // Stored as truncated integers
        assert_relative_eq!(grid.get(5, 5).unwrap(), 100.0, epsilon = 1.0);
        assert_relative_eq!(grid.get(55, 55).unwrap(), 200.0, epsilon = 1.0);
        assert!(path.with_extension("hdr").exists());
    }

    let err = DemAssembler::default().assemble_to_file(&db, &bounds, 0.0, &in_memory);
    assert!(matches!(err, Err(DemError::InvalidScale(_))));
    let err = DemAssembler::default().assemble_to_file(&db, &GeoBounds::new(0.0, 1.0, 1.0, 0.0), 100.0, &in_memory);
    assert!(matches!(err, Err(DemError::NoData(_))));
}

#[test]
fn test_chunked_matches_in_memory_across_antimeridian() {
    let dir = TempDir::new().unwrap();
    let tiles = dir.path().join("tiles");
    std::fs::create_dir(&tiles).unwrap();
    // One-degree tiles over 176..180 and -180..-176, each with its own value
    for (col, west) in [176, 177, 178, 179, -180, -179, -178, -177].into_iter().enumerate() {
        for south in [0, 1] {
            let west = west as f64;
            let south = south as f64;
            let value = 100.0 + col as f32 * 10.0 + south as f32;
            let bounds = GeoBounds::new(west, south + 1.0, west + 1.0, south);
            write_tile(&tiles, &format!("t{col}_{south}"), bounds, value);
        }
    }
    let db = TileDatabase::open(&tiles).unwrap();
    let bounds = GeoBounds::new(176.0, 2.0, -176.0, 0.0);

    let in_memory = dir.path().join("memory.dem");
    DemAssembler::new(AssemblyConfig::default().with_force_in_memory(true))
        .assemble_to_file(&db, &bounds, 100.0, &in_memory)
        .unwrap();
    // A zero budget picks chunking; 1 MB chunks split 960 x 240 into 2 x 2
    let chunked = dir.path().join("chunked.dem");
    DemAssembler::new(AssemblyConfig::default().with_memory_budget_mb(0).with_chunk_size_mb(1))
        .assemble_to_file(&db, &bounds, 100.0, &chunked)
        .unwrap();

    let memory_grid = DemSource::open(&in_memory).unwrap().read(None).unwrap();
    let chunked_grid = DemSource::open(&chunked).unwrap().read(None).unwrap();
    assert_eq!(memory_grid.dimensions(), (960, 240));
    assert_eq!(chunked_grid.dimensions(), (960, 240));
    assert_eq!(memory_grid.valid_count(), 960 * 240);
    assert_eq!(chunked_grid.valid_count(), 960 * 240);
    for (i, (a, b)) in memory_grid.data().iter().zip(chunked_grid.data()).enumerate() {
        assert_eq!(a, b, "pixel {} differs", i);
    }

    // North-west corner is 176..177 north row, south-east is -177..-176 south row
    assert_relative_eq!(chunked_grid.get(0, 0).unwrap(), 101.0);
    assert_relative_eq!(chunked_grid.get(480, 0).unwrap(), 141.0);
    assert_relative_eq!(chunked_grid.get(959, 239).unwrap(), 170.0);
}
