use std::path::Path;
use tempfile::TempDir;
use topo_dem::{write_bil, DemSource, ElevationGrid, GeoBounds};
use topo_gradient::{default_gradients, ColorStop, Gradient, GradientType, Rgba};
use topo_render::{
    crop_to_bounds, export_elevation, export_layers, save_legend, ExportOptions, RenderError, TerrainRenderer,
};

/// 32x16 grid rising 10 m per column, with a no-data hole.
fn hill() -> ElevationGrid {
    let data = (0..16)
        .flat_map(|_| (0..32).map(|x| x as f32 * 10.0))
        .collect();
    let mut grid = ElevationGrid::new(32, 16, data).unwrap();
    grid.set(3, 3, f32::NAN);
    grid
}

fn write_dem(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("hill.dem");
    write_bil(&path, &hill(), &GeoBounds::new(-120.0, 40.0, -119.0, 39.5)).unwrap();
    path
}

fn shaded() -> Gradient {
    let mut g = Gradient::new(
        "Shaded Test",
        0.0,
        310.0,
        vec![
            ColorStop::new(0.0, Rgba::opaque(255, 255, 255)),
            ColorStop::new(1.0, Rgba::opaque(0, 100, 0)),
        ],
    )
    .with_type(GradientType::ShadingAndGradient);
    g.cast_shadows = true;
    g
}

#[test]
fn test_render_dem_file_writes_png() {
    let dir = TempDir::new().unwrap();
    let dem = write_dem(dir.path());
    let out = dir.path().join("hill.png");

    let mut renderer = TerrainRenderer::new();
    let written = renderer
        .render_dem_file(&dem, &shaded(), Some(&out), Some(2), None, None)
        .unwrap();
    assert_eq!(written, out);

    let image = image::open(&out).unwrap();
    assert_eq!((image.width(), image.height()), (16, 8));
    assert_eq!(renderer.stats().total_renders, 1);
    assert_eq!(renderer.stats().last_pixels_processed, 128);
}

#[test]
fn test_export_scaled_jpeg() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("half.jpg");
    let mut renderer = TerrainRenderer::new();
    renderer
        .export_terrain(&hill(), &shaded(), &out, ExportOptions::default().with_scale(0.5).with_dpi(150.0))
        .unwrap();

    let image = image::open(&out).unwrap();
    assert_eq!((image.width(), image.height()), (16, 8));
}

#[test]
fn test_export_over_budget_is_refused() {
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("big.png");
    // 1 MiB budget cannot hold a 1000x1000 render
    let mut renderer = TerrainRenderer::new().with_memory_budget_mb(1);
    let grid = ElevationGrid::filled(1000, 1000, 5.0);
    let err = renderer
        .export_terrain(&grid, &shaded(), &out, ExportOptions::default())
        .unwrap_err();
    assert!(matches!(err, RenderError::Memory { .. }), "{err:?}");
    assert!(!out.exists());
}

#[test]
fn test_every_default_gradient_renders() {
    let mut renderer = TerrainRenderer::new();
    for gradient in default_gradients() {
        let image = renderer.render_terrain(&hill(), &gradient, Some(0.0), Some(310.0), None).unwrap();
        assert_eq!(image.dimensions(), (32, 16), "{}", gradient.name);
    }
}

#[test]
fn test_layer_stack_and_legend() {
    let dir = TempDir::new().unwrap();
    let mut renderer = TerrainRenderer::new();
    let layers = renderer.render_layers(&hill(), &shaded(), None, None, None).unwrap();
    assert!(layers.shading.is_some());
    assert!(layers.shadows.is_some());

    let written = export_layers(dir.path(), "hill", &layers).unwrap();
    assert_eq!(written.len(), 5);
    assert!(written.iter().all(|p| p.exists()));

    let legend = dir.path().join("legend.png");
    save_legend(&shaded(), 40, 200, &legend).unwrap();
    let image = image::open(&legend).unwrap();
    assert_eq!((image.width(), image.height()), (40, 200));
}

#[test]
fn test_crop_then_export_elevation() {
    let dir = TempDir::new().unwrap();
    let dem = write_dem(dir.path());
    let source = DemSource::open(&dem).unwrap();
    let grid = source.read(None).unwrap();
    let data_bounds = source.metadata().bounds;

    let selection = GeoBounds::new(-119.75, 40.0, -119.25, 39.75);
    let cut = crop_to_bounds(&grid, &data_bounds, &selection).unwrap();
    assert_eq!(cut.dimensions(), (16, 8));

    let tif = export_elevation(&cut, &selection, &dir.path().join("cut.tif")).unwrap();
    let reread = DemSource::open(&tif).unwrap().read(None).unwrap();
    assert_eq!(reread.dimensions(), (16, 8));
    assert_eq!(reread.get(0, 0), Some(80.0));
}
