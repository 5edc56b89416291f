use tempfile::TempDir;
use topo_gradient::{GradientLibrary, GradientType, HlsAdjustment, Rgba};

const QGIS_STYLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<qgis_style version="2">
  <colorramps>
    <colorramp type="gradient" name="Classic Elevation">
      <prop k="color1" v="0,0,255,255"/>
      <prop k="color2" v="255,0,0,255"/>
    </colorramp>
    <colorramp type="gradient" name="Magma">
      <prop k="color1" v="0,0,4,255"/>
      <prop k="color2" v="252,253,191,255"/>
      <prop k="discrete" v="1"/>
      <prop k="stops" v="0.5;183,55,121,255"/>
    </colorramp>
  </colorramps>
</qgis_style>"#;

#[test]
fn test_qgis_import_into_library() {
    let dir = TempDir::new().unwrap();
    let style = dir.path().join("style.xml");
    std::fs::write(&style, QGIS_STYLE).unwrap();

    let path = dir.path().join("gradients.json");
    let mut library = GradientLibrary::load(&path).unwrap();
    let imported = library.import_qgis(&style).unwrap();
    assert_eq!(imported, vec!["Classic Elevation", "Magma"]);

    // Same name replaced in place, new name appended
    assert_eq!(library.len(), 5);
    assert_eq!(library.names()[0], "Classic Elevation");
    assert_eq!(library.names()[4], "Magma");
    let classic = library.get("Classic Elevation").unwrap();
    assert_eq!(classic.color_stops.len(), 2);
    assert_eq!(classic.description, "Imported from QGIS");

    let reloaded = GradientLibrary::load(&path).unwrap();
    let magma = reloaded.get("Magma").unwrap();
    assert!(magma.discrete);
    assert_eq!(magma.color_stops[1].color(), Rgba::opaque(183, 55, 121));
}

#[test]
fn test_qgis_export_selected() {
    let dir = TempDir::new().unwrap();
    let library = GradientLibrary::load(dir.path().join("g.json")).unwrap();
    let out = dir.path().join("export.xml");

    let written = library
        .export_qgis(&out, &["Desert Terrain", "Missing", "Grayscale Elevation"])
        .unwrap();
    assert_eq!(written, 2);

    let ramps = topo_gradient::qgis::import_qgis(&out).unwrap();
    assert_eq!(ramps.len(), 2);
    assert_eq!(ramps[0].name, "Desert Terrain");
    assert_eq!(ramps[0].color_stops.len(), 5);
    assert_eq!(ramps[0].color_stops[4].color(), Rgba::opaque(139, 69, 19));
}

#[test]
fn test_adjusted_copy_saved() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("g.json");
    let mut library = GradientLibrary::load(&path).unwrap();

    let mut dark = library.require("Grayscale Elevation").unwrap().clone();
    dark.name = "Dark".into();
    dark.gradient_type = GradientType::ShadingAndPosterized;
    dark.adjust_hls(HlsAdjustment::new(0.0, -50.0, 0.0));
    library.add(dark).unwrap();

    let reloaded = GradientLibrary::load(&path).unwrap();
    let dark = reloaded.get("Dark").unwrap();
    assert_eq!(dark.gradient_type, GradientType::ShadingAndPosterized);
    // White at lightness 1.0 drops to 0.5
    assert_eq!(dark.color_stops[1].color(), Rgba::opaque(127, 127, 127));
    assert_eq!(dark.color_stops[0].color(), Rgba::BLACK);
}
