//! Named gradient collection persisted as JSON.

use crate::color::{ColorStop, Rgba};
use crate::gradient::{Gradient, DEFAULT_CREATED_BY};
use crate::qgis;
use crate::{GradientError, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Library file used when none is configured.
pub const DEFAULT_GRADIENTS_FILE: &str = "gradients.json";

const LIBRARY_VERSION: &str = "1.0";

#[derive(Serialize)]
struct LibraryFile<'a> {
    version: &'static str,
    created_by: &'static str,
    gradients: &'a [Gradient],
}

fn stops(list: &[(f64, u8, u8, u8)]) -> Vec<ColorStop> {
    list.iter()
        .map(|&(p, r, g, b)| ColorStop::new(p, Rgba::opaque(r, g, b)))
        .collect()
}

/// The gradients a new library starts with.
pub fn default_gradients() -> Vec<Gradient> {
    vec![
        Gradient::new(
            "Classic Elevation",
            0.0,
            3000.0,
            stops(&[
                (0.0, 0, 128, 0),
                (0.2, 34, 139, 34),
                (0.4, 154, 205, 50),
                (0.6, 205, 133, 63),
                (0.8, 139, 90, 43),
                (1.0, 255, 255, 255),
            ]),
        )
        .with_description("Traditional topographic elevation colors")
        .with_tags(&["elevation", "classic", "topographic"]),
        Gradient::new(
            "Ocean to Alpine",
            -1000.0,
            5000.0,
            stops(&[
                (0.0, 8, 48, 107),
                (0.167, 33, 113, 181),
                (0.2, 66, 146, 198),
                (0.233, 198, 219, 239),
                (0.25, 247, 252, 185),
                (0.4, 34, 139, 34),
                (0.6, 154, 205, 50),
                (0.8, 139, 90, 43),
                (1.0, 255, 255, 255),
            ]),
        )
        .with_description("Complete bathymetry to high elevation range")
        .with_tags(&["bathymetry", "elevation", "complete"]),
        Gradient::new(
            "Desert Terrain",
            0.0,
            2000.0,
            stops(&[
                (0.0, 255, 218, 185),
                (0.3, 222, 184, 135),
                (0.6, 205, 133, 63),
                (0.8, 160, 82, 45),
                (1.0, 139, 69, 19),
            ]),
        )
        .with_description("Warm colors for arid landscapes")
        .with_tags(&["desert", "arid", "warm"]),
        Gradient::new(
            "Grayscale Elevation",
            0.0,
            3000.0,
            stops(&[(0.0, 0, 0, 0), (1.0, 255, 255, 255)]),
        )
        .with_description("Simple black to white elevation mapping")
        .with_tags(&["grayscale", "simple", "monochrome"]),
    ]
}

/// Parse a library file body. Accepts `{"gradients": [...]}` and the
/// keyed `{"<name>": {...}}` layout; entries that fail to parse are skipped.
fn parse_library(value: Value, path: &Path) -> Result<Vec<Gradient>> {
    let entries: Vec<Value> = match value {
        Value::Object(mut map) => match map.remove("gradients") {
            Some(Value::Array(list)) => list,
            other => {
                if let Some(v) = other {
                    map.insert("gradients".to_string(), v);
                }
                map.into_iter()
                    .map(|(_, v)| v)
                    .filter(|v| v.get("name").is_some())
                    .collect()
            }
        },
        _ => return Err(GradientError::UnrecognizedLayout(path.to_path_buf())),
    };

    let mut gradients = Vec::with_capacity(entries.len());
    for entry in entries {
        match serde_json::from_value::<Gradient>(entry) {
            Ok(mut g) => {
                g.normalize();
                gradients.push(g);
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping malformed gradient"),
        }
    }
    Ok(gradients)
}

/// Ordered set of gradients keyed by name, saved after every change.
#[derive(Debug, Clone)]
pub struct GradientLibrary {
    file: PathBuf,
    gradients: Vec<Gradient>,
}

impl GradientLibrary {
    /// Load the library at `file`. A missing or empty library is seeded
    /// with [`default_gradients`] and written back.
    pub fn load<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref().to_path_buf();
        let mut library = Self {
            file,
            gradients: Vec::new(),
        };

        if library.file.exists() {
            let text = std::fs::read_to_string(&library.file)?;
            let value: Value = serde_json::from_str(&text)?;
            for gradient in parse_library(value, &library.file)? {
                library.upsert(gradient);
            }
            info!(path = %library.file.display(), count = library.gradients.len(), "Loaded gradients");
        }

        if library.gradients.is_empty() {
            debug!(path = %library.file.display(), "Creating default gradients");
            library.gradients = default_gradients();
            library.save()?;
        }
        Ok(library)
    }

    /// A library that is never written to disk until [`save`](Self::save)
    /// is called.
    pub fn in_memory(file: impl Into<PathBuf>, gradients: Vec<Gradient>) -> Self {
        let mut library = Self {
            file: file.into(),
            gradients: Vec::new(),
        };
        for g in gradients {
            library.upsert(g);
        }
        library
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    /// Write the library in the array layout.
    pub fn save(&self) -> Result<()> {
        let data = LibraryFile {
            version: LIBRARY_VERSION,
            created_by: DEFAULT_CREATED_BY,
            gradients: &self.gradients,
        };
        if let Some(parent) = self.file.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.file, serde_json::to_string_pretty(&data)?)?;
        Ok(())
    }

    fn upsert(&mut self, gradient: Gradient) {
        match self.gradients.iter_mut().find(|g| g.name == gradient.name) {
            Some(existing) => *existing = gradient,
            None => self.gradients.push(gradient),
        }
    }

    pub fn len(&self) -> usize {
        self.gradients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gradients.is_empty()
    }

    pub fn gradients(&self) -> &[Gradient] {
        &self.gradients
    }

    pub fn names(&self) -> Vec<&str> {
        self.gradients.iter().map(|g| g.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Gradient> {
        self.gradients.iter().find(|g| g.name == name)
    }

    /// Like [`get`](Self::get) but a missing name is an error.
    pub fn require(&self, name: &str) -> Result<&Gradient> {
        self.get(name).ok_or_else(|| GradientError::NotFound(name.to_string()))
    }

    /// Add a gradient, replacing one with the same name in place.
    pub fn add(&mut self, gradient: Gradient) -> Result<()> {
        self.upsert(gradient);
        self.save()
    }

    /// Remove a gradient. Returns whether it existed.
    pub fn remove(&mut self, name: &str) -> Result<bool> {
        let before = self.gradients.len();
        self.gradients.retain(|g| g.name != name);
        if self.gradients.len() == before {
            return Ok(false);
        }
        self.save()?;
        Ok(true)
    }

    /// Reorder to `names`, which must list every gradient exactly once.
    pub fn reorder<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()> {
        let mismatch = || GradientError::ReorderMismatch {
            expected: self.gradients.len(),
            got: names.len(),
        };
        let wanted: HashSet<&str> = names.iter().map(|n| n.as_ref()).collect();
        let current: HashSet<&str> = self.gradients.iter().map(|g| g.name.as_str()).collect();
        if wanted != current || names.len() != self.gradients.len() {
            if let Some(missing) = wanted.difference(&current).next() {
                return Err(GradientError::NotFound(missing.to_string()));
            }
            return Err(mismatch());
        }

        let mut reordered = Vec::with_capacity(self.gradients.len());
        for name in names {
            if let Some(pos) = self.gradients.iter().position(|g| g.name == name.as_ref()) {
                reordered.push(self.gradients.swap_remove(pos));
            }
        }
        self.gradients = reordered;
        self.save()
    }

    /// Import the gradient ramps of a QGIS style file, replacing same-named
    /// gradients. Returns the imported names.
    pub fn import_qgis<P: AsRef<Path>>(&mut self, path: P) -> Result<Vec<String>> {
        let imported = qgis::import_qgis(path)?;
        let names: Vec<String> = imported.iter().map(|g| g.name.clone()).collect();
        if !imported.is_empty() {
            for g in imported {
                self.upsert(g);
            }
            self.save()?;
        }
        Ok(names)
    }

    /// Export the named gradients as QGIS XML. Unknown names are skipped.
    /// Returns how many gradients were written.
    pub fn export_qgis<P: AsRef<Path>, S: AsRef<str>>(&self, path: P, names: &[S]) -> Result<usize> {
        let selected: Vec<&Gradient> = names
            .iter()
            .filter_map(|n| {
                let found = self.get(n.as_ref());
                if found.is_none() {
                    warn!(name = n.as_ref(), "Gradient not found, skipping export");
                }
                found
            })
            .collect();
        qgis::export_qgis(path, selected.iter().copied())?;
        Ok(selected.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_seeds_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gradients.json");
        let lib = GradientLibrary::load(&path).unwrap();
        assert_eq!(
            lib.names(),
            vec!["Classic Elevation", "Ocean to Alpine", "Desert Terrain", "Grayscale Elevation"]
        );
        assert!(path.exists());

        let json: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["version"], "1.0");
        assert_eq!(json["gradients"][1]["min_elevation"], -1000.0);
        assert_eq!(json["gradients"][0]["gradient_type"], "gradient");
        assert!(json["gradients"][0]["shadow_color"].is_null());
    }

    #[test]
    fn test_keyed_layout_loads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("list.json");
        std::fs::write(
            &path,
            r#"{
                "Sunset": {"name": "Sunset", "color_stops": [
                    {"position": 1.0, "red": 0, "green": 0, "blue": 0},
                    {"position": 0.0, "red": 255, "green": 100, "blue": 0}
                ], "below_gradient_color": {"red": 1, "green": 2, "blue": 3}},
                "Broken": {"name": "Broken", "color_stops": [{"position": "x"}]},
                "note": "not a gradient"
            }"#,
        )
        .unwrap();

        let lib = GradientLibrary::load(&path).unwrap();
        assert_eq!(lib.names(), vec!["Sunset"]);
        let g = lib.get("Sunset").unwrap();
        assert_eq!(g.color_stops[0].position, 0.0);
        assert_eq!(g.max_elevation, 1000.0);
        assert_eq!(g.below_gradient_color, Some(Rgba::opaque(1, 2, 3)));
        assert!(lib.require("Nope").is_err());
    }

    #[test]
    fn test_add_remove_reorder() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("g.json");
        let mut lib = GradientLibrary::load(&path).unwrap();

        let mut custom = lib.get("Desert Terrain").unwrap().clone();
        custom.description = "edited".into();
        lib.add(custom).unwrap();
        assert_eq!(lib.len(), 4);
        assert_eq!(lib.names()[2], "Desert Terrain");
        assert_eq!(lib.get("Desert Terrain").unwrap().description, "edited");

        assert!(lib.remove("Ocean to Alpine").unwrap());
        assert!(!lib.remove("Ocean to Alpine").unwrap());

        let order = ["Grayscale Elevation", "Classic Elevation", "Desert Terrain"];
        lib.reorder(&order).unwrap();
        assert_eq!(lib.names(), order.to_vec());

        let err = lib.reorder(&["Grayscale Elevation", "Classic Elevation"]).unwrap_err();
        assert!(matches!(err, GradientError::ReorderMismatch { expected: 3, got: 2 }));
        let err = lib
            .reorder(&["Grayscale Elevation", "Classic Elevation", "Nope"])
            .unwrap_err();
        assert!(matches!(err, GradientError::NotFound(_)));

        let reloaded = GradientLibrary::load(&path).unwrap();
        assert_eq!(reloaded.names(), order.to_vec());
        assert_eq!(reloaded.get("Desert Terrain").unwrap().description, "edited");
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("g.json");
        std::fs::write(&path, "[1, 2").unwrap();
        assert!(matches!(GradientLibrary::load(&path), Err(GradientError::Json(_))));
        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(
            GradientLibrary::load(&path),
            Err(GradientError::UnrecognizedLayout(_))
        ));
    }
}
