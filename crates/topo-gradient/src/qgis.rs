//! QGIS color-ramp XML exchange.
//!
//! QGIS style files hold `<colorramp type="gradient" name="...">` elements.
//! Older files describe each ramp with `<prop k="..." v="..."/>` children,
//! newer ones with `<Option name="..." value="..."/>`. Both are read; export
//! writes the `prop` form.

use crate::color::{ColorStop, Rgba};
use crate::gradient::Gradient;
use crate::Result;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;
use tracing::{debug, warn};
use xml::attribute::OwnedAttribute;
use xml::common::XmlVersion;
use xml::reader::{EventReader, XmlEvent};
use xml::writer::{EmitterConfig, XmlEvent as WriterEvent};

/// `created_by` of imported gradients.
pub const QGIS_CREATED_BY: &str = "QGIS Import";

const DEFAULT_RAMP_NAME: &str = "Imported Gradient";
const DEFAULT_COLOR1: &str = "0,0,0,255";
const DEFAULT_COLOR2: &str = "255,255,255,255";

fn attr<'a>(attributes: &'a [OwnedAttribute], key: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|a| a.name.local_name == key)
        .map(|a| a.value.as_str())
}

struct RampBuilder {
    name: String,
    props: HashMap<String, String>,
}

impl RampBuilder {
    fn build(self) -> Option<Gradient> {
        let color1 = self.props.get("color1").map_or(DEFAULT_COLOR1, String::as_str);
        let color2 = self.props.get("color2").map_or(DEFAULT_COLOR2, String::as_str);
        let discrete = self.props.get("discrete").is_some_and(|v| v == "1");

        let mut stops = vec![ColorStop::new(0.0, Rgba::from_qgis(color1))];
        if let Some(extra) = self.props.get("stops").filter(|s| !s.is_empty()) {
            for item in extra.split(':') {
                let Some((pos, color)) = item.split_once(';') else {
                    continue;
                };
                match pos.trim().parse::<f64>() {
                    Ok(position) => stops.push(ColorStop::new(position, Rgba::from_qgis(color))),
                    Err(_) => {
                        warn!(ramp = %self.name, stop = item, "Skipping QGIS color ramp with invalid stop position");
                        return None;
                    }
                }
            }
        }
        stops.push(ColorStop::new(1.0, Rgba::from_qgis(color2)));

        Some(
            Gradient::new(self.name, 0.0, 1000.0, stops)
                .with_description("Imported from QGIS")
                .with_discrete(discrete)
                .with_created_by(QGIS_CREATED_BY)
                .with_tags(&["imported", "qgis"]),
        )
    }
}

/// Parse every gradient color ramp in a QGIS style document.
///
/// Ramps of other types are ignored, and so are gradient ramps whose stop
/// list cannot be parsed.
pub fn read_color_ramps<R: Read>(reader: R) -> Result<Vec<Gradient>> {
    let mut gradients = Vec::new();
    let mut current: Option<RampBuilder> = None;
    // Depth of non-gradient colorramp elements being skipped
    let mut skipping = 0usize;

    for event in EventReader::new(reader) {
        match event? {
            XmlEvent::StartElement { name, attributes, .. } => match name.local_name.as_str() {
                "colorramp" if current.is_none() && skipping == 0 => {
                    if attr(&attributes, "type") == Some("gradient") {
                        current = Some(RampBuilder {
                            name: attr(&attributes, "name").unwrap_or(DEFAULT_RAMP_NAME).to_string(),
                            props: HashMap::new(),
                        });
                    } else {
                        skipping += 1;
                    }
                }
                "colorramp" => skipping += 1,
                "prop" | "Option" => {
                    if let Some(ramp) = current.as_mut().filter(|_| skipping == 0) {
                        let (key, value) = if name.local_name == "prop" {
                            (attr(&attributes, "k"), attr(&attributes, "v"))
                        } else {
                            (attr(&attributes, "name"), attr(&attributes, "value"))
                        };
                        if let (Some(key), Some(value)) = (key, value) {
                            ramp.props.insert(key.to_string(), value.to_string());
                        }
                    }
                }
                _ => {}
            },
            XmlEvent::EndElement { name } if name.local_name == "colorramp" => {
                if skipping > 0 {
                    skipping -= 1;
                } else if let Some(ramp) = current.take() {
                    if let Some(gradient) = ramp.build() {
                        debug!(name = %gradient.name, stops = gradient.color_stops.len(), "Parsed QGIS color ramp");
                        gradients.push(gradient);
                    }
                }
            }
            _ => {}
        }
    }
    Ok(gradients)
}

/// Read gradient color ramps from a QGIS XML file.
pub fn import_qgis<P: AsRef<Path>>(path: P) -> Result<Vec<Gradient>> {
    let file = File::open(path.as_ref())?;
    read_color_ramps(BufReader::new(file))
}

/// Write gradients as a QGIS `<symbols>` document.
///
/// Gradients with fewer than two stops are written as empty ramps.
pub fn write_color_ramps<'g, W, I>(writer: W, gradients: I) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'g Gradient>,
{
    let mut w = EmitterConfig::new()
        .perform_indent(true)
        .indent_string("  ")
        .create_writer(writer);

    w.write(WriterEvent::StartDocument {
        version: XmlVersion::Version10,
        encoding: Some("UTF-8"),
        standalone: None,
    })?;
    w.write(WriterEvent::start_element("symbols"))?;

    for gradient in gradients {
        w.write(
            WriterEvent::start_element("colorramp")
                .attr("type", "gradient")
                .attr("name", &gradient.name),
        )?;
        let stops = &gradient.color_stops;
        if let [first, middle @ .., last] = stops.as_slice() {
            let mut props = vec![
                ("color1", first.color().to_qgis()),
                ("color2", last.color().to_qgis()),
                ("discrete", if gradient.discrete { "1" } else { "0" }.to_string()),
            ];
            if !middle.is_empty() {
                let joined: Vec<String> = middle.iter().map(ColorStop::to_qgis).collect();
                props.push(("stops", joined.join(":")));
            }
            for (key, value) in &props {
                w.write(WriterEvent::start_element("prop").attr("k", key).attr("v", value))?;
                w.write(WriterEvent::end_element())?;
            }
        }
        w.write(WriterEvent::end_element())?;
    }

    w.write(WriterEvent::end_element())?;
    Ok(())
}

/// Write gradients to a QGIS XML file.
pub fn export_qgis<'g, P, I>(path: P, gradients: I) -> Result<()>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = &'g Gradient>,
{
    let mut out = BufWriter::new(File::create(path.as_ref())?);
    write_color_ramps(&mut out, gradients)?;
    out.flush()?;
    Ok(())
}
