/// draw.io (mxGraph) XML output.
///
/// Every node becomes an HTML-labelled vertex `node_<id>`; species with a
/// cached photo carry it inline as a data URI so the file is self-contained.
/// Positions are left to draw.io's tree layout.
use crate::bio::taxonomy::TaxonNode;
use crate::core::registry::NodeRegistry;
use crate::download::photos::PhotoCache;
use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use tracing::warn;

const SPECIES_FILL: &str = "#dae8fc";
const SPECIES_STROKE: &str = "#6c8ebf";
const SPECIES_TEXT: &str = "#2c3e50";
const TAXON_FILL: &str = "#d5e8d4";
const TAXON_STROKE: &str = "#82b366";
const TAXON_TEXT: &str = "#2d4722";

pub fn generate_drawio(
    registry: &NodeRegistry,
    photos: Option<&PhotoCache>,
    modified: DateTime<Utc>,
) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    let modified = modified.format("%Y-%m-%dT%H:%M:%S").to_string();

    emit(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut mxfile = BytesStart::new("mxfile");
    mxfile.push_attribute(("host", "app.diagrams.net"));
    mxfile.push_attribute(("modified", modified.as_str()));
    mxfile.push_attribute(("agent", concat!("taxatree/", env!("CARGO_PKG_VERSION"))));
    mxfile.push_attribute(("type", "device"));
    emit(&mut writer, Event::Start(mxfile))?;

    let mut diagram = BytesStart::new("diagram");
    diagram.push_attribute(("name", "Taxon Tree"));
    diagram.push_attribute(("id", "diagram_1"));
    emit(&mut writer, Event::Start(diagram))?;

    let mut model = BytesStart::new("mxGraphModel");
    for (key, value) in [
        ("dx", "0"),
        ("dy", "0"),
        ("grid", "1"),
        ("gridSize", "10"),
        ("guides", "1"),
        ("tooltips", "1"),
        ("connect", "1"),
        ("arrows", "1"),
        ("fold", "1"),
        ("page", "1"),
        ("pageScale", "1"),
        ("pageWidth", "850"),
        ("pageHeight", "1100"),
    ] {
        model.push_attribute((key, value));
    }
    emit(&mut writer, Event::Start(model))?;
    emit(&mut writer, Event::Start(BytesStart::new("root")))?;

    let mut base = BytesStart::new("mxCell");
    base.push_attribute(("id", "0"));
    emit(&mut writer, Event::Empty(base))?;
    let mut layer = BytesStart::new("mxCell");
    layer.push_attribute(("id", "1"));
    layer.push_attribute(("parent", "0"));
    emit(&mut writer, Event::Empty(layer))?;

    for node in registry.entries() {
        let photo = if node.is_species {
            photos.and_then(|cache| photo_data_uri(cache, node.id))
        } else {
            None
        };
        write_vertex(&mut writer, node, photo.as_deref())?;
    }

    let mut edge_count = 0usize;
    for node in registry.entries() {
        let Some(parent) = node.parent_id.filter(|parent| registry.contains(*parent)) else {
            continue;
        };
        let id = format!("edge_{}", edge_count);
        let source = format!("node_{}", parent);
        let target = format!("node_{}", node.id);

        let mut edge = BytesStart::new("mxCell");
        edge.push_attribute(("id", id.as_str()));
        edge.push_attribute(("source", source.as_str()));
        edge.push_attribute(("target", target.as_str()));
        edge.push_attribute(("edge", "1"));
        edge.push_attribute(("parent", "1"));
        edge.push_attribute(("style", "endArrow=classic;html=1;jettySize=auto;orthogonalLoop=1;"));
        emit(&mut writer, Event::Start(edge))?;
        write_geometry(&mut writer, &[("relative", "1"), ("as", "geometry")])?;
        emit(&mut writer, Event::End(BytesEnd::new("mxCell")))?;
        edge_count += 1;
    }

    // draw.io's tree layout picks this helper up on "Arrange"
    let mut arrange = BytesStart::new("mxCell");
    arrange.push_attribute(("id", "arrange"));
    arrange.push_attribute(("style", "tree;verticalTree=1;vertical=1;horizontal=0;resizeParent=1;"));
    arrange.push_attribute(("vertex", "1"));
    arrange.push_attribute(("parent", "1"));
    emit(&mut writer, Event::Start(arrange))?;
    write_geometry(&mut writer, &[("as", "geometry")])?;
    emit(&mut writer, Event::End(BytesEnd::new("mxCell")))?;

    for tag in ["root", "mxGraphModel", "diagram", "mxfile"] {
        emit(&mut writer, Event::End(BytesEnd::new(tag)))?;
    }

    String::from_utf8(writer.into_inner()).context("draw.io output is not UTF-8")
}

fn write_vertex(writer: &mut Writer<Vec<u8>>, node: &TaxonNode, photo: Option<&str>) -> Result<()> {
    let (fill, stroke, text, width, height) = if node.is_species {
        (SPECIES_FILL, SPECIES_STROKE, SPECIES_TEXT, "140", "180")
    } else {
        (TAXON_FILL, TAXON_STROKE, TAXON_TEXT, "160", "60")
    };

    let style = [
        "shape=rectangle".to_string(),
        "html=1".to_string(),
        "whiteSpace=wrap".to_string(),
        format!("fillColor={}", fill),
        format!("strokeColor={}", stroke),
        "verticalAlign=top".to_string(),
        "labelPosition=center".to_string(),
        "spacingTop=10".to_string(),
        "fontSize=14".to_string(),
    ]
    .join(";");

    let photo_html = photo
        .map(|uri| {
            format!(
                "<div style=\"width:120px;height:120px;background-image:url({});\
                 background-size:cover;background-position:center;margin:0 auto 8px auto;\
                 border-radius:8px;border:2px solid {};\"></div>",
                uri, SPECIES_STROKE
            )
        })
        .unwrap_or_default();
    let value = format!(
        "{}<div style=\"padding:8px;font-family:Arial;color:{}\">{}</div>",
        photo_html,
        text,
        html_escape(&node.name)
    );

    let id = format!("node_{}", node.id);
    let mut cell = BytesStart::new("mxCell");
    cell.push_attribute(("id", id.as_str()));
    cell.push_attribute(("value", value.as_str()));
    cell.push_attribute(("style", style.as_str()));
    cell.push_attribute(("vertex", "1"));
    cell.push_attribute(("parent", "1"));
    emit(writer, Event::Start(cell))?;
    write_geometry(writer, &[("width", width), ("height", height), ("as", "geometry")])?;
    emit(writer, Event::End(BytesEnd::new("mxCell")))
}

fn write_geometry(writer: &mut Writer<Vec<u8>>, attributes: &[(&str, &str)]) -> Result<()> {
    let mut geometry = BytesStart::new("mxGeometry");
    for attribute in attributes {
        geometry.push_attribute(*attribute);
    }
    emit(writer, Event::Empty(geometry))
}

fn emit(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| anyhow::anyhow!("Failed to write draw.io XML: {}", e))
}

/// Cached photo as `data:image/...;base64,...`; unreadable photos are skipped
fn photo_data_uri(cache: &PhotoCache, taxon_id: u32) -> Option<String> {
    let path = cache.get(taxon_id)?;
    match std::fs::read(&path) {
        Ok(bytes) => Some(format!(
            "data:{};base64,{}",
            image_mime(&bytes),
            STANDARD.encode(&bytes)
        )),
        Err(e) => {
            warn!("Skipping photo {}: {}", path.display(), e);
            None
        }
    }
}

fn image_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else {
        "image/jpeg"
    }
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
