// Copyright @yucwang 2026

use crate::core::error::{RenderError, RenderResult};
use crate::core::properties::{Properties, PropertyValue};
use crate::core::scene_loader::PropertyBlocks;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use std::fs;

fn kind(value: &PropertyValue) -> &'static str {
    match value {
        PropertyValue::Integer(_) => "integer",
        PropertyValue::Float(_) => "float",
        PropertyValue::Boolean(_) => "boolean",
        PropertyValue::Str(_) => "string",
        PropertyValue::Rgb(_) => "rgb",
    }
}

fn write_block<W: std::io::Write>(writer: &mut Writer<W>, block: &str, props: &Properties) -> quick_xml::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(block)))?;
    let mut names: Vec<&String> = props.names().collect();
    names.sort();
    for name in names {
        if let Some(value) = props.get(name) {
            let text = value.to_string();
            let element = BytesStart::new(kind(value))
                .with_attributes([("name", name.as_str()), ("value", text.as_str())]);
            writer.write_event(Event::Empty(element))?;
        }
    }
    writer.write_event(Event::End(BytesEnd::new(block)))?;
    Ok(())
}

/// Serializes the property blocks into a scene document fragment the
/// scene loader reads back.
pub fn write_document(blocks: &PropertyBlocks) -> quick_xml::Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("scene")))?;
    write_block(&mut writer, "render", &blocks.render)?;
    write_block(&mut writer, "passes", &blocks.passes)?;
    write_block(&mut writer, "noise", &blocks.noise)?;
    writer.write_event(Event::End(BytesEnd::new("scene")))?;
    Ok(String::from_utf8_lossy(&writer.into_inner()).to_string())
}

pub fn export_document(blocks: &PropertyBlocks, file_path: &str) -> RenderResult<()> {
    log::info!("Exporting render settings to XML: {}.", file_path);
    let document = write_document(blocks).map_err(|e| RenderError::io_message(file_path, e))?;
    fs::write(file_path, document).map_err(|e| RenderError::io(file_path, e))
}
