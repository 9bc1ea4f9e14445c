use std::collections::BTreeMap;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;

use super::error::SettingsError;

pub const XMLTAG_ROOT: &str = "updaterConfiguration";

/// Read the flat `<root><key>value</key>...</root>` layout into a map.
/// Only direct children of the root element are settings; anything nested
/// deeper contributes nothing. Values are trimmed.
pub fn parse_settings_xml(xml: &str) -> Result<BTreeMap<String, String>, SettingsError> {
    let mut settings = BTreeMap::new();
    if xml.trim().is_empty() {
        return Ok(settings);
    }

    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut depth: usize = 0;
    let mut current_key: Option<String> = None;
    let mut current_value = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                depth += 1;
                if depth == 2 {
                    current_key = Some(String::from_utf8_lossy(e.name().as_ref()).to_string());
                    current_value.clear();
                }
            }
            Ok(Event::Empty(e)) => {
                if depth == 1 {
                    let key = String::from_utf8_lossy(e.name().as_ref()).to_string();
                    settings.insert(key, String::new());
                }
            }
            Ok(Event::Text(e)) => {
                if depth == 2 {
                    let text = e.decode().map_err(|err| SettingsError::Xml(err.to_string()))?;
                    current_value.push_str(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if depth == 2 {
                    current_value.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::GeneralRef(e)) => {
                if depth == 2 {
                    if let Some(ch) = e
                        .resolve_char_ref()
                        .map_err(|err| SettingsError::Xml(err.to_string()))?
                    {
                        current_value.push(ch);
                    } else {
                        let name = e.decode().map_err(|err| SettingsError::Xml(err.to_string()))?;
                        let resolved = quick_xml::escape::resolve_predefined_entity(&name)
                            .ok_or_else(|| SettingsError::Xml(format!("unknown entity &{};", name)))?;
                        current_value.push_str(resolved);
                    }
                }
            }
            Ok(Event::End(_)) => {
                if depth == 2 {
                    if let Some(key) = current_key.take() {
                        settings.insert(key, current_value.trim().to_string());
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Eof) => {
                if depth != 0 {
                    return Err(SettingsError::Xml(format!(
                        "document ended with {} unclosed element(s)",
                        depth
                    )));
                }
                break;
            }
            Err(e) => {
                return Err(SettingsError::Xml(format!(
                    "parse error at byte {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(settings)
}

/// Render settings as a pretty-printed document with a 4-space indent.
pub fn render_settings_xml(settings: &BTreeMap<String, String>) -> Result<String, SettingsError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 4);
    let xml_err = |e: std::io::Error| SettingsError::Xml(e.to_string());

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_err)?;
    writer
        .write_event(Event::Start(BytesStart::new(XMLTAG_ROOT)))
        .map_err(xml_err)?;
    for (key, value) in settings {
        if !is_valid_tag_name(key) {
            return Err(SettingsError::InvalidValue {
                key: key.clone(),
                value: value.clone(),
            });
        }
        writer
            .create_element(key.as_str())
            .write_text_content(BytesText::new(value))
            .map_err(xml_err)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(XMLTAG_ROOT)))
        .map_err(xml_err)?;

    let mut xml = String::from_utf8(writer.into_inner())
        .map_err(|e| SettingsError::Xml(e.to_string()))?;
    xml.push('\n');
    Ok(xml)
}

fn is_valid_tag_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}
