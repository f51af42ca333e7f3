//! Master KML generation.
//!
//! This module stitches the per-image descriptors produced by the converter
//! into one KML document: a radio folder holding one `NetworkLink` per input.

use crate::error::{HarnessError, HarnessResult};
use crate::models::{entries_from_names, AggregationEntry, StemRule};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::{self, Cursor, Write};
use std::path::Path;
use tracing::debug;

/// KML 2.2 namespace.
pub const KML_NAMESPACE: &str = "http://earth.google.com/kml/2.2";

/// Knobs for the master document. Defaults reproduce the harness format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KmlOptions {
    /// `<Document><name>`; omitted when empty.
    pub document_name: String,
    /// `<Folder><name>`.
    pub folder_name: String,
    /// `<listItemType>` of the folder style.
    pub list_item_type: String,
    /// How link stems are derived from input names.
    pub stem_rule: StemRule,
}

impl Default for KmlOptions {
    fn default() -> Self {
        Self {
            document_name: "ListStyle radiofolder".to_string(),
            folder_name: "Image2qtree results".to_string(),
            list_item_type: "radioFolder".to_string(),
            stem_rule: StemRule::default(),
        }
    }
}

/// Write the master document for `names` to `output_path`.
///
/// Names are validated before the file is touched, so a bad name never
/// leaves a truncated document behind.
pub fn generate_master_document<S: AsRef<str>>(
    names: &[S],
    output_path: &Path,
    options: &KmlOptions,
) -> HarnessResult<Vec<AggregationEntry>> {
    let entries = entries_from_names(names, options.stem_rule)?;
    write_master_document(&entries, output_path, options)?;
    Ok(entries)
}

/// Render entries and write them to `path`, creating or truncating it.
pub fn write_master_document(
    entries: &[AggregationEntry],
    path: &Path,
    options: &KmlOptions,
) -> HarnessResult<()> {
    let content = render_master_document(entries, options)?;

    let mut file = std::fs::File::create(path)?;
    file.write_all(content.as_bytes())?;

    debug!(
        "Wrote {} network links to {}",
        entries.len(),
        path.display()
    );
    Ok(())
}

/// Render the complete master document.
pub fn render_master_document(
    entries: &[AggregationEntry],
    options: &KmlOptions,
) -> HarnessResult<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut kml = BytesStart::new("kml");
    kml.push_attribute(("xmlns", KML_NAMESPACE));
    writer.write_event(Event::Start(kml))?;
    writer.write_event(Event::Start(BytesStart::new("Document")))?;

    if !options.document_name.is_empty() {
        write_text_element(&mut writer, "name", &options.document_name)?;
    }

    writer.write_event(Event::Start(BytesStart::new("Folder")))?;
    write_text_element(&mut writer, "name", &options.folder_name)?;
    write_list_style(&mut writer, &options.list_item_type)?;

    for entry in entries {
        write_network_link(&mut writer, entry)?;
    }

    writer.write_event(Event::End(BytesEnd::new("Folder")))?;
    writer.write_event(Event::End(BytesEnd::new("Document")))?;
    writer.write_event(Event::End(BytesEnd::new("kml")))?;

    let mut bytes = writer.into_inner().into_inner();
    bytes.push(b'\n');

    String::from_utf8(bytes)
        .map_err(|e| HarnessError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

/// `<Style><ListStyle><listItemType>..</listItemType></ListStyle></Style>`
fn write_list_style<W: Write>(writer: &mut Writer<W>, list_item_type: &str) -> HarnessResult<()> {
    writer.write_event(Event::Start(BytesStart::new("Style")))?;
    writer.write_event(Event::Start(BytesStart::new("ListStyle")))?;
    write_text_element(writer, "listItemType", list_item_type)?;
    writer.write_event(Event::End(BytesEnd::new("ListStyle")))?;
    writer.write_event(Event::End(BytesEnd::new("Style")))?;
    Ok(())
}

fn write_network_link<W: Write>(
    writer: &mut Writer<W>,
    entry: &AggregationEntry,
) -> HarnessResult<()> {
    writer.write_event(Event::Start(BytesStart::new("NetworkLink")))?;
    write_text_element(writer, "name", &entry.label)?;
    // Viewers re-evaluate visibility when the link loads.
    write_text_element(writer, "refreshVisibility", "1")?;

    writer.write_event(Event::Start(BytesStart::new("Link")))?;
    write_text_element(writer, "href", &entry.href())?;
    writer.write_event(Event::End(BytesEnd::new("Link")))?;

    writer.write_event(Event::End(BytesEnd::new("NetworkLink")))?;
    Ok(())
}

fn write_text_element<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    text: &str,
) -> HarnessResult<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use quick_xml::escape::unescape;
    use quick_xml::Reader;
    use tempfile::TempDir;

    fn entries(names: &[&str]) -> Vec<AggregationEntry> {
        entries_from_names(names, StemRule::default()).unwrap()
    }

    /// Parse a rendered document and return `(name, href)` for every link.
    fn parse_links(xml: &str) -> Vec<(String, String)> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut links = Vec::new();
        let mut path: Vec<String> = Vec::new();
        let mut raw_text = String::new();
        let mut name = String::new();
        let mut href = String::new();

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    path.push(String::from_utf8_lossy(e.name().as_ref()).to_string());
                    raw_text.clear();
                }
                Ok(Event::Text(e)) => raw_text.push_str(&String::from_utf8_lossy(e.as_ref())),
                Ok(Event::GeneralRef(e)) => {
                    raw_text.push('&');
                    raw_text.push_str(&String::from_utf8_lossy(&e));
                    raw_text.push(';');
                }
                Ok(Event::End(_)) => {
                    let text = unescape(&raw_text).unwrap().to_string();
                    let parent = path.len().checked_sub(2).map(|i| path[i].as_str());
                    match (path.last().map(String::as_str), parent) {
                        (Some("name"), Some("NetworkLink")) => name = text,
                        (Some("href"), Some("Link")) => href = text,
                        (Some("NetworkLink"), _) => {
                            links.push((std::mem::take(&mut name), std::mem::take(&mut href)))
                        }
                        _ => {}
                    }
                    path.pop();
                    raw_text.clear();
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => panic!("document is not well-formed: {}", e),
            }
        }

        links
    }

    #[test]
    fn test_render_single_entry_document() {
        let xml = render_master_document(&entries(&["a.tif"]), &KmlOptions::default()).unwrap();

        let expected = r#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://earth.google.com/kml/2.2">
  <Document>
    <name>ListStyle radiofolder</name>
    <Folder>
      <name>Image2qtree results</name>
      <Style>
        <ListStyle>
          <listItemType>radioFolder</listItemType>
        </ListStyle>
      </Style>
      <NetworkLink>
        <name>a.tif</name>
        <refreshVisibility>1</refreshVisibility>
        <Link>
          <href>a/a.kml</href>
        </Link>
      </NetworkLink>
    </Folder>
  </Document>
</kml>
"#;
        assert_eq!(xml, expected);
    }

    #[test]
    fn test_links_follow_input_order() {
        let xml =
            render_master_document(&entries(&["a.tif", "b.tif"]), &KmlOptions::default()).unwrap();

        let a = xml.find("<name>a.tif</name>").unwrap();
        let b = xml.find("<name>b.tif</name>").unwrap();
        assert!(a < b);
        assert!(xml.find("<href>a/a.kml</href>").unwrap() < xml.find("<href>b/b.kml</href>").unwrap());

        assert_eq!(
            parse_links(&xml),
            vec![
                ("a.tif".to_string(), "a/a.kml".to_string()),
                ("b.tif".to_string(), "b/b.kml".to_string()),
            ]
        );
    }

    #[test]
    fn test_one_link_per_entry_with_duplicates() {
        let names = ["z.tif", "m.tif", "z.tif", "a.tif"];
        let xml = render_master_document(&entries(&names), &KmlOptions::default()).unwrap();

        assert_eq!(xml.matches("<NetworkLink>").count(), 4);
        let labels: Vec<_> = parse_links(&xml).into_iter().map(|(n, _)| n).collect();
        assert_eq!(labels, names);
    }

    #[test]
    fn test_empty_input_gives_empty_folder() {
        let xml = render_master_document(&[], &KmlOptions::default()).unwrap();

        assert!(!xml.contains("NetworkLink"));
        assert!(xml.contains("<name>Image2qtree results</name>"));
        assert!(xml.contains("<listItemType>radioFolder</listItemType>"));
        assert!(xml.contains("</Folder>"));
        assert!(parse_links(&xml).is_empty());
    }

    #[test]
    fn test_special_characters_are_escaped() {
        let names = ["a&b.tif", "<x>.tif"];
        let xml = render_master_document(&entries(&names), &KmlOptions::default()).unwrap();

        assert!(xml.contains("<name>a&amp;b.tif</name>"));
        assert!(xml.contains("<name>&lt;x&gt;.tif</name>"));
        assert!(!xml.contains("<x>"));

        assert_eq!(
            parse_links(&xml),
            vec![
                ("a&b.tif".to_string(), "a&b/a&b.kml".to_string()),
                ("<x>.tif".to_string(), "<x>/<x>.kml".to_string()),
            ]
        );
    }

    #[test]
    fn test_quotes_are_escaped_as_entities() {
        let xml =
            render_master_document(&entries(&["it's \"x\".tif"]), &KmlOptions::default()).unwrap();
        assert!(xml.contains("<name>it&apos;s &quot;x&quot;.tif</name>"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let list = entries(&["scene001.tif", "scene002.tif"]);
        let first = render_master_document(&list, &KmlOptions::default()).unwrap();
        let second = render_master_document(&list, &KmlOptions::default()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_custom_options() {
        let options = KmlOptions {
            document_name: String::new(),
            folder_name: "Tiles".to_string(),
            list_item_type: "check".to_string(),
            stem_rule: StemRule::LastDot,
        };
        let list = entries_from_names(&["dem.tiff"], options.stem_rule).unwrap();
        let xml = render_master_document(&list, &options).unwrap();

        assert!(!xml.contains("ListStyle radiofolder"));
        assert!(xml.contains("<name>Tiles</name>"));
        assert!(xml.contains("<listItemType>check</listItemType>"));
        assert!(xml.contains("<href>dem/dem.kml</href>"));
    }

    #[test]
    fn test_generate_writes_and_overwrites_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("master.kml");
        std::fs::write(&path, "stale content that is much longer than nothing").unwrap();

        generate_master_document(&["foo.tif"], &path, &KmlOptions::default()).unwrap();
        let first = std::fs::read(&path).unwrap();
        generate_master_document(&["foo.tif"], &path, &KmlOptions::default()).unwrap();
        let second = std::fs::read(&path).unwrap();

        assert_eq!(first, second);
        let content = String::from_utf8(first).unwrap();
        assert!(content.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(content.contains("<name>foo.tif</name>"));
        assert!(content.contains("<href>foo/foo.kml</href>"));
        assert!(!content.contains("stale"));
    }

    #[test]
    fn test_generate_fails_without_parent_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("master.kml");

        let err =
            generate_master_document(&["foo.tif"], &path, &KmlOptions::default()).unwrap_err();
        assert!(matches!(err, HarnessError::Io(_)));
    }

    #[test]
    fn test_generate_rejects_bad_name_before_writing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("master.kml");

        let err = generate_master_document(&["ok.tif", "bad"], &path, &KmlOptions::default())
            .unwrap_err();
        assert!(matches!(err, HarnessError::InvalidName { .. }));
        assert!(!path.exists());
    }
}
