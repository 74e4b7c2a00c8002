use quick_xml::events::Event;
use quick_xml::reader::Reader;
use shelfscan_core::{MetadataRecord, non_empty, parse_number};
use tracing::warn;

/// Entry name of the embedded metadata document, matched exactly.
pub const COMIC_INFO_ENTRY: &str = "ComicInfo.xml";

const ROOT: &[u8] = b"ComicInfo";
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// The `<ComicInfo>` children mapped onto a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Element {
    Title,
    Writer,
    Series,
    Number,
    Year,
    Publisher,
    PageCount,
    Summary,
    Genre,
    LanguageIso,
}

impl Element {
    const COUNT: usize = 10;

    fn from_name(name: &[u8]) -> Option<Self> {
        Some(match name {
            b"Title" => Self::Title,
            b"Writer" => Self::Writer,
            b"Series" => Self::Series,
            b"Number" => Self::Number,
            b"Year" => Self::Year,
            b"Publisher" => Self::Publisher,
            b"PageCount" => Self::PageCount,
            b"Summary" => Self::Summary,
            b"Genre" => Self::Genre,
            b"LanguageISO" => Self::LanguageIso,
            _ => return None,
        })
    }
}

/// First non-empty text per mapped element.
#[derive(Debug, Default)]
struct ComicInfoValues([Option<String>; Element::COUNT]);

impl ComicInfoValues {
    fn offer(&mut self, element: Element, text: &str) {
        let slot = &mut self.0[element as usize];
        if slot.is_none() {
            *slot = non_empty(text);
        }
    }

    fn take(&mut self, element: Element) -> Option<String> {
        self.0[element as usize].take()
    }

    fn number<T: std::str::FromStr>(&self, element: Element) -> Option<T> {
        self.0[element as usize].as_deref().and_then(parse_number)
    }

    fn into_record(mut self) -> MetadataRecord {
        MetadataRecord {
            issue_number: self.number(Element::Number),
            published_year: self.number(Element::Year),
            page_count: self.number(Element::PageCount),
            title: self.take(Element::Title),
            author: self.take(Element::Writer),
            series: self.take(Element::Series),
            publisher: self.take(Element::Publisher),
            summary: self.take(Element::Summary),
            genre: self.take(Element::Genre),
            language: self.take(Element::LanguageIso),
            ..Default::default()
        }
    }
}

/// Parse a `ComicInfo.xml` document into a partial record.
///
/// Only direct children of `<ComicInfo>` are read. Text nested in inline
/// markup is concatenated. Unparsable integers are skipped; malformed XML
/// gives an empty record.
pub fn parse_comic_info(bytes: &[u8]) -> MetadataRecord {
    match read_values(bytes) {
        Ok(values) => values.into_record(),
        Err(err) => {
            warn!("malformed {COMIC_INFO_ENTRY}: {err}");
            MetadataRecord::default()
        }
    }
}

fn read_values(bytes: &[u8]) -> Result<ComicInfoValues, String> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();

    let mut values = ComicInfoValues::default();
    let mut depth = 0usize;
    let mut in_root = false;
    // Element being captured and the text gathered so far.
    let mut current: Option<(Element, String)> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                depth += 1;
                match depth {
                    1 => in_root = e.local_name().as_ref() == ROOT,
                    2 if in_root => {
                        current =
                            Element::from_name(e.local_name().as_ref()).map(|el| (el, String::new()));
                    }
                    _ => {}
                }
            }
            Ok(Event::End(_)) => {
                if depth == 2 {
                    if let Some((element, text)) = current.take() {
                        values.offer(element, &text);
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Ok(Event::Text(e)) => {
                if let Some((_, text)) = current.as_mut() {
                    let unescaped = e.unescape().map_err(|err| err.to_string())?;
                    text.push_str(&unescaped);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some((_, text)) = current.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => {
                return Err(format!(
                    "XML parse error at {}: {err}",
                    reader.error_position()
                ));
            }
            _ => {}
        }
        buf.clear();
    }

    if depth != 0 {
        return Err("unexpected end of document".to_string());
    }
    Ok(values)
}
