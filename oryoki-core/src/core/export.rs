//! Knowledge-base export as XML, JSON or plain text.
//!
//! The three renderers take the same in-memory snapshot of
//! [`ExportRecord`]s, so every format carries the same entries, headings and
//! topic sets. Rendering never touches storage: the snapshot is assembled
//! first (see [`KnowledgeBase::export`](super::knowledge_base::KnowledgeBase::export)),
//! then serialised, and only a complete document is handed out.

use crate::{EntryDetails, EntryKind, OryokiError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Prefix of every export file name.
pub const EXPORT_FILE_STEM: &str = "oryoki-knowledge-base";

/// Title line of the plain-text report.
pub const TXT_TITLE: &str = "ORYOKI KNOWLEDGE BASE EXPORT";

const TXT_SEPARATOR_WIDTH: usize = 80;

/// Output format of an export.
///
/// ```rust
/// use oryoki_core::ExportFormat;
///
/// let format: ExportFormat = "json".parse().unwrap();
/// assert_eq!(format.extension(), "json");
/// assert_eq!(format.mime_type(), "application/json");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Xml,
    Json,
    Txt,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [ExportFormat::Xml, ExportFormat::Json, ExportFormat::Txt];

    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Xml => "xml",
            Self::Json => "json",
            Self::Txt => "txt",
        }
    }

    #[must_use]
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Xml => "application/xml",
            Self::Json => "application/json",
            Self::Txt => "text/plain",
        }
    }

    /// Menu label, also used in the success notification.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Xml => "XML",
            Self::Json => "JSON",
            Self::Txt => "Text",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = OryokiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "xml" => Ok(Self::Xml),
            "json" => Ok(Self::Json),
            "txt" => Ok(Self::Txt),
            other => Err(OryokiError::ValidationFailed(format!(
                "Unsupported export format: {other}"
            ))),
        }
    }
}

/// One entry as it appears in an export snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRecord {
    pub id: String,
    pub kind: EntryKind,
    pub heading: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub topics: Vec<String>,
    /// `None` when the payload row is missing; the details block is then omitted.
    pub details: Option<EntryDetails>,
}

/// A finished export, ready to be saved or offered for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub content: String,
    pub mime_type: &'static str,
    pub file_name: String,
}

/// `oryoki-knowledge-base-<YYYY-MM-DD>.<ext>` for the UTC day of `now`.
pub fn export_file_name(format: ExportFormat, now: DateTime<Utc>) -> String {
    format!(
        "{EXPORT_FILE_STEM}-{}.{}",
        now.format("%Y-%m-%d"),
        format.extension()
    )
}

/// Serialises `records` in `format` and names the result for `now`.
pub fn export_snapshot(format: ExportFormat, records: &[ExportRecord], now: DateTime<Utc>) -> Result<ExportFile> {
    let content = match format {
        ExportFormat::Xml => render_xml(records),
        ExportFormat::Json => render_json(records)?,
        ExportFormat::Txt => render_txt(records, now),
    };
    Ok(ExportFile {
        content,
        mime_type: format.mime_type(),
        file_name: export_file_name(format, now),
    })
}

/// Writes `file` into `dir` under its own name.
///
/// The content goes to a hidden temporary file first and is renamed into
/// place, so the final name never refers to a partially written export.
pub fn write_export(dir: &Path, file: &ExportFile) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let target = dir.join(&file.file_name);
    let staging = dir.join(format!(".{}.partial", file.file_name));
    if let Err(e) = fs::write(&staging, file.content.as_bytes()) {
        let _ = fs::remove_file(&staging);
        return Err(e.into());
    }
    fs::rename(&staging, &target)?;
    Ok(target)
}

/// Escapes the five XML special characters.
///
/// ```rust
/// use oryoki_core::escape_xml;
///
/// assert_eq!(escape_xml(r#"<script>&"'"#), "&lt;script&gt;&amp;&quot;&apos;");
/// ```
pub fn escape_xml(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '\'' => out.push_str("&apos;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}

fn timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Renders the `<knowledgeBase>` document.
pub fn render_xml(records: &[ExportRecord]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<knowledgeBase>\n");

    for r in records {
        xml.push_str("  <entry>\n");
        let _ = writeln!(xml, "    <id>{}</id>", escape_xml(&r.id));
        let _ = writeln!(xml, "    <type>{}</type>", escape_xml(r.kind.as_str()));
        let _ = writeln!(xml, "    <heading>{}</heading>", escape_xml(&r.heading));
        let _ = writeln!(xml, "    <createdAt>{}</createdAt>", timestamp(&r.created_at));
        let _ = writeln!(xml, "    <updatedAt>{}</updatedAt>", timestamp(&r.updated_at));

        xml.push_str("    <topics>\n");
        for topic in &r.topics {
            let _ = writeln!(xml, "      <topic>{}</topic>", escape_xml(topic));
        }
        xml.push_str("    </topics>\n");

        match &r.details {
            Some(EntryDetails::SupportCase { problem, solution, customer_satisfaction }) => {
                xml.push_str("    <supportCaseDetails>\n");
                let _ = writeln!(xml, "      <problem>{}</problem>", escape_xml(problem));
                let _ = writeln!(xml, "      <solution>{}</solution>", escape_xml(solution));
                let _ = writeln!(
                    xml,
                    "      <customerSatisfaction>{customer_satisfaction}</customerSatisfaction>"
                );
                xml.push_str("    </supportCaseDetails>\n");
            }
            Some(EntryDetails::ProductKnowledge { knowledge_content }) => {
                xml.push_str("    <productKnowledgeDetails>\n");
                let _ = writeln!(xml, "      <content>{}</content>", escape_xml(knowledge_content));
                xml.push_str("    </productKnowledgeDetails>\n");
            }
            Some(EntryDetails::Process { description }) => {
                xml.push_str("    <processDetails>\n");
                let _ = writeln!(xml, "      <description>{}</description>", escape_xml(description));
                xml.push_str("    </processDetails>\n");
            }
            None => {}
        }

        xml.push_str("  </entry>\n");
    }

    xml.push_str("</knowledgeBase>");
    xml
}

#[derive(Serialize)]
struct JsonExport<'a> {
    entries: Vec<JsonEntry<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonEntry<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    kind: EntryKind,
    heading: &'a str,
    created_at: String,
    updated_at: String,
    topics: &'a [String],
    #[serde(flatten)]
    details: Option<JsonDetails<'a>>,
}

/// Type-specific fields, merged flat into the entry object.
#[derive(Serialize)]
#[serde(untagged)]
enum JsonDetails<'a> {
    SupportCase {
        problem: &'a str,
        solution: &'a str,
        #[serde(rename = "customerSatisfaction")]
        customer_satisfaction: u8,
    },
    ProductKnowledge {
        content: &'a str,
    },
    Process {
        description: &'a str,
    },
}

impl<'a> From<&'a EntryDetails> for JsonDetails<'a> {
    fn from(details: &'a EntryDetails) -> Self {
        match details {
            EntryDetails::SupportCase { problem, solution, customer_satisfaction } => Self::SupportCase {
                problem,
                solution,
                customer_satisfaction: *customer_satisfaction,
            },
            EntryDetails::ProductKnowledge { knowledge_content } => Self::ProductKnowledge {
                content: knowledge_content,
            },
            EntryDetails::Process { description } => Self::Process { description },
        }
    }
}

/// Renders `{"entries": [...]}` with two-space indentation.
pub fn render_json(records: &[ExportRecord]) -> Result<String> {
    let export = JsonExport {
        entries: records
            .iter()
            .map(|r| JsonEntry {
                id: &r.id,
                kind: r.kind,
                heading: &r.heading,
                created_at: timestamp(&r.created_at),
                updated_at: timestamp(&r.updated_at),
                topics: &r.topics,
                details: r.details.as_ref().map(JsonDetails::from),
            })
            .collect(),
    };
    Ok(serde_json::to_string_pretty(&export)?)
}

/// Renders the human-readable report.
pub fn render_txt(records: &[ExportRecord], generated_at: DateTime<Utc>) -> String {
    let mut txt = format!("{TXT_TITLE}\nGenerated: {}\n\n", timestamp(&generated_at));

    for r in records {
        txt.push_str(&"=".repeat(TXT_SEPARATOR_WIDTH));
        txt.push_str("\n\n");
        let _ = writeln!(txt, "Type: {}", r.kind.as_str().replacen('_', " ", 1).to_uppercase());
        let _ = writeln!(txt, "Heading: {}", r.heading);
        let _ = writeln!(txt, "Created: {}", timestamp(&r.created_at));
        let _ = writeln!(txt, "Updated: {}", timestamp(&r.updated_at));
        let _ = writeln!(txt, "Topics: {}\n", r.topics.join(", "));

        match &r.details {
            Some(EntryDetails::SupportCase { problem, solution, customer_satisfaction }) => {
                let _ = write!(
                    txt,
                    "PROBLEM:\n{problem}\n\nSOLUTION:\n{solution}\n\nCustomer Satisfaction: {customer_satisfaction}\n"
                );
            }
            Some(EntryDetails::ProductKnowledge { knowledge_content }) => {
                let _ = write!(txt, "CONTENT:\n{knowledge_content}\n");
            }
            Some(EntryDetails::Process { description }) => {
                let _ = write!(txt, "DESCRIPTION:\n{description}\n");
            }
            None => {}
        }
        txt.push('\n');
    }

    txt
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, day, 9, 30, 0).unwrap()
    }

    fn records() -> Vec<ExportRecord> {
        vec![
            ExportRecord {
                id: "e1".to_string(),
                kind: EntryKind::SupportCase,
                heading: "Printer <offline>".to_string(),
                created_at: at(3),
                updated_at: at(4),
                topics: vec!["Hardware".to_string(), "Printing".to_string()],
                details: Some(EntryDetails::SupportCase {
                    problem: "No output".to_string(),
                    solution: "Restart spooler".to_string(),
                    customer_satisfaction: 4,
                }),
            },
            ExportRecord {
                id: "e2".to_string(),
                kind: EntryKind::ProductKnowledge,
                heading: "Invoice layout".to_string(),
                created_at: at(2),
                updated_at: at(2),
                topics: vec!["Billing".to_string()],
                details: Some(EntryDetails::ProductKnowledge {
                    knowledge_content: "Logo top left".to_string(),
                }),
            },
            ExportRecord {
                id: "e3".to_string(),
                kind: EntryKind::Process,
                heading: "Ship a parcel".to_string(),
                created_at: at(1),
                updated_at: at(1),
                topics: vec![],
                details: Some(EntryDetails::Process { description: "Weigh, label, send".to_string() }),
            },
        ]
    }

    #[test]
    fn test_file_name_and_mime_type() {
        let file = export_snapshot(ExportFormat::Xml, &[], at(7)).unwrap();
        assert_eq!(file.file_name, "oryoki-knowledge-base-2024-05-07.xml");
        assert_eq!(file.mime_type, "application/xml");

        assert_eq!(export_file_name(ExportFormat::Txt, at(7)), "oryoki-knowledge-base-2024-05-07.txt");
        assert_eq!(ExportFormat::Txt.mime_type(), "text/plain");
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        assert!("csv".parse::<ExportFormat>().is_err());
        assert_eq!("XML".parse::<ExportFormat>().unwrap(), ExportFormat::Xml);
    }

    #[test]
    fn test_escape_xml_covers_all_specials() {
        assert_eq!(escape_xml("<script>&\"'"), "&lt;script&gt;&amp;&quot;&apos;");
        assert_eq!(escape_xml(""), "");
        assert_eq!(escape_xml("plain"), "plain");
    }

    #[test]
    fn test_xml_layout() {
        let xml = render_xml(&records()[..1]);
        let expected = [
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>",
            "<knowledgeBase>",
            "  <entry>",
            "    <id>e1</id>",
            "    <type>support_case</type>",
            "    <heading>Printer &lt;offline&gt;</heading>",
            "    <createdAt>2024-05-03T09:30:00.000Z</createdAt>",
            "    <updatedAt>2024-05-04T09:30:00.000Z</updatedAt>",
            "    <topics>",
            "      <topic>Hardware</topic>",
            "      <topic>Printing</topic>",
            "    </topics>",
            "    <supportCaseDetails>",
            "      <problem>No output</problem>",
            "      <solution>Restart spooler</solution>",
            "      <customerSatisfaction>4</customerSatisfaction>",
            "    </supportCaseDetails>",
            "  </entry>",
            "</knowledgeBase>",
        ]
        .join("\n");
        assert_eq!(xml, expected);
    }

    #[test]
    fn test_xml_type_blocks() {
        let xml = render_xml(&records());
        assert!(xml.contains("<productKnowledgeDetails>\n      <content>Logo top left</content>"));
        assert!(xml.contains("<processDetails>\n      <description>Weigh, label, send</description>"));
        assert!(xml.ends_with("</knowledgeBase>"));
    }

    #[test]
    fn test_missing_payload_omits_details_block() {
        let mut rs = records();
        rs[2].details = None;
        let xml = render_xml(&rs[2..]);
        assert!(!xml.contains("processDetails"));
        let json: serde_json::Value = serde_json::from_str(&render_json(&rs[2..]).unwrap()).unwrap();
        assert!(json["entries"][0].get("description").is_none());
    }

    #[test]
    fn test_json_merges_type_fields_flat() {
        let json = render_json(&records()).unwrap();
        assert!(json.starts_with("{\n  \"entries\": [\n    {\n      \"id\": \"e1\""));

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let entries = value["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0]["type"], "support_case");
        assert_eq!(entries[0]["createdAt"], "2024-05-03T09:30:00.000Z");
        assert_eq!(entries[0]["problem"], "No output");
        assert_eq!(entries[0]["customerSatisfaction"], 4);
        assert_eq!(entries[1]["content"], "Logo top left");
        assert_eq!(entries[2]["description"], "Weigh, label, send");
        assert_eq!(entries[2]["topics"], serde_json::json!([]));
        assert!(entries[1].get("knowledgeContent").is_none());
    }

    #[test]
    fn test_txt_layout() {
        let txt = render_txt(&records()[..1], at(9));
        let sep = "=".repeat(80);
        let expected = format!(
            "ORYOKI KNOWLEDGE BASE EXPORT\n\
Generated: 2024-05-09T09:30:00.000Z\n\n\
{sep}\n\n\
Type: SUPPORT CASE\n\
Heading: Printer <offline>\n\
Created: 2024-05-03T09:30:00.000Z\n\
Updated: 2024-05-04T09:30:00.000Z\n\
Topics: Hardware, Printing\n\n\
PROBLEM:\nNo output\n\n\
SOLUTION:\nRestart spooler\n\n\
Customer Satisfaction: 4\n\n"
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn test_txt_type_labels() {
        let txt = render_txt(&records(), at(9));
        assert!(txt.contains("Type: PRODUCT KNOWLEDGE\n"));
        assert!(txt.contains("Type: PROCESS\n"));
        assert!(txt.contains("CONTENT:\nLogo top left\n"));
        assert!(txt.contains("DESCRIPTION:\nWeigh, label, send\n"));
        assert!(txt.contains("Topics: \n"));
    }

    #[test]
    fn test_all_formats_carry_the_same_entries() {
        let rs = records();
        let json: serde_json::Value = serde_json::from_str(&render_json(&rs).unwrap()).unwrap();
        let xml = render_xml(&rs);
        let txt = render_txt(&rs, at(9));

        for entry in json["entries"].as_array().unwrap() {
            let heading = entry["heading"].as_str().unwrap();
            assert!(xml.contains(&format!("<heading>{}</heading>", escape_xml(heading))));
            assert!(txt.contains(&format!("Heading: {heading}\n")));

            let topics: Vec<&str> = entry["topics"]
                .as_array()
                .unwrap()
                .iter()
                .map(|t| t.as_str().unwrap())
                .collect();
            for topic in &topics {
                assert!(xml.contains(&format!("<topic>{topic}</topic>")));
            }
            assert!(txt.contains(&format!("Topics: {}\n", topics.join(", "))));
        }
    }

    #[test]
    fn test_write_export_leaves_only_final_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = export_snapshot(ExportFormat::Json, &records(), at(7)).unwrap();
        let path = write_export(dir.path(), &file).unwrap();

        assert_eq!(path.file_name().unwrap(), "oryoki-knowledge-base-2024-05-07.json");
        assert_eq!(fs::read_to_string(&path).unwrap(), file.content);
        let names: Vec<_> = fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().file_name()).collect();
        assert_eq!(names.len(), 1);
    }
}
