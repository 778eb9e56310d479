use colored::Colorize;

use crate::client::{ActiveDocument, Notification};
use crate::models::{AgentQueryResponse, DocumentListItem, Entity};

/// A run of text, labelled when it is an entity mention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment<'a> {
    pub text: String,
    pub label: Option<&'a str>,
}

/// Splits `text` at entity spans (character offsets). Spans that overlap an
/// earlier one or fall outside the text are ignored.
pub fn entity_segments<'a>(text: &str, entities: &'a [Entity]) -> Vec<Segment<'a>> {
    let chars: Vec<char> = text.chars().collect();
    let mut spans: Vec<(usize, usize, &str)> = entities
        .iter()
        .filter_map(|e| e.span().map(|(start, end)| (start, end, e.label.as_str())))
        .filter(|(_, end, _)| *end <= chars.len())
        .collect();
    spans.sort_by_key(|(start, end, _)| (*start, *end));

    let mut segments = Vec::new();
    let mut cursor = 0;
    for (start, end, label) in spans {
        if start < cursor {
            continue;
        }
        if start > cursor {
            segments.push(Segment {
                text: chars[cursor..start].iter().collect(),
                label: None,
            });
        }
        segments.push(Segment {
            text: chars[start..end].iter().collect(),
            label: Some(label),
        });
        cursor = end;
    }
    if cursor < chars.len() {
        segments.push(Segment {
            text: chars[cursor..].iter().collect(),
            label: None,
        });
    }
    segments
}

pub fn highlight_entities(text: &str, entities: &[Entity]) -> String {
    entity_segments(text, entities)
        .into_iter()
        .map(|segment| match segment.label {
            Some(label) => format!(
                "{}{}",
                segment.text.black().on_bright_yellow(),
                format!("[{label}]").dimmed()
            ),
            None => segment.text,
        })
        .collect()
}

pub fn numbered(results: &[String]) -> Vec<String> {
    results
        .iter()
        .enumerate()
        .map(|(i, result)| format!("{}. {}", i + 1, result))
        .collect()
}

pub fn print_documents(documents: &[DocumentListItem]) {
    if documents.is_empty() {
        println!("📂 No documents uploaded yet.");
        return;
    }
    println!("\n📚 Your documents:");
    for doc in documents {
        println!("  • {} {}", doc.filename.bright_yellow(), doc.id.dimmed());
    }
    println!();
}

pub fn print_document(document: &ActiveDocument) {
    println!(
        "\n📄 {} {}",
        document.filename.bright_yellow().bold(),
        document.id.dimmed()
    );

    println!("\n📝 Summary:");
    if document.summary.is_empty() {
        println!("{}", "No summary available.".dimmed());
    } else {
        println!("{}", document.summary.bright_green());
    }

    if !document.entities.is_empty() {
        println!("\n🏷️  Entities:");
        for entity in &document.entities {
            println!("  • {} ({})", entity.text, entity.label.cyan());
        }
    }

    println!("\n📖 Extracted text:");
    if document.extracted_text.is_empty() {
        println!("{}", "No text available.".dimmed());
    } else {
        println!("{}", highlight_entities(&document.extracted_text, &document.entities));
    }
    println!();
}

pub fn print_answer(answer: &str) {
    println!("\n💬 Answer:");
    println!("{}\n", answer.bright_green());
}

pub fn print_results(results: &[String]) {
    println!("\n🔍 Search results:");
    for line in numbered(results) {
        println!("{line}");
    }
    println!();
}

pub fn print_agent_response(response: &AgentQueryResponse) {
    if let Some(calls) = response.tool_calls.as_ref().filter(|c| !c.is_empty()) {
        println!("\n🔧 Tools used:");
        for call in calls {
            println!("  • {} {}", call.tool.cyan(), call.args.to_string().dimmed());
        }
    }
    print_answer(&response.answer);
}

pub fn print_notification(notification: &Notification) {
    match notification {
        Notification::Error(message) => println!("❌ {}", message.red()),
        Notification::Success(message) => println!("✅ {}", message.green()),
    }
}
