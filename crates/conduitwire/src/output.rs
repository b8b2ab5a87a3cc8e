use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use conduitwire::InboundEvent;
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct EventOutput<'a> {
    source: i64,
    message: &'a str,
    timestamp: &'a str,
    received_at: String,
}

impl<'a> EventOutput<'a> {
    fn new(event: &'a InboundEvent) -> Self {
        Self {
            source: event.source,
            message: &event.message,
            timestamp: &event.timestamp,
            received_at: conduitwire::session::timestamp_now(),
        }
    }
}

pub fn print_event(event: &InboundEvent, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(&EventOutput::new(event))
                    .unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SOURCE", "MESSAGE", "TIMESTAMP"])
                .add_row(vec![
                    event.source.to_string(),
                    event.message.clone(),
                    event.timestamp.clone(),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{event}"),
        OutputFormat::Raw => {
            let mut out = std::io::stdout();
            let _ = out.write_all(event.message.as_bytes());
            let _ = out.write_all(b"\n");
            let _ = out.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_output_carries_event_fields() {
        let event = InboundEvent {
            source: 9,
            message: "hi".into(),
            timestamp: "t".into(),
        };
        let value = serde_json::to_value(EventOutput::new(&event)).unwrap();
        assert_eq!(value["source"], 9);
        assert_eq!(value["message"], "hi");
        assert_eq!(value["timestamp"], "t");
        assert!(value["received_at"].as_str().is_some());
    }
}
