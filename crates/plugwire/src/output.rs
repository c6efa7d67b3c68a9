use std::io::{IsTerminal, Write};

use bytes::Bytes;
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
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

/// One request and the response the plugin returned for it.
#[derive(Debug)]
pub struct Exchange {
    pub index: usize,
    pub request_size: usize,
    pub response: Bytes,
}

#[derive(Serialize)]
struct ExchangeOutput<'a> {
    index: usize,
    request_size: usize,
    response_size: usize,
    response: String,
    plugin: &'a str,
}

pub fn print_exchanges(exchanges: &[Exchange], plugin: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for exchange in exchanges {
                let out = ExchangeOutput {
                    index: exchange.index,
                    request_size: exchange.request_size,
                    response_size: exchange.response.len(),
                    response: payload_preview(&exchange.response),
                    plugin,
                };
                println!(
                    "{}",
                    serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["#", "SENT", "RECEIVED", "RESPONSE"]);
            for exchange in exchanges {
                table.add_row(vec![
                    exchange.index.to_string(),
                    exchange.request_size.to_string(),
                    exchange.response.len().to_string(),
                    payload_preview(&exchange.response),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for exchange in exchanges {
                println!(
                    "#{} sent={} received={} response={}",
                    exchange.index,
                    exchange.request_size,
                    exchange.response.len(),
                    payload_preview(&exchange.response)
                );
            }
        }
        OutputFormat::Raw => {
            for exchange in exchanges {
                print_raw(&exchange.response);
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BenchReport {
    pub plugin: String,
    pub callers: usize,
    pub requests_per_caller: usize,
    pub payload_size: usize,
    pub total_requests: usize,
    pub mismatches: usize,
    pub elapsed_ms: u128,
    pub requests_per_sec: f64,
}

pub fn print_bench(report: &BenchReport, format: OutputFormat) {
    match format {
        OutputFormat::Json | OutputFormat::Raw => {
            println!(
                "{}",
                serde_json::to_string(report).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["METRIC", "VALUE"])
                .add_row(vec!["plugin".to_string(), report.plugin.clone()])
                .add_row(vec!["callers".to_string(), report.callers.to_string()])
                .add_row(vec![
                    "requests/caller".to_string(),
                    report.requests_per_caller.to_string(),
                ])
                .add_row(vec!["payload bytes".to_string(), report.payload_size.to_string()])
                .add_row(vec!["total".to_string(), report.total_requests.to_string()])
                .add_row(vec!["mismatches".to_string(), report.mismatches.to_string()])
                .add_row(vec!["elapsed ms".to_string(), report.elapsed_ms.to_string()])
                .add_row(vec![
                    "requests/sec".to_string(),
                    format!("{:.0}", report.requests_per_sec),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{} requests ({} callers x {}) of {} bytes in {} ms: {:.0} req/s, {} mismatches",
                report.total_requests,
                report.callers,
                report.requests_per_caller,
                report.payload_size,
                report.elapsed_ms,
                report.requests_per_sec,
                report.mismatches
            );
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}
