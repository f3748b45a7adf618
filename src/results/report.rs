//! Report export as an xlsx workbook or JSON

use super::container::ResultContainer;
use super::types::Record;
use crate::error::{Error, Result};
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook, Worksheet};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

const SERVICE_SHEET: &str = "端口服务";
const DOMAIN_SHEET: &str = "关联域名";

const SERVICE_HEADERS: [&str; 9] = [
    "IP",
    "端口",
    "服务",
    "URL",
    "网站标题",
    "指纹",
    "来源",
    "查询语句",
    "更新时间",
];
const DOMAIN_HEADERS: [&str; 2] = ["IP", "域名"];

const COLUMN_WIDTH: f64 = 20.0;
const HEADER_HEIGHT: f64 = 30.0;
/// Row 0 holds the sheet title and row 1 the column headers
const FIRST_DATA_ROW: u32 = 2;

#[derive(Serialize)]
struct Report<'a> {
    services: &'a BTreeMap<String, Vec<Record>>,
    domains: BTreeMap<&'a str, Vec<DomainEntry<'a>>>,
}

#[derive(Serialize)]
struct DomainEntry<'a> {
    ip: &'a str,
    domain: &'a str,
}

/// Write the report in the format named by the file extension
pub fn write<P: AsRef<Path>>(path: P, container: &ResultContainer) -> Result<()> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("xlsx") => write_xlsx(path, container),
        Some("json") => write_json(path, container),
        _ => Err(Error::Config(format!(
            "unsupported report format for {}, expected .xlsx or .json",
            path.display()
        ))),
    }
}

/// Write the aggregated services and hostnames of a run as an xlsx workbook.
///
/// The workbook has a services sheet and a domains sheet. Each sheet starts
/// with a merged title row and a header row, and the IP cell spans every row
/// belonging to that IP.
pub fn write_xlsx<P: AsRef<Path>>(path: P, container: &ResultContainer) -> Result<()> {
    let path = path.as_ref();

    let services = container.services().iter().map(|(ip, records)| {
        let rows = records
            .iter()
            .map(|r| {
                vec![
                    r.port.as_str(),
                    r.protocol.as_str(),
                    r.url.as_str(),
                    r.title.as_str(),
                    r.fingerprint.as_str(),
                    r.source.as_str(),
                    r.prompt.as_str(),
                    r.last_update.as_str(),
                ]
            })
            .collect();
        (ip.as_str(), rows)
    });

    let mut domains: BTreeMap<&str, Vec<Vec<&str>>> = BTreeMap::new();
    for (ip, domain) in container.domains() {
        domains.entry(ip).or_default().push(vec![domain]);
    }

    let mut workbook = Workbook::new();
    workbook.push_worksheet(build_sheet(SERVICE_SHEET, &SERVICE_HEADERS, services)?);
    workbook.push_worksheet(build_sheet(DOMAIN_SHEET, &DOMAIN_HEADERS, domains)?);
    workbook.save(path)?;

    info!(
        "Saved {} services on {} hosts to {}",
        container.len(),
        container.ip_count(),
        path.display()
    );
    Ok(())
}

/// Lay out one sheet from rows grouped by IP; the IP column is implied
fn build_sheet<'a>(
    name: &str,
    headers: &[&str],
    groups: impl IntoIterator<Item = (&'a str, Vec<Vec<&'a str>>)>,
) -> Result<Worksheet> {
    let title_format = Format::new()
        .set_bold()
        .set_font_size(14)
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter);
    let header_format = Format::new()
        .set_bold()
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter)
        .set_border(FormatBorder::Thin)
        .set_background_color(Color::Silver);
    let ip_format = Format::new().set_align(FormatAlign::VerticalCenter);

    let mut sheet = Worksheet::new();
    sheet.set_name(name)?;

    let last_col = headers.len().saturating_sub(1) as u16;
    for col in 0..=last_col {
        sheet.set_column_width(col, COLUMN_WIDTH)?;
    }
    sheet.merge_range(0, 0, 0, last_col, name, &title_format)?;
    sheet.set_row_height(0, HEADER_HEIGHT)?;
    sheet.set_row_height(1, HEADER_HEIGHT)?;
    for (col, header) in headers.iter().enumerate() {
        sheet.write_string_with_format(1, col as u16, *header, &header_format)?;
    }

    let mut row = FIRST_DATA_ROW;
    for (ip, rows) in groups {
        if rows.is_empty() {
            continue;
        }
        let last_row = row + rows.len() as u32 - 1;
        // A single cell cannot be merged
        if last_row > row {
            sheet.merge_range(row, 0, last_row, 0, ip, &ip_format)?;
        } else {
            sheet.write_string_with_format(row, 0, ip, &ip_format)?;
        }
        for cells in rows {
            for (col, value) in cells.iter().enumerate() {
                sheet.write_string(row, col as u16 + 1, *value)?;
            }
            row += 1;
        }
    }

    Ok(sheet)
}

/// Write the aggregated services and hostnames of a run as pretty JSON
pub fn write_json<P: AsRef<Path>>(path: P, container: &ResultContainer) -> Result<()> {
    let path = path.as_ref();

    let mut domains: BTreeMap<&str, Vec<DomainEntry<'_>>> = BTreeMap::new();
    for (ip, domain) in container.domains() {
        domains.entry(ip).or_default().push(DomainEntry { ip, domain });
    }
    let report = Report {
        services: container.services(),
        domains,
    };

    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &report)?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    info!(
        "Saved {} services on {} hosts to {}",
        container.len(),
        container.ip_count(),
        path.display()
    );
    Ok(())
}
