use crate::error::{CrawlError, CrawlResult};
use crate::models::ListingRecord;
use rust_xlsxwriter::{Format, Workbook};

pub const COLUMNS: [&str; 4] = ["Date of Extraction", "URL", "First Number", "Second Number"];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn xlsx_err(what: &str) -> impl Fn(rust_xlsxwriter::XlsxError) -> CrawlError + '_ {
    move |e| CrawlError::Export(format!("Failed to write {what}: {e}"))
}

/// Serialize records into an xlsx workbook, one row per record in order
pub fn to_xlsx(records: &[ListingRecord]) -> CrawlResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    let header = Format::new().set_bold();

    for (col, name) in COLUMNS.iter().enumerate() {
        worksheet
            .write_string_with_format(0, col as u16, *name, &header)
            .map_err(xlsx_err("header"))?;
    }
    worksheet.set_column_width(0, 20).map_err(xlsx_err("column width"))?;
    worksheet.set_column_width(1, 80).map_err(xlsx_err("column width"))?;

    for (i, record) in records.iter().enumerate() {
        let r = (i + 1) as u32;

        let date = record.extraction_timestamp.format(TIMESTAMP_FORMAT).to_string();
        worksheet.write_string(r, 0, &date).map_err(xlsx_err("date"))?;

        worksheet
            .write_string(r, 1, record.url.as_str())
            .map_err(xlsx_err("url"))?;

        // Absent readings stay as blank cells
        if let Some(available) = record.available {
            worksheet.write_number(r, 2, available).map_err(xlsx_err("first number"))?;
        }
        if let Some(total) = record.total {
            worksheet.write_number(r, 3, total).map_err(xlsx_err("second number"))?;
        }
    }

    workbook.save_to_buffer().map_err(xlsx_err("workbook"))
}

/// Pretty JSON dump of the records
pub fn to_json(records: &[ListingRecord]) -> CrawlResult<String> {
    serde_json::to_string_pretty(records).map_err(|e| CrawlError::Export(format!("Failed to serialize records: {e}")))
}
