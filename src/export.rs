//! CSV export of a document's page embeddings.
//!
//! One row per page: the page number followed by every vector component,
//! under a `page,dim_0,...,dim_{n-1}` header.

use std::io::Write;

use crate::semantic::DocumentEntry;

pub fn write_csv<W: Write>(entry: &DocumentEntry, writer: W) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);

    let dimensions = entry.vectors().first().map(Vec::len).unwrap_or(0);
    let mut header = Vec::with_capacity(dimensions + 1);
    header.push("page".to_string());
    header.extend((0..dimensions).map(|i| format!("dim_{i}")));
    wtr.write_record(&header)?;

    for (page, vector) in entry.pages().iter().zip(entry.vectors()) {
        let mut record = Vec::with_capacity(vector.len() + 1);
        record.push(page.page.to_string());
        record.extend(vector.iter().map(|v| v.to_string()));
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}
