//! Excel parsing and generation for bulk import/export
//!
//! The import sheet is whatever the household spreadsheet looks like, so the
//! header mapping is tolerant of case and spacing and ignores columns it
//! does not recognize. The export sheet uses the fixed Spanish column set
//! the same spreadsheet started from, so an exported file re-imports
//! cleanly.

use std::io::Cursor;

use biblio_common::models::{Book, Reviewer};
use biblio_common::{Error, Result};
use calamine::{Data, Reader, Xlsx};
use rust_xlsxwriter::Workbook;

/// One data row from the import sheet. Flag columns carry the raw cell
/// text; interpreting them is the import orchestrator's job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportRow {
    /// 1-based spreadsheet row (header is row 1, data starts at 2)
    pub row: usize,
    pub title: String,
    pub author: String,
    pub read_adaly: String,
    pub read_sebastian: String,
    pub unfinished_adaly: String,
    pub unfinished_sebastian: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Column {
    Title,
    Author,
    ReadAdaly,
    ReadSebastian,
    UnfinishedAdaly,
    UnfinishedSebastian,
}

/// Map a header cell onto a known column, case- and spacing-insensitive.
fn classify_header(header: &str) -> Option<Column> {
    let normalized = header
        .trim()
        .to_uppercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    match normalized.as_str() {
        "TITULO DEL LIBRO" | "TITULO" => Some(Column::Title),
        "AUTOR" => Some(Column::Author),
        "LEIDO POR ADALY" => Some(Column::ReadAdaly),
        "LEIDO POR SEBASTIAN" => Some(Column::ReadSebastian),
        "SIN TERMINAR POR ADALY" => Some(Column::UnfinishedAdaly),
        "SIN TERMINAR POR SEBASTIAN" => Some(Column::UnfinishedSebastian),
        _ => None,
    }
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                format!("{}", *f as i64)
            } else {
                format!("{}", f)
            }
        }
        Data::Int(i) => format!("{}", i),
        Data::Bool(b) => {
            if *b {
                "true".to_string()
            } else {
                String::new()
            }
        }
        other => other.to_string().trim().to_string(),
    }
}

/// Parse the first worksheet of an xlsx file into import rows. The first
/// row is treated as headers; rows whose mapped cells are all empty are
/// skipped.
pub fn parse_import_sheet(bytes: &[u8]) -> Result<Vec<ImportRow>> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))
        .map_err(|e| Error::InvalidInput(format!("could not read workbook: {}", e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::InvalidInput("workbook has no sheets".to_string()))?
        .map_err(|e| Error::InvalidInput(format!("could not read first sheet: {}", e)))?;

    let mut rows = range.rows();
    let Some(header_row) = rows.next() else {
        return Ok(Vec::new());
    };

    let columns: Vec<Option<Column>> = header_row
        .iter()
        .map(|cell| classify_header(&cell_text(cell)))
        .collect();

    if !columns.contains(&Some(Column::Title)) {
        return Err(Error::InvalidInput(
            "no title column found in first sheet".to_string(),
        ));
    }

    let mut parsed = Vec::new();
    for (index, row) in rows.enumerate() {
        let mut entry = ImportRow {
            row: index + 2,
            ..Default::default()
        };
        let mut any_value = false;

        for (cell, column) in row.iter().zip(columns.iter()) {
            let Some(column) = column else { continue };
            let value = cell_text(cell);
            if !value.is_empty() {
                any_value = true;
            }
            match column {
                Column::Title => entry.title = value,
                Column::Author => entry.author = value,
                Column::ReadAdaly => entry.read_adaly = value,
                Column::ReadSebastian => entry.read_sebastian = value,
                Column::UnfinishedAdaly => entry.unfinished_adaly = value,
                Column::UnfinishedSebastian => entry.unfinished_sebastian = value,
            }
        }

        if any_value {
            parsed.push(entry);
        }
    }

    Ok(parsed)
}

const EXPORT_HEADERS: [&str; 11] = [
    "TITULO DEL LIBRO",
    "AUTOR",
    "ISBN",
    "EDITORIAL",
    "PAGINAS",
    "UBICACION",
    "LEIDO POR SEBASTIAN",
    "LEIDO POR ADALY",
    "RATING SEBASTIAN",
    "RATING ADALY",
    "TIENE PORTADA",
];

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Sí"
    } else {
        "No"
    }
}

/// Write the full catalog to an xlsx buffer. Callers pass books already
/// sorted by title.
pub fn export_books(books: &[Book]) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name("Libros")
        .map_err(|e| Error::Internal(format!("workbook error: {}", e)))?;

    let write = |worksheet: &mut rust_xlsxwriter::Worksheet,
                 row: u32,
                 col: u16,
                 value: &str|
     -> Result<()> {
        worksheet
            .write_string(row, col, value)
            .map_err(|e| Error::Internal(format!("workbook error: {}", e)))?;
        Ok(())
    };

    for (col, header) in EXPORT_HEADERS.iter().enumerate() {
        write(worksheet, 0, col as u16, header)?;
    }

    for (index, book) in books.iter().enumerate() {
        let row = (index + 1) as u32;
        let sebastian = book.reading_status.entry(Reviewer::Sebastian);
        let adaly = book.reading_status.entry(Reviewer::Adaly);

        let pages = if book.page_count > 0 {
            book.page_count.to_string()
        } else {
            String::new()
        };
        let rating = |rating: i64| {
            if rating > 0 {
                rating.to_string()
            } else {
                String::new()
            }
        };

        write(worksheet, row, 0, &book.title)?;
        write(worksheet, row, 1, &book.author)?;
        write(worksheet, row, 2, &book.isbn)?;
        write(worksheet, row, 3, &book.publisher)?;
        write(worksheet, row, 4, &pages)?;
        write(worksheet, row, 5, book.location.as_str())?;
        write(worksheet, row, 6, yes_no(sebastian.read))?;
        write(worksheet, row, 7, yes_no(adaly.read))?;
        write(worksheet, row, 8, &rating(sebastian.rating))?;
        write(worksheet, row, 9, &rating(adaly.rating))?;
        write(worksheet, row, 10, yes_no(!book.cover_image.is_empty()))?;
    }

    workbook
        .save_to_buffer()
        .map_err(|e| Error::Internal(format!("workbook error: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::books::tests::sample_book;

    fn sheet(rows: &[&[&str]]) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                worksheet.write_string(r as u32, c as u16, *value).unwrap();
            }
        }
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn parses_rows_with_canonical_headers() {
        let bytes = sheet(&[
            &[
                "TITULO DEL LIBRO",
                "AUTOR",
                "LEIDO POR SEBASTIAN",
                "LEIDO POR ADALY",
            ],
            &["El túnel", "Ernesto Sabato", "Sí", ""],
        ]);

        let rows = parse_import_sheet(&bytes).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].row, 2);
        assert_eq!(rows[0].title, "El túnel");
        assert_eq!(rows[0].author, "Ernesto Sabato");
        assert_eq!(rows[0].read_sebastian, "Sí");
        assert_eq!(rows[0].read_adaly, "");
    }

    #[test]
    fn header_matching_is_case_and_spacing_insensitive() {
        let bytes = sheet(&[
            &["titulo", "autor", "Sin  terminar por Adaly", "IGNORADA"],
            &["Rayuela", "Julio Cortázar", "x", "dato suelto"],
        ]);

        let rows = parse_import_sheet(&bytes).unwrap();
        assert_eq!(rows[0].title, "Rayuela");
        assert_eq!(rows[0].unfinished_adaly, "x");
    }

    #[test]
    fn skips_fully_empty_rows_but_keeps_row_numbers() {
        let bytes = sheet(&[
            &["TITULO", "AUTOR"],
            &["", ""],
            &["Ficciones", "Jorge Luis Borges"],
        ]);

        let rows = parse_import_sheet(&bytes).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].row, 3);
        assert_eq!(rows[0].title, "Ficciones");
    }

    #[test]
    fn missing_title_column_is_rejected() {
        let bytes = sheet(&[&["AUTOR"], &["Alguien"]]);
        assert!(matches!(
            parse_import_sheet(&bytes),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn export_then_parse_round_trips_titles_and_flags() {
        let mut book = sample_book("9789561234567", "El túnel", "Ernesto Sabato");
        book.page_count = 158;
        book.reading_status.entry_mut(Reviewer::Adaly).read = true;
        book.reading_status.entry_mut(Reviewer::Adaly).rating = 9;

        let bytes = export_books(&[book]).unwrap();
        let rows = parse_import_sheet(&bytes).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].title, "El túnel");
        assert_eq!(rows[0].author, "Ernesto Sabato");
        assert_eq!(rows[0].read_adaly, "Sí");
        assert_eq!(rows[0].read_sebastian, "No");
    }
}
