//! Downloadable PDF documents of the holiday table and month grids.

use crate::cache::Entries;
use crate::calendar::{days_of_month, iso_key, month_name, weekday_name};
use crate::holidays::HolidayTable;
use crate::{Result, YEAR};
use chrono::Datelike;
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference,
    Rgb,
};

const TITLE_SIZE: f32 = 20.0;
const SUBTITLE_SIZE: f32 = 12.0;
const TEXT_SIZE: f32 = 10.0;
const MARGIN: f32 = 14.0;
const ROW_HEIGHT: f32 = 7.0;

/// A4 in millimetres.
const A4_SHORT: f32 = 210.0;
const A4_LONG: f32 = 297.0;

/// A generated document and the name it should be downloaded as.
#[derive(Debug, Clone)]
pub struct Document {
    pub filename: String,
    pub bytes: Vec<u8>,
}

fn austrian_red() -> Color {
    Color::Rgb(Rgb::new(191.0 / 255.0, 33.0 / 255.0, 47.0 / 255.0, None))
}

fn black() -> Color {
    Color::Rgb(Rgb::new(0.0, 0.0, 0.0, None))
}

/// Replaces umlauts so the filename stays ASCII, e.g. `März` becomes `Maerz`.
fn ascii_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'ä' => "ae".to_owned(),
            'ö' => "oe".to_owned(),
            'ü' => "ue".to_owned(),
            'Ä' => "Ae".to_owned(),
            'Ö' => "Oe".to_owned(),
            'Ü' => "Ue".to_owned(),
            'ß' => "ss".to_owned(),
            c if c.is_ascii_alphanumeric() || c == '_' || c == '.' => c.to_string(),
            _ => "_".to_owned(),
        })
        .collect()
}

/// Writes a table with a coloured header row, starting new pages as rows overflow.
struct TableWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    width: f32,
    height: f32,
    columns: Vec<(&'static str, f32)>,
    y: f32,
    pages: usize,
}

impl TableWriter {
    fn new(title: &str, width: f32, height: f32) -> Result<TableWriter> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(width), Mm(height), "Seite 1");
        let regular = doc.add_builtin_font(BuiltinFont::Helvetica)?;
        let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold)?;
        let layer = doc.get_page(page).get_layer(layer);

        Ok(TableWriter {
            doc,
            layer,
            regular,
            bold,
            width,
            height,
            columns: Vec::new(),
            y: height - MARGIN,
            pages: 1,
        })
    }

    fn text(&mut self, text: &str, size: f32, bold: bool) {
        self.y -= size * 0.5;
        let font = if bold { &self.bold } else { &self.regular };
        self.layer.use_text(text, size, Mm(MARGIN), Mm(self.y), font);
        self.y -= size * 0.2;
    }

    /// Starts the table. Columns are given as header and relative width.
    fn header(&mut self, columns: &[(&'static str, f32)]) {
        self.columns = columns.to_vec();
        self.y -= ROW_HEIGHT * 0.5;
        self.header_row();
    }

    fn header_row(&mut self) {
        let headers: Vec<&str> = self.columns.iter().map(|(header, _)| *header).collect();
        self.layer.set_fill_color(austrian_red());
        self.cells(&headers, true);
        self.layer.set_fill_color(black());
    }

    fn row(&mut self, cells: &[&str]) {
        if self.y - ROW_HEIGHT < MARGIN {
            self.new_page();
            self.header_row();
        }
        self.cells(cells, false);
    }

    fn cells(&mut self, cells: &[&str], bold: bool) {
        self.y -= ROW_HEIGHT;
        let usable = self.width - 2.0 * MARGIN;
        let total: f32 = self.columns.iter().map(|(_, share)| share).sum();
        let font = if bold { &self.bold } else { &self.regular };

        let mut x = MARGIN;
        for ((_, share), cell) in self.columns.iter().zip(cells) {
            self.layer.use_text(*cell, TEXT_SIZE, Mm(x), Mm(self.y), font);
            x += usable * share / total;
        }
    }

    fn new_page(&mut self) {
        self.pages += 1;
        let (page, layer) = self.doc.add_page(
            Mm(self.width),
            Mm(self.height),
            format!("Seite {}", self.pages),
        );
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = self.height - MARGIN;
    }

    fn finish(self, filename: String) -> Result<Document> {
        log::debug!("rendered {filename} with {} page(s)", self.pages);
        Ok(Document {
            filename,
            bytes: self.doc.save_to_bytes()?,
        })
    }
}

/// Landscape overview of all holidays of the year.
pub fn year_summary(holidays: &HolidayTable) -> Result<Document> {
    let mut table = TableWriter::new(
        &format!("Kalender {YEAR} - Österreich"),
        A4_LONG,
        A4_SHORT,
    )?;

    table.text(&format!("Kalender {YEAR} - Österreich"), TITLE_SIZE + 2.0, true);
    table.text(
        &format!("Gesetzliche Feiertage in Österreich {YEAR}"),
        SUBTITLE_SIZE,
        false,
    );
    table.header(&[("Datum", 1.0), ("Feiertag", 4.0)]);

    for holiday in holidays.iter() {
        let date = holiday.date.format("%d.%m.%Y").to_string();
        table.row(&[&date, &holiday.name]);
    }

    table.finish(format!("Kalender_{YEAR}_Oesterreich.pdf"))
}

/// One row per day of `month` (1-12) with weekday and annotation, preceded by a summary line of
/// the month's holidays. With `records`, cached name days are added to the annotation.
pub fn month_grid(
    month: u32,
    holidays: &HolidayTable,
    records: Option<&Entries>,
) -> Result<Document> {
    let name = month_name(month)?;
    let mut table = TableWriter::new(&format!("{name} {YEAR}"), A4_SHORT, A4_LONG)?;

    table.text(&format!("{name} {YEAR}"), TITLE_SIZE, true);

    let summary = holidays
        .in_month(month)
        .iter()
        .map(|holiday| format!("{}: {}", holiday.date.format("%d.%m."), holiday.name))
        .collect::<Vec<_>>()
        .join(" | ");
    table.text(&summary, TEXT_SIZE, false);

    table.header(&[("Tag", 1.0), ("Wochentag", 2.0), ("Anmerkung/Feiertag", 7.0)]);

    for date in days_of_month(YEAR, month)? {
        let holiday = holidays.holiday_for(date).map(|holiday| holiday.name.as_str());
        let namenstag = records
            .and_then(|records| records.get(&iso_key(date)))
            .map(|record| record.namenstag.as_str());

        let annotation = match (holiday, namenstag) {
            (Some(holiday), Some(namenstag)) => format!("{holiday} - Namenstag: {namenstag}"),
            (Some(holiday), None) => holiday.to_owned(),
            (None, Some(namenstag)) => format!("Namenstag: {namenstag}"),
            (None, None) => String::new(),
        };

        table.row(&[&date.day().to_string(), weekday_name(date), &annotation]);
    }

    table.finish(ascii_filename(&format!("Kalender_{YEAR}_{name}.pdf")))
}
