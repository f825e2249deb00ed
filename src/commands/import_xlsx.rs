use anyhow::{bail, Context, Result};
use calamine::{open_workbook_auto, DataType, Range, Reader};
use log::warn;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use url::Url;

use crate::commands::route::db;
use crate::commands::route::models::{Market, Position, Section};
use crate::commands::route::store::save_market;

const MARKETS_SHEET: &str = "markets";
const SECTIONS_SHEET: &str = "sections";

pub fn cmd_import_xlsx(xlsx: &str, db_path: &Path, dry_run: bool) -> Result<()> {
    // Obtain local XLSX path, downloading if Google Sheets URL.
    let (xlsx_path, cleanup_temp): (PathBuf, bool) = if is_google_sheets_url(xlsx) {
        println!("Downloading Google Sheet as .xlsx ...");
        (download_google_sheet_as_xlsx(xlsx)?, true)
    } else {
        let p = PathBuf::from(xlsx);
        if !p.exists() {
            bail!("XLSX file not found: {}", p.display());
        }
        (p, false)
    };

    let result = import_workbook(&xlsx_path, db_path, dry_run);
    if cleanup_temp {
        let _ = fs::remove_file(&xlsx_path);
    }
    result
}

fn import_workbook(xlsx_path: &Path, db_path: &Path, dry_run: bool) -> Result<()> {
    let mut wb = open_workbook_auto(xlsx_path)
        .with_context(|| format!("Open workbook {}", xlsx_path.display()))?;

    let markets_range = sheet_range(&mut wb, MARKETS_SHEET)?;
    let sections_range = sheet_range(&mut wb, SECTIONS_SHEET)?;
    let mut markets = read_markets(&markets_range)?;
    println!("Worksheet '{}': {} market(s)", MARKETS_SHEET, markets.len());
    let sections = read_sections(&sections_range)?;
    println!("Worksheet '{}': {} section(s)", SECTIONS_SHEET, sections.len());
    attach_sections(&mut markets, sections)?;

    let mut conn = db::open_store_rw(db_path)?;
    let tx = conn.transaction()?;
    for m in &markets {
        save_market(&tx, m)?;
    }
    if dry_run {
        println!("Dry-run complete. Markets that would be imported: {}", markets.len());
        // Drop transaction without commit -> rollback
    } else {
        tx.commit()?;
        println!("Import complete. Markets imported: {}", markets.len());
    }
    Ok(())
}

fn sheet_range<RS>(wb: &mut calamine::Sheets<RS>, wanted: &str) -> Result<Range<DataType>>
where
    RS: std::io::Read + std::io::Seek,
{
    let Some(name) = wb.sheet_names().iter().find(|n| n.eq_ignore_ascii_case(wanted)).cloned() else {
        bail!("Worksheet '{}' not found", wanted);
    };
    match wb.worksheet_range(&name) {
        Some(Ok(range)) => Ok(range),
        Some(Err(e)) => Err(e).with_context(|| format!("Read worksheet '{}'", name)),
        None => bail!("Worksheet '{}' not found", name),
    }
}

fn normalize_header(h: &DataType) -> Option<String> {
    let s = match h {
        DataType::Empty => return None,
        DataType::String(s) => s.trim().to_lowercase(),
        other => other.to_string().trim().to_lowercase(),
    };
    if s.is_empty() { None } else { Some(s) }
}

fn cell_text(raw: &DataType) -> Option<String> {
    match raw {
        DataType::Empty => None,
        DataType::Float(f) if f.fract() == 0.0 => Some((*f as i64).to_string()),
        other => {
            let s = other.to_string();
            let s = s.trim();
            if s.is_empty() { None } else { Some(s.to_string()) }
        }
    }
}

fn cell_i64(raw: &DataType) -> Option<i64> {
    match raw {
        DataType::Int(i) => Some(*i),
        DataType::Float(f) => Some(f.round() as i64),
        DataType::String(s) => {
            let v = s.trim();
            v.parse::<i64>().ok().or_else(|| v.parse::<f64>().ok().map(|f| f.round() as i64))
        }
        _ => None,
    }
}

fn cell_f64(raw: &DataType) -> Option<f64> {
    match raw {
        DataType::Int(i) => Some(*i as f64),
        DataType::Float(f) => Some(*f),
        DataType::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn split_list(raw: Option<&DataType>) -> Vec<String> {
    raw.and_then(cell_text)
        .map(|s| s.split(',').map(str::trim).filter(|p| !p.is_empty()).map(String::from).collect())
        .unwrap_or_default()
}

/// Header row -> (lowercased header -> column index), then the data rows that are not blank.
fn sheet_rows(range: &Range<DataType>) -> (HashMap<String, usize>, Vec<&[DataType]>) {
    let mut rows_iter = range.rows();
    let Some(headers_row) = rows_iter.next() else {
        return (HashMap::new(), Vec::new());
    };
    let headers = headers_row
        .iter()
        .enumerate()
        .filter_map(|(i, h)| normalize_header(h).map(|h| (h, i)))
        .collect();
    let rows = rows_iter
        .filter(|r| r.iter().any(|c| !matches!(c, DataType::Empty)))
        .collect();
    (headers, rows)
}

fn column(headers: &HashMap<String, usize>, sheet: &str, name: &str) -> Result<usize> {
    headers
        .get(name)
        .copied()
        .with_context(|| format!("Worksheet '{}' is missing column '{}'", sheet, name))
}

fn read_markets(range: &Range<DataType>) -> Result<Vec<Market>> {
    let (headers, rows) = sheet_rows(range);
    let id_col = column(&headers, MARKETS_SHEET, "id")?;
    let name_col = column(&headers, MARKETS_SHEET, "name")?;
    let distance_col = headers.get("distance").copied();

    let mut out = Vec::with_capacity(rows.len());
    for (i, row) in rows.into_iter().enumerate() {
        let line = i + 2;
        let Some(id) = row.get(id_col).and_then(cell_i64) else {
            bail!("{} row {}: invalid id", MARKETS_SHEET, line);
        };
        let Some(name) = row.get(name_col).and_then(cell_text) else {
            bail!("{} row {}: missing name", MARKETS_SHEET, line);
        };
        let distance = distance_col.and_then(|c| row.get(c)).and_then(cell_f64).unwrap_or(0.0);
        out.push(Market { id, name, distance, sections: Vec::new() });
    }
    Ok(out)
}

fn read_sections(range: &Range<DataType>) -> Result<Vec<(i64, Section)>> {
    let (headers, rows) = sheet_rows(range);
    let market_col = column(&headers, SECTIONS_SHEET, "market_id")?;
    let id_col = column(&headers, SECTIONS_SHEET, "id")?;
    let name_col = column(&headers, SECTIONS_SHEET, "name")?;
    let x_col = column(&headers, SECTIONS_SHEET, "x")?;
    let y_col = column(&headers, SECTIONS_SHEET, "y")?;
    let categories_col = column(&headers, SECTIONS_SHEET, "categories")?;
    let neighbors_col = headers.get("neighbors").copied();

    let mut out = Vec::with_capacity(rows.len());
    for (i, row) in rows.into_iter().enumerate() {
        let line = i + 2;
        let market_id = row
            .get(market_col)
            .and_then(cell_i64)
            .with_context(|| format!("{} row {}: invalid market_id", SECTIONS_SHEET, line))?;
        let id = row
            .get(id_col)
            .and_then(cell_text)
            .with_context(|| format!("{} row {}: missing id", SECTIONS_SHEET, line))?;
        let name = row.get(name_col).and_then(cell_text).unwrap_or_else(|| id.clone());
        let (Some(x), Some(y)) = (row.get(x_col).and_then(cell_i64), row.get(y_col).and_then(cell_i64)) else {
            bail!("{} row {}: invalid position for section {}", SECTIONS_SHEET, line, id);
        };
        let (Ok(x), Ok(y)) = (i32::try_from(x), i32::try_from(y)) else {
            bail!("{} row {}: position ({}, {}) of section {} is out of range", SECTIONS_SHEET, line, x, y, id);
        };
        let categories = split_list(row.get(categories_col));
        if categories.is_empty() {
            warn!("import: section {} of market {} has no categories", id, market_id);
        }
        let neighbors = split_list(neighbors_col.and_then(|c| row.get(c)));
        out.push((
            market_id,
            Section { id, name, categories, position: Position::new(x, y), neighbors },
        ));
    }
    Ok(out)
}

/// Append each section to its market, keeping sheet order.
fn attach_sections(markets: &mut [Market], sections: Vec<(i64, Section)>) -> Result<()> {
    let index: BTreeMap<i64, usize> = markets.iter().enumerate().map(|(i, m)| (m.id, i)).collect();
    for (market_id, section) in sections {
        let Some(&i) = index.get(&market_id) else {
            bail!("Section {} references unknown market {}", section.id, market_id);
        };
        if markets[i].section(&section.id).is_some() {
            bail!("Duplicate section {} in market {}", section.id, market_id);
        }
        markets[i].sections.push(section);
    }
    Ok(())
}

fn is_google_sheets_url(s: &str) -> bool {
    match Url::parse(s) {
        Ok(url) => {
            (url.scheme() == "http" || url.scheme() == "https")
                && url.domain().map(|d| d.contains("docs.google.com")).unwrap_or(false)
                && url.path().contains("/spreadsheets/")
        }
        Err(_) => false,
    }
}

fn build_gsheet_export_url(doc_url: &str) -> Result<String> {
    let url = Url::parse(doc_url)?;
    // Typical path: /spreadsheets/d/<sheet_id>/edit
    let parts: Vec<&str> = url.path().split('/').filter(|s| !s.is_empty()).collect();
    let Some(sheet_id) = parts.windows(2).find(|w| w[0] == "d").map(|w| w[1]) else {
        bail!("Unable to parse Google Sheets ID from URL");
    };
    Ok(format!("https://docs.google.com/spreadsheets/d/{}/export?format=xlsx", sheet_id))
}

fn download_google_sheet_as_xlsx(doc_url: &str) -> Result<PathBuf> {
    let export = build_gsheet_export_url(doc_url)?;
    let resp = reqwest::blocking::get(&export).with_context(|| format!("Download {}", export))?;
    if !resp.status().is_success() {
        bail!("Failed to download Google Sheet: HTTP {}", resp.status());
    }
    let bytes = resp.bytes()?;
    // Workbook format is picked from the file extension
    let mut tmp = tempfile::Builder::new().prefix("markets-").suffix(".xlsx").tempfile()?;
    tmp.as_file_mut().write_all(&bytes)?;
    let (_file, path) = tmp.keep()?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(cells: &[&[DataType]]) -> Range<DataType> {
        let rows = cells.len() as u32;
        let cols = cells.iter().map(|r| r.len()).max().unwrap_or(1) as u32;
        let mut range = Range::new((0, 0), (rows - 1, cols - 1));
        for (r, row) in cells.iter().enumerate() {
            for (c, v) in row.iter().enumerate() {
                range.set_value((r as u32, c as u32), v.clone());
            }
        }
        range
    }

    fn s(v: &str) -> DataType {
        DataType::String(v.to_string())
    }

    #[test]
    fn reads_markets_and_sections() -> Result<()> {
        let markets = sheet(&[
            &[s("ID"), s("Name"), s("Distance")],
            &[DataType::Float(1.0), s("Centro"), DataType::Float(2.5)],
            &[DataType::Empty, DataType::Empty, DataType::Empty],
            &[DataType::Int(2), s("Bairro"), DataType::Empty],
        ]);
        let sections = sheet(&[
            &[s("market_id"), s("id"), s("name"), s("x"), s("y"), s("categories"), s("neighbors")],
            &[DataType::Int(1), s("A1"), s("Laticínios"), DataType::Float(0.0), DataType::Float(0.0), s("leite, queijo ,"), s("B1")],
            &[DataType::Int(1), s("B1"), s("Padaria"), s("1"), s("0"), s("pão"), DataType::Empty],
        ]);
        let mut got = read_markets(&markets)?;
        attach_sections(&mut got, read_sections(&sections)?)?;

        assert_eq!(got.len(), 2);
        assert_eq!(got[0].distance, 2.5);
        assert_eq!(got[1].distance, 0.0);
        let a1 = got[0].section("A1").unwrap();
        assert_eq!(a1.categories, vec!["leite".to_string(), "queijo".to_string()]);
        assert_eq!(a1.neighbors, vec!["B1".to_string()]);
        assert_eq!(got[0].sections[1].position, Position::new(1, 0));
        assert!(got[1].sections.is_empty());
        Ok(())
    }

    #[test]
    fn unknown_market_and_duplicates_are_rejected() {
        let mut markets = vec![Market { id: 1, name: "m".into(), distance: 0.0, sections: vec![] }];
        let sec = |id: &str| Section {
            id: id.into(),
            name: id.into(),
            categories: vec!["x".into()],
            position: Position::new(0, 0),
            neighbors: vec![],
        };
        assert!(attach_sections(&mut markets, vec![(2, sec("A"))]).is_err());
        assert!(attach_sections(&mut markets, vec![(1, sec("A")), (1, sec("A"))]).is_err());
    }

    #[test]
    fn out_of_range_position_is_rejected() {
        let header = [s("market_id"), s("id"), s("name"), s("x"), s("y"), s("categories")];
        let huge = sheet(&[
            &header,
            &[DataType::Int(1), s("A1"), s("a"), DataType::Int(0), DataType::Int(0), s("x")],
            &[DataType::Int(1), s("B1"), s("b"), DataType::Float(1e12), DataType::Int(0), s("x")],
        ]);
        let err = read_sections(&huge).unwrap_err().to_string();
        assert!(err.contains("row 3"), "{err}");

        let negative = sheet(&[&header, &[DataType::Int(1), s("C1"), s("c"), DataType::Int(0), s("-3000000000"), s("x")]]);
        assert!(read_sections(&negative).is_err());
    }

    #[test]
    fn missing_column_is_an_error() {
        let markets = sheet(&[&[s("id")], &[DataType::Int(1)]]);
        assert!(read_markets(&markets).is_err());
    }

    #[test]
    fn google_sheet_urls() -> Result<()> {
        let url = "https://docs.google.com/spreadsheets/d/abc123/edit#gid=0";
        assert!(is_google_sheets_url(url));
        assert!(!is_google_sheets_url("layout.xlsx"));
        assert_eq!(
            build_gsheet_export_url(url)?,
            "https://docs.google.com/spreadsheets/d/abc123/export?format=xlsx"
        );
        Ok(())
    }
}
