//! Parser for a selection's form page.
//!
//! The page carries one `table.form-table` with a row per run:
//! date, course, distance, going, position, price.

use chrono::NaiveDate;
use regex::Regex;
use scraper::{Html, Selector};
use serde::Serialize;

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d/%m/%Y", "%d %b %Y"];

/// One published run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaceResult {
    pub race_date: NaiveDate,
    pub course: String,
    pub distance: String,
    pub going: String,
    pub position: String,
    pub price: Option<String>,
}

/// Parser for form pages
pub struct FormPageParser;

impl FormPageParser {
    /// Every parseable row of the form table, in page order
    pub fn parse(html: &str) -> Vec<RaceResult> {
        let document = Html::parse_document(html);
        let (Ok(row_selector), Ok(cell_selector)) =
            (Selector::parse("table.form-table tr"), Selector::parse("td"))
        else {
            return Vec::new();
        };

        let position_re = Regex::new(r"^(\d+)\s*(?:st|nd|rd|th)?\s*/\s*(\d+)$").ok();

        document
            .select(&row_selector)
            .filter_map(|row| {
                let cells: Vec<String> = row
                    .select(&cell_selector)
                    .map(|c| c.text().collect::<String>().trim().to_string())
                    .collect();
                if cells.len() < 6 {
                    return None;
                }

                let race_date = parse_date(&cells[0])?;
                let position = normalise_position(&cells[4], position_re.as_ref());
                if position.is_empty() {
                    return None;
                }

                Some(RaceResult {
                    race_date,
                    course: cells[1].clone(),
                    distance: cells[2].clone(),
                    going: cells[3].clone(),
                    position,
                    price: Some(cells[5].clone()).filter(|p| !p.is_empty() && p != "-"),
                })
            })
            .collect()
    }

    /// The run on `date`, if the page has published it
    pub fn find(html: &str, date: NaiveDate) -> Option<RaceResult> {
        Self::parse(html).into_iter().find(|r| r.race_date == date)
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// "1st / 9" -> "1/9"; non-finish codes are upper-cased
fn normalise_position(raw: &str, re: Option<&Regex>) -> String {
    if let Some(caps) = re.and_then(|re| re.captures(raw)) {
        return format!("{}/{}", &caps[1], &caps[2]);
    }
    raw.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
        <table class="form-table">
          <tr><th>Date</th><th>Course</th><th>Dist</th><th>Going</th><th>Pos</th><th>SP</th></tr>
          <tr><td>2024-06-01</td><td>Epsom</td><td>1m 2f</td><td>Good</td><td>1st / 9</td><td>9/4F</td></tr>
          <tr><td>12/05/2024</td><td>Newbury</td><td>1m 2f</td><td>Soft</td><td>pu</td><td>-</td></tr>
          <tr><td>not a date</td><td>Ascot</td><td>1m</td><td>Good</td><td>2/7</td><td>3/1</td></tr>
          <tr><td>2024-04-01</td><td>Ascot</td></tr>
        </table>
        </body></html>
    "#;

    #[test]
    fn test_parse_rows() {
        let rows = FormPageParser::parse(PAGE);
        assert_eq!(rows.len(), 2);

        assert_eq!(rows[0].race_date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert_eq!(rows[0].course, "Epsom");
        assert_eq!(rows[0].position, "1/9");
        assert_eq!(rows[0].price.as_deref(), Some("9/4F"));

        assert_eq!(rows[1].race_date, NaiveDate::from_ymd_opt(2024, 5, 12).unwrap());
        assert_eq!(rows[1].position, "PU");
        assert_eq!(rows[1].price, None);
    }

    #[test]
    fn test_find_by_date() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(FormPageParser::find(PAGE, date).unwrap().going, "Good");

        let unpublished = NaiveDate::from_ymd_opt(2024, 6, 8).unwrap();
        assert!(FormPageParser::find(PAGE, unpublished).is_none());
    }

    #[test]
    fn test_page_without_table() {
        assert!(FormPageParser::parse("<html><body><p>No runs</p></body></html>").is_empty());
    }
}
