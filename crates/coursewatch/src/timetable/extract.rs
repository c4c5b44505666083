//! HTML extraction for timetable search results.
//!
//! The results table carries no stable field names, only column order, so
//! extraction is strictly positional. The full layout lives in one schema
//! struct consumed by one mapping function; a change to the upstream column
//! order touches exactly that place.

use super::types::{CourseOffering, SeatCount};
use scraper::{Html, Selector};
use std::sync::LazyLock;

static ROW_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table tr").unwrap());
static CELL_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());

/// Banner text marking the row that precedes course data. Everything above
/// it is page chrome and search-summary text.
const BANNER_TEXT: &str = "Periods:";

/// Positional layout of the results table.
///
/// Column 6 is the course-description link and is not captured.
struct ColumnLayout {
    term: usize,
    crn: usize,
    subject: usize,
    number: usize,
    section: usize,
    title: usize,
    crosslist: usize,
    period_code: usize,
    period: usize,
    room: usize,
    building: usize,
    instructor: usize,
    world_culture: usize,
    distrib: usize,
    lang_req: usize,
    limit: usize,
    enrolled: usize,
    status: usize,
}

const COLUMNS: ColumnLayout = ColumnLayout {
    term: 0,
    crn: 1,
    subject: 2,
    number: 3,
    section: 4,
    title: 5,
    crosslist: 7,
    period_code: 8,
    period: 9,
    room: 10,
    building: 11,
    instructor: 12,
    world_culture: 13,
    distrib: 14,
    lang_req: 15,
    limit: 16,
    enrolled: 17,
    status: 18,
};

/// Extracts course offerings from a rendered results page.
///
/// Rows preceding the banner row are skipped entirely; a document without the
/// banner yields no offerings. Rows lacking a CRN and title are separators and
/// are discarded. Output order matches row order.
pub fn extract_offerings(html: &str) -> Vec<CourseOffering> {
    let document = Html::parse_document(html);
    let mut offerings = Vec::new();
    let mut past_banner = false;

    for row in document.select(&ROW_SELECTOR) {
        if !past_banner {
            let text: String = row.text().collect();
            if text.contains(BANNER_TEXT) {
                past_banner = true;
            }
            continue;
        }

        let cells: Vec<String> = row
            .select(&CELL_SELECTOR)
            .map(|cell| cell.text().collect::<String>().trim().to_string())
            .collect();

        if let Some(offering) = offering_from_cells(&cells) {
            offerings.push(offering);
        }
    }

    offerings
}

/// Maps one row's cells onto a `CourseOffering` using the positional layout.
///
/// Returns `None` for separator rows (no CRN or no title). Seat counts parse
/// leniently; a malformed count becomes `Unknown` and never discards the row.
fn offering_from_cells(cells: &[String]) -> Option<CourseOffering> {
    let crn = column(cells, COLUMNS.crn);
    let title = column(cells, COLUMNS.title);
    if crn.is_empty() || title.is_empty() {
        return None;
    }

    Some(CourseOffering {
        term: column(cells, COLUMNS.term).to_string(),
        crn: crn.to_string(),
        subject: column(cells, COLUMNS.subject).to_string(),
        number: column(cells, COLUMNS.number).to_string(),
        section: column(cells, COLUMNS.section).to_string(),
        title: title.to_string(),
        crosslist: column(cells, COLUMNS.crosslist).to_string(),
        period_code: column(cells, COLUMNS.period_code).to_string(),
        period: column(cells, COLUMNS.period).to_string(),
        room: column(cells, COLUMNS.room).to_string(),
        building: column(cells, COLUMNS.building).to_string(),
        instructor: column(cells, COLUMNS.instructor).to_string(),
        world_culture: column(cells, COLUMNS.world_culture).to_string(),
        distrib: column(cells, COLUMNS.distrib).to_string(),
        lang_req: column(cells, COLUMNS.lang_req).to_string(),
        limit: SeatCount::parse(column(cells, COLUMNS.limit)),
        enrolled: SeatCount::parse(column(cells, COLUMNS.enrolled)),
        status: column(cells, COLUMNS.status).to_string(),
    })
}

fn column(cells: &[String], index: usize) -> &str {
    cells.get(index).map(String::as_str).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_row(cells: &[&str]) -> String {
        let tds: String = cells.iter().map(|c| format!("<td>{c}</td>")).collect();
        format!("<tr>{tds}</tr>")
    }

    fn course_row(
        crn: &str,
        subject: &str,
        number: &str,
        title: &str,
        limit: &str,
        enrolled: &str,
    ) -> String {
        data_row(&[
            "202409", crn, subject, number, "01", title, "desc", "", "2A",
            "2:25-4:15 TTh", "008", "Kemeny", "Smith", "", "TLA", "", limit, enrolled, "IP",
        ])
    }

    fn page(rows: &[String]) -> String {
        format!(
            "<html><body>\
             <p>Timetable of Class Meetings</p>\
             <table><tbody>\
             <tr><td colspan=\"19\">Terms: 202409; Periods: All; Sort: Course</td></tr>\
             {}\
             </tbody></table></body></html>",
            rows.join("")
        )
    }

    #[test]
    fn test_banner_then_data_rows() {
        // One banner row, then full, open, and unknown-enrollment rows.
        let html = page(&[
            course_row("90001", "COSC", "001", "Intro CS", "10", "10"),
            course_row("90002", "COSC", "010", "Problem Solving", "10", "8"),
            course_row("90003", "MATH", "003", "Calculus", "10", "\u{2014}"),
        ]);

        let offerings = extract_offerings(&html);
        assert_eq!(offerings.len(), 3);

        assert!(!offerings[0].has_open_seat());
        assert!(offerings[1].has_open_seat());
        assert_eq!(offerings[2].enrolled, SeatCount::Unknown);
        assert!(!offerings[2].has_open_seat());
    }

    #[test]
    fn test_rows_before_banner_are_skipped() {
        let html = format!(
            "<html><body><table><tbody>\
             <tr><td>navigation</td><td>junk</td></tr>\
             {}\
             <tr><td colspan=\"19\">Terms: 202409; Periods: All</td></tr>\
             {}\
             </tbody></table></body></html>",
            course_row("89999", "ANTH", "001", "Before The Banner", "10", "5"),
            course_row("90001", "COSC", "001", "Intro CS", "10", "5"),
        );

        let offerings = extract_offerings(&html);
        assert_eq!(offerings.len(), 1);
        assert_eq!(offerings[0].crn, "90001");
    }

    #[test]
    fn test_separator_rows_are_discarded() {
        let html = page(&[
            data_row(&["", "", "", "", "", "", "", "", "", "", "", "", "", "", "", "", "", "", ""]),
            course_row("90001", "COSC", "001", "Intro CS", "10", "5"),
            // CRN present but no title, a spacer row in the wild.
            data_row(&["202409", "90002", "COSC", "002", "01", "", "", "", "", "", "", "", "", "", "", "", "10", "5", ""]),
        ]);

        let offerings = extract_offerings(&html);
        assert_eq!(offerings.len(), 1);
        assert_eq!(offerings[0].crn, "90001");
    }

    #[test]
    fn test_no_banner_yields_nothing() {
        let html = format!(
            "<html><body><table><tbody>{}</tbody></table></body></html>",
            course_row("90001", "COSC", "001", "Intro CS", "10", "5"),
        );
        assert!(extract_offerings(&html).is_empty());
    }

    #[test]
    fn test_extraction_is_idempotent() {
        let html = page(&[
            course_row("90001", "COSC", "001", "Intro CS", "10", "10"),
            course_row("90002", "COSC", "010", "Problem Solving", "10", "8"),
        ]);

        let first = extract_offerings(&html);
        let second = extract_offerings(&html);
        assert_eq!(first, second);
    }

    #[test]
    fn test_column_indices_are_pinned() {
        // Every cell distinct, so a silent column shuffle fails loudly here.
        let html = page(&[data_row(&[
            "term-v", "crn-v", "subj-v", "num-v", "sec-v", "title-v", "text-v",
            "xlist-v", "pcode-v", "period-v", "room-v", "bldg-v", "instr-v",
            "wc-v", "dist-v", "lang-v", "17", "9", "status-v",
        ])]);

        let offerings = extract_offerings(&html);
        assert_eq!(offerings.len(), 1);

        let o = &offerings[0];
        assert_eq!(o.term, "term-v");
        assert_eq!(o.crn, "crn-v");
        assert_eq!(o.subject, "subj-v");
        assert_eq!(o.number, "num-v");
        assert_eq!(o.section, "sec-v");
        assert_eq!(o.title, "title-v");
        assert_eq!(o.crosslist, "xlist-v");
        assert_eq!(o.period_code, "pcode-v");
        assert_eq!(o.period, "period-v");
        assert_eq!(o.room, "room-v");
        assert_eq!(o.building, "bldg-v");
        assert_eq!(o.instructor, "instr-v");
        assert_eq!(o.world_culture, "wc-v");
        assert_eq!(o.distrib, "dist-v");
        assert_eq!(o.lang_req, "lang-v");
        assert_eq!(o.limit, SeatCount::Known(17));
        assert_eq!(o.enrolled, SeatCount::Known(9));
        assert_eq!(o.status, "status-v");
    }

    #[test]
    fn test_short_row_parses_with_unknown_counts() {
        // A truncated row still maps; missing numeric cells become Unknown.
        let html = page(&[data_row(&[
            "202409", "90001", "COSC", "001", "01", "Intro CS",
        ])]);

        let offerings = extract_offerings(&html);
        assert_eq!(offerings.len(), 1);
        assert_eq!(offerings[0].limit, SeatCount::Unknown);
        assert_eq!(offerings[0].enrolled, SeatCount::Unknown);
        assert_eq!(offerings[0].status, "");
    }
}
