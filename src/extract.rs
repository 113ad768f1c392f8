//! Slot extraction from the venue's calendar widget markup.
//!
//! The extractor only needs three queries from a document, captured by
//! [`CalendarMarkup`]: the available cells, each cell's booking action, and
//! the court label preceding a cell. [`CalendarPage`] answers them from real
//! HTML via `scraper`; tests answer them from synthetic trees.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::slot::Slot;

/// Body text the site returns when the session cookie was not primed or expired.
pub const SESSION_EXPIRED_MARKER: &str = "Expected session attribute";

static AVAILABLE_CELL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td.available").expect("static selector"));

static RESOURCE_LABEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td.calendar-resource-label").expect("static selector"));

// toggleBooking('RID', 'YYYYMMDD', 'HH:MM:SS', 'HH:MM:SS', ...)
static TOGGLE_BOOKING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"toggleBooking\('([^']+)',\s*'(\d{8})',\s*'(\d{2}:\d{2}:\d{2})',\s*'(\d{2}:\d{2}:\d{2})'",
    )
    .expect("static regex")
});

/// Query capability the extractor needs from a calendar document.
pub trait CalendarMarkup {
    /// Handle to one cell of the document.
    type Cell: Copy;

    /// All cells carrying the "available" marker.
    fn available_cells(&self) -> Vec<Self::Cell>;

    /// The cell's embedded booking action (the `onclick` handler).
    fn action_descriptor(&self, cell: Self::Cell) -> Option<String>;

    /// Text of the nearest resource-label cell before `cell` in document order.
    fn preceding_resource_label(&self, cell: Self::Cell) -> Option<String>;
}

/// Fields decoded from one `toggleBooking(...)` descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingAction {
    pub resource_id: String,
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// Decode a booking action descriptor.
///
/// Returns `None` when the descriptor has the wrong shape or its tokens are
/// not real calendar values (e.g. `20240231` or `25:00:00`).
pub fn parse_booking_action(descriptor: &str) -> Option<BookingAction> {
    let caps = TOGGLE_BOOKING.captures(descriptor)?;
    let date = NaiveDate::parse_from_str(&caps[2], "%Y%m%d").ok()?;
    let start = NaiveTime::parse_from_str(&caps[3], "%H:%M:%S").ok()?;
    let end = NaiveTime::parse_from_str(&caps[4], "%H:%M:%S").ok()?;

    Some(BookingAction {
        resource_id: caps[1].to_string(),
        date,
        start,
        end,
    })
}

/// Extract every available slot from a calendar document.
///
/// Malformed or decorative cells are skipped. Order follows the document but
/// callers should not rely on it. Duplicate cells yield duplicate slots.
pub fn extract_slots<M: CalendarMarkup>(markup: M) -> Vec<Slot> {
    let mut slots = Vec::new();

    for cell in markup.available_cells() {
        let Some(descriptor) = markup.action_descriptor(cell) else {
            tracing::trace!("Available cell without booking action, skipping");
            continue;
        };
        let Some(action) = parse_booking_action(&descriptor) else {
            tracing::trace!("Unrecognised booking action {:?}, skipping", descriptor);
            continue;
        };

        let label = markup
            .preceding_resource_label(cell)
            .filter(|label| !label.is_empty())
            .unwrap_or_else(|| action.resource_id.clone());

        let slot = Slot::new(action.resource_id, label, action.date, action.start, action.end);
        if !slot.is_well_formed() {
            tracing::warn!(
                "Dropping malformed slot on {} for court {}: {} is not before {}",
                slot.date(),
                slot.resource_id(),
                slot.start().format("%H:%M"),
                slot.end().format("%H:%M")
            );
            continue;
        }
        slots.push(slot);
    }

    slots
}

/// A parsed calendar widget page.
pub struct CalendarPage {
    html: Html,
}

impl CalendarPage {
    pub fn parse(markup: &str) -> Self {
        Self {
            html: Html::parse_document(markup),
        }
    }

    /// Extract all available slots from this page.
    pub fn slots(&self) -> Vec<Slot> {
        extract_slots(self)
    }
}

/// True if the body is the site's "session not primed" response, as
/// recognised by `marker`.
pub fn is_session_expired(body: &str, marker: &str) -> bool {
    !marker.is_empty() && body.contains(marker)
}

fn label_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

impl<'a> CalendarMarkup for &'a CalendarPage {
    type Cell = ElementRef<'a>;

    fn available_cells(&self) -> Vec<ElementRef<'a>> {
        let page: &'a CalendarPage = *self;
        page.html.select(&AVAILABLE_CELL).collect()
    }

    fn action_descriptor(&self, cell: ElementRef<'a>) -> Option<String> {
        cell.value().attr("onclick").map(str::to_string)
    }

    fn preceding_resource_label(&self, cell: ElementRef<'a>) -> Option<String> {
        // Walk backward in document order: earlier siblings (deepest last
        // label in each subtree first), then the parent, then its siblings.
        let mut current = Some(*cell);
        while let Some(node) = current {
            for sibling in node.prev_siblings() {
                let last_label = sibling
                    .descendants()
                    .filter_map(ElementRef::wrap)
                    .filter(|el| RESOURCE_LABEL.matches(el))
                    .last();
                if let Some(label) = last_label {
                    return Some(label_text(label));
                }
            }

            current = node.parent();
            if let Some(parent) = current.and_then(ElementRef::wrap) {
                if RESOURCE_LABEL.matches(&parent) {
                    return Some(label_text(parent));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn toggle(rid: &str, day: &str, start: &str, end: &str) -> String {
        format!("toggleBooking('{rid}', '{day}', '{start}', '{end}', 'x')")
    }

    // ==================== Synthetic Markup ====================

    struct FakeCell {
        available: bool,
        action: Option<String>,
        label: Option<String>,
    }

    struct FakeCalendar {
        cells: Vec<FakeCell>,
    }

    impl FakeCalendar {
        fn new() -> Self {
            Self { cells: Vec::new() }
        }

        fn label(mut self, text: &str) -> Self {
            self.cells.push(FakeCell {
                available: false,
                action: None,
                label: Some(text.to_string()),
            });
            self
        }

        fn available(mut self, action: impl Into<String>) -> Self {
            self.cells.push(FakeCell {
                available: true,
                action: Some(action.into()),
                label: None,
            });
            self
        }

        fn available_without_action(mut self) -> Self {
            self.cells.push(FakeCell {
                available: true,
                action: None,
                label: None,
            });
            self
        }

        fn booked(mut self, action: impl Into<String>) -> Self {
            self.cells.push(FakeCell {
                available: false,
                action: Some(action.into()),
                label: None,
            });
            self
        }
    }

    impl CalendarMarkup for &FakeCalendar {
        type Cell = usize;

        fn available_cells(&self) -> Vec<usize> {
            (0..self.cells.len())
                .filter(|&i| self.cells[i].available)
                .collect()
        }

        fn action_descriptor(&self, cell: usize) -> Option<String> {
            self.cells[cell].action.clone()
        }

        fn preceding_resource_label(&self, cell: usize) -> Option<String> {
            self.cells[..cell]
                .iter()
                .rev()
                .find_map(|c| c.label.clone())
        }
    }

    // ==================== Descriptor Parsing Tests ====================

    #[test]
    fn test_parse_booking_action_valid() {
        let action = parse_booking_action(&toggle("42", "20240601", "09:00:00", "10:00:00")).unwrap();
        assert_eq!(action.resource_id, "42");
        assert_eq!(action.date, date(2024, 6, 1));
        assert_eq!(action.start, time(9, 0));
        assert_eq!(action.end, time(10, 0));
    }

    #[test]
    fn test_parse_booking_action_embedded_in_handler() {
        let handler = "event.stopPropagation(); toggleBooking('C-3','20240601','18:00:00','19:00:00'); return false;";
        let action = parse_booking_action(handler).unwrap();
        assert_eq!(action.resource_id, "C-3");
        assert_eq!(action.start, time(18, 0));
    }

    #[test]
    fn test_parse_booking_action_rejects_wrong_shape() {
        assert!(parse_booking_action("").is_none());
        assert!(parse_booking_action("openPopup('42')").is_none());
        assert!(parse_booking_action("toggleBooking('42', '2024-06-01', '09:00:00', '10:00:00')").is_none());
        assert!(parse_booking_action("toggleBooking('42', '20240601', '09:00', '10:00')").is_none());
        assert!(parse_booking_action("toggleBooking('', '20240601', '09:00:00', '10:00:00')").is_none());
    }

    #[test]
    fn test_parse_booking_action_rejects_impossible_values() {
        assert!(parse_booking_action(&toggle("1", "20240231", "09:00:00", "10:00:00")).is_none());
        assert!(parse_booking_action(&toggle("1", "20241301", "09:00:00", "10:00:00")).is_none());
        assert!(parse_booking_action(&toggle("1", "20240601", "25:00:00", "26:00:00")).is_none());
        assert!(parse_booking_action(&toggle("1", "20240601", "09:61:00", "10:00:00")).is_none());
    }

    // ==================== Extraction over Synthetic Trees ====================

    #[test]
    fn test_extract_counts_only_valid_available_cells() {
        let calendar = FakeCalendar::new()
            .label("Court 1")
            .available(toggle("1", "20240601", "09:00:00", "10:00:00"))
            .available(toggle("1", "20240601", "10:00:00", "11:00:00"))
            .booked(toggle("1", "20240601", "11:00:00", "12:00:00"))
            .available("decorative()")
            .available_without_action()
            .label("Court 2")
            .available(toggle("2", "20240601", "09:00:00", "10:00:00"))
            .available(toggle("2", "20240631", "09:00:00", "10:00:00"));

        let slots = extract_slots(&calendar);
        assert_eq!(slots.len(), 3);

        let keys: HashSet<_> = slots.iter().map(Slot::key).collect();
        let expected: HashSet<_> = [
            Slot::new("1", "", date(2024, 6, 1), time(9, 0), time(10, 0)).key(),
            Slot::new("1", "", date(2024, 6, 1), time(10, 0), time(11, 0)).key(),
            Slot::new("2", "", date(2024, 6, 1), time(9, 0), time(10, 0)).key(),
        ]
        .into_iter()
        .collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn test_extract_uses_nearest_preceding_label() {
        let calendar = FakeCalendar::new()
            .label("Court 1")
            .available(toggle("1", "20240601", "09:00:00", "10:00:00"))
            .label("Court 2")
            .available(toggle("2", "20240601", "09:00:00", "10:00:00"));

        let slots = extract_slots(&calendar);
        assert_eq!(slots[0].resource_label(), "Court 1");
        assert_eq!(slots[1].resource_label(), "Court 2");
    }

    #[test]
    fn test_extract_falls_back_to_resource_id() {
        let calendar = FakeCalendar::new()
            .available(toggle("77", "20240601", "09:00:00", "10:00:00"))
            .label("")
            .available(toggle("78", "20240601", "09:00:00", "10:00:00"));

        let slots = extract_slots(&calendar);
        assert_eq!(slots[0].resource_label(), "77");
        assert_eq!(slots[1].resource_label(), "78");
    }

    #[test]
    fn test_extract_empty_calendar() {
        let calendar = FakeCalendar::new().label("Court 1");
        assert!(extract_slots(&calendar).is_empty());
    }

    #[test]
    fn test_extract_keeps_duplicates() {
        let action = toggle("1", "20240601", "09:00:00", "10:00:00");
        let calendar = FakeCalendar::new().available(action.clone()).available(action);

        let slots = extract_slots(&calendar);
        assert_eq!(slots.len(), 2);
        assert_eq!(slots[0], slots[1]);
    }

    #[test]
    fn test_extract_drops_inverted_slot() {
        let calendar = FakeCalendar::new()
            .available(toggle("1", "20240601", "10:00:00", "09:00:00"))
            .available(toggle("1", "20240601", "10:00:00", "10:00:00"));
        assert!(extract_slots(&calendar).is_empty());
    }

    // ==================== HTML Extraction Tests ====================

    const WIDGET: &str = r#"
        <html><body>
        <table class="calendar">
          <tr>
            <td class="calendar-resource-label"> Court 1 </td>
            <td class="available" onclick="toggleBooking('101', '20240601', '09:00:00', '10:00:00', 'a')">9am</td>
            <td class="booked">10am</td>
            <td class="available" onclick="toggleBooking('101', '20240601', '11:00:00', '12:00:00', 'a')">11am</td>
          </tr>
          <tr>
            <td class="calendar-resource-label"><span>Court 2</span></td>
            <td class="available spacer"></td>
            <td class="available" onclick="alert('closed')"></td>
            <td class="available" onclick="toggleBooking('102', '20240601', '09:00:00', '10:00:00', 'a')">9am</td>
          </tr>
        </table>
        </body></html>
    "#;

    #[test]
    fn test_html_page_extracts_slots_with_labels() {
        let page = CalendarPage::parse(WIDGET);
        let slots = page.slots();

        assert_eq!(slots.len(), 3);
        let labelled: HashSet<(String, String)> = slots
            .iter()
            .map(|s| (s.resource_id().to_string(), s.resource_label().to_string()))
            .collect();
        assert!(labelled.contains(&("101".to_string(), "Court 1".to_string())));
        assert!(labelled.contains(&("102".to_string(), "Court 2".to_string())));
    }

    #[test]
    fn test_html_label_found_across_rows() {
        let html = r#"
            <table>
              <tr><td class="calendar-resource-label">Court 5</td></tr>
              <tr><td class="available" onclick="toggleBooking('5', '20240601', '20:00:00', '21:00:00')">8pm</td></tr>
            </table>
        "#;
        let slots = CalendarPage::parse(html).slots();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].resource_label(), "Court 5");
    }

    #[test]
    fn test_html_without_label_uses_resource_id() {
        let html = r#"
            <table><tr>
              <td class="available" onclick="toggleBooking('9', '20240601', '20:00:00', '21:00:00')">8pm</td>
            </tr></table>
        "#;
        let slots = CalendarPage::parse(html).slots();
        assert_eq!(slots[0].resource_label(), "9");
    }

    #[test]
    fn test_html_with_no_available_cells() {
        let html = "<table><tr><td class='booked'>full</td></tr></table>";
        assert!(CalendarPage::parse(html).slots().is_empty());
    }

    #[test]
    fn test_session_expired_marker_detection() {
        assert!(is_session_expired(
            "<html>Error: Expected session attribute 'booking'</html>",
            SESSION_EXPIRED_MARKER
        ));
        assert!(!is_session_expired(WIDGET, SESSION_EXPIRED_MARKER));
        assert!(!is_session_expired("anything", ""));
    }
}
